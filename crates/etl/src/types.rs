//! 核心类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type ETLResult<T> = Result<T, ETLError>;

#[derive(Debug, Error)]
pub enum ETLError {
    #[error("HTTP 请求失败: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("JSON 解析失败: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("CSV 读写失败: {0}")]
    Csv(#[from] csv::Error),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("数据源错误: {0}")]
    DataSource(String),

    #[error("限流错误: {0}")]
    RateLimit(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("规则错误: {0}")]
    Rule(String),

    #[error("帖子 {0} 文本为空，无法清洗")]
    EmptyText(String),

    #[error("地理编码失败: {0}")]
    Geocoding(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("其他错误: {0}")]
    Other(String),
}

impl From<sqlx::Error> for ETLError {
    fn from(e: sqlx::Error) -> Self {
        ETLError::Database(e.to_string())
    }
}

/// 数据来源平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Reddit,
    /// 从 CSV 文件导入
    File,
}

impl Platform {
    /// 数据集文件名（不含扩展名）
    pub fn dataset_name(&self) -> &'static str {
        match self {
            Platform::Twitter => "tweets",
            Platform::Reddit => "reddit_posts",
            Platform::File => "posts",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = ETLError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "twitter" | "x" => Ok(Platform::Twitter),
            "reddit" => Ok(Platform::Reddit),
            "file" => Ok(Platform::File),
            other => Err(ETLError::Config(format!("未知平台: {}", other))),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Twitter => write!(f, "Twitter"),
            Platform::Reddit => write!(f, "Reddit"),
            Platform::File => write!(f, "File"),
        }
    }
}

/// 互动数据
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    /// 点赞（Reddit 为 score）
    pub likes: u64,
    /// 转发
    pub reposts: u64,
    /// 回复（Reddit 为评论数）
    pub replies: u64,
    /// 引用
    pub quotes: u64,
}

/// 原始帖子，由 Extractor 创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// 平台内的唯一标识
    pub id: String,
    pub platform: Platform,
    /// 发布时间
    pub created_at: DateTime<Utc>,
    pub author: Option<String>,
    /// 标题（仅 Reddit）
    pub title: Option<String>,
    /// 原始文本
    pub raw_text: String,
    pub engagement: EngagementMetrics,
    pub language: Option<String>,
    /// 用户资料中填写的位置
    pub user_location: Option<String>,
    /// 社区（subreddit）
    pub community: Option<String>,
    pub url: Option<String>,
}

/// 清洗后的帖子
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedPost {
    pub post: Post,
    pub cleaned_text: String,
}

/// 情感分数
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentScores {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
    /// 综合分数 [-1.0, 1.0]
    pub compound: f64,
}

/// 危机风险等级
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum RiskLevel {
    High,
    Moderate,
    Low,
    /// 没有规则命中
    #[default]
    Unknown,
}

impl RiskLevel {
    /// 报告中使用的固定顺序
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::High,
        RiskLevel::Moderate,
        RiskLevel::Low,
        RiskLevel::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "high",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Low => "low",
            RiskLevel::Unknown => "unknown",
        }
    }
}

impl From<String> for RiskLevel {
    fn from(value: String) -> Self {
        value.parse().unwrap_or(RiskLevel::Unknown)
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = ETLError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(RiskLevel::High),
            "moderate" => Ok(RiskLevel::Moderate),
            "low" => Ok(RiskLevel::Low),
            "unknown" | "" => Ok(RiskLevel::Unknown),
            other => Err(ETLError::Rule(format!("未知风险等级: {}", other))),
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 打分后的帖子
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPost {
    pub cleaned: CleanedPost,
    pub sentiment: SentimentScores,
    pub risk_level: RiskLevel,
    /// 命中的规则（未命中为 None）
    pub matched_rule: Option<String>,
}

impl ScoredPost {
    pub fn post(&self) -> &Post {
        &self.cleaned.post
    }
}

/// 坐标点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub post_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// 经纬度是否在合法范围内
    pub fn is_valid(latitude: f64, longitude: f64) -> bool {
        latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude)
    }
}

/// 地理编码后的帖子
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedPost {
    pub scored: ScoredPost,
    /// 从文本或用户资料中提取的位置
    pub extracted_location: Option<String>,
    pub geo: Option<GeoPoint>,
}

impl GeocodedPost {
    pub fn post(&self) -> &Post {
        self.scored.post()
    }

    /// 不做地理编码时直接包装
    pub fn without_location(scored: ScoredPost) -> Self {
        Self {
            scored,
            extracted_location: None,
            geo: None,
        }
    }
}

/// 位置统计表中的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationCount {
    pub location: String,
    pub post_count: usize,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Twitter 凭证
#[derive(Debug, Clone, Default)]
pub struct TwitterCredentials {
    pub bearer_token: String,
}

/// Reddit 凭证
#[derive(Debug, Clone, Default)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

/// ETL 配置
#[derive(Debug, Clone)]
pub struct ETLConfig {
    /// Twitter 搜索关键词
    pub keywords: Vec<String>,
    /// Reddit 搜索的 subreddit
    pub subreddits: Vec<String>,
    /// 每个查询最多抓取的帖子数
    pub limit_per_query: usize,
    /// Twitter 每 15 分钟最多请求数
    pub twitter_requests_per_window: u32,
    /// 请求超时（秒）
    pub request_timeout_secs: u64,
    /// 数据目录（raw / processed）
    pub data_dir: PathBuf,
    /// 输出目录（maps / reports）
    pub output_dir: PathBuf,
    /// 是否做地理编码
    pub enable_geocoding: bool,
    /// Nominatim 服务地址
    pub nominatim_url: String,
    /// 地理编码请求的 User-Agent
    pub geocoder_user_agent: String,
    /// 地理编码持久缓存（sqlite URL，可选）
    pub geocode_cache_url: Option<String>,
    /// 自定义风险规则文件
    pub rules_path: Option<PathBuf>,
    pub twitter: Option<TwitterCredentials>,
    pub reddit: Option<RedditCredentials>,
}

/// 默认搜索关键词
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "depressed",
    "anxiety",
    "suicidal",
    "mental health",
    "overwhelmed",
    "help needed",
    "crisis",
    "addiction",
    "therapy",
    "counseling",
    "support",
    "mental illness",
    "psychiatric",
    "emotional distress",
    "self harm",
];

/// 默认 subreddit
pub const DEFAULT_SUBREDDITS: &[&str] = &[
    "depression",
    "anxiety",
    "mentalhealth",
    "SuicideWatch",
    "addiction",
    "therapy",
    "mentalillness",
    "psychology",
    "selfhelp",
];

impl Default for ETLConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            subreddits: DEFAULT_SUBREDDITS.iter().map(|s| s.to_string()).collect(),
            limit_per_query: 100,
            twitter_requests_per_window: 100,
            request_timeout_secs: 30,
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            enable_geocoding: true,
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            geocoder_user_agent: "crisis_analysis_app".to_string(),
            geocode_cache_url: None,
            rules_path: None,
            twitter: None,
            reddit: None,
        }
    }
}

impl ETLConfig {
    /// 从环境变量（以及 .env 文件）加载配置
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(url) = std::env::var("NOMINATIM_URL") {
            config.nominatim_url = url;
        }
        config.geocode_cache_url = std::env::var("GEOCODE_CACHE_URL").ok();

        config.twitter = std::env::var("TWITTER_BEARER_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(|bearer_token| TwitterCredentials { bearer_token });

        config.reddit = match (
            std::env::var("REDDIT_CLIENT_ID"),
            std::env::var("REDDIT_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) => Some(RedditCredentials {
                client_id,
                client_secret,
                user_agent: std::env::var("REDDIT_USER_AGENT")
                    .unwrap_or_else(|_| "crisis-etl/0.1".to_string()),
            }),
            _ => None,
        };

        config
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    pub fn maps_dir(&self) -> PathBuf {
        self.output_dir.join("maps")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.output_dir.join("reports")
    }

    /// 创建数据和输出目录
    pub fn ensure_directories(&self) -> ETLResult<()> {
        for dir in [
            self.raw_dir(),
            self.processed_dir(),
            self.maps_dir(),
            self.reports_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}
