//! 帖子抽取模块

pub mod csv_source;
pub mod reddit;
pub mod twitter;

pub use csv_source::CsvSource;
pub use reddit::RedditSource;
pub use twitter::TwitterSource;

use crate::types::{ETLConfig, ETLError, ETLResult, Platform, Post};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::time::Duration;

/// 帖子数据源接口
#[async_trait]
pub trait PostSource: Send + Sync {
    /// 数据来源平台
    fn platform(&self) -> Platform;

    /// 抓取帖子，每个查询（关键词 / subreddit）最多 `limit_per_query` 条，0 表示不限制
    async fn fetch_posts(&self, limit_per_query: usize) -> ETLResult<Vec<Post>>;
}

/// 请求节流器，每次请求前等待许可
pub struct RequestPacer {
    limiter: DefaultDirectRateLimiter,
}

impl RequestPacer {
    /// 在 `window` 内最多 `requests` 次，请求之间均匀间隔
    pub fn per_window(requests: u32, window: Duration) -> ETLResult<Self> {
        let requests = NonZeroU32::new(requests)
            .ok_or_else(|| ETLError::Config("请求次数必须大于 0".to_string()))?;

        let quota = Quota::with_period(window / requests.get())
            .ok_or_else(|| ETLError::Config("限流周期必须大于 0".to_string()))?
            .allow_burst(nonzero!(1u32));

        Ok(Self {
            limiter: RateLimiter::direct(quota),
        })
    }

    /// 每秒最多 `requests` 次
    pub fn per_second(requests: u32) -> ETLResult<Self> {
        Self::per_window(requests, Duration::from_secs(1))
    }

    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

/// 通用 HTTP 客户端配置
pub fn create_http_client(user_agent: &str, timeout_secs: u64) -> ETLResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(Into::into)
}

/// 生成帖子 ID（SHA256 前 16 位十六进制），用于没有 ID 的导入数据
pub fn generate_post_id(seed: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(16);
    id
}

/// 单次请求的条数：`limit` 为 0 表示不限制，取接口上限
pub fn page_size(limit: usize, min: usize, max: usize) -> usize {
    if limit == 0 {
        max
    } else {
        limit.clamp(min, max)
    }
}

/// 按 `limit` 截断，0 表示不截断
pub(crate) fn apply_limit(posts: &mut Vec<Post>, limit: usize) {
    if limit > 0 {
        posts.truncate(limit);
    }
}

/// 按 (platform, id) 去重，保留第一次出现
pub fn dedup_posts(posts: Vec<Post>) -> Vec<Post> {
    let mut seen = HashSet::new();
    posts
        .into_iter()
        .filter(|post| seen.insert((post.platform, post.id.clone())))
        .collect()
}

/// 根据配置创建数据源；缺少凭证视为配置错误
pub fn create_source(platform: Platform, config: &ETLConfig) -> ETLResult<Box<dyn PostSource>> {
    match platform {
        Platform::Twitter => {
            let credentials = config.twitter.clone().ok_or_else(|| {
                ETLError::Config("缺少 TWITTER_BEARER_TOKEN".to_string())
            })?;
            Ok(Box::new(TwitterSource::new(credentials, config)?))
        }
        Platform::Reddit => {
            let credentials = config.reddit.clone().ok_or_else(|| {
                ETLError::Config("缺少 REDDIT_CLIENT_ID / REDDIT_CLIENT_SECRET".to_string())
            })?;
            Ok(Box::new(RedditSource::new(credentials, config)?))
        }
        Platform::File => Err(ETLError::Config(
            "文件数据源需要指定路径，请使用 CsvSource".to_string(),
        )),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EngagementMetrics;
    use chrono::Utc;

    fn post(platform: Platform, id: &str, text: &str) -> Post {
        Post {
            id: id.to_string(),
            platform,
            created_at: Utc::now(),
            author: None,
            title: None,
            raw_text: text.to_string(),
            engagement: EngagementMetrics::default(),
            language: None,
            user_location: None,
            community: None,
            url: None,
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let posts = vec![
            post(Platform::Twitter, "1", "first"),
            post(Platform::Twitter, "1", "second"),
            post(Platform::Reddit, "1", "other platform"),
            post(Platform::Twitter, "2", "third"),
        ];

        let deduped = dedup_posts(posts);
        let texts: Vec<_> = deduped.iter().map(|p| p.raw_text.as_str()).collect();
        assert_eq!(texts, ["first", "other platform", "third"]);
    }

    #[test]
    fn test_page_size_zero_means_unlimited() {
        assert_eq!(page_size(0, 10, 100), 100);
        assert_eq!(page_size(5, 10, 100), 10);
        assert_eq!(page_size(50, 10, 100), 50);
        assert_eq!(page_size(500, 1, 100), 100);

        let mut posts: Vec<Post> = (0..3).map(|i| post(Platform::Twitter, &i.to_string(), "x")).collect();
        apply_limit(&mut posts, 0);
        assert_eq!(posts.len(), 3);
        apply_limit(&mut posts, 2);
        assert_eq!(posts.len(), 2);
    }

    #[test]
    fn test_generate_post_id_is_stable() {
        let a = generate_post_id("2024-01-01|hello");
        assert_eq!(a.len(), 16);
        assert_eq!(a, generate_post_id("2024-01-01|hello"));
        assert_ne!(a, generate_post_id("2024-01-01|hello!"));
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let config = ETLConfig::default();

        assert!(matches!(
            create_source(Platform::Twitter, &config),
            Err(ETLError::Config(_))
        ));
        assert!(matches!(
            create_source(Platform::Reddit, &config),
            Err(ETLError::Config(_))
        ));
    }

    #[test]
    fn test_pacer_rejects_zero_requests() {
        assert!(RequestPacer::per_window(0, Duration::from_secs(60)).is_err());
        assert!(RequestPacer::per_second(1).is_ok());
    }

    #[tokio::test]
    async fn test_pacer_first_request_is_immediate() {
        let pacer = RequestPacer::per_window(100, Duration::from_secs(900)).unwrap();
        let started = std::time::Instant::now();
        pacer.wait().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
