//! Reddit 搜索（application-only OAuth）

use super::{apply_limit, create_http_client, dedup_posts, page_size, PostSource, RequestPacer};
use crate::types::{
    ETLConfig, ETLError, ETLResult, EngagementMetrics, Platform, Post, RedditCredentials,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const DEFAULT_API_URL: &str = "https://oauth.reddit.com";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: RedditPost,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    created_utc: f64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    subreddit: String,
    author: Option<String>,
    url: Option<String>,
}

pub struct RedditSource {
    client: reqwest::Client,
    credentials: RedditCredentials,
    subreddits: Vec<String>,
    keywords: Vec<String>,
    token_url: String,
    api_url: String,
    pacer: RequestPacer,
}

impl RedditSource {
    pub fn new(credentials: RedditCredentials, config: &ETLConfig) -> ETLResult<Self> {
        Ok(Self {
            client: create_http_client(&credentials.user_agent, config.request_timeout_secs)?,
            credentials,
            subreddits: config.subreddits.clone(),
            keywords: config.keywords.clone(),
            token_url: TOKEN_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            // Reddit 允许每分钟 100 次 OAuth 请求
            pacer: RequestPacer::per_window(100, std::time::Duration::from_secs(60))?,
        })
    }

    pub fn with_endpoints(mut self, token_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self.api_url = api_url.into();
        self
    }

    /// 搜索语句：`kw1 OR kw2 ...`，多词关键词加引号
    pub fn search_query(&self) -> String {
        self.keywords
            .iter()
            .map(|kw| {
                if kw.contains(' ') {
                    format!("\"{}\"", kw)
                } else {
                    kw.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    async fn access_token(&self) -> ETLResult<String> {
        self.pacer.wait().await;

        let response: TokenResponse = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.access_token)
    }

    /// 搜索单个 subreddit 最近一个月的帖子
    async fn search_subreddit(
        &self,
        token: &str,
        subreddit: &str,
        limit: usize,
    ) -> ETLResult<Vec<Post>> {
        self.pacer.wait().await;

        let url = format!("{}/r/{}/search", self.api_url, subreddit);
        let limit = page_size(limit, 1, 100).to_string();
        let query = self.search_query();

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("restrict_sr", "1"),
                ("t", "month"),
                ("limit", limit.as_str()),
                ("raw_json", "1"),
            ])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ETLError::RateLimit(format!("subreddit {} 被限流", subreddit)));
        }

        let listing: Listing = response.error_for_status()?.json().await?;
        Ok(parse_listing(listing))
    }
}

/// 标题与正文合并为帖子文本
fn parse_listing(listing: Listing) -> Vec<Post> {
    listing
        .data
        .children
        .into_iter()
        .map(|child| {
            let item = child.data;
            let created_at =
                DateTime::<Utc>::from_timestamp(item.created_utc as i64, 0).unwrap_or_else(Utc::now);

            let raw_text = match (item.title.trim(), item.selftext.trim()) {
                (title, "") => title.to_string(),
                ("", body) => body.to_string(),
                (title, body) => format!("{}\n\n{}", title, body),
            };

            Post {
                id: item.id,
                platform: Platform::Reddit,
                created_at,
                author: item.author.filter(|a| a != "[deleted]"),
                title: Some(item.title).filter(|t| !t.is_empty()),
                raw_text,
                engagement: EngagementMetrics {
                    likes: item.score.max(0) as u64,
                    reposts: 0,
                    replies: item.num_comments,
                    quotes: 0,
                },
                language: None,
                user_location: None,
                community: Some(item.subreddit),
                url: item.url,
            }
        })
        .collect()
}

#[async_trait]
impl PostSource for RedditSource {
    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    async fn fetch_posts(&self, limit_per_query: usize) -> ETLResult<Vec<Post>> {
        let token = self
            .access_token()
            .await
            .map_err(|e| ETLError::DataSource(format!("Reddit 认证失败: {}", e)))?;

        let mut all_posts = Vec::new();

        for subreddit in &self.subreddits {
            tracing::info!("Searching in subreddit: {}", subreddit);

            match self.search_subreddit(&token, subreddit, limit_per_query).await {
                Ok(mut posts) => {
                    apply_limit(&mut posts, limit_per_query);
                    tracing::info!("Found {} posts in r/{}", posts.len(), subreddit);
                    all_posts.extend(posts);
                }
                Err(e) => {
                    tracing::warn!("Error searching subreddit {}: {}", subreddit, e);
                }
            }
        }

        let posts = dedup_posts(all_posts);
        tracing::info!("Fetched {} Reddit posts in total", posts.len());
        Ok(posts)
    }
}
