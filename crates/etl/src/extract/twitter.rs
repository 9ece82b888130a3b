//! Twitter API v2 最近搜索

use super::{apply_limit, create_http_client, dedup_posts, page_size, PostSource, RequestPacer};
use crate::types::{
    ETLConfig, ETLError, ETLResult, EngagementMetrics, Platform, Post, TwitterCredentials,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.twitter.com/2";

/// 速率窗口 15 分钟
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Tweet>,
    includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    created_at: Option<String>,
    author_id: Option<String>,
    lang: Option<String>,
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    quote_count: u64,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
    location: Option<String>,
}

pub struct TwitterSource {
    client: reqwest::Client,
    credentials: TwitterCredentials,
    keywords: Vec<String>,
    base_url: String,
    pacer: RequestPacer,
}

impl TwitterSource {
    pub fn new(credentials: TwitterCredentials, config: &ETLConfig) -> ETLResult<Self> {
        Ok(Self {
            client: create_http_client("crisis-etl/0.1", config.request_timeout_secs)?,
            credentials,
            keywords: config.keywords.clone(),
            base_url: DEFAULT_BASE_URL.to_string(),
            pacer: RequestPacer::per_window(config.twitter_requests_per_window, RATE_LIMIT_WINDOW)?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 单个关键词的搜索
    async fn search(&self, keyword: &str, max_results: usize) -> ETLResult<Vec<Post>> {
        self.pacer.wait().await;

        // 接口要求 10..=100
        let max_results = page_size(max_results, 10, 100).to_string();
        let url = format!("{}/tweets/search/recent", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.credentials.bearer_token)
            .query(&[
                ("query", keyword),
                ("max_results", max_results.as_str()),
                ("tweet.fields", "created_at,public_metrics,lang,author_id"),
                ("expansions", "author_id"),
                ("user.fields", "username,location"),
            ])
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ETLError::RateLimit(format!(
                "Twitter 查询 '{}' 被限流",
                keyword
            )));
        }

        let body: SearchResponse = response.error_for_status()?.json().await?;
        Ok(parse_search_response(body))
    }
}

/// 把搜索结果转换为帖子，关联作者用户名和资料位置
fn parse_search_response(response: SearchResponse) -> Vec<Post> {
    let users: HashMap<String, User> = response
        .includes
        .map(|inc| inc.users)
        .unwrap_or_default()
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    response
        .data
        .into_iter()
        .map(|tweet| {
            let created_at = tweet
                .created_at
                .as_deref()
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            let metrics = tweet.public_metrics.unwrap_or_default();
            let user = tweet.author_id.as_ref().and_then(|id| users.get(id));

            Post {
                url: Some(format!("https://twitter.com/i/web/status/{}", tweet.id)),
                id: tweet.id,
                platform: Platform::Twitter,
                created_at,
                author: user.map(|u| u.username.clone()),
                title: None,
                raw_text: tweet.text,
                engagement: EngagementMetrics {
                    likes: metrics.like_count,
                    reposts: metrics.retweet_count,
                    replies: metrics.reply_count,
                    quotes: metrics.quote_count,
                },
                language: tweet.lang,
                user_location: user
                    .and_then(|u| u.location.clone())
                    .filter(|loc| !loc.trim().is_empty()),
                community: None,
            }
        })
        .collect()
}

#[async_trait]
impl PostSource for TwitterSource {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn fetch_posts(&self, limit_per_query: usize) -> ETLResult<Vec<Post>> {
        let mut all_posts = Vec::new();

        for keyword in &self.keywords {
            tracing::info!("Searching tweets for keyword: {}", keyword);

            match self.search(keyword, limit_per_query).await {
                Ok(mut posts) => {
                    apply_limit(&mut posts, limit_per_query);
                    tracing::info!("Found {} tweets for keyword: {}", posts.len(), keyword);
                    all_posts.extend(posts);
                }
                Err(e) => {
                    tracing::warn!("Failed to search tweets for keyword {}: {}", keyword, e);
                }
            }
        }

        let posts = dedup_posts(all_posts);
        tracing::info!("Fetched {} tweets in total", posts.len());
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "data": [
            {
                "id": "1790000000000000001",
                "text": "I feel so overwhelmed in Chicago",
                "created_at": "2024-05-13T10:00:00.000Z",
                "author_id": "42",
                "lang": "en",
                "public_metrics": {"retweet_count": 2, "reply_count": 1, "like_count": 7, "quote_count": 0}
            },
            {
                "id": "1790000000000000002",
                "text": "therapy helps",
                "author_id": "99"
            }
        ],
        "includes": {
            "users": [{"id": "42", "username": "someone", "location": "Chicago, IL"}]
        },
        "meta": {"result_count": 2}
    }"#;

    #[test]
    fn test_parse_search_response() {
        let response: SearchResponse = serde_json::from_str(SAMPLE).unwrap();
        let posts = parse_search_response(response);

        assert_eq!(posts.len(), 2);

        let first = &posts[0];
        assert_eq!(first.id, "1790000000000000001");
        assert_eq!(first.platform, Platform::Twitter);
        assert_eq!(first.author.as_deref(), Some("someone"));
        assert_eq!(first.user_location.as_deref(), Some("Chicago, IL"));
        assert_eq!(first.engagement.likes, 7);
        assert_eq!(first.engagement.reposts, 2);
        assert_eq!(first.language.as_deref(), Some("en"));
        assert_eq!(first.created_at.to_rfc3339(), "2024-05-13T10:00:00+00:00");

        // 作者不在 includes 中
        let second = &posts[1];
        assert!(second.author.is_none());
        assert!(second.user_location.is_none());
        assert_eq!(second.engagement, EngagementMetrics::default());
    }

    #[test]
    fn test_empty_result_has_no_data() {
        let response: SearchResponse =
            serde_json::from_str(r#"{"meta": {"result_count": 0}}"#).unwrap();
        assert!(parse_search_response(response).is_empty());
    }

    fn source(keywords: &[&str], base_url: &str) -> TwitterSource {
        let config = ETLConfig {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            twitter_requests_per_window: 100_000,
            request_timeout_secs: 5,
            ..ETLConfig::default()
        };
        TwitterSource::new(TwitterCredentials::default(), &config)
            .unwrap()
            .with_base_url(base_url)
    }

    #[tokio::test]
    async fn test_unreachable_api_skips_every_query() {
        let source = source(&["depressed", "anxiety"], "http://127.0.0.1:1");

        let posts = source.fetch_posts(10).await.unwrap();
        assert!(posts.is_empty());
    }

    fn respond(request_line: &str) -> (&'static str, &'static str) {
        if request_line.contains("query=crisis") {
            ("429 Too Many Requests", "{}")
        } else if request_line.contains("max_results=100") {
            ("200 OK", SAMPLE)
        } else {
            ("400 Bad Request", "{}")
        }
    }

    #[tokio::test]
    async fn test_rate_limited_query_is_skipped() {
        let base_url = crate::extract::test_server::serve(respond).await;
        let source = source(&["crisis", "therapy"], &base_url);

        let err = source.search("crisis", 10).await.unwrap_err();
        assert!(matches!(err, ETLError::RateLimit(_)));

        // limit 为 0 时按接口上限请求，且不截断
        let posts = source.fetch_posts(0).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, "1790000000000000001");
    }
}
