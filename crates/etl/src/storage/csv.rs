//! 各阶段 CSV 文件读写
//!
//! 每个阶段在上一阶段的列后追加自己的列：
//! raw → cleaned(`text_cleaned`) → analyzed(情感 + 风险) → geocoded(位置 + 坐标)。

use crate::extract::generate_post_id;
use crate::types::{
    CleanedPost, ETLError, ETLResult, EngagementMetrics, GeoPoint, GeocodedPost, Platform, Post,
    RiskLevel, ScoredPost, SentimentScores,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::path::Path;

pub const RAW_COLUMNS: &[&str] = &[
    "id",
    "platform",
    "created_at",
    "author",
    "title",
    "text",
    "likes",
    "reposts",
    "replies",
    "quotes",
    "language",
    "user_location",
    "community",
    "url",
];

pub const CLEANED_COLUMNS: &[&str] = &["text_cleaned"];

pub const ANALYZED_COLUMNS: &[&str] = &[
    "sentiment_negative",
    "sentiment_neutral",
    "sentiment_positive",
    "sentiment_compound",
    "risk_level",
    "matched_rule",
];

pub const GEOCODED_COLUMNS: &[&str] = &["extracted_location", "latitude", "longitude"];

/// 其他导出格式中常见的列名
const COLUMN_ALIASES: &[(&str, &[&str])] = &[
    ("id", &["tweet_id", "post_id"]),
    ("author", &["username"]),
    ("likes", &["score"]),
    ("reposts", &["retweets"]),
    ("replies", &["num_comments"]),
    ("community", &["subreddit"]),
];

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn post_fields(post: &Post) -> Vec<String> {
    vec![
        post.id.clone(),
        post.platform.to_string().to_lowercase(),
        post.created_at.to_rfc3339(),
        opt(&post.author),
        opt(&post.title),
        post.raw_text.clone(),
        post.engagement.likes.to_string(),
        post.engagement.reposts.to_string(),
        post.engagement.replies.to_string(),
        post.engagement.quotes.to_string(),
        opt(&post.language),
        opt(&post.user_location),
        opt(&post.community),
        opt(&post.url),
    ]
}

fn cleaned_fields(cleaned: &CleanedPost) -> Vec<String> {
    let mut fields = post_fields(&cleaned.post);
    fields.push(cleaned.cleaned_text.clone());
    fields
}

fn analyzed_fields(scored: &ScoredPost) -> Vec<String> {
    let mut fields = cleaned_fields(&scored.cleaned);
    fields.extend([
        scored.sentiment.negative.to_string(),
        scored.sentiment.neutral.to_string(),
        scored.sentiment.positive.to_string(),
        scored.sentiment.compound.to_string(),
        scored.risk_level.to_string(),
        opt(&scored.matched_rule),
    ]);
    fields
}

fn geocoded_fields(geocoded: &GeocodedPost) -> Vec<String> {
    let mut fields = analyzed_fields(&geocoded.scored);
    fields.push(opt(&geocoded.extracted_location));
    match &geocoded.geo {
        Some(point) => {
            fields.push(point.latitude.to_string());
            fields.push(point.longitude.to_string());
        }
        None => fields.extend([String::new(), String::new()]),
    }
    fields
}

fn write_rows<I>(path: &Path, columns: &[&[&str]], rows: I) -> ETLResult<usize>
where
    I: IntoIterator<Item = Vec<String>>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns.iter().flat_map(|c| c.iter()))?;

    let mut count = 0;
    for row in rows {
        writer.write_record(&row)?;
        count += 1;
    }
    writer.flush()?;

    tracing::info!("Data saved to {} ({} rows)", path.display(), count);
    Ok(count)
}

pub fn write_raw(path: &Path, posts: &[Post]) -> ETLResult<usize> {
    write_rows(path, &[RAW_COLUMNS], posts.iter().map(post_fields))
}

pub fn write_cleaned(path: &Path, posts: &[CleanedPost]) -> ETLResult<usize> {
    write_rows(
        path,
        &[RAW_COLUMNS, CLEANED_COLUMNS],
        posts.iter().map(cleaned_fields),
    )
}

pub fn write_analyzed(path: &Path, posts: &[ScoredPost]) -> ETLResult<usize> {
    write_rows(
        path,
        &[RAW_COLUMNS, CLEANED_COLUMNS, ANALYZED_COLUMNS],
        posts.iter().map(analyzed_fields),
    )
}

pub fn write_geocoded(path: &Path, posts: &[GeocodedPost]) -> ETLResult<usize> {
    write_rows(
        path,
        &[RAW_COLUMNS, CLEANED_COLUMNS, ANALYZED_COLUMNS, GEOCODED_COLUMNS],
        posts.iter().map(geocoded_fields),
    )
}

/// 按列名访问的一行
struct Row<'a> {
    index: &'a HashMap<String, usize>,
    record: &'a csv::StringRecord,
}

impl Row<'_> {
    /// 原样返回字段；空白字段视为缺失
    fn raw(&self, column: &str) -> Option<&str> {
        let aliases = COLUMN_ALIASES
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, aliases)| *aliases)
            .unwrap_or(&[]);

        std::iter::once(column)
            .chain(aliases.iter().copied())
            .filter_map(|name| self.index.get(name))
            .filter_map(|&i| self.record.get(i))
            .find(|v| !v.trim().is_empty())
    }

    /// 去掉首尾空白，用于 ID、数值与时间列
    fn get(&self, column: &str) -> Option<&str> {
        self.raw(column).map(str::trim)
    }

    /// 文本列保持原样
    fn string(&self, column: &str) -> Option<String> {
        self.raw(column).map(str::to_string)
    }

    fn count(&self, column: &str) -> u64 {
        self.get(column)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .map(|v| v as u64)
            .unwrap_or(0)
    }

    fn float(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(|v| v.parse::<f64>().ok())
    }

    fn post(&self, default_platform: Platform) -> ETLResult<Post> {
        let raw_text = self.string("text").unwrap_or_default();

        let created_at = match self.get("created_at") {
            Some(value) => parse_timestamp(value)
                .ok_or_else(|| ETLError::Other(format!("无法解析时间: {}", value)))?,
            None => return Err(ETLError::Other("缺少 created_at".to_string())),
        };

        let platform = match self.get("platform") {
            Some(value) => value.parse()?,
            None => default_platform,
        };

        let id = self.get("id").map(str::to_string).unwrap_or_else(|| {
            generate_post_id(&format!("{}|{}", created_at.to_rfc3339(), raw_text))
        });

        Ok(Post {
            id,
            platform,
            created_at,
            author: self.string("author"),
            title: self.string("title"),
            raw_text,
            engagement: EngagementMetrics {
                likes: self.count("likes"),
                reposts: self.count("reposts"),
                replies: self.count("replies"),
                quotes: self.count("quotes"),
            },
            language: self.string("language"),
            user_location: self.string("user_location"),
            community: self.string("community"),
            url: self.string("url"),
        })
    }
}

/// 支持 RFC 3339、`YYYY-MM-DD HH:MM:SS[.f][+00:00]` 与 Unix 秒
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite())
        .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
}

/// 逐行读取，无法解析的行记录警告后跳过
fn read_rows<T, F>(path: &Path, mut parse: F) -> ETLResult<Vec<T>>
where
    F: FnMut(&Row<'_>) -> ETLResult<T>,
{
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let index: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_string(), i))
        .collect();

    let mut items = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping row {} of {}: {}", line + 1, path.display(), e);
                continue;
            }
        };

        let row = Row {
            index: &index,
            record: &record,
        };
        match parse(&row) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!("Skipping row {} of {}: {}", line + 1, path.display(), e),
        }
    }

    tracing::info!("Loaded {} rows from {}", items.len(), path.display());
    Ok(items)
}

/// 读取原始帖子
pub fn read_raw(path: &Path, default_platform: Platform) -> ETLResult<Vec<Post>> {
    read_rows(path, |row| row.post(default_platform))
}

/// 读取已分析 / 已地理编码的帖子；缺少的列取默认值
pub fn read_geocoded(path: &Path) -> ETLResult<Vec<GeocodedPost>> {
    read_rows(path, |row| {
        let post = row.post(Platform::File)?;

        let scored = ScoredPost {
            cleaned: CleanedPost {
                cleaned_text: row.string("text_cleaned").unwrap_or_default(),
                post,
            },
            sentiment: SentimentScores {
                negative: row.float("sentiment_negative").unwrap_or(0.0),
                neutral: row.float("sentiment_neutral").unwrap_or(0.0),
                positive: row.float("sentiment_positive").unwrap_or(0.0),
                compound: row.float("sentiment_compound").unwrap_or(0.0),
            },
            risk_level: row
                .get("risk_level")
                .and_then(|v| v.parse().ok())
                .unwrap_or(RiskLevel::Unknown),
            matched_rule: row.string("matched_rule"),
        };

        let geo = match (row.float("latitude"), row.float("longitude")) {
            (Some(latitude), Some(longitude)) if GeoPoint::is_valid(latitude, longitude) => {
                Some(GeoPoint {
                    post_id: scored.post().id.clone(),
                    latitude,
                    longitude,
                })
            }
            _ => None,
        };

        Ok(GeocodedPost {
            extracted_location: row.string("extracted_location"),
            geo,
            scored,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_post() -> Post {
        Post {
            id: "t1".to_string(),
            platform: Platform::Twitter,
            created_at: Utc.with_ymd_and_hms(2024, 5, 13, 10, 0, 0).unwrap(),
            author: Some("someone".to_string()),
            title: None,
            raw_text: "Feeling \"lost\", in Denver, CO\nagain".to_string(),
            engagement: EngagementMetrics {
                likes: 3,
                reposts: 1,
                replies: 0,
                quotes: 0,
            },
            language: Some("en".to_string()),
            user_location: Some("Denver, CO".to_string()),
            community: None,
            url: None,
        }
    }

    fn geocoded(post: Post) -> GeocodedPost {
        GeocodedPost {
            scored: ScoredPost {
                cleaned: CleanedPost {
                    cleaned_text: "feeling lost denver co".to_string(),
                    post,
                },
                sentiment: SentimentScores {
                    negative: 0.31,
                    neutral: 0.69,
                    positive: 0.0,
                    compound: -0.3182,
                },
                risk_level: RiskLevel::Moderate,
                matched_rule: Some("lost".to_string()),
            },
            extracted_location: Some("Denver, CO".to_string()),
            geo: Some(GeoPoint {
                post_id: "t1".to_string(),
                latitude: 39.7392,
                longitude: -104.9903,
            }),
        }
    }

    #[test]
    fn test_raw_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw").join("tweets.csv");

        let written = write_raw(&path, &[sample_post()]).unwrap();
        assert_eq!(written, 1);

        let posts = read_raw(&path, Platform::File).unwrap();
        assert_eq!(posts, vec![sample_post()]);
    }

    #[test]
    fn test_geocoded_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geocoded_tweets.csv");

        let mut no_geo = geocoded(Post {
            id: "t2".to_string(),
            ..sample_post()
        });
        no_geo.geo = None;
        no_geo.extracted_location = None;

        let rows = vec![geocoded(sample_post()), no_geo];
        write_geocoded(&path, &rows).unwrap();

        let loaded = read_geocoded(&path).unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn test_stage_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyzed.csv");
        write_analyzed(&path, &[geocoded(sample_post()).scored]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert!(header.starts_with("id,platform,created_at,"));
        assert!(header.ends_with("text_cleaned,sentiment_negative,sentiment_neutral,sentiment_positive,sentiment_compound,risk_level,matched_rule"));
    }

    #[test]
    fn test_foreign_columns_and_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reddit_posts.csv");
        std::fs::write(
            &path,
            "post_id,title,text,created_at,score,num_comments,subreddit,url\n\
             abc,Tired,so tired of everything,2024-05-01 08:30:00,5,2,depression,https://reddit.com/abc\n\
             def,Broken,no date here,,1,0,anxiety,\n\
             ,Untitled,no id row,2024-05-02 09:00:00+00:00,-2,0,therapy,\n",
        )
        .unwrap();

        let posts = read_raw(&path, Platform::Reddit).unwrap();
        assert_eq!(posts.len(), 2);

        assert_eq!(posts[0].id, "abc");
        assert_eq!(posts[0].platform, Platform::Reddit);
        assert_eq!(posts[0].engagement.likes, 5);
        assert_eq!(posts[0].engagement.replies, 2);
        assert_eq!(posts[0].community.as_deref(), Some("depression"));

        // 缺少 ID 时按时间和文本生成
        assert_eq!(posts[1].id.len(), 16);
        assert_eq!(posts[1].engagement.likes, 0);
        assert!(posts[1].url.is_none());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 13, 10, 0, 0).unwrap();

        assert_eq!(parse_timestamp("2024-05-13T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-13 10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-13 10:00:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("1715594400"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("NaN"), None);
        assert_eq!(parse_timestamp("inf"), None);
    }

    #[test]
    fn test_text_columns_keep_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");

        let post = Post {
            id: "t3".to_string(),
            author: Some(" spaced name ".to_string()),
            title: Some("  Title\n".to_string()),
            raw_text: "  indented text\n".to_string(),
            ..sample_post()
        };
        write_raw(&path, &[post.clone()]).unwrap();

        let loaded = read_raw(&path, Platform::File).unwrap();
        assert_eq!(loaded, vec![post]);
    }

    #[test]
    fn test_id_and_numbers_are_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(
            &path,
            "id,created_at,text,likes\n\
             \" abc \", 2024-05-13T10:00:00Z ,hello, 7 \n",
        )
        .unwrap();

        let posts = read_raw(&path, Platform::File).unwrap();
        assert_eq!(posts[0].id, "abc");
        assert_eq!(posts[0].engagement.likes, 7);
        assert_eq!(posts[0].created_at.timestamp(), 1_715_594_400);
    }
}
