//! 从帖子中提取位置名称

use crate::types::Post;
use regex::Regex;
use std::sync::LazyLock;

/// 介词 + 最多两个词 + 地名后缀
static PREPOSITION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:in|from|at|near)\s+((?:[a-z']+\s+){0,2}(?:city|town|village|county|state|country))\b",
    )
    .expect("valid location regex")
});

/// 没有介词的裸形式
static BARE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b((?:[a-z']+\s+){1,2}(?:city|town|village|county|state|country))\b")
        .expect("valid location regex")
});

/// 裸形式可能把介词也吞进去
const LEADING_WORDS: &[&str] = &[
    "in", "from", "at", "near", "the", "a", "an", "my", "our", "your", "his", "her", "their",
    "this", "that",
];

const SUFFIXES: &[&str] = &["city", "town", "village", "county", "state", "country"];

const MAX_WORDS: usize = 3;

/// 位置提取器
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationExtractor;

impl LocationExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 优先使用用户资料中的位置，其次从原始文本中提取
    pub fn extract(&self, post: &Post) -> Option<String> {
        post.user_location
            .as_deref()
            .map(str::trim)
            .filter(|loc| loc.chars().any(char::is_alphabetic))
            .map(str::to_string)
            .or_else(|| self.extract_from_text(&post.raw_text))
    }

    /// 从文本中提取地名，例如 "in New York City" → "New York City"
    pub fn extract_from_text(&self, text: &str) -> Option<String> {
        [&*PREPOSITION_PATTERN, &*BARE_PATTERN]
            .into_iter()
            .flat_map(|pattern| pattern.captures_iter(text))
            .filter_map(|caps| caps.get(1))
            .find_map(|m| normalize(m.as_str()))
    }
}

/// 去掉冠词 / 物主词，拒绝过长或只剩后缀的结果，转为首字母大写
fn normalize(candidate: &str) -> Option<String> {
    let mut words: Vec<&str> = candidate.split_whitespace().collect();

    while let Some(first) = words.first() {
        let lower = first.to_lowercase();
        if LEADING_WORDS.contains(&lower.as_str()) || lower.ends_with("'s") {
            words.remove(0);
        } else {
            break;
        }
    }

    if words.len() < 2 || words.len() > MAX_WORDS {
        return None;
    }
    if words.iter().all(|w| SUFFIXES.contains(&w.to_lowercase().as_str())) {
        return None;
    }

    Some(words.iter().map(|w| title_case(w)).collect::<Vec<_>>().join(" "))
}

fn title_case(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EngagementMetrics, Platform};
    use chrono::Utc;

    #[test]
    fn test_extract_from_text() {
        let extractor = LocationExtractor::new();

        let cases = [
            ("Feeling overwhelmed in New York City", Some("New York City")),
            ("moved from kansas city last year", Some("Kansas City")),
            ("I live near the Salt Lake City area", Some("Salt Lake City")),
            ("Oregon State is beautiful", Some("Oregon State")),
            ("Need help in Los Angeles", None),
            ("things are hard in my town", None),
            ("", None),
        ];

        for (text, expected) in cases {
            assert_eq!(
                extractor.extract_from_text(text).as_deref(),
                expected,
                "text: {}",
                text
            );
        }
    }

    #[test]
    fn test_possessive_is_stripped() {
        let extractor = LocationExtractor::new();
        assert_eq!(
            extractor.extract_from_text("back at mom's Jefferson County").as_deref(),
            Some("Jefferson County")
        );
    }

    #[test]
    fn test_user_location_preferred() {
        let extractor = LocationExtractor::new();
        let mut post = Post {
            id: "1".to_string(),
            platform: Platform::Twitter,
            created_at: Utc::now(),
            author: None,
            title: None,
            raw_text: "stuck in Quezon City".to_string(),
            engagement: EngagementMetrics::default(),
            language: None,
            user_location: Some("  Manila, Philippines ".to_string()),
            community: None,
            url: None,
        };

        assert_eq!(extractor.extract(&post).as_deref(), Some("Manila, Philippines"));

        post.user_location = Some("🌍".to_string());
        assert_eq!(extractor.extract(&post).as_deref(), Some("Quezon City"));
    }
}
