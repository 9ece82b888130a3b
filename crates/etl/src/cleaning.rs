//! 文本清洗模块
//!
//! 小写化 → 去 emoji → 去 URL → 去特殊字符 → 分词 → 去停用词 → 合并空白。
//! 清洗是幂等的：对已清洗文本再清洗结果不变。

use crate::types::{CleanedPost, ETLError, ETLResult, Post};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static EMOJI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[\x{1F000}-\x{1FAFF}\x{2300}-\x{23FF}\x{2600}-\x{27BF}\x{2B00}-\x{2BFF}\x{FE00}-\x{FE0F}\x{200D}\x{20E3}\x{E0020}-\x{E007F}]",
    )
    .unwrap()
});
static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+|www\.\S+").unwrap());
static SPECIAL_CHAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z\s.,!?]").unwrap());
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]+|[.,!?]+").unwrap());

/// NLTK 英文停用词（去掉撇号后的形式由分词自然处理）
///
/// 否定词 no / nor / not 被保留：风险规则和情感都依赖它们。
const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "only", "own", "same", "so", "than", "too", "very", "s",
    "t", "can", "will", "just", "don", "don't", "should", "should've", "now", "d", "ll", "m",
    "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn", "didn't",
    "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn", "isn't",
    "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
    "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
    "wouldn't",
];

/// 社交媒体特有的停用词
const SOCIAL_STOPWORDS: &[&str] = &["rt", "http", "https", "www", "com"];

/// 文本清洗器
#[derive(Debug, Clone)]
pub struct TextCleaner {
    stop_words: HashSet<String>,
}

impl TextCleaner {
    pub fn new() -> Self {
        let stop_words = ENGLISH_STOPWORDS
            .iter()
            .chain(SOCIAL_STOPWORDS.iter())
            .map(|w| w.to_string())
            .collect();

        Self { stop_words }
    }

    /// 追加停用词
    pub fn with_stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words
            .extend(words.into_iter().map(|w| w.into().to_lowercase()));
        self
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }

    pub fn remove_emojis(&self, text: &str) -> String {
        EMOJI_REGEX.replace_all(text, "").into_owned()
    }

    pub fn remove_urls(&self, text: &str) -> String {
        URL_REGEX.replace_all(text, "").into_owned()
    }

    /// 只保留小写字母、空白和 . , ! ?
    pub fn remove_special_chars(&self, text: &str) -> String {
        SPECIAL_CHAR_REGEX.replace_all(text, "").into_owned()
    }

    /// 分词并去停用词，结果以单个空格连接
    pub fn remove_stopwords(&self, text: &str) -> String {
        TOKEN_REGEX
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|token| !self.is_stopword(token))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 执行全部清洗步骤
    pub fn clean_text(&self, text: &str) -> String {
        let text = text.to_lowercase();
        let text = self.remove_emojis(&text);
        let text = self.remove_urls(&text);
        let text = self.remove_special_chars(&text);
        let text = self.remove_stopwords(&text);

        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// 清洗单条帖子；原文为空的帖子无法清洗
    pub fn clean_post(&self, post: &Post) -> ETLResult<CleanedPost> {
        if post.raw_text.trim().is_empty() {
            return Err(ETLError::EmptyText(post.id.clone()));
        }

        Ok(CleanedPost {
            post: post.clone(),
            cleaned_text: self.clean_text(&post.raw_text),
        })
    }

    /// 批量清洗，跳过无法清洗的帖子
    pub fn clean_batch(&self, posts: &[Post]) -> Vec<CleanedPost> {
        posts
            .iter()
            .filter_map(|post| match self.clean_post(post) {
                Ok(cleaned) => Some(cleaned),
                Err(e) => {
                    tracing::warn!("Skipping post {}: {}", post.id, e);
                    None
                }
            })
            .collect()
    }
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new()
    }
}
