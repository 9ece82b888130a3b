//! 情感分析模块
//!
//! 基于词典的 VADER 风格打分：词典效价、程度副词、否定、大写强调、
//! "but" 转折和标点放大，最后归一化到 [-1, 1]。

use crate::types::{CleanedPost, SentimentScores};
use std::collections::{HashMap, HashSet};

/// 程度副词增量
const B_INCR: f64 = 0.293;
const B_DECR: f64 = -0.293;
/// 全大写强调增量
const C_INCR: f64 = 0.733;
/// 否定系数
const N_SCALAR: f64 = -0.74;
/// 归一化参数
const ALPHA: f64 = 15.0;

/// 情感打分接口
pub trait SentimentScorer: Send + Sync {
    /// 打分器名称
    fn name(&self) -> &str;

    /// 计算情感分数，compound 必须落在 [-1, 1]
    fn polarity_scores(&self, text: &str) -> SentimentScores;
}

/// 词典效价（-4 ~ 4）
const LEXICON: &[(&str, f64)] = &[
    // 正面
    ("good", 1.9),
    ("great", 3.1),
    ("happy", 2.7),
    ("happier", 2.4),
    ("love", 3.2),
    ("loved", 2.9),
    ("loving", 2.9),
    ("best", 3.2),
    ("better", 1.9),
    ("hope", 1.9),
    ("hopeful", 2.3),
    ("glad", 2.0),
    ("thanks", 1.9),
    ("thank", 1.5),
    ("grateful", 2.0),
    ("calm", 1.3),
    ("safe", 1.9),
    ("support", 1.7),
    ("supported", 1.3),
    ("supportive", 1.9),
    ("help", 1.7),
    ("helped", 1.7),
    ("helpful", 1.8),
    ("strong", 2.3),
    ("stronger", 1.6),
    ("proud", 2.1),
    ("relief", 1.7),
    ("relieved", 1.6),
    ("peace", 2.5),
    ("peaceful", 2.2),
    ("smile", 1.5),
    ("fun", 2.3),
    ("excited", 1.4),
    ("amazing", 2.8),
    ("awesome", 3.1),
    ("wonderful", 2.7),
    ("positive", 2.6),
    ("nice", 1.8),
    ("okay", 0.9),
    ("ok", 0.9),
    ("fine", 0.8),
    ("beautiful", 2.9),
    ("joy", 2.8),
    ("kind", 2.4),
    ("care", 2.2),
    ("cared", 1.8),
    ("healing", 1.4),
    ("heal", 1.4),
    ("recovered", 1.5),
    ("laugh", 2.6),
    ("enjoy", 2.2),
    ("enjoyed", 2.3),
    ("blessed", 2.9),
    ("brave", 2.4),
    ("confident", 2.2),
    ("comfort", 1.5),
    ("encouraged", 1.5),
    ("encouraging", 2.4),
    ("win", 2.8),
    ("success", 2.7),
    ("progress", 1.8),
    ("improve", 1.9),
    ("improved", 2.1),
    ("welcome", 2.0),
    ("friend", 2.2),
    ("friends", 2.1),
    ("alive", 1.6),
    ("free", 2.3),
    ("yes", 1.7),
    // 负面
    ("bad", -2.5),
    ("sad", -2.1),
    ("sadness", -1.9),
    ("depressed", -2.3),
    ("depression", -2.7),
    ("depressing", -1.6),
    ("anxious", -1.0),
    ("anxiety", -0.7),
    ("alone", -1.0),
    ("lonely", -1.5),
    ("loneliness", -1.8),
    ("scared", -1.9),
    ("afraid", -2.0),
    ("fear", -2.2),
    ("worried", -1.2),
    ("worry", -1.9),
    ("hopeless", -2.0),
    ("worthless", -1.9),
    ("hate", -2.7),
    ("hurt", -2.4),
    ("hurting", -2.0),
    ("pain", -2.3),
    ("painful", -2.3),
    ("cry", -2.1),
    ("crying", -2.1),
    ("tired", -1.9),
    ("exhausted", -1.5),
    ("struggling", -1.4),
    ("struggle", -1.3),
    ("overwhelmed", -1.5),
    ("lost", -1.3),
    ("die", -2.9),
    ("dying", -2.6),
    ("dead", -3.3),
    ("death", -2.9),
    ("kill", -3.7),
    ("killing", -3.4),
    ("suicide", -3.5),
    ("suicidal", -3.6),
    ("terrible", -2.1),
    ("awful", -2.0),
    ("horrible", -2.5),
    ("miserable", -2.2),
    ("broken", -2.1),
    ("empty", -0.8),
    ("numb", -1.3),
    ("angry", -2.3),
    ("upset", -1.6),
    ("stress", -1.8),
    ("stressed", -1.4),
    ("panic", -2.3),
    ("crisis", -3.1),
    ("trauma", -2.8),
    ("abuse", -3.2),
    ("abused", -2.3),
    ("sick", -2.3),
    ("useless", -1.8),
    ("failure", -2.3),
    ("fail", -2.5),
    ("failed", -2.3),
    ("guilt", -1.1),
    ("guilty", -1.8),
    ("shame", -2.1),
    ("ashamed", -2.1),
    ("harm", -2.2),
    ("desperate", -1.3),
    ("despair", -1.3),
    ("grief", -2.2),
    ("unhappy", -1.8),
    ("worse", -2.1),
    ("worst", -3.1),
    ("problem", -1.7),
    ("problems", -1.7),
    ("sorry", -0.3),
    ("no", -1.2),
    ("isolated", -1.3),
    ("ugly", -2.3),
    ("weak", -1.9),
    ("cruel", -2.8),
    ("kms", -3.0),
];

/// 程度副词
const BOOSTERS: &[(&str, f64)] = &[
    ("absolutely", B_INCR),
    ("amazingly", B_INCR),
    ("completely", B_INCR),
    ("deeply", B_INCR),
    ("extremely", B_INCR),
    ("especially", B_INCR),
    ("highly", B_INCR),
    ("hugely", B_INCR),
    ("incredibly", B_INCR),
    ("really", B_INCR),
    ("so", B_INCR),
    ("such", B_INCR),
    ("totally", B_INCR),
    ("truly", B_INCR),
    ("utterly", B_INCR),
    ("very", B_INCR),
    ("almost", B_DECR),
    ("barely", B_DECR),
    ("hardly", B_DECR),
    ("marginally", B_DECR),
    ("occasionally", B_DECR),
    ("partly", B_DECR),
    ("slightly", B_DECR),
    ("somewhat", B_DECR),
];

/// 否定词（另外所有以 n't 结尾的词也视为否定）
const NEGATIONS: &[&str] = &[
    "not", "never", "none", "nope", "nothing", "nowhere", "neither", "nor", "without", "cant",
    "cannot", "dont", "doesnt", "didnt", "isnt", "wasnt", "arent", "aint", "wont", "wouldnt",
    "couldnt", "shouldnt", "hasnt", "havent", "hadnt",
];

/// VADER 风格的词典打分器
#[derive(Debug, Clone)]
pub struct VaderScorer {
    lexicon: HashMap<String, f64>,
    boosters: HashMap<String, f64>,
    negations: HashSet<String>,
}

impl VaderScorer {
    pub fn new() -> Self {
        let mut scorer = Self {
            lexicon: HashMap::new(),
            boosters: HashMap::new(),
            negations: HashSet::new(),
        };

        scorer.initialize_dictionaries();
        scorer
    }

    fn initialize_dictionaries(&mut self) {
        for (word, valence) in LEXICON {
            self.lexicon.insert(word.to_string(), *valence);
        }

        for (word, scalar) in BOOSTERS {
            self.boosters.insert(word.to_string(), *scalar);
        }

        for word in NEGATIONS {
            self.negations.insert(word.to_string());
        }
    }

    /// 添加或覆盖词典条目
    pub fn with_word(mut self, word: &str, valence: f64) -> Self {
        self.lexicon
            .insert(word.to_lowercase(), valence.clamp(-4.0, 4.0));
        self
    }

    fn is_negation(&self, word: &str) -> bool {
        self.negations.contains(word) || word.ends_with("n't")
    }

    /// 分词：去掉首尾标点，丢弃单字符词
    fn tokenize(text: &str) -> Vec<&str> {
        text.split_whitespace()
            .map(|w| w.trim_matches(|c: char| c.is_ascii_punctuation()))
            .filter(|w| w.chars().count() > 1)
            .collect()
    }

    fn is_all_caps(word: &str) -> bool {
        word.chars().any(|c| c.is_alphabetic())
            && word
                .chars()
                .filter(|c| c.is_alphabetic())
                .all(|c| c.is_uppercase())
    }

    fn booster_scalar(&self, word: &str, lower: &str, valence: f64, is_cap_diff: bool) -> f64 {
        let Some(&scalar) = self.boosters.get(lower) else {
            return 0.0;
        };

        let mut scalar = if valence < 0.0 { -scalar } else { scalar };
        if is_cap_diff && Self::is_all_caps(word) {
            scalar += if valence > 0.0 { C_INCR } else { -C_INCR };
        }
        scalar
    }

    /// 单个词的效价（含上下文修正）
    fn word_valence(&self, words: &[&str], lowered: &[String], i: usize, is_cap_diff: bool) -> f64 {
        let lower = lowered[i].as_str();

        if self.boosters.contains_key(lower) {
            return 0.0;
        }
        // "kind of" 是程度短语，不是 "kind"
        if lower == "kind" && lowered.get(i + 1).map(String::as_str) == Some("of") {
            return 0.0;
        }

        let Some(&base) = self.lexicon.get(lower) else {
            return 0.0;
        };

        let mut valence = base;
        if is_cap_diff && Self::is_all_caps(words[i]) {
            valence += if valence > 0.0 { C_INCR } else { -C_INCR };
        }

        for distance in 1..=3 {
            if i < distance {
                break;
            }
            let j = i - distance;
            let prev = lowered[j].as_str();

            if !self.lexicon.contains_key(prev) {
                let scalar = self.booster_scalar(words[j], prev, valence, is_cap_diff);
                let damping = match distance {
                    1 => 1.0,
                    2 => 0.95,
                    _ => 0.9,
                };
                valence += scalar * damping;
            }

            if self.is_negation(prev) {
                valence *= N_SCALAR;
            }
        }

        valence
    }

    /// 感叹号和问号的放大量
    fn punctuation_emphasis(text: &str) -> f64 {
        let exclamations = text.matches('!').count().min(4) as f64 * 0.292;
        let questions = text.matches('?').count();
        let question_amp = match questions {
            0 | 1 => 0.0,
            2 | 3 => questions as f64 * 0.18,
            _ => 0.96,
        };
        exclamations + question_amp
    }

    fn normalize(score: f64) -> f64 {
        (score / (score * score + ALPHA).sqrt()).clamp(-1.0, 1.0)
    }

    fn round_to(value: f64, places: i32) -> f64 {
        let factor = 10f64.powi(places);
        (value * factor).round() / factor
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentScorer for VaderScorer {
    fn name(&self) -> &str {
        "vader"
    }

    fn polarity_scores(&self, text: &str) -> SentimentScores {
        let words = Self::tokenize(text);
        if words.is_empty() {
            return SentimentScores::default();
        }

        let lowered: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
        let caps = words.iter().filter(|w| Self::is_all_caps(w)).count();
        let is_cap_diff = caps > 0 && caps < words.len();

        let mut sentiments: Vec<f64> = (0..words.len())
            .map(|i| self.word_valence(&words, &lowered, i, is_cap_diff))
            .collect();

        // "but" 之前减弱、之后加强
        if let Some(but_index) = lowered.iter().position(|w| w == "but") {
            for (i, s) in sentiments.iter_mut().enumerate() {
                if i < but_index {
                    *s *= 0.5;
                } else if i > but_index {
                    *s *= 1.5;
                }
            }
        }

        let emphasis = Self::punctuation_emphasis(text);

        let mut sum: f64 = sentiments.iter().sum();
        if sum > 0.0 {
            sum += emphasis;
        } else if sum < 0.0 {
            sum -= emphasis;
        }
        let compound = Self::normalize(sum);

        let mut pos_sum: f64 = sentiments.iter().filter(|&&s| s > 0.0).map(|s| s + 1.0).sum();
        let mut neg_sum: f64 = sentiments.iter().filter(|&&s| s < 0.0).map(|s| s - 1.0).sum();
        let neu_count = sentiments.iter().filter(|&&s| s == 0.0).count() as f64;

        if pos_sum > neg_sum.abs() {
            pos_sum += emphasis;
        } else if pos_sum < neg_sum.abs() {
            neg_sum -= emphasis;
        }

        let total = pos_sum + neg_sum.abs() + neu_count;
        if total == 0.0 {
            return SentimentScores::default();
        }

        SentimentScores {
            negative: Self::round_to((neg_sum / total).abs(), 3),
            neutral: Self::round_to((neu_count / total).abs(), 3),
            positive: Self::round_to((pos_sum / total).abs(), 3),
            compound: Self::round_to(compound, 4),
        }
    }
}

/// 清洗后帖子的原文打分（VADER 依赖大小写和标点）
pub fn score_post(scorer: &dyn SentimentScorer, post: &CleanedPost) -> SentimentScores {
    scorer.polarity_scores(&post.post.raw_text)
}

/// 计算平均综合分数
pub fn average_compound(scores: &[SentimentScores]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }

    let sum: f64 = scores.iter().map(|s| s.compound).sum();
    sum / scores.len() as f64
}
