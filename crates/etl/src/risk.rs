//! 风险等级规则
//!
//! 规则按 high → moderate → low 顺序匹配清洗后的文本，第一条命中的规则决定
//! 等级；全部未命中为 unknown。关键词以清洗后的形式书写。

use crate::types::{ETLError, ETLResult, RiskLevel};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

/// 默认高风险关键词
const HIGH_RISK_KEYWORDS: &[&str] = &[
    "suicid*",
    "want die",
    "dont want live",
    "dont want alive",
    "end life",
    "better dead",
    "no reason live",
    "hopeless",
    "worthless",
    "self harm",
    "selfharm",
    "overdose",
    "kms",
    "want kill",
    "going kill",
    "gonna kill",
    "want end",
    "no way",
    "cant go",
    "ready give",
    "want give",
];

/// 默认高风险正则：清洗后只剩单个词的整句（"I give up." → "give ."）
const HIGH_RISK_PATTERNS: &[&str] = &[r"^\s*(give|end)\W*$"];

/// 默认中风险关键词
const MODERATE_RISK_KEYWORDS: &[&str] = &[
    "need help",
    "struggling",
    "overwhelmed",
    "cant cope",
    "depressed",
    "depression",
    "anxious",
    "anxiety",
    "panic attack*",
    "lonely",
    "alone",
    "scared",
    "worried",
    "lost",
];

/// 默认低风险关键词
const LOW_RISK_KEYWORDS: &[&str] = &[
    "therapy",
    "therapist",
    "counseling",
    "counselor",
    "mental health",
    "self care",
    "selfcare",
    "coping",
    "support",
    "feeling better",
    "recovery",
    "meditation",
];

/// 单条规则
#[derive(Debug, Clone)]
pub struct RiskRule {
    pub level: RiskLevel,
    /// 原始关键词或正则（用于输出）
    pub label: String,
    pattern: Regex,
}

impl RiskRule {
    /// 关键词规则：词边界匹配，词之间允许任意空白，`*` 结尾表示词根
    pub fn keyword(level: RiskLevel, keyword: &str) -> ETLResult<Self> {
        let tokens: Vec<String> = keyword
            .split_whitespace()
            .map(|token| match token.strip_suffix('*') {
                Some(stem) => format!(r"{}\w*", regex::escape(stem)),
                None => regex::escape(token),
            })
            .collect();

        if tokens.is_empty() {
            return Err(ETLError::Rule("关键词为空".to_string()));
        }

        let pattern = format!(r"(?i)\b{}\b", tokens.join(r"\s+"));
        Ok(Self {
            level,
            label: keyword.to_string(),
            pattern: Regex::new(&pattern).map_err(|e| ETLError::Rule(e.to_string()))?,
        })
    }

    /// 正则规则
    pub fn pattern(level: RiskLevel, pattern: &str) -> ETLResult<Self> {
        let regex = Regex::new(&format!("(?i){}", pattern))
            .map_err(|e| ETLError::Rule(format!("{}: {}", pattern, e)))?;

        Ok(Self {
            level,
            label: pattern.to_string(),
            pattern: regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// 规则文件中的一项
#[derive(Debug, Deserialize)]
struct RuleSpec {
    level: RiskLevel,
    keyword: Option<String>,
    pattern: Option<String>,
}

/// 风险分类器
#[derive(Debug, Clone)]
pub struct RiskClassifier {
    rules: Vec<RiskRule>,
}

impl RiskClassifier {
    /// 使用默认规则
    pub fn new() -> Self {
        let groups = [
            (RiskLevel::High, HIGH_RISK_KEYWORDS),
            (RiskLevel::Moderate, MODERATE_RISK_KEYWORDS),
            (RiskLevel::Low, LOW_RISK_KEYWORDS),
        ];

        let mut rules = groups
            .iter()
            .flat_map(|(level, keywords)| {
                keywords
                    .iter()
                    .filter_map(move |kw| RiskRule::keyword(*level, kw).ok())
            })
            .chain(
                HIGH_RISK_PATTERNS
                    .iter()
                    .filter_map(|p| RiskRule::pattern(RiskLevel::High, p).ok()),
            )
            .collect::<Vec<_>>();

        rules.sort_by_key(|r| r.level);
        Self { rules }
    }

    /// 自定义规则；会按等级稳定排序，保证 high 先于 moderate 先于 low
    pub fn with_rules(mut rules: Vec<RiskRule>) -> ETLResult<Self> {
        if rules.iter().any(|r| r.level == RiskLevel::Unknown) {
            return Err(ETLError::Rule("unknown 不能作为规则等级".to_string()));
        }

        rules.sort_by_key(|r| r.level);
        Ok(Self { rules })
    }

    /// 从 JSON 规则文件加载
    ///
    /// 格式：`[{"level": "high", "keyword": "want die"}, {"level": "low", "pattern": "..."}]`
    pub fn from_json_file(path: &Path) -> ETLResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ETLResult<Self> {
        let specs: Vec<RuleSpec> = serde_json::from_str(content)?;

        let rules = specs
            .into_iter()
            .map(|spec| match (spec.keyword, spec.pattern) {
                (Some(keyword), None) => RiskRule::keyword(spec.level, &keyword),
                (None, Some(pattern)) => RiskRule::pattern(spec.level, &pattern),
                _ => Err(ETLError::Rule(
                    "每条规则必须且只能包含 keyword 或 pattern".to_string(),
                )),
            })
            .collect::<ETLResult<Vec<_>>>()?;

        tracing::info!("Loaded {} risk rules", rules.len());
        Self::with_rules(rules)
    }

    pub fn rules(&self) -> &[RiskRule] {
        &self.rules
    }

    /// 第一条命中的规则
    pub fn first_match(&self, cleaned_text: &str) -> Option<&RiskRule> {
        self.rules.iter().find(|rule| rule.is_match(cleaned_text))
    }

    /// 判定风险等级
    pub fn classify(&self, cleaned_text: &str) -> RiskLevel {
        self.first_match(cleaned_text)
            .map(|rule| rule.level)
            .unwrap_or(RiskLevel::Unknown)
    }
}

impl Default for RiskClassifier {
    fn default() -> Self {
        Self::new()
    }
}
