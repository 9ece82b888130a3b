//! TF-IDF 关键词提取
//!
//! 在清洗后的文本上计算 TF-IDF，按风险等级汇总出权重最高的词，用于报告。

use crate::types::{RiskLevel, ScoredPost};
use std::collections::HashMap;

/// TF-IDF 向量化器
#[derive(Debug, Clone, Default)]
pub struct TfIdf {
    /// 词 -> 逆文档频率
    idf: HashMap<String, f64>,
    n_documents: usize,
}

impl TfIdf {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只保留字母词，忽略标点
    fn terms(text: &str) -> impl Iterator<Item = &str> {
        text.split_whitespace()
            .filter(|t| t.chars().all(|c| c.is_alphabetic()))
    }

    /// 在语料上拟合（平滑 idf：ln((1+n)/(1+df)) + 1）
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) {
        let mut document_frequency: HashMap<&str, usize> = HashMap::new();

        for doc in documents {
            let mut seen: Vec<&str> = Self::terms(doc.as_ref()).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let n = documents.len() as f64;
        self.n_documents = documents.len();
        self.idf = document_frequency
            .into_iter()
            .map(|(term, df)| {
                let idf = ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0;
                (term.to_string(), idf)
            })
            .collect();
    }

    pub fn n_documents(&self) -> usize {
        self.n_documents
    }

    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    /// 单个文档的 L2 归一化 TF-IDF 权重
    pub fn transform(&self, document: &str) -> HashMap<String, f64> {
        let mut counts: HashMap<&str, f64> = HashMap::new();
        for term in Self::terms(document) {
            *counts.entry(term).or_insert(0.0) += 1.0;
        }

        let mut weights: HashMap<String, f64> = counts
            .into_iter()
            .filter_map(|(term, tf)| self.idf.get(term).map(|idf| (term.to_string(), tf * idf)))
            .collect();

        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for w in weights.values_mut() {
                *w /= norm;
            }
        }

        weights
    }

    /// 多个文档的权重求和后取前 n 个词（同分按字母序）
    pub fn top_terms<S: AsRef<str>>(&self, documents: &[S], n: usize) -> Vec<(String, f64)> {
        let mut totals: HashMap<String, f64> = HashMap::new();
        for doc in documents {
            for (term, weight) in self.transform(doc.as_ref()) {
                *totals.entry(term).or_insert(0.0) += weight;
            }
        }

        let mut ranked: Vec<(String, f64)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// 每个风险等级的高权重词
pub fn top_terms_by_level(posts: &[ScoredPost], n: usize) -> Vec<(RiskLevel, Vec<(String, f64)>)> {
    let corpus: Vec<&str> = posts
        .iter()
        .map(|p| p.cleaned.cleaned_text.as_str())
        .collect();

    let mut tfidf = TfIdf::new();
    tfidf.fit(&corpus);

    RiskLevel::ALL
        .iter()
        .map(|level| {
            let docs: Vec<&str> = posts
                .iter()
                .filter(|p| p.risk_level == *level)
                .map(|p| p.cleaned.cleaned_text.as_str())
                .collect();
            (*level, tfidf.top_terms(&docs, n))
        })
        .collect()
}
