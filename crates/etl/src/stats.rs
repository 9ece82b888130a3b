//! 描述性统计

use crate::types::{RiskLevel, ScoredPost};
use serde::Serialize;

/// 一组数值的描述统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// 样本标准差（n - 1），少于 2 个值时为 NaN
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

impl Summary {
    /// 忽略 NaN；没有有效值时返回 None
    pub fn describe(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        } else {
            f64::NAN
        };

        Some(Self {
            count,
            mean,
            std,
            min: sorted[0],
            p25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            p75: quantile(&sorted, 0.75),
            max: sorted[count - 1],
        })
    }
}

/// 线性插值分位数，`sorted` 必须非空且已排序
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// 各风险等级的帖子数，顺序固定为 high, moderate, low, unknown
pub fn risk_distribution(posts: &[ScoredPost]) -> Vec<(RiskLevel, usize)> {
    RiskLevel::ALL
        .iter()
        .map(|level| {
            let n = posts.iter().filter(|p| p.risk_level == *level).count();
            (*level, n)
        })
        .collect()
}

/// 各风险等级的 compound 统计；没有帖子的等级为 None
pub fn sentiment_by_level(posts: &[ScoredPost]) -> Vec<(RiskLevel, Option<Summary>)> {
    RiskLevel::ALL
        .iter()
        .map(|level| {
            let compounds: Vec<f64> = posts
                .iter()
                .filter(|p| p.risk_level == *level)
                .map(|p| p.sentiment.compound)
                .collect();
            (*level, Summary::describe(&compounds))
        })
        .collect()
}

/// 整体情感统计（neg, neu, pos, compound）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentSummary {
    pub negative: Summary,
    pub neutral: Summary,
    pub positive: Summary,
    pub compound: Summary,
}

impl SentimentSummary {
    pub fn from_posts(posts: &[ScoredPost]) -> Option<Self> {
        let column = |f: fn(&ScoredPost) -> f64| -> Vec<f64> { posts.iter().map(f).collect() };

        Some(Self {
            negative: Summary::describe(&column(|p| p.sentiment.negative))?,
            neutral: Summary::describe(&column(|p| p.sentiment.neutral))?,
            positive: Summary::describe(&column(|p| p.sentiment.positive))?,
            compound: Summary::describe(&column(|p| p.sentiment.compound))?,
        })
    }
}
