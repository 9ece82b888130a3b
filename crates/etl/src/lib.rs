//! # Crisis ETL - Extract, Transform, Load
//!
//! 用于社交媒体危机信号的 ETL 管道
//!
//! ## 功能
//!
//! - 从 Twitter / Reddit / CSV 抽取帖子
//! - 文本清洗（表情、链接、停用词）
//! - 情感打分与风险等级分类
//! - 位置提取与地理编码（带缓存）
//! - TF-IDF 关键词与描述统计

pub mod types;
pub mod extract;
pub mod cleaning;
pub mod sentiment;
pub mod risk;
pub mod tagger;
pub mod keywords;
pub mod stats;
pub mod geo;
pub mod storage;
pub mod pipeline;

pub use cleaning::TextCleaner;
pub use extract::{CsvSource, PostSource, RedditSource, TwitterSource};
pub use geo::{top_locations, Geocoder, LocationExtractor, LocationResolver, NominatimGeocoder};
pub use pipeline::{CrisisPipeline, CrisisPipelineBuilder};
pub use risk::{RiskClassifier, RiskRule};
pub use sentiment::{SentimentScorer, VaderScorer};
pub use storage::DatasetPaths;
pub use tagger::Tagger;
pub use types::{
    CleanedPost, ETLConfig, ETLError, ETLResult, EngagementMetrics, GeoPoint, GeocodedPost,
    LocationCount, Platform, Post, RiskLevel, ScoredPost, SentimentScores,
};
