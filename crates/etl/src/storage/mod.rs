//! 数据存储：阶段 CSV 文件与地理编码缓存

pub mod csv;
pub mod geo_cache;

pub use geo_cache::{CachedLookup, GeoCacheStore};

use crate::types::{ETLConfig, Platform};
use std::path::PathBuf;

/// 一次运行中各阶段文件的位置
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetPaths {
    pub raw: PathBuf,
    pub cleaned: PathBuf,
    pub analyzed: PathBuf,
    pub geocoded: PathBuf,
}

impl DatasetPaths {
    /// `data/raw/<dataset>.csv` 与 `data/processed/{cleaned,analyzed,geocoded}_<dataset>.csv`
    pub fn new(config: &ETLConfig, dataset: &str) -> Self {
        let processed = config.processed_dir();
        Self {
            raw: config.raw_dir().join(format!("{}.csv", dataset)),
            cleaned: processed.join(format!("cleaned_{}.csv", dataset)),
            analyzed: processed.join(format!("analyzed_{}.csv", dataset)),
            geocoded: processed.join(format!("geocoded_{}.csv", dataset)),
        }
    }

    pub fn for_platform(config: &ETLConfig, platform: Platform) -> Self {
        Self::new(config, platform.dataset_name())
    }
}
