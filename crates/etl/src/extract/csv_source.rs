//! 从 CSV 文件导入帖子

use super::{dedup_posts, PostSource};
use crate::storage::csv::read_raw;
use crate::types::{ETLResult, Platform, Post};
use async_trait::async_trait;
use std::path::PathBuf;

pub struct CsvSource {
    path: PathBuf,
    /// 文件中没有 platform 列时使用
    platform: Platform,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            platform: Platform::File,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}

#[async_trait]
impl PostSource for CsvSource {
    fn platform(&self) -> Platform {
        self.platform
    }

    /// 文件即一个查询，`limit_per_query` 为 0 表示不限制
    async fn fetch_posts(&self, limit_per_query: usize) -> ETLResult<Vec<Post>> {
        let mut posts = dedup_posts(read_raw(&self.path, self.platform)?);
        if limit_per_query > 0 {
            posts.truncate(limit_per_query);
        }

        tracing::info!("Read {} posts from {}", posts.len(), self.path.display());
        Ok(posts)
    }
}
