//! 地理编码持久缓存

use crate::types::{ETLError, ETLResult};
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, sqlite::SqlitePool, Row};
use std::path::Path;
use std::str::FromStr;

/// 缓存查询结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CachedLookup {
    /// 已解析的坐标
    Hit { latitude: f64, longitude: f64 },
    /// 之前查询过但没有结果
    Miss,
}

/// SQLite 缓存，同时记录命中和未命中
pub struct GeoCacheStore {
    pool: SqlitePool,
}

impl GeoCacheStore {
    /// 打开（或创建）缓存数据库，例如 `sqlite:data/geocode_cache.db`
    pub async fn new(database_url: &str) -> ETLResult<Self> {
        // 确保数据库文件的目录存在
        let file = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        if !file.starts_with(':') {
            if let Some(parent) = Path::new(file).parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| ETLError::Database(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;

        let store = Self { pool };
        store.initialize_schema().await?;

        Ok(store)
    }

    async fn initialize_schema(&self) -> ETLResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS geocode_cache (
                location TEXT PRIMARY KEY,
                latitude REAL,
                longitude REAL,
                resolved_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 查询缓存；None 表示从未查询过
    pub async fn get(&self, location: &str) -> ETLResult<Option<CachedLookup>> {
        let row = sqlx::query("SELECT latitude, longitude FROM geocode_cache WHERE location = ?")
            .bind(location)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| {
            let latitude: Option<f64> = row.get("latitude");
            let longitude: Option<f64> = row.get("longitude");
            match (latitude, longitude) {
                (Some(latitude), Some(longitude)) => CachedLookup::Hit {
                    latitude,
                    longitude,
                },
                _ => CachedLookup::Miss,
            }
        }))
    }

    /// 写入缓存；`coords` 为 None 表示未找到
    pub async fn put(&self, location: &str, coords: Option<(f64, f64)>) -> ETLResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO geocode_cache (location, latitude, longitude, resolved_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(location)
        .bind(coords.map(|c| c.0))
        .bind(coords.map(|c| c.1))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 缓存条目数
    pub async fn count(&self) -> ETLResult<usize> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM geocode_cache")
            .fetch_one(&self.pool)
            .await?;

        Ok(total as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hits_and_misses_persist() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("cache").join("geo.db").display());

        {
            let store = GeoCacheStore::new(&url).await.unwrap();
            assert_eq!(store.get("Denver").await.unwrap(), None);

            store.put("Denver", Some((39.7392, -104.9903))).await.unwrap();
            store.put("Nowhere Town", None).await.unwrap();
            assert_eq!(store.count().await.unwrap(), 2);
        }

        let store = GeoCacheStore::new(&url).await.unwrap();
        assert_eq!(
            store.get("Denver").await.unwrap(),
            Some(CachedLookup::Hit {
                latitude: 39.7392,
                longitude: -104.9903
            })
        );
        assert_eq!(store.get("Nowhere Town").await.unwrap(), Some(CachedLookup::Miss));
    }

    #[tokio::test]
    async fn test_replace_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("geo.db").display());
        let store = GeoCacheStore::new(&url).await.unwrap();

        store.put("Paris", None).await.unwrap();
        store.put("Paris", Some((48.8566, 2.3522))).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert!(matches!(
            store.get("Paris").await.unwrap(),
            Some(CachedLookup::Hit { .. })
        ));
    }
}
