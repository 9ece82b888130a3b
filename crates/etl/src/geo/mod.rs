//! 位置提取与地理编码

pub mod extract;
pub mod nominatim;

pub use extract::LocationExtractor;
pub use nominatim::NominatimGeocoder;

use crate::storage::{CachedLookup, GeoCacheStore};
use crate::types::{ETLResult, GeoPoint, GeocodedPost, LocationCount, ScoredPost};
use async_trait::async_trait;
use std::collections::HashMap;

/// 地理编码服务接口
#[async_trait]
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &str;

    /// 返回 (纬度, 经度)；找不到时为 None
    async fn geocode(&self, location: &str) -> ETLResult<Option<(f64, f64)>>;
}

/// 带缓存的位置解析器
///
/// 内存缓存之外可选 SQLite 持久缓存，两者都记录未命中，同一地名只请求一次。
/// 请求失败不写缓存，帖子保持没有坐标。
pub struct LocationResolver {
    geocoder: Box<dyn Geocoder>,
    extractor: LocationExtractor,
    memory: HashMap<String, Option<(f64, f64)>>,
    store: Option<GeoCacheStore>,
}

impl LocationResolver {
    pub fn new(geocoder: Box<dyn Geocoder>) -> Self {
        Self {
            geocoder,
            extractor: LocationExtractor::new(),
            memory: HashMap::new(),
            store: None,
        }
    }

    pub fn with_store(mut self, store: GeoCacheStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cached_locations(&self) -> usize {
        self.memory.len()
    }

    async fn lookup_store(&self, location: &str) -> Option<Option<(f64, f64)>> {
        let store = self.store.as_ref()?;
        match store.get(location).await {
            Ok(Some(CachedLookup::Hit {
                latitude,
                longitude,
            })) => Some(Some((latitude, longitude))),
            Ok(Some(CachedLookup::Miss)) => Some(None),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Geocode cache read failed for {}: {}", location, e);
                None
            }
        }
    }

    /// 解析地名到坐标
    pub async fn resolve(&mut self, location: &str) -> Option<(f64, f64)> {
        let key = location.trim();
        if key.is_empty() {
            return None;
        }

        if let Some(cached) = self.memory.get(key) {
            return *cached;
        }

        if let Some(cached) = self.lookup_store(key).await {
            self.memory.insert(key.to_string(), cached);
            return cached;
        }

        let coords = match self.geocoder.geocode(key).await {
            Ok(Some((lat, lon))) if GeoPoint::is_valid(lat, lon) => Some((lat, lon)),
            Ok(Some((lat, lon))) => {
                tracing::warn!("Discarding out-of-range coordinates for {}: ({}, {})", key, lat, lon);
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Error geocoding location {}: {}", key, e);
                return None;
            }
        };

        self.memory.insert(key.to_string(), coords);
        if let Some(store) = &self.store {
            if let Err(e) = store.put(key, coords).await {
                tracing::warn!("Geocode cache write failed for {}: {}", key, e);
            }
        }

        coords
    }

    /// 为单条帖子提取位置并解析坐标
    pub async fn geocode_post(&mut self, scored: ScoredPost) -> GeocodedPost {
        let Some(location) = self.extractor.extract(scored.post()) else {
            return GeocodedPost::without_location(scored);
        };

        let geo = self
            .resolve(&location)
            .await
            .map(|(latitude, longitude)| GeoPoint {
                post_id: scored.post().id.clone(),
                latitude,
                longitude,
            });

        GeocodedPost {
            scored,
            extracted_location: Some(location),
            geo,
        }
    }

    /// 顺序处理，输出与输入一一对应
    pub async fn geocode_batch(&mut self, posts: Vec<ScoredPost>) -> Vec<GeocodedPost> {
        tracing::info!(
            "Geocoding {} posts with {}",
            posts.len(),
            self.geocoder.name()
        );

        let mut geocoded = Vec::with_capacity(posts.len());
        for post in posts {
            geocoded.push(self.geocode_post(post).await);
        }

        let located = geocoded.iter().filter(|p| p.geo.is_some()).count();
        tracing::info!("Resolved coordinates for {} of {} posts", located, geocoded.len());
        geocoded
    }
}

/// 按提取位置计数的前 n 名（同数按名称排序），附第一次解析到的坐标
pub fn top_locations(posts: &[GeocodedPost], n: usize) -> Vec<LocationCount> {
    let mut counts: HashMap<&str, LocationCount> = HashMap::new();

    for post in posts {
        let Some(location) = post.extracted_location.as_deref() else {
            continue;
        };

        let entry = counts.entry(location).or_insert_with(|| LocationCount {
            location: location.to_string(),
            post_count: 0,
            latitude: None,
            longitude: None,
        });
        entry.post_count += 1;

        if entry.latitude.is_none() {
            if let Some(point) = &post.geo {
                entry.latitude = Some(point.latitude);
                entry.longitude = Some(point.longitude);
            }
        }
    }

    let mut ranked: Vec<LocationCount> = counts.into_values().collect();
    ranked.sort_by(|a, b| {
        b.post_count
            .cmp(&a.post_count)
            .then_with(|| a.location.cmp(&b.location))
    });
    ranked.truncate(n);
    ranked
}
