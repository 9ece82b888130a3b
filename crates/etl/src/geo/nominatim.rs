//! OpenStreetMap Nominatim 地理编码

use super::Geocoder;
use crate::extract::{create_http_client, RequestPacer};
use crate::types::{ETLConfig, ETLError, ETLResult};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    /// 公共服务要求每秒最多 1 次请求
    pacer: RequestPacer,
}

impl NominatimGeocoder {
    pub fn new(config: &ETLConfig) -> ETLResult<Self> {
        Ok(Self {
            client: create_http_client(&config.geocoder_user_agent, config.request_timeout_secs)?,
            base_url: config.nominatim_url.trim_end_matches('/').to_string(),
            pacer: RequestPacer::per_second(1)?,
        })
    }
}

/// 取第一条结果的坐标
fn parse_results(results: &[SearchResult]) -> ETLResult<Option<(f64, f64)>> {
    let Some(first) = results.first() else {
        return Ok(None);
    };

    let latitude = first
        .lat
        .parse::<f64>()
        .map_err(|e| ETLError::Geocoding(format!("无效纬度 {}: {}", first.lat, e)))?;
    let longitude = first
        .lon
        .parse::<f64>()
        .map_err(|e| ETLError::Geocoding(format!("无效经度 {}: {}", first.lon, e)))?;

    Ok(Some((latitude, longitude)))
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn geocode(&self, location: &str) -> ETLResult<Option<(f64, f64)>> {
        self.pacer.wait().await;

        let url = format!("{}/search", self.base_url);
        let results: Vec<SearchResult> = self
            .client
            .get(&url)
            .query(&[("q", location), ("format", "json"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_results(&results)
    }
}
