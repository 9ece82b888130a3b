//! Leaflet 地图
//!
//! 生成独立的 HTML 文件，图层数据以 JSON 嵌入页面。

use crate::error::VizResult;
use crisis_etl::{GeocodedPost, LocationCount, RiskLevel};
use serde::Serialize;
use std::path::Path;

const DEFAULT_CENTER: [f64; 2] = [20.0, 0.0];
const DEFAULT_ZOOM: u8 = 2;
const MARKER_RADIUS: u32 = 5;

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>%TITLE%</title>
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
    <script src="https://unpkg.com/leaflet.heat@0.2.0/dist/leaflet-heat.js"></script>
    <style>
        html, body { height: 100%; margin: 0; font-family: Arial, sans-serif; }
        #map { height: 100%; }
        .top-locations { position: absolute; top: 10px; right: 10px; z-index: 1000; background: white; padding: 10px; border-radius: 4px; box-shadow: 0 2px 4px rgba(0,0,0,0.3); }
        .top-locations td, .top-locations th { padding: 2px 8px; text-align: left; }
    </style>
</head>
<body>
    <div id="map"></div>
%TABLE%
    <script>
        var map = L.map('map').setView([%LAT%, %LON%], %ZOOM%);
        L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
            maxZoom: 19,
            attribution: '&copy; OpenStreetMap contributors'
        }).addTo(map);

        var layers = %LAYERS%;
        layers.forEach(function (layer) {
            if (layer.type === 'heat') {
                L.heatLayer(layer.points, { radius: 25 }).addTo(map);
            } else {
                layer.markers.forEach(function (m) {
                    L.circleMarker([m.lat, m.lon], {
                        radius: m.radius,
                        color: m.color,
                        fill: true,
                        fillColor: m.color
                    }).bindPopup(m.popup).addTo(map);
                });
            }
        });
    </script>
</body>
</html>
"#;

#[derive(Debug, Clone, Serialize)]
struct Marker {
    lat: f64,
    lon: f64,
    radius: u32,
    color: &'static str,
    /// 已转义的 HTML
    popup: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Layer {
    Heat { points: Vec<[f64; 3]> },
    Markers { markers: Vec<Marker> },
}

/// 风险等级对应的标记颜色
pub fn risk_color(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => "red",
        RiskLevel::Moderate => "orange",
        RiskLevel::Low => "green",
        RiskLevel::Unknown => "gray",
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 按风险等级给热力点加权
pub fn risk_weight(post: &GeocodedPost) -> f64 {
    match post.scored.risk_level {
        RiskLevel::High => 1.0,
        RiskLevel::Moderate => 0.75,
        RiskLevel::Low => 0.5,
        RiskLevel::Unknown => 0.25,
    }
}

/// 单遍替换 `%KEY%` 占位符，替换进来的文本不会再被展开
fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// 可安全放入 `<script>` 的 JSON
fn embed_json<T: Serialize>(value: &T) -> VizResult<String> {
    Ok(serde_json::to_string(value)?
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

/// 危机地图
#[derive(Debug, Clone)]
pub struct CrisisMap {
    title: String,
    center: [f64; 2],
    zoom: u8,
    layers: Vec<Layer>,
    table: Option<String>,
}

impl CrisisMap {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            layers: Vec::new(),
            table: None,
        }
    }

    pub fn with_center(mut self, latitude: f64, longitude: f64, zoom: u8) -> Self {
        self.center = [latitude, longitude];
        self.zoom = zoom;
        self
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// 热力图：每条有坐标的帖子权重为 1
    pub fn add_heatmap(&mut self, posts: &[GeocodedPost]) -> &mut Self {
        self.add_weighted_heatmap(posts, |_| 1.0)
    }

    /// 加权热力图；非有限或负的权重按 0 处理
    pub fn add_weighted_heatmap<F>(&mut self, posts: &[GeocodedPost], weight: F) -> &mut Self
    where
        F: Fn(&GeocodedPost) -> f64,
    {
        let points: Vec<[f64; 3]> = posts
            .iter()
            .filter_map(|p| {
                p.geo.as_ref().map(|g| {
                    let w = weight(p);
                    let w = if w.is_finite() { w.max(0.0) } else { 0.0 };
                    [g.latitude, g.longitude, w]
                })
            })
            .collect();

        if points.is_empty() {
            tracing::warn!("No valid coordinates found for heatmap");
        } else {
            self.layers.push(Layer::Heat { points });
        }
        self
    }

    /// 按风险等级着色的圆点
    pub fn add_risk_layer(&mut self, posts: &[GeocodedPost]) -> &mut Self {
        let markers: Vec<Marker> = posts
            .iter()
            .filter_map(|p| {
                p.geo.as_ref().map(|g| Marker {
                    lat: g.latitude,
                    lon: g.longitude,
                    radius: MARKER_RADIUS,
                    color: risk_color(p.scored.risk_level),
                    popup: format!("Risk Level: {}", p.scored.risk_level),
                })
            })
            .collect();

        if !markers.is_empty() {
            self.layers.push(Layer::Markers { markers });
        }
        self
    }

    /// 前 n 个位置：蓝色圆点 + 表格；没有坐标的位置只出现在表格中
    pub fn add_top_locations(&mut self, locations: &[LocationCount]) -> &mut Self {
        let markers: Vec<Marker> = locations
            .iter()
            .filter_map(|loc| match (loc.latitude, loc.longitude) {
                (Some(lat), Some(lon)) => Some(Marker {
                    lat,
                    lon,
                    radius: MARKER_RADIUS,
                    color: "blue",
                    popup: format!("{}<br>Posts: {}", escape_html(&loc.location), loc.post_count),
                }),
                _ => None,
            })
            .collect();

        if !markers.is_empty() {
            self.layers.push(Layer::Markers { markers });
        }

        let rows: String = locations
            .iter()
            .map(|loc| {
                format!(
                    "            <tr><td>{}</td><td>{}</td></tr>\n",
                    escape_html(&loc.location),
                    loc.post_count
                )
            })
            .collect();

        self.table = Some(format!(
            "    <div class=\"top-locations\">\n        <h4>Top Locations</h4>\n        <table>\n            <tr><th>Location</th><th>Posts</th></tr>\n{}        </table>\n    </div>",
            rows
        ));
        self
    }

    pub fn render(&self) -> VizResult<String> {
        let values = [
            ("%TITLE%", escape_html(&self.title)),
            ("%TABLE%", self.table.clone().unwrap_or_default()),
            ("%LAT%", self.center[0].to_string()),
            ("%LON%", self.center[1].to_string()),
            ("%ZOOM%", self.zoom.to_string()),
            ("%LAYERS%", embed_json(&self.layers)?),
        ];

        Ok(fill_template(TEMPLATE, &values))
    }

    /// 保存为独立 HTML 文件
    pub fn save(&self, path: &Path) -> VizResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render()?)?;
        tracing::info!("Map saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::geocoded;

    #[test]
    fn test_default_view_and_empty_layers() {
        let html = CrisisMap::new("Twitter heatmap").render().unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("setView([20, 0], 2)"));
        assert!(html.contains("var layers = [];"));
        assert!(html.contains("<title>Twitter heatmap</title>"));
    }

    #[test]
    fn test_heatmap_skips_posts_without_coordinates() {
        let posts = vec![
            geocoded("1", RiskLevel::High, None, None),
            geocoded("2", RiskLevel::Low, Some("Denver"), Some((39.7, -104.9))),
        ];

        let mut map = CrisisMap::new("heat");
        map.add_heatmap(&posts);
        let html = map.render().unwrap();

        assert_eq!(map.layer_count(), 1);
        assert!(html.contains(r#"{"type":"heat","points":[[39.7,-104.9,1.0]]}"#));

        let mut empty = CrisisMap::new("heat");
        empty.add_heatmap(&posts[..1]);
        assert_eq!(empty.layer_count(), 0);
    }

    #[test]
    fn test_weighted_heatmap() {
        let posts = vec![
            geocoded("1", RiskLevel::High, Some("A"), Some((1.0, 2.0))),
            geocoded("2", RiskLevel::Low, Some("B"), Some((3.0, 4.0))),
            geocoded("3", RiskLevel::Moderate, None, None),
        ];

        let mut map = CrisisMap::new("weighted");
        map.add_weighted_heatmap(&posts, risk_weight);
        let html = map.render().unwrap();
        assert!(html.contains(r#"{"type":"heat","points":[[1.0,2.0,1.0],[3.0,4.0,0.5]]}"#));

        let mut clamped = CrisisMap::new("clamped");
        clamped.add_weighted_heatmap(&posts, |p| match p.scored.risk_level {
            RiskLevel::High => f64::NAN,
            _ => -2.0,
        });
        let html = clamped.render().unwrap();
        assert!(html.contains(r#""points":[[1.0,2.0,0.0],[3.0,4.0,0.0]]"#));
    }

    #[test]
    fn test_placeholders_in_user_text_are_not_expanded() {
        let locations = vec![LocationCount {
            location: "%LAYERS% town".to_string(),
            post_count: 1,
            latitude: None,
            longitude: None,
        }];

        let mut map = CrisisMap::new("%LAT% 100% %ZOOM%");
        map.add_top_locations(&locations);
        let html = map.render().unwrap();

        assert!(html.contains("<title>%LAT% 100% %ZOOM%</title>"));
        assert!(html.contains("<td>%LAYERS% town</td>"));
        assert!(html.contains("height: 100%;"));
        assert!(html.contains("var layers = [];"));
    }

    #[test]
    fn test_risk_colors() {
        let posts = vec![
            geocoded("1", RiskLevel::High, Some("A"), Some((1.0, 1.0))),
            geocoded("2", RiskLevel::Unknown, Some("B"), Some((2.0, 2.0))),
        ];

        let mut map = CrisisMap::new("risk");
        map.add_risk_layer(&posts);
        let html = map.render().unwrap();

        assert!(html.contains(r#""color":"red","popup":"Risk Level: high""#));
        assert!(html.contains(r#""color":"gray","popup":"Risk Level: unknown""#));
        assert_eq!(risk_color(RiskLevel::Moderate), "orange");
    }

    #[test]
    fn test_top_locations_are_escaped() {
        let locations = vec![
            LocationCount {
                location: "<script>alert('x')</script>".to_string(),
                post_count: 3,
                latitude: Some(10.0),
                longitude: Some(20.0),
            },
            LocationCount {
                location: "Springfield Town".to_string(),
                post_count: 1,
                latitude: None,
                longitude: None,
            },
        ];

        let mut map = CrisisMap::new("top");
        map.add_top_locations(&locations);
        let html = map.render().unwrap();

        assert!(!html.contains("<script>alert"));
        assert!(html.contains("<td>&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;</td><td>3</td>"));
        assert!(html.contains("<td>Springfield Town</td><td>1</td>"));
        assert!(html.contains(r#""color":"blue""#));
        // 弹窗中的 <br> 在 JSON 中被转义
        assert!(html.contains("\\u003cbr\\u003ePosts: 3"));
    }

    #[test]
    fn test_save_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maps").join("twitter_heatmap.html");

        CrisisMap::new("saved").save(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("leaflet"));
    }
}
