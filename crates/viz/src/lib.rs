//! # Crisis Viz
//!
//! 地理编码后帖子的可视化：Leaflet 地图（热力图、风险等级、热门位置）与纯文本报告。

pub mod error;
pub mod map;
pub mod report;

pub use error::{VizError, VizResult};
pub use map::{escape_html, risk_color, risk_weight, CrisisMap};
pub use report::CrisisReport;

use crisis_etl::{top_locations, GeocodedPost};
use std::path::{Path, PathBuf};

/// 地图上展示的热门位置数量
pub const TOP_LOCATIONS_ON_MAP: usize = 5;

/// 一次渲染生成的文件
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedOutputs {
    pub heatmap: PathBuf,
    pub risk_map: PathBuf,
    pub top_locations: PathBuf,
    pub report: PathBuf,
}

/// 写出 `<prefix>_heatmap.html`、`<prefix>_risk_map.html`、`<prefix>_top_locations.html`
/// 和 `<prefix>_report.txt`
pub fn render_outputs(
    platform: &str,
    posts: &[GeocodedPost],
    maps_dir: &Path,
    reports_dir: &Path,
) -> VizResult<RenderedOutputs> {
    let prefix = platform.to_lowercase();
    let outputs = RenderedOutputs {
        heatmap: maps_dir.join(format!("{}_heatmap.html", prefix)),
        risk_map: maps_dir.join(format!("{}_risk_map.html", prefix)),
        top_locations: maps_dir.join(format!("{}_top_locations.html", prefix)),
        report: reports_dir.join(format!("{}_report.txt", prefix)),
    };

    tracing::info!("Creating visualizations for {} posts", posts.len());

    CrisisMap::new(format!("{} crisis heatmap", platform))
        .add_heatmap(posts)
        .save(&outputs.heatmap)?;

    CrisisMap::new(format!("{} risk levels", platform))
        .add_risk_layer(posts)
        .save(&outputs.risk_map)?;

    CrisisMap::new(format!("{} top locations", platform))
        .add_top_locations(&top_locations(posts, TOP_LOCATIONS_ON_MAP))
        .save(&outputs.top_locations)?;

    CrisisReport::build(platform, posts).save(&outputs.report)?;

    Ok(outputs)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::geocoded;
    use crisis_etl::RiskLevel;

    #[test]
    fn test_render_outputs_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let posts = vec![
            geocoded("1", RiskLevel::High, Some("Denver"), Some((39.7, -104.9))),
            geocoded("2", RiskLevel::Low, None, None),
        ];

        let outputs = render_outputs(
            "Twitter",
            &posts,
            &dir.path().join("maps"),
            &dir.path().join("reports"),
        )
        .unwrap();

        assert!(outputs.heatmap.ends_with("twitter_heatmap.html"));
        assert!(outputs.risk_map.ends_with("twitter_risk_map.html"));
        assert!(outputs.top_locations.ends_with("twitter_top_locations.html"));
        assert!(outputs.report.ends_with("twitter_report.txt"));

        for path in [
            &outputs.heatmap,
            &outputs.risk_map,
            &outputs.top_locations,
            &outputs.report,
        ] {
            assert!(path.is_file(), "missing {}", path.display());
        }
    }
}
