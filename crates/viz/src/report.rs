//! 纯文本分析报告

use crate::error::VizResult;
use chrono::{DateTime, Utc};
use crisis_etl::keywords::top_terms_by_level;
use crisis_etl::stats::{risk_distribution, sentiment_by_level, SentimentSummary, Summary};
use crisis_etl::{top_locations, GeocodedPost, LocationCount, RiskLevel, ScoredPost};
use std::fmt::{self, Write as _};
use std::path::Path;

const TOP_LOCATIONS: usize = 5;
const TOP_TERMS: usize = 10;

/// 危机分析报告
#[derive(Debug, Clone)]
pub struct CrisisReport {
    pub platform: String,
    pub generated_at: DateTime<Utc>,
    pub total_posts: usize,
    pub posts_with_location: usize,
    pub risk_distribution: Vec<(RiskLevel, usize)>,
    pub sentiment: Option<SentimentSummary>,
    pub compound_by_level: Vec<(RiskLevel, Option<Summary>)>,
    pub top_locations: Vec<LocationCount>,
    pub top_terms: Vec<(RiskLevel, Vec<(String, f64)>)>,
}

impl CrisisReport {
    pub fn build(platform: impl Into<String>, posts: &[GeocodedPost]) -> Self {
        let scored: Vec<ScoredPost> = posts.iter().map(|p| p.scored.clone()).collect();

        Self {
            platform: platform.into(),
            generated_at: Utc::now(),
            total_posts: posts.len(),
            posts_with_location: posts.iter().filter(|p| p.geo.is_some()).count(),
            risk_distribution: risk_distribution(&scored),
            sentiment: SentimentSummary::from_posts(&scored),
            compound_by_level: sentiment_by_level(&scored),
            top_locations: top_locations(posts, TOP_LOCATIONS),
            top_terms: top_terms_by_level(&scored, TOP_TERMS),
        }
    }

    pub fn save(&self, path: &Path) -> VizResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_string())?;
        tracing::info!("Report saved to {}", path.display());
        Ok(())
    }
}

fn summary_header() -> String {
    format!(
        "{:<12}{:>7}{:>10}{:>10}{:>10}{:>10}{:>10}{:>10}{:>10}",
        "", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    )
}

fn summary_row(label: &str, s: &Summary) -> String {
    format!(
        "{:<12}{:>7}{:>10.4}{:>10.4}{:>10.4}{:>10.4}{:>10.4}{:>10.4}{:>10.4}",
        label, s.count, s.mean, s.std, s.min, s.p25, s.median, s.p75, s.max
    )
}

impl fmt::Display for CrisisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();

        writeln!(out, "Crisis Analysis Report - {}", self.platform)?;
        writeln!(
            out,
            "Generated on: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(out)?;
        writeln!(out, "Total Posts Analyzed: {}", self.total_posts)?;
        writeln!(out, "Posts with Location Data: {}", self.posts_with_location)?;

        writeln!(out)?;
        writeln!(out, "Risk Level Distribution:")?;
        for (level, count) in &self.risk_distribution {
            writeln!(out, "  {:<10}{:>6}", level.as_str(), count)?;
        }

        writeln!(out)?;
        writeln!(out, "Sentiment Analysis Summary:")?;
        match &self.sentiment {
            Some(s) => {
                writeln!(out, "{}", summary_header())?;
                writeln!(out, "{}", summary_row("negative", &s.negative))?;
                writeln!(out, "{}", summary_row("neutral", &s.neutral))?;
                writeln!(out, "{}", summary_row("positive", &s.positive))?;
                writeln!(out, "{}", summary_row("compound", &s.compound))?;
            }
            None => writeln!(out, "  (no posts)")?,
        }

        writeln!(out)?;
        writeln!(out, "Compound Sentiment by Risk Level:")?;
        writeln!(out, "{}", summary_header())?;
        for (level, summary) in &self.compound_by_level {
            match summary {
                Some(s) => writeln!(out, "{}", summary_row(level.as_str(), s))?,
                None => writeln!(out, "{:<12}{:>7}", level.as_str(), 0)?,
            }
        }

        writeln!(out)?;
        writeln!(out, "Top {} Locations:", TOP_LOCATIONS)?;
        if self.top_locations.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for loc in &self.top_locations {
            writeln!(out, "  {:<30}{:>6}", loc.location, loc.post_count)?;
        }

        writeln!(out)?;
        writeln!(out, "Top Terms by Risk Level (TF-IDF):")?;
        for (level, terms) in &self.top_terms {
            let joined = terms
                .iter()
                .map(|(term, weight)| format!("{} ({:.3})", term, weight))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "  {:<10}{}", level.as_str(), joined)?;
        }

        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::geocoded;

    fn sample() -> Vec<GeocodedPost> {
        vec![
            geocoded("1", RiskLevel::High, Some("Denver"), Some((39.7, -104.9))),
            geocoded("2", RiskLevel::High, Some("Denver"), Some((39.7, -104.9))),
            geocoded("3", RiskLevel::Low, Some("Austin"), None),
            geocoded("4", RiskLevel::Unknown, None, None),
        ]
    }

    #[test]
    fn test_report_counts() {
        let report = CrisisReport::build("Twitter", &sample());

        assert_eq!(report.total_posts, 4);
        assert_eq!(report.posts_with_location, 2);
        assert_eq!(
            report.risk_distribution,
            vec![
                (RiskLevel::High, 2),
                (RiskLevel::Moderate, 0),
                (RiskLevel::Low, 1),
                (RiskLevel::Unknown, 1),
            ]
        );
        assert_eq!(report.top_locations[0].location, "Denver");
        assert_eq!(report.top_locations[0].post_count, 2);
        assert_eq!(report.sentiment.unwrap().compound.count, 4);
        assert!(report.compound_by_level[1].1.is_none());
    }

    #[test]
    fn test_report_text_sections() {
        let text = CrisisReport::build("Reddit", &sample()).to_string();

        assert!(text.starts_with("Crisis Analysis Report - Reddit\n"));
        assert!(text.contains("Total Posts Analyzed: 4"));
        assert!(text.contains("Posts with Location Data: 2"));

        let high = text.find("  high").unwrap();
        let moderate = text.find("  moderate").unwrap();
        assert!(high < moderate);

        assert!(text.contains("Sentiment Analysis Summary:"));
        assert!(text.contains("Top 5 Locations:"));
        assert!(text.contains("Top Terms by Risk Level (TF-IDF):"));
    }

    #[test]
    fn test_empty_report() {
        let text = CrisisReport::build("Twitter", &[]).to_string();

        assert!(text.contains("Total Posts Analyzed: 0"));
        assert!(text.contains("(no posts)"));
        assert!(text.contains("(none)"));
    }

    #[test]
    fn test_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("twitter_report.txt");

        CrisisReport::build("Twitter", &sample()).save(&path).unwrap();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("Crisis Analysis Report - Twitter"));
    }
}
