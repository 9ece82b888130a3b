//! ETL 管道
//!
//! Extract → Clean → Analyze（情感 + 风险）→ Geocode，顺序执行，每个阶段写出 CSV。

use crate::cleaning::TextCleaner;
use crate::extract::{create_source, dedup_posts, PostSource};
use crate::geo::{Geocoder, LocationResolver, NominatimGeocoder};
use crate::risk::RiskClassifier;
use crate::sentiment::{SentimentScorer, VaderScorer};
use crate::storage::{csv, DatasetPaths, GeoCacheStore};
use crate::tagger::Tagger;
use crate::types::{
    CleanedPost, ETLConfig, ETLResult, GeocodedPost, Platform, Post, ScoredPost,
};
use std::path::PathBuf;

/// 危机帖子处理管道
pub struct CrisisPipeline {
    config: ETLConfig,
    sources: Vec<Box<dyn PostSource>>,
    cleaner: TextCleaner,
    tagger: Tagger,
    resolver: Option<LocationResolver>,
}

impl CrisisPipeline {
    /// 按配置创建管道（不含数据源）
    pub async fn new(config: ETLConfig) -> ETLResult<Self> {
        CrisisPipelineBuilder::new().with_config(config).build().await
    }

    pub fn config(&self) -> &ETLConfig {
        &self.config
    }

    pub fn add_source(&mut self, source: Box<dyn PostSource>) {
        self.sources.push(source);
    }

    pub fn geocoding_enabled(&self) -> bool {
        self.resolver.is_some()
    }

    /// 抽取：依次抓取各数据源，失败的数据源记录后跳过
    pub async fn extract(&self, limit_per_query: usize) -> ETLResult<Vec<Post>> {
        tracing::info!("Extracting posts from {} sources", self.sources.len());

        let mut all_posts = Vec::new();
        for source in &self.sources {
            match source.fetch_posts(limit_per_query).await {
                Ok(posts) => {
                    tracing::info!("Fetched {} posts from {}", posts.len(), source.platform());
                    all_posts.extend(posts);
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch from {}: {}", source.platform(), e);
                }
            }
        }

        let posts = dedup_posts(all_posts);
        tracing::info!("Total extracted: {} posts", posts.len());
        Ok(posts)
    }

    /// 清洗：空文本的帖子被跳过
    pub fn clean(&self, posts: &[Post]) -> Vec<CleanedPost> {
        let cleaned = self.cleaner.clean_batch(posts);
        tracing::info!("Cleaned {} of {} posts", cleaned.len(), posts.len());
        cleaned
    }

    /// 情感打分 + 风险分类
    pub fn analyze(&self, cleaned: &[CleanedPost]) -> Vec<ScoredPost> {
        let scored = self.tagger.tag_batch(cleaned);
        tracing::info!(
            "Tagged {} posts with {} sentiment and {} risk rules",
            scored.len(),
            self.tagger.scorer_name(),
            self.tagger.classifier().rules().len()
        );
        scored
    }

    /// 地理编码；未启用时只包装，不提取位置
    pub async fn geocode(&mut self, scored: Vec<ScoredPost>) -> Vec<GeocodedPost> {
        match self.resolver.as_mut() {
            Some(resolver) => resolver.geocode_batch(scored).await,
            None => {
                tracing::info!("Geocoding disabled, skipping location lookup");
                scored.into_iter().map(GeocodedPost::without_location).collect()
            }
        }
    }

    /// 对已抽取的帖子执行后续阶段，并写出 cleaned / analyzed / geocoded 文件
    pub async fn process(
        &mut self,
        posts: &[Post],
        paths: &DatasetPaths,
    ) -> ETLResult<Vec<GeocodedPost>> {
        let cleaned = self.clean(posts);
        csv::write_cleaned(&paths.cleaned, &cleaned)?;

        let scored = self.analyze(&cleaned);
        csv::write_analyzed(&paths.analyzed, &scored)?;

        let geocoded = self.geocode(scored).await;
        csv::write_geocoded(&paths.geocoded, &geocoded)?;

        Ok(geocoded)
    }

    /// 完整流程：抽取并写出原始文件，然后处理
    ///
    /// 没有抽取到任何帖子时不写文件，返回空结果。
    pub async fn run(&mut self, dataset: &str) -> ETLResult<Vec<GeocodedPost>> {
        tracing::info!("Running crisis pipeline for dataset {}", dataset);

        self.config.ensure_directories()?;
        let paths = DatasetPaths::new(&self.config, dataset);

        let posts = self.extract(self.config.limit_per_query).await?;
        if posts.is_empty() {
            tracing::warn!("No posts were collected for {}", dataset);
            return Ok(Vec::new());
        }
        csv::write_raw(&paths.raw, &posts)?;

        let geocoded = self.process(&posts, &paths).await?;

        tracing::info!("Crisis pipeline completed: {} posts", geocoded.len());
        Ok(geocoded)
    }
}

/// 管道构建器
pub struct CrisisPipelineBuilder {
    config: ETLConfig,
    platforms: Vec<Platform>,
    sources: Vec<Box<dyn PostSource>>,
    scorer: Option<Box<dyn SentimentScorer>>,
    classifier: Option<RiskClassifier>,
    geocoder: Option<Box<dyn Geocoder>>,
}

impl CrisisPipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: ETLConfig::default(),
            platforms: Vec::new(),
            sources: Vec::new(),
            scorer: None,
            classifier: None,
            geocoder: None,
        }
    }

    pub fn with_config(mut self, config: ETLConfig) -> Self {
        self.config = config;
        self
    }

    /// 按平台创建数据源，凭证在 build 时检查
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platforms.push(platform);
        self
    }

    pub fn with_source(mut self, source: Box<dyn PostSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.config.keywords = keywords;
        self
    }

    pub fn with_subreddits(mut self, subreddits: Vec<String>) -> Self {
        self.config.subreddits = subreddits;
        self
    }

    pub fn with_limit(mut self, limit_per_query: usize) -> Self {
        self.config.limit_per_query = limit_per_query;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn with_rules_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.rules_path = Some(path.into());
        self
    }

    pub fn with_scorer(mut self, scorer: Box<dyn SentimentScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_classifier(mut self, classifier: RiskClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// 替换默认的 Nominatim
    pub fn with_geocoder(mut self, geocoder: Box<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_geocode_cache(mut self, url: String) -> Self {
        self.config.geocode_cache_url = Some(url);
        self
    }

    pub fn enable_geocoding(mut self, enable: bool) -> Self {
        self.config.enable_geocoding = enable;
        self
    }

    pub async fn build(self) -> ETLResult<CrisisPipeline> {
        let config = self.config;

        let mut sources = self.sources;
        for platform in self.platforms {
            sources.push(create_source(platform, &config)?);
        }

        let classifier = match (self.classifier, &config.rules_path) {
            (Some(classifier), _) => classifier,
            (None, Some(path)) => RiskClassifier::from_json_file(path)?,
            (None, None) => RiskClassifier::new(),
        };
        let scorer: Box<dyn SentimentScorer> = match self.scorer {
            Some(scorer) => scorer,
            None => Box::new(VaderScorer::new()),
        };

        let resolver = if config.enable_geocoding {
            let geocoder: Box<dyn Geocoder> = match self.geocoder {
                Some(geocoder) => geocoder,
                None => Box::new(NominatimGeocoder::new(&config)?),
            };
            let mut resolver = LocationResolver::new(geocoder);
            if let Some(url) = &config.geocode_cache_url {
                resolver = resolver.with_store(GeoCacheStore::new(url).await?);
            }
            Some(resolver)
        } else {
            None
        };

        Ok(CrisisPipeline {
            config,
            sources,
            cleaner: TextCleaner::new(),
            tagger: Tagger::new(scorer, classifier),
            resolver,
        })
    }
}

impl Default for CrisisPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::CsvSource;
    use crate::types::{ETLError, RiskLevel};
    use async_trait::async_trait;

    struct FixedGeocoder;

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn geocode(&self, location: &str) -> ETLResult<Option<(f64, f64)>> {
            match location {
                "Denver, CO" => Ok(Some((39.7392, -104.9903))),
                _ => Err(ETLError::Geocoding("service unavailable".to_string())),
            }
        }
    }

    struct FailingSource;

    #[async_trait]
    impl PostSource for FailingSource {
        fn platform(&self) -> Platform {
            Platform::Twitter
        }

        async fn fetch_posts(&self, _limit_per_query: usize) -> ETLResult<Vec<Post>> {
            Err(ETLError::RateLimit("429".to_string()))
        }
    }

    const RAW: &str = "id,platform,created_at,text,user_location\n\
        1,reddit,2024-05-01T10:00:00Z,I feel suicidal and alone tonight,\"Denver, CO\"\n\
        2,reddit,2024-05-01T11:00:00Z,Started therapy last week feeling better,\n\
        3,reddit,2024-05-01T12:00:00Z,   ,\n\
        4,reddit,2024-05-01T13:00:00Z,The meeting is on tuesday in Springfield Town,\n";

    async fn pipeline(dir: &std::path::Path) -> CrisisPipeline {
        let input = dir.join("input.csv");
        std::fs::write(&input, RAW).unwrap();

        CrisisPipelineBuilder::new()
            .with_data_dir(dir.join("data"))
            .with_output_dir(dir.join("output"))
            .with_source(Box::new(FailingSource))
            .with_source(Box::new(CsvSource::new(input).with_platform(Platform::Reddit)))
            .with_geocoder(Box::new(FixedGeocoder))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_writes_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(dir.path()).await;

        let geocoded = pipeline.run("reddit_posts").await.unwrap();

        // 空文本的帖子被跳过，其余一一对应
        assert_eq!(geocoded.len(), 3);
        let ids: Vec<_> = geocoded.iter().map(|p| p.post().id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "4"]);

        assert_eq!(geocoded[0].scored.risk_level, RiskLevel::High);
        assert_eq!(geocoded[1].scored.risk_level, RiskLevel::Low);
        assert_eq!(geocoded[2].scored.risk_level, RiskLevel::Unknown);

        assert_eq!(geocoded[0].geo.as_ref().unwrap().latitude, 39.7392);
        // 地理编码失败不影响记录
        assert_eq!(geocoded[2].extracted_location.as_deref(), Some("Springfield Town"));
        assert!(geocoded[2].geo.is_none());

        let paths = DatasetPaths::new(pipeline.config(), "reddit_posts");
        assert_eq!(csv::read_raw(&paths.raw, Platform::File).unwrap().len(), 4);
        assert!(paths.cleaned.is_file());
        assert!(paths.analyzed.is_file());
        assert_eq!(csv::read_geocoded(&paths.geocoded).unwrap(), geocoded);
    }

    #[tokio::test]
    async fn test_geocoding_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.csv");
        std::fs::write(&input, RAW).unwrap();

        let mut pipeline = CrisisPipelineBuilder::new()
            .with_source(Box::new(CsvSource::new(input)))
            .enable_geocoding(false)
            .build()
            .await
            .unwrap();
        assert!(!pipeline.geocoding_enabled());

        let posts = pipeline.extract(0).await.unwrap();
        let scored = pipeline.analyze(&pipeline.clean(&posts));
        let geocoded = pipeline.geocode(scored).await;

        assert_eq!(geocoded.len(), 3);
        assert!(geocoded.iter().all(|p| p.extracted_location.is_none() && p.geo.is_none()));
    }

    #[tokio::test]
    async fn test_empty_extraction_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = CrisisPipelineBuilder::new()
            .with_data_dir(dir.path().join("data"))
            .with_output_dir(dir.path().join("output"))
            .with_source(Box::new(FailingSource))
            .enable_geocoding(false)
            .build()
            .await
            .unwrap();

        assert!(pipeline.run("tweets").await.unwrap().is_empty());
        assert!(!dir.path().join("data/raw/tweets.csv").exists());
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_build() {
        let result = CrisisPipelineBuilder::new()
            .with_platform(Platform::Twitter)
            .enable_geocoding(false)
            .build()
            .await;

        assert!(matches!(result, Err(ETLError::Config(_))));
    }

    #[tokio::test]
    async fn test_rules_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let rules = dir.path().join("rules.json");
        std::fs::write(&rules, r#"[{"level": "moderate", "keyword": "meeting"}]"#).unwrap();

        let pipeline = CrisisPipelineBuilder::new()
            .with_rules_file(&rules)
            .enable_geocoding(false)
            .build()
            .await
            .unwrap();

        let cleaned = TextCleaner::new()
            .clean_batch(&csv::read_raw(&write_input(dir.path()), Platform::File).unwrap());
        let scored = pipeline.analyze(&cleaned);
        assert_eq!(scored[0].risk_level, RiskLevel::Unknown);
        assert_eq!(scored[2].risk_level, RiskLevel::Moderate);
    }

    fn write_input(dir: &std::path::Path) -> PathBuf {
        let input = dir.join("input.csv");
        std::fs::write(&input, RAW).unwrap();
        input
    }
}
