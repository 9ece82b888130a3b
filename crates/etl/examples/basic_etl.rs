//! 基础 ETL 示例
//!
//! 不需要任何 API 凭证：把几条示例帖子写成 CSV，再走完清洗、打分、分类流程

use crisis_etl::extract::CsvSource;
use crisis_etl::stats::risk_distribution;
use crisis_etl::{CrisisPipelineBuilder, DatasetPaths, Platform, PostSource};

const SAMPLE_POSTS: &[&str] = &[
    "I don't want to live anymore, everything is hopeless",
    "Feeling a bit overwhelmed with work lately in New York City",
    "Had a great day today! Feeling positive about the future",
    "Need help with my mental health, struggling in Kansas City",
    "Started therapy last week, feeling better 🙂 https://example.com/blog",
];

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Crisis ETL 基础示例 ===\n");

    let dir = tempfile::tempdir()?;
    let input = dir.path().join("sample_posts.csv");

    let mut writer = csv::Writer::from_path(&input)?;
    writer.write_record(["id", "created_at", "text"])?;
    for (i, text) in SAMPLE_POSTS.iter().enumerate() {
        writer.write_record([(i + 1).to_string().as_str(), "2024-05-01T12:00:00Z", *text])?;
    }
    writer.flush()?;

    // 1. 创建管道（关闭地理编码，避免访问网络）
    println!("1. 创建管道...");
    let mut pipeline = CrisisPipelineBuilder::new()
        .with_data_dir(dir.path().join("data"))
        .with_output_dir(dir.path().join("output"))
        .enable_geocoding(false)
        .build()
        .await?;
    println!("   ✓ 管道创建完成\n");

    // 2. 读取帖子
    println!("2. 读取示例帖子...");
    let posts = CsvSource::new(&input)
        .with_platform(Platform::File)
        .fetch_posts(0)
        .await?;
    println!("   读取到 {} 条帖子\n", posts.len());

    // 3. 清洗、打分、分类
    println!("3. 清洗与标注...");
    pipeline.config().ensure_directories()?;
    let paths = DatasetPaths::new(pipeline.config(), "sample_posts");
    let results = pipeline.process(&posts, &paths).await?;

    for (i, item) in results.iter().enumerate() {
        let scored = &item.scored;
        println!("   {}. {}", i + 1, scored.post().raw_text);
        println!("      清洗后: {}", scored.cleaned.cleaned_text);
        println!(
            "      风险: {} ({})  情感: {:.4}\n",
            scored.risk_level,
            scored.matched_rule.as_deref().unwrap_or("-"),
            scored.sentiment.compound
        );
    }

    // 4. 风险分布
    let scored: Vec<_> = results.iter().map(|g| g.scored.clone()).collect();
    println!("4. 风险分布:");
    for (level, count) in risk_distribution(&scored) {
        println!("     {}: {}", level, count);
    }

    println!("\n=== 示例完成 ===");
    println!("  - 阶段文件写入 {}", paths.geocoded.parent().unwrap_or(dir.path()).display());

    Ok(())
}
