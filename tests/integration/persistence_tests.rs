use super::*;
use woo_scraper::config::OutputLayout;
use woo_scraper::persistence::DatabaseSink;
use woo_scraper::RunStatus;

#[tokio::test]
async fn test_failed_sink_falls_back_to_emergency_dump() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    // A regular file where the output directory should be.
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x")?;
    config.output.output_dir = blocker;

    let pipeline =
        build_pipeline(&config, Arc::new(storefront(3)), Arc::new(ShutdownController::new()))
            .await?;
    let report = pipeline.run().await?;

    assert_eq!(report.status, RunStatus::PersistenceFailed);
    assert_eq!(report.status.exit_code(), 3);

    let persistence = report.persistence.as_ref().expect("flushed");
    assert_eq!(persistence.failed.len(), 1);
    let fallback = persistence.fallback.clone().expect("emergency dump written");
    let saved: Vec<ProductRecord> = serde_json::from_str(&std::fs::read_to_string(&fallback)?)?;
    assert_eq!(saved.len(), 3);
    std::fs::remove_file(&fallback)?;
    println!("✓ Emergency dump written to {}", fallback);

    Ok(())
}

#[tokio::test]
async fn test_database_only_run_upserts() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    config.output.format = woo_scraper::config::OutputFormat::None;
    config.database.enabled = true;
    config.database.url = format!("sqlite://{}", dir.path().join("shop.db").display());

    for _ in 0..2 {
        let pipeline =
            build_pipeline(&config, Arc::new(storefront(5)), Arc::new(ShutdownController::new()))
                .await?;
        let report = pipeline.run().await?;
        assert_eq!(report.status, RunStatus::Completed);
        let persistence = report.persistence.as_ref().expect("flushed");
        assert_eq!(persistence.written.len(), 1);
        assert_eq!(persistence.written[0].sink, "database");
    }

    let sink = DatabaseSink::connect(&config.database).await?;
    assert_eq!(sink.count_products().await?, 5);
    assert!(!config.output.output_dir.exists());
    Ok(())
}

#[tokio::test]
async fn test_json_and_csv_compact_layout() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    config.output.format = woo_scraper::config::OutputFormat::Both;
    config.output.layout = OutputLayout::Compact;

    let pipeline =
        build_pipeline(&config, Arc::new(storefront(4)), Arc::new(ShutdownController::new()))
            .await?;
    let report = pipeline.run().await?;
    let written = &report.persistence.as_ref().expect("flushed").written;
    assert_eq!(written.len(), 2);

    let csv_path = written
        .iter()
        .find(|w| w.sink == "csv")
        .map(|w| w.location.clone())
        .expect("csv written");
    let mut reader = csv::Reader::from_path(&csv_path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    assert_eq!(
        headers,
        vec!["name", "sku_code", "main_price", "source_url", "has_images"]
    );
    assert_eq!(reader.records().count(), 4);

    let json_path = written
        .iter()
        .find(|w| w.sink == "json")
        .map(|w| w.location.clone())
        .expect("json written");
    let rows: Vec<serde_json::Value> = serde_json::from_str(&std::fs::read_to_string(json_path)?)?;
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r["sku_code"].as_str().is_some_and(|s| s.starts_with("SKU-"))));
    Ok(())
}
