use super::*;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use woo_scraper::RunStatus;

#[tokio::test]
async fn test_every_discovered_product_is_collected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = test_config(dir.path());
    let fetcher = Arc::new(storefront(12));
    let pipeline = build_pipeline(&config, fetcher.clone(), Arc::new(ShutdownController::new())).await?;

    let report = pipeline.run().await?;
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.status.exit_code(), 0);
    assert_eq!(report.state.total_discovered, 12);
    assert_eq!(report.state.extracted, 12);
    assert_eq!(fetcher.product_fetches(), 12);

    let records = read_written_json(&report)?;
    let urls: BTreeSet<String> = records.iter().map(|r| r.url.clone()).collect();
    let expected: BTreeSet<String> = (1..=12).map(|i| product_url(&format!("p{}", i))).collect();
    assert_eq!(urls, expected);
    println!("✓ {} products collected by {} workers", records.len(), report.pool.workers);

    Ok(())
}

#[tokio::test]
async fn test_repeated_runs_produce_the_same_records() -> anyhow::Result<()> {
    let mut snapshots = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir()?;
        let config = test_config(dir.path());
        let pipeline =
            build_pipeline(&config, Arc::new(storefront(6)), Arc::new(ShutdownController::new()))
                .await?;
        let report = pipeline.run().await?;

        let mut records: Vec<ProductRecord> = read_written_json(&report)?
            .iter()
            .map(ProductRecord::without_timestamp)
            .collect();
        records.sort_by(|a, b| a.url.cmp(&b.url));
        snapshots.push(records);
    }

    assert_eq!(snapshots[0], snapshots[1]);
    Ok(())
}

#[tokio::test]
async fn test_test_mode_caps_collected_records() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    config.test_mode.enabled = true;
    config.test_mode.limit = 3;

    let pipeline =
        build_pipeline(&config, Arc::new(storefront(10)), Arc::new(ShutdownController::new()))
            .await?;
    let report = pipeline.run().await?;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.state.extracted, 3);
    assert_eq!(read_written_json(&report)?.len(), 3);
    assert_eq!(
        report.state.discarded,
        report.pool.dispatched - report.state.extracted
    );
    assert!(report.pool.not_dispatched > 0);
    Ok(())
}

#[tokio::test]
async fn test_single_worker_cap_dispatches_exactly_the_limit() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    config.scraper.max_threads = 1;
    config.test_mode.enabled = true;
    config.test_mode.limit = 3;

    let fetcher = Arc::new(storefront(10));
    let pipeline = build_pipeline(&config, fetcher.clone(), Arc::new(ShutdownController::new())).await?;
    let report = pipeline.run().await?;

    assert_eq!(fetcher.product_fetches(), 3);
    assert_eq!(report.state.extracted, 3);
    assert_eq!(report.state.discarded, 0);
    Ok(())
}

#[tokio::test]
async fn test_interrupt_saves_partial_results() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    config.scraper.max_threads = 1;

    let shutdown = Arc::new(ShutdownController::new());
    let trigger = Arc::clone(&shutdown);
    let fetcher = storefront(10).on_product_fetch(move |_, n| {
        if n == 3 {
            trigger.interrupt();
        }
    });
    let pipeline = build_pipeline(&config, Arc::new(fetcher), Arc::clone(&shutdown)).await?;

    let report = pipeline.run().await?;
    assert_eq!(report.status, RunStatus::Interrupted);
    assert_eq!(report.status.exit_code(), 130);
    assert!(report.state.interrupted);
    assert_eq!(report.state.extracted, 3);
    assert_eq!(report.pool.not_dispatched, 7);
    assert_eq!(read_written_json(&report)?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_repeated_interrupts_flush_once() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    config.scraper.max_threads = 2;

    let shutdown = Arc::new(ShutdownController::new());
    let trigger = Arc::clone(&shutdown);
    let fetcher = storefront(10).on_product_fetch(move |_, n| {
        if n >= 2 {
            trigger.interrupt();
            trigger.interrupt();
        }
    });
    let pipeline = build_pipeline(&config, Arc::new(fetcher), Arc::clone(&shutdown)).await?;

    let report = pipeline.run().await?;
    assert_eq!(report.status, RunStatus::Interrupted);
    let persistence = report.persistence.as_ref().expect("flushed");
    assert_eq!(persistence.written.len(), 1);
    assert!(!shutdown.begin_flush());
    Ok(())
}

/// Storefront whose products are `(slug, price markup)` pairs, titled after the slug.
fn price_storefront(variants: &[(&str, &str, &str)]) -> StaticFetcher {
    let slugs: Vec<String> = variants.iter().map(|(slug, _, _)| slug.to_string()).collect();
    variants.iter().fold(
        StaticFetcher::new().page(BASE_URL, listing_page(&slugs)),
        |fetcher, (slug, markup, _)| {
            fetcher.page(product_url(slug), product_page(slug, Some(slug), markup))
        },
    )
}

#[tokio::test]
async fn test_two_workers_four_products_within_run_window() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    config.scraper.max_threads = 2;

    let variants = [
        ("wrapped", r#"<p class="price"><span class="woocommerce-Price-amount amount">$19.99</span></p>"#, "$19.99"),
        ("sale", r#"<p class="price"><del><span>$30.00</span></del><ins><span class="amount">$24.00</span></ins></p>"#, "$24.00"),
        ("bare", r#"<span class="amount">7 AZN</span>"#, "7 AZN"),
        ("legacy", r#"<p class="price">25 AZN</p>"#, "25 AZN"),
    ];
    let pipeline = build_pipeline(
        &config,
        Arc::new(price_storefront(&variants)),
        Arc::new(ShutdownController::new()),
    )
    .await?;

    let started = Utc::now();
    let report = pipeline.run().await?;
    let finished = Utc::now();

    assert_eq!(report.status, RunStatus::Completed);
    let records = read_written_json(&report)?;
    assert_eq!(records.len(), 4);
    for record in &records {
        assert!(record.title.as_deref().is_some_and(|t| !t.is_empty()), "{}", record.url);
        assert!(record.price.as_deref().is_some_and(|p| !p.is_empty()), "{}", record.url);
        assert!(record.images.is_empty(), "{}", record.url);
        assert!(
            started <= record.scraped_at && record.scraped_at <= finished,
            "{} scraped at {} outside {}..{}",
            record.url,
            record.scraped_at,
            started,
            finished
        );
    }

    let prices: HashMap<String, Option<String>> =
        records.into_iter().map(|r| (r.url, r.price)).collect();
    for (slug, _, expected) in variants {
        assert_eq!(prices[&product_url(slug)].as_deref(), Some(expected), "{}", slug);
    }
    Ok(())
}

#[tokio::test]
async fn test_every_price_variant_resolves() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    config.scraper.max_threads = 2;

    let variants = [
        ("themed", r#"<p class="price"><span class="woocommerce-Price-amount amount"><bdi>12,50 ₼</bdi></span></p>"#, "12,50 ₼"),
        ("wrapped", r#"<p class="price"><span class="woocommerce-Price-amount amount">$19.99</span></p>"#, "$19.99"),
        (
            "on-sale",
            r#"<p class="price"><del aria-hidden="true"><span class="woocommerce-Price-amount amount"><bdi>30,00 ₼</bdi></span></del> <ins><span class="woocommerce-Price-amount amount"><bdi>24,00 ₼</bdi></span></ins></p>"#,
            "24,00 ₼",
        ),
        ("bare", r#"<span class="amount">7 AZN</span>"#, "7 AZN"),
        ("legacy", r#"<p class="price">25 AZN</p>"#, "25 AZN"),
    ];
    let pipeline = build_pipeline(
        &config,
        Arc::new(price_storefront(&variants)),
        Arc::new(ShutdownController::new()),
    )
    .await?;
    let report = pipeline.run().await?;

    let prices: HashMap<String, Option<String>> = read_written_json(&report)?
        .into_iter()
        .map(|r| (r.url, r.price))
        .collect();
    assert_eq!(prices.len(), 5);
    for (slug, _, expected) in variants {
        assert_eq!(prices[&product_url(slug)].as_deref(), Some(expected), "{}", slug);
    }
    Ok(())
}

#[tokio::test]
async fn test_missing_sku_and_failed_pages() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = test_config(dir.path());

    let slugs = vec!["no-sku".to_string(), "gone".to_string(), "ok".to_string()];
    let fetcher = StaticFetcher::new()
        .page(BASE_URL, listing_page(&slugs))
        .page(product_url("no-sku"), product_page("No SKU", None, &simple_price("5 AZN")))
        .page(product_url("ok"), product_page("Fine", Some("OK-1"), &simple_price("6 AZN")));

    let pipeline = build_pipeline(&config, Arc::new(fetcher), Arc::new(ShutdownController::new())).await?;
    let report = pipeline.run().await?;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.state.extracted, 2);
    assert_eq!(report.state.failed, 1);

    let records = read_written_json(&report)?;
    let no_sku = records
        .iter()
        .find(|r| r.url == product_url("no-sku"))
        .expect("record without sku kept");
    assert_eq!(no_sku.sku, None);
    assert_eq!(no_sku.title.as_deref(), Some("No SKU"));
    assert_eq!(no_sku.categories, vec!["Parts"]);
    Ok(())
}

#[tokio::test]
async fn test_empty_catalog_reports_nothing_collected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = test_config(dir.path());
    let fetcher = StaticFetcher::new().page(BASE_URL, listing_page(&[]));

    let pipeline = build_pipeline(&config, Arc::new(fetcher), Arc::new(ShutdownController::new())).await?;
    let report = pipeline.run().await?;

    assert_eq!(report.status, RunStatus::NothingCollected);
    assert_eq!(report.status.exit_code(), 2);
    assert!(report.persistence.as_ref().expect("flushed").written.is_empty());
    assert!(!config.output.output_dir.exists());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_listing_is_fatal() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = test_config(dir.path());

    let pipeline =
        build_pipeline(&config, Arc::new(StaticFetcher::new()), Arc::new(ShutdownController::new()))
            .await?;
    let result = pipeline.run().await;
    assert!(matches!(
        result,
        Err(woo_scraper::AppError::Discovery(_))
    ));
    Ok(())
}
