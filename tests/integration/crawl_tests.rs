use super::*;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use woo_scraper::RunStatus;

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn gallery_product(title: &str, sku: &str, images: &[&str]) -> String {
    let gallery: String = images
        .iter()
        .map(|src| {
            format!(
                r#"<div class="woocommerce-product-gallery__image"><a href="{0}"><img src="{0}" data-large_image="{0}"></a></div>"#,
                src
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="product">
            <h1 class="product_title">{}</h1>
            <div class="summary"><p class="price"><span class="woocommerce-Price-amount amount"><bdi>9,90 ₼</bdi></span></p></div>
            <div class="product_meta"><span class="sku">{}</span></div>
            {}
        </div></body></html>"#,
        title, sku, gallery
    )
}

#[tokio::test]
async fn test_http_crawl_with_pagination_and_images() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let base = format!("{}/shop/", server.uri());

    mount_html(
        &server,
        "/shop/",
        r#"<ul class="products">
            <li class="product"><a class="woocommerce-LoopProduct-link" href="/product/filter/">f</a></li>
           </ul>
           <a class="next page-numbers" href="/shop/page/2/">next</a>"#
            .to_string(),
    )
    .await;
    mount_html(
        &server,
        "/shop/page/2/",
        r#"<ul class="products">
            <li class="product"><a class="woocommerce-LoopProduct-link" href="/product/filter/">f</a></li>
            <li class="product"><a class="woocommerce-LoopProduct-link" href="/product/pump/">p</a></li>
           </ul>"#
            .to_string(),
    )
    .await;
    mount_html(
        &server,
        "/product/filter/",
        gallery_product("Oil Filter", "OF/1", &["/img/filter-front.jpg", "/img/filter-back.png"]),
    )
    .await;
    mount_html(
        &server,
        "/product/pump/",
        gallery_product("Water Pump", "WP-2", &["/img/pump.jpg", "/img/missing.jpg"]),
    )
    .await;
    for image in ["/img/filter-front.jpg", "/img/filter-back.png", "/img/pump.jpg"] {
        Mock::given(method("GET"))
            .and(path(image))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFFu8, 0xD8, 0xFF]))
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    config.scraper.base_url = base;
    config.scraper.retry_attempts = 0;
    config.output.download_images = true;

    let pipeline = Pipeline::from_config(&config, Arc::new(ShutdownController::new())).await?;
    let report = pipeline.run().await?;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.state.total_discovered, 2);

    let records = read_written_json(&report)?;
    let filter = records
        .iter()
        .find(|r| r.sku.as_deref() == Some("OF/1"))
        .expect("filter scraped");
    assert_eq!(filter.price.as_deref(), Some("9,90 ₼"));
    assert_eq!(filter.images.len(), 2);
    assert!(filter.images[0].ends_with("1.jpg"));
    assert!(filter.images[1].ends_with("2.png"));
    assert!(filter.images.iter().all(|p| Path::new(p).is_absolute() && Path::new(p).exists()));
    assert!(config.output.images_dir.join("OF1").is_dir());

    let pump = records
        .iter()
        .find(|r| r.sku.as_deref() == Some("WP-2"))
        .expect("pump scraped");
    assert_eq!(pump.images.len(), 1);

    Ok(())
}
