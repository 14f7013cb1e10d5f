use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use mediarec::config::ScraperConfig;
use mediarec::error::RecommendError;
use mediarec::scrape;
use tempfile::TempDir;

const LISTING: &str = r#"<html><body>
<h2 id="books-last1">Top 100 EBooks yesterday</h2>
<ol>
<li><a href="/ebooks/1342">Pride and Prejudice by Jane Austen (1342)</a></li>
<li><a href="/ebooks/84">Frankenstein; Or, The Modern Prometheus by Mary Wollstonecraft Shelley (84)</a></li>
<li><a href="/ebooks/1342">Pride and Prejudice by Jane Austen (1342)</a></li>
<li></li>
</ol>
<ul><li>Not part of the ranking</li></ul>
</body></html>"#;

const EXPECTED_CSV: &str = "\
Titulo Principal,Titulo Secundario,Autor,N° Ref
Pride and Prejudice,,Jane Austen,1342
Frankenstein,The Modern Prometheus,Mary Wollstonecraft Shelley,84
";

/// Serve the fixture listing at `/top1000.php`; every other path is a 404.
async fn spawn_listing_server() -> String {
    let app = axum::Router::new()
        .route("/top1000.php", get(|| async { Html(LISTING) }))
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found") });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn scraper_config(url: String) -> ScraperConfig {
    ScraperConfig {
        url,
        ..ScraperConfig::default()
    }
}

#[tokio::test]
async fn scrape_writes_deduplicated_dataset() {
    let base = spawn_listing_server().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("data").join("dataset_libros.csv");

    let report = scrape::run(&scraper_config(format!("{base}/top1000.php")), &output)
        .await
        .unwrap();

    assert_eq!(report.entries, 4);
    assert_eq!(report.records, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.output, output);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), EXPECTED_CSV);
}

#[tokio::test]
async fn scraping_twice_produces_identical_files() {
    let base = spawn_listing_server().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("libros.csv");
    let config = scraper_config(format!("{base}/top1000.php"));

    scrape::run(&config, &output).await.unwrap();
    let first = std::fs::read(&output).unwrap();
    scrape::run(&config, &output).await.unwrap();
    let second = std::fs::read(&output).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn summary_column_is_optional() {
    let base = spawn_listing_server().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("libros.csv");
    let config = ScraperConfig {
        include_summary: true,
        ..scraper_config(format!("{base}/top1000.php"))
    };

    scrape::run(&config, &output).await.unwrap();
    let csv = std::fs::read_to_string(&output).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("Titulo Principal,Titulo Secundario,Autor,N° Ref,Resumen")
    );
    assert_eq!(lines.next(), Some("Pride and Prejudice,,Jane Austen,1342,"));
}

#[tokio::test]
async fn http_error_is_network_fetch() {
    let base = spawn_listing_server().await;
    let url = format!("{base}/missing");

    let err = scrape::fetch(&url, false).await.unwrap_err();
    match err {
        RecommendError::NetworkFetch { url: failed, reason } => {
            assert_eq!(failed, url);
            assert!(reason.contains("404"), "got {reason}");
        }
        other => panic!("expected NetworkFetch, got {other}"),
    }
}

#[tokio::test]
async fn failed_fetch_leaves_existing_dataset_alone() {
    let base = spawn_listing_server().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("libros.csv");
    std::fs::write(&output, "previous contents\n").unwrap();

    let err = scrape::run(&scraper_config(format!("{base}/missing")), &output)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RecommendError>(),
        Some(RecommendError::NetworkFetch { .. })
    ));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "previous contents\n");
}

#[tokio::test]
async fn unreachable_host_is_network_fetch() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = scrape::fetch(&format!("http://{addr}/"), false).await.unwrap_err();
    assert!(matches!(err, RecommendError::NetworkFetch { .. }), "got {err}");
}
