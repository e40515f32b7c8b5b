//! End-to-end checks through `Desk` and the HTTP router with a scripted ranker.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use price_desk::catalog::{CatalogCache, CsvFileSource};
use price_desk::config::{parse_config, Config};
use price_desk::desk::Desk;
use price_desk::llm::DisabledProvider;
use price_desk::models::{Candidate, Provenance};
use price_desk::ranker::Ranker;
use price_desk::server::build_router;

const CATALOG: &str = "รหัสสินค้า,รายละเอียดสินค้า,ราคาทุนต่อหน่วย,จำนวนสต้อก\n\
FAN-16,พัดลม Hatari 16 นิ้ว,890,10\n\
RT20-ABC,ตู้เย็น Samsung 2 ประตู,\"12,500\",4\n\
AC-12K,แอร์ Daikin 12000 BTU,\"15,500\",3\n";

/// Replies with a fixed index and counts calls.
struct Picks {
    reply: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl Ranker for Picks {
    async fn rank(&self, _query: &str, candidates: &[Candidate]) -> anyhow::Result<String> {
        assert!(!candidates.is_empty());
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.to_string())
    }
}

fn setup(reply: &'static str) -> (TempDir, Desk, Arc<Picks>) {
    setup_with_memory(reply, None)
}

/// Like [`setup`], with `[memory].path` pointing at a file holding `memory`.
fn setup_with_memory(reply: &'static str, memory: Option<&str>) -> (TempDir, Desk, Arc<Picks>) {
    let tmp = TempDir::new().unwrap();
    let csv = tmp.path().join("products.csv");
    fs::write(&csv, CATALOG).unwrap();

    let mut toml = format!(
        "[catalog]\nsource = \"{}\"\n\n[pricing]\ntarget_margin_pct = 12\n",
        csv.display()
    );
    if let Some(contents) = memory {
        let path = tmp.path().join("memory.csv");
        fs::write(&path, contents).unwrap();
        toml.push_str(&format!("\n[memory]\npath = \"{}\"\n", path.display()));
    }
    let config: Config = parse_config(&toml).unwrap();

    let cache = CatalogCache::new(
        Box::new(CsvFileSource::new(&csv)),
        config.catalog.columns.clone(),
        Duration::from_secs(600),
    );
    let ranker = Arc::new(Picks {
        reply,
        calls: AtomicUsize::new(0),
    });
    let desk = Desk::new(config, cache, Arc::new(DisabledProvider), ranker.clone());
    (tmp, desk, ranker)
}

#[tokio::test]
async fn sku_lookup_never_reaches_ranker() {
    let (_tmp, desk, ranker) = setup("0");
    let report = desk.lookup("rt20").await.unwrap();

    assert_eq!(report.result.provenance, Provenance::SkuExact);
    assert_eq!(report.result.row_index, Some(1));
    assert_eq!(report.suggested.unwrap().price, Decimal::new(14000, 0));
    assert_eq!(report.competitors.len(), 7);
    assert_eq!(ranker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn external_pick_is_reported_and_priced() {
    let (_tmp, desk, ranker) = setup("2");
    let report = desk.lookup("เครื่องปรับอากาศ").await.unwrap();

    assert_eq!(report.result.provenance, Provenance::ExternalResolved);
    assert_eq!(report.product.unwrap().sku, "AC-12K");
    assert_eq!(ranker.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ranker_no_match_leaves_no_pricing() {
    let (_tmp, desk, _) = setup("-1");
    let report = desk.lookup("washing machine").await.unwrap();

    assert!(!report.result.found);
    assert!(report.product.is_none());
    assert!(report.suggested.is_none());
    assert!(report.margins.is_empty());
    assert!(report.competitors.is_empty());
}

#[tokio::test]
async fn catalog_edits_are_invisible_until_reload() {
    let (tmp, desk, _) = setup("-1");
    desk.lookup("rt20").await.unwrap();

    fs::write(
        tmp.path().join("products.csv"),
        "รหัสสินค้า,รายละเอียดสินค้า\nNEW-1,ของใหม่\n",
    )
    .unwrap();
    assert!(!desk.lookup("new-1").await.unwrap().result.found);

    desk.catalog.invalidate().await;
    let report = desk.lookup("new-1").await.unwrap();
    assert_eq!(report.result.provenance, Provenance::SkuExact);
}

#[tokio::test]
async fn memory_is_cached_until_invalidated() {
    let (tmp, desk, _) = setup_with_memory(
        "-1",
        Some("SKU,AI_Brand,AI_Type,AI_Spec,AI_Tags\nRT20-ABC,Samsung,ตู้เย็น,2ประตู,inverter\n"),
    );
    let report = desk.lookup("rt20").await.unwrap();
    assert_eq!(report.attributes.unwrap().tags, "inverter");

    fs::write(
        tmp.path().join("memory.csv"),
        "SKU,AI_Brand,AI_Type,AI_Spec,AI_Tags\nRT20-ABC,Samsung,ตู้เย็น,2ประตู,no frost\n",
    )
    .unwrap();
    let report = desk.lookup("rt20").await.unwrap();
    assert_eq!(report.attributes.unwrap().tags, "inverter");

    desk.invalidate().await;
    let report = desk.lookup("rt20").await.unwrap();
    assert_eq!(report.attributes.unwrap().tags, "no frost");
}

#[tokio::test]
async fn broken_memory_drops_attributes_but_not_the_lookup() {
    let (_tmp, desk, _) = setup_with_memory("-1", Some(",,\n"));
    let report = desk.lookup("rt20").await.unwrap();
    assert_eq!(report.product.unwrap().sku, "RT20-ABC");
    assert!(report.attributes.is_none());
}

#[tokio::test]
async fn http_search_with_broken_memory_is_internal_not_catalog() {
    let (_tmp, desk, _) = setup_with_memory("-1", Some(",,\n"));
    let app = build_router(Arc::new(desk));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let resp = reqwest::Client::new()
        .post(format!("http://{}/search", addr))
        .json(&serde_json::json!({ "query": "ไม่เกิน 5000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "internal");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("memory file"));
}

#[tokio::test]
async fn http_lookup_and_errors() {
    let (tmp, desk, _) = setup("-1");
    let app = build_router(Arc::new(desk));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let health: serde_json::Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let resp = client
        .post(format!("{}/lookup", base))
        .json(&serde_json::json!({ "query": "พัดลม" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["result"]["provenance"], "DESCRIPTION_MATCH");
    assert_eq!(body["product"]["sku"], "FAN-16");

    let resp = client
        .post(format!("{}/search", base))
        .json(&serde_json::json!({ "query": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    // Removing the source does not touch the live snapshot.
    fs::remove_file(tmp.path().join("products.csv")).unwrap();
    let resp = client
        .post(format!("{}/lookup", base))
        .json(&serde_json::json!({ "query": "rt20" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn http_reports_unavailable_catalog() {
    let (tmp, desk, _) = setup("-1");
    fs::remove_file(tmp.path().join("products.csv")).unwrap();
    let app = build_router(Arc::new(desk));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let resp = reqwest::Client::new()
        .post(format!("http://{}/lookup", addr))
        .json(&serde_json::json!({ "query": "rt20" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "catalog_unavailable");
}
