use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn pdesk_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pdesk");
    path
}

const CATALOG: &str = "รหัสสินค้า,รายละเอียดสินค้า,ราคาทุนต่อหน่วย,จำนวนสต้อก\n\
RT20-ABC,ตู้เย็น Samsung 2 ประตู,\"12,500\",4\n\
RT09-TS,ตู้เย็น Toshiba 1 ประตู,\"5,900\",2\n\
TV55-SN,ทีวี Sony 55 นิ้ว,\"18,900\",1\n";

const MEMORY: &str = "SKU,AI_Brand,AI_Type,AI_Spec,AI_Tags\n\
RT20-ABC,Samsung,ตู้เย็น,2ประตู,inverter\n";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(data_dir.join("products.csv"), CATALOG).unwrap();
    fs::write(data_dir.join("memory.csv"), MEMORY).unwrap();

    let config_content = format!(
        r#"[catalog]
source = "{root}/data/products.csv"

[llm]
provider = "disabled"

[memory]
path = "{root}/data/memory.csv"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("desk.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pdesk(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pdesk_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pdesk binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_lookup_by_sku_prints_prices_and_links() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pdesk(&config_path, &["lookup", "rt20"]);
    assert!(success, "lookup failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("RT20-ABC"));
    assert!(stdout.contains("found via product code"));
    assert!(stdout.contains("14,000"), "expected 12% price, got: {}", stdout);
    assert!(stdout.contains("homepro.co.th"));
    assert!(stdout.contains("inverter"), "expected memory line, got: {}", stdout);
}

#[test]
fn test_lookup_by_description() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_pdesk(&config_path, &["lookup", "Toshiba"]);
    assert!(success);
    assert!(stdout.contains("RT09-TS"));
    assert!(stdout.contains("found via description"));
}

#[test]
fn test_lookup_json_reports_provenance() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_pdesk(&config_path, &["lookup", "tv55", "--json"]);
    assert!(success);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["result"]["provenance"], "SKU_EXACT");
    assert_eq!(report["result"]["row_index"], 2);
    assert_eq!(report["margins"].as_array().unwrap().len(), 6);
}

#[test]
fn test_lookup_miss_without_llm_is_not_an_error() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_pdesk(&config_path, &["lookup", "washing machine"]);
    assert!(success);
    assert!(stdout.contains("No product found"));
}

#[test]
fn test_missing_catalog_fails() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_file(tmp.path().join("data/products.csv")).unwrap();

    let (_, stderr, success) = run_pdesk(&config_path, &["lookup", "rt20"]);
    assert!(!success);
    assert!(stderr.contains("failed to read catalog file"), "stderr: {}", stderr);
}

#[test]
fn test_search_uses_local_price_range_without_llm() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pdesk(&config_path, &["search", "งบไม่เกิน 13,000"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("RT20-ABC"));
    assert!(stdout.contains("RT09-TS"));
    assert!(!stdout.contains("TV55-SN"));
}

#[test]
fn test_memory_show() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_pdesk(&config_path, &["memory", "show", "RT20-ABC"]);
    assert!(success);
    assert!(stdout.contains("AI_Brand: Samsung"));

    let (stdout, _, success) = run_pdesk(&config_path, &["memory", "show", "NOPE"]);
    assert!(success);
    assert!(stdout.contains("No memory for NOPE"));
}

#[test]
fn test_memory_harvest_dry_run_counts_pending() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pdesk(&config_path, &["memory", "harvest", "--dry-run"]);
    assert!(success, "harvest failed: {}", stderr);
    assert!(stdout.contains("2 products without memory"), "got: {}", stdout);
}

#[test]
fn test_memory_harvest_requires_llm() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_pdesk(&config_path, &["memory", "harvest"]);
    assert!(!success);
    assert!(stderr.contains("needs an LLM provider"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(
        &bad,
        "[catalog]\nsource = \"x.csv\"\n\n[resolver]\nshortlist_max = 0\n",
    )
    .unwrap();

    let (_, stderr, success) = run_pdesk(&bad, &["lookup", "rt20"]);
    assert!(!success);
    assert!(stderr.contains("shortlist_max"));
}
