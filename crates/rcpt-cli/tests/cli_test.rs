//! Integration tests for the rcpt binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const GREENLEAF: &str = "GREENLEAF MARKET\nBANANAS 1.29 F\nLIMES 3 @ 0.50 1.50 F\nTOTAL 2.79\n";

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rcpt"))
}

/// Temp dir holding an empty config file, so tests never read the user's config.
fn workspace() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.json");
    fs::write(&config, "{}").unwrap();
    (dir, config)
}

fn write_receipt(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_extract_json() {
    let (dir, config) = workspace();
    let input = write_receipt(dir.path(), "greenleaf.txt", GREENLEAF);

    let output = cli()
        .arg("-c")
        .arg(&config)
        .args(["extract", "--vendor", "greenleaf"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["name"], "LIMES");
    assert_eq!(items[1]["pattern_id"], "greenleaf.qty-at-price");
    assert!(json.get("debug").is_none());
}

#[test]
fn test_extract_csv_and_text() {
    let (dir, config) = workspace();
    let input = write_receipt(dir.path(), "greenleaf.txt", GREENLEAF);

    cli()
        .arg("-c")
        .arg(&config)
        .args(["extract", "-f", "csv"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("line,name,unit_price,quantity,subtotal"))
        .stdout(predicate::str::contains("BANANAS"));

    cli()
        .arg("-c")
        .arg(&config)
        .args(["extract", "-f", "text", "--show-confidence"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Items: 2"))
        .stdout(predicate::str::contains("Extraction confidence"));
}

#[test]
fn test_extract_from_stdin_with_debug() {
    let (_dir, config) = workspace();

    let output = cli()
        .arg("-c")
        .arg(&config)
        .args(["extract", "-", "--debug"])
        .write_stdin("キャベツ 1個 ¥198\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["items"][0]["name"], "キャベツ");
    assert_eq!(json["debug"]["text"]["total_lines"], 1);
}

#[test]
fn test_extract_output_file() {
    let (dir, config) = workspace();
    let input = write_receipt(dir.path(), "greenleaf.txt", GREENLEAF);
    let output_path = dir.path().join("out.json");

    cli()
        .arg("-c")
        .arg(&config)
        .arg("extract")
        .arg(&input)
        .arg("-o")
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Output written"));

    let written = fs::read_to_string(&output_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert!(json["items"].is_array());
}

#[test]
fn test_extract_missing_file() {
    let (dir, config) = workspace();

    cli()
        .arg("-c")
        .arg(&config)
        .arg("extract")
        .arg(dir.path().join("nope.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_extract_rejects_invalid_floor() {
    let (dir, config) = workspace();
    let input = write_receipt(dir.path(), "greenleaf.txt", GREENLEAF);

    cli()
        .arg("-c")
        .arg(&config)
        .args(["extract", "--floor", "1.5"])
        .arg(&input)
        .assert()
        .failure();
}

#[test]
fn test_batch_with_summary() {
    let (dir, config) = workspace();
    let receipts = dir.path().join("receipts");
    fs::create_dir_all(&receipts).unwrap();
    write_receipt(&receipts, "a.txt", GREENLEAF);
    write_receipt(&receipts, "b.txt", "Milk $1.99\n");
    write_receipt(&receipts, "ignored.pdf", "not a receipt");
    let out = dir.path().join("out");

    cli()
        .arg("-c")
        .arg(&config)
        .arg("batch")
        .arg(format!("{}/*", receipts.display()))
        .arg("-o")
        .arg(&out)
        .arg("--summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 2 files (2 ok, 0 failed)"));

    assert!(out.join("a.json").exists());
    assert!(out.join("b.json").exists());

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert!(summary.starts_with("filename,status,items"));
    assert_eq!(summary.matches("success").count(), 2);
}

#[test]
fn test_batch_no_matches() {
    let (dir, config) = workspace();

    cli()
        .arg("-c")
        .arg(&config)
        .arg("batch")
        .arg(format!("{}/*.txt", dir.path().display()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn test_patterns_listing() {
    let (_dir, config) = workspace();

    cli()
        .arg("-c")
        .arg(&config)
        .args(["patterns", "--vendor", "A-Mart"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024.10"))
        .stdout(predicate::str::contains("a-mart.qty-yen"))
        .stdout(predicate::str::contains("generic.qty-times-price-subtotal"));

    let output = cli()
        .arg("-c")
        .arg(&config)
        .args(["patterns", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let patterns = json.as_array().unwrap();
    assert!(!patterns.is_empty());
    assert!(patterns.iter().all(|p| p["vendor"].is_null()));
}

#[test]
fn test_config_lifecycle() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("nested").join("config.json");

    cli()
        .arg("-c")
        .arg(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));

    cli()
        .arg("-c")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(config.exists());

    cli()
        .arg("-c")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    cli()
        .arg("-c")
        .arg(&config)
        .args(["config", "get", "stages.strict_threshold"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.8"));

    cli()
        .arg("-c")
        .arg(&config)
        .args(["config", "set", "extraction.default_vendor", "greenleaf"])
        .assert()
        .success();

    cli()
        .arg("-c")
        .arg(&config)
        .args(["config", "get", "extraction.default_vendor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"greenleaf\""));

    cli()
        .arg("-c")
        .arg(&config)
        .args(["config", "set", "stages.no_such_key", "1"])
        .assert()
        .failure();
}

#[test]
fn test_help_describes_commands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("line items"))
        .stdout(predicate::str::contains("or stdin with"))
        .stdout(predicate::str::contains("vendor-specific first"));
}
