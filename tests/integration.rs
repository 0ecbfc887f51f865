use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const DICTIONARY: &str = "\
Field Name,Description
LoanNumber,Loan Number (unique identifier)
DateApproved,Loan Funded Date
BorrowerName,Borrower Name
BorrowerCity,Borrower City
BorrowerState,Borrower State
InitialApprovalAmount,Loan Approval Amount
JobsReported,Number of Employees
ForgivenessDate,Forgiveness Paid Date
";

const DATASET: &str = "\
LoanNumber,DateApproved,BorrowerName,BorrowerCity,BorrowerState,InitialApprovalAmount,JobsReported,ForgivenessDate,OriginatingLender
9547507704,05/01/2020,ACME COATINGS LLC,Greenville,SC,150000.50,12,,First Bank
,05/02/2020,NO IDENTIFIER INC,Austin,TX,1000,1,,First Bank
1234567890,not a date,Brick & Mortar Co,Austin,TX,abc,3.5,2021-03-04,Second Bank
";

fn ppp_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ppp");
    path
}

fn setup_test_env_with(dataset: &[u8], dictionary: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let source_dir = root.join("source");
    fs::create_dir_all(&source_dir).unwrap();
    fs::write(source_dir.join("public_150k_plus.csv"), dataset).unwrap();
    fs::write(source_dir.join("ppp-data-dictionary.csv"), dictionary).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/ppp.sqlite"

[source]
dataset_url = "file://{root}/source/public_150k_plus.csv"
dictionary_url = "{root}/source/ppp-data-dictionary.csv"
download_dir = "{root}/data/downloads"

[query]
default_limit = 50

[server]
bind = "127.0.0.1:8765"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("ppp.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn setup_test_env() -> (TempDir, PathBuf) {
    setup_test_env_with(DATASET.as_bytes(), DICTIONARY)
}

fn run_ppp(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ppp_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ppp binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ppp(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/ppp.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_ppp(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_ppp(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_reports_summary() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ppp(&config_path, &["ingest"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("rows loaded: 3"), "stdout={}", stdout);
    assert!(stdout.contains("rows dropped: 1"), "stdout={}", stdout);
    assert!(stdout.contains("records persisted: 2"), "stdout={}", stdout);
    assert!(stdout.contains("ok"));

    // Both artifacts were copied into the download directory.
    let downloads = tmp.path().join("data/downloads");
    assert!(downloads.join("dataset-public_150k_plus.csv").exists());
    assert!(downloads.join("dictionary-ppp-data-dictionary.csv").exists());
}

#[test]
fn test_search_after_ingest() {
    let (_tmp, config_path) = setup_test_env();
    run_ppp(&config_path, &["ingest"]);

    let (stdout, stderr, success) = run_ppp(&config_path, &["search", "coatings"]);
    assert!(success, "search failed: stderr={}", stderr);
    assert!(stdout.contains("ACME COATINGS LLC"));
    assert!(stdout.contains("tin: 9547507704"));
    assert!(!stdout.contains("Brick & Mortar"));
}

#[test]
fn test_search_state_filter() {
    let (_tmp, config_path) = setup_test_env();
    run_ppp(&config_path, &["ingest"]);

    let (stdout, _, success) = run_ppp(&config_path, &["search", "co", "--state", "TX"]);
    assert!(success);
    assert!(stdout.contains("Brick & Mortar Co"));
    assert!(!stdout.contains("ACME"));

    let (stdout, _, success) = run_ppp(&config_path, &["search", "co", "--state", "NY"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_json_output() {
    let (_tmp, config_path) = setup_test_env();
    run_ppp(&config_path, &["ingest"]);

    let (stdout, stderr, success) = run_ppp(&config_path, &["search", "acme", "--json"]);
    assert!(success, "search failed: stderr={}", stderr);

    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["tin"], "9547507704");
    assert_eq!(results[0]["borrower_state"], "SC");
    assert_eq!(results[0]["date_approved"], "2020-05-01");
}

#[test]
fn test_get_prints_record() {
    let (_tmp, config_path) = setup_test_env();
    run_ppp(&config_path, &["ingest"]);

    let (stdout, stderr, success) = run_ppp(&config_path, &["get", "9547507704"]);
    assert!(success, "get failed: stderr={}", stderr);
    assert!(stdout.contains("--- Loan 9547507704 ---"));
    assert!(stdout.contains("ACME COATINGS LLC"));
    assert!(stdout.contains("150000.5"));
    assert!(stdout.contains("2020-05-01"));
}

#[test]
fn test_get_keeps_row_with_bad_cells() {
    let (_tmp, config_path) = setup_test_env();
    run_ppp(&config_path, &["ingest"]);

    let (stdout, stderr, success) = run_ppp(&config_path, &["get", "1234567890", "--json"]);
    assert!(success, "get failed: stderr={}", stderr);

    let record: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(record["borrower_name"], "Brick & Mortar Co");
    assert!(record["date_approved"].is_null());
    assert!(record["initial_approval_amount"].is_null());
    assert!(record["jobs_reported"].is_null());
    assert_eq!(record["forgiveness_date"], "2021-03-04");
}

#[test]
fn test_get_missing_loan_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_ppp(&config_path, &["init"]);

    let (_, stderr, success) = run_ppp(&config_path, &["get", "0000000000"]);
    assert!(!success, "get should fail for an unknown loan number");
    assert!(stderr.contains("not found"), "stderr={}", stderr);
}

#[test]
fn test_ingest_schema_mismatch_fails_without_writing() {
    let dictionary = format!("{}NAICSCode,NAICS Code\n", DICTIONARY);
    let (_tmp, config_path) = setup_test_env_with(DATASET.as_bytes(), &dictionary);

    let (stdout, stderr, success) = run_ppp(&config_path, &["ingest"]);
    assert!(!success, "ingest should fail: stdout={}", stdout);
    assert!(stderr.contains("schema_invalid"), "stderr={}", stderr);
    assert!(stderr.contains("NAICSCode"), "stderr={}", stderr);

    let (stdout, _, success) = run_ppp(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Records:       0"), "stdout={}", stdout);
}

#[test]
fn test_ingest_missing_source_fails_with_fetch_category() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_file(tmp.path().join("source/public_150k_plus.csv")).unwrap();

    let (_, stderr, success) = run_ppp(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("fetch"), "stderr={}", stderr);
}

#[test]
fn test_ingest_latin1_dataset() {
    let mut dataset = b"LoanNumber,DateApproved,BorrowerName,BorrowerCity,BorrowerState,InitialApprovalAmount,JobsReported,ForgivenessDate\n".to_vec();
    dataset.extend_from_slice(b"5550001111,2020-06-15,Caf");
    dataset.push(0xE9); // é in ISO-8859-1
    dataset.extend_from_slice(b" Ol");
    dataset.push(0xE9);
    dataset.extend_from_slice(b" LLC,San Jos");
    dataset.push(0xE9);
    dataset.extend_from_slice(b",CA,20000,4,\n");

    let (_tmp, config_path) = setup_test_env_with(&dataset, DICTIONARY);

    let (stdout, stderr, success) = run_ppp(&config_path, &["ingest"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("records persisted: 1"));

    let (stdout, _, success) = run_ppp(&config_path, &["search", "Café"]);
    assert!(success);
    assert!(stdout.contains("Café Olé LLC"), "stdout={}", stdout);
    assert!(stdout.contains("San José, CA"), "stdout={}", stdout);
}

#[test]
fn test_repeated_ingest_appends_batches() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_ppp(&config_path, &["ingest"]);
    let (_, _, second) = run_ppp(&config_path, &["ingest"]);
    assert!(first && second);

    let (stdout, stderr, success) = run_ppp(&config_path, &["stats"]);
    assert!(success, "stats failed: stderr={}", stderr);
    assert!(stdout.contains("Records:       4"), "stdout={}", stdout);
    assert!(stdout.contains("Loan numbers:  2"), "stdout={}", stdout);
    assert!(stdout.contains("Duplicates:    2"), "stdout={}", stdout);
    assert!(stdout.contains("By batch:"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let config_path = tmp.path().join("config/bad.toml");
    fs::write(
        &config_path,
        r#"[db]
path = "./ppp.sqlite"

[source]
dataset_url = ""
dictionary_url = "dict.csv"
"#,
    )
    .unwrap();

    let (_, stderr, success) = run_ppp(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("dataset_url"), "stderr={}", stderr);
}
