use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn bids_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("bids");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/bids.sqlite"
"#,
        root.display()
    );

    let config_path = config_dir.join("bids.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn write_catalog(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn run_bids(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = bids_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run bids binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

const CATALOG_RUN_1: &str = "\
Item #,Title,Description,Value
139,Spa Day,Relax and unwind.,$250
139,Spa Day Deluxe,Even more relaxing.,$400
139,Spa Weekend,Two whole days.,$900
";

// Run 2: first row unchanged, second row's description changed, third removed.
const CATALOG_RUN_2: &str = "\
Item #,Title,Description,Value
139,Spa Day,Relax and unwind.,$250
139,Spa Day Deluxe,Now with hot stones.,$400
";

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_bids(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_bids(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_bids(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_import_creates_items_and_line_items() {
    let (tmp, config_path) = setup_test_env();
    let catalog = write_catalog(tmp.path(), "catalog.csv", CATALOG_RUN_1);

    run_bids(&config_path, &["init"]);
    let (stdout, stderr, success) =
        run_bids(&config_path, &["import", catalog.to_str().unwrap()]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("new items: 1"));
    assert!(stdout.contains("new line items: 3"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_import_idempotent() {
    let (tmp, config_path) = setup_test_env();
    let catalog = write_catalog(tmp.path(), "catalog.csv", CATALOG_RUN_1);

    run_bids(&config_path, &["init"]);
    run_bids(&config_path, &["import", catalog.to_str().unwrap()]);
    let (stdout, _, success) = run_bids(&config_path, &["import", catalog.to_str().unwrap()]);

    assert!(success);
    assert!(stdout.contains("new items: 0"));
    assert!(stdout.contains("new line items: 0"));
    assert!(stdout.contains("updated line items: 0"));
    assert!(stdout.contains("deleted line items: 0"));
    assert!(stdout.contains("skipped (unchanged): 3"));
}

#[test]
fn test_import_update_and_prune_scenario() {
    let (tmp, config_path) = setup_test_env();
    let first = write_catalog(tmp.path(), "run1.csv", CATALOG_RUN_1);
    let second = write_catalog(tmp.path(), "run2.csv", CATALOG_RUN_2);

    run_bids(&config_path, &["init"]);
    run_bids(&config_path, &["import", first.to_str().unwrap()]);
    let (stdout, _, success) = run_bids(&config_path, &["import", second.to_str().unwrap()]);

    assert!(success);
    assert!(stdout.contains("updated line items: 1"));
    assert!(stdout.contains("skipped (unchanged): 1"));
    assert!(stdout.contains("deleted line items: 1"));
    assert!(stdout.contains("deleted items: 0"));

    // The item survived with two line items.
    let (stats_out, _, _) = run_bids(&config_path, &["stats"]);
    assert!(stats_out.contains("Items:         1"));
    assert!(stats_out.contains("Line items:    2"));
}

#[test]
fn test_placeholder_rows_skipped_and_reported() {
    let (tmp, config_path) = setup_test_env();
    let catalog = write_catalog(
        tmp.path(),
        "catalog.csv",
        "\
Item #,Title,Description,Value
0,Template Row,,
140,Free Item,Nothing to pay.,$0
141,Real Item,Worth having.,$75
",
    );

    run_bids(&config_path, &["init"]);
    let (stdout, _, success) = run_bids(&config_path, &["import", catalog.to_str().unwrap()]);

    assert!(success);
    assert!(stdout.contains("new line items: 1"));
    assert!(stdout.contains("skipped rows: 2"));
    assert!(stdout.contains("placeholder row"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();
    let catalog = write_catalog(tmp.path(), "catalog.csv", CATALOG_RUN_1);

    let (stdout, _, success) = run_bids(
        &config_path,
        &["import", catalog.to_str().unwrap(), "--dry-run"],
    );

    assert!(success);
    assert!(stdout.contains("(dry-run)"));
    assert!(stdout.contains("rows found: 3"));
    assert!(!tmp.path().join("data/bids.sqlite").exists());
}

#[test]
fn test_import_missing_file_fails_cleanly() {
    let (_tmp, config_path) = setup_test_env();

    run_bids(&config_path, &["init"]);
    let (_, stderr, success) = run_bids(&config_path, &["import", "no-such-file.csv"]);

    assert!(!success);
    assert!(stderr.contains("no-such-file.csv"));
}

#[test]
fn test_export_writes_fragment_files() {
    let (tmp, config_path) = setup_test_env();
    let catalog = write_catalog(tmp.path(), "catalog.csv", CATALOG_RUN_1);
    let out_dir = tmp.path().join("fragments");

    run_bids(&config_path, &["init"]);
    run_bids(&config_path, &["import", catalog.to_str().unwrap()]);
    let (_, stderr, success) = run_bids(
        &config_path,
        &["export", "--out", out_dir.to_str().unwrap()],
    );

    assert!(success, "export failed: stderr={}", stderr);
    assert!(stderr.contains("Exported 3 line items"));

    let fragment = fs::read_to_string(out_dir.join("139-1-spa-day.html")).unwrap();
    assert!(fragment.contains("<h2>#139 — Spa Day</h2>"));
    assert!(fragment.contains("<p>Relax and unwind.</p>"));
    assert!(fragment.contains("Fair market value: $250"));

    assert!(out_dir.join("139-2-spa-day-deluxe.html").exists());
    assert!(out_dir.join("139-3-spa-weekend.html").exists());
}
