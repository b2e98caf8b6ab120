use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ploutos(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ploutos").unwrap();
    cmd.env("HOME", home.path()).env("RUST_LOG", "warn");
    cmd
}

fn init(home: &TempDir) {
    let data_dir = home.path().join("data");
    ploutos(home)
        .args(["init", "--data-dir", data_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized ploutos"));
}

fn run(home: &TempDir, args: &[&str]) {
    ploutos(home).args(args).assert().success();
}

#[test]
fn test_status_before_init() {
    let home = tempfile::tempdir().unwrap();
    ploutos(&home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Database not found"));
}

#[test]
fn test_categorize_end_to_end() {
    let home = tempfile::tempdir().unwrap();
    init(&home);
    // Unknown is account 1
    run(&home, &["accounts", "add", "Checking", "--category", "Banque", "--sub-category", "Courant", "--real"]);
    run(&home, &["accounts", "add", "Courses", "--category", "Dépenses", "--sub-category", "Alimentation"]);
    run(&home, &[
        "transactions", "add", "--account", "2", "--amount", "42.00", "--type", "debit",
        "--date", "2024-03-02", "CB CARREFOUR MARKET",
    ]);
    run(&home, &["rules", "add", "Groceries", "--when", "contains:carrefour", "--split", "3:100", "--priority", "10"]);

    ploutos(&home)
        .args(["rules", "preview", "1", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_matches\": 1"));

    ploutos(&home)
        .args(["process", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"categorized\": 1"))
        .stdout(predicate::str::contains("\"matched_rule\": \"Groceries\""));

    ploutos(&home)
        .args(["stats", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_uncategorized_transactions\": 0"));
}

#[test]
fn test_invalid_rule_is_refused() {
    let home = tempfile::tempdir().unwrap();
    init(&home);
    run(&home, &["accounts", "add", "Courses", "--category", "Dépenses", "--sub-category", "Alimentation"]);
    ploutos(&home)
        .args(["rules", "add", "Half", "--when", "contains:x", "--split", "2:50"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_transfer_merge_and_reject() {
    let home = tempfile::tempdir().unwrap();
    init(&home);
    run(&home, &["accounts", "add", "Checking", "--category", "Banque", "--sub-category", "Courant", "--real"]);
    run(&home, &["accounts", "add", "Savings", "--category", "Banque", "--sub-category", "Livret A", "--real"]);
    run(&home, &[
        "transactions", "add", "--account", "2", "--amount", "500", "--type", "debit",
        "--date", "2024-03-04", "VIR LIVRET A",
    ]);
    run(&home, &[
        "transactions", "add", "--account", "3", "--amount", "500", "--type", "credit",
        "--date", "2024-03-05", "VIR LIVRET A",
    ]);

    ploutos(&home)
        .args(["transfers", "candidates", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"confidence\""));

    run(&home, &["transfers", "merge", "2", "1"]);

    ploutos(&home)
        .args(["transfers", "candidates"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transfer candidates (0)"));

    ploutos(&home)
        .args(["transfers", "merge", "2", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already merged"));

    run(&home, &[
        "transactions", "add", "--account", "2", "--amount", "750", "--type", "debit",
        "--date", "2024-04-01", "LOYER AVRIL",
    ]);
    run(&home, &[
        "transactions", "add", "--account", "3", "--amount", "750", "--type", "credit",
        "--date", "2024-04-02", "REMBOURSEMENT",
    ]);

    ploutos(&home)
        .args(["transfers", "reject", "3", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected a credit"));

    run(&home, &["transfers", "reject", "4", "3", "--reason", "loyer"]);
    ploutos(&home)
        .args(["transfers", "reject", "4", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already rejected"));
}
