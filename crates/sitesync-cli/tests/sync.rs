use assert_cmd::cargo::cargo_bin_cmd;

mod common;

use common::{alias_arg, alias_fixture, parse_json, SAME_DATABASE_ALIASES, TWO_LOCAL_ALIASES};

#[test]
fn simulated_sync_records_the_whole_pipeline() {
    let (_temp, aliases) = alias_fixture(TWO_LOCAL_ALIASES);

    let assert = cargo_bin_cmd!("sitesync")
        .args([
            "--aliases",
            &alias_arg(&aliases),
            "--simulate",
            "--json",
            "sync",
            "src",
            "dst",
        ])
        .assert()
        .success();

    let payload = parse_json(&assert);
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["details"]["simulated"], true);
    let planned: Vec<String> = payload["details"]["planned"]
        .as_array()
        .expect("planned array")
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert!(!planned.is_empty());
    assert!(planned[0].contains("sqlite3"), "first step dumps: {planned:?}");
    assert!(planned.iter().any(|line| line.contains("rsync")));
    assert!(planned.iter().any(|line| line.contains("gzip")));
    let dump = payload["details"]["dump"].as_str().unwrap();
    assert!(dump.ends_with(".sql.gz"));
}

#[test]
fn same_database_pair_is_rejected() {
    let (_temp, aliases) = alias_fixture(SAME_DATABASE_ALIASES);

    let assert = cargo_bin_cmd!("sitesync")
        .args([
            "--aliases",
            &alias_arg(&aliases),
            "--json",
            "sync",
            "src",
            "dst",
        ])
        .assert()
        .code(1);

    let payload = parse_json(&assert);
    assert_eq!(payload["status"], "user-error");
    assert_eq!(payload["details"]["reason"], "same_database");
}

#[test]
fn same_database_pair_passes_under_simulate() {
    let (_temp, aliases) = alias_fixture(SAME_DATABASE_ALIASES);

    cargo_bin_cmd!("sitesync")
        .args([
            "--aliases",
            &alias_arg(&aliases),
            "--simulate",
            "--json",
            "sync",
            "src",
            "dst",
        ])
        .assert()
        .success();
}

#[test]
fn unknown_alias_is_a_user_error() {
    let (_temp, aliases) = alias_fixture(TWO_LOCAL_ALIASES);

    let assert = cargo_bin_cmd!("sitesync")
        .args([
            "--aliases",
            &alias_arg(&aliases),
            "--json",
            "sync",
            "nowhere",
            "dst",
        ])
        .assert()
        .code(1);

    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["reason"], "alias_not_found");
}

#[test]
fn alias_without_database_record_is_distinct() {
    let (_temp, aliases) = alias_fixture(
        "[aliases.src]\nhost = \"h\"\n\n[aliases.dst]\n\n[aliases.dst.db]\ndriver = \"sqlite\"\ndatabase = \"/tmp/d.sqlite\"\n",
    );

    let assert = cargo_bin_cmd!("sitesync")
        .args([
            "--aliases",
            &alias_arg(&aliases),
            "--json",
            "sync",
            "src",
            "dst",
        ])
        .assert()
        .code(1);

    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["reason"], "database_missing");
}

#[test]
fn no_dump_requires_a_source_dump_path() {
    let (_temp, aliases) = alias_fixture(TWO_LOCAL_ALIASES);

    let assert = cargo_bin_cmd!("sitesync")
        .args([
            "--aliases",
            &alias_arg(&aliases),
            "--simulate",
            "--json",
            "sync",
            "src",
            "dst",
            "--no-dump",
        ])
        .assert()
        .code(1);

    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["reason"], "missing_source_dump");
}

#[test]
fn no_dump_transfers_the_supplied_dump() {
    let (_temp, aliases) = alias_fixture(TWO_LOCAL_ALIASES);

    let assert = cargo_bin_cmd!("sitesync")
        .args([
            "--aliases",
            &alias_arg(&aliases),
            "--simulate",
            "--json",
            "sync",
            "src",
            "dst",
            "--no-dump",
            "--source-dump",
            "/backups/site.sql",
        ])
        .assert()
        .success();

    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["dump"], "/backups/site.sql");
    let planned = payload["details"]["planned"].as_array().unwrap();
    assert!(planned
        .iter()
        .all(|line| !line.as_str().unwrap().contains(".dump")));
}

#[test]
fn non_interactive_sync_without_yes_is_refused() {
    let (_temp, aliases) = alias_fixture(TWO_LOCAL_ALIASES);

    let assert = cargo_bin_cmd!("sitesync")
        .args([
            "--aliases",
            &alias_arg(&aliases),
            "--json",
            "sync",
            "src",
            "dst",
        ])
        .assert()
        .code(1);

    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["reason"], "confirmation_required");
}
