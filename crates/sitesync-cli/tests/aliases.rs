use assert_cmd::cargo::cargo_bin_cmd;

mod common;

use common::{alias_arg, alias_fixture, parse_json, TWO_LOCAL_ALIASES};

#[test]
fn aliases_lists_the_registry_as_a_table() {
    let (_temp, aliases) = alias_fixture(TWO_LOCAL_ALIASES);

    let assert = cargo_bin_cmd!("sitesync")
        .args(["--aliases", &alias_arg(&aliases), "aliases"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("2 aliases defined"));
    assert!(stdout.contains("@src"));
    assert!(stdout.contains("@dst"));
    assert!(stdout.contains("sqlite"));
}

#[test]
fn aliases_json_reports_each_entry() {
    let (_temp, aliases) = alias_fixture(TWO_LOCAL_ALIASES);

    let assert = cargo_bin_cmd!("sitesync")
        .args(["--aliases", &alias_arg(&aliases), "--json", "aliases"])
        .assert()
        .success();

    let payload = parse_json(&assert);
    let entries = payload["details"]["aliases"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "src");
    assert_eq!(entries[0]["endpoint"], "local");
    assert_eq!(entries[0]["driver"], "sqlite");
}

#[test]
fn later_alias_files_override_earlier_ones() {
    let (_temp, first) = alias_fixture(TWO_LOCAL_ALIASES);
    let (_temp2, second) = alias_fixture(
        "[aliases.src]\nhost = \"override.example.com\"\n\n[aliases.src.db]\ndriver = \"pgsql\"\ndatabase = \"site\"\n",
    );

    let assert = cargo_bin_cmd!("sitesync")
        .args([
            "--aliases",
            &alias_arg(&first),
            "--aliases",
            &alias_arg(&second),
            "--json",
            "aliases",
        ])
        .assert()
        .success();

    let payload = parse_json(&assert);
    let entries = payload["details"]["aliases"].as_array().unwrap();
    let src = entries
        .iter()
        .find(|entry| entry["name"] == "src")
        .expect("src entry");
    assert_eq!(src["endpoint"], "override.example.com");
    assert_eq!(src["driver"], "pgsql");
}
