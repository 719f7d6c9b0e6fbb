#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::assert::Assert;
use serde_json::Value;
use tempfile::TempDir;

pub const TWO_LOCAL_ALIASES: &str = r#"
[aliases.src]

[aliases.src.db]
driver = "sqlite"
database = "/tmp/src-site.sqlite"

[aliases.dst]

[aliases.dst.db]
driver = "sqlite"
database = "/tmp/dst-site.sqlite"
"#;

pub const SAME_DATABASE_ALIASES: &str = r#"
[aliases.src]

[aliases.src.db]
driver = "sqlite"
database = "/tmp/shared.sqlite"

[aliases.dst]

[aliases.dst.db]
driver = "sqlite"
database = "/tmp/shared.sqlite"
"#;

pub fn alias_fixture(contents: &str) -> (TempDir, PathBuf) {
    let temp = tempfile::Builder::new()
        .prefix("sitesync-test")
        .tempdir()
        .expect("tempdir");
    let path = temp.path().join("aliases.toml");
    fs::write(&path, contents).expect("write aliases");
    (temp, path)
}

pub fn alias_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}
