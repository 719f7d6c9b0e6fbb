use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub debug: bool,
    pub json: bool,
    pub simulate: bool,
    pub yes: bool,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub(crate) fn flag_is_enabled(&self, key: &str) -> bool {
        matches!(self.vars.get(key).map(String::as_str), Some("1"))
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug)]
pub struct Config {
    pub(crate) alias: AliasConfig,
    pub(crate) spool: SpoolConfig,
}

impl Config {
    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        let mut search_paths = Vec::new();
        if let Some(dir) = dirs_next::config_dir() {
            search_paths.push(dir.join("sitesync").join("aliases.toml"));
        }
        if let Some(paths) = snapshot.var("SITESYNC_ALIASES") {
            search_paths.extend(
                paths
                    .split(':')
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from),
            );
        }
        Self {
            alias: AliasConfig { search_paths },
            spool: SpoolConfig {
                temp_dir: snapshot.var("SITESYNC_TEMP").map(ToOwned::to_owned),
            },
        }
    }

    #[must_use]
    pub fn alias(&self) -> &AliasConfig {
        &self.alias
    }

    #[must_use]
    pub fn spool(&self) -> &SpoolConfig {
        &self.spool
    }
}

#[derive(Debug)]
pub struct AliasConfig {
    pub search_paths: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct SpoolConfig {
    pub temp_dir: Option<String>,
}
