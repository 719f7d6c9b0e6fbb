//! Site aliases: named connection records loaded from TOML alias files.
//!
//! An alias names a site (optionally reachable over ssh) together with the
//! database record the SQL commands operate on. Registries are merged from
//! every file on the search path; a later definition of the same name wins.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::driver::Driver;

#[derive(thiserror::Error, Debug)]
pub enum AliasError {
    #[error("alias `@{0}` is not defined in any alias file")]
    NotFound(String),
    #[error("alias `@{0}` has no database record")]
    DatabaseMissing(String),
    #[error("failed to read alias file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse alias file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml_edit::de::Error,
    },
}

/// Database connection record of a resolved alias. For sqlite, `database` is
/// the path of the database file on the alias's host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DbSpec {
    pub driver: Driver,
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub prefix: Option<String>,
}

/// A named site. Immutable once resolved from the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SiteAlias {
    pub name: String,
    pub host: Option<String>,
    pub user: Option<String>,
    pub ssh_options: Option<String>,
    pub temp_dir: Option<String>,
    pub db: Option<DbSpec>,
}

impl SiteAlias {
    pub fn is_remote(&self) -> bool {
        self.host.is_some()
    }

    /// `user@host` for remote aliases, `None` for local ones.
    pub fn endpoint(&self) -> Option<String> {
        self.host.as_ref().map(|host| match &self.user {
            Some(user) => format!("{user}@{host}"),
            None => host.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct AliasEntry {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    ssh_options: Option<String>,
    #[serde(default)]
    temp_dir: Option<String>,
    #[serde(default)]
    db: Option<DbSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AliasFile {
    #[serde(default)]
    aliases: IndexMap<String, AliasEntry>,
}

/// Strips the customary `@` sigil from an alias reference.
pub fn canonical_name(name: &str) -> &str {
    name.strip_prefix('@').unwrap_or(name)
}

#[derive(Debug, Default)]
pub struct AliasRegistry {
    entries: IndexMap<String, SiteAlias>,
}

impl AliasRegistry {
    pub fn insert(&mut self, alias: SiteAlias) {
        self.entries.insert(alias.name.clone(), alias);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteAlias> {
        self.entries.values()
    }

    pub fn resolve(&self, name: &str) -> Result<&SiteAlias, AliasError> {
        let key = canonical_name(name);
        self.entries
            .get(key)
            .ok_or_else(|| AliasError::NotFound(key.to_string()))
    }

    /// Resolves an alias together with its database record.
    pub fn resolve_db(&self, name: &str) -> Result<(&SiteAlias, &DbSpec), AliasError> {
        let alias = self.resolve(name)?;
        let db = alias
            .db
            .as_ref()
            .ok_or_else(|| AliasError::DatabaseMissing(alias.name.clone()))?;
        Ok((alias, db))
    }
}

/// Loads and merges alias files. Directories contribute their `*.toml`
/// entries in name order; missing search-path entries are skipped silently so
/// the default config location need not exist.
pub fn load_alias_files(paths: &[PathBuf]) -> Result<AliasRegistry, AliasError> {
    let mut registry = AliasRegistry::default();
    for path in paths {
        if path.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(path)
                .map_err(|source| AliasError::Read {
                    path: path.clone(),
                    source,
                })?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
                .collect();
            files.sort();
            for file in files {
                merge_file(&mut registry, &file)?;
            }
        } else if path.is_file() {
            merge_file(&mut registry, path)?;
        } else {
            tracing::debug!(path = %path.display(), "alias path not present, skipping");
        }
    }
    Ok(registry)
}

fn merge_file(registry: &mut AliasRegistry, path: &Path) -> Result<(), AliasError> {
    let contents = fs::read_to_string(path).map_err(|source| AliasError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: AliasFile =
        toml_edit::de::from_str(&contents).map_err(|source| AliasError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    for (name, entry) in file.aliases {
        registry.insert(SiteAlias {
            name,
            host: entry.host,
            user: entry.user,
            ssh_options: entry.ssh_options,
            temp_dir: entry.temp_dir,
            db: entry.db,
        });
    }
    tracing::debug!(path = %path.display(), aliases = registry.len(), "merged alias file");
    Ok(())
}
