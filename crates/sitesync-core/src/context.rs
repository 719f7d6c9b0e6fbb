use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use serde_json::json;
use sitesync_domain::{load_alias_files, AliasError, AliasRegistry, DbSpec, SiteAlias};

use crate::config::{Config, EnvSnapshot, GlobalOptions};
use crate::outcome::SyncUserError;
use crate::runner::{CommandRunner, SharedRunner, SimulationRunner, SystemRunner};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandGroup {
    Sync,
    Dump,
    Query,
    Create,
    Sanitize,
    Aliases,
    Completions,
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandGroup::Sync => "sync",
            CommandGroup::Dump => "dump",
            CommandGroup::Query => "query",
            CommandGroup::Create => "create",
            CommandGroup::Sanitize => "sanitize",
            CommandGroup::Aliases => "aliases",
            CommandGroup::Completions => "completions",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CommandInfo {
    pub group: CommandGroup,
    pub name: &'static str,
}

impl CommandInfo {
    #[must_use]
    pub const fn new(group: CommandGroup, name: &'static str) -> Self {
        Self { group, name }
    }
}

pub struct CommandContext<'a> {
    pub global: &'a GlobalOptions,
    env: EnvSnapshot,
    config: Config,
    registry: OnceLock<AliasRegistry>,
    runner: SharedRunner,
    simulation: Option<Arc<SimulationRunner>>,
}

impl<'a> CommandContext<'a> {
    /// Creates a context with the runner implied by the global options: a
    /// recording runner under `--simulate`, the system runner otherwise.
    pub fn new(global: &'a GlobalOptions) -> Result<Self> {
        if global.simulate {
            let simulation = Arc::new(SimulationRunner::new());
            Self::with_runner(global, simulation.clone(), Some(simulation))
        } else {
            Self::with_runner(global, Arc::new(SystemRunner), None)
        }
    }

    pub fn with_runner(
        global: &'a GlobalOptions,
        runner: SharedRunner,
        simulation: Option<Arc<SimulationRunner>>,
    ) -> Result<Self> {
        let env = EnvSnapshot::capture();
        let config = Config::from_snapshot(&env);
        Ok(Self {
            global,
            env,
            config,
            registry: OnceLock::new(),
            runner,
            simulation,
        })
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    #[must_use]
    pub fn simulate(&self) -> bool {
        self.global.simulate
    }

    /// Command lines recorded by the simulation runner; empty otherwise.
    #[must_use]
    pub fn planned_commands(&self) -> Vec<String> {
        self.simulation
            .as_ref()
            .map(|sim| sim.planned())
            .unwrap_or_default()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn env_flag_enabled(&self, key: &str) -> bool {
        self.env.flag_is_enabled(key)
    }

    fn alias_search_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.config.alias().search_paths.clone();
        paths.extend(self.global.aliases.iter().map(PathBuf::from));
        paths
    }

    /// The merged alias registry, loaded on first use.
    pub fn registry(&self) -> Result<&AliasRegistry> {
        if let Some(registry) = self.registry.get() {
            return Ok(registry);
        }
        let loaded = load_alias_files(&self.alias_search_paths()).map_err(user_error)?;
        Ok(self.registry.get_or_init(|| loaded))
    }

    pub fn resolve_alias(&self, name: &str) -> Result<SiteAlias> {
        let alias = self.registry()?.resolve(name).map_err(user_error)?;
        Ok(alias.clone())
    }

    /// Resolves an alias together with its database record, cloned out of the
    /// registry so callers are not tied to its lifetime.
    pub fn resolve_db(&self, name: &str) -> Result<(SiteAlias, DbSpec)> {
        let (alias, db) = self.registry()?.resolve_db(name).map_err(user_error)?;
        Ok((alias.clone(), db.clone()))
    }

    #[cfg(test)]
    pub(crate) fn seed_registry(&self, registry: AliasRegistry) {
        let _ = self.registry.set(registry);
    }
}

fn user_error(err: AliasError) -> anyhow::Error {
    let reason = match &err {
        AliasError::NotFound(_) => "alias_not_found",
        AliasError::DatabaseMissing(_) => "database_missing",
        AliasError::Read { .. } | AliasError::Parse { .. } => "alias_file_invalid",
    };
    SyncUserError::new(
        err.to_string(),
        json!({
            "reason": reason,
            "hint": "check your alias files (`sitesync aliases` lists the registry)",
        }),
    )
    .into()
}
