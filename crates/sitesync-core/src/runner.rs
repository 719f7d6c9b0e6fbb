use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use sitesync_domain::SiteAlias;

use crate::process::{run_job, RunOutput, ShellJob};

/// Where a job executes: this host, or a remote endpoint reached over ssh.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Target {
    pub host: Option<String>,
    pub user: Option<String>,
    pub ssh_options: Option<String>,
}

impl Target {
    #[must_use]
    pub fn local() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_alias(alias: &SiteAlias) -> Self {
        Self {
            host: alias.host.clone(),
            user: alias.user.clone(),
            ssh_options: alias.ssh_options.clone(),
        }
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.host.is_some()
    }

    fn endpoint(&self) -> Option<String> {
        self.host.as_ref().map(|host| match &self.user {
            Some(user) => format!("{user}@{host}"),
            None => host.clone(),
        })
    }

    #[must_use]
    pub fn label(&self) -> String {
        self.endpoint().unwrap_or_else(|| "local".to_string())
    }
}

/// Every external call the pipeline makes goes through this seam, so tests
/// can substitute a scripted implementation.
pub trait CommandRunner: Send + Sync {
    fn invoke(&self, target: &Target, job: &ShellJob) -> Result<RunOutput>;
}

pub type SharedRunner = Arc<dyn CommandRunner>;

/// Executes jobs for real: directly for local targets, wrapped in `ssh` for
/// remote ones.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn invoke(&self, target: &Target, job: &ShellJob) -> Result<RunOutput> {
        let executed = match target.endpoint() {
            Some(endpoint) => {
                let mut ssh = ShellJob::command("ssh");
                if let Some(options) = &target.ssh_options {
                    for option in options.split_whitespace() {
                        ssh = ssh.arg(option);
                    }
                }
                ssh.arg(endpoint).arg(job.rendered())
            }
            None => job.clone(),
        };
        which::which(&executed.program)
            .with_context(|| format!("`{}` not found on PATH", executed.program))?;
        tracing::debug!(target = %target.label(), command = %job.rendered(), "invoking");
        run_job(&executed, Path::new("."))
    }
}

/// Records the rendered command lines instead of executing anything; every
/// invocation reports success with empty output.
#[derive(Default)]
pub struct SimulationRunner {
    planned: Mutex<Vec<String>>,
}

impl SimulationRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn planned(&self) -> Vec<String> {
        self.planned.lock().expect("simulation lock").clone()
    }
}

impl CommandRunner for SimulationRunner {
    fn invoke(&self, target: &Target, job: &ShellJob) -> Result<RunOutput> {
        let line = format!("[{}] {}", target.label(), job.rendered());
        tracing::info!("simulate: {line}");
        self.planned.lock().expect("simulation lock").push(line);
        Ok(RunOutput {
            code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
