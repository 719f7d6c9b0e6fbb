#![deny(clippy::all, warnings)]

mod config;
mod context;
mod ops;
mod outcome;
mod process;
mod progress;
mod runner;
mod sync;

pub use crate::config::{AliasConfig, Config, GlobalOptions, SpoolConfig};
pub use crate::context::{CommandContext, CommandGroup, CommandInfo};
pub use crate::ops::{
    list_aliases, sql_create, sql_dump, sql_query, sql_sanitize, CreateRequest, DumpArtifact,
    DumpRequest, QueryRequest, SanitizeRequest,
};
pub use crate::outcome::{
    format_status_message, to_json_response, CommandStatus, ExecutionOutcome, SyncUserError,
};
pub use crate::process::{RunOutput, ShellJob};
pub use crate::progress::ProgressReporter;
pub use crate::runner::{
    CommandRunner, SharedRunner, SimulationRunner, SystemRunner, Target,
};
pub use crate::sync::{sync_preflight, sync_run, SyncRequest, SyncStep};

pub use sitesync_domain::{SanitizeOptions, Severity};
