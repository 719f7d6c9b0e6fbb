use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde_json::json;
use sitesync_domain::{DbSpec, DumpSpec, SiteAlias};

use crate::context::CommandContext;
use crate::ops::ensure_success;
use crate::outcome::{ExecutionOutcome, SyncUserError};
use crate::process::ShellJob;
use crate::progress::ProgressReporter;
use crate::runner::Target;

#[derive(Clone, Debug)]
pub struct DumpRequest {
    pub target: String,
    pub result_file: Option<String>,
    pub skip_tables: Vec<String>,
    pub structure_tables: Vec<String>,
    pub gzip: bool,
    pub strict: bool,
}

/// Where a finished dump landed on the source target.
#[derive(Clone, Debug)]
pub struct DumpArtifact {
    pub path: String,
    pub gzipped: bool,
}

/// Standalone `dump` entry point.
///
/// # Errors
/// Returns an error when the alias cannot be resolved or a dump invocation
/// cannot be executed.
pub fn sql_dump(ctx: &CommandContext, request: &DumpRequest) -> Result<ExecutionOutcome> {
    let (alias, db) = ctx.resolve_db(&request.target)?;
    let spinner = ProgressReporter::spinner(format!("Dumping `@{}`", alias.name));
    let artifact = run_dump(ctx, &alias, &db, request)?;
    spinner.finish(format!("Dump written to {}", artifact.path));
    Ok(ExecutionOutcome::success(
        format!("dump of `@{}` written to {}", alias.name, artifact.path),
        json!({
            "alias": alias.name,
            "path": artifact.path,
            "gzipped": artifact.gzipped,
            "planned": ctx.planned_commands(),
        }),
    ))
}

/// Runs the driver's dump program(s) on the source target and returns the
/// resulting file path there.
pub fn run_dump(
    ctx: &CommandContext,
    alias: &SiteAlias,
    db: &DbSpec,
    request: &DumpRequest,
) -> Result<DumpArtifact> {
    let mut spec = DumpSpec {
        skip_tables: request.skip_tables.clone(),
        structure_tables: request.structure_tables.clone(),
    };
    if !spec.is_empty() && !db.driver.supports_table_filters() {
        if request.strict {
            return Err(SyncUserError::new(
                format!("{} dumps cannot skip or reduce tables", db.driver),
                json!({ "reason": "unsupported_table_filter", "driver": db.driver }),
            )
            .into());
        }
        tracing::warn!(driver = %db.driver, "table filters are not supported, dumping everything");
        spec = DumpSpec::default();
    }

    let path = request
        .result_file
        .clone()
        .unwrap_or_else(|| default_dump_path(alias, db));
    let target = Target::from_alias(alias);
    for pass in db.dump_passes(&spec) {
        let job = ShellJob::from(pass.job).stdout_path(&path, pass.append);
        let output = ctx.runner().invoke(&target, &job)?;
        ensure_success(&output, "dump")?;
    }

    if request.gzip {
        let job = ShellJob::command("gzip").arg("-f").arg(&path);
        let output = ctx.runner().invoke(&target, &job)?;
        ensure_success(&output, "gzip")?;
        return Ok(DumpArtifact {
            path: format!("{path}.gz"),
            gzipped: true,
        });
    }
    Ok(DumpArtifact {
        path,
        gzipped: false,
    })
}

fn default_dump_path(alias: &SiteAlias, db: &DbSpec) -> String {
    let dir = alias.temp_dir.as_deref().unwrap_or("/tmp");
    // For sqlite the database is a file path; use its stem as the dump name.
    let base = db
        .database
        .rsplit('/')
        .next()
        .unwrap_or(&db.database)
        .trim_end_matches(".sqlite");
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{dir}/{base}-{}-{stamp}.sql", std::process::id())
}
