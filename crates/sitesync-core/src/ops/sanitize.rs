use anyhow::Result;
use serde_json::json;
use sitesync_domain::{plan_operations, DbSpec, PostSyncOp, SanitizeOptions, SiteAlias};

use crate::context::CommandContext;
use crate::ops::ensure_success;
use crate::outcome::ExecutionOutcome;
use crate::process::ShellJob;
use crate::progress::ProgressReporter;
use crate::runner::Target;

#[derive(Clone, Debug)]
pub struct SanitizeRequest {
    pub target: String,
    pub options: SanitizeOptions,
}

/// Standalone `sanitize` entry point: scrub an existing database in place.
///
/// # Errors
/// Returns an error when the alias cannot be resolved or a scrub statement
/// fails.
pub fn sql_sanitize(ctx: &CommandContext, request: &SanitizeRequest) -> Result<ExecutionOutcome> {
    let (alias, db) = ctx.resolve_db(&request.target)?;
    let operations = run_sanitize(ctx, &alias, &db, &request.options)?;
    let summary: Vec<_> = operations
        .iter()
        .map(|op| json!({ "id": op.id, "description": op.description, "sql": op.sql }))
        .collect();
    let message = if ctx.simulate() {
        format!(
            "would run {} sanitize operation(s) against `@{}`",
            operations.len(),
            alias.name
        )
    } else {
        format!(
            "ran {} sanitize operation(s) against `@{}`",
            operations.len(),
            alias.name
        )
    };
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "alias": alias.name,
            "operations": summary,
            "planned": ctx.planned_commands(),
        }),
    ))
}

/// Plans the scrub operations for `db` and executes them in order through the
/// target's query client.
pub fn run_sanitize(
    ctx: &CommandContext,
    alias: &SiteAlias,
    db: &DbSpec,
    options: &SanitizeOptions,
) -> Result<Vec<PostSyncOp>> {
    let operations = plan_operations(db, options);
    let target = Target::from_alias(alias);
    let progress = ProgressReporter::bar("Sanitizing database", operations.len());
    for op in &operations {
        tracing::info!(operation = op.id, "{}", op.description);
        let job = ShellJob::from(db.query_job(&op.sql));
        let output = ctx.runner().invoke(&target, &job)?;
        ensure_success(&output, &format!("sanitize ({})", op.id))?;
        progress.increment();
    }
    progress.finish(format!("Sanitized `@{}`", alias.name));
    Ok(operations)
}
