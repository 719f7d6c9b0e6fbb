use anyhow::Result;
use serde_json::json;

use crate::context::CommandContext;
use crate::outcome::{ExecutionOutcome, SyncUserError};
use crate::process::ShellJob;
use crate::runner::Target;

#[derive(Clone, Debug)]
pub struct QueryRequest {
    pub target: String,
    pub sql: Option<String>,
    pub file: Option<String>,
}

/// Runs one SQL string or file through the target's client.
///
/// # Errors
/// Returns an error when the alias cannot be resolved, neither (or both) of
/// the SQL sources is given, or the client cannot be executed.
pub fn sql_query(ctx: &CommandContext, request: &QueryRequest) -> Result<ExecutionOutcome> {
    let (alias, db) = ctx.resolve_db(&request.target)?;
    let target = Target::from_alias(&alias);
    let job = match (&request.sql, &request.file) {
        (Some(sql), None) => ShellJob::from(db.query_job(sql)),
        (None, Some(path)) => ShellJob::from(db.connect_job()).stdin_path(path),
        _ => {
            return Err(SyncUserError::new(
                "pass exactly one of a SQL string or --file",
                json!({ "reason": "missing_query" }),
            )
            .into())
        }
    };
    let output = ctx.runner().invoke(&target, &job)?;
    if !output.success() {
        return Ok(ExecutionOutcome::failure(
            format!("query against `@{}` failed", alias.name),
            json!({
                "alias": alias.name,
                "code": output.code,
                "stderr": output.stderr.trim(),
            }),
        ));
    }
    let stdout = output.stdout.trim_end();
    let message = if stdout.is_empty() {
        format!("query against `@{}` executed", alias.name)
    } else {
        stdout.to_string()
    };
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "alias": alias.name,
            "stdout": stdout,
            "planned": ctx.planned_commands(),
        }),
    ))
}
