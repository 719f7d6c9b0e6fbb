use anyhow::Result;
use serde_json::json;
use sitesync_domain::{DbSpec, Driver, SiteAlias};

use crate::context::CommandContext;
use crate::ops::ensure_success;
use crate::outcome::ExecutionOutcome;
use crate::process::ShellJob;
use crate::runner::Target;

#[derive(Clone, Debug)]
pub struct CreateRequest {
    pub target: String,
    pub db_su: Option<String>,
    pub db_su_pw: Option<String>,
}

/// Standalone `create` entry point: drop and recreate the target database.
///
/// # Errors
/// Returns an error when the alias cannot be resolved or an administrative
/// statement fails.
pub fn sql_create(ctx: &CommandContext, request: &CreateRequest) -> Result<ExecutionOutcome> {
    let (alias, db) = ctx.resolve_db(&request.target)?;
    create_database(
        ctx,
        &alias,
        &db,
        request.db_su.as_deref(),
        request.db_su_pw.as_deref(),
    )?;
    Ok(ExecutionOutcome::success(
        format!("created database `{}` for `@{}`", db.database, alias.name),
        json!({
            "alias": alias.name,
            "database": db.database,
            "planned": ctx.planned_commands(),
        }),
    ))
}

/// Drops and recreates the database behind `alias`. On sqlite the database is
/// a file, so creation is removal of that file on the alias's host.
pub(crate) fn create_database(
    ctx: &CommandContext,
    alias: &SiteAlias,
    db: &DbSpec,
    su_user: Option<&str>,
    su_password: Option<&str>,
) -> Result<()> {
    let target = Target::from_alias(alias);
    if db.driver == Driver::Sqlite {
        let job = ShellJob::command("rm").arg("-f").arg(&db.database);
        let output = ctx.runner().invoke(&target, &job)?;
        return ensure_success(&output, "create-db");
    }
    for statement in db.create_statements() {
        let Some(job) = db.admin_job(&statement, su_user, su_password) else {
            continue;
        };
        let output = ctx.runner().invoke(&target, &ShellJob::from(job))?;
        ensure_success(&output, "create-db")?;
    }
    Ok(())
}
