//! The sync pipeline: create-db, dump, locate the destination spool
//! directory, transfer, import, sanitize. Steps run strictly in order; the
//! first failure ends the pipeline with an outcome naming the step.

use std::fmt;

use anyhow::Result;
use serde_json::{json, Value};
use sitesync_domain::{DbSpec, SanitizeOptions, SiteAlias};

use crate::context::CommandContext;
use crate::ops::{self, DumpRequest};
use crate::outcome::{ExecutionOutcome, SyncUserError};
use crate::process::ShellJob;
use crate::runner::Target;

#[derive(Clone, Debug)]
pub struct SyncRequest {
    pub source: String,
    pub destination: String,
    pub create_db: bool,
    pub no_dump: bool,
    pub source_dump: Option<String>,
    pub target_dump: Option<String>,
    pub skip_tables: Vec<String>,
    pub structure_tables: Vec<String>,
    pub gzip: bool,
    pub sanitize: Option<SanitizeOptions>,
    pub temp: Option<String>,
    pub db_su: Option<String>,
    pub db_su_pw: Option<String>,
    pub strict: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStep {
    CreateDb,
    Dump,
    TempDir,
    Transfer,
    Import,
    Sanitize,
}

impl SyncStep {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStep::CreateDb => "create-db",
            SyncStep::Dump => "dump",
            SyncStep::TempDir => "temp-dir",
            SyncStep::Transfer => "transfer",
            SyncStep::Import => "import",
            SyncStep::Sanitize => "sanitize",
        }
    }
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves both sides and checks the request before anything runs. The
/// returned outcome carries the resolved summaries the confirmation prompt
/// shows.
///
/// # Errors
/// Returns a user-facing error for unknown aliases, missing database records,
/// a missing `--source-dump` under `--no-dump`, or both sides resolving to
/// the same database outside simulate mode.
pub fn sync_preflight(ctx: &CommandContext, request: &SyncRequest) -> Result<ExecutionOutcome> {
    let (source, source_db, destination, destination_db) = validated(ctx, request)?;
    Ok(ExecutionOutcome::success(
        format!(
            "ready to sync `@{}` into `@{}`",
            source.name, destination.name
        ),
        json!({
            "source": side_summary(&source, &source_db),
            "destination": side_summary(&destination, &destination_db),
        }),
    ))
}

/// Runs the pipeline. Step failures become `Failure` outcomes tagged with the
/// step name; validation problems surface as user errors.
///
/// # Errors
/// Returns an error when alias resolution fails or a runner invocation cannot
/// be attempted at all.
pub fn sync_run(ctx: &CommandContext, request: &SyncRequest) -> Result<ExecutionOutcome> {
    let (source, source_db, destination, destination_db) = validated(ctx, request)?;
    let source_target = Target::from_alias(&source);
    let destination_target = Target::from_alias(&destination);

    if request.create_db {
        if let Err(err) = ops::create_database(
            ctx,
            &destination,
            &destination_db,
            request.db_su.as_deref(),
            request.db_su_pw.as_deref(),
        ) {
            return Ok(step_failure(SyncStep::CreateDb, &err));
        }
    }

    let (dump_path, generated) = if request.no_dump {
        // Validated above: --no-dump always carries --source-dump.
        (request.source_dump.clone().unwrap_or_default(), false)
    } else {
        let dump_request = DumpRequest {
            target: request.source.clone(),
            result_file: request.source_dump.clone(),
            skip_tables: request.skip_tables.clone(),
            structure_tables: request.structure_tables.clone(),
            gzip: request.gzip,
            strict: request.strict,
        };
        match ops::run_dump(ctx, &source, &source_db, &dump_request) {
            Ok(artifact) => (artifact.path, true),
            Err(err) => return Ok(step_failure(SyncStep::Dump, &err)),
        }
    };

    let spool_path = match &request.target_dump {
        Some(path) => path.clone(),
        None => {
            let spool_dir = resolve_spool_dir(ctx, &destination, request.temp.as_deref());
            let file_name = dump_path.rsplit('/').next().unwrap_or(&dump_path);
            format!("{spool_dir}/{file_name}")
        }
    };

    let transfer = ShellJob::command("rsync")
        .arg("-az")
        .arg(remote_spec(&source, &dump_path))
        .arg(remote_spec(&destination, &spool_path));
    if let Err(err) = invoke_checked(ctx, &Target::local(), &transfer, "transfer") {
        return Ok(step_failure(SyncStep::Transfer, &err));
    }
    if generated {
        if let Err(err) = remove_artifact(ctx, &source_target, &dump_path, request.strict) {
            return Ok(step_failure(SyncStep::Transfer, &err));
        }
    }

    let import_path = if spool_path.ends_with(".gz") {
        let gunzip = ShellJob::command("gzip").arg("-d").arg("-f").arg(&spool_path);
        if let Err(err) = invoke_checked(ctx, &destination_target, &gunzip, "gunzip") {
            return Ok(step_failure(SyncStep::Import, &err));
        }
        spool_path.trim_end_matches(".gz").to_string()
    } else {
        spool_path.clone()
    };
    let import = ShellJob::from(destination_db.connect_job()).stdin_path(&import_path);
    if let Err(err) = invoke_checked(ctx, &destination_target, &import, "import") {
        return Ok(step_failure(SyncStep::Import, &err));
    }
    if let Err(err) = remove_artifact(ctx, &destination_target, &import_path, request.strict) {
        return Ok(step_failure(SyncStep::Import, &err));
    }

    let mut sanitize_summary = Vec::new();
    if let Some(options) = &request.sanitize {
        match ops::run_sanitize(ctx, &destination, &destination_db, options) {
            Ok(operations) => {
                sanitize_summary = operations
                    .iter()
                    .map(|op| op.description.clone())
                    .collect();
            }
            Err(err) => return Ok(step_failure(SyncStep::Sanitize, &err)),
        }
    }

    let message = if ctx.simulate() {
        format!(
            "simulated sync of `@{}` into `@{}`",
            source.name, destination.name
        )
    } else {
        format!("synced `@{}` into `@{}`", source.name, destination.name)
    };
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "source": side_summary(&source, &source_db),
            "destination": side_summary(&destination, &destination_db),
            "dump": dump_path,
            "spooled": spool_path,
            "sanitize": sanitize_summary,
            "simulated": ctx.simulate(),
            "planned": ctx.planned_commands(),
        }),
    ))
}

fn validated(
    ctx: &CommandContext,
    request: &SyncRequest,
) -> Result<(SiteAlias, DbSpec, SiteAlias, DbSpec)> {
    let (source, source_db) = ctx.resolve_db(&request.source)?;
    let (destination, destination_db) = ctx.resolve_db(&request.destination)?;
    if request.no_dump && request.source_dump.is_none() {
        return Err(SyncUserError::new(
            "--no-dump requires --source-dump to name the existing dump",
            json!({ "reason": "missing_source_dump" }),
        )
        .into());
    }
    if !ctx.simulate() && same_database(&source, &source_db, &destination, &destination_db) {
        return Err(SyncUserError::new(
            format!(
                "source `@{}` and destination `@{}` resolve to the same database `{}`",
                source.name, destination.name, destination_db.database
            ),
            json!({
                "reason": "same_database",
                "database": destination_db.database,
                "host": destination.host,
            }),
        )
        .into());
    }
    Ok((source, source_db, destination, destination_db))
}

fn same_database(
    source: &SiteAlias,
    source_db: &DbSpec,
    destination: &SiteAlias,
    destination_db: &DbSpec,
) -> bool {
    source_db.driver == destination_db.driver
        && source_db.database == destination_db.database
        && source.host == destination.host
        && source_db.host == destination_db.host
}

fn side_summary(alias: &SiteAlias, db: &DbSpec) -> Value {
    json!({
        "alias": alias.name,
        "endpoint": alias.endpoint().unwrap_or_else(|| "local".to_string()),
        "driver": db.driver,
        "database": db.database,
    })
}

fn step_failure(step: SyncStep, err: &anyhow::Error) -> ExecutionOutcome {
    ExecutionOutcome::failure(
        format!("sync step `{step}` failed: {err}"),
        json!({
            "reason": "step_failed",
            "step": step.as_str(),
            "error": format!("{err:#}"),
        }),
    )
}

/// The directory the dump is spooled into on the destination. Resolution
/// failures fall back to `/tmp` with a warning; this step never aborts the
/// pipeline.
fn resolve_spool_dir(ctx: &CommandContext, destination: &SiteAlias, temp: Option<&str>) -> String {
    if let Some(dir) = temp {
        return dir.to_string();
    }
    if let Some(dir) = &destination.temp_dir {
        return dir.clone();
    }
    if let Some(dir) = &ctx.config().spool().temp_dir {
        return dir.clone();
    }
    if ctx.simulate() {
        return "/tmp".to_string();
    }
    let mktemp = ShellJob::command("mktemp").arg("-d");
    match ctx.runner().invoke(&Target::from_alias(destination), &mktemp) {
        Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
            output.stdout.trim().to_string()
        }
        Ok(output) => {
            tracing::warn!(
                code = output.code,
                "mktemp on `@{}` failed, falling back to /tmp",
                destination.name
            );
            "/tmp".to_string()
        }
        Err(err) => {
            tracing::warn!(
                "could not resolve a temp directory on `@{}` ({err}), falling back to /tmp",
                destination.name
            );
            "/tmp".to_string()
        }
    }
}

fn remote_spec(alias: &SiteAlias, path: &str) -> String {
    match alias.endpoint() {
        Some(endpoint) => format!("{endpoint}:{path}"),
        None => path.to_string(),
    }
}

fn invoke_checked(
    ctx: &CommandContext,
    target: &Target,
    job: &ShellJob,
    what: &str,
) -> Result<()> {
    let output = ctx.runner().invoke(target, job)?;
    ops::ensure_success(&output, what)
}

/// Removes a spent dump artifact. Failures are warnings unless `strict`.
fn remove_artifact(
    ctx: &CommandContext,
    target: &Target,
    path: &str,
    strict: bool,
) -> Result<()> {
    let job = ShellJob::command("rm").arg("-f").arg(path);
    let result = invoke_checked(ctx, target, &job, "cleanup");
    match result {
        Ok(()) => Ok(()),
        Err(err) if strict => Err(err),
        Err(err) => {
            tracing::warn!(path, "cleanup failed: {err}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::config::GlobalOptions;
    use crate::outcome::CommandStatus;
    use crate::process::RunOutput;
    use crate::runner::CommandRunner;
    use sitesync_domain::{AliasRegistry, Driver};

    #[derive(Default)]
    struct ScriptedRunner {
        calls: Mutex<Vec<String>>,
        fail_program: Option<String>,
    }

    impl ScriptedRunner {
        fn failing(program: &str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_program: Some(program.to_string()),
            }
        }

        fn programs(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn invoke(&self, _target: &Target, job: &ShellJob) -> anyhow::Result<RunOutput> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(job.program.clone());
            if self.fail_program.as_deref() == Some(job.program.as_str()) {
                return Ok(RunOutput {
                    code: 1,
                    stdout: String::new(),
                    stderr: "scripted failure".to_string(),
                });
            }
            let stdout = if job.program == "mktemp" {
                "/spool\n".to_string()
            } else {
                String::new()
            };
            Ok(RunOutput {
                code: 0,
                stdout,
                stderr: String::new(),
            })
        }
    }

    fn alias(name: &str, database: &str) -> SiteAlias {
        SiteAlias {
            name: name.to_string(),
            host: None,
            user: None,
            ssh_options: None,
            temp_dir: None,
            db: Some(DbSpec {
                driver: Driver::Mysql,
                database: database.to_string(),
                username: Some("admin".to_string()),
                password: Some("secret".to_string()),
                host: None,
                port: None,
                prefix: None,
            }),
        }
    }

    fn registry(source_db: &str, destination_db: &str) -> AliasRegistry {
        let mut registry = AliasRegistry::default();
        registry.insert(alias("src", source_db));
        registry.insert(alias("dst", destination_db));
        registry
    }

    fn request() -> SyncRequest {
        SyncRequest {
            source: "src".to_string(),
            destination: "dst".to_string(),
            create_db: false,
            no_dump: false,
            source_dump: None,
            target_dump: None,
            skip_tables: Vec::new(),
            structure_tables: Vec::new(),
            gzip: true,
            sanitize: None,
            temp: None,
            db_su: None,
            db_su_pw: None,
            strict: false,
        }
    }

    fn context_with<'a>(
        global: &'a GlobalOptions,
        runner: Arc<ScriptedRunner>,
        source_db: &str,
        destination_db: &str,
    ) -> CommandContext<'a> {
        let ctx = CommandContext::with_runner(global, runner, None).expect("context");
        ctx.seed_registry(registry(source_db, destination_db));
        ctx
    }

    #[test]
    fn happy_path_invokes_the_full_pipeline_in_order() {
        let global = GlobalOptions::default();
        let runner = Arc::new(ScriptedRunner::default());
        let ctx = context_with(&global, runner.clone(), "a", "b");

        let outcome = sync_run(&ctx, &request()).expect("sync");
        assert_eq!(outcome.status, CommandStatus::Ok);
        assert_eq!(
            runner.programs(),
            vec![
                "mysqldump", // dump
                "gzip",      // compress
                "mktemp",    // destination spool dir
                "rsync",     // transfer
                "rm",        // source-side cleanup
                "gzip",      // gunzip on destination
                "mysql",     // import
                "rm",        // destination spool cleanup
            ]
        );
        let dump = outcome.details["dump"].as_str().unwrap();
        let spooled = outcome.details["spooled"].as_str().unwrap();
        assert!(dump.ends_with(".sql.gz"), "dump path: {dump}");
        assert!(spooled.starts_with("/spool/"), "spooled path: {spooled}");
    }

    #[test]
    fn failed_dump_stops_the_pipeline() {
        let global = GlobalOptions::default();
        let runner = Arc::new(ScriptedRunner::failing("mysqldump"));
        let ctx = context_with(&global, runner.clone(), "a", "b");

        let outcome = sync_run(&ctx, &request()).expect("sync");
        assert_eq!(outcome.status, CommandStatus::Failure);
        assert_eq!(outcome.details["reason"], "step_failed");
        assert_eq!(outcome.details["step"], "dump");
        assert_eq!(runner.programs(), vec!["mysqldump"]);
    }

    #[test]
    fn failed_transfer_leaves_import_uninvoked() {
        let global = GlobalOptions::default();
        let runner = Arc::new(ScriptedRunner::failing("rsync"));
        let ctx = context_with(&global, runner.clone(), "a", "b");

        let outcome = sync_run(&ctx, &request()).expect("sync");
        assert_eq!(outcome.details["step"], "transfer");
        let programs = runner.programs();
        assert!(programs.contains(&"rsync".to_string()));
        assert!(!programs.contains(&"mysql".to_string()));
    }

    #[test]
    fn no_dump_uses_the_supplied_path_and_skips_the_dump_program() {
        let global = GlobalOptions::default();
        let runner = Arc::new(ScriptedRunner::default());
        let ctx = context_with(&global, runner.clone(), "a", "b");

        let mut req = request();
        req.no_dump = true;
        req.source_dump = Some("/backups/site.sql".to_string());
        let outcome = sync_run(&ctx, &req).expect("sync");
        assert_eq!(outcome.status, CommandStatus::Ok);
        let programs = runner.programs();
        assert!(!programs.contains(&"mysqldump".to_string()));
        // Not generated by this run, so the source copy stays put and the
        // uncompressed file needs no gunzip.
        assert_eq!(programs.iter().filter(|p| *p == "rm").count(), 1);
        assert_eq!(outcome.details["dump"], "/backups/site.sql");
    }

    #[test]
    fn no_dump_without_source_dump_is_a_user_error() {
        let global = GlobalOptions::default();
        let runner = Arc::new(ScriptedRunner::default());
        let ctx = context_with(&global, runner, "a", "b");

        let mut req = request();
        req.no_dump = true;
        let err = sync_run(&ctx, &req).unwrap_err();
        let user = err.downcast_ref::<SyncUserError>().expect("user error");
        assert_eq!(user.details()["reason"], "missing_source_dump");
    }

    #[test]
    fn same_database_fails_validation_outside_simulate() {
        let global = GlobalOptions::default();
        let runner = Arc::new(ScriptedRunner::default());
        let ctx = context_with(&global, runner, "same", "same");

        let err = sync_preflight(&ctx, &request()).unwrap_err();
        let user = err.downcast_ref::<SyncUserError>().expect("user error");
        assert_eq!(user.details()["reason"], "same_database");
    }

    #[test]
    fn same_database_passes_under_simulate() {
        let global = GlobalOptions {
            simulate: true,
            ..GlobalOptions::default()
        };
        let ctx = CommandContext::new(&global).expect("context");
        ctx.seed_registry(registry("same", "same"));

        let outcome = sync_preflight(&ctx, &request()).expect("preflight");
        assert_eq!(outcome.status, CommandStatus::Ok);
    }

    #[test]
    fn sanitize_runs_after_import() {
        let global = GlobalOptions::default();
        let runner = Arc::new(ScriptedRunner::default());
        let ctx = context_with(&global, runner.clone(), "a", "b");

        let mut req = request();
        req.sanitize = Some(SanitizeOptions::defaults());
        let outcome = sync_run(&ctx, &req).expect("sync");
        assert_eq!(outcome.status, CommandStatus::Ok);
        assert_eq!(outcome.details["sanitize"].as_array().unwrap().len(), 3);
        let programs = runner.programs();
        // Import plus the three scrub statements all go through mysql.
        assert_eq!(programs.iter().filter(|p| *p == "mysql").count(), 4);
        let import_at = programs.iter().position(|p| p == "mysql").unwrap();
        assert!(programs[..import_at].contains(&"rsync".to_string()));
    }

    #[test]
    fn create_db_runs_first() {
        let global = GlobalOptions::default();
        let runner = Arc::new(ScriptedRunner::default());
        let ctx = context_with(&global, runner.clone(), "a", "b");

        let mut req = request();
        req.create_db = true;
        sync_run(&ctx, &req).expect("sync");
        let programs = runner.programs();
        // Two administrative statements before the dump starts.
        assert_eq!(programs[..3], ["mysql", "mysql", "mysqldump"]);
    }

    #[test]
    fn cleanup_failure_is_a_warning_unless_strict() {
        let global = GlobalOptions::default();
        let runner = Arc::new(ScriptedRunner::failing("rm"));
        let ctx = context_with(&global, runner.clone(), "a", "b");

        let outcome = sync_run(&ctx, &request()).expect("sync");
        assert_eq!(outcome.status, CommandStatus::Ok);
        assert!(runner.programs().contains(&"mysql".to_string()));

        let runner = Arc::new(ScriptedRunner::failing("rm"));
        let ctx = context_with(&global, runner.clone(), "a", "b");
        let mut req = request();
        req.strict = true;
        let outcome = sync_run(&ctx, &req).expect("sync");
        assert_eq!(outcome.status, CommandStatus::Failure);
        assert_eq!(outcome.details["step"], "transfer");
        assert!(!runner.programs().contains(&"mysql".to_string()));
    }

    #[test]
    fn explicit_temp_skips_mktemp() {
        let global = GlobalOptions::default();
        let runner = Arc::new(ScriptedRunner::default());
        let ctx = context_with(&global, runner.clone(), "a", "b");

        let mut req = request();
        req.temp = Some("/var/spool".to_string());
        let outcome = sync_run(&ctx, &req).expect("sync");
        assert!(!runner.programs().contains(&"mktemp".to_string()));
        assert!(outcome.details["spooled"]
            .as_str()
            .unwrap()
            .starts_with("/var/spool/"));
    }
}
