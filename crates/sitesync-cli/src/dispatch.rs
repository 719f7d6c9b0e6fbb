use std::io::{self, BufRead, Write};

use atty::Stream;
use clap::CommandFactory;
use color_eyre::Result;
use serde_json::{json, Value};
use sitesync_core::{
    list_aliases, sql_create, sql_dump, sql_query, sql_sanitize, sync_preflight, sync_run,
    CommandContext, CommandGroup, CommandInfo, CommandStatus, CreateRequest, DumpRequest,
    ExecutionOutcome, ProgressReporter, QueryRequest, SanitizeOptions, SanitizeRequest,
    SyncRequest, SyncUserError,
};

use crate::cli::{
    CommandCli, CompletionsArgs, DumpArgs, QueryArgs, SanitizeArgs, SiteSyncCli, SyncArgs,
};

pub fn dispatch_command(
    ctx: &CommandContext,
    cli: &SiteSyncCli,
) -> Result<(CommandInfo, ExecutionOutcome)> {
    match &cli.command {
        CommandCli::Sync(args) => dispatch_sync(ctx, args),
        CommandCli::Dump(args) => {
            let info = CommandInfo::new(CommandGroup::Dump, "dump");
            let request = dump_request_from_args(args);
            core_call(info, || sql_dump(ctx, &request))
        }
        CommandCli::Query(args) => {
            let info = CommandInfo::new(CommandGroup::Query, "query");
            let request = query_request_from_args(args);
            core_call(info, || sql_query(ctx, &request))
        }
        CommandCli::Create(args) => {
            let info = CommandInfo::new(CommandGroup::Create, "create");
            let request = CreateRequest {
                target: args.target.clone(),
                db_su: args.db_su.clone(),
                db_su_pw: args.db_su_pw.clone(),
            };
            core_call(info, || sql_create(ctx, &request))
        }
        CommandCli::Sanitize(args) => {
            let info = CommandInfo::new(CommandGroup::Sanitize, "sanitize");
            let request = sanitize_request_from_args(args);
            core_call(info, || sql_sanitize(ctx, &request))
        }
        CommandCli::Aliases => {
            let info = CommandInfo::new(CommandGroup::Aliases, "aliases");
            core_call_no_spinner(info, || list_aliases(ctx)).map(|outcome| (info, outcome))
        }
        CommandCli::Completions(args) => {
            let info = CommandInfo::new(CommandGroup::Completions, "completions");
            Ok((info, completions_outcome(args)))
        }
    }
}

fn dispatch_sync(
    ctx: &CommandContext,
    args: &SyncArgs,
) -> Result<(CommandInfo, ExecutionOutcome)> {
    let info = CommandInfo::new(CommandGroup::Sync, "sync");
    let request = sync_request_from_args(args);
    let preflight = core_call_no_spinner(info, || sync_preflight(ctx, &request))?;
    if preflight.status != CommandStatus::Ok {
        return Ok((info, preflight));
    }
    match confirm_sync(ctx, &preflight) {
        Confirmation::Proceed => core_call(info, || sync_run(ctx, &request)),
        Confirmation::Declined => Ok((
            info,
            ExecutionOutcome::success(
                "sync cancelled",
                json!({ "reason": "user_declined" }),
            ),
        )),
        Confirmation::CannotPrompt => Ok((
            info,
            ExecutionOutcome::user_error(
                "destructive sync needs confirmation",
                json!({
                    "reason": "confirmation_required",
                    "hint": "pass --yes (or --simulate) in non-interactive runs",
                }),
            ),
        )),
    }
}

enum Confirmation {
    Proceed,
    Declined,
    CannotPrompt,
}

fn confirm_sync(ctx: &CommandContext, preflight: &ExecutionOutcome) -> Confirmation {
    if ctx.global.yes || ctx.simulate() {
        return Confirmation::Proceed;
    }
    if ctx.global.json
        || ctx.env_flag_enabled("CI")
        || !(atty::is(Stream::Stdin) && atty::is(Stream::Stdout))
    {
        return Confirmation::CannotPrompt;
    }
    eprint!(
        "You will destroy data in {} and replace it with data from {}. Continue? (y/N) ",
        side_label(&preflight.details["destination"]),
        side_label(&preflight.details["source"]),
    );
    io::stderr().flush().ok();
    let mut answer = String::new();
    let _ = io::stdin().lock().read_line(&mut answer);
    let accepted = matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    );
    if accepted {
        Confirmation::Proceed
    } else {
        Confirmation::Declined
    }
}

fn side_label(side: &Value) -> String {
    let database = side["database"].as_str().unwrap_or("?");
    let endpoint = side["endpoint"].as_str().unwrap_or("local");
    format!("`{database}` ({endpoint})")
}

fn sync_request_from_args(args: &SyncArgs) -> SyncRequest {
    SyncRequest {
        source: args.source.clone(),
        destination: args.destination.clone(),
        create_db: args.create_db,
        no_dump: args.no_dump,
        source_dump: args.source_dump.clone(),
        target_dump: args.target_dump.clone(),
        skip_tables: args.skip_tables.clone(),
        structure_tables: args.structure_tables.clone(),
        gzip: !args.no_gzip,
        sanitize: sanitize_options(
            args.sanitize,
            args.sanitize_password.as_deref(),
            args.sanitize_email.as_deref(),
        ),
        temp: args.temp.clone(),
        db_su: args.db_su.clone(),
        db_su_pw: args.db_su_pw.clone(),
        strict: args.strict,
    }
}

fn dump_request_from_args(args: &DumpArgs) -> DumpRequest {
    DumpRequest {
        target: args.target.clone(),
        result_file: args.result_file.clone(),
        skip_tables: args.skip_tables.clone(),
        structure_tables: args.structure_tables.clone(),
        gzip: !args.no_gzip,
        strict: args.strict,
    }
}

fn query_request_from_args(args: &QueryArgs) -> QueryRequest {
    QueryRequest {
        target: args.target.clone(),
        sql: args.sql.clone(),
        file: args.file.clone(),
    }
}

fn sanitize_request_from_args(args: &SanitizeArgs) -> SanitizeRequest {
    SanitizeRequest {
        target: args.target.clone(),
        options: sanitize_options(
            true,
            args.sanitize_password.as_deref(),
            args.sanitize_email.as_deref(),
        )
        .unwrap_or_default(),
    }
}

/// An explicit sanitize value implies `--sanitize`; unset values fall back to
/// the defaults.
fn sanitize_options(
    enabled: bool,
    password: Option<&str>,
    email: Option<&str>,
) -> Option<SanitizeOptions> {
    if !enabled && password.is_none() && email.is_none() {
        return None;
    }
    let defaults = SanitizeOptions::defaults();
    Some(SanitizeOptions {
        password: password.map(ToOwned::to_owned).or(defaults.password),
        email: email.map(ToOwned::to_owned).or(defaults.email),
    })
}

fn completions_outcome(args: &CompletionsArgs) -> ExecutionOutcome {
    let mut command = SiteSyncCli::command();
    clap_complete::generate(args.shell, &mut command, "sitesync", &mut io::stdout());
    ExecutionOutcome::success(
        String::new(),
        json!({ "shell": args.shell.to_string(), "passthrough": true }),
    )
}

fn core_call<F>(
    info: CommandInfo,
    action: F,
) -> Result<(CommandInfo, ExecutionOutcome)>
where
    F: FnOnce() -> anyhow::Result<ExecutionOutcome>,
{
    let _spinner = ProgressReporter::spinner(format!("Running {}", info.name));
    core_call_no_spinner(info, action).map(|outcome| (info, outcome))
}

fn core_call_no_spinner<F>(_info: CommandInfo, action: F) -> Result<ExecutionOutcome>
where
    F: FnOnce() -> anyhow::Result<ExecutionOutcome>,
{
    match action() {
        Ok(result) => Ok(result),
        Err(err) => {
            if let Some(user) = err.downcast_ref::<SyncUserError>() {
                Ok(ExecutionOutcome::user_error(
                    user.message().to_string(),
                    user.details().clone(),
                ))
            } else {
                let issues: Vec<String> =
                    err.chain().map(std::string::ToString::to_string).collect();
                Ok(ExecutionOutcome::failure(
                    err.to_string(),
                    json!({
                        "reason": "internal_error",
                        "error": err.to_string(),
                        "issues": issues,
                        "hint": "Re-run with `--debug` for more detail, or open an issue if this persists.",
                    }),
                ))
            }
        }
    }
}
