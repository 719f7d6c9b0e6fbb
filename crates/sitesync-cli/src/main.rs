use atty::Stream;
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use sitesync_core::{
    to_json_response, CommandContext, CommandGroup, CommandInfo, CommandStatus, ExecutionOutcome,
    GlobalOptions,
};

mod cli;
mod dispatch;
mod style;

use cli::SiteSyncCli;
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = SiteSyncCli::parse();
    init_tracing(&cli);

    let global = GlobalOptions {
        quiet: cli.quiet,
        verbose: cli.verbose,
        debug: cli.debug,
        json: cli.json,
        simulate: cli.simulate,
        yes: cli.yes,
        aliases: cli
            .aliases
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect(),
    };

    let ctx = CommandContext::new(&global).map_err(|err| eyre!("{err:?}"))?;
    let (info, outcome) = dispatch::dispatch_command(&ctx, &cli)?;
    let code = emit_output(&cli, info, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(cli: &SiteSyncCli) {
    let level = if cli.debug {
        "debug"
    } else if let Some(severity) = cli.severity {
        severity.tracing_directive()
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter =
        format!("sitesync_cli={level},sitesync_core={level},sitesync_domain={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(cli: &SiteSyncCli, info: CommandInfo, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = match outcome.status {
        CommandStatus::Ok => 0,
        CommandStatus::UserError => 1,
        CommandStatus::Failure => 2,
    };

    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        let payload = to_json_response(info, outcome, code);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !cli.quiet {
        if is_passthrough(&outcome.details) {
            if !outcome.message.is_empty() {
                println!("{}", outcome.message);
            }
        } else {
            let message = sitesync_core::format_status_message(info, &outcome.message);
            println!("{}", style.status(&outcome.status, &message));
            if let Some(hint) = hint_from_details(&outcome.details) {
                let hint_line = format!("Hint: {hint}");
                println!("{}", style.info(&hint_line));
            }
            if let Some(table) = render_aliases_table(&style, info, &outcome.details) {
                println!("{table}");
            }
            if cli.simulate {
                for line in planned_from_details(&outcome.details) {
                    println!("{}", style.info(&line));
                }
            }
        }
    }

    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}

fn is_passthrough(details: &Value) -> bool {
    details
        .as_object()
        .and_then(|map| map.get("passthrough"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn planned_from_details(details: &Value) -> Vec<String> {
    details
        .get("planned")
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn render_aliases_table(style: &Style, info: CommandInfo, details: &Value) -> Option<String> {
    if info.group != CommandGroup::Aliases {
        return None;
    }
    let aliases = details.get("aliases")?.as_array()?;
    if aliases.is_empty() {
        return None;
    }

    let mut rows = Vec::new();
    for alias in aliases {
        let obj = alias.as_object()?;
        rows.push(AliasRow {
            name: format!("@{}", obj.get("name")?.as_str()?),
            endpoint: obj.get("endpoint")?.as_str()?.to_string(),
            driver: obj
                .get("driver")
                .and_then(Value::as_str)
                .unwrap_or("-")
                .to_string(),
            database: obj
                .get("database")
                .and_then(Value::as_str)
                .unwrap_or("-")
                .to_string(),
        });
    }

    Some(format_alias_table(style, &rows))
}

struct AliasRow {
    name: String,
    endpoint: String,
    driver: String,
    database: String,
}

fn format_alias_table(style: &Style, rows: &[AliasRow]) -> String {
    let headers = ["Alias", "Endpoint", "Driver", "Database"];
    let mut widths = [
        headers[0].len(),
        headers[1].len(),
        headers[2].len(),
        headers[3].len(),
    ];

    for row in rows {
        widths[0] = widths[0].max(row.name.len());
        widths[1] = widths[1].max(row.endpoint.len());
        widths[2] = widths[2].max(row.driver.len());
        widths[3] = widths[3].max(row.database.len());
    }

    let header_line = format!(
        "{:<width0$}  {:<width1$}  {:<width2$}  {:<width3$}",
        headers[0],
        headers[1],
        headers[2],
        headers[3],
        width0 = widths[0],
        width1 = widths[1],
        width2 = widths[2],
        width3 = widths[3],
    );

    let mut lines = Vec::new();
    lines.push(style.table_header(&header_line));
    lines.push(format!(
        "{:-<width0$}  {:-<width1$}  {:-<width2$}  {:-<width3$}",
        "",
        "",
        "",
        "",
        width0 = widths[0],
        width1 = widths[1],
        width2 = widths[2],
        width3 = widths[3],
    ));

    for row in rows {
        lines.push(format!(
            "{:<width0$}  {:<width1$}  {:<width2$}  {:<width3$}",
            row.name,
            row.endpoint,
            row.driver,
            row.database,
            width0 = widths[0],
            width1 = widths[1],
            width2 = widths[2],
            width3 = widths[3],
        ));
    }

    lines.join("\n")
}
