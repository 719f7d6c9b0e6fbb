use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;
use sitesync_core::Severity;

pub const HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nGlobal options:\n{options}\n";

pub const BEFORE_HELP: &str = concat!(
    "sitesync ",
    env!("CARGO_PKG_VERSION"),
    " – copy a SQL database between site aliases\n\n",
    "\x1b[1;36mCore workflow\x1b[0m\n",
    "  sync             Dump, transfer, and import a database from one alias into another.\n",
    "  sanitize         Scrub passwords, emails, and sessions from a copied database.\n\n",
    "\x1b[1;36mBuilding blocks\x1b[0m\n",
    "  dump             Write a site's database to a SQL file on its host.\n",
    "  query            Run a SQL string or file through a site's client.\n",
    "  create           Drop and recreate a site's database.\n",
    "  aliases          Show what each alias name resolves to.\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "sitesync",
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = BEFORE_HELP,
    help_template = HELP_TEMPLATE
)]
#[allow(clippy::struct_excessive_bools)]
pub struct SiteSyncCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    pub verbose: u8,
    #[arg(long, help = "Force debug logging regardless of -v/-q", global = true)]
    pub debug: bool,
    #[arg(
        long,
        value_name = "NAME",
        value_parser = parse_severity,
        help = "Log filter as a severity name (emergency..debug) or level 0-7",
        global = true
    )]
    pub severity: Option<Severity>,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[arg(
        long,
        help = "Record the commands a run would execute instead of executing them",
        global = true
    )]
    pub simulate: bool,
    #[arg(
        short = 'y',
        long,
        help = "Assume yes for confirmation prompts",
        global = true
    )]
    pub yes: bool,
    #[arg(
        long,
        value_name = "PATH",
        action = ArgAction::Append,
        help = "Additional alias file or directory (repeatable; later files win)",
        global = true
    )]
    pub aliases: Vec<PathBuf>,
    #[command(subcommand)]
    pub command: CommandCli,
}

fn parse_severity(value: &str) -> Result<Severity, String> {
    value.parse::<Severity>().map_err(|err| err.to_string())
}

#[derive(Subcommand, Debug)]
pub enum CommandCli {
    #[command(
        about = "Copy a database from one site alias into another.",
        override_usage = "sitesync sync <SOURCE> <DESTINATION> [OPTIONS]"
    )]
    Sync(SyncArgs),
    #[command(about = "Write a site's database to a SQL file on its host.")]
    Dump(DumpArgs),
    #[command(about = "Run a SQL string or file through a site's client.")]
    Query(QueryArgs),
    #[command(about = "Drop and recreate a site's database.")]
    Create(CreateArgs),
    #[command(about = "Scrub sensitive data from a site's database in place.")]
    Sanitize(SanitizeArgs),
    #[command(about = "Show what each alias name resolves to.")]
    Aliases,
    #[command(about = "Generate shell completions.")]
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct SyncArgs {
    #[arg(help = "Source site alias")]
    pub source: String,
    #[arg(help = "Destination site alias")]
    pub destination: String,
    #[arg(long, help = "Drop and recreate the destination database first")]
    pub create_db: bool,
    #[arg(
        long,
        help = "Transfer an existing dump instead of creating one (requires --source-dump)"
    )]
    pub no_dump: bool,
    #[arg(
        long,
        value_name = "PATH",
        help = "Dump path on the source (the output path, or with --no-dump the existing dump)"
    )]
    pub source_dump: Option<String>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Exact spool path on the destination (skips temp-dir resolution)"
    )]
    pub target_dump: Option<String>,
    #[arg(
        long,
        value_name = "TABLES",
        value_delimiter = ',',
        help = "Tables excluded from the dump entirely"
    )]
    pub skip_tables: Vec<String>,
    #[arg(
        long,
        value_name = "TABLES",
        value_delimiter = ',',
        help = "Tables dumped schema-only"
    )]
    pub structure_tables: Vec<String>,
    #[arg(long, help = "Do not gzip the dump before transfer")]
    pub no_gzip: bool,
    #[arg(
        long,
        help = "Scrub passwords, emails, and sessions after import"
    )]
    pub sanitize: bool,
    #[arg(
        long,
        value_name = "VALUE",
        help = "Replacement password; the literal `no` disables the reset (implies --sanitize)"
    )]
    pub sanitize_password: Option<String>,
    #[arg(
        long,
        value_name = "PATTERN",
        help = "Replacement email; %uid/%mail/%name substitute columns, `no` disables (implies --sanitize)"
    )]
    pub sanitize_email: Option<String>,
    #[arg(
        long,
        value_name = "DIR",
        help = "Spool directory on the destination"
    )]
    pub temp: Option<String>,
    #[arg(
        long,
        value_name = "USER",
        help = "Superuser account for --create-db"
    )]
    pub db_su: Option<String>,
    #[arg(long, value_name = "PASSWORD", help = "Password for --db-su")]
    pub db_su_pw: Option<String>,
    #[arg(
        long,
        help = "Treat cleanup failures and driver limitations as errors"
    )]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    #[arg(help = "Site alias to dump")]
    pub target: String,
    #[arg(long, value_name = "PATH", help = "Write the dump to this path")]
    pub result_file: Option<String>,
    #[arg(
        long,
        value_name = "TABLES",
        value_delimiter = ',',
        help = "Tables excluded from the dump entirely"
    )]
    pub skip_tables: Vec<String>,
    #[arg(
        long,
        value_name = "TABLES",
        value_delimiter = ',',
        help = "Tables dumped schema-only"
    )]
    pub structure_tables: Vec<String>,
    #[arg(long, help = "Do not gzip the finished dump")]
    pub no_gzip: bool,
    #[arg(long, help = "Treat driver limitations as errors")]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[arg(help = "Site alias to query")]
    pub target: String,
    #[arg(help = "SQL to execute")]
    pub sql: Option<String>,
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with = "sql",
        help = "Execute SQL from this file on the target host"
    )]
    pub file: Option<String>,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(help = "Site alias whose database is recreated")]
    pub target: String,
    #[arg(long, value_name = "USER", help = "Superuser account to connect as")]
    pub db_su: Option<String>,
    #[arg(long, value_name = "PASSWORD", help = "Password for --db-su")]
    pub db_su_pw: Option<String>,
}

#[derive(Args, Debug)]
pub struct SanitizeArgs {
    #[arg(help = "Site alias to scrub")]
    pub target: String,
    #[arg(
        long,
        value_name = "VALUE",
        help = "Replacement password; the literal `no` disables the reset"
    )]
    pub sanitize_password: Option<String>,
    #[arg(
        long,
        value_name = "PATTERN",
        help = "Replacement email; %uid/%mail/%name substitute columns, `no` disables"
    )]
    pub sanitize_email: Option<String>,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}
