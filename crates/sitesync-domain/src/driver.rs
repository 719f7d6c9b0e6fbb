//! Driver-specific construction: client command lines, dump invocations, and
//! the SQL fragments whose spelling differs between database families.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::alias::DbSpec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Mysql,
    Pgsql,
    Sqlite,
}

impl<'de> Deserialize<'de> for Driver {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown database driver `{0}` (expected mysql, pgsql, or sqlite)")]
pub struct ParseDriverError(pub String);

impl FromStr for Driver {
    type Err = ParseDriverError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "mysql" | "mysqli" => Ok(Driver::Mysql),
            "pgsql" | "postgres" | "postgresql" => Ok(Driver::Pgsql),
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            other => Err(ParseDriverError(other.to_string())),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Driver {
    pub fn as_str(self) -> &'static str {
        match self {
            Driver::Mysql => "mysql",
            Driver::Pgsql => "pgsql",
            Driver::Sqlite => "sqlite",
        }
    }

    /// Whether the dump program can exclude tables or dump them schema-only.
    /// sqlite's `.dump` is all-or-nothing.
    pub fn supports_table_filters(self) -> bool {
        !matches!(self, Driver::Sqlite)
    }

    /// Replacement expression for scrubbed email columns. `%uid`, `%mail` and
    /// `%name` in the pattern refer to the matching columns; everything else
    /// is literal text. mysql spells concatenation as a function call, the
    /// other drivers use the `||` operator.
    pub fn sanitize_email_expr(self, pattern: &str) -> String {
        let segments = parse_pattern(pattern);
        if !segments.iter().any(|s| matches!(s, Segment::Column(_))) {
            return quote_literal(pattern);
        }
        let parts: Vec<String> = segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => quote_literal(text),
                Segment::Column(column) => (*column).to_string(),
            })
            .collect();
        match self {
            Driver::Mysql => format!("concat({})", parts.join(", ")),
            Driver::Pgsql | Driver::Sqlite => parts.join(" || "),
        }
    }

    /// Expression stored into the password column. sqlite has no built-in
    /// digest function, so the replacement value is stored verbatim there.
    pub fn sanitize_password_expr(self, value: &str) -> String {
        match self {
            Driver::Mysql | Driver::Pgsql => format!("MD5({})", quote_literal(value)),
            Driver::Sqlite => quote_literal(value),
        }
    }

    /// Statement that empties `table`. sqlite has no `TRUNCATE`.
    pub fn empty_table_stmt(self, table: &str) -> String {
        match self {
            Driver::Mysql | Driver::Pgsql => format!("TRUNCATE {table}"),
            Driver::Sqlite => format!("DELETE FROM {table}"),
        }
    }
}

/// One external program invocation, fully assembled but not yet executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientJob {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl ClientJob {
    fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    fn env_var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }
}

/// Table-level dump controls.
#[derive(Clone, Debug, Default)]
pub struct DumpSpec {
    pub skip_tables: Vec<String>,
    pub structure_tables: Vec<String>,
}

impl DumpSpec {
    pub fn is_empty(&self) -> bool {
        self.skip_tables.is_empty() && self.structure_tables.is_empty()
    }
}

/// A single dump invocation. mysql needs a second, appending pass to emit
/// schema-only tables; the other drivers express everything in one run.
#[derive(Clone, Debug)]
pub struct DumpPass {
    pub job: ClientJob,
    pub append: bool,
}

impl DbSpec {
    pub fn table_name(&self, table: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{table}"),
            None => table.to_string(),
        }
    }

    fn mysql_conn_args(&self, mut job: ClientJob) -> ClientJob {
        if let Some(username) = &self.username {
            job = job.arg(format!("--user={username}"));
        }
        if let Some(host) = &self.host {
            job = job.arg(format!("--host={host}"));
        }
        if let Some(port) = self.port {
            job = job.arg(format!("--port={port}"));
        }
        if let Some(password) = &self.password {
            job = job.env_var("MYSQL_PWD", password);
        }
        job
    }

    fn pgsql_conn_args(&self, mut job: ClientJob) -> ClientJob {
        if let Some(username) = &self.username {
            job = job.arg(format!("--username={username}"));
        }
        if let Some(host) = &self.host {
            job = job.arg(format!("--host={host}"));
        }
        if let Some(port) = self.port {
            job = job.arg(format!("--port={port}"));
        }
        if let Some(password) = &self.password {
            job = job.env_var("PGPASSWORD", password);
        }
        job
    }

    /// Client invocation that reads SQL on stdin against this database.
    pub fn connect_job(&self) -> ClientJob {
        match self.driver {
            Driver::Mysql => self
                .mysql_conn_args(ClientJob::new("mysql"))
                .arg(&self.database),
            Driver::Pgsql => self
                .pgsql_conn_args(ClientJob::new("psql"))
                .arg("--quiet")
                .arg(format!("--dbname={}", self.database)),
            Driver::Sqlite => ClientJob::new("sqlite3").arg(&self.database),
        }
    }

    /// Client invocation executing a single SQL string.
    pub fn query_job(&self, sql: &str) -> ClientJob {
        match self.driver {
            Driver::Mysql => self
                .mysql_conn_args(ClientJob::new("mysql"))
                .arg("--execute")
                .arg(sql)
                .arg(&self.database),
            Driver::Pgsql => self
                .pgsql_conn_args(ClientJob::new("psql"))
                .arg("--quiet")
                .arg(format!("--dbname={}", self.database))
                .arg("--command")
                .arg(sql),
            Driver::Sqlite => ClientJob::new("sqlite3").arg(&self.database).arg(sql),
        }
    }

    /// Administrative invocation executing `sql` without selecting this
    /// database, optionally under superuser credentials. Returns `None` for
    /// sqlite, where database lifecycle is file lifecycle.
    pub fn admin_job(
        &self,
        sql: &str,
        su_user: Option<&str>,
        su_password: Option<&str>,
    ) -> Option<ClientJob> {
        let admin = DbSpec {
            username: su_user.map(ToOwned::to_owned).or_else(|| self.username.clone()),
            password: su_password
                .map(ToOwned::to_owned)
                .or_else(|| self.password.clone()),
            ..self.clone()
        };
        match self.driver {
            Driver::Mysql => Some(
                admin
                    .mysql_conn_args(ClientJob::new("mysql"))
                    .arg("--execute")
                    .arg(sql),
            ),
            Driver::Pgsql => Some(
                admin
                    .pgsql_conn_args(ClientJob::new("psql"))
                    .arg("--quiet")
                    .arg("--dbname=template1")
                    .arg("--command")
                    .arg(sql),
            ),
            Driver::Sqlite => None,
        }
    }

    /// Statements that drop and recreate this database, in execution order.
    /// postgres refuses `DROP DATABASE` inside a transaction, so the two
    /// statements must run as separate invocations.
    pub fn create_statements(&self) -> Vec<String> {
        vec![
            format!("DROP DATABASE IF EXISTS {}", self.database),
            format!("CREATE DATABASE {}", self.database),
        ]
    }

    /// Dump invocations writing SQL to stdout. Table filters are dropped for
    /// sqlite; callers decide whether that is a warning or an error.
    pub fn dump_passes(&self, spec: &DumpSpec) -> Vec<DumpPass> {
        match self.driver {
            Driver::Mysql => {
                let mut first = self
                    .mysql_conn_args(ClientJob::new("mysqldump"))
                    .arg("--single-transaction")
                    .arg("--quick");
                for table in spec.skip_tables.iter().chain(&spec.structure_tables) {
                    first = first.arg(format!("--ignore-table={}.{table}", self.database));
                }
                first = first.arg(&self.database);
                let mut passes = vec![DumpPass {
                    job: first,
                    append: false,
                }];
                if !spec.structure_tables.is_empty() {
                    let mut second = self
                        .mysql_conn_args(ClientJob::new("mysqldump"))
                        .arg("--single-transaction")
                        .arg("--no-data")
                        .arg(&self.database);
                    for table in &spec.structure_tables {
                        second = second.arg(table);
                    }
                    passes.push(DumpPass {
                        job: second,
                        append: true,
                    });
                }
                passes
            }
            Driver::Pgsql => {
                let mut job = self
                    .pgsql_conn_args(ClientJob::new("pg_dump"))
                    .arg("--clean")
                    .arg("--if-exists");
                for table in &spec.skip_tables {
                    job = job.arg(format!("--exclude-table={table}"));
                }
                for table in &spec.structure_tables {
                    job = job.arg(format!("--exclude-table-data={table}"));
                }
                job = job.arg(&self.database);
                vec![DumpPass { job, append: false }]
            }
            Driver::Sqlite => vec![DumpPass {
                job: ClientJob::new("sqlite3").arg(&self.database).arg(".dump"),
                append: false,
            }],
        }
    }
}

/// SQL string literal with embedded quotes doubled.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

enum Segment {
    Literal(String),
    Column(&'static str),
}

const PLACEHOLDERS: [(&str, &str); 3] = [("%uid", "uid"), ("%mail", "mail"), ("%name", "name")];

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;
    'outer: while !rest.is_empty() {
        for (token, column) in PLACEHOLDERS {
            if let Some(tail) = rest.strip_prefix(token) {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Column(column));
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            literal.push(ch);
        }
        rest = chars.as_str();
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}
