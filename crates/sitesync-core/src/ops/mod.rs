mod aliases;
mod create;
mod dump;
mod query;
mod sanitize;

pub use aliases::list_aliases;
pub use create::{sql_create, CreateRequest};
pub use dump::{run_dump, sql_dump, DumpArtifact, DumpRequest};
pub use query::{sql_query, QueryRequest};
pub use sanitize::{run_sanitize, sql_sanitize, SanitizeRequest};

pub(crate) use create::create_database;

use crate::process::RunOutput;

/// Promotes a nonzero exit status into an error naming the operation.
pub(crate) fn ensure_success(output: &RunOutput, what: &str) -> anyhow::Result<()> {
    if output.success() {
        Ok(())
    } else {
        let stderr = output.stderr.trim();
        if stderr.is_empty() {
            anyhow::bail!("{what} exited with status {}", output.code);
        }
        anyhow::bail!("{what} exited with status {}: {stderr}", output.code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_success_reports_stderr_when_present() {
        let ok = RunOutput {
            code: 0,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(ensure_success(&ok, "dump").is_ok());

        let failed = RunOutput {
            code: 2,
            stdout: String::new(),
            stderr: "access denied\n".to_string(),
        };
        let err = ensure_success(&failed, "dump").unwrap_err();
        assert_eq!(err.to_string(), "dump exited with status 2: access denied");
    }
}
