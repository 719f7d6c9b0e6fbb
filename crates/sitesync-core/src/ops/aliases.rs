use anyhow::Result;
use serde_json::{json, Value};

use crate::context::CommandContext;
use crate::outcome::ExecutionOutcome;

/// Lists the merged alias registry so users can verify what a name resolves
/// to before pointing a sync at it.
///
/// # Errors
/// Returns an error when an alias file cannot be read or parsed.
pub fn list_aliases(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let registry = ctx.registry()?;
    let details: Vec<Value> = registry
        .iter()
        .map(|alias| {
            json!({
                "name": alias.name,
                "endpoint": alias.endpoint().unwrap_or_else(|| "local".to_string()),
                "driver": alias.db.as_ref().map(|db| db.driver.to_string()),
                "database": alias.db.as_ref().map(|db| db.database.clone()),
            })
        })
        .collect();
    let message = match details.len() {
        0 => "no aliases defined".to_string(),
        1 => "1 alias defined".to_string(),
        n => format!("{n} aliases defined"),
    };
    Ok(ExecutionOutcome::success(message, json!({ "aliases": details })))
}
