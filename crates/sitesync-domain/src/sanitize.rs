//! Post-sync sanitize planning.
//!
//! Planning is a pure function of the destination database record and the
//! configured options; nothing is executed here. The resulting operations are
//! run once against the destination after a successful import, then dropped.

use serde::Serialize;

use crate::alias::DbSpec;

/// The literal value that disables an individual scrub.
const DISABLED: &str = "no";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SanitizeOptions {
    pub password: Option<String>,
    pub email: Option<String>,
}

impl SanitizeOptions {
    /// The values applied by a bare `--sanitize` with nothing configured.
    pub fn defaults() -> Self {
        Self {
            password: Some("password".to_string()),
            email: Some("user+%uid@localhost".to_string()),
        }
    }

    fn configured(value: &Option<String>) -> Option<&str> {
        value
            .as_deref()
            .filter(|value| !value.is_empty() && *value != DISABLED)
    }

    pub fn password_value(&self) -> Option<&str> {
        Self::configured(&self.password)
    }

    pub fn email_pattern(&self) -> Option<&str> {
        Self::configured(&self.email)
    }
}

/// One deferred SQL statement queued for execution after import.
#[derive(Clone, Debug, Serialize)]
pub struct PostSyncOp {
    pub id: &'static str,
    pub description: String,
    pub sql: String,
}

/// Plans the scrub statements for `db`. The session clear is unconditional;
/// password and email scrubs depend on the configured options.
pub fn plan_operations(db: &DbSpec, options: &SanitizeOptions) -> Vec<PostSyncOp> {
    let mut operations = Vec::new();
    let users = db.table_name("users");

    if let Some(value) = options.password_value() {
        let expr = db.driver.sanitize_password_expr(value);
        operations.push(PostSyncOp {
            id: "user-password",
            description: "reset all user passwords".to_string(),
            sql: format!("UPDATE {users} SET pass = {expr}"),
        });
    }

    if let Some(pattern) = options.email_pattern() {
        let expr = db.driver.sanitize_email_expr(pattern);
        operations.push(PostSyncOp {
            id: "user-email",
            description: "replace user email addresses".to_string(),
            sql: format!("UPDATE {users} SET mail = {expr}, init = {expr}"),
        });
    }

    let sessions = db.table_name("sessions");
    operations.push(PostSyncOp {
        id: "sessions",
        description: "empty the sessions table".to_string(),
        sql: db.driver.empty_table_stmt(&sessions),
    });

    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Driver;

    fn spec(driver: Driver, prefix: Option<&str>) -> DbSpec {
        DbSpec {
            driver,
            database: "site".to_string(),
            username: None,
            password: None,
            host: None,
            port: None,
            prefix: prefix.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn plans_all_three_operations_with_defaults() {
        let ops = plan_operations(&spec(Driver::Mysql, None), &SanitizeOptions::defaults());
        let ids: Vec<&str> = ops.iter().map(|op| op.id).collect();
        assert_eq!(ids, vec!["user-password", "user-email", "sessions"]);
        assert_eq!(ops[0].sql, "UPDATE users SET pass = MD5('password')");
        assert_eq!(
            ops[1].sql,
            "UPDATE users SET mail = concat('user+', uid, '@localhost'), \
             init = concat('user+', uid, '@localhost')"
        );
        assert_eq!(ops[2].sql, "TRUNCATE sessions");
    }

    #[test]
    fn password_no_plans_no_password_operation() {
        let options = SanitizeOptions {
            password: Some("no".to_string()),
            email: Some("no".to_string()),
        };
        let ops = plan_operations(&spec(Driver::Pgsql, None), &options);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].id, "sessions");
    }

    #[test]
    fn session_clear_is_unconditional() {
        let ops = plan_operations(&spec(Driver::Sqlite, None), &SanitizeOptions::default());
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].sql, "DELETE FROM sessions");
    }

    #[test]
    fn table_prefix_applies_to_every_table() {
        let ops = plan_operations(
            &spec(Driver::Pgsql, Some("d8_")),
            &SanitizeOptions::defaults(),
        );
        assert!(ops[0].sql.starts_with("UPDATE d8_users "));
        assert!(ops[1].sql.starts_with("UPDATE d8_users "));
        assert_eq!(ops[2].sql, "TRUNCATE d8_sessions");
    }

    #[test]
    fn email_values_with_quotes_are_escaped() {
        let options = SanitizeOptions {
            password: Some("it's".to_string()),
            email: None,
        };
        let ops = plan_operations(&spec(Driver::Mysql, None), &options);
        assert_eq!(ops[0].sql, "UPDATE users SET pass = MD5('it''s')");
    }
}
