#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod alias;
pub mod driver;
pub mod sanitize;
pub mod severity;

pub use alias::{
    canonical_name, load_alias_files, AliasError, AliasRegistry, DbSpec, SiteAlias,
};
pub use driver::{ClientJob, Driver, DumpPass, DumpSpec, ParseDriverError};
pub use sanitize::{plan_operations, PostSyncOp, SanitizeOptions};
pub use severity::{ParseSeverityError, Severity};
