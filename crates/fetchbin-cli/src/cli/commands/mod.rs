//! CLI command handlers, one file per command.

mod checksum;
mod completions;
mod install;
mod platform;
mod resolve;
mod validate;
mod versions;

pub use checksum::run_checksum;
pub use completions::run_completions;
pub use install::run_install;
pub use platform::run_platform;
pub use resolve::run_resolve;
pub use validate::run_validate;
pub use versions::run_versions;
