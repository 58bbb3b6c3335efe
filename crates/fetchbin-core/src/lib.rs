pub mod config;
pub mod logging;

pub mod cancel;
pub mod checksum;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod install;
pub mod locator;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod release_table;
pub mod retry;
pub mod verify;
pub mod version;

pub use error::{Error, Result};
