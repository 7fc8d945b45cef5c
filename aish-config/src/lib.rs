//! Configuration for the aish shell.
//!
//! Settings come from the `~/.aish` rc file (dotenv syntax) with the process
//! environment taking precedence. See [`constants::keys`] for the recognized
//! keys and [`ShellConfig::load`] for the lookup order.

pub mod constants;
pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{default_rc_path, parse_bool, read_rc_file};
pub use types::{AiConfig, HistoryConfig, ShellConfig, WarnList};
