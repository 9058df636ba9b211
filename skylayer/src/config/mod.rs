//! User configuration.
//!
//! Settings are read from `~/.skylayer/config.ini`:
//!
//! ```ini
//! [cache]
//! memory_size = 256MB
//!
//! [fetch]
//! timeout = 30
//! max_concurrent = 8
//! user_agent = skylayer/0.1.0
//!
//! [decode]
//! threads = 0
//! ```

mod file;
mod size;

pub use file::{
    config_directory, config_file_path, CacheSettings, ConfigFile, ConfigFileError,
    DecodeSettings, FetchSettings,
};
pub use size::{format_size, parse_size, SizeParseError};
