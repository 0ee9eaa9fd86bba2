//! # sherlock-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SherlockSettings::default()`]
//! 2. **User file**: `~/.sherlock/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SHERLOCK_*` overrides (highest priority)
//!
//! ```no_run
//! use sherlock_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("database: {}", settings.database.path);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::*;
