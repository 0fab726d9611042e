//! Configuration section definitions.
//!
//! Each module corresponds to a section in `webext.toml`:
//!
//! | Module      | TOML Section   | Purpose                               |
//! |-------------|----------------|---------------------------------------|
//! | `extension` | `[extension]`  | Manifest, output and manager paths    |
//! | `reload`    | `[reload]`     | Reload channel and build event source |
//! | `browser`   | `[browser]`    | Browser launch and supervision        |

mod browser;
mod extension;
mod reload;

pub use browser::BrowserSectionConfig;
pub use extension::ExtensionConfig;
pub use reload::ReloadConfig;
