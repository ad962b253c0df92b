use std::path::PathBuf;

/// Platform-specific defaults abstracted behind a common interface.
/// Each OS provides its own `NativePlatform` implementation so call sites
/// remain free of `#[cfg]` blocks.
pub trait Platform {
    /// Interpreter used to launch worker scripts when the config names none.
    fn default_interpreter() -> &'static str;

    /// Root data directory for postdeck.
    /// Unix: `~/.postdeck`, Windows: `%APPDATA%\postdeck`.
    fn data_dir() -> PathBuf;
}

/// `POSTDECK_HOME` wins over the platform default.
fn resolve_data_dir(default: PathBuf) -> PathBuf {
    match std::env::var_os("POSTDECK_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => default,
    }
}

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::NativePlatform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::NativePlatform;
