//! Where Factorio keeps the blueprint library.

use std::env;
use std::path::{Path, PathBuf};

/// Library file written by Factorio 2.x.
pub const STORAGE_FILE: &str = "blueprint-storage-2.dat";

/// Library file written by Factorio 1.x.
pub const LEGACY_STORAGE_FILE: &str = "blueprint-storage.dat";

/// Factorio's user data directory. `FACTORIO_DIR` overrides the platform default.
pub fn factorio_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os("FACTORIO_DIR") {
        return Some(PathBuf::from(dir));
    }
    default_factorio_dir()
}

#[cfg(windows)]
fn default_factorio_dir() -> Option<PathBuf> {
    // %APPDATA%\Factorio
    dirs::config_dir().map(|dir| dir.join("Factorio"))
}

#[cfg(target_os = "macos")]
fn default_factorio_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("factorio"))
}

#[cfg(not(any(windows, target_os = "macos")))]
fn default_factorio_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|dir| dir.join(".factorio"))
}

/// Path of the library file inside `dir`.
pub fn storage_path_in(dir: &Path, legacy: bool) -> PathBuf {
    dir.join(if legacy { LEGACY_STORAGE_FILE } else { STORAGE_FILE })
}

/// Default location of the blueprint library, if a data directory can be found.
pub fn blueprint_storage_path(legacy: bool) -> Option<PathBuf> {
    factorio_dir().map(|dir| storage_path_in(&dir, legacy))
}
