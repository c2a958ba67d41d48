use dirs::data_dir;
use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

pub const LISTINGS_FILE: &str = "listings.json";
pub const STATUS_FILE: &str = "refresh-status.json";
pub const RESTAURANTS_FILE: &str = "restaurants.json";
pub const CONFIG_FILE: &str = "config.json";

static DEFAULT_DATA_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let base = data_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    base.join("cartelera")
});

/// `CARTELERA_DATA_DIR` if set, otherwise the platform data directory.
pub fn default_data_root() -> PathBuf {
    match std::env::var("CARTELERA_DATA_DIR") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => DEFAULT_DATA_ROOT.clone(),
    }
}

pub fn config_path() -> PathBuf {
    default_data_root().join(CONFIG_FILE)
}

pub fn listings_path_in(dir: &Path) -> PathBuf {
    dir.join(LISTINGS_FILE)
}

pub fn status_path_in(dir: &Path) -> PathBuf {
    dir.join(STATUS_FILE)
}

pub fn restaurants_path_in(dir: &Path) -> PathBuf {
    dir.join(RESTAURANTS_FILE)
}

pub fn ensure_dir(dir: &Path) {
    if let Err(err) = fs::create_dir_all(dir) {
        warn!("failed to create data dir {:?}: {err}", dir);
    }
}
