//! Data directory resolution.

use std::path::PathBuf;

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `MYMIND_DATA_DIR` environment variable
/// 2. `~/.mymind`
/// 3. `.mymind` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MYMIND_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".mymind");
    }

    PathBuf::from(".mymind")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_data_dir_ends_with_mymind() {
        if std::env::var("MYMIND_DATA_DIR").is_ok() {
            return;
        }
        let dir = resolve_data_dir();
        assert!(dir.ends_with(".mymind"));
    }
}
