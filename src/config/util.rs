//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Find config file by searching upward from current directory
///
/// An absolute `config_name` is used as-is when it exists. Otherwise the
/// search starts at cwd and walks up parent directories.
///
/// # Example
/// ```text
/// /home/user/site/app/assets/  ← cwd
/// /home/user/site/rivets.toml  ← found!
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let cwd = std::env::current_dir().ok()?;
    find_upward(&cwd, config_name)
}

fn find_upward(start: &Path, config_name: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return None, // Reached filesystem root
        }
    }
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_upward() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("app/assets/js");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("rivets.toml"), "").unwrap();

        assert_eq!(
            find_upward(&nested, Path::new("rivets.toml")),
            Some(dir.path().join("rivets.toml"))
        );
        assert_eq!(find_upward(&nested, Path::new("missing-config.toml")), None);
    }

    #[test]
    fn test_absolute_config_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        assert_eq!(find_config_file(&path), None);

        fs::write(&path, "").unwrap();
        assert_eq!(find_config_file(&path), Some(path));
    }
}
