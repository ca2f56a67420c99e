//! On-disk control files
//!
//! Two tiny text files in the data directory steer the runtime without a
//! config edit: `shape.txt` names the shape descriptor to load, and
//! `force_animation.txt`, when present, pins one animation for the whole
//! run. Both are read once at boot.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;

/// Names the shape descriptor (`shapes/<name>.json`) to load at boot.
pub const SHAPE_SELECTION_FILE: &str = "shape.txt";
/// When present, pins the named animation for the whole run.
pub const FORCED_ANIMATION_FILE: &str = "force_animation.txt";

/// Read the selected shape name. The file is required; there is no
/// sensible default shape to fall back to.
pub fn read_shape_selection(data_dir: &Path) -> Result<String> {
    let path = data_dir.join(SHAPE_SELECTION_FILE);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read shape selection from {}", path.display()))?;
    let name = content.trim();
    if name.is_empty() {
        anyhow::bail!("shape selection file {} is empty", path.display());
    }
    Ok(name.to_owned())
}

/// Read the forced animation name, if the override file exists. A
/// missing file simply means no override.
pub fn read_forced_animation(data_dir: &Path) -> Result<Option<String>> {
    let path = data_dir.join(FORCED_ANIMATION_FILE);
    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let name = content.trim();
            Ok((!name.is_empty()).then(|| name.to_owned()))
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => {
            Err(err).with_context(|| format!("failed to read {}", path.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_selection_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SHAPE_SELECTION_FILE), "  octahedron \n").unwrap();
        assert_eq!(read_shape_selection(dir.path()).unwrap(), "octahedron");
    }

    #[test]
    fn missing_shape_selection_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_shape_selection(dir.path()).is_err());
    }

    #[test]
    fn empty_shape_selection_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SHAPE_SELECTION_FILE), "\n").unwrap();
        assert!(read_shape_selection(dir.path()).is_err());
    }

    #[test]
    fn missing_override_means_no_pin() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_forced_animation(dir.path()).unwrap(), None);
    }

    #[test]
    fn present_override_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FORCED_ANIMATION_FILE), "pulse\n").unwrap();
        assert_eq!(
            read_forced_animation(dir.path()).unwrap().as_deref(),
            Some("pulse")
        );
    }

    #[test]
    fn blank_override_means_no_pin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FORCED_ANIMATION_FILE), "   \n").unwrap();
        assert_eq!(read_forced_animation(dir.path()).unwrap(), None);
    }
}
