//! Small filesystem helpers shared by the dataset and pretrained registries.

use std::path::{Component, Path, PathBuf};

use crate::error::{IoResultExt, Result, TrainerError};

/// Move a file to `dest`, replacing any existing file there.
///
/// Tries a rename first and falls back to copy + delete when source and
/// destination live on different filesystems. Moving a file onto itself is
/// a no-op.
pub(crate) fn move_file_overwrite(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).with_path(parent)?;
    }

    if dest.exists() && is_same_file(src, dest)? {
        return Ok(());
    }

    if dest.exists() {
        std::fs::remove_file(dest).with_path(dest)?;
    }

    match std::fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(src, dest).map_err(|e| TrainerError::Io {
                message: format!(
                    "Failed to copy file: {} -> {}",
                    src.display(),
                    dest.display()
                ),
                path: Some(src.to_path_buf()),
                source: Some(e),
            })?;
            std::fs::remove_file(src).map_err(|e| TrainerError::Io {
                message: format!("Failed to clean up source after copy: {}", src.display()),
                path: Some(src.to_path_buf()),
                source: Some(e),
            })?;
            Ok(())
        }
    }
}

fn is_same_file(a: &Path, b: &Path) -> Result<bool> {
    let a = std::fs::canonicalize(a).with_path(a)?;
    let b = std::fs::canonicalize(b).with_path(b)?;
    Ok(a == b)
}

/// Render `path` relative to `root` with `/` separators.
///
/// Falls back to the full path when `path` is not under `root`.
pub(crate) fn relative_display(root: &Path, path: &Path) -> String {
    let Ok(rel) = path.strip_prefix(root) else {
        return path.to_string_lossy().into_owned();
    };
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve a client-supplied path against the workspace root.
///
/// Relative paths are joined onto `root`; absolute paths are kept as given.
pub(crate) fn resolve_under(root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// True when a relative path stays inside its base (no `..`, no root).
pub(crate) fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_move_file_overwrite_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("upload.wav");
        let dest = temp.path().join("datasets").join("voice").join("upload.wav");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"old").unwrap();
        std::fs::write(&src, b"new").unwrap();

        move_file_overwrite(&src, &dest).unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn test_move_onto_itself_keeps_file() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("voice");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("clip.wav");
        std::fs::write(&file, b"audio").unwrap();

        move_file_overwrite(&file, &file).unwrap();
        move_file_overwrite(&dir.join("..").join("voice").join("clip.wav"), &file).unwrap();

        assert_eq!(std::fs::read(&file).unwrap(), b"audio");
    }

    #[test]
    fn test_move_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let result = move_file_overwrite(
            &temp.path().join("missing.wav"),
            &temp.path().join("out.wav"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_relative_display() {
        let root = Path::new("/work");
        assert_eq!(
            relative_display(root, Path::new("/work/assets/datasets/voice")),
            "assets/datasets/voice"
        );
        assert_eq!(relative_display(root, Path::new("/other/x")), "/other/x");
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained(Path::new("my-project")));
        assert!(is_contained(Path::new("a/b")));
        assert!(!is_contained(Path::new("../escape")));
        assert!(!is_contained(Path::new("/abs")));
    }
}
