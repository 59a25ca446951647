//! Atomic writes and permission helpers for staged files.

use std::fs;
use std::io::Write;
use std::path::Path;

use super::InstallerError;

/// Write file atomically so a crash never leaves a half-written descriptor
pub(crate) fn write_file_atomic(path: &Path, content: &str) -> Result<(), InstallerError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            InstallerError::io(format!("Failed to create directory {}", parent.display()), e)
        })?;
    }

    let temp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&temp_path).map_err(|e| {
            InstallerError::io(format!("Failed to create temp file {}", temp_path.display()), e)
        })?;

        file.write_all(content.as_bytes())
            .map_err(|e| InstallerError::io("Failed to write temp file", e))?;

        file.sync_all()
            .map_err(|e| InstallerError::io("Failed to sync temp file", e))?;
    }

    fs::rename(&temp_path, path)
        .map_err(|e| InstallerError::io(format!("Failed to move temp file to {}", path.display()), e))?;

    Ok(())
}

/// Replace `dest` with a copy of `src`
pub(crate) fn replace_file(src: &Path, dest: &Path) -> Result<(), InstallerError> {
    if dest.is_file() {
        fs::remove_file(dest)
            .map_err(|e| InstallerError::io(format!("Failed to remove {}", dest.display()), e))?;
    }
    fs::copy(src, dest).map_err(|e| {
        InstallerError::io(
            format!("Failed to copy {} to {}", src.display(), dest.display()),
            e,
        )
    })?;
    Ok(())
}

/// Set unix permission bits (no-op elsewhere)
pub(crate) fn set_mode(path: &Path, mode: u32) -> Result<(), InstallerError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)
            .map_err(|e| InstallerError::io(format!("Failed to read metadata: {}", path.display()), e))?
            .permissions();
        perms.set_mode(mode);
        fs::set_permissions(path, perms).map_err(|e| {
            InstallerError::io(format!("Failed to set permissions: {}", path.display()), e)
        })?;
    }

    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }

    Ok(())
}
