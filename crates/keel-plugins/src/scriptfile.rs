//! Filesystem helpers for script payloads.

use std::io;
use std::path::Path;

/// Add execute bits to `path`'s current permissions.
#[cfg(unix)]
pub(crate) fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    std::fs::set_permissions(path, permissions)
}

/// Execute bits don't exist off Unix; scripts run through their interpreter.
#[cfg(not(unix))]
pub(crate) fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
