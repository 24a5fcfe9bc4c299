use crate::error::CentralError;
use std::fs;
use std::path::{Path, PathBuf};

/// Single-slot backup path: `config.json` -> `config.json.backup`.
pub fn backup_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.backup"))
}

/// Copy the current file content aside before a write. The slot is
/// overwritten each time; backups never accumulate.
pub fn take_backup(path: &Path) -> Result<Option<PathBuf>, CentralError> {
    if !path.exists() {
        return Ok(None);
    }
    let backup = backup_path_for(path);
    fs::copy(path, &backup).map_err(|error| CentralError::io(&backup, error))?;
    Ok(Some(backup))
}

/// Crash-safe write: the content lands in a sibling temporary file
/// first, then replaces the destination in one rename. A reader never
/// observes a half-written file.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), CentralError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| CentralError::io(parent, error))?;
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{name}.tmp"));
    fs::write(&tmp, content).map_err(|error| CentralError::io(&tmp, error))?;
    fs::rename(&tmp, path).map_err(|error| CentralError::io(path, error))
}

/// Restore a `.backup` file. When no destination is given the original
/// path is inferred from the backup name, accepting the legacy
/// timestamped form `config.json.20251125_143022.backup` as well.
pub fn restore_backup(backup: &Path, dest: Option<&Path>) -> Result<PathBuf, CentralError> {
    if !backup.exists() {
        return Err(CentralError::BackupMissing(backup.to_path_buf()));
    }

    let target = match dest {
        Some(path) => path.to_path_buf(),
        None => {
            let mut name = backup
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if let Some(stripped) = name.strip_suffix(".backup") {
                name = stripped.to_string();
            }
            if let Some(base) = strip_timestamp_suffix(&name) {
                name = base;
            }
            backup.with_file_name(name)
        }
    };

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|error| CentralError::io(parent, error))?;
    }
    fs::copy(backup, &target).map_err(|error| CentralError::io(&target, error))?;
    Ok(target)
}

/// `config.json.20251125_143022` -> `config.json`
fn strip_timestamp_suffix(name: &str) -> Option<String> {
    let (base, suffix) = name.rsplit_once('.')?;
    let bytes = suffix.as_bytes();
    if bytes.len() != 15 || bytes[8] != b'_' {
        return None;
    }
    let digits_ok = bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[9..].iter().all(u8::is_ascii_digit);
    if digits_ok {
        Some(base.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::strip_timestamp_suffix;

    #[test]
    fn strips_legacy_timestamped_names() {
        assert_eq!(
            strip_timestamp_suffix("config.json.20251125_143022"),
            Some(String::from("config.json"))
        );
        assert_eq!(
            strip_timestamp_suffix("config.20251125_143022"),
            Some(String::from("config"))
        );
        assert_eq!(strip_timestamp_suffix("config.json"), None);
        assert_eq!(strip_timestamp_suffix("config.2025_14"), None);
    }
}
