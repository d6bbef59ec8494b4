use std::fs;
use std::path::{Path, PathBuf};

use infra_errors::Result;

/// Pid files live at `<workspace>/.<task-name>`, matching the original's
/// `os.path.join(workspace, '.' + name)`.
pub fn path(workspace: &Path, name: &str) -> PathBuf {
    workspace.join(format!(".{name}"))
}

pub fn read(workspace: &Path, name: &str) -> Option<u32> {
    let contents = fs::read_to_string(path(workspace, name)).ok()?;
    contents.trim().parse().ok()
}

pub fn write(workspace: &Path, name: &str, pid: u32) -> Result<()> {
    fs::write(path(workspace, name), pid.to_string())?;
    Ok(())
}

pub fn remove(workspace: &Path, name: &str) -> Result<()> {
    let file = path(workspace, name);
    if file.exists() {
        fs::remove_file(file)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_pid() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "compute", 1234).unwrap();
        assert_eq!(read(dir.path(), "compute"), Some(1234));
        remove(dir.path(), "compute").unwrap();
        assert_eq!(read(dir.path(), "compute"), None);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read(dir.path(), "bmc"), None);
    }
}
