//! Per-submission working directories
//!
//! Each judging pass owns one directory under the configured base. It is
//! bind-mounted into every sandbox of that pass and removed on drop.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::fs;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// The in-sandbox user must be able to write compile artifacts
const DIR_MODE: u32 = 0o777;
const FILE_MODE: u32 = 0o644;

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory named after `label` under `base`
    pub async fn create(base: &Path, label: &str) -> io::Result<Self> {
        fs::create_dir_all(base).await?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", label))
            .tempdir_in(base)?;
        set_mode(dir.path(), DIR_MODE).await?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create a subdirectory with the same permissions
    pub async fn subdir(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::create_dir_all(&path).await?;
        set_mode(&path, DIR_MODE).await?;
        Ok(path)
    }
}

/// Write a file the sandbox user can read
pub async fn write_file(dir: &Path, name: &str, contents: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents).await?;
    set_mode(&path, FILE_MODE).await?;
    Ok(path)
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workspace_lifecycle() {
        let base = tempfile::tempdir().unwrap();
        let path = {
            let ws = Workspace::create(base.path(), "sub-7").await.unwrap();
            let file = write_file(ws.path(), "main.py", "print(1)\n").await.unwrap();
            assert_eq!(fs::read_to_string(&file).await.unwrap(), "print(1)\n");
            assert!(ws
                .path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("sub-7-"));

            let spj = ws.subdir("spj").await.unwrap();
            assert!(spj.is_dir());
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
