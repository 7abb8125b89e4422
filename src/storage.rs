use std::path::{Path, PathBuf};

pub trait StorageManager: Send + Sync {
    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()>;
    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>>;
    fn exists(&self, ident: &str) -> bool;
}

#[derive(Clone)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(storage_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(storage_dir)?;
        Ok(BackendLocal {
            base_dir: storage_dir.to_path_buf(),
        })
    }

    /// Storage rooted at the parent directory of `path`, plus the file name.
    pub fn for_file(path: &Path) -> std::io::Result<(Self, String)> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("not a file path: {}", path.display()),
                )
            })?
            .to_string();

        Ok((Self::new(dir)?, name))
    }
}

impl StorageManager for BackendLocal {
    fn exists(&self, ident: &str) -> bool {
        std::fs::metadata(self.base_dir.join(ident)).is_ok()
    }

    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.base_dir.join(ident))
    }

    /// Write through a temp file and rename, so readers never see a partial file.
    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()> {
        let path = self.base_dir.join(ident);
        let temp_path = self
            .base_dir
            .join(format!("{}-{ident}", rusty_ulid::generate_ulid_string()));

        std::fs::write(&temp_path, data)?;

        std::fs::rename(&temp_path, &path)
    }
}

/// Write a whole file atomically.
pub fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let (store, name) = BackendLocal::for_file(path)?;
    store.write(&name, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(tmp.path()).unwrap();

        assert!(!store.exists("a.txt"));
        store.write("a.txt", b"hello").unwrap();
        assert!(store.exists("a.txt"));
        assert_eq!(store.read("a.txt").unwrap(), b"hello");
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(tmp.path()).unwrap();
        store.write("a.txt", b"one").unwrap();
        store.write("a.txt", b"two").unwrap();

        let entries: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.read("a.txt").unwrap(), b"two");
    }

    #[test]
    fn test_write_file_creates_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("out.json");
        write_file(&path, b"[]").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"[]");
    }
}
