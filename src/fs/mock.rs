// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory filesystem for tests.
///
/// Only files are stored; directories exist implicitly as path prefixes.
/// Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
    writes: Arc<Mutex<usize>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut files = self.files.lock().unwrap();
        files.insert(path.as_ref().to_path_buf(), content.into());
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    fn store(&self, path: &Path, contents: &[u8]) {
        self.add_file(path, contents);
        *self.writes.lock().unwrap() += 1;
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let files = self.files.lock().unwrap();
        match files.get(path) {
            Some(content) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.store(path, contents);
        Ok(())
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.store(path, contents);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| anyhow!("File not found: {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        files.keys().any(|p| p.starts_with(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        files.contains_key(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.lock().unwrap();
        let mut children: Vec<PathBuf> = files
            .keys()
            .filter_map(|p| p.strip_prefix(path).ok())
            .filter_map(|rest| rest.components().next())
            .map(|first| path.join(first))
            .collect();
        children.dedup();

        if children.is_empty() {
            return Err(anyhow!("Not a directory or not found: {:?}", path));
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_implied_by_files() {
        let fs = MockFileSystem::new();
        fs.add_file("out/a.txt", "a");
        fs.add_file("out/sub/b.txt", "b");

        assert!(fs.exists(Path::new("out")));
        assert!(!fs.is_file(Path::new("out")));
        assert_eq!(
            fs.read_dir(Path::new("out")).unwrap(),
            vec![PathBuf::from("out/a.txt"), PathBuf::from("out/sub")]
        );
    }

    #[test]
    fn clones_share_contents() {
        let fs = MockFileSystem::new();
        let other = fs.clone();
        other.write(Path::new("x"), b"1").unwrap();

        assert_eq!(fs.read_to_string(Path::new("x")).unwrap(), "1");
        assert_eq!(fs.write_count(), 1);
        fs.remove_file(Path::new("x")).unwrap();
        assert!(!other.exists(Path::new("x")));
    }
}
