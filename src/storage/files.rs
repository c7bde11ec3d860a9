use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;
use crate::storage::FileEntry;

/// Identifier scheme for entries under the granted root. Identifiers look
/// like `tree:capture/2026-01-01T100000+0000.org` and are stable across
/// directory listings.
const ID_SCHEME: &str = "tree:";

/// Capability-scoped file access rooted at a user-granted folder.
///
/// Every identifier resolves inside the root; anything escaping it is
/// rejected rather than resolved.
pub struct FileManager {
    root: PathBuf,
}

impl FileManager {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the granted root still exists and is a directory.
    pub fn has_valid_grant(&self) -> bool {
        self.root.is_dir()
    }

    fn entry_id(&self, relative: &str) -> String {
        format!("{ID_SCHEME}{relative}")
    }

    /// Resolve an identifier to an absolute path under the root.
    ///
    /// Three forms are accepted: a `tree:`-scheme identifier (relative path
    /// under the root), a plain relative path with separators (walked
    /// segment by segment), and a bare name (looked up in the root listing).
    /// An empty identifier resolves to the root itself.
    fn resolve(&self, id: &str) -> Result<PathBuf, StorageError> {
        if id.is_empty() {
            return Ok(self.root.clone());
        }

        if let Some(relative) = id.strip_prefix(ID_SCHEME) {
            let relative = Path::new(relative);
            if relative
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
            {
                return Err(StorageError::NotFound(id.to_string()));
            }
            return Ok(self.root.join(relative));
        }

        if id.contains('/') {
            let mut current = self.root.clone();
            for segment in id.split('/').filter(|s| !s.is_empty()) {
                current = find_child(&current, segment)
                    .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
            }
            return Ok(current);
        }

        find_child(&self.root, id).ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    /// List a directory, folders first, each group sorted by name.
    pub fn list_files(&self, dir_id: &str) -> Result<Vec<FileEntry>, StorageError> {
        let dir = self.resolve(dir_id)?;
        let mut entries = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            let name = entry.file_name().to_string_lossy().to_string();
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| name.clone());
            entries.push(FileEntry {
                name,
                path: self.entry_id(&relative),
                is_directory: meta.is_dir(),
                size: meta.len(),
            });
        }

        entries.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(entries)
    }

    pub fn read_file(&self, id: &str) -> Result<String, StorageError> {
        let path = self.resolve(id)?;
        Ok(fs::read_to_string(path)?)
    }

    /// Write (create or overwrite) a file directly under the root.
    pub fn write_file(&self, name: &str, content: &str) -> Result<String, StorageError> {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(self.entry_id(name))
    }

    /// Create a new file inside an existing directory.
    pub fn create_file(
        &self,
        dir_id: &str,
        name: &str,
        content: &str,
    ) -> Result<String, StorageError> {
        let dir = self.resolve(dir_id)?;
        let path = dir.join(name);
        fs::write(&path, content)?;
        let relative = path
            .strip_prefix(&self.root)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| name.to_string());
        Ok(self.entry_id(&relative))
    }

    pub fn create_folder(&self, dir_id: &str, name: &str) -> Result<String, StorageError> {
        let dir = self.resolve(dir_id)?;
        let path = dir.join(name);
        fs::create_dir_all(&path)?;
        let relative = path
            .strip_prefix(&self.root)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| name.to_string());
        Ok(self.entry_id(&relative))
    }

    /// Overwrite an existing file identified by any accepted identifier form.
    pub fn update_file(&self, id: &str, content: &str) -> Result<(), StorageError> {
        let path = self.resolve(id)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Whether a file with this identifier currently exists.
    pub fn exists(&self, id: &str) -> bool {
        self.resolve(id).map(|p| p.exists()).unwrap_or(false)
    }
}

fn find_child(dir: &Path, name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy() == name {
            return Some(entry.path());
        }
    }
    None
}
