//! Read-only capture of the governed project tree
//!
//! Scanners operate on a `WorkspaceSnapshot`, never on the live filesystem:
//! all text files are read up front, so the five sub-scanners are pure
//! functions that can fan out safely while the tree stays untouched.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One captured file: repo-relative path plus full text content
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    pub rel_path: PathBuf,
    pub size_bytes: u64,
    pub content: String,
}

/// Immutable capture of the project tree at a point in time
#[derive(Debug, Clone)]
pub struct WorkspaceSnapshot {
    pub root: PathBuf,
    /// Sorted by `rel_path`, so iteration order is deterministic
    files: Vec<SnapshotFile>,
    pub captured_at: DateTime<Utc>,
}

impl WorkspaceSnapshot {
    /// Walk the tree and capture every text file.
    ///
    /// Unreadable files are skipped (degraded coverage, not failure); a
    /// missing root is the only fatal case.
    pub fn capture(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            anyhow::bail!("project root {} is not a directory", root.display());
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !should_ignore(e))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !is_likely_text_file(path) {
                continue;
            }

            if let Ok(content) = fs::read_to_string(path) {
                let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(content.len() as u64);
                let rel_path = path.strip_prefix(root).unwrap_or(path).to_path_buf();
                files.push(SnapshotFile {
                    rel_path,
                    size_bytes,
                    content,
                });
            }
        }

        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

        Ok(Self {
            root: root.canonicalize().context("resolving project root")?,
            files,
            captured_at: Utc::now(),
        })
    }

    /// Look up a captured file by repo-relative path
    pub fn get(&self, rel_path: &Path) -> Option<&SnapshotFile> {
        self.files
            .binary_search_by(|f| f.rel_path.as_path().cmp(rel_path))
            .ok()
            .map(|idx| &self.files[idx])
    }

    /// Content of a captured file, if present
    pub fn content(&self, rel_path: &Path) -> Option<&str> {
        self.get(rel_path).map(|f| f.content.as_str())
    }

    pub fn files(&self) -> &[SnapshotFile] {
        &self.files
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }
}

fn should_ignore(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| {
            let ignored = [
                "node_modules",
                "target",
                "vendor",
                "dist",
                "build",
                "__pycache__",
                ".venv",
                "venv",
            ];
            ignored.contains(&name) || name.starts_with('.')
        })
        .unwrap_or(false)
}

fn is_likely_text_file(path: &Path) -> bool {
    let text_extensions = [
        "rs", "js", "ts", "tsx", "jsx", "py", "rb", "go", "java",
        "sh", "bash", "zsh", "html", "htm", "css",
        "json", "yaml", "yml", "toml", "xml", "ini", "cfg", "conf",
        "md", "markdown", "txt", "rst",
        "sql", "graphql",
    ];

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        return text_extensions.contains(&ext.to_lowercase().as_str());
    }

    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        let name_lower = name.to_lowercase();
        return matches!(name_lower.as_str(), "makefile" | "dockerfile" | "procfile");
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_capture_skips_ignored_and_binary() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("index.js"), "console.log('hi');").unwrap();
        fs::write(dir.path().join("notes.md"), "# notes").unwrap();
        fs::write(dir.path().join("logo.png"), [0u8, 159, 146, 150]).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "ignored").unwrap();

        let snapshot = WorkspaceSnapshot::capture(dir.path()).unwrap();
        assert_eq!(snapshot.file_count(), 2);
        assert!(snapshot.get(Path::new("index.js")).is_some());
        assert!(snapshot.get(Path::new("node_modules/pkg/index.js")).is_none());
        assert!(snapshot.get(Path::new("logo.png")).is_none());
    }

    #[test]
    fn test_files_are_sorted_for_deterministic_iteration() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("zeta.md"), "z").unwrap();
        fs::write(dir.path().join("alpha.md"), "a").unwrap();
        fs::write(dir.path().join("midway.md"), "m").unwrap();

        let snapshot = WorkspaceSnapshot::capture(dir.path()).unwrap();
        let order: Vec<_> = snapshot
            .files()
            .iter()
            .map(|f| f.rel_path.to_string_lossy().to_string())
            .collect();
        assert_eq!(order, vec!["alpha.md", "midway.md", "zeta.md"]);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let missing = Path::new("/definitely/not/here/steward");
        assert!(WorkspaceSnapshot::capture(missing).is_err());
    }
}
