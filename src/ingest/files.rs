use crate::error::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// An uploaded export, not yet parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub contents: String,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }

    pub fn from_value(name: impl Into<String>, value: &Value) -> Self {
        Self::new(name, value.to_string())
    }

    /// Read one file. Invalid UTF-8 is replaced rather than rejected, so the
    /// failure surfaces as a per-file parse error during the batch.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, String::from_utf8_lossy(&bytes).into_owned()))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Expand files and directories into the `*.json` exports they contain,
/// sorted by path within each directory.
pub fn collect_json_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_json(e.path()))
                .map(|e| e.path().to_path_buf())
                .collect();
            found.sort();
            debug!(dir = %path.display(), count = found.len(), "found exports");
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("path does not exist: {}", path.display()),
            )));
        }
    }
    Ok(files)
}

pub fn load_files(paths: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    let files = collect_json_paths(paths)?
        .iter()
        .map(|p| UploadedFile::read(p))
        .collect::<Result<Vec<_>>>()?;
    info!(count = files.len(), "loaded export files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_expand_to_sorted_json_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "[]").unwrap();
        std::fs::write(dir.path().join("a.JSON"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let files = load_files(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.JSON", "b.json"]);
        assert_eq!(files[1].contents, "[]");
    }

    #[test]
    fn explicit_files_kept_regardless_of_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.txt");
        std::fs::write(&path, "{\"kind\": \"bar\"}").unwrap();
        let files = load_files(&[path]).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "export.txt");
    }

    #[test]
    fn missing_path_is_an_error() {
        assert!(load_files(&[PathBuf::from("/nonexistent/exports")]).is_err());
    }

    #[test]
    fn invalid_utf8_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, [0xff, 0xfe, b'{']).unwrap();
        let file = UploadedFile::read(&path).unwrap();
        assert!(file.contents.ends_with('{'));
    }
}
