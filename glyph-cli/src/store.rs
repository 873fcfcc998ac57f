//! Sources kept as `<id>.glyph` files under one root directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use glyph_core::{CoreError, SourceDiff, SourceStore};
use tracing::debug;
use walkdir::WalkDir;

const EXTENSION: &str = "glyph";

#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.{EXTENSION}"))
    }
}

impl SourceStore for DirectoryStore {
    fn get(&self, id: &str) -> Option<String> {
        fs::read_to_string(self.path_of(id)).ok()
    }

    fn apply(&mut self, diff: SourceDiff) -> Result<(), CoreError> {
        for (id, change) in diff {
            let path = self.path_of(&id);
            match change {
                Some(text) => {
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(&path, text)?;
                    debug!(path = %path.display(), "stored source");
                }
                None => match fs::remove_file(&path) {
                    Ok(()) => debug!(path = %path.display(), "removed source"),
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                },
            }
        }
        Ok(())
    }

    fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let path = entry.path();
                if !path.extension().is_some_and(|ext| ext == EXTENSION) {
                    return None;
                }
                let relative = path.strip_prefix(&self.root).ok()?.with_extension("");
                let parts: Vec<String> = relative
                    .components()
                    .map(|part| part.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Some(parts.join("/"))
            })
            .collect();
        ids.sort();
        ids
    }
}
