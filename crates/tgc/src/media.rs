use std::path::PathBuf;

use async_trait::async_trait;

use tgc_core::{ports::MediaStore, Result};

/// Writes photos to `<root>/<owner>/photo_<i>.jpg`.
pub struct FileMediaStore {
    root: PathBuf,
}

impl FileMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl MediaStore for FileMediaStore {
    async fn store(&self, owner: &str, index: usize, bytes: &[u8]) -> Result<String> {
        let dir = self.root.join(file_safe(owner));
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("photo_{index}.jpg"));
        tokio::fs::write(&path, bytes).await?;
        Ok(path.display().to_string())
    }
}

/// Replace characters that would escape or break a single path component.
pub fn file_safe(s: &str) -> String {
    let out: String = s
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match out.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => out,
    }
}
