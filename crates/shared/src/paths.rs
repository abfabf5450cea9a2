//! File path utilities for downloaded chapters.
//!
//! Layout: `<root>/<manga title>/<chapter>/<page>.<ext>`, with every
//! component sanitized so it is a valid file name on all platforms.

use std::path::{Path, PathBuf};

/// File path manager for downloads
#[derive(Debug, Clone)]
pub struct DownloadPaths {
    root: PathBuf,
}

impl DownloadPaths {
    /// Create a new DownloadPaths with the given root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root download directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the directory holding every chapter of a manga
    pub fn manga_dir(&self, manga_title: &str) -> PathBuf {
        self.root.join(Self::sanitize(manga_title))
    }

    /// Get the directory for one chapter
    ///
    /// Named `<number> - <title>` when the chapter has a title, `<number>`
    /// otherwise. Oneshots without a number use `oneshot`.
    pub fn chapter_dir(&self, manga_title: &str, number: Option<&str>, title: Option<&str>) -> PathBuf {
        let number = number.filter(|n| !n.trim().is_empty()).unwrap_or("oneshot");
        let name = match title.filter(|t| !t.trim().is_empty()) {
            Some(title) => format!("{} - {}", number, title),
            None => number.to_string(),
        };

        self.manga_dir(manga_title).join(Self::sanitize(&name))
    }

    /// Get the file path for a page (1-based index)
    pub fn page_file(&self, chapter_dir: &Path, index: usize, extension: &str) -> PathBuf {
        chapter_dir.join(format!("{}.{}", index, extension))
    }

    /// Extension of a page file name as served by the CDN, `bin` if it has none
    pub fn page_extension(file_name: &str) -> &str {
        file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
            .unwrap_or("bin")
    }

    /// Replace characters that are invalid in file names
    pub fn sanitize(name: &str) -> String {
        let cleaned: String = name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();

        let trimmed = cleaned.trim().trim_end_matches('.');
        if trimmed.is_empty() {
            "untitled".to_string()
        } else {
            trimmed.to_string()
        }
    }
}
