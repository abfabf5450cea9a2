//! Data models for the project.
//!
//! Flattened views of the MangaDex resources the wrapper works with. The raw
//! JSON shapes live next to the client; these are what callers see.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A manga as returned by search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manga {
    /// MangaDex UUID
    pub id: String,

    // Titles
    pub title: String,
    pub description: Option<String>,

    /// Resource type reported by the API (always "manga" today)
    pub kind: String,
    pub status: Option<String>,
    pub year: Option<u32>,
    pub content_rating: Option<String>,

    /// English tag names
    pub tags: Vec<String>,

    // Languages
    pub original_language: String,
    pub available_languages: Vec<String>,

    /// External links keyed by site code (al, mal, amz, ...)
    pub links: BTreeMap<String, String>,
}

/// A chapter of a manga in one translated language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// MangaDex UUID
    pub id: String,
    pub title: Option<String>,
    pub volume: Option<String>,
    /// Chapter number as text ("12", "12.5"); None for oneshots
    pub number: Option<String>,
    pub pages: u32,
    pub translated_language: Option<String>,
}

impl Chapter {
    /// Whether this chapter carries the given number
    pub fn has_number(&self, number: &str) -> bool {
        self.number.as_deref().map(str::trim) == Some(number.trim())
    }
}

/// A manga tag (genre, theme, format, content)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub group: String,
}

/// Page image quality served by the at-home CDN
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageQuality {
    /// Original, uncompressed images
    #[default]
    Data,
    /// Compressed images
    DataSaver,
}

impl ImageQuality {
    /// Path segment used by the CDN
    pub fn as_str(&self) -> &str {
        match self {
            ImageQuality::Data => "data",
            ImageQuality::DataSaver => "data-saver",
        }
    }
}

impl std::fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_number_match() {
        let chapter = Chapter {
            id: "c1".to_string(),
            title: None,
            volume: Some("1".to_string()),
            number: Some("10.5".to_string()),
            pages: 20,
            translated_language: Some("en".to_string()),
        };

        assert!(chapter.has_number("10.5"));
        assert!(chapter.has_number(" 10.5 "));
        assert!(!chapter.has_number("10"));

        let oneshot = Chapter { number: None, ..chapter };
        assert!(!oneshot.has_number("10.5"));
    }

    #[test]
    fn test_image_quality() {
        assert_eq!(ImageQuality::default(), ImageQuality::Data);
        assert_eq!(ImageQuality::DataSaver.as_str(), "data-saver");
        assert_eq!(
            serde_json::to_string(&ImageQuality::DataSaver).unwrap(),
            "\"data-saver\""
        );
    }
}
