//! MangaDex API response types.
//!
//! These types represent the JSON responses of the endpoints the wrapper uses.
//! See <https://api.mangadex.org/docs/> for the full schema.

use serde::{Deserialize, Deserializer, Serialize};
use shared::{Chapter, Manga, Tag};
use std::collections::BTreeMap;

/// Localized strings keyed by language code
pub type LocalizedString = BTreeMap<String, String>;

/// Error body (`"result": "error"`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub result: String,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub id: String,
    pub status: u16,
    pub title: String,
    #[serde(default)]
    pub detail: Option<String>,
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<status {}> {}: {}",
            self.status,
            self.title,
            self.detail.as_deref().unwrap_or("no detail")
        )
    }
}

/// Single entity wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityResponse<T> {
    pub result: String,
    pub data: T,
}

/// Paginated collection wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResponse<T> {
    pub result: String,
    pub data: Vec<T>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub total: u32,
}

/// Manga resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MangaData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: MangaAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaAttributes {
    #[serde(deserialize_with = "lenient_map")]
    pub title: LocalizedString,
    #[serde(default)]
    pub alt_titles: Vec<LocalizedString>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub description: LocalizedString,
    pub status: Option<String>,
    pub year: Option<u32>,
    pub content_rating: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagData>,
    pub original_language: String,
    #[serde(default)]
    pub available_translated_languages: Vec<Option<String>>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub links: LocalizedString,
}

/// Tag resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagData {
    pub id: String,
    pub attributes: TagAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagAttributes {
    #[serde(deserialize_with = "lenient_map")]
    pub name: LocalizedString,
    #[serde(default)]
    pub group: String,
}

/// Chapter resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterData {
    pub id: String,
    pub attributes: ChapterAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterAttributes {
    pub title: Option<String>,
    pub volume: Option<String>,
    pub chapter: Option<String>,
    #[serde(default)]
    pub pages: u32,
    pub translated_language: Option<String>,
}

/// `GET at-home/server/{chapterId}` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtHomeResponse {
    pub result: String,
    pub base_url: String,
    pub chapter: AtHomeChapter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtHomeChapter {
    pub hash: String,
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default)]
    pub data_saver: Vec<String>,
}

/// The API serializes empty maps as `[]`; accept both shapes, and `null`.
fn lenient_map<'de, D>(deserializer: D) -> Result<LocalizedString, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList {
        Map(BTreeMap<String, Option<String>>),
        List(Vec<serde_json::Value>),
        Null(()),
    }

    Ok(match MapOrList::deserialize(deserializer)? {
        MapOrList::Map(map) => map
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect(),
        MapOrList::List(_) | MapOrList::Null(()) => BTreeMap::new(),
    })
}

impl MangaData {
    /// Flatten into a [`Manga`], picking texts in the preferred language
    ///
    /// Title order: main title in `lang`, alternative title in `lang`, main
    /// English title, then any title at all.
    pub fn into_manga(self, lang: &str) -> Manga {
        let attributes = self.attributes;

        let title = attributes
            .title
            .get(lang)
            .or_else(|| attributes.alt_titles.iter().find_map(|alt| alt.get(lang)))
            .or_else(|| attributes.title.get("en"))
            .or_else(|| attributes.title.values().next())
            .cloned()
            .unwrap_or_default();

        let description = attributes
            .description
            .get(lang)
            .filter(|d| !d.trim().is_empty())
            .cloned();

        let tags = attributes
            .tags
            .into_iter()
            .filter_map(|tag| tag.attributes.name.get("en").cloned())
            .collect();

        Manga {
            id: self.id,
            title,
            description,
            kind: self.kind,
            status: attributes.status,
            year: attributes.year,
            content_rating: attributes.content_rating,
            tags,
            original_language: attributes.original_language,
            available_languages: attributes
                .available_translated_languages
                .into_iter()
                .flatten()
                .collect(),
            links: attributes.links,
        }
    }
}

impl From<TagData> for Tag {
    fn from(data: TagData) -> Self {
        let name = data
            .attributes
            .name
            .get("en")
            .or_else(|| data.attributes.name.values().next())
            .cloned()
            .unwrap_or_default();

        Tag {
            id: data.id,
            name,
            group: data.attributes.group,
        }
    }
}

impl From<ChapterData> for Chapter {
    fn from(data: ChapterData) -> Self {
        let attributes = data.attributes;
        Chapter {
            id: data.id,
            title: attributes.title.filter(|t| !t.trim().is_empty()),
            volume: attributes.volume,
            number: attributes.chapter,
            pages: attributes.pages,
            translated_language: attributes.translated_language,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manga_json() -> serde_json::Value {
        json!({
            "id": "801513ba-a712-498c-8f57-cae55b38cc92",
            "type": "manga",
            "attributes": {
                "title": {"en": "Berserk"},
                "altTitles": [{"ja": "ベルセルク"}, {"fr": "Berserk (fr)"}],
                "description": {"en": "Guts, a former mercenary...", "fr": ""},
                "status": "ongoing",
                "year": 1989,
                "contentRating": "suggestive",
                "tags": [
                    {"id": "t1", "type": "tag", "attributes": {"name": {"en": "Action"}, "group": "genre"}},
                    {"id": "t2", "type": "tag", "attributes": {"name": {"en": "Gore"}, "group": "content"}}
                ],
                "originalLanguage": "ja",
                "availableTranslatedLanguages": ["en", null, "fr"],
                "links": {"mal": "2"}
            }
        })
    }

    #[test]
    fn test_manga_conversion() {
        let data: MangaData = serde_json::from_value(manga_json()).unwrap();
        let manga = data.into_manga("en");

        assert_eq!(manga.title, "Berserk");
        assert_eq!(manga.description.as_deref(), Some("Guts, a former mercenary..."));
        assert_eq!(manga.year, Some(1989));
        assert_eq!(manga.tags, vec!["Action", "Gore"]);
        assert_eq!(manga.available_languages, vec!["en", "fr"]);
        assert_eq!(manga.links.get("mal").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_title_prefers_language() {
        let data: MangaData = serde_json::from_value(manga_json()).unwrap();
        let manga = data.clone().into_manga("ja");
        assert_eq!(manga.title, "ベルセルク");
        assert_eq!(manga.description, None);

        // Empty descriptions count as missing
        assert_eq!(data.clone().into_manga("fr").description, None);

        // Unknown language falls back to English
        assert_eq!(data.into_manga("de").title, "Berserk");
    }

    #[test]
    fn test_empty_maps_serialized_as_lists() {
        let mut value = manga_json();
        value["attributes"]["description"] = json!([]);
        value["attributes"]["links"] = json!(null);

        let data: MangaData = serde_json::from_value(value).unwrap();
        assert!(data.attributes.description.is_empty());
        assert!(data.attributes.links.is_empty());
    }

    #[test]
    fn test_chapter_conversion() {
        let data: ChapterData = serde_json::from_value(json!({
            "id": "c1",
            "type": "chapter",
            "attributes": {
                "title": "",
                "volume": null,
                "chapter": "12.5",
                "pages": 19,
                "translatedLanguage": "en"
            }
        }))
        .unwrap();

        let chapter = Chapter::from(data);
        assert_eq!(chapter.title, None);
        assert_eq!(chapter.number.as_deref(), Some("12.5"));
        assert_eq!(chapter.pages, 19);
    }

    #[test]
    fn test_error_detail_display() {
        let error: ErrorResponse = serde_json::from_value(json!({
            "result": "error",
            "errors": [{"id": "e", "status": 400, "title": "validation_exception", "detail": "bad uuid"}]
        }))
        .unwrap();

        assert_eq!(error.errors[0].to_string(), "<status 400> validation_exception: bad uuid");
    }
}
