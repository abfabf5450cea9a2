//! Manga search.
//!
//! Look up manga by id, title or tags, optionally sorted with MangaDex's
//! `order[<field>]=<direction>` parameters.

use crate::api::{
    CollectionResponse, EntityResponse, ErrorResponse, MangaData, RateLimitedClient,
    RequestDescriptor, TagData,
};
use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use shared::{Manga, Tag};
use tracing::{debug, info};

/// Sort direction for an `order[...]` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(anyhow!("Invalid sort direction: {}", s)),
        }
    }
}

/// Sort fields in priority order, e.g. `[("rating", Desc), ("year", Asc)]`
pub type SortOrder = Vec<(String, SortDirection)>;

/// Turn a sort order into deep-object query pairs (`order[rating]=desc`)
pub fn format_sort(sort: &[(String, SortDirection)]) -> Vec<(String, String)> {
    sort.iter()
        .map(|(field, direction)| (format!("order[{}]", field), direction.as_str().to_string()))
        .collect()
}

/// Fail on a body that reports `"result": "error"`, otherwise decode it
pub(crate) fn decode_ok<T: DeserializeOwned>(value: &serde_json::Value) -> Result<T> {
    if value.get("result").and_then(|r| r.as_str()) == Some("error") {
        let error: ErrorResponse =
            serde_json::from_value(value.clone()).context("Failed to parse error response")?;
        match error.errors.first() {
            Some(first) => bail!("Result not okay: {}", first),
            None => bail!("Result not okay: no error details"),
        }
    }

    serde_json::from_value(value.clone()).context("Failed to parse response")
}

/// Search interface for manga
#[derive(Debug, Clone)]
pub struct MangaSearch {
    client: RateLimitedClient,
    preferred_language: String,
}

impl MangaSearch {
    /// Create a new search interface
    pub fn new(client: RateLimitedClient, preferred_language: impl Into<String>) -> Self {
        Self {
            client,
            preferred_language: preferred_language.into(),
        }
    }

    pub fn client(&self) -> &RateLimitedClient {
        &self.client
    }

    pub fn preferred_language(&self) -> &str {
        &self.preferred_language
    }

    async fn get_json<T: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> Result<T> {
        let path = descriptor.path().to_string();
        let response = self
            .client
            .send(&descriptor)
            .await
            .with_context(|| format!("Request to `{}` failed", path))?;

        let value = response
            .json()
            .ok_or_else(|| anyhow!("Expected a JSON body from `{}`", path))?;
        decode_ok(value)
    }

    /// Fetch one manga by its UUID
    pub async fn by_id(&self, manga_id: &str) -> Result<Manga> {
        debug!(manga_id = manga_id, "Fetching manga by id");
        let response: EntityResponse<MangaData> = self
            .get_json(RequestDescriptor::get(format!("manga/{}", manga_id)))
            .await
            .with_context(|| format!("Failed to fetch manga {}", manga_id))?;

        Ok(response.data.into_manga(&self.preferred_language))
    }

    /// Search manga by title
    pub async fn by_title(&self, title: &str, sort: &[(String, SortDirection)]) -> Result<Vec<Manga>> {
        info!(title = title, "Searching manga by title");
        let descriptor = RequestDescriptor::get("manga")
            .with_query("title", title)
            .with_queries(format_sort(sort));

        let response: CollectionResponse<MangaData> = self
            .get_json(descriptor)
            .await
            .with_context(|| format!("Failed to search manga titled `{}`", title))?;

        Ok(self.to_manga(response))
    }

    /// All tags known to MangaDex
    pub async fn tags(&self) -> Result<Vec<Tag>> {
        debug!("Fetching manga tags");
        let response: CollectionResponse<TagData> = self
            .get_json(RequestDescriptor::get("manga/tag"))
            .await
            .context("Failed to fetch manga tags")?;

        Ok(response.data.into_iter().map(Tag::from).collect())
    }

    /// Search manga by English tag names
    ///
    /// Names that match no tag are ignored.
    pub async fn by_tags(
        &self,
        include: &[&str],
        exclude: &[&str],
        sort: &[(String, SortDirection)],
    ) -> Result<Vec<Manga>> {
        let tags = self.tags().await?;
        let included = resolve_tag_ids(&tags, include);
        let excluded = resolve_tag_ids(&tags, exclude);

        info!(
            include = ?include,
            exclude = ?exclude,
            resolved_include = included.len(),
            resolved_exclude = excluded.len(),
            "Searching manga by tags"
        );

        let descriptor = RequestDescriptor::get("manga")
            .with_queries(included.into_iter().map(|id| ("includedTags[]", id)))
            .with_queries(excluded.into_iter().map(|id| ("excludedTags[]", id)))
            .with_queries(format_sort(sort));

        let response: CollectionResponse<MangaData> = self
            .get_json(descriptor)
            .await
            .context("Failed to search manga by tags")?;

        Ok(self.to_manga(response))
    }

    fn to_manga(&self, response: CollectionResponse<MangaData>) -> Vec<Manga> {
        response
            .data
            .into_iter()
            .map(|data| data.into_manga(&self.preferred_language))
            .collect()
    }
}

/// Ids of the tags whose name matches one of `names`, case-insensitively
fn resolve_tag_ids(tags: &[Tag], names: &[&str]) -> Vec<String> {
    tags.iter()
        .filter(|tag| names.iter().any(|name| tag.name.eq_ignore_ascii_case(name)))
        .map(|tag| tag.id.clone())
        .collect()
}
