//! Chapter listing and downloads.
//!
//! Chapters come from the manga feed, which is paginated at 500 entries.
//! Pages are fetched from the at-home CDN node assigned to each chapter.

use crate::api::{AtHomeResponse, ChapterData, CollectionResponse, RateLimitedClient, RequestDescriptor};
use crate::manga::{decode_ok, MangaSearch};
use anyhow::{anyhow, Context, Result};
use shared::{Chapter, DownloadPaths, ImageQuality, Manga};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Largest page the feed endpoint serves
pub const FEED_PAGE_LIMIT: u32 = 500;

/// Statistics for a download session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadStats {
    pub total_chapters: usize,
    pub chapters_downloaded: usize,
    pub pages_downloaded: usize,
    pub errors: usize,
}

/// Chapters of one manga in the preferred language
pub struct MangaChapters {
    client: RateLimitedClient,
    manga: Manga,
    preferred_language: String,
    paths: DownloadPaths,
    page_size: u32,
}

impl MangaChapters {
    /// Fetch the manga, then wrap it
    pub async fn load(
        client: RateLimitedClient,
        manga_id: &str,
        preferred_language: &str,
        download_root: impl AsRef<Path>,
    ) -> Result<Self> {
        let manga = MangaSearch::new(client.clone(), preferred_language)
            .by_id(manga_id)
            .await?;

        Ok(Self::for_manga(client, manga, preferred_language, download_root))
    }

    /// Wrap an already fetched manga
    pub fn for_manga(
        client: RateLimitedClient,
        manga: Manga,
        preferred_language: &str,
        download_root: impl AsRef<Path>,
    ) -> Self {
        Self {
            client,
            manga,
            preferred_language: preferred_language.to_string(),
            paths: DownloadPaths::new(download_root),
            page_size: FEED_PAGE_LIMIT,
        }
    }

    /// Use smaller feed pages (clamped to 1..=500)
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, FEED_PAGE_LIMIT);
        self
    }

    pub fn manga(&self) -> &Manga {
        &self.manga
    }

    pub fn preferred_language(&self) -> &str {
        &self.preferred_language
    }

    /// Every chapter in the preferred language, in feed order
    pub async fn all(&self) -> Result<Vec<Chapter>> {
        let mut chapters = Vec::new();
        let mut offset = 0u32;

        loop {
            let descriptor = RequestDescriptor::get(format!("manga/{}/feed", self.manga.id))
                .with_query("translatedLanguage[]", self.preferred_language.as_str())
                .with_query("limit", self.page_size.to_string())
                .with_query("offset", offset.to_string())
                .with_query("order[volume]", "asc")
                .with_query("order[chapter]", "asc");

            let response = self
                .client
                .send(&descriptor)
                .await
                .with_context(|| format!("Failed to fetch feed of manga {} at offset {}", self.manga.id, offset))?;
            let value = response
                .json()
                .ok_or_else(|| anyhow!("Feed of manga {} is not JSON", self.manga.id))?;
            let page: CollectionResponse<ChapterData> = decode_ok(value)?;

            let received = page.data.len() as u32;
            chapters.extend(page.data.into_iter().map(Chapter::from));
            offset += received;

            debug!(
                manga_id = %self.manga.id,
                received = received,
                offset = offset,
                total = page.total,
                "Fetched feed page"
            );

            if received == 0 || offset >= page.total {
                break;
            }
        }

        info!(
            manga = %self.manga.title,
            chapters = chapters.len(),
            language = %self.preferred_language,
            "Listed chapters"
        );

        Ok(chapters)
    }

    /// First chapter carrying `number`
    pub async fn find_by_number(&self, number: &str) -> Result<Option<Chapter>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .find(|chapter| chapter.has_number(number)))
    }

    /// Download every page of a chapter
    ///
    /// Returns the chapter directory and the number of pages written, which
    /// follows the at-home listing for `quality` rather than the feed's count.
    pub async fn download(&self, chapter: &Chapter, quality: ImageQuality) -> Result<(PathBuf, usize)> {
        let at_home_response = self
            .client
            .send(&RequestDescriptor::get(format!("at-home/server/{}", chapter.id)))
            .await
            .with_context(|| format!("Failed to get at-home server for chapter {}", chapter.id))?;
        let at_home: AtHomeResponse = decode_ok(
            at_home_response
                .json()
                .ok_or_else(|| anyhow!("At-home response for chapter {} is not JSON", chapter.id))?,
        )?;

        let chapter_dir = self.paths.chapter_dir(
            &self.manga.title,
            chapter.number.as_deref(),
            chapter.title.as_deref(),
        );
        tokio::fs::create_dir_all(&chapter_dir)
            .await
            .with_context(|| format!("Failed to create chapter directory: {}", chapter_dir.display()))?;

        let pages = match quality {
            ImageQuality::Data => &at_home.chapter.data,
            ImageQuality::DataSaver => &at_home.chapter.data_saver,
        };

        if pages.is_empty() {
            warn!(chapter_id = %chapter.id, quality = %quality, "Chapter has no pages");
        }

        for (index, file_name) in pages.iter().enumerate() {
            let descriptor = RequestDescriptor::get(format!(
                "{}/{}/{}",
                quality.as_str(),
                at_home.chapter.hash,
                file_name
            ))
            .with_base_url(at_home.base_url.as_str());

            let page = self
                .client
                .send(&descriptor)
                .await
                .with_context(|| format!("Failed to download page {} of chapter {}", index + 1, chapter.id))?;

            let page_path = self.paths.page_file(
                &chapter_dir,
                index + 1,
                DownloadPaths::page_extension(file_name),
            );
            tokio::fs::write(&page_path, page.into_bytes())
                .await
                .with_context(|| format!("Failed to write page: {}", page_path.display()))?;

            debug!(
                chapter_id = %chapter.id,
                page = index + 1,
                pages = pages.len(),
                path = %page_path.display(),
                "Page saved"
            );
        }

        Ok((chapter_dir, pages.len()))
    }

    /// Download the chapter carrying `number`, if there is one
    pub async fn download_by_number(&self, number: &str, quality: ImageQuality) -> Result<Option<PathBuf>> {
        match self.find_by_number(number).await? {
            Some(chapter) => {
                info!(
                    manga = %self.manga.title,
                    number = number,
                    title = chapter.title.as_deref().unwrap_or(""),
                    "Downloading chapter"
                );
                let (dir, pages) = self.download(&chapter, quality).await?;
                info!(
                    manga = %self.manga.title,
                    path = %dir.display(),
                    pages = pages,
                    "Chapter downloaded"
                );
                Ok(Some(dir))
            }
            None => {
                warn!(manga = %self.manga.title, number = number, "No chapter with that number");
                Ok(None)
            }
        }
    }

    /// Download every chapter; failures are logged and counted
    pub async fn download_all(&self, quality: ImageQuality) -> Result<DownloadStats> {
        let chapters = self.all().await?;
        let mut stats = DownloadStats {
            total_chapters: chapters.len(),
            ..Default::default()
        };

        for (idx, chapter) in chapters.iter().enumerate() {
            info!(
                progress = format!("{}/{}", idx + 1, chapters.len()),
                manga = %self.manga.title,
                number = chapter.number.as_deref().unwrap_or("oneshot"),
                "Downloading chapter"
            );

            match self.download(chapter, quality).await {
                Ok((_, pages)) => {
                    stats.chapters_downloaded += 1;
                    stats.pages_downloaded += pages;
                }
                Err(e) => {
                    error!(
                        chapter_id = %chapter.id,
                        error = %format!("{:#}", e),
                        "Failed to download chapter"
                    );
                    stats.errors += 1;
                }
            }
        }

        info!(
            manga = %self.manga.title,
            total = stats.total_chapters,
            downloaded = stats.chapters_downloaded,
            errors = stats.errors,
            "Download complete"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ClientSettings, RateBudget};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RateLimitedClient {
        RateLimitedClient::new(ClientSettings {
            base_url: server.uri(),
            budget: RateBudget::new(100, Duration::from_secs(1)),
            ..Default::default()
        })
        .unwrap()
    }

    fn berserk() -> Manga {
        Manga {
            id: "m1".to_string(),
            title: "Berserk".to_string(),
            description: None,
            kind: "manga".to_string(),
            status: Some("ongoing".to_string()),
            year: Some(1989),
            content_rating: Some("suggestive".to_string()),
            tags: vec![],
            original_language: "ja".to_string(),
            available_languages: vec!["en".to_string()],
            links: BTreeMap::new(),
        }
    }

    fn chapter_json(id: &str, number: &str, pages: u32) -> serde_json::Value {
        json!({
            "id": id,
            "type": "chapter",
            "attributes": {
                "title": format!("Chapter {}", number),
                "volume": "1",
                "chapter": number,
                "pages": pages,
                "translatedLanguage": "en"
            }
        })
    }

    async fn mount_feed_page(server: &MockServer, offset: &str, data: Vec<serde_json::Value>, total: u32) {
        Mock::given(method("GET"))
            .and(path("/manga/m1/feed"))
            .and(query_param("offset", offset))
            .and(query_param("translatedLanguage[]", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "ok",
                "data": data,
                "limit": 2,
                "offset": offset.parse::<u32>().unwrap(),
                "total": total
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_all_follows_pagination() {
        let server = MockServer::start().await;
        mount_feed_page(&server, "0", vec![chapter_json("c1", "1", 3), chapter_json("c2", "2", 3)], 5).await;
        mount_feed_page(&server, "2", vec![chapter_json("c3", "3", 3), chapter_json("c4", "4", 3)], 5).await;
        mount_feed_page(&server, "4", vec![chapter_json("c5", "5", 3)], 5).await;

        let chapters = MangaChapters::for_manga(client(&server), berserk(), "en", "/unused")
            .with_page_size(2)
            .all()
            .await
            .unwrap();

        let ids: Vec<_> = chapters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3", "c4", "c5"]);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_all_stops_on_empty_page() {
        let server = MockServer::start().await;
        // Total claims more than the feed actually serves
        mount_feed_page(&server, "0", vec![chapter_json("c1", "1", 3)], 10).await;
        mount_feed_page(&server, "1", vec![], 10).await;

        let chapters = MangaChapters::for_manga(client(&server), berserk(), "en", "/unused")
            .all()
            .await
            .unwrap();

        assert_eq!(chapters.len(), 1);
    }

    #[tokio::test]
    async fn test_download_by_number_writes_pages() {
        let server = MockServer::start().await;
        mount_feed_page(&server, "0", vec![chapter_json("c1", "1", 2), chapter_json("c2", "2", 2)], 2).await;

        Mock::given(method("GET"))
            .and(path("/at-home/server/c2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "ok",
                "baseUrl": server.uri(),
                "chapter": {
                    "hash": "h2",
                    "data": ["a-1.png", "b-2.jpg"],
                    "dataSaver": ["a-1.jpg", "b-2.jpg"]
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data-saver/h2/a-1.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8], "image/jpeg"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data-saver/h2/b-2.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![2u8], "image/jpeg"))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let chapters = MangaChapters::for_manga(client(&server), berserk(), "en", temp_dir.path());

        let dir = chapters
            .download_by_number("2", ImageQuality::DataSaver)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(dir, temp_dir.path().join("Berserk").join("2 - Chapter 2"));
        assert_eq!(std::fs::read(dir.join("1.jpg")).unwrap(), vec![1u8]);
        assert_eq!(std::fs::read(dir.join("2.jpg")).unwrap(), vec![2u8]);

        let missing = chapters
            .download_by_number("99", ImageQuality::DataSaver)
            .await
            .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_download_all_counts_failures() {
        let server = MockServer::start().await;
        // Feed metadata claims more pages than the at-home listing serves
        mount_feed_page(&server, "0", vec![chapter_json("c1", "1", 5), chapter_json("c2", "2", 1)], 2).await;

        Mock::given(method("GET"))
            .and(path("/at-home/server/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "ok",
                "baseUrl": server.uri(),
                "chapter": {"hash": "h1", "data": ["p1.png"], "dataSaver": []}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/h1/p1.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![7u8], "image/png"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/at-home/server/c2"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "result": "error",
                "errors": [{"id": "x", "status": 404, "title": "not_found_http_exception", "detail": "Chapter could not be found"}]
            })))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let stats = MangaChapters::for_manga(client(&server), berserk(), "en", temp_dir.path())
            .download_all(ImageQuality::Data)
            .await
            .unwrap();

        assert_eq!(
            stats,
            DownloadStats {
                total_chapters: 2,
                chapters_downloaded: 1,
                pages_downloaded: 1,
                errors: 1,
            }
        );
        assert!(temp_dir.path().join("Berserk/1 - Chapter 1/1.png").exists());
    }

    #[tokio::test]
    async fn test_load_fetches_manga() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manga/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "ok",
                "data": {
                    "id": "m1",
                    "type": "manga",
                    "attributes": {
                        "title": {"en": "Berserk"},
                        "originalLanguage": "ja",
                        "status": "ongoing",
                        "year": 1989,
                        "contentRating": "suggestive"
                    }
                }
            })))
            .mount(&server)
            .await;

        let chapters = MangaChapters::load(client(&server), "m1", "en", "/unused")
            .await
            .unwrap();
        assert_eq!(chapters.manga().title, "Berserk");
    }
}
