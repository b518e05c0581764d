use std::sync::Arc;

use db::{
    is_unique_violation,
    models::{
        news::{
            CreateNewsArticle, CreateNewsComment, NewsArticle, NewsCategory, NewsComment,
            NewsFilter, UpdateNewsArticle,
        },
        prediction::ContentSource,
    },
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use utils::text;
use uuid::Uuid;

use super::claude_api::{ClaudeApiError, ContentGenerator};

const NEWS_SYSTEM_PROMPT: &str = "You are a sports journalist covering Kenyan and African \
football. Reply with a single JSON object and nothing else.";
const MAX_COMMENT_CHARS: usize = 1000;
const MAX_SLUG_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
    #[error("article not found")]
    NotFound,
    #[error("comments are only accepted on published articles")]
    NotPublished,
    #[error(transparent)]
    Generation(#[from] ClaudeApiError),
    #[error("AI reply was not a usable article: {0}")]
    InvalidGeneratedContent(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct GenerateArticle {
    pub topic: String,
    pub category: NewsCategory,
}

#[derive(Debug, Deserialize)]
struct GeneratedArticle {
    title: String,
    summary: String,
    content: String,
}

pub struct NewsService {
    pool: SqlitePool,
    generator: Option<Arc<dyn ContentGenerator>>,
}

impl NewsService {
    pub fn new(pool: SqlitePool, generator: Option<Arc<dyn ContentGenerator>>) -> Self {
        Self { pool, generator }
    }

    pub async fn create_article(&self, data: CreateNewsArticle) -> Result<NewsArticle, NewsError> {
        let data = validate_article(data)?;
        self.insert_with_unique_slug(&data, ContentSource::Manual).await
    }

    /// Public listing shows published articles only; editors see drafts too.
    pub async fn list(
        &self,
        filter: &NewsFilter,
        include_drafts: bool,
    ) -> Result<Vec<NewsArticle>, NewsError> {
        Ok(NewsArticle::list(&self.pool, filter, !include_drafts).await?)
    }

    /// Fetch a published article for a reader and count the view.
    pub async fn get_by_slug(&self, slug: &str) -> Result<NewsArticle, NewsError> {
        let mut article = NewsArticle::find_by_slug(&self.pool, slug)
            .await?
            .filter(|a| a.published)
            .ok_or(NewsError::NotFound)?;
        NewsArticle::increment_views(&self.pool, article.id).await?;
        article.views += 1;
        Ok(article)
    }

    pub async fn get(&self, id: Uuid) -> Result<NewsArticle, NewsError> {
        NewsArticle::find_by_id(&self.pool, id)
            .await?
            .ok_or(NewsError::NotFound)
    }

    /// Edits keep the slug so shared links stay valid.
    pub async fn update(
        &self,
        id: Uuid,
        mut data: UpdateNewsArticle,
    ) -> Result<NewsArticle, NewsError> {
        if let Some(title) = &data.title {
            let title = title.trim();
            if title.is_empty() || title.chars().count() > 200 {
                return Err(NewsError::Validation("title must be 1-200 characters".to_string()));
            }
            data.title = Some(title.to_string());
        }
        if data.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(NewsError::Validation("content cannot be empty".to_string()));
        }

        NewsArticle::update(&self.pool, id, &data)
            .await?
            .ok_or(NewsError::NotFound)
    }

    pub async fn set_published(&self, id: Uuid, published: bool) -> Result<NewsArticle, NewsError> {
        let article = NewsArticle::set_published(&self.pool, id, published)
            .await?
            .ok_or(NewsError::NotFound)?;
        info!(article_id = %id, slug = %article.slug, published, "Article publication changed");
        Ok(article)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), NewsError> {
        if NewsArticle::delete(&self.pool, id).await? == 0 {
            return Err(NewsError::NotFound);
        }
        info!(article_id = %id, "Article deleted");
        Ok(())
    }

    pub async fn add_comment(
        &self,
        article_id: Uuid,
        data: CreateNewsComment,
    ) -> Result<NewsComment, NewsError> {
        let body_len = data.body.trim().chars().count();
        if body_len == 0 || body_len > MAX_COMMENT_CHARS {
            return Err(NewsError::Validation(format!(
                "comment must be 1-{MAX_COMMENT_CHARS} characters"
            )));
        }
        let author_len = data.author_name.trim().chars().count();
        if author_len == 0 || author_len > 50 {
            return Err(NewsError::Validation(
                "author name must be 1-50 characters".to_string(),
            ));
        }

        let article = self.get(article_id).await?;
        if !article.published {
            return Err(NewsError::NotPublished);
        }

        Ok(NewsComment::create(&self.pool, Uuid::new_v4(), article_id, &data).await?)
    }

    pub async fn list_comments(&self, article_id: Uuid) -> Result<Vec<NewsComment>, NewsError> {
        self.get(article_id).await?;
        Ok(NewsComment::find_by_article_id(&self.pool, article_id).await?)
    }

    /// Draft an article with the model. The result is stored unpublished
    /// for an editor to review.
    pub async fn generate_with_ai(&self, request: GenerateArticle) -> Result<NewsArticle, NewsError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or(NewsError::Generation(ClaudeApiError::MissingApiKey))?;

        let topic = request.topic.trim();
        if topic.is_empty() || topic.chars().count() > 300 {
            return Err(NewsError::Validation("topic must be 1-300 characters".to_string()));
        }

        let prompt = format!(
            "Write a news article for the '{category}' section about: {topic}\n\
             Reply as JSON: {{\"title\": \"headline under 120 characters\", \
             \"summary\": \"one sentence\", \"content\": \"four to six paragraphs separated by blank lines\"}}",
            category = request.category,
        );
        let reply = generator.ask_json(&prompt, NEWS_SYSTEM_PROMPT, 2048).await?;
        let generated: GeneratedArticle = serde_json::from_value(reply)
            .map_err(|e| NewsError::InvalidGeneratedContent(e.to_string()))?;

        let data = validate_article(CreateNewsArticle {
            title: generated.title,
            summary: Some(generated.summary),
            content: generated.content,
            category: request.category,
            author: Some("Ball Mtaani AI Desk".to_string()),
            image_url: None,
            published: Some(false),
        })
        .map_err(|e| NewsError::InvalidGeneratedContent(e.to_string()))?;

        let article = self
            .insert_with_unique_slug(&data, ContentSource::AiGenerated)
            .await?;
        info!(article_id = %article.id, slug = %article.slug, "AI article drafted");
        Ok(article)
    }

    /// Insert under the first free slug. A concurrent insert taking the
    /// same slug is retried with the next suffix.
    async fn insert_with_unique_slug(
        &self,
        data: &CreateNewsArticle,
        source: ContentSource,
    ) -> Result<NewsArticle, NewsError> {
        let base = base_slug(&data.title);

        let mut last_err = None;
        for _ in 0..MAX_SLUG_ATTEMPTS {
            let existing = NewsArticle::find_slugs_like(&self.pool, &base).await?;
            let slug = next_free_slug(&base, &existing);
            match NewsArticle::create(&self.pool, Uuid::new_v4(), &slug, source, data).await {
                Ok(article) => {
                    info!(article_id = %article.id, slug = %article.slug, source = %source, "Article created");
                    return Ok(article);
                }
                Err(e) if is_unique_violation(&e) => {
                    debug!(slug = %slug, "Slug taken concurrently, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .map(NewsError::Database)
            .unwrap_or_else(|| NewsError::Validation("could not allocate a slug".to_string())))
    }
}

fn base_slug(title: &str) -> String {
    let slug = text::slugify(title);
    let slug: String = slug.chars().take(80).collect();
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "article".to_string()
    } else {
        slug
    }
}

/// `base` if free, otherwise `base-N` with N one past the highest suffix in use.
pub fn next_free_slug(base: &str, existing: &[String]) -> String {
    if !existing.iter().any(|s| s == base) {
        return base.to_string();
    }

    let prefix = format!("{base}-");
    let highest = existing
        .iter()
        .filter_map(|s| s.strip_prefix(&prefix))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(1);
    format!("{base}-{}", highest + 1)
}

fn validate_article(mut data: CreateNewsArticle) -> Result<CreateNewsArticle, NewsError> {
    data.title = data.title.trim().to_string();
    if data.title.is_empty() || data.title.chars().count() > 200 {
        return Err(NewsError::Validation("title must be 1-200 characters".to_string()));
    }
    if data.content.trim().is_empty() {
        return Err(NewsError::Validation("content cannot be empty".to_string()));
    }
    data.summary = data
        .summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if let Some(url) = &data.image_url
        && !(url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/'))
    {
        return Err(NewsError::Validation("image url must be http(s) or a site path".to_string()));
    }
    Ok(data)
}
