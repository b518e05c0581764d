use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::prediction::ContentSource;

/// Content categories used across the site
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "news_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NewsCategory {
    Local,
    Chan,
    Caf,
    Afcon,
    International,
    Transfers,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct NewsArticle {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub category: NewsCategory,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub source: ContentSource,
    pub published: bool,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateNewsArticle {
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub category: NewsCategory,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateNewsArticle {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub category: Option<NewsCategory>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct NewsFilter {
    pub category: Option<NewsCategory>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct NewsComment {
    pub id: Uuid,
    pub article_id: Uuid,
    pub profile_id: Option<Uuid>,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateNewsComment {
    pub author_name: String,
    pub profile_id: Option<Uuid>,
    pub body: String,
}

impl NewsArticle {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        slug: &str,
        source: ContentSource,
        data: &CreateNewsArticle,
    ) -> Result<Self, sqlx::Error> {
        let title = data.title.trim();
        let published = data.published.unwrap_or(false);
        sqlx::query_as!(
            NewsArticle,
            r#"INSERT INTO news_articles (id, slug, title, summary, content, category, author, image_url, source, published)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING id as "id!: Uuid", slug as "slug!", title as "title!", summary as "summary?", content as "content!", category as "category!: NewsCategory", author as "author?", image_url as "image_url?", source as "source!: ContentSource", published as "published!: bool", views as "views!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            slug,
            title,
            data.summary,
            data.content,
            data.category,
            data.author,
            data.image_url,
            source,
            published
        )
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            NewsArticle,
            r#"SELECT id as "id!: Uuid", slug as "slug!", title as "title!", summary as "summary?", content as "content!", category as "category!: NewsCategory", author as "author?", image_url as "image_url?", source as "source!: ContentSource", published as "published!: bool", views as "views!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM news_articles
               WHERE id = $1"#,
            id
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            NewsArticle,
            r#"SELECT id as "id!: Uuid", slug as "slug!", title as "title!", summary as "summary?", content as "content!", category as "category!: NewsCategory", author as "author?", image_url as "image_url?", source as "source!: ContentSource", published as "published!: bool", views as "views!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM news_articles
               WHERE slug = $1"#,
            slug
        )
        .fetch_optional(pool)
        .await
    }

    /// Slugs equal to `base` or of the form `base-N`
    pub async fn find_slugs_like(pool: &SqlitePool, base: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar!(
            r#"SELECT slug as "slug!" FROM news_articles WHERE slug = $1 OR slug LIKE $1 || '-%'"#,
            base
        )
        .fetch_all(pool)
        .await
    }

    pub async fn list(
        pool: &SqlitePool,
        filter: &NewsFilter,
        published_only: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let limit = filter.limit.unwrap_or(20).clamp(1, 100);
        let offset = filter.offset.unwrap_or(0).max(0);
        sqlx::query_as!(
            NewsArticle,
            r#"SELECT id as "id!: Uuid", slug as "slug!", title as "title!", summary as "summary?", content as "content!", category as "category!: NewsCategory", author as "author?", image_url as "image_url?", source as "source!: ContentSource", published as "published!: bool", views as "views!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM news_articles
               WHERE ($1 IS NULL OR category = $1)
                 AND ($2 = 0 OR published = 1)
               ORDER BY created_at DESC, rowid DESC
               LIMIT $3 OFFSET $4"#,
            filter.category,
            published_only,
            limit,
            offset
        )
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateNewsArticle,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            NewsArticle,
            r#"UPDATE news_articles
               SET title = COALESCE($2, title),
                   summary = COALESCE($3, summary),
                   content = COALESCE($4, content),
                   category = COALESCE($5, category),
                   image_url = COALESCE($6, image_url),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id as "id!: Uuid", slug as "slug!", title as "title!", summary as "summary?", content as "content!", category as "category!: NewsCategory", author as "author?", image_url as "image_url?", source as "source!: ContentSource", published as "published!: bool", views as "views!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            data.title,
            data.summary,
            data.content,
            data.category,
            data.image_url
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn set_published(
        pool: &SqlitePool,
        id: Uuid,
        published: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            NewsArticle,
            r#"UPDATE news_articles
               SET published = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id as "id!: Uuid", slug as "slug!", title as "title!", summary as "summary?", content as "content!", category as "category!: NewsCategory", author as "author?", image_url as "image_url?", source as "source!: ContentSource", published as "published!: bool", views as "views!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            published
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn increment_views(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query!("UPDATE news_articles SET views = views + 1 WHERE id = $1", id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query!("DELETE FROM news_articles WHERE id = $1", id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl NewsComment {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        article_id: Uuid,
        data: &CreateNewsComment,
    ) -> Result<Self, sqlx::Error> {
        let author_name = data.author_name.trim();
        let body = data.body.trim();
        sqlx::query_as!(
            NewsComment,
            r#"INSERT INTO news_comments (id, article_id, profile_id, author_name, body)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id as "id!: Uuid", article_id as "article_id!: Uuid", profile_id as "profile_id?: Uuid", author_name as "author_name!", body as "body!", created_at as "created_at!: DateTime<Utc>""#,
            id,
            article_id,
            data.profile_id,
            author_name,
            body
        )
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_article_id(
        pool: &SqlitePool,
        article_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as!(
            NewsComment,
            r#"SELECT id as "id!: Uuid", article_id as "article_id!: Uuid", profile_id as "profile_id?: Uuid", author_name as "author_name!", body as "body!", created_at as "created_at!: DateTime<Utc>"
               FROM news_comments
               WHERE article_id = $1
               ORDER BY created_at ASC, rowid ASC"#,
            article_id
        )
        .fetch_all(pool)
        .await
    }
}
