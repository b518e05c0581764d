use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AffiliateLink {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub tracking_code: String,
    pub destination_path: String,
    pub campaign: Option<String>,
    pub is_active: bool,
    pub clicks: i64,
    pub conversions: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateAffiliateLink {
    pub destination_path: String,
    pub campaign: Option<String>,
}

impl AffiliateLink {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        affiliate_id: Uuid,
        tracking_code: &str,
        data: &CreateAffiliateLink,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as!(
            AffiliateLink,
            r#"INSERT INTO affiliate_links (id, affiliate_id, tracking_code, destination_path, campaign)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id as "id!: Uuid", affiliate_id as "affiliate_id!: Uuid", tracking_code as "tracking_code!", destination_path as "destination_path!", campaign as "campaign?", is_active as "is_active!: bool", clicks as "clicks!: i64", conversions as "conversions!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            affiliate_id,
            tracking_code,
            data.destination_path,
            data.campaign
        )
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            AffiliateLink,
            r#"SELECT id as "id!: Uuid", affiliate_id as "affiliate_id!: Uuid", tracking_code as "tracking_code!", destination_path as "destination_path!", campaign as "campaign?", is_active as "is_active!: bool", clicks as "clicks!: i64", conversions as "conversions!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM affiliate_links
               WHERE id = $1"#,
            id
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_tracking_code<'e, E>(
        executor: E,
        tracking_code: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as!(
            AffiliateLink,
            r#"SELECT id as "id!: Uuid", affiliate_id as "affiliate_id!: Uuid", tracking_code as "tracking_code!", destination_path as "destination_path!", campaign as "campaign?", is_active as "is_active!: bool", clicks as "clicks!: i64", conversions as "conversions!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM affiliate_links
               WHERE tracking_code = $1"#,
            tracking_code
        )
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_affiliate_id(
        pool: &SqlitePool,
        affiliate_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as!(
            AffiliateLink,
            r#"SELECT id as "id!: Uuid", affiliate_id as "affiliate_id!: Uuid", tracking_code as "tracking_code!", destination_path as "destination_path!", campaign as "campaign?", is_active as "is_active!: bool", clicks as "clicks!: i64", conversions as "conversions!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM affiliate_links
               WHERE affiliate_id = $1
               ORDER BY created_at DESC"#,
            affiliate_id
        )
        .fetch_all(pool)
        .await
    }

    pub async fn set_active(
        pool: &SqlitePool,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            AffiliateLink,
            r#"UPDATE affiliate_links
               SET is_active = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id as "id!: Uuid", affiliate_id as "affiliate_id!: Uuid", tracking_code as "tracking_code!", destination_path as "destination_path!", campaign as "campaign?", is_active as "is_active!: bool", clicks as "clicks!: i64", conversions as "conversions!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            is_active
        )
        .fetch_optional(pool)
        .await
    }

    /// Single-statement increment; concurrent clicks never overwrite each other.
    pub async fn increment_clicks<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query!(
            "UPDATE affiliate_links SET clicks = clicks + 1 WHERE id = $1",
            id
        )
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn increment_conversions<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query!(
            "UPDATE affiliate_links SET conversions = conversions + 1 WHERE id = $1",
            id
        )
        .execute(executor)
        .await?;
        Ok(())
    }
}
