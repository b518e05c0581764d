use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AffiliateClick {
    pub id: Uuid,
    pub link_id: Uuid,
    pub affiliate_id: Uuid,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip_hash: Option<String>,
    pub converted: bool,
    pub converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Click details captured from the incoming request
#[derive(Debug, Clone, Default)]
pub struct NewAffiliateClick {
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip_hash: Option<String>,
}

impl AffiliateClick {
    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        link_id: Uuid,
        affiliate_id: Uuid,
        data: &NewAffiliateClick,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as!(
            AffiliateClick,
            r#"INSERT INTO affiliate_clicks (id, link_id, affiliate_id, referrer, user_agent, ip_hash)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id as "id!: Uuid", link_id as "link_id!: Uuid", affiliate_id as "affiliate_id!: Uuid", referrer as "referrer?", user_agent as "user_agent?", ip_hash as "ip_hash?", converted as "converted!: bool", converted_at as "converted_at?: DateTime<Utc>", created_at as "created_at!: DateTime<Utc>""#,
            id,
            link_id,
            affiliate_id,
            data.referrer,
            data.user_agent,
            data.ip_hash
        )
        .fetch_one(executor)
        .await
    }

    /// Most recent unconverted click on `link_id` made within the last
    /// `window_days` days.
    pub async fn find_latest_attributable<'e, E>(
        executor: E,
        link_id: Uuid,
        window_days: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let window = format!("-{} days", window_days);
        sqlx::query_as!(
            AffiliateClick,
            r#"SELECT id as "id!: Uuid", link_id as "link_id!: Uuid", affiliate_id as "affiliate_id!: Uuid", referrer as "referrer?", user_agent as "user_agent?", ip_hash as "ip_hash?", converted as "converted!: bool", converted_at as "converted_at?: DateTime<Utc>", created_at as "created_at!: DateTime<Utc>"
               FROM affiliate_clicks
               WHERE link_id = $1
                 AND converted = 0
                 AND datetime(created_at) >= datetime('now', $2)
               ORDER BY created_at DESC, rowid DESC
               LIMIT 1"#,
            link_id,
            window
        )
        .fetch_optional(executor)
        .await
    }

    /// Flag the click as converted. Returns false when it was already
    /// converted by someone else.
    pub async fn mark_converted<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query!(
            "UPDATE affiliate_clicks
             SET converted = 1, converted_at = datetime('now', 'subsec')
             WHERE id = $1 AND converted = 0",
            id
        )
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn count_for_link<'e, E>(executor: E, link_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar!(
            r#"SELECT COUNT(*) as "count!: i64" FROM affiliate_clicks WHERE link_id = $1"#,
            link_id
        )
        .fetch_one(executor)
        .await
    }

    /// Backdate a click; test helper for attribution window checks.
    #[cfg(test)]
    pub async fn set_created_at_offset<'e, E>(
        executor: E,
        id: Uuid,
        modifier: &str,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query!(
            "UPDATE affiliate_clicks SET created_at = datetime('now', $2) WHERE id = $1",
            id,
            modifier
        )
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            affiliate::{Affiliate, CreateAffiliate},
            affiliate_link::{AffiliateLink, CreateAffiliateLink},
        },
    };

    async fn seed_link(db: &DBService) -> AffiliateLink {
        let affiliate = Affiliate::create(
            &db.pool,
            Uuid::new_v4(),
            "BMTEST01",
            5000,
            &CreateAffiliate {
                profile_id: None,
                display_name: "Mtaani Tipster".to_string(),
                email: "tipster@example.com".to_string(),
                phone: None,
                payment_method: None,
            },
        )
        .await
        .unwrap();

        AffiliateLink::create(
            &db.pool,
            Uuid::new_v4(),
            affiliate.id,
            "abcde12345",
            &CreateAffiliateLink {
                destination_path: "/signup".to_string(),
                campaign: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_latest_attributable_skips_clicks_outside_window() {
        let db = DBService::new_in_memory().await.unwrap();
        let link = seed_link(&db).await;

        let old = AffiliateClick::create(
            &db.pool,
            Uuid::new_v4(),
            link.id,
            link.affiliate_id,
            &NewAffiliateClick::default(),
        )
        .await
        .unwrap();
        AffiliateClick::set_created_at_offset(&db.pool, old.id, "-40 days")
            .await
            .unwrap();

        let found = AffiliateClick::find_latest_attributable(&db.pool, link.id, 30)
            .await
            .unwrap();
        assert!(found.is_none());

        let recent = AffiliateClick::create(
            &db.pool,
            Uuid::new_v4(),
            link.id,
            link.affiliate_id,
            &NewAffiliateClick::default(),
        )
        .await
        .unwrap();

        let found = AffiliateClick::find_latest_attributable(&db.pool, link.id, 30)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, recent.id);
    }

    #[tokio::test]
    async fn test_mark_converted_only_once() {
        let db = DBService::new_in_memory().await.unwrap();
        let link = seed_link(&db).await;
        let click = AffiliateClick::create(
            &db.pool,
            Uuid::new_v4(),
            link.id,
            link.affiliate_id,
            &NewAffiliateClick::default(),
        )
        .await
        .unwrap();

        assert!(AffiliateClick::mark_converted(&db.pool, click.id).await.unwrap());
        assert!(!AffiliateClick::mark_converted(&db.pool, click.id).await.unwrap());

        let next = AffiliateClick::find_latest_attributable(&db.pool, link.id, 30)
            .await
            .unwrap();
        assert!(next.is_none());
    }
}
