use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "affiliate_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AffiliateStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl AffiliateStatus {
    /// Allowed moves: pending -> approved | rejected, approved <-> suspended.
    pub fn can_transition_to(self, next: AffiliateStatus) -> bool {
        use AffiliateStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Suspended) | (Suspended, Approved)
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Affiliate {
    pub id: Uuid,
    pub profile_id: Option<Uuid>,
    pub affiliate_code: String,
    pub display_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub payment_method: Option<String>,
    pub status: AffiliateStatus,
    pub commission_per_signup_cents: i64,
    pub total_clicks: i64,
    pub total_conversions: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Affiliate program application
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateAffiliate {
    pub profile_id: Option<Uuid>,
    pub display_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub payment_method: Option<String>,
}

impl Affiliate {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        affiliate_code: &str,
        commission_per_signup_cents: i64,
        data: &CreateAffiliate,
    ) -> Result<Self, sqlx::Error> {
        let display_name = data.display_name.trim();
        let email = data.email.trim();
        sqlx::query_as!(
            Affiliate,
            r#"INSERT INTO affiliates (id, profile_id, affiliate_code, display_name, email, phone, payment_method, commission_per_signup_cents)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id as "id!: Uuid", profile_id as "profile_id?: Uuid", affiliate_code as "affiliate_code!", display_name as "display_name!", email as "email!", phone as "phone?", payment_method as "payment_method?", status as "status!: AffiliateStatus", commission_per_signup_cents as "commission_per_signup_cents!: i64", total_clicks as "total_clicks!: i64", total_conversions as "total_conversions!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            data.profile_id,
            affiliate_code,
            display_name,
            email,
            data.phone,
            data.payment_method,
            commission_per_signup_cents
        )
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as!(
            Affiliate,
            r#"SELECT id as "id!: Uuid", profile_id as "profile_id?: Uuid", affiliate_code as "affiliate_code!", display_name as "display_name!", email as "email!", phone as "phone?", payment_method as "payment_method?", status as "status!: AffiliateStatus", commission_per_signup_cents as "commission_per_signup_cents!: i64", total_clicks as "total_clicks!: i64", total_conversions as "total_conversions!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM affiliates
               WHERE id = $1"#,
            id
        )
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_code(
        pool: &SqlitePool,
        affiliate_code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            Affiliate,
            r#"SELECT id as "id!: Uuid", profile_id as "profile_id?: Uuid", affiliate_code as "affiliate_code!", display_name as "display_name!", email as "email!", phone as "phone?", payment_method as "payment_method?", status as "status!: AffiliateStatus", commission_per_signup_cents as "commission_per_signup_cents!: i64", total_clicks as "total_clicks!: i64", total_conversions as "total_conversions!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM affiliates
               WHERE affiliate_code = $1"#,
            affiliate_code
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &SqlitePool,
        status: Option<AffiliateStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as!(
            Affiliate,
            r#"SELECT id as "id!: Uuid", profile_id as "profile_id?: Uuid", affiliate_code as "affiliate_code!", display_name as "display_name!", email as "email!", phone as "phone?", payment_method as "payment_method?", status as "status!: AffiliateStatus", commission_per_signup_cents as "commission_per_signup_cents!: i64", total_clicks as "total_clicks!: i64", total_conversions as "total_conversions!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM affiliates
               WHERE ($1 IS NULL OR status = $1)
               ORDER BY created_at DESC"#,
            status
        )
        .fetch_all(pool)
        .await
    }

    /// Move the affiliate from `from` to `to`. Returns `None` when the row is
    /// missing or no longer in `from`, so concurrent reviews cannot both win.
    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        from: AffiliateStatus,
        to: AffiliateStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            Affiliate,
            r#"UPDATE affiliates
               SET status = $3, updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND status = $2
               RETURNING id as "id!: Uuid", profile_id as "profile_id?: Uuid", affiliate_code as "affiliate_code!", display_name as "display_name!", email as "email!", phone as "phone?", payment_method as "payment_method?", status as "status!: AffiliateStatus", commission_per_signup_cents as "commission_per_signup_cents!: i64", total_clicks as "total_clicks!: i64", total_conversions as "total_conversions!: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            from,
            to
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn increment_clicks<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query!(
            "UPDATE affiliates SET total_clicks = total_clicks + 1 WHERE id = $1",
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
            "UPDATE affiliates SET total_conversions = total_conversions + 1 WHERE id = $1",
            id
        )
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use AffiliateStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Suspended));
        assert!(Suspended.can_transition_to(Approved));

        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_status_parses_lowercase() {
        assert_eq!("approved".parse::<AffiliateStatus>().unwrap(), AffiliateStatus::Approved);
        assert_eq!(AffiliateStatus::Suspended.to_string(), "suspended");
    }
}
