use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "commission_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CommissionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Paid,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AffiliateCommission {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub link_id: Uuid,
    pub click_id: Uuid,
    pub referred_profile_id: Uuid,
    pub amount_cents: i64,
    pub status: CommissionStatus,
    pub payout_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AffiliatePayout {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub amount_cents: i64,
    pub commission_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Earnings per commission status, in cents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct EarningsBreakdown {
    pub pending_cents: i64,
    pub approved_cents: i64,
    pub paid_cents: i64,
    pub approved_count: i64,
}

impl AffiliateCommission {
    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        affiliate_id: Uuid,
        link_id: Uuid,
        click_id: Uuid,
        referred_profile_id: Uuid,
        amount_cents: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as!(
            AffiliateCommission,
            r#"INSERT INTO affiliate_commissions (id, affiliate_id, link_id, click_id, referred_profile_id, amount_cents)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id as "id!: Uuid", affiliate_id as "affiliate_id!: Uuid", link_id as "link_id!: Uuid", click_id as "click_id!: Uuid", referred_profile_id as "referred_profile_id!: Uuid", amount_cents as "amount_cents!: i64", status as "status!: CommissionStatus", payout_id as "payout_id?: Uuid", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            affiliate_id,
            link_id,
            click_id,
            referred_profile_id,
            amount_cents
        )
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            AffiliateCommission,
            r#"SELECT id as "id!: Uuid", affiliate_id as "affiliate_id!: Uuid", link_id as "link_id!: Uuid", click_id as "click_id!: Uuid", referred_profile_id as "referred_profile_id!: Uuid", amount_cents as "amount_cents!: i64", status as "status!: CommissionStatus", payout_id as "payout_id?: Uuid", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM affiliate_commissions
               WHERE id = $1"#,
            id
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn exists_for_referred_profile<'e, E>(
        executor: E,
        referred_profile_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let count = sqlx::query_scalar!(
            r#"SELECT COUNT(*) as "count!: i64" FROM affiliate_commissions WHERE referred_profile_id = $1"#,
            referred_profile_id
        )
        .fetch_one(executor)
        .await?;
        Ok(count > 0)
    }

    pub async fn find_by_affiliate_id(
        pool: &SqlitePool,
        affiliate_id: Uuid,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as!(
            AffiliateCommission,
            r#"SELECT id as "id!: Uuid", affiliate_id as "affiliate_id!: Uuid", link_id as "link_id!: Uuid", click_id as "click_id!: Uuid", referred_profile_id as "referred_profile_id!: Uuid", amount_cents as "amount_cents!: i64", status as "status!: CommissionStatus", payout_id as "payout_id?: Uuid", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM affiliate_commissions
               WHERE affiliate_id = $1 AND ($2 IS NULL OR status = $2)
               ORDER BY created_at DESC"#,
            affiliate_id,
            status
        )
        .fetch_all(pool)
        .await
    }

    /// Conditional status change; `None` when the commission is missing or
    /// is no longer in `from`.
    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        from: CommissionStatus,
        to: CommissionStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            AffiliateCommission,
            r#"UPDATE affiliate_commissions
               SET status = $3, updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND status = $2
               RETURNING id as "id!: Uuid", affiliate_id as "affiliate_id!: Uuid", link_id as "link_id!: Uuid", click_id as "click_id!: Uuid", referred_profile_id as "referred_profile_id!: Uuid", amount_cents as "amount_cents!: i64", status as "status!: CommissionStatus", payout_id as "payout_id?: Uuid", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            from,
            to
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn earnings_for_affiliate<'e, E>(
        executor: E,
        affiliate_id: Uuid,
    ) -> Result<EarningsBreakdown, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as!(
            EarningsBreakdown,
            r#"SELECT
                 COALESCE(SUM(CASE WHEN status = 'pending' THEN amount_cents END), 0) as "pending_cents!: i64",
                 COALESCE(SUM(CASE WHEN status = 'approved' THEN amount_cents END), 0) as "approved_cents!: i64",
                 COALESCE(SUM(CASE WHEN status = 'paid' THEN amount_cents END), 0) as "paid_cents!: i64",
                 COUNT(CASE WHEN status = 'approved' THEN 1 END) as "approved_count!: i64"
               FROM affiliate_commissions
               WHERE affiliate_id = $1"#,
            affiliate_id
        )
        .fetch_one(executor)
        .await
    }

    /// Move every approved commission of the affiliate onto `payout_id`.
    pub async fn mark_approved_paid<'e, E>(
        executor: E,
        affiliate_id: Uuid,
        payout_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query!(
            "UPDATE affiliate_commissions
             SET status = 'paid', payout_id = $2, updated_at = datetime('now', 'subsec')
             WHERE affiliate_id = $1 AND status = 'approved'",
            affiliate_id,
            payout_id
        )
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

impl AffiliatePayout {
    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        affiliate_id: Uuid,
        amount_cents: i64,
        commission_count: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as!(
            AffiliatePayout,
            r#"INSERT INTO affiliate_payouts (id, affiliate_id, amount_cents, commission_count)
               VALUES ($1, $2, $3, $4)
               RETURNING id as "id!: Uuid", affiliate_id as "affiliate_id!: Uuid", amount_cents as "amount_cents!: i64", commission_count as "commission_count!: i64", created_at as "created_at!: DateTime<Utc>""#,
            id,
            affiliate_id,
            amount_cents,
            commission_count
        )
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_affiliate_id(
        pool: &SqlitePool,
        affiliate_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as!(
            AffiliatePayout,
            r#"SELECT id as "id!: Uuid", affiliate_id as "affiliate_id!: Uuid", amount_cents as "amount_cents!: i64", commission_count as "commission_count!: i64", created_at as "created_at!: DateTime<Utc>"
               FROM affiliate_payouts
               WHERE affiliate_id = $1
               ORDER BY created_at DESC"#,
            affiliate_id
        )
        .fetch_all(pool)
        .await
    }
}
