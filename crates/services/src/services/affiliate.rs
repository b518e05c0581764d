//! Affiliate program: applications, tracked links, click recording,
//! conversion attribution, commissions and payouts.

use db::{
    is_unique_violation,
    models::{
        affiliate::{Affiliate, AffiliateStatus, CreateAffiliate},
        affiliate_click::{AffiliateClick, NewAffiliateClick},
        affiliate_commission::{
            AffiliateCommission, AffiliatePayout, CommissionStatus, EarningsBreakdown,
        },
        affiliate_link::{AffiliateLink, CreateAffiliateLink},
        profile::Profile,
    },
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use utils::{codes, text};
use uuid::Uuid;

use super::config::AffiliateConfig;

/// Attempts at drawing a code that is not already taken
const MAX_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum AffiliateError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
    #[error("affiliate not found")]
    AffiliateNotFound,
    #[error("affiliate link not found")]
    LinkNotFound,
    #[error("commission not found")]
    CommissionNotFound,
    #[error("referred profile not found")]
    ReferredProfileNotFound,
    #[error("cannot move affiliate from {from} to {to}")]
    InvalidTransition {
        from: AffiliateStatus,
        to: AffiliateStatus,
    },
    #[error("commission is {0}, only pending commissions can be reviewed")]
    CommissionNotPending(CommissionStatus),
    #[error("affiliate is {0}, only approved affiliates can create links")]
    AffiliateNotApproved(AffiliateStatus),
    #[error("conversion not eligible for commission: {0}")]
    NotEligible(String),
    #[error("referred user has already been converted")]
    AlreadyConverted,
    #[error("no click within the attribution window")]
    NoAttributableClick,
    #[error("payout requires {min_payout_cents} cents of approved commission, have {approved_cents}")]
    PayoutNotEligible {
        approved_cents: i64,
        min_payout_cents: i64,
    },
    #[error("could not generate a unique code")]
    CodeGenerationExhausted,
}

/// Request metadata captured when a tracked link is followed
#[derive(Debug, Clone, Default)]
pub struct ClickContext {
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    Recorded { click_id: Uuid, redirect_url: String },
    /// Link inactive or affiliate not approved: the visitor is still sent
    /// on, but nothing is counted.
    Ignored { redirect_url: String, reason: String },
}

impl ClickOutcome {
    pub fn redirect_url(&self) -> &str {
        match self {
            ClickOutcome::Recorded { redirect_url, .. } => redirect_url,
            ClickOutcome::Ignored { redirect_url, .. } => redirect_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AffiliateLinkWithUrl {
    #[serde(flatten)]
    pub link: AffiliateLink,
    pub share_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AffiliateStats {
    pub affiliate_id: Uuid,
    pub status: AffiliateStatus,
    pub total_clicks: i64,
    pub total_conversions: i64,
    /// Conversions per hundred clicks, two decimals
    pub conversion_rate: f64,
    pub earnings: EarningsBreakdown,
    pub min_payout_cents: i64,
    pub payout_eligible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RecordConversion {
    pub tracking_code: String,
    pub referred_profile_id: Uuid,
}

pub struct AffiliateService {
    pool: SqlitePool,
    config: AffiliateConfig,
}

impl AffiliateService {
    pub fn new(pool: SqlitePool, config: AffiliateConfig) -> Self {
        Self { pool, config }
    }

    /// Register a new affiliate in `pending` status.
    pub async fn apply(&self, data: CreateAffiliate) -> Result<Affiliate, AffiliateError> {
        validate_application(&data)?;

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = codes::affiliate_code();
            match Affiliate::create(
                &self.pool,
                Uuid::new_v4(),
                &code,
                self.config.commission_per_signup_cents,
                &data,
            )
            .await
            {
                Ok(affiliate) => {
                    info!(
                        affiliate_id = %affiliate.id,
                        affiliate_code = %affiliate.affiliate_code,
                        "Affiliate application received"
                    );
                    return Ok(affiliate);
                }
                Err(e) if is_unique_violation(&e) => {
                    debug!(attempt, "Affiliate code collision, drawing another");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AffiliateError::CodeGenerationExhausted)
    }

    pub async fn get(&self, id: Uuid) -> Result<Affiliate, AffiliateError> {
        Affiliate::find_by_id(&self.pool, id)
            .await?
            .ok_or(AffiliateError::AffiliateNotFound)
    }

    pub async fn find_by_code(&self, affiliate_code: &str) -> Result<Affiliate, AffiliateError> {
        Affiliate::find_by_code(&self.pool, affiliate_code)
            .await?
            .ok_or(AffiliateError::AffiliateNotFound)
    }

    pub async fn list(
        &self,
        status: Option<AffiliateStatus>,
    ) -> Result<Vec<Affiliate>, AffiliateError> {
        Ok(Affiliate::list(&self.pool, status).await?)
    }

    /// Admin review of an affiliate, following the status transition table.
    pub async fn set_status(
        &self,
        id: Uuid,
        to: AffiliateStatus,
    ) -> Result<Affiliate, AffiliateError> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(to) {
            return Err(AffiliateError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        match Affiliate::update_status(&self.pool, id, current.status, to).await? {
            Some(updated) => {
                info!(affiliate_id = %id, from = %current.status, to = %to, "Affiliate status changed");
                Ok(updated)
            }
            None => {
                // Someone else reviewed it in between
                let latest = self.get(id).await?;
                Err(AffiliateError::InvalidTransition {
                    from: latest.status,
                    to,
                })
            }
        }
    }

    pub async fn create_link(
        &self,
        affiliate_id: Uuid,
        data: CreateAffiliateLink,
    ) -> Result<AffiliateLinkWithUrl, AffiliateError> {
        let affiliate = self.get(affiliate_id).await?;
        if affiliate.status != AffiliateStatus::Approved {
            return Err(AffiliateError::AffiliateNotApproved(affiliate.status));
        }

        let data = CreateAffiliateLink {
            destination_path: validate_destination_path(&data.destination_path)?,
            campaign: data
                .campaign
                .map(|c| text::truncate_chars(&c, 64))
                .filter(|c| !c.is_empty()),
        };

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = codes::tracking_code();
            match AffiliateLink::create(&self.pool, Uuid::new_v4(), affiliate_id, &code, &data)
                .await
            {
                Ok(link) => {
                    info!(
                        affiliate_id = %affiliate_id,
                        link_id = %link.id,
                        tracking_code = %link.tracking_code,
                        "Affiliate link created"
                    );
                    return Ok(self.with_share_url(link));
                }
                Err(e) if is_unique_violation(&e) => {
                    debug!(attempt, "Tracking code collision, drawing another");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AffiliateError::CodeGenerationExhausted)
    }

    pub async fn list_links(
        &self,
        affiliate_id: Uuid,
    ) -> Result<Vec<AffiliateLinkWithUrl>, AffiliateError> {
        self.get(affiliate_id).await?;
        let links = AffiliateLink::find_by_affiliate_id(&self.pool, affiliate_id).await?;
        Ok(links.into_iter().map(|l| self.with_share_url(l)).collect())
    }

    pub async fn set_link_active(
        &self,
        link_id: Uuid,
        is_active: bool,
    ) -> Result<AffiliateLinkWithUrl, AffiliateError> {
        let link = AffiliateLink::set_active(&self.pool, link_id, is_active)
            .await?
            .ok_or(AffiliateError::LinkNotFound)?;
        info!(link_id = %link_id, is_active, "Affiliate link toggled");
        Ok(self.with_share_url(link))
    }

    /// Full URL an affiliate shares: base URL, destination path and the
    /// tracking code as `ref`.
    pub fn share_url(&self, link: &AffiliateLink) -> String {
        let separator = if link.destination_path.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}ref={}",
            self.config.public_base_url, link.destination_path, separator, link.tracking_code
        )
    }

    fn with_share_url(&self, link: AffiliateLink) -> AffiliateLinkWithUrl {
        let share_url = self.share_url(&link);
        AffiliateLinkWithUrl { link, share_url }
    }

    /// Count a visit through a tracked link. The click row and both counter
    /// increments commit together; the increments are single UPDATE
    /// statements so parallel clicks are never lost. Repeat visits are
    /// counted again.
    pub async fn record_click(
        &self,
        tracking_code: &str,
        ctx: ClickContext,
    ) -> Result<ClickOutcome, AffiliateError> {
        if !codes::is_valid_tracking_code(tracking_code) {
            return Err(AffiliateError::LinkNotFound);
        }

        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let link = AffiliateLink::find_by_tracking_code(&mut *tx, tracking_code)
            .await?
            .ok_or(AffiliateError::LinkNotFound)?;
        let redirect_url = self.share_url(&link);

        let affiliate = Affiliate::find_by_id(&mut *tx, link.affiliate_id)
            .await?
            .ok_or(AffiliateError::AffiliateNotFound)?;

        if let Some(reason) = ineligibility_reason(&link, &affiliate) {
            debug!(
                tracking_code,
                reason = %reason,
                "Click on ineligible link not recorded"
            );
            return Ok(ClickOutcome::Ignored {
                redirect_url,
                reason,
            });
        }

        let click = AffiliateClick::create(
            &mut *tx,
            Uuid::new_v4(),
            link.id,
            affiliate.id,
            &NewAffiliateClick {
                referrer: ctx.referrer.map(|r| text::truncate_chars(&r, 512)),
                user_agent: ctx.user_agent.map(|ua| text::truncate_chars(&ua, 512)),
                ip_hash: ctx.ip.as_deref().map(text::sha256_hex),
            },
        )
        .await?;
        AffiliateLink::increment_clicks(&mut *tx, link.id).await?;
        Affiliate::increment_clicks(&mut *tx, affiliate.id).await?;

        tx.commit().await?;

        debug!(
            link_id = %link.id,
            click_id = %click.id,
            "Affiliate click recorded"
        );

        Ok(ClickOutcome::Recorded {
            click_id: click.id,
            redirect_url,
        })
    }

    /// Attribute a signup to the most recent unconverted click on the link
    /// inside the attribution window and open a pending commission for it.
    pub async fn record_conversion(
        &self,
        data: RecordConversion,
    ) -> Result<AffiliateCommission, AffiliateError> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let link = AffiliateLink::find_by_tracking_code(&mut *tx, &data.tracking_code)
            .await?
            .ok_or(AffiliateError::LinkNotFound)?;
        let affiliate = Affiliate::find_by_id(&mut *tx, link.affiliate_id)
            .await?
            .ok_or(AffiliateError::AffiliateNotFound)?;

        if let Some(reason) = ineligibility_reason(&link, &affiliate) {
            return Err(AffiliateError::NotEligible(reason));
        }

        if Profile::find_by_id(&mut *tx, data.referred_profile_id)
            .await?
            .is_none()
        {
            return Err(AffiliateError::ReferredProfileNotFound);
        }

        if AffiliateCommission::exists_for_referred_profile(&mut *tx, data.referred_profile_id)
            .await?
        {
            return Err(AffiliateError::AlreadyConverted);
        }

        let click = AffiliateClick::find_latest_attributable(
            &mut *tx,
            link.id,
            self.config.attribution_window_days,
        )
        .await?
        .ok_or(AffiliateError::NoAttributableClick)?;

        if !AffiliateClick::mark_converted(&mut *tx, click.id).await? {
            return Err(AffiliateError::NoAttributableClick);
        }
        AffiliateLink::increment_conversions(&mut *tx, link.id).await?;
        Affiliate::increment_conversions(&mut *tx, affiliate.id).await?;

        let commission = AffiliateCommission::create(
            &mut *tx,
            Uuid::new_v4(),
            affiliate.id,
            link.id,
            click.id,
            data.referred_profile_id,
            affiliate.commission_per_signup_cents,
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AffiliateError::AlreadyConverted
            } else {
                AffiliateError::Database(e)
            }
        })?;

        tx.commit().await?;

        info!(
            affiliate_id = %affiliate.id,
            link_id = %link.id,
            click_id = %click.id,
            commission_id = %commission.id,
            amount_cents = commission.amount_cents,
            "Conversion attributed"
        );

        Ok(commission)
    }

    /// Approve or reject a pending commission.
    pub async fn review_commission(
        &self,
        commission_id: Uuid,
        approve: bool,
    ) -> Result<AffiliateCommission, AffiliateError> {
        let to = if approve {
            CommissionStatus::Approved
        } else {
            CommissionStatus::Rejected
        };

        match AffiliateCommission::update_status(
            &self.pool,
            commission_id,
            CommissionStatus::Pending,
            to,
        )
        .await?
        {
            Some(commission) => {
                info!(commission_id = %commission_id, status = %to, "Commission reviewed");
                Ok(commission)
            }
            None => {
                let existing = AffiliateCommission::find_by_id(&self.pool, commission_id)
                    .await?
                    .ok_or(AffiliateError::CommissionNotFound)?;
                Err(AffiliateError::CommissionNotPending(existing.status))
            }
        }
    }

    pub async fn list_commissions(
        &self,
        affiliate_id: Uuid,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<AffiliateCommission>, AffiliateError> {
        self.get(affiliate_id).await?;
        Ok(AffiliateCommission::find_by_affiliate_id(&self.pool, affiliate_id, status).await?)
    }

    pub async fn stats(&self, affiliate_id: Uuid) -> Result<AffiliateStats, AffiliateError> {
        let affiliate = self.get(affiliate_id).await?;
        let earnings =
            AffiliateCommission::earnings_for_affiliate(&self.pool, affiliate_id).await?;

        Ok(AffiliateStats {
            affiliate_id,
            status: affiliate.status,
            total_clicks: affiliate.total_clicks,
            total_conversions: affiliate.total_conversions,
            conversion_rate: conversion_rate(affiliate.total_clicks, affiliate.total_conversions),
            payout_eligible: is_payout_eligible(
                affiliate.status,
                earnings.approved_cents,
                self.config.min_payout_cents,
            ),
            earnings,
            min_payout_cents: self.config.min_payout_cents,
        })
    }

    /// Pay out every approved commission at once, if the affiliate is
    /// approved and the balance has reached the minimum.
    pub async fn request_payout(
        &self,
        affiliate_id: Uuid,
    ) -> Result<AffiliatePayout, AffiliateError> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let affiliate = Affiliate::find_by_id(&mut *tx, affiliate_id)
            .await?
            .ok_or(AffiliateError::AffiliateNotFound)?;
        let earnings = AffiliateCommission::earnings_for_affiliate(&mut *tx, affiliate_id).await?;

        if !is_payout_eligible(
            affiliate.status,
            earnings.approved_cents,
            self.config.min_payout_cents,
        ) {
            warn!(
                affiliate_id = %affiliate_id,
                status = %affiliate.status,
                approved_cents = earnings.approved_cents,
                "Payout requested but not eligible"
            );
            return Err(AffiliateError::PayoutNotEligible {
                approved_cents: earnings.approved_cents,
                min_payout_cents: self.config.min_payout_cents,
            });
        }

        let payout = AffiliatePayout::create(
            &mut *tx,
            Uuid::new_v4(),
            affiliate_id,
            earnings.approved_cents,
            earnings.approved_count,
        )
        .await?;
        let paid = AffiliateCommission::mark_approved_paid(&mut *tx, affiliate_id, payout.id).await?;

        tx.commit().await?;

        info!(
            affiliate_id = %affiliate_id,
            payout_id = %payout.id,
            amount_cents = payout.amount_cents,
            commissions = paid,
            "Affiliate payout created"
        );

        Ok(payout)
    }

    pub async fn list_payouts(
        &self,
        affiliate_id: Uuid,
    ) -> Result<Vec<AffiliatePayout>, AffiliateError> {
        self.get(affiliate_id).await?;
        Ok(AffiliatePayout::find_by_affiliate_id(&self.pool, affiliate_id).await?)
    }
}

fn ineligibility_reason(link: &AffiliateLink, affiliate: &Affiliate) -> Option<String> {
    if !link.is_active {
        Some("link is inactive".to_string())
    } else if affiliate.status != AffiliateStatus::Approved {
        Some(format!("affiliate is {}", affiliate.status))
    } else {
        None
    }
}

pub fn is_payout_eligible(status: AffiliateStatus, approved_cents: i64, min_payout_cents: i64) -> bool {
    status == AffiliateStatus::Approved && approved_cents > 0 && approved_cents >= min_payout_cents
}

/// Percentage with two decimals; zero clicks gives 0.
pub fn conversion_rate(clicks: i64, conversions: i64) -> f64 {
    if clicks <= 0 {
        return 0.0;
    }
    ((conversions as f64 / clicks as f64) * 10_000.0).round() / 100.0
}

fn validate_application(data: &CreateAffiliate) -> Result<(), AffiliateError> {
    let name = data.display_name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(AffiliateError::Validation(
            "display name must be 1-100 characters".to_string(),
        ));
    }

    let email = data.email.trim();
    let valid_email = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        .unwrap_or(false);
    if !valid_email || email.len() > 254 {
        return Err(AffiliateError::Validation("email address is invalid".to_string()));
    }

    Ok(())
}

/// Destinations are site-relative so a tracked link can never bounce a
/// visitor to another host. No fragments: `?ref=` goes at the end.
fn validate_destination_path(path: &str) -> Result<String, AffiliateError> {
    let path = path.trim();
    if !path.starts_with('/')
        || path.starts_with("//")
        || path.len() > 200
        || path.chars().any(|c| c.is_whitespace() || c == '\\' || c == '#')
    {
        return Err(AffiliateError::Validation(
            "destination must be a site path starting with '/'".to_string(),
        ));
    }
    Ok(path.to_string())
}

#[cfg(test)]
mod tests {
    use db::{DBService, models::profile::CreateProfile};

    use super::*;

    fn config() -> AffiliateConfig {
        AffiliateConfig {
            commission_per_signup_cents: 5_000,
            attribution_window_days: 30,
            min_payout_cents: 10_000,
            public_base_url: "https://ballmtaani.test".to_string(),
        }
    }

    async fn setup() -> (DBService, AffiliateService) {
        let db = DBService::new_in_memory().await.unwrap();
        let service = AffiliateService::new(db.pool.clone(), config());
        (db, service)
    }

    fn application(name: &str) -> CreateAffiliate {
        CreateAffiliate {
            profile_id: None,
            display_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            phone: Some("+254700000000".to_string()),
            payment_method: Some("mpesa".to_string()),
        }
    }

    /// Profile for the person signing up through a tracked link
    async fn signup(pool: &SqlitePool) -> Uuid {
        let id = Uuid::new_v4();
        let username = format!("fan_{}", &id.simple().to_string()[..12]);
        Profile::create(
            pool,
            id,
            &CreateProfile {
                username,
                display_name: None,
                favourite_team: Some("Gor Mahia".to_string()),
            },
        )
        .await
        .unwrap();
        id
    }

    async fn approved_link(service: &AffiliateService) -> (Affiliate, AffiliateLinkWithUrl) {
        let affiliate = service.apply(application("Mtaani Tips")).await.unwrap();
        let affiliate = service
            .set_status(affiliate.id, AffiliateStatus::Approved)
            .await
            .unwrap();
        let link = service
            .create_link(
                affiliate.id,
                CreateAffiliateLink {
                    destination_path: "/signup".to_string(),
                    campaign: Some("derby-week".to_string()),
                },
            )
            .await
            .unwrap();
        (affiliate, link)
    }

    #[tokio::test]
    async fn test_apply_creates_pending_affiliate_with_code() {
        let (_db, service) = setup().await;
        let affiliate = service.apply(application("Kevin Otieno")).await.unwrap();

        assert_eq!(affiliate.status, AffiliateStatus::Pending);
        assert!(affiliate.affiliate_code.starts_with("BM"));
        assert_eq!(affiliate.commission_per_signup_cents, 5_000);

        let found = service.find_by_code(&affiliate.affiliate_code).await.unwrap();
        assert_eq!(found.id, affiliate.id);
    }

    #[tokio::test]
    async fn test_apply_rejects_bad_email() {
        let (_db, service) = setup().await;
        let mut data = application("Bad Email");
        data.email = "not-an-email".to_string();

        assert!(matches!(
            service.apply(data).await,
            Err(AffiliateError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_affiliate_cannot_be_approved() {
        let (_db, service) = setup().await;
        let affiliate = service.apply(application("Late Applicant")).await.unwrap();
        service
            .set_status(affiliate.id, AffiliateStatus::Rejected)
            .await
            .unwrap();

        let err = service
            .set_status(affiliate.id, AffiliateStatus::Approved)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AffiliateError::InvalidTransition {
                from: AffiliateStatus::Rejected,
                to: AffiliateStatus::Approved
            }
        ));
    }

    #[tokio::test]
    async fn test_pending_affiliate_cannot_create_links() {
        let (_db, service) = setup().await;
        let affiliate = service.apply(application("Pending Person")).await.unwrap();

        let err = service
            .create_link(
                affiliate.id,
                CreateAffiliateLink {
                    destination_path: "/signup".to_string(),
                    campaign: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AffiliateError::AffiliateNotApproved(AffiliateStatus::Pending)
        ));
    }

    #[tokio::test]
    async fn test_link_rejects_external_destination() {
        let (_db, service) = setup().await;
        let (affiliate, _) = approved_link(&service).await;

        for bad in [
            "https://evil.example",
            "//evil.example",
            "signup",
            "/a b",
            "/news#top",
        ] {
            let err = service
                .create_link(
                    affiliate.id,
                    CreateAffiliateLink {
                        destination_path: bad.to_string(),
                        campaign: None,
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, AffiliateError::Validation(_)), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_share_url_embeds_tracking_code() {
        let (_db, service) = setup().await;
        let (_, link) = approved_link(&service).await;

        assert_eq!(
            link.share_url,
            format!("https://ballmtaani.test/signup?ref={}", link.link.tracking_code)
        );
    }

    #[tokio::test]
    async fn test_clicks_are_counted_without_dedup() {
        let (db, service) = setup().await;
        let (affiliate, link) = approved_link(&service).await;
        let ctx = ClickContext {
            referrer: Some("https://twitter.com".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
            ip: Some("197.248.0.1".to_string()),
        };

        for _ in 0..2 {
            let outcome = service
                .record_click(&link.link.tracking_code, ctx.clone())
                .await
                .unwrap();
            assert!(matches!(outcome, ClickOutcome::Recorded { .. }));
        }

        let link_row = AffiliateLink::find_by_id(&db.pool, link.link.id).await.unwrap().unwrap();
        assert_eq!(link_row.clicks, 2);
        assert_eq!(service.get(affiliate.id).await.unwrap().total_clicks, 2);

        let hash: Option<String> =
            sqlx::query_scalar("SELECT ip_hash FROM affiliate_clicks LIMIT 1")
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(hash.unwrap(), text::sha256_hex("197.248.0.1"));
    }

    #[tokio::test]
    async fn test_concurrent_clicks_are_not_lost() {
        let (db, service) = setup().await;
        let (_, link) = approved_link(&service).await;
        let service = std::sync::Arc::new(service);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let service = service.clone();
                let code = link.link.tracking_code.clone();
                tokio::spawn(async move {
                    service.record_click(&code, ClickContext::default()).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let link_row = AffiliateLink::find_by_id(&db.pool, link.link.id).await.unwrap().unwrap();
        assert_eq!(link_row.clicks, 20);
        assert_eq!(AffiliateClick::count_for_link(&db.pool, link.link.id).await.unwrap(), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_clicks_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("clicks.db").display());
        let db = DBService::new(&url).await.unwrap();
        let service = std::sync::Arc::new(AffiliateService::new(db.pool.clone(), config()));
        let (affiliate, link) = approved_link(&service).await;

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let service = service.clone();
                let code = link.link.tracking_code.clone();
                tokio::spawn(async move {
                    let ctx = ClickContext {
                        ip: Some(format!("41.90.0.{i}")),
                        ..Default::default()
                    };
                    service.record_click(&code, ctx).await
                })
            })
            .collect();
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert!(matches!(outcome, ClickOutcome::Recorded { .. }));
        }

        let link_row = AffiliateLink::find_by_id(&db.pool, link.link.id).await.unwrap().unwrap();
        assert_eq!(link_row.clicks, 50);
        assert_eq!(AffiliateClick::count_for_link(&db.pool, link.link.id).await.unwrap(), 50);
        assert_eq!(service.get(affiliate.id).await.unwrap().total_clicks, 50);
    }

    #[tokio::test]
    async fn test_inactive_link_click_is_ignored() {
        let (db, service) = setup().await;
        let (_, link) = approved_link(&service).await;
        service.set_link_active(link.link.id, false).await.unwrap();

        let outcome = service
            .record_click(&link.link.tracking_code, ClickContext::default())
            .await
            .unwrap();

        assert!(matches!(outcome, ClickOutcome::Ignored { .. }));
        assert_eq!(outcome.redirect_url(), link.share_url);
        assert_eq!(AffiliateClick::count_for_link(&db.pool, link.link.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_tracking_code() {
        let (_db, service) = setup().await;
        assert!(matches!(
            service.record_click("nosuchcode", ClickContext::default()).await,
            Err(AffiliateError::LinkNotFound)
        ));
    }

    #[tokio::test]
    async fn test_conversion_creates_pending_commission() {
        let (db, service) = setup().await;
        let (affiliate, link) = approved_link(&service).await;
        service
            .record_click(&link.link.tracking_code, ClickContext::default())
            .await
            .unwrap();

        let referred = signup(&db.pool).await;
        let commission = service
            .record_conversion(RecordConversion {
                tracking_code: link.link.tracking_code.clone(),
                referred_profile_id: referred,
            })
            .await
            .unwrap();

        assert_eq!(commission.status, CommissionStatus::Pending);
        assert_eq!(commission.amount_cents, 5_000);
        assert_eq!(commission.affiliate_id, affiliate.id);

        let link_row = AffiliateLink::find_by_id(&db.pool, link.link.id).await.unwrap().unwrap();
        assert_eq!(link_row.conversions, 1);

        let again = service
            .record_conversion(RecordConversion {
                tracking_code: link.link.tracking_code.clone(),
                referred_profile_id: referred,
            })
            .await;
        assert!(matches!(again, Err(AffiliateError::AlreadyConverted)));
    }

    #[tokio::test]
    async fn test_inactive_link_is_not_applied_toward_commission() {
        let (db, service) = setup().await;
        let (affiliate, link) = approved_link(&service).await;
        service
            .record_click(&link.link.tracking_code, ClickContext::default())
            .await
            .unwrap();
        service.set_link_active(link.link.id, false).await.unwrap();

        let result = service
            .record_conversion(RecordConversion {
                tracking_code: link.link.tracking_code.clone(),
                referred_profile_id: signup(&db.pool).await,
            })
            .await;

        assert!(matches!(result, Err(AffiliateError::NotEligible(_))));
        let commissions = AffiliateCommission::find_by_affiliate_id(&db.pool, affiliate.id, None)
            .await
            .unwrap();
        assert!(commissions.is_empty());
        assert_eq!(service.get(affiliate.id).await.unwrap().total_conversions, 0);
    }

    #[tokio::test]
    async fn test_conversion_requires_existing_profile() {
        let (db, service) = setup().await;
        let (affiliate, link) = approved_link(&service).await;
        service
            .record_click(&link.link.tracking_code, ClickContext::default())
            .await
            .unwrap();

        let result = service
            .record_conversion(RecordConversion {
                tracking_code: link.link.tracking_code.clone(),
                referred_profile_id: Uuid::new_v4(),
            })
            .await;

        assert!(matches!(result, Err(AffiliateError::ReferredProfileNotFound)));
        let commissions = AffiliateCommission::find_by_affiliate_id(&db.pool, affiliate.id, None)
            .await
            .unwrap();
        assert!(commissions.is_empty());
        assert_eq!(service.get(affiliate.id).await.unwrap().total_conversions, 0);

        // The click is still there for a real signup
        let commission = service
            .record_conversion(RecordConversion {
                tracking_code: link.link.tracking_code.clone(),
                referred_profile_id: signup(&db.pool).await,
            })
            .await
            .unwrap();
        assert_eq!(commission.affiliate_id, affiliate.id);
    }

    #[tokio::test]
    async fn test_conversion_without_click() {
        let (db, service) = setup().await;
        let (_, link) = approved_link(&service).await;

        let result = service
            .record_conversion(RecordConversion {
                tracking_code: link.link.tracking_code.clone(),
                referred_profile_id: signup(&db.pool).await,
            })
            .await;
        assert!(matches!(result, Err(AffiliateError::NoAttributableClick)));
    }

    #[tokio::test]
    async fn test_each_click_converts_once() {
        let (db, service) = setup().await;
        let (_, link) = approved_link(&service).await;
        service
            .record_click(&link.link.tracking_code, ClickContext::default())
            .await
            .unwrap();

        service
            .record_conversion(RecordConversion {
                tracking_code: link.link.tracking_code.clone(),
                referred_profile_id: signup(&db.pool).await,
            })
            .await
            .unwrap();
        let second = service
            .record_conversion(RecordConversion {
                tracking_code: link.link.tracking_code.clone(),
                referred_profile_id: signup(&db.pool).await,
            })
            .await;

        assert!(matches!(second, Err(AffiliateError::NoAttributableClick)));
    }

    #[tokio::test]
    async fn test_payout_flow() {
        let (db, service) = setup().await;
        let (affiliate, link) = approved_link(&service).await;

        let mut commission_ids = Vec::new();
        for _ in 0..2 {
            service
                .record_click(&link.link.tracking_code, ClickContext::default())
                .await
                .unwrap();
            let commission = service
                .record_conversion(RecordConversion {
                    tracking_code: link.link.tracking_code.clone(),
                    referred_profile_id: signup(&db.pool).await,
                })
                .await
                .unwrap();
            commission_ids.push(commission.id);
        }

        // Pending commissions do not count toward the payout balance
        assert!(matches!(
            service.request_payout(affiliate.id).await,
            Err(AffiliateError::PayoutNotEligible { approved_cents: 0, .. })
        ));

        service.review_commission(commission_ids[0], true).await.unwrap();
        let stats = service.stats(affiliate.id).await.unwrap();
        assert_eq!(stats.earnings.approved_cents, 5_000);
        assert_eq!(stats.earnings.pending_cents, 5_000);
        assert!(!stats.payout_eligible);

        service.review_commission(commission_ids[1], true).await.unwrap();
        let stats = service.stats(affiliate.id).await.unwrap();
        assert!(stats.payout_eligible);
        assert_eq!(stats.conversion_rate, 100.0);

        let payout = service.request_payout(affiliate.id).await.unwrap();
        assert_eq!(payout.amount_cents, 10_000);
        assert_eq!(payout.commission_count, 2);

        let stats = service.stats(affiliate.id).await.unwrap();
        assert_eq!(stats.earnings.paid_cents, 10_000);
        assert_eq!(stats.earnings.approved_cents, 0);
        assert!(!stats.payout_eligible);

        assert!(matches!(
            service.review_commission(commission_ids[0], false).await,
            Err(AffiliateError::CommissionNotPending(CommissionStatus::Paid))
        ));
    }

    #[tokio::test]
    async fn test_suspended_affiliate_loses_payout_eligibility() {
        let (db, service) = setup().await;
        let (affiliate, link) = approved_link(&service).await;
        for _ in 0..2 {
            service
                .record_click(&link.link.tracking_code, ClickContext::default())
                .await
                .unwrap();
            let c = service
                .record_conversion(RecordConversion {
                    tracking_code: link.link.tracking_code.clone(),
                    referred_profile_id: signup(&db.pool).await,
                })
                .await
                .unwrap();
            service.review_commission(c.id, true).await.unwrap();
        }

        service
            .set_status(affiliate.id, AffiliateStatus::Suspended)
            .await
            .unwrap();

        assert!(!service.stats(affiliate.id).await.unwrap().payout_eligible);
        assert!(matches!(
            service.request_payout(affiliate.id).await,
            Err(AffiliateError::PayoutNotEligible { .. })
        ));
    }

    #[test]
    fn test_conversion_rate() {
        assert_eq!(conversion_rate(0, 0), 0.0);
        assert_eq!(conversion_rate(3, 1), 33.33);
        assert_eq!(conversion_rate(8, 2), 25.0);
    }
}
