use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use db::DBService;
use services::services::{
    affiliate::AffiliateService,
    claude_api::{ClaudeApiClient, ClaudeApiError, ContentGenerator},
    config::{Config, ConfigError},
    football_api::{FootballApiClient, FootballApiError, OddsApiClient},
    live_score_sync::LiveScoreSyncService,
    matches::MatchService,
    news::NewsService,
    predictions::PredictionService,
    profiles::ProfileService,
    quiz::QuizService,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    FootballApi(#[from] FootballApiError),
    #[error(transparent)]
    ClaudeApi(#[from] ClaudeApiError),
}

/// Everything a request handler needs: storage, configuration and the
/// optional upstream clients. Services are built per request from these.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    fn db(&self) -> &DBService;

    fn config(&self) -> &Config;

    fn football_api(&self) -> Option<&FootballApiClient>;

    fn odds_api(&self) -> Option<&OddsApiClient>;

    fn content_generator(&self) -> Option<Arc<dyn ContentGenerator>>;

    /// Analytics events are structured log records on the `analytics`
    /// target; nothing is sent anywhere when analytics is disabled.
    async fn track_if_analytics_allowed(&self, event_name: &str, properties: serde_json::Value) {
        if self.config().analytics_enabled {
            info!(target: "analytics", event = event_name, properties = %properties, "analytics event");
        }
    }

    fn affiliate_service(&self) -> AffiliateService {
        AffiliateService::new(self.db().pool.clone(), self.config().affiliate.clone())
    }

    fn match_service(&self) -> MatchService {
        MatchService::new(
            self.db().pool.clone(),
            self.config().match_timezone_offset_minutes,
        )
    }

    fn prediction_service(&self) -> PredictionService {
        PredictionService::new(
            self.db().pool.clone(),
            self.content_generator(),
            self.odds_api().cloned(),
        )
    }

    fn quiz_service(&self) -> QuizService {
        QuizService::new(self.db().pool.clone())
    }

    fn news_service(&self) -> NewsService {
        NewsService::new(self.db().pool.clone(), self.content_generator())
    }

    fn profile_service(&self) -> ProfileService {
        ProfileService::new(self.db().pool.clone())
    }
}

#[derive(Clone)]
pub struct AppDeployment {
    db: DBService,
    config: Arc<Config>,
    football_api: Option<FootballApiClient>,
    odds_api: Option<OddsApiClient>,
    content_generator: Option<Arc<dyn ContentGenerator>>,
}

impl AppDeployment {
    /// Connect to the configured database and build the upstream clients
    /// whose keys are present.
    pub async fn new(config: Config) -> Result<Self, DeploymentError> {
        let db = DBService::new(&config.database_url).await?;
        Self::from_parts(db, config)
    }

    pub fn from_parts(db: DBService, config: Config) -> Result<Self, DeploymentError> {
        let football_api = optional_client(
            "football data",
            FootballApiClient::new(
                config.football_data_api_key.as_ref(),
                &config.football_data_base_url,
                config.upstream_cache_seconds,
            ),
        )?;
        let odds_api = optional_client(
            "odds",
            OddsApiClient::new(
                config.odds_api_key.as_ref(),
                &config.odds_api_base_url,
                config.upstream_cache_seconds,
            ),
        )?;
        let content_generator = match ClaudeApiClient::from_key(config.anthropic_api_key.as_ref()) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn ContentGenerator>),
            Err(ClaudeApiError::MissingApiKey) => {
                warn!("ANTHROPIC_API_KEY not set - AI generation disabled");
                None
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            db,
            config: Arc::new(config),
            football_api,
            odds_api,
            content_generator,
        })
    }

    /// Swap the AI backend, e.g. for a scripted one in tests.
    pub fn with_content_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.content_generator = Some(generator);
        self
    }

    /// Start the live score poller when the football data provider is
    /// configured.
    pub fn spawn_background_services(&self) -> Option<JoinHandle<()>> {
        let Some(client) = self.football_api.clone() else {
            info!("FOOTBALL_DATA_API_KEY not set - live score sync disabled");
            return None;
        };
        let service = LiveScoreSyncService::new(
            self.db.clone(),
            Arc::new(client),
            Duration::from_secs(self.config.live_score_sync_seconds),
        );
        Some(service.spawn())
    }
}

fn optional_client<T>(
    name: &str,
    built: Result<T, FootballApiError>,
) -> Result<Option<T>, FootballApiError> {
    match built {
        Ok(client) => Ok(Some(client)),
        Err(FootballApiError::NotConfigured(key)) => {
            warn!("{key} not set - {name} routes disabled");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[async_trait]
impl Deployment for AppDeployment {
    fn db(&self) -> &DBService {
        &self.db
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn football_api(&self) -> Option<&FootballApiClient> {
        self.football_api.as_ref()
    }

    fn odds_api(&self) -> Option<&OddsApiClient> {
        self.odds_api.as_ref()
    }

    fn content_generator(&self) -> Option<Arc<dyn ContentGenerator>> {
        self.content_generator.clone()
    }
}
