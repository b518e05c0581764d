use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,server=debug,services=debug,db=info";

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. When a Sentry client is active, `error!` events are forwarded
/// to it and lower levels become breadcrumbs.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(sentry_tracing::layer())
        .init();
}

/// Start the Sentry client if `SENTRY_DSN` is set. The returned guard must
/// live for the whole process so buffered events are flushed on exit.
pub fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|s| !s.is_empty())?;
    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: std::env::var("SENTRY_ENVIRONMENT").ok().map(Into::into),
            ..Default::default()
        },
    ));
    Some(guard)
}
