//! Pronto bot - conversational pizza ordering over Telegram and Messenger.
//!
//! # Architecture
//!
//! - One conversation engine instance per transport, sharing the commerce,
//!   geocoder, and Redis clients
//! - Telegram runs a long-poll loop against the Bot API
//! - Messenger events arrive on an axum webhook server
//! - All durable conversation state lives in Redis; a dispatch that fails
//!   leaves the stored state untouched so the user's next message retries

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use secrecy::ExposeSecret;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pronto_bot::commerce::CommerceClient;
use pronto_bot::config::BotConfig;
use pronto_bot::engine::Engine;
use pronto_bot::facebook::{FacebookClient, FacebookTransport, webhook};
use pronto_bot::geo::{GeocoderClient, LocationService};
use pronto_bot::store::RedisStateStore;
use pronto_bot::telegram::{TelegramClient, TelegramTransport, poll};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &BotConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = BotConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Initialize tracing with EnvFilter and Sentry integration
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pronto_bot=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    // Shared collaborators (Arc-backed handles; clones share connections)
    let commerce = CommerceClient::new(config.commerce.clone());
    let geocoder = GeocoderClient::new(config.geocoder.clone());
    let locations = LocationService::new(geocoder, commerce.clone());
    let store = RedisStateStore::connect(config.redis_url.expose_secret())
        .await
        .expect("Failed to connect to Redis");
    tracing::info!("State store connected");

    let policy = config.engine_policy();

    // Telegram: long-poll loop
    let telegram_client = TelegramClient::new(config.telegram_token.clone());
    let telegram_transport =
        TelegramTransport::new(telegram_client.clone(), config.telegram_payment.clone());
    let telegram_engine = Arc::new(Engine::new(
        commerce.clone(),
        locations.clone(),
        store.clone(),
        telegram_transport.clone(),
        policy.clone(),
    ));

    // Facebook: webhook server
    let facebook_transport =
        FacebookTransport::new(FacebookClient::new(config.facebook.page_token.clone()));
    let facebook_engine = Engine::new(commerce, locations, store, facebook_transport, policy);
    let webhook_state = webhook::WebhookState::new(
        facebook_engine,
        config.facebook.verify_token.clone(),
        config.facebook.app_secret.clone(),
    );
    let app = webhook::router(webhook_state);

    let addr = config.webhook_addr();
    tracing::info!("webhook listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    tokio::select! {
        () = poll::run(telegram_client, telegram_transport, telegram_engine) => {}
        result = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()) => {
            result.expect("Server error");
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
