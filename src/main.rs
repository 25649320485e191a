use std::sync::{Arc, Mutex};

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use motogarage::config::AppConfig;
use motogarage::db;
use motogarage::handlers;
use motogarage::handlers::contact::{contact_window, CONTACT_MAX_REQUESTS};
use motogarage::services::captcha::{CaptchaVerifier, DisabledCaptcha, RecaptchaVerifier};
use motogarage::services::notify::telegram::TelegramNotifier;
use motogarage::services::rate_limit::RateLimiter;
use motogarage::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if !config.telegram_configured() {
        tracing::warn!("TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID not set, notifications will fail");
    }
    let notifier = TelegramNotifier::new(
        config.telegram_bot_token.clone(),
        config.telegram_chat_id.clone(),
    );

    let captcha: Box<dyn CaptchaVerifier> = if config.recaptcha_secret_key.is_empty() {
        tracing::warn!("RECAPTCHA_SECRET_KEY not set, captcha checks are disabled");
        Box::new(DisabledCaptcha)
    } else {
        Box::new(RecaptchaVerifier::new(config.recaptcha_secret_key.clone()))
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        notifier: Box::new(notifier),
        captcha,
        contact_limiter: Mutex::new(RateLimiter::new(CONTACT_MAX_REQUESTS, contact_window())),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/contact", post(handlers::contact::submit_contact))
        .route("/bookings", post(handlers::bookings::create_booking))
        .route(
            "/bookings/:id",
            get(handlers::bookings::track_booking).delete(handlers::admin::delete_booking),
        )
        .route(
            "/bookings/:id/status",
            patch(handlers::admin::update_status),
        )
        .route("/api/admin/bookings", get(handlers::admin::list_bookings))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
