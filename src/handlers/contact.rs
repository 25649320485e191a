use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::validation;
use crate::state::AppState;

pub const CONTACT_MAX_REQUESTS: u32 = 3;
pub const CONTACT_WINDOW_MINUTES: i64 = 15;

const MAX_NAME_LEN: usize = 100;
const MAX_MESSAGE_LEN: usize = 1000;

#[derive(Deserialize)]
pub struct ContactForm {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
    /// Honeypot; legitimate clients leave it empty.
    #[serde(default)]
    pub company: String,
    pub captcha_token: Option<String>,
}

// POST /contact
pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(form): Json<ContactForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ip = client_ip(&headers);
    let now = Utc::now();

    let decision = {
        let mut limiter = state.contact_limiter.lock().unwrap();
        let decision = limiter.check(&ip, now);
        limiter.sweep_expired(now);
        decision
    };
    if !decision.allowed {
        tracing::warn!(ip = %ip, "contact form rate limited");
        return Err(AppError::RateLimited {
            reset_at: decision.reset_at,
        });
    }

    let name = required(&form.name, "name")?;
    let phone = required(&form.phone, "phone")?;
    let message = required(&form.message, "message")?;
    let captcha_token = required(&form.captcha_token, "captcha_token")?;

    if !validation::validate_honeypot(&form.company) {
        return Err(AppError::invalid("company", "invalid submission detected"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(AppError::invalid("name", "name is too long"));
    }
    if !validation::is_valid_phone(phone) {
        return Err(AppError::invalid(
            "phone",
            "enter a valid 7-digit phone number",
        ));
    }
    if message.len() > MAX_MESSAGE_LEN {
        return Err(AppError::invalid(
            "message",
            "message is too long, please keep it under 1000 characters",
        ));
    }

    let captcha_ok = match state.captcha.verify(captcha_token).await {
        Ok(ok) => ok,
        Err(e) => {
            tracing::error!(error = %e, "captcha verification failed");
            false
        }
    };
    if !captcha_ok {
        return Err(AppError::invalid(
            "captcha_token",
            "captcha verification failed, please try again",
        ));
    }

    if !state.config.telegram_configured() {
        return Err(AppError::Config(
            "messaging service not configured".to_string(),
        ));
    }

    let text = contact_notice(name, phone, message, now);
    if let Err(e) = state.notifier.send(&text).await {
        tracing::error!(error = %e, "failed to dispatch contact notification");
        return Err(AppError::Notification(
            "failed to send message, please try again or contact us directly".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Your message has been sent successfully! We'll get back to you soon.",
    })))
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, AppError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::invalid(field, format!("{field} is required"))),
    }
}

/// First proxy-provided client address, falling back to "unknown" so the rate
/// limiter still has a key when no header is present.
fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    for header in ["x-real-ip", "cf-connecting-ip"] {
        if let Some(ip) = headers.get(header).and_then(|v| v.to_str().ok()) {
            let ip = ip.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }
    "unknown".to_string()
}

fn contact_notice(name: &str, phone: &str, message: &str, now: DateTime<Utc>) -> String {
    let offset = FixedOffset::east_opt(5 * 3600).expect("valid offset");
    let local = offset.from_utc_datetime(&now.naive_utc());
    format!(
        "New contact form submission\n\nName: {name}\nPhone: {phone}\nMessage:\n{message}\n\n\
         Received: {} (Maldives time)",
        local.format("%d %b %Y, %H:%M:%S"),
    )
}

// Keeps the window arithmetic alongside the policy constants.
pub fn contact_window() -> Duration {
    Duration::minutes(CONTACT_WINDOW_MINUTES)
}
