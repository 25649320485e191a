use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::captcha::CaptchaVerifier;
use crate::services::notify::Notifier;
use crate::services::rate_limit::RateLimiter;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub notifier: Box<dyn Notifier>,
    pub captcha: Box<dyn CaptchaVerifier>,
    pub contact_limiter: Mutex<RateLimiter>,
}
