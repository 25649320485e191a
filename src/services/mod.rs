pub mod booking;
pub mod captcha;
pub mod notify;
pub mod rate_limit;
pub mod tracking;
pub mod validation;
