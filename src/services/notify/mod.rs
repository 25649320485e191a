pub mod telegram;

use async_trait::async_trait;

/// Plain-text message sink for booking and contact events. Dispatch is
/// best-effort: a failed send never rolls back a persisted booking.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> anyhow::Result<()>;
}
