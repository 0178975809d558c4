//! Email sender trait

use crate::domain::Email;
use crate::error::Result;
use async_trait::async_trait;

/// Capability implemented by every email backend.
///
/// A send validates the email, translates it into the provider's request
/// format and performs exactly one provider call. Implementations hold no
/// per-call state and are safe to share behind an `Arc`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sender: Send + Sync {
    /// Send an email, returning the mapped [`EmailError`](crate::error::EmailError) on failure
    async fn send_email(&self, email: &Email) -> Result<()>;

    /// Short provider identifier used in logs and metrics
    fn provider_name(&self) -> &'static str;
}
