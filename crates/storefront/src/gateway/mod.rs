//! Payment gateway client.
//!
//! The gateway issues hosted checkout URLs and eventually reports a
//! terminal payment status. Two seams are abstracted for testing:
//!
//! - [`PaymentGateway`] - create a checkout link, fetch the current
//!   payment status for a cart.
//! - [`LinkOpener`] - hand the checkout URL to a browsing context.
//!   Opening can be refused (popup blocking and friends); a refused open
//!   means the checkout attempt never started.
//!
//! Status observation is a cancellable polling task ([`StatusSubscription`])
//! feeding a `tokio::sync::watch` channel, with an explicit stop and
//! abort-on-drop so no observer outlives its view.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::instrument;
use url::Url;

use hilo_core::{CartId, PaymentStatus, Price, ProviderCode};

use crate::config::StorefrontConfig;

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur when interacting with the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Non-success HTTP status with a response body.
    #[error("Gateway returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The browsing context refused to open the checkout URL.
    #[error("Checkout link could not be opened")]
    OpenBlocked,
}

// =============================================================================
// Traits
// =============================================================================

/// Operations the payment gateway exposes.
///
/// Methods are declared as `impl Future + Send` so a status poller can be
/// spawned onto the runtime.
pub trait PaymentGateway {
    /// Request a hosted checkout URL for the given cart and amount.
    fn create_checkout(
        &self,
        request: &CreateCheckoutRequest,
    ) -> impl Future<Output = Result<Url, GatewayError>> + Send;

    /// Fetch the current payment status for a cart.
    fn fetch_status(
        &self,
        cart_id: CartId,
    ) -> impl Future<Output = Result<PaymentStatus, GatewayError>> + Send;
}

/// Hands a checkout URL to a browsing context.
pub trait LinkOpener: Send + Sync {
    /// Open `url`; `Err(GatewayError::OpenBlocked)` when refused.
    fn open(&self, url: &Url) -> Result<(), GatewayError>;
}

/// Opener that emits the URL for the surrounding shell to present.
///
/// The engine itself has no UI; surfacing the link is the embedder's job.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitLinkOpener;

impl LinkOpener for EmitLinkOpener {
    fn open(&self, url: &Url) -> Result<(), GatewayError> {
        tracing::info!(checkout_url = %url, "Checkout link ready");
        Ok(())
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// Request body for checkout-link creation. The gateway speaks snake_case.
#[derive(Debug, Clone, Serialize)]
pub struct CreateCheckoutRequest {
    pub cart_id: CartId,
    pub amount: i64,
    pub currency: String,
    pub provider_code: ProviderCode,
    pub return_url: Url,
}

impl CreateCheckoutRequest {
    #[must_use]
    pub fn new(cart_id: CartId, amount: Price, provider: ProviderCode, return_url: Url) -> Self {
        Self {
            cart_id,
            amount: amount.amount_minor,
            currency: amount.currency_code.code().to_string(),
            provider_code: provider,
            return_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateCheckoutResponse {
    checkout_url: Url,
}

#[derive(Debug, Deserialize)]
struct PaymentStatusResponse {
    status: PaymentStatus,
}

// =============================================================================
// GatewayClient
// =============================================================================

/// Client for the payment gateway's REST API.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<GatewayClientInner>,
}

struct GatewayClientInner {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl GatewayClient {
    /// Create a new gateway client from configuration.
    #[must_use]
    pub fn new(config: &StorefrontConfig) -> Self {
        Self {
            inner: Arc::new(GatewayClientInner {
                client: reqwest::Client::new(),
                base_url: config
                    .gateway_base_url
                    .as_str()
                    .trim_end_matches('/')
                    .to_string(),
                access_token: config.gateway_token.expose_secret().to_string(),
            }),
        }
    }

    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = request
            .bearer_auth(&self.inner.access_token)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Payment gateway returned non-success status"
            );
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message: response_text.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&response_text).map_err(GatewayError::Parse)
    }
}

impl PaymentGateway for GatewayClient {
    #[instrument(skip(self, request), fields(cart_id = %request.cart_id, amount = request.amount, provider = ?request.provider_code))]
    async fn create_checkout(&self, request: &CreateCheckoutRequest) -> Result<Url, GatewayError> {
        let response: CreateCheckoutResponse = self
            .execute(
                self.inner
                    .client
                    .post(format!("{}/checkouts", self.inner.base_url))
                    .json(request),
            )
            .await?;
        Ok(response.checkout_url)
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn fetch_status(&self, cart_id: CartId) -> Result<PaymentStatus, GatewayError> {
        let response: PaymentStatusResponse = self
            .execute(
                self.inner
                    .client
                    .get(format!("{}/payments/{cart_id}/status", self.inner.base_url)),
            )
            .await?;
        Ok(response.status)
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// StatusSubscription
// =============================================================================

/// A cancellable payment-status observer.
///
/// Polls the gateway on a fixed interval and publishes every observed
/// status through a watch channel. The poll task ends on its own once a
/// terminal status has been published; it is aborted when the
/// subscription is stopped or dropped, so a torn-down view can never
/// receive a late status.
#[derive(Debug)]
pub struct StatusSubscription {
    receiver: watch::Receiver<PaymentStatus>,
    task: tokio::task::JoinHandle<()>,
}

impl StatusSubscription {
    /// Start polling `cart_id` on `poll_interval`.
    pub fn start<G>(gateway: G, cart_id: CartId, poll_interval: Duration) -> Self
    where
        G: PaymentGateway + Send + Sync + 'static,
    {
        let (sender, receiver) = watch::channel(PaymentStatus::Initiated);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match gateway.fetch_status(cart_id).await {
                    Ok(status) => {
                        // Deliberately re-published even when unchanged;
                        // duplicate terminal deliveries are the tracker's
                        // idempotence problem, not hidden here.
                        if sender.send(status).is_err() {
                            break;
                        }
                        if status.is_terminal() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(cart_id = %cart_id, error = %e, "Status poll failed");
                    }
                }
            }
        });

        Self { receiver, task }
    }

    /// Most recently observed status.
    #[must_use]
    pub fn current(&self) -> PaymentStatus {
        *self.receiver.borrow()
    }

    /// Wait for the next published status. `None` once the poller has
    /// ended and no further statuses will arrive.
    pub async fn next_status(&mut self) -> Option<PaymentStatus> {
        self.receiver.changed().await.ok()?;
        Some(*self.receiver.borrow_and_update())
    }

    /// Stop observing. Idempotent.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
