//! Razorpay REST client.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};
use url::Url;

use super::types::{CreateOrderRequest, ErrorEnvelope, RazorpayOrder};
use super::{RazorpayError, SignatureError, verify_payment_signature};
use crate::config::RazorpayConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Razorpay API client.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct RazorpayClient {
    inner: Arc<RazorpayClientInner>,
}

struct RazorpayClientInner {
    client: reqwest::Client,
    key_id: String,
    key_secret: SecretString,
    base_url: Url,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("key_id", &self.inner.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("base_url", &self.inner.base_url.as_str())
            .finish()
    }
}

impl RazorpayClient {
    /// Create a new Razorpay API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build or the API base is
    /// not a hierarchical URL.
    pub fn new(config: &RazorpayConfig) -> Result<Self, RazorpayError> {
        if config.api_base.cannot_be_a_base() {
            return Err(RazorpayError::InvalidBaseUrl(config.api_base.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(RazorpayClientInner {
                client,
                key_id: config.key_id.clone(),
                key_secret: config.key_secret.clone(),
                base_url: config.api_base.clone(),
            }),
        })
    }

    /// Append path segments to the API base, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RazorpayError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RazorpayError::InvalidBaseUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Public key id, embedded in the browser checkout options.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.inner.key_id
    }

    /// Create a gateway order.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::Http` if the gateway is unreachable and
    /// `RazorpayError::Api` if it rejects the request.
    #[instrument(skip(self, request), fields(amount = request.amount, receipt = %request.receipt))]
    pub async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<RazorpayOrder, RazorpayError> {
        let url = self.endpoint(&["orders"])?;
        let response = self
            .inner
            .client
            .post(url)
            .basic_auth(&self.inner.key_id, Some(self.inner.key_secret.expose_secret()))
            .json(request)
            .send()
            .await?;

        let order: RazorpayOrder = self.handle_response(response).await?;
        debug!(razorpay_order_id = %order.id, "Razorpay order created");
        Ok(order)
    }

    /// Fetch a gateway order by id.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::Api` with status 400 for unknown ids.
    #[instrument(skip(self))]
    pub async fn fetch_order(&self, razorpay_order_id: &str) -> Result<RazorpayOrder, RazorpayError> {
        let url = self.endpoint(&["orders", razorpay_order_id])?;
        let response = self
            .inner
            .client
            .get(url)
            .basic_auth(&self.inner.key_id, Some(self.inner.key_secret.expose_secret()))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Verify a checkout callback against this account's key secret.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError` when the callback was not signed by Razorpay.
    pub fn verify_payment(
        &self,
        razorpay_order_id: &str,
        razorpay_payment_id: &str,
        signature: &str,
    ) -> Result<(), SignatureError> {
        verify_payment_signature(
            razorpay_order_id,
            razorpay_payment_id,
            signature,
            &self.inner.key_secret,
        )
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, RazorpayError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| RazorpayError::Parse(format!("Failed to parse response: {e}")));
        }

        let status = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let (code, description) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => (envelope.error.code, envelope.error.description),
            Err(_) => ("UNKNOWN".to_string(), body),
        };

        warn!(status, code = %code, description = %description, "Razorpay API error");
        Err(RazorpayError::Api {
            status,
            code,
            description,
        })
    }
}
