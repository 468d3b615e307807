//! Daraja HTTP client
//!
//! Thin client over the Safaricom Daraja API: OAuth token acquisition with
//! caching, STK push initiation, and push status queries. The request
//! password is derived fresh for every call — it embeds the request
//! timestamp and must never be cached.

use crate::types::{
    OAuthTokenResponse, StkPushRequest, StkPushResponse, StkQueryRequest, StkQueryResponse,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use haven_core::{
    config::MpesaConfig,
    traits::{GatewayStatus, PaymentGateway, PushPaymentRequest, PushPaymentResponse},
    AppError, AppResult,
};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use rust_decimal::prelude::ToPrimitive;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, instrument, warn};

/// Fallback token lifetime when the gateway's `expires_in` is unparseable
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Cached OAuth access token
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Daraja API client
///
/// One instance per process; the access token is shared across concurrent
/// payment attempts and re-fetched shortly before expiry.
pub struct MpesaClient {
    http: Client,
    config: MpesaConfig,
    token: RwLock<Option<CachedToken>>,
}

impl MpesaClient {
    /// Create a new client from gateway configuration
    pub fn new(config: MpesaConfig) -> AppResult<Self> {
        let http = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            token: RwLock::new(None),
        })
    }

    /// Request timestamp in the gateway's `YYYYMMDDHHMMSS` format
    pub fn timestamp() -> String {
        Utc::now().format("%Y%m%d%H%M%S").to_string()
    }

    /// Derive the request password: base64(shortcode + passkey + timestamp)
    ///
    /// Recomputed per request; the timestamp inside must match the
    /// `Timestamp` field of the payload it accompanies.
    pub fn password(short_code: &str, passkey: &str, timestamp: &str) -> String {
        BASE64.encode(format!("{}{}{}", short_code, passkey, timestamp))
    }

    /// Get a valid access token, re-fetching when the cached one is near
    /// expiry
    async fn access_token(&self) -> AppResult<String> {
        {
            let guard = self.token.read().await;
            if let Some(cached) = guard.as_ref() {
                if Instant::now() < cached.expires_at {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut guard = self.token.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        debug!("Fetching fresh gateway access token");

        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url()
        );

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token request failed: status={} body={}", status, body);
            return Err(AppError::GatewayUnavailable(format!(
                "token request failed with status {}",
                status
            )));
        }

        let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
            error!("Failed to parse token response: {}", e);
            AppError::GatewayUnavailable(format!("unparseable token response: {}", e))
        })?;

        let lifetime_secs: u64 = token_response
            .expires_in
            .parse()
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let margin = self.config.token_refresh_margin_secs.min(lifetime_secs);

        let token = token_response.access_token;
        *guard = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime_secs - margin),
        });

        debug!("Gateway access token refreshed (lifetime {}s)", lifetime_secs);
        Ok(token)
    }

    fn map_transport_error(e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            warn!("Gateway request timed out");
            AppError::GatewayUnavailable("request timed out".to_string())
        } else {
            error!("Gateway transport error: {}", e);
            AppError::GatewayUnavailable(e.to_string())
        }
    }
}

#[async_trait]
impl PaymentGateway for MpesaClient {
    #[instrument(skip(self, request), fields(account_ref = %request.account_reference))]
    async fn initiate_push(
        &self,
        request: &PushPaymentRequest,
    ) -> AppResult<PushPaymentResponse> {
        let access_token = self.access_token().await?;
        let timestamp = Self::timestamp();
        let password = Self::password(
            &self.config.business_short_code,
            &self.config.passkey,
            &timestamp,
        );

        // Daraja only accepts whole currency units
        let amount = request
            .amount
            .round()
            .to_u64()
            .ok_or_else(|| {
                AppError::InvalidInput(format!("amount {} not representable", request.amount))
            })?;

        let payload = StkPushRequest {
            business_short_code: self.config.business_short_code.clone(),
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount,
            party_a: request.phone_number.clone(),
            party_b: self.config.business_short_code.clone(),
            phone_number: request.phone_number.clone(),
            call_back_url: self.config.callback_url.clone(),
            account_reference: request.account_reference.clone(),
            transaction_desc: request.description.clone(),
        };

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&access_token)
            .json(&payload)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("STK push rejected: status={} body={}", status, body);
            return Err(AppError::GatewayUnavailable(format!(
                "push request failed with status {}",
                status
            )));
        }

        let push: StkPushResponse = response.json().await.map_err(|e| {
            error!("Failed to parse push response: {}", e);
            AppError::GatewayUnavailable(format!("unparseable push response: {}", e))
        })?;

        if push.response_code != "0" {
            let desc = push
                .response_description
                .or(push.customer_message)
                .unwrap_or_else(|| "unknown error".to_string());
            warn!("Gateway declined push: {}", desc);
            return Err(AppError::GatewayRejected(desc));
        }

        debug!(
            "STK push accepted, correlation id {}",
            push.checkout_request_id
        );

        Ok(PushPaymentResponse {
            merchant_request_id: push.merchant_request_id,
            checkout_request_id: push.checkout_request_id,
        })
    }

    #[instrument(skip(self))]
    async fn query_status(&self, checkout_request_id: &str) -> AppResult<GatewayStatus> {
        let access_token = self.access_token().await?;
        let timestamp = Self::timestamp();
        let password = Self::password(
            &self.config.business_short_code,
            &self.config.passkey,
            &timestamp,
        );

        let payload = StkQueryRequest {
            business_short_code: self.config.business_short_code.clone(),
            password,
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };

        let url = format!("{}/mpesa/stkpushquery/v1/query", self.config.base_url());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&access_token)
            .json(&payload)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Status query failed: status={} body={}", status, body);
            return Err(AppError::GatewayUnavailable(format!(
                "status query failed with status {}",
                status
            )));
        }

        let verdict: StkQueryResponse = response.json().await.map_err(|e| {
            error!("Failed to parse status response: {}", e);
            AppError::GatewayUnavailable(format!("unparseable status response: {}", e))
        })?;

        debug!(
            "Status query: response_code={} result_code={:?}",
            verdict.response_code, verdict.result_code
        );

        Ok(GatewayStatus {
            response_code: verdict.response_code,
            result_code: verdict.result_code,
            result_desc: verdict.result_desc.or(verdict.response_description),
            receipt: verdict.mpesa_receipt_number,
        })
    }
}
