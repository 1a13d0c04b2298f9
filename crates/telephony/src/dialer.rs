//! Outbound call placement.
//!
//! The gateway consumes the [`Dialer`] trait only; [`HttpDialer`] is the
//! Twilio-compatible adapter. Tests substitute their own implementation.

use async_trait::async_trait;

use cc_domain::call::CallStatus;
use cc_domain::config::ProviderConfig;
use cc_domain::error::{Error, Result};

/// Result of placing the outbound monitor call.
#[derive(Debug, Clone)]
pub struct PlacedCall {
    pub call_id: String,
    pub status: CallStatus,
}

/// Places the outbound monitor call that gets bridged into the user's
/// conversation.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// False when the provider credentials are missing; `POST /call`
    /// reports this as a config problem instead of dialing.
    fn is_configured(&self) -> bool;

    /// Dial `to` and point the provider's status + transcription callbacks
    /// at `webhook_url`.
    async fn place_monitor_call(&self, to: &str, webhook_url: &str) -> Result<PlacedCall>;
}

/// HTTP adapter for a Twilio-compatible calls API.
pub struct HttpDialer {
    client: reqwest::Client,
    base_url: String,
    account_id: Option<String>,
    auth_token: Option<String>,
    from_number: Option<String>,
}

impl HttpDialer {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            account_id: cfg.account_id.clone(),
            auth_token: cfg.auth_token.clone(),
            from_number: cfg.from_number.clone(),
        })
    }
}

#[async_trait]
impl Dialer for HttpDialer {
    fn is_configured(&self) -> bool {
        self.account_id.is_some() && self.auth_token.is_some() && self.from_number.is_some()
    }

    async fn place_monitor_call(&self, to: &str, webhook_url: &str) -> Result<PlacedCall> {
        let (Some(account), Some(token), Some(from)) =
            (&self.account_id, &self.auth_token, &self.from_number)
        else {
            return Err(Error::Config("telephony provider is not configured".into()));
        };

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.base_url, account
        );
        let form = [
            ("To", to),
            ("From", from.as_str()),
            ("Url", webhook_url),
            ("StatusCallback", webhook_url),
        ];

        tracing::debug!(%url, to, "placing monitor call");

        let resp = self
            .client
            .post(&url)
            .basic_auth(account, Some(token))
            .form(&form)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let body = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(Error::Http(format!(
                "dial request failed: HTTP {} - {}",
                status.as_u16(),
                body
            )));
        }

        let v: serde_json::Value = serde_json::from_str(&body)?;
        let call_id = v
            .get("sid")
            .and_then(|s| s.as_str())
            .ok_or_else(|| Error::Http("dial response missing call sid".into()))?
            .to_string();
        let call_status = v
            .get("status")
            .and_then(|s| s.as_str())
            .map(CallStatus::normalize)
            .unwrap_or(CallStatus::Queued);

        Ok(PlacedCall {
            call_id,
            status: call_status,
        })
    }
}

/// Timeout errors map to [`Error::Timeout`]; everything else to
/// [`Error::Http`].
fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
