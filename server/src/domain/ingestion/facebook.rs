//! Facebook Lead Ads integration
//!
//! Webhook payload types, `x-hub-signature-256` verification, and the Graph
//! API client used to fetch full lead details after a webhook ping. The
//! webhook only carries ids; the actual form answers come from
//! `GET /{leadgen_id}` with `appsecret_proof`.

use serde::{Deserialize, Serialize};

use crate::core::constants::{FB_GRAPH_MAX_ATTEMPTS, FB_GRAPH_TIMEOUT_SECS, FB_LEAD_FIELDS};
use crate::domain::error::DomainError;
use crate::utils::crypto::{constant_time_eq, hmac_sha256_hex};
use crate::utils::retry::retry_with_backoff;

/// Signature header prefix mandated by Facebook
const SIGNATURE_PREFIX: &str = "sha256=";

/// Top-level webhook POST body
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Must be "page" for Lead Ads subscriptions
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChange {
    /// Only "leadgen" changes are processed
    pub field: String,
    pub value: LeadEvent,
}

/// A single leadgen notification; also the stream topic message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadEvent {
    pub leadgen_id: String,
    pub page_id: String,
    #[serde(default)]
    pub form_id: Option<String>,
    #[serde(default)]
    pub ad_id: Option<String>,
    /// Unix seconds, as Facebook sends it
    #[serde(default)]
    pub created_time: Option<i64>,
}

/// Verify an `x-hub-signature-256` header against the raw request body
///
/// The header is `"sha256=" + hex(HMAC-SHA256(body, app_secret))`; the
/// comparison is constant-time.
pub fn verify_signature(app_secret: &str, raw_body: &[u8], header: &str) -> bool {
    let Some(signature) = header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let expected = hmac_sha256_hex(app_secret, raw_body);
    constant_time_eq(&expected, signature)
}

/// Full lead details from the Graph API
#[derive(Debug, Clone, Deserialize)]
pub struct GraphLead {
    pub id: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub ad_id: Option<String>,
    #[serde(default)]
    pub adset_id: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub form_id: Option<String>,
    #[serde(default)]
    pub field_data: Vec<GraphFieldData>,
}

/// One answered form field; values arrive as an array
#[derive(Debug, Clone, Deserialize)]
pub struct GraphFieldData {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Flatten `field_data` into ordered (name, value) pairs; first value wins
pub fn facebook_fields(field_data: &[GraphFieldData]) -> Vec<(String, String)> {
    field_data
        .iter()
        .filter_map(|field| {
            field
                .values
                .first()
                .map(|value| (field.name.clone(), value.clone()))
        })
        .collect()
}

/// Graph API client for the single lead-fetch call
pub struct GraphClient {
    http: reqwest::Client,
    base: String,
    access_token: String,
    app_secret: String,
}

impl GraphClient {
    pub fn new(base: &str, access_token: &str, app_secret: &str) -> Result<Self, DomainError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(FB_GRAPH_TIMEOUT_SECS))
            .build()
            .map_err(|e| DomainError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            app_secret: app_secret.to_string(),
        })
    }

    /// Fetch full lead details for a leadgen id
    ///
    /// Per-request timeout with one retry; a lead we cannot fetch is a
    /// processing failure, never a silently empty lead. Returns the parsed
    /// lead along with the verbatim response body for raw-payload storage.
    pub async fn fetch_lead(&self, leadgen_id: &str) -> Result<(GraphLead, String), DomainError> {
        let url = format!("{}/{}", self.base, leadgen_id);
        // Proof-of-secret required by Graph API server-side calls
        let appsecret_proof = hmac_sha256_hex(&self.app_secret, self.access_token.as_bytes());

        let result = retry_with_backoff(FB_GRAPH_MAX_ATTEMPTS, 500, || async {
            let response = self
                .http
                .get(&url)
                .query(&[
                    ("fields", FB_LEAD_FIELDS),
                    ("access_token", self.access_token.as_str()),
                    ("appsecret_proof", appsecret_proof.as_str()),
                ])
                .send()
                .await
                .map_err(|e| DomainError::Upstream(format!("graph request failed: {e}")))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| DomainError::Upstream(format!("graph response read failed: {e}")))?;
            if !status.is_success() {
                return Err(DomainError::Upstream(format!(
                    "graph returned {status}: {body}"
                )));
            }

            let lead: GraphLead = serde_json::from_str(&body)
                .map_err(|e| DomainError::Upstream(format!("invalid graph response: {e}")))?;
            Ok((lead, body))
        })
        .await;

        match result {
            Ok((fetched, attempts)) => {
                if attempts > 1 {
                    tracing::debug!(leadgen_id, attempts, "Graph fetch succeeded after retry");
                }
                Ok(fetched)
            }
            Err((err, attempts)) => {
                tracing::warn!(leadgen_id, attempts, error = %err, "Graph fetch failed");
                Err(err)
            }
        }
    }
}
