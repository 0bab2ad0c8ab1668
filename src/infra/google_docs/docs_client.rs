// =============================================================================
// GOOGLE DOCS CLIENT WITH OAUTH2 REFRESH-TOKEN AUTHENTICATION
// =============================================================================
//
// This module implements the `DocumentWriter` port against the real Google
// Docs API.
//
// The server never runs an interactive OAuth flow: the companion `get-token`
// binary produces a long-lived refresh token once, and this client trades it
// for short-lived access tokens on demand. Access tokens are cached in memory
// and refreshed shortly before Google says they expire.
//
// **Environment:** the credentials arrive through `Config` (CLIENT_ID,
// CLIENT_SECRET, REFRESH_TOKEN); this module never reads env vars itself.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::tools::{DocsError, DocumentWriter};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DOCS_API_BASE: &str = "https://docs.googleapis.com/v1";

/// Refresh this long before the reported expiry so a token never goes stale
/// mid-request.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

// =============================================================================
// OAUTH2 TOKEN REFRESH
// =============================================================================

/// The credential triple produced by `get-token`.
#[derive(Debug, Clone)]
pub struct OauthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Cached access token with expiration.
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

// =============================================================================
// GOOGLE DOCS API REQUEST STRUCTURES
// =============================================================================

#[derive(Debug, Serialize)]
struct BatchUpdateRequest {
    requests: Vec<DocsRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocsRequest {
    insert_text: InsertText,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertText {
    text: String,
    end_of_segment_location: EndOfSegmentLocation,
}

/// An empty object means "the end of the document body".
#[derive(Debug, Serialize)]
struct EndOfSegmentLocation {}

// =============================================================================
// CLIENT
// =============================================================================

/// Client for appending text to Google Docs.
pub struct GoogleDocsApiClient {
    client: Client,
    credentials: OauthCredentials,
    base_url: String,
    token_url: String,
    cached_token: RwLock<Option<CachedToken>>,
}

impl GoogleDocsApiClient {
    /// `timeout` bounds every upstream request end to end; there is no retry.
    pub fn new(credentials: OauthCredentials, timeout: Duration) -> Result<Self, DocsError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DocsError::Http(e.to_string()))?;

        Ok(Self {
            client,
            credentials,
            base_url: DOCS_API_BASE.to_string(),
            token_url: TOKEN_URL.to_string(),
            cached_token: RwLock::new(None),
        })
    }

    /// Gets a valid access token, refreshing if necessary.
    async fn access_token(&self) -> Result<String, DocsError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + EXPIRY_SKEW {
                    return Ok(token.token.clone());
                }
            }
        }

        let fresh = self.refresh_access_token().await?;
        let expires_at = SystemTime::now() + Duration::from_secs(fresh.expires_in);

        let mut cached = self.cached_token.write().await;
        *cached = Some(CachedToken {
            token: fresh.access_token.clone(),
            expires_at,
        });

        Ok(fresh.access_token)
    }

    async fn refresh_access_token(&self) -> Result<TokenResponse, DocsError> {
        tracing::debug!("refreshing Google access token");

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| DocsError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DocsError::Auth(format!(
                "token refresh failed ({status}): {text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DocsError::Http(e.to_string()))
    }
}

#[async_trait]
impl DocumentWriter for GoogleDocsApiClient {
    async fn append_text(&self, doc_id: &str, content: &str) -> Result<(), DocsError> {
        let token = self.access_token().await?;

        let url = format!("{}/documents/{}:batchUpdate", self.base_url, doc_id);
        let body = BatchUpdateRequest {
            requests: vec![DocsRequest {
                insert_text: InsertText {
                    text: content.to_string(),
                    end_of_segment_location: EndOfSegmentLocation {},
                },
            }],
        };

        tracing::debug!(doc_id, bytes = content.len(), "appending text via batchUpdate");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(&body)
            .send()
            .await
            .map_err(|e| DocsError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let text = response.text().await.unwrap_or_default();
            return Err(DocsError::Auth(format!(
                "Docs API rejected the request ({status}): {text}. \
                 Make sure the document is shared with the authorized account.",
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DocsError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        tracing::info!(doc_id, "text appended");
        Ok(())
    }
}
