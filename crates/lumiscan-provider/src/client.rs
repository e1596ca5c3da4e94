//! The three-phase provider protocol client.
//!
//! [`VisionClient`] owns the HTTP connection to the provider and nothing
//! else: no persistence, no whole-call retries. Non-2xx and transport
//! failures are mapped through the classifier so every caller-visible
//! error is one of the fixed [`ErrorKind`] categories.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, warn};

use lumiscan_types::classify;
use lumiscan_types::{ClassifiedError, ErrorKind, LumiscanError, VisionProviderConfig};

use crate::scores::normalize_scores;
use crate::types::{AnalysisEnvelope, AnalysisSuccess, SlotEnvelope, UploadSlot};

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ClassifiedError>;

/// HTTP client for the remote skin-analysis provider.
///
/// # Construction
///
/// ```rust,ignore
/// use lumiscan_provider::VisionClient;
/// use lumiscan_types::VisionProviderConfig;
///
/// let config = VisionProviderConfig {
///     base_url: "https://api.vendor.example/v1".into(),
///     ..VisionProviderConfig::default()
/// };
/// let client = VisionClient::new(config)?;
/// ```
///
/// Credentials are resolved from the environment variables named in the
/// config (`client_id_env` / `api_key_env`) at call time;
/// [`VisionClient::with_credentials`] bypasses the environment.
pub struct VisionClient {
    config: VisionProviderConfig,
    http: reqwest::Client,
    client_id: Option<String>,
    api_key: Option<String>,
    /// Timestamp of the first outbound HTTP call, for audit-ordering checks.
    first_call_at: Mutex<Option<DateTime<Utc>>>,
}

impl VisionClient {
    /// Create a client from configuration.
    pub fn new(config: VisionProviderConfig) -> lumiscan_types::Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LumiscanError::ConfigInvalid {
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            config,
            http,
            client_id: None,
            api_key: None,
            first_call_at: Mutex::new(None),
        })
    }

    /// Create a client with explicit credentials (bypasses env lookup).
    pub fn with_credentials(
        config: VisionProviderConfig,
        client_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> lumiscan_types::Result<Self> {
        let mut client = Self::new(config)?;
        client.client_id = Some(client_id.into());
        client.api_key = Some(api_key.into());
        Ok(client)
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &VisionProviderConfig {
        &self.config
    }

    /// When the first outbound HTTP call was issued, if any yet.
    ///
    /// The pipeline's data-sovereignty guarantee is that the analysis
    /// record exists strictly before this instant.
    pub fn first_call_at(&self) -> Option<DateTime<Utc>> {
        self.first_call_at.lock().ok().and_then(|guard| *guard)
    }

    fn note_call(&self) {
        if let Ok(mut guard) = self.first_call_at.lock()
            && guard.is_none()
        {
            *guard = Some(Utc::now());
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/{path}")
    }

    /// Resolve credentials: explicit values win over environment variables.
    fn credentials(&self) -> Result<(String, String)> {
        let client_id = match &self.client_id {
            Some(id) => id.clone(),
            None => std::env::var(&self.config.client_id_env).map_err(|_| {
                ClassifiedError::from_kind(ErrorKind::ProviderAuthError)
                    .with_raw(format!("env var {} not set", self.config.client_id_env))
            })?,
        };
        let api_key = match &self.api_key {
            Some(key) => key.clone(),
            None => std::env::var(&self.config.api_key_env).map_err(|_| {
                ClassifiedError::from_kind(ErrorKind::ProviderAuthError)
                    .with_raw(format!("env var {} not set", self.config.api_key_env))
            })?,
        };
        Ok((client_id, api_key))
    }

    /// Phase 1: reserve an upload destination and analysis session.
    pub async fn reserve_upload_slot(&self, file_ext: &str) -> Result<UploadSlot> {
        let (client_id, api_key) = self.credentials()?;
        let url = self.endpoint("image");

        debug!(file_ext, "reserving upload slot");
        self.note_call();

        let response = self
            .http
            .get(&url)
            .query(&[("file_ext", file_ext)])
            .header("x-client-id", &client_id)
            .header("x-api-key", &api_key)
            .send()
            .await
            .map_err(|e| transport_error(e).or_kind(ErrorKind::UploadSlotFailed))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "upload slot request rejected");
            return Err(classify_response(status, &body).or_kind(ErrorKind::UploadSlotFailed));
        }

        let envelope: SlotEnvelope = response.json().await.map_err(|e| {
            ClassifiedError::from_kind(ErrorKind::UploadSlotFailed)
                .with_raw(format!("failed to decode slot response: {e}"))
        })?;

        debug!(session_id = %envelope.data.session_id, "upload slot reserved");
        Ok(UploadSlot {
            upload_url: envelope.data.upload_signed_url,
            session_id: envelope.data.session_id,
        })
    }

    /// Phase 2: upload the raw image bytes to the reserved destination.
    ///
    /// No retries here -- a failed upload is surfaced immediately and the
    /// caller decides whether to start a fresh analysis.
    pub async fn upload_image(&self, upload_url: &str, image: &[u8]) -> Result<()> {
        debug!(bytes = image.len(), "uploading image to provider slot");
        self.note_call();

        let response = self
            .http
            .put(upload_url)
            .header("Content-Type", &self.config.upload_content_type)
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| transport_error(e).or_kind(ErrorKind::UploadFailed))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "image upload rejected");
            return Err(classify_response(status, &body).or_kind(ErrorKind::UploadFailed));
        }

        debug!("image upload accepted");
        Ok(())
    }

    /// Phase 3: poll for the finished analysis.
    ///
    /// Polls up to `poll_max_attempts` times with a fixed
    /// `poll_interval_ms` delay between attempts. Validation failures
    /// (HTTP 400, or a provider error payload) are not transient and
    /// return immediately; exhausting the attempts yields
    /// [`ErrorKind::Timeout`].
    pub async fn poll_analysis(&self, session_id: &str) -> Result<AnalysisSuccess> {
        let (client_id, api_key) = self.credentials()?;
        let url = self.endpoint("analysis");
        let max_attempts = self.config.poll_max_attempts.max(1);
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        for attempt in 1..=max_attempts {
            self.note_call();
            let response = self
                .http
                .get(&url)
                .header("x-client-id", &client_id)
                .header("x-api-key", &api_key)
                .header("x-session-id", session_id)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if status.is_success() {
                let body = response.text().await.map_err(|e| {
                    ClassifiedError::from_kind(ErrorKind::AnalysisFailed)
                        .with_raw(format!("failed to read analysis response: {e}"))
                })?;
                let raw: Value = serde_json::from_str(&body).map_err(|e| {
                    ClassifiedError::from_kind(ErrorKind::AnalysisFailed)
                        .with_raw(format!("analysis response is not json: {e}"))
                })?;
                let envelope: AnalysisEnvelope =
                    serde_json::from_value(raw.clone()).map_err(|e| {
                        ClassifiedError::from_kind(ErrorKind::AnalysisFailed)
                            .with_raw(format!("failed to decode analysis response: {e}"))
                    })?;

                if envelope.success {
                    let data = envelope.data.ok_or_else(|| {
                        ClassifiedError::from_kind(ErrorKind::AnalysisFailed)
                            .with_raw("provider reported success without data")
                    })?;
                    let metrics = normalize_scores(&data.output_score);
                    info!(
                        session_id,
                        attempt,
                        concerns = data.output_score.len(),
                        "analysis completed"
                    );
                    return Ok(AnalysisSuccess {
                        metrics,
                        detailed_scores: data.output_score,
                        input_image: data.input_image,
                        annotations: data.annotations,
                        raw,
                    });
                }

                if envelope.error.is_some() {
                    // Terminal provider failure, not worth further polling.
                    warn!(session_id, attempt, body = %body, "provider reported analysis error");
                    return Err(ClassifiedError::from_signal(&raw)
                        .or_kind(ErrorKind::AnalysisFailed));
                }

                // success=false with no error payload: still processing.
                debug!(session_id, attempt, max_attempts, "analysis still processing");
            } else if status == StatusCode::BAD_REQUEST {
                // Validation failures (e.g. no face detected) are permanent.
                let body = response.text().await.unwrap_or_default();
                warn!(session_id, body = %body, "provider rejected the image");
                return Err(classify_response(status, &body).or_kind(ErrorKind::AnalysisFailed));
            } else {
                let body = response.text().await.unwrap_or_default();
                info!(
                    session_id,
                    attempt,
                    max_attempts,
                    status = status.as_u16(),
                    body = %body,
                    "analysis not ready"
                );
            }

            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        warn!(
            session_id,
            attempts = max_attempts,
            "analysis polling exhausted"
        );
        Err(ClassifiedError::from_kind(ErrorKind::Timeout).with_raw(format!(
            "no result after {max_attempts} poll attempts ({}ms apart)",
            self.config.poll_interval_ms
        )))
    }
}

/// Classify a transport-level failure (connect, timeout, protocol).
fn transport_error(err: reqwest::Error) -> ClassifiedError {
    let kind = if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_connect() {
        ErrorKind::NetworkError
    } else {
        match classify::classify_text(&err.to_string()) {
            ErrorKind::Unknown => ErrorKind::NetworkError,
            kind => kind,
        }
    };
    ClassifiedError::from_kind(kind).with_raw(err.to_string())
}

/// Classify a non-2xx response. Unambiguous status codes short-circuit;
/// anything else goes through the payload/text classifier.
fn classify_response(status: StatusCode, body: &str) -> ClassifiedError {
    let kind = match status.as_u16() {
        401 | 403 => ErrorKind::ProviderAuthError,
        429 => ErrorKind::RateLimited,
        500..=599 => ErrorKind::ProviderServerError,
        _ => match serde_json::from_str::<Value>(body) {
            Ok(payload) => classify::classify_payload(&payload),
            Err(_) => classify::classify_text(body),
        },
    };
    ClassifiedError::from_kind(kind).with_raw(format!("HTTP {status}: {body}"))
}

impl std::fmt::Debug for VisionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionClient")
            .field("base_url", &self.config.base_url)
            .field("client_id", &self.client_id.as_ref().map(|_| "***"))
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> VisionProviderConfig {
        VisionProviderConfig {
            base_url: "https://api.vendor.example/v1".into(),
            ..VisionProviderConfig::default()
        }
    }

    #[test]
    fn new_rejects_missing_base_url() {
        let err = VisionClient::new(VisionProviderConfig::default()).unwrap_err();
        assert!(matches!(err, LumiscanError::ConfigInvalid { .. }));
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let mut config = test_config();
        config.base_url = "https://api.vendor.example/v1/".into();
        let client = VisionClient::new(config).unwrap();
        assert_eq!(client.endpoint("image"), "https://api.vendor.example/v1/image");
        assert_eq!(
            client.endpoint("analysis"),
            "https://api.vendor.example/v1/analysis"
        );
    }

    #[test]
    fn explicit_credentials_win() {
        let client =
            VisionClient::with_credentials(test_config(), "cid-1", "key-1").unwrap();
        let (client_id, api_key) = client.credentials().unwrap();
        assert_eq!(client_id, "cid-1");
        assert_eq!(api_key, "key-1");
    }

    #[test]
    fn missing_env_credentials_classify_as_auth_error() {
        let mut config = test_config();
        config.client_id_env = "LUMISCAN_TEST_MISSING_CLIENT_ID_94121".into();
        config.api_key_env = "LUMISCAN_TEST_MISSING_API_KEY_94121".into();
        let client = VisionClient::new(config).unwrap();
        let err = client.credentials().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderAuthError);
        assert!(!err.retryable());
        assert!(err.detail().contains("LUMISCAN_TEST_MISSING_CLIENT_ID_94121"));
    }

    #[test]
    fn env_credentials_resolve() {
        let mut config = test_config();
        config.client_id_env = "LUMISCAN_TEST_CLIENT_ID_70233".into();
        config.api_key_env = "LUMISCAN_TEST_API_KEY_70233".into();
        unsafe {
            std::env::set_var("LUMISCAN_TEST_CLIENT_ID_70233", "cid-env");
            std::env::set_var("LUMISCAN_TEST_API_KEY_70233", "key-env");
        }
        let client = VisionClient::new(config).unwrap();
        let (client_id, api_key) = client.credentials().unwrap();
        assert_eq!(client_id, "cid-env");
        assert_eq!(api_key, "key-env");
        unsafe {
            std::env::remove_var("LUMISCAN_TEST_CLIENT_ID_70233");
            std::env::remove_var("LUMISCAN_TEST_API_KEY_70233");
        }
    }

    #[test]
    fn debug_masks_credentials() {
        let client =
            VisionClient::with_credentials(test_config(), "cid-secret", "key-secret").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("cid-secret"));
        assert!(!debug.contains("key-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn first_call_starts_unset() {
        let client = VisionClient::with_credentials(test_config(), "c", "k").unwrap();
        assert!(client.first_call_at().is_none());
        client.note_call();
        let first = client.first_call_at().unwrap();
        client.note_call();
        // A later call does not move the first-call timestamp.
        assert_eq!(client.first_call_at().unwrap(), first);
    }

    #[test]
    fn classify_response_status_shortcuts() {
        assert_eq!(
            classify_response(StatusCode::UNAUTHORIZED, "nope").kind(),
            ErrorKind::ProviderAuthError
        );
        assert_eq!(
            classify_response(StatusCode::TOO_MANY_REQUESTS, "slow down").kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(
            classify_response(StatusCode::BAD_GATEWAY, "bad gateway").kind(),
            ErrorKind::ProviderServerError
        );
    }

    #[test]
    fn classify_response_payload_path() {
        let err = classify_response(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"message": "Face not detected"}}"#,
        );
        assert_eq!(err.kind(), ErrorKind::FaceNotDetected);
        assert!(err.detail().contains("HTTP 400"));
    }
}
