//! Dialogflow v2 REST client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use convtax_core::config::NluConfig;

use crate::audio::AudioSettings;
use crate::detector::IntentDetector;
use crate::error::NluError;
use crate::response::DetectIntentResponse;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentRequest<'a> {
    query_input: QueryInput<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryInput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextInput<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_config: Option<AudioConfig<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextInput<'a> {
    text: &'a str,
    language_code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: &'a str,
}

/// Calls `detectIntent` on a Dialogflow agent, one session per user.
#[derive(Clone)]
pub struct DialogflowClient {
    http: reqwest::Client,
    endpoint: reqwest::Url,
    project_id: String,
    language_code: String,
    access_token: String,
}

impl DialogflowClient {
    pub fn new(config: &NluConfig) -> Result<Self, NluError> {
        if config.project_id.trim().is_empty() {
            return Err(NluError::Config("project_id must not be empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| NluError::Config(e.to_string()))?;
        let endpoint = reqwest::Url::parse(config.endpoint.trim_end_matches('/'))
            .map_err(|e| NluError::Config(format!("invalid endpoint '{}': {}", config.endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(NluError::Config(format!(
                "endpoint '{}' cannot carry a path",
                config.endpoint
            )));
        }

        Ok(Self {
            http,
            endpoint,
            project_id: config.project_id.clone(),
            language_code: config.language_code.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// Replace the bearer token, e.g. from the environment.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }

    /// Session URL for a user. Ids and project are pushed as single path
    /// segments, so `/`, `?` and `#` are percent-encoded rather than
    /// changing the resource.
    fn session_url(&self, user_id: &str) -> Result<reqwest::Url, NluError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| NluError::Config("endpoint cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["v2", "projects", self.project_id.as_str(), "agent", "sessions"])
            .push(&format!("{}:detectIntent", user_id));
        Ok(url)
    }

    async fn detect(
        &self,
        user_id: &str,
        request: &DetectIntentRequest<'_>,
    ) -> Result<DetectIntentResponse, NluError> {
        let url = self.session_url(user_id)?;
        debug!(user_id = %user_id, "Sending detectIntent request");

        let mut builder = self.http.post(url).json(request);
        if !self.access_token.is_empty() {
            builder = builder.bearer_auth(&self.access_token);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "detectIntent rejected");
            return Err(NluError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DetectIntentResponse = response.json().await?;
        debug!(
            intent = parsed.intent_name().unwrap_or("-"),
            action = parsed.action().unwrap_or("-"),
            "detectIntent answered"
        );
        Ok(parsed)
    }
}

impl std::fmt::Debug for DialogflowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogflowClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("project_id", &self.project_id)
            .field("language_code", &self.language_code)
            .finish()
    }
}

#[async_trait]
impl IntentDetector for DialogflowClient {
    async fn detect_text_intent(
        &self,
        text: &str,
        user_id: &str,
    ) -> Result<DetectIntentResponse, NluError> {
        let request = DetectIntentRequest {
            query_input: QueryInput {
                text: Some(TextInput {
                    text,
                    language_code: &self.language_code,
                }),
                audio_config: None,
            },
            input_audio: None,
        };
        self.detect(user_id, &request).await
    }

    async fn detect_audio_intent(
        &self,
        settings: AudioSettings,
        base64_audio: &str,
        user_id: &str,
    ) -> Result<DetectIntentResponse, NluError> {
        let request = DetectIntentRequest {
            query_input: QueryInput {
                text: None,
                audio_config: Some(AudioConfig {
                    audio_encoding: settings.encoding.as_str(),
                    sample_rate_hertz: settings.sample_rate_hertz,
                    language_code: &self.language_code,
                }),
            },
            input_audio: Some(base64_audio),
        };
        self.detect(user_id, &request).await
    }

    fn name(&self) -> &str {
        "dialogflow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convtax_core::types::Platform;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> NluConfig {
        NluConfig {
            endpoint: server.uri(),
            project_id: "test-project".to_string(),
            language_code: "de".to_string(),
            access_token: "secret".to_string(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_detect_text_intent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/projects/test-project/agent/sessions/user-1:detectIntent"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({
                "queryInput": { "text": { "text": "Hallo", "languageCode": "de" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responseId": "r-1",
                "queryResult": {
                    "queryText": "Hallo",
                    "fulfillmentText": "Hallo! Wie kann ich helfen?",
                    "intent": { "name": "projects/test-project/agent/intents/w", "displayName": "welcome" }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = DialogflowClient::new(&config_for(&server)).unwrap();
        let response = client.detect_text_intent("Hallo", "user-1").await.unwrap();

        assert_eq!(response.query_text(), "Hallo");
        assert_eq!(response.fulfillment_text(), "Hallo! Wie kann ich helfen?");
        assert_eq!(response.intent_display_name(), Some("welcome"));
    }

    #[tokio::test]
    async fn test_detect_audio_intent_sends_audio_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/projects/test-project/agent/sessions/user-2:detectIntent"))
            .and(body_json(json!({
                "queryInput": {
                    "audioConfig": {
                        "audioEncoding": "AUDIO_ENCODING_AMR_WB",
                        "sampleRateHertz": 16000,
                        "languageCode": "de"
                    }
                },
                "inputAudio": "AAEC"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "queryResult": { "queryText": "neuer Vertrag" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = DialogflowClient::new(&config_for(&server)).unwrap();
        let settings = AudioSettings::for_platform(Platform::Android);
        let response = client
            .detect_audio_intent(settings, "AAEC", "user-2")
            .await
            .unwrap();
        assert_eq!(response.query_text(), "neuer Vertrag");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let client = DialogflowClient::new(&config_for(&server)).unwrap();
        let err = client.detect_text_intent("Hallo", "u").await.unwrap_err();
        match err {
            NluError::Status { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "denied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_auth_header_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.access_token.clear();
        let client = DialogflowClient::new(&config).unwrap();
        client.detect_text_intent("x", "u").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0]
            .headers
            .keys()
            .all(|name| name.as_str() != "authorization"));
    }

    #[test]
    fn test_empty_project_rejected() {
        let config = NluConfig {
            project_id: " ".to_string(),
            ..NluConfig::default()
        };
        assert!(matches!(
            DialogflowClient::new(&config),
            Err(NluError::Config(_))
        ));
    }

    #[test]
    fn test_session_url_trims_trailing_slash() {
        let config = NluConfig {
            endpoint: "https://example.test/".to_string(),
            ..NluConfig::default()
        };
        let client = DialogflowClient::new(&config).unwrap();
        assert_eq!(
            client.session_url("abc").unwrap().as_str(),
            "https://example.test/v2/projects/test-c7ec0/agent/sessions/abc:detectIntent"
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = NluConfig {
            endpoint: "not a url".to_string(),
            ..NluConfig::default()
        };
        assert!(matches!(
            DialogflowClient::new(&config),
            Err(NluError::Config(_))
        ));
    }

    #[test]
    fn test_session_url_encodes_reserved_characters() {
        let config = NluConfig {
            endpoint: "https://example.test".to_string(),
            ..NluConfig::default()
        };
        let client = DialogflowClient::new(&config).unwrap();

        let url = client.session_url("../../other/agent/sessions/x").unwrap();
        assert_eq!(
            url.path(),
            "/v2/projects/test-c7ec0/agent/sessions/..%2F..%2Fother%2Fagent%2Fsessions%2Fx:detectIntent"
        );

        let url = client.session_url("u#1?a=b").unwrap();
        assert!(url.path().ends_with("/sessions/u%231%3Fa=b:detectIntent"));
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[tokio::test]
    async fn test_user_id_cannot_escape_session_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = DialogflowClient::new(&config_for(&server)).unwrap();
        client
            .detect_text_intent("x", "../../other-project/agent/sessions/x")
            .await
            .unwrap();
        client.detect_text_intent("x", "u#1").await.unwrap();

        let prefix = "/v2/projects/test-project/agent/sessions/";
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            let path = request.url.path();
            assert!(path.starts_with(prefix), "escaped session path: {path}");
            assert!(path.ends_with(":detectIntent"), "truncated path: {path}");
            assert!(!path[prefix.len()..].contains('/'));
        }
    }

    #[test]
    fn test_access_token_override() {
        let client = DialogflowClient::new(&NluConfig::default())
            .unwrap()
            .with_access_token("from-env");
        assert_eq!(client.access_token, "from-env");
    }
}
