//! Detect-intent response shapes.
//!
//! Every field Dialogflow may omit is an `Option` here; accessors resolve the
//! defaults once so callers never probe raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameter holding the contract a date edit refers to.
pub const PARAM_CONTRACT: &str = "EmploymentContract";
/// Parameter wrapping the start date variants.
pub const PARAM_START_DATE: &str = "StartDate";
/// Start date given as an exact date.
pub const PARAM_START_DATE_AS_DATE: &str = "StartDateAsDate";
/// Start date given as a free-text phrase.
pub const PARAM_START_DATE_AS_STRING: &str = "StartDateAsString";

/// Top-level detect-intent response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectIntentResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_result: Option<QueryResult>,
}

/// Result of matching one query against the agent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_required_params_present: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// The matched intent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

impl DetectIntentResponse {
    /// Response for a recognized intent. Used by tests and the scripted detector.
    pub fn recognized(
        query_text: &str,
        intent_name: &str,
        display_name: &str,
        fulfillment_text: &str,
    ) -> Self {
        Self {
            response_id: None,
            query_result: Some(QueryResult {
                query_text: Some(query_text.to_string()),
                parameters: Some(Map::new()),
                all_required_params_present: Some(true),
                fulfillment_text: Some(fulfillment_text.to_string()),
                intent: Some(Intent {
                    name: Some(intent_name.to_string()),
                    display_name: Some(display_name.to_string()),
                }),
                action: None,
            }),
        }
    }

    /// Replace the parameters. Non-object values clear them.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        let result = self.query_result.get_or_insert_with(QueryResult::default);
        result.parameters = match parameters {
            Value::Object(map) => Some(map),
            _ => None,
        };
        self
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.query_result
            .get_or_insert_with(QueryResult::default)
            .action = Some(action.to_string());
        self
    }

    pub fn with_all_required_params_present(mut self, present: bool) -> Self {
        self.query_result
            .get_or_insert_with(QueryResult::default)
            .all_required_params_present = Some(present);
        self
    }

    /// Recognized query text, empty when absent.
    pub fn query_text(&self) -> &str {
        self.query_result
            .as_ref()
            .and_then(|r| r.query_text.as_deref())
            .unwrap_or("")
    }

    /// Fulfillment text generated by the agent, empty when absent.
    pub fn fulfillment_text(&self) -> &str {
        self.query_result
            .as_ref()
            .and_then(|r| r.fulfillment_text.as_deref())
            .unwrap_or("")
    }

    pub fn intent_name(&self) -> Option<&str> {
        self.intent().and_then(|i| non_empty(i.name.as_ref()))
    }

    pub fn intent_display_name(&self) -> Option<&str> {
        self.intent().and_then(|i| non_empty(i.display_name.as_ref()))
    }

    /// Action label attached to the intent, `None` when absent or empty.
    pub fn action(&self) -> Option<&str> {
        self.query_result
            .as_ref()
            .and_then(|r| non_empty(r.action.as_ref()))
    }

    /// Whether the agent collected every required parameter. Absent means no.
    pub fn all_required_params_present(&self) -> bool {
        self.query_result
            .as_ref()
            .and_then(|r| r.all_required_params_present)
            .unwrap_or(false)
    }

    /// Recognized parameters, `None` when the response carried none.
    pub fn parameters(&self) -> Option<QueryParameters<'_>> {
        self.query_result
            .as_ref()
            .and_then(|r| r.parameters.as_ref())
            .map(QueryParameters)
    }

    fn intent(&self) -> Option<&Intent> {
        self.query_result.as_ref().and_then(|r| r.intent.as_ref())
    }
}

/// Either variant of the start date parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartDateParam {
    /// Raw date value, RFC 3339 or `YYYY-MM-DD`.
    Exact(String),
    /// Free-text phrase such as "Anfang Mai".
    Phrase(String),
}

/// Read-only view over recognized parameters.
#[derive(Clone, Copy, Debug)]
pub struct QueryParameters<'a>(pub &'a Map<String, Value>);

impl<'a> QueryParameters<'a> {
    /// Non-empty string parameter.
    pub fn text(&self, key: &str) -> Option<&'a str> {
        text_in(self.0, key)
    }

    /// Start date, looked up inside the `StartDate` object first and then at
    /// the top level. The exact date wins if both are present.
    pub fn start_date(&self) -> Option<StartDateParam> {
        let scope = match self.0.get(PARAM_START_DATE) {
            Some(Value::Object(inner)) => inner,
            _ => self.0,
        };
        if let Some(date) = text_in(scope, PARAM_START_DATE_AS_DATE) {
            return Some(StartDateParam::Exact(date.to_string()));
        }
        text_in(scope, PARAM_START_DATE_AS_STRING)
            .map(|phrase| StartDateParam::Phrase(phrase.to_string()))
    }

    /// Parameters serialized as compact JSON.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

fn text_in<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_full_response() {
        let raw = json!({
            "responseId": "r-1",
            "queryResult": {
                "queryText": "Mein Vertrag beginnt am 1. März",
                "parameters": {
                    "EmploymentContract": "c-1",
                    "StartDate": { "StartDateAsDate": "2019-03-01T12:00:00+01:00" }
                },
                "allRequiredParamsPresent": true,
                "fulfillmentText": "Alles klar.",
                "intent": {
                    "name": "projects/p/agent/intents/start",
                    "displayName": "contract.start"
                },
                "action": "contract.edit",
                "intentDetectionConfidence": 0.93,
                "languageCode": "de"
            }
        });
        let response: DetectIntentResponse = serde_json::from_value(raw).unwrap();

        assert_eq!(response.query_text(), "Mein Vertrag beginnt am 1. März");
        assert_eq!(response.fulfillment_text(), "Alles klar.");
        assert_eq!(response.intent_name(), Some("projects/p/agent/intents/start"));
        assert_eq!(response.intent_display_name(), Some("contract.start"));
        assert_eq!(response.action(), Some("contract.edit"));
        assert!(response.all_required_params_present());

        let params = response.parameters().unwrap();
        assert_eq!(params.text(PARAM_CONTRACT), Some("c-1"));
        assert_eq!(
            params.start_date(),
            Some(StartDateParam::Exact("2019-03-01T12:00:00+01:00".to_string()))
        );
    }

    #[test]
    fn test_empty_response_defaults() {
        let response: DetectIntentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.query_text(), "");
        assert_eq!(response.fulfillment_text(), "");
        assert!(response.intent_name().is_none());
        assert!(response.action().is_none());
        assert!(response.parameters().is_none());
        assert!(!response.all_required_params_present());
    }

    #[test]
    fn test_empty_strings_treated_as_absent() {
        let raw = json!({
            "queryResult": {
                "intent": { "name": "", "displayName": "" },
                "action": ""
            }
        });
        let response: DetectIntentResponse = serde_json::from_value(raw).unwrap();
        assert!(response.intent_name().is_none());
        assert!(response.intent_display_name().is_none());
        assert!(response.action().is_none());
    }

    #[test]
    fn test_start_date_phrase() {
        let response = DetectIntentResponse::recognized("q", "i", "d", "f").with_parameters(
            json!({ "StartDate": { "StartDateAsString": "Anfang Mai" }, "EmploymentContract": "c" }),
        );
        assert_eq!(
            response.parameters().unwrap().start_date(),
            Some(StartDateParam::Phrase("Anfang Mai".to_string()))
        );
    }

    #[test]
    fn test_start_date_top_level_and_empty() {
        let response = DetectIntentResponse::recognized("q", "i", "d", "f")
            .with_parameters(json!({ "StartDateAsString": "", "StartDateAsDate": "2020-01-01" }));
        assert_eq!(
            response.parameters().unwrap().start_date(),
            Some(StartDateParam::Exact("2020-01-01".to_string()))
        );

        let response = DetectIntentResponse::recognized("q", "i", "d", "f")
            .with_parameters(json!({ "StartDate": "" }));
        assert!(response.parameters().unwrap().start_date().is_none());
    }

    #[test]
    fn test_builder_helpers() {
        let response = DetectIntentResponse::recognized("q", "i", "d", "f")
            .with_action("a")
            .with_all_required_params_present(false);
        assert_eq!(response.action(), Some("a"));
        assert!(!response.all_required_params_present());
        assert_eq!(response.parameters().unwrap().to_json_string(), "{}");
    }
}
