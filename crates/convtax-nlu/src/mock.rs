//! Scripted intent detector for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::audio::AudioSettings;
use crate::detector::IntentDetector;
use crate::error::NluError;
use crate::response::DetectIntentResponse;

/// One call received by a [`ScriptedDetector`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetectCall {
    Text {
        text: String,
        user_id: String,
    },
    Audio {
        settings: AudioSettings,
        base64_audio: String,
        user_id: String,
    },
}

/// Answers detect calls from a queue of prepared responses and records every
/// call it receives. An empty queue yields [`NluError::Exhausted`].
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    responses: Mutex<VecDeque<Result<DetectIntentResponse, NluError>>>,
    calls: Mutex<Vec<DetectCall>>,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detector that answers with the given responses in order.
    pub fn with_responses(responses: impl IntoIterator<Item = DetectIntentResponse>) -> Self {
        let detector = Self::new();
        for response in responses {
            detector.push(response);
        }
        detector
    }

    pub fn push(&self, response: DetectIntentResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(response));
        }
    }

    /// Queue a failure for the next call.
    pub fn push_error(&self, error: NluError) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(error));
        }
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<DetectCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn answer(&self, call: DetectCall, label: &str) -> Result<DetectIntentResponse, NluError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        self.responses
            .lock()
            .map_err(|e| NluError::Request(e.to_string()))?
            .pop_front()
            .unwrap_or_else(|| Err(NluError::Exhausted(label.to_string())))
    }
}

#[async_trait]
impl IntentDetector for ScriptedDetector {
    async fn detect_text_intent(
        &self,
        text: &str,
        user_id: &str,
    ) -> Result<DetectIntentResponse, NluError> {
        self.answer(
            DetectCall::Text {
                text: text.to_string(),
                user_id: user_id.to_string(),
            },
            text,
        )
    }

    async fn detect_audio_intent(
        &self,
        settings: AudioSettings,
        base64_audio: &str,
        user_id: &str,
    ) -> Result<DetectIntentResponse, NluError> {
        self.answer(
            DetectCall::Audio {
                settings,
                base64_audio: base64_audio.to_string(),
                user_id: user_id.to_string(),
            },
            "<audio>",
        )
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
