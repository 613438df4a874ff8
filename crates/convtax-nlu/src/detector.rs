//! The intent-recognition seam.

use async_trait::async_trait;

use crate::audio::AudioSettings;
use crate::error::NluError;
use crate::response::DetectIntentResponse;

/// Detects intents in user input.
///
/// The user id doubles as the dialog session, so the service can carry
/// conversational context from one query to the next.
#[async_trait]
pub trait IntentDetector: Send + Sync {
    /// Detect the intent of a text query.
    async fn detect_text_intent(
        &self,
        text: &str,
        user_id: &str,
    ) -> Result<DetectIntentResponse, NluError>;

    /// Detect the intent of a base64-encoded recording.
    async fn detect_audio_intent(
        &self,
        settings: AudioSettings,
        base64_audio: &str,
        user_id: &str,
    ) -> Result<DetectIntentResponse, NluError>;

    /// Name of this detector for logging.
    fn name(&self) -> &str;
}
