//! Platform-specific audio settings for audio intent detection.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use convtax_core::types::Platform;

/// Audio encodings understood by Dialogflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioEncoding {
    #[serde(rename = "AUDIO_ENCODING_AMR_WB")]
    AmrWb,
    #[serde(rename = "AUDIO_ENCODING_LINEAR_16")]
    Linear16,
}

impl AudioEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::AmrWb => "AUDIO_ENCODING_AMR_WB",
            AudioEncoding::Linear16 => "AUDIO_ENCODING_LINEAR_16",
        }
    }
}

/// Encoding and sample rate of an uploaded recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioSettings {
    pub encoding: AudioEncoding,
    pub sample_rate_hertz: u32,
}

impl AudioSettings {
    /// Settings matching the recorder configuration of each client platform.
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Android => Self {
                encoding: AudioEncoding::AmrWb,
                sample_rate_hertz: 16_000,
            },
            Platform::Ios => Self {
                encoding: AudioEncoding::Linear16,
                sample_rate_hertz: 16_000,
            },
        }
    }
}

/// Base64 body of a recording as `inputAudio` expects it.
pub fn encode_audio(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
