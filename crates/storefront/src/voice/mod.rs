//! Voice commands: a recorded clip in, a price check or add-to-cart out.
//!
//! The classifier only turns audio into a [`VoiceCommand`]. Matching the
//! product and acting on it is the controller's job.

mod gemini;

pub use gemini::GeminiClassifier;

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel product name some classifier backends return when no API key
/// is configured.
pub const MISSING_KEY_SENTINEL: &str = "MISSING_KEY";
/// Sentinel product name for a rejected API key.
pub const INVALID_KEY_SENTINEL: &str = "INVALID_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoiceIntent {
    CheckPrice,
    AddToCart,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCommand {
    pub intent: VoiceIntent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

impl VoiceCommand {
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            intent: VoiceIntent::Unknown,
            product_name: None,
            quantity: None,
        }
    }
}

/// A recorded utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceClip {
    pub audio: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    #[error("voice API key is not configured")]
    MissingKey,
    #[error("voice API key was rejected")]
    InvalidKey,
    #[error("voice service error: {0}")]
    Service(String),
}

/// Speech-to-intent service.
pub trait VoiceClassifier: Send + Sync {
    /// Classify a clip against the current product names.
    ///
    /// `hint` is the intent the clerk picked (price button or cart button),
    /// if any.
    fn classify(
        &self,
        clip: &VoiceClip,
        product_names: &[String],
        hint: Option<VoiceIntent>,
    ) -> impl Future<Output = Result<VoiceCommand, VoiceError>> + Send;
}

/// Normalise a raw classifier answer.
///
/// Sentinel product names become typed errors, and an `Unknown` intent with
/// a product name falls back to the hinted intent.
///
/// # Errors
///
/// Returns `VoiceError::MissingKey` or `VoiceError::InvalidKey` for the
/// sentinel product names.
pub fn finalize(
    mut command: VoiceCommand,
    hint: Option<VoiceIntent>,
) -> Result<VoiceCommand, VoiceError> {
    match command.product_name.as_deref() {
        Some(MISSING_KEY_SENTINEL) => return Err(VoiceError::MissingKey),
        Some(INVALID_KEY_SENTINEL) => return Err(VoiceError::InvalidKey),
        _ => {}
    }
    if command.intent == VoiceIntent::Unknown
        && command.product_name.is_some()
        && let Some(hint) = hint
    {
        command.intent = hint;
    }
    Ok(command)
}

/// Classifier that replays canned answers in order, then `Unknown`.
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    answers: std::sync::Mutex<std::collections::VecDeque<Result<VoiceCommand, VoiceError>>>,
}

impl ScriptedClassifier {
    #[must_use]
    pub fn new(answers: impl IntoIterator<Item = Result<VoiceCommand, VoiceError>>) -> Self {
        Self {
            answers: std::sync::Mutex::new(answers.into_iter().collect()),
        }
    }
}

impl VoiceClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        _clip: &VoiceClip,
        _product_names: &[String],
        hint: Option<VoiceIntent>,
    ) -> Result<VoiceCommand, VoiceError> {
        let next = self
            .answers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        finalize(next.unwrap_or_else(|| Ok(VoiceCommand::unknown()))?, hint)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn command(intent: VoiceIntent, name: Option<&str>) -> VoiceCommand {
        VoiceCommand {
            intent,
            product_name: name.map(str::to_string),
            quantity: None,
        }
    }

    #[test]
    fn test_sentinels_become_errors() {
        assert_eq!(
            finalize(command(VoiceIntent::Unknown, Some("MISSING_KEY")), None),
            Err(VoiceError::MissingKey)
        );
        assert_eq!(
            finalize(command(VoiceIntent::Unknown, Some("INVALID_KEY")), None),
            Err(VoiceError::InvalidKey)
        );
    }

    #[test]
    fn test_hint_fills_unknown_intent() {
        let result = finalize(
            command(VoiceIntent::Unknown, Some("Sữa Tươi Vinamilk 1L")),
            Some(VoiceIntent::AddToCart),
        )
        .unwrap();
        assert_eq!(result.intent, VoiceIntent::AddToCart);

        // no product name, nothing to act on
        let result = finalize(command(VoiceIntent::Unknown, None), Some(VoiceIntent::CheckPrice)).unwrap();
        assert_eq!(result.intent, VoiceIntent::Unknown);
    }

    #[test]
    fn test_wire_shape() {
        let parsed: VoiceCommand = serde_json::from_str(
            r#"{"intent":"ADD_TO_CART","productName":"Mì Hảo Hảo Tôm Chua Cay","quantity":3}"#,
        )
        .unwrap();
        assert_eq!(parsed.intent, VoiceIntent::AddToCart);
        assert_eq!(parsed.quantity, Some(3));

        let parsed: VoiceCommand = serde_json::from_str(r#"{"intent":"SOMETHING_ELSE"}"#).unwrap();
        assert_eq!(parsed, VoiceCommand::unknown());
    }
}
