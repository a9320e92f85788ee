//! Gemini `generateContent` client for voice commands.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use super::{VoiceClassifier, VoiceClip, VoiceCommand, VoiceError, VoiceIntent, finalize};
use crate::config::VoiceConfig;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini-backed classifier. Cheap to clone.
#[derive(Clone)]
pub struct GeminiClassifier {
    inner: Arc<GeminiInner>,
}

struct GeminiInner {
    client: reqwest::Client,
    model: String,
    api_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl GeminiClassifier {
    #[must_use]
    pub fn new(config: &VoiceConfig) -> Self {
        Self {
            inner: Arc::new(GeminiInner {
                client: reqwest::Client::new(),
                model: config.model.clone(),
                api_key: config.api_key.clone(),
            }),
        }
    }

    fn endpoint(&self) -> String {
        format!("{API_BASE}/{}:generateContent", self.inner.model)
    }
}

/// Instruction text for the model, in the shop's language.
fn prompt(product_names: &[String], hint: Option<VoiceIntent>) -> String {
    let task = match hint {
        Some(VoiceIntent::CheckPrice) => {
            "Nhiệm vụ:\n\
             1. Người dùng ĐANG MUỐN TRA CỨU GIÁ. Intent bắt buộc là \"CHECK_PRICE\".\n\
             2. Tìm tên sản phẩm trong danh sách khớp nhất với câu nói."
        }
        Some(VoiceIntent::AddToCart) => {
            "Nhiệm vụ:\n\
             1. Người dùng ĐANG MUỐN MUA HÀNG/THÊM VÀO GIỎ. Intent bắt buộc là \"ADD_TO_CART\".\n\
             2. Tìm tên sản phẩm trong danh sách khớp nhất với câu nói.\n\
             3. Xác định số lượng (mặc định là 1 nếu không nói rõ)."
        }
        Some(VoiceIntent::Unknown) | None => {
            "Nhiệm vụ:\n\
             1. Xác định ý định: \"CHECK_PRICE\" (hỏi giá) hoặc \"ADD_TO_CART\" (mua/thêm).\n\
             2. Tìm tên sản phẩm trong danh sách khớp nhất.\n\
             3. Xác định số lượng nếu có."
        }
    };
    format!(
        "Bạn là trợ lý bán hàng.\nDanh sách sản phẩm: [{}]\n\n{task}",
        product_names.join(", ")
    )
}

fn request_body(clip: &VoiceClip, product_names: &[String], hint: Option<VoiceIntent>) -> Value {
    json!({
        "contents": [{
            "parts": [
                { "inlineData": { "mimeType": clip.mime_type, "data": STANDARD.encode(&clip.audio) } },
                { "text": prompt(product_names, hint) },
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "intent": {
                        "type": "STRING",
                        "enum": ["CHECK_PRICE", "ADD_TO_CART", "UNKNOWN"],
                    },
                    "productName": {
                        "type": "STRING",
                        "description": "Tên sản phẩm chính xác từ danh sách được cung cấp",
                    },
                    "quantity": {
                        "type": "INTEGER",
                        "description": "Số lượng sản phẩm (chỉ dùng khi mua hàng)",
                    },
                },
                "required": ["intent"],
            },
        },
    })
}

/// Pull the command out of a response. Empty or unreadable answers are
/// treated as not understood.
fn parse_answer(response: GenerateResponse) -> VoiceCommand {
    let text = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text);
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return VoiceCommand::unknown();
    };
    serde_json::from_str(&text).unwrap_or_else(|e| {
        warn!(error = %e, "unreadable voice classifier answer");
        VoiceCommand::unknown()
    })
}

fn error_from_response(status: u16, body: &str) -> VoiceError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());
    if status == 401 || status == 403 || message.contains("API key not valid") {
        VoiceError::InvalidKey
    } else {
        VoiceError::Service(format!("HTTP {status}: {message}"))
    }
}

impl VoiceClassifier for GeminiClassifier {
    #[instrument(skip(self, clip, product_names), fields(model = %self.inner.model, bytes = clip.audio.len()))]
    async fn classify(
        &self,
        clip: &VoiceClip,
        product_names: &[String],
        hint: Option<VoiceIntent>,
    ) -> Result<VoiceCommand, VoiceError> {
        let response = self
            .inner
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.inner.api_key.expose_secret())
            .json(&request_body(clip, product_names, hint))
            .send()
            .await
            .map_err(|e| VoiceError::Service(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VoiceError::Service(e.to_string()))?;
        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &body));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| VoiceError::Service(e.to_string()))?;
        let command = parse_answer(parsed);
        debug!(intent = ?command.intent, product = ?command.product_name, "voice command classified");
        finalize(command, hint)
    }
}
