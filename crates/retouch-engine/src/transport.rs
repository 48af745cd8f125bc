use std::io::Cursor;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::GatewayConfig;

/// Longest model text kept as a hint when no image comes back.
const FEEDBACK_MAX_CHARS: usize = 400;
const ERROR_BODY_MAX_CHARS: usize = 512;

/// Image part of a request or response, base64 payload included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(alias = "mime_type")]
    pub mime_type: String,
    pub data: String,
}

/// One instruction plus its input images, addressed to a model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateContentRequest {
    pub model: String,
    pub instruction: String,
    pub images: Vec<InlineData>,
    pub response_modalities: Vec<String>,
}

impl GenerateContentRequest {
    pub fn new(model: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            instruction: instruction.into(),
            images: Vec::new(),
            response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
        }
    }

    pub fn payload(&self) -> Value {
        let mut parts: Vec<Value> = self
            .images
            .iter()
            .map(|image| json!({ "inlineData": image }))
            .collect();
        parts.push(json!({ "text": self.instruction }));
        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "responseModalities": self.response_modalities },
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default, alias = "prompt_feedback")]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default, alias = "block_reason")]
    pub block_reason: Option<String>,
    #[serde(default, alias = "block_reason_message")]
    pub block_reason_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default, alias = "finish_reason")]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, alias = "inline_data")]
    pub inline_data: Option<InlineData>,
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    pub fn first_inline_image(&self) -> Option<&InlineData> {
        self.candidates
            .iter()
            .filter_map(|candidate| candidate.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.inline_data.as_ref())
            .find(|inline| !inline.data.trim().is_empty())
    }

    pub fn first_finish_reason(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.as_deref())
    }

    /// Top-level text, or the text parts of every candidate joined together.
    pub fn text_feedback(&self) -> Option<String> {
        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Some(clip(text, FEEDBACK_MAX_CHARS));
        }
        let joined = self
            .candidates
            .iter()
            .filter_map(|candidate| candidate.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect::<Vec<&str>>()
            .join(" ");
        (!joined.is_empty()).then(|| clip(&joined, FEEDBACK_MAX_CHARS))
    }
}

pub trait ImageEditTransport: Send + Sync {
    fn name(&self) -> &str;
    fn generate_content(&self, request: &GenerateContentRequest)
        -> Result<GenerateContentResponse>;
}

/// Calls the Gemini `generateContent` REST endpoint.
///
/// No timeout or retry is applied here: a request either settles or fails
/// with whatever the HTTP stack reports.
pub struct GeminiTransport {
    api_base: String,
    api_key: String,
    http: HttpClient,
}

impl GeminiTransport {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let Some(api_key) = config.api_key.clone() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }
}

impl ImageEditTransport for GeminiTransport {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let endpoint = generate_content_url(&self.api_base, &request.model);
        log::debug!(
            "POST {endpoint} with {} image part(s)",
            request.images.len()
        );
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request.payload())
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        read_generate_response(response)
    }
}

/// Offline transport: tints the first input image with a colour derived
/// from the instruction so every edit yields a distinct, valid PNG.
pub struct DryrunTransport;

impl ImageEditTransport for DryrunTransport {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let source = match request.images.first() {
            Some(inline) => {
                let bytes = BASE64
                    .decode(inline.data.as_bytes())
                    .context("dryrun input base64 decode failed")?;
                image::load_from_memory(&bytes)
                    .context("dryrun input is not a decodable image")?
                    .to_rgba8()
            }
            None => RgbaImage::from_pixel(256, 256, Rgba([128, 128, 128, 255])),
        };
        let (r, g, b) = color_from_instruction(&request.instruction);
        let mut tinted = source;
        for pixel in tinted.pixels_mut() {
            pixel.0[0] = blend_channel(pixel.0[0], r);
            pixel.0[1] = blend_channel(pixel.0[1], g);
            pixel.0[2] = blend_channel(pixel.0[2], b);
        }

        let mut encoded = Vec::new();
        DynamicImage::ImageRgba8(tinted)
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .context("dryrun output encode failed")?;

        Ok(GenerateContentResponse {
            prompt_feedback: None,
            candidates: vec![Candidate {
                finish_reason: Some("STOP".to_string()),
                content: Some(Content {
                    parts: vec![Part {
                        inline_data: Some(InlineData {
                            mime_type: "image/png".to_string(),
                            data: BASE64.encode(encoded),
                        }),
                        text: None,
                    }],
                }),
            }],
            text: None,
        })
    }
}

fn blend_channel(base: u8, tint: u8) -> u8 {
    ((base as u16 * 4 + tint as u16) / 5) as u8
}

fn color_from_instruction(instruction: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(instruction.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

/// `{base}/models/{model}:generateContent`; a `models/` prefix on the name
/// is accepted too.
fn generate_content_url(api_base: &str, model: &str) -> String {
    let model = model.trim();
    let model = model.strip_prefix("models/").unwrap_or(model);
    format!("{api_base}/models/{model}:generateContent")
}

fn read_generate_response(response: HttpResponse) -> Result<GenerateContentResponse> {
    let status = response.status();
    let body = response
        .text()
        .context("failed to read Gemini response body")?;
    if !status.is_success() {
        bail!(
            "Gemini returned HTTP {}: {}",
            status.as_u16(),
            api_error_message(&body)
        );
    }
    serde_json::from_str(&body).context("Gemini response did not match the expected shape")
}

/// Google API failures carry `{"error": {"status", "message"}}`; anything
/// else is reported as the raw body.
fn api_error_message(body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        let error = value.get("error")?;
        let message = error.get("message")?.as_str()?.trim().to_string();
        Some(match error.get("status").and_then(Value::as_str) {
            Some(status) => format!("{status}: {message}"),
            None => message,
        })
    });
    clip(detail.as_deref().unwrap_or(body.trim()), ERROR_BODY_MAX_CHARS)
}

/// One-line form of an error and its causes, `: `-joined like `{:#}`, with
/// repeated causes collapsed.
pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut causes: Vec<String> = err
        .chain()
        .map(|cause| cause.to_string().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();
    causes.dedup();
    clip(&causes.join(": "), max_chars)
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
