use std::env;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DRYRUN_MODEL: &str = "dryrun-image-1";

/// Where and how the gateway reaches the image model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Reads `GEMINI_API_BASE`, `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) and
    /// `RETOUCH_IMAGE_MODEL`, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY")),
            model: non_empty_env("RETOUCH_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
        {
            self.model = model;
        }
        self
    }

    pub fn is_dryrun(&self) -> bool {
        self.model.trim().to_ascii_lowercase().starts_with("dryrun")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
