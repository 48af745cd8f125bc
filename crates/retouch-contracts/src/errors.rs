use thiserror::Error;

/// Every failure an edit-producing operation can surface to the user.
///
/// Precondition variants (`InsufficientInput`, `InvalidInput`, `Busy`) are
/// raised before any remote call is made. The remote-classification
/// variants (`Blocked`, `GenerationStopped`, `NoImageReturned`) are never
/// retried by this layer.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("failed to encode image: {0}")]
    Encoding(String),

    #[error("failed to decode image data: {0}")]
    Decoding(String),

    #[error("request was blocked: {reason}{}", message_suffix(.message))]
    Blocked {
        reason: String,
        message: Option<String>,
    },

    #[error("image generation stopped unexpectedly: {reason}")]
    GenerationStopped { reason: String },

    #[error("the model did not return an image{}", text_hint(.text))]
    NoImageReturned { text: Option<String> },

    #[error("{0}")]
    InsufficientInput(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("archive export failed: {0}")]
    Archive(String),

    #[error("remote request failed: {0}")]
    Transport(String),

    #[error("another edit is still in progress")]
    Busy,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing failed: {0}")]
    Image(String),
}

impl EditError {
    /// True for failures detected before any network cost was incurred.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InsufficientInput(_) | Self::InvalidInput(_) | Self::Busy
        )
    }
}

fn message_suffix(message: &Option<String>) -> String {
    match message.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => format!(" ({text})"),
        _ => String::new(),
    }
}

fn text_hint(text: &Option<String>) -> String {
    match text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => {
            format!(". The model responded: \"{text}\". Try rephrasing the prompt.")
        }
        _ => ". Try rephrasing the prompt.".to_string(),
    }
}
