use anyhow::Result;
use retouch_contracts::assets::{extension_for_mime, ImageAsset};
use retouch_contracts::codec;
use retouch_contracts::hotspot::HotspotPoint;
use retouch_contracts::instructions::{EditInstruction, EditKind};
use retouch_contracts::style::FrameStyle;
use retouch_contracts::EditError;

use crate::config::GatewayConfig;
use crate::transport::{
    error_chain_text, DryrunTransport, GeminiTransport, GenerateContentRequest,
    GenerateContentResponse, ImageEditTransport, InlineData,
};

/// Stateless façade turning typed edit requests into model calls and model
/// responses back into images.
pub struct EditGateway {
    transport: Box<dyn ImageEditTransport>,
    model: String,
}

impl EditGateway {
    pub fn new<T: ImageEditTransport + 'static>(transport: T, model: impl Into<String>) -> Self {
        Self {
            transport: Box::new(transport),
            model: model.into(),
        }
    }

    /// Dryrun models get the offline transport; everything else goes to
    /// Gemini and needs an API key.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        if config.is_dryrun() {
            return Ok(Self::new(DryrunTransport, config.model.clone()));
        }
        Ok(Self::new(GeminiTransport::new(config)?, config.model.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    pub fn apply(
        &self,
        image: &ImageAsset,
        instruction: &EditInstruction,
    ) -> Result<ImageAsset, EditError> {
        match instruction {
            EditInstruction::Localized { prompt, hotspots } => {
                self.localized_edit(image, prompt, hotspots)
            }
            EditInstruction::Adjust { prompt } => self.adjust(image, prompt),
            EditInstruction::Filter { prompt } => self.filter(image, prompt),
            EditInstruction::Frame(frame) => self.frame(image, frame),
        }
    }

    pub fn localized_edit(
        &self,
        image: &ImageAsset,
        prompt: &str,
        hotspots: &[HotspotPoint],
    ) -> Result<ImageAsset, EditError> {
        if hotspots.is_empty() {
            return Err(EditError::InvalidInput(
                "select at least one point on the image to edit".to_string(),
            ));
        }
        let prompt = require_prompt(prompt, "describe the edit to make")?;
        let points = hotspots
            .iter()
            .map(|point| format!("(x: {}, y: {})", point.x, point.y))
            .collect::<Vec<String>>()
            .join(", ");
        let instruction = format!(
            "You are an expert photo editor. Perform a natural, localized edit on the provided \
             image.\nUser request: \"{prompt}\"\nEdit location(s), in image pixels: {points}.\n\
             Blend the edit seamlessly with its surroundings. Everything outside the edited \
             area must remain exactly identical to the original.\nReturn only the edited image."
        );
        self.send(EditKind::Localized, &[image], instruction, image)
    }

    pub fn adjust(&self, image: &ImageAsset, prompt: &str) -> Result<ImageAsset, EditError> {
        let prompt = require_prompt(prompt, "describe the adjustment to apply")?;
        let instruction = format!(
            "You are an expert photo editor. Apply a natural, global adjustment to the entire \
             image.\nUser request: \"{prompt}\"\nKeep the result photorealistic.\n\
             Return only the adjusted image."
        );
        self.send(EditKind::Adjust, &[image], instruction, image)
    }

    pub fn filter(&self, image: &ImageAsset, prompt: &str) -> Result<ImageAsset, EditError> {
        let prompt = require_prompt(prompt, "describe the filter to apply")?;
        let instruction = format!(
            "You are an expert photo editor. Apply a stylistic filter to the entire image.\n\
             Filter request: \"{prompt}\"\nOnly change the style; do not change the content or \
             composition.\nReturn only the filtered image."
        );
        self.send(EditKind::Filter, &[image], instruction, image)
    }

    pub fn frame(&self, image: &ImageAsset, frame: &FrameStyle) -> Result<ImageAsset, EditError> {
        if !frame.has_style() {
            return Err(EditError::InvalidInput(
                "describe the frame style to apply".to_string(),
            ));
        }
        let mut captions = Vec::new();
        if !frame.top_text.trim().is_empty() {
            captions.push(format!("top text: \"{}\"", frame.top_text.trim()));
        }
        if !frame.bottom_text.trim().is_empty() {
            captions.push(format!("bottom text: \"{}\"", frame.bottom_text.trim()));
        }
        let caption_line = if captions.is_empty() {
            "Do not add any text.".to_string()
        } else {
            format!("Render this text on the frame: {}.", captions.join("; "))
        };
        let instruction = format!(
            "You are an expert graphic designer. Add a decorative frame around the provided \
             image.\nFrame style: \"{}\"\n{caption_line}\nThe original photo must stay \
             pixel-identical and centered inside the frame.\nReturn only the framed image.",
            frame.style.trim()
        );
        self.send(EditKind::Frame, &[image], instruction, image)
    }

    /// Blends several images; the first one sets lighting and mood.
    pub fn composite(&self, images: &[ImageAsset], prompt: &str) -> Result<ImageAsset, EditError> {
        if images.len() < 2 {
            return Err(EditError::InsufficientInput(format!(
                "select at least two images to composite (got {})",
                images.len()
            )));
        }
        let extra = match prompt.trim() {
            "" => String::new(),
            text => format!("\nAdditional direction: \"{text}\""),
        };
        let instruction = format!(
            "You are an expert photo compositor. Combine the {} provided images into one \
             coherent photograph.\nThe first image is the style source: match its lighting, \
             color grading and mood. The remaining images provide the content to include.{extra}\n\
             Return only the composite image.",
            images.len()
        );
        let refs: Vec<&ImageAsset> = images.iter().collect();
        self.send(EditKind::Composite, &refs, instruction, &images[0])
    }

    fn send(
        &self,
        kind: EditKind,
        images: &[&ImageAsset],
        instruction: String,
        name_source: &ImageAsset,
    ) -> Result<ImageAsset, EditError> {
        let mut request = GenerateContentRequest::new(self.model.clone(), instruction);
        for image in images {
            request.images.push(inline_part(image)?);
        }
        log::debug!(
            "{} request via {} ({} image(s))",
            kind.as_str(),
            self.transport.name(),
            request.images.len()
        );
        let response = self
            .transport
            .generate_content(&request)
            .map_err(|err| EditError::Transport(error_chain_text(&err, 800)))?;
        let result_stem = format!("{}_{}", kind.result_prefix(), name_source.stem());
        let result = classify_response(&response, &result_stem);
        if let Err(err) = &result {
            log::warn!("{} edit produced no image: {err}", kind.as_str());
        }
        result
    }
}

/// Decides what a model response means, in priority order: blocked prompt,
/// returned image, abnormal finish reason, and finally "no image".
pub fn classify_response(
    response: &GenerateContentResponse,
    result_stem: &str,
) -> Result<ImageAsset, EditError> {
    if let Some(feedback) = response.prompt_feedback.as_ref() {
        if let Some(reason) = feedback
            .block_reason
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
        {
            return Err(EditError::Blocked {
                reason: reason.to_string(),
                message: feedback.block_reason_message.clone(),
            });
        }
    }

    if let Some(inline) = response.first_inline_image() {
        let filename = format!("{result_stem}.{}", extension_for_mime(&inline.mime_type));
        let encoding = format!("data:{};base64,{}", inline.mime_type, inline.data);
        return codec::decode(&encoding, &filename);
    }

    if let Some(reason) = response
        .first_finish_reason()
        .map(str::trim)
        .filter(|reason| !reason.is_empty() && *reason != "STOP")
    {
        return Err(EditError::GenerationStopped {
            reason: reason.to_string(),
        });
    }

    Err(EditError::NoImageReturned {
        text: response.text_feedback(),
    })
}

fn inline_part(image: &ImageAsset) -> Result<InlineData, EditError> {
    let encoded = codec::encode(image)?;
    let (mime, payload) = codec::split(&encoded)?;
    Ok(InlineData {
        mime_type: mime.to_string(),
        data: payload.to_string(),
    })
}

fn require_prompt<'a>(prompt: &'a str, hint: &str) -> Result<&'a str, EditError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(EditError::InvalidInput(hint.to_string()));
    }
    Ok(trimmed)
}
