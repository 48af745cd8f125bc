//! Conversions between [`ImageAsset`] and the `data:<mime>;base64,<payload>`
//! transport encoding used on the wire.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::assets::ImageAsset;
use crate::errors::EditError;

pub fn encode(asset: &ImageAsset) -> Result<String, EditError> {
    if asset.is_empty() {
        return Err(EditError::Encoding(format!(
            "{} has no image data",
            asset.name()
        )));
    }
    if !is_mime_type(asset.mime_type()) {
        return Err(EditError::Encoding(format!(
            "{} has an unusable MIME type '{}'",
            asset.name(),
            asset.mime_type()
        )));
    }
    Ok(format!(
        "data:{};base64,{}",
        asset.mime_type(),
        BASE64.encode(asset.bytes())
    ))
}

pub fn decode(encoding: &str, filename: &str) -> Result<ImageAsset, EditError> {
    let (mime, payload) = split(encoding)?;
    let bytes = BASE64
        .decode(payload.trim().as_bytes())
        .map_err(|err| EditError::Decoding(format!("invalid base64 payload: {err}")))?;
    Ok(ImageAsset::new(filename, mime, bytes))
}

/// Splits a transport string into its MIME type and (still encoded) payload.
///
/// The MIME type is the text between the first `:` and the following `;` of
/// the descriptor segment before the `,`.
pub fn split(encoding: &str) -> Result<(&str, &str), EditError> {
    let Some((descriptor, payload)) = encoding.split_once(',') else {
        return Err(EditError::Decoding(
            "missing ',' between descriptor and payload".to_string(),
        ));
    };
    let mime = descriptor
        .split_once(':')
        .and_then(|(_, rest)| rest.split_once(';'))
        .map(|(mime, _)| mime.trim())
        .filter(|mime| is_mime_type(mime))
        .ok_or_else(|| {
            EditError::Decoding(format!("no MIME type found in '{descriptor}'"))
        })?;
    Ok((mime, payload))
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())?;
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

fn is_mime_type(value: &str) -> bool {
    let Some((kind, subtype)) = value.split_once('/') else {
        return false;
    };
    let valid = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '+' | '-' | '_'))
    };
    valid(kind) && valid(subtype)
}
