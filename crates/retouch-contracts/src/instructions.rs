use serde::{Deserialize, Serialize};

use crate::hotspot::HotspotPoint;
use crate::style::FrameStyle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    Localized,
    Adjust,
    Filter,
    Frame,
    Composite,
}

impl EditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Localized => "localized",
            Self::Adjust => "adjust",
            Self::Filter => "filter",
            Self::Frame => "frame",
            Self::Composite => "composite",
        }
    }

    /// Prefix for the file name of a result produced by this kind.
    pub fn result_prefix(self) -> &'static str {
        match self {
            Self::Localized => "edited",
            Self::Adjust => "adjusted",
            Self::Filter => "filtered",
            Self::Frame => "framed",
            Self::Composite => "composite",
        }
    }
}

/// A typed edit request for a single image.
///
/// Composites take several images and go through the gateway's dedicated
/// entry point instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditInstruction {
    Localized {
        prompt: String,
        hotspots: Vec<HotspotPoint>,
    },
    Adjust {
        prompt: String,
    },
    Filter {
        prompt: String,
    },
    Frame(FrameStyle),
}

impl EditInstruction {
    pub fn kind(&self) -> EditKind {
        match self {
            Self::Localized { .. } => EditKind::Localized,
            Self::Adjust { .. } => EditKind::Adjust,
            Self::Filter { .. } => EditKind::Filter,
            Self::Frame(_) => EditKind::Frame,
        }
    }

    /// Short human-readable label for event logs.
    pub fn summary(&self) -> String {
        match self {
            Self::Localized { prompt, hotspots } => {
                format!("{prompt} @ {} point(s)", hotspots.len())
            }
            Self::Adjust { prompt } | Self::Filter { prompt } => prompt.clone(),
            Self::Frame(frame) => frame.style.clone(),
        }
    }
}
