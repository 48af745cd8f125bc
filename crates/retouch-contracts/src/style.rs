use serde::{Deserialize, Serialize};

/// A frame instruction: border style plus optional caption text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameStyle {
    pub style: String,
    #[serde(default)]
    pub top_text: String,
    #[serde(default)]
    pub bottom_text: String,
}

impl FrameStyle {
    pub fn new(
        style: impl Into<String>,
        top_text: impl Into<String>,
        bottom_text: impl Into<String>,
    ) -> Self {
        Self {
            style: style.into(),
            top_text: top_text.into(),
            bottom_text: bottom_text.into(),
        }
    }

    /// Parses `style | top | bottom`; the caption segments are optional.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.splitn(3, '|').map(str::trim);
        Self::new(
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
        )
    }

    pub fn has_style(&self) -> bool {
        !self.style.trim().is_empty()
    }
}

/// The single frame style saved for batch replay.
#[derive(Debug, Clone, Default)]
pub struct PinnedStyle {
    pinned: Option<FrameStyle>,
}

impl PinnedStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&FrameStyle> {
        self.pinned.as_ref()
    }

    pub fn set(&mut self, style: FrameStyle) {
        self.pinned = Some(style);
    }

    pub fn clear(&mut self) {
        self.pinned = None;
    }

    /// A form is considered pinned only when all three fields are
    /// byte-for-byte equal to the pinned style.
    pub fn is_pinned(&self, form: &FrameStyle) -> bool {
        self.pinned.as_ref() == Some(form)
    }

    /// Unpins when `form` matches the pinned style exactly, otherwise pins it.
    /// Returns whether a style is pinned afterwards.
    pub fn toggle(&mut self, form: FrameStyle) -> bool {
        if self.is_pinned(&form) {
            self.pinned = None;
            false
        } else {
            self.pinned = Some(form);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameStyle, PinnedStyle};

    #[test]
    fn toggle_pins_then_unpins_on_exact_match() {
        let mut pinned = PinnedStyle::new();
        let form = FrameStyle::new("polaroid", "Summer", "2024");

        assert!(pinned.toggle(form.clone()));
        assert_eq!(pinned.get(), Some(&form));
        assert!(!pinned.toggle(form));
        assert!(pinned.get().is_none());
    }

    #[test]
    fn whitespace_difference_replaces_instead_of_unpinning() {
        let mut pinned = PinnedStyle::new();
        pinned.set(FrameStyle::new("polaroid", "Summer", ""));

        let edited = FrameStyle::new("polaroid", "Summer ", "");
        assert!(!pinned.is_pinned(&edited));
        assert!(pinned.toggle(edited.clone()));
        assert_eq!(pinned.get(), Some(&edited));
    }

    #[test]
    fn parse_splits_caption_segments() {
        let parsed = FrameStyle::parse("gold ornate | Happy Birthday | Love, Mom");
        assert_eq!(parsed, FrameStyle::new("gold ornate", "Happy Birthday", "Love, Mom"));

        let bare = FrameStyle::parse("film strip");
        assert_eq!(bare, FrameStyle::new("film strip", "", ""));
        assert!(bare.has_style());
        assert!(!FrameStyle::parse("  | top").has_style());
    }
}
