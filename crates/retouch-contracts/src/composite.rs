use crate::assets::ImageAsset;
use crate::errors::EditError;

/// Candidate images for a blend, plus which one donates lighting and mood.
#[derive(Debug, Clone, Default)]
pub struct CompositeWorkingSet {
    images: Vec<ImageAsset>,
    style_source_index: usize,
}

impl CompositeWorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, files: Vec<ImageAsset>) -> Result<(), EditError> {
        if files.len() < 2 {
            return Err(EditError::InsufficientInput(format!(
                "select at least two images to composite (got {})",
                files.len()
            )));
        }
        self.images = files;
        self.style_source_index = 0;
        Ok(())
    }

    pub fn set_style_source(&mut self, index: usize) -> Result<(), EditError> {
        if index >= self.images.len() {
            return Err(EditError::InvalidInput(format!(
                "style source {index} is out of range for {} image(s)",
                self.images.len()
            )));
        }
        self.style_source_index = index;
        Ok(())
    }

    pub fn style_source_index(&self) -> usize {
        self.style_source_index
    }

    pub fn images(&self) -> &[ImageAsset] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn clear(&mut self) {
        self.images.clear();
        self.style_source_index = 0;
    }

    /// The working set with the style source moved to the front; the
    /// remaining images keep their relative order.
    pub fn ordered(&self) -> Vec<ImageAsset> {
        let Some(source) = self.images.get(self.style_source_index) else {
            return self.images.clone();
        };
        let mut ordered = Vec::with_capacity(self.images.len());
        ordered.push(source.clone());
        ordered.extend(
            self.images
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != self.style_source_index)
                .map(|(_, image)| image.clone()),
        );
        ordered
    }
}
