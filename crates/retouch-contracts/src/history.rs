use crate::assets::ImageAsset;

/// Linear, branch-discarding edit history over immutable snapshots.
///
/// `entries[0]` is always the original image of the session. Appending while
/// the cursor sits behind the tip drops every entry after the cursor, so a
/// redo branch is lost as soon as a new edit lands.
#[derive(Debug, Clone, Default)]
pub struct EditHistory {
    entries: Vec<ImageAsset>,
    cursor: Option<usize>,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, asset: ImageAsset) {
        self.entries = vec![asset];
        self.cursor = Some(0);
    }

    pub fn append(&mut self, asset: ImageAsset) {
        let keep = self.cursor.map(|cursor| cursor + 1).unwrap_or(0);
        self.entries.truncate(keep);
        self.entries.push(asset);
        self.cursor = Some(self.entries.len() - 1);
    }

    pub fn undo(&mut self) -> bool {
        match self.cursor {
            Some(cursor) if cursor > 0 => {
                self.cursor = Some(cursor - 1);
                true
            }
            _ => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.cursor {
            Some(cursor) if cursor + 1 < self.entries.len() => {
                self.cursor = Some(cursor + 1);
                true
            }
            _ => false,
        }
    }

    pub fn jump_to(&mut self, index: usize) -> bool {
        if index >= self.entries.len() {
            return false;
        }
        self.cursor = Some(index);
        true
    }

    pub fn reset(&mut self) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        self.cursor = Some(0);
        true
    }

    /// Installs a fresh sequence, discarding everything before it.
    ///
    /// `select` picks the cursor; `None` or an out-of-range index selects the
    /// most recent entry.
    pub fn replace_all(&mut self, assets: Vec<ImageAsset>, select: Option<usize>) {
        self.entries = assets;
        self.cursor = match self.entries.len() {
            0 => None,
            len => Some(select.filter(|index| *index < len).unwrap_or(len - 1)),
        };
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    pub fn current(&self) -> Option<&ImageAsset> {
        self.cursor.and_then(|cursor| self.entries.get(cursor))
    }

    pub fn original(&self) -> Option<&ImageAsset> {
        self.entries.first()
    }

    pub fn get(&self, index: usize) -> Option<&ImageAsset> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[ImageAsset] {
        &self.entries
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor + 1 < self.entries.len())
    }
}
