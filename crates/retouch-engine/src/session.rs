use std::path::{Path, PathBuf};

use retouch_contracts::assets::ImageAsset;
use retouch_contracts::composite::CompositeWorkingSet;
use retouch_contracts::events::{EventPayload, EventWriter};
use retouch_contracts::history::EditHistory;
use retouch_contracts::hotspot::{scale_to_natural, EditHotspot, HotspotPoint};
use retouch_contracts::instructions::{EditInstruction, EditKind};
use retouch_contracts::selection::DownloadSelection;
use retouch_contracts::style::{FrameStyle, PinnedStyle};
use retouch_contracts::EditError;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::batch::{apply_pinned_style_to_all, BatchOutcome};
use crate::crop::{crop, CropRect};
use crate::export::{self, ExportReport};
use crate::gateway::EditGateway;

/// Mutable UI-facing state of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Set while an edit-producing request is in flight.
    pub loading: bool,
    pub last_error: Option<String>,
}

/// One editing session: the history being worked on plus every piece of
/// transient tool state around it.
pub struct EditorSession {
    session_id: String,
    gateway: EditGateway,
    events: EventWriter,
    history: EditHistory,
    hotspots: EditHotspot,
    pinned: PinnedStyle,
    composite: CompositeWorkingSet,
    downloads: DownloadSelection,
    state: SessionState,
}

impl EditorSession {
    pub fn new(gateway: EditGateway, events_path: impl Into<PathBuf>) -> Self {
        let session_id = format!("session-{}", Uuid::new_v4());
        let events = EventWriter::new(events_path.into(), session_id.clone());
        let session = Self {
            session_id,
            gateway,
            events,
            history: EditHistory::new(),
            hotspots: EditHotspot::new(),
            pinned: PinnedStyle::new(),
            composite: CompositeWorkingSet::new(),
            downloads: DownloadSelection::new(),
            state: SessionState::default(),
        };
        session.emit(
            "session_created",
            json!({
                "model": session.gateway.model(),
                "transport": session.gateway.transport_name(),
            }),
        );
        session
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn current(&self) -> Option<&ImageAsset> {
        self.history.current()
    }

    pub fn hotspots(&self) -> &[HotspotPoint] {
        self.hotspots.points()
    }

    pub fn pinned_style(&self) -> Option<&FrameStyle> {
        self.pinned.get()
    }

    pub fn composite_set(&self) -> &CompositeWorkingSet {
        &self.composite
    }

    pub fn downloads(&self) -> &DownloadSelection {
        &self.downloads
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn event_writer(&self) -> EventWriter {
        self.events.clone()
    }

    pub fn start(&mut self, asset: ImageAsset) {
        self.emit(
            "session_started",
            json!({ "image": asset.name(), "digest": asset.digest() }),
        );
        self.history.start(asset);
        self.hotspots.clear();
        self.downloads.clear();
        self.state.last_error = None;
    }

    /// Drops the current history so a different image can be opened.
    pub fn upload_new(&mut self) {
        self.history.clear();
        self.hotspots.clear();
        self.downloads.clear();
        self.composite.clear();
        self.state.last_error = None;
        self.emit("session_cleared", json!({}));
    }

    pub fn add_hotspot(&mut self, point: HotspotPoint) -> Result<(), EditError> {
        let current = self.require_current()?;
        if let Ok((width, height)) = current.dimensions() {
            if point.x >= width || point.y >= height {
                return Err(self.reject(EditError::InvalidInput(format!(
                    "point ({}, {}) is outside the {width}x{height} image",
                    point.x, point.y
                ))));
            }
        }
        self.hotspots.push(point);
        Ok(())
    }

    /// Adds a hotspot given in coordinates of a scaled display of the image.
    pub fn add_display_hotspot(
        &mut self,
        displayed: (f64, f64),
        displayed_size: (f64, f64),
    ) -> Result<HotspotPoint, EditError> {
        let dimensions = self.require_current()?.dimensions();
        let natural = match dimensions {
            Ok(size) => size,
            Err(err) => return Err(self.reject(err)),
        };
        let Some(point) = scale_to_natural(displayed, displayed_size, natural) else {
            return Err(self.reject(EditError::InvalidInput(
                "point is outside the displayed image".to_string(),
            )));
        };
        self.hotspots.push(point);
        Ok(point)
    }

    pub fn pop_hotspot(&mut self) -> Option<HotspotPoint> {
        self.hotspots.pop()
    }

    /// Localized edit at the hotspots placed so far.
    pub fn localized_edit(&mut self, prompt: &str) -> Result<ImageAsset, EditError> {
        let instruction = EditInstruction::Localized {
            prompt: prompt.to_string(),
            hotspots: self.hotspots.points().to_vec(),
        };
        self.apply(instruction)
    }

    /// Runs one single-image edit against the current snapshot. History is
    /// only touched when the edit succeeds.
    pub fn apply(&mut self, instruction: EditInstruction) -> Result<ImageAsset, EditError> {
        let current = self.require_current()?.clone();
        let kind = instruction.kind();
        let result = self.run_gated(|gateway| gateway.apply(&current, &instruction));
        match result {
            Ok(asset) => {
                self.commit(asset.clone());
                self.emit(
                    "edit_applied",
                    json!({
                        "kind": kind.as_str(),
                        "instruction": instruction.summary(),
                        "image": asset.name(),
                        "digest": asset.digest(),
                        "history_len": self.history.len(),
                    }),
                );
                Ok(asset)
            }
            Err(err) => {
                self.emit_failure(kind, &err);
                Err(err)
            }
        }
    }

    pub fn crop(&mut self, rect: CropRect) -> Result<ImageAsset, EditError> {
        let current = self.require_current()?.clone();
        if self.state.loading {
            return Err(self.reject(EditError::Busy));
        }
        let cropped = crop(&current, rect).map_err(|err| self.reject(err))?;
        self.commit(cropped.clone());
        self.emit(
            "crop_applied",
            json!({
                "rect": [rect.x, rect.y, rect.width, rect.height],
                "image": cropped.name(),
                "history_len": self.history.len(),
            }),
        );
        Ok(cropped)
    }

    pub fn undo(&mut self) -> bool {
        let moved = self.history.undo();
        self.after_navigation("undo", moved);
        moved
    }

    pub fn redo(&mut self) -> bool {
        let moved = self.history.redo();
        self.after_navigation("redo", moved);
        moved
    }

    pub fn jump_to(&mut self, index: usize) -> bool {
        let moved = self.history.jump_to(index);
        self.after_navigation("jump", moved);
        moved
    }

    pub fn reset(&mut self) -> bool {
        let moved = self.history.reset();
        self.downloads.clear();
        self.after_navigation("reset", moved);
        moved
    }

    /// Pins the form, or unpins it when it matches the pinned style exactly.
    pub fn toggle_pin(&mut self, form: FrameStyle) -> bool {
        let pinned = self.pinned.toggle(form);
        self.emit(
            "pin_changed",
            json!({
                "pinned": pinned,
                "style": self.pinned.get().map(|style| style.style.clone()),
            }),
        );
        pinned
    }

    pub fn clear_pin(&mut self) {
        self.pinned.clear();
        self.emit("pin_changed", json!({ "pinned": false, "style": Value::Null }));
    }

    /// Frames each source with the pinned style. Whatever succeeded before
    /// a failure still replaces the history; the failure is reported in the
    /// outcome and in [`SessionState::last_error`].
    pub fn run_batch(&mut self, sources: Vec<ImageAsset>) -> Result<BatchOutcome, EditError> {
        if self.state.loading {
            return Err(self.reject(EditError::Busy));
        }
        let Some(style) = self.pinned.get().cloned() else {
            return Ok(BatchOutcome::default());
        };
        if sources.is_empty() {
            return Ok(BatchOutcome::default());
        }

        self.state.loading = true;
        self.state.last_error = None;
        let events = &self.events;
        let outcome = apply_pinned_style_to_all(&self.gateway, Some(&style), &sources, |index, result| {
            let mut payload = EventPayload::new();
            payload.insert("index".to_string(), json!(index));
            match result {
                Ok(asset) => {
                    payload.insert("ok".to_string(), json!(true));
                    payload.insert("image".to_string(), json!(asset.name()));
                }
                Err(err) => {
                    payload.insert("ok".to_string(), json!(false));
                    payload.insert("error".to_string(), json!(err.to_string()));
                }
            }
            if let Err(err) = events.emit("batch_item", payload) {
                log::warn!("failed to record batch_item event: {err:#}");
            }
        });
        self.state.loading = false;

        if !outcome.succeeded.is_empty() {
            self.history.replace_all(outcome.succeeded.clone(), None);
            self.hotspots.clear();
            self.downloads.clear();
        }
        if let Some(err) = outcome.error.as_ref() {
            self.state.last_error = Some(err.to_string());
        }
        self.emit(
            "batch_finished",
            json!({
                "style": style.style,
                "requested": sources.len(),
                "succeeded": outcome.succeeded.len(),
                "failed_index": outcome.failed_index,
            }),
        );
        Ok(outcome)
    }

    pub fn select_composite(&mut self, files: Vec<ImageAsset>) -> Result<(), EditError> {
        self.composite.select(files).map_err(|err| self.reject(err))
    }

    pub fn set_style_source(&mut self, index: usize) -> Result<(), EditError> {
        self.composite
            .set_style_source(index)
            .map_err(|err| self.reject(err))
    }

    /// Blends the working set with the style source first. On success the
    /// working set is emptied and the history restarts from the result.
    pub fn generate_composite(&mut self, prompt: &str) -> Result<ImageAsset, EditError> {
        let ordered = self.composite.ordered();
        if ordered.len() < 2 {
            return Err(self.reject(EditError::InsufficientInput(
                "select at least two images to composite".to_string(),
            )));
        }
        let result = self.run_gated(|gateway| gateway.composite(&ordered, prompt));
        match result {
            Ok(asset) => {
                self.composite.clear();
                self.history.replace_all(vec![asset.clone()], None);
                self.hotspots.clear();
                self.downloads.clear();
                self.emit(
                    "composite_generated",
                    json!({
                        "inputs": ordered.iter().map(ImageAsset::name).collect::<Vec<&str>>(),
                        "image": asset.name(),
                    }),
                );
                Ok(asset)
            }
            Err(err) => {
                self.emit_failure(EditKind::Composite, &err);
                Err(err)
            }
        }
    }

    pub fn toggle_download(&mut self, index: usize) -> Result<bool, EditError> {
        if index >= self.history.len() {
            return Err(self.reject(EditError::InvalidInput(format!(
                "history has no entry {index}"
            ))));
        }
        Ok(self.downloads.toggle(index))
    }

    pub fn export_selection(&mut self, path: &Path) -> Result<ExportReport, EditError> {
        let report = export::export_selection(&self.history, &self.downloads, path)
            .map_err(|err| self.reject(err))?;
        self.downloads.clear();
        self.emit_export(&report);
        Ok(report)
    }

    pub fn export_all(&mut self, path: &Path) -> Result<ExportReport, EditError> {
        let report = export::export_all(&self.history, path).map_err(|err| self.reject(err))?;
        self.downloads.clear();
        self.emit_export(&report);
        Ok(report)
    }

    /// Writes the current snapshot to `path`.
    pub fn save_current(&mut self, path: &Path) -> Result<PathBuf, EditError> {
        let current = self.require_current()?.clone();
        let path = if path.extension().is_some() {
            path.to_path_buf()
        } else {
            path.with_extension(current.extension())
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| self.reject(err.into()))?;
        }
        std::fs::write(&path, current.bytes()).map_err(|err| self.reject(err.into()))?;
        self.emit(
            "image_saved",
            json!({ "path": path.to_string_lossy(), "image": current.name() }),
        );
        Ok(path)
    }

    /// Appends a new snapshot. The append discards every entry past the old
    /// cursor, so selections pointing there go with them.
    fn commit(&mut self, asset: ImageAsset) {
        self.history.append(asset);
        self.downloads.retain_below(self.history.len() - 1);
        self.hotspots.clear();
    }

    fn run_gated<T>(
        &mut self,
        call: impl FnOnce(&EditGateway) -> Result<T, EditError>,
    ) -> Result<T, EditError> {
        if self.state.loading {
            return Err(self.reject(EditError::Busy));
        }
        self.state.loading = true;
        self.state.last_error = None;
        let result = call(&self.gateway);
        self.state.loading = false;
        result.map_err(|err| self.reject(err))
    }

    fn require_current(&mut self) -> Result<&ImageAsset, EditError> {
        if self.history.current().is_none() {
            return Err(self.reject(EditError::InsufficientInput(
                "open an image first".to_string(),
            )));
        }
        self.history
            .current()
            .ok_or_else(|| EditError::InsufficientInput("open an image first".to_string()))
    }

    /// Records `err` as the user-visible message and hands it back.
    fn reject(&mut self, err: EditError) -> EditError {
        self.state.last_error = Some(err.to_string());
        err
    }

    fn after_navigation(&mut self, action: &str, moved: bool) {
        self.hotspots.clear();
        if moved {
            self.emit(
                "history_navigated",
                json!({ "action": action, "cursor": self.history.cursor() }),
            );
        }
    }

    fn emit_failure(&self, kind: EditKind, err: &EditError) {
        self.emit(
            "edit_failed",
            json!({
                "kind": kind.as_str(),
                "error": err.to_string(),
                "precondition": err.is_precondition(),
            }),
        );
    }

    fn emit_export(&self, report: &ExportReport) {
        self.emit(
            "export_written",
            json!({
                "path": report.path.to_string_lossy(),
                "entries": report.entries,
                "bytes": report.bytes,
            }),
        );
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let payload: Map<String, Value> = payload.as_object().cloned().unwrap_or_default();
        if let Err(err) = self.events.emit(event_type, payload) {
            log::warn!("failed to record {event_type} event: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use retouch_contracts::assets::ImageAsset;
    use retouch_contracts::hotspot::HotspotPoint;
    use retouch_contracts::instructions::EditInstruction;
    use retouch_contracts::style::FrameStyle;
    use retouch_contracts::EditError;

    use super::EditorSession;
    use crate::crop::CropRect;
    use crate::gateway::tests::{asset, ScriptedTransport};
    use crate::gateway::EditGateway;
    use crate::transport::DryrunTransport;

    fn session(temp: &tempfile::TempDir) -> (EditorSession, ScriptedTransport) {
        let transport = ScriptedTransport::default();
        let gateway = EditGateway::new(transport.clone(), "test-model");
        (
            EditorSession::new(gateway, temp.path().join("events.jsonl")),
            transport,
        )
    }

    fn png(width: u32, height: u32) -> anyhow::Result<ImageAsset> {
        let mut encoded = Vec::new();
        image::RgbImage::new(width, height).write_to(
            &mut std::io::Cursor::new(&mut encoded),
            image::ImageFormat::Png,
        )?;
        Ok(ImageAsset::new("photo.png", "image/png", encoded))
    }

    fn adjust(prompt: &str) -> EditInstruction {
        EditInstruction::Adjust {
            prompt: prompt.to_string(),
        }
    }

    #[test]
    fn successful_edit_appends_and_clears_hotspots() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        transport.push_image(b"edited");
        session.start(png(100, 80)?);
        session.add_hotspot(HotspotPoint::new(10, 10))?;

        let result = session.localized_edit("remove the bird")?;
        assert_eq!(result.bytes(), b"edited");
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history().cursor(), Some(1));
        assert!(session.hotspots().is_empty());
        assert!(!session.state().loading);

        let types = session.event_writer().read_types()?;
        assert!(types.contains(&"edit_applied".to_string()));
        Ok(())
    }

    #[test]
    fn failed_edit_leaves_history_untouched() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        transport.push(Err(anyhow!("network down")));
        session.start(asset("a.png"));

        let err = session.apply(adjust("warmer")).unwrap_err();
        assert!(matches!(err, EditError::Transport(_)));
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.current().map(ImageAsset::name), Some("a.png"));
        assert!(session
            .state()
            .last_error
            .as_deref()
            .unwrap_or_default()
            .contains("network down"));
        assert!(!session.state().loading);
        Ok(())
    }

    #[test]
    fn busy_session_rejects_new_requests() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        session.start(asset("a.png"));
        session.state.loading = true;

        assert!(matches!(session.apply(adjust("warmer")), Err(EditError::Busy)));
        assert_eq!(transport.request_count(), 0);
        Ok(())
    }

    #[test]
    fn busy_session_rejects_batch_and_composite() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        session.start(asset("a.png"));
        session.toggle_pin(FrameStyle::new("polaroid", "", ""));
        session.select_composite(vec![asset("i0.png"), asset("i1.png")])?;
        session.state.loading = true;

        assert!(matches!(
            session.run_batch(vec![asset("s1.png")]),
            Err(EditError::Busy)
        ));
        assert!(matches!(session.generate_composite(""), Err(EditError::Busy)));
        assert_eq!(transport.request_count(), 0);
        assert_eq!(session.composite_set().len(), 2);
        assert_eq!(session.current().map(ImageAsset::name), Some("a.png"));
        assert!(session.state().loading);
        Ok(())
    }

    #[test]
    fn edits_require_an_open_image() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, _) = session(&temp);
        assert!(matches!(
            session.apply(adjust("warmer")),
            Err(EditError::InsufficientInput(_))
        ));
        assert!(session.state().last_error.is_some());
        Ok(())
    }

    #[test]
    fn navigation_clears_hotspots_and_new_edit_discards_redo() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        transport.push_image(b"b");
        transport.push_image(b"c");
        transport.push_image(b"d");
        session.start(png(20, 20)?);
        session.apply(adjust("one"))?;
        session.apply(adjust("two"))?;

        session.add_hotspot(HotspotPoint::new(1, 1))?;
        assert!(session.undo());
        assert!(session.hotspots().is_empty());
        assert!(session.undo());
        session.apply(adjust("three"))?;

        assert_eq!(session.history().len(), 2);
        assert_eq!(session.current().map(ImageAsset::bytes), Some(&b"d"[..]));
        assert!(!session.redo());
        Ok(())
    }

    #[test]
    fn hotspots_are_validated_and_scaled() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, _) = session(&temp);
        session.start(png(1000, 500)?);

        assert!(matches!(
            session.add_hotspot(HotspotPoint::new(1000, 10)),
            Err(EditError::InvalidInput(_))
        ));
        let point = session.add_display_hotspot((100.0, 50.0), (200.0, 100.0))?;
        assert_eq!(point, HotspotPoint::new(500, 250));
        assert_eq!(session.pop_hotspot(), Some(point));
        Ok(())
    }

    #[test]
    fn batch_commits_partial_results_and_reports_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        transport.push_image(b"r1");
        transport.push(Err(anyhow!("quota exceeded")));
        session.start(asset("original.png"));
        session.toggle_pin(FrameStyle::new("polaroid", "", ""));

        let outcome = session.run_batch(vec![asset("s1.png"), asset("s2.png"), asset("s3.png")])?;
        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(transport.request_count(), 2);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.current().map(ImageAsset::bytes), Some(&b"r1"[..]));
        assert!(session.state().last_error.is_some());
        assert!(session.pinned_style().is_some());
        Ok(())
    }

    #[test]
    fn batch_failing_on_first_item_keeps_history() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        transport.push(Err(anyhow!("quota exceeded")));
        session.start(asset("orig.png"));
        session.toggle_pin(FrameStyle::new("polaroid", "", ""));

        let outcome = session.run_batch(vec![asset("s1.png"), asset("s2.png")])?;
        assert!(outcome.succeeded.is_empty());
        assert_eq!(outcome.failed_index, Some(0));
        assert_eq!(transport.request_count(), 1);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.current().map(ImageAsset::name), Some("orig.png"));
        assert!(session.state().last_error.is_some());
        assert!(!session.state().loading);
        Ok(())
    }

    #[test]
    fn batch_without_pin_is_a_noop() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        session.start(asset("original.png"));

        let outcome = session.run_batch(vec![asset("s1.png")])?;
        assert!(outcome.succeeded.is_empty());
        assert_eq!(transport.request_count(), 0);
        assert_eq!(session.current().map(ImageAsset::name), Some("original.png"));
        Ok(())
    }

    #[test]
    fn composite_sends_style_source_first_and_replaces_history() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        transport.push_image(b"blend");
        session.start(asset("old.png"));
        session.select_composite(vec![asset("i0.png"), asset("i1.png"), asset("i2.png")])?;
        session.set_style_source(2)?;

        session.generate_composite("")?;
        let request = transport.request(0);
        let sent: Vec<String> = request.images.iter().map(|i| i.data.clone()).collect();
        let expected: Vec<String> = ["i2.png", "i0.png", "i1.png"]
            .iter()
            .map(|name| {
                use base64::Engine as _;
                base64::engine::general_purpose::STANDARD.encode(name.as_bytes())
            })
            .collect();
        assert_eq!(sent, expected);
        assert!(session.composite_set().is_empty());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.current().map(ImageAsset::bytes), Some(&b"blend"[..]));
        Ok(())
    }

    #[test]
    fn failed_composite_keeps_working_set() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        transport.push(Err(anyhow!("timeout")));
        session.select_composite(vec![asset("a.png"), asset("b.png")])?;

        assert!(session.generate_composite("").is_err());
        assert_eq!(session.composite_set().len(), 2);
        assert!(session.history().is_empty());
        Ok(())
    }

    #[test]
    fn export_clears_selection_only_on_success() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        transport.push_image(b"b");
        session.start(png(10, 10)?);
        session.apply(adjust("brighter"))?;

        let archive = temp.path().join("out.zip");
        assert!(matches!(
            session.export_selection(&archive),
            Err(EditError::InsufficientInput(_))
        ));
        assert!(session.toggle_download(5).is_err());
        assert!(session.toggle_download(1)?);
        let report = session.export_selection(&archive)?;
        assert_eq!(report.entries, vec!["001_adjusted_photo.png"]);
        assert!(session.downloads().is_empty());
        Ok(())
    }

    #[test]
    fn new_edit_drops_selection_of_discarded_entries() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        transport.push_image(b"B");
        transport.push_image(b"D");
        session.start(png(10, 10)?);
        session.apply(adjust("first"))?;
        session.toggle_download(1)?;

        assert!(session.undo());
        session.apply(adjust("second"))?;
        assert!(!session.downloads().contains(1));

        let archive = temp.path().join("picked.zip");
        assert!(matches!(
            session.export_selection(&archive),
            Err(EditError::InsufficientInput(_))
        ));
        assert!(!archive.exists());
        Ok(())
    }

    #[test]
    fn crop_drops_selection_of_discarded_entries() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        transport.push_image(b"B");
        session.start(png(10, 10)?);
        session.apply(adjust("first"))?;
        session.toggle_download(0)?;
        session.toggle_download(1)?;

        assert!(session.undo());
        session.crop(CropRect::new(0, 0, 5, 5))?;
        assert_eq!(session.downloads().indices(), vec![0]);
        Ok(())
    }

    #[test]
    fn reset_and_upload_new_clear_selection() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        transport.push_image(b"b");
        session.start(png(10, 10)?);
        session.apply(adjust("brighter"))?;
        session.toggle_download(0)?;

        assert!(session.reset());
        assert!(session.downloads().is_empty());
        assert_eq!(session.history().cursor(), Some(0));

        session.toggle_download(1)?;
        session.upload_new();
        assert!(session.history().is_empty());
        assert!(session.downloads().is_empty());
        Ok(())
    }

    #[test]
    fn crop_appends_locally() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut session, transport) = session(&temp);
        session.start(png(50, 40)?);

        let cropped = session.crop(CropRect::new(0, 0, 25, 20))?;
        assert_eq!(cropped.dimensions()?, (25, 20));
        assert_eq!(session.history().len(), 2);
        assert_eq!(transport.request_count(), 0);
        Ok(())
    }

    #[test]
    fn dryrun_session_round_trip() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let gateway = EditGateway::new(DryrunTransport, "dryrun-image-1");
        let mut session = EditorSession::new(gateway, temp.path().join("events.jsonl"));
        session.start(png(16, 12)?);
        session.apply(EditInstruction::Filter {
            prompt: "noir".to_string(),
        })?;
        let saved = session.save_current(&temp.path().join("result"))?;
        assert_eq!(saved, temp.path().join("result.png"));
        let written = ImageAsset::from_path(&saved)?;
        assert_eq!(written.dimensions()?, (16, 12));
        Ok(())
    }
}
