use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use retouch_contracts::assets::ImageAsset;
use retouch_contracts::history::EditHistory;
use retouch_contracts::selection::{archive_entry_name, DownloadSelection};
use retouch_contracts::EditError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub entries: Vec<String>,
    pub bytes: usize,
}

/// Zips `(history index, asset)` pairs into memory.
pub fn build_archive(entries: &[(usize, &ImageAsset)]) -> Result<(Vec<u8>, Vec<String>), EditError> {
    if entries.is_empty() {
        return Err(EditError::InsufficientInput(
            "select at least one image to export".to_string(),
        ));
    }
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut names = Vec::with_capacity(entries.len());
    for (index, asset) in entries {
        let name = archive_entry_name(*index, asset.name());
        if names.contains(&name) {
            return Err(EditError::Archive(format!("duplicate archive entry {name}")));
        }
        writer
            .start_file(name.as_str(), options)
            .map_err(|err| EditError::Archive(err.to_string()))?;
        writer
            .write_all(asset.bytes())
            .map_err(|err| EditError::Archive(err.to_string()))?;
        names.push(name);
    }
    let cursor = writer
        .finish()
        .map_err(|err| EditError::Archive(err.to_string()))?;
    Ok((cursor.into_inner(), names))
}

/// Exports the selected history entries. Stale indices beyond the history
/// are ignored.
pub fn export_selection(
    history: &EditHistory,
    selection: &DownloadSelection,
    path: &Path,
) -> Result<ExportReport, EditError> {
    let entries: Vec<(usize, &ImageAsset)> = selection
        .indices()
        .into_iter()
        .filter_map(|index| history.get(index).map(|asset| (index, asset)))
        .collect();
    write_archive(&entries, path)
}

pub fn export_all(history: &EditHistory, path: &Path) -> Result<ExportReport, EditError> {
    let entries: Vec<(usize, &ImageAsset)> = history.entries().iter().enumerate().collect();
    write_archive(&entries, path)
}

fn write_archive(entries: &[(usize, &ImageAsset)], path: &Path) -> Result<ExportReport, EditError> {
    let (bytes, names) = build_archive(entries)?;
    let path = archive_path(path);
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|err| EditError::Archive(format!("{}: {err}", parent.display())))?;
    }
    std::fs::write(&path, &bytes)
        .map_err(|err| EditError::Archive(format!("{}: {err}", path.display())))?;
    log::info!("wrote {} archive entries to {}", names.len(), path.display());
    Ok(ExportReport {
        path,
        entries: names,
        bytes: bytes.len(),
    })
}

fn archive_path(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension("zip")
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use retouch_contracts::assets::ImageAsset;
    use retouch_contracts::history::EditHistory;
    use retouch_contracts::selection::DownloadSelection;
    use retouch_contracts::EditError;

    use super::{build_archive, export_all, export_selection};

    fn history() -> EditHistory {
        let mut history = EditHistory::new();
        history.start(ImageAsset::new("my photo.png", "image/png", b"orig".to_vec()));
        history.append(ImageAsset::new("edited_my photo.png", "image/png", b"one".to_vec()));
        history.append(ImageAsset::new("framed (1).png", "image/png", b"two".to_vec()));
        history
    }

    #[test]
    fn empty_selection_fails_without_writing() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("out.zip");
        let err = export_selection(&history(), &DownloadSelection::new(), &path).unwrap_err();
        assert!(matches!(err, EditError::InsufficientInput(_)));
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn selection_export_names_entries_by_index() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut selection = DownloadSelection::new();
        selection.toggle(2);
        selection.toggle(0);
        selection.toggle(9);

        let report = export_selection(&history(), &selection, &temp.path().join("picks"))?;
        assert_eq!(report.path, temp.path().join("picks.zip"));
        assert_eq!(report.entries, vec!["000_my_photo.png", "002_framed__1_.png"]);

        let raw = std::fs::read(&report.path)?;
        let mut archive = zip::ZipArchive::new(Cursor::new(raw))?;
        assert_eq!(archive.len(), 2);
        let mut contents = String::new();
        archive
            .by_name("002_framed__1_.png")?
            .read_to_string(&mut contents)?;
        assert_eq!(contents, "two");
        Ok(())
    }

    #[test]
    fn export_all_includes_every_entry() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let report = export_all(&history(), &temp.path().join("all.zip"))?;
        assert_eq!(
            report.entries,
            vec![
                "000_my_photo.png",
                "001_edited_my_photo.png",
                "002_framed__1_.png"
            ]
        );
        Ok(())
    }

    #[test]
    fn build_archive_rejects_empty_input() {
        assert!(matches!(
            build_archive(&[]),
            Err(EditError::InsufficientInput(_))
        ));
    }
}
