use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

const ENVELOPE_KEYS: [&str; 4] = ["type", "session_id", "seq", "ts"];

/// Session event log: one compact JSON object per line.
///
/// Each record carries an envelope of `type`, `session_id`, a per-writer
/// `seq` and an RFC 3339 `ts`. Payload keys that collide with the envelope
/// are dropped. Clones share the same file handle and sequence.
#[derive(Debug, Clone)]
pub struct EventWriter {
    path: Arc<Path>,
    session_id: Arc<str>,
    seq: Arc<AtomicU64>,
    file: Arc<Mutex<Option<File>>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        let path: PathBuf = path.into();
        let session_id: String = session_id.into();
        Self {
            path: Arc::from(path.as_path()),
            session_id: Arc::from(session_id.as_str()),
            seq: Arc::new(AtomicU64::new(0)),
            file: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Appends one record and returns it as written.
    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        if file.is_none() {
            *file = Some(self.open()?);
        }

        let mut record = Map::new();
        record.insert("type".to_string(), Value::String(event_type.to_string()));
        record.insert(
            "session_id".to_string(),
            Value::String(self.session_id.to_string()),
        );
        record.insert(
            "seq".to_string(),
            Value::from(self.seq.fetch_add(1, Ordering::SeqCst)),
        );
        record.insert(
            "ts".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        record.extend(
            payload
                .into_iter()
                .filter(|(key, _)| !ENVELOPE_KEYS.contains(&key.as_str())),
        );
        let record = Value::Object(record);

        if let Some(handle) = file.as_mut() {
            serde_json::to_writer(&mut *handle, &record)?;
            handle.write_all(b"\n")?;
            handle.flush()?;
        }
        Ok(record)
    }

    /// Every record written so far; unparsable lines are skipped.
    pub fn read_events(&self) -> anyhow::Result<Vec<Value>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to open {}", self.path.display()))
            }
        };
        let mut events = Vec::new();
        for line in BufReader::new(file).lines() {
            if let Ok(value) = serde_json::from_str::<Value>(&line?) {
                events.push(value);
            }
        }
        Ok(events)
    }

    pub fn read_types(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .read_events()?
            .iter()
            .filter_map(|event| event.get("type").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    fn open(&self) -> anyhow::Result<File> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))
    }
}
