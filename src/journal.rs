use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{Result, TranslateError};
use crate::events::{Event, EventEnvelope, SessionId};

/// File name of the log inside the configured events directory.
pub const EVENTS_FILE: &str = "events.jsonl";

/// Append-only NDJSON event store.
pub struct EventStore {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl EventStore {
    /// Open (creating if needed) `<dir>/events.jsonl` for appending.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| TranslateError::io(dir, e))?;
        let path = dir.join(EVENTS_FILE);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| TranslateError::io(&path, e))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one envelope as a single line.
    pub fn append(&self, envelope: &EventEnvelope) -> Result<()> {
        let mut line = serde_json::to_vec(envelope).map_err(|e| {
            TranslateError::io(&self.path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        line.push(b'\n');
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        file.write_all(&line)
            .and_then(|_| file.sync_all())
            .map_err(|e| TranslateError::io(&self.path, e))
    }

    /// Every readable record in write order. A missing log yields no records.
    pub fn read_all(dir: &Path) -> Result<Vec<EventRecord>> {
        let path = dir.join(EVENTS_FILE);
        let file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TranslateError::io(&path, e)),
        };
        let mut records = Vec::new();
        for (index, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| TranslateError::io(&path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match EventRecord::parse(&line) {
                Some(record) => records.push(record),
                None => tracing::debug!(event = "event_line_skipped", line = index + 1),
            }
        }
        Ok(records)
    }

    pub fn read_session(dir: &Path, session: &SessionId) -> Result<Vec<EventRecord>> {
        Ok(Self::read_all(dir)?
            .into_iter()
            .filter(|r| r.session_id.as_ref() == Some(session))
            .collect())
    }

    pub fn read_since(dir: &Path, since: DateTime<Utc>) -> Result<Vec<EventRecord>> {
        Ok(Self::read_all(dir)?
            .into_iter()
            .filter(|r| r.timestamp >= since)
            .collect())
    }

    /// Remove the whole log. Callers gate this behind an explicit confirmation.
    pub fn clear(dir: &Path) -> Result<bool> {
        let path = dir.join(EVENTS_FILE);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(TranslateError::io(&path, e)),
        }
    }
}

/// A stored event: common envelope fields plus the raw payload.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<SessionId>,
    pub raw: serde_json::Value,
}

#[derive(Deserialize)]
struct Header {
    #[serde(rename = "type")]
    event_type: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    session_id: Option<SessionId>,
}

impl EventRecord {
    fn parse(line: &str) -> Option<Self> {
        let raw: serde_json::Value = serde_json::from_str(line).ok()?;
        let header = Header::deserialize(&raw).ok()?;
        Some(Self {
            event_type: header.event_type,
            timestamp: header.timestamp,
            session_id: header.session_id,
            raw,
        })
    }

    /// Decode the payload into a known event. Unknown types yield an error.
    pub fn decode(&self) -> serde_json::Result<Event> {
        Event::deserialize(&self.raw)
    }
}

/// Handle every pipeline step emits through.
///
/// Without a store it only logs; a failing store degrades to a warning so
/// the pipeline never stops because the audit trail is unavailable.
#[derive(Clone)]
pub struct EventSink {
    store: Option<Arc<EventStore>>,
    session: SessionId,
}

impl EventSink {
    pub fn new(store: EventStore, session: SessionId) -> Self {
        Self {
            store: Some(Arc::new(store)),
            session,
        }
    }

    pub fn disabled(session: SessionId) -> Self {
        Self {
            store: None,
            session,
        }
    }

    /// Open the store under `dir`, falling back to a disabled sink.
    pub fn open_or_disabled(dir: &Path, session: SessionId) -> Self {
        match EventStore::open(dir) {
            Ok(store) => Self::new(store, session),
            Err(e) => {
                tracing::warn!(
                    event = "event_store_unavailable",
                    error = %e.detail(),
                    "continuing without an audit trail"
                );
                Self::disabled(session)
            }
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn emit(&self, event: Event) {
        tracing::debug!(event = "pipeline_event", kind = event.type_name(), session = %self.session);
        let Some(store) = &self.store else {
            return;
        };
        let envelope = EventEnvelope::now(event, self.session.clone());
        if let Err(e) = store.append(&envelope) {
            tracing::warn!(event = "event_append_failed", error = %e.detail());
        }
    }
}
