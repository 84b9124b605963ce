//! Provenance store: one record per resolved entry, keyed by entry id.
//!
//! Written as `{"generatedAt": ..., "sources": [...]}` sorted by id. Reads also accept a bare
//! list of records; unreadable or unrecognized files start an empty map. Loaded records are
//! read field by field, and until replaced they are written back exactly as they were read,
//! keeping keys this tool does not know about.

use crate::search::{as_text, as_u32};
use crate::write_atomic;
use chrono::{SecondsFormat, Utc};
use imgsync_core::{Error, ProvenanceRecord, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// UTC, RFC 3339 with microseconds.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourcesFile {
    generated_at: String,
    sources: Vec<Value>,
}

#[derive(Debug, Clone)]
struct Entry {
    record: ProvenanceRecord,
    /// The object as loaded; `None` once the record was written by this process.
    raw: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default)]
pub struct ProvenanceStore {
    path: PathBuf,
    records: BTreeMap<String, Entry>,
}

fn record_from(m: &Map<String, Value>) -> ProvenanceRecord {
    let text = |k: &str| as_text(m.get(k));
    ProvenanceRecord {
        item_id: text("itemId"),
        query: text("query"),
        provider: text("provider"),
        image_url: text("imageUrl"),
        source_page: text("sourcePage"),
        title: text("title"),
        license: text("license"),
        attribution: text("attribution"),
        mime: text("mime"),
        width: as_u32(m.get("width")),
        height: as_u32(m.get("height")),
        downloaded_at: text("downloadedAt"),
        stored_as: text("storedAs"),
    }
}

fn records_from(list: &[Value]) -> BTreeMap<String, Entry> {
    let mut out = BTreeMap::new();
    for (i, v) in list.iter().enumerate() {
        let Value::Object(m) = v else {
            warn!(index = i, "provenance entry is not an object; dropped");
            continue;
        };
        let record = record_from(m);
        if record.item_id.is_empty() {
            debug!(index = i, "provenance entry without itemId; dropped");
            continue;
        }
        out.insert(
            record.item_id.clone(),
            Entry {
                record,
                raw: Some(m.clone()),
            },
        );
    }
    out
}

impl ProvenanceStore {
    pub fn empty(path: PathBuf) -> Self {
        Self {
            path,
            records: BTreeMap::new(),
        }
    }

    /// Never fails: a missing or malformed file yields an empty store (logged).
    pub fn load(path: &Path) -> Self {
        let mut store = Self::empty(path.to_path_buf());
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(_) => return store,
        };
        let doc: Value = match serde_json::from_slice(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "provenance file is not valid JSON; starting empty");
                return store;
            }
        };
        store.records = match &doc {
            Value::Object(m) => match m.get("sources") {
                Some(Value::Array(list)) => records_from(list),
                _ => BTreeMap::new(),
            },
            Value::Array(list) => records_from(list),
            _ => BTreeMap::new(),
        };
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, item_id: &str) -> Option<&ProvenanceRecord> {
        self.records.get(item_id).map(|e| &e.record)
    }

    pub fn records(&self) -> impl Iterator<Item = &ProvenanceRecord> {
        self.records.values().map(|e| &e.record)
    }

    /// Replaces any previous record for the same entry, loaded extra keys included.
    pub fn upsert(&mut self, record: ProvenanceRecord) {
        self.records
            .insert(record.item_id.clone(), Entry { record, raw: None });
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        let sources = self
            .records
            .values()
            .map(|e| match &e.raw {
                Some(m) => Ok(Value::Object(m.clone())),
                None => serde_json::to_value(&e.record),
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Store(format!("serialize provenance: {e}")))?;
        let file = SourcesFile {
            generated_at: now_timestamp(),
            sources,
        };
        let mut out = serde_json::to_vec_pretty(&file)
            .map_err(|e| Error::Store(format!("serialize provenance: {e}")))?;
        out.push(b'\n');
        Ok(out)
    }

    pub fn save(&self) -> Result<()> {
        write_atomic(&self.path, &self.to_json()?)
    }
}
