//! The dataset file: a JSON object with an `items` list. Only `imageAsset` is ever written;
//! every other field, and the key order, round-trips untouched.

use crate::search::as_text;
use crate::write_atomic;
use imgsync_core::{DatasetEntry, Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const IMAGE_ASSET_KEY: &str = "imageAsset";

#[derive(Debug, Clone)]
pub struct DatasetStore {
    path: PathBuf,
    doc: Value,
}

fn entry_from_value(v: &Value) -> DatasetEntry {
    let level = match v.get("level") {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        other => as_text(other).parse().unwrap_or(0),
    };
    let words = v
        .get("words")
        .and_then(Value::as_array)
        .map(|ws| ws.iter().map(|w| as_text(Some(w))).collect())
        .unwrap_or_default();
    let word = Some(as_text(v.get("word"))).filter(|w| !w.is_empty());
    let image_asset = Some(as_text(v.get(IMAGE_ASSET_KEY))).filter(|a| !a.is_empty());
    DatasetEntry {
        id: as_text(v.get("id")),
        word,
        words,
        category: as_text(v.get("category")),
        level,
        image_asset,
    }
}

impl DatasetStore {
    /// A missing file, unparseable JSON, or a document without an `items` list is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Dataset(format!("dataset not found: {}", path.display())));
        }
        let raw = std::fs::read(path)?;
        let doc: Value = serde_json::from_slice(&raw)
            .map_err(|e| Error::Dataset(format!("{}: {e}", path.display())))?;
        Self::from_value(path.to_path_buf(), doc)
    }

    pub fn from_value(path: PathBuf, doc: Value) -> Result<Self> {
        if !doc.get("items").is_some_and(Value::is_array) {
            return Err(Error::Dataset(format!(
                "invalid dataset format: missing `items` list in {}",
                path.display()
            )));
        }
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn items(&self) -> &[Value] {
        self.doc
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Read-only views, in file order; the position is the index for [`Self::set_image_asset`].
    /// Items that are not objects come back with an empty id.
    pub fn entries(&self) -> Vec<DatasetEntry> {
        self.items().iter().map(entry_from_value).collect()
    }

    pub fn set_image_asset(&mut self, index: usize, asset: &str) -> Result<()> {
        let item = self
            .doc
            .get_mut("items")
            .and_then(Value::as_array_mut)
            .and_then(|items| items.get_mut(index))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| Error::Dataset(format!("no dataset item at index {index}")))?;
        item.insert(IMAGE_ASSET_KEY.to_string(), Value::String(asset.to_string()));
        Ok(())
    }

    /// Two-space indented JSON with a trailing newline, written atomically.
    pub fn save(&self) -> Result<()> {
        let mut out = serde_json::to_vec_pretty(&self.doc)
            .map_err(|e| Error::Dataset(format!("serialize dataset: {e}")))?;
        out.push(b'\n');
        write_atomic(&self.path, &out)
    }
}
