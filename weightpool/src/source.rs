// MIT License
//
// Copyright (c) 2025 Jai Veilleux
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Collaborators that hydrate a pool and store it back.
//!
//! [JsonFile] reads and writes the document shape
//!
//! ```json
//! [["<key>", "<metadata>", <weight or null>], ...]
//! ```
//!
//! and also accepts the object form `{"key": ..., "metadata": ..., "weight": ...}`
//! on load. Saving always writes the array form.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::StoreConfig;
use crate::error::{PoolError, PoolResult};
use crate::record::Record;

/// Supplies an unordered batch of records.
///
/// Retries and timeouts are the implementor's business: a failed load is
/// surfaced as-is.
pub trait Loader<K, M> {
    fn load(&self) -> PoolResult<Vec<Record<K, M>>>;

    /// Human-readable description of where records come from.
    fn origin(&self) -> String {
        "loader".to_string()
    }
}

/// Accepts a pool's ranked contents for durable storage.
pub trait Persister<K, M> {
    fn persist(&self, records: &[Record<K, M>]) -> PoolResult<()>;
}

impl<K, M, F> Loader<K, M> for F
where
    F: Fn() -> PoolResult<Vec<Record<K, M>>>,
{
    fn load(&self) -> PoolResult<Vec<Record<K, M>>> {
        self()
    }
}

impl<K, M, F> Persister<K, M> for F
where
    F: Fn(&[Record<K, M>]) -> PoolResult<()>,
{
    fn persist(&self, records: &[Record<K, M>]) -> PoolResult<()> {
        self(records)
    }
}

/// A JSON document on disk, usable as both [Loader] and [Persister].
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFile { path: path.into() }
    }

    /// Returns [PoolError::Config] if the config names no path.
    pub fn from_config(config: &StoreConfig) -> PoolResult<Self> {
        match &config.path {
            Some(path) => Ok(Self::new(path)),
            None => Err(PoolError::Config("no pool file path configured".into())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Loader<String, String> for JsonFile {
    fn load(&self) -> PoolResult<Vec<Record<String, String>>> {
        let text = fs::read_to_string(&self.path).map_err(|e| PoolError::io(&self.path, e))?;
        let doc: Value = serde_json::from_str(&text).map_err(|e| PoolError::json(&self.path, e))?;
        parse_document(&doc)
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }
}

impl Persister<String, String> for JsonFile {
    fn persist(&self, records: &[Record<String, String>]) -> PoolResult<()> {
        let rows: Vec<(&str, &str, Option<f64>)> = records
            .iter()
            .map(|r| (r.key.as_str(), r.metadata.as_str(), r.weight))
            .collect();

        // The target is only ever replaced by a complete document.
        let tmp = self.path.with_extension("json.tmp");
        let write = || -> PoolResult<()> {
            let file = fs::File::create(&tmp).map_err(|e| PoolError::io(&tmp, e))?;
            let mut out = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut out, &rows).map_err(|e| PoolError::json(&tmp, e))?;
            out.flush().map_err(|e| PoolError::io(&tmp, e))?;
            fs::rename(&tmp, &self.path).map_err(|e| PoolError::io(&self.path, e))
        };
        let result = write();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

/// Validates a parsed document into records.
///
/// Returns [PoolError::MalformedRecord] naming the first offending entry.
pub fn parse_document(doc: &Value) -> PoolResult<Vec<Record<String, String>>> {
    let entries = doc
        .as_array()
        .ok_or_else(|| PoolError::MalformedRecord("document root must be an array".into()))?;
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| parse_entry(i, entry))
        .collect()
}

fn parse_entry(i: usize, entry: &Value) -> PoolResult<Record<String, String>> {
    let (key, metadata, weight) = match entry {
        Value::Array(items) => {
            if !(2..=3).contains(&items.len()) {
                return Err(malformed(
                    i,
                    format!("expected [key, metadata, weight], got {} items", items.len()),
                ));
            }
            (&items[0], items.get(1), items.get(2))
        }
        Value::Object(map) => {
            let key = map.get("key").ok_or_else(|| malformed(i, "missing \"key\"".into()))?;
            (key, map.get("metadata"), map.get("weight"))
        }
        other => return Err(malformed(i, format!("expected an array or object, got {other}"))),
    };

    let key = match key {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::String(_) => return Err(malformed(i, "key is empty".into())),
        other => return Err(malformed(i, format!("key must be a string, got {other}"))),
    };
    let metadata = match metadata {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => return Err(malformed(i, format!("metadata must be a string, got {other}"))),
    };
    let weight = match weight {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(w) => Some(w),
            None => return Err(malformed(i, format!("weight {n} is not representable"))),
        },
        Some(other) => return Err(malformed(i, format!("weight must be numeric, got {other}"))),
    };

    Ok(Record {
        key,
        weight,
        metadata,
    })
}

fn malformed(i: usize, reason: String) -> PoolError {
    PoolError::MalformedRecord(format!("entry {i}: {reason}"))
}
