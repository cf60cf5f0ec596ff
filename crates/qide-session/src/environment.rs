//! Environment snapshot written by the helper package.
//!
//! The helper serialises the interpreter's global environment to JSON
//! whenever it changes. Scalars may arrive boxed in one-element arrays and
//! empty maps may arrive as empty arrays, so the document is read loosely.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use sysinfo::System;
use tracing::debug;

use qide_core::{Error, Result};

/// One global variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvEntry {
    /// Variable name
    pub name: String,
    /// R type, e.g. `double` or `data.frame`
    pub type_name: String,
    /// Dimensions (`3x2`) or length; absent for functions and environments
    pub details: Option<String>,
    /// Object size in bytes
    pub size_bytes: f64,
}

impl EnvEntry {
    /// Object size for display.
    pub fn size_label(&self) -> String {
        format_size(self.size_bytes)
    }
}

/// Parsed snapshot of the global environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnvSnapshot {
    /// Variables in the order the helper listed them
    pub entries: Vec<EnvEntry>,
    /// Total size of all variables in bytes
    pub total_size: f64,
}

impl EnvSnapshot {
    /// Read and parse a snapshot file. An empty file is an empty environment.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    /// Parse snapshot JSON.
    pub fn parse(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }

        let root: Value = serde_json::from_str(json)?;
        let root = root
            .as_object()
            .ok_or_else(|| Error::InvalidInput("environment snapshot is not an object".to_string()))?;

        if let Some(error) = root.get("error") {
            let message = first_str(error).unwrap_or("unknown error");
            return Err(Error::Other(format!("environment snapshot: {message}")));
        }

        let empty = Map::new();
        let table = |key: &str| root.get(key).and_then(Value::as_object).unwrap_or(&empty);
        let (types, dims, lens, sizes) = (table("types"), table("dim"), table("len"), table("size"));

        let names: Vec<&str> = match root.get("objects") {
            Some(Value::Array(items)) => items.iter().filter_map(first_str).collect(),
            Some(other) => first_str(other).into_iter().collect(),
            None => Vec::new(),
        };

        let entries: Vec<EnvEntry> = names
            .into_iter()
            .map(|name| {
                let type_name = types
                    .get(name)
                    .and_then(first_str)
                    .unwrap_or_default()
                    .to_string();

                let details = if matches!(type_name.as_str(), "function" | "environment") {
                    None
                } else {
                    describe_shape(dims.get(name), lens.get(name))
                };

                EnvEntry {
                    name: name.to_string(),
                    type_name,
                    details,
                    size_bytes: sizes.get(name).and_then(first_f64).unwrap_or(0.0),
                }
            })
            .collect();

        let total_size = root.get("total_size").and_then(first_f64).unwrap_or(0.0);
        debug!(
            "Parsed environment snapshot: {} objects, {} bytes",
            entries.len(),
            total_size
        );

        Ok(Self {
            entries,
            total_size,
        })
    }

    /// Whether the environment has no variables.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Memory summary line, with a share of `total_ram` when it is known.
    pub fn memory_label(&self, total_ram: Option<f64>) -> String {
        match total_ram {
            Some(ram) if ram > 0.0 => format!(
                "Used memory: {} out of {} ({:.1}%)",
                format_size(self.total_size),
                format_size(ram),
                self.total_size / ram * 100.0
            ),
            _ => format!("Used memory: {}", format_size(self.total_size)),
        }
    }
}

/// Human-readable byte count.
pub fn format_size(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.2} KB", bytes / KB)
    } else if bytes < GB {
        format!("{:.2} MB", bytes / MB)
    } else {
        format!("{:.2} GB", bytes / GB)
    }
}

/// Physical memory of this machine in bytes, when the OS reports it.
pub fn total_memory() -> Option<f64> {
    let mut system = System::new();
    system.refresh_memory();
    match system.total_memory() {
        0 => None,
        bytes => Some(bytes as f64),
    }
}

fn describe_shape(dim: Option<&Value>, len: Option<&Value>) -> Option<String> {
    if let Some(Value::Array(dims)) = dim {
        if !dims.is_empty() {
            let parts: Vec<String> = dims
                .iter()
                .map(|d| (d.as_f64().unwrap_or(0.0) as i64).to_string())
                .collect();
            return Some(parts.join("x"));
        }
    }
    len.and_then(first_f64).map(|n| (n as i64).to_string())
}

/// A scalar, or the first element of an array.
fn first(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

fn first_str(value: &Value) -> Option<&str> {
    first(value).and_then(Value::as_str)
}

fn first_f64(value: &Value) -> Option<f64> {
    first(value).and_then(Value::as_f64)
}
