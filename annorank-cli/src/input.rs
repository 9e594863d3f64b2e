//! Loading annotation exports and the image key from CSV.
//!
//! Comparison files need `image0`, `image1` and `winner` columns; anything else
//! in the export (user, timestamps, ...) is ignored.

use annorank_core::{AnnotatorRecords, ComparisonRecord, ItemId};
use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::bail;

/// Parse `--annotator NAME=PATH`. A bare path uses the file stem as the name.
pub fn parse_annotator_spec(value: &str) -> Result<(String, PathBuf), String> {
    if let Some((name, path)) = value.split_once('=') {
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("missing annotator name in \"{value}\""));
        }
        if path.is_empty() {
            return Err(format!("missing file path in \"{value}\""));
        }
        return Ok((name.to_string(), PathBuf::from(path)));
    }

    let path = PathBuf::from(value);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("cannot derive an annotator name from \"{value}\"; use NAME=PATH"))?
        .to_string();
    Ok((stem, path))
}

/// Decode comparison records from CSV with a header row.
pub fn read_records<R: io::Read>(reader: R) -> Result<Vec<ComparisonRecord>, csv::Error> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize()
        .collect()
}

/// Load every annotator's file, in the order given. Bails on the first bad file.
pub fn load_annotators(specs: &[(String, PathBuf)]) -> Vec<AnnotatorRecords> {
    specs
        .iter()
        .map(|(name, path)| {
            let records = load_records(path);
            info!(annotator = %name, records = records.len(), path = %path.display(), "loaded comparisons");
            AnnotatorRecords::new(name.clone(), records)
        })
        .collect()
}

fn load_records(path: &Path) -> Vec<ComparisonRecord> {
    let file = std::fs::File::open(path)
        .unwrap_or_else(|e| bail(format!("Failed to open comparisons file {}: {e}", path.display())));
    read_records(io::BufReader::new(file))
        .unwrap_or_else(|e| bail(format!("Failed to read comparisons from {}: {e}", path.display())))
}

#[derive(Debug, Deserialize)]
struct ImageKeyRow {
    app_image_id: ItemId,
    image_name: String,
}

/// Decode the image key (`app_image_id`, `image_name`) into an id → name map.
pub fn read_image_names<R: io::Read>(reader: R) -> Result<HashMap<ItemId, String>, csv::Error> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize::<ImageKeyRow>()
        .map(|row| row.map(|r| (r.app_image_id, r.image_name)))
        .collect()
}

pub fn load_image_names(path: &Path) -> HashMap<ItemId, String> {
    let file = std::fs::File::open(path)
        .unwrap_or_else(|e| bail(format!("Failed to open image key {}: {e}", path.display())));
    let names = read_image_names(io::BufReader::new(file))
        .unwrap_or_else(|e| bail(format!("Failed to read image key {}: {e}", path.display())));
    info!(images = names.len(), path = %path.display(), "loaded image key");
    names
}
