//! Reading records from JSON files.

use crate::error::{KildeError, Result};
use crate::vector_store::Record;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Accepted input shapes: a plain array of records, or a transcript with
/// timed chunks.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Records(Vec<Record>),
    Transcript(TranscriptFile),
}

#[derive(Deserialize)]
struct TranscriptFile {
    #[serde(default)]
    source_name: Option<String>,
    chunks: Vec<TranscriptChunk>,
}

#[derive(Deserialize)]
struct TranscriptChunk {
    text: String,
    #[serde(default)]
    start: Option<f64>,
    #[serde(default)]
    end: Option<f64>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Load records from a JSON file, naming the source after the file stem when
/// the records do not carry one.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)?;
    let default_source = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());

    let records = parse_records(&content, &default_source)
        .map_err(|e| KildeError::InvalidInput(format!("{}: {}", path.display(), e)))?;

    debug!("Loaded {} records from {:?}", records.len(), path);
    Ok(records)
}

/// Parse records from JSON text.
pub fn parse_records(json: &str, default_source: &str) -> Result<Vec<Record>> {
    let file: RecordFile = serde_json::from_str(json).map_err(|_| {
        KildeError::InvalidInput(
            "expected an array of records with `embedding_text`, or an object with `chunks`"
                .to_string(),
        )
    })?;

    let records = match file {
        RecordFile::Records(records) => records
            .into_iter()
            .map(|mut r| {
                if r.source_name.is_none() {
                    r.source_name = Some(default_source.to_string());
                }
                r
            })
            .collect(),
        RecordFile::Transcript(transcript) => {
            let source = transcript
                .source_name
                .unwrap_or_else(|| default_source.to_string());
            transcript
                .chunks
                .into_iter()
                .map(|chunk| {
                    let mut record = Record::new(chunk.text).with_source(source.clone());
                    record.start_time = chunk.start;
                    record.end_time = chunk.end;
                    record.extra = chunk.extra;
                    record
                })
                .collect()
        }
    };

    Ok(records)
}
