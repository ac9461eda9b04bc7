//! Durable engine snapshots.
//!
//! A snapshot holds every document with its full term counts, in corpus
//! order:
//!
//! ```json
//! { "documents": [ { "path": "docs/mm.html", "term_counts": { "page": 3 } } ] }
//! ```
//!
//! The encoding follows the file name: `*.bin` is bincode, anything else is
//! JSON, and a trailing `.gz` adds gzip compression (`index.json.gz`).

use crate::document::{find_duplicate, Document};
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Bincode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEncoding {
    pub format: SnapshotFormat,
    pub gzip: bool,
}

impl SnapshotEncoding {
    /// Pick the encoding from the snapshot file name
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let (name, gzip) = match name.strip_suffix(".gz") {
            Some(stem) => (stem.to_string(), true),
            None => (name, false),
        };

        let format = if name.ends_with(".bin") {
            SnapshotFormat::Bincode
        } else {
            SnapshotFormat::Json
        };

        Self { format, gzip }
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    documents: &'a [Document],
}

#[derive(Deserialize)]
struct Snapshot {
    documents: Vec<Document>,
}

/// Write `documents` to `path`.
///
/// The snapshot is written and synced next to `path`, then renamed into
/// place, so an interrupted save never leaves a truncated file behind.
pub fn save(path: &Path, documents: &[Document]) -> Result<()> {
    let encoding = SnapshotEncoding::from_path(path);
    let tmp_path = tmp_path(path);

    let file = File::create(&tmp_path)
        .map_err(|e| Error::snapshot(path, format!("cannot create file: {e}")))?;
    if let Err(reason) = write_synced(file, encoding, documents) {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::snapshot(path, reason));
    }

    fs::rename(&tmp_path, path)
        .map_err(|e| Error::snapshot(path, format!("cannot move snapshot into place: {e}")))?;

    tracing::info!(
        path = %path.display(),
        documents = documents.len(),
        ?encoding,
        "snapshot saved"
    );
    Ok(())
}

/// Read and validate the documents stored at `path`
pub fn load(path: &Path) -> Result<Vec<Document>> {
    let encoding = SnapshotEncoding::from_path(path);
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let snapshot = if encoding.gzip {
        decode(GzDecoder::new(reader), encoding.format)
    } else {
        decode(reader, encoding.format)
    }
    .map_err(|reason| Error::snapshot(path, reason))?;

    validate(&snapshot.documents).map_err(|reason| Error::snapshot(path, reason))?;

    tracing::info!(
        path = %path.display(),
        documents = snapshot.documents.len(),
        "snapshot loaded"
    );
    Ok(snapshot.documents)
}

/// Encode into `file` and flush it to disk
fn write_synced(
    file: File,
    encoding: SnapshotEncoding,
    documents: &[Document],
) -> std::result::Result<(), String> {
    let mut writer = BufWriter::new(file);
    let snapshot = SnapshotRef { documents };

    if encoding.gzip {
        let mut encoder = GzEncoder::new(&mut writer, Compression::default());
        encode(&mut encoder, encoding.format, &snapshot)?;
        encoder.finish().map_err(|e| e.to_string())?;
    } else {
        encode(&mut writer, encoding.format, &snapshot)?;
    }

    let file = writer.into_inner().map_err(|e| e.error().to_string())?;
    file.sync_all().map_err(|e| format!("cannot sync file: {e}"))
}

fn encode<W: Write>(
    writer: &mut W,
    format: SnapshotFormat,
    snapshot: &SnapshotRef<'_>,
) -> std::result::Result<(), String> {
    match format {
        SnapshotFormat::Json => {
            serde_json::to_writer(writer, snapshot).map_err(|e| e.to_string())
        }
        SnapshotFormat::Bincode => {
            bincode::serialize_into(writer, snapshot).map_err(|e| e.to_string())
        }
    }
}

fn decode<R: Read>(reader: R, format: SnapshotFormat) -> std::result::Result<Snapshot, String> {
    match format {
        SnapshotFormat::Json => {
            serde_json::from_reader(reader).map_err(|e| format!("invalid JSON: {e}"))
        }
        SnapshotFormat::Bincode => {
            bincode::deserialize_from(reader).map_err(|e| format!("invalid bincode: {e}"))
        }
    }
}

/// Paths must be unique and every stored count positive
fn validate(documents: &[Document]) -> std::result::Result<(), String> {
    if let Some(path) = find_duplicate(documents) {
        return Err(format!("duplicate document path {path:?}"));
    }
    for doc in documents {
        if let Some((term, _)) = doc.term_counts().iter().find(|(_, count)| **count == 0) {
            return Err(format!("term {:?} in {:?} has a zero count", term, doc.path()));
        }
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
