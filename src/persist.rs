//! Lap persistence
//!
//! Confirmed laps are encoded as protobuf, gzip-compressed and written to a staging
//! directory. An external uploader picks up every `*.lap.gzip` file from there.
//!
//! File names are `{timestamp}_{track}_{car}.lap.gzip`, where the timestamp is the
//! lap's completion time. The same lap therefore always lands in the same file with
//! the same bytes. Each file is written under a `.tmp` name first and renamed into
//! place, so the uploader never sees a partial file.

use async_trait::async_trait;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use prost::Message;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::Lap;
use crate::{CaptureError, Result};

/// Suffix the uploader looks for
pub const LAP_FILE_SUFFIX: &str = ".lap.gzip";

const TMP_SUFFIX: &str = ".tmp";

/// Destination for confirmed laps
#[async_trait]
pub trait LapSink: Send + Sync + 'static {
    /// Persist a confirmed lap, returning where it was written.
    ///
    /// Failures are returned as-is. Sinks do not retry.
    async fn store(&self, lap: Lap) -> Result<PathBuf>;
}

/// Encode a lap to its protobuf payload
pub fn encode_lap(lap: &Lap) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(lap.encoded_len());
    lap.encode(&mut buffer)?;
    Ok(buffer)
}

/// Decode a protobuf payload produced by [`encode_lap`]
pub fn decode_lap(bytes: &[u8]) -> Result<Lap> {
    Ok(Lap::decode(bytes)?)
}

/// Gzip a payload
pub fn compress(payload: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(payload)
        .map_err(|e| CaptureError::Encode { details: format!("gzip write: {}", e) })?;
    encoder.finish().map_err(|e| CaptureError::Encode { details: format!("gzip finish: {}", e) })
}

/// Inflate a gzip payload
pub fn decompress(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut payload)
        .map_err(|e| CaptureError::Decode { details: format!("gzip: {}", e) })?;
    Ok(payload)
}

/// Staging file name for a lap completed at `timestamp` (unix seconds)
pub fn staging_file_name(timestamp: u64, track: &str, vehicle: &str) -> String {
    format!("{}_{}_{}{}", timestamp, sanitize(track), sanitize(vehicle), LAP_FILE_SUFFIX)
}

fn sanitize(name: &str) -> String {
    name.replace(['/', '\\', ':'], "_")
}

/// Read a staged lap file back
pub fn load_lap(path: impl AsRef<Path>) -> Result<Lap> {
    let path = path.as_ref();
    let compressed = std::fs::read(path).map_err(|e| CaptureError::persist_error(path, e))?;
    decode_lap(&decompress(&compressed)?)
}

/// Writes laps into the uploader's staging directory
#[derive(Debug, Clone)]
pub struct StagingStore {
    dir: PathBuf,
}

impl StagingStore {
    /// The directory must already exist. Creating it belongs to the host.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Encode, compress and write a lap. Blocking.
    ///
    /// Output depends only on the lap value, so rewriting the same stamped lap
    /// reproduces the same file.
    pub fn write(&self, lap: &Lap) -> Result<PathBuf> {
        let payload = encode_lap(lap)?;
        let compressed = compress(&payload)?;

        let name = staging_file_name(lap.timestamp, &lap.track, &lap.car_model);
        let path = self.dir.join(&name);
        let tmp = self.dir.join(format!("{}{}", name, TMP_SUFFIX));

        std::fs::write(&tmp, &compressed).map_err(|e| CaptureError::persist_error(&tmp, e))?;

        if let Err(e) = std::fs::rename(&tmp, &path) {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                warn!("Failed to remove {}: {}", tmp.display(), cleanup);
            }
            return Err(CaptureError::persist_error(&path, e));
        }

        debug!(
            payload_bytes = payload.len(),
            compressed_bytes = compressed.len(),
            frames = lap.len(),
            "Wrote {}",
            path.display()
        );
        Ok(path)
    }

    /// Staged lap files awaiting upload, sorted by name (oldest first)
    pub fn pending(&self) -> Result<Vec<PathBuf>> {
        let entries =
            std::fs::read_dir(&self.dir).map_err(|e| CaptureError::persist_error(&self.dir, e))?;

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_lap = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(LAP_FILE_SUFFIX));
            if is_lap && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl LapSink for StagingStore {
    async fn store(&self, lap: Lap) -> Result<PathBuf> {
        let store = self.clone();
        let path = tokio::task::spawn_blocking(move || store.write(&lap))
            .await
            .map_err(|e| CaptureError::persist_error(&self.dir, std::io::Error::other(e)))??;

        info!("Lap staged for upload: {}", path.display());
        Ok(path)
    }
}
