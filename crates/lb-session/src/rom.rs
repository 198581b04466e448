//! ROM loading from host-provided byte sources
//!
//! The host hands the bridge an opaque identifier (a path or a `file://`
//! URI). A [`ByteSource`] resolves it to a reader; [`RomLoader`] drains the
//! reader into a [`RomImage`] the engine can take ownership of.

use lb_core::config::RomConfig;
use lb_core::RomError;
use lb_engine::RomImage;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Size of the header prepended by cartridge copier devices
const COPIER_HEADER_SIZE: usize = 512;

/// SNES ROM bank granularity
const ROM_BANK_SIZE: usize = 0x8000;

/// Resolves an opaque ROM identifier into readable bytes
pub trait ByteSource: Send + Sync {
    fn open_read(&self, identifier: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// Reads plain paths and `file://` URIs from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FileByteSource {
    /// Base directory for relative identifiers
    root: Option<PathBuf>,
}

impl FileByteSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative identifiers against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, identifier: &str) -> io::Result<PathBuf> {
        let path = match identifier.strip_prefix("file://") {
            Some(rest) => rest,
            None if identifier.contains("://") => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("unsupported ROM location '{}'", identifier),
                ));
            }
            None => identifier,
        };

        let path = PathBuf::from(path);
        Ok(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        })
    }
}

impl ByteSource for FileByteSource {
    fn open_read(&self, identifier: &str) -> io::Result<Box<dyn Read + Send>> {
        let path = self.resolve(identifier)?;
        debug!("Opening ROM file {}", path.display());
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

/// In-memory byte source keyed by identifier
#[derive(Debug, Default)]
pub struct MemoryByteSource {
    blobs: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemoryByteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identifier: impl Into<String>, data: impl Into<Vec<u8>>) {
        let data: Vec<u8> = data.into();
        self.blobs.write().insert(identifier.into(), data.into());
    }
}

impl ByteSource for MemoryByteSource {
    fn open_read(&self, identifier: &str) -> io::Result<Box<dyn Read + Send>> {
        let data = self.blobs.read().get(identifier).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no blob '{}'", identifier))
        })?;
        Ok(Box::new(Cursor::new(data)))
    }
}

/// Reads ROM images through a [`ByteSource`]
pub struct RomLoader {
    source: Arc<dyn ByteSource>,
    max_size: usize,
    strip_copier_header: bool,
}

impl RomLoader {
    pub fn new(source: Arc<dyn ByteSource>, config: &RomConfig) -> Self {
        Self {
            source,
            max_size: config.max_size_bytes,
            strip_copier_header: config.strip_copier_header,
        }
    }

    /// Resolve `identifier` and read the whole image
    pub fn open(&self, identifier: &str) -> Result<RomImage, RomError> {
        let reader = self
            .source
            .open_read(identifier)
            .map_err(|source| RomError::ReadFailed {
                identifier: identifier.to_string(),
                source,
            })?;
        self.load(reader, identifier)
    }

    /// Read a complete image from `reader`.
    ///
    /// At most `max_size + 1` bytes are consumed so an oversized stream is
    /// rejected without being buffered.
    pub fn load(&self, reader: impl Read, identifier: &str) -> Result<RomImage, RomError> {
        let mut data = Vec::new();
        reader
            .take(self.max_size as u64 + 1)
            .read_to_end(&mut data)
            .map_err(|source| RomError::ReadFailed {
                identifier: identifier.to_string(),
                source,
            })?;

        if data.is_empty() {
            return Err(RomError::Empty);
        }
        if data.len() > self.max_size {
            return Err(RomError::Invalid(format!(
                "'{}' exceeds {} bytes",
                identifier, self.max_size
            )));
        }

        if self.strip_copier_header && has_copier_header(&data) {
            debug!("Stripping {}-byte copier header from '{}'", COPIER_HEADER_SIZE, identifier);
            data.drain(..COPIER_HEADER_SIZE);
        }

        info!("Read ROM '{}' ({} bytes)", identifier, data.len());
        Ok(RomImage::new(data, identifier))
    }
}

impl std::fmt::Debug for RomLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RomLoader")
            .field("max_size", &self.max_size)
            .field("strip_copier_header", &self.strip_copier_header)
            .finish()
    }
}

fn has_copier_header(data: &[u8]) -> bool {
    data.len() > COPIER_HEADER_SIZE && data.len() % ROM_BANK_SIZE == COPIER_HEADER_SIZE
}
