//! Cartridge battery RAM persistence
//!
//! Battery files live in one directory and are named after the ROM they
//! belong to: `<dir>/<rom stem>.srm`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const BATTERY_EXTENSION: &str = "srm";

/// Directory of `.srm` files keyed by ROM identifier
#[derive(Debug, Clone)]
pub struct SaveStore {
    dir: PathBuf,
}

impl SaveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Battery file path for a ROM identifier
    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", rom_stem(identifier), BATTERY_EXTENSION))
    }

    /// Write battery RAM, replacing any previous file atomically
    pub fn store(&self, identifier: &str, data: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(identifier);
        let tmp = path.with_extension("srm.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        debug!("Wrote {} bytes of battery RAM to {}", data.len(), path.display());
        Ok(path)
    }

    /// Read battery RAM; `None` if the ROM has never been saved
    pub fn load(&self, identifier: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(identifier)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// File-system safe stem of the last path segment of an identifier
fn rom_stem(identifier: &str) -> String {
    let decoded = percent_decode(identifier);
    let name = decoded
        .rsplit(|c| c == '/' || c == '\\' || c == ':')
        .next()
        .unwrap_or_default();
    let stem = match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    };

    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim().is_empty() {
        "rom".to_string()
    } else {
        sanitized
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
