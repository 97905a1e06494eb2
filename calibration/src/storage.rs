//! On-disk calibration cache, keyed by device identity.
//!
//! Each device gets one cache file under the configuration root (defaults to
//! `~/.flatbed/calibration/`). The file starts with an identifying header --
//! format ident, format version, and the device identity it was written for
//! -- followed by the serialized cache. A missing file, a stale header, or a
//! failed parse all degrade to an empty cache: the backend then re-runs
//! physical calibration and repopulates the file, so none of these cases is
//! fatal.

use crate::cache::CalibrationCache;
use crate::codec::{TokenReader, TokenWriter};
use crate::error::CodecError;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// First token of every calibration cache file.
pub const CALIBRATION_IDENT: &str = "flatbed.calibration";

/// Bump whenever the serialized layout of the cache changes; older files are
/// then treated as stale and recalibrated from scratch.
pub const CALIBRATION_VERSION: u32 = 1;

/// USB identity of a scanner, as reported by its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Device/firmware revision (bcdDevice).
    pub bcd_device: u16,
}

impl DeviceId {
    pub fn new(vendor_id: u16, product_id: u16, bcd_device: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            bcd_device,
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} rev {:04x}",
            self.vendor_id, self.product_id, self.bcd_device
        )
    }
}

/// Write the versioned cache image for `device` to `out`.
pub fn write_cache_file<W: Write>(
    out: W,
    device: &DeviceId,
    cache: &CalibrationCache,
) -> io::Result<()> {
    let mut w = TokenWriter::new(out);
    w.token(CALIBRATION_IDENT)?;
    w.token(CALIBRATION_VERSION)?;
    w.token(device.vendor_id)?;
    w.token(device.product_id)?;
    w.token(device.bcd_device)?;
    w.newline()?;
    cache.encode(&mut w)?;
    w.flush()
}

/// Read a cache image, validating the header against `device`.
///
/// Returns `Ok(None)` when the header does not match -- wrong ident, older
/// format version, or a different device identity. Such a file is stale, not
/// corrupt; the caller treats it like a missing file. Parse failures in the
/// body are reported as [`CodecError`].
pub fn read_cache_file<R: BufRead>(
    input: R,
    device: &DeviceId,
) -> Result<Option<CalibrationCache>, CodecError> {
    let mut r = TokenReader::new(input);

    let ident = r.ident()?;
    if ident != CALIBRATION_IDENT {
        log::info!("calibration file has unknown ident {ident:?}");
        return Ok(None);
    }

    let version = r.u32()?;
    if version != CALIBRATION_VERSION {
        log::info!("calibration file has version {version}, expected {CALIBRATION_VERSION}");
        return Ok(None);
    }

    let stored = DeviceId::new(r.u16()?, r.u16()?, r.u16()?);
    if stored != *device {
        log::info!("calibration file was written for {stored}, not {device}");
        return Ok(None);
    }

    Ok(Some(CalibrationCache::decode(&mut r)?))
}

/// Storage manager for per-device calibration cache files.
#[derive(Debug, Clone)]
pub struct CalibrationStorage {
    /// Root directory for all configuration (e.g., ~/.flatbed)
    root_path: PathBuf,
}

impl CalibrationStorage {
    /// Create a new storage with the default root (~/.flatbed)
    pub fn new() -> io::Result<Self> {
        let home = std::env::var("HOME")
            .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
        let root_path = PathBuf::from(home).join(".flatbed");
        Ok(Self { root_path })
    }

    /// Create a new storage with a custom root path
    pub fn with_path(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Get the root configuration path
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn calibration_dir(&self) -> PathBuf {
        self.root_path.join("calibration")
    }

    /// Cache file location for a device.
    pub fn cache_file_path(&self, device: &DeviceId) -> PathBuf {
        let filename = format!(
            "{:04x}_{:04x}_{:04x}.cal",
            device.vendor_id, device.product_id, device.bcd_device
        );
        self.calibration_dir().join(filename)
    }

    /// Load the cache for a device, distinguishing missing from unreadable.
    ///
    /// Returns `None` if no cache file exists, `Some(Err)` if the file could
    /// not be read or parsed, and `Some(Ok)` otherwise. A file with a stale
    /// header parses to an empty cache.
    pub fn try_load_cache(&self, device: &DeviceId) -> Option<Result<CalibrationCache, CodecError>> {
        let path = self.cache_file_path(device);
        if !path.exists() {
            return None;
        }

        let load = || {
            let file = File::open(&path).map_err(CodecError::from)?;
            match read_cache_file(BufReader::new(file), device)? {
                Some(cache) => Ok(cache),
                None => {
                    log::info!("ignoring stale calibration file {}", path.display());
                    Ok(CalibrationCache::new())
                }
            }
        };
        Some(load())
    }

    /// Load the cache for a device, degrading every failure to an empty
    /// cache.
    ///
    /// An empty result forces the physical calibration routine to run and
    /// repopulate the entry, which is the intended recovery for all of the
    /// miss, stale, and corrupt cases.
    pub fn load_cache(&self, device: &DeviceId) -> CalibrationCache {
        match self.try_load_cache(device) {
            None => {
                log::info!("no calibration cache for {device}");
                CalibrationCache::new()
            }
            Some(Ok(cache)) => {
                log::debug!("loaded {} calibration entries for {device}", cache.len());
                cache
            }
            Some(Err(err)) => {
                log::warn!("discarding unreadable calibration cache for {device}: {err}");
                CalibrationCache::new()
            }
        }
    }

    /// Save the cache for a device.
    ///
    /// Creates the calibration directory if it doesn't exist.
    /// Returns the path where the cache was saved.
    pub fn save_cache(
        &self,
        device: &DeviceId,
        cache: &CalibrationCache,
    ) -> io::Result<PathBuf> {
        let dir = self.calibration_dir();
        std::fs::create_dir_all(&dir)?;

        let path = self.cache_file_path(device);
        let file = File::create(&path)?;
        write_cache_file(BufWriter::new(file), device, cache)?;
        Ok(path)
    }

    /// Delete the cache file for a device.
    ///
    /// Returns Ok(true) if the file was deleted, Ok(false) if it didn't exist.
    pub fn delete_cache(&self, device: &DeviceId) -> io::Result<bool> {
        let path = self.cache_file_path(device);

        if !path.exists() {
            return Ok(false);
        }

        std::fs::remove_file(path)?;
        Ok(true)
    }
}

impl Default for CalibrationStorage {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::with_path(PathBuf::from(".flatbed")))
    }
}
