//! calibration - Per-mode scanner calibration state and its persistence.
//!
//! A physical calibration run measures the analog front end, the sensor, and
//! the per-column shading references for one scan configuration; the result
//! is a [`CalibrationEntry`] value. This crate holds the data model for those
//! entries, the keyed in-memory [`CalibrationCache`], the lossless text codec
//! used to persist caches, and the [`CalibrationStorage`] layer that maps
//! device identities to cache files on disk.
//!
//! The calibration producer and the register-programming consumer communicate
//! purely through these values: entries are immutable once built and are
//! replaced wholesale when a mode is recalibrated.

pub mod cache;
pub mod codec;
pub mod error;
pub mod model;
pub mod registers;
pub mod settings;
pub mod storage;

pub use cache::CalibrationCache;
pub use codec::{TokenReader, TokenWriter};
pub use error::CodecError;
pub use model::{
    AnalogFrontend, CalibrationEntry, FrontendKind, FrontendLayout, ScanParams, SensorExposure,
    SensorKind, SensorProfile, ShadingData,
};
pub use registers::{
    FrontendRegisterSet, RegisterSetting, RegisterSettingSet, RegisterValue, SensorRegisterSet,
};
pub use settings::{ColorMode, ScanMethod, ScanSettings};
pub use storage::{CalibrationStorage, DeviceId};
