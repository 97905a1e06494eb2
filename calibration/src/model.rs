//! Calibration data model.
//!
//! Value objects describing the analog/digital correction state captured by a
//! physical calibration run: front-end and sensor register state, per-channel
//! exposure and gamma, and the white/dark shading references. An entry is an
//! independent, copyable value; regenerating a mode's calibration produces a
//! brand-new entry rather than mutating the one a scan may still be using.
//!
//! Equality between entries is deep and order-sensitive over every field.
//! Gamma samples compare as exact `f32` bits: they are write-once constants,
//! not computed results, so no tolerance applies.

use crate::registers::{FrontendRegisterSet, SensorRegisterSet};
use std::fmt;

/// Identifies an analog front-end chip.
///
/// The wire format stores the raw discriminant, and discriminants outside the
/// named range decode as [`FrontendKind::Other`], so caches written against a
/// newer chip table still round-trip losslessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrontendKind {
    #[default]
    Unknown,
    WolfsonUmax,
    WolfsonSt12,
    WolfsonHp2300,
    AnalogDevicesXp200,
    CanonLide80,
    Other(u32),
}

impl FrontendKind {
    pub fn to_wire(self) -> u32 {
        match self {
            FrontendKind::Unknown => 0,
            FrontendKind::WolfsonUmax => 1,
            FrontendKind::WolfsonSt12 => 2,
            FrontendKind::WolfsonHp2300 => 3,
            FrontendKind::AnalogDevicesXp200 => 4,
            FrontendKind::CanonLide80 => 5,
            FrontendKind::Other(raw) => raw,
        }
    }

    pub fn from_wire(raw: u32) -> Self {
        match raw {
            0 => FrontendKind::Unknown,
            1 => FrontendKind::WolfsonUmax,
            2 => FrontendKind::WolfsonSt12,
            3 => FrontendKind::WolfsonHp2300,
            4 => FrontendKind::AnalogDevicesXp200,
            5 => FrontendKind::CanonLide80,
            raw => FrontendKind::Other(raw),
        }
    }
}

impl fmt::Display for FrontendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrontendKind::Unknown => write!(f, "unknown"),
            FrontendKind::WolfsonUmax => write!(f, "wolfson-umax"),
            FrontendKind::WolfsonSt12 => write!(f, "wolfson-st12"),
            FrontendKind::WolfsonHp2300 => write!(f, "wolfson-hp2300"),
            FrontendKind::AnalogDevicesXp200 => write!(f, "analog-devices-xp200"),
            FrontendKind::CanonLide80 => write!(f, "canon-lide-80"),
            FrontendKind::Other(raw) => write!(f, "other({raw})"),
        }
    }
}

/// Identifies an image sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorKind {
    #[default]
    Unknown,
    CcdUmax,
    Ccd5345,
    CcdHp2300,
    CcdCanon8600F,
    CisCanonLide110,
    CisCanonLide210,
    Other(u32),
}

impl SensorKind {
    pub fn to_wire(self) -> u32 {
        match self {
            SensorKind::Unknown => 0,
            SensorKind::CcdUmax => 1,
            SensorKind::Ccd5345 => 2,
            SensorKind::CcdHp2300 => 3,
            SensorKind::CcdCanon8600F => 4,
            SensorKind::CisCanonLide110 => 5,
            SensorKind::CisCanonLide210 => 6,
            SensorKind::Other(raw) => raw,
        }
    }

    pub fn from_wire(raw: u32) -> Self {
        match raw {
            0 => SensorKind::Unknown,
            1 => SensorKind::CcdUmax,
            2 => SensorKind::Ccd5345,
            3 => SensorKind::CcdHp2300,
            4 => SensorKind::CcdCanon8600F,
            5 => SensorKind::CisCanonLide110,
            6 => SensorKind::CisCanonLide210,
            raw => SensorKind::Other(raw),
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Unknown => write!(f, "unknown"),
            SensorKind::CcdUmax => write!(f, "ccd-umax"),
            SensorKind::Ccd5345 => write!(f, "ccd-5345"),
            SensorKind::CcdHp2300 => write!(f, "ccd-hp2300"),
            SensorKind::CcdCanon8600F => write!(f, "ccd-canon-8600f"),
            SensorKind::CisCanonLide110 => write!(f, "cis-canon-lide-110"),
            SensorKind::CisCanonLide210 => write!(f, "cis-canon-lide-210"),
            SensorKind::Other(raw) => write!(f, "other({raw})"),
        }
    }
}

/// Per-channel offset and gain register addresses of a front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrontendLayout {
    pub offset_addr: [u16; 3],
    pub gain_addr: [u16; 3],
}

/// Resolved state of the analog front end for one calibrated mode.
///
/// The front end converts the sensor's analog signal to digital values; the
/// offset and gain registers named by `layout` are the knobs the calibration
/// routine turns per channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnalogFrontend {
    pub kind: FrontendKind,
    pub regs: FrontendRegisterSet,
    /// Extra control registers outside the addressed map.
    pub reg2: [u16; 3],
    pub layout: FrontendLayout,
}

impl AnalogFrontend {
    /// Store the offset value for a channel (0 = red, 1 = green, 2 = blue).
    pub fn set_offset(&mut self, channel: usize, value: u16) {
        self.regs.set_value(self.layout.offset_addr[channel], value);
    }

    pub fn set_gain(&mut self, channel: usize, value: u16) {
        self.regs.set_value(self.layout.gain_addr[channel], value);
    }

    pub fn get_offset(&self, channel: usize) -> Option<u16> {
        self.regs.get_value(self.layout.offset_addr[channel])
    }

    pub fn get_gain(&self, channel: usize) -> Option<u16> {
        self.regs.get_value(self.layout.gain_addr[channel])
    }
}

/// Initial exposure per color channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorExposure {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl SensorExposure {
    pub fn new(red: u16, green: u16, blue: u16) -> Self {
        Self { red, green, blue }
    }
}

/// Resolved sensor state for one calibrated mode.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SensorProfile {
    pub kind: SensorKind,
    /// Sensor resolution in CCD pixels.
    pub full_resolution: u32,
    /// Optically black pixels at the start of each line.
    pub black_pixels: u32,
    /// Value of the dummy-pixel register.
    pub dummy_pixel: u32,
    /// Transparency-adapter target code (reference gain).
    pub fau_gain_white_ref: u32,
    /// Target code (reference gain).
    pub gain_white_ref: u32,
    pub exposure: SensorExposure,
    pub custom_regs: SensorRegisterSet,
    /// Per-channel gamma coefficients for the default gamma tables.
    pub gamma: [f32; 3],
}

/// Scan parameters a calibration entry was produced for; also the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScanParams {
    pub channels: u32,
    pub depth: u32,
    pub lines: u32,
    pub pixels: u32,
}

/// White and dark per-column reference data for shading correction.
///
/// The two arrays always have the same length; `ShadingData::new` enforces
/// this, and the decoder re-checks it against the stored size.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShadingData {
    average_size: u32,
    white_average: Vec<u16>,
    dark_average: Vec<u16>,
}

impl ShadingData {
    pub fn new(white_average: Vec<u16>, dark_average: Vec<u16>) -> Self {
        assert_eq!(
            white_average.len(),
            dark_average.len(),
            "white and dark shading references must have the same length"
        );
        Self {
            average_size: white_average.len() as u32,
            white_average,
            dark_average,
        }
    }

    pub fn average_size(&self) -> u32 {
        self.average_size
    }

    pub fn white_average(&self) -> &[u16] {
        &self.white_average
    }

    pub fn dark_average(&self) -> &[u16] {
        &self.dark_average
    }

    pub fn is_empty(&self) -> bool {
        self.average_size == 0
    }
}

/// Saved calibration state for one scan configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibrationEntry {
    pub params: ScanParams,
    /// Unix seconds of the calibration run that produced this entry.
    pub calibrated_at: u64,
    pub frontend: AnalogFrontend,
    pub sensor: SensorProfile,
    pub shading: ShadingData,
}

impl CalibrationEntry {
    /// Whether this entry satisfies a lookup for `params`.
    pub fn matches(&self, params: &ScanParams) -> bool {
        self.params == *params
    }
}
