//! Lossless text codec for calibration data.
//!
//! The format is a stream of ASCII tokens. Every scalar -- including register
//! addresses and values -- is written as a decimal number followed by a
//! single space; a data byte is never emitted raw. Register values routinely
//! collide with byte values like space (32), comma (44), CR (13) and LF (10),
//! and widening them to decimal tokens is what keeps such values from being
//! confused with the stream's own separators.
//!
//! Newlines between logical groups exist only for readability: the reader
//! treats any whitespace run as a single separator. Sequences are stored as a
//! length token followed by their elements; fixed-size arrays also store
//! their length, which the decoder validates. Gamma coefficients use Rust's
//! shortest round-trip float formatting, so `decode(encode(x)) == x` holds
//! exactly.
//!
//! The decoder consumes exactly what the encoder produced: after decoding a
//! top-level value the stream is exhausted, which callers can verify with
//! [`TokenReader::is_exhausted`].

use crate::cache::CalibrationCache;
use crate::error::CodecError;
use crate::model::{
    AnalogFrontend, CalibrationEntry, FrontendKind, FrontendLayout, ScanParams, SensorExposure,
    SensorKind, SensorProfile, ShadingData,
};
use crate::registers::{RegisterSetting, RegisterSettingSet, RegisterValue};
use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

/// Upper bound on any stored sequence length, so a corrupted length token
/// cannot trigger an absurd allocation.
const MAX_SEQUENCE_LEN: u64 = 1 << 24;

/// Writes whitespace-delimited decimal tokens.
pub struct TokenWriter<W: Write> {
    inner: W,
}

impl<W: Write> TokenWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Emit one value as a token followed by a single space.
    pub fn token<T: Display>(&mut self, value: T) -> io::Result<()> {
        write!(self.inner, "{value} ")
    }

    /// Cosmetic group separator.
    pub fn newline(&mut self) -> io::Result<()> {
        self.inner.write_all(b"\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads whitespace-delimited tokens and parses them into numeric types.
pub struct TokenReader<R: BufRead> {
    inner: R,
}

impl<R: BufRead> TokenReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Next token, or `None` at a clean end of input.
    fn next_token(&mut self) -> Result<Option<String>, CodecError> {
        let mut token: Vec<u8> = Vec::new();
        'fill: loop {
            let buf = self.inner.fill_buf()?;
            if buf.is_empty() {
                break;
            }
            let mut used = 0;
            for &byte in buf {
                used += 1;
                if byte.is_ascii_whitespace() {
                    if token.is_empty() {
                        continue;
                    }
                    self.inner.consume(used);
                    break 'fill;
                }
                token.push(byte);
            }
            self.inner.consume(used);
        }

        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(String::from_utf8_lossy(&token).into_owned()))
        }
    }

    /// Parse the next token, failing on end of input or a malformed token.
    pub fn parse<T: FromStr>(&mut self, expected: &'static str) -> Result<T, CodecError> {
        let token = self.next_token()?.ok_or(CodecError::UnexpectedEof)?;
        token
            .parse()
            .map_err(|_| CodecError::MalformedToken { token, expected })
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        self.parse("u8")
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        self.parse("u16")
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        self.parse("u32")
    }

    pub fn u64(&mut self) -> Result<u64, CodecError> {
        self.parse("u64")
    }

    pub fn f32(&mut self) -> Result<f32, CodecError> {
        self.parse("f32")
    }

    /// A bare string token (used for the cache file identifier).
    pub fn ident(&mut self) -> Result<String, CodecError> {
        self.next_token()?.ok_or(CodecError::UnexpectedEof)
    }

    /// Probe for trailing data. Consumes the next token if one exists.
    pub fn is_exhausted(&mut self) -> Result<bool, CodecError> {
        Ok(self.next_token()?.is_none())
    }

    /// A length prefix, bounded so corrupted streams cannot over-allocate.
    fn sequence_len(&mut self) -> Result<u64, CodecError> {
        let len = self.u64()?;
        if len > MAX_SEQUENCE_LEN {
            return Err(CodecError::LengthOutOfRange {
                len,
                limit: MAX_SEQUENCE_LEN,
            });
        }
        Ok(len)
    }
}

fn decode_u16_array<R: BufRead, const N: usize>(
    r: &mut TokenReader<R>,
) -> Result<[u16; N], CodecError> {
    let found = r.sequence_len()?;
    if found != N as u64 {
        return Err(CodecError::ArraySizeMismatch { expected: N, found });
    }
    let mut values = [0u16; N];
    for slot in values.iter_mut() {
        *slot = r.u16()?;
    }
    Ok(values)
}

fn encode_u16_seq<W: Write>(w: &mut TokenWriter<W>, values: &[u16]) -> io::Result<()> {
    w.token(values.len())?;
    w.newline()?;
    for &value in values {
        w.token(value)?;
    }
    w.newline()
}

fn decode_u16_seq<R: BufRead>(r: &mut TokenReader<R>) -> Result<Vec<u16>, CodecError> {
    let len = r.sequence_len()?;
    let mut values = Vec::with_capacity(len as usize);
    for _ in 0..len {
        values.push(r.u16()?);
    }
    Ok(values)
}

fn encode_f32_array<W: Write>(w: &mut TokenWriter<W>, values: &[f32]) -> io::Result<()> {
    w.token(values.len())?;
    w.newline()?;
    for &value in values {
        w.token(value)?;
    }
    w.newline()
}

fn decode_f32_array<R: BufRead, const N: usize>(
    r: &mut TokenReader<R>,
) -> Result<[f32; N], CodecError> {
    let found = r.sequence_len()?;
    if found != N as u64 {
        return Err(CodecError::ArraySizeMismatch { expected: N, found });
    }
    let mut values = [0f32; N];
    for slot in values.iter_mut() {
        *slot = r.f32()?;
    }
    Ok(values)
}

impl<V> RegisterSettingSet<V>
where
    V: RegisterValue + Display + FromStr,
{
    pub fn encode<W: Write>(&self, w: &mut TokenWriter<W>) -> io::Result<()> {
        w.token(self.len())?;
        w.newline()?;
        for reg in self {
            w.token(reg.address)?;
            w.token(reg.value)?;
            w.token(reg.mask)?;
            w.newline()?;
        }
        Ok(())
    }

    pub fn decode<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, CodecError> {
        let len = r.sequence_len()?;
        let mut set = Self::new();
        for _ in 0..len {
            let address = r.u16()?;
            let value = r.parse::<V>("register value")?;
            let mask = r.parse::<V>("register mask")?;
            set.push(RegisterSetting::with_mask(address, value, mask));
        }
        Ok(set)
    }
}

impl FrontendLayout {
    fn encode<W: Write>(&self, w: &mut TokenWriter<W>) -> io::Result<()> {
        encode_u16_seq(w, &self.offset_addr)?;
        encode_u16_seq(w, &self.gain_addr)
    }

    fn decode<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, CodecError> {
        Ok(Self {
            offset_addr: decode_u16_array(r)?,
            gain_addr: decode_u16_array(r)?,
        })
    }
}

impl AnalogFrontend {
    pub fn encode<W: Write>(&self, w: &mut TokenWriter<W>) -> io::Result<()> {
        w.token(self.kind.to_wire())?;
        w.newline()?;
        self.regs.encode(w)?;
        encode_u16_seq(w, &self.reg2)?;
        self.layout.encode(w)
    }

    pub fn decode<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, CodecError> {
        Ok(Self {
            kind: FrontendKind::from_wire(r.u32()?),
            regs: RegisterSettingSet::decode(r)?,
            reg2: decode_u16_array(r)?,
            layout: FrontendLayout::decode(r)?,
        })
    }
}

impl SensorProfile {
    pub fn encode<W: Write>(&self, w: &mut TokenWriter<W>) -> io::Result<()> {
        w.token(self.kind.to_wire())?;
        w.token(self.full_resolution)?;
        w.token(self.black_pixels)?;
        w.token(self.dummy_pixel)?;
        w.token(self.fau_gain_white_ref)?;
        w.token(self.gain_white_ref)?;
        w.newline()?;
        w.token(self.exposure.red)?;
        w.token(self.exposure.green)?;
        w.token(self.exposure.blue)?;
        w.newline()?;
        self.custom_regs.encode(w)?;
        encode_f32_array(w, &self.gamma)
    }

    pub fn decode<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, CodecError> {
        Ok(Self {
            kind: SensorKind::from_wire(r.u32()?),
            full_resolution: r.u32()?,
            black_pixels: r.u32()?,
            dummy_pixel: r.u32()?,
            fau_gain_white_ref: r.u32()?,
            gain_white_ref: r.u32()?,
            exposure: SensorExposure {
                red: r.u16()?,
                green: r.u16()?,
                blue: r.u16()?,
            },
            custom_regs: RegisterSettingSet::decode(r)?,
            gamma: decode_f32_array(r)?,
        })
    }
}

impl ScanParams {
    pub fn encode<W: Write>(&self, w: &mut TokenWriter<W>) -> io::Result<()> {
        w.token(self.channels)?;
        w.token(self.depth)?;
        w.token(self.lines)?;
        w.token(self.pixels)?;
        w.newline()
    }

    pub fn decode<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, CodecError> {
        Ok(Self {
            channels: r.u32()?,
            depth: r.u32()?,
            lines: r.u32()?,
            pixels: r.u32()?,
        })
    }
}

impl ShadingData {
    pub fn encode<W: Write>(&self, w: &mut TokenWriter<W>) -> io::Result<()> {
        w.token(self.average_size())?;
        w.newline()?;
        encode_u16_seq(w, self.white_average())?;
        encode_u16_seq(w, self.dark_average())
    }

    pub fn decode<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, CodecError> {
        let declared = u64::from(r.u32()?);
        let white = decode_u16_seq(r)?;
        let dark = decode_u16_seq(r)?;
        if white.len() as u64 != declared || dark.len() as u64 != declared {
            return Err(CodecError::ShadingSizeMismatch {
                declared,
                white: white.len(),
                dark: dark.len(),
            });
        }
        Ok(Self::new(white, dark))
    }
}

impl CalibrationEntry {
    pub fn encode<W: Write>(&self, w: &mut TokenWriter<W>) -> io::Result<()> {
        self.params.encode(w)?;
        w.token(self.calibrated_at)?;
        w.newline()?;
        self.frontend.encode(w)?;
        self.sensor.encode(w)?;
        self.shading.encode(w)
    }

    pub fn decode<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, CodecError> {
        Ok(Self {
            params: ScanParams::decode(r)?,
            calibrated_at: r.u64()?,
            frontend: AnalogFrontend::decode(r)?,
            sensor: SensorProfile::decode(r)?,
            shading: ShadingData::decode(r)?,
        })
    }
}

impl CalibrationCache {
    pub fn encode<W: Write>(&self, w: &mut TokenWriter<W>) -> io::Result<()> {
        w.token(self.len())?;
        w.newline()?;
        for entry in self.iter() {
            entry.encode(w)?;
        }
        Ok(())
    }

    pub fn decode<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, CodecError> {
        let len = r.sequence_len()?;
        let mut cache = Self::new();
        for _ in 0..len {
            cache.store(CalibrationEntry::decode(r)?);
        }
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::SensorRegisterSet;
    use std::io::Cursor;

    fn reader(text: &str) -> TokenReader<Cursor<Vec<u8>>> {
        TokenReader::new(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_tokens_split_on_any_whitespace() {
        let mut r = reader("  12\n\n 34\t56 ");
        assert_eq!(r.u32().unwrap(), 12);
        assert_eq!(r.u32().unwrap(), 34);
        assert_eq!(r.u32().unwrap(), 56);
        assert!(r.is_exhausted().unwrap());
    }

    #[test]
    fn test_end_of_stream_is_an_error_mid_value() {
        let mut r = reader("12 ");
        assert_eq!(r.u32().unwrap(), 12);
        assert!(matches!(r.u32(), Err(CodecError::UnexpectedEof)));
    }

    #[test]
    fn test_malformed_token_reports_expectation() {
        let mut r = reader("0x1f ");
        let err = r.u16().unwrap_err();
        match err {
            CodecError::MalformedToken { token, expected } => {
                assert_eq!(token, "0x1f");
                assert_eq!(expected, "u16");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_register_set_roundtrip_preserves_order_and_mask() {
        let mut regs = SensorRegisterSet::new();
        regs.set_value(0x16, 0x33);
        regs.set_value(0x08, 0x01);
        regs.push(RegisterSetting::with_mask(0x6c, 0x01, 0x0f));

        let mut w = TokenWriter::new(Vec::new());
        regs.encode(&mut w).unwrap();
        let bytes = w.into_inner();

        let mut r = TokenReader::new(Cursor::new(bytes));
        let decoded = SensorRegisterSet::decode(&mut r).unwrap();
        assert_eq!(decoded, regs);
        assert!(r.is_exhausted().unwrap());
    }

    #[test]
    fn test_delimiter_valued_registers_are_widened_to_tokens() {
        // Addresses and values equal to space, comma, CR and LF bytes.
        let mut regs = SensorRegisterSet::new();
        regs.set_value(b' ' as u16, 0x80);
        regs.set_value(b',' as u16, 0x80);
        regs.set_value(b'\r' as u16, b'\n');
        regs.set_value(b'\n' as u16, 0x00);

        let mut w = TokenWriter::new(Vec::new());
        regs.encode(&mut w).unwrap();
        let bytes = w.into_inner();

        // No raw delimiter-valued data byte appears: every value is decimal.
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("32 "));
        assert!(text.contains("44 "));
        assert!(text.contains("13 10 "));

        let mut r = TokenReader::new(Cursor::new(bytes));
        assert_eq!(SensorRegisterSet::decode(&mut r).unwrap(), regs);
    }

    #[test]
    fn test_gamma_floats_roundtrip_exactly() {
        let gamma = [1.0f32, 2.2, 0.454_545_47];
        let mut w = TokenWriter::new(Vec::new());
        encode_f32_array(&mut w, &gamma).unwrap();

        let mut r = TokenReader::new(Cursor::new(w.into_inner()));
        let decoded: [f32; 3] = decode_f32_array(&mut r).unwrap();
        assert_eq!(decoded.map(f32::to_bits), gamma.map(f32::to_bits));
    }

    #[test]
    fn test_array_size_mismatch_is_rejected() {
        let mut r = reader("2\n10 20 ");
        let err = decode_u16_array::<_, 3>(&mut r).unwrap_err();
        assert!(matches!(
            err,
            CodecError::ArraySizeMismatch {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn test_absurd_sequence_length_is_rejected() {
        let mut r = reader("99999999999 ");
        assert!(matches!(
            decode_u16_seq(&mut r),
            Err(CodecError::LengthOutOfRange { .. })
        ));
    }

    #[test]
    fn test_shading_length_consistency_is_checked() {
        // Declared size 3 but only two white entries stored.
        let mut r = reader("3\n2\n8 7 \n3\n6 5 4 ");
        assert!(matches!(
            ShadingData::decode(&mut r),
            Err(CodecError::ShadingSizeMismatch { .. })
        ));
    }
}
