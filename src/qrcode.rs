//! QR code symbol encoding.
//!
//! This module turns a payload into a QR Code Model 2 symbol: it picks the smallest version that
//! fits, assembles the byte-mode bit stream, adds Reed–Solomon error correction, lays out the
//! function patterns and data modules, and selects the mask with the lowest penalty score.
//!
//! Everything here is a pure function of its inputs. A [`QrCode`] owns its module grid and is
//! immutable once built, so symbols can be produced concurrently without any coordination.

use core::fmt;
use core::str::FromStr;

use thiserror::Error;
use tracing::debug;

/// Encodes `payload` at the given error correction level.
///
/// The search starts at `preferred_version` (or version 1) and stops at the first version whose
/// capacity fits the payload. This is shorthand for [`Encoder::new`] with
/// [`Encoder::min_version`].
///
/// # Example
///
/// ```rust
/// use upi_qr::qrcode::{encode, QrCodeEcc};
///
/// let qr = encode("upi://pay?pa=shop@bank&pn=Shop&cu=INR", QrCodeEcc::Low, None).unwrap();
/// assert_eq!(qr.size(), qr.version().value() as i32 * 4 + 17);
/// ```
pub fn encode(
    payload: &str,
    ecl: QrCodeEcc,
    preferred_version: Option<Version>,
) -> Result<QrCode, EncodeError> {
    let mut encoder = Encoder::new(ecl);
    if let Some(version) = preferred_version {
        encoder = encoder.min_version(version);
    }
    encoder.encode_text(payload)
}

/// How text is turned into the bytes of a byte-mode segment.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Charset {
    /// The UTF-8 bytes of the text. Every string is representable.
    #[default]
    Utf8,
    /// ISO-8859-1, the default interpretation of byte mode. Characters above U+00FF are rejected.
    Latin1,
}

/// Encoding parameters for building a [`QrCode`].
///
/// `Encoder` is a plain value: build it once and reuse it from any number of threads.
///
/// ```rust
/// use upi_qr::qrcode::{Encoder, Mask, QrCodeEcc, Version};
///
/// let qr = Encoder::new(QrCodeEcc::Medium)
///     .min_version(Version::new(2))
///     .mask(Mask::new(3))
///     .encode_text("Hello, World!")
///     .unwrap();
/// assert_eq!(qr.version(), Version::new(2));
/// assert_eq!(qr.mask(), Mask::new(3));
/// ```
#[derive(Clone, Debug)]
pub struct Encoder {
    ecl: QrCodeEcc,
    minversion: Version,
    maxversion: Version,
    mask: Option<Mask>,
    boostecl: bool,
    charset: Charset,
}

impl Encoder {
    /// Creates an encoder searching versions 1 to 40 with automatic mask selection.
    pub fn new(ecl: QrCodeEcc) -> Self {
        Self {
            ecl,
            minversion: Version::MIN,
            maxversion: Version::MAX,
            mask: None,
            boostecl: false,
            charset: Charset::Utf8,
        }
    }

    /// Sets the preferred (smallest acceptable) version.
    pub fn min_version(mut self, version: Version) -> Self {
        self.minversion = version;
        self
    }

    /// Sets the largest version the search may reach.
    pub fn max_version(mut self, version: Version) -> Self {
        self.maxversion = version;
        self
    }

    /// Pins the mask pattern instead of choosing the one with the lowest penalty.
    pub fn mask(mut self, mask: Mask) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Raises the error correction level as far as it goes without growing the symbol.
    pub fn boost_ecl(mut self, boost: bool) -> Self {
        self.boostecl = boost;
        self
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Encodes a text string in byte mode.
    ///
    /// # Errors
    ///
    /// [`EncodeError::InvalidCharacter`] if the text is not representable in the configured
    /// [`Charset`], [`EncodeError::CapacityExceeded`] if it does not fit the version range.
    pub fn encode_text(&self, text: &str) -> Result<QrCode, EncodeError> {
        let data = match self.charset {
            Charset::Utf8 => text.as_bytes().to_vec(),
            Charset::Latin1 => latin1_bytes(text)?,
        };
        self.encode_binary(&data)
    }

    /// Encodes arbitrary bytes in byte mode.
    pub fn encode_binary(&self, data: &[u8]) -> Result<QrCode, EncodeError> {
        let maxversion = self.maxversion.max(self.minversion);
        let (datacodewords, ecl, version) =
            encode_to_codewords(data, self.ecl, self.minversion, maxversion, self.boostecl)?;
        let qr = QrCode::encode_codewords(&datacodewords, ecl, version, self.mask);
        debug!(
            bytes = data.len(),
            version = version.value(),
            ecl = ?ecl,
            mask = qr.mask().value(),
            "encoded QR symbol"
        );
        Ok(qr)
    }
}

/// A QR Code symbol: a square grid of dark and light modules.
///
/// Besides the color of each module the symbol remembers which modules are function modules
/// (finder, separator, timing, alignment, format and version information). Instances are
/// immutable after creation; build them with [`encode`] or an [`Encoder`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct QrCode {
    version: Version,
    // Between 21 and 177 inclusive, equal to version * 4 + 17.
    size: i32,
    errorcorrectionlevel: QrCodeEcc,
    mask: Mask,
    // Row-major, true = dark.
    modules: Vec<bool>,
    isfunction: Vec<bool>,
}

impl QrCode {
    /// Builds the symbol for already padded data codewords.
    ///
    /// `datacodewords` must be exactly the data capacity of `version` at `ecl`.
    /// With `mask == None` all eight patterns are tried and the lowest penalty wins.
    fn encode_codewords(
        datacodewords: &[u8],
        ecl: QrCodeEcc,
        version: Version,
        mask: Option<Mask>,
    ) -> Self {
        let size = i32::from(version.value()) * 4 + 17;
        let cells = (size * size) as usize;
        let mut result = Self {
            version,
            size,
            errorcorrectionlevel: ecl,
            mask: Mask::new(0),
            modules: vec![false; cells],
            isfunction: vec![false; cells],
        };

        result.draw_function_patterns();
        let allcodewords = add_ecc_and_interleave(datacodewords, version, ecl);
        result.draw_codewords(&allcodewords);

        let mask = mask.unwrap_or_else(|| {
            let mut best = Mask::new(0);
            let mut minpenalty = i32::MAX;
            for i in 0u8..8 {
                let candidate = Mask::new(i);
                result.apply_mask(candidate);
                result.draw_format_bits(candidate);
                let penalty = result.penalty_score();
                if penalty < minpenalty {
                    best = candidate;
                    minpenalty = penalty;
                }
                result.apply_mask(candidate); // XOR again to undo
            }
            best
        });
        result.apply_mask(mask);
        result.draw_format_bits(mask);
        result.mask = mask;
        result
    }

    /// Returns this QR Code's version, in the range [1, 40].
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns this QR Code's size in modules, in the range [21, 177].
    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn error_correction_level(&self) -> QrCodeEcc {
        self.errorcorrectionlevel
    }

    /// Returns the mask pattern applied to the data modules.
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Returns the color of the module at the given coordinates.
    ///
    /// `true` is dark and `false` is light. Coordinates outside the symbol are light, which makes
    /// the quiet zone fall out naturally when rendering with negative offsets.
    ///
    /// # Arguments
    ///
    /// * `x` - X-coordinate (0 is left).
    /// * `y` - Y-coordinate (0 is top).
    pub fn get_module(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some_and(|i| self.modules[i])
    }

    /// Returns whether the module at the given coordinates is reserved for a function pattern.
    pub fn is_function_module(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some_and(|i| self.isfunction[i])
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let range = 0..self.size;
        (range.contains(&x) && range.contains(&y)).then(|| (y * self.size + x) as usize)
    }

    fn set_function_module(&mut self, x: i32, y: i32, isdark: bool) {
        let i = (y * self.size + x) as usize;
        self.modules[i] = isdark;
        self.isfunction[i] = true;
    }

    /*---- Function patterns ----*/

    fn draw_function_patterns(&mut self) {
        let size = self.size;
        for i in 0..size {
            self.set_function_module(6, i, i % 2 == 0);
            self.set_function_module(i, 6, i % 2 == 0);
        }

        self.draw_finder_pattern(3, 3);
        self.draw_finder_pattern(size - 4, 3);
        self.draw_finder_pattern(3, size - 4);

        let alignpatpos = alignment_pattern_positions(self.version);
        let last = alignpatpos.len().saturating_sub(1);
        for (i, &pos0) in alignpatpos.iter().enumerate() {
            for (j, &pos1) in alignpatpos.iter().enumerate() {
                // The three corners taken by finder patterns
                if (i == 0 && j == 0) || (i == 0 && j == last) || (i == last && j == 0) {
                    continue;
                }
                self.draw_alignment_pattern(pos0, pos1);
            }
        }

        // Reserve the format area; real bits are written once the mask is known
        self.draw_format_bits(Mask::new(0));
        self.draw_version();
    }

    // Finder pattern plus its light separator, clipped at the symbol edge.
    fn draw_finder_pattern(&mut self, x: i32, y: i32) {
        for dy in -4..=4 {
            for dx in -4..=4 {
                let xx = x + dx;
                let yy = y + dy;
                if (0..self.size).contains(&xx) && (0..self.size).contains(&yy) {
                    let dist = dx.abs().max(dy.abs());
                    self.set_function_module(xx, yy, dist != 2 && dist != 4);
                }
            }
        }
    }

    fn draw_alignment_pattern(&mut self, x: i32, y: i32) {
        for dy in -2..=2 {
            for dx in -2..=2 {
                self.set_function_module(x + dx, y + dy, dx.abs().max(dy.abs()) != 1);
            }
        }
    }

    fn draw_format_bits(&mut self, mask: Mask) {
        let bits = format_bits(self.errorcorrectionlevel, mask);
        let size = self.size;

        // First copy, around the top left finder
        for i in 0..6 {
            self.set_function_module(8, i, get_bit(bits, i as u8));
        }
        self.set_function_module(8, 7, get_bit(bits, 6));
        self.set_function_module(8, 8, get_bit(bits, 7));
        self.set_function_module(7, 8, get_bit(bits, 8));
        for i in 9..15 {
            self.set_function_module(14 - i, 8, get_bit(bits, i as u8));
        }

        // Second copy, split between the other two finders
        for i in 0..8 {
            self.set_function_module(size - 1 - i, 8, get_bit(bits, i as u8));
        }
        for i in 8..15 {
            self.set_function_module(8, size - 15 + i, get_bit(bits, i as u8));
        }
        self.set_function_module(8, size - 8, true);
    }

    fn draw_version(&mut self) {
        let Some(bits) = version_bits(self.version) else {
            return;
        };
        for i in 0u8..18 {
            let bit = get_bit(bits, i);
            let a = self.size - 11 + i32::from(i % 3);
            let b = i32::from(i / 3);
            self.set_function_module(a, b, bit);
            self.set_function_module(b, a, bit);
        }
    }

    /*---- Data placement and masking ----*/

    // Zig-zag over column pairs from the right edge, skipping the vertical timing column.
    fn draw_codewords(&mut self, data: &[u8]) {
        debug_assert_eq!(data.len(), num_raw_data_modules(self.version) / 8);
        let size = self.size;
        let totalbits = data.len() * 8;
        let mut i: usize = 0;
        let mut right = size - 1;
        while right >= 1 {
            if right == 6 {
                right = 5;
            }
            for vert in 0..size {
                for j in 0..2 {
                    let x = right - j;
                    let upward = ((right + 1) & 2) == 0;
                    let y = if upward { size - 1 - vert } else { vert };
                    let idx = (y * size + x) as usize;
                    if !self.isfunction[idx] && i < totalbits {
                        self.modules[idx] = get_bit(data[i >> 3].into(), 7 - (i & 7) as u8);
                        i += 1;
                    }
                }
            }
            right -= 2;
        }
        debug_assert_eq!(i, totalbits);
    }

    fn apply_mask(&mut self, mask: Mask) {
        for y in 0..self.size {
            for x in 0..self.size {
                let idx = (y * self.size + x) as usize;
                if !self.isfunction[idx] && mask.inverts(x, y) {
                    self.modules[idx] = !self.modules[idx];
                }
            }
        }
    }

    fn penalty_score(&self) -> i32 {
        let size = self.size;
        let mut result: i32 = 0;

        // Runs and finder-like patterns in rows, then in columns
        for vertical in [false, true] {
            for a in 0..size {
                let mut runcolor = false;
                let mut runlen: i32 = 0;
                let mut runhistory = FinderPenalty::new(size);
                for b in 0..size {
                    let color = if vertical {
                        self.get_module(a, b)
                    } else {
                        self.get_module(b, a)
                    };
                    if color == runcolor {
                        runlen += 1;
                        if runlen == 5 {
                            result += PENALTY_N1;
                        } else if runlen > 5 {
                            result += 1;
                        }
                    } else {
                        runhistory.add_history(runlen);
                        if !runcolor {
                            result += runhistory.count_patterns() * PENALTY_N3;
                        }
                        runcolor = color;
                        runlen = 1;
                    }
                }
                result += runhistory.terminate_and_count(runcolor, runlen) * PENALTY_N3;
            }
        }

        for y in 0..size - 1 {
            for x in 0..size - 1 {
                let color = self.get_module(x, y);
                if color == self.get_module(x + 1, y)
                    && color == self.get_module(x, y + 1)
                    && color == self.get_module(x + 1, y + 1)
                {
                    result += PENALTY_N2;
                }
            }
        }

        let dark = self.modules.iter().filter(|&&m| m).count() as i32;
        let total = size * size;
        // Smallest k such that the dark ratio lies within (45 - 5k)% .. (55 + 5k)%
        let k = ((dark * 20 - total * 10).abs() + total - 1) / total - 1;
        result += k * PENALTY_N4;
        result
    }
}

/*---- Codeword assembly ----*/

const BYTE_MODE_BITS: u32 = 0x4;

fn num_char_count_bits(ver: Version) -> u8 {
    if ver.value() <= 9 {
        8
    } else {
        16
    }
}

// Mode indicator + character count + payload, or None when the count field overflows.
fn segment_bits(numbytes: usize, ver: Version) -> Option<usize> {
    let ccbits = num_char_count_bits(ver);
    if numbytes >= 1usize << ccbits {
        return None;
    }
    numbytes
        .checked_mul(8)?
        .checked_add(4 + usize::from(ccbits))
}

/// Picks the version and assembles the padded data codewords.
fn encode_to_codewords(
    data: &[u8],
    mut ecl: QrCodeEcc,
    minversion: Version,
    maxversion: Version,
    boostecl: bool,
) -> Result<(Vec<u8>, QrCodeEcc, Version), EncodeError> {
    let mut version = minversion;
    let datausedbits = loop {
        let capacitybits = num_data_codewords(version, ecl) * 8;
        match segment_bits(data.len(), version) {
            Some(used) if used <= capacitybits => break used,
            used if version >= maxversion => {
                return Err(EncodeError::CapacityExceeded {
                    needed_bits: used.unwrap_or_else(|| 4 + 16 + data.len() * 8),
                    capacity_bits: capacitybits,
                });
            }
            _ => version = Version::new(version.value() + 1),
        }
    };

    for newecl in [QrCodeEcc::Medium, QrCodeEcc::Quartile, QrCodeEcc::High] {
        if boostecl && newecl > ecl && datausedbits <= num_data_codewords(version, newecl) * 8 {
            ecl = newecl;
        }
    }

    let capacitybits = num_data_codewords(version, ecl) * 8;
    let mut bb = BitBuffer::with_capacity(capacitybits / 8);
    bb.append_bits(BYTE_MODE_BITS, 4);
    bb.append_bits(data.len() as u32, num_char_count_bits(version));
    for &b in data {
        bb.append_bits(u32::from(b), 8);
    }
    debug_assert_eq!(bb.len(), datausedbits);

    // Terminator, then zero fill to a byte boundary
    let numzerobits = 4.min(capacitybits - bb.len());
    bb.append_bits(0, numzerobits as u8);
    let numzerobits = bb.len().wrapping_neg() & 7;
    bb.append_bits(0, numzerobits as u8);
    debug_assert_eq!(bb.len() % 8, 0);

    for &padbyte in [0xEC, 0x11].iter().cycle() {
        if bb.len() >= capacitybits {
            break;
        }
        bb.append_bits(padbyte, 8);
    }
    Ok((bb.into_bytes(), ecl, version))
}

fn latin1_bytes(text: &str) -> Result<Vec<u8>, EncodeError> {
    text.chars()
        .enumerate()
        .map(|(position, character)| {
            u8::try_from(u32::from(character))
                .map_err(|_| EncodeError::InvalidCharacter { character, position })
        })
        .collect()
}

/// Splits data codewords into blocks, appends each block's ECC and interleaves the result.
fn add_ecc_and_interleave(data: &[u8], ver: Version, ecl: QrCodeEcc) -> Vec<u8> {
    assert_eq!(data.len(), num_data_codewords(ver, ecl));
    let numblocks = table_get(&NUM_ERROR_CORRECTION_BLOCKS, ver, ecl);
    let blockecclen = table_get(&ECC_CODEWORDS_PER_BLOCK, ver, ecl);
    let rawcodewords = num_raw_data_modules(ver) / 8;
    let numshortblocks = numblocks - rawcodewords % numblocks;
    let shortblockdatalen = rawcodewords / numblocks - blockecclen;

    let rs = ReedSolomonGenerator::new(blockecclen);
    let mut blocks: Vec<Vec<u8>> = Vec::with_capacity(numblocks);
    let mut rest = data;
    for i in 0..numblocks {
        let datlen = shortblockdatalen + usize::from(i >= numshortblocks);
        let (dat, tail) = rest.split_at(datlen);
        rest = tail;
        let mut block = dat.to_vec();
        if i < numshortblocks {
            // Placeholder so every block has the same length; skipped when interleaving
            block.push(0);
        }
        block.extend_from_slice(&rs.compute_remainder(dat));
        blocks.push(block);
    }
    debug_assert!(rest.is_empty());

    let mut result = Vec::with_capacity(rawcodewords);
    for i in 0..=shortblockdatalen + blockecclen {
        for (j, block) in blocks.iter().enumerate() {
            if i != shortblockdatalen || j >= numshortblocks {
                result.push(block[i]);
            }
        }
    }
    debug_assert_eq!(result.len(), rawcodewords);
    result
}

/*---- Structural tables ----*/

/// Center coordinates of the alignment patterns along one axis, ascending.
fn alignment_pattern_positions(ver: Version) -> Vec<i32> {
    let ver = i32::from(ver.value());
    if ver == 1 {
        return Vec::new();
    }
    let numalign = ver / 7 + 2;
    let step = if ver == 32 {
        26
    } else {
        (ver * 4 + numalign * 2 + 1) / (numalign * 2 - 2) * 2
    };
    let size = ver * 4 + 17;
    let mut result: Vec<i32> = (0..numalign - 1).map(|i| size - 7 - i * step).collect();
    result.push(6);
    result.reverse();
    result
}

/// Number of modules available for data and ECC, including remainder bits.
fn num_raw_data_modules(ver: Version) -> usize {
    let ver = usize::from(ver.value());
    let mut result = (16 * ver + 128) * ver + 64;
    if ver >= 2 {
        let numalign = ver / 7 + 2;
        result -= (25 * numalign - 10) * numalign - 55;
        if ver >= 7 {
            result -= 36;
        }
    }
    result
}

fn num_data_codewords(ver: Version, ecl: QrCodeEcc) -> usize {
    num_raw_data_modules(ver) / 8
        - table_get(&ECC_CODEWORDS_PER_BLOCK, ver, ecl)
            * table_get(&NUM_ERROR_CORRECTION_BLOCKS, ver, ecl)
}

fn table_get(table: &'static [[i8; 41]; 4], ver: Version, ecl: QrCodeEcc) -> usize {
    table[ecl.ordinal()][usize::from(ver.value())] as usize
}

/// The 15-bit format word: ECC level and mask protected by BCH(15,5), then XOR-masked.
fn format_bits(ecl: QrCodeEcc, mask: Mask) -> u32 {
    let data = u32::from((ecl.format_bits() << 3) | mask.value());
    let mut rem = data;
    for _ in 0..10 {
        rem = (rem << 1) ^ ((rem >> 9) * 0x537);
    }
    ((data << 10) | rem) ^ 0x5412
}

/// The 18-bit version word, present from version 7 on.
fn version_bits(ver: Version) -> Option<u32> {
    let ver = u32::from(ver.value());
    if ver < 7 {
        return None;
    }
    let mut rem = ver;
    for _ in 0..12 {
        rem = (rem << 1) ^ ((rem >> 11) * 0x1F25);
    }
    Some((ver << 12) | rem)
}

/*---- Reed–Solomon ----*/

struct ReedSolomonGenerator {
    // Coefficients from highest to lowest power, leading 1 omitted.
    divisor: Vec<u8>,
}

impl ReedSolomonGenerator {
    fn new(degree: usize) -> Self {
        assert!((1..=255).contains(&degree), "Degree out of range");
        let mut divisor = vec![0u8; degree];
        divisor[degree - 1] = 1;

        // Multiply by (x - r^0) * (x - r^1) * ... * (x - r^{degree-1})
        let mut root: u8 = 1;
        for _ in 0..degree {
            for j in 0..degree {
                divisor[j] = Self::multiply(divisor[j], root);
                if j + 1 < degree {
                    divisor[j] ^= divisor[j + 1];
                }
            }
            root = Self::multiply(root, 0x02);
        }
        Self { divisor }
    }

    fn compute_remainder(&self, data: &[u8]) -> Vec<u8> {
        let mut result = vec![0u8; self.divisor.len()];
        for &b in data {
            let factor = b ^ result[0];
            result.rotate_left(1);
            if let Some(last) = result.last_mut() {
                *last = 0;
            }
            for (x, &y) in result.iter_mut().zip(self.divisor.iter()) {
                *x ^= Self::multiply(y, factor);
            }
        }
        result
    }

    // GF(2^8) product modulo x^8 + x^4 + x^3 + x^2 + 1.
    fn multiply(x: u8, y: u8) -> u8 {
        let mut z: u8 = 0;
        for i in (0..8).rev() {
            z = (z << 1) ^ ((z >> 7) * 0x1D);
            z ^= ((y >> i) & 1) * x;
        }
        z
    }
}

/*---- Penalty scoring ----*/

const PENALTY_N1: i32 = 3;
const PENALTY_N2: i32 = 3;
const PENALTY_N3: i32 = 40;
const PENALTY_N4: i32 = 10;

// Run lengths of the last seven runs in a row or column, newest first.
struct FinderPenalty {
    qr_size: i32,
    run_history: [i32; 7],
}

impl FinderPenalty {
    fn new(size: i32) -> Self {
        Self {
            qr_size: size,
            run_history: [0; 7],
        }
    }

    fn add_history(&mut self, mut currentrunlength: i32) {
        if self.run_history[0] == 0 {
            // The light border before the first run
            currentrunlength += self.qr_size;
        }
        self.run_history.copy_within(0..6, 1);
        self.run_history[0] = currentrunlength;
    }

    // Counts 1:1:3:1:1 dark/light patterns with at least four light modules on one side.
    fn count_patterns(&self) -> i32 {
        let rh = &self.run_history;
        let n = rh[1];
        let core = n > 0 && rh[2] == n && rh[3] == n * 3 && rh[4] == n && rh[5] == n;
        i32::from(core && rh[0] >= n * 4 && rh[6] >= n)
            + i32::from(core && rh[6] >= n * 4 && rh[0] >= n)
    }

    fn terminate_and_count(mut self, currentruncolor: bool, mut currentrunlength: i32) -> i32 {
        if currentruncolor {
            self.add_history(currentrunlength);
            currentrunlength = 0;
        }
        currentrunlength += self.qr_size;
        self.add_history(currentrunlength);
        self.count_patterns()
    }
}

static ECC_CODEWORDS_PER_BLOCK: [[i8; 41]; 4] = [
    [
        -1, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28,
        30, 30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // Low
    [
        -1, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ], // Medium
    [
        -1, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30,
        30, 30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // Quartile
    [
        -1, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // High
];

static NUM_ERROR_CORRECTION_BLOCKS: [[i8; 41]; 4] = [
    [
        -1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12,
        13, 14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ], // Low
    [
        -1, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21,
        23, 25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ], // Medium
    [
        -1, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27,
        29, 34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ], // Quartile
    [
        -1, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32,
        35, 37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ], // High
];

/*---- Small value types ----*/

/// Error correction level for a QR code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum QrCodeEcc {
    /// Tolerates ~7% erroneous codewords.
    Low,
    /// Tolerates ~15% erroneous codewords.
    Medium,
    /// Tolerates ~25% erroneous codewords.
    Quartile,
    /// Tolerates ~30% erroneous codewords.
    High,
}

impl QrCodeEcc {
    fn ordinal(self) -> usize {
        use QrCodeEcc::*;
        match self {
            Low => 0,
            Medium => 1,
            Quartile => 2,
            High => 3,
        }
    }

    /// Returns the 2-bit value stored in the format information.
    fn format_bits(self) -> u8 {
        use QrCodeEcc::*;
        match self {
            Low => 1,
            Medium => 0,
            Quartile => 3,
            High => 2,
        }
    }
}

impl fmt::Display for QrCodeEcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            QrCodeEcc::Low => "L",
            QrCodeEcc::Medium => "M",
            QrCodeEcc::Quartile => "Q",
            QrCodeEcc::High => "H",
        };
        f.write_str(letter)
    }
}

impl FromStr for QrCodeEcc {
    type Err = String;

    /// Accepts `L`/`M`/`Q`/`H` or the full level names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(QrCodeEcc::Low),
            "m" | "medium" => Ok(QrCodeEcc::Medium),
            "q" | "quartile" => Ok(QrCodeEcc::Quartile),
            "h" | "high" => Ok(QrCodeEcc::High),
            other => Err(format!("unknown error correction level: {other}")),
        }
    }
}

/// A QR code version (1–40).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Version(u8);

impl Version {
    /// The minimum version number supported in the QR Code Model 2 standard.
    pub const MIN: Version = Version(1);

    /// The maximum version number supported in the QR Code Model 2 standard.
    pub const MAX: Version = Version(40);

    /// Creates a version object from the given number.
    ///
    /// # Panics
    ///
    /// Panics if the number is outside the range [1, 40]. Use `Version::try_from` for
    /// untrusted input.
    pub const fn new(ver: u8) -> Self {
        assert!(
            Version::MIN.value() <= ver && ver <= Version::MAX.value(),
            "Version number out of range"
        );
        Self(ver)
    }

    /// Returns the value, which is in the range [1, 40].
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Side length in modules.
    pub const fn size(self) -> i32 {
        self.0 as i32 * 4 + 17
    }
}

impl TryFrom<u8> for Version {
    type Error = String;

    fn try_from(ver: u8) -> Result<Self, Self::Error> {
        if (Version::MIN.value()..=Version::MAX.value()).contains(&ver) {
            Ok(Version(ver))
        } else {
            Err(format!("version {ver} is outside 1..=40"))
        }
    }
}

/// A mask pattern (0–7).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Mask(u8);

impl Mask {
    /// Creates a mask object from the given number.
    ///
    /// # Panics
    ///
    /// Panics if the number is outside the range [0, 7].
    pub const fn new(mask: u8) -> Self {
        assert!(mask <= 7, "Mask value out of range");
        Self(mask)
    }

    /// Returns the value, which is in the range [0, 7].
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Whether this pattern flips the module at column `x`, row `y`.
    fn inverts(self, x: i32, y: i32) -> bool {
        match self.0 {
            0 => (x + y) % 2 == 0,
            1 => y % 2 == 0,
            2 => x % 3 == 0,
            3 => (x + y) % 3 == 0,
            4 => (x / 3 + y / 2) % 2 == 0,
            5 => x * y % 2 + x * y % 3 == 0,
            6 => (x * y % 2 + x * y % 3) % 2 == 0,
            7 => ((x + y) % 2 + x * y % 3) % 2 == 0,
            _ => unreachable!(),
        }
    }
}

/// Why a payload could not be encoded.
///
/// Ways to handle [`EncodeError::CapacityExceeded`] include lowering the error correction level,
/// raising the maximum version, or shortening the payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The payload does not fit the largest allowed version at the requested level.
    #[error("Data length = {needed_bits} bits, Max capacity = {capacity_bits} bits")]
    CapacityExceeded {
        needed_bits: usize,
        capacity_bits: usize,
    },
    /// A character cannot be represented in the selected charset.
    #[error("Character {character:?} at position {position} is not representable")]
    InvalidCharacter { character: char, position: usize },
}

struct BitBuffer {
    data: Vec<u8>,
    length: usize,
}

impl BitBuffer {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            length: 0,
        }
    }

    fn len(&self) -> usize {
        self.length
    }

    // Appends the low `len` bits of `val`, most significant first.
    fn append_bits(&mut self, val: u32, len: u8) {
        assert!(len <= 31 && (val >> len) == 0);
        for i in (0..len).rev() {
            if self.length % 8 == 0 {
                self.data.push(0);
            }
            let bit = ((val >> i) & 1) as u8;
            if let Some(last) = self.data.last_mut() {
                *last |= bit << (7 - (self.length & 7));
            }
            self.length += 1;
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

fn get_bit(x: u32, i: u8) -> bool {
    ((x >> i) & 1) != 0
}
