//! Packed 12-bit grayscale storage for every multiplexed row.
//!
//! See [`GrayscaleRows`] for the byte layout and usage.

/// Largest grayscale value a TLC5940 channel accepts (12 bits).
pub const GRAYSCALE_MAX: u16 = 0x0FFF;

/// PWM outputs per TLC5940.
pub const CHANNELS_PER_CHIP: usize = 16;

/// Bytes of packed grayscale data per TLC5940 (16 channels x 12 bits).
pub const BYTES_PER_CHIP: usize = 24;

/// Grayscale data for `ROW_COUNT` rows, packed exactly as the chip chain expects it on the wire.
///
/// Each row is `ROW_BYTES` bytes (24 per chip). Two channels share three bytes, and channels are
/// stored in descending order: the highest channel of the row comes first, channel 0 occupies
/// the last byte and a half. Shifting a row is therefore a plain front-to-back walk over
/// [`row_bytes`](Self::row_bytes).
///
/// ```text
/// ROW_BYTES = 24 (one chip, channels 15..=0)
///
///   byte:   0        1        2        ...  21       22       23
///           [ch15 hi8][ch15 lo4|ch14 hi4][ch14 lo8] ... [ch1 hi8][ch1 lo4|ch0 hi4][ch0 lo8]
/// ```
///
/// Writes to one channel never disturb the nibble its neighbor keeps in the shared byte.
///
/// The storage never grows or moves; use it inside a `static` (see [`TlcMux`](crate::tlc_mux::TlcMux)).
///
/// # Example
///
/// ```rust
/// use tlc_mux::grayscale::GrayscaleRows;
///
/// // 4 rows of one chip each.
/// let mut rows = GrayscaleRows::<4, 24>::new();
/// rows.set(0, 0, 4095);
/// rows.set(0, 1, 0);
/// assert_eq!(rows.get(0, 0), 4095);
/// assert_eq!(rows.row_bytes(0)[22..], [0x0F_u8, 0xFF]);
///
/// rows.set_row(3, 0xABC);
/// assert!((0..16).all(|channel| rows.get(3, channel) == 0xABC));
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GrayscaleRows<const ROW_COUNT: usize, const ROW_BYTES: usize>([[u8; ROW_BYTES]; ROW_COUNT]);

impl<const ROW_COUNT: usize, const ROW_BYTES: usize> GrayscaleRows<ROW_COUNT, ROW_BYTES> {
    /// Number of multiplexed rows.
    pub const ROW_COUNT: usize = ROW_COUNT;
    /// Packed bytes per row.
    pub const ROW_BYTES: usize = ROW_BYTES;
    /// Chips chained in each row.
    pub const CHIP_COUNT: usize = ROW_BYTES / BYTES_PER_CHIP;
    /// Channels in each row.
    pub const CHANNEL_COUNT: usize = Self::CHIP_COUNT * CHANNELS_PER_CHIP;

    const SHAPE_CHECK: () = {
        assert!(ROW_COUNT > 0, "ROW_COUNT must be positive");
        assert!(ROW_BYTES > 0, "ROW_BYTES must be positive");
        assert!(
            ROW_BYTES % BYTES_PER_CHIP == 0,
            "ROW_BYTES must be a multiple of 24 (one TLC5940)"
        );
    };

    /// Create rows with every channel at 0.
    #[must_use]
    pub const fn new() -> Self {
        let () = Self::SHAPE_CHECK;
        Self([[0; ROW_BYTES]; ROW_COUNT])
    }

    /// Create rows with every channel at `value`.
    #[must_use]
    pub const fn filled(value: u16) -> Self {
        let () = Self::SHAPE_CHECK;
        let pattern = row_pattern(value);
        let mut row = [0; ROW_BYTES];
        let mut index = 0;
        while index < ROW_BYTES {
            row[index] = pattern[index % 3];
            index += 1;
        }
        Self([row; ROW_COUNT])
    }

    /// Set every channel of every row to 0.
    pub fn clear(&mut self) {
        for row in &mut self.0 {
            row.fill(0);
        }
    }

    /// Set every channel of `row` to 0.
    ///
    /// # Panics
    ///
    /// Panics if `row >= ROW_COUNT`.
    pub fn clear_row(&mut self, row: usize) {
        self.row_mut(row).fill(0);
    }

    /// Grayscale value of `channel` in `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= ROW_COUNT` or `channel >= CHANNEL_COUNT`.
    #[must_use]
    pub fn get(&self, row: usize, channel: usize) -> u16 {
        let (byte_pos, starts_mid_byte) = Self::locate(channel);
        let bytes = self.row_bytes(row);
        let first = u16::from(bytes[byte_pos]);
        let second = u16::from(bytes[byte_pos + 1]);
        if starts_mid_byte {
            ((first & 0x0F) << 8) | second
        } else {
            (first << 4) | (second >> 4)
        }
    }

    /// Set `channel` in `row` to `value`, leaving the channel that shares its boundary byte
    /// untouched.
    ///
    /// Values above [`GRAYSCALE_MAX`] are truncated to 12 bits (and trap in debug builds).
    ///
    /// # Panics
    ///
    /// Panics if `row >= ROW_COUNT` or `channel >= CHANNEL_COUNT`.
    pub fn set(&mut self, row: usize, channel: usize, value: u16) {
        debug_assert!(value <= GRAYSCALE_MAX, "grayscale value must fit in 12 bits");
        let value = value & GRAYSCALE_MAX;
        let (byte_pos, starts_mid_byte) = Self::locate(channel);
        let bytes = self.row_mut(row);
        if starts_mid_byte {
            bytes[byte_pos] = (bytes[byte_pos] & 0xF0) | (value >> 8) as u8;
            bytes[byte_pos + 1] = value as u8;
        } else {
            bytes[byte_pos] = (value >> 4) as u8;
            bytes[byte_pos + 1] = ((value << 4) as u8) | (bytes[byte_pos + 1] & 0x0F);
        }
    }

    /// Set every channel of `row` to `value`.
    ///
    /// Produces the same bytes as calling [`set`](Self::set) on every channel, by repeating the
    /// three bytes two equal channels pack into.
    ///
    /// # Panics
    ///
    /// Panics if `row >= ROW_COUNT`.
    pub fn set_row(&mut self, row: usize, value: u16) {
        debug_assert!(value <= GRAYSCALE_MAX, "grayscale value must fit in 12 bits");
        let pattern = row_pattern(value);
        for chunk in self.row_mut(row).chunks_exact_mut(pattern.len()) {
            chunk.copy_from_slice(&pattern);
        }
    }

    /// Set every channel of every row to `value`.
    pub fn set_all(&mut self, value: u16) {
        for row in 0..ROW_COUNT {
            self.set_row(row, value);
        }
    }

    /// The packed bytes of `row`, in shift order.
    ///
    /// # Panics
    ///
    /// Panics if `row >= ROW_COUNT`.
    #[must_use]
    pub fn row_bytes(&self, row: usize) -> &[u8; ROW_BYTES] {
        assert!(row < ROW_COUNT, "row out of range");
        &self.0[row]
    }

    fn row_mut(&mut self, row: usize) -> &mut [u8; ROW_BYTES] {
        assert!(row < ROW_COUNT, "row out of range");
        &mut self.0[row]
    }

    /// First byte of `channel` and whether its 12 bits start in the low nibble of that byte.
    const fn locate(channel: usize) -> (usize, bool) {
        assert!(channel < Self::CHANNEL_COUNT, "channel out of range");
        let reversed = Self::CHANNEL_COUNT - 1 - channel;
        ((reversed * 3) >> 1, reversed & 1 == 1)
    }
}

impl<const ROW_COUNT: usize, const ROW_BYTES: usize> Default for GrayscaleRows<ROW_COUNT, ROW_BYTES> {
    fn default() -> Self {
        Self::new()
    }
}

/// The three bytes two consecutive channels at `value` pack into.
const fn row_pattern(value: u16) -> [u8; 3] {
    let value = value & GRAYSCALE_MAX;
    [
        (value >> 4) as u8,
        ((value << 4) as u8) | (value >> 8) as u8,
        value as u8,
    ]
}
