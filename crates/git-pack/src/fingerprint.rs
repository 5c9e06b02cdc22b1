//! Rolling fingerprint over fixed-size windows of a byte buffer.
//!
//! A [`RollingFingerprint`] folds bytes through a small polynomial-style
//! register so that the hash of the last `WINDOW` bytes pushed can be read
//! off in O(1) after each push, rather than recomputed from scratch. The
//! same register state must always be reachable two ways: incrementally via
//! [`RollingFingerprint::push`], or directly via [`static_hash`] applied to
//! any fixed `WINDOW`-byte slice. [`delta::index`](crate::delta::index) and
//! [`delta::compute`](crate::delta::compute) both rely on that agreement —
//! one builds its table by calling `static_hash` at every offset, the other
//! walks the target with a live `RollingFingerprint`.

use crate::PackError;

/// Window width, in bytes, over which the fingerprint is computed.
pub const WINDOW: usize = 16;
/// Width of the hash register, in bits.
pub const SHIFT: u32 = 23;
/// Mask selecting the low `SHIFT` bits.
pub const MASK: u32 = (1u32 << SHIFT) - 1;
/// Polynomial constant carried for documentation parity with table-driven
/// variants of this fingerprint; the shift-and-subtract update below does
/// not consume it directly.
pub const POLYNOMIAL: u32 = 0x1d;

/// Maintains a rolling hash over the most recent `WINDOW` bytes pushed.
///
/// Bytes pushed before the window fills only warm up the register; once
/// `WINDOW` bytes have been pushed, [`hash`](Self::hash) reflects exactly
/// the last `WINDOW` bytes, no matter how many more are pushed afterward.
pub struct RollingFingerprint {
    hash: u32,
    window: [u8; WINDOW],
    cursor: usize,
    pushed: usize,
}

impl RollingFingerprint {
    pub fn new() -> Self {
        Self {
            hash: 0,
            window: [0u8; WINDOW],
            cursor: 0,
            pushed: 0,
        }
    }

    /// Push one byte into the window and return the updated hash.
    ///
    /// `hash()` only reflects a full `WINDOW`-byte window once `filled()`
    /// becomes true; before that it's a warm-up value over fewer bytes.
    pub fn push(&mut self, b: u8) -> u32 {
        if self.filled() {
            // The byte leaving the window sat at the top of the register,
            // `WINDOW - 1` byte-shifts back; at SHIFT=23 < WINDOW*8 bits,
            // that contribution has already been shifted out of the mask,
            // so evicting it is folded directly into the shift-in below.
            let evicted = self.window[self.cursor] as u128;
            let contribution = (evicted << ((WINDOW - 1) * 8)) & (MASK as u128);
            let shifted = (self.hash as u128).wrapping_sub(contribution) << 8;
            self.hash = ((shifted | b as u128) as u32) & MASK;
        } else {
            self.hash = ((self.hash << 8) | b as u32) & MASK;
        }
        self.window[self.cursor] = b;
        self.cursor = (self.cursor + 1) % WINDOW;
        if self.pushed < WINDOW {
            self.pushed += 1;
        }
        self.hash
    }

    /// Current hash value.
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Whether a full `WINDOW`-byte window has been pushed.
    pub fn filled(&self) -> bool {
        self.pushed == WINDOW
    }

    /// The `WINDOW` most recently pushed bytes, oldest first.
    pub fn window_copy(&self) -> [u8; WINDOW] {
        let mut out = [0u8; WINDOW];
        for i in 0..WINDOW {
            out[i] = self.window[(self.cursor + i) % WINDOW];
        }
        out
    }

    /// Reset to the empty state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for RollingFingerprint {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash of `buffer[offset..offset + WINDOW]`, computed without any rolling
/// state. Agrees with [`RollingFingerprint::hash`] after pushing the same
/// `WINDOW` bytes in order (the rolling equivalence property).
pub fn static_hash(buffer: &[u8], offset: usize) -> Result<u32, PackError> {
    let end = offset
        .checked_add(WINDOW)
        .ok_or_else(|| PackError::InvalidInput("offset overflow in static_hash".into()))?;
    if end > buffer.len() {
        return Err(PackError::InvalidRange {
            offset,
            offset_end: end,
            len: buffer.len(),
        });
    }
    let mut hash: u32 = 0;
    for &b in &buffer[offset..end] {
        hash = ((hash << 8) | b as u32) & MASK;
    }
    Ok(hash)
}
