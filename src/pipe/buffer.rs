//! Transfer buffer that is wiped whenever it is not carrying entropy.

use zeroize::Zeroize;

/// Fixed-size buffer used for every transfer.
///
/// Allocated once, zeroed on creation, wiped after each cycle and on drop.
/// It cannot be cloned and its `Debug` output never shows the contents.
pub struct TransferBuffer {
    bytes: Box<[u8]>,
}

impl TransferBuffer {
    /// Allocates a zeroed buffer of `len` bytes.
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len].into_boxed_slice(),
        }
    }

    /// Buffer length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true for a zero-length buffer.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read-only view of the contents.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable view of the contents.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Overwrites every byte with zero.
    ///
    /// Uses volatile stores, so the wipe in `Drop` is not elided as a dead
    /// write.
    pub fn wipe(&mut self) {
        self.as_mut_slice().zeroize();
    }

    /// Returns true if every byte is zero.
    pub fn is_wiped(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}

impl Drop for TransferBuffer {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl std::fmt::Debug for TransferBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferBuffer")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_zeroed() {
        let buffer = TransferBuffer::new(32);
        assert_eq!(buffer.len(), 32);
        assert!(buffer.is_wiped());
    }

    #[test]
    fn test_wipe_clears_contents() {
        let mut buffer = TransferBuffer::new(8);
        buffer.as_mut_slice().copy_from_slice(&[0xA5; 8]);
        assert!(!buffer.is_wiped());

        buffer.wipe();
        assert!(buffer.is_wiped());
    }

    #[test]
    fn test_wipe_covers_every_length() {
        for len in [1usize, 7, 16, 4096] {
            let mut buffer = TransferBuffer::new(len);
            buffer.as_mut_slice().fill(0xFF);
            buffer.wipe();
            assert!(buffer.is_wiped(), "len {len} not wiped");
            assert_eq!(buffer.len(), len);
        }
    }

    #[test]
    fn test_debug_hides_contents() {
        let mut buffer = TransferBuffer::new(4);
        buffer.as_mut_slice().copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let shown = format!("{:?}", buffer);
        assert!(shown.contains("len: 4"));
        assert!(!shown.contains("222"));
        assert!(!shown.contains("239"));
    }
}
