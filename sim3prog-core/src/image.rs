// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! RAM images, to be loaded into a target's SRAM and executed from there.
//!
//! An image is a raw binary, linked to run from SRAM, starting with a
//! Cortex-M vector table.  Word 0 is therefore the initial stack pointer and
//! word 1 the reset vector.

use alloc::vec::Vec;
use core::fmt;

use crate::sim3::SRAM_BASE;

/// Reasons an image could not be built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    /// The image, in bytes, does not contain an initial SP and reset vector
    TooShort(usize),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::TooShort(bytes) => write!(
                f,
                "Image too short: {bytes} bytes, need at least {}",
                SramImage::HEADER_BYTES
            ),
        }
    }
}

/// A RAM image, held as target-order 32-bit words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SramImage {
    base: u32,
    words: Vec<u32>,
}

impl SramImage {
    /// Number of words in a vector table header
    const HEADER_WORDS: usize = 2;

    /// Bytes in a vector table header
    const HEADER_BYTES: usize = Self::HEADER_WORDS * 4;

    /// Builds an image from a raw little-endian binary.  A trailing partial
    /// word is zero padded.
    ///
    /// Arguments:
    /// - `bytes`: the binary image, as linked for SRAM
    ///
    /// Returns:
    /// - `Ok(SramImage)`: the image, to be loaded at [`SRAM_BASE`]
    /// - `Err(ImageError)`: the image has no vector table header
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.len() < Self::HEADER_BYTES {
            return Err(ImageError::TooShort(bytes.len()));
        }
        let words = bytes
            .chunks(4)
            .map(|chunk| {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                u32::from_le_bytes(word)
            })
            .collect();
        Self::from_words(words)
    }

    /// Builds an image from words already in target order
    pub fn from_words(words: Vec<u32>) -> Result<Self, ImageError> {
        if words.len() < Self::HEADER_WORDS {
            return Err(ImageError::TooShort(words.len() * 4));
        }
        Ok(Self {
            base: SRAM_BASE,
            words,
        })
    }

    /// Moves the image to a different load address
    pub fn with_base(mut self, base: u32) -> Self {
        self.base = base;
        self
    }

    /// Address the image is loaded at, and which VTOR is pointed to
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Initial main stack pointer, from vector table entry 0
    pub fn initial_sp(&self) -> u32 {
        self.words[0]
    }

    /// Entry point, from vector table entry 1, with the Thumb bit cleared
    pub fn reset_vector(&self) -> u32 {
        self.words[1] & !1
    }
}

impl fmt::Display for SramImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} words at 0x{:08X}, SP 0x{:08X}, PC 0x{:08X}",
            self.words.len(),
            self.base,
            self.initial_sp(),
            self.reset_vector()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn vector_table_header() {
        let bytes = [
            0x00, 0x10, 0x00, 0x20, // SP
            0x41, 0x01, 0x00, 0x20, // Reset vector, Thumb bit set
            0xAA, 0xBB,
        ];
        let image = SramImage::from_bytes(&bytes).unwrap();

        assert_eq!(image.words(), &[0x2000_1000, 0x2000_0141, 0x0000_BBAA]);
        assert_eq!(image.initial_sp(), 0x2000_1000);
        assert_eq!(image.reset_vector(), 0x2000_0140);
        assert_eq!(image.base(), SRAM_BASE);
        assert_eq!(
            image.to_string(),
            "3 words at 0x20000000, SP 0x20001000, PC 0x20000140"
        );
    }

    #[test_case(&[], 0 ; "empty")]
    #[test_case(&[1, 2, 3, 4], 4 ; "one word")]
    #[test_case(&[1, 2, 3, 4, 5], 5 ; "one and a bit words")]
    #[test_case(&[0, 0x10, 0, 0x20, 0x41, 0x01, 0x00], 7 ; "reset vector cut short")]
    fn rejects_short_images(bytes: &[u8], len: usize) {
        assert_eq!(SramImage::from_bytes(bytes), Err(ImageError::TooShort(len)));
    }

    #[test]
    fn rejects_short_word_images() {
        assert_eq!(
            SramImage::from_words(vec![0x2000_1000]),
            Err(ImageError::TooShort(4))
        );
        assert_eq!(
            ImageError::TooShort(5).to_string(),
            "Image too short: 5 bytes, need at least 8"
        );
    }
}
