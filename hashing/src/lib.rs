use ethereum_types::H256;
use hex_literal::hex;
use sha2::{
    digest::{core_api::BlockSizeUser, generic_array::typenum::Unsigned as _, generic_array::GenericArray},
    Sha256,
};

// All inputs hashed in this workspace fit in a single SHA-256 block, so the
// padding for each input size can be baked in and `sha2::compress256` called
// directly. This skips the `Digest` bookkeeping on the hot shuffling path.

#[rustfmt::skip]
const BLOCK_WITH_PADDING_FOR_264_BITS: Sha256Block = hex!("
    00000000 00000000 00000000 00000000
    00000000 00000000 00000000 00000000
    00800000 00000000 00000000 00000000
    00000000 00000000 00000000 00000108
");

#[rustfmt::skip]
const BLOCK_WITH_PADDING_FOR_296_BITS: Sha256Block = hex!("
    00000000 00000000 00000000 00000000
    00000000 00000000 00000000 00000000
    00000000 00800000 00000000 00000000
    00000000 00000000 00000000 00000128
");

#[rustfmt::skip]
const BLOCK_WITH_PADDING_FOR_352_BITS: Sha256Block = hex!("
    00000000 00000000 00000000 00000000
    00000000 00000000 00000000 00000000
    00000000 00000000 00000000 80000000
    00000000 00000000 00000000 00000160
");

type Sha256BlockSize = <Sha256 as BlockSizeUser>::BlockSize;
type Sha256Block = [u8; Sha256BlockSize::USIZE];

struct Sha256State([u32; 8]);

impl Default for Sha256State {
    #[rustfmt::skip]
    fn default() -> Self {
        Self([
            0x6a09_e667, 0xbb67_ae85, 0x3c6e_f372, 0xa54f_f53a,
            0x510e_527f, 0x9b05_688c, 0x1f83_d9ab, 0x5be0_cd19,
        ])
    }
}

impl Sha256State {
    fn compress_single(mut self, block: Sha256Block) -> Self {
        sha2::compress256(
            &mut self.0,
            core::slice::from_ref(GenericArray::from_slice(&block)),
        );
        self
    }

    fn output(self) -> H256 {
        let mut output = H256::default();

        for (o, s) in output.as_bytes_mut().chunks_exact_mut(4).zip(self.0) {
            o.copy_from_slice(&s.to_be_bytes());
        }

        output
    }
}

/// `hash(a ‖ b)` — the shuffle pivot input shape.
#[inline]
#[must_use]
pub fn hash_256_8(a: H256, b: u8) -> H256 {
    let mut block = BLOCK_WITH_PADDING_FOR_264_BITS;
    block[..32].copy_from_slice(a.as_bytes());
    block[32] = b;

    Sha256State::default().compress_single(block).output()
}

/// `hash(a ‖ b ‖ c)` — the shuffle source input shape.
#[inline]
#[must_use]
pub fn hash_256_8_32(a: H256, b: u8, c: u32) -> H256 {
    let mut block = BLOCK_WITH_PADDING_FOR_296_BITS;
    block[..32].copy_from_slice(a.as_bytes());
    block[32] = b;
    block[32 + 1..32 + 1 + 4].copy_from_slice(&c.to_le_bytes());

    Sha256State::default().compress_single(block).output()
}

/// `hash(a ‖ b ‖ c)` — the attester seed input shape
/// (domain type, epoch, randao mix).
#[inline]
#[must_use]
pub fn hash_32_64_256(a: [u8; 4], b: u64, c: H256) -> H256 {
    let mut block = BLOCK_WITH_PADDING_FOR_352_BITS;
    block[..4].copy_from_slice(&a);
    block[4..4 + 8].copy_from_slice(&b.to_le_bytes());
    block[4 + 8..4 + 8 + 32].copy_from_slice(c.as_bytes());

    Sha256State::default().compress_single(block).output()
}

#[cfg(test)]
mod tests {
    use sha2::Digest as _;

    use super::*;

    fn reference_hash(input: &[u8]) -> H256 {
        H256::from_slice(&Sha256::digest(input))
    }

    #[test]
    fn hash_256_8_matches_plain_digest() {
        let a = H256::repeat_byte(0xab);

        let mut input = a.as_bytes().to_vec();
        input.push(0x2c);

        assert_eq!(hash_256_8(a, 0x2c), reference_hash(&input));
    }

    #[test]
    fn hash_256_8_32_matches_plain_digest() {
        let a = H256::repeat_byte(0x11);

        let mut input = a.as_bytes().to_vec();
        input.push(89);
        input.extend_from_slice(&0x0102_0304_u32.to_le_bytes());

        assert_eq!(hash_256_8_32(a, 89, 0x0102_0304), reference_hash(&input));
    }

    #[test]
    fn hash_32_64_256_matches_plain_digest() {
        let c = H256::repeat_byte(0x7f);

        let mut input = vec![1, 0, 0, 0];
        input.extend_from_slice(&12_345_u64.to_le_bytes());
        input.extend_from_slice(c.as_bytes());

        assert_eq!(hash_32_64_256([1, 0, 0, 0], 12_345, c), reference_hash(&input));
    }
}
