//! # Cipher chains (POTS)
//!
//! The cipher backend replaces the hash chain with a lattice of AES encryptions. Every chain
//! owns `w` secret rung keys `sk[0..w]`; rung `j` of the public lattice is
//!
//! ```text
//! pk[0] = AES-CTR(sk[0], 0^n)
//! pk[j] = AES-CTR(sk[j], pk[j - 1])
//! ```
//!
//! with a zero initial counter. Signing digit `d` reveals `sk[d]`, and a verifier holding the
//! lattice checks `AES-CTR(sk[d], pk[d - 1]) == pk[d]`.
//!
//! Each rung is a single cipher step and the digits carry no checksum. Both properties are
//! inherited unchanged from the construction this backend reproduces and need a security
//! review before any use outside experimentation.
//!
//! The AES key size follows `n`: AES-128, AES-192 or AES-256 for 16, 24 or 32 bytes.

use crate::adrs::Adrs;
use crate::chain::ChainBackend;
use crate::params::ParameterSet;
use crate::{Error, Result};
use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};

pub(crate) const AES_BLOCK_SIZE: usize = 16;

enum RungCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl RungCipher {
    /// Keys shorter than 24 bytes select AES-128, shorter than 32 bytes AES-192.
    /// [`CipherChain`] is only built with `n` of 16, 24 or 32.
    fn new(key: &[u8]) -> Self {
        match key.len() {
            0..=23 => Self::Aes128(Aes128::new(GenericArray::from_slice(&key[..16]))),
            24..=31 => Self::Aes192(Aes192::new(GenericArray::from_slice(&key[..24]))),
            _ => Self::Aes256(Aes256::new(GenericArray::from_slice(&key[..32]))),
        }
    }

    fn encrypt_block(&self, block: &mut [u8; AES_BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(&mut block[..]);
        match self {
            Self::Aes128(cipher) => cipher.encrypt_block(block),
            Self::Aes192(cipher) => cipher.encrypt_block(block),
            Self::Aes256(cipher) => cipher.encrypt_block(block),
        }
    }
}

/// Increment a 128-bit big-endian counter by 1.
fn increment_counter(counter: &mut [u8; AES_BLOCK_SIZE]) {
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

/// Encrypts (or decrypts) `data` in place with AES in counter mode, starting the counter at
/// `iv` and incrementing all 128 bits.
pub(crate) fn ctr_crypt(key: &[u8], iv: &[u8; AES_BLOCK_SIZE], data: &mut [u8]) {
    let cipher = RungCipher::new(key);
    let mut counter = *iv;

    for chunk in data.chunks_mut(AES_BLOCK_SIZE) {
        let mut keystream = counter;
        cipher.encrypt_block(&mut keystream);
        chunk
            .iter_mut()
            .zip(keystream.iter())
            .for_each(|(d, k)| *d ^= k);
        increment_counter(&mut counter);
    }
}

/// The POTS chain backend.
#[derive(Copy, Clone, Debug)]
pub struct CipherChain {
    n: usize,
    w: usize,
}

impl CipherChain {
    /// Creates a cipher backend with AES keys of `n` bytes and `w` rungs per chain.
    ///
    /// # Arguments
    ///
    /// * `n` - Rung key and block size in bytes: 16, 24 or 32.
    /// * `w` - Number of rungs per chain, at least 2.
    ///
    /// # Returns
    ///
    /// The backend, or [`Error::InvalidParameters`] if `n` is not an AES key size or `w` is
    /// below 2.
    pub fn new(n: usize, w: usize) -> Result<Self> {
        if !matches!(n, 16 | 24 | 32) {
            return Err(Error::InvalidParameters(format!(
                "cipher chains need n of 16, 24 or 32 bytes, got {}",
                n
            )));
        }
        if w < 2 {
            return Err(Error::InvalidParameters(format!(
                "cipher chains need at least 2 rungs, got {}",
                w
            )));
        }
        Ok(Self { n, w })
    }

    /// The backend of a parameter set, whose `n` and `w` are already validated.
    pub(crate) fn from_params(params: &ParameterSet) -> Self {
        Self {
            n: params.n,
            w: params.w,
        }
    }

    /// One rung: encrypt `value` under `key` with a zero counter.
    fn step(&self, value: &mut [u8], key: &[u8]) {
        ctr_crypt(key, &[0_u8; AES_BLOCK_SIZE], &mut value[..self.n]);
    }
}

impl ChainBackend for CipherChain {
    /// `seed` is the chain's row of `w` rung keys; the address takes no part.
    fn chain(&self, value: &[u8], start: u32, steps: u32, seed: &[u8], _adrs: &Adrs) -> Vec<u8> {
        let n = self.n;
        let mut out = value[..n].to_vec();
        let end = (start as usize + steps as usize).min(self.w);
        for j in start as usize..end {
            self.step(&mut out, &seed[j * n..(j + 1) * n]);
        }
        out
    }

    fn public_chain(&self, secrets: &[u8], _pub_seed: &[u8], _adrs: &Adrs) -> Vec<u8> {
        let n = self.n;
        let mut lattice = vec![0_u8; self.w * n];
        let mut rung = vec![0_u8; n];
        for j in 0..self.w {
            self.step(&mut rung, &secrets[j * n..(j + 1) * n]);
            lattice[j * n..(j + 1) * n].copy_from_slice(&rung);
        }
        lattice
    }

    fn reveal(&self, secrets: &[u8], digit: u32, _pub_seed: &[u8], _adrs: &Adrs) -> Vec<u8> {
        let n = self.n;
        let d = digit as usize;
        secrets[d * n..(d + 1) * n].to_vec()
    }

    fn check(
        &self,
        revealed: &[u8],
        digit: u32,
        public: &[u8],
        _pub_seed: &[u8],
        _adrs: &Adrs,
    ) -> bool {
        let n = self.n;
        let d = digit as usize;
        if d >= self.w {
            return false;
        }
        let mut rung = if d == 0 {
            vec![0_u8; n]
        } else {
            public[(d - 1) * n..d * n].to_vec()
        };
        self.step(&mut rung, &revealed[..n]);
        rung == public[d * n..(d + 1) * n]
    }

    fn complete(
        &self,
        _revealed: &[u8],
        _digit: u32,
        _pub_seed: &[u8],
        _adrs: &Adrs,
    ) -> Option<Vec<u8>> {
        None
    }

    fn secrets_per_chain(&self) -> usize {
        self.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adrs::AdrsType;
    use rand::rngs::OsRng;
    use rand::RngCore;

    fn hex_to_bytes(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn nist_counter() -> [u8; AES_BLOCK_SIZE] {
        let mut iv = [0_u8; AES_BLOCK_SIZE];
        iv.copy_from_slice(&hex_to_bytes("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff"));
        iv
    }

    // NIST SP 800-38A F.5.1, first two blocks: AES-128 CTR
    #[test]
    fn test_ctr_aes128_vector() {
        let key = hex_to_bytes("2b7e151628aed2a6abf7158809cf4f3c");
        let pt = hex_to_bytes("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51");
        let expected =
            hex_to_bytes("874d6191b620e3261bef6864990db6ce9806f66b7970fdff8617187bb9fffdff");

        let mut data = pt.clone();
        ctr_crypt(&key, &nist_counter(), &mut data);
        assert_eq!(data, expected);

        ctr_crypt(&key, &nist_counter(), &mut data);
        assert_eq!(data, pt);
    }

    // NIST SP 800-38A F.5.5, first block: AES-256 CTR
    #[test]
    fn test_ctr_aes256_vector() {
        let key =
            hex_to_bytes("603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4");
        let mut data = hex_to_bytes("6bc1bee22e409f96e93d7e117393172a");
        ctr_crypt(&key, &nist_counter(), &mut data);
        assert_eq!(data, hex_to_bytes("601ec313775789a5b7a7f504bbf3d228"));
    }

    #[test]
    fn test_counter_carries_across_all_bytes() {
        let mut counter = [0xff_u8; AES_BLOCK_SIZE];
        increment_counter(&mut counter);
        assert_eq!(counter, [0_u8; AES_BLOCK_SIZE]);

        let mut counter = [0_u8; AES_BLOCK_SIZE];
        counter[15] = 0xff;
        increment_counter(&mut counter);
        assert_eq!(counter[14..], [1, 0]);
    }

    #[test]
    fn test_lattice_and_check() {
        for n in [16, 24, 32] {
            let w = 16;
            let backend = CipherChain::new(n, w).unwrap();
            let adrs = Adrs::from(AdrsType::Ots);
            let mut secrets = vec![0_u8; w * n];
            OsRng.fill_bytes(&mut secrets);

            let lattice = backend.public_chain(&secrets, &[], &adrs);
            assert_eq!(lattice.len(), w * n);
            let zero = vec![0_u8; n];
            for j in 0..w as u32 {
                let rung = backend.chain(&zero, 0, j + 1, &secrets, &adrs);
                assert_eq!(rung, lattice[j as usize * n..(j as usize + 1) * n]);

                let revealed = backend.reveal(&secrets, j, &[], &adrs);
                assert!(backend.check(&revealed, j, &lattice, &[], &adrs));

                let mut forged = revealed.clone();
                forged[n - 1] ^= 0x80;
                assert!(!backend.check(&forged, j, &lattice, &[], &adrs));
            }
            assert!(backend.complete(&zero, 0, &[], &adrs).is_none());
        }
    }

    #[test]
    fn test_rejects_non_aes_sizes() {
        for n in [0, 8, 15, 17, 20, 23, 33, 64] {
            assert!(matches!(
                CipherChain::new(n, 16),
                Err(Error::InvalidParameters(_))
            ));
        }
        assert!(matches!(
            CipherChain::new(16, 1),
            Err(Error::InvalidParameters(_))
        ));
        assert!(CipherChain::new(24, 4).is_ok());
    }

    #[test]
    fn test_chain_composition() {
        let (n, w) = (32, 16);
        let backend = CipherChain::new(n, w).unwrap();
        let adrs = Adrs::from(AdrsType::Ots);
        let mut keys = vec![0_u8; w * n];
        let mut value = vec![0_u8; n];
        OsRng.fill_bytes(&mut keys);
        OsRng.fill_bytes(&mut value);

        for (a, b) in [(0, 0), (3, 5), (7, 8), (15, 0)] {
            let first = backend.chain(&value, 0, a, &keys, &adrs);
            let composed = backend.chain(&first, a, b, &keys, &adrs);
            assert_eq!(composed, backend.chain(&value, 0, a + b, &keys, &adrs));
        }
    }
}
