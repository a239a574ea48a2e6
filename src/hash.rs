//! Domain-separated hashing over the core hash of a [`ParameterSet`].
//!
//! Every function prefixes its input with `toByte(padding, n)`:
//!
//! * `F`          0: `core(toByte(0, n) || KEY || (M xor BM))`
//! * `H`          1: `core(toByte(1, n) || KEY || (L xor BM0) || (R xor BM1))`
//! * `H_msg`      2: `core(toByte(2, n) || PUB_SEED || root || toByte(idx, n) || M)`
//! * `PRF`        3: `core(toByte(3, n) || key || ADRS)`
//! * `PRF_keygen` 4: `core(toByte(4, n) || SK_SEED || PUB_SEED || ADRS)`
//!
//! Persisted signing keys carry a digest `core(toByte(255, n) || state)` so that a damaged
//! state is refused instead of signing from it.
//!
//! `KEY` and the bitmasks of `F` and `H` are derived with `PRF(PUB_SEED, ADRS)` where the
//! key-and-mask word of the address selects which one.

mod sha2;
mod shake;

use crate::adrs::Adrs;
use crate::params::{HashFunction, ParameterSet};
use crate::utils::to_byte;

const PADDING_F: u64 = 0;
const PADDING_H: u64 = 1;
const PADDING_HASH: u64 = 2;
const PADDING_PRF: u64 = 3;
const PADDING_PRF_KEYGEN: u64 = 4;
const PADDING_STATE_DIGEST: u64 = 0xff;

#[derive(Copy, Clone, Debug)]
pub(crate) struct XmssHasher {
    func: HashFunction,
    n: usize,
}

impl XmssHasher {
    pub(crate) fn new(params: &ParameterSet) -> Self {
        Self {
            func: params.hash,
            n: params.n,
        }
    }

    pub(crate) fn n(&self) -> usize {
        self.n
    }

    fn core_hash(&self, output: &mut [u8], input: &[&[u8]]) {
        let output = &mut output[..self.n];
        match self.func {
            HashFunction::Sha256 => sha2::sha256(output, input),
            HashFunction::Sha512 => sha2::sha512(output, input),
            HashFunction::Shake128 => shake::shake128(output, input),
            HashFunction::Shake256 => shake::shake256(output, input),
        }
    }

    /// PRF(key, ADRS), `key` being `n` bytes.
    pub(crate) fn prf(&self, output: &mut [u8], key: &[u8], adrs: &Adrs) {
        let padding = to_byte(PADDING_PRF, self.n);
        self.core_hash(output, &[padding.as_slice(), &key[..self.n], adrs.as_ref()]);
    }

    /// Expands the secret value addressed by `adrs` from `sk_seed`.
    pub(crate) fn prf_keygen(
        &self,
        output: &mut [u8],
        sk_seed: &[u8],
        pub_seed: &[u8],
        adrs: &Adrs,
    ) {
        let padding = to_byte(PADDING_PRF_KEYGEN, self.n);
        self.core_hash(
            output,
            &[
                padding.as_slice(),
                &sk_seed[..self.n],
                &pub_seed[..self.n],
                adrs.as_ref(),
            ],
        );
    }

    /// Deterministic message digest bound to the key and the leaf index.
    pub(crate) fn h_msg(
        &self,
        output: &mut [u8],
        pub_seed: &[u8],
        root: &[u8],
        index: u64,
        message: &[u8],
    ) {
        let padding = to_byte(PADDING_HASH, self.n);
        let index_bytes = to_byte(index, self.n);
        self.core_hash(
            output,
            &[
                padding.as_slice(),
                &pub_seed[..self.n],
                &root[..self.n],
                index_bytes.as_slice(),
                message,
            ],
        );
    }

    /// The chain function `F`. `output` and `input` may not alias; see [`Self::thash_f_inplace`].
    pub(crate) fn thash_f(&self, output: &mut [u8], input: &[u8], pub_seed: &[u8], adrs: &Adrs) {
        let n = self.n;
        let mut adrs = *adrs;
        let mut key = vec![0_u8; n];
        let mut masked = vec![0_u8; n];

        adrs.set_key_and_mask(0);
        self.prf(&mut key, pub_seed, &adrs);
        adrs.set_key_and_mask(1);
        self.prf(&mut masked, pub_seed, &adrs);
        masked
            .iter_mut()
            .zip(&input[..n])
            .for_each(|(m, x)| *m ^= x);

        let padding = to_byte(PADDING_F, n);
        self.core_hash(output, &[padding.as_slice(), key.as_slice(), masked.as_slice()]);
    }

    /// Applies [`Self::thash_f`], but modifies the given value in place.
    pub(crate) fn thash_f_inplace(&self, inout: &mut [u8], pub_seed: &[u8], adrs: &Adrs) {
        let input = inout[..self.n].to_vec();
        self.thash_f(inout, &input, pub_seed, adrs);
    }

    /// The node function `H`.
    pub(crate) fn thash_h(
        &self,
        output: &mut [u8],
        left: &[u8],
        right: &[u8],
        pub_seed: &[u8],
        adrs: &Adrs,
    ) {
        let n = self.n;
        let mut adrs = *adrs;
        let mut key = vec![0_u8; n];
        let mut masked = vec![0_u8; 2 * n];

        adrs.set_key_and_mask(0);
        self.prf(&mut key, pub_seed, &adrs);
        adrs.set_key_and_mask(1);
        self.prf(&mut masked[..n], pub_seed, &adrs);
        adrs.set_key_and_mask(2);
        self.prf(&mut masked[n..], pub_seed, &adrs);
        masked
            .iter_mut()
            .zip(left[..n].iter().chain(&right[..n]))
            .for_each(|(m, x)| *m ^= x);

        let padding = to_byte(PADDING_H, n);
        self.core_hash(output, &[padding.as_slice(), key.as_slice(), masked.as_slice()]);
    }

    /// Integrity digest of a serialized signing key.
    pub(crate) fn state_digest(&self, state: &[u8]) -> Vec<u8> {
        let padding = to_byte(PADDING_STATE_DIGEST, self.n);
        let mut output = vec![0_u8; self.n];
        self.core_hash(&mut output, &[padding.as_slice(), state]);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adrs::AdrsType;
    use crate::params::ChainKind;

    fn hasher(func: HashFunction, n: usize) -> XmssHasher {
        XmssHasher::new(&ParameterSet::new(func, ChainKind::Hash, n, 16, 4, 1, 0).unwrap())
    }

    #[test]
    fn test_core_hash_known_answer() {
        // SHA2-256("abc")
        let expected = [
            0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae,
            0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61,
            0xf2, 0x00, 0x15, 0xad,
        ];
        let mut out = [0_u8; 32];
        hasher(HashFunction::Sha256, 32).core_hash(&mut out, &[&b"a"[..], &b"bc"[..]]);
        assert_eq!(out, expected);

        let mut truncated = [0_u8; 24];
        hasher(HashFunction::Sha256, 24).core_hash(&mut truncated, &[&b"abc"[..]]);
        assert_eq!(truncated[..], expected[..24]);
    }

    #[test]
    fn test_domain_separation() {
        for func in [
            HashFunction::Sha256,
            HashFunction::Sha512,
            HashFunction::Shake128,
            HashFunction::Shake256,
        ] {
            let h = hasher(func, 32);
            let seed = [7_u8; 32];
            let value = [9_u8; 32];
            let adrs = Adrs::from(AdrsType::Ots);

            let mut prf = [0_u8; 32];
            let mut keygen = [0_u8; 32];
            let mut f = [0_u8; 32];
            let mut h_out = [0_u8; 32];
            h.prf(&mut prf, &seed, &adrs);
            h.prf_keygen(&mut keygen, &seed, &seed, &adrs);
            h.thash_f(&mut f, &value, &seed, &adrs);
            h.thash_h(&mut h_out, &value, &value, &seed, &adrs);
            assert_ne!(prf, keygen);
            assert_ne!(f, h_out);

            let mut other = adrs;
            other.set_hash_addr(1);
            let mut f_other = [0_u8; 32];
            h.thash_f(&mut f_other, &value, &seed, &other);
            assert_ne!(f, f_other);

            let mut inplace = value;
            h.thash_f_inplace(&mut inplace, &seed, &adrs);
            assert_eq!(inplace, f);
        }
    }

    #[test]
    fn test_h_msg_binds_index() {
        let h = hasher(HashFunction::Sha256, 32);
        let mut a = [0_u8; 32];
        let mut b = [0_u8; 32];
        h.h_msg(&mut a, &[1; 32], &[2; 32], 0, b"message");
        h.h_msg(&mut b, &[1; 32], &[2; 32], 1, b"message");
        assert_ne!(a, b);
    }
}
