//! # Parameter sets
//!
//! A [`ParameterSet`] fixes every size used by the scheme: the security parameter `n`, the
//! Winternitz parameter `w`, the total tree height `h`, the number of layers `d`, the BDS
//! retain parameter `k`, the hash function and the chain backend. It is chosen once when a key
//! is generated and is never mutated afterwards.
//!
//! Parameter sets are built either through [`ParameterSet::new`], which validates the
//! combination, or through one of the named constructors such as
//! [`ParameterSet::xmss_sha2_10_256`].

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Index bytes of a single-tree signature and signing key.
pub const XMSS_INDEX_BYTES: usize = 4;

/// Largest supported total height.
pub const MAX_FULL_HEIGHT: usize = 60;

/// Largest supported height of a single tree.
pub const MAX_TREE_HEIGHT: usize = 30;

/// Core hash function behind `F`, `H`, `H_msg` and the PRFs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum HashFunction {
    /// SHA2-256, output truncated to `n <= 32` bytes.
    Sha256,
    /// SHA2-512, output truncated to `n <= 64` bytes.
    Sha512,
    /// SHAKE128 squeezed to `n` bytes.
    Shake128,
    /// SHAKE256 squeezed to `n` bytes.
    Shake256,
}

impl HashFunction {
    fn max_output_bytes(&self) -> usize {
        match self {
            HashFunction::Sha256 => 32,
            HashFunction::Sha512 | HashFunction::Shake128 | HashFunction::Shake256 => 64,
        }
    }
}

/// Which one-way chain the one-time signature is built from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum ChainKind {
    /// WOTS+ chains of the robust tweakable hash `F`, with a checksum.
    Hash,
    /// AES-keyed cipher lattice (POTS). No checksum and one cipher step per rung.
    Cipher,
}

/// Every size and choice the scheme needs, derived from a handful of free parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ParameterSet {
    pub hash: HashFunction,
    pub chain: ChainKind,
    /// Security parameter in bytes.
    pub n: usize,
    pub w: usize,
    pub log_w: usize,
    pub len1: usize,
    /// Checksum digits; zero for the cipher backend.
    pub len2: usize,
    pub len: usize,
    /// Total height over all layers.
    pub full_height: usize,
    /// Number of layers; `1` is plain XMSS.
    pub d: usize,
    /// Height of one tree, `full_height / d`.
    pub tree_height: usize,
    /// Number of top levels whose right nodes are retained by BDS.
    pub bds_k: usize,
    pub index_bytes: usize,
}

impl ParameterSet {
    /// Validates and derives a parameter set.
    ///
    /// # Arguments
    ///
    /// * `hash` - The core hash function.
    /// * `chain` - The chain backend of the one-time signature.
    /// * `n` - Security parameter in bytes.
    /// * `w` - Winternitz parameter, one of 4, 16 or 256.
    /// * `full_height` - Total height; the scheme signs `2^full_height` messages.
    /// * `d` - Number of layers. Must divide `full_height`.
    /// * `bds_k` - BDS retain parameter. `full_height / d - bds_k` must be even.
    ///
    /// # Returns
    ///
    /// The derived `ParameterSet`, or [`Error::InvalidParameters`] naming the first violated
    /// constraint.
    pub fn new(
        hash: HashFunction,
        chain: ChainKind,
        n: usize,
        w: usize,
        full_height: usize,
        d: usize,
        bds_k: usize,
    ) -> Result<Self> {
        if !matches!(w, 4 | 16 | 256) {
            return Err(invalid(format!("w = {} is not one of 4, 16, 256", w)));
        }
        if !(16..=64).contains(&n) {
            return Err(invalid(format!("n = {} is outside 16..=64", n)));
        }
        if n > hash.max_output_bytes() {
            return Err(invalid(format!(
                "n = {} exceeds the {} byte output of {:?}",
                n,
                hash.max_output_bytes(),
                hash
            )));
        }
        if chain == ChainKind::Cipher && !matches!(n, 16 | 24 | 32) {
            return Err(invalid(format!(
                "the cipher chain needs n to be an AES key size, got {}",
                n
            )));
        }
        if d == 0 || full_height % d != 0 {
            return Err(invalid(format!(
                "{} layers do not divide height {}",
                d, full_height
            )));
        }
        if full_height > MAX_FULL_HEIGHT {
            return Err(invalid(format!(
                "height {} exceeds {}",
                full_height, MAX_FULL_HEIGHT
            )));
        }
        let tree_height = full_height / d;
        if !(2..=MAX_TREE_HEIGHT).contains(&tree_height) {
            return Err(invalid(format!(
                "tree height {} is outside 2..={}",
                tree_height, MAX_TREE_HEIGHT
            )));
        }
        if bds_k > tree_height || (tree_height - bds_k) % 2 != 0 {
            return Err(invalid(format!(
                "BDS k = {} needs k <= {} and an even difference",
                bds_k, tree_height
            )));
        }
        Ok(Self::derive(hash, chain, n, w, full_height, d, bds_k))
    }

    /// Computes the dependent fields without validation.
    const fn derive(
        hash: HashFunction,
        chain: ChainKind,
        n: usize,
        w: usize,
        full_height: usize,
        d: usize,
        bds_k: usize,
    ) -> Self {
        let log_w = w.trailing_zeros() as usize;
        let len1 = (8 * n) / log_w;
        let len2 = match chain {
            ChainKind::Hash => {
                let max_checksum = len1 * (w - 1);
                let bits = (usize::BITS - 1 - max_checksum.leading_zeros()) as usize;
                bits / log_w + 1
            },
            ChainKind::Cipher => 0,
        };
        let index_bytes = if d == 1 {
            XMSS_INDEX_BYTES
        } else {
            (full_height + 7) / 8
        };
        Self {
            hash,
            chain,
            n,
            w,
            log_w,
            len1,
            len2,
            len: len1 + len2,
            full_height,
            d,
            tree_height: full_height / d,
            bds_k,
            index_bytes,
        }
    }

    /// XMSS-SHA2_10_256: `n = 32`, `w = 16`, `h = 10`.
    pub const fn xmss_sha2_10_256() -> Self {
        Self::derive(HashFunction::Sha256, ChainKind::Hash, 32, 16, 10, 1, 0)
    }

    /// XMSS-SHA2_16_256.
    pub const fn xmss_sha2_16_256() -> Self {
        Self::derive(HashFunction::Sha256, ChainKind::Hash, 32, 16, 16, 1, 2)
    }

    /// XMSS-SHA2_20_256.
    pub const fn xmss_sha2_20_256() -> Self {
        Self::derive(HashFunction::Sha256, ChainKind::Hash, 32, 16, 20, 1, 4)
    }

    /// XMSS-SHA2_10_512.
    pub const fn xmss_sha2_10_512() -> Self {
        Self::derive(HashFunction::Sha512, ChainKind::Hash, 64, 16, 10, 1, 0)
    }

    /// XMSS-SHAKE_10_256.
    pub const fn xmss_shake_10_256() -> Self {
        Self::derive(HashFunction::Shake128, ChainKind::Hash, 32, 16, 10, 1, 0)
    }

    /// XMSSMT-SHA2_20/2_256.
    pub const fn xmssmt_sha2_20_2_256() -> Self {
        Self::derive(HashFunction::Sha256, ChainKind::Hash, 32, 16, 20, 2, 0)
    }

    /// XMSSMT-SHA2_20/4_256.
    pub const fn xmssmt_sha2_20_4_256() -> Self {
        Self::derive(HashFunction::Sha256, ChainKind::Hash, 32, 16, 20, 4, 1)
    }

    /// The cipher-chain counterpart of [`ParameterSet::xmss_sha2_10_256`]: AES-256 rungs,
    /// SHA2-256 for everything else.
    pub const fn pots_sha2_10_256() -> Self {
        Self::derive(HashFunction::Sha256, ChainKind::Cipher, 32, 16, 10, 1, 0)
    }

    /// Total number of signatures, `2^full_height`.
    pub fn max_signatures(&self) -> u64 {
        1_u64 << self.full_height
    }

    /// Number of leaves of a single tree.
    pub fn leaves_per_tree(&self) -> u64 {
        1_u64 << self.tree_height
    }

    /// Secret values expanded per chain: one start for a hash chain, one key per rung for the
    /// cipher lattice.
    pub fn secrets_per_chain(&self) -> usize {
        match self.chain {
            ChainKind::Hash => 1,
            ChainKind::Cipher => self.w,
        }
    }

    /// Bytes of an OTS signature: one revealed value per chain.
    pub fn ots_sig_bytes(&self) -> usize {
        self.len * self.n
    }

    /// Bytes of an OTS public key.
    pub fn ots_pk_bytes(&self) -> usize {
        self.len * self.secrets_per_chain() * self.n
    }

    /// Bytes of the OTS part inside a tree signature. The cipher lattice cannot be recomputed
    /// by a verifier, so it travels with the revealed values.
    pub fn tree_ots_bytes(&self) -> usize {
        match self.chain {
            ChainKind::Hash => self.ots_sig_bytes(),
            ChainKind::Cipher => self.ots_sig_bytes() + self.ots_pk_bytes(),
        }
    }

    /// Bytes of the OTS signature and auth path of one layer.
    pub fn layer_sig_bytes(&self) -> usize {
        self.tree_ots_bytes() + self.tree_height * self.n
    }

    /// Bytes of a full signature.
    pub fn sig_bytes(&self) -> usize {
        self.index_bytes + self.d * self.layer_sig_bytes()
    }

    /// Bytes of a public key: `root || PUB_SEED`.
    pub fn pk_bytes(&self) -> usize {
        2 * self.n
    }

    /// Bytes of the fixed head of a signing key: `index || SK_SEED || SK_PRF || PUB_SEED`.
    pub fn sk_head_bytes(&self) -> usize {
        self.index_bytes + 3 * self.n
    }
}

fn invalid(reason: String) -> Error {
    Error::InvalidParameters(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_sets_are_valid() {
        for params in [
            ParameterSet::xmss_sha2_10_256(),
            ParameterSet::xmss_sha2_16_256(),
            ParameterSet::xmss_sha2_20_256(),
            ParameterSet::xmss_sha2_10_512(),
            ParameterSet::xmss_shake_10_256(),
            ParameterSet::xmssmt_sha2_20_2_256(),
            ParameterSet::xmssmt_sha2_20_4_256(),
            ParameterSet::pots_sha2_10_256(),
        ] {
            let checked = ParameterSet::new(
                params.hash,
                params.chain,
                params.n,
                params.w,
                params.full_height,
                params.d,
                params.bds_k,
            )
            .unwrap();
            assert_eq!(checked, params);
        }
    }

    #[test]
    fn test_derived_lengths() {
        let p = ParameterSet::xmss_sha2_10_256();
        assert_eq!((p.len1, p.len2, p.len), (64, 3, 67));
        assert_eq!(p.ots_sig_bytes(), 2144);
        assert_eq!(p.sig_bytes(), 4 + 2144 + 10 * 32);

        let p =
            ParameterSet::new(HashFunction::Shake256, ChainKind::Hash, 32, 4, 10, 1, 0).unwrap();
        assert_eq!((p.len1, p.len2), (128, 5));

        let p =
            ParameterSet::new(HashFunction::Sha256, ChainKind::Hash, 32, 256, 10, 1, 0).unwrap();
        assert_eq!((p.len1, p.len2), (32, 2));

        let p = ParameterSet::pots_sha2_10_256();
        assert_eq!((p.len1, p.len2, p.len), (64, 0, 64));
        assert_eq!(p.ots_pk_bytes(), 64 * 16 * 32);

        let p = ParameterSet::xmssmt_sha2_20_2_256();
        assert_eq!(p.index_bytes, 3);
        assert_eq!(p.tree_height, 10);
    }

    #[test]
    fn test_rejects_invalid_combinations() {
        use HashFunction::*;
        let bad = [
            ParameterSet::new(Sha256, ChainKind::Hash, 32, 8, 10, 1, 0),
            ParameterSet::new(Sha256, ChainKind::Hash, 48, 16, 10, 1, 0),
            ParameterSet::new(Shake256, ChainKind::Cipher, 64, 16, 10, 1, 0),
            ParameterSet::new(Sha256, ChainKind::Hash, 32, 16, 10, 3, 0),
            ParameterSet::new(Sha256, ChainKind::Hash, 32, 16, 10, 1, 1),
            ParameterSet::new(Sha256, ChainKind::Hash, 32, 16, 1, 1, 1),
            ParameterSet::new(Sha256, ChainKind::Hash, 32, 16, 62, 2, 0),
            ParameterSet::new(Sha256, ChainKind::Hash, 32, 16, 10, 0, 0),
        ];
        for result in bad {
            assert!(matches!(result, Err(Error::InvalidParameters(_))));
        }
    }
}
