//! # Winternitz One-Time Signatures
//!
//! One engine for both chain backends. A message digest of `n` bytes is split into `len1`
//! base-`w` digits; digit `i` selects how far along chain `i` the revealed value lies. With the
//! hash backend `len2` checksum digits follow, so that raising one digit forces another to drop.
//!
//! Secret values are never stored: they are expanded on demand from `SK_SEED`, `PUB_SEED` and
//! the address of the key pair, so a leaf of the Merkle tree only needs its index to recover
//! its one-time key.
//!
//! ## One-time use
//!
//! [`Wots::sign`] consumes the [`OtsKeyPair`]; a key pair value can sign exactly once. The
//! tree-level signer derives the secret, signs and drops it within one call.
//!
//! ## Tree embedding
//!
//! A hash-chain signature lets the verifier recompute the whole public key. A cipher-chain
//! signature does not, so inside a tree signature it is followed by the public lattice; see
//! [`Wots::sign_for_tree`] and [`Wots::pk_from_tree_sig`].

use crate::adrs::Adrs;
use crate::chain::{backend_for, ChainBackend};
use crate::params::ParameterSet;
use crate::utils::{secret_struct, ull_to_bytes};
use crate::{Error, Result};
use zeroize::Zeroize;

secret_struct!(OtsSecret);

/// A freshly derived one-time key pair.
#[derive(Debug)]
pub struct OtsKeyPair {
    secret: OtsSecret,
    public: Vec<u8>,
}

impl OtsKeyPair {
    /// The public key: `len` chain ends, or `len` lattices for cipher chains.
    pub fn public_key(&self) -> &[u8] {
        &self.public
    }
}

/// Encapsulates the OTS operations of one parameter set.
pub struct Wots {
    params: ParameterSet,
    backend: Box<dyn ChainBackend>,
}

impl std::fmt::Debug for Wots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wots")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Wots {
    /// Creates the OTS engine of a parameter set, with the chain backend it selects.
    ///
    /// # Arguments
    ///
    /// * `params` - A parameter set built by [`ParameterSet::new`] or one of the named sets.
    pub fn new(params: &ParameterSet) -> Self {
        Self {
            params: *params,
            backend: backend_for(params),
        }
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Splits `input` into `out_len` digits of `log_w` bits each, most significant first.
    pub fn base_w(&self, input: &[u8], out_len: usize) -> Vec<u32> {
        let log_w = self.params.log_w;
        let mask = (self.params.w - 1) as u32;
        let mut output = Vec::with_capacity(out_len);
        let mut bits = 0;
        let mut total: u32 = 0;
        let mut input_index = 0;

        for _ in 0..out_len {
            if bits == 0 {
                total = u32::from(input[input_index]);
                input_index += 1;
                bits += 8;
            }
            bits -= log_w;
            output.push((total >> bits) & mask);
        }
        output
    }

    /// Checksum digits over the message digits. The checksum is shifted left so that the
    /// unused bits are the least significant ones.
    fn wots_checksum(&self, msg_base_w: &[u32]) -> Vec<u32> {
        let p = &self.params;
        let csum: u64 = msg_base_w
            .iter()
            .map(|&digit| (p.w as u64) - 1 - u64::from(digit))
            .sum();

        let csum_bits = p.len2 * p.log_w;
        let shift = (8 - (csum_bits % 8)) % 8;
        let mut csum_bytes = vec![0_u8; (csum_bits + 7) / 8];
        ull_to_bytes(&mut csum_bytes, csum << shift);

        self.base_w(&csum_bytes, p.len2)
    }

    /// Takes an `n`-byte message and derives the `len` digits it signs.
    pub fn chain_lengths(&self, message: &[u8]) -> Vec<u32> {
        let mut lengths = self.base_w(message, self.params.len1);
        if self.params.len2 > 0 {
            let checksum = self.wots_checksum(&lengths);
            lengths.extend(checksum);
        }
        lengths
    }

    /// Expands the secret values of the key pair at `adrs`: one per chain for hash chains, one
    /// per rung for cipher chains.
    pub fn expand_seed(&self, sk_seed: &[u8], pub_seed: &[u8], adrs: &Adrs) -> OtsSecret {
        let hasher = crate::hash::XmssHasher::new(&self.params);
        let n = self.params.n;
        let per_chain = self.backend.secrets_per_chain();
        let mut secret = OtsSecret::zeroed(self.params.len * per_chain * n);
        let mut adrs = *adrs;
        adrs.set_key_and_mask(0);

        for (i, chain) in secret.as_mut().chunks_mut(per_chain * n).enumerate() {
            adrs.set_chain_addr(i as u32);
            for (j, value) in chain.chunks_mut(n).enumerate() {
                adrs.set_hash_addr(j as u32);
                hasher.prf_keygen(value, sk_seed, pub_seed, &adrs);
            }
        }
        secret
    }

    /// Computes the public values of every chain from the secret values.
    pub fn pkgen(&self, secret: &OtsSecret, pub_seed: &[u8], adrs: &Adrs) -> Vec<u8> {
        let width = self.backend.secrets_per_chain() * self.params.n;
        let mut adrs = *adrs;
        let mut public = Vec::with_capacity(self.params.ots_pk_bytes());

        for (i, chain) in secret.as_ref().chunks(width).enumerate() {
            adrs.set_chain_addr(i as u32);
            public.extend(self.backend.public_chain(chain, pub_seed, &adrs));
        }
        public
    }

    /// Derives the key pair at `adrs`.
    pub fn keypair(&self, sk_seed: &[u8], pub_seed: &[u8], adrs: &Adrs) -> OtsKeyPair {
        let secret = self.expand_seed(sk_seed, pub_seed, adrs);
        let public = self.pkgen(&secret, pub_seed, adrs);
        OtsKeyPair { secret, public }
    }

    /// Signs an `n`-byte message, consuming the key pair.
    ///
    /// # Returns
    ///
    /// The `len * n`-byte signature, or [`Error::BadLength`] if the message is not `n` bytes.
    pub fn sign(
        &self,
        key_pair: OtsKeyPair,
        message: &[u8],
        pub_seed: &[u8],
        adrs: &Adrs,
    ) -> Result<Vec<u8>> {
        self.check_message(message)?;
        Ok(self.sign_with_secret(&key_pair.secret, message, pub_seed, adrs))
    }

    fn sign_with_secret(
        &self,
        secret: &OtsSecret,
        message: &[u8],
        pub_seed: &[u8],
        adrs: &Adrs,
    ) -> Vec<u8> {
        let width = self.backend.secrets_per_chain() * self.params.n;
        let lengths = self.chain_lengths(message);
        let mut adrs = *adrs;
        let mut signature = Vec::with_capacity(self.params.ots_sig_bytes());

        for (i, (chain, &digit)) in secret.as_ref().chunks(width).zip(&lengths).enumerate() {
            adrs.set_chain_addr(i as u32);
            signature.extend(self.backend.reveal(chain, digit, pub_seed, &adrs));
        }
        signature
    }

    /// Verifies a signature against a full public key. Returns `false` on the first chain that
    /// does not match, and on inputs of the wrong length.
    pub fn verify(
        &self,
        signature: &[u8],
        message: &[u8],
        public_key: &[u8],
        pub_seed: &[u8],
        adrs: &Adrs,
    ) -> bool {
        let n = self.params.n;
        if message.len() != n
            || pub_seed.len() != n
            || signature.len() != self.params.ots_sig_bytes()
            || public_key.len() != self.params.ots_pk_bytes()
        {
            return false;
        }
        let width = self.backend.secrets_per_chain() * n;
        let lengths = self.chain_lengths(message);
        let mut adrs = *adrs;

        signature
            .chunks(n)
            .zip(public_key.chunks(width))
            .zip(&lengths)
            .enumerate()
            .all(|(i, ((revealed, public), &digit))| {
                adrs.set_chain_addr(i as u32);
                self.backend.check(revealed, digit, public, pub_seed, &adrs)
            })
    }

    /// Recomputes the public key from a signature. Only hash chains allow this; cipher chains
    /// return `None`.
    pub fn pk_from_sig(
        &self,
        signature: &[u8],
        message: &[u8],
        pub_seed: &[u8],
        adrs: &Adrs,
    ) -> Option<Vec<u8>> {
        let n = self.params.n;
        if message.len() != n
            || pub_seed.len() != n
            || signature.len() != self.params.ots_sig_bytes()
        {
            return None;
        }
        let lengths = self.chain_lengths(message);
        let mut adrs = *adrs;
        let mut public = Vec::with_capacity(self.params.ots_pk_bytes());

        for (i, (revealed, &digit)) in signature.chunks(n).zip(&lengths).enumerate() {
            adrs.set_chain_addr(i as u32);
            public.extend(self.backend.complete(revealed, digit, pub_seed, &adrs)?);
        }
        Some(public)
    }

    /// Signs `message` with the key pair at `adrs` as it appears inside a tree signature:
    /// the OTS signature, followed by the public lattice for cipher chains.
    pub(crate) fn sign_for_tree(
        &self,
        sk_seed: &[u8],
        pub_seed: &[u8],
        message: &[u8],
        adrs: &Adrs,
    ) -> Vec<u8> {
        let secret = self.expand_seed(sk_seed, pub_seed, adrs);
        let mut signature = self.sign_with_secret(&secret, message, pub_seed, adrs);
        if self.carries_public_key() {
            signature.extend(self.pkgen(&secret, pub_seed, adrs));
        }
        signature
    }

    /// The public key a tree-level OTS signature commits to, or `None` if it does not verify.
    pub(crate) fn pk_from_tree_sig(
        &self,
        tree_signature: &[u8],
        message: &[u8],
        pub_seed: &[u8],
        adrs: &Adrs,
    ) -> Option<Vec<u8>> {
        if tree_signature.len() != self.params.tree_ots_bytes() {
            return None;
        }
        if !self.carries_public_key() {
            return self.pk_from_sig(tree_signature, message, pub_seed, adrs);
        }
        let (signature, public) = tree_signature.split_at(self.params.ots_sig_bytes());
        if self.verify(signature, message, public, pub_seed, adrs) {
            Some(public.to_vec())
        } else {
            None
        }
    }

    fn carries_public_key(&self) -> bool {
        self.params.tree_ots_bytes() > self.params.ots_sig_bytes()
    }

    fn check_message(&self, message: &[u8]) -> Result<()> {
        if message.len() != self.params.n {
            return Err(Error::BadLength(self.params.n, message.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adrs::AdrsType;
    use crate::params::{ChainKind, HashFunction};
    use rand::prelude::*;
    use rand::rngs::OsRng;

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut bytes = vec![0_u8; len];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }

    fn ots_adrs(leaf: u32) -> Adrs {
        let mut adrs = Adrs::from(AdrsType::Ots);
        adrs.set_ots_addr(leaf);
        adrs
    }

    #[test]
    fn test_base_w() {
        let wots = Wots::new(&ParameterSet::xmss_sha2_10_256());
        assert_eq!(wots.base_w(&[0x12, 0x34], 4), vec![1, 2, 3, 4]);
        assert_eq!(wots.base_w(&[0x12, 0x34], 3), vec![1, 2, 3]);

        let w4 = ParameterSet::new(HashFunction::Sha256, ChainKind::Hash, 32, 4, 4, 1, 0).unwrap();
        assert_eq!(Wots::new(&w4).base_w(&[0b1110_0100], 4), vec![3, 2, 1, 0]);

        let w256 =
            ParameterSet::new(HashFunction::Sha256, ChainKind::Hash, 32, 256, 4, 1, 0).unwrap();
        assert_eq!(Wots::new(&w256).base_w(&[7, 200], 2), vec![7, 200]);
    }

    #[test]
    fn test_checksum_digits() {
        let wots = Wots::new(&ParameterSet::xmss_sha2_10_256());

        // All-zero digest: checksum 64 * 15 = 960 = 0x3c0, three digits.
        let lengths = wots.chain_lengths(&[0_u8; 32]);
        assert_eq!(lengths.len(), 67);
        assert_eq!(lengths[64..], [3, 12, 0]);

        // All-0xff digest: checksum 0.
        let lengths = wots.chain_lengths(&[0xff_u8; 32]);
        assert!(lengths[..64].iter().all(|&d| d == 15));
        assert_eq!(lengths[64..], [0, 0, 0]);

        let pots = Wots::new(&ParameterSet::pots_sha2_10_256());
        assert_eq!(pots.chain_lengths(&[0_u8; 32]).len(), 64);
    }

    fn check_round_trip(params: &ParameterSet) {
        let wots = Wots::new(params);
        let n = params.n;
        let sk_seed = random_bytes(n);
        let pub_seed = random_bytes(n);
        let message = random_bytes(n);
        let adrs = ots_adrs(OsRng.gen_range(0..1024));

        let key_pair = wots.keypair(&sk_seed, &pub_seed, &adrs);
        let public = key_pair.public_key().to_vec();
        assert_eq!(public.len(), params.ots_pk_bytes());

        let signature = wots.sign(key_pair, &message, &pub_seed, &adrs).unwrap();
        assert_eq!(signature.len(), params.ots_sig_bytes());
        assert!(wots.verify(&signature, &message, &public, &pub_seed, &adrs));

        // Derivation is deterministic in the seeds and the address.
        let again = wots.keypair(&sk_seed, &pub_seed, &adrs);
        assert_eq!(again.public_key(), public.as_slice());
        let elsewhere = wots.keypair(&sk_seed, &pub_seed, &ots_adrs(1024));
        assert_ne!(elsewhere.public_key(), public.as_slice());

        // Flipping any single bit of the signature or message invalidates it.
        for _ in 0..8 {
            let mut forged = signature.clone();
            let bit = OsRng.gen_range(0..forged.len() * 8);
            forged[bit / 8] ^= 1 << (bit % 8);
            assert!(!wots.verify(&forged, &message, &public, &pub_seed, &adrs));
        }
        let mut other = message.clone();
        other[0] ^= 0x01;
        assert!(!wots.verify(&signature, &other, &public, &pub_seed, &adrs));

        // Wrong lengths are rejected rather than panicking.
        assert!(!wots.verify(&signature[1..], &message, &public, &pub_seed, &adrs));
        assert!(!wots.verify(&signature, &message[1..], &public, &pub_seed, &adrs));
        assert!(!wots.verify(&signature, &message, &public, &pub_seed[1..], &adrs));
        let key_pair = wots.keypair(&sk_seed, &pub_seed, &adrs);
        assert_eq!(
            wots.sign(key_pair, &message[1..], &pub_seed, &adrs),
            Err(Error::BadLength(n, n - 1))
        );
    }

    #[test]
    fn test_hash_chain_round_trip() {
        check_round_trip(&ParameterSet::xmss_sha2_10_256());
        check_round_trip(&ParameterSet::xmss_shake_10_256());
        check_round_trip(
            &ParameterSet::new(HashFunction::Shake256, ChainKind::Hash, 16, 4, 4, 1, 0).unwrap(),
        );
    }

    #[test]
    fn test_cipher_chain_round_trip() {
        check_round_trip(&ParameterSet::pots_sha2_10_256());
        check_round_trip(
            &ParameterSet::new(HashFunction::Sha256, ChainKind::Cipher, 16, 16, 4, 1, 0).unwrap(),
        );
        check_round_trip(
            &ParameterSet::new(HashFunction::Shake128, ChainKind::Cipher, 24, 4, 4, 1, 0).unwrap(),
        );
    }

    #[test]
    fn test_pk_from_sig() {
        let params = ParameterSet::xmss_sha2_10_256();
        let wots = Wots::new(&params);
        let sk_seed = random_bytes(32);
        let pub_seed = random_bytes(32);
        let message = random_bytes(32);
        let adrs = ots_adrs(7);

        let key_pair = wots.keypair(&sk_seed, &pub_seed, &adrs);
        let public = key_pair.public_key().to_vec();
        let signature = wots.sign(key_pair, &message, &pub_seed, &adrs).unwrap();
        assert_eq!(
            wots.pk_from_sig(&signature, &message, &pub_seed, &adrs),
            Some(public.clone())
        );
        assert_eq!(
            wots.pk_from_sig(&signature, &message, &pub_seed[..31], &adrs),
            None
        );

        let tree_signature = wots.sign_for_tree(&sk_seed, &pub_seed, &message, &adrs);
        assert_eq!(tree_signature, signature);
        assert_eq!(
            wots.pk_from_tree_sig(&tree_signature, &message, &pub_seed, &adrs),
            Some(public)
        );
    }

    #[test]
    fn test_cipher_tree_signature_carries_lattice() {
        let params = ParameterSet::pots_sha2_10_256();
        let wots = Wots::new(&params);
        let sk_seed = random_bytes(32);
        let pub_seed = random_bytes(32);
        let message = random_bytes(32);
        let adrs = ots_adrs(3);

        let public = wots.keypair(&sk_seed, &pub_seed, &adrs).public_key().to_vec();
        let tree_signature = wots.sign_for_tree(&sk_seed, &pub_seed, &message, &adrs);
        assert_eq!(tree_signature.len(), params.tree_ots_bytes());
        assert_eq!(tree_signature[params.ots_sig_bytes()..], public[..]);
        assert!(wots
            .pk_from_sig(&tree_signature[..params.ots_sig_bytes()], &message, &pub_seed, &adrs)
            .is_none());
        assert_eq!(
            wots.pk_from_tree_sig(&tree_signature, &message, &pub_seed, &adrs),
            Some(public)
        );

        let mut forged = tree_signature;
        forged[0] ^= 1;
        assert!(wots
            .pk_from_tree_sig(&forged, &message, &pub_seed, &adrs)
            .is_none());
    }
}
