//! The one-way chains a Winternitz one-time signature is built from.
//!
//! A [`ChainBackend`] knows how to walk one chain and how a single chain's secret values turn
//! into public values, revealed values and checks. The OTS engine in [`crate::wots`] is written
//! once against this trait. Two backends exist: [`HashChain`] (WOTS+) here, and
//! [`crate::cipher::CipherChain`] (POTS).

use crate::adrs::Adrs;
use crate::hash::XmssHasher;
use crate::params::{ChainKind, ParameterSet};

pub use crate::cipher::CipherChain;

pub trait ChainBackend: Send + Sync {
    /// Applies rungs `start .. start + steps` to `value`, clamped to the last rung of the chain.
    ///
    /// `seed` is the backend's seed material: `PUB_SEED` for hash chains, the row of rung keys
    /// for cipher chains.
    fn chain(&self, value: &[u8], start: u32, steps: u32, seed: &[u8], adrs: &Adrs) -> Vec<u8>;

    /// Public values of one chain, given its secret values.
    fn public_chain(&self, secrets: &[u8], pub_seed: &[u8], adrs: &Adrs) -> Vec<u8>;

    /// The value revealed when signing `digit`.
    fn reveal(&self, secrets: &[u8], digit: u32, pub_seed: &[u8], adrs: &Adrs) -> Vec<u8>;

    /// Checks a revealed value against the public values of its chain.
    fn check(&self, revealed: &[u8], digit: u32, public: &[u8], pub_seed: &[u8], adrs: &Adrs)
        -> bool;

    /// Recomputes the public values from a revealed value alone, when the backend allows it.
    fn complete(&self, revealed: &[u8], digit: u32, pub_seed: &[u8], adrs: &Adrs)
        -> Option<Vec<u8>>;

    /// Secret (and public) values per chain.
    fn secrets_per_chain(&self) -> usize;
}

/// Builds the backend a parameter set selects.
pub(crate) fn backend_for(params: &ParameterSet) -> Box<dyn ChainBackend> {
    match params.chain {
        ChainKind::Hash => Box::new(HashChain::new(params)),
        ChainKind::Cipher => Box::new(CipherChain::from_params(params)),
    }
}

/// WOTS+ chains: every rung is one call of the robust tweakable hash `F`, addressed by its
/// position in the chain.
#[derive(Copy, Clone, Debug)]
pub struct HashChain {
    hasher: XmssHasher,
    w: u32,
}

impl HashChain {
    /// Creates the hash backend of `params`: its `F` and its chain length `w`.
    pub fn new(params: &ParameterSet) -> Self {
        Self {
            hasher: XmssHasher::new(params),
            w: params.w as u32,
        }
    }
}

impl ChainBackend for HashChain {
    fn chain(&self, value: &[u8], start: u32, steps: u32, seed: &[u8], adrs: &Adrs) -> Vec<u8> {
        let mut out = value[..self.hasher.n()].to_vec();
        let mut adrs = *adrs;
        let end = start.saturating_add(steps).min(self.w - 1);
        for i in start..end {
            adrs.set_hash_addr(i);
            self.hasher.thash_f_inplace(&mut out, seed, &adrs);
        }
        out
    }

    fn public_chain(&self, secrets: &[u8], pub_seed: &[u8], adrs: &Adrs) -> Vec<u8> {
        self.chain(secrets, 0, self.w - 1, pub_seed, adrs)
    }

    fn reveal(&self, secrets: &[u8], digit: u32, pub_seed: &[u8], adrs: &Adrs) -> Vec<u8> {
        self.chain(secrets, 0, digit, pub_seed, adrs)
    }

    fn check(
        &self,
        revealed: &[u8],
        digit: u32,
        public: &[u8],
        pub_seed: &[u8],
        adrs: &Adrs,
    ) -> bool {
        match self.complete(revealed, digit, pub_seed, adrs) {
            Some(end) => end == public[..self.hasher.n()],
            None => false,
        }
    }

    fn complete(
        &self,
        revealed: &[u8],
        digit: u32,
        pub_seed: &[u8],
        adrs: &Adrs,
    ) -> Option<Vec<u8>> {
        if digit >= self.w {
            return None;
        }
        Some(self.chain(revealed, digit, self.w - 1 - digit, pub_seed, adrs))
    }

    fn secrets_per_chain(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adrs::AdrsType;
    use rand::rngs::OsRng;
    use rand::RngCore;

    #[test]
    fn test_chain_composition() {
        let params = ParameterSet::xmss_sha2_10_256();
        let backend = HashChain::new(&params);
        let mut pub_seed = [0_u8; 32];
        let mut value = [0_u8; 32];
        OsRng.fill_bytes(&mut pub_seed);
        OsRng.fill_bytes(&mut value);
        let mut adrs = Adrs::from(AdrsType::Ots);
        adrs.set_chain_addr(5);

        for (a, b) in [(0, 0), (0, 15), (4, 7), (9, 6), (15, 0)] {
            let first = backend.chain(&value, 0, a, &pub_seed, &adrs);
            let composed = backend.chain(&first, a, b, &pub_seed, &adrs);
            assert_eq!(composed, backend.chain(&value, 0, a + b, &pub_seed, &adrs));
        }

        // Steps past the end of the chain are ignored.
        assert_eq!(
            backend.chain(&value, 10, 100, &pub_seed, &adrs),
            backend.chain(&value, 10, 5, &pub_seed, &adrs)
        );
        assert_eq!(
            backend.chain(&value, 0, u32::MAX, &pub_seed, &adrs),
            backend.public_chain(&value, &pub_seed, &adrs)
        );
        assert_eq!(
            backend.chain(&value, 15, 1, &pub_seed, &adrs),
            value[..].to_vec()
        );
    }

    #[test]
    fn test_reveal_and_complete() {
        let params = ParameterSet::xmss_sha2_10_256();
        let backend = backend_for(&params);
        let pub_seed = [3_u8; 32];
        let secret = [4_u8; 32];
        let adrs = Adrs::from(AdrsType::Ots);

        let public = backend.public_chain(&secret, &pub_seed, &adrs);
        for digit in 0..16 {
            let revealed = backend.reveal(&secret, digit, &pub_seed, &adrs);
            assert_eq!(
                backend.complete(&revealed, digit, &pub_seed, &adrs),
                Some(public.clone())
            );
            assert!(backend.check(&revealed, digit, &public, &pub_seed, &adrs));
        }
        assert!(!backend.check(&secret, 1, &public, &pub_seed, &adrs));
        assert!(backend.complete(&secret, 16, &pub_seed, &adrs).is_none());
    }
}
