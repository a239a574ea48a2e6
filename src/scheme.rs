use crate::adrs::{Adrs, AdrsType};
use crate::bds::{BdsPhase, BdsState};
use crate::db::KeyStore;
use crate::hash::XmssHasher;
use crate::params::ParameterSet;
use crate::tree::{l_tree, root_from_auth, TreeContext};
use crate::utils::{bytes_to_u64, secret_struct, take, ull_to_bytes};
use crate::wots::Wots;
use crate::{Error, Result, VerificationError};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use std::fmt::Display;
use zeroize::Zeroize;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

secret_struct!(SecretSeed);

/// The verifying key: the root of the top tree and the public seed.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct PublicKey {
    params: ParameterSet,
    root: Vec<u8>,
    pub_seed: Vec<u8>,
}

impl PublicKey {
    /// The parameter set the key was generated for.
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Root of the top tree, `n` bytes.
    pub fn root(&self) -> &[u8] {
        &self.root
    }

    /// The public seed keying every tweakable hash call, `n` bytes.
    pub fn pub_seed(&self) -> &[u8] {
        &self.pub_seed
    }

    /// `root || PUB_SEED`.
    pub fn to_bytes(&self) -> Vec<u8> {
        [self.root.as_slice(), self.pub_seed.as_slice()].concat()
    }

    /// Reads a public key written by [`PublicKey::to_bytes`].
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter set the key belongs to.
    /// * `bytes` - Exactly `2 * n` bytes.
    ///
    /// # Returns
    ///
    /// The key, or [`Error::BadLength`] if `bytes` has the wrong size.
    pub fn from_bytes(params: &ParameterSet, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != params.pk_bytes() {
            return Err(Error::BadLength(params.pk_bytes(), bytes.len()));
        }
        let (root, pub_seed) = bytes.split_at(params.n);
        Ok(Self {
            params: *params,
            root: root.to_vec(),
            pub_seed: pub_seed.to_vec(),
        })
    }

    /// A deserialized key can carry fields of any length; both must be `n` bytes.
    fn check_lengths(&self) -> Result<()> {
        let n = self.params.n;
        for field in [&self.root, &self.pub_seed] {
            if field.len() != n {
                return Err(Error::BadLength(n, field.len()));
            }
        }
        Ok(())
    }
}

/// The part of a signature contributed by one layer.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct LayerSignature {
    ots: Vec<u8>,
    auth: Vec<u8>,
}

impl LayerSignature {
    /// The OTS signature, followed by the public lattice for cipher chains.
    pub fn ots(&self) -> &[u8] {
        &self.ots
    }

    pub fn auth_path(&self) -> &[u8] {
        &self.auth
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Signature {
    params: ParameterSet,
    index: u64,
    layers: Vec<LayerSignature>,
}

impl Signature {
    /// Index of the one-time key this signature was made with.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn layers(&self) -> &[LayerSignature] {
        &self.layers
    }

    /// `index || (OTS signature || auth path)` for every layer, bottom layer first.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0_u8; self.params.index_bytes];
        ull_to_bytes(&mut out, self.index);
        out.reserve(self.params.sig_bytes() - self.params.index_bytes);
        for layer in &self.layers {
            out.extend_from_slice(&layer.ots);
            out.extend_from_slice(&layer.auth);
        }
        out
    }

    /// Parses a signature, rejecting wrong lengths and out-of-range indices before any
    /// cryptographic work.
    pub fn from_bytes(params: &ParameterSet, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != params.sig_bytes() {
            return Err(Error::MalformedSignature(format!(
                "expected {} bytes, found {}",
                params.sig_bytes(),
                bytes.len()
            )));
        }
        let (index, mut rest) = bytes.split_at(params.index_bytes);
        let index = bytes_to_u64(index);
        if index >= params.max_signatures() {
            return Err(Error::MalformedSignature(format!(
                "index {} is beyond the {} one-time keys",
                index,
                params.max_signatures()
            )));
        }
        let auth_bytes = params.tree_height * params.n;
        let mut layers = Vec::with_capacity(params.d);
        for _ in 0..params.d {
            let (ots, tail) = rest.split_at(params.tree_ots_bytes());
            let (auth, tail) = tail.split_at(auth_bytes);
            layers.push(LayerSignature {
                ots: ots.to_vec(),
                auth: auth.to_vec(),
            });
            rest = tail;
        }
        Ok(Self {
            params: *params,
            index,
            layers,
        })
    }
}

/// The stateful signing key.
///
/// Besides the seeds it holds the index of the next unused one-time key, the BDS state of the
/// current tree on every layer and, for more than one layer, the signatures of the current
/// roots of the lower layers. Signing needs `&mut self`; a signing key is deliberately not
/// `Clone`, since two copies would hand out the same one-time keys.
pub struct SigningKey {
    params: ParameterSet,
    index: u64,
    sk_seed: SecretSeed,
    sk_prf: SecretSeed,
    pub_seed: Vec<u8>,
    root: Vec<u8>,
    states: Vec<BdsState>,
    root_sigs: Vec<Vec<u8>>,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("params", &self.params)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// The parameter set the key was generated for.
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Index of the next one-time key to be used.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// How many more messages the key can sign, `2^h - index`.
    pub fn remaining_signatures(&self) -> u64 {
        self.params.max_signatures() - self.index
    }

    /// `true` once every one-time key has been used. An exhausted key has no secret seeds left.
    pub fn is_exhausted(&self) -> bool {
        self.index >= self.params.max_signatures()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            params: self.params,
            root: self.root.clone(),
            pub_seed: self.pub_seed.clone(),
        }
    }

    /// Size of [`SigningKey::to_bytes`] for `params`.
    pub fn serialized_bytes(params: &ParameterSet) -> usize {
        params.sk_head_bytes()
            + params.n
            + params.d * BdsState::serialized_bytes(params)
            + (params.d - 1) * params.tree_ots_bytes()
            + params.n
    }

    /// `index || SK_SEED || SK_PRF || PUB_SEED || root || BDS states || root signatures`,
    /// closed by an integrity digest over all of it.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = vec![0_u8; self.params.index_bytes];
        ull_to_bytes(&mut out, self.index);
        out.reserve(Self::serialized_bytes(&self.params));
        out.extend_from_slice(self.sk_seed.as_ref());
        out.extend_from_slice(self.sk_prf.as_ref());
        out.extend_from_slice(&self.pub_seed);
        out.extend_from_slice(&self.root);
        for state in &self.states {
            out.extend(state.to_bytes()?);
        }
        for root_sig in &self.root_sigs {
            out.extend_from_slice(root_sig);
        }
        let digest = XmssHasher::new(&self.params).state_digest(&out);
        out.extend(digest);
        Ok(out)
    }

    /// Restores a signing key written by [`SigningKey::to_bytes`].
    ///
    /// # Returns
    ///
    /// [`Error::StateCorruption`] if the bytes are damaged or describe a state that could not
    /// have been produced by signing, so that the key is never used from such a state.
    pub fn from_bytes(params: &ParameterSet, bytes: &[u8]) -> Result<Self> {
        let n = params.n;
        let expected = Self::serialized_bytes(params);
        if bytes.len() != expected {
            return Err(Error::StateCorruption(format!(
                "expected {} bytes of key state, found {}",
                expected,
                bytes.len()
            )));
        }
        let (body, digest) = bytes.split_at(bytes.len() - n);
        if XmssHasher::new(params).state_digest(body) != digest {
            return Err(Error::StateCorruption(
                "integrity digest does not match".to_string(),
            ));
        }

        let mut cursor = body;
        let index = bytes_to_u64(take(&mut cursor, params.index_bytes)?);
        let sk_seed = SecretSeed::from(take(&mut cursor, n)?);
        let sk_prf = SecretSeed::from(take(&mut cursor, n)?);
        let pub_seed = take(&mut cursor, n)?.to_vec();
        let root = take(&mut cursor, n)?.to_vec();
        let states = (0..params.d)
            .map(|_| BdsState::from_bytes(params, &mut cursor))
            .collect::<Result<Vec<_>>>()?;
        let root_sigs = (1..params.d)
            .map(|_| take(&mut cursor, params.tree_ots_bytes()).map(<[u8]>::to_vec))
            .collect::<Result<Vec<_>>>()?;

        let key = Self {
            params: *params,
            index,
            sk_seed,
            sk_prf,
            pub_seed,
            root,
            states,
            root_sigs,
        };
        key.check_states()?;
        Ok(key)
    }

    /// Every layer's BDS state must hold the leaf the current index selects on that layer.
    fn check_states(&self) -> Result<()> {
        let p = &self.params;
        if self.index > p.max_signatures() {
            return Err(Error::StateCorruption(format!(
                "index {} is beyond the {} one-time keys",
                self.index,
                p.max_signatures()
            )));
        }
        let mask = p.leaves_per_tree() - 1;
        for (layer, state) in self.states.iter().enumerate() {
            let consistent = if self.is_exhausted() {
                state.phase() == BdsPhase::Exhausted
            } else {
                let leaf = (self.index >> (layer * p.tree_height)) & mask;
                state.phase() == BdsPhase::Ready && u64::from(state.leaf()) == leaf
            };
            if !consistent {
                return Err(Error::StateCorruption(format!(
                    "layer {} holds leaf {} ({:?}) for index {}",
                    layer,
                    state.leaf(),
                    state.phase(),
                    self.index
                )));
            }
        }
        Ok(())
    }
}

/// XMSS and XMSS^MT over one parameter set.
///
/// With `d = 1` this is plain XMSS: one tree of height `h`. With `d > 1` the trees of layer
/// `i + 1` sign the roots of the trees of layer `i`, and layer 0 signs message digests.
#[derive(Debug)]
pub struct Xmss {
    params: ParameterSet,
    wots: Wots,
    hasher: XmssHasher,
}

impl Xmss {
    /// Creates the scheme for one parameter set.
    ///
    /// # Arguments
    ///
    /// * `params` - A parameter set built by [`ParameterSet::new`] or one of the named sets.
    ///
    /// # Returns
    ///
    /// An `Xmss` that generates, signs with and verifies keys of `params` only.
    pub fn new(params: ParameterSet) -> Self {
        Self {
            params,
            wots: Wots::new(&params),
            hasher: XmssHasher::new(&params),
        }
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Generates a key pair from the operating system's random number generator.
    pub fn keygen(&self) -> Result<(PublicKey, SigningKey)> {
        self.keygen_with_rng(&mut OsRng)
    }

    pub fn keygen_with_rng<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<(PublicKey, SigningKey)> {
        let mut seed = SecretSeed::zeroed(3 * self.params.n);
        rng.fill_bytes(seed.as_mut());
        self.keygen_from_seed(seed.as_ref())
    }

    /// Deterministic key generation from `SK_SEED || SK_PRF || PUB_SEED`.
    ///
    /// Builds the first tree of every layer, which leaves the BDS states ready for index 0,
    /// and signs the root of every lower tree with leaf 0 of the layer above.
    pub fn keygen_from_seed(&self, seed: &[u8]) -> Result<(PublicKey, SigningKey)> {
        let p = &self.params;
        let n = p.n;
        if seed.len() != 3 * n {
            return Err(Error::BadLength(3 * n, seed.len()));
        }
        let sk_seed = SecretSeed::from(&seed[..n]);
        let sk_prf = SecretSeed::from(&seed[n..2 * n]);
        let pub_seed = seed[2 * n..].to_vec();

        let mut states = Vec::with_capacity(p.d);
        let mut roots = Vec::with_capacity(p.d);
        for layer in 0..p.d {
            let ctx = TreeContext::new(&self.wots, sk_seed.as_ref(), &pub_seed, layer as u32, 0);
            let mut state = BdsState::new(p);
            roots.push(state.init(&ctx));
            states.push(state);
        }
        let root_sigs = (1..p.d)
            .map(|layer| {
                TreeContext::new(&self.wots, sk_seed.as_ref(), &pub_seed, layer as u32, 0)
                    .sign_leaf(&roots[layer - 1], 0)
            })
            .collect();
        let root = roots.pop().unwrap_or_default();

        log::info!(
            "Generated {:?} key: h = {}, d = {}, {} signatures",
            p.chain,
            p.full_height,
            p.d,
            p.max_signatures()
        );

        let key = SigningKey {
            params: *p,
            index: 0,
            sk_seed,
            sk_prf,
            pub_seed,
            root,
            states,
            root_sigs,
        };
        Ok((key.public_key(), key))
    }

    /// Signs `message` with the next one-time key and advances the key past it.
    ///
    /// The key is updated before the signature is returned. Callers who persist the key must
    /// do so before releasing the signature; [`Xmss::sign_committed`] does both in order.
    ///
    /// With `d > 1`, the signature that uses up the last leaf of a lower tree also builds the
    /// whole successor tree of that layer, so it costs `2^(h/d)` extra leaf computations.
    ///
    /// # Returns
    ///
    /// The signature, or [`Error::KeyExhausted`] once all `2^h` one-time keys are used.
    pub fn sign(&self, key: &mut SigningKey, message: &[u8]) -> Result<Signature> {
        let p = &self.params;
        if key.params != *p {
            return Err(Error::InvalidParameters(format!(
                "signing key belongs to {:?}",
                key.params
            )));
        }
        if key.is_exhausted() {
            return Err(Error::KeyExhausted(p.max_signatures()));
        }
        key.check_states()?;

        let index = key.index;
        let th = p.tree_height;
        let mask = p.leaves_per_tree() - 1;

        let mut digest = vec![0_u8; p.n];
        self.hasher
            .h_msg(&mut digest, &key.pub_seed, &key.root, index, message);

        let ctx = TreeContext::new(&self.wots, key.sk_seed.as_ref(), &key.pub_seed, 0, index >> th);
        let mut layers = Vec::with_capacity(p.d);
        layers.push(LayerSignature {
            ots: ctx.sign_leaf(&digest, (index & mask) as u32),
            auth: key.states[0].auth_path().to_vec(),
        });
        for layer in 1..p.d {
            layers.push(LayerSignature {
                ots: key.root_sigs[layer - 1].clone(),
                auth: key.states[layer].auth_path().to_vec(),
            });
        }

        self.advance(key)?;
        log::debug!(
            "Signed with index {}, {} signatures left",
            index,
            key.remaining_signatures()
        );

        Ok(Signature {
            params: *p,
            index,
            layers,
        })
    }

    /// Moves every layer whose leaf changes with the next index. A tree that is used up is
    /// replaced by the next tree of its layer, whose root is signed by the layer above.
    fn advance(&self, key: &mut SigningKey) -> Result<()> {
        let p = &self.params;
        let th = p.tree_height;
        let mask = p.leaves_per_tree() - 1;
        let next = key.index + 1;

        for layer in 0..p.d {
            let shift = layer * th;
            if next % (1_u64 << shift) != 0 {
                break;
            }
            let tree = key.index >> (shift + th);
            let ctx = TreeContext::new(
                &self.wots,
                key.sk_seed.as_ref(),
                &key.pub_seed,
                layer as u32,
                tree,
            );
            key.states[layer].advance(&ctx)?;

            if key.states[layer].phase() == BdsPhase::Exhausted && next < p.max_signatures() {
                let tree = next >> (shift + th);
                log::debug!("Building tree {} of layer {}", tree, layer);
                let ctx = TreeContext::new(
                    &self.wots,
                    key.sk_seed.as_ref(),
                    &key.pub_seed,
                    layer as u32,
                    tree,
                );
                let mut state = BdsState::new(p);
                let root = state.init(&ctx);
                key.states[layer] = state;

                if layer + 1 < p.d {
                    let parent = TreeContext::new(
                        &self.wots,
                        key.sk_seed.as_ref(),
                        &key.pub_seed,
                        (layer + 1) as u32,
                        next >> (shift + 2 * th),
                    );
                    key.root_sigs[layer] = parent.sign_leaf(&root, (tree & mask) as u32);
                }
            }
        }

        key.index = next;
        if key.is_exhausted() {
            key.sk_seed.wipe();
            key.sk_prf.wipe();
            log::warn!(
                "[WARN] Signing key exhausted after {} signatures; its secret seeds were wiped",
                p.max_signatures()
            );
        }
        Ok(())
    }

    /// Signs, then commits the advanced key to `store` under `key_id`. The signature is only
    /// returned once the commit succeeded.
    pub fn sign_committed<S, K>(
        &self,
        key: &mut SigningKey,
        message: &[u8],
        store: &S,
        key_id: K,
    ) -> Result<Signature>
    where
        S: KeyStore,
        K: AsRef<str> + Display + Send,
    {
        let signature = self.sign(key, message)?;
        store.commit(key_id, key)?;
        Ok(signature)
    }

    /// Verifies `signature` on `message` under `public_key`.
    ///
    /// Walks the layers bottom up: the OTS signature of each layer yields a public key, its
    /// L-tree the leaf, and the auth path the root, which is the message of the layer above.
    pub fn verify(
        &self,
        public_key: &PublicKey,
        message: &[u8],
        signature: &Signature,
    ) -> Result<()> {
        let p = &self.params;
        if public_key.params != *p {
            return Err(Error::InvalidParameters(format!(
                "public key belongs to {:?}",
                public_key.params
            )));
        }
        public_key.check_lengths()?;
        self.check_signature(signature)?;

        let n = p.n;
        let th = p.tree_height;
        let mask = p.leaves_per_tree() - 1;
        let pub_seed = public_key.pub_seed.as_slice();
        let index = signature.index;

        let mut node = vec![0_u8; n];
        self.hasher
            .h_msg(&mut node, pub_seed, &public_key.root, index, message);

        for (layer, layer_sig) in signature.layers.iter().enumerate() {
            let leaf = ((index >> (layer * th)) & mask) as u32;
            let mut base = Adrs::default();
            base.set_layer_addr(layer as u32);
            base.set_tree_addr(index >> ((layer + 1) * th));

            let mut ots_adrs = base.subtree_with_type(AdrsType::Ots);
            ots_adrs.set_ots_addr(leaf);
            let ots_pk = self
                .wots
                .pk_from_tree_sig(&layer_sig.ots, &node, pub_seed, &ots_adrs)
                .ok_or(VerificationError::OtsMismatch(layer))?;

            let mut ltree_adrs = base.subtree_with_type(AdrsType::LTree);
            ltree_adrs.set_ltree_addr(leaf);
            let leaf_node = l_tree(&self.hasher, ots_pk, pub_seed, &ltree_adrs);

            node = root_from_auth(
                &self.hasher,
                leaf_node,
                leaf,
                &layer_sig.auth,
                pub_seed,
                &base.subtree_with_type(AdrsType::HashTree),
            );
        }

        if node != public_key.root {
            return Err(VerificationError::RootMismatch.into());
        }
        Ok(())
    }

    fn check_signature(&self, signature: &Signature) -> Result<()> {
        let p = &self.params;
        if signature.params != *p {
            return Err(Error::MalformedSignature(format!(
                "signature belongs to {:?}",
                signature.params
            )));
        }
        if signature.index >= p.max_signatures() {
            return Err(Error::MalformedSignature(format!(
                "index {} is beyond the {} one-time keys",
                signature.index,
                p.max_signatures()
            )));
        }
        let well_formed = signature.layers.len() == p.d
            && signature.layers.iter().all(|layer| {
                layer.ots.len() == p.tree_ots_bytes() && layer.auth.len() == p.tree_height * p.n
            });
        if !well_formed {
            return Err(Error::MalformedSignature(
                "wrong number or size of layers".to_string(),
            ));
        }
        Ok(())
    }
}
