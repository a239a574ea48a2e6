//! Leaves and inner nodes of the Merkle trees.
//!
//! A leaf is the L-tree compression of a one-time public key: the public values are hashed
//! pairwise with `H` under an L-tree address, an odd value out is lifted unchanged to the next
//! level, until one node remains. Inner nodes hash their two children under a hash-tree
//! address carrying the children's height and the parent's index.

use crate::adrs::{Adrs, AdrsType};
use crate::hash::XmssHasher;
use crate::wots::Wots;
use rayon::prelude::*;

/// Compresses a one-time public key into a leaf. `adrs` is an L-tree address with the leaf's
/// L-tree address already set.
pub(crate) fn l_tree(
    hasher: &XmssHasher,
    mut pk: Vec<u8>,
    pub_seed: &[u8],
    adrs: &Adrs,
) -> Vec<u8> {
    let n = hasher.n();
    let mut adrs = *adrs;
    let mut l = pk.len() / n;
    let mut height = 0;
    let mut node = vec![0_u8; n];

    while l > 1 {
        adrs.set_tree_height(height);
        let parent_nodes = l >> 1;
        for i in 0..parent_nodes {
            adrs.set_tree_index(i as u32);
            hasher.thash_h(
                &mut node,
                &pk[2 * i * n..(2 * i + 1) * n],
                &pk[(2 * i + 1) * n..(2 * i + 2) * n],
                pub_seed,
                &adrs,
            );
            pk[i * n..(i + 1) * n].copy_from_slice(&node);
        }
        if l & 1 == 1 {
            pk.copy_within((l - 1) * n..l * n, parent_nodes * n);
            l = parent_nodes + 1;
        } else {
            l = parent_nodes;
        }
        height += 1;
    }
    pk.truncate(n);
    pk
}

/// Hashes two children at `child_height` into the parent at `parent_index`. `adrs` is a
/// hash-tree address of the right layer and tree.
pub(crate) fn hash_node(
    hasher: &XmssHasher,
    left: &[u8],
    right: &[u8],
    child_height: u32,
    parent_index: u32,
    pub_seed: &[u8],
    adrs: &Adrs,
) -> Vec<u8> {
    let mut adrs = *adrs;
    adrs.set_tree_height(child_height);
    adrs.set_tree_index(parent_index);
    let mut parent = vec![0_u8; hasher.n()];
    hasher.thash_h(&mut parent, left, right, pub_seed, &adrs);
    parent
}

/// Climbs from a leaf to the root along an authentication path of `auth.len() / n` nodes.
pub(crate) fn root_from_auth(
    hasher: &XmssHasher,
    leaf: Vec<u8>,
    leaf_idx: u32,
    auth: &[u8],
    pub_seed: &[u8],
    adrs: &Adrs,
) -> Vec<u8> {
    let n = hasher.n();
    let mut node = leaf;
    for (k, sibling) in auth.chunks(n).enumerate() {
        let k = k as u32;
        let parent_index = leaf_idx >> (k + 1);
        node = if (leaf_idx >> k) & 1 == 0 {
            hash_node(hasher, &node, sibling, k, parent_index, pub_seed, adrs)
        } else {
            hash_node(hasher, sibling, &node, k, parent_index, pub_seed, adrs)
        };
    }
    node
}

/// Everything needed to derive the leaves and nodes of one tree on one layer.
#[derive(Clone, Copy)]
pub(crate) struct TreeContext<'a> {
    pub(crate) wots: &'a Wots,
    pub(crate) hasher: XmssHasher,
    sk_seed: &'a [u8],
    pub(crate) pub_seed: &'a [u8],
    layer: u32,
    tree: u64,
}

impl<'a> TreeContext<'a> {
    pub(crate) fn new(
        wots: &'a Wots,
        sk_seed: &'a [u8],
        pub_seed: &'a [u8],
        layer: u32,
        tree: u64,
    ) -> Self {
        Self {
            wots,
            hasher: XmssHasher::new(wots.params()),
            sk_seed,
            pub_seed,
            layer,
            tree,
        }
    }

    pub(crate) fn adrs(&self, adrs_type: AdrsType) -> Adrs {
        let mut adrs = Adrs::from(adrs_type);
        adrs.set_layer_addr(self.layer);
        adrs.set_tree_addr(self.tree);
        adrs
    }

    pub(crate) fn ots_adrs(&self, leaf: u32) -> Adrs {
        let mut adrs = self.adrs(AdrsType::Ots);
        adrs.set_ots_addr(leaf);
        adrs
    }

    /// The leaf at index `leaf`.
    pub(crate) fn leaf(&self, leaf: u32) -> Vec<u8> {
        let key_pair = self
            .wots
            .keypair(self.sk_seed, self.pub_seed, &self.ots_adrs(leaf));
        let mut ltree_adrs = self.adrs(AdrsType::LTree);
        ltree_adrs.set_ltree_addr(leaf);
        l_tree(
            &self.hasher,
            key_pair.public_key().to_vec(),
            self.pub_seed,
            &ltree_adrs,
        )
    }

    /// Leaves `0 .. count`, computed in parallel.
    pub(crate) fn leaves(&self, count: u32) -> Vec<Vec<u8>> {
        (0..count).into_par_iter().map(|i| self.leaf(i)).collect()
    }

    pub(crate) fn node(
        &self,
        left: &[u8],
        right: &[u8],
        child_height: u32,
        parent_index: u32,
    ) -> Vec<u8> {
        hash_node(
            &self.hasher,
            left,
            right,
            child_height,
            parent_index,
            self.pub_seed,
            &self.adrs(AdrsType::HashTree),
        )
    }

    /// Tree-level OTS signature of `message` with the key pair of `leaf`.
    pub(crate) fn sign_leaf(&self, message: &[u8], leaf: u32) -> Vec<u8> {
        self.wots
            .sign_for_tree(self.sk_seed, self.pub_seed, message, &self.ots_adrs(leaf))
    }

    /// Every level of the tree, leaves first. Only meant for small trees.
    #[cfg(test)]
    pub(crate) fn levels(&self, tree_height: usize) -> Vec<Vec<Vec<u8>>> {
        let mut levels = vec![self.leaves(1 << tree_height)];
        for height in 0..tree_height {
            let next = levels[height]
                .chunks(2)
                .enumerate()
                .map(|(i, pair)| self.node(&pair[0], &pair[1], height as u32, i as u32))
                .collect();
            levels.push(next);
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ChainKind, HashFunction, ParameterSet};

    fn small_params(chain: ChainKind) -> ParameterSet {
        ParameterSet::new(HashFunction::Sha256, chain, 32, 16, 4, 1, 0).unwrap()
    }

    #[test]
    fn test_l_tree_lifts_odd_node() {
        let params = small_params(ChainKind::Hash);
        let hasher = XmssHasher::new(&params);
        let pub_seed = [1_u8; 32];
        let adrs = Adrs::from(AdrsType::LTree);

        // Three values: h(v0, v1) on level 0, v2 lifted, then h(h01, v2) on level 1.
        let values: Vec<u8> = (0..3_u8).flat_map(|v| [v; 32]).collect();
        let mut level0 = adrs;
        level0.set_tree_height(0);
        level0.set_tree_index(0);
        let mut h01 = vec![0_u8; 32];
        hasher.thash_h(&mut h01, &values[..32], &values[32..64], &pub_seed, &level0);
        let mut level1 = adrs;
        level1.set_tree_height(1);
        level1.set_tree_index(0);
        let mut expected = vec![0_u8; 32];
        hasher.thash_h(&mut expected, &h01, &values[64..], &pub_seed, &level1);

        assert_eq!(l_tree(&hasher, values, &pub_seed, &adrs), expected);
    }

    #[test]
    fn test_root_from_auth_matches_levels() {
        for chain in [ChainKind::Hash, ChainKind::Cipher] {
            let params = small_params(chain);
            let wots = Wots::new(&params);
            let sk_seed = [5_u8; 32];
            let pub_seed = [6_u8; 32];
            let ctx = TreeContext::new(&wots, &sk_seed, &pub_seed, 0, 0);
            let levels = ctx.levels(params.tree_height);
            let root = levels[params.tree_height][0].clone();

            for leaf in 0..(1_u32 << params.tree_height) {
                let auth: Vec<u8> = (0..params.tree_height)
                    .flat_map(|k| levels[k][((leaf >> k) ^ 1) as usize].clone())
                    .collect();
                let climbed = root_from_auth(
                    &ctx.hasher,
                    levels[0][leaf as usize].clone(),
                    leaf,
                    &auth,
                    &pub_seed,
                    &ctx.adrs(AdrsType::HashTree),
                );
                assert_eq!(climbed, root);
            }
        }
    }

    #[test]
    fn test_leaves_depend_on_layer_and_tree() {
        let params = small_params(ChainKind::Hash);
        let wots = Wots::new(&params);
        let sk_seed = [5_u8; 32];
        let pub_seed = [6_u8; 32];
        let base = TreeContext::new(&wots, &sk_seed, &pub_seed, 0, 0).leaf(1);
        assert_ne!(base, TreeContext::new(&wots, &sk_seed, &pub_seed, 1, 0).leaf(1));
        assert_ne!(base, TreeContext::new(&wots, &sk_seed, &pub_seed, 0, 1).leaf(1));
        assert_eq!(base, TreeContext::new(&wots, &sk_seed, &pub_seed, 0, 0).leaf(1));
    }
}
