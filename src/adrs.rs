//! # Hash addresses
//!
//! Every tweakable hash and PRF call is keyed by a 32-byte address naming the layer, tree,
//! purpose and position it works on. Changing the purpose with [`Adrs::set_type`] zeroes the
//! purpose-specific words, so no stale field leaks from one use into the next.

use crate::utils::{set_u32_at, set_u64_at};

const OFFSET_LAYER: usize = 0;
const OFFSET_TREE: usize = 4;
const OFFSET_TYPE: usize = 12;
const OFFSET_OTS_ADDR: usize = 16;
const OFFSET_CHAIN_ADDR: usize = 20;
const OFFSET_HASH_ADDR: usize = 24;
const OFFSET_TREE_HGT: usize = 20;
const OFFSET_TREE_INDEX: usize = 24;
const OFFSET_KEY_AND_MASK: usize = 28;

/// The three purposes an address can serve.
/// The 4-byte corresponding value is set as the `type` word of an [`Adrs`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum AdrsType {
    /// 0: chain steps and secret expansion of a one-time key pair.
    Ots = 0,
    /// 1: compression of a one-time public key into a leaf.
    LTree = 1,
    /// 2: inner nodes of a Merkle tree.
    HashTree = 2,
}

/// The address `Adrs` is a 32-byte value made of eight big-endian 32-bit words:
///
/// | word | OTS            | L-tree         | hash tree      |
/// |------|----------------|----------------|----------------|
/// | 0    | layer          | layer          | layer          |
/// | 1-2  | tree           | tree           | tree           |
/// | 3    | type = 0       | type = 1       | type = 2       |
/// | 4    | OTS address    | L-tree address | padding        |
/// | 5    | chain address  | tree height    | tree height    |
/// | 6    | hash address   | tree index     | tree index     |
/// | 7    | key and mask   | key and mask   | key and mask   |
///
/// Every call of `F`, `H` or a PRF receives the address, which keeps every call distinct.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct Adrs([u8; 32]);

impl AsRef<[u8]> for Adrs {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<AdrsType> for Adrs {
    fn from(adrs_type: AdrsType) -> Self {
        let mut adrs = Self([0; 32]);
        adrs.set_type(adrs_type);
        adrs
    }
}

impl Adrs {
    /// Specify which layer of a multi-tree we're working on.
    pub fn set_layer_addr(&mut self, layer: u32) {
        set_u32_at(self.0.as_mut(), layer, OFFSET_LAYER);
    }

    /// Specify which tree within the layer we're working on.
    pub fn set_tree_addr(&mut self, tree: u64) {
        set_u64_at(self.0.as_mut(), tree, OFFSET_TREE);
    }

    /// Specify what the address is used for. The type-specific words are cleared so that a
    /// value set for one purpose never leaks into another.
    pub fn set_type(&mut self, adrs_type: AdrsType) {
        set_u32_at(self.0.as_mut(), adrs_type as u32, OFFSET_TYPE);
        self.0[OFFSET_OTS_ADDR..].fill(0);
    }

    /// A fresh address of the given type on the same layer and tree.
    pub fn subtree_with_type(&self, adrs_type: AdrsType) -> Self {
        let mut adrs = Self::default();
        adrs.0[..OFFSET_TYPE].copy_from_slice(&self.0[..OFFSET_TYPE]);
        adrs.set_type(adrs_type);
        adrs
    }

    /// Specify which one-time key pair (leaf) we're talking about.
    pub fn set_ots_addr(&mut self, ots: u32) {
        set_u32_at(self.0.as_mut(), ots, OFFSET_OTS_ADDR);
    }

    /// Specify which leaf an L-tree compresses.
    pub fn set_ltree_addr(&mut self, ltree: u32) {
        set_u32_at(self.0.as_mut(), ltree, OFFSET_OTS_ADDR);
    }

    /// Specify which chain within the one-time key pair we're working with.
    pub fn set_chain_addr(&mut self, chain: u32) {
        set_u32_at(self.0.as_mut(), chain, OFFSET_CHAIN_ADDR);
    }

    /// Specify where in the chain we are.
    pub fn set_hash_addr(&mut self, hash: u32) {
        set_u32_at(self.0.as_mut(), hash, OFFSET_HASH_ADDR);
    }

    /// Height of the children being hashed together.
    pub fn set_tree_height(&mut self, tree_height: u32) {
        set_u32_at(self.0.as_mut(), tree_height, OFFSET_TREE_HGT);
    }

    /// Index of the parent node within its level.
    pub fn set_tree_index(&mut self, tree_index: u32) {
        set_u32_at(self.0.as_mut(), tree_index, OFFSET_TREE_INDEX);
    }

    /// 0 selects the key, 1 and 2 select the bitmasks.
    pub fn set_key_and_mask(&mut self, key_and_mask: u32) {
        set_u32_at(self.0.as_mut(), key_and_mask, OFFSET_KEY_AND_MASK);
    }

    #[cfg(test)]
    pub(crate) fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}
