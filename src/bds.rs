//! # BDS tree traversal
//!
//! Keeps the authentication path of the next leaf ready without recomputing the tree. The
//! state holds the current auth path, one treehash instance per level below `h - k` that
//! builds the next right node of its level in the background, a shared stack for those
//! instances, a keep buffer for left nodes that will be needed again, and a retain buffer with
//! the right nodes of the top `k` levels, which are computed once during initialisation.
//!
//! Each signature advances the state by one leaf with a constant budget of `(h - k) / 2` leaf
//! computations, so within one tree signing cost does not depend on the leaf position. The
//! multi-tree scheme does not amortize across trees: when a lower tree is used up, its
//! successor is built in full by [`BdsState::init`] during that signature.
//!
//! Lifecycle: [`BdsPhase::Initializing`] until [`BdsState::init`] has built the tree,
//! [`BdsPhase::Ready`] between signatures, [`BdsPhase::Updating`] while a round runs, and
//! [`BdsPhase::Exhausted`] once the last leaf of the tree has been handed out.

use crate::params::ParameterSet;
use crate::tree::TreeContext;
use crate::utils::{bytes_to_u64, take, u32_to_bytes};
use crate::{Error, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BdsPhase {
    Initializing,
    Ready,
    Updating,
    Exhausted,
}

/// Incremental computation of the node at `height` whose leftmost leaf is the starting
/// `next_idx`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TreeHashInstance {
    height: u32,
    next_idx: u32,
    stack_usage: u32,
    completed: bool,
    node: Vec<u8>,
}

const TREEHASH_HEADER_BYTES: usize = 7;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct BdsState {
    tree_height: usize,
    bds_k: usize,
    n: usize,
    phase: BdsPhase,
    /// Leaf whose auth path is currently held.
    leaf: u32,
    stack: Vec<u8>,
    stack_levels: Vec<u32>,
    stack_offset: usize,
    auth: Vec<u8>,
    keep: Vec<u8>,
    treehash: Vec<TreeHashInstance>,
    retain: Vec<u8>,
}

impl BdsState {
    /// An empty state, sized for one tree of `params`.
    pub(crate) fn new(params: &ParameterSet) -> Self {
        let h = params.tree_height;
        let k = params.bds_k;
        let n = params.n;
        let treehash = (0..h - k)
            .map(|i| TreeHashInstance {
                height: i as u32,
                next_idx: 0,
                stack_usage: 0,
                completed: true,
                node: vec![0_u8; n],
            })
            .collect();
        Self {
            tree_height: h,
            bds_k: k,
            n,
            phase: BdsPhase::Initializing,
            leaf: 0,
            stack: vec![0_u8; (h + 1) * n],
            stack_levels: vec![0; h + 1],
            stack_offset: 0,
            auth: vec![0_u8; h * n],
            keep: vec![0_u8; (h >> 1) * n],
            treehash,
            retain: vec![0_u8; ((1 << k) - k - 1) * n],
        }
    }

    pub(crate) fn phase(&self) -> BdsPhase {
        self.phase
    }

    /// Leaf whose auth path [`Self::auth_path`] returns.
    pub(crate) fn leaf(&self) -> u32 {
        self.leaf
    }

    pub(crate) fn auth_path(&self) -> &[u8] {
        &self.auth
    }

    fn leaves(&self) -> u64 {
        1_u64 << self.tree_height
    }

    /// Offset into the retain buffer of the first retained node of level `height`.
    fn retain_offset(&self, height: usize) -> usize {
        (1 << (self.tree_height - 1 - height)) + height - self.tree_height
    }

    /// Builds the whole tree once, leaving the auth path of leaf 0, the first treehash nodes
    /// and the retained top nodes in place.
    ///
    /// # Returns
    ///
    /// The root of the tree.
    pub(crate) fn init(&mut self, ctx: &TreeContext) -> Vec<u8> {
        let h = self.tree_height;
        let k = self.bds_k;
        let n = self.n;
        for (i, inst) in self.treehash.iter_mut().enumerate() {
            inst.height = i as u32;
            inst.next_idx = 0;
            inst.stack_usage = 0;
            inst.completed = true;
        }
        self.stack_offset = 0;
        self.leaf = 0;

        let leaves = ctx.leaves(1 << h);
        let mut nodes: Vec<Vec<u8>> = Vec::with_capacity(h + 1);
        let mut levels: Vec<usize> = Vec::with_capacity(h + 1);

        for (idx, leaf) in leaves.into_iter().enumerate() {
            nodes.push(leaf);
            levels.push(0);
            let mut top = nodes.len();
            while top > 1 && levels[top - 1] == levels[top - 2] {
                let node_h = levels[top - 1];
                let position = idx >> node_h;
                let right = &nodes[top - 1];
                if position == 1 {
                    self.auth[node_h * n..(node_h + 1) * n].copy_from_slice(right);
                } else if node_h < h - k && position == 3 {
                    self.treehash[node_h].node.copy_from_slice(right);
                } else if node_h >= h - k {
                    let row = self.retain_offset(node_h) + ((position - 3) >> 1);
                    self.retain[row * n..(row + 1) * n].copy_from_slice(right);
                }

                let parent = ctx.node(
                    &nodes[top - 2],
                    &nodes[top - 1],
                    node_h as u32,
                    (idx >> (node_h + 1)) as u32,
                );
                nodes.truncate(top - 1);
                levels.truncate(top - 1);
                nodes[top - 2] = parent;
                levels[top - 2] += 1;
                top -= 1;
            }
        }

        self.phase = BdsPhase::Ready;
        nodes.into_iter().next().unwrap_or_default()
    }

    /// Moves the state from the current leaf to the next one.
    pub(crate) fn advance(&mut self, ctx: &TreeContext) -> Result<()> {
        if self.phase != BdsPhase::Ready {
            return Err(Error::StateCorruption(format!(
                "cannot advance a traversal state in phase {:?}",
                self.phase
            )));
        }
        self.phase = BdsPhase::Updating;
        let leaf = self.leaf;
        if u64::from(leaf) + 1 < self.leaves() {
            self.round(ctx, leaf);
            self.treehash_updates(ctx, (self.tree_height - self.bds_k) >> 1);
        }
        self.leaf = leaf + 1;
        self.phase = if u64::from(self.leaf) == self.leaves() {
            BdsPhase::Exhausted
        } else {
            BdsPhase::Ready
        };
        Ok(())
    }

    /// Computes the auth path of `leaf_idx + 1` from the one of `leaf_idx`, and restarts the
    /// treehash instances whose node has just been consumed.
    fn round(&mut self, ctx: &TreeContext, leaf_idx: u32) {
        let h = self.tree_height;
        let k = self.bds_k;
        let n = self.n;
        let tau = (0..h).find(|&i| (leaf_idx >> i) & 1 == 0).unwrap_or(h);

        let mut left = Vec::new();
        let mut right = Vec::new();
        if tau > 0 {
            left = self.auth[(tau - 1) * n..tau * n].to_vec();
            let kept = (tau - 1) >> 1;
            right = self.keep[kept * n..(kept + 1) * n].to_vec();
        }
        if (leaf_idx >> (tau + 1)) & 1 == 0 && tau < h - 1 {
            let kept = tau >> 1;
            self.keep[kept * n..(kept + 1) * n].copy_from_slice(&self.auth[tau * n..(tau + 1) * n]);
        }

        if tau == 0 {
            let leaf = ctx.leaf(leaf_idx);
            self.auth[..n].copy_from_slice(&leaf);
            return;
        }

        let parent = ctx.node(&left, &right, (tau - 1) as u32, leaf_idx >> tau);
        self.auth[tau * n..(tau + 1) * n].copy_from_slice(&parent);

        for i in 0..tau {
            if i < h - k {
                self.auth[i * n..(i + 1) * n].copy_from_slice(&self.treehash[i].node);
            } else {
                let row = self.retain_offset(i) + ((((leaf_idx >> i) - 1) >> 1) as usize);
                self.auth[i * n..(i + 1) * n].copy_from_slice(&self.retain[row * n..(row + 1) * n]);
            }
        }

        for i in 0..tau.min(h - k) {
            let start = u64::from(leaf_idx) + 1 + 3 * (1_u64 << i);
            if start < self.leaves() {
                let inst = &mut self.treehash[i];
                inst.height = i as u32;
                inst.next_idx = start as u32;
                inst.completed = false;
                inst.stack_usage = 0;
            }
        }
    }

    /// Lowest level among the stack entries owned by instance `inst`.
    fn treehash_min_height_on_stack(&self, inst: usize) -> usize {
        let usage = self.treehash[inst].stack_usage as usize;
        (0..usage)
            .map(|i| self.stack_levels[self.stack_offset - i - 1] as usize)
            .fold(self.tree_height, usize::min)
    }

    /// Spends up to `updates` leaf computations, each on the instance whose lowest node is
    /// lowest. Stops early once every instance is complete.
    fn treehash_updates(&mut self, ctx: &TreeContext, updates: usize) {
        let h = self.tree_height;
        let active = h - self.bds_k;

        for _ in 0..updates {
            let mut l_min = h;
            let mut level = active;
            for i in 0..active {
                let inst = &self.treehash[i];
                let low = if inst.completed {
                    h
                } else if inst.stack_usage == 0 {
                    i
                } else {
                    self.treehash_min_height_on_stack(i)
                };
                if low < l_min {
                    level = i;
                    l_min = low;
                }
            }
            if level == active {
                break;
            }
            self.treehash_update(ctx, level);
        }
    }

    /// Computes one more leaf for instance `inst` and merges it with the instance's nodes on
    /// the shared stack.
    fn treehash_update(&mut self, ctx: &TreeContext, inst: usize) {
        let n = self.n;
        let next_idx = self.treehash[inst].next_idx;
        let mut node = ctx.leaf(next_idx);
        let mut node_height = 0_u32;

        while self.treehash[inst].stack_usage > 0
            && self.stack_levels[self.stack_offset - 1] == node_height
        {
            let top = self.stack_offset - 1;
            node = ctx.node(
                &self.stack[top * n..(top + 1) * n],
                &node,
                node_height,
                next_idx >> (node_height + 1),
            );
            node_height += 1;
            self.treehash[inst].stack_usage -= 1;
            self.stack_offset -= 1;
        }

        if node_height == self.treehash[inst].height {
            let inst = &mut self.treehash[inst];
            inst.node = node;
            inst.completed = true;
        } else {
            let top = self.stack_offset;
            self.stack[top * n..(top + 1) * n].copy_from_slice(&node);
            self.stack_levels[top] = node_height;
            self.stack_offset += 1;
            let inst = &mut self.treehash[inst];
            inst.stack_usage += 1;
            inst.next_idx += 1;
        }
    }

    /// Bytes taken by [`Self::to_bytes`] for `params`.
    pub(crate) fn serialized_bytes(params: &ParameterSet) -> usize {
        let h = params.tree_height;
        let k = params.bds_k;
        let n = params.n;
        8 + (h + 1) * (n + 1)
            + h * n
            + (h >> 1) * n
            + (h - k) * (TREEHASH_HEADER_BYTES + n)
            + ((1 << k) - k - 1) * n
    }

    /// Serializes a state in phase `Ready` or `Exhausted`.
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        if matches!(self.phase, BdsPhase::Initializing | BdsPhase::Updating) {
            return Err(Error::StateCorruption(format!(
                "cannot serialize a traversal state in phase {:?}",
                self.phase
            )));
        }
        let mut out = Vec::with_capacity(self.stack.len() * 2 + self.auth.len() * 4);
        out.extend_from_slice(&u32_to_bytes(self.leaf));
        out.extend_from_slice(&u32_to_bytes(self.stack_offset as u32));
        out.extend_from_slice(&self.stack);
        out.extend(self.stack_levels.iter().map(|&level| level as u8));
        out.extend_from_slice(&self.auth);
        out.extend_from_slice(&self.keep);
        for inst in &self.treehash {
            out.push(inst.height as u8);
            out.extend_from_slice(&u32_to_bytes(inst.next_idx));
            out.push(inst.stack_usage as u8);
            out.push(u8::from(inst.completed));
            out.extend_from_slice(&inst.node);
        }
        out.extend_from_slice(&self.retain);
        Ok(out)
    }

    /// Reads a state written by [`Self::to_bytes`] from the front of `cursor` and checks that
    /// it is internally consistent.
    pub(crate) fn from_bytes(params: &ParameterSet, cursor: &mut &[u8]) -> Result<Self> {
        let mut state = Self::new(params);
        let h = state.tree_height;
        let n = state.n;

        state.leaf = bytes_to_u64(take(cursor, 4)?) as u32;
        state.stack_offset = bytes_to_u64(take(cursor, 4)?) as usize;
        state.stack.copy_from_slice(take(cursor, (h + 1) * n)?);
        state.stack_levels = take(cursor, h + 1)?.iter().map(|&b| u32::from(b)).collect();
        state.auth.copy_from_slice(take(cursor, h * n)?);
        let keep_len = state.keep.len();
        state.keep.copy_from_slice(take(cursor, keep_len)?);
        for inst in state.treehash.iter_mut() {
            let header = take(cursor, TREEHASH_HEADER_BYTES)?;
            inst.height = u32::from(header[0]);
            inst.next_idx = bytes_to_u64(&header[1..5]) as u32;
            inst.stack_usage = u32::from(header[5]);
            inst.completed = match header[6] {
                0 => false,
                1 => true,
                other => {
                    return Err(corrupt(format!("completed flag {}", other)));
                },
            };
            inst.node.copy_from_slice(take(cursor, n)?);
        }
        let retain_len = state.retain.len();
        state.retain.copy_from_slice(take(cursor, retain_len)?);

        state.validate()?;
        state.phase = if u64::from(state.leaf) == state.leaves() {
            BdsPhase::Exhausted
        } else {
            BdsPhase::Ready
        };
        Ok(state)
    }

    fn validate(&self) -> Result<()> {
        let h = self.tree_height;
        if u64::from(self.leaf) > self.leaves() {
            return Err(corrupt(format!("leaf {} beyond the tree", self.leaf)));
        }
        if self.stack_offset > h + 1 {
            return Err(corrupt(format!("stack offset {}", self.stack_offset)));
        }
        if self.stack_levels[..self.stack_offset]
            .iter()
            .any(|&level| level as usize >= h)
        {
            return Err(corrupt("stack level beyond the tree".to_string()));
        }
        let mut usage = 0;
        for (i, inst) in self.treehash.iter().enumerate() {
            if inst.height as usize != i {
                return Err(corrupt(format!("treehash {} has height {}", i, inst.height)));
            }
            if !inst.completed && u64::from(inst.next_idx) >= self.leaves() {
                return Err(corrupt(format!(
                    "treehash {} starts at leaf {}",
                    i, inst.next_idx
                )));
            }
            usage += inst.stack_usage as usize;
        }
        if usage != self.stack_offset {
            return Err(corrupt(format!(
                "stack holds {} nodes but instances own {}",
                self.stack_offset, usage
            )));
        }
        Ok(())
    }
}

fn corrupt(reason: String) -> Error {
    Error::StateCorruption(reason)
}
