//! Seed trees and Merkle trees over a flat node arena
//!
//! One tree shape serves both uses. Nodes live in a single arena indexed by
//! position: children of node `i` sit at `2i+1` and `2i+2`, the leaves are
//! the last `num_leaves` slots (all on the deepest level), and levels are
//! truncated on the right so a node "exists" only if it is a leaf or an
//! ancestor of one.
//!
//! Seed mode grows downward: a parent's children are squeezed from
//! `XOF_prefix1(parent ‖ salt ‖ rep ‖ node)`. Revealing a leaf subset means
//! publishing the sibling subtree roots along the hidden leaves' paths;
//! reconstruction places those and re-expands, leaving exactly the hidden
//! leaves unknown.
//!
//! Merkle mode grows upward: `XOF_prefix3(left ‖ right? ‖ salt ‖ node)`.
//! Opening a set of missing leaves publishes the maximal all-missing
//! subtree roots (never the tree root), which is just enough for a holder
//! of the remaining leaves to finish the root.
//!
//! Every node-set computation below is a pure function of the tree shape
//! and the hide/missing list, so the two sides of the protocol agree on
//! reveal sizes and orderings byte for byte.

#![allow(missing_docs)] // Error variants carry their text in `#[error]` attributes.

use crate::hashing::{Xof, HASH_PREFIX_1, HASH_PREFIX_3};
use crate::params::{ceil_log2, ParamBundle};

/// Failures while consuming untrusted reveal/opening data.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("seed reveal data has wrong length (got {got}, want {want})")]
    SeedInfoLength { got: usize, want: usize },
    #[error("merkle opening has wrong length (got {got}, want {want})")]
    MerkleInfoLength { got: usize, want: usize },
    #[error("merkle root could not be reconstructed from the given leaves")]
    MerkleIncomplete,
}

/// A truncated complete binary tree backed by a flat byte arena.
pub struct Tree {
    depth: usize,
    num_nodes: usize,
    num_leaves: usize,
    data_size: usize,
    nodes: Vec<u8>,
    have: Vec<bool>,
    exists: Vec<bool>,
}

impl Tree {
    /// Shape-only tree with `num_leaves` leaves of `data_size`-byte nodes.
    pub fn new(num_leaves: usize, data_size: usize) -> Self {
        let depth = ceil_log2(num_leaves) + 1;
        let num_nodes = ((1usize << depth) - 1) - ((1usize << (depth - 1)) - num_leaves);
        let mut exists = vec![false; num_nodes];
        for i in (0..num_nodes).rev() {
            if i >= num_nodes - num_leaves {
                exists[i] = true;
            } else {
                let l = 2 * i + 1;
                let r = 2 * i + 2;
                exists[i] = (l < num_nodes && exists[l]) || (r < num_nodes && exists[r]);
            }
        }
        Self {
            depth,
            num_nodes,
            num_leaves,
            data_size,
            nodes: vec![0u8; num_nodes * data_size],
            have: vec![false; num_nodes],
            exists,
        }
    }

    #[inline]
    fn first_leaf(&self) -> usize {
        self.num_nodes - self.num_leaves
    }

    #[inline]
    fn exists(&self, i: usize) -> bool {
        i < self.num_nodes && self.exists[i]
    }

    #[inline]
    fn is_leaf(&self, i: usize) -> bool {
        i >= self.first_leaf()
    }

    #[inline]
    fn node(&self, i: usize) -> &[u8] {
        &self.nodes[i * self.data_size..(i + 1) * self.data_size]
    }

    fn set_node(&mut self, i: usize, data: &[u8]) {
        self.nodes[i * self.data_size..(i + 1) * self.data_size].copy_from_slice(data);
        self.have[i] = true;
    }

    /// Leaf `i`'s data, if known.
    pub fn leaf(&self, i: usize) -> Option<&[u8]> {
        let node = self.first_leaf() + i;
        self.have[node].then(|| self.node(node))
    }

    /// The root node. Only meaningful once built or verified.
    pub fn root(&self) -> &[u8] {
        self.node(0)
    }

    fn has_sibling(&self, node: usize) -> bool {
        // A right child always has a left sibling; a left child may lack
        // its right sibling on a truncated level.
        node != 0 && (node % 2 == 0 || self.exists(node + 1))
    }

    #[inline]
    fn sibling(&self, node: usize) -> usize {
        if node % 2 == 1 {
            node + 1
        } else {
            node - 1
        }
    }

    // ========================================================================
    // Seed mode
    // ========================================================================

    /// Expand a full tree of seeds for repetition `rep` from `root_seed`.
    pub fn generate_seeds(
        params: &ParamBundle,
        num_leaves: usize,
        root_seed: &[u8],
        salt: &[u8],
        rep: usize,
    ) -> Self {
        let mut tree = Self::new(num_leaves, params.seed_size);
        tree.set_node(0, root_seed);
        tree.expand_seeds(params, salt, rep);
        tree
    }

    /// Derive children from every present parent, top-down.
    fn expand_seeds(&mut self, params: &ParamBundle, salt: &[u8], rep: usize) {
        let seed_size = params.seed_size;
        let mut pair = vec![0u8; 2 * seed_size];
        for i in 0..self.first_leaf() {
            if !self.exists[i] || !self.have[i] {
                continue;
            }
            let mut xof = Xof::new_prefixed(params, HASH_PREFIX_1);
            xof.update(self.node(i));
            xof.update(salt);
            xof.update_u16_le(rep as u16);
            xof.update_u16_le(i as u16);
            xof.squeeze(&mut pair);
            let (left, right) = (2 * i + 1, 2 * i + 2);
            if self.exists(left) {
                self.set_node(left, &pair[..seed_size]);
            }
            if self.exists(right) {
                self.set_node(right, &pair[seed_size..]);
            }
        }
    }

    /// Node indices published when hiding `hide_list`, in deterministic
    /// order: along the hidden paths from the root down, skipping siblings
    /// that are themselves on a hidden path, descending single-child
    /// chains, deduplicated.
    fn revealed_seed_nodes(&self, hide_list: &[u16]) -> Vec<usize> {
        let path_len = self.depth - 1;
        let mut path_sets = vec![vec![0usize; hide_list.len()]; path_len];
        for (i, &leaf) in hide_list.iter().enumerate() {
            let mut pos = self.first_leaf() + leaf as usize;
            for d in (0..path_len).rev() {
                path_sets[d][i] = pos;
                pos = (pos - 1) / 2;
            }
        }
        let mut revealed = Vec::new();
        for d in 0..path_len {
            for i in 0..hide_list.len() {
                let node = path_sets[d][i];
                if !self.has_sibling(node) {
                    continue;
                }
                let mut sib = self.sibling(node);
                if path_sets[d].contains(&sib) {
                    continue;
                }
                // A node whose right child is truncated reveals the same
                // leaf set as its left descendant; publish the descendant.
                while !self.is_leaf(sib) && !self.exists(2 * sib + 2) {
                    sib = 2 * sib + 1;
                }
                if !revealed.contains(&sib) {
                    revealed.push(sib);
                }
            }
        }
        revealed
    }

    /// Serialized seeds covering every leaf except `hide_list`.
    pub fn reveal_seeds(&self, hide_list: &[u16]) -> Vec<u8> {
        let revealed = self.revealed_seed_nodes(hide_list);
        let mut out = Vec::with_capacity(revealed.len() * self.data_size);
        for node in revealed {
            debug_assert!(self.have[node], "revealing an underived seed");
            out.extend_from_slice(self.node(node));
        }
        out
    }

    /// Byte length [`Tree::reveal_seeds`] produces for this hide list.
    pub fn reveal_seeds_size(params: &ParamBundle, num_leaves: usize, hide_list: &[u16]) -> usize {
        let shape = Self::new(num_leaves, params.seed_size);
        shape.revealed_seed_nodes(hide_list).len() * params.seed_size
    }

    /// Rebuild a seed tree from reveal data, leaving `hide_list` unknown.
    pub fn reconstruct_seeds(
        params: &ParamBundle,
        num_leaves: usize,
        hide_list: &[u16],
        seed_info: &[u8],
        salt: &[u8],
        rep: usize,
    ) -> Result<Self, TreeError> {
        let mut tree = Self::new(num_leaves, params.seed_size);
        let revealed = tree.revealed_seed_nodes(hide_list);
        let want = revealed.len() * params.seed_size;
        if seed_info.len() != want {
            return Err(TreeError::SeedInfoLength { got: seed_info.len(), want });
        }
        for (k, node) in revealed.into_iter().enumerate() {
            tree.set_node(node, &seed_info[k * params.seed_size..(k + 1) * params.seed_size]);
        }
        tree.expand_seeds(params, salt, rep);
        Ok(tree)
    }

    // ========================================================================
    // Merkle mode
    // ========================================================================

    /// Build the Merkle tree over `leaves` (each `digest_size` bytes).
    pub fn build_merkle(params: &ParamBundle, leaves: &[Vec<u8>], salt: &[u8]) -> Self {
        let mut tree = Self::new(leaves.len(), params.digest_size);
        for (i, leaf) in leaves.iter().enumerate() {
            let node = tree.first_leaf() + i;
            tree.set_node(node, leaf);
        }
        tree.hash_up(params, salt);
        tree
    }

    /// Compute every parent whose children are known, bottom-up.
    fn hash_up(&mut self, params: &ParamBundle, salt: &[u8]) {
        let mut digest = vec![0u8; self.data_size];
        for p in (0..self.first_leaf()).rev() {
            if !self.exists[p] || self.have[p] {
                continue;
            }
            let (left, right) = (2 * p + 1, 2 * p + 2);
            if !self.have[left] {
                continue;
            }
            if self.exists(right) && !self.have[right] {
                continue;
            }
            let mut xof = Xof::new_prefixed(params, HASH_PREFIX_3);
            xof.update(self.node(left));
            if self.exists(right) {
                xof.update(self.node(right));
            }
            xof.update(salt);
            xof.update_u16_le(p as u16);
            xof.squeeze(&mut digest);
            self.set_node(p, &digest);
        }
    }

    /// Maximal all-missing subtree roots for `missing_leaves`, never
    /// including the tree root.
    fn revealed_merkle_nodes(&self, missing_leaves: &[u16]) -> Vec<usize> {
        let first_leaf = self.first_leaf();
        let mut missing = vec![false; self.num_nodes];
        for &leaf in missing_leaves {
            missing[first_leaf + leaf as usize] = true;
        }
        for p in (0..first_leaf).rev() {
            if !self.exists[p] {
                continue;
            }
            let (left, right) = (2 * p + 1, 2 * p + 2);
            let right_gone = !self.exists(right) || missing[right];
            if missing[left] && right_gone {
                missing[p] = true;
            }
        }
        let mut out = Vec::new();
        for &leaf in missing_leaves {
            let mut node = first_leaf + leaf as usize;
            while node != 0 && missing[(node - 1) / 2] {
                node = (node - 1) / 2;
            }
            if node == 0 {
                continue;
            }
            if !out.contains(&node) {
                out.push(node);
            }
        }
        out
    }

    /// Serialized node digests a holder of the non-missing leaves needs to
    /// recompute the root.
    pub fn open_merkle(&self, missing_leaves: &[u16]) -> Vec<u8> {
        let revealed = self.revealed_merkle_nodes(missing_leaves);
        let mut out = Vec::with_capacity(revealed.len() * self.data_size);
        for node in revealed {
            debug_assert!(self.have[node], "opening an uncomputed merkle node");
            out.extend_from_slice(self.node(node));
        }
        out
    }

    /// Byte length [`Tree::open_merkle`] produces for this missing set.
    pub fn open_merkle_size(
        params: &ParamBundle,
        num_leaves: usize,
        missing_leaves: &[u16],
    ) -> usize {
        let shape = Self::new(num_leaves, params.digest_size);
        shape.revealed_merkle_nodes(missing_leaves).len() * params.digest_size
    }

    /// Install opening data for `missing_leaves` into an unbuilt tree.
    pub fn add_merkle_nodes(
        &mut self,
        missing_leaves: &[u16],
        info: &[u8],
    ) -> Result<(), TreeError> {
        let revealed = self.revealed_merkle_nodes(missing_leaves);
        let want = revealed.len() * self.data_size;
        if info.len() != want {
            return Err(TreeError::MerkleInfoLength { got: info.len(), want });
        }
        for (k, node) in revealed.into_iter().enumerate() {
            self.set_node(node, &info[k * self.data_size..(k + 1) * self.data_size]);
        }
        Ok(())
    }

    /// Fill in the known leaves, hash upward, and fail unless the root is
    /// reachable from what we have.
    pub fn verify_merkle(
        &mut self,
        params: &ParamBundle,
        leaves: &[Option<Vec<u8>>],
        salt: &[u8],
    ) -> Result<(), TreeError> {
        debug_assert_eq!(leaves.len(), self.num_leaves);
        for (i, leaf) in leaves.iter().enumerate() {
            if let Some(data) = leaf {
                let node = self.first_leaf() + i;
                self.set_node(node, data);
            }
        }
        self.hash_up(params, salt);
        if !self.have[0] {
            return Err(TreeError::MerkleIncomplete);
        }
        Ok(())
    }
}
