// Path: crates/checkpoint/src/merkle.rs

//! Binary SHA-256 Merkle tree over op hashes.
//!
//! Odd nodes duplicate themselves upward. The empty tree has the hash of
//! the empty string as its root so an empty epoch still commits to
//! something well-defined.

use swarm_crypto::hash::{sha256, sha256_pair};

/// Proof that a leaf is part of a tree: the sibling on each level and
/// which side it sits on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub leaf_hash: [u8; 32],
    /// (sibling hash, sibling-is-on-the-right).
    pub siblings: Vec<([u8; 32], bool)>,
    pub root: [u8; 32],
}

#[derive(Debug, Default)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
    root: Option<[u8; 32]>,
}

impl MerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the tree bottom-up from leaf hashes; returns the root.
    pub fn build(&mut self, leaves: Vec<[u8; 32]>) -> [u8; 32] {
        if leaves.is_empty() {
            let root = sha256(b"");
            self.levels = Vec::new();
            self.root = Some(root);
            return root;
        }

        let mut levels = vec![leaves];
        while levels[levels.len() - 1].len() > 1 {
            let current = &levels[levels.len() - 1];
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let right = pair.get(1).unwrap_or(&pair[0]);
                next.push(sha256_pair(&pair[0], right));
            }
            levels.push(next);
        }

        let root = levels[levels.len() - 1][0];
        self.levels = levels;
        self.root = Some(root);
        root
    }

    pub fn root(&self) -> Option<[u8; 32]> {
        self.root
    }

    pub fn root_hex(&self) -> Option<String> {
        self.root.map(hex::encode)
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(Vec::len).unwrap_or(0)
    }

    /// Proof for the leaf at `index`, if the tree is built and the index
    /// is in range.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaves = self.levels.first()?;
        if index >= leaves.len() {
            return None;
        }

        let mut siblings = Vec::new();
        let mut current = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let (sibling_index, is_right) = if current % 2 == 0 {
                (current + 1, true)
            } else {
                (current - 1, false)
            };
            // Odd tail duplicates itself.
            let sibling = level.get(sibling_index).copied().unwrap_or(level[current]);
            siblings.push((sibling, is_right));
            current /= 2;
        }

        Some(MerkleProof {
            leaf_index: index,
            leaf_hash: leaves[index],
            siblings,
            root: self.root?,
        })
    }

    /// Recompute the root from a leaf and its proof and compare.
    pub fn verify_proof(leaf_hash: &[u8; 32], proof: &MerkleProof, root: &[u8; 32]) -> bool {
        if *leaf_hash != proof.leaf_hash {
            return false;
        }
        let mut current = *leaf_hash;
        for (sibling, is_right) in &proof.siblings {
            current = if *is_right {
                sha256_pair(&current, sibling)
            } else {
                sha256_pair(sibling, &current)
            };
        }
        current == *root
    }
}
