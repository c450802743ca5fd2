//! Inclusion proofs and their verification.
//!
//! A proof records one step per tree level, from the leaf upward. Each step
//! is either the sibling the current node was paired with, or a note that the
//! node had no sibling and was carried up unchanged.

use serde::{Deserialize, Serialize};

use crate::common::{encode_leaf, hash_sorted_pair, Address, Hash};

/// Where a sibling sits relative to the node being proven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// The sibling precedes the current node in its layer
    Left,
    /// The sibling follows the current node in its layer
    Right,
}

/// One level of an inclusion proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofStep {
    /// The node was paired with `hash`
    Sibling { hash: Hash, position: Position },
    /// The node was the unpaired last element of an odd layer
    Carried,
}

/// Ordered leaf-to-root path proving one leaf's membership.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Proof {
    steps: Vec<ProofStep>,
}

impl Proof {
    /// Creates a proof from its steps.
    ///
    /// # Arguments
    /// * `steps` - One step per tree level, ordered from the leaf to the root
    pub fn new(steps: Vec<ProofStep>) -> Self {
        Self { steps }
    }

    /// Returns the steps in leaf-to-root order.
    pub fn steps(&self) -> &[ProofStep] {
        &self.steps
    }

    /// Number of levels covered, including carried ones.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sibling hashes only, in leaf-to-root order.
    ///
    /// Carried levels contribute nothing to the fold, so this is the flat
    /// proof a sorted-pair contract verifier expects.
    pub fn siblings(&self) -> Vec<Hash> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                ProofStep::Sibling { hash, .. } => Some(*hash),
                ProofStep::Carried => None,
            })
            .collect()
    }

    /// Folds the proof starting from `leaf` and returns the resulting root.
    ///
    /// Each sibling is combined with the current node by sorted-pair hashing;
    /// carried levels leave the current node unchanged.
    pub fn compute_root(&self, leaf: &Hash) -> Hash {
        self.steps.iter().fold(*leaf, |current, step| match step {
            ProofStep::Sibling { hash, .. } => hash_sorted_pair(&current, hash),
            ProofStep::Carried => current,
        })
    }
}

/// Checks that `proof` leads from `leaf` to `expected_root`.
///
/// # Arguments
/// * `leaf` - Leaf hash the proof starts from
/// * `proof` - Steps from the leaf up to the root
/// * `expected_root` - Root the fold must reproduce
///
/// # Returns
/// `true` if the folded root equals `expected_root` byte for byte
pub fn verify(leaf: &Hash, proof: &Proof, expected_root: &Hash) -> bool {
    proof.compute_root(leaf) == *expected_root
}

/// Checks that `proof` leads from the leaf of `address` to `expected_root`.
pub fn verify_address(address: &Address, proof: &Proof, expected_root: &Hash) -> bool {
    verify(&encode_leaf(address), proof, expected_root)
}
