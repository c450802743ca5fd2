//! Sorted-pair Keccak Merkle tree over a set of addresses.
//!
//! Leaves are `keccak256(address)` sorted ascending and de-duplicated, so the
//! root depends only on the set of addresses. Each parent is the sorted-pair
//! hash of two consecutive nodes; an unpaired last node is carried up as is.

use log::debug;

use crate::common::{encode_leaf, hash_sorted_pair, hex_encode, parse_address, Address, Hash};
use crate::error::{WhitelistError, WhitelistResult};
use crate::proof::{Position, Proof, ProofStep};

/// Immutable Merkle tree, layer 0 being the sorted leaves and the last layer
/// holding only the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    layers: Vec<Vec<Hash>>,
    root: Hash,
}

impl MerkleTree {
    /// Builds a tree from a set of addresses.
    ///
    /// Input order and duplicates do not matter.
    ///
    /// # Arguments
    /// * `addresses` - Whitelisted addresses, in any order
    ///
    /// # Errors
    /// Returns `EmptyWhitelist` if no addresses are supplied
    pub fn build<I>(addresses: I) -> WhitelistResult<Self>
    where
        I: IntoIterator<Item = Address>,
    {
        let leaves: Vec<Hash> = addresses.into_iter().map(|a| encode_leaf(&a)).collect();
        Self::from_leaves(leaves)
    }

    /// Parses textual addresses and builds a tree from them.
    ///
    /// # Arguments
    /// * `addresses` - Address strings, with or without "0x" prefix, any case
    ///
    /// # Errors
    /// Returns `InvalidAddressFormat` for the first entry that does not parse,
    /// or `EmptyWhitelist` if there are no entries
    pub fn from_addresses<I, S>(addresses: I) -> WhitelistResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = addresses
            .into_iter()
            .map(|s| parse_address(s.as_ref()))
            .collect::<WhitelistResult<Vec<_>>>()?;
        Self::build(parsed)
    }

    /// Builds a tree from pre-computed leaf hashes.
    ///
    /// Leaves are sorted and de-duplicated before layering.
    ///
    /// # Errors
    /// Returns `EmptyWhitelist` if `leaves` is empty
    pub fn from_leaves(mut leaves: Vec<Hash>) -> WhitelistResult<Self> {
        if leaves.is_empty() {
            return Err(WhitelistError::EmptyWhitelist);
        }

        let supplied = leaves.len();
        leaves.sort_unstable();
        leaves.dedup();
        if leaves.len() != supplied {
            debug!(
                "Dropped {} duplicate leaves out of {}",
                supplied - leaves.len(),
                supplied
            );
        }

        let mut layers = vec![leaves];
        while let Some(level) = layers.last().filter(|level| level.len() > 1) {
            let next_level = next_layer(level);
            layers.push(next_level);
        }

        // The loop only stops on a single-node layer.
        let root = layers[layers.len() - 1][0];
        debug!(
            "Built tree with {} leaves and {} layers, root {}",
            layers[0].len(),
            layers.len(),
            hex_encode(root)
        );

        Ok(Self { layers, root })
    }

    /// Rebuilds a tree from a dumped layer set, checking every node.
    ///
    /// # Arguments
    /// * `layers` - Layers from the leaves up to and including the root
    ///
    /// # Errors
    /// Returns `InvalidTree` if the leaves are not strictly ascending, a parent
    /// does not match its children, or any layer other than the last has fewer
    /// than two nodes, or the last has more than one
    pub fn from_layers(layers: Vec<Vec<Hash>>) -> WhitelistResult<Self> {
        let base = layers
            .first()
            .ok_or_else(|| WhitelistError::InvalidTree("no layers".to_string()))?;
        if base.is_empty() {
            return Err(WhitelistError::InvalidTree("leaf layer is empty".to_string()));
        }
        if base.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(WhitelistError::InvalidTree(
                "leaf layer is not strictly ascending".to_string(),
            ));
        }

        // Layering stops at the first single-node layer.
        if let Some(level_num) = layers[..layers.len() - 1]
            .iter()
            .position(|level| level.len() <= 1)
        {
            return Err(WhitelistError::InvalidTree(format!(
                "layer {} has {} nodes but is not the top layer",
                level_num,
                layers[level_num].len()
            )));
        }

        for (level_num, pair) in layers.windows(2).enumerate() {
            let expected = next_layer(&pair[0]);
            if pair[1] != expected {
                return Err(WhitelistError::InvalidTree(format!(
                    "layer {} does not hash to layer {}",
                    level_num,
                    level_num + 1
                )));
            }
        }

        let top = &layers[layers.len() - 1];
        if top.len() != 1 {
            return Err(WhitelistError::InvalidTree(format!(
                "top layer has {} nodes, expected 1",
                top.len()
            )));
        }
        let root = top[0];

        Ok(Self { layers, root })
    }

    /// Returns the root hash.
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Returns the root as `0x`-prefixed lowercase hex.
    pub fn root_hex(&self) -> String {
        hex_encode(self.root)
    }

    /// Returns all layers, leaves first and the single-node root layer last.
    pub fn layers(&self) -> &[Vec<Hash>] {
        &self.layers
    }

    /// Sorted, de-duplicated leaf hashes.
    pub fn leaves(&self) -> &[Hash] {
        &self.layers[0]
    }

    /// Returns the number of distinct leaves.
    pub fn leaf_count(&self) -> usize {
        self.layers[0].len()
    }

    /// Number of levels between a leaf and the root.
    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }

    /// Position of the address's leaf in the sorted leaf layer.
    pub fn leaf_index(&self, address: &Address) -> Option<usize> {
        self.layers[0].binary_search(&encode_leaf(address)).ok()
    }

    /// Returns whether `address` was in the build set.
    pub fn contains(&self, address: &Address) -> bool {
        self.leaf_index(address).is_some()
    }

    /// Generates the inclusion proof for `address`.
    ///
    /// # Arguments
    /// * `address` - Address to prove
    ///
    /// # Returns
    /// One step per level from the leaf up to the root
    ///
    /// # Errors
    /// Returns `AddressNotFound` if the address was not in the build set.
    pub fn proof(&self, address: &Address) -> WhitelistResult<Proof> {
        let index = self
            .leaf_index(address)
            .ok_or_else(|| WhitelistError::AddressNotFound(address.to_string()))?;
        Ok(self.proof_for_index(index))
    }

    fn proof_for_index(&self, leaf_index: usize) -> Proof {
        let mut steps = Vec::with_capacity(self.depth());
        let mut current_index = leaf_index;

        for level in &self.layers[..self.depth()] {
            let sibling_index = current_index ^ 1;
            let step = match level.get(sibling_index) {
                Some(hash) => ProofStep::Sibling {
                    hash: *hash,
                    position: if sibling_index < current_index {
                        Position::Left
                    } else {
                        Position::Right
                    },
                },
                None => ProofStep::Carried,
            };
            steps.push(step);
            current_index /= 2;
        }

        Proof::new(steps)
    }
}

/// Hashes consecutive pairs of `level`, carrying an unpaired last node.
fn next_layer(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|chunk| match chunk {
            [left, right] => hash_sorted_pair(left, right),
            _ => chunk[0],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::verify;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address(bytes)
    }

    fn sorted_leaves(addresses: &[Address]) -> Vec<Hash> {
        let mut leaves: Vec<Hash> = addresses.iter().map(encode_leaf).collect();
        leaves.sort();
        leaves
    }

    #[test]
    fn test_empty_whitelist() {
        let result = MerkleTree::build(Vec::<Address>::new());
        assert_eq!(result.unwrap_err(), WhitelistError::EmptyWhitelist);
    }

    #[test]
    fn test_single_address_root_is_leaf() {
        let tree = MerkleTree::build([addr(1)]).unwrap();
        assert_eq!(tree.root(), encode_leaf(&addr(1)));
        assert_eq!(tree.depth(), 0);
        let proof = tree.proof(&addr(1)).unwrap();
        assert!(proof.is_empty());
        assert!(verify(&encode_leaf(&addr(1)), &proof, &tree.root()));
    }

    #[test]
    fn test_two_addresses() {
        let tree = MerkleTree::build([addr(1), addr(2)]).unwrap();
        let leaf1 = encode_leaf(&addr(1));
        let leaf2 = encode_leaf(&addr(2));

        assert_eq!(tree.root(), hash_sorted_pair(&leaf1, &leaf2));

        let proof = tree.proof(&addr(1)).unwrap();
        assert_eq!(proof.siblings(), vec![leaf2]);
        assert_eq!(proof.len(), 1);
        assert!(verify(&leaf1, &proof, &tree.root()));

        assert_eq!(
            tree.proof(&addr(3)).unwrap_err(),
            WhitelistError::AddressNotFound(addr(3).to_string())
        );
    }

    #[test]
    fn test_three_addresses_carry_odd_leaf() {
        let addresses = [addr(1), addr(2), addr(3)];
        let tree = MerkleTree::build(addresses).unwrap();
        let leaves = sorted_leaves(&addresses);

        let pair = hash_sorted_pair(&leaves[0], &leaves[1]);
        assert_eq!(tree.layers()[1], vec![pair, leaves[2]]);
        assert_eq!(tree.root(), hash_sorted_pair(&pair, &leaves[2]));
        assert_eq!(tree.depth(), 2);

        for address in &addresses {
            let proof = tree.proof(address).unwrap();
            assert_eq!(proof.len(), 2);
            assert!(verify(&encode_leaf(address), &proof, &tree.root()));
        }

        let carried = addresses
            .iter()
            .find(|a| encode_leaf(a) == leaves[2])
            .unwrap();
        let proof = tree.proof(carried).unwrap();
        assert_eq!(
            proof.steps(),
            &[
                ProofStep::Carried,
                ProofStep::Sibling {
                    hash: pair,
                    position: Position::Left
                }
            ]
        );
    }

    #[test]
    fn test_sibling_positions() {
        let addresses = [addr(1), addr(2)];
        let tree = MerkleTree::build(addresses).unwrap();
        let leaves = sorted_leaves(&addresses);

        let first = addresses
            .iter()
            .find(|a| encode_leaf(a) == leaves[0])
            .unwrap();
        let second = addresses
            .iter()
            .find(|a| encode_leaf(a) == leaves[1])
            .unwrap();

        assert_eq!(
            tree.proof(first).unwrap().steps(),
            &[ProofStep::Sibling {
                hash: leaves[1],
                position: Position::Right
            }]
        );
        assert_eq!(
            tree.proof(second).unwrap().steps(),
            &[ProofStep::Sibling {
                hash: leaves[0],
                position: Position::Left
            }]
        );
    }

    #[test]
    fn test_layer_sizes() {
        let tree = MerkleTree::build((1..=5).map(addr)).unwrap();
        let sizes: Vec<usize> = tree.layers().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 3, 2, 1]);
    }

    #[test]
    fn test_order_independent_root() {
        let forward = MerkleTree::build((1..=7).map(addr)).unwrap();
        let backward = MerkleTree::build((1..=7).rev().map(addr)).unwrap();
        assert_eq!(forward.root(), backward.root());
    }

    #[test]
    fn test_case_variants_collapse() {
        let tree = MerkleTree::from_addresses([
            "0x00000000000000000000000000000000000000ab",
            "0x00000000000000000000000000000000000000AB",
            "0x00000000000000000000000000000000000000cd",
        ])
        .unwrap();
        assert_eq!(tree.leaf_count(), 2);

        let lower = MerkleTree::from_addresses([
            "0x00000000000000000000000000000000000000ab",
            "0x00000000000000000000000000000000000000cd",
        ])
        .unwrap();
        assert_eq!(tree.root(), lower.root());
    }

    #[test]
    fn test_from_addresses_rejects_bad_entry() {
        let result =
            MerkleTree::from_addresses(["0x0000000000000000000000000000000000000001", "0x12"]);
        assert!(matches!(
            result,
            Err(WhitelistError::InvalidAddressFormat { .. })
        ));
    }

    #[test]
    fn test_contains() {
        let tree = MerkleTree::build([addr(1), addr(2)]).unwrap();
        assert!(tree.contains(&addr(1)));
        assert!(!tree.contains(&addr(9)));
    }

    #[test]
    fn test_from_layers_roundtrip() {
        let tree = MerkleTree::build((1..=6).map(addr)).unwrap();
        let restored = MerkleTree::from_layers(tree.layers().to_vec()).unwrap();
        assert_eq!(restored, tree);
    }

    #[test]
    fn test_from_layers_single_leaf() {
        let tree = MerkleTree::build([addr(1)]).unwrap();
        let restored = MerkleTree::from_layers(vec![vec![encode_leaf(&addr(1))]]).unwrap();
        assert_eq!(restored, tree);
        assert_eq!(restored.depth(), 0);
    }

    #[test]
    fn test_from_layers_rejects_tampering() {
        let tree = MerkleTree::build((1..=4).map(addr)).unwrap();

        let mut layers = tree.layers().to_vec();
        layers[1][0][0] ^= 1;
        assert!(matches!(
            MerkleTree::from_layers(layers),
            Err(WhitelistError::InvalidTree(_))
        ));

        let mut unsorted = tree.layers().to_vec();
        unsorted[0].swap(0, 1);
        assert!(matches!(
            MerkleTree::from_layers(unsorted),
            Err(WhitelistError::InvalidTree(_))
        ));

        let leaf = encode_leaf(&addr(1));
        assert!(matches!(
            MerkleTree::from_layers(vec![vec![leaf], vec![leaf], vec![leaf]]),
            Err(WhitelistError::InvalidTree(_))
        ));

        let mut repeated_root = tree.layers().to_vec();
        repeated_root.push(vec![tree.root()]);
        assert!(matches!(
            MerkleTree::from_layers(repeated_root),
            Err(WhitelistError::InvalidTree(_))
        ));

        let mut truncated = tree.layers().to_vec();
        truncated.pop();
        assert!(matches!(
            MerkleTree::from_layers(truncated),
            Err(WhitelistError::InvalidTree(_))
        ));

        assert!(matches!(
            MerkleTree::from_layers(Vec::new()),
            Err(WhitelistError::InvalidTree(_))
        ));
    }
}
