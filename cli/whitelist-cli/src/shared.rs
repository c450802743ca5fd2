//! Shared handle serving roots and proofs while the whitelist may be rebuilt.
//!
//! Readers take an `Arc` snapshot of the current tree, so a rebuild never
//! disturbs lookups already in flight against the previous tree.

use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::common::{Address, Hash};
use crate::error::WhitelistResult;
use crate::proof::Proof;
use crate::tree::MerkleTree;

/// Current whitelist tree behind a read-write lock.
#[derive(Debug)]
pub struct SharedWhitelist {
    current: RwLock<Arc<MerkleTree>>,
}

impl SharedWhitelist {
    /// Builds the initial tree.
    ///
    /// # Errors
    /// Returns `EmptyWhitelist` if no addresses are supplied
    pub fn new<I>(addresses: I) -> WhitelistResult<Self>
    where
        I: IntoIterator<Item = Address>,
    {
        let tree = MerkleTree::build(addresses)?;
        info!(
            "Whitelist ready: {} addresses, root {}",
            tree.leaf_count(),
            tree.root_hex()
        );
        Ok(Self {
            current: RwLock::new(Arc::new(tree)),
        })
    }

    /// Replace the tree with one built from `addresses`.
    ///
    /// The new tree is built before the lock is taken. On error the current
    /// tree stays in place.
    ///
    /// # Returns
    /// Root of the new tree
    pub fn rebuild<I>(&self, addresses: I) -> WhitelistResult<Hash>
    where
        I: IntoIterator<Item = Address>,
    {
        let tree = Arc::new(MerkleTree::build(addresses)?);
        let root = tree.root();
        info!(
            "Whitelist rebuilt: {} addresses, root {}",
            tree.leaf_count(),
            tree.root_hex()
        );
        *self.current.write() = tree;
        Ok(root)
    }

    /// The tree currently being served.
    pub fn snapshot(&self) -> Arc<MerkleTree> {
        Arc::clone(&self.current.read())
    }

    /// Returns the root of the tree currently being served.
    pub fn root(&self) -> Hash {
        self.current.read().root()
    }

    /// Generates a proof against the tree currently being served.
    ///
    /// # Errors
    /// Returns `AddressNotFound` if the address is not whitelisted
    pub fn proof(&self, address: &Address) -> WhitelistResult<Proof> {
        self.snapshot().proof(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WhitelistError;
    use crate::proof::verify_address;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address(bytes)
    }

    #[test]
    fn test_root_and_proof() {
        let whitelist = SharedWhitelist::new([addr(1), addr(2), addr(3)]).unwrap();
        let proof = whitelist.proof(&addr(2)).unwrap();
        assert!(verify_address(&addr(2), &proof, &whitelist.root()));
        assert_eq!(
            whitelist.proof(&addr(4)).unwrap_err(),
            WhitelistError::AddressNotFound(addr(4).to_string())
        );
    }

    #[test]
    fn test_rebuild_keeps_old_snapshot() {
        let whitelist = SharedWhitelist::new([addr(1), addr(2)]).unwrap();
        let old = whitelist.snapshot();
        let old_root = whitelist.root();

        let new_root = whitelist.rebuild([addr(1), addr(2), addr(3)]).unwrap();
        assert_ne!(old_root, new_root);
        assert_eq!(whitelist.root(), new_root);

        assert_eq!(old.root(), old_root);
        assert!(old.proof(&addr(3)).is_err());
        assert!(whitelist.proof(&addr(3)).is_ok());
    }

    #[test]
    fn test_failed_rebuild_keeps_current_tree() {
        let whitelist = SharedWhitelist::new([addr(1)]).unwrap();
        let root = whitelist.root();
        assert_eq!(
            whitelist.rebuild(Vec::<Address>::new()).unwrap_err(),
            WhitelistError::EmptyWhitelist
        );
        assert_eq!(whitelist.root(), root);
    }

    #[test]
    fn test_concurrent_lookups_during_rebuild() {
        let whitelist = Arc::new(SharedWhitelist::new((1..=8).map(addr)).unwrap());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let whitelist = Arc::clone(&whitelist);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let tree = whitelist.snapshot();
                        let proof = tree.proof(&addr(5)).unwrap();
                        assert!(verify_address(&addr(5), &proof, &tree.root()));
                    }
                })
            })
            .collect();

        for n in 9..20 {
            whitelist.rebuild((1..=n).map(addr)).unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
