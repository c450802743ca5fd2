pub mod common;
pub mod error;
pub mod proof;
pub mod shared;
pub mod tree;

pub use common::{
    encode_leaf, hash_sorted_pair, hex_encode, keccak256, parse_address, parse_hash,
    read_address_list, write_file_atomic, Address, Hash,
};
pub use error::{WhitelistError, WhitelistResult};
pub use proof::{verify, verify_address, Position, Proof, ProofStep};
pub use shared::SharedWhitelist;
pub use tree::MerkleTree;
