//! Error types for whitelist tree operations

use thiserror::Error;

/// Errors that can occur while building or querying a whitelist tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WhitelistError {
    /// Input could not be decoded to exactly 20 bytes
    #[error("Invalid address format '{input}': {reason}")]
    InvalidAddressFormat { input: String, reason: String },

    /// No addresses were supplied to build from
    #[error("Whitelist cannot be empty")]
    EmptyWhitelist,

    /// Proof requested for an address that is not a leaf of the tree
    #[error("Address {0} not found in whitelist")]
    AddressNotFound(String),

    /// Input could not be decoded to a 32-byte hash
    #[error("Invalid hash '{input}': {reason}")]
    InvalidHash { input: String, reason: String },

    /// A dumped layer set does not describe a well-formed tree
    #[error("Invalid tree: {0}")]
    InvalidTree(String),
}

/// Result type for whitelist operations
pub type WhitelistResult<T> = Result<T, WhitelistError>;
