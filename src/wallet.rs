//! Wallet key material and account state.
//!
//! The Ed25519 key is derived from a hex seed. The on-chain address is the
//! single-signer authentication key: SHA3-256(public_key || 0x00).

use ed25519_dalek::{Signer, SigningKey};
use secrecy::{ExposeSecret, SecretString};
use sha3::{Digest, Sha3_256};
use std::fmt;
use tracing::info;

use crate::chain::{ChainClient, SignatureBlock, ED25519_SIGNATURE};
use crate::types::{ChainError, Octas, WalletError};

/// Authentication-key scheme byte for single Ed25519 signers.
const ED25519_SCHEME: u8 = 0x00;

/// Immutable key material and derived identity.
pub struct Wallet {
    signing_key: SigningKey,
    public_key: String,
    address: String,
}

impl Wallet {
    /// Load a wallet from a 64-character hex seed, optionally `0x`-prefixed.
    pub fn from_seed_hex(seed: &SecretString) -> Result<Self, WalletError> {
        let raw = seed.expose_secret().trim();
        let hex_seed = match raw.len() {
            64 => raw,
            66 if raw.starts_with("0x") => &raw[2..],
            other => return Err(WalletError::Length(other)),
        };

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_seed, &mut bytes)?;
        Ok(Self::from_seed(bytes))
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying = signing_key.verifying_key();

        let mut hasher = Sha3_256::new();
        hasher.update(verifying.as_bytes());
        hasher.update([ED25519_SCHEME]);
        let auth_key = hasher.finalize();

        Self {
            public_key: format!("0x{}", hex::encode(verifying.as_bytes())),
            address: format!("0x{}", hex::encode(auth_key)),
            signing_key,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Sign canonical transaction bytes and wrap the result in the node's
    /// signature block.
    pub fn sign(&self, message: &[u8]) -> SignatureBlock {
        let signature = self.signing_key.sign(message);
        SignatureBlock {
            kind: ED25519_SIGNATURE.to_string(),
            public_key: self.public_key.clone(),
            signature: format!("0x{}", hex::encode(signature.to_bytes())),
        }
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Account state
// ---------------------------------------------------------------------------

/// The wallet's chain-facing state.
///
/// After startup this is moved into the submission worker, which is the only
/// code that reads or advances `sequence_number`.
#[derive(Debug)]
pub struct AccountState {
    pub wallet: Wallet,
    /// Informational; refreshed at startup only.
    pub balance: Octas,
    sequence_number: u64,
}

impl AccountState {
    pub fn new(wallet: Wallet, balance: Octas, sequence_number: u64) -> Self {
        Self {
            wallet,
            balance,
            sequence_number,
        }
    }

    /// Fetch starting balance and sequence number from the node.
    pub async fn load(wallet: Wallet, chain: &dyn ChainClient) -> Result<Self, ChainError> {
        let balance = chain.balance(wallet.address()).await?;
        let sequence_number = chain.sequence_number(wallet.address()).await?;

        info!(
            address = %wallet.address(),
            balance = %balance,
            sequence_number,
            "Account loaded"
        );

        Ok(Self::new(wallet, balance, sequence_number))
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Consume one sequence slot. Returns the new value.
    pub fn advance_sequence(&mut self) -> u64 {
        self.sequence_number += 1;
        self.sequence_number
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
