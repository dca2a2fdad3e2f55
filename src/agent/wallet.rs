use ed25519_dalek::{Signer, SigningKey};

use crate::error::{GateError, GateResult};

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// An ed25519 keypair decoded from the 64-byte base58 secret key format used
/// by Solana CLI and wallet exports (32-byte seed followed by the public key).
pub struct Wallet {
    signing_key: SigningKey,
    address: String,
}

impl Wallet {
    pub fn from_base58(secret: &str) -> GateResult<Self> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| GateError::invalid_key(format!("base58 decode failed: {}", e)))?;

        let keypair: [u8; 64] = bytes.as_slice().try_into().map_err(|_| {
            GateError::invalid_key(format!("expected 64 bytes, got {}", bytes.len()))
        })?;

        let signing_key = SigningKey::from_keypair_bytes(&keypair)
            .map_err(|e| GateError::invalid_key(e.to_string()))?;

        Ok(Self::from_signing_key(signing_key))
    }

    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = bs58::encode(signing_key.verifying_key().as_bytes()).into_string();
        Self {
            signing_key,
            address,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet").field("address", &self.address).finish()
    }
}

/// Decode a base58 account address into its 32 raw bytes.
pub fn parse_address(address: &str) -> GateResult<[u8; 32]> {
    let bytes = bs58::decode(address.trim())
        .into_vec()
        .map_err(|_| GateError::validation(format!("Invalid address: {}", address)))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| GateError::validation(format!("Invalid address: {}", address)))
}
