//! Encrypted-at-rest storage for hot signer keys.
//!
//! Keys are stored as AES-256-GCM ciphertext; the AEAD key itself is derived from
//! `WALLET_ENCRYPTION_KEY` via SHA-256 rather than used directly, so the env var can
//! be any passphrase length and the cipher always gets a full 32-byte key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use orch_types::chain::ChainId;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum KeyVaultError {
    #[error("no signer loaded for ({0}, {1})")]
    NoSigner(ChainId, String),
    #[error("decryption failed: ciphertext invalid or key mismatch")]
    DecryptionFailed,
    #[error("ciphertext too short to contain a nonce")]
    CiphertextTooShort,
}

const NONCE_LEN: usize = 12;

fn derive_key(passphrase: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(passphrase.as_bytes());
    hasher.finalize().into()
}

/// Encrypts `plaintext` (a raw private key) under `passphrase`, returning
/// `nonce || ciphertext` as it will be stored.
pub fn encrypt_secret(passphrase: &str, plaintext: &[u8]) -> Vec<u8> {
    let key = Key::<Aes256Gcm>::from_slice(&derive_key(passphrase)).to_owned();
    let cipher = Aes256Gcm::new(&key);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher.encrypt(nonce, plaintext).expect("AES-GCM encryption cannot fail here");
    let mut out = nonce_bytes.to_vec();
    out.extend(ciphertext);
    out
}

fn decrypt_secret(passphrase: &str, envelope: &[u8]) -> Result<Vec<u8>, KeyVaultError> {
    if envelope.len() <= NONCE_LEN {
        return Err(KeyVaultError::CiphertextTooShort);
    }
    let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LEN);
    let key = Key::<Aes256Gcm>::from_slice(&derive_key(passphrase)).to_owned();
    let cipher = Aes256Gcm::new(&key);
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| KeyVaultError::DecryptionFailed)
}

/// A decrypted signer ready to hand to a chain executor. Dropped (and its bytes
/// zeroized by the caller) as soon as the signing step is done.
#[derive(Clone)]
pub struct SignerSecret(pub Vec<u8>);

/// Holds the envelope-encrypted signer secrets for every configured `(chain, address)`
/// and decrypts on demand. Constructed once at startup from config; never logs or
/// serializes a decrypted secret.
pub struct KeyVault {
    passphrase: String,
    envelopes: HashMap<(ChainId, String), Vec<u8>>,
}

impl KeyVault {
    pub fn new(passphrase: String) -> Self {
        Self {
            passphrase,
            envelopes: HashMap::new(),
        }
    }

    /// Loads a key, encrypting `plaintext` under the vault's passphrase before
    /// storing it. Used at startup when config hands over raw signer material.
    pub fn load_plaintext(&mut self, chain_id: ChainId, address: String, plaintext: &[u8]) {
        let envelope = encrypt_secret(&self.passphrase, plaintext);
        self.envelopes.insert((chain_id, address), envelope);
    }

    /// Loads an already-encrypted envelope (e.g. read back from a secrets store).
    pub fn load_envelope(&mut self, chain_id: ChainId, address: String, envelope: Vec<u8>) {
        self.envelopes.insert((chain_id, address), envelope);
    }

    pub fn decrypt(&self, chain_id: &ChainId, address: &str) -> Result<SignerSecret, KeyVaultError> {
        let envelope = self
            .envelopes
            .get(&(chain_id.clone(), address.to_string()))
            .ok_or_else(|| KeyVaultError::NoSigner(chain_id.clone(), address.to_string()))?;
        decrypt_secret(&self.passphrase, envelope).map(SignerSecret)
    }

    pub fn has_signer(&self, chain_id: &ChainId, address: &str) -> bool {
        self.envelopes.contains_key(&(chain_id.clone(), address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_secret_through_encryption() {
        let mut vault = KeyVault::new("correct horse battery staple".into());
        let chain = ChainId::new("eip155", "1");
        vault.load_plaintext(chain.clone(), "0xowner".into(), b"super-secret-private-key");

        let recovered = vault.decrypt(&chain, "0xowner").unwrap();
        assert_eq!(recovered.0, b"super-secret-private-key");
    }

    #[test]
    fn wrong_passphrase_fails_to_decrypt() {
        let mut vault = KeyVault::new("correct-passphrase".into());
        let chain = ChainId::new("eip155", "1");
        vault.load_plaintext(chain.clone(), "0xowner".into(), b"secret");

        let envelope = vault.envelopes.get(&(chain.clone(), "0xowner".to_string())).unwrap().clone();
        let other_vault = KeyVault::new("wrong-passphrase".into());
        let mut other_vault = other_vault;
        other_vault.load_envelope(chain.clone(), "0xowner".into(), envelope);
        assert!(matches!(other_vault.decrypt(&chain, "0xowner"), Err(KeyVaultError::DecryptionFailed)));
    }

    #[test]
    fn missing_signer_is_reported() {
        let vault = KeyVault::new("pass".into());
        let chain = ChainId::new("eip155", "1");
        assert!(!vault.has_signer(&chain, "0xnobody"));
        assert!(matches!(vault.decrypt(&chain, "0xnobody"), Err(KeyVaultError::NoSigner(_, _))));
    }
}
