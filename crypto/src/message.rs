use crate::CryptoError;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zsm_common::{Identity, IDENTITY_LEN};

/// Length in bytes of the random XChaCha20-Poly1305-IETF nonce (§3, GLOSSARY).
pub const NONCE_LEN: usize = 24;

const TAG_LEN: usize = 16;
const TIMESTAMP_LEN: usize = 8;

/// Minimum valid length of a MESSAGE packet's `data` field: sender (32) +
/// recipient (32) + nonce (24) + timestamp (8) + the AEAD tag that a
/// zero-length plaintext still produces (16). §4.2 phrases this bound as
/// "≥ 96 + 8"; this implementation additionally requires the full 16-byte
/// tag rather than the loose 8-byte figure, since no valid ciphertext is
/// shorter than its tag (see DESIGN.md).
pub const MESSAGE_PAYLOAD_MIN_LEN: usize = IDENTITY_LEN * 2 + NONCE_LEN + TIMESTAMP_LEN + TAG_LEN;

/// The decoded `data` of a MESSAGE packet (§3).
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MessagePayload {
    pub sender: Identity,
    pub recipient: Identity,
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub creation: u64,
}

impl MessagePayload {
    /// Concatenates the fields in the exact wire order fixed by §3: this is
    /// also exactly the byte string the packet's signature covers.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IDENTITY_LEN * 2 + NONCE_LEN + self.ciphertext.len() + TIMESTAMP_LEN);
        out.extend_from_slice(self.sender.as_ref());
        out.extend_from_slice(self.recipient.as_ref());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.creation.to_le_bytes());
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() < MESSAGE_PAYLOAD_MIN_LEN {
            return Err(CryptoError::MalformedPayload("message payload shorter than the minimum valid length"));
        }

        let sender = Identity::try_from(&data[0..32])
            .map_err(|_| CryptoError::MalformedPayload("sender slice is not 32 bytes"))?;
        let recipient = Identity::try_from(&data[32..64])
            .map_err(|_| CryptoError::MalformedPayload("recipient slice is not 32 bytes"))?;

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&data[64..64 + NONCE_LEN]);

        let ciphertext_start = 64 + NONCE_LEN;
        let ciphertext_end = data.len() - TIMESTAMP_LEN;
        let ciphertext = data[ciphertext_start..ciphertext_end].to_vec();

        let mut timestamp_bytes = [0u8; TIMESTAMP_LEN];
        timestamp_bytes.copy_from_slice(&data[ciphertext_end..]);
        let creation = u64::from_le_bytes(timestamp_bytes);

        Ok(MessagePayload { sender, recipient, nonce, ciphertext, creation })
    }
}

/// Encrypts `plaintext` under `send_key` with a fresh random nonce and
/// assembles the resulting [`MessagePayload`] (§4.2 Encrypt).
pub fn encrypt_message(
    send_key: &[u8; 32],
    sender: Identity,
    recipient: Identity,
    plaintext: &[u8],
    creation: u64,
) -> Result<MessagePayload, CryptoError> {
    let cipher = XChaCha20Poly1305::new(send_key.into());

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher.encrypt(nonce, plaintext).map_err(|_| CryptoError::Encrypt)?;

    Ok(MessagePayload { sender, recipient, nonce: nonce_bytes, ciphertext, creation })
}

/// Decrypts `payload.ciphertext` under `receive_key`, returning the
/// plaintext (§4.2 Decrypt). No retry, no fallback: an AEAD tag mismatch is
/// always `CryptoError::Decrypt`.
pub fn decrypt_message(receive_key: &[u8; 32], payload: &MessagePayload) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(receive_key.into());
    let nonce = XNonce::from_slice(&payload.nonce);
    cipher.decrypt(nonce, payload.ciphertext.as_slice()).map_err(|_| CryptoError::Decrypt)
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(byte: u8) -> Identity {
        Identity::from_bytes([byte; 32])
    }

    #[test]
    fn payload_round_trips() {
        let payload = MessagePayload {
            sender: id(1),
            recipient: id(2),
            nonce: [7u8; NONCE_LEN],
            ciphertext: vec![1, 2, 3, 4, 5],
            creation: 1_700_000_000,
        };
        let encoded = payload.encode();
        let decoded = MessagePayload::decode(&encoded).unwrap();
        assert_eq!(payload, decoded);
    }

    #[test]
    fn encrypt_then_decrypt_recovers_plaintext() {
        let key = [9u8; 32];
        let payload = encrypt_message(&key, id(1), id(2), b"hello", 1_700_000_000).unwrap();
        let plaintext = decrypt_message(&key, &payload).unwrap();
        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn decrypt_fails_under_wrong_key() {
        let key = [9u8; 32];
        let other_key = [1u8; 32];
        let payload = encrypt_message(&key, id(1), id(2), b"hello", 1_700_000_000).unwrap();
        assert!(decrypt_message(&other_key, &payload).is_err());
    }

    #[test]
    fn decrypt_fails_under_wrong_nonce() {
        let key = [9u8; 32];
        let mut payload = encrypt_message(&key, id(1), id(2), b"hello", 1_700_000_000).unwrap();
        payload.nonce[0] ^= 1;
        assert!(decrypt_message(&key, &payload).is_err());
    }

    #[test]
    fn decode_rejects_undersize_payload() {
        let short = vec![0u8; MESSAGE_PAYLOAD_MIN_LEN - 1];
        assert!(MessagePayload::decode(&short).is_err());
    }
}
