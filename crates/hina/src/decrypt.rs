//! AES-128-CBC segment decryption.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};

use crate::{error::HinaResult, playlist::KeyRef};

/// An imported, ready-to-use AES-128 key. Owned by the key cache and
/// shared read-only by all workers.
pub struct ResolvedKey {
    key: [u8; 16],
}

impl ResolvedKey {
    pub fn new(key: [u8; 16]) -> Self {
        Self { key }
    }

    pub fn to_decryptor(&self, iv: [u8; 16]) -> Decryptor {
        Decryptor(cbc::Decryptor::<aes::Aes128>::new(
            (&self.key).into(),
            (&iv).into(),
        ))
    }
}

/// The IV is the explicit one from the key tag when present, otherwise
/// the big-endian encoding of the segment's media sequence number.
pub fn derive_iv(key: &KeyRef, media_sequence: u64) -> [u8; 16] {
    key.iv
        .unwrap_or_else(|| (media_sequence as u128).to_be_bytes())
}

pub struct Decryptor(cbc::Decryptor<aes::Aes128>);

impl Decryptor {
    pub fn decrypt(self, data: &[u8]) -> HinaResult<Vec<u8>> {
        Ok(self.0.decrypt_padded_vec_mut::<Pkcs7>(data)?)
    }
}
