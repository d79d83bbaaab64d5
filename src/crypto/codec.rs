//! Privacy codec for private chat messages.
//!
//! Private message bodies are sealed before they reach the store and opened
//! on the way back out. The default [`XorCodec`] is an obfuscation layer:
//! a repeating-key XOR keyed by a server secret. It hides content from a
//! casual look at the database and nothing more. It is NOT a cryptographically
//! sound cipher. [`AeadCodec`] keeps the same `seal`/`open` contract on top of
//! ChaCha20-Poly1305 for deployments that want real confidentiality.

use std::str::FromStr;

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;

/// Placeholder shown instead of content that could not be opened.
pub const DECRYPTION_FAILED: &str = "[Decryption failed]";

/// Key length of the XOR codec, in UTF-16 code units of the secret.
pub const XOR_KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;

const AEAD_DOMAIN: &[u8] = b"dashboard-chat-private-message-v1";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("sealed content is not valid base64")]
    Encoding,

    #[error("opened content is not valid UTF-8")]
    Utf8,

    #[error("sealed content is too short")]
    Truncated,

    #[error("cipher failure")]
    Cipher,
}

pub trait Codec: Send + Sync {
    fn seal(&self, plaintext: &str) -> Result<String, CodecError>;

    fn open(&self, sealed: &str) -> Result<String, CodecError>;

    /// Opens `sealed`, degrading to [`DECRYPTION_FAILED`] on any failure.
    fn open_or_placeholder(&self, sealed: &str) -> String {
        match self.open(sealed) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open private message");
                DECRYPTION_FAILED.to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherKind {
    Xor,
    ChaCha20Poly1305,
}

impl FromStr for CipherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xor" => Ok(CipherKind::Xor),
            "chacha20poly1305" | "chacha20-poly1305" | "aead" => Ok(CipherKind::ChaCha20Poly1305),
            other => Err(format!("unknown cipher '{}'", other)),
        }
    }
}

pub fn build_codec(kind: CipherKind, secret: &str) -> Box<dyn Codec> {
    match kind {
        CipherKind::Xor => Box::new(XorCodec::new(secret)),
        CipherKind::ChaCha20Poly1305 => Box::new(AeadCodec::new(secret)),
    }
}

/// Repeating-key XOR, base64 encoded.
pub struct XorCodec {
    key: Vec<u8>,
}

impl XorCodec {
    /// The secret is right-padded with `0` and truncated to [`XOR_KEY_LEN`]
    /// UTF-16 code units, then encoded as UTF-8. Non-ASCII secrets therefore
    /// yield a key longer than 32 bytes, and a surrogate pair cut at the
    /// boundary becomes U+FFFD. Existing sealed rows depend on this layout.
    pub fn new(secret: &str) -> Self {
        let mut units: Vec<u16> = secret.encode_utf16().take(XOR_KEY_LEN).collect();
        units.resize(XOR_KEY_LEN, u16::from(b'0'));
        Self {
            key: String::from_utf16_lossy(&units).into_bytes(),
        }
    }

    fn apply(&self, bytes: &[u8]) -> Vec<u8> {
        bytes
            .iter()
            .zip(self.key.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect()
    }
}

impl Codec for XorCodec {
    fn seal(&self, plaintext: &str) -> Result<String, CodecError> {
        Ok(base64_simd::STANDARD.encode_to_string(self.apply(plaintext.as_bytes())))
    }

    fn open(&self, sealed: &str) -> Result<String, CodecError> {
        let bytes = base64_simd::STANDARD
            .decode_to_vec(sealed)
            .map_err(|_| CodecError::Encoding)?;
        String::from_utf8(self.apply(&bytes)).map_err(|_| CodecError::Utf8)
    }
}

/// ChaCha20-Poly1305 with a random nonce prepended to the ciphertext.
pub struct AeadCodec {
    cipher: ChaCha20Poly1305,
}

impl AeadCodec {
    pub fn new(secret: &str) -> Self {
        let hkdf = Hkdf::<Sha256>::new(None, secret.as_bytes());
        let mut key_bytes = [0u8; 32];
        hkdf.expand(AEAD_DOMAIN, &mut key_bytes)
            .expect("32-byte HKDF output is always valid");

        Self {
            cipher: ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&key_bytes)),
        }
    }
}

impl Codec for AeadCodec {
    fn seal(&self, plaintext: &str) -> Result<String, CodecError> {
        let nonce = ChaCha20Poly1305::generate_nonce(OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CodecError::Cipher)?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(base64_simd::STANDARD.encode_to_string(&sealed))
    }

    fn open(&self, sealed: &str) -> Result<String, CodecError> {
        let bytes = base64_simd::STANDARD
            .decode_to_vec(sealed)
            .map_err(|_| CodecError::Encoding)?;
        if bytes.len() < NONCE_LEN {
            return Err(CodecError::Truncated);
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CodecError::Cipher)?;
        String::from_utf8(plaintext).map_err(|_| CodecError::Utf8)
    }
}
