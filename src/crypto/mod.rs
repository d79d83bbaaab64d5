pub mod codec;
pub mod password;

pub use codec::{build_codec, AeadCodec, CipherKind, Codec, CodecError, XorCodec, DECRYPTION_FAILED};
pub use password::{hash_password, verify_password};
