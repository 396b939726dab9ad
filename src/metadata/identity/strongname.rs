//! Strong-name identities: public keys and public-key tokens.
//!
//! A strong-named assembly is identified either by its full RSA public key or by the
//! 8-byte token derived from it. The token is the trailing 8 bytes of the key's hash
//! read little-endian, which is the reversed byte order used by display names such as
//! `PublicKeyToken=b77a5c561934e089`.

use md5::{Digest, Md5};
use sha1::Sha1;

use crate::{error::malformed_error, file::io::read_le, Error, Result};

/// Hash algorithm identifiers from the `Assembly` table, ECMA-335 §II.23.1.1.
pub struct AssemblyHashAlgorithm;

#[allow(missing_docs)]
impl AssemblyHashAlgorithm {
    pub const NONE: u32 = 0x0000;
    pub const MD5: u32 = 0x8003;
    pub const SHA1: u32 = 0x8004;
}

/// Strong-name identity of an assembly: the full public key or its derived token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StrongName {
    /// The full RSA public key blob
    PubKey(Vec<u8>),
    /// The 8-byte token derived from the public key hash
    Token(u64),
}

impl StrongName {
    /// Create a `StrongName` from raw identity bytes.
    ///
    /// ## Arguments
    /// * `data`        - The key or token bytes from the metadata blob heap
    /// * `is_full_key` - True when `data` holds the full public key (the
    ///   `PublicKey` assembly flag), false for an 8-byte token
    ///
    /// # Errors
    /// Returns an error when a token is requested from fewer than 8 bytes.
    pub fn from_bytes(data: &[u8], is_full_key: bool) -> Result<Self> {
        Ok(if is_full_key {
            StrongName::PubKey(data.to_vec())
        } else {
            StrongName::Token(read_le::<u64>(data)?)
        })
    }

    /// Parse a 16-hex-digit token as printed in display names.
    ///
    /// # Errors
    /// Returns an error when the string is not exactly 16 hex digits.
    pub fn from_token_str(s: &str) -> Result<Self> {
        if s.len() != 16 {
            return Err(malformed_error!("Public key token must be 16 hex digits - {}", s));
        }

        let value = u64::from_str_radix(s, 16)
            .map_err(|_| malformed_error!("Invalid public key token - {}", s))?;
        Ok(StrongName::Token(value))
    }

    /// Returns true when this identity carries the full public key
    #[must_use]
    pub fn has_full_key(&self) -> bool {
        matches!(self, StrongName::PubKey(_))
    }

    /// Derive the 8-byte token using the given [`AssemblyHashAlgorithm`].
    ///
    /// The token is the last 8 bytes of the key hash read little-endian; formatted
    /// with `{:016x}` it matches the reversed-byte display convention. Token
    /// identities return their value unchanged regardless of the algorithm.
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] for unknown algorithm identifiers.
    pub fn to_token(&self, algo: u32) -> Result<u64> {
        match self {
            StrongName::PubKey(data) => match algo {
                AssemblyHashAlgorithm::MD5 => {
                    let mut hasher = Md5::new();
                    hasher.update(data);

                    let result = hasher.finalize();

                    read_le::<u64>(&result[result.len() - 8..])
                }
                AssemblyHashAlgorithm::NONE | AssemblyHashAlgorithm::SHA1 => {
                    let mut hasher = Sha1::new();
                    hasher.update(data);

                    let result = hasher.finalize();

                    read_le::<u64>(&result[result.len() - 8..])
                }
                _ => Err(Error::NotSupported),
            },
            StrongName::Token(token) => Ok(*token),
        }
    }

    /// Derive the token with the default SHA-1 algorithm.
    #[must_use]
    pub fn token(&self) -> u64 {
        // SHA-1 derivation cannot fail: the digest always yields 20 bytes
        self.to_token(AssemblyHashAlgorithm::SHA1).unwrap_or(0)
    }
}
