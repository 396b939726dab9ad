//! Full assembly identities and their comparison rules.
//!
//! An assembly identity is the tuple `(name, version, culture, strong name)` plus the
//! assembly flag word. Two comparison modes matter to the core:
//!
//! - the **default comparer** requires all four core fields to match, and
//! - the **version-agnostic comparer** ignores the version; it keys the runtime
//!   context's loaded-assembly table, so one context holds at most one assembly per
//!   `(name, culture, public key token)` regardless of version.
//!
//! Names compare byte-exactly; there is no case folding anywhere in the identity.

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use bitflags::bitflags;

use crate::{
    error::malformed_error,
    metadata::identity::{AssemblyVersion, StrongName},
    Error, Result,
};

bitflags! {
    /// Assembly flag word, ECMA-335 §II.23.1.2.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AssemblyFlags: u32 {
        /// The assembly reference holds the full (unhashed) public key
        const PUBLIC_KEY = 0x0001;
        /// The implementation of the referenced assembly may be retargeted at runtime
        const RETARGETABLE = 0x0100;
        /// JIT compiler tracking is disabled
        const DISABLE_JIT_COMPILE_OPTIMIZER = 0x4000;
        /// JIT compiler optimization is enabled
        const ENABLE_JIT_COMPILE_TRACKING = 0x8000;
    }
}

/// Complete identity of a .NET assembly.
///
/// Serves as the key for cross-assembly resolution: assembly references carry one,
/// assembly definitions expose one, and the runtime context maps them to loaded
/// definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyIdentity {
    /// Simple assembly name, e.g. `mscorlib` or `System.Runtime`
    pub name: String,
    /// Four-part binding version
    pub version: AssemblyVersion,
    /// Localization culture; `None` is the culture-neutral assembly
    pub culture: Option<String>,
    /// Public key or token; `None` for assemblies without a strong name
    pub strong_name: Option<StrongName>,
    /// Assembly flag word
    pub flags: AssemblyFlags,
}

impl AssemblyIdentity {
    /// Create an identity with a name and version, no culture and no strong name
    #[must_use]
    pub fn new(name: impl Into<String>, version: AssemblyVersion) -> Self {
        AssemblyIdentity {
            name: name.into(),
            version,
            culture: None,
            strong_name: None,
            flags: AssemblyFlags::empty(),
        }
    }

    /// Attach a culture
    #[must_use]
    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        let culture = culture.into();
        self.culture = if culture.is_empty() || culture == "neutral" {
            None
        } else {
            Some(culture)
        };
        self
    }

    /// Attach a strong name, updating the `PUBLIC_KEY` flag to match
    #[must_use]
    pub fn with_strong_name(mut self, strong_name: StrongName) -> Self {
        self.flags.set(AssemblyFlags::PUBLIC_KEY, strong_name.has_full_key());
        self.strong_name = Some(strong_name);
        self
    }

    /// Returns true when the identity carries the full public key rather than a token
    #[must_use]
    pub fn has_full_key(&self) -> bool {
        self.strong_name
            .as_ref()
            .is_some_and(StrongName::has_full_key)
    }

    /// The 8-byte public key token, derived when the full key is present
    #[must_use]
    pub fn public_key_token(&self) -> Option<u64> {
        self.strong_name.as_ref().map(StrongName::token)
    }

    /// Equality under the default comparer: name, version, culture and token all match.
    #[must_use]
    pub fn eq_default(&self, other: &AssemblyIdentity) -> bool {
        self.version == other.version && self.eq_version_agnostic(other)
    }

    /// Equality under the version-agnostic comparer used by the loaded-assembly table.
    #[must_use]
    pub fn eq_version_agnostic(&self, other: &AssemblyIdentity) -> bool {
        self.name == other.name
            && self.culture == other.culture
            && self.public_key_token() == other.public_key_token()
    }

    /// Hash matching [`AssemblyIdentity::eq_version_agnostic`].
    pub fn hash_version_agnostic<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.culture.hash(state);
        self.public_key_token().hash(state);
    }

    /// Format as a display name: `Name, Version=..., Culture=..., PublicKeyToken=...`
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut result = format!("{}, Version={}", self.name, self.version);

        result.push_str(", Culture=");
        match &self.culture {
            Some(culture) => result.push_str(culture),
            None => result.push_str("neutral"),
        }

        match self.public_key_token() {
            Some(token) => {
                result.push_str(&format!(", PublicKeyToken={:016x}", token));
            }
            None => result.push_str(", PublicKeyToken=null"),
        }

        result
    }

    /// Parse a display name back into an identity.
    ///
    /// Accepts the canonical `Name, Version=..., Culture=..., PublicKeyToken=...`
    /// layout with any subset of the named properties.
    ///
    /// # Errors
    /// Returns an error for an empty name, malformed version or malformed token.
    pub fn parse(display_name: &str) -> Result<Self> {
        let mut parts = display_name.split(',');

        let name = parts
            .next()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| malformed_error!("Empty assembly display name"))?;

        let mut identity = AssemblyIdentity::new(name, AssemblyVersion::default());

        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                return Err(malformed_error!("Invalid display name property - {}", part));
            };

            let value = value.trim();
            match key.trim() {
                "Version" => identity.version = value.parse()?,
                "Culture" => identity = identity.with_culture(value),
                "PublicKeyToken" => {
                    if value != "null" {
                        identity = identity.with_strong_name(StrongName::from_token_str(value)?);
                    }
                }
                "ProcessorArchitecture" | "Retargetable" | "ContentType" | "Custom" => {}
                other => {
                    return Err(malformed_error!("Unknown display name property - {}", other));
                }
            }
        }

        Ok(identity)
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl std::str::FromStr for AssemblyIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AssemblyIdentity::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mscorlib() -> AssemblyIdentity {
        AssemblyIdentity::new("mscorlib", AssemblyVersion::new(4, 0, 0, 0))
            .with_strong_name(StrongName::from_token_str("b77a5c561934e089").unwrap())
    }

    #[test]
    fn test_default_comparer_requires_all_fields() {
        let a = mscorlib();
        let mut b = mscorlib();
        assert!(a.eq_default(&b));

        b.version = AssemblyVersion::new(2, 0, 0, 0);
        assert!(!a.eq_default(&b));
        assert!(a.eq_version_agnostic(&b));
    }

    #[test]
    fn test_version_agnostic_rejects_other_culture() {
        let neutral = mscorlib();
        let localized = mscorlib().with_culture("fr-FR");
        assert!(!neutral.eq_version_agnostic(&localized));
    }

    #[test]
    fn test_full_key_and_token_compare_equal() {
        let key: Vec<u8> = (0u8..160).collect();
        let full = AssemblyIdentity::new("Signed", AssemblyVersion::new(1, 0, 0, 0))
            .with_strong_name(StrongName::PubKey(key.clone()));
        let token_value = StrongName::PubKey(key).token();
        let tokenized = AssemblyIdentity::new("Signed", AssemblyVersion::new(1, 0, 0, 0))
            .with_strong_name(StrongName::Token(token_value));

        assert!(full.has_full_key());
        assert!(!tokenized.has_full_key());
        assert!(full.eq_default(&tokenized));
    }

    #[test]
    fn test_display_name_round_trip() {
        let identity = mscorlib();
        let display = identity.display_name();
        assert_eq!(
            display,
            "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"
        );

        let parsed = AssemblyIdentity::parse(&display).unwrap();
        assert!(identity.eq_default(&parsed));
    }

    #[test]
    fn test_parse_without_strong_name() {
        let identity = AssemblyIdentity::parse("MyLib, Version=1.2.3.4").unwrap();
        assert_eq!(identity.name, "MyLib");
        assert_eq!(identity.version, AssemblyVersion::new(1, 2, 3, 4));
        assert_eq!(identity.public_key_token(), None);
        assert_eq!(identity.culture, None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(AssemblyIdentity::parse("").is_err());
        assert!(AssemblyIdentity::parse("Lib, Version=banana").is_err());
        assert!(AssemblyIdentity::parse("Lib, Frobnicate=1").is_err());
    }

    #[test]
    fn test_culture_neutral_normalization() {
        let explicit = AssemblyIdentity::new("A", AssemblyVersion::default()).with_culture("neutral");
        let implicit = AssemblyIdentity::new("A", AssemblyVersion::default());
        assert!(explicit.eq_default(&implicit));
    }

    #[test]
    fn test_version_agnostic_hash_consistency() {
        use std::collections::hash_map::DefaultHasher;

        let a = mscorlib();
        let mut b = mscorlib();
        b.version = AssemblyVersion::new(9, 9, 9, 9);

        let mut hash_a = DefaultHasher::new();
        let mut hash_b = DefaultHasher::new();
        a.hash_version_agnostic(&mut hash_a);
        b.hash_version_agnostic(&mut hash_b);
        assert_eq!(hash_a.finish(), hash_b.finish());
    }
}
