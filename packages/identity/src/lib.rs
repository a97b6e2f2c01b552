//! Applet identities that survive a trip through a URL origin.
//!
//! An applet is identified by a content hash whose canonical text form is
//! case-sensitive base64. URL hosts are case-insensitive, so the identity
//! cannot be embedded in an origin like `applet://<id>` as-is. This crate
//! folds the text into lowercase with an escape marker and back.
//!
//! # Key Properties
//!
//! - `decode(encode(x)) == x` for every valid identity
//! - `encode` is injective: distinct identities never share an encoding
//! - Already-lowercase text passes through unchanged
//! - Malformed input is rejected, never repaired
//!
//! # Examples
//!
//! ```
//! use framelink_identity::{decode, encode, fold_case, AppletIdentity};
//!
//! assert_eq!(fold_case("uhCEk"), "uhc$e$k");
//!
//! let id = AppletIdentity::from_core([1; 32]);
//! let folded = encode(&id);
//! assert_eq!(decode(folded.as_str()).unwrap(), id);
//!
//! // Inside a URL authority the marker is percent-escaped
//! assert!(folded.to_url_host().contains("%24"));
//! ```

mod decode;
mod encode;
mod hash;

use std::fmt;

use thiserror::Error;

pub use decode::{decode, decode_hash, decode_url_host, unfold_case};
pub use encode::{encode, fold_case, ESCAPE_MARKER, URL_ESCAPED_MARKER};
pub use hash::{
    AgentKey, AppletIdentity, DnaHash, HashKind, RawHash, CORE_LEN, HASH_LEN, MULTIBASE_PREFIX,
};

/// Reasons an identity string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedIdentity {
    /// Folded text may not contain uppercase letters.
    #[error("uppercase character '{0}' in case-folded identity")]
    UnfoldedUppercase(char),

    /// An escape marker that does not follow a lowercase letter.
    #[error("escape marker at byte {0} does not follow a lowercase letter")]
    DanglingMarker(usize),

    /// A character outside the base64url alphabet.
    #[error("invalid character '{0}' in identity")]
    InvalidCharacter(char),

    /// The canonical form must start with `u`.
    #[error("identity is missing the 'u' multibase prefix")]
    MissingMultibasePrefix,

    /// The body is not valid unpadded base64url.
    #[error("invalid base64 in identity: {0}")]
    InvalidBase64(String),

    /// The decoded hash has the wrong length.
    #[error("expected {expected} bytes, got {found}")]
    InvalidLength { expected: usize, found: usize },

    /// The hash prefix names a different kind of hash.
    #[error("hash prefix is not of kind '{expected}'")]
    WrongKind { expected: HashKind },
}

/// A case-insensitive encoding of an [`AppletIdentity`].
///
/// Holds the folded text with literal `$` markers. Construct one with
/// [`encode`] or by validating text with [`IdentityString::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityString(String);

impl IdentityString {
    pub(crate) fn new_unchecked(folded: String) -> Self {
        Self(folded)
    }

    /// Validate folded text. The text must decode to an applet identity.
    pub fn parse(folded: &str) -> Result<Self, MalformedIdentity> {
        decode(folded)?;
        Ok(Self(folded.to_string()))
    }

    /// Validate a URL host component (`%24` in place of `$`).
    pub fn from_url_host(host: &str) -> Result<Self, MalformedIdentity> {
        Self::parse(&decode::unescape_url_host(host))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The form to embed in a URL authority.
    pub fn to_url_host(&self) -> String {
        self.0.replace(ESCAPE_MARKER, URL_ESCAPED_MARKER)
    }

    /// Decode back to the identity.
    pub fn identity(&self) -> Result<AppletIdentity, MalformedIdentity> {
        decode(&self.0)
    }
}

impl fmt::Display for IdentityString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Folding Tests ====================

    #[test]
    fn test_fold_known_prefix() {
        assert_eq!(fold_case("uhCEk"), "uhc$e$k");
        assert_eq!(unfold_case("uhc$e$k").unwrap(), "uhCEk");
    }

    #[test]
    fn test_fold_all_lowercase_is_identity() {
        for s in ["", "abc", "u0-_z", "already-lowercase_123"] {
            assert_eq!(fold_case(s), s);
            assert_eq!(unfold_case(s).unwrap(), s);
        }
    }

    // ==================== Identity Tests ====================

    #[test]
    fn test_example_bytes_roundtrip() {
        let mut bytes = [0u8; HASH_LEN];
        bytes[..3].copy_from_slice(&[0x84, 0x21, 0x24]);
        for (i, b) in bytes[3..].iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37);
        }
        let id = AppletIdentity::from_bytes(&bytes).unwrap();

        let folded = encode(&id);
        assert!(!folded.as_str().chars().any(|c| c.is_ascii_uppercase()));

        let decoded = decode(folded.as_str()).unwrap();
        assert_eq!(decoded.as_bytes(), &bytes);
    }

    #[test]
    fn test_identity_string_url_host() {
        let id = AppletIdentity::from_core([0x80; 32]);
        let folded = encode(&id);
        let host = folded.to_url_host();
        assert!(host.starts_with("uhc%24e%24k"));

        let parsed = IdentityString::from_url_host(&host).unwrap();
        assert_eq!(parsed, folded);
        assert_eq!(parsed.identity().unwrap(), id);
    }

    #[test]
    fn test_identity_string_parse_rejects_garbage() {
        assert!(IdentityString::parse("not-an-identity").is_err());
        assert!(IdentityString::parse("uhc$e$k").is_err());
        assert_eq!(
            IdentityString::parse("UHCEK"),
            Err(MalformedIdentity::UnfoldedUppercase('U'))
        );
    }

    #[test]
    fn test_agent_key_is_not_an_applet() {
        let agent = AgentKey::from_core([2; 32]);
        let folded = fold_case(&agent.to_b64());
        assert_eq!(
            decode(&folded),
            Err(MalformedIdentity::WrongKind {
                expected: HashKind::Entry
            })
        );
    }

    #[test]
    fn test_error_display() {
        let e = MalformedIdentity::DanglingMarker(4);
        assert!(e.to_string().contains("byte 4"));
        let e = MalformedIdentity::WrongKind {
            expected: HashKind::Entry,
        };
        assert_eq!(e.to_string(), "hash prefix is not of kind 'entry'");
    }
}
