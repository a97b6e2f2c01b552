//! Typed 39-byte content hashes.
//!
//! Every hash is laid out as a 3-byte type prefix, a 32-byte core and a
//! 4-byte location. Its canonical text form is the multibase prefix `u`
//! followed by the URL-safe, unpadded base64 of all 39 bytes, which is why
//! the text is case-sensitive and needs folding before it can live in a URL
//! authority (see [`crate::encode`]).

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::MalformedIdentity;

/// Total length of a hash in bytes.
pub const HASH_LEN: usize = 39;

/// Length of the hash core (the digest or public key).
pub const CORE_LEN: usize = 32;

const PREFIX_LEN: usize = 3;

/// Multibase marker for URL-safe unpadded base64.
pub const MULTIBASE_PREFIX: char = 'u';

/// The kind of content a hash names, read from its 3-byte prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKind {
    /// An entry hash. Applet identities are entry hashes.
    Entry,
    /// An agent public key.
    Agent,
    /// A DNA hash. Groups are identified by their DNA hash.
    Dna,
    /// An action hash, such as the one naming an asset relation.
    Action,
}

impl HashKind {
    /// The 3-byte prefix that marks this kind.
    pub const fn prefix(self) -> [u8; PREFIX_LEN] {
        match self {
            HashKind::Entry => [0x84, 0x21, 0x24],
            HashKind::Agent => [0x84, 0x20, 0x24],
            HashKind::Dna => [0x84, 0x2d, 0x24],
            HashKind::Action => [0x84, 0x29, 0x24],
        }
    }

    /// Look up the kind for a prefix.
    pub fn from_prefix(prefix: &[u8]) -> Option<Self> {
        [HashKind::Entry, HashKind::Agent, HashKind::Dna, HashKind::Action]
            .into_iter()
            .find(|kind| kind.prefix() == prefix)
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKind::Entry => write!(f, "entry"),
            HashKind::Agent => write!(f, "agent"),
            HashKind::Dna => write!(f, "dna"),
            HashKind::Action => write!(f, "action"),
        }
    }
}

/// An untyped 39-byte hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHash([u8; HASH_LEN]);

impl RawHash {
    /// Build a hash of the given kind from its core, computing the location.
    pub fn from_core(kind: HashKind, core: [u8; CORE_LEN]) -> Self {
        let mut bytes = [0u8; HASH_LEN];
        bytes[..PREFIX_LEN].copy_from_slice(&kind.prefix());
        bytes[PREFIX_LEN..PREFIX_LEN + CORE_LEN].copy_from_slice(&core);
        bytes[PREFIX_LEN + CORE_LEN..].copy_from_slice(&location(&core));
        Self(bytes)
    }

    /// Wrap raw bytes. Only the length is checked.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MalformedIdentity> {
        let array: [u8; HASH_LEN] =
            bytes
                .try_into()
                .map_err(|_| MalformedIdentity::InvalidLength {
                    expected: HASH_LEN,
                    found: bytes.len(),
                })?;
        Ok(Self(array))
    }

    /// Parse the canonical `u`-prefixed base64 form.
    pub fn from_b64(text: &str) -> Result<Self, MalformedIdentity> {
        let body = text
            .strip_prefix(MULTIBASE_PREFIX)
            .ok_or(MalformedIdentity::MissingMultibasePrefix)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| MalformedIdentity::InvalidBase64(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// The canonical `u`-prefixed base64 form.
    pub fn to_b64(&self) -> String {
        format!("{}{}", MULTIBASE_PREFIX, URL_SAFE_NO_PAD.encode(self.0))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// The kind named by the prefix, if it is a known one.
    pub fn kind(&self) -> Option<HashKind> {
        HashKind::from_prefix(&self.0[..PREFIX_LEN])
    }

    /// The 32-byte core.
    pub fn core(&self) -> &[u8] {
        &self.0[PREFIX_LEN..PREFIX_LEN + CORE_LEN]
    }
}

impl fmt::Debug for RawHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHash({})", self.to_b64())
    }
}

impl fmt::Display for RawHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_b64())
    }
}

impl FromStr for RawHash {
    type Err = MalformedIdentity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_b64(s)
    }
}

impl Serialize for RawHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_b64())
    }
}

impl<'de> Deserialize<'de> for RawHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_b64(&text).map_err(serde::de::Error::custom)
    }
}

/// XOR-fold the core into four location bytes.
fn location(core: &[u8; CORE_LEN]) -> [u8; 4] {
    let mut out = [0u8; 4];
    for (i, byte) in core.iter().enumerate() {
        out[i % 4] ^= byte;
    }
    out
}

macro_rules! typed_hash {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(RawHash);

        impl $name {
            /// The kind every value of this type carries.
            pub const KIND: HashKind = $kind;

            /// Build from a 32-byte core.
            pub fn from_core(core: [u8; CORE_LEN]) -> Self {
                Self(RawHash::from_core(Self::KIND, core))
            }

            /// Check that a raw hash has the right prefix.
            pub fn from_raw(raw: RawHash) -> Result<Self, MalformedIdentity> {
                match raw.kind() {
                    Some(kind) if kind == Self::KIND => Ok(Self(raw)),
                    _ => Err(MalformedIdentity::WrongKind {
                        expected: Self::KIND,
                    }),
                }
            }

            pub fn from_bytes(bytes: &[u8]) -> Result<Self, MalformedIdentity> {
                Self::from_raw(RawHash::from_bytes(bytes)?)
            }

            pub fn as_raw(&self) -> &RawHash {
                &self.0
            }

            pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
                self.0.as_bytes()
            }

            pub fn core(&self) -> &[u8] {
                self.0.core()
            }

            /// The canonical `u`-prefixed base64 form.
            pub fn to_b64(&self) -> String {
                self.0.to_b64()
            }
        }

        impl FromStr for $name {
            type Err = MalformedIdentity;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_raw(RawHash::from_b64(s)?)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_b64())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_b64())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_b64())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

typed_hash!(
    /// The content hash identifying one installed applet instance.
    AppletIdentity,
    HashKind::Entry
);

typed_hash!(
    /// An agent's public signing key.
    AgentKey,
    HashKind::Agent
);

typed_hash!(
    /// The hash of a DNA; groups are identified by theirs.
    DnaHash,
    HashKind::Dna
);
