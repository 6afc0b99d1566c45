use std::fmt;
use std::str::FromStr;

/// Length in bytes of the canonical wire form of an [`Identity`].
pub const IDENTITY_LEN: usize = 32;

/// A participant's Ed25519 public key in its canonical 32-byte form.
///
/// Identities are value-typed and freely copied; the textual form used in
/// logs, config files and hash-table keys is lowercase hex.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Identity {
    bytes: [u8; IDENTITY_LEN],
}

impl Identity {
    pub const fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Identity { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.bytes
    }

    /// Lowercase hex encoding used on disk, in logs and as hash-table keys.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// `true` if `self`'s raw bytes compare smaller than `other`'s — the
    /// lexicographic rule that assigns the client/server roles of the
    /// session-key exchange in `zsm-crypto`.
    pub fn is_client_role_against(&self, other: &Identity) -> bool {
        self.bytes < other.bytes
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Identity[{}]", self.to_hex())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; IDENTITY_LEN]> for Identity {
    fn from(bytes: [u8; IDENTITY_LEN]) -> Self {
        Identity { bytes }
    }
}

impl AsRef<[u8]> for Identity {
    fn as_ref(&self) -> &[u8] {
        &self.bytes[..]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityParseError {
    #[error("identity must be exactly {IDENTITY_LEN} bytes, got {0}")]
    WrongLength(usize),
    #[error("invalid hex encoding: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl FromStr for Identity {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = hex::decode(s)?;
        if decoded.len() != IDENTITY_LEN {
            return Err(IdentityParseError::WrongLength(decoded.len()));
        }
        let mut bytes = [0u8; IDENTITY_LEN];
        bytes.copy_from_slice(&decoded);
        Ok(Identity { bytes })
    }
}

impl TryFrom<&[u8]> for Identity {
    type Error = IdentityParseError;

    fn try_from(v: &[u8]) -> Result<Self, Self::Error> {
        if v.len() != IDENTITY_LEN {
            return Err(IdentityParseError::WrongLength(v.len()));
        }
        let mut bytes = [0u8; IDENTITY_LEN];
        bytes.copy_from_slice(v);
        Ok(Identity { bytes })
    }
}

#[cfg(any(test, feature = "testing"))]
mod rand_support {
    use super::{Identity, IDENTITY_LEN};
    use rand::distributions::{Distribution, Standard};
    use rand::Rng;

    impl Distribution<Identity> for Standard {
        fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Identity {
            let mut bytes = [0u8; IDENTITY_LEN];
            rng.fill(&mut bytes);
            Identity { bytes }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let id = Identity::from_bytes([7u8; 32]);
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
        let parsed: Identity = hex.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("abcd".parse::<Identity>().is_err());
    }

    #[test]
    fn role_assignment_is_antisymmetric() {
        let a = Identity::from_bytes([1u8; 32]);
        let b = Identity::from_bytes([2u8; 32]);
        assert!(a.is_client_role_against(&b));
        assert!(!b.is_client_role_against(&a));
    }
}
