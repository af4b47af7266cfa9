//! Content digests (`<algorithm>:<hex>`)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Content-addressed identity of a manifest or blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    /// Digest of `data` using sha256
    pub fn sha256_of(data: &[u8]) -> Self {
        Self {
            algorithm: "sha256".to_string(),
            hex: sha256::digest(data),
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    fn parse(value: &str) -> Result<Self> {
        let (algorithm, hex) = value
            .split_once(':')
            .ok_or_else(|| IndexError::InvalidDigest(value.to_string()))?;

        let expected_len = match algorithm {
            "sha256" => 64,
            "sha512" => 128,
            _ => return Err(IndexError::InvalidDigest(value.to_string())),
        };

        let valid_hex = hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if hex.len() != expected_len || !valid_hex {
            return Err(IndexError::InvalidDigest(value.to_string()));
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }
}

impl FromStr for Digest {
    type Err = IndexError;

    /// Accepts a bare digest or a digest reference such as `repo@sha256:...`
    fn from_str(s: &str) -> Result<Self> {
        match s.rsplit_once('@') {
            Some((_, digest)) => Self::parse(digest),
            None => Self::parse(s),
        }
    }
}

impl TryFrom<String> for Digest {
    type Error = IndexError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_string()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "8a4415fb43600953cbdac6ec03c2d96d900bb21f8d78964837dad7f73b9afcdc";

    #[test]
    fn test_parse_bare_digest() {
        let digest: Digest = format!("sha256:{}", HEX).parse().unwrap();
        assert_eq!(digest.algorithm(), "sha256");
        assert_eq!(digest.hex(), HEX);
        assert_eq!(digest.to_string(), format!("sha256:{}", HEX));
    }

    #[test]
    fn test_parse_digest_reference() {
        let digest: Digest = format!("busybox-multi-platform@sha256:{}", HEX)
            .parse()
            .unwrap();
        assert_eq!(digest.hex(), HEX);

        let digest: Digest = format!("localhost:5000/some/repo@sha256:{}", HEX)
            .parse()
            .unwrap();
        assert_eq!(digest.hex(), HEX);
    }

    #[test]
    fn test_parse_invalid() {
        assert!("sha256:abc".parse::<Digest>().is_err());
        assert!("md5:d41d8cd98f00b204e9800998ecf8427e".parse::<Digest>().is_err());
        assert!("repo:latest".parse::<Digest>().is_err());
        assert!(format!("sha256:{}", HEX.to_uppercase())
            .parse::<Digest>()
            .is_err());
    }

    #[test]
    fn test_sha256_of() {
        let digest = Digest::sha256_of(b"");
        assert_eq!(
            digest.to_string(),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_serde_as_string() {
        let digest = Digest::sha256_of(b"index");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest));

        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
        assert!(serde_json::from_str::<Digest>("\"sha256:zz\"").is_err());
    }
}
