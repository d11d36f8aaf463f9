use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bucket {
	A,
	B,
}
impl Bucket {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::A => "A",
			Self::B => "B",
		}
	}
}
impl fmt::Display for Bucket {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Bucket {
	type Err = UnknownBucket;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			"A" | "a" => Ok(Self::A),
			"B" | "b" => Ok(Self::B),
			other => Err(UnknownBucket(other.to_string())),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBucket(pub String);
impl fmt::Display for UnknownBucket {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Unknown bucket {:?}.", self.0)
	}
}
impl std::error::Error for UnknownBucket {}

/// Maps a caller identity to a stable 50/50 experiment bucket.
///
/// The first byte of the identity's SHA-256 digest picks the bucket, so the result is the same on
/// every call, every restart, and every instance. An empty identity gets `default_bucket`.
pub fn assign(identity: &str, default_bucket: Bucket) -> Bucket {
	if identity.is_empty() {
		return default_bucket;
	}

	let digest = Sha256::digest(identity.as_bytes());

	if digest[0] < 0x80 { Bucket::A } else { Bucket::B }
}
