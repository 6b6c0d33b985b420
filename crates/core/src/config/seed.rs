use derive_more::Display;
use fnv::FnvHasher;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use thiserror::Error;

/// Seed for the map generation RNG. Every random decision made during a
/// generation run (variant picks, direction picks, scatter positions, cosmetic
/// options) is derived from this one value, via [Seed::rng].
///
/// Seeds can be given as:
/// - An integer that fits into `u64` (32-bit seeds convert losslessly)
/// - A string that parses as a `u64`, which is treated as that integer
/// - Any other string, which is kept as text and hashed when the RNG is built
///
/// A seed always serializes as a **string**, since JSON and TOML can't
/// reliably hold the full `u64` range. Deserializing that string gives back an
/// identical seed.
#[derive(Clone, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SeedInput", into = "String")]
pub enum Seed {
    /// A numeric seed, used as-is
    Int(u64),
    /// A textual seed, hashed into a `u64` before use
    Text(String),
}

impl Seed {
    /// Get a random seed. Two calls will (almost certainly) give different
    /// seeds.
    pub fn random() -> Self {
        Self::Int(rand::random())
    }

    /// The `u64` that the RNG gets seeded with. Text is hashed byte-wise with
    /// 64-bit FNV-1a, so the result is stable across platforms and releases.
    pub fn to_u64(&self) -> u64 {
        match self {
            Self::Int(seed) => *seed,
            Self::Text(text) => {
                let mut hasher = FnvHasher::default();
                hasher.write(text.as_bytes());
                hasher.finish()
            }
        }
    }

    /// A fresh RNG for this seed. Every call starts the same sequence over.
    pub fn rng(&self) -> Pcg64 {
        Pcg64::seed_from_u64(self.to_u64())
    }
}

impl Default for Seed {
    fn default() -> Self {
        Self::random()
    }
}

impl From<u64> for Seed {
    fn from(seed: u64) -> Self {
        Self::Int(seed)
    }
}

impl From<u32> for Seed {
    fn from(seed: u32) -> Self {
        Self::Int(seed.into())
    }
}

// Numeric strings become ints, anything else is kept as text
impl From<&str> for Seed {
    fn from(seed_str: &str) -> Self {
        match seed_str.parse::<u64>() {
            Ok(seed) => Self::Int(seed),
            Err(_) => Self::Text(seed_str.into()),
        }
    }
}

impl From<&Seed> for u64 {
    fn from(seed: &Seed) -> Self {
        seed.to_u64()
    }
}

impl From<Seed> for String {
    fn from(seed: Seed) -> Self {
        seed.to_string()
    }
}

/// Anything a seed can be written as in a config file. Variants are tried in
/// order, so non-negative ints never reach [Self::Signed].
#[derive(Deserialize)]
#[serde(untagged)]
pub enum SeedInput {
    Unsigned(u64),
    Signed(i64),
    Text(String),
}

#[derive(Debug, Error)]
#[error("seed must not be negative, got {0}")]
pub struct NegativeSeed(i64);

impl TryFrom<SeedInput> for Seed {
    type Error = NegativeSeed;

    fn try_from(input: SeedInput) -> Result<Self, Self::Error> {
        match input {
            SeedInput::Unsigned(seed) => Ok(Self::Int(seed)),
            SeedInput::Signed(seed) => Err(NegativeSeed(seed)),
            SeedInput::Text(text) => Ok(text.as_str().into()),
        }
    }
}
