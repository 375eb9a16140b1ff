//! OTP secret generation.
//!
//! Two strategies, picked once at startup:
//! - `canned`: uniform draw from a small preset list (demo/test deployments)
//! - `random`: fixed-length uniformly random digits

use anyhow::{Result, ensure};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use std::sync::Arc;

use otp_gate_common::constants::{CODE_LENGTH_RANGE, PRESET_CODES};

/// Produces the secret for a freshly issued challenge
pub trait OtpGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Which generator the service runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorMode {
    #[default]
    Canned,
    Random,
}

/// Draws uniformly from a fixed set of codes
#[derive(Debug, Clone)]
pub struct CannedGenerator {
    codes: Vec<String>,
}

impl CannedGenerator {
    pub fn new(codes: Vec<String>) -> Result<Self> {
        ensure!(!codes.is_empty(), "canned code set must not be empty");
        ensure!(
            codes.iter().all(|c| {
                CODE_LENGTH_RANGE.contains(&c.len()) && c.chars().all(|ch| ch.is_ascii_digit())
            }),
            "canned codes must be digit strings of {} to {} digits",
            CODE_LENGTH_RANGE.start(),
            CODE_LENGTH_RANGE.end()
        );
        Ok(Self { codes })
    }
}

impl Default for CannedGenerator {
    fn default() -> Self {
        Self {
            codes: PRESET_CODES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl OtpGenerator for CannedGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        // Non-empty by construction
        self.codes.choose(&mut rng).cloned().unwrap_or_default()
    }
}

/// Uniformly random decimal digits of a fixed length
#[derive(Debug, Clone, Copy)]
pub struct RandomDigitGenerator {
    length: usize,
}

impl RandomDigitGenerator {
    pub fn new(length: usize) -> Result<Self> {
        ensure!(
            CODE_LENGTH_RANGE.contains(&length),
            "code length must be between {} and {}, got {}",
            CODE_LENGTH_RANGE.start(),
            CODE_LENGTH_RANGE.end(),
            length
        );
        Ok(Self { length })
    }
}

impl OtpGenerator for RandomDigitGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..self.length)
            .map(|_| (b'0' + rng.random_range(0..10u8)) as char)
            .collect()
    }
}

/// Build the generator selected by configuration
pub fn build_generator(
    mode: GeneratorMode,
    canned_codes: &[String],
    code_length: usize,
) -> Result<Arc<dyn OtpGenerator>> {
    let generator: Arc<dyn OtpGenerator> = match mode {
        GeneratorMode::Canned => Arc::new(CannedGenerator::new(canned_codes.to_vec())?),
        GeneratorMode::Random => Arc::new(RandomDigitGenerator::new(code_length)?),
    };
    Ok(generator)
}

#[cfg(test)]
pub use fixtures::{FixedGenerator, SequenceGenerator};
