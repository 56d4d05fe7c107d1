//! RUT (Chilean national ID) check-digit validator
//!
//! Mod-11 scheme: the body digits are weighted right to left with
//! multipliers cycling 2..=7, and the check symbol is `11 - sum % 11`,
//! where 11 becomes `0` and 10 becomes `K`.

use crate::validators::*;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

static RUT_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{7,8}[0-9K]$").expect("static RUT pattern"));

/// Why a value is not a valid RUT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChecksumError {
    #[error("invalid length")]
    InvalidLength,

    #[error("invalid format")]
    InvalidFormat,

    #[error("checksum mismatch")]
    ChecksumMismatch,
}

impl ChecksumError {
    /// Sentence shown to the user
    pub fn user_message(&self) -> &'static str {
        match self {
            ChecksumError::InvalidLength => "The RUT has an invalid length.",
            ChecksumError::InvalidFormat => "The RUT has an invalid format.",
            ChecksumError::ChecksumMismatch => "The RUT check digit does not match.",
        }
    }
}

/// The check-digit algorithm itself
pub struct RutChecksum;

impl RutChecksum {
    /// Uppercase and keep only digits and `K`; dots and dashes are dropped
    pub fn normalize(raw: &str) -> String {
        raw.to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == 'K')
            .collect()
    }

    /// Multipliers applied to the body, starting at its last digit
    pub fn multipliers() -> impl Iterator<Item = u32> {
        (2..=7).cycle()
    }

    /// Expected check symbol for a body of ASCII digits
    pub fn check_symbol(body: &str) -> char {
        let sum: u32 = body
            .chars()
            .rev()
            .filter_map(|c| c.to_digit(10))
            .zip(Self::multipliers())
            .map(|(digit, weight)| digit * weight)
            .sum();

        match 11 - (sum % 11) {
            11 => '0',
            10 => 'K',
            d => char::from_digit(d, 10).unwrap_or('0'),
        }
    }

    /// Validate a RUT written with or without dots and dash
    pub fn check(raw: &str) -> Result<(), ChecksumError> {
        let rut = Self::normalize(raw);

        if rut.len() < 8 || rut.len() > 9 {
            return Err(ChecksumError::InvalidLength);
        }

        if !RUT_FORMAT.is_match(&rut) {
            return Err(ChecksumError::InvalidFormat);
        }

        // Format check guarantees a non-empty ASCII body
        let (body, check) = rut.split_at(rut.len() - 1);
        let expected = Self::check_symbol(body);

        if check.starts_with(expected) {
            Ok(())
        } else {
            Err(ChecksumError::ChecksumMismatch)
        }
    }
}

/// Pluggable wrapper around [`RutChecksum`]
pub struct RutValidator;

impl RutValidator {
    pub const NAME: &'static str = "rut";

    pub fn new() -> Self {
        Self
    }
}

impl Default for RutValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityRule for RutValidator {
    async fn validate(&self, identity: &str) -> Result<RuleVerdict, RuleError> {
        match RutChecksum::check(identity) {
            Ok(()) => Ok(RuleVerdict::Pass),
            Err(e) => {
                debug!("RUT rejected: {}", e);
                Ok(RuleVerdict::fail(e.user_message()))
            }
        }
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Builtin
    }
}
