use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

use super::errors::PolicyViolation;

const UPPERCASE: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";
const SPECIAL: &[u8] = b"!@#$%^&*";

/// Base string for the generation fallback; satisfies all four character
/// classes so padding it to any minimum length stays compliant.
const FALLBACK_PASSWORD: &str = "Xq7!mZ2@";

const MAX_GENERATION_ATTEMPTS: usize = 100;

/// Configurable password validation rules.
///
/// Loaded once from configuration at startup and injected by value;
/// never read from ambient global state.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
    /// Optional extra rule expressed as a regular expression.
    #[serde(default)]
    pub custom_pattern: Option<String>,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            custom_pattern: None,
        }
    }
}

impl PasswordPolicy {
    /// Validate a candidate password against every enabled rule.
    ///
    /// Rules are checked in a fixed order and the first violation is
    /// returned; its `Display` form is the user-facing reason.
    ///
    /// # Errors
    /// * `PolicyViolation` - The first rule the candidate fails
    pub fn validate(&self, candidate: &str) -> Result<(), PolicyViolation> {
        let length = candidate.chars().count();
        if length < self.min_length {
            return Err(PolicyViolation::TooShort {
                min: self.min_length,
                actual: length,
            });
        }

        if self.require_uppercase && !candidate.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(PolicyViolation::MissingUppercase);
        }

        if self.require_lowercase && !candidate.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(PolicyViolation::MissingLowercase);
        }

        if self.require_digit && !candidate.chars().any(|c| c.is_ascii_digit()) {
            return Err(PolicyViolation::MissingDigit);
        }

        if self.require_special && !candidate.chars().any(|c| c.is_ascii_punctuation()) {
            return Err(PolicyViolation::MissingSpecial);
        }

        if let Some(pattern) = &self.custom_pattern {
            // An uncompilable pattern fails closed: the candidate is
            // rejected rather than the rule silently skipped.
            let matched = regex::Regex::new(pattern)
                .map(|re| re.is_match(candidate))
                .unwrap_or(false);
            if !matched {
                return Err(PolicyViolation::PatternMismatch);
            }
        }

        Ok(())
    }

    /// Generate a temporary password satisfying every enabled rule.
    ///
    /// Draws one mandatory character from each required class, pads to
    /// the minimum length from the union of enabled classes, shuffles,
    /// and re-validates. Bounded retries; falls back to a hardcoded
    /// compliant constant padded to the minimum length. Never fails.
    pub fn generate_temporary_password(&self) -> String {
        let mut rng = rand::thread_rng();

        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let mut chars: Vec<char> = Vec::with_capacity(self.min_length);
            let mut pool: Vec<u8> = Vec::new();

            for (required, class) in [
                (self.require_uppercase, UPPERCASE),
                (self.require_lowercase, LOWERCASE),
                (self.require_digit, DIGITS),
                (self.require_special, SPECIAL),
            ] {
                if required {
                    if let Some(c) = class.choose(&mut rng) {
                        chars.push(*c as char);
                    }
                    pool.extend_from_slice(class);
                }
            }

            if pool.is_empty() {
                pool.extend_from_slice(LOWERCASE);
            }

            while chars.len() < self.min_length {
                let idx = rng.gen_range(0..pool.len());
                chars.push(pool[idx] as char);
            }

            chars.shuffle(&mut rng);
            let candidate: String = chars.into_iter().collect();

            if self.validate(&candidate).is_ok() {
                return candidate;
            }
        }

        let mut fallback = String::from(FALLBACK_PASSWORD);
        while fallback.chars().count() < self.min_length {
            fallback.push('a');
        }
        fallback
    }
}
