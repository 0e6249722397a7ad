//! Random short code generation.
//!
//! Codes are not unique by construction; callers run a bounded
//! check-and-insert loop against the store, which is the authoritative
//! arbiter under concurrency.

/// 62-symbol alphabet: upper, lower, digits.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Default code length.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Default bound on generate-and-insert attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator {
    length: usize,
}

impl CodeGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Generate one candidate code.
    pub fn generate(&self) -> String {
        use rand::Rng;
        let mut rng = rand::rng();
        (0..self.length)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_fixed_length_alphanumeric() {
        let generator = CodeGenerator::default();
        for _ in 0..100 {
            let code = generator.generate();
            assert_eq!(code.len(), DEFAULT_CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn respects_configured_length() {
        let generator = CodeGenerator::new(12);
        assert_eq!(generator.generate().len(), 12);
    }
}
