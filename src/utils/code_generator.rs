//! Base-62 short code generation.
//!
//! Codes are drawn as a single uniformly random integer in `[0, 62^len)` from the
//! operating system CSPRNG and then written out in base 62, left-padded with the
//! zero symbol (`a`). Drawing the whole integer at once keeps the distribution
//! exactly uniform over the keyspace.

use std::collections::HashSet;

/// Symbol order used for encoding; index 0 (`a`) is the padding symbol.
pub const BASE62_ALPHABET: &[u8; 62] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Shortest code the generator will produce.
pub const MIN_CODE_LENGTH: usize = 4;

/// Longest code the generator will produce.
pub const MAX_CODE_LENGTH: usize = 12;

/// Length used when nothing else is configured.
pub const DEFAULT_CODE_LENGTH: usize = 7;

const BASE: u128 = 62;

/// Upper bound on rejection-sampling rounds. Each round accepts with
/// probability above one half, so hitting this means the entropy source is broken.
const MAX_SAMPLING_ROUNDS: usize = 128;

/// Errors raised while producing codes.
#[derive(Debug, thiserror::Error)]
pub enum CodeGenerationError {
    #[error("code length must be between {MIN_CODE_LENGTH} and {MAX_CODE_LENGTH}, got {0}")]
    InvalidLength(usize),

    #[error("batch size must be greater than zero")]
    InvalidBatchSize,

    #[error("secure random source failed: {0}")]
    RandomSource(String),
}

/// Fixed-length code generator.
///
/// Immutable once built. Growing the code length means building a new
/// generator, see [`CodeGenerator::grown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeGenerator {
    length: usize,
}

impl CodeGenerator {
    /// Creates a generator for codes of exactly `length` characters.
    ///
    /// # Errors
    ///
    /// Returns [`CodeGenerationError::InvalidLength`] outside `4..=12`.
    pub fn new(length: usize) -> Result<Self, CodeGenerationError> {
        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&length) {
            return Err(CodeGenerationError::InvalidLength(length));
        }
        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of distinct codes at this length (`62^length`).
    pub fn keyspace_size(&self) -> u128 {
        BASE.pow(self.length as u32)
    }

    /// Returns a generator one symbol longer, or `None` at the maximum length.
    pub fn grown(&self) -> Option<Self> {
        (self.length < MAX_CODE_LENGTH).then(|| Self {
            length: self.length + 1,
        })
    }

    /// Generates one code.
    ///
    /// # Errors
    ///
    /// Returns [`CodeGenerationError::RandomSource`] if the OS random source fails.
    pub fn generate(&self) -> Result<String, CodeGenerationError> {
        let value = random_below(self.keyspace_size())?;
        Ok(encode_fixed(value, self.length))
    }

    /// Generates `count` distinct codes.
    ///
    /// Uniqueness holds within the batch only; the store is never consulted.
    ///
    /// # Errors
    ///
    /// Returns [`CodeGenerationError::InvalidBatchSize`] for `count == 0`, or a
    /// random source failure.
    pub fn generate_batch(&self, count: usize) -> Result<Vec<String>, CodeGenerationError> {
        if count == 0 {
            return Err(CodeGenerationError::InvalidBatchSize);
        }

        let mut seen = HashSet::with_capacity(count);
        let mut codes = Vec::with_capacity(count);

        while codes.len() < count {
            let code = self.generate()?;
            if seen.insert(code.clone()) {
                codes.push(code);
            }
        }

        Ok(codes)
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_CODE_LENGTH,
        }
    }
}

/// Checks that `code` could have come from the generator: 4 to 12 characters,
/// all from the base-62 alphabet.
pub fn is_valid_code(code: &str) -> bool {
    (MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&code.len())
        && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Draws a uniform integer in `[0, bound)` by masking random `u128`s down to the
/// bit width of `bound - 1` and rejecting values out of range.
fn random_below(bound: u128) -> Result<u128, CodeGenerationError> {
    debug_assert!(bound > 1);

    let bits = u128::BITS - (bound - 1).leading_zeros();
    let mask = if bits >= u128::BITS {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    };

    for _ in 0..MAX_SAMPLING_ROUNDS {
        let mut buffer = [0u8; 16];
        getrandom::fill(&mut buffer)
            .map_err(|e| CodeGenerationError::RandomSource(e.to_string()))?;

        let candidate = u128::from_le_bytes(buffer) & mask;
        if candidate < bound {
            return Ok(candidate);
        }
    }

    Err(CodeGenerationError::RandomSource(
        "rejection sampling did not converge".to_string(),
    ))
}

/// Writes `value` in base 62 using exactly `length` symbols.
fn encode_fixed(mut value: u128, length: usize) -> String {
    let mut symbols = vec![BASE62_ALPHABET[0]; length];

    for slot in symbols.iter_mut().rev() {
        if value == 0 {
            break;
        }
        *slot = BASE62_ALPHABET[(value % BASE) as usize];
        value /= BASE;
    }

    symbols.into_iter().map(char::from).collect()
}
