use crate::error::NumeralError;
use std::collections::HashMap;

type Result<T> = std::result::Result<T, NumeralError>;

/// A positional numeral system over a custom alphabet.
///
/// The alphabet is sorted on construction, so `"ba"` and `"ab"` describe the
/// same system and the smallest symbol is always the zero digit. Values are
/// unsigned 32-bit integers; [`encode`](Self::encode) and
/// [`decode`](Self::decode) are exact inverses over `0..=u32::MAX`.
///
/// # Example
///
/// ```rust
/// use portkey_generator::NumeralSystem;
///
/// let hex = NumeralSystem::new(16, "0123456789abcdef", 4).unwrap();
/// assert_eq!(hex.encode(255), "00ff");
/// assert_eq!(hex.decode("00ff").unwrap(), 255);
/// assert_eq!(hex.successor("00ff").unwrap(), "0100");
/// ```
#[derive(Debug, Clone)]
pub struct NumeralSystem {
    base: u32,
    digits: Vec<char>,
    values: HashMap<char, u32>,
    padding: usize,
    /// Length of `encode(u32::MAX)`; no valid numeral is longer.
    max_width: usize,
}

impl NumeralSystem {
    /// Creates a numeral system with `base` digits taken from `alphabet`.
    ///
    /// Encoded values are left-padded with the zero digit to at least
    /// `padding` characters.
    pub fn new(base: u32, alphabet: &str, padding: usize) -> Result<Self> {
        if base < 2 {
            return Err(NumeralError::BaseTooSmall { base });
        }

        let mut digits: Vec<char> = alphabet.chars().collect();
        let count = digits.len();
        if count < base as usize {
            return Err(NumeralError::NotEnoughDigits { base, count });
        }
        if count > base as usize {
            return Err(NumeralError::TooManyDigits { base, count });
        }

        digits.sort_unstable();
        if let Some(pair) = digits.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(NumeralError::DuplicateDigit(pair[0]));
        }

        let values = digits
            .iter()
            .enumerate()
            .map(|(value, &digit)| (digit, value as u32))
            .collect();

        let mut system = Self {
            base,
            digits,
            values,
            padding,
            max_width: 0,
        };
        system.max_width = system.to_digits(u32::MAX).len();
        Ok(system)
    }

    /// Creates a numeral system whose base is the alphabet's length.
    pub fn from_alphabet(alphabet: &str, padding: usize) -> Result<Self> {
        let base = u32::try_from(alphabet.chars().count()).unwrap_or(u32::MAX);
        Self::new(base, alphabet, padding)
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Length of the longest numeral [`decode`](Self::decode) accepts.
    pub fn max_width(&self) -> usize {
        self.max_width
    }

    /// The canonical (sorted) alphabet.
    pub fn alphabet(&self) -> String {
        self.digits.iter().collect()
    }

    /// Encodes `n`, most significant digit first.
    pub fn encode(&self, n: u32) -> String {
        self.render(&self.to_digits(n))
    }

    /// Decodes a numeral produced by [`encode`](Self::encode) or
    /// [`successor`](Self::successor).
    ///
    /// Numerals longer than the encoding of `u32::MAX`, and values above
    /// `u32::MAX`, are rejected with [`NumeralError::Overflow`].
    pub fn decode(&self, numeral: &str) -> Result<u32> {
        let digits = self.parse(numeral)?;
        if digits.len() > self.max_width {
            return Err(NumeralError::Overflow(numeral.to_string()));
        }
        let base = u64::from(self.base);
        let mut value: u64 = 0;
        for digit in digits {
            value = value
                .checked_mul(base)
                .and_then(|v| v.checked_add(u64::from(digit)))
                .filter(|&v| v <= u64::from(u32::MAX))
                .ok_or_else(|| NumeralError::Overflow(numeral.to_string()))?;
        }
        Ok(value as u32)
    }

    /// Returns the numeral one greater than `numeral`, without decoding it.
    ///
    /// The last digit is incremented and carries ripple left. Only when every
    /// digit carries does the result grow by one leading digit, so the
    /// successor of `encode(u32::MAX)` is the encoding of `2^32`, which
    /// [`decode`](Self::decode) rejects as an overflow.
    pub fn successor(&self, numeral: &str) -> Result<String> {
        let mut digits = self.parse(numeral)?;
        self.increment(&mut digits);
        Ok(self.render(&digits))
    }

    /// Digit values of `n`, most significant first, padded with zeros.
    pub(crate) fn to_digits(&self, mut n: u32) -> Vec<u32> {
        let mut digits = Vec::with_capacity(self.padding.max(1));
        loop {
            digits.push(n % self.base);
            n /= self.base;
            if n == 0 {
                break;
            }
        }
        if digits.len() < self.padding {
            digits.resize(self.padding, 0);
        }
        digits.reverse();
        digits
    }

    /// Adds one to a big-endian digit vector in place.
    pub(crate) fn increment(&self, digits: &mut Vec<u32>) {
        for digit in digits.iter_mut().rev() {
            if *digit + 1 < self.base {
                *digit += 1;
                return;
            }
            *digit = 0;
        }
        digits.insert(0, 1);
    }

    pub(crate) fn render(&self, digits: &[u32]) -> String {
        digits.iter().map(|&d| self.digits[d as usize]).collect()
    }

    fn parse(&self, numeral: &str) -> Result<Vec<u32>> {
        if numeral.is_empty() {
            return Err(NumeralError::Empty);
        }
        numeral
            .chars()
            .enumerate()
            .map(|(position, digit)| {
                self.values
                    .get(&digit)
                    .copied()
                    .ok_or(NumeralError::InvalidDigit { digit, position })
            })
            .collect()
    }
}
