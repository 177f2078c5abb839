use thiserror::Error;

/// Validation failures of a numeral system or of a numeral handed to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumeralError {
    #[error("base must be at least 2, got {base}")]
    BaseTooSmall { base: u32 },
    #[error("not enough digits for base {base}: got {count}")]
    NotEnoughDigits { base: u32, count: usize },
    #[error("too many digits for base {base}: got {count}")]
    TooManyDigits { base: u32, count: usize },
    #[error("all digits must be unique, '{0}' appears more than once")]
    DuplicateDigit(char),
    #[error("numeral is empty")]
    Empty,
    #[error("invalid digit '{digit}' at position {position}")]
    InvalidDigit { digit: char, position: usize },
    #[error("numeral '{0}' does not fit in 32 bits")]
    Overflow(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeSpaceError {
    #[error(transparent)]
    Numeral(#[from] NumeralError),
    #[error("code width must be at least 1")]
    ZeroWidth,
    #[error("base {base} with width {width} exceeds the 32-bit code space")]
    TooWide { base: u32, width: usize },
    #[error("code space of {size} codes exceeds the pool limit of {limit}")]
    TooLarge { size: u64, limit: u64 },
}
