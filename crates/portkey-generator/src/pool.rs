use crate::error::CodeSpaceError;
use crate::numeral::NumeralSystem;
use crate::Generator;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

/// Largest code space [`CodeSpace::enumerate`] will materialize by default.
pub const DEFAULT_MAX_POOL_SIZE: u64 = 1 << 24;

/// Configures a [`CodeSpace`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct CodeSpaceSettings {
    /// Symbols codes are built from; its length is the base.
    #[builder(setter(into))]
    pub alphabet: String,
    /// Exact length of every code in the space.
    pub width: usize,
    /// Upper bound on the number of codes held in memory at once.
    #[builder(default = DEFAULT_MAX_POOL_SIZE)]
    pub max_pool_size: u64,
    /// Threads used to enumerate the space. Defaults to the available
    /// parallelism.
    #[builder(default, setter(strip_option))]
    pub workers: Option<usize>,
}

/// Every code of a fixed width over a fixed alphabet.
///
/// Codes are the `width`-padded encodings of `0..size`, where
/// `size = base^width`, so listing them in order is a matter of counting.
#[derive(Debug, Clone)]
pub struct CodeSpace {
    numeral: NumeralSystem,
    width: usize,
    size: u64,
    max_pool_size: u64,
    workers: usize,
}

impl CodeSpace {
    pub fn new(settings: CodeSpaceSettings) -> Result<Self, CodeSpaceError> {
        if settings.width == 0 {
            return Err(CodeSpaceError::ZeroWidth);
        }
        let numeral = NumeralSystem::from_alphabet(&settings.alphabet, settings.width)?;

        let too_wide = CodeSpaceError::TooWide {
            base: numeral.base(),
            width: settings.width,
        };
        let exponent = u32::try_from(settings.width).map_err(|_| too_wide.clone())?;
        let size = u64::from(numeral.base())
            .checked_pow(exponent)
            .filter(|&size| size <= u64::from(u32::MAX) + 1)
            .ok_or(too_wide)?;

        let workers = settings
            .workers
            .filter(|&w| w > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .unwrap_or(1)
            });

        Ok(Self {
            numeral,
            width: settings.width,
            size,
            max_pool_size: settings.max_pool_size,
            workers,
        })
    }

    pub fn numeral(&self) -> &NumeralSystem {
        &self.numeral
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of distinct codes in the space.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether `code` is one of the codes this space enumerates.
    pub fn contains(&self, code: &str) -> bool {
        code.chars().count() == self.width && self.numeral.decode(code).is_ok()
    }

    /// Lists every code in ascending order.
    ///
    /// The range is split into one contiguous window per worker. Each worker
    /// encodes the first value of its window once and then steps through the
    /// rest by incrementing digits, writing into its own slice of the output.
    pub fn enumerate(&self) -> Result<Vec<String>, CodeSpaceError> {
        if self.size > self.max_pool_size {
            return Err(CodeSpaceError::TooLarge {
                size: self.size,
                limit: self.max_pool_size,
            });
        }

        let size = self.size as usize;
        let mut codes = vec![String::new(); size];
        let window = size.div_ceil(self.workers).max(1);

        std::thread::scope(|scope| {
            for (i, chunk) in codes.chunks_mut(window).enumerate() {
                let numeral = &self.numeral;
                let start = (i * window) as u32;
                scope.spawn(move || fill_window(numeral, start, chunk));
            }
        });

        debug!(size, workers = self.workers, "enumerated code space");
        Ok(codes)
    }
}

fn fill_window(numeral: &NumeralSystem, start: u32, out: &mut [String]) {
    let mut digits = numeral.to_digits(start);
    let last = out.len().saturating_sub(1);
    for (offset, slot) in out.iter_mut().enumerate() {
        *slot = numeral.render(&digits);
        if offset < last {
            numeral.increment(&mut digits);
        }
    }
}

/// The shuffled set of codes that have not been issued yet.
///
/// Built once from a full [`CodeSpace`] listing minus the codes already in
/// use. Codes are handed out from the end of the shuffled list, so each one
/// is issued at most once and issuing is O(1) regardless of how full the
/// space is.
#[derive(Debug)]
pub struct CodePool {
    codes: Mutex<Vec<String>>,
}

impl CodePool {
    /// Enumerates `space`, drops the `issued` codes and shuffles the rest.
    pub fn build(space: &CodeSpace, issued: &HashSet<String>) -> Result<Self, CodeSpaceError> {
        let codes = space.enumerate()?;
        Ok(Self::from_codes(codes, issued, &mut rand::thread_rng()))
    }

    /// Builds a pool from an existing listing.
    ///
    /// Issued codes are removed in place (the survivors keep their order),
    /// then the remainder is shuffled with `rng`.
    pub fn from_codes<R: Rng + ?Sized>(
        mut codes: Vec<String>,
        issued: &HashSet<String>,
        rng: &mut R,
    ) -> Self {
        let listed = codes.len();
        if !issued.is_empty() {
            codes.retain(|code| !issued.contains(code));
        }
        codes.shuffle(rng);

        info!(
            listed,
            issued = listed - codes.len(),
            available = codes.len(),
            "built code pool"
        );

        Self {
            codes: Mutex::new(codes),
        }
    }

    /// Takes the next unissued code, or `None` once the pool is exhausted.
    pub fn next(&self) -> Option<String> {
        self.codes.lock().pop()
    }

    /// Removes `code` so it is never handed out; returns whether it was
    /// still in the pool.
    ///
    /// Used when a code is taken by other means after the pool was built.
    /// This is a linear scan over the remaining codes.
    pub fn reserve(&self, code: &str) -> bool {
        let mut codes = self.codes.lock();
        match codes.iter().position(|c| c == code) {
            Some(index) => {
                codes.swap_remove(index);
                debug!(code = %code, "reserved code in pool");
                true
            }
            None => false,
        }
    }

    /// Returns a code taken with [`next`](Self::next) or
    /// [`reserve`](Self::reserve) that ended up unused.
    ///
    /// The code is handed out again by the next call to `next`.
    pub fn release(&self, code: String) {
        debug!(code = %code, "released code back to pool");
        self.codes.lock().push(code);
    }

    /// Codes still available.
    pub fn remaining(&self) -> usize {
        self.codes.lock().len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.codes.lock().is_empty()
    }
}

impl Generator for CodePool {
    fn generate(&self) -> Option<String> {
        self.next()
    }
}
