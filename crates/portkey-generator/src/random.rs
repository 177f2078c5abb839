use crate::numeral::NumeralSystem;
use crate::pool::CodeSpace;
use crate::Generator;
use rand::Rng;

/// Draws codes uniformly at random from a [`CodeSpace`].
///
/// Unlike [`CodePool`](crate::CodePool) this keeps no record of what it has
/// handed out, so callers must check candidates against the store and retry
/// on collision.
#[derive(Debug, Clone)]
pub struct RandomCodes {
    numeral: NumeralSystem,
    size: u64,
}

impl RandomCodes {
    pub fn new(space: &CodeSpace) -> Self {
        Self {
            numeral: space.numeral().clone(),
            size: space.size(),
        }
    }

    /// Draws one candidate using `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        // size is at most 2^32, so every value in range fits in a u32
        let n = rng.gen_range(0..self.size) as u32;
        self.numeral.encode(n)
    }
}

impl Generator for RandomCodes {
    fn generate(&self) -> Option<String> {
        Some(self.sample(&mut rand::thread_rng()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::CodeSpaceSettings;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn space(alphabet: &str, width: usize) -> CodeSpace {
        CodeSpace::new(
            CodeSpaceSettings::builder()
                .alphabet(alphabet)
                .width(width)
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn samples_stay_inside_the_space() {
        let space = space("0123456789abcdefghijklmnopqrstuvwxyz", 6);
        let codes = RandomCodes::new(&space);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..1_000 {
            let code = codes.sample(&mut rng);
            assert_eq!(code.len(), 6);
            let n = space.numeral().decode(&code).unwrap();
            assert!(u64::from(n) < space.size());
        }
    }

    #[test]
    fn small_space_is_fully_covered() {
        let space = space("ab", 3);
        let codes = RandomCodes::new(&space);
        let mut rng = StdRng::seed_from_u64(11);

        let seen: HashSet<String> = (0..500).map(|_| codes.sample(&mut rng)).collect();
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn full_32_bit_space_is_sampled_safely() {
        let space = space("01", 32);
        let codes = RandomCodes::new(&space);
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..100 {
            let code = codes.sample(&mut rng);
            assert_eq!(code.len(), 32);
            assert!(space.numeral().decode(&code).is_ok());
        }
    }

    #[test]
    fn generator_never_runs_dry() {
        let codes = RandomCodes::new(&space("xyz", 2));
        for _ in 0..50 {
            assert!(codes.generate().is_some());
        }
    }
}
