use std::fmt::Debug;
use std::ops::Range;

use rand::Rng;
use rand::SeedableRng;

use crate::linrelax_assert_moderate;

/// Abstraction for randomness, in order to swap out different sources of randomness.
///
/// The cut heuristics draw their row and column choices through this trait so
/// that a propagator instance is reproducible from its seed, and so that tests
/// can substitute a scripted sequence of choices (see [`tests::TestRandom`]).
pub trait Random: Debug {
    /// Generates a bool with probability `probability` of being true. It should hold that
    /// `probability ∈ [0, 1]`; this method will panic if this is not the case.
    fn generate_bool(&mut self, probability: f64) -> bool;

    /// Generates a random usize in the provided range with equal probability; this can be seen as
    /// sampling from a uniform distribution in the range `[range.start, range.end)`.
    fn generate_usize_in_range(&mut self, range: Range<usize>) -> usize;

    /// Generate a random float in the range 0..1.
    fn generate_f64(&mut self) -> f64;

    /// Given a slice of weights, select the index with `weight` weighted probability compared to
    /// the other weights.
    fn get_weighted_choice(&mut self, weights: &[f64]) -> Option<usize>;
}

// We provide a blanket implementation of the trait for any type which implements `SeedableRng`,
// `Rng` and `Debug` to ensure that we can use any "regular" random generator where we expect an
// implementation of Random.
impl<T> Random for T
where
    T: SeedableRng + Rng + Debug,
{
    fn generate_bool(&mut self, probability: f64) -> bool {
        linrelax_assert_moderate!(
            (0.0..=1.0).contains(&probability),
            "It should hold that 0.0 <= {probability} <= 1.0"
        );

        self.gen_bool(probability)
    }

    fn generate_usize_in_range(&mut self, range: Range<usize>) -> usize {
        self.gen_range(range)
    }

    fn generate_f64(&mut self) -> f64 {
        self.gen_range(0.0..1.0)
    }

    fn get_weighted_choice(&mut self, weights: &[f64]) -> Option<usize> {
        if weights.is_empty() {
            return None;
        }

        let sum = weights.iter().sum::<f64>();
        if sum <= 0.0 {
            return Some(self.generate_usize_in_range(0..weights.len()));
        }
        let spin = self.generate_f64() * sum;

        let mut i: usize = 0;
        let mut accumulated_weights = weights[0];

        while accumulated_weights < spin && i + 1 < weights.len() {
            i += 1;
            accumulated_weights += weights[i];
        }

        Some(i)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::fmt::Debug;
    use std::ops::Range;

    use super::Random;
    use crate::linrelax_assert_simple;

    /// A test "random" generator which takes as input a list of elements and returns them in
    /// order. If more values are attempted to be generated than are provided then this will result
    /// in panicking.
    #[derive(Debug, Default)]
    pub(crate) struct TestRandom {
        pub(crate) usizes: Vec<usize>,
        pub(crate) bools: Vec<bool>,
        pub(crate) weighted_choices: Vec<usize>,
    }

    impl Random for TestRandom {
        fn generate_bool(&mut self, _probability: f64) -> bool {
            self.bools.remove(0)
        }

        fn generate_usize_in_range(&mut self, range: Range<usize>) -> usize {
            let selected = self.usizes.remove(0);
            linrelax_assert_simple!(
                range.contains(&selected),
                "The selected element by `TestRandom` ({selected}) is not in the provided range ({range:?})"
            );
            selected
        }

        fn generate_f64(&mut self) -> f64 {
            unimplemented!()
        }

        fn get_weighted_choice(&mut self, weights: &[f64]) -> Option<usize> {
            let selected = self.weighted_choices.remove(0);
            linrelax_assert_simple!(selected < weights.len());
            Some(selected)
        }
    }
}
