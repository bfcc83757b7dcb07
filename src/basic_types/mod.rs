pub(crate) mod random;
pub(crate) mod trail;

pub use random::Random;
#[cfg(test)]
pub(crate) use random::tests::TestRandom;
pub(crate) use trail::Trail;
