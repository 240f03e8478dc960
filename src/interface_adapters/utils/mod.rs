pub mod dump;
pub mod rng;
