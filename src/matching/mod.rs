pub mod similarity;

pub use similarity::{normalize, similarity};
