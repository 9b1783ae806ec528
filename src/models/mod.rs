pub mod icu;
pub mod utils;

pub use icu::{IcuModel, IcuSolution};
