//! The ICU capacity planning model: decide beds, activation, acquisition, repair and
//! transfers at every facility under a budget or a demand target.

pub mod constraints;
pub mod model;
pub mod sets;

pub use model::{IcuModel, IcuSolution, Variables};
pub use sets::Sets;
