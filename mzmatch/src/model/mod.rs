//! The canonical match model every format is normalised into

mod advocate;
mod assumption;
mod charge;
mod modification;
mod peptide;
mod spectrum_id;
mod spectrum_match;

pub use advocate::*;
pub use assumption::*;
pub use charge::*;
pub use modification::*;
pub use peptide::*;
pub use spectrum_id::*;
pub use spectrum_match::*;
