//! Readers for all supported identification file formats

mod andromeda;
mod direc_tag;
mod ms_amanda;
mod mzidentml;
mod pepnovo;
mod tide;

pub use andromeda::*;
pub use direc_tag::*;
pub use ms_amanda::*;
pub use mzidentml::*;
pub use pepnovo::*;
pub use tide::*;

#[cfg(test)]
mod andromeda_tests;
#[cfg(test)]
mod direc_tag_tests;
#[cfg(test)]
mod pepnovo_tests;
#[cfg(test)]
mod tide_tests;
