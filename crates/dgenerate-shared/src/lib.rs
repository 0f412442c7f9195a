//! # dgenerate-shared
//!
//! Domain vocabulary shared by the store and the server: identifiers,
//! media/difficulty enums, the similarity scorer and the correctness policy.

pub mod constants;
pub mod error;
pub mod policy;
pub mod similarity;
pub mod types;

pub use error::DgenError;
pub use policy::{evaluate, Verdict};
pub use similarity::score;
