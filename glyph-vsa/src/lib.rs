//! Balanced ternary hypervectors for hyperdimensional computing.
//!
//! This crate provides the algebra the glyph encoder is built on: a bitsliced
//! ternary vector type, a self-inverse binding operator, weighted bundling,
//! cosine similarity, and portable seeded generation of atomic and level
//! (ordinal) symbols.
//!
//! # Quick Start
//!
//! ```rust
//! use glyph_vsa::random::{derive_seed, random_bipolar};
//! use glyph_vsa::vsa::{bind, unbind, Bundler, cosine_similarity};
//!
//! let dim = 4096;
//! let role = random_bipolar(dim, derive_seed(42, "color", "@role"));
//! let red = random_bipolar(dim, derive_seed(42, "color", "cat:red"));
//!
//! let bound = bind(&role, &red).unwrap();
//! let mut bundler = Bundler::new(dim);
//! bundler.add(&bound).unwrap();
//! let record = bundler.finish();
//!
//! let probe = unbind(&record, &role).unwrap();
//! assert!(cosine_similarity(&probe, &red).unwrap() > 0.99);
//! ```
//!
//! # Representation
//!
//! ```text
//! Value | +plane | -plane
//! ------+--------+-------
//!   +1  |   1    |   0
//!    0  |   0    |   0
//!   -1  |   0    |   1
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

mod error;
mod hypervector;
pub mod level;
pub mod random;
mod trit;
pub mod vsa;

pub use error::{Result, VsaError};
pub use hypervector::Hypervector;
pub use level::LevelChain;
pub use random::SEED_SCHEME;
pub use trit::Trit;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::hypervector::Hypervector;
    pub use crate::level::LevelChain;
    pub use crate::random::{derive_seed, permutation, random_bipolar};
    pub use crate::trit::Trit;
    pub use crate::vsa::{bind, bundle, cosine_similarity, unbind, Bundler};
    pub use crate::{Result, VsaError};
}
