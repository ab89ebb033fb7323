//! Vector Symbolic Architecture operations on ternary hypervectors.
//!
//! - **Bind**: element-wise product, its own inverse on dense keys
//! - **Bundle**: weighted integer vote, thresholded by sign
//! - **Similarity**: cosine and Hamming measures for retrieval
//!
//! ## References
//!
//! - Kanerva, P. "Hyperdimensional Computing: An Introduction"
//! - Gayler, R.W. "Vector Symbolic Architectures"

mod bind;
mod bundle;
mod similarity;

pub use bind::{bind, bind_many, unbind};
pub use bundle::{bundle, majority_trit, Bundler};
pub use similarity::{cosine_similarity, hamming_distance};
