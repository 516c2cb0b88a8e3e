//! Search helpers: accent-insensitive matching, list filters, medication
//! suggestions and the latest-wins debounced search task.

mod normalizer;
mod filter;
mod latest;
mod medications;

pub use normalizer::*;
pub use filter::*;
pub use latest::*;
pub use medications::*;
