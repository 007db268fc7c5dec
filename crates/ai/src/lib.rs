mod error;
mod loader;
mod ort;
mod traits;

pub mod caption;

pub use error::*;
pub use traits::*;
