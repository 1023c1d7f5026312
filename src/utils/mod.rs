//! Utility module

mod span;
mod error;

pub use span::Span;
pub use error::{Error, Result};
#[cfg(test)]
pub use error::Category;
