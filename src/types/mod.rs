//! Types module

pub mod type_system;

pub use type_system::{Field, Signature, Type, WORD_SIZE};
