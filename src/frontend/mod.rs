//! Frontend module - Lexer, Parser, Name Resolution, Type Checking

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod symbol;
pub mod resolver;
pub mod checker;

pub use resolver::Resolver;
