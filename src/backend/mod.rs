//! Backend module - Code generation

pub mod codegen;
pub mod riscv;

pub use codegen::CodeGen;
pub use riscv::RiscvCodeGen;
