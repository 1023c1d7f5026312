//! RISC-V backend

pub mod label;
pub mod register;
pub mod riscv_codegen;

pub use riscv_codegen::RiscvCodeGen;
