//! Code Generation trait - Backend abstraction

use crate::frontend::ast::Program;
use crate::frontend::symbol::ScopeTree;
use crate::utils::Result;

/// Code generation backend trait
pub trait CodeGen {
    /// Generate assembly text for a resolved and type-checked program
    fn generate(&mut self, program: &Program, scopes: &ScopeTree) -> Result<String>;

    /// Get the target triple (e.g., "riscv64-unknown-elf")
    fn target_triple(&self) -> &str;

    /// Get the backend name
    fn name(&self) -> &str;
}
