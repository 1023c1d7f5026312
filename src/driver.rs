//! Compilation pipeline and diagnostics reporting
//!
//! Source text goes through the lexer and parser, then the resolver, the
//! checker and the RISC-V code generator. Syntax errors are reported all at
//! once; every later pass stops at its first error.

use std::path::Path;

use clap::ValueEnum;

use crate::backend::{CodeGen, RiscvCodeGen};
use crate::frontend::ast::Program;
use crate::frontend::checker::check;
use crate::frontend::parser::parse;
use crate::frontend::Resolver;
use crate::utils::Error;

/// How errors are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ErrorFormat {
    #[default]
    Human,
    Json,
}

/// Code generation options
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Omit the `__start`/`__end` wrapper
    pub test_mode: bool,
}

pub type Errors = Vec<Error>;

/// Parse, resolve and check `source` with an existing resolver
pub fn analyze(resolver: &mut Resolver, source: &str) -> Result<Program, Errors> {
    let mut program = parse(source)?;
    log::debug!("parsed {} statements", program.stmts.len());
    resolver.resolve(&mut program).map_err(|e| vec![e])?;
    check(resolver.scopes_mut(), &mut program).map_err(|e| vec![e])?;
    Ok(program)
}

/// Check `source` without generating code
pub fn check_source(source: &str) -> Result<(), Errors> {
    analyze(&mut Resolver::new(), source).map(|_| ())
}

/// Compile `source` to assembly text
pub fn compile_source(source: &str, options: Options) -> Result<String, Errors> {
    let mut resolver = Resolver::new();
    let program = analyze(&mut resolver, source)?;
    generate(&resolver, &program, options)
}

/// Run the code generator over an analyzed program
pub fn generate(resolver: &Resolver, program: &Program, options: Options) -> Result<String, Errors> {
    let mut codegen = RiscvCodeGen::new().with_test_mode(options.test_mode);
    log::debug!("generating code with the {} backend for {}", codegen.name(), codegen.target_triple());
    codegen.generate(program, resolver.scopes()).map_err(|e| vec![e])
}

/// Print errors to stderr (human) or stdout (JSON lines)
pub fn report(errors: &[Error], file: Option<&Path>, format: ErrorFormat) {
    for error in errors {
        match format {
            ErrorFormat::Human => {
                let location = match (file, error.span()) {
                    (Some(file), Some(span)) => format!("{}:{}:{}: ", file.display(), span.line, span.column),
                    (Some(file), None) => format!("{}: ", file.display()),
                    (None, Some(span)) => format!("{}:{}: ", span.line, span.column),
                    (None, None) => String::new(),
                };
                eprintln!("{}{}", location, error);
            }
            ErrorFormat::Json => match serde_json::to_string(&error.diagnostic()) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("{} (diagnostic could not be serialized: {})", error, e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_source() {
        let asm = compile_source("var x int = 2\nprint x", Options::default()).unwrap();
        assert!(asm.starts_with(".data\nx: .dword 0\n.text\n.globl __start\n__start:\n"));
        assert!(asm.ends_with("__end:\n    li a7, 10\n    ecall\n"));
    }

    #[test]
    fn test_syntax_errors_are_all_reported() {
        let errors = compile_source("print ;\nprint )", Options::default()).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_type_error_stops_compilation() {
        let errors = compile_source("print 2.0 + 2", Options { test_mode: true }).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category(), crate::utils::Category::Type);
    }

    #[test]
    fn test_check_source() {
        assert!(check_source("func f() int {\nreturn 1\n}\nprint f()").is_ok());
        assert!(check_source("print y").is_err());
    }
}
