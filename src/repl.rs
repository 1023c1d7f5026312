//! Interactive read-compile-print loop
//!
//! Each line is compiled on its own, in test mode, against a resolver that
//! lives as long as the session, so globals, types and functions declared on
//! earlier lines stay visible.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::driver::{self, ErrorFormat, Options};
use crate::frontend::Resolver;

const PROMPT: &str = ">> ";

pub struct Session {
    resolver: Resolver,
}

impl Session {
    pub fn new() -> Self {
        Self { resolver: Resolver::new() }
    }

    /// Compile one line, returning its assembly
    pub fn eval(&mut self, line: &str) -> Result<String, driver::Errors> {
        let program = driver::analyze(&mut self.resolver, line)?;
        driver::generate(&self.resolver, &program, Options { test_mode: true })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the loop until end of input
pub fn run<R: BufRead, W: Write>(input: R, mut output: W, format: ErrorFormat) -> Result<()> {
    let mut session = Session::new();
    write!(output, "{}", PROMPT)?;
    output.flush()?;

    for line in input.lines() {
        let line = line.context("failed to read from stdin")?;
        if !line.trim().is_empty() {
            match session.eval(&line) {
                Ok(asm) => write!(output, "{}", asm)?,
                Err(errors) => driver::report(&errors, None, format),
            }
        }
        write!(output, "{}", PROMPT)?;
        output.flush()?;
    }
    writeln!(output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_persist_between_lines() {
        let mut session = Session::new();
        let first = session.eval("var x int = 2").unwrap();
        assert!(first.contains("x: .dword 0"));

        let second = session.eval("print x").unwrap();
        assert!(second.contains("la t0, x"));
        assert!(!second.contains(".dword"));
    }

    #[test]
    fn test_errors_do_not_end_the_session() {
        let mut session = Session::new();
        assert!(session.eval("print nope").is_err());
        assert!(session.eval("print 1").is_ok());
    }

    #[test]
    fn test_run_loop() {
        let input = "print 1\n\nprint 2\n";
        let mut output = Vec::new();
        run(input.as_bytes(), &mut output, ErrorFormat::Human).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.matches(PROMPT).count(), 4);
        assert_eq!(text.matches("li a7, 1").count(), 2);
    }
}
