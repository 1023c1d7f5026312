//! Name resolution
//!
//! Walks the AST once, creating a symbol table for every scope-introducing
//! node and recording its id on the node. Enforces:
//! - every identifier use refers to a prior definition
//! - no redefinition within a table, no shadowing outside the global table
//!   (a function parameter may shadow a global)
//! - a function has at most one prototype and at most one body
//! - `type` and `func` declarations appear only at top level
//!
//! The resolver owns the scope tree, so a REPL can keep one alive and feed
//! it program after program.

use std::collections::HashMap;

use crate::frontend::ast::*;
use crate::frontend::symbol::{ScopeId, ScopeTree, SymbolScope};
use crate::utils::{Error, Result};

#[derive(Debug)]
pub struct Resolver {
    scopes: ScopeTree,
    /// Functions seen so far; `true` once a body has been given
    prototypes: HashMap<String, bool>,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            scopes: ScopeTree::new(),
            prototypes: HashMap::new(),
        }
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut ScopeTree {
        &mut self.scopes
    }

    /// Resolve a whole program in the global scope
    pub fn resolve(&mut self, program: &mut Program) -> Result<()> {
        let global = self.scopes.global();
        program.scope = Some(global);
        for stmt in &mut program.stmts {
            self.resolve_stmt(global, stmt)?;
        }
        log::debug!("resolved {} top-level statements", program.stmts.len());
        Ok(())
    }

    fn resolve_stmt(&mut self, scope: ScopeId, stmt: &mut Stmt) -> Result<()> {
        match stmt {
            Stmt::Print { value, .. } => self.resolve_expr(scope, value),
            Stmt::Expr(expr) => self.resolve_expr(scope, expr),
            Stmt::Var { name, ty, value, .. } => {
                if let Some(value) = value {
                    self.resolve_expr(scope, value)?;
                }
                self.resolve_type(scope, ty)?;
                self.scopes.define(scope, &name.name, ty.clone(), name.span)
            }
            Stmt::Assign { target, value, .. } => {
                self.resolve_expr(scope, target)?;
                self.resolve_expr(scope, value)
            }
            Stmt::Block(block) => self.resolve_block(scope, block),
            Stmt::If { cond, then_block, else_block, .. } => {
                self.resolve_expr(scope, cond)?;
                self.resolve_block(scope, then_block)?;
                if let Some(else_block) = else_block {
                    self.resolve_block(scope, else_block)?;
                }
                Ok(())
            }
            Stmt::For(for_loop) => self.resolve_for(scope, for_loop),
            Stmt::Type { name, ty, span } => {
                if !self.scopes.is_global(scope) {
                    return Err(Error::NestedDeclaration { what: "type", span: *span });
                }
                self.resolve_type(scope, ty)?;
                self.scopes.define_type(&name.name, ty.clone(), name.span)
            }
            Stmt::Func(func) => self.resolve_function(scope, func),
            Stmt::Return { value, .. } => match value {
                Some(value) => self.resolve_expr(scope, value),
                None => Ok(()),
            },
        }
    }

    fn resolve_block(&mut self, parent: ScopeId, block: &mut Block) -> Result<()> {
        let scope = self.scopes.enclose(parent);
        block.scope = Some(scope);
        for stmt in &mut block.stmts {
            self.resolve_stmt(scope, stmt)?;
        }
        self.scopes.compute_stack(scope);
        Ok(())
    }

    fn resolve_for(&mut self, parent: ScopeId, for_loop: &mut ForLoop) -> Result<()> {
        let scope = self.scopes.enclose(parent);
        for_loop.scope = Some(scope);
        self.resolve_stmt(scope, &mut for_loop.init)?;
        self.resolve_expr(scope, &mut for_loop.cond)?;
        self.resolve_stmt(scope, &mut for_loop.next)?;
        self.resolve_block(scope, &mut for_loop.body)?;
        self.scopes.compute_stack(scope);
        Ok(())
    }

    fn resolve_function(&mut self, scope: ScopeId, func: &mut Function) -> Result<()> {
        if !self.scopes.is_global(scope) {
            return Err(Error::NestedDeclaration { what: "func", span: func.span });
        }

        if let Some(param) = &mut func.param {
            self.resolve_type(scope, &mut param.ty)?;
        }
        if let Some(result) = &mut func.result {
            self.resolve_type(scope, result)?;
        }

        let name = func.name.name.clone();
        match (self.prototypes.get(&name).copied(), func.body.is_some()) {
            // prototype only
            (Some(_), false) => {
                return Err(Error::DuplicatePrototype { name, span: func.name.span });
            }
            // body for an earlier prototype
            (Some(false), true) => {
                self.prototypes.insert(name.clone(), true);
            }
            (Some(true), true) => {
                return Err(Error::DuplicateDefinition { name, span: func.name.span });
            }
            (None, has_body) => {
                self.scopes.define_func(&name, func.signature_expr(), func.name.span)?;
                self.prototypes.insert(name.clone(), has_body);
            }
        }

        let Some(body) = &mut func.body else {
            log::debug!("prototype for function {}", name);
            return Ok(());
        };

        let func_scope = self.scopes.enclose(scope);
        func.scope = Some(func_scope);
        if let Some(Param { name: Some(param_name), ty }) = &func.param {
            self.scopes
                .define_func_parameter(func_scope, &param_name.name, ty.clone(), param_name.span)?;
        }
        self.resolve_block(func_scope, body)?;
        self.scopes.compute_stack(func_scope);

        log::debug!("resolved function {}", name);
        Ok(())
    }

    /// Named types must refer to a struct declared earlier
    fn resolve_type(&mut self, scope: ScopeId, ty: &mut TypeExpr) -> Result<()> {
        match ty {
            TypeExpr::Int | TypeExpr::Float | TypeExpr::String | TypeExpr::Bool => Ok(()),
            TypeExpr::Named(id) => match self.scopes.resolve(scope, &id.name) {
                Some((_, symbol)) if symbol.scope == SymbolScope::Type => Ok(()),
                _ => Err(Error::UndefinedType { name: id.name.clone(), span: id.span }),
            },
            TypeExpr::Func { param, result } => {
                if let Some(param) = param {
                    self.resolve_type(scope, param)?;
                }
                if let Some(result) = result {
                    self.resolve_type(scope, result)?;
                }
                Ok(())
            }
            TypeExpr::Struct(fields) => {
                for field in fields {
                    self.resolve_type(scope, &mut field.ty)?;
                }
                Ok(())
            }
        }
    }

    fn resolve_expr(&mut self, scope: ScopeId, expr: &mut Expr) -> Result<()> {
        match &mut expr.kind {
            ExprKind::Ident(id) => {
                if self.scopes.resolve(scope, &id.name).is_none() {
                    return Err(Error::UndefinedIdentifier { name: id.name.clone(), span: id.span });
                }
                log::trace!("resolved identifier {}", id.name);
                Ok(())
            }
            ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) | ExprKind::Bool(_) => Ok(()),
            ExprKind::Binary { left, right, .. } => {
                self.resolve_expr(scope, left)?;
                self.resolve_expr(scope, right)
            }
            ExprKind::Call { callee, arg } => {
                self.resolve_expr(scope, callee)?;
                match arg {
                    Some(arg) => self.resolve_expr(scope, arg),
                    None => Ok(()),
                }
            }
            // fields are looked up by the checker
            ExprKind::Selector { base, .. } => self.resolve_expr(scope, base),
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse;
    use crate::frontend::symbol::Location;

    fn resolve(source: &str) -> Result<(Program, Resolver)> {
        let mut program = parse(source).expect("syntax error in test source");
        let mut resolver = Resolver::new();
        resolver.resolve(&mut program)?;
        Ok((program, resolver))
    }

    #[test]
    fn test_undeclared_identifier() {
        assert!(matches!(resolve("print x"), Err(Error::UndefinedIdentifier { .. })));
        assert!(matches!(resolve("var x int = x"), Err(Error::UndefinedIdentifier { .. })));
        assert!(resolve("var x int\nprint x").is_ok());
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        let err = resolve("var x int\nvar x float").unwrap_err();
        assert!(matches!(err, Error::DuplicateDefinition { ref name, .. } if name == "x"));
        assert!(resolve("{\nvar y int\nvar y int\n}").is_err());
    }

    #[test]
    fn test_local_shadowing_is_rejected() {
        assert!(matches!(
            resolve("var x int\n{\nvar x int\n}"),
            Err(Error::IllegalShadowing { .. })
        ));
        assert!(matches!(
            resolve("{\nvar x int\n{\nvar x int\n}\n}"),
            Err(Error::IllegalShadowing { .. })
        ));
        // sibling blocks do not see each other
        assert!(resolve("{\nvar x int\n}\n{\nvar x int\n}").is_ok());
    }

    #[test]
    fn test_parameter_may_shadow_global() {
        assert!(resolve("var x int\nfunc f(x int) {\nprint x\n}").is_ok());
        assert!(matches!(
            resolve("func f(x int) {\nvar x int\n}"),
            Err(Error::IllegalShadowing { .. })
        ));
    }

    #[test]
    fn test_prototypes() {
        assert!(resolve("func f(int)\nfunc f(x int) {\nprint x\n}").is_ok());
        // recursion through the function's own name
        assert!(resolve("func f(x int) {\nf(x)\n}").is_ok());
        assert!(matches!(
            resolve("func f(int)\nfunc f(int)"),
            Err(Error::DuplicatePrototype { .. })
        ));
        assert!(matches!(
            resolve("func f() {}\nfunc f() {}"),
            Err(Error::DuplicateDefinition { .. })
        ));
        assert!(resolve("func f() {}\nfunc f()").is_err());
        assert!(resolve("var f int\nfunc f() {}").is_err());
    }

    #[test]
    fn test_types_must_be_declared() {
        assert!(matches!(resolve("var h human"), Err(Error::UndefinedType { .. })));
        assert!(resolve("type human struct{name string}\nvar h human").is_ok());
        assert!(matches!(
            resolve("var x int\nvar h x"),
            Err(Error::UndefinedType { .. })
        ));
    }

    #[test]
    fn test_nested_declarations() {
        assert!(matches!(
            resolve("{\ntype t struct{a int}\n}"),
            Err(Error::NestedDeclaration { what: "type", .. })
        ));
        assert!(matches!(
            resolve("func f() {\nfunc g() {}\n}"),
            Err(Error::NestedDeclaration { what: "func", .. })
        ));
    }

    #[test]
    fn test_scopes_are_recorded_and_laid_out() {
        let (program, resolver) =
            resolve("for var i int = 0; i < 3; i = i + 1 {\nvar a int\nvar b int\nvar c int\nprint i\n}").unwrap();
        let Stmt::For(for_loop) = &program.stmts[0] else {
            panic!("expected for loop");
        };
        let scopes = resolver.scopes();
        let for_scope = for_loop.scope.unwrap();
        let body_scope = for_loop.body.scope.unwrap();
        assert_eq!(scopes.parent(body_scope), Some(for_scope));
        assert_eq!(scopes.stack_space(for_scope), 16);
        assert_eq!(scopes.stack_space(body_scope), 32);
        assert_eq!(scopes.locate(body_scope, "i"), Some(Location::Stack(32)));
        assert_eq!(scopes.locate(body_scope, "c"), Some(Location::Stack(16)));
    }

    #[test]
    fn test_resolver_keeps_globals_between_programs() {
        let mut resolver = Resolver::new();
        let mut first = parse("var x int = 1").unwrap();
        resolver.resolve(&mut first).unwrap();
        let mut second = parse("print x").unwrap();
        assert!(resolver.resolve(&mut second).is_ok());
    }
}
