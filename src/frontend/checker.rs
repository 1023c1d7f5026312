//! Type checking
//!
//! A single top-down pass over a resolved program. Every expression gets
//! its type annotated, every selector its field offset. Types are never
//! inferred across statements: a symbol's declared type is turned into a
//! [`Type`] the first time it is needed and cached on the symbol.

use std::collections::HashSet;

use crate::frontend::ast::*;
use crate::frontend::symbol::{ScopeId, ScopeTree, SymbolScope, SymbolType};
use crate::types::{Field, Signature, Type};
use crate::utils::{Error, Result, Span};

/// Where the checker currently is
#[derive(Debug, Clone)]
struct Context {
    scope: ScopeId,
    /// Signature of the enclosing function, if any
    function: Option<Signature>,
}

impl Context {
    fn with_scope(&self, scope: ScopeId) -> Self {
        Self { scope, function: self.function.clone() }
    }
}

pub struct Checker<'a> {
    scopes: &'a mut ScopeTree,
}

fn scope_of(scope: Option<ScopeId>) -> Result<ScopeId> {
    scope.ok_or_else(|| Error::CodeGen("scope was not resolved before type checking".to_string()))
}

impl<'a> Checker<'a> {
    pub fn new(scopes: &'a mut ScopeTree) -> Self {
        Self { scopes }
    }

    /// Check a resolved program
    pub fn check(&mut self, program: &mut Program) -> Result<()> {
        let ctx = Context { scope: scope_of(program.scope)?, function: None };
        for stmt in &mut program.stmts {
            self.check_stmt(&ctx, stmt)?;
        }
        log::debug!("type checked {} top-level statements", program.stmts.len());
        Ok(())
    }

    // ==================== Symbols and Declared Types ====================

    /// The namespace and type of a visible symbol, back-filling a pending type
    fn symbol_type(&mut self, scope: ScopeId, name: &str, span: Span) -> Result<(SymbolScope, Type)> {
        let (kind, declared) = match self.scopes.resolve(scope, name) {
            Some((_, symbol)) => (symbol.scope, symbol.ty.clone()),
            None => return Err(Error::UndefinedIdentifier { name: name.to_string(), span }),
        };

        match declared {
            SymbolType::Resolved(ty) => Ok((kind, ty)),
            SymbolType::Pending(expr) => {
                let ty = self.type_from_expr(scope, &expr)?;
                self.scopes.set_type(scope, name, ty.clone());
                log::trace!("{} has type {}", name, ty);
                Ok((kind, ty))
            }
        }
    }

    fn type_from_expr(&mut self, scope: ScopeId, expr: &TypeExpr) -> Result<Type> {
        Ok(match expr {
            TypeExpr::Int => Type::Int,
            TypeExpr::Float => Type::Float,
            TypeExpr::String => Type::String,
            TypeExpr::Bool => Type::Bool,
            TypeExpr::Named(id) => match self.symbol_type(scope, &id.name, id.span)? {
                (SymbolScope::Type, ty) => ty,
                _ => return Err(Error::UndefinedType { name: id.name.clone(), span: id.span }),
            },
            TypeExpr::Func { param, result } => {
                let param = match param {
                    Some(p) => self.type_from_expr(scope, p)?,
                    None => Type::Nil,
                };
                let result = match result {
                    Some(r) => self.type_from_expr(scope, r)?,
                    None => Type::Nil,
                };
                Type::Signature(Signature::new(param, result))
            }
            TypeExpr::Struct(decls) => {
                let mut seen = HashSet::new();
                let mut fields = Vec::with_capacity(decls.len());
                for decl in decls {
                    if !seen.insert(decl.name.name.as_str()) {
                        return Err(Error::DuplicateDefinition {
                            name: decl.name.name.clone(),
                            span: decl.name.span,
                        });
                    }
                    let ty = self.type_from_expr(scope, &decl.ty)?;
                    if !ty.is_basic() {
                        return Err(Error::InvalidFieldType {
                            field: decl.name.name.clone(),
                            ty: ty.to_string(),
                            span: decl.name.span,
                        });
                    }
                    fields.push(Field::new(decl.name.name.clone(), ty));
                }
                Type::Struct(fields)
            }
        })
    }

    // ==================== Statements ====================

    fn check_stmt(&mut self, ctx: &Context, stmt: &mut Stmt) -> Result<()> {
        match stmt {
            Stmt::Print { value, .. } => {
                let ty = self.check_expr(ctx, value)?;
                if ty.print_code().is_none() {
                    return Err(Error::NotPrintable { ty: ty.to_string(), span: value.span });
                }
                Ok(())
            }
            Stmt::Var { name, value, .. } => {
                let (_, declared) = self.symbol_type(ctx.scope, &name.name, name.span)?;
                if let Some(value) = value {
                    let got = self.check_expr(ctx, value)?;
                    if got != declared {
                        return Err(Error::TypeMismatch {
                            context: format!("var {}", name.name),
                            expected: declared.to_string(),
                            got: got.to_string(),
                            span: value.span,
                        });
                    }
                }
                Ok(())
            }
            Stmt::Assign { target, value, .. } => {
                if let ExprKind::Ident(id) = &target.kind {
                    let (kind, _) = self.symbol_type(ctx.scope, &id.name, id.span)?;
                    if matches!(kind, SymbolScope::Func | SymbolScope::Type) {
                        return Err(Error::NotAssignable { name: id.name.clone(), span: id.span });
                    }
                }
                let expected = self.check_expr(ctx, target)?;
                let got = self.check_expr(ctx, value)?;
                if got != expected {
                    return Err(Error::TypeMismatch {
                        context: format!("assignment to {}", target.describe()),
                        expected: expected.to_string(),
                        got: got.to_string(),
                        span: value.span,
                    });
                }
                Ok(())
            }
            Stmt::Block(block) => self.check_block(ctx, block),
            Stmt::If { cond, then_block, else_block, .. } => {
                self.check_condition(ctx, cond, "if")?;
                self.check_block(ctx, then_block)?;
                if let Some(else_block) = else_block {
                    self.check_block(ctx, else_block)?;
                }
                Ok(())
            }
            Stmt::For(for_loop) => {
                let inner = ctx.with_scope(scope_of(for_loop.scope)?);
                self.check_stmt(&inner, &mut for_loop.init)?;
                self.check_condition(&inner, &mut for_loop.cond, "for")?;
                self.check_stmt(&inner, &mut for_loop.next)?;
                self.check_block(&inner, &mut for_loop.body)
            }
            Stmt::Type { name, .. } => {
                self.symbol_type(ctx.scope, &name.name, name.span)?;
                Ok(())
            }
            Stmt::Func(func) => self.check_function(ctx, func),
            Stmt::Return { value, span } => {
                let Some(signature) = &ctx.function else {
                    return Err(Error::ReturnOutsideFunction { span: *span });
                };
                let expected = (*signature.result).clone();
                let got = match value {
                    Some(value) => {
                        let ty = self.check_expr(ctx, value)?;
                        // a bare `return` is the only way to return nil
                        if ty.is_nil() {
                            return Err(Error::NotAValue { name: value.describe(), span: value.span });
                        }
                        ty
                    }
                    None => Type::Nil,
                };
                if got != expected {
                    return Err(Error::TypeMismatch {
                        context: "return".to_string(),
                        expected: expected.to_string(),
                        got: got.to_string(),
                        span: *span,
                    });
                }
                Ok(())
            }
            Stmt::Expr(expr) => self.check_expr(ctx, expr).map(|_| ()),
        }
    }

    fn check_block(&mut self, ctx: &Context, block: &mut Block) -> Result<()> {
        let inner = ctx.with_scope(scope_of(block.scope)?);
        for stmt in &mut block.stmts {
            self.check_stmt(&inner, stmt)?;
        }
        Ok(())
    }

    fn check_condition(&mut self, ctx: &Context, cond: &mut Expr, construct: &'static str) -> Result<()> {
        let ty = self.check_expr(ctx, cond)?;
        if ty != Type::Bool {
            return Err(Error::NonBoolCondition { construct, got: ty.to_string(), span: cond.span });
        }
        Ok(())
    }

    fn check_function(&mut self, ctx: &Context, func: &mut Function) -> Result<()> {
        let name = &func.name;
        let declared = self.type_from_expr(ctx.scope, &func.signature_expr())?;
        // the symbol carries the signature of the first declaration
        let (_, stored) = self.symbol_type(ctx.scope, &name.name, name.span)?;
        if stored != declared {
            return Err(Error::SignatureMismatch { name: name.name.clone(), span: name.span });
        }
        let Type::Signature(signature) = declared else {
            return Err(Error::CodeGen(format!("function {} has no signature", name.name)));
        };

        let Some(body) = &mut func.body else {
            return Ok(());
        };

        if !signature.result.is_nil() && !matches!(body.stmts.last(), Some(Stmt::Return { .. })) {
            return Err(Error::MissingReturn { name: name.name.clone(), span: func.span });
        }

        let inner = Context { scope: scope_of(func.scope)?, function: Some(signature) };
        self.check_block(&inner, body)?;
        log::debug!("type checked function {}", func.name.name);
        Ok(())
    }

    // ==================== Expressions ====================

    fn check_expr(&mut self, ctx: &Context, expr: &mut Expr) -> Result<Type> {
        let ty = match &mut expr.kind {
            ExprKind::Ident(id) => match self.symbol_type(ctx.scope, &id.name, id.span)? {
                (SymbolScope::Type, _) => {
                    return Err(Error::NotAValue { name: id.name.clone(), span: id.span });
                }
                (_, ty) => ty,
            },
            ExprKind::Int(_) => Type::Int,
            ExprKind::Float(_) => Type::Float,
            ExprKind::Str(_) => Type::String,
            ExprKind::Bool(_) => Type::Bool,
            ExprKind::Binary { left, op, right } => {
                let op = *op;
                let lt = self.check_expr(ctx, left)?;
                let rt = self.check_expr(ctx, right)?;
                if lt != rt {
                    return Err(Error::TypeMismatch {
                        context: format!("operator {}", op.symbol()),
                        expected: lt.to_string(),
                        got: rt.to_string(),
                        span: right.span,
                    });
                }
                let supported = match op {
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Lt => {
                        matches!(lt, Type::Int | Type::Float)
                    }
                    BinOp::Eq | BinOp::Ne => matches!(lt, Type::Int | Type::Float | Type::Bool),
                };
                if !supported {
                    return Err(Error::UnsupportedOperator {
                        op: op.symbol().to_string(),
                        ty: lt.to_string(),
                        span: expr.span,
                    });
                }
                if op.is_comparison() {
                    Type::Bool
                } else {
                    lt
                }
            }
            ExprKind::Call { callee, arg } => {
                let signature = match self.check_expr(ctx, callee)? {
                    Type::Signature(signature) => signature,
                    other => {
                        return Err(Error::NotCallable {
                            callee: callee.describe(),
                            ty: other.to_string(),
                            span: callee.span,
                        });
                    }
                };
                match (signature.param.is_nil(), arg) {
                    (true, None) => {}
                    (true, Some(arg)) => {
                        let got = self.check_expr(ctx, arg)?;
                        return Err(Error::UnexpectedArgument { got: got.to_string(), span: arg.span });
                    }
                    (false, None) => {
                        return Err(Error::MissingArgument {
                            expected: signature.param.to_string(),
                            span: expr.span,
                        });
                    }
                    (false, Some(arg)) => {
                        let got = self.check_expr(ctx, arg)?;
                        if got != *signature.param {
                            return Err(Error::TypeMismatch {
                                context: format!("argument of {}", callee.describe()),
                                expected: signature.param.to_string(),
                                got: got.to_string(),
                                span: arg.span,
                            });
                        }
                    }
                }
                *signature.result
            }
            ExprKind::Selector { base, field, offset } => {
                let base_ty = self.check_expr(ctx, base)?;
                if !matches!(base_ty, Type::Struct(_)) {
                    return Err(Error::NotAStruct {
                        field: field.name.clone(),
                        ty: base_ty.to_string(),
                        span: field.span,
                    });
                }
                let Some((index, field_ty)) = base_ty.field(&field.name) else {
                    return Err(Error::UnknownField {
                        field: field.name.clone(),
                        ty: base_ty.to_string(),
                        span: field.span,
                    });
                };
                *offset = Type::field_offset(index);
                field_ty.clone()
            }
        };

        expr.ty = ty.clone();
        Ok(ty)
    }
}

/// Check `program` against the symbols in `scopes`
pub fn check(scopes: &mut ScopeTree, program: &mut Program) -> Result<()> {
    Checker::new(scopes).check(program)
}
