//! Parser for the didactic language
//!
//! Recursive descent parser with Pratt parsing for expressions. Syntax
//! errors are collected rather than returned one at a time: after an error
//! the parser skips to the next statement boundary and carries on.

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// Operator binding strength, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Equals,
    Less,
    Sum,
    Product,
    Postfix,
}

fn precedence_of(kind: &TokenKind) -> Precedence {
    match kind {
        TokenKind::EqEq | TokenKind::Ne => Precedence::Equals,
        TokenKind::Lt => Precedence::Less,
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Star | TokenKind::Slash => Precedence::Product,
        TokenKind::LParen | TokenKind::Dot => Precedence::Postfix,
        _ => Precedence::Lowest,
    }
}

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<Error>,
}

impl Parser {
    /// Create a new parser from a lexer
    pub fn new(mut lexer: Lexer) -> Self {
        Self::from_tokens(lexer.tokenize())
    }

    /// Create a parser from pre-tokenized input
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        let tokens = if tokens.is_empty() {
            vec![Token::eof(Span::dummy())]
        } else {
            tokens
        };
        Self { tokens, pos: 0, errors: Vec::new() }
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        // the token stream always ends with Eof and `advance` never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::UnexpectedToken {
            expected: expected.to_string(),
            got: self.current_kind().to_string(),
            span: self.current().span,
        }
    }

    /// Skip to the next statement boundary after an error
    fn synchronize(&mut self) {
        loop {
            match self.current_kind() {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace | TokenKind::Eof => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// A statement ends at `;`, or right before `}` or the end of input
    fn expect_terminator(&mut self) -> Result<()> {
        if self.consume(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.is_at_end()
        {
            Ok(())
        } else {
            Err(self.unexpected("end of statement"))
        }
    }

    /// Parse a statement followed by its terminator, recording any error
    fn parse_statement_recovering(&mut self) -> Option<Stmt> {
        let result = self
            .parse_statement()
            .and_then(|stmt| self.expect_terminator().map(|_| stmt));
        match result {
            Ok(stmt) => Some(stmt),
            Err(err) => {
                self.errors.push(err);
                self.synchronize();
                None
            }
        }
    }

    // ==================== Parsing Methods ====================

    /// Parse a complete program. Check [`Parser::errors`] afterwards.
    pub fn parse_program(&mut self) -> Program {
        let mut stmts = Vec::new();

        while !self.is_at_end() {
            if self.consume(&TokenKind::Semicolon) {
                continue;
            }
            if self.check(&TokenKind::RBrace) {
                let err = self.unexpected("statement");
                self.errors.push(err);
                self.advance();
                continue;
            }
            if let Some(stmt) = self.parse_statement_recovering() {
                stmts.push(stmt);
            }
        }

        Program { stmts, scope: None }
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        match self.current_kind() {
            TokenKind::Print => {
                let start = self.advance().span;
                let value = self.parse_expr(Precedence::Lowest)?;
                Ok(Stmt::Print { span: start.merge(&value.span), value })
            }
            TokenKind::Var => self.parse_var(),
            TokenKind::Type => self.parse_type_decl(),
            TokenKind::For => self.parse_for(),
            TokenKind::If => self.parse_if(),
            TokenKind::Func => Ok(Stmt::Func(self.parse_function()?)),
            TokenKind::Return => {
                let start = self.advance().span;
                let value = if self.check(&TokenKind::Semicolon)
                    || self.check(&TokenKind::RBrace)
                    || self.is_at_end()
                {
                    None
                } else {
                    Some(self.parse_expr(Precedence::Lowest)?)
                };
                Ok(Stmt::Return { value, span: start.merge(&self.prev_span()) })
            }
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            _ => self.parse_simple(),
        }
    }

    /// Expression statement or assignment
    fn parse_simple(&mut self) -> Result<Stmt> {
        let expr = self.parse_expr(Precedence::Lowest)?;
        if !self.consume(&TokenKind::Eq) {
            return Ok(Stmt::Expr(expr));
        }

        if !matches!(expr.kind, ExprKind::Ident(_) | ExprKind::Selector { .. }) {
            return Err(Error::Syntax {
                message: format!("cannot assign to {}", expr.describe()),
                span: expr.span,
            });
        }

        let value = self.parse_expr(Precedence::Lowest)?;
        Ok(Stmt::Assign { span: expr.span.merge(&value.span), target: expr, value })
    }

    fn parse_var(&mut self) -> Result<Stmt> {
        let start = self.expect(TokenKind::Var)?.span;
        let name = self.parse_ident()?;
        let ty = self.parse_type()?;
        let value = if self.consume(&TokenKind::Eq) {
            Some(self.parse_expr(Precedence::Lowest)?)
        } else {
            None
        };
        Ok(Stmt::Var { name, ty, value, span: start.merge(&self.prev_span()) })
    }

    fn parse_type_decl(&mut self) -> Result<Stmt> {
        let start = self.expect(TokenKind::Type)?.span;
        let name = self.parse_ident()?;
        self.expect(TokenKind::Struct)?;
        self.expect(TokenKind::LBrace)?;

        let mut fields = Vec::new();
        loop {
            while self.consume(&TokenKind::Semicolon) {}
            if self.check(&TokenKind::RBrace) || self.is_at_end() {
                break;
            }
            let field_name = self.parse_ident()?;
            let ty = self.parse_type()?;
            fields.push(FieldDecl { name: field_name, ty });
            if !self.check(&TokenKind::RBrace) {
                self.expect(TokenKind::Semicolon)?;
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Stmt::Type {
            name,
            ty: TypeExpr::Struct(fields),
            span: start.merge(&self.prev_span()),
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let start = self.expect(TokenKind::For)?.span;

        let init = if self.check(&TokenKind::Var) {
            self.parse_var()?
        } else {
            match self.parse_simple()? {
                stmt @ Stmt::Assign { .. } => stmt,
                other => {
                    return Err(Error::Syntax {
                        message: "for initialisation must be a var or an assign statement".to_string(),
                        span: other.span(),
                    })
                }
            }
        };
        self.expect(TokenKind::Semicolon)?;

        let cond = self.parse_expr(Precedence::Lowest)?;
        self.expect(TokenKind::Semicolon)?;

        let next = match self.parse_simple()? {
            stmt @ Stmt::Assign { .. } => stmt,
            other => {
                return Err(Error::Syntax {
                    message: "for next statement must be an assign statement".to_string(),
                    span: other.span(),
                })
            }
        };

        let body = self.parse_block()?;

        Ok(Stmt::For(ForLoop {
            init: Box::new(init),
            cond,
            next: Box::new(next),
            span: start.merge(&body.span),
            body,
            scope: None,
        }))
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let start = self.expect(TokenKind::If)?.span;
        let cond = self.parse_expr(Precedence::Lowest)?;
        let then_block = self.parse_block()?;
        let else_block = if self.consume(&TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_block,
            else_block,
            span: start.merge(&self.prev_span()),
        })
    }

    /// Parse a function definition or prototype
    fn parse_function(&mut self) -> Result<Function> {
        let start = self.expect(TokenKind::Func)?.span;
        let name = self.parse_ident()?;

        self.expect(TokenKind::LParen)?;
        let param = if self.check(&TokenKind::RParen) {
            None
        } else {
            let named = matches!(self.current_kind(), TokenKind::Ident(_))
                && self.peek().map_or(false, |t| t.kind.starts_type());
            let param_name = if named { Some(self.parse_ident()?) } else { None };
            let ty = self.parse_type()?;
            Some(Param { name: param_name, ty })
        };
        if self.check(&TokenKind::Comma) {
            return Err(Error::Syntax {
                message: "functions take at most one parameter".to_string(),
                span: self.current().span,
            });
        }
        self.expect(TokenKind::RParen)?;

        let result = if self.current_kind().starts_type() {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = if self.check(&TokenKind::LBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Function {
            name,
            param,
            result,
            body,
            scope: None,
            span: start.merge(&self.prev_span()),
        })
    }

    fn parse_block(&mut self) -> Result<Block> {
        let start = self.expect(TokenKind::LBrace)?.span;
        let mut stmts = Vec::new();

        loop {
            while self.consume(&TokenKind::Semicolon) {}
            if self.check(&TokenKind::RBrace) || self.is_at_end() {
                break;
            }
            if let Some(stmt) = self.parse_statement_recovering() {
                stmts.push(stmt);
            }
        }

        if self.is_at_end() {
            return Err(Error::Syntax {
                message: "block statement was never closed".to_string(),
                span: start,
            });
        }
        let end = self.expect(TokenKind::RBrace)?.span;

        Ok(Block { stmts, scope: None, span: start.merge(&end) })
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.current().clone();
        match &token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Ident::new(name.clone(), token.span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn parse_type(&mut self) -> Result<TypeExpr> {
        let ty = match self.current_kind() {
            TokenKind::IntType => TypeExpr::Int,
            TokenKind::FloatType => TypeExpr::Float,
            TokenKind::StringType => TypeExpr::String,
            TokenKind::BoolType => TypeExpr::Bool,
            TokenKind::Ident(_) => return Ok(TypeExpr::Named(self.parse_ident()?)),
            TokenKind::Func => return self.parse_func_type(),
            _ => return Err(self.unexpected("type")),
        };
        self.advance();
        Ok(ty)
    }

    /// `func(param) result`, where the parameter name is optional
    fn parse_func_type(&mut self) -> Result<TypeExpr> {
        self.expect(TokenKind::Func)?;
        self.expect(TokenKind::LParen)?;

        let param = if self.check(&TokenKind::RParen) {
            None
        } else {
            if matches!(self.current_kind(), TokenKind::Ident(_))
                && self.peek().map_or(false, |t| t.kind.starts_type())
            {
                self.advance();
            }
            Some(Box::new(self.parse_type()?))
        };
        self.expect(TokenKind::RParen)?;

        let result = if self.current_kind().starts_type() {
            Some(Box::new(self.parse_type()?))
        } else {
            None
        };

        Ok(TypeExpr::Func { param, result })
    }

    // ==================== Expressions ====================

    fn parse_expr(&mut self, precedence: Precedence) -> Result<Expr> {
        let mut left = self.parse_prefix()?;

        while precedence < precedence_of(self.current_kind()) {
            left = match self.current_kind() {
                TokenKind::LParen => self.parse_call(left)?,
                TokenKind::Dot => self.parse_selector(left)?,
                _ => self.parse_binary(left)?,
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        let kind = match token.kind {
            TokenKind::IntLit(v) => ExprKind::Int(v),
            TokenKind::FloatLit(v) => ExprKind::Float(v),
            TokenKind::StringLit(s) => ExprKind::Str(s),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Ident(name) => ExprKind::Ident(Ident::new(name, token.span)),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr(Precedence::Lowest)?;
                self.expect(TokenKind::RParen)?;
                return Ok(expr);
            }
            TokenKind::Illegal(text) => {
                return Err(Error::Syntax {
                    message: format!("illegal token {:?}", text),
                    span: token.span,
                })
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(Expr::new(kind, token.span))
    }

    fn parse_binary(&mut self, left: Expr) -> Result<Expr> {
        let token = self.advance();
        let op = match token.kind {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::Ne => BinOp::Ne,
            _ => {
                return Err(Error::Syntax {
                    message: format!("{} is not a binary operator", token.kind),
                    span: token.span,
                })
            }
        };

        let right = self.parse_expr(precedence_of(&token.kind))?;
        let span = left.span.merge(&right.span);
        Ok(Expr::new(
            ExprKind::Binary { left: Box::new(left), op, right: Box::new(right) },
            span,
        ))
    }

    fn parse_call(&mut self, callee: Expr) -> Result<Expr> {
        self.expect(TokenKind::LParen)?;
        let arg = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_expr(Precedence::Lowest)?))
        };
        if self.check(&TokenKind::Comma) {
            return Err(Error::Syntax {
                message: "functions take at most one argument".to_string(),
                span: self.current().span,
            });
        }
        let end = self.expect(TokenKind::RParen)?.span;

        let span = callee.span.merge(&end);
        Ok(Expr::new(ExprKind::Call { callee: Box::new(callee), arg }, span))
    }

    fn parse_selector(&mut self, base: Expr) -> Result<Expr> {
        self.expect(TokenKind::Dot)?;
        let field = self.parse_ident()?;
        let span = base.span.merge(&field.span);
        Ok(Expr::new(
            ExprKind::Selector { base: Box::new(base), field, offset: 0 },
            span,
        ))
    }
}

/// Parse source text, returning every syntax error on failure
pub fn parse(source: &str) -> std::result::Result<Program, Vec<Error>> {
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse_program();
    if parser.errors.is_empty() {
        Ok(program)
    } else {
        Err(parser.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        match parse(source) {
            Ok(program) => program,
            Err(errors) => panic!("unexpected syntax errors: {:?}", errors),
        }
    }

    fn first_expr(source: &str) -> Expr {
        match parse_ok(source).stmts.remove(0) {
            Stmt::Expr(expr) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    /// Render an expression fully parenthesised
    fn render(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Ident(id) => id.name.clone(),
            ExprKind::Int(v) => v.to_string(),
            ExprKind::Float(v) => v.to_string(),
            ExprKind::Str(s) => format!("{:?}", s),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Binary { left, op, right } => {
                format!("({} {} {})", render(left), op.symbol(), render(right))
            }
            ExprKind::Call { callee, arg } => format!(
                "{}({})",
                render(callee),
                arg.as_ref().map(|a| render(a)).unwrap_or_default()
            ),
            ExprKind::Selector { base, field, .. } => format!("{}.{}", render(base), field.name),
        }
    }

    #[test]
    fn test_precedence() {
        assert_eq!(render(&first_expr("1 + 2 * 3")), "(1 + (2 * 3))");
        assert_eq!(render(&first_expr("(5 + 5) / 5")), "((5 + 5) / 5)");
        assert_eq!(render(&first_expr("2 + 2 - 2")), "((2 + 2) - 2)");
        assert_eq!(render(&first_expr("a + 1 < b == c < d")), "(((a + 1) < b) == (c < d))");
        assert_eq!(render(&first_expr("f(x.y + 1).z")), "f((x.y + 1)).z");
    }

    #[test]
    fn test_var_statements() {
        let program = parse_ok("var x int\nvar y float = 1.0\nvar f func(y int) string\nvar h human");
        assert_eq!(program.stmts.len(), 4);
        match &program.stmts[1] {
            Stmt::Var { name, ty, value, .. } => {
                assert_eq!(name.name, "y");
                assert_eq!(*ty, TypeExpr::Float);
                assert!(matches!(value.as_ref().unwrap().kind, ExprKind::Float(v) if v == 1.0));
            }
            other => panic!("expected var, got {:?}", other),
        }
        match &program.stmts[2] {
            Stmt::Var { ty: TypeExpr::Func { param, result }, .. } => {
                assert_eq!(param.as_deref(), Some(&TypeExpr::Int));
                assert_eq!(result.as_deref(), Some(&TypeExpr::String));
            }
            other => panic!("expected func-typed var, got {:?}", other),
        }
        assert!(matches!(&program.stmts[3], Stmt::Var { ty: TypeExpr::Named(id), .. } if id.name == "human"));
    }

    #[test]
    fn test_type_statement() {
        let program = parse_ok("type human struct{\n  name string\n  age int\n}");
        match &program.stmts[0] {
            Stmt::Type { name, ty: TypeExpr::Struct(fields), .. } => {
                assert_eq!(name.name, "human");
                let names: Vec<_> = fields.iter().map(|f| f.name.name.as_str()).collect();
                assert_eq!(names, vec!["name", "age"]);
                assert_eq!(fields[1].ty, TypeExpr::Int);
            }
            other => panic!("expected type statement, got {:?}", other),
        }
        assert!(parse("type human struct{name string; age int}").is_ok());
    }

    #[test]
    fn test_functions_and_prototypes() {
        let program = parse_ok("func greet(int)\nfunc greet(s int) human { return s }\nfunc none() {}");
        match &program.stmts[0] {
            Stmt::Func(f) => {
                assert!(f.body.is_none());
                let param = f.param.as_ref().unwrap();
                assert!(param.name.is_none());
                assert_eq!(param.ty, TypeExpr::Int);
            }
            other => panic!("expected prototype, got {:?}", other),
        }
        match &program.stmts[1] {
            Stmt::Func(f) => {
                assert_eq!(f.param.as_ref().unwrap().name.as_ref().unwrap().name, "s");
                assert!(matches!(&f.result, Some(TypeExpr::Named(id)) if id.name == "human"));
                assert!(matches!(f.body.as_ref().unwrap().stmts[0], Stmt::Return { value: Some(_), .. }));
            }
            other => panic!("expected function, got {:?}", other),
        }
        match &program.stmts[2] {
            Stmt::Func(f) => {
                assert!(f.param.is_none() && f.result.is_none());
                assert!(f.body.as_ref().unwrap().stmts.is_empty());
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_control_flow() {
        let program = parse_ok(
            "if 2 < 3 {\n print 2\n} else {\n print 3\n}\nfor var i int = 0; i < 10; i = i + 1 {\n print i\n}",
        );
        assert!(matches!(&program.stmts[0], Stmt::If { else_block: Some(_), .. }));
        match &program.stmts[1] {
            Stmt::For(f) => {
                assert!(matches!(*f.init, Stmt::Var { .. }));
                assert!(matches!(*f.next, Stmt::Assign { .. }));
                assert_eq!(f.body.stmts.len(), 1);
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_assignments() {
        let program = parse_ok("x = 2\nx.name = \"bob\"\nreturn");
        assert!(matches!(&program.stmts[0], Stmt::Assign { target: Expr { kind: ExprKind::Ident(_), .. }, .. }));
        assert!(matches!(&program.stmts[1], Stmt::Assign { target: Expr { kind: ExprKind::Selector { .. }, .. }, .. }));
        assert!(matches!(&program.stmts[2], Stmt::Return { value: None, .. }));
    }

    #[test]
    fn test_errors_are_accumulated() {
        let errors = parse("print ;\nvar 1 int\n2 = 3\nprint 4").unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[2], Error::Syntax { .. }));
    }

    #[test]
    fn test_unclosed_block() {
        let errors = parse("{\nprint 1\n").unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("never closed")));
    }

    #[test]
    fn test_too_many_arguments() {
        assert!(parse("f(1, 2)").is_err());
        assert!(parse("func f(a int, b int) {}").is_err());
    }
}
