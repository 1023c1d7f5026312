//! Lexer for the didactic language
//!
//! Converts source code into a stream of tokens. A newline (or the end of
//! input) that follows a token which can end a statement is turned into a
//! `Semicolon` token, so statements rarely need an explicit `;`.

use crate::frontend::token::{Token, TokenKind};
use crate::utils::Span;

/// The lexer state
pub struct Lexer {
    /// Source code as chars
    source: Vec<char>,
    /// Current position in source
    pos: usize,
    /// Start position of current token
    start: usize,
    /// Current line (1-based)
    line: usize,
    /// Char index where the current line begins
    line_start: usize,
    /// Line and column of the current token's first char
    start_line: usize,
    start_column: usize,
    /// The previous token can end a statement
    insert_semi: bool,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            start: 0,
            line: 1,
            line_start: 0,
            start_line: 1,
            start_column: 1,
            insert_semi: false,
        }
    }

    /// Get the current character without advancing
    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    /// Get the next character without advancing
    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    /// Advance to the next character
    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        if c == Some('\n') {
            self.line += 1;
            self.line_start = self.pos;
        }
        c
    }

    fn mark_start(&mut self) {
        self.start = self.pos;
        self.start_line = self.line;
        self.start_column = self.pos - self.line_start + 1;
    }

    /// Create a span from start to current position
    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos, self.start_line, self.start_column)
    }

    /// Create a token with the current span
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.make_span())
    }

    /// Skip whitespace and comments. Stops at a newline when a semicolon
    /// has to be inserted there.
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                '\n' if self.insert_semi => break,
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '/' if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> TokenKind {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.source[self.start..self.pos].iter().collect();
        TokenKind::keyword_from_str(&text).unwrap_or(TokenKind::Ident(text))
    }

    /// Read a number literal (integer or float)
    fn read_number(&mut self) -> TokenKind {
        let mut is_float = false;

        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            self.advance(); // consume '.'
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text: String = self.source[self.start..self.pos].iter().collect();
        if is_float {
            match text.parse::<f64>() {
                Ok(v) => TokenKind::FloatLit(v),
                Err(_) => TokenKind::Illegal(text),
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => TokenKind::IntLit(v),
                Err(_) => TokenKind::Illegal(text),
            }
        }
    }

    /// Read a string literal; the opening quote is already consumed
    fn read_string(&mut self) -> TokenKind {
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('"') => return TokenKind::StringLit(value),
                Some('\n') | None => return TokenKind::Illegal(format!("\"{}", value)),
                Some(c) => value.push(c),
            }
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        self.mark_start();

        let c = match self.peek() {
            Some(c) => c,
            None => {
                if self.insert_semi {
                    self.insert_semi = false;
                    return self.make_token(TokenKind::Semicolon);
                }
                return Token::eof(self.make_span());
            }
        };

        let kind = if c == '\n' {
            // only reached when a semicolon is due
            self.advance();
            TokenKind::Semicolon
        } else if c.is_ascii_alphabetic() || c == '_' {
            self.read_identifier()
        } else if c.is_ascii_digit() {
            self.read_number()
        } else {
            self.advance();
            match c {
                '"' => self.read_string(),
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '<' => TokenKind::Lt,
                '=' => {
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::EqEq
                    } else {
                        TokenKind::Eq
                    }
                }
                '!' => {
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::Ne
                    } else {
                        TokenKind::Illegal("!".to_string())
                    }
                }
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '.' => TokenKind::Dot,
                ',' => TokenKind::Comma,
                ';' => TokenKind::Semicolon,
                other => TokenKind::Illegal(other.to_string()),
            }
        };

        self.insert_semi = kind.ends_statement();
        self.make_token(kind)
    }

    /// Tokenize the entire source and return all tokens
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).tokenize().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_tokens() {
        assert_eq!(
            kinds("print 2 + 2.5 * (x - y) / z"),
            vec![
                TokenKind::Print,
                TokenKind::IntLit(2),
                TokenKind::Plus,
                TokenKind::FloatLit(2.5),
                TokenKind::Star,
                TokenKind::LParen,
                TokenKind::Ident("x".into()),
                TokenKind::Minus,
                TokenKind::Ident("y".into()),
                TokenKind::RParen,
                TokenKind::Slash,
                TokenKind::Ident("z".into()),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            kinds("a == b != c < d = e"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::EqEq,
                TokenKind::Ident("b".into()),
                TokenKind::Ne,
                TokenKind::Ident("c".into()),
                TokenKind::Lt,
                TokenKind::Ident("d".into()),
                TokenKind::Eq,
                TokenKind::Ident("e".into()),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords() {
        let tokens = kinds("var type for if else func return struct int float string bool true false");
        assert_eq!(tokens[0], TokenKind::Var);
        assert_eq!(tokens[1], TokenKind::Type);
        assert_eq!(tokens[5], TokenKind::Func);
        assert_eq!(tokens[7], TokenKind::Struct);
        assert_eq!(tokens[11], TokenKind::BoolType);
        assert_eq!(tokens[13], TokenKind::False);
    }

    #[test]
    fn test_semicolon_insertion() {
        let tokens = kinds("var x int = 2\nx = x + 1\n\nprint x\n");
        let semis = tokens.iter().filter(|k| **k == TokenKind::Semicolon).count();
        assert_eq!(semis, 3);

        // no semicolon after an operator or an opening brace
        assert_eq!(
            kinds("if x {\n}"),
            vec![
                TokenKind::If,
                TokenKind::Ident("x".into()),
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("2 +\n3").iter().filter(|k| **k == TokenKind::Semicolon).count(), 1);
    }

    #[test]
    fn test_strings_and_comments() {
        assert_eq!(
            kinds("print \"hello world\" // says hi\n"),
            vec![
                TokenKind::Print,
                TokenKind::StringLit("hello world".into()),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
        assert!(matches!(kinds("\"open")[0], TokenKind::Illegal(_)));
    }

    #[test]
    fn test_spans_track_lines() {
        let tokens = Lexer::new("var x int\n  print x").tokenize();
        let print = tokens.iter().find(|t| t.kind == TokenKind::Print).unwrap();
        assert_eq!(print.span.line, 2);
        assert_eq!(print.span.column, 3);
    }
}
