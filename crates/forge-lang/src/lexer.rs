//! A byte buffer plus a mutable cursor, producing a lazy token stream.
//!
//! `peek` computes (and caches) the token at the cursor without consuming
//! it — repeated calls are idempotent. `advance` consumes the cached token,
//! or lexes one fresh if nothing was peeked. The lexer owns exactly one
//! token of lookahead; driving it from two callers concurrently is not
//! supported (see the concurrency notes in `DESIGN.md`).
//!
//! Whitespace, `//` line comments, and `/* */` block comments (no nesting —
//! the first `*/` closes) are skipped between tokens.

use crate::error::LexError;
use crate::token::{classify_word, Token, TokenKind};
use forge_base::Span;

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    lookahead: Option<(Token, usize)>,
    /// Byte offset of the start of each line, indexed by `line_no - 1`.
    /// Extended monotonically as the cursor advances past newlines.
    line_starts: Vec<usize>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Lexer {
            src,
            pos: 0,
            lookahead: None,
            line_starts: vec![0],
        }
    }

    /// Returns the token at the cursor without consuming it.
    pub fn peek(&mut self) -> Result<Token, LexError> {
        if let Some((tok, _)) = &self.lookahead {
            return Ok(tok.clone());
        }
        let start = self.pos;
        let tok = self.lex_one()?;
        let post = self.pos;
        self.pos = start;
        self.lookahead = Some((tok.clone(), post));
        Ok(tok)
    }

    /// Consumes and returns the token at the cursor.
    pub fn advance(&mut self) -> Result<Token, LexError> {
        if let Some((tok, post)) = self.lookahead.take() {
            self.pos = post;
            return Ok(tok);
        }
        self.lex_one()
    }

    /// Maps a byte offset to a `(line, character)` pair, both 1-based.
    pub fn offset_to_location(&self, offset: usize) -> (usize, usize) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts[line_idx];
        (line_idx + 1, offset - line_start + 1)
    }

    /// Returns a copy of line `n` (1-based), without the trailing newline.
    pub fn line_to_string(&self, n: usize) -> String {
        let start = self.line_starts[n - 1];
        let end = self.line_starts.get(n).map(|&s| s - 1).unwrap_or(self.src.len());
        String::from_utf8_lossy(&self.src[start..end]).into_owned()
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line_starts.push(self.pos);
        }
        Some(b)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'/') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek_byte() {
                            None => break,
                            Some(b'*') if self.peek_byte_at(1) == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_one(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();
        let start = self.pos;
        let Some(byte) = self.peek_byte() else {
            return Ok(Token::new(TokenKind::Eof, Span::new(start, start)));
        };

        if byte.is_ascii_digit() {
            return Ok(self.lex_number(start));
        }
        if byte.is_ascii_alphabetic() || byte == b'_' {
            return Ok(self.lex_word(start));
        }
        if byte == b'"' {
            return self.lex_string(start);
        }
        if byte == b'\'' {
            return self.lex_char(start);
        }

        self.lex_punct_or_op(start)
    }

    fn lex_number(&mut self, start: usize) -> Token {
        while matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
            self.bump();
        }
        let mut is_real = false;
        if self.peek_byte() == Some(b'.') && matches!(self.peek_byte_at(1), Some(b) if b.is_ascii_digit()) {
            is_real = true;
            self.bump();
            while matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        let kind = if is_real {
            TokenKind::RealLit(text.parse().unwrap())
        } else {
            TokenKind::IntLit(text.parse().unwrap())
        };
        Token::new(kind, Span::new(start, self.pos))
    }

    fn lex_word(&mut self, start: usize) -> Token {
        while matches!(self.peek_byte(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.bump();
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        Token::new(classify_word(text), Span::new(start, self.pos))
    }

    fn lex_string(&mut self, start: usize) -> Result<Token, LexError> {
        self.bump(); // opening quote
        let mut bytes = Vec::new();
        loop {
            match self.bump() {
                None => return Err(LexError::UnterminatedString { span: Span::new(start, self.pos) }),
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    None => return Err(LexError::UnterminatedString { span: Span::new(start, self.pos) }),
                    Some(escaped) => bytes.push(escaped),
                },
                Some(b) => bytes.push(b),
            }
        }
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Token::new(TokenKind::StringLit(text), Span::new(start, self.pos)))
    }

    fn lex_char(&mut self, start: usize) -> Result<Token, LexError> {
        self.bump(); // opening quote
        let content = match self.bump() {
            None => return Err(LexError::UnterminatedChar { span: Span::new(start, self.pos) }),
            Some(b'\\') => self.bump().ok_or(LexError::UnterminatedChar { span: Span::new(start, self.pos) })?,
            Some(b) => b,
        };
        match self.bump() {
            Some(b'\'') => Ok(Token::new(TokenKind::CharLit(content), Span::new(start, self.pos))),
            _ => Err(LexError::UnterminatedChar { span: Span::new(start, self.pos) }),
        }
    }

    fn lex_punct_or_op(&mut self, start: usize) -> Result<Token, LexError> {
        let byte = self.bump().unwrap();
        let kind = match byte {
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b'+' => TokenKind::Plus,
            b'-' => {
                if self.peek_byte() == Some(b'>') {
                    self.bump();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'<' => {
                if self.peek_byte() == Some(b'=') {
                    self.bump();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.peek_byte() == Some(b'=') {
                    self.bump();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            b'!' => {
                if self.peek_byte() == Some(b'=') {
                    self.bump();
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            b'=' => {
                if self.peek_byte() == Some(b'=') {
                    self.bump();
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            b':' => {
                if self.peek_byte() == Some(b'=') {
                    self.bump();
                    TokenKind::ColonEq
                } else if self.peek_byte() == Some(b':') {
                    self.bump();
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            other => return Err(LexError::UnexpectedByte { byte: other, span: Span::new(start, self.pos) }),
        };
        Ok(Token::new(kind, Span::new(start, self.pos)))
    }
}
