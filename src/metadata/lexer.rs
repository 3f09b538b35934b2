//! Tokenizer for TSDL text.

use crate::error::MetadataError;
use derive_more::Display;

#[derive(Clone, PartialEq, Eq, Debug, Display)]
pub enum TokenKind {
    #[display(fmt = "identifier '{_0}'")]
    Ident(String),
    /// Raw integer literal text, suffix included
    #[display(fmt = "integer '{_0}'")]
    Integer(String),
    #[display(fmt = "string \"{_0}\"")]
    Str(String),
    #[display(fmt = "'{{'")]
    LBrace,
    #[display(fmt = "'}}'")]
    RBrace,
    #[display(fmt = "'('")]
    LParen,
    #[display(fmt = "')'")]
    RParen,
    #[display(fmt = "'['")]
    LBracket,
    #[display(fmt = "']'")]
    RBracket,
    #[display(fmt = "';'")]
    Semi,
    #[display(fmt = "':'")]
    Colon,
    #[display(fmt = "':='")]
    TypeAssign,
    #[display(fmt = "'='")]
    Assign,
    #[display(fmt = "','")]
    Comma,
    #[display(fmt = "'<'")]
    Lt,
    #[display(fmt = "'>'")]
    Gt,
    #[display(fmt = "'.'")]
    Dot,
    #[display(fmt = "'->'")]
    Arrow,
    #[display(fmt = "'...'")]
    Ellipsis,
    #[display(fmt = "'-'")]
    Minus,
    #[display(fmt = "'+'")]
    Plus,
    #[display(fmt = "'*'")]
    Star,
    #[display(fmt = "end of metadata")]
    Eof,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, MetadataError> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token()?;
            let done = t.kind == TokenKind::Eof;
            tokens.push(t);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> MetadataError {
        MetadataError::Syntax {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.src.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), MetadataError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                (Some(b'/'), Some(b'/')) => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.bump();
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => return Err(self.error("unterminated comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, MetadataError> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let tok = |kind| Token { kind, line, column };

        let c = match self.peek() {
            None => return Ok(tok(TokenKind::Eof)),
            Some(c) => c,
        };

        if c.is_ascii_alphabetic() || c == b'_' {
            let start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
                self.bump();
            }
            return Ok(tok(TokenKind::Ident(self.text(start))));
        }

        if c.is_ascii_digit() {
            let start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric()) {
                self.bump();
            }
            return Ok(tok(TokenKind::Integer(self.text(start))));
        }

        if c == b'"' {
            return self.string().map(tok);
        }

        if c == b'\'' {
            return self.character().map(tok);
        }

        self.bump();
        let kind = match c {
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b';' => TokenKind::Semi,
            b',' => TokenKind::Comma,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            b'=' => TokenKind::Assign,
            b'+' => TokenKind::Plus,
            b'*' => TokenKind::Star,
            b':' if self.peek() == Some(b'=') => {
                self.bump();
                TokenKind::TypeAssign
            }
            b':' => TokenKind::Colon,
            b'-' if self.peek() == Some(b'>') => {
                self.bump();
                TokenKind::Arrow
            }
            b'-' => TokenKind::Minus,
            b'.' if self.peek() == Some(b'.') && self.peek_at(1) == Some(b'.') => {
                self.bump();
                self.bump();
                TokenKind::Ellipsis
            }
            b'.' => TokenKind::Dot,
            other => {
                return Err(MetadataError::Syntax {
                    line,
                    column,
                    message: format!("unexpected character '{}'", char::from(other)),
                })
            }
        };
        Ok(tok(kind))
    }

    fn text(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn escape(&mut self) -> Result<u8, MetadataError> {
        match self.bump() {
            Some(b'n') => Ok(b'\n'),
            Some(b't') => Ok(b'\t'),
            Some(b'r') => Ok(b'\r'),
            Some(b'0') => Ok(0),
            Some(b'\\') => Ok(b'\\'),
            Some(b'"') => Ok(b'"'),
            Some(b'\'') => Ok(b'\''),
            Some(c) => Ok(c),
            None => Err(self.error("unterminated escape sequence")),
        }
    }

    fn string(&mut self) -> Result<TokenKind, MetadataError> {
        self.bump();
        let mut bytes = Vec::new();
        loop {
            match self.bump() {
                Some(b'"') => break,
                Some(b'\\') => bytes.push(self.escape()?),
                Some(c) => bytes.push(c),
                None => return Err(self.error("unterminated string literal")),
            }
        }
        String::from_utf8(bytes)
            .map(TokenKind::Str)
            .map_err(|_| self.error("string literal is not valid UTF-8"))
    }

    /// Character constants are integers.
    fn character(&mut self) -> Result<TokenKind, MetadataError> {
        self.bump();
        let c = match self.bump() {
            Some(b'\\') => self.escape()?,
            Some(c) => c,
            None => return Err(self.error("unterminated character constant")),
        };
        if self.bump() != Some(b'\'') {
            return Err(self.error("unterminated character constant"));
        }
        Ok(TokenKind::Integer(c.to_string()))
    }
}
