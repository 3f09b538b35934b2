//! Recursive-descent parser from TSDL tokens to [`ast`](super::ast) declarations.

use super::ast::*;
use super::lexer::{Lexer, Token, TokenKind};
use crate::error::MetadataError;

pub fn parse(text: &str) -> Result<Vec<Declaration>, MetadataError> {
    let tokens = Lexer::new(text).tokenize()?;
    Parser { tokens, pos: 0 }.declarations()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn bump(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn error(&self, message: impl Into<String>) -> MetadataError {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        MetadataError::Syntax {
            line: t.line,
            column: t.column,
            message: message.into(),
        }
    }

    fn unexpected(&self, expected: &str) -> MetadataError {
        self.error(format!("expected {expected}, found {}", self.peek()))
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), MetadataError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), TokenKind::Ident(s) if s == kw)
    }

    fn ident(&mut self) -> Result<String, MetadataError> {
        match self.peek().clone() {
            TokenKind::Ident(s) => {
                self.bump();
                Ok(s)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    /// `ident ('.' ident | '->' ident)*`
    fn path(&mut self) -> Result<String, MetadataError> {
        let mut path = self.ident()?;
        while matches!(self.peek(), TokenKind::Dot | TokenKind::Arrow) {
            self.bump();
            path.push('.');
            path.push_str(&self.ident()?);
        }
        Ok(path)
    }

    fn declarations(mut self) -> Result<Vec<Declaration>, MetadataError> {
        let mut decls = Vec::new();
        loop {
            match self.peek().clone() {
                TokenKind::Eof => return Ok(decls),
                TokenKind::Semi => {
                    self.bump();
                }
                TokenKind::Ident(kw)
                    if ScopeKind::from_keyword(&kw).is_some()
                        && self.peek_at(1) == &TokenKind::LBrace =>
                {
                    decls.push(self.scope()?);
                }
                TokenKind::Ident(_) => match self.declaration()? {
                    Some(d) => decls.push(d),
                    None => return Err(self.unexpected("a declaration")),
                },
                _ => return Err(self.unexpected("a declaration")),
            }
        }
    }

    fn scope(&mut self) -> Result<Declaration, MetadataError> {
        let kw = self.ident()?;
        let kind = ScopeKind::from_keyword(&kw).ok_or_else(|| self.unexpected("a scope"))?;
        self.expect(TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            if self.eat(&TokenKind::Semi) {
                continue;
            }
            body.push(self.statement()?);
        }
        self.eat(&TokenKind::Semi);
        Ok(Declaration::Scope { kind, body })
    }

    /// Type declarations allowed at top level and inside scopes and compound types.
    /// Returns `None` if the next tokens do not start one.
    fn declaration(&mut self) -> Result<Option<Declaration>, MetadataError> {
        if self.is_keyword("typealias") {
            self.bump();
            let ty = self.type_spec()?;
            self.expect(TokenKind::TypeAssign)?;
            let mut alias = Vec::new();
            while let TokenKind::Ident(w) = self.peek().clone() {
                self.bump();
                alias.push(w);
            }
            // Pointer aliases are accepted and treated like the plain name
            while self.eat(&TokenKind::Star) {}
            if alias.is_empty() {
                return Err(self.unexpected("an alias name"));
            }
            self.expect(TokenKind::Semi)?;
            return Ok(Some(Declaration::TypeAlias { ty, alias }));
        }
        if self.is_keyword("typedef") {
            self.bump();
            let mut ty = self.type_spec()?;
            let declarators = self.declarators(&mut ty)?;
            self.expect(TokenKind::Semi)?;
            return Ok(Some(Declaration::Typedef { ty, declarators }));
        }
        if self.is_keyword("struct") || self.is_keyword("enum") || self.is_keyword("variant") {
            let ty = self.type_spec()?;
            self.expect(TokenKind::Semi)?;
            return Ok(Some(Declaration::Type(ty)));
        }
        Ok(None)
    }

    fn statement(&mut self) -> Result<Statement, MetadataError> {
        if let Some(d) = self.declaration()? {
            return Ok(Statement::Declaration(d));
        }
        let line = self.line();
        let key = self.path()?;
        match self.bump() {
            TokenKind::Assign => {
                let value = self.value()?;
                self.expect(TokenKind::Semi)?;
                Ok(Statement::Assign { key, value, line })
            }
            TokenKind::TypeAssign => {
                let ty = self.type_spec()?;
                self.expect(TokenKind::Semi)?;
                Ok(Statement::TypeAssign { key, ty, line })
            }
            other => Err(self.error(format!("expected '=' or ':=' after '{key}', found {other}"))),
        }
    }

    fn value(&mut self) -> Result<Value, MetadataError> {
        match self.peek().clone() {
            TokenKind::Minus | TokenKind::Plus => {
                let sign = if self.bump() == TokenKind::Minus { "-" } else { "" };
                match self.bump() {
                    TokenKind::Integer(i) => Ok(Value::Integer(format!("{sign}{i}"))),
                    _ => Err(self.error("expected an integer after the sign")),
                }
            }
            TokenKind::Integer(i) => {
                self.bump();
                Ok(Value::Integer(i))
            }
            TokenKind::Str(s) => {
                self.bump();
                Ok(Value::Str(s))
            }
            TokenKind::Ident(_) => Ok(Value::Path(self.path()?)),
            _ => Err(self.unexpected("a value")),
        }
    }

    fn attributes(&mut self) -> Result<Vec<Attribute>, MetadataError> {
        self.expect(TokenKind::LBrace)?;
        let mut attrs = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            if self.eat(&TokenKind::Semi) {
                continue;
            }
            let key = self.ident()?;
            self.expect(TokenKind::Assign)?;
            let value = self.value()?;
            self.expect(TokenKind::Semi)?;
            attrs.push(Attribute { key, value });
        }
        Ok(attrs)
    }

    fn type_spec(&mut self) -> Result<TypeSpec, MetadataError> {
        let kw = match self.peek() {
            TokenKind::Ident(kw) => kw.clone(),
            _ => return Err(self.unexpected("a type")),
        };
        match kw.as_str() {
            "integer" => {
                self.bump();
                Ok(TypeSpec::Integer(self.attributes()?))
            }
            "floating_point" => {
                self.bump();
                Ok(TypeSpec::Float(self.attributes()?))
            }
            "string" => {
                self.bump();
                let attrs = if self.peek() == &TokenKind::LBrace {
                    self.attributes()?
                } else {
                    Vec::new()
                };
                Ok(TypeSpec::String(attrs))
            }
            "struct" => {
                self.bump();
                let name = self.optional_name();
                let body = self.members()?;
                let align = if self.is_keyword("align") {
                    self.bump();
                    self.expect(TokenKind::LParen)?;
                    let a = match self.bump() {
                        TokenKind::Integer(a) => a,
                        _ => return Err(self.error("expected an integer alignment")),
                    };
                    self.expect(TokenKind::RParen)?;
                    Some(a)
                } else {
                    None
                };
                Ok(TypeSpec::Struct { name, body, align })
            }
            "enum" => {
                self.bump();
                let name = self.optional_name();
                let container = if self.eat(&TokenKind::Colon) {
                    Some(Box::new(self.type_spec()?))
                } else {
                    None
                };
                let body = if self.peek() == &TokenKind::LBrace {
                    Some(self.enum_entries()?)
                } else {
                    None
                };
                Ok(TypeSpec::Enum {
                    name,
                    container,
                    body,
                })
            }
            "variant" => {
                self.bump();
                let name = self.optional_name();
                let tag = if self.eat(&TokenKind::Lt) {
                    let t = self.path()?;
                    self.expect(TokenKind::Gt)?;
                    Some(t)
                } else {
                    None
                };
                let body = self.members()?;
                Ok(TypeSpec::Variant { name, tag, body })
            }
            _ => {
                let mut words = Vec::new();
                while let TokenKind::Ident(w) = self.peek().clone() {
                    if w == "align" && !words.is_empty() {
                        break;
                    }
                    self.bump();
                    words.push(w);
                }
                Ok(TypeSpec::Named(words))
            }
        }
    }

    /// Name following `struct`/`enum`/`variant`, unless the next identifier is a
    /// declarator (`struct { } name` never reaches here, `struct name { }` does).
    fn optional_name(&mut self) -> Option<String> {
        match self.peek().clone() {
            TokenKind::Ident(n) if n != "align" => {
                self.bump();
                Some(n)
            }
            _ => None,
        }
    }

    fn members(&mut self) -> Result<Option<Vec<Member>>, MetadataError> {
        if !self.eat(&TokenKind::LBrace) {
            return Ok(None);
        }
        let mut members = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            if self.eat(&TokenKind::Semi) {
                continue;
            }
            if self.is_keyword("typealias") || self.is_keyword("typedef") {
                if let Some(d) = self.declaration()? {
                    members.push(Member::Declaration(d));
                }
                continue;
            }
            let mut ty = self.type_spec()?;
            let is_compound = matches!(
                ty,
                TypeSpec::Struct { .. } | TypeSpec::Enum { .. } | TypeSpec::Variant { .. }
            );
            if is_compound && self.eat(&TokenKind::Semi) {
                members.push(Member::Declaration(Declaration::Type(ty)));
                continue;
            }
            let declarators = self.declarators(&mut ty)?;
            self.expect(TokenKind::Semi)?;
            members.push(Member::Field { ty, declarators });
        }
        Ok(Some(members))
    }

    /// Parse `name[dims], name2...`. A multi-word named type followed directly by `;`,
    /// `[` or `,` gives up its last word as the first declarator name.
    fn declarators(&mut self, ty: &mut TypeSpec) -> Result<Vec<Declarator>, MetadataError> {
        let mut declarators = Vec::new();
        let mut name = if matches!(self.peek(), TokenKind::Ident(_)) {
            self.ident()?
        } else {
            match ty {
                TypeSpec::Named(words) if words.len() >= 2 => words.pop().unwrap_or_default(),
                _ => return Err(self.unexpected("a field name")),
            }
        };
        loop {
            let mut dims = Vec::new();
            while self.eat(&TokenKind::LBracket) {
                let dim = match self.peek().clone() {
                    TokenKind::Integer(i) => {
                        self.bump();
                        Dimension::Literal(i)
                    }
                    TokenKind::Ident(_) => Dimension::Path(self.path()?),
                    _ => return Err(self.unexpected("an array length")),
                };
                self.expect(TokenKind::RBracket)?;
                dims.push(dim);
            }
            declarators.push(Declarator { name, dims });
            if !self.eat(&TokenKind::Comma) {
                return Ok(declarators);
            }
            name = self.ident()?;
        }
    }

    fn enum_entries(&mut self) -> Result<Vec<EnumEntry>, MetadataError> {
        self.expect(TokenKind::LBrace)?;
        let mut entries = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            let label = match self.bump() {
                TokenKind::Ident(l) | TokenKind::Str(l) => l,
                _ => return Err(self.error("expected an enumerator label")),
            };
            let (value, range_end) = if self.eat(&TokenKind::Assign) {
                let start = self.value()?;
                let end = if self.eat(&TokenKind::Ellipsis) {
                    Some(self.value()?)
                } else {
                    None
                };
                (Some(start), end)
            } else {
                (None, None)
            };
            entries.push(EnumEntry {
                label,
                value,
                range_end,
            });
            if !self.eat(&TokenKind::Comma) {
                self.expect(TokenKind::RBrace)?;
                break;
            }
        }
        Ok(entries)
    }
}
