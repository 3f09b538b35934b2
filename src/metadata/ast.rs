//! Syntax tree produced by the TSDL parser.

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ScopeKind {
    Trace,
    Env,
    Clock,
    Stream,
    Event,
    Callsite,
}

impl ScopeKind {
    pub fn from_keyword(s: &str) -> Option<Self> {
        Some(match s {
            "trace" => ScopeKind::Trace,
            "env" => ScopeKind::Env,
            "clock" => ScopeKind::Clock,
            "stream" => ScopeKind::Stream,
            "event" => ScopeKind::Event,
            "callsite" => ScopeKind::Callsite,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScopeKind::Trace => "trace",
            ScopeKind::Env => "env",
            ScopeKind::Clock => "clock",
            ScopeKind::Stream => "stream",
            ScopeKind::Event => "event",
            ScopeKind::Callsite => "callsite",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Declaration {
    Scope {
        kind: ScopeKind,
        body: Vec<Statement>,
    },
    /// `typealias <ty> := <alias words>;`
    TypeAlias { ty: TypeSpec, alias: Vec<String> },
    /// `typedef <ty> <declarators>;`
    Typedef {
        ty: TypeSpec,
        declarators: Vec<Declarator>,
    },
    /// A bare named `struct`/`enum`/`variant` declaration
    Type(TypeSpec),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Statement {
    Assign {
        key: String,
        value: Value,
        line: usize,
    },
    TypeAssign {
        key: String,
        ty: TypeSpec,
        line: usize,
    },
    Declaration(Declaration),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Value {
    /// Literal text with any leading sign
    Integer(String),
    Str(String),
    /// Identifier or dotted path, e.g. `le` or `clock.monotonic.value`
    Path(String),
}

impl Value {
    pub fn raw(&self) -> &str {
        match self {
            Value::Integer(s) | Value::Str(s) | Value::Path(s) => s,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TypeSpec {
    Integer(Vec<Attribute>),
    Float(Vec<Attribute>),
    String(Vec<Attribute>),
    Struct {
        name: Option<String>,
        body: Option<Vec<Member>>,
        align: Option<String>,
    },
    Enum {
        name: Option<String>,
        container: Option<Box<TypeSpec>>,
        body: Option<Vec<EnumEntry>>,
    },
    Variant {
        name: Option<String>,
        tag: Option<String>,
        body: Option<Vec<Member>>,
    },
    /// Reference to an alias or typedef, possibly multi-word (`unsigned long`)
    Named(Vec<String>),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Attribute {
    pub key: String,
    pub value: Value,
}

/// Struct and variant bodies hold field declarations and local type declarations.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Member {
    Field {
        ty: TypeSpec,
        declarators: Vec<Declarator>,
    },
    Declaration(Declaration),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Declarator {
    pub name: String,
    pub dims: Vec<Dimension>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Dimension {
    Literal(String),
    Path(String),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EnumEntry {
    pub label: String,
    pub value: Option<Value>,
    pub range_end: Option<Value>,
}
