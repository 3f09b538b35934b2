//! Turns the TSDL syntax tree into descriptors.

use super::ast::{
    Attribute, Declaration, Declarator, Dimension, EnumEntry, Member, ScopeKind, Statement,
    TypeSpec, Value,
};
use super::descriptors::{
    ClockDescriptor, EnvValue, Environment, EventDescriptor, PropertyBag, StreamDescriptor,
    TraceDescriptor,
};
use super::scope::TypeScope;
use super::{Metadata, MetadataOptions};
use crate::descriptor::{
    ArrayDescriptor, ArrayLength, EnumDescriptor, EnumMapping, EnumRange, FloatDescriptor,
    IntegerDescriptor, StringDescriptor, StructDescriptor, StructField, TypeDescriptor,
    VariantDescriptor,
};
use crate::error::{Error, MetadataError, UnsupportedValueError};
use crate::integer_literal::IntegerLiteral;
use crate::types::{ByteOrder, Encoding, EventId, StreamId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub(crate) fn compile(decls: &[Declaration], options: &MetadataOptions) -> Result<Metadata, Error> {
    let byte_order = trace_byte_order(decls)?;
    let mut c = Compiler {
        types: TypeScope::new(),
        byte_order,
        trace: None,
        environment: Environment::default(),
        clocks: Vec::new(),
        streams: BTreeMap::new(),
        events: BTreeMap::new(),
        callsites: Vec::new(),
    };

    for decl in decls.iter() {
        match decl {
            Declaration::Scope { kind, body } => c.scope(kind, body, options)?,
            other => c.declaration(other)?,
        }
    }

    let mut trace = c.trace.ok_or(MetadataError::MissingTrace)?;
    if !trace.has_uuid() {
        if let Some(uuid) = options.trace_uuid {
            trace.uuid = uuid;
        }
    }

    for ((stream_id, _), event) in c.events.iter() {
        if !c.streams.contains_key(stream_id) {
            return Err(MetadataError::EventStreamNotFound {
                event: event.name.clone(),
                stream_id: stream_id.0,
            }
            .into());
        }
    }

    debug!(
        major = trace.major,
        minor = trace.minor,
        byte_order = %trace.byte_order,
        streams = c.streams.len(),
        events = c.events.len(),
        clocks = c.clocks.len(),
        "Compiled trace metadata"
    );

    Ok(Metadata {
        trace,
        environment: c.environment,
        clocks: c.clocks,
        streams: c.streams,
        events: c.events,
        callsites: c.callsites,
    })
}

/// The trace byte order, needed up front to resolve `native` in types declared before
/// the trace scope.
fn trace_byte_order(decls: &[Declaration]) -> Result<ByteOrder, Error> {
    let mut traces = decls.iter().filter_map(|d| match d {
        Declaration::Scope {
            kind: ScopeKind::Trace,
            body,
        } => Some(body),
        _ => None,
    });
    let body = traces.next().ok_or(MetadataError::MissingTrace)?;
    if traces.next().is_some() {
        return Err(MetadataError::DuplicateTrace.into());
    }
    let raw = body
        .iter()
        .rev()
        .find_map(|s| match s {
            Statement::Assign { key, value, .. } if key == "byte_order" => Some(value.raw()),
            _ => None,
        })
        .ok_or(MetadataError::MissingProperty {
            scope: "trace",
            property: "byte_order",
        })?;
    match raw.parse::<ByteOrder>() {
        Ok(ByteOrder::Native) | Err(_) => Err(MetadataError::InvalidProperty {
            scope: "trace",
            property: "byte_order".to_owned(),
            value: raw.to_owned(),
        }
        .into()),
        Ok(o) => Ok(o),
    }
}

struct Compiler {
    types: TypeScope,
    byte_order: ByteOrder,
    trace: Option<TraceDescriptor>,
    environment: Environment,
    clocks: Vec<Arc<ClockDescriptor>>,
    streams: BTreeMap<StreamId, Arc<StreamDescriptor>>,
    events: BTreeMap<(StreamId, EventId), Arc<EventDescriptor>>,
    callsites: Vec<PropertyBag>,
}

impl Compiler {
    fn scope(
        &mut self,
        kind: &ScopeKind,
        body: &[Statement],
        options: &MetadataOptions,
    ) -> Result<(), Error> {
        self.types.push();
        let bag = self.property_bag(body);
        self.types.pop();
        let mut bag = bag?;

        match kind {
            ScopeKind::Trace => {
                let trace = self.trace_scope(&mut bag)?;
                self.trace = Some(trace);
            }
            ScopeKind::Env => self.env_scope(body)?,
            ScopeKind::Clock => {
                let mut clock = clock_scope(&mut bag)?;
                clock.adjust_offset(options.clock_offset_s, options.clock_offset_ns);
                if options.force_clock_origin_unix_epoch {
                    clock.absolute = true;
                }
                debug!(name = %clock.name, frequency = clock.frequency, "Compiled clock");
                self.clocks.push(Arc::new(clock));
            }
            ScopeKind::Stream => {
                let stream = stream_scope(&mut bag)?;
                if self.streams.contains_key(&stream.id) {
                    return Err(MetadataError::DuplicateStream(stream.id.0).into());
                }
                self.streams.insert(stream.id, Arc::new(stream));
            }
            ScopeKind::Event => {
                let event = event_scope(&mut bag)?;
                let key = (event.stream_id, event.id);
                if self.events.contains_key(&key) {
                    return Err(MetadataError::DuplicateEvent {
                        stream_id: key.0 .0,
                        event_id: key.1 .0,
                    }
                    .into());
                }
                self.events.insert(key, Arc::new(event));
            }
            ScopeKind::Callsite => self.callsites.push(bag),
        }
        Ok(())
    }

    fn property_bag(&mut self, body: &[Statement]) -> Result<PropertyBag, Error> {
        let mut bag = PropertyBag::default();
        for s in body.iter() {
            match s {
                Statement::Assign { key, value, .. } => {
                    bag.values.push((key.clone(), value.raw().to_owned()))
                }
                Statement::TypeAssign { key, ty, .. } => {
                    let ty = self.type_spec(ty)?;
                    bag.types.push((key.clone(), ty));
                }
                Statement::Declaration(d) => self.declaration(d)?,
            }
        }
        Ok(bag)
    }

    fn trace_scope(&mut self, bag: &mut PropertyBag) -> Result<TraceDescriptor, Error> {
        let major = required_u64(bag, "trace", "major")?;
        let minor = required_u64(bag, "trace", "minor")?;
        // Validated up front
        let _ = bag.take_value("byte_order");
        let uuid = match bag.take_value("uuid") {
            Some(u) => Uuid::parse_str(&u).map_err(|_| MetadataError::InvalidUuid(u))?,
            None => Uuid::nil(),
        };
        let packet_header = optional_struct(bag, "trace", "packet.header")?;
        Ok(TraceDescriptor {
            major,
            minor,
            uuid,
            byte_order: self.byte_order,
            packet_header,
            extra: std::mem::take(bag),
        })
    }

    fn env_scope(&mut self, body: &[Statement]) -> Result<(), Error> {
        for s in body.iter() {
            if let Statement::Assign { key, value, .. } = s {
                let v = match value {
                    Value::Integer(raw) => match IntegerLiteral::parse(raw)?.to_i64() {
                        Ok(i) => EnvValue::Integer(i),
                        Err(_) => EnvValue::String(raw.clone()),
                    },
                    Value::Str(s) | Value::Path(s) => EnvValue::String(s.clone()),
                };
                self.environment.insert(key.clone(), v);
            }
        }
        Ok(())
    }

    fn declaration(&mut self, decl: &Declaration) -> Result<(), Error> {
        match decl {
            Declaration::TypeAlias { ty, alias } => {
                let ty = self.type_spec(ty)?;
                self.types.declare(alias.join(" "), ty)?;
            }
            Declaration::Typedef { ty, declarators } => {
                let base = self.type_spec(ty)?;
                for d in declarators.iter() {
                    let ty = apply_dimensions(base.clone(), d)?;
                    self.types.declare(d.name.clone(), ty)?;
                }
            }
            // Named compound types register themselves
            Declaration::Type(spec) => {
                self.type_spec(spec)?;
            }
            Declaration::Scope { kind, .. } => {
                return Err(MetadataError::Syntax {
                    line: 0,
                    column: 0,
                    message: format!("'{}' scope nested in another scope", kind.name()),
                }
                .into())
            }
        }
        Ok(())
    }

    fn type_spec(&mut self, spec: &TypeSpec) -> Result<TypeDescriptor, Error> {
        match spec {
            TypeSpec::Integer(attrs) => self.integer(attrs).map(TypeDescriptor::Integer),
            TypeSpec::Float(attrs) => self.float(attrs).map(TypeDescriptor::Float),
            TypeSpec::String(attrs) => string(attrs).map(TypeDescriptor::String),
            TypeSpec::Struct { name, body, align } => self.structure(name, body, align),
            TypeSpec::Enum {
                name,
                container,
                body,
            } => self.enumeration(name, container.as_deref(), body),
            TypeSpec::Variant { name, tag, body } => self.variant(name, tag, body),
            TypeSpec::Named(words) => Ok(self.types.resolve(&words.join(" "))?),
        }
    }

    fn integer(&self, attrs: &[Attribute]) -> Result<IntegerDescriptor, Error> {
        const SCOPE: &str = "integer";
        let mut size = None;
        let mut alignment = None;
        let mut signed = false;
        let mut byte_order = ByteOrder::Native;
        let mut encoding = Encoding::None;
        let mut base = 10;
        let mut mapped_clock = None;

        for a in attrs.iter() {
            let raw = a.value.raw();
            match a.key.as_str() {
                "size" => {
                    let s = property_u64(SCOPE, "size", raw)?;
                    if s == 0 || s > 64 {
                        return Err(UnsupportedValueError::IntegerSize(s).into());
                    }
                    size = Some(s as u32);
                }
                "align" => alignment = Some(alignment_value(SCOPE, raw)?),
                "signed" => signed = boolean(SCOPE, "signed", raw)?,
                "byte_order" => byte_order = byte_order_value(SCOPE, raw)?,
                "encoding" => {
                    encoding = raw
                        .parse()
                        .map_err(|_| invalid_property(SCOPE, "encoding", raw))?
                }
                "base" => base = integer_base(raw)?,
                "map" => {
                    let clock = raw
                        .strip_prefix("clock.")
                        .and_then(|r| r.strip_suffix(".value"))
                        .ok_or_else(|| invalid_property(SCOPE, "map", raw))?;
                    mapped_clock = Some(Arc::from(clock));
                }
                other => debug!(attribute = other, "Ignoring unknown integer attribute"),
            }
        }

        let size = size.ok_or(MetadataError::MissingProperty {
            scope: SCOPE,
            property: "size",
        })?;
        Ok(IntegerDescriptor {
            size,
            alignment: alignment.unwrap_or(if size % 8 == 0 { 8 } else { 1 }),
            signed,
            byte_order: byte_order.resolve(self.byte_order),
            encoding,
            base,
            mapped_clock,
        })
    }

    fn float(&self, attrs: &[Attribute]) -> Result<FloatDescriptor, Error> {
        const SCOPE: &str = "floating_point";
        let mut exp_dig = None;
        let mut mant_dig = None;
        let mut alignment = None;
        let mut byte_order = ByteOrder::Native;
        for a in attrs.iter() {
            let raw = a.value.raw();
            match a.key.as_str() {
                "exp_dig" => exp_dig = Some(property_u64(SCOPE, "exp_dig", raw)?),
                "mant_dig" => mant_dig = Some(property_u64(SCOPE, "mant_dig", raw)?),
                "align" => alignment = Some(alignment_value(SCOPE, raw)?),
                "byte_order" => byte_order = byte_order_value(SCOPE, raw)?,
                other => debug!(attribute = other, "Ignoring unknown floating point attribute"),
            }
        }
        let exp_dig = exp_dig.ok_or(MetadataError::MissingProperty {
            scope: SCOPE,
            property: "exp_dig",
        })?;
        let mant_dig = mant_dig.ok_or(MetadataError::MissingProperty {
            scope: SCOPE,
            property: "mant_dig",
        })?;
        let unsupported = || UnsupportedValueError::FloatSize { exp_dig, mant_dig };
        let desc = FloatDescriptor {
            exp_dig: u32::try_from(exp_dig).map_err(|_| unsupported())?,
            mant_dig: u32::try_from(mant_dig).map_err(|_| unsupported())?,
            byte_order: byte_order.resolve(self.byte_order),
            alignment: alignment.unwrap_or(if exp_dig.saturating_add(mant_dig) % 8 == 0 {
                8
            } else {
                1
            }),
        };
        desc.validate()?;
        Ok(desc)
    }

    fn fields(&mut self, members: &[Member]) -> Result<Vec<StructField>, Error> {
        self.types.push();
        let result = self.fields_in_scope(members);
        self.types.pop();
        result
    }

    fn fields_in_scope(&mut self, members: &[Member]) -> Result<Vec<StructField>, Error> {
        let mut fields = Vec::with_capacity(members.len());
        for m in members.iter() {
            match m {
                Member::Declaration(d) => self.declaration(d)?,
                Member::Field { ty, declarators } => {
                    let base = self.type_spec(ty)?;
                    for d in declarators.iter() {
                        let ty = apply_dimensions(base.clone(), d)?;
                        fields.push(StructField::new(d.name.clone(), ty));
                    }
                }
            }
        }
        Ok(fields)
    }

    fn structure(
        &mut self,
        name: &Option<String>,
        body: &Option<Vec<Member>>,
        align: &Option<String>,
    ) -> Result<TypeDescriptor, Error> {
        let Some(body) = body else {
            return self.named_compound("struct", name);
        };
        let min_alignment = match align {
            Some(a) => alignment_value("struct", a)?,
            None => 1,
        };
        let ty = TypeDescriptor::Struct(StructDescriptor::new(self.fields(body)?, min_alignment));
        if let Some(n) = name {
            self.types.declare(format!("struct {n}"), ty.clone())?;
        }
        Ok(ty)
    }

    fn enumeration(
        &mut self,
        name: &Option<String>,
        container: Option<&TypeSpec>,
        body: &Option<Vec<EnumEntry>>,
    ) -> Result<TypeDescriptor, Error> {
        let Some(entries) = body else {
            return self.named_compound("enum", name);
        };
        let container = match container {
            Some(spec) => self.type_spec(spec)?,
            None => self.types.resolve("int")?,
        };
        let container = match container {
            TypeDescriptor::Integer(i) => i,
            other => {
                return Err(invalid_property("enum", "container", &other.kind().to_string()).into())
            }
        };
        let mappings = enum_mappings(&container, entries)?;
        let ty = TypeDescriptor::Enum(EnumDescriptor {
            container,
            mappings,
        });
        if let Some(n) = name {
            self.types.declare(format!("enum {n}"), ty.clone())?;
        }
        Ok(ty)
    }

    fn variant(
        &mut self,
        name: &Option<String>,
        tag: &Option<String>,
        body: &Option<Vec<Member>>,
    ) -> Result<TypeDescriptor, Error> {
        let Some(body) = body else {
            // The tag of a named variant may be given where it is used
            let mut ty = self.named_compound("variant", name)?;
            if let (TypeDescriptor::Variant(v), Some(t)) = (&mut ty, tag) {
                v.tag = Some(t.clone());
            }
            return Ok(ty);
        };
        let ty: TypeDescriptor = VariantDescriptor {
            tag: tag.clone(),
            options: self.fields(body)?,
        }
        .into();
        if let Some(n) = name {
            self.types.declare(format!("variant {n}"), ty.clone())?;
        }
        Ok(ty)
    }

    fn named_compound(&self, keyword: &str, name: &Option<String>) -> Result<TypeDescriptor, Error> {
        match name {
            Some(n) => Ok(self.types.resolve(&format!("{keyword} {n}"))?),
            None => Err(MetadataError::UnknownType(format!("anonymous {keyword} without a body")).into()),
        }
    }
}

fn clock_scope(bag: &mut PropertyBag) -> Result<ClockDescriptor, Error> {
    const SCOPE: &str = "clock";
    let name = bag.take_value("name").ok_or(MetadataError::MissingProperty {
        scope: SCOPE,
        property: "name",
    })?;
    let uuid = bag
        .take_value("uuid")
        .map(|u| Uuid::parse_str(&u).map_err(|_| MetadataError::InvalidUuid(u)))
        .transpose()?;
    let frequency = match bag.take_value("freq") {
        Some(f) => match property_u64(SCOPE, "freq", &f)? {
            0 => return Err(invalid_property(SCOPE, "freq", &f).into()),
            f => f,
        },
        None => ClockDescriptor::DEFAULT_FREQUENCY,
    };
    let precision = optional_u64(bag, SCOPE, "precision")?.unwrap_or(0);
    let offset_s = optional_i64(bag, SCOPE, "offset_s")?.unwrap_or(0);
    let offset = optional_i64(bag, SCOPE, "offset")?.unwrap_or(0);
    let absolute = match bag.take_value("absolute") {
        Some(a) => boolean(SCOPE, "absolute", &a)?,
        None => false,
    };
    Ok(ClockDescriptor {
        name,
        uuid,
        description: bag.take_value("description"),
        frequency,
        precision,
        offset_s,
        offset,
        absolute,
    })
}

fn stream_scope(bag: &mut PropertyBag) -> Result<StreamDescriptor, Error> {
    const SCOPE: &str = "stream";
    let id = StreamId(optional_u64(bag, SCOPE, "id")?.unwrap_or(0));
    let packet_context =
        optional_struct(bag, SCOPE, "packet.context")?.ok_or(MetadataError::MissingProperty {
            scope: SCOPE,
            property: "packet.context",
        })?;
    let event_header =
        optional_struct(bag, SCOPE, "event.header")?.ok_or(MetadataError::MissingProperty {
            scope: SCOPE,
            property: "event.header",
        })?;
    let event_context = optional_struct(bag, SCOPE, "event.context")?;
    Ok(StreamDescriptor {
        id,
        packet_context,
        event_header,
        event_context,
        extra: std::mem::take(bag),
    })
}

fn event_scope(bag: &mut PropertyBag) -> Result<EventDescriptor, Error> {
    const SCOPE: &str = "event";
    let id = EventId(optional_u64(bag, SCOPE, "id")?.unwrap_or(0));
    let stream_id = StreamId(optional_u64(bag, SCOPE, "stream_id")?.unwrap_or(0));
    let name = bag.take_value("name").unwrap_or_default();
    let log_level = optional_i64(bag, SCOPE, "loglevel")?;
    Ok(EventDescriptor {
        id,
        stream_id,
        name,
        log_level,
        model_emf_uri: bag.take_value("model.emf.uri"),
        context: bag.take_type("context"),
        payload: bag.take_type("fields"),
        extra: std::mem::take(bag),
    })
}

fn apply_dimensions(base: TypeDescriptor, d: &Declarator) -> Result<TypeDescriptor, Error> {
    // `a[2][3]` is two arrays of three elements
    let mut ty = base;
    for dim in d.dims.iter().rev() {
        let length = match dim {
            Dimension::Literal(l) => ArrayLength::Fixed(IntegerLiteral::parse(l)?.to_u64()?),
            Dimension::Path(p) => ArrayLength::Field(p.clone()),
        };
        ty = TypeDescriptor::Array(ArrayDescriptor {
            element: Box::new(ty),
            length,
        });
    }
    Ok(ty)
}

fn enum_mappings(
    container: &IntegerDescriptor,
    entries: &[EnumEntry],
) -> Result<Vec<EnumMapping>, Error> {
    let mut mappings: Vec<EnumMapping> = Vec::new();
    let mut next = Some(if container.signed {
        IntegerLiteral::signed(0)
    } else {
        IntegerLiteral::unsigned(0)
    });

    for e in entries.iter() {
        let start = match &e.value {
            Some(v) => enum_value(container, v)?,
            None => next.ok_or_else(|| MetadataError::InvalidLiteral {
                literal: e.label.clone(),
                reason: "implicit enumerator value overflows its container".to_owned(),
            })?,
        };
        let end = match &e.range_end {
            Some(v) => enum_value(container, v)?,
            None => start,
        };
        if end.as_i128() < start.as_i128() {
            return Err(invalid_property("enum", &e.label, &format!("{start} ... {end}")).into());
        }

        let after = end.as_i128() + 1;
        next = if container.signed {
            i64::try_from(after).ok().map(IntegerLiteral::signed)
        } else {
            u64::try_from(after).ok().map(IntegerLiteral::unsigned)
        };

        let range = EnumRange { start, end };
        match mappings.iter_mut().find(|m| m.label == e.label) {
            Some(m) => m.ranges.push(range),
            None => mappings.push(EnumMapping {
                label: e.label.clone(),
                ranges: vec![range],
            }),
        }
    }
    Ok(mappings)
}

/// Parse an enumerator value and convert it to the container's signedness.
fn enum_value(container: &IntegerDescriptor, v: &Value) -> Result<IntegerLiteral, Error> {
    let lit = match v {
        Value::Integer(raw) => IntegerLiteral::parse(raw)?,
        other => {
            return Err(MetadataError::InvalidLiteral {
                literal: other.raw().to_owned(),
                reason: "enumerator values must be integers".to_owned(),
            }
            .into())
        }
    };
    let lit = if container.signed {
        lit.to_signed(false)?
    } else {
        lit.to_unsigned(false)?
    };
    let required = lit.required_bit_count();
    if u32::from(required) > container.size {
        return Err(UnsupportedValueError::Narrowing {
            value: lit.to_string(),
            required,
            target: "enumeration container",
        }
        .into());
    }
    Ok(lit)
}

fn string(attrs: &[Attribute]) -> Result<StringDescriptor, Error> {
    let mut desc = StringDescriptor::default();
    for a in attrs.iter() {
        if a.key == "encoding" {
            desc.encoding = a
                .value
                .raw()
                .parse()
                .map_err(|_| invalid_property("string", "encoding", a.value.raw()))?;
        }
    }
    Ok(desc)
}

fn invalid_property(scope: &'static str, property: &str, value: &str) -> MetadataError {
    MetadataError::InvalidProperty {
        scope,
        property: property.to_owned(),
        value: value.to_owned(),
    }
}

fn property_u64(scope: &'static str, property: &str, raw: &str) -> Result<u64, MetadataError> {
    IntegerLiteral::parse(raw)
        .ok()
        .and_then(|l| l.to_u64().ok())
        .ok_or_else(|| invalid_property(scope, property, raw))
}

fn property_i64(scope: &'static str, property: &str, raw: &str) -> Result<i64, MetadataError> {
    IntegerLiteral::parse(raw)
        .ok()
        .and_then(|l| l.to_i64().ok())
        .ok_or_else(|| invalid_property(scope, property, raw))
}

fn required_u64(
    bag: &mut PropertyBag,
    scope: &'static str,
    property: &'static str,
) -> Result<u64, MetadataError> {
    optional_u64(bag, scope, property)?.ok_or(MetadataError::MissingProperty { scope, property })
}

fn optional_u64(
    bag: &mut PropertyBag,
    scope: &'static str,
    property: &str,
) -> Result<Option<u64>, MetadataError> {
    bag.take_value(property)
        .map(|v| property_u64(scope, property, &v))
        .transpose()
}

fn optional_i64(
    bag: &mut PropertyBag,
    scope: &'static str,
    property: &str,
) -> Result<Option<i64>, MetadataError> {
    bag.take_value(property)
        .map(|v| property_i64(scope, property, &v))
        .transpose()
}

fn optional_struct(
    bag: &mut PropertyBag,
    scope: &'static str,
    property: &str,
) -> Result<Option<StructDescriptor>, MetadataError> {
    match bag.take_type(property) {
        None => Ok(None),
        Some(TypeDescriptor::Struct(s)) => Ok(Some(s)),
        Some(other) => Err(invalid_property(scope, property, &other.kind().to_string())),
    }
}

fn boolean(scope: &'static str, property: &str, raw: &str) -> Result<bool, MetadataError> {
    match raw {
        "true" | "TRUE" | "1" => Ok(true),
        "false" | "FALSE" | "0" => Ok(false),
        _ => Err(invalid_property(scope, property, raw)),
    }
}

fn alignment_value(scope: &'static str, raw: &str) -> Result<u64, MetadataError> {
    match property_u64(scope, "align", raw)? {
        a if a.is_power_of_two() => Ok(a),
        _ => Err(invalid_property(scope, "align", raw)),
    }
}

fn byte_order_value(scope: &'static str, raw: &str) -> Result<ByteOrder, MetadataError> {
    raw.parse()
        .map_err(|_| invalid_property(scope, "byte_order", raw))
}

fn integer_base(raw: &str) -> Result<u8, MetadataError> {
    Ok(match raw {
        "decimal" | "dec" | "d" | "i" | "u" | "10" => 10,
        "hexadecimal" | "hex" | "x" | "X" | "p" | "16" => 16,
        "octal" | "oct" | "o" | "8" => 8,
        "binary" | "bin" | "b" | "2" => 2,
        _ => return Err(invalid_property("integer", "base", raw)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::parser::parse;
    use pretty_assertions::assert_eq;

    const PRELUDE: &str = r#"
        typealias integer { size = 8; align = 8; signed = false; } := uint8_t;
        typealias integer { size = 16; align = 8; signed = false; } := uint16_t;
        typealias integer { size = 32; align = 8; signed = false; } := uint32_t;
        typealias integer { size = 64; align = 8; signed = false; } := uint64_t;
        typealias integer { size = 32; align = 8; signed = true; } := int;
    "#;

    fn compile_text(text: &str) -> Result<Metadata, Error> {
        compile(&parse(text)?, &MetadataOptions::default())
    }

    fn with_prelude(body: &str) -> Result<Metadata, Error> {
        compile_text(&format!("{PRELUDE}{body}"))
    }

    const MINIMAL_STREAM: &str = r#"
        stream {
            packet.context := struct { uint64_t packet_size; uint64_t content_size; };
            event.header := struct { uint32_t timestamp; uint8_t id; };
        };
    "#;

    #[test]
    fn trace_scope() {
        let m = with_prelude(&format!(
            r#"trace {{
                major = 1;
                minor = 8;
                byte_order = be;
                uuid = "2a6422d0-6cee-11e0-8c08-cb07d7b3a564";
                packet.header := struct {{ uint32_t magic; uint8_t uuid[16]; uint32_t stream_id; }};
                producer = "barectf";
            }};
            {MINIMAL_STREAM}"#
        ))
        .unwrap();
        assert_eq!((m.trace.major, m.trace.minor), (1, 8));
        assert_eq!(m.trace.byte_order, ByteOrder::BigEndian);
        assert_eq!(
            m.trace.uuid,
            Uuid::parse_str("2a6422d0-6cee-11e0-8c08-cb07d7b3a564").unwrap()
        );
        let header = m.trace.packet_header.as_ref().unwrap();
        assert_eq!(
            header.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["magic", "uuid", "stream_id"]
        );
        assert_eq!(m.trace.extra.value("producer"), Some("barectf"));
        // Native byte order in the prelude follows the trace
        let TypeDescriptor::Integer(magic) = &header.fields[0].ty else {
            panic!("expected an integer");
        };
        assert_eq!(magic.byte_order, ByteOrder::BigEndian);
    }

    #[test]
    fn required_trace_properties() {
        assert!(matches!(
            with_prelude("trace { major = 1; minor = 8; };"),
            Err(Error::Metadata(MetadataError::MissingProperty {
                scope: "trace",
                property: "byte_order"
            }))
        ));
        assert!(matches!(
            with_prelude("trace { minor = 8; byte_order = le; };"),
            Err(Error::Metadata(MetadataError::MissingProperty {
                scope: "trace",
                property: "major"
            }))
        ));
        assert!(matches!(
            with_prelude("trace { major = 1; minor = 8; byte_order = le; uuid = \"nope\"; };"),
            Err(Error::Metadata(MetadataError::InvalidUuid(_)))
        ));
        assert!(matches!(
            with_prelude(MINIMAL_STREAM),
            Err(Error::Metadata(MetadataError::MissingTrace))
        ));
        let m = with_prelude("trace { major = 1; minor = 8; byte_order = le; };").unwrap();
        assert!(!m.trace.has_uuid());
    }

    #[test]
    fn clocks_and_environment() {
        let m = with_prelude(
            r#"trace { major = 1; minor = 8; byte_order = le; };
            env { hostname = "box"; tracer_major = 2; domain = kernel; };
            clock {
                name = "monotonic";
                uuid = "35fca2e4-c9b6-4f26-a8e6-4d6e3e1f0a11";
                description = "Monotonic Clock";
                freq = 1000;
                precision = 1;
                offset_s = 10;
                offset = 5;
                absolute = TRUE;
            };
            clock { name = "other"; };"#,
        )
        .unwrap();
        assert_eq!(m.environment.get_str("hostname"), Some("box"));
        assert_eq!(m.environment.get("tracer_major"), Some(&EnvValue::Integer(2)));
        assert_eq!(m.environment.get_str("domain"), Some("kernel"));

        let c = m.clock("monotonic").unwrap();
        assert_eq!(c.frequency, 1000);
        assert_eq!((c.offset_s, c.offset, c.precision), (10, 5, 1));
        assert!(c.absolute);
        assert_eq!(c.description.as_deref(), Some("Monotonic Clock"));
        assert!(c.uuid.is_some());

        let other = m.clock("other").unwrap();
        assert_eq!(other.frequency, ClockDescriptor::DEFAULT_FREQUENCY);
        assert!(!other.absolute);
    }

    #[test]
    fn clock_options_are_applied() {
        let decls = parse(&format!(
            "{PRELUDE} trace {{ major = 1; minor = 8; byte_order = le; }}; clock {{ name = c; offset_s = 1; }};"
        ))
        .unwrap();
        let opts = MetadataOptions {
            clock_offset_s: 2,
            clock_offset_ns: 7,
            force_clock_origin_unix_epoch: true,
            trace_uuid: Some(Uuid::nil()),
        };
        let m = compile(&decls, &opts).unwrap();
        let c = m.clock("c").unwrap();
        assert_eq!((c.offset_s, c.offset), (3, 7));
        assert!(c.absolute);
    }

    #[test]
    fn streams_and_events() {
        let m = with_prelude(&format!(
            r#"trace {{ major = 1; minor = 8; byte_order = le; }};
            {MINIMAL_STREAM}
            event {{
                name = "sched_switch";
                id = 3;
                stream_id = 0;
                loglevel = 13;
                model.emf.uri = "http://example.com/switch";
                fields := struct {{ uint8_t cpu; string comm; }};
            }};
            event {{ name = "noop"; id = 4; }};"#
        ))
        .unwrap();
        let stream = m.stream(StreamId(0)).unwrap();
        assert!(stream.event_context.is_none());
        assert_eq!(stream.event_header.fields.len(), 2);

        let e = m.event(StreamId(0), EventId(3)).unwrap();
        assert_eq!(e.name, "sched_switch");
        assert_eq!(e.log_level, Some(13));
        assert_eq!(e.model_emf_uri.as_deref(), Some("http://example.com/switch"));
        let payload = e.payload.as_ref().and_then(|p| p.as_struct()).unwrap();
        assert_eq!(payload.fields[1].ty, TypeDescriptor::String(StringDescriptor::default()));
        assert!(m.event(StreamId(0), EventId(4)).unwrap().payload.is_none());
        assert_eq!(m.events().count(), 2);
    }

    #[test]
    fn stream_errors() {
        let trace = "trace { major = 1; minor = 8; byte_order = le; };";
        assert!(matches!(
            with_prelude(&format!(
                "{trace} stream {{ packet.context := struct {{ uint8_t a; }}; }};"
            )),
            Err(Error::Metadata(MetadataError::MissingProperty {
                scope: "stream",
                property: "event.header"
            }))
        ));
        assert!(matches!(
            with_prelude(&format!("{trace} {MINIMAL_STREAM} {MINIMAL_STREAM}")),
            Err(Error::Metadata(MetadataError::DuplicateStream(0)))
        ));
        assert!(matches!(
            with_prelude(&format!("{trace} {MINIMAL_STREAM} event {{ name = a; stream_id = 9; }};")),
            Err(Error::Metadata(MetadataError::EventStreamNotFound { stream_id: 9, .. }))
        ));
        assert!(matches!(
            with_prelude(&format!(
                "{trace} {MINIMAL_STREAM} event {{ name = a; }}; event {{ name = b; }};"
            )),
            Err(Error::Metadata(MetadataError::DuplicateEvent { event_id: 0, .. }))
        ));
    }

    fn prelude_compiler() -> Compiler {
        let mut c = Compiler {
            types: TypeScope::new(),
            byte_order: ByteOrder::LittleEndian,
            trace: None,
            environment: Environment::default(),
            clocks: Vec::new(),
            streams: BTreeMap::new(),
            events: BTreeMap::new(),
            callsites: Vec::new(),
        };
        for d in parse(PRELUDE).unwrap().iter() {
            c.declaration(d).unwrap();
        }
        c
    }

    #[test]
    fn enumerations() {
        let mut t = prelude_compiler();
        let decls = parse(
            "enum state : uint8_t { RUNNING, WAITING = 4, ZOMBIE, DEAD = 10 ... 12, WAITING = 20 };
             enum signed_default { A = -1, B };",
        )
        .unwrap();
        for d in decls.iter() {
            t.declaration(d).unwrap();
        }
        let TypeDescriptor::Enum(state) = t.types.resolve("enum state").unwrap() else {
            panic!("expected an enum");
        };
        let lit = IntegerLiteral::unsigned;
        assert_eq!(state.label_for(&lit(0)), Some("RUNNING"));
        assert_eq!(state.label_for(&lit(5)), Some("ZOMBIE"));
        assert_eq!(state.label_for(&lit(11)), Some("DEAD"));
        assert_eq!(state.label_for(&lit(20)), Some("WAITING"));
        assert_eq!(state.label_for(&lit(3)), None);
        assert_eq!(state.mapping("WAITING").unwrap().ranges.len(), 2);

        let TypeDescriptor::Enum(sd) = t.types.resolve("enum signed_default").unwrap() else {
            panic!("expected an enum");
        };
        assert!(sd.container.signed);
        assert_eq!(sd.label_for(&IntegerLiteral::signed(0)), Some("B"));

        // Enumerations without a container use the `int` alias
        assert!(matches!(
            compile_text(
                "trace { major = 1; minor = 8; byte_order = le; };
                 typealias integer { size = 8; } := uint8_t;
                 enum e { A };"
            ),
            Err(Error::Metadata(MetadataError::UnknownType(ref t))) if t == "int"
        ));
    }

    #[test]
    fn enumerator_must_fit_container() {
        let r = with_prelude(
            "trace { major = 1; minor = 8; byte_order = le; };
             typealias enum : uint8_t { BIG = 256 } := big_t;",
        );
        assert!(matches!(
            r,
            Err(Error::UnsupportedValue(UnsupportedValueError::Narrowing { required: 9, .. }))
        ));
        let r = with_prelude(
            "trace { major = 1; minor = 8; byte_order = le; };
             typealias enum : uint8_t { NEG = -1 } := neg_t;",
        );
        assert!(matches!(
            r,
            Err(Error::UnsupportedValue(UnsupportedValueError::LossyConversion { .. }))
        ));
    }

    #[test]
    fn variants_arrays_and_scoping() {
        let m = with_prelude(
            r#"trace { major = 1; minor = 8; byte_order = le; };
            struct compact { uint32_t timestamp; };
            struct extended { uint32_t id; uint64_t timestamp; };
            variant hdr { struct compact compact; struct extended extended; };
            stream {
                typealias integer { size = 27; align = 1; signed = false; map = clock.monotonic.value; } := uint27_clock_t;
                packet.context := struct { uint8_t count; uint16_t values[count]; uint8_t grid[2][3]; };
                event.header := struct {
                    enum : uint8_t { compact = 0 ... 30, extended = 31 } id;
                    variant hdr <id> v;
                    uint27_clock_t ts;
                } align(32);
            };"#,
        )
        .unwrap();
        let s = m.stream(StreamId(0)).unwrap();
        assert_eq!(s.event_header.min_alignment, 32);
        let TypeDescriptor::Variant(v) = s.event_header.field("v").unwrap() else {
            panic!("expected a variant");
        };
        assert_eq!(v.tag.as_deref(), Some("id"));
        assert_eq!(
            v.options.iter().map(|o| o.name.as_str()).collect::<Vec<_>>(),
            vec!["compact", "extended"]
        );
        let TypeDescriptor::Integer(ts) = s.event_header.field("ts").unwrap() else {
            panic!("expected an integer");
        };
        assert_eq!((ts.size, ts.alignment), (27, 1));
        assert_eq!(ts.mapped_clock.as_deref(), Some("monotonic"));

        let TypeDescriptor::Array(values) = s.packet_context.field("values").unwrap() else {
            panic!("expected an array");
        };
        assert_eq!(values.length, ArrayLength::Field("count".into()));
        let TypeDescriptor::Array(grid) = s.packet_context.field("grid").unwrap() else {
            panic!("expected an array");
        };
        assert_eq!(grid.length, ArrayLength::Fixed(2));
        assert!(matches!(&*grid.element,
            TypeDescriptor::Array(inner) if inner.length == ArrayLength::Fixed(3)));

        // Stream-local aliases do not leak
        assert!(matches!(
            with_prelude(
                "trace { major = 1; minor = 8; byte_order = le; };
                 stream { typealias integer { size = 3; } := local_t; packet.context := struct { local_t a; }; event.header := struct { local_t b; }; };
                 event { fields := struct { local_t c; }; };"
            ),
            Err(Error::Metadata(MetadataError::UnknownType(ref t))) if t == "local_t"
        ));
    }

    #[test]
    fn integer_attributes() {
        let m = with_prelude(
            r#"trace { major = 1; minor = 8; byte_order = le; };
            typealias integer { size = 8; encoding = UTF8; base = hex; byte_order = network; } := c_t;
            typealias floating_point { exp_dig = 11; mant_dig = 53; align = 64; } := double;
            stream {
                packet.context := struct { c_t c; double d; };
                event.header := struct { uint8_t id; };
            };"#,
        )
        .unwrap();
        let s = m.stream(StreamId(0)).unwrap();
        let TypeDescriptor::Integer(c) = s.packet_context.field("c").unwrap() else {
            panic!("expected an integer");
        };
        assert!(c.is_character());
        assert_eq!(c.base, 16);
        assert_eq!(c.byte_order, ByteOrder::BigEndian);
        let TypeDescriptor::Float(d) = s.packet_context.field("d").unwrap() else {
            panic!("expected a float");
        };
        assert_eq!((d.exp_dig, d.mant_dig, d.alignment), (11, 53, 64));
        assert_eq!(d.byte_order, ByteOrder::LittleEndian);

        assert!(matches!(
            with_prelude("trace { major = 1; minor = 8; byte_order = le; }; typealias integer { size = 65; } := x;"),
            Err(Error::UnsupportedValue(UnsupportedValueError::IntegerSize(65)))
        ));
        assert!(matches!(
            with_prelude("trace { major = 1; minor = 8; byte_order = le; }; typealias integer { align = 8; } := x;"),
            Err(Error::Metadata(MetadataError::MissingProperty { scope: "integer", property: "size" }))
        ));
        assert!(matches!(
            with_prelude("trace { major = 1; minor = 8; byte_order = le; }; typealias floating_point { exp_dig = 5; mant_dig = 11; } := half;"),
            Err(Error::UnsupportedValue(UnsupportedValueError::FloatSize { .. }))
        ));
    }
}
