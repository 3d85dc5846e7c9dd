//! Declared constructor signatures and the parameter schemas derived from them.
//!
//! A [`Signature`] is what a registered type says about its constructor, in
//! declaration order and including the receiver. A [`ParameterSchema`] is the
//! normalized view produced by [`crate::introspect`], which the CLI turns
//! into flags and the backends use to bind raw flag strings.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::ConfigurationError;
use crate::value::{Kwargs, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Str,
    Int,
    Float,
    Bool,
}

impl Primitive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::Str => "str",
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Bool => "bool",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type annotation attached to a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    Primitive(Primitive),
    /// Another type, looked up by name in the catalog.
    Named(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// The implicit instance receiver.
    Receiver,
    Positional,
    /// Captures remaining positional arguments.
    VarPositional,
    /// Captures remaining keyword arguments.
    VarKeyword,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum ParamDefault {
    /// No default; the caller must supply a value.
    Required,
    /// Optional with no value when omitted.
    Absent,
    Value(Value),
}

impl ParamDefault {
    pub fn is_required(&self) -> bool {
        matches!(self, ParamDefault::Required)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Option<TypeRef>,
    pub default: ParamDefault,
}

/// Declared constructor of a registered type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    pub params: Vec<ParamDecl>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature of a method taking only the receiver.
    pub fn receiver_only() -> Self {
        Self::new().receiver()
    }

    pub fn receiver(self) -> Self {
        self.push("self", ParamKind::Receiver, None, ParamDefault::Required)
    }

    pub fn required(self, name: &str, ty: TypeRef) -> Self {
        self.push(name, ParamKind::Positional, Some(ty), ParamDefault::Required)
    }

    pub fn optional(self, name: &str, ty: TypeRef) -> Self {
        self.push(name, ParamKind::Positional, Some(ty), ParamDefault::Absent)
    }

    pub fn with_default(self, name: &str, ty: TypeRef, default: impl Into<Value>) -> Self {
        self.push(
            name,
            ParamKind::Positional,
            Some(ty),
            ParamDefault::Value(default.into()),
        )
    }

    /// Parameter declared without a type annotation.
    pub fn untyped(self, name: &str, default: ParamDefault) -> Self {
        self.push(name, ParamKind::Positional, None, default)
    }

    pub fn var_args(self, name: &str) -> Self {
        self.push(name, ParamKind::VarPositional, None, ParamDefault::Absent)
    }

    pub fn var_kwargs(self, name: &str) -> Self {
        self.push(name, ParamKind::VarKeyword, None, ParamDefault::Absent)
    }

    fn push(
        mut self,
        name: &str,
        kind: ParamKind,
        annotation: Option<TypeRef>,
        default: ParamDefault,
    ) -> Self {
        self.params.push(ParamDecl {
            name: name.to_string(),
            kind,
            annotation,
            default,
        });
        self
    }
}

/// Shorthands for the common annotations.
pub const STR: TypeRef = TypeRef::Primitive(Primitive::Str);
pub const INT: TypeRef = TypeRef::Primitive(Primitive::Int);
pub const FLOAT: TypeRef = TypeRef::Primitive(Primitive::Float);
pub const BOOL: TypeRef = TypeRef::Primitive(Primitive::Bool);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ParamType {
    Primitive {
        primitive: Primitive,
    },
    Object {
        type_name: String,
    },
    Unannotated,
    Variadic,
    Nested {
        type_name: String,
        schema: ParameterSchema,
    },
}

impl ParamType {
    /// Whether a command-line flag can carry a value for this parameter.
    pub fn is_bindable(&self) -> bool {
        matches!(
            self,
            ParamType::Primitive { .. } | ParamType::Object { .. } | ParamType::Unannotated
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(flatten)]
    pub ty: ParamType,
    pub default: ParamDefault,
}

impl Parameter {
    /// Coerce a raw flag string according to the declared type.
    pub fn coerce(&self, raw: &str) -> Result<Value, ConfigurationError> {
        match &self.ty {
            ParamType::Primitive { primitive } => Value::parse_as(&self.name, raw, *primitive),
            ParamType::Object { .. } => Ok(Value::Str(raw.to_string())),
            _ => Ok(Value::from_token(raw)),
        }
    }

    /// Short type label used in help output.
    pub fn type_label(&self) -> String {
        match &self.ty {
            ParamType::Primitive { primitive } => primitive.to_string(),
            ParamType::Object { type_name } => type_name.clone(),
            ParamType::Unannotated => "any".to_string(),
            ParamType::Variadic => "...".to_string(),
            ParamType::Nested { type_name, .. } => type_name.clone(),
        }
    }
}

/// Normalized, receiver-free view of a constructor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterSchema {
    params: Vec<Parameter>,
}

impl ParameterSchema {
    pub fn new(params: Vec<Parameter>) -> Self {
        Self { params }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn has_variadic_capture(&self) -> bool {
        self.params
            .iter()
            .any(|p| matches!(p.ty, ParamType::Variadic))
    }

    /// Parameters that can be supplied as command-line flags.
    pub fn bindable(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| p.ty.is_bindable())
    }

    /// Bind raw flag strings to the bindable parameters.
    ///
    /// Values are coerced by declared type, defaults fill omitted parameters,
    /// and a required parameter without a value is an error. Raw entries that
    /// do not name a parameter of this schema are ignored.
    pub fn bind(&self, raw: &IndexMap<String, String>) -> Result<Kwargs, ConfigurationError> {
        let mut bound = Kwargs::new();
        for param in self.bindable() {
            match raw.get(&param.name) {
                Some(value) => {
                    bound.insert(param.name.clone(), param.coerce(value)?);
                }
                None => match &param.default {
                    ParamDefault::Value(value) => {
                        bound.insert(param.name.clone(), value.clone());
                    }
                    ParamDefault::Absent => {}
                    ParamDefault::Required => {
                        return Err(ConfigurationError::MissingArgument(param.name.clone()));
                    }
                },
            }
        }
        Ok(bound)
    }
}

impl<'a> IntoIterator for &'a ParameterSchema {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

impl fmt::Display for ParameterSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match &param.ty {
                ParamType::Variadic => write!(f, "**{}", param.name)?,
                ParamType::Unannotated => f.write_str(&param.name)?,
                ParamType::Nested { type_name, schema } => {
                    write!(f, "{}: {}{}", param.name, type_name, schema)?
                }
                _ => write!(f, "{}: {}", param.name, param.type_label())?,
            }
            if let ParamDefault::Value(value) = &param.default {
                write!(f, " = {value}")?;
            }
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, ty: ParamType, default: ParamDefault) -> Parameter {
        Parameter {
            name: name.to_string(),
            ty,
            default,
        }
    }

    fn int() -> ParamType {
        ParamType::Primitive {
            primitive: Primitive::Int,
        }
    }

    fn raw(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_signature_builder_keeps_declaration_order() {
        let sig = Signature::new()
            .receiver()
            .required("host", STR)
            .with_default("port", INT, 6379)
            .untyped("tag", ParamDefault::Absent)
            .var_kwargs("kwargs");

        let names: Vec<&str> = sig.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["self", "host", "port", "tag", "kwargs"]);
        assert_eq!(sig.params[0].kind, ParamKind::Receiver);
        assert_eq!(sig.params[3].annotation, None);
        assert_eq!(sig.params[4].kind, ParamKind::VarKeyword);
    }

    #[test]
    fn test_bind_applies_defaults_and_coerces() {
        let schema = ParameterSchema::new(vec![
            param(
                "redis_host",
                ParamType::Primitive {
                    primitive: Primitive::Str,
                },
                ParamDefault::Required,
            ),
            param("redis_port", int(), ParamDefault::Value(Value::Int(6379))),
            param("redis_db", int(), ParamDefault::Value(Value::Int(0))),
        ]);

        let bound = schema
            .bind(&raw(&[("redis_host", "localhost"), ("redis_db", "3"), ("other", "x")]))
            .unwrap();
        assert_eq!(bound.get("redis_host"), Some(&Value::Str("localhost".into())));
        assert_eq!(bound.get("redis_port"), Some(&Value::Int(6379)));
        assert_eq!(bound.get("redis_db"), Some(&Value::Int(3)));
        assert!(!bound.contains_key("other"));
    }

    #[test]
    fn test_bind_rejects_missing_required() {
        let schema = ParameterSchema::new(vec![param(
            "prometheus_gateway",
            ParamType::Primitive {
                primitive: Primitive::Str,
            },
            ParamDefault::Required,
        )]);
        assert_eq!(
            schema.bind(&IndexMap::new()).unwrap_err(),
            ConfigurationError::MissingArgument("prometheus_gateway".into())
        );
    }

    #[test]
    fn test_bind_skips_nested_and_variadic() {
        let schema = ParameterSchema::new(vec![
            param(
                "output",
                ParamType::Nested {
                    type_name: "Output".into(),
                    schema: ParameterSchema::default(),
                },
                ParamDefault::Required,
            ),
            param("kwargs", ParamType::Variadic, ParamDefault::Absent),
            param("tag", ParamType::Unannotated, ParamDefault::Absent),
        ]);

        let bound = schema.bind(&raw(&[("tag", "12"), ("kwargs", "x")])).unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound.get("tag"), Some(&Value::Int(12)));
        assert!(schema.has_variadic_capture());
    }

    #[test]
    fn test_display_renders_nested_schema() {
        let schema = ParameterSchema::new(vec![
            param(
                "output",
                ParamType::Nested {
                    type_name: "Output".into(),
                    schema: ParameterSchema::default(),
                },
                ParamDefault::Required,
            ),
            param("limit", int(), ParamDefault::Value(Value::Int(10))),
            param("kwargs", ParamType::Variadic, ParamDefault::Absent),
        ]);
        assert_eq!(
            schema.to_string(),
            "(output: Output(), limit: int = 10, **kwargs)"
        );
    }
}
