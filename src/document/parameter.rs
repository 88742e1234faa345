//! Typed parameters that drive condition evaluation and blend weights.
//!
//! A parameter is declared once per document with a kind and a default value.
//! Conditions and blend fields reference parameters by handle; when a document
//! is nested inside another, [`ParameterLink`] entries on the host record which
//! host parameter feeds each parameter the nested document actually uses.

use super::ids::{DocumentId, ParameterId, StateId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of parameter kinds.
///
/// Dispatched by pattern match so the mutation engine and the dependency
/// resolver handle every kind exhaustively at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    Float,
    Int,
    Bool,
    Trigger,
}

impl ParameterKind {
    /// Display name for inspectors and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Float => "Float",
            Self::Int => "Int",
            Self::Bool => "Bool",
            Self::Trigger => "Trigger",
        }
    }

    /// The zero value of this kind, used when a parameter is first created.
    pub fn default_value(&self) -> ParameterValue {
        match self {
            Self::Float => ParameterValue::Float(0.0),
            Self::Int => ParameterValue::Int(0),
            Self::Bool => ParameterValue::Bool(false),
            Self::Trigger => ParameterValue::Trigger,
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value typed to one of the parameter kinds.
///
/// Triggers carry no payload: they are consumed edges, not levels, so their
/// "value" is the fact of having been set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Trigger,
}

impl ParameterValue {
    /// The kind this value belongs to.
    pub fn kind(&self) -> ParameterKind {
        match self {
            Self::Float(_) => ParameterKind::Float,
            Self::Int(_) => ParameterKind::Int,
            Self::Bool(_) => ParameterKind::Bool,
            Self::Trigger => ParameterKind::Trigger,
        }
    }
}

/// A parameter declaration owned by a document.
///
/// Names are unique within their document but not globally; the handle is the
/// real identity. The default value fixes the parameter's kind for life — the
/// mutation engine rejects defaults of a different kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    id: ParameterId,
    name: String,
    default: ParameterValue,
}

impl ParameterDef {
    pub(crate) fn new(kind: ParameterKind, name: String) -> Self {
        Self {
            id: ParameterId::new(),
            name,
            default: kind.default_value(),
        }
    }

    pub fn id(&self) -> ParameterId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParameterKind {
        self.default.kind()
    }

    pub fn default_value(&self) -> ParameterValue {
        self.default
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_default(&mut self, value: ParameterValue) {
        debug_assert_eq!(value.kind(), self.default.kind());
        self.default = value;
    }
}

/// A recorded correspondence between a parameter used inside a nested document
/// and a parameter owned by the host.
///
/// Links live on the host document, scoped to the sub-machine state that embeds
/// the nested document. The link, not the name, carries the semantic binding:
/// a host `Float` named differently can drive a nested `Float` requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterLink {
    /// The sub-machine state on the host that embeds the nested document.
    pub sub_state: StateId,
    /// The document that declares the linked-from parameter.
    pub child_document: DocumentId,
    /// The parameter inside the nested document hierarchy.
    pub child_parameter: ParameterId,
    /// The host parameter that drives it.
    pub host_parameter: ParameterId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_default_values_round_trip() {
        for kind in [
            ParameterKind::Float,
            ParameterKind::Int,
            ParameterKind::Bool,
            ParameterKind::Trigger,
        ] {
            assert_eq!(kind.default_value().kind(), kind);
        }
    }

    #[test]
    fn new_parameter_takes_kind_default() {
        let p = ParameterDef::new(ParameterKind::Float, "Speed".to_string());
        assert_eq!(p.name(), "Speed");
        assert_eq!(p.kind(), ParameterKind::Float);
        assert_eq!(p.default_value(), ParameterValue::Float(0.0));
    }

    #[test]
    fn set_default_keeps_kind() {
        let mut p = ParameterDef::new(ParameterKind::Int, "Gear".to_string());
        p.set_default(ParameterValue::Int(3));
        assert_eq!(p.default_value(), ParameterValue::Int(3));
        assert_eq!(p.kind(), ParameterKind::Int);
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(ParameterKind::Trigger.name(), "Trigger");
        assert_eq!(ParameterKind::Bool.to_string(), "Bool");
    }

    #[test]
    fn parameter_serializes_correctly() {
        let p = ParameterDef::new(ParameterKind::Bool, "Grounded".to_string());
        let json = serde_json::to_string(&p).unwrap();
        let back: ParameterDef = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
