//! # Struct and Member Specifications
//!
//! [`FieldSpec`] describes one member: its value type, its limit type,
//! whether it is an array (and of what capacity), and whether simulation
//! may override it. [`StructSpec`] is a canonical struct with its aliases,
//! members, provenance and chain-root relations.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use devcap_core::{ApiVersion, LimitType, StructId, ValueError};

// ---------------------------------------------------------------------------
// ValueType
// ---------------------------------------------------------------------------

/// Declared type of a member.
///
/// Written in schemas as `bool`, `int`, `uint`, `float`, `string`,
/// `flags:<FlagSet>`, `enum:<Enumeration>` or `struct:<StructName>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    Bool,
    Int,
    Uint,
    Float,
    Str,
    Flags(String),
    Enum(String),
    Struct(String),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Uint => f.write_str("uint"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("string"),
            Self::Flags(set) => write!(f, "flags:{set}"),
            Self::Enum(name) => write!(f, "enum:{name}"),
            Self::Struct(name) => write!(f, "struct:{name}"),
        }
    }
}

impl FromStr for ValueType {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValueError::InvalidType(s.to_string());
        match s.split_once(':') {
            None => match s {
                "bool" => Ok(Self::Bool),
                "int" => Ok(Self::Int),
                "uint" => Ok(Self::Uint),
                "float" => Ok(Self::Float),
                "string" => Ok(Self::Str),
                _ => Err(invalid()),
            },
            Some((_, "")) => Err(invalid()),
            Some(("flags", name)) => Ok(Self::Flags(name.to_string())),
            Some(("enum", name)) => Ok(Self::Enum(name.to_string())),
            Some(("struct", name)) => Ok(Self::Struct(name.to_string())),
            Some(_) => Err(invalid()),
        }
    }
}

impl TryFrom<String> for ValueType {
    type Error = ValueError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ValueType> for String {
    fn from(t: ValueType) -> Self {
        t.to_string()
    }
}

// ---------------------------------------------------------------------------
// FieldSpec
// ---------------------------------------------------------------------------

/// Array shape of a member.
///
/// `len` is the fixed size, or the cap of a dynamically sized array whose
/// live length is held in `count_member`. Iteration never goes past `len`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArraySpec {
    pub len: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_member: Option<String>,
}

/// One struct member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub limit: LimitType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array: Option<ArraySpec>,
    /// Simulation may replace the reported value.
    #[serde(default = "default_true")]
    pub modifiable: bool,
    /// Interned id of the nested struct type, resolved at registry load.
    #[serde(skip)]
    pub nested: Option<StructId>,
}

fn default_true() -> bool {
    true
}

impl FieldSpec {
    /// A scalar member, mostly for tests and programmatic registries.
    pub fn scalar(name: impl Into<String>, value_type: ValueType, limit: LimitType) -> Self {
        Self {
            name: name.into(),
            value_type,
            limit,
            array: None,
            modifiable: true,
            nested: None,
        }
    }

    pub fn with_array(mut self, len: usize, count_member: Option<&str>) -> Self {
        self.array = Some(ArraySpec {
            len,
            count_member: count_member.map(str::to_string),
        });
        self
    }

    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }

    /// Maximum number of elements walked for this member.
    pub fn array_cap(&self) -> Option<usize> {
        self.array.as_ref().map(|a| a.len)
    }

    pub fn flag_set(&self) -> Option<&str> {
        match &self.value_type {
            ValueType::Flags(set) => Some(set),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Where a struct comes from: a minimum core version and/or the extensions
/// that define it. Either source suffices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ApiVersion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
}

impl Provenance {
    /// Whether a plan with `baseline` and extension predicate `has_ext`
    /// makes this struct available. Empty provenance is always available.
    pub fn is_satisfied_by(&self, baseline: ApiVersion, has_ext: impl Fn(&str) -> bool) -> bool {
        if self.version.is_none() && self.extensions.is_empty() {
            return true;
        }
        self.version.is_some_and(|v| baseline >= v) || self.extensions.iter().any(|e| has_ext(e))
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if let Some(v) = self.version {
            parts.push(format!("version {v}"));
        }
        parts.extend(self.extensions.iter().cloned());
        if parts.is_empty() {
            f.write_str("nothing")
        } else {
            f.write_str(&parts.join(" or "))
        }
    }
}

// ---------------------------------------------------------------------------
// StructSpec
// ---------------------------------------------------------------------------

/// A canonical struct, built by the registry.
#[derive(Debug, Clone)]
pub struct StructSpec {
    pub id: StructId,
    pub name: String,
    pub aliases: Vec<String>,
    pub members: Vec<FieldSpec>,
    pub provenance: Provenance,
    /// Chain roots this struct extends.
    pub extends: Vec<StructId>,
    member_index: HashMap<String, usize>,
}

impl StructSpec {
    pub(crate) fn new(
        id: StructId,
        name: String,
        members: Vec<FieldSpec>,
        provenance: Provenance,
    ) -> Self {
        let member_index = members
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();
        Self {
            id,
            name,
            aliases: Vec::new(),
            members,
            provenance,
            extends: Vec::new(),
            member_index,
        }
    }

    pub fn member(&self, name: &str) -> Option<&FieldSpec> {
        self.member_index.get(name).map(|&i| &self.members[i])
    }

    pub(crate) fn member_mut(&mut self, name: &str) -> Option<&mut FieldSpec> {
        let i = *self.member_index.get(name)?;
        self.members.get_mut(i)
    }
}
