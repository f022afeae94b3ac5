//! Encoding typed blocks and device snapshots back to document trees, in
//! the shape [`Decoder`](crate::Decoder) reads. Struct keys use canonical
//! names; flags are written as names where the flag set covers the bits.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value as Json};

use devcap_core::{Fields, Value};
use devcap_registry::{FieldSpec, Registry, ValueType};

use crate::block::{CapabilityBlock, StructValues};
use crate::device::DeviceCapabilities;
use crate::video::{AxisValue, VideoProfileAxis};

#[derive(Debug, Clone, Copy)]
pub struct Encoder<'r> {
    registry: &'r Registry,
}

impl<'r> Encoder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Block body, without its name.
    pub fn block(&self, block: &CapabilityBlock) -> Json {
        let mut out = Map::new();
        if !block.extensions.is_empty() {
            out.insert("extensions".into(), json!(block.extensions));
        }
        if !block.features.is_empty() {
            out.insert("features".into(), self.struct_values(&block.features));
        }
        if !block.properties.is_empty() {
            out.insert("properties".into(), self.struct_values(&block.properties));
        }
        if !block.formats.is_empty() {
            out.insert("formats".into(), self.formats(&block.formats));
        }
        if !block.queue_families.is_empty() {
            out.insert(
                "queueFamiliesProperties".into(),
                Json::Array(block.queue_families.iter().map(|f| self.struct_values(f)).collect()),
            );
        }
        if !block.video_profiles.is_empty() {
            let entries = block
                .video_profiles
                .iter()
                .map(|decl| {
                    json!({
                        "profile": axis(&decl.axis),
                        "capabilities": self.struct_values(&decl.capabilities),
                        "formats": decl.formats.iter().map(|f| self.struct_values(f)).collect::<Vec<_>>(),
                    })
                })
                .collect();
            out.insert("videoProfiles".into(), Json::Array(entries));
        }
        Json::Object(out)
    }

    pub fn device(&self, device: &DeviceCapabilities) -> Json {
        let video: Vec<Json> = device
            .video_profiles
            .iter()
            .map(|p| {
                json!({
                    "profile": p.instance.dims,
                    "capabilities": self.struct_values(&p.capabilities),
                    "formats": p.formats.iter().map(|f| self.struct_values(f)).collect::<Vec<_>>(),
                })
            })
            .collect();
        json!({
            "api-version": device.api_version.to_string(),
            "extensions": device.extensions,
            "features": self.struct_values(&device.features),
            "properties": self.struct_values(&device.properties),
            "formats": self.formats(&device.formats),
            "queueFamiliesProperties": device.queue_families.iter().map(|f| self.struct_values(f)).collect::<Vec<_>>(),
            "videoProfiles": video,
        })
    }

    pub fn struct_values(&self, values: &StructValues) -> Json {
        let mut out = Map::new();
        for (id, fields) in values {
            let Some(spec) = self.registry.spec(*id) else {
                continue;
            };
            out.insert(spec.name.clone(), self.fields(spec.members.as_slice(), fields));
        }
        Json::Object(out)
    }

    fn formats(&self, formats: &BTreeMap<String, StructValues>) -> Json {
        Json::Object(
            formats
                .iter()
                .map(|(name, values)| (name.clone(), self.struct_values(values)))
                .collect(),
        )
    }

    fn fields(&self, members: &[FieldSpec], fields: &Fields) -> Json {
        let mut out = Map::new();
        for (name, value) in fields {
            let field = members.iter().find(|m| &m.name == name);
            out.insert(name.clone(), self.value(field, value));
        }
        Json::Object(out)
    }

    fn value(&self, field: Option<&FieldSpec>, value: &Value) -> Json {
        match (value, field.map(|f| &f.value_type)) {
            (Value::Array(items), _) => {
                Json::Array(items.iter().map(|v| self.value(field, v)).collect())
            }
            (Value::Struct(inner), Some(ValueType::Struct(_))) => {
                let nested = field
                    .and_then(|f| f.nested)
                    .and_then(|id| self.registry.spec(id));
                match nested {
                    Some(spec) => self.fields(&spec.members, inner),
                    None => self.fields(&[], inner),
                }
            }
            (Value::Flags(bits), Some(ValueType::Flags(set))) => self.flags(set, *bits),
            _ => plain(value),
        }
    }

    /// Flag names when the set names every bit, raw bits otherwise.
    fn flags(&self, set: &str, bits: u64) -> Json {
        let Some(names) = self.registry.flag_set(set) else {
            return json!(bits);
        };
        let mut named: Vec<(&String, u64)> = names
            .iter()
            .filter(|(_, &b)| b != 0 && bits & b == b)
            .map(|(n, &b)| (n, b))
            .collect();
        named.sort_by_key(|&(_, b)| b);
        let covered = named.iter().fold(0u64, |acc, &(_, b)| acc | b);
        if covered != bits {
            return json!(bits);
        }
        Json::Array(named.into_iter().map(|(n, _)| Json::String(n.clone())).collect())
    }
}

fn axis(axis: &VideoProfileAxis) -> Json {
    Json::Object(
        axis.dims
            .iter()
            .map(|(k, v)| {
                let text = match v {
                    AxisValue::Any => crate::decode::WILDCARD.to_string(),
                    AxisValue::Is(s) => s.clone(),
                };
                (k.clone(), Json::String(text))
            })
            .collect(),
    )
}

fn plain(value: &Value) -> Json {
    match value {
        Value::Bool(b) => json!(b),
        Value::Int(n) => json!(n),
        Value::Uint(n) | Value::Flags(n) => json!(n),
        Value::Float(f) => json!(f),
        Value::Enum(s) | Value::Str(s) => json!(s),
        Value::Array(items) => Json::Array(items.iter().map(plain).collect()),
        Value::Struct(fields) => Json::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), plain(v)))
                .collect(),
        ),
    }
}
