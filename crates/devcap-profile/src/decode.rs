//! # Document Decoding
//!
//! Turns generic document trees into typed blocks, profiles and device
//! snapshots, resolving every struct name (or alias) to its [`StructId`]
//! and every flag name to its bits.
//!
//! Requirement documents are decoded strictly: anything the registry does
//! not define is a [`SchemaError`]. Device reports are decoded leniently:
//! drivers report vendor extensions and structs the registry may not know,
//! and those are skipped.
//!
//! ## Document shape
//!
//! ```json
//! {
//!   "capabilities": {
//!     "baseline": {
//!       "extensions": { "VK_KHR_swapchain": 70 },
//!       "features": { "VkPhysicalDeviceFeatures": { "geometryShader": true } },
//!       "properties": { "VkPhysicalDeviceProperties": { "limits": { "maxImageDimension2D": 4096 } } },
//!       "formats": { "VK_FORMAT_R8G8B8A8_UNORM": { "VkFormatProperties": { "bufferFeatures": ["VK_FORMAT_FEATURE_VERTEX_BUFFER_BIT"] } } },
//!       "queueFamiliesProperties": [ { "VkQueueFamilyProperties": { "queueFlags": ["VK_QUEUE_GRAPHICS_BIT"] } } ],
//!       "videoProfiles": [ { "profile": { "chromaSubsampling": "4:2:0", "lumaBitDepth": "*" },
//!                            "capabilities": { }, "formats": [ ] } ]
//!     }
//!   },
//!   "profiles": {
//!     "VP_EXAMPLE": { "version": 1, "api-version": "1.3.204", "profiles": [],
//!                     "capabilities": [ "baseline", [ "alt_a", "alt_b" ] ] }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value as Json};

use devcap_core::diagnostic::{child_path, index_path};
use devcap_core::{ApiVersion, Fields, SchemaError, StructId, Value};
use devcap_registry::{FieldSpec, Registry, ValueType};

use crate::block::{CapabilityBlock, StructValues};
use crate::device::DeviceCapabilities;
use crate::profile::{Profile, ProfileSet, Slot};
use crate::video::{
    ActualVideoProfile, AxisValue, VideoProfileAxis, VideoProfileDecl, VideoProfileInstance,
};

/// Axis coordinate spelling of a wildcard.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Requirement documents: unknown names are errors.
    Requirement,
    /// Device reports: unknown names are skipped.
    Report,
}

/// The serde form of one profile entry.
#[derive(Debug, Deserialize)]
struct ProfileDoc {
    #[serde(default)]
    version: u32,
    #[serde(rename = "api-version")]
    api_version: ApiVersion,
    #[serde(default)]
    description: String,
    #[serde(default)]
    profiles: Vec<String>,
    capabilities: Vec<Slot>,
    #[serde(default)]
    optionals: Vec<Slot>,
    #[serde(default)]
    fallback: Vec<String>,
}

/// Decodes document trees against a registry.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'r> {
    registry: &'r Registry,
}

impl<'r> Decoder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Decode a document holding `capabilities` and/or `profiles`.
    ///
    /// References between profiles and blocks are checked within the
    /// document; use [`ProfileSet::extend`] and
    /// [`ProfileSet::check_references`] to combine several documents.
    pub fn profile_document(&self, tree: &Json) -> Result<ProfileSet, SchemaError> {
        let root = object("", tree)?;
        let mut set = ProfileSet::new();

        if let Some(blocks) = root.get("capabilities") {
            for (name, body) in object("capabilities", blocks)? {
                set.insert_block(self.block(name, body)?)?;
            }
        }
        if let Some(profiles) = root.get("profiles") {
            for (label, body) in object("profiles", profiles)? {
                set.insert_profile(self.profile(label, body)?)?;
            }
        }

        tracing::debug!(
            blocks = set.blocks().count(),
            profiles = set.profiles().count(),
            "decoded profile document"
        );
        Ok(set)
    }

    /// Decode a whole profile set and check its references.
    pub fn profile_set(&self, tree: &Json) -> Result<ProfileSet, SchemaError> {
        let set = self.profile_document(tree)?;
        set.check_references()?;
        Ok(set)
    }

    pub fn profile(&self, label: &str, tree: &Json) -> Result<Profile, SchemaError> {
        let doc: ProfileDoc =
            serde_json::from_value(tree.clone()).map_err(|e| SchemaError::InvalidDocument {
                path: child_path("profiles", label),
                detail: e.to_string(),
            })?;
        Ok(Profile {
            label: label.to_string(),
            version: doc.version,
            api_version: doc.api_version,
            description: doc.description,
            required: doc.profiles,
            slots: doc.capabilities,
            optionals: doc.optionals,
            fallbacks: doc.fallback,
        })
    }

    pub fn block(&self, name: &str, tree: &Json) -> Result<CapabilityBlock, SchemaError> {
        let path = child_path("capabilities", name);
        let body = object(&path, tree)?;
        let mut block = CapabilityBlock::new(name);
        let mode = Mode::Requirement;

        for (key, value) in body {
            let at = child_path(&path, key);
            match key.as_str() {
                "extensions" => block.extensions = self.extensions(&at, value, mode)?,
                "features" => block.features = self.struct_values(&at, value, mode)?,
                "properties" => block.properties = self.struct_values(&at, value, mode)?,
                "formats" => block.formats = self.formats(&at, value, mode)?,
                "queueFamiliesProperties" => {
                    block.queue_families = self.queue_families(&at, value, mode)?
                }
                "videoProfiles" => block.video_profiles = self.video_decls(&at, value)?,
                _ => {
                    return Err(SchemaError::InvalidDocument {
                        path: at,
                        detail: "unknown capability category".into(),
                    })
                }
            }
        }
        Ok(block)
    }

    /// Decode a device report.
    pub fn device(&self, tree: &Json) -> Result<DeviceCapabilities, SchemaError> {
        let body = object("device", tree)?;
        let mode = Mode::Report;
        let mut device = DeviceCapabilities::default();

        for (key, value) in body {
            let at = child_path("device", key);
            match key.as_str() {
                "api-version" | "apiVersion" => device.api_version = api_version(&at, value)?,
                "extensions" => device.extensions = self.extensions(&at, value, mode)?,
                "features" => device.features = self.struct_values(&at, value, mode)?,
                "properties" => device.properties = self.struct_values(&at, value, mode)?,
                "formats" => device.formats = self.formats(&at, value, mode)?,
                "queueFamiliesProperties" => {
                    device.queue_families = self.queue_families(&at, value, mode)?
                }
                "videoProfiles" => device.video_profiles = self.video_actuals(&at, value)?,
                _ => tracing::debug!(path = %at, "skipping unknown device report section"),
            }
        }
        Ok(device)
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    fn extensions(
        &self,
        path: &str,
        tree: &Json,
        mode: Mode,
    ) -> Result<BTreeMap<String, u32>, SchemaError> {
        let mut out = BTreeMap::new();
        for (name, version) in object(path, tree)? {
            let at = child_path(path, name);
            if self.registry.extension_version(name).is_none() {
                if mode == Mode::Report {
                    tracing::debug!(extension = %name, "skipping unknown reported extension");
                    continue;
                }
                return Err(SchemaError::UnknownExtension {
                    name: name.clone(),
                    path: at,
                });
            }
            let version = version
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| invalid(&at, "extension spec version must be an unsigned integer"))?;
            out.insert(name.clone(), version);
        }
        Ok(out)
    }

    fn struct_values(&self, path: &str, tree: &Json, mode: Mode) -> Result<StructValues, SchemaError> {
        let mut out = StructValues::new();
        for (name, body) in object(path, tree)? {
            let at = child_path(path, name);
            let Some(id) = self.registry.resolve(name) else {
                if mode == Mode::Report {
                    tracing::debug!(structure = %name, "skipping unknown reported struct");
                    continue;
                }
                return Err(SchemaError::UnknownStruct {
                    name: name.clone(),
                    path: at,
                });
            };
            let fields = self.fields(id, &at, body, mode)?;
            // Alias and canonical spellings land on one key.
            match out.get_mut(&id) {
                Some(existing) => existing.extend(fields),
                None => {
                    out.insert(id, fields);
                }
            }
        }
        Ok(out)
    }

    fn formats(
        &self,
        path: &str,
        tree: &Json,
        mode: Mode,
    ) -> Result<BTreeMap<String, StructValues>, SchemaError> {
        let mut out = BTreeMap::new();
        for (format, body) in object(path, tree)? {
            let at = child_path(path, format);
            if !self.registry.has_format(format) {
                if mode == Mode::Report {
                    continue;
                }
                return Err(SchemaError::UnknownFormat {
                    name: format.clone(),
                    path: at,
                });
            }
            out.insert(format.clone(), self.struct_values(&at, body, mode)?);
        }
        Ok(out)
    }

    fn queue_families(
        &self,
        path: &str,
        tree: &Json,
        mode: Mode,
    ) -> Result<Vec<StructValues>, SchemaError> {
        array(path, tree)?
            .iter()
            .enumerate()
            .map(|(i, family)| self.struct_values(&index_path(path, i), family, mode))
            .collect()
    }

    fn video_decls(&self, path: &str, tree: &Json) -> Result<Vec<VideoProfileDecl>, SchemaError> {
        let mut out = Vec::new();
        for (i, entry) in array(path, tree)?.iter().enumerate() {
            let at = index_path(path, i);
            let (axis_tree, capabilities, formats) =
                self.video_entry(&at, entry, Mode::Requirement)?;
            out.push(VideoProfileDecl {
                axis: self.axis(&child_path(&at, "profile"), axis_tree)?,
                capabilities,
                formats,
            });
        }
        Ok(out)
    }

    fn video_actuals(&self, path: &str, tree: &Json) -> Result<Vec<ActualVideoProfile>, SchemaError> {
        let mut out = Vec::new();
        for (i, entry) in array(path, tree)?.iter().enumerate() {
            let at = index_path(path, i);
            let (axis_tree, capabilities, formats) = self.video_entry(&at, entry, Mode::Report)?;
            out.push(ActualVideoProfile {
                instance: self.instance(&child_path(&at, "profile"), axis_tree)?,
                capabilities,
                formats,
            });
        }
        Ok(out)
    }

    fn video_entry<'t>(
        &self,
        path: &str,
        tree: &'t Json,
        mode: Mode,
    ) -> Result<(&'t Json, StructValues, Vec<StructValues>), SchemaError> {
        let body = object(path, tree)?;
        let axis = body
            .get("profile")
            .ok_or_else(|| invalid(path, "video profile entry has no \"profile\""))?;
        let capabilities = match body.get("capabilities") {
            Some(caps) => self.struct_values(&child_path(path, "capabilities"), caps, mode)?,
            None => StructValues::new(),
        };
        let formats = match body.get("formats") {
            Some(formats) => {
                let at = child_path(path, "formats");
                array(&at, formats)?
                    .iter()
                    .enumerate()
                    .map(|(i, f)| self.struct_values(&index_path(&at, i), f, mode))
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => Vec::new(),
        };
        Ok((axis, capabilities, formats))
    }

    fn axis(&self, path: &str, tree: &Json) -> Result<VideoProfileAxis, SchemaError> {
        let mut dims = BTreeMap::new();
        for (name, value) in object(path, tree)? {
            let at = child_path(path, name);
            let text = axis_text(&at, value)?;
            let value = if text == WILDCARD {
                AxisValue::Any
            } else {
                self.check_axis_value(&at, name, &text)?;
                AxisValue::Is(text)
            };
            dims.insert(name.clone(), value);
        }
        Ok(VideoProfileAxis { dims })
    }

    fn instance(&self, path: &str, tree: &Json) -> Result<VideoProfileInstance, SchemaError> {
        let mut dims = BTreeMap::new();
        for (name, value) in object(path, tree)? {
            let at = child_path(path, name);
            let text = axis_text(&at, value)?;
            if text == WILDCARD {
                return Err(invalid(&at, "reported video profiles must be concrete"));
            }
            dims.insert(name.clone(), text);
        }
        Ok(VideoProfileInstance { dims })
    }

    /// Axis names and values must come from the registry's catalog when it
    /// defines axes at all.
    fn check_axis_value(&self, path: &str, axis: &str, value: &str) -> Result<(), SchemaError> {
        let video = self.registry.video();
        if video.axes.is_empty() {
            return Ok(());
        }
        let spec = video
            .axis(axis)
            .ok_or_else(|| invalid(path, "unknown video profile axis"))?;
        if !spec.values.is_empty() && !spec.values.iter().any(|v| v == value) {
            return Err(invalid(path, &format!("{value:?} is not a value of axis {axis}")));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Members
    // -----------------------------------------------------------------------

    fn fields(&self, id: StructId, path: &str, tree: &Json, mode: Mode) -> Result<Fields, SchemaError> {
        let spec = self.registry.spec(id).ok_or_else(|| SchemaError::UnknownStruct {
            name: id.to_string(),
            path: path.to_string(),
        })?;
        let mut out = Fields::new();
        for (member, raw) in object(path, tree)? {
            let at = child_path(path, member);
            let Some(field) = spec.member(member) else {
                if mode == Mode::Report {
                    continue;
                }
                return Err(SchemaError::UnknownMember {
                    structure: spec.name.clone(),
                    member: member.clone(),
                    path: at,
                });
            };
            out.insert(member.clone(), self.value(field, &at, raw, mode)?);
        }
        Ok(out)
    }

    fn value(&self, field: &FieldSpec, path: &str, raw: &Json, mode: Mode) -> Result<Value, SchemaError> {
        let Some(cap) = field.array_cap() else {
            return self.element(field, path, raw, mode);
        };
        let items = raw
            .as_array()
            .ok_or_else(|| invalid(path, "expected an array"))?;
        if items.len() > cap {
            return Err(invalid(
                path,
                &format!("{} elements exceed the array capacity {cap}", items.len()),
            ));
        }
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.element(field, &index_path(path, i), item, mode))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn element(&self, field: &FieldSpec, path: &str, raw: &Json, mode: Mode) -> Result<Value, SchemaError> {
        let mismatch = || invalid(path, &format!("expected {}, got {raw}", field.value_type));
        match &field.value_type {
            ValueType::Bool => raw.as_bool().map(Value::Bool).ok_or_else(mismatch),
            ValueType::Int => raw.as_i64().map(Value::Int).ok_or_else(mismatch),
            ValueType::Uint => raw.as_u64().map(Value::Uint).ok_or_else(mismatch),
            ValueType::Float => raw.as_f64().map(Value::Float).ok_or_else(mismatch),
            ValueType::Str => raw
                .as_str()
                .map(|s| Value::Str(s.to_string()))
                .ok_or_else(mismatch),
            ValueType::Enum(enumeration) => {
                let name = raw.as_str().ok_or_else(mismatch)?;
                if !self.registry.has_enumerant(enumeration, name) {
                    return Err(SchemaError::UnknownEnumerant {
                        value: name.to_string(),
                        enumeration: enumeration.clone(),
                        path: path.to_string(),
                    });
                }
                Ok(Value::Enum(name.to_string()))
            }
            ValueType::Flags(set) => self.flags(set, path, raw).map(Value::Flags),
            ValueType::Struct(_) => {
                let id = field.nested.ok_or_else(mismatch)?;
                self.fields(id, path, raw, mode).map(Value::Struct)
            }
        }
    }

    /// Flags are written as a list of names, a single name, or raw bits.
    fn flags(&self, set: &str, path: &str, raw: &Json) -> Result<u64, SchemaError> {
        let lookup = |name: &str| {
            self.registry
                .flag_bits(set, name)
                .ok_or_else(|| SchemaError::UnknownFlag {
                    flag: name.to_string(),
                    flag_set: set.to_string(),
                    path: path.to_string(),
                })
        };
        match raw {
            Json::Number(n) => n
                .as_u64()
                .ok_or_else(|| invalid(path, "flag bits must be an unsigned integer")),
            Json::String(name) => lookup(name),
            Json::Array(names) => names.iter().try_fold(0u64, |acc, name| {
                let name = name
                    .as_str()
                    .ok_or_else(|| invalid(path, "flag names must be strings"))?;
                Ok(acc | lookup(name)?)
            }),
            _ => Err(invalid(path, "expected flag names")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tree helpers
// ---------------------------------------------------------------------------

fn invalid(path: &str, detail: &str) -> SchemaError {
    SchemaError::InvalidValue {
        path: path.to_string(),
        detail: detail.to_string(),
    }
}

fn object<'t>(path: &str, tree: &'t Json) -> Result<&'t Map<String, Json>, SchemaError> {
    tree.as_object().ok_or_else(|| SchemaError::InvalidDocument {
        path: path.to_string(),
        detail: "expected an object".into(),
    })
}

fn array<'t>(path: &str, tree: &'t Json) -> Result<&'t Vec<Json>, SchemaError> {
    tree.as_array().ok_or_else(|| SchemaError::InvalidDocument {
        path: path.to_string(),
        detail: "expected an array".into(),
    })
}

/// Axis coordinates may be written as strings or numbers (bit depths).
fn axis_text(path: &str, value: &Json) -> Result<String, SchemaError> {
    match value {
        Json::String(s) => Ok(s.clone()),
        Json::Number(n) => Ok(n.to_string()),
        _ => Err(invalid(path, "axis coordinate must be a string or number")),
    }
}

/// Versions are written as `"1.3.204"` or as the packed 32-bit encoding.
fn api_version(path: &str, value: &Json) -> Result<ApiVersion, SchemaError> {
    match value {
        Json::String(s) => s.parse().map_err(|e: devcap_core::ValueError| invalid(path, &e.to_string())),
        Json::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(ApiVersion::from_packed)
            .ok_or_else(|| invalid(path, "packed version must fit in 32 bits")),
        _ => Err(invalid(path, "expected a version")),
    }
}
