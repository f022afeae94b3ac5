//! # Registry
//!
//! The validated, interned capability registry.
//!
//! ## Invariants
//!
//! - Every canonical struct name and every alias maps to exactly one
//!   [`StructId`]. Aliases point directly at canonical structs; an alias
//!   naming another alias is rejected at load.
//! - Every member type that names a struct, flag set or enumeration names
//!   one the registry defines. Nested struct types are resolved to ids here,
//!   once.
//! - A member's limit type is a property of its [`FieldSpec`], so every
//!   declaration site that reaches the member (under any alias) compares it
//!   the same way.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use devcap_core::{SchemaError, StructId};

use crate::category::Category;
use crate::schema::RegistrySchema;
use crate::spec::{StructSpec, ValueType};
use crate::video::{FieldRef, Fixup, FixupDef, FormatCategory, VideoCatalog, VideoDef};

/// Immutable capability registry. Cheap to share by reference across threads.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    structs: Vec<StructSpec>,
    names: HashMap<String, StructId>,
    flag_sets: BTreeMap<String, BTreeMap<String, u64>>,
    enums: BTreeMap<String, BTreeSet<String>>,
    formats: BTreeSet<String>,
    extensions: BTreeMap<String, u32>,
    chain_roots: BTreeMap<Category, StructId>,
    video: VideoCatalog,
}

impl Registry {
    /// Validate and intern a registry schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] for duplicate names, alias defects, and
    /// member types, chain roots or video references that name nothing.
    pub fn from_schema(schema: RegistrySchema) -> Result<Self, SchemaError> {
        let mut registry = Registry {
            flag_sets: schema.flag_sets,
            enums: schema
                .enums
                .into_iter()
                .map(|(k, v)| (k, v.into_iter().collect()))
                .collect(),
            formats: schema.formats.into_iter().collect(),
            extensions: schema.extensions,
            ..Default::default()
        };

        // Canonical names first, so alias targets can be checked against them.
        for (index, def) in schema.structs.iter().enumerate() {
            let id = u32::try_from(index)
                .map(StructId::new)
                .map_err(|_| SchemaError::InvalidDocument {
                    path: "structs".into(),
                    detail: "too many structs".into(),
                })?;
            if registry.names.insert(def.name.clone(), id).is_some() {
                return Err(SchemaError::DuplicateDefinition {
                    kind: "struct".into(),
                    name: def.name.clone(),
                });
            }
        }

        for (id, def) in registry.names_in_order(&schema.structs) {
            let mut spec = StructSpec::new(
                id,
                def.name.clone(),
                def.members.clone(),
                def.provenance.clone(),
            );
            if has_duplicate_member(&def.members) {
                return Err(SchemaError::DuplicateDefinition {
                    kind: "member".into(),
                    name: def.name.clone(),
                });
            }
            for root in &def.extends {
                let root_id =
                    registry
                        .names
                        .get(root)
                        .copied()
                        .ok_or_else(|| SchemaError::UnknownStruct {
                            name: root.clone(),
                            path: format!("structs.{}.extends", def.name),
                        })?;
                spec.extends.push(root_id);
            }
            registry.structs.push(spec);
        }

        for (alias, target) in &schema.aliases {
            if registry.names.contains_key(alias) {
                return Err(SchemaError::InvalidAlias {
                    alias: alias.clone(),
                    detail: "collides with an existing struct name".into(),
                });
            }
            if schema.aliases.contains_key(target) {
                return Err(SchemaError::InvalidAlias {
                    alias: alias.clone(),
                    detail: format!("points at alias {target:?}, not a canonical struct"),
                });
            }
            let id = *registry
                .names
                .get(target)
                .ok_or_else(|| SchemaError::UnknownStruct {
                    name: target.clone(),
                    path: format!("aliases.{alias}"),
                })?;
            registry.structs[id.index()].aliases.push(alias.clone());
        }
        for (alias, target) in &schema.aliases {
            if let Some(id) = registry.resolve(target) {
                registry.names.insert(alias.clone(), id);
            }
        }

        registry.resolve_member_types()?;

        for (category, root) in &schema.chain_roots {
            let id = registry.resolve(root).ok_or_else(|| SchemaError::UnknownStruct {
                name: root.clone(),
                path: format!("chain_roots.{category}"),
            })?;
            registry.chain_roots.insert(*category, id);
        }

        registry.video = registry.resolve_video(&schema.video)?;

        tracing::debug!(
            structs = registry.structs.len(),
            names = registry.names.len(),
            extensions = registry.extensions.len(),
            "registry loaded"
        );
        Ok(registry)
    }

    /// Decode a registry schema from a document tree and validate it.
    pub fn from_json(tree: &serde_json::Value) -> Result<Self, SchemaError> {
        let schema: RegistrySchema =
            serde_json::from_value(tree.clone()).map_err(|e| SchemaError::InvalidDocument {
                path: "registry".into(),
                detail: e.to_string(),
            })?;
        Self::from_schema(schema)
    }

    fn names_in_order<'a>(
        &self,
        defs: &'a [crate::schema::StructDef],
    ) -> Vec<(StructId, &'a crate::schema::StructDef)> {
        defs.iter()
            .filter_map(|def| self.resolve(&def.name).map(|id| (id, def)))
            .collect()
    }

    fn resolve_member_types(&mut self) -> Result<(), SchemaError> {
        for index in 0..self.structs.len() {
            let struct_name = self.structs[index].name.clone();
            let members: Vec<(String, ValueType, Option<String>)> = self.structs[index]
                .members
                .iter()
                .map(|m| {
                    (
                        m.name.clone(),
                        m.value_type.clone(),
                        m.array.as_ref().and_then(|a| a.count_member.clone()),
                    )
                })
                .collect();

            for (member, value_type, count_member) in members {
                let context = format!("{struct_name}.{member}");
                let nested = match &value_type {
                    ValueType::Struct(name) => Some(self.resolve(name).ok_or_else(|| {
                        SchemaError::UnknownType {
                            name: name.clone(),
                            context: context.clone(),
                        }
                    })?),
                    ValueType::Flags(set) if !self.flag_sets.contains_key(set) => {
                        return Err(SchemaError::UnknownType {
                            name: set.clone(),
                            context,
                        })
                    }
                    ValueType::Enum(name) if !self.enums.contains_key(name) => {
                        return Err(SchemaError::UnknownType {
                            name: name.clone(),
                            context,
                        })
                    }
                    _ => None,
                };
                if let Some(count) = count_member {
                    if self.structs[index].member(&count).is_none() {
                        return Err(SchemaError::UnknownMember {
                            structure: struct_name.clone(),
                            member: count,
                            path: context,
                        });
                    }
                }
                if let Some(field) = self.structs[index].member_mut(&member) {
                    field.nested = nested;
                }
            }
        }
        Ok(())
    }

    fn resolve_video(&self, def: &VideoDef) -> Result<VideoCatalog, SchemaError> {
        let complete_fields = def
            .complete_fields
            .iter()
            .map(|text| self.field_ref(text, "video.complete_fields"))
            .collect::<Result<Vec<_>, _>>()?;

        let format_key = def
            .format_key
            .as_deref()
            .map(|text| self.field_ref(text, "video.format_key"))
            .transpose()?;

        let mut format_categories = Vec::with_capacity(def.format_categories.len());
        for cat in &def.format_categories {
            let path = format!("video.format_categories.{}", cat.name);
            let usage = self.field_ref(&cat.usage_field, &path)?;
            let required_usage = self.flag_mask(&usage, &cat.required_usage, &path)?;
            let mut fixups = Vec::with_capacity(cat.fixups.len());
            for fixup in &cat.fixups {
                match fixup {
                    FixupDef::ClearFlagsWithoutFormats { field, flags } => {
                        let field = self.field_ref(field, &path)?;
                        let bits = self.flag_mask(&field, flags, &path)?;
                        fixups.push(Fixup::ClearFlagsWithoutFormats { field, bits });
                    }
                }
            }
            format_categories.push(FormatCategory {
                name: cat.name.clone(),
                usage,
                required_usage,
                fixups,
            });
        }

        Ok(VideoCatalog {
            axes: def.axes.clone(),
            complete_fields,
            format_key,
            format_categories,
        })
    }

    /// Resolve `Struct.member` text.
    fn field_ref(&self, text: &str, path: &str) -> Result<FieldRef, SchemaError> {
        let (structure, member) =
            text.split_once('.')
                .ok_or_else(|| SchemaError::InvalidDocument {
                    path: path.to_string(),
                    detail: format!("{text:?} is not Struct.member"),
                })?;
        let id = self
            .resolve(structure)
            .ok_or_else(|| SchemaError::UnknownStruct {
                name: structure.to_string(),
                path: path.to_string(),
            })?;
        if self.member_spec(id, member).is_none() {
            return Err(SchemaError::UnknownMember {
                structure: structure.to_string(),
                member: member.to_string(),
                path: path.to_string(),
            });
        }
        Ok(FieldRef {
            structure: id,
            member: member.to_string(),
        })
    }

    /// OR together flag names of a flags-typed member.
    fn flag_mask(&self, field: &FieldRef, names: &[String], path: &str) -> Result<u64, SchemaError> {
        let set = self
            .member_spec(field.structure, &field.member)
            .and_then(|m| m.flag_set())
            .ok_or_else(|| SchemaError::InvalidDocument {
                path: path.to_string(),
                detail: format!("{}.{} is not a flags member", self.name_of(field.structure), field.member),
            })?;
        names.iter().try_fold(0u64, |acc, name| {
            self.flag_bits(set, name)
                .map(|bits| acc | bits)
                .ok_or_else(|| SchemaError::UnknownFlag {
                    flag: name.clone(),
                    flag_set: set.to_string(),
                    path: path.to_string(),
                })
        })
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Resolve a canonical name or alias.
    pub fn resolve(&self, name: &str) -> Option<StructId> {
        self.names.get(name).copied()
    }

    pub fn spec(&self, id: StructId) -> Option<&StructSpec> {
        self.structs.get(id.index())
    }

    /// Canonical struct for a canonical name or alias.
    pub fn lookup(&self, name: &str) -> Option<&StructSpec> {
        self.resolve(name).and_then(|id| self.spec(id))
    }

    pub fn member_spec(&self, id: StructId, member: &str) -> Option<&crate::spec::FieldSpec> {
        self.spec(id)?.member(member)
    }

    /// Canonical name, for paths and messages.
    pub fn name_of(&self, id: StructId) -> &str {
        self.spec(id).map_or("<unknown>", |s| s.name.as_str())
    }

    pub fn structs(&self) -> impl Iterator<Item = &StructSpec> {
        self.structs.iter()
    }

    pub fn chain_root(&self, category: Category) -> Option<StructId> {
        self.chain_roots.get(&category).copied()
    }

    /// Whether `id` may be declared under `category`: it is the category's
    /// chain root, extends it, or is a direct member type of it. Categories
    /// without a configured root accept any struct.
    pub fn fits_category(&self, id: StructId, category: Category) -> bool {
        let Some(root) = self.chain_root(category) else {
            return true;
        };
        if id == root {
            return true;
        }
        let extends_root = self.spec(id).is_some_and(|s| s.extends.contains(&root));
        let nested_in_root = self
            .spec(root)
            .is_some_and(|r| r.members.iter().any(|m| m.nested == Some(id)));
        extends_root || nested_in_root
    }

    /// Flag name → bits of one flag set.
    pub fn flag_set(&self, flag_set: &str) -> Option<&BTreeMap<String, u64>> {
        self.flag_sets.get(flag_set)
    }

    pub fn flag_bits(&self, flag_set: &str, flag: &str) -> Option<u64> {
        self.flag_sets.get(flag_set)?.get(flag).copied()
    }

    pub fn has_enumerant(&self, enumeration: &str, value: &str) -> bool {
        self.enums
            .get(enumeration)
            .is_some_and(|values| values.contains(value))
    }

    pub fn has_format(&self, name: &str) -> bool {
        self.formats.contains(name)
    }

    /// Latest spec version of a known extension.
    pub fn extension_version(&self, name: &str) -> Option<u32> {
        self.extensions.get(name).copied()
    }

    pub fn video(&self) -> &VideoCatalog {
        &self.video
    }
}

fn has_duplicate_member(members: &[crate::spec::FieldSpec]) -> bool {
    let mut seen = BTreeSet::new();
    members.iter().any(|m| !seen.insert(m.name.as_str()))
}
