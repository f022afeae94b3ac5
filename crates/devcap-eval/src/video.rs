//! # Wildcard Axis Resolver
//!
//! Video-profile declarations apply to classes of concrete instances. For
//! one concrete instance the resolver:
//!
//! 1. **selects** every declaration whose axis constraints subsume it
//!    (each dimension is a wildcard or equal to the instance's value);
//! 2. **merges** their capabilities with the limit-type merge, where any
//!    member conflict is a hard error for that instance;
//! 3. **tracks completeness**: whether at least one selected declaration
//!    specifies every member the registry lists as required for
//!    completeness. Only complete declarations may synthesize support for
//!    an instance the target does not report;
//! 4. per **format category** (a usage-flag predicate from the registry),
//!    selects the declared formats of that category, merges entries with the
//!    same format key, then applies the category's fixups to the merged
//!    capabilities.
//!
//! Resolution folds the selected declarations into an accumulated
//! [`Resolution`]; instances resolve independently of one another.

use std::collections::{BTreeMap, BTreeSet};

use devcap_core::diagnostic::{child_path, index_path};
use devcap_core::{ConflictError, Diagnostic, Value};
use devcap_profile::{ActualVideoProfile, StructValues, VideoProfileDecl, VideoProfileInstance};
use devcap_registry::{FieldRef, Fixup, FormatCategory, VideoCatalog};

use crate::walker::FieldWalker;

/// Everything the declarations say about one instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Indices of the selected declarations.
    pub matched: Vec<usize>,
    /// Merged capabilities, fixups applied.
    pub capabilities: StructValues,
    /// Format category → merged required formats, one per format key.
    pub formats: BTreeMap<String, Vec<StructValues>>,
    /// At least one selected declaration is complete.
    pub complete: bool,
    pub conflicts: Vec<ConflictError>,
}

impl Resolution {
    pub fn is_selected(&self) -> bool {
        !self.matched.is_empty()
    }

    /// Every merged format entry across categories, deduplicated.
    pub fn all_formats(&self) -> Vec<StructValues> {
        let mut out: Vec<StructValues> = Vec::new();
        for entry in self.formats.values().flatten() {
            if !out.contains(entry) {
                out.push(entry.clone());
            }
        }
        out
    }
}

/// The fold state of [`VideoResolver::resolve`].
#[derive(Debug, Default)]
struct Accum {
    matched: Vec<usize>,
    capabilities: StructValues,
    formats: Vec<StructValues>,
    complete: bool,
    conflicts: Vec<ConflictError>,
}

#[derive(Debug, Clone, Copy)]
pub struct VideoResolver<'r> {
    walker: FieldWalker<'r>,
    catalog: &'r VideoCatalog,
}

impl<'r> VideoResolver<'r> {
    pub fn new(walker: FieldWalker<'r>) -> Self {
        Self {
            walker,
            catalog: walker.registry().video(),
        }
    }

    /// Resolve the declarations that apply to `instance`.
    pub fn resolve(
        &self,
        path: &str,
        instance: &VideoProfileInstance,
        decls: &[VideoProfileDecl],
    ) -> Resolution {
        let caps_path = child_path(path, "capabilities");
        let acc = decls
            .iter()
            .enumerate()
            .filter(|(_, decl)| decl.axis.matches(instance))
            .fold(Accum::default(), |acc, (i, decl)| self.absorb(acc, &caps_path, i, decl));

        let mut conflicts = acc.conflicts;
        let mut formats = BTreeMap::new();
        for category in &self.catalog.format_categories {
            let at = child_path(path, &format!("formats.{}", category.name));
            let (entries, found) = self.category_formats(&at, category, &acc.formats);
            conflicts.extend(found);
            formats.insert(category.name.clone(), entries);
        }
        let capabilities = apply_fixups(self.catalog, acc.capabilities, &formats);

        if !conflicts.is_empty() {
            tracing::debug!(
                instance = %instance,
                conflicts = conflicts.len(),
                "video profile declarations conflict"
            );
        }
        Resolution {
            matched: acc.matched,
            capabilities,
            formats,
            complete: acc.complete,
            conflicts,
        }
    }

    fn absorb(&self, mut acc: Accum, path: &str, index: usize, decl: &VideoProfileDecl) -> Accum {
        let merged = self.walker.merge(path, &acc.capabilities, &decl.capabilities);
        acc.capabilities = merged.values;
        acc.conflicts.extend(merged.conflicts);
        acc.formats.extend(decl.formats.iter().cloned());
        acc.complete |= self.is_complete(decl);
        acc.matched.push(index);
        acc
    }

    /// Whether a declaration specifies every completeness member.
    pub fn is_complete(&self, decl: &VideoProfileDecl) -> bool {
        self.catalog.complete_fields.iter().all(|field| {
            decl.capabilities
                .get(&field.structure)
                .is_some_and(|fields| fields.contains_key(&field.member))
        })
    }

    /// Entries of one category, same-key entries merged, first-seen order.
    fn category_formats(
        &self,
        path: &str,
        category: &FormatCategory,
        entries: &[StructValues],
    ) -> (Vec<StructValues>, Vec<ConflictError>) {
        let mut grouped: Vec<(Option<String>, StructValues)> = Vec::new();
        let mut conflicts = Vec::new();
        for entry in entries.iter().filter(|e| in_category(category, e)) {
            let key = self.format_key(entry);
            let slot = key
                .as_ref()
                .and_then(|k| grouped.iter_mut().find(|(other, _)| other.as_ref() == Some(k)));
            match slot {
                Some((Some(k), existing)) => {
                    let at = format!("{path}[{k}]");
                    let merged = self.walker.merge(&at, existing, entry);
                    *existing = merged.values;
                    conflicts.extend(merged.conflicts);
                }
                _ => grouped.push((key, entry.clone())),
            }
        }
        (grouped.into_iter().map(|(_, v)| v).collect(), conflicts)
    }

    pub(crate) fn format_key(&self, entry: &StructValues) -> Option<String> {
        self.catalog
            .format_key
            .as_ref()
            .and_then(|key| field_value(entry, key))
            .map(Value::to_string)
    }

    /// Check every declaration against the reported video profiles.
    pub fn check(
        &self,
        path: &str,
        decls: &[VideoProfileDecl],
        reported: &[ActualVideoProfile],
    ) -> Vec<Diagnostic> {
        let mut out = Vec::new();

        for (k, decl) in decls.iter().enumerate() {
            if !reported.iter().any(|p| decl.axis.matches(&p.instance)) {
                out.push(
                    Diagnostic::missing(index_path(path, k), None)
                        .with_note(format!("no reported video profile matches {}", decl.axis)),
                );
            }
        }

        for actual in reported {
            let at = format!("{path}{}", actual.instance);
            let resolution = self.resolve(&at, &actual.instance, decls);
            if !resolution.is_selected() {
                continue;
            }
            if !resolution.conflicts.is_empty() {
                out.extend(resolution.conflicts.into_iter().map(Diagnostic::from));
                continue;
            }
            out.extend(self.walker.compare(
                &child_path(&at, "capabilities"),
                &resolution.capabilities,
                &actual.capabilities,
            ));
            for (name, required) in &resolution.formats {
                let Some(category) = self.catalog.category(name) else {
                    continue;
                };
                out.extend(self.check_formats(&at, category, required, &actual.formats));
            }
        }
        out
    }

    fn check_formats(
        &self,
        path: &str,
        category: &FormatCategory,
        required: &[StructValues],
        offered: &[StructValues],
    ) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        let offered: Vec<&StructValues> = offered
            .iter()
            .filter(|f| in_category(category, f))
            .collect();
        for (i, want) in required.iter().enumerate() {
            let key = self.format_key(want);
            let at = match &key {
                Some(k) => child_path(path, &format!("formats.{}[{k}]", category.name)),
                None => index_path(&child_path(path, &format!("formats.{}", category.name)), i),
            };
            let candidates: Vec<&StructValues> = offered
                .iter()
                .copied()
                .filter(|have| key.is_none() || self.format_key(have) == key)
                .collect();
            if candidates.iter().any(|have| self.walker.satisfies(want, have)) {
                continue;
            }
            match candidates.first() {
                Some(first) => out.extend(self.walker.compare(&at, want, first)),
                None => out.push(
                    Diagnostic::missing(at, None)
                        .with_note("no reported format of this category matches"),
                ),
            }
        }
        out
    }

    /// Every concrete instance the catalog's axes span, in axis order.
    pub fn instance_space(&self) -> Vec<VideoProfileInstance> {
        if self.catalog.axes.is_empty() {
            return Vec::new();
        }
        let mut out: Vec<BTreeMap<String, String>> = vec![BTreeMap::new()];
        for axis in &self.catalog.axes {
            out = out
                .into_iter()
                .flat_map(|dims| {
                    axis.values.iter().map(move |value| {
                        let mut next = dims.clone();
                        next.insert(axis.name.clone(), value.clone());
                        next
                    })
                })
                .collect();
        }
        out.into_iter().map(|dims| VideoProfileInstance { dims }).collect()
    }

    /// Reported instances first, then the rest of the instance space.
    pub fn candidate_instances(&self, reported: &[ActualVideoProfile]) -> Vec<VideoProfileInstance> {
        let mut seen = BTreeSet::new();
        reported
            .iter()
            .map(|p| p.instance.clone())
            .chain(self.instance_space())
            .filter(|instance| seen.insert(instance.clone()))
            .collect()
    }
}

fn field_value<'v>(values: &'v StructValues, field: &FieldRef) -> Option<&'v Value> {
    values.get(&field.structure)?.get(&field.member)
}

fn in_category(category: &FormatCategory, entry: &StructValues) -> bool {
    field_value(entry, &category.usage)
        .and_then(Value::as_bits)
        .is_some_and(|usage| usage & category.required_usage == category.required_usage)
}

/// Category fixups, as a function of the merged output only.
fn apply_fixups(
    catalog: &VideoCatalog,
    mut capabilities: StructValues,
    formats: &BTreeMap<String, Vec<StructValues>>,
) -> StructValues {
    for category in &catalog.format_categories {
        let empty = formats.get(&category.name).map_or(true, Vec::is_empty);
        if !empty {
            continue;
        }
        for fixup in &category.fixups {
            match fixup {
                Fixup::ClearFlagsWithoutFormats { field, bits } => {
                    let Some(value) = capabilities
                        .get_mut(&field.structure)
                        .and_then(|fields| fields.get_mut(&field.member))
                    else {
                        continue;
                    };
                    match value {
                        Value::Flags(b) | Value::Uint(b) => *b &= !bits,
                        _ => {}
                    }
                }
            }
        }
    }
    capabilities
}

#[cfg(test)]
mod tests {
    use super::*;
    use devcap_core::{DiagnosticKind, Fields};
    use devcap_profile::{AxisValue, VideoProfileAxis};
    use devcap_registry::Registry;
    use serde_json::json;

    const DST: u64 = 1;
    const DPB: u64 = 2;
    const COINCIDE: u64 = 1;
    const DISTINCT: u64 = 2;

    fn registry() -> Registry {
        Registry::from_json(&json!({
            "structs": [
                { "name": "Caps", "members": [
                    { "name": "maxDpbSlots", "type": "uint", "limit": "max" },
                    { "name": "maxLevel", "type": "uint", "limit": "exact" },
                    { "name": "decodeFlags", "type": "flags:DecodeFlags", "limit": "bitmask" } ] },
                { "name": "Fmt", "members": [
                    { "name": "format", "type": "enum:Format" },
                    { "name": "usage", "type": "flags:Usage", "limit": "bitmask" } ] }
            ],
            "flag_sets": {
                "DecodeFlags": { "COINCIDE": 1, "DISTINCT": 2 },
                "Usage": { "DST": 1, "DPB": 2 }
            },
            "enums": { "Format": ["NV12", "P010"] },
            "video": {
                "axes": [
                    { "name": "subsampling", "values": ["4:2:0", "4:4:4"] },
                    { "name": "luma", "values": ["8", "10"] }
                ],
                "complete_fields": ["Caps.maxDpbSlots", "Caps.decodeFlags"],
                "format_key": "Fmt.format",
                "format_categories": [
                    { "name": "output", "usage_field": "Fmt.usage", "required_usage": ["DST"],
                      "fixups": [ { "kind": "clear_flags_without_formats",
                                    "field": "Caps.decodeFlags", "flags": ["DISTINCT"] } ] },
                    { "name": "coincide", "usage_field": "Fmt.usage", "required_usage": ["DST", "DPB"],
                      "fixups": [ { "kind": "clear_flags_without_formats",
                                    "field": "Caps.decodeFlags", "flags": ["COINCIDE"] } ] }
                ]
            }
        }))
        .unwrap()
    }

    fn axis(dims: &[(&str, &str)]) -> VideoProfileAxis {
        VideoProfileAxis {
            dims: dims
                .iter()
                .map(|(k, v)| {
                    let value = if *v == "*" {
                        AxisValue::Any
                    } else {
                        AxisValue::Is((*v).to_string())
                    };
                    ((*k).to_string(), value)
                })
                .collect(),
        }
    }

    fn instance(s: &str, l: &str) -> VideoProfileInstance {
        [("subsampling", s), ("luma", l)].into_iter().collect()
    }

    fn caps(reg: &Registry, fields: &[(&str, Value)]) -> StructValues {
        StructValues::from([(
            reg.resolve("Caps").unwrap(),
            fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect::<Fields>(),
        )])
    }

    fn fmt(reg: &Registry, format: &str, usage: u64) -> StructValues {
        StructValues::from([(
            reg.resolve("Fmt").unwrap(),
            Fields::from([
                ("format".to_string(), Value::Enum(format.into())),
                ("usage".to_string(), Value::Flags(usage)),
            ]),
        )])
    }

    fn decl(reg: &Registry, dims: &[(&str, &str)], fields: &[(&str, Value)]) -> VideoProfileDecl {
        VideoProfileDecl {
            axis: axis(dims),
            capabilities: caps(reg, fields),
            formats: vec![],
        }
    }

    #[test]
    fn selection_and_merge() {
        let reg = registry();
        let resolver = VideoResolver::new(FieldWalker::new(&reg));
        let decls = vec![
            decl(&reg, &[("subsampling", "4:2:0")], &[("maxDpbSlots", Value::Uint(8))]),
            decl(&reg, &[("subsampling", "4:2:0"), ("luma", "10")], &[("maxDpbSlots", Value::Uint(16))]),
            decl(&reg, &[("subsampling", "4:4:4")], &[("maxDpbSlots", Value::Uint(32))]),
        ];
        let res = resolver.resolve("v", &instance("4:2:0", "10"), &decls);
        assert_eq!(res.matched, vec![0, 1]);
        let id = reg.resolve("Caps").unwrap();
        assert_eq!(res.capabilities[&id]["maxDpbSlots"], Value::Uint(16));

        let res = resolver.resolve("v", &instance("4:2:0", "8"), &decls);
        assert_eq!(res.matched, vec![0]);
    }

    #[test]
    fn conflicting_declarations_fail_the_instance() {
        let reg = registry();
        let resolver = VideoResolver::new(FieldWalker::new(&reg));
        let decls = vec![
            decl(&reg, &[], &[("maxLevel", Value::Uint(51))]),
            decl(&reg, &[("luma", "8")], &[("maxLevel", Value::Uint(52))]),
        ];
        let reported = vec![ActualVideoProfile {
            instance: instance("4:2:0", "8"),
            capabilities: caps(&reg, &[("maxLevel", Value::Uint(51))]),
            formats: vec![],
        }];
        let diags = resolver.check("v", &decls, &reported);
        assert_eq!(diags.len(), 1, "{diags:?}");
        assert_eq!(diags[0].kind, DiagnosticKind::Conflict);
    }

    #[test]
    fn completeness_requires_every_listed_member() {
        let reg = registry();
        let resolver = VideoResolver::new(FieldWalker::new(&reg));
        let partial = decl(&reg, &[], &[("maxDpbSlots", Value::Uint(8))]);
        let complete = decl(
            &reg,
            &[],
            &[("maxDpbSlots", Value::Uint(8)), ("decodeFlags", Value::Flags(0))],
        );
        assert!(!resolver.is_complete(&partial));
        assert!(resolver.is_complete(&complete));

        let res = resolver.resolve("v", &instance("4:2:0", "8"), &[partial.clone()]);
        assert!(!res.complete);
        let res = resolver.resolve("v", &instance("4:2:0", "8"), &[partial, complete]);
        assert!(res.complete);
    }

    #[test]
    fn formats_grouped_by_category_and_key() {
        let reg = registry();
        let resolver = VideoResolver::new(FieldWalker::new(&reg));
        let mut a = decl(&reg, &[], &[]);
        a.formats = vec![fmt(&reg, "NV12", DST), fmt(&reg, "P010", DST)];
        let mut b = decl(&reg, &[("luma", "8")], &[]);
        b.formats = vec![fmt(&reg, "NV12", DST | DPB)];

        let res = resolver.resolve("v", &instance("4:2:0", "8"), &[a, b]);
        assert!(res.conflicts.is_empty(), "{:?}", res.conflicts);
        // NV12 entries merge (usage ORed), P010 stays separate.
        assert_eq!(res.formats["output"].len(), 2);
        assert_eq!(res.formats["output"][0], fmt(&reg, "NV12", DST | DPB));
        // Only entries carrying both bits land in coincide.
        assert_eq!(res.formats["coincide"].len(), 1);
        assert_eq!(res.all_formats().len(), 2);
    }

    #[test]
    fn fixups_clear_flags_of_empty_categories() {
        let reg = registry();
        let resolver = VideoResolver::new(FieldWalker::new(&reg));
        let mut d = decl(&reg, &[], &[("decodeFlags", Value::Flags(COINCIDE | DISTINCT))]);
        d.formats = vec![fmt(&reg, "NV12", DST)];
        let res = resolver.resolve("v", &instance("4:2:0", "8"), &[d]);
        let id = reg.resolve("Caps").unwrap();
        // output has NV12; coincide is empty so COINCIDE is cleared.
        assert_eq!(res.capabilities[&id]["decodeFlags"], Value::Flags(DISTINCT));
    }

    #[test]
    fn check_reports_unmatched_declarations_and_formats() {
        let reg = registry();
        let resolver = VideoResolver::new(FieldWalker::new(&reg));
        let mut wide = decl(&reg, &[("subsampling", "4:2:0")], &[("maxDpbSlots", Value::Uint(8))]);
        wide.formats = vec![fmt(&reg, "P010", DST)];
        let narrow = decl(&reg, &[("subsampling", "4:4:4")], &[]);
        let reported = vec![ActualVideoProfile {
            instance: instance("4:2:0", "8"),
            capabilities: caps(&reg, &[("maxDpbSlots", Value::Uint(16))]),
            formats: vec![fmt(&reg, "NV12", DST | DPB)],
        }];
        let diags = resolver.check("v", &[wide, narrow], &reported);
        let kinds: Vec<_> = diags.iter().map(|d| (d.kind, d.path.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (DiagnosticKind::Missing, "v[1]"),
                (DiagnosticKind::Missing, "v{luma=8, subsampling=4:2:0}.formats.output[P010]"),
            ]
        );
    }

    #[test]
    fn instance_space_is_cartesian() {
        let reg = registry();
        let resolver = VideoResolver::new(FieldWalker::new(&reg));
        let space = resolver.instance_space();
        assert_eq!(space.len(), 4);
        assert_eq!(space[0], instance("4:2:0", "8"));

        let reported = vec![ActualVideoProfile {
            instance: instance("4:4:4", "10"),
            ..Default::default()
        }];
        let candidates = resolver.candidate_instances(&reported);
        assert_eq!(candidates.len(), 4);
        assert_eq!(candidates[0], instance("4:4:4", "10"));
    }
}
