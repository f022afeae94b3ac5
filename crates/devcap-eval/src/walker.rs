//! # Field Walker
//!
//! Applies the limit-type algebra across typed, possibly nested struct
//! values: [`FieldWalker::compare`] in the compliance direction,
//! [`FieldWalker::merge`] to fold two declarations together, and
//! [`FieldWalker::override_values`] in the simulation direction.
//!
//! ## Limit inheritance
//!
//! A struct-typed member may carry a limit (e.g. a `min` granularity
//! extent). Leaves of the nested struct that keep the default `exact` limit
//! are compared under the enclosing member's limit instead.
//!
//! ## Arrays
//!
//! Arrays compare element-wise up to the declared length, never past the
//! registry's capacity for the member. `range` members compare as a whole.
//!
//! A failing leaf never stops the walk; every leaf gets its diagnostic.

use std::collections::BTreeSet;

use devcap_core::diagnostic::{child_path, index_path};
use devcap_core::{limits, ConflictError, Diagnostic, Fields, LimitBase, LimitType, StructId, Value};
use devcap_profile::StructValues;
use devcap_registry::{FieldSpec, Registry};

/// Result of folding one set of declarations into another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Merged {
    /// Merged values. Conflicting members are left out.
    pub values: StructValues,
    pub conflicts: Vec<ConflictError>,
    /// Keys of the members left out for a conflict, relative to the merge
    /// path (e.g. `Limits.vendor`). Includes the keys passed in.
    pub dropped: BTreeSet<String>,
}

/// Running state of one merge walk.
struct MergeState {
    /// Length of the merge path; keys are what follows it.
    root: usize,
    dropped: BTreeSet<String>,
    conflicts: Vec<ConflictError>,
}

impl MergeState {
    fn key<'p>(&self, path: &'p str) -> &'p str {
        path.get(self.root..).unwrap_or(path).trim_start_matches('.')
    }

    fn is_dropped(&self, path: &str) -> bool {
        self.dropped.contains(self.key(path))
    }

    fn drop_member(&mut self, path: &str) {
        let key = self.key(path).to_string();
        self.dropped.insert(key);
    }
}

/// Walks struct values member by member.
#[derive(Debug, Clone, Copy)]
pub struct FieldWalker<'r> {
    registry: &'r Registry,
}

impl<'r> FieldWalker<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    // -----------------------------------------------------------------------
    // Compare
    // -----------------------------------------------------------------------

    /// Compare every declared member against the reported one.
    pub fn compare(&self, path: &str, declared: &StructValues, actual: &StructValues) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        for (id, fields) in declared {
            let at = child_path(path, self.registry.name_of(*id));
            match self.locate(actual, *id) {
                Some(reported) => self.compare_fields(*id, &at, fields, reported, None, &mut out),
                None => out.push(Diagnostic::missing(at, None).with_note("struct not reported")),
            }
        }
        out
    }

    /// Whether `actual` satisfies every declared member.
    pub fn satisfies(&self, declared: &StructValues, actual: &StructValues) -> bool {
        !self
            .compare("", declared, actual)
            .iter()
            .any(Diagnostic::is_failure)
    }

    /// Reported fields of `id`: stored directly, or nested as a member of a
    /// reported chain root.
    fn locate<'v>(&self, values: &'v StructValues, id: StructId) -> Option<&'v Fields> {
        if let Some(fields) = values.get(&id) {
            return Some(fields);
        }
        let (owner, member) = self.nested_owner(values, id)?;
        match values.get(&owner)?.get(member) {
            Some(Value::Struct(inner)) => Some(inner),
            _ => None,
        }
    }

    /// The reported struct and member holding `id` as a nested struct.
    fn nested_owner(&self, values: &StructValues, id: StructId) -> Option<(StructId, &'r str)> {
        values.iter().find_map(|(owner, fields)| {
            let spec = self.registry.spec(*owner)?;
            spec.members
                .iter()
                .filter(|m| m.nested == Some(id) && !m.is_array())
                .find(|m| matches!(fields.get(&m.name), Some(Value::Struct(_))))
                .map(|m| (*owner, m.name.as_str()))
        })
    }

    fn compare_fields(
        &self,
        id: StructId,
        path: &str,
        declared: &Fields,
        actual: &Fields,
        inherited: Option<LimitType>,
        out: &mut Vec<Diagnostic>,
    ) {
        let Some(spec) = self.registry.spec(id) else {
            return;
        };
        for (member, want) in declared {
            let at = child_path(path, member);
            let Some(field) = spec.member(member) else {
                out.push(Diagnostic::missing(at, Some(want.clone())).with_note("member not in registry"));
                continue;
            };
            match actual.get(member) {
                Some(have) => self.compare_value(field, &at, want, have, inherited, out),
                None => out.push(Diagnostic::missing(at, Some(want.clone()))),
            }
        }
    }

    fn compare_value(
        &self,
        field: &FieldSpec,
        path: &str,
        declared: &Value,
        actual: &Value,
        inherited: Option<LimitType>,
        out: &mut Vec<Diagnostic>,
    ) {
        let limit = effective_limit(field, inherited);
        match (declared, actual) {
            (Value::Array(want), Value::Array(have)) if limit.base() != LimitBase::Range => {
                let cap = field.array_cap().unwrap_or(want.len());
                for (i, w) in want.iter().take(cap).enumerate() {
                    let at = index_path(path, i);
                    match have.get(i) {
                        Some(h) => self.compare_element(field, &at, w, h, inherited, out),
                        None => out.push(Diagnostic::missing(at, Some(w.clone()))),
                    }
                }
            }
            _ => self.compare_element(field, path, declared, actual, inherited, out),
        }
    }

    fn compare_element(
        &self,
        field: &FieldSpec,
        path: &str,
        declared: &Value,
        actual: &Value,
        inherited: Option<LimitType>,
        out: &mut Vec<Diagnostic>,
    ) {
        let limit = effective_limit(field, inherited);
        if let (Some(nested), Value::Struct(want), Value::Struct(have)) = (field.nested, declared, actual) {
            self.compare_fields(nested, path, want, have, Some(limit), out);
            return;
        }
        if !limits::compare(actual, declared, limit) {
            out.push(
                Diagnostic::unsatisfied(path, declared.clone(), actual.clone())
                    .with_note(format!("limit {limit}")),
            );
        }
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    /// Fold `incoming` declarations into `acc`.
    ///
    /// A member that cannot be merged is reported and left out of the
    /// result; the rest of the struct still merges.
    pub fn merge(&self, path: &str, acc: &StructValues, incoming: &StructValues) -> Merged {
        self.merge_excluding(path, acc, incoming, &BTreeSet::new())
    }

    /// Like [`FieldWalker::merge`], but members listed in `dropped` stay
    /// out of the result even when `incoming` declares them again.
    ///
    /// `dropped` holds keys relative to `path` as returned in
    /// [`Merged::dropped`], so a fold over several blocks can carry them
    /// from one step to the next.
    pub fn merge_excluding(
        &self,
        path: &str,
        acc: &StructValues,
        incoming: &StructValues,
        dropped: &BTreeSet<String>,
    ) -> Merged {
        let mut state = MergeState {
            root: path.len(),
            dropped: dropped.clone(),
            conflicts: Vec::new(),
        };
        let mut values = acc.clone();
        for (id, fields) in incoming {
            let at = child_path(path, self.registry.name_of(*id));
            let existing = acc.get(id).cloned().unwrap_or_default();
            let merged = self.merge_fields(*id, &at, &existing, fields, None, &mut state);
            values.insert(*id, merged);
        }
        Merged {
            values,
            conflicts: state.conflicts,
            dropped: state.dropped,
        }
    }

    fn merge_fields(
        &self,
        id: StructId,
        path: &str,
        a: &Fields,
        b: &Fields,
        inherited: Option<LimitType>,
        state: &mut MergeState,
    ) -> Fields {
        let spec = self.registry.spec(id);
        let mut out = a.clone();
        for (member, incoming) in b {
            let at = child_path(path, member);
            if state.is_dropped(&at) {
                tracing::debug!(path = %at, "member already dropped for a conflict");
                continue;
            }
            let Some(existing) = a.get(member) else {
                out.insert(member.clone(), incoming.clone());
                continue;
            };
            let field = spec.and_then(|s| s.member(member));
            match self.merge_value(field, &at, existing, incoming, inherited, state) {
                Some(value) => {
                    out.insert(member.clone(), value);
                }
                None => {
                    out.remove(member);
                }
            }
        }
        out
    }

    fn merge_value(
        &self,
        field: Option<&FieldSpec>,
        path: &str,
        a: &Value,
        b: &Value,
        inherited: Option<LimitType>,
        state: &mut MergeState,
    ) -> Option<Value> {
        let limit = field.map_or(LimitType::EXACT, |f| effective_limit(f, inherited));
        match (field.and_then(|f| f.nested), a, b) {
            (Some(id), Value::Struct(x), Value::Struct(y)) => Some(Value::Struct(
                self.merge_fields(id, path, x, y, Some(limit), state),
            )),
            (Some(id), Value::Array(xs), Value::Array(ys)) => {
                let mut items = Vec::with_capacity(xs.len().max(ys.len()));
                for i in 0..xs.len().max(ys.len()) {
                    let item = match (xs.get(i), ys.get(i)) {
                        (Some(Value::Struct(x)), Some(Value::Struct(y))) => Value::Struct(
                            self.merge_fields(id, &index_path(path, i), x, y, Some(limit), state),
                        ),
                        (Some(x), _) => x.clone(),
                        (None, Some(y)) => y.clone(),
                        (None, None) => break,
                    };
                    items.push(item);
                }
                Some(Value::Array(items))
            }
            _ => match limits::merge(a, b, limit) {
                Ok(value) => Some(value),
                Err(conflict) => {
                    tracing::debug!(path = %path, %conflict, "merge conflict");
                    state.drop_member(path);
                    state.conflicts.push(ConflictError {
                        path: path.to_string(),
                        first: conflict.first,
                        second: conflict.second,
                    });
                    None
                }
            },
        }
    }

    // -----------------------------------------------------------------------
    // Override
    // -----------------------------------------------------------------------

    /// Substitute declared values for reported ones.
    ///
    /// Returns the simulated values and a warning for every substitution
    /// the real target does not back.
    pub fn override_values(
        &self,
        path: &str,
        actual: &StructValues,
        declared: &StructValues,
    ) -> (StructValues, Vec<Diagnostic>) {
        let mut values = actual.clone();
        let mut warnings = Vec::new();
        for (id, fields) in declared {
            let at = child_path(path, self.registry.name_of(*id));
            if let Some(reported) = actual.get(id) {
                let next = self.override_fields(*id, &at, reported, fields, None, &mut warnings);
                values.insert(*id, next);
                continue;
            }
            if let Some((owner, member)) = self.nested_owner(actual, *id) {
                let slot = values.get_mut(&owner).and_then(|f| f.get_mut(member));
                if let Some(Value::Struct(inner)) = slot {
                    *inner = self.override_fields(*id, &at, inner, fields, None, &mut warnings);
                }
                continue;
            }
            warnings.push(
                Diagnostic::warning(at, None, None)
                    .with_note("struct not reported by the target; declared values substituted"),
            );
            values.insert(*id, fields.clone());
        }
        (values, warnings)
    }

    fn override_fields(
        &self,
        id: StructId,
        path: &str,
        actual: &Fields,
        declared: &Fields,
        inherited: Option<LimitType>,
        warnings: &mut Vec<Diagnostic>,
    ) -> Fields {
        let spec = self.registry.spec(id);
        let mut out = actual.clone();
        for (member, want) in declared {
            let at = child_path(path, member);
            let field = spec.and_then(|s| s.member(member));
            let next = match (actual.get(member), field) {
                (Some(have), Some(field)) => self.override_value(field, &at, have, want, inherited, warnings),
                (None, _) => {
                    warnings.push(
                        Diagnostic::warning(at, Some(want.clone()), None)
                            .with_note("member not reported by the target"),
                    );
                    want.clone()
                }
                (Some(_), None) => want.clone(),
            };
            out.insert(member.clone(), next);
        }
        out
    }

    fn override_value(
        &self,
        field: &FieldSpec,
        path: &str,
        actual: &Value,
        declared: &Value,
        inherited: Option<LimitType>,
        warnings: &mut Vec<Diagnostic>,
    ) -> Value {
        let limit = effective_limit(field, inherited);
        if let (Some(nested), Value::Struct(have), Value::Struct(want)) = (field.nested, actual, declared) {
            return Value::Struct(self.override_fields(nested, path, have, want, Some(limit), warnings));
        }
        let result = limits::override_value(actual, declared, limit, field.modifiable);
        if result.warn {
            let note = if field.modifiable {
                "the target does not back the overridden value"
            } else {
                "member is not modifiable; the reported value is kept"
            };
            warnings.push(Diagnostic::warning(path, Some(declared.clone()), Some(actual.clone())).with_note(note));
        }
        result.value
    }
}

/// The limit a member compares under, given its enclosing member's limit.
fn effective_limit(field: &FieldSpec, inherited: Option<LimitType>) -> LimitType {
    if field.limit == LimitType::EXACT {
        inherited.unwrap_or(field.limit)
    } else {
        field.limit
    }
}

/// Lay `top` over `base`: every member `top` sets wins, every member it
/// leaves unset (zero, empty) keeps the `base` value.
pub fn overlay(base: &StructValues, top: &StructValues) -> StructValues {
    let mut out = base.clone();
    for (id, fields) in top {
        let next = match base.get(id) {
            Some(under) => overlay_fields(under, fields),
            None => fields.clone(),
        };
        out.insert(*id, next);
    }
    out
}

fn overlay_fields(base: &Fields, top: &Fields) -> Fields {
    let mut out = base.clone();
    for (member, value) in top {
        let next = match (base.get(member), value) {
            (Some(Value::Struct(under)), Value::Struct(over)) => Value::Struct(overlay_fields(under, over)),
            (Some(_), v) if v.is_unset() => continue,
            _ => value.clone(),
        };
        out.insert(member.clone(), next);
    }
    out
}
