use super::Directive;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Identity of a directive for deduplication: the name plus a hash of the
/// parameters with keys in sorted order. Parameter order therefore does not
/// matter, parameter values do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn of(directive: &Directive) -> Self {
        let sorted: BTreeMap<&String, &String> = directive.parameters.iter().collect();
        let canonical: Map<String, Value> = sorted
            .into_iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        let digest = md5::compute(Value::Object(canonical).to_string());
        Self(format!("{}_{:x}", directive.name, digest))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signatures already dispatched during one response
#[derive(Debug, Default)]
pub struct DispatchRecord {
    seen: HashSet<Signature>,
}

impl DispatchRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true exactly once per distinct signature and records it.
    pub fn should_dispatch(&mut self, directive: &Directive) -> bool {
        self.seen.insert(Signature::of(directive))
    }
}
