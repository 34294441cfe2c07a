//! `{{root.path}}` template resolution.
//!
//! Two modes:
//! - a string that is exactly one placeholder resolves to the referenced
//!   value with its type preserved;
//! - any other string has each placeholder replaced by its text form.
//!
//! Roots are `input`, `steps`, and any loop-local names in scope. A
//! placeholder with an unknown root is left as written. A missing path
//! resolves to null (empty text when interpolated).

use std::sync::OnceLock;

use regex_lite::{Captures, Regex};
use serde_json::{Map, Value};

const SEGMENT: &str = r"(?:\.[A-Za-z0-9_\-]+|\[\d+\])*";

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(&format!(
            r"\{{\{{\s*([A-Za-z_][A-Za-z0-9_]*)({})\s*\}}\}}",
            SEGMENT
        ))
        .expect("valid regex")
    })
}

fn whole_value_regex() -> &'static Regex {
    static WHOLE: OnceLock<Regex> = OnceLock::new();
    WHOLE.get_or_init(|| {
        Regex::new(&format!(
            r"^\{{\{{\s*([A-Za-z_][A-Za-z0-9_]*)({})\s*\}}\}}$",
            SEGMENT
        ))
        .expect("valid regex")
    })
}

/// One step of a dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Split `.a.b[0].c` into segments.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.').filter(|p| !p.is_empty()) {
        let (key, rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(PathSegment::Key(key.to_string()));
        }
        for index in rest
            .split(|c: char| c == '[' || c == ']')
            .filter(|s| !s.is_empty())
        {
            match index.parse::<usize>() {
                Ok(i) => segments.push(PathSegment::Index(i)),
                Err(_) => segments.push(PathSegment::Key(index.to_string())),
            }
        }
    }
    segments
}

/// Follow a path into a value. `None` when any segment is missing.
pub fn walk<'v>(root: &'v Value, path: &[PathSegment]) -> Option<&'v Value> {
    path.iter().try_fold(root, |current, segment| match (current, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get(key),
        (Value::Object(map), PathSegment::Index(i)) => map.get(&i.to_string()),
        (Value::Array(items), PathSegment::Index(i)) => items.get(*i),
        (Value::Array(items), PathSegment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|i| items.get(i))
        }
        _ => None,
    })
}

/// Read-only view of the values templates and expressions can reach.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    input: &'a Map<String, Value>,
    steps: &'a Map<String, Value>,
    locals: Option<&'a Map<String, Value>>,
}

impl<'a> Scope<'a> {
    pub fn new(input: &'a Map<String, Value>, steps: &'a Map<String, Value>) -> Self {
        Self {
            input,
            steps,
            locals: None,
        }
    }

    /// Add loop-local bindings (item variable, index).
    pub fn with_locals(mut self, locals: &'a Map<String, Value>) -> Self {
        self.locals = Some(locals);
        self
    }

    pub fn input(&self) -> &'a Map<String, Value> {
        self.input
    }

    pub fn steps(&self) -> &'a Map<String, Value> {
        self.steps
    }

    /// Loop-local bindings, if any.
    pub fn locals(&self) -> impl Iterator<Item = (&'a String, &'a Value)> {
        self.locals.into_iter().flat_map(|locals| locals.iter())
    }

    fn root_map(&self, root: &str) -> Option<RootRef<'a>> {
        match root {
            "input" | "inputs" => Some(RootRef::Map(self.input)),
            "steps" => Some(RootRef::Map(self.steps)),
            other => self
                .locals
                .and_then(|locals| locals.get(other))
                .map(RootRef::Value),
        }
    }

    /// Resolve `root` + `path`. `None` only when the root is unknown.
    pub fn lookup(&self, root: &str, path: &[PathSegment]) -> Option<Value> {
        let value = match self.root_map(root)? {
            RootRef::Value(value) => walk(value, path).cloned(),
            RootRef::Map(map) => match path.split_first() {
                None => Some(Value::Object(map.clone())),
                Some((PathSegment::Key(key), rest)) => {
                    map.get(key).and_then(|v| walk(v, rest)).cloned()
                }
                Some((PathSegment::Index(i), rest)) => {
                    map.get(&i.to_string()).and_then(|v| walk(v, rest)).cloned()
                }
            },
        };
        Some(value.unwrap_or(Value::Null))
    }
}

enum RootRef<'a> {
    Map(&'a Map<String, Value>),
    Value(&'a Value),
}

/// Resolve every string inside a JSON value.
pub fn resolve_value(template: &Value, scope: &Scope<'_>) -> Value {
    match template {
        Value::String(s) => resolve_str(s, scope),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, scope)).collect()),
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, scope)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve one template string, preserving type for whole-value templates.
pub fn resolve_str(template: &str, scope: &Scope<'_>) -> Value {
    if let Some(caps) = whole_value_regex().captures(template) {
        let root = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let path = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        return match scope.lookup(root, &parse_path(path)) {
            Some(value) => value,
            None => Value::String(template.to_string()),
        };
    }

    Value::String(render(template, scope))
}

/// Interpolate placeholders, always producing text.
pub fn render(template: &str, scope: &Scope<'_>) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }

    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            let root = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let path = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            match scope.lookup(root, &parse_path(path)) {
                Some(value) => value_to_text(&value),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

/// Text form used for interpolation.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
