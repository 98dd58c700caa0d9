//! Superset comparison of json values. An existing child is considered up to date as long as
//! every value we'd set on it is present, no matter what else the store or other controllers
//! may have added.
use crate::resource::JsonObject;

use serde_json::Value;

use std::fmt::{self, Display};

#[derive(Debug, PartialEq)]
pub struct Diff<'a> {
    /// Dot separated keys and array indexes, relative to the desired value
    pub path: String,
    pub existing: &'a Value,
    pub desired: &'a Value,
}

impl<'a> Display for Diff<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "'{}' is {} but should be {}",
            self.path, self.existing, self.desired
        )
    }
}

#[derive(Debug, PartialEq)]
pub struct Diffs<'a>(Vec<Diff<'a>>);

impl<'a> Diffs<'a> {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn non_empty(&self) -> bool {
        !self.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|d| d.path.as_str())
    }
}

impl<'a> Display for Diffs<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("<no differences>");
        }
        write!(f, "{} differences: ", self.0.len())?;
        for (i, diff) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            Display::fmt(diff, f)?;
        }
        Ok(())
    }
}

static MISSING: Value = Value::Null;

/// Returns every value in `desired` that is missing from, or different in, `existing`. Values
/// that are only present in `existing` are never reported.
///
/// Arrays whose desired items are all objects with a string `name` (containers, ports, owner
/// references, and so on) are matched up by name instead of by position, since the order of
/// those isn't meaningful. Any other array is compared item by item.
pub fn compare_values<'a>(existing: &'a Value, desired: &'a Value) -> Diffs<'a> {
    let mut comparison = Comparison {
        diffs: Vec::new(),
        path: Vec::with_capacity(8),
    };
    comparison.values(existing, desired);
    Diffs(comparison.diffs)
}

struct Comparison<'a> {
    diffs: Vec<Diff<'a>>,
    path: Vec<String>,
}

impl<'a> Comparison<'a> {
    fn values(&mut self, existing: &'a Value, desired: &'a Value) {
        match (existing, desired) {
            (Value::Object(existing), Value::Object(desired)) => self.objects(existing, desired),
            (Value::Array(existing), Value::Array(desired)) => {
                if is_keyed_by_name(desired) {
                    self.keyed_arrays(existing, desired);
                } else {
                    self.arrays(existing, desired);
                }
            }
            (e, d) if e != d => self.push(e, d),
            _ => {}
        }
    }

    fn objects(&mut self, existing: &'a JsonObject, desired: &'a JsonObject) {
        for (key, desired_value) in desired {
            self.path.push(key.clone());
            self.values(existing.get(key).unwrap_or(&MISSING), desired_value);
            self.path.pop();
        }
    }

    fn arrays(&mut self, existing: &'a [Value], desired: &'a [Value]) {
        for (i, desired_item) in desired.iter().enumerate() {
            self.path.push(i.to_string());
            self.values(existing.get(i).unwrap_or(&MISSING), desired_item);
            self.path.pop();
        }
    }

    fn keyed_arrays(&mut self, existing: &'a [Value], desired: &'a [Value]) {
        for (i, desired_item) in desired.iter().enumerate() {
            self.path.push(i.to_string());
            let existing_item = item_name(desired_item)
                .and_then(|name| existing.iter().find(|e| item_name(e) == Some(name)))
                .unwrap_or(&MISSING);
            self.values(existing_item, desired_item);
            self.path.pop();
        }
    }

    fn push(&mut self, existing: &'a Value, desired: &'a Value) {
        let mut path = String::with_capacity(32);
        for segment in self.path.iter() {
            path.push('.');
            path.push_str(segment);
        }
        self.diffs.push(Diff {
            path,
            existing,
            desired,
        });
    }
}

fn item_name(item: &Value) -> Option<&str> {
    item.get("name").and_then(Value::as_str)
}

fn is_keyed_by_name(desired: &[Value]) -> bool {
    desired.iter().all(|item| item.is_object() && item_name(item).is_some())
}
