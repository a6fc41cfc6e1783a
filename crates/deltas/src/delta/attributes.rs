// Copyright 2026 The Matrix.org Foundation C.I.C.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeMap;

/// The value carried by a single format attribute.
///
/// `Null` only appears inside change deltas, where it expresses removal
/// of a previously applied attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

/// An ordered format-key to value map attached to insert/retain operations.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Merge `b` over `a`. `keep_null` preserves removal markers, which is
/// needed when the receiving operation is a retain.
pub(crate) fn compose(
    a: &Attributes,
    b: &Attributes,
    keep_null: bool,
) -> Attributes {
    let mut result: Attributes = if keep_null {
        b.clone()
    } else {
        b.iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    };
    for (key, value) in a {
        if !b.contains_key(key) {
            result.insert(key.clone(), value.clone());
        }
    }
    result
}

/// Transform `b` against `a`. With `priority`, keys already claimed by
/// `a` win and are dropped from `b`.
pub(crate) fn transform(
    a: &Attributes,
    b: &Attributes,
    priority: bool,
) -> Attributes {
    if !priority {
        return b.clone();
    }
    b.iter()
        .filter(|(k, _)| !a.contains_key(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// The attribute changes needed to turn `a` into `b`.
pub(crate) fn diff(a: &Attributes, b: &Attributes) -> Attributes {
    let mut result = Attributes::new();
    for key in a.keys().chain(b.keys()) {
        if a.get(key) != b.get(key) {
            result.insert(
                key.clone(),
                b.get(key).cloned().unwrap_or(AttrValue::Null),
            );
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;

    fn a(pairs: &[(&str, AttrValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn compose_merges_right_over_left() {
        let left = a(&[("bold", true.into()), ("color", "red".into())]);
        let right = a(&[("color", "blue".into())]);
        assert_eq!(
            compose(&left, &right, false),
            a(&[("bold", true.into()), ("color", "blue".into())])
        );
    }

    #[test]
    fn compose_drops_null_unless_kept() {
        let left = a(&[("bold", true.into())]);
        let right = a(&[("bold", AttrValue::Null)]);
        assert_eq!(compose(&left, &right, false), Attributes::new());
        assert_eq!(
            compose(&left, &right, true),
            a(&[("bold", AttrValue::Null)])
        );
    }

    #[test]
    fn transform_without_priority_keeps_right() {
        let left = a(&[("bold", true.into())]);
        let right = a(&[("bold", false.into()), ("italic", true.into())]);
        assert_eq!(transform(&left, &right, false), right);
    }

    #[test]
    fn transform_with_priority_drops_contested_keys() {
        let left = a(&[("bold", true.into())]);
        let right = a(&[("bold", false.into()), ("italic", true.into())]);
        assert_eq!(
            transform(&left, &right, true),
            a(&[("italic", true.into())])
        );
    }

    #[test]
    fn diff_emits_null_for_removed_keys() {
        let left = a(&[("bold", true.into()), ("color", "red".into())]);
        let right = a(&[("color", "red".into()), ("italic", true.into())]);
        assert_eq!(
            diff(&left, &right),
            a(&[("bold", AttrValue::Null), ("italic", true.into())])
        );
    }
}
