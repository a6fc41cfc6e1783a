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

//! Ordered insert/retain/delete operation sequences ("deltas") describing
//! rich-text documents and changes to them.
//!
//! A delta containing only inserts is a *document*; a delta mixing
//! retains and deletes is a *change*. Changes apply to documents (and to
//! each other) through [`Delta::compose`], rebase against each other
//! through [`Delta::transform`], and the change between two documents is
//! recovered with [`Delta::diff`].

mod attributes;
mod operation;

pub use attributes::{AttrValue, Attributes};
pub use operation::{Content, Op};

use operation::{OpIter, OpKind};
use similar::{DiffOp, TextDiff};

/// Sentinel standing in for embeds when documents are flattened to text
/// for diffing.
const EMBED_SENTINEL: char = '\u{0}';

/// An ordered sequence of insert/retain/delete operations.
///
/// Deltas are value types: every combinator returns a new delta and never
/// mutates its inputs once handed to a consumer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Delta {
    ops: Vec<Op>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn last(&self) -> Option<&Op> {
        self.ops.last()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Target-document length: the sum of insert and retain lengths.
    pub fn len(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| !matches!(op, Op::Delete { .. }))
            .map(Op::len)
            .sum()
    }

    /// Total length deleted by this delta.
    pub fn delete_len(&self) -> usize {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Delete { len } => Some(*len),
                _ => None,
            })
            .sum()
    }

    // Chainable constructors, mirroring how conversion code builds
    // deltas up incrementally.

    pub fn insert(self, text: impl Into<String>) -> Self {
        self.insert_attr(text, Attributes::new())
    }

    pub fn insert_attr(
        mut self,
        text: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.push(Op::insert_attr(text, attributes));
        }
        self
    }

    pub fn insert_embed(
        mut self,
        kind: impl Into<String>,
        value: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        self.push(Op::embed(kind, value, attributes));
        self
    }

    pub fn retain(self, len: usize) -> Self {
        self.retain_attr(len, Attributes::new())
    }

    pub fn retain_attr(mut self, len: usize, attributes: Attributes) -> Self {
        if len > 0 {
            self.push(Op::retain_attr(len, attributes));
        }
        self
    }

    pub fn delete(mut self, len: usize) -> Self {
        if len > 0 {
            self.push(Op::delete(len));
        }
        self
    }

    /// Append an operation, canonicalizing as it goes: adjacent deletes
    /// merge, adjacent text inserts with equal attributes merge, and an
    /// insert slots in before an immediately preceding delete so that
    /// insert-then-delete order is normal form.
    pub fn push(&mut self, new_op: Op) {
        if new_op.is_empty() {
            return;
        }
        let mut index = self.ops.len();
        if let Some(last) = self.ops.last_mut() {
            if let (Op::Delete { len }, Op::Delete { len: new_len }) =
                (&mut *last, &new_op)
            {
                *len += new_len;
                return;
            }
            if matches!(last, Op::Delete { .. })
                && matches!(new_op, Op::Insert { .. })
            {
                index -= 1;
                if index == 0 {
                    self.ops.insert(0, new_op);
                    return;
                }
            }
        }
        if index > 0 {
            let merged = match (&mut self.ops[index - 1], &new_op) {
                (
                    Op::Insert {
                        content: Content::Text(text),
                        attributes,
                    },
                    Op::Insert {
                        content: Content::Text(new_text),
                        attributes: new_attributes,
                    },
                ) if attributes == new_attributes => {
                    text.push_str(new_text);
                    true
                }
                (
                    Op::Retain { len, attributes },
                    Op::Retain {
                        len: new_len,
                        attributes: new_attributes,
                    },
                ) if attributes == new_attributes => {
                    *len = len.saturating_add(*new_len);
                    true
                }
                _ => false,
            };
            if merged {
                return;
            }
        }
        self.ops.insert(index, new_op);
    }

    /// Drop a trailing bare retain, which changes nothing.
    pub fn chop(&mut self) {
        if let Some(Op::Retain { attributes, .. }) = self.ops.last() {
            if attributes.is_empty() {
                self.ops.pop();
            }
        }
    }

    /// Append all of `other`'s operations, merging at the seam.
    pub fn concat(mut self, other: Delta) -> Delta {
        let mut ops = other.ops.into_iter();
        if let Some(first) = ops.next() {
            self.push(first);
        }
        self.ops.extend(ops);
        self
    }

    /// Apply `other` on top of `self`, producing the combined change.
    pub fn compose(&self, other: &Delta) -> Delta {
        let mut this_iter = OpIter::new(&self.ops);
        let mut other_iter = OpIter::new(&other.ops);
        let mut delta = Delta::new();
        while this_iter.has_next() || other_iter.has_next() {
            if other_iter.peek_kind() == OpKind::Insert {
                delta.push(other_iter.next_op());
            } else if this_iter.peek_kind() == OpKind::Delete {
                delta.push(this_iter.next_op());
            } else {
                let len = this_iter.peek_len().min(other_iter.peek_len());
                let this_op = this_iter.next_len(len);
                let other_op = other_iter.next_len(len);
                match other_op {
                    Op::Retain {
                        attributes: other_attributes,
                        ..
                    } => {
                        let keep_null =
                            matches!(this_op, Op::Retain { .. });
                        let empty = Attributes::new();
                        let composed = attributes::compose(
                            this_op.attributes().unwrap_or(&empty),
                            &other_attributes,
                            keep_null,
                        );
                        match this_op {
                            Op::Insert { content, .. } => {
                                delta.push(Op::Insert {
                                    content,
                                    attributes: composed,
                                });
                            }
                            Op::Retain { len, .. } => {
                                delta.push(Op::retain_attr(len, composed));
                            }
                            // A delete on this side was consumed above.
                            Op::Delete { .. } => {}
                        }
                    }
                    Op::Delete { .. } => {
                        // Deleting retained content survives; deleting
                        // freshly inserted content cancels out.
                        if matches!(this_op, Op::Retain { .. }) {
                            delta.push(other_op);
                        }
                    }
                    // Inserts on the other side were consumed above.
                    Op::Insert { .. } => {}
                }
            }
        }
        delta.chop();
        delta
    }

    /// Rebase `other` so it applies after `self`. With `priority`,
    /// `self`'s operations are ordered first at equal positions.
    pub fn transform(&self, other: &Delta, priority: bool) -> Delta {
        let mut this_iter = OpIter::new(&self.ops);
        let mut other_iter = OpIter::new(&other.ops);
        let mut delta = Delta::new();
        while this_iter.has_next() || other_iter.has_next() {
            if this_iter.peek_kind() == OpKind::Insert
                && (priority || other_iter.peek_kind() != OpKind::Insert)
            {
                let len = this_iter.next_op().len();
                delta.push(Op::retain(len));
            } else if other_iter.peek_kind() == OpKind::Insert {
                delta.push(other_iter.next_op());
            } else {
                let len = this_iter.peek_len().min(other_iter.peek_len());
                let this_op = this_iter.next_len(len);
                let other_op = other_iter.next_len(len);
                match (this_op, other_op) {
                    // Our delete already removed the region they touched.
                    (Op::Delete { .. }, _) => {}
                    (_, Op::Delete { len }) => {
                        delta.push(Op::delete(len));
                    }
                    (this_op, other_op) => {
                        let empty = Attributes::new();
                        delta.push(Op::retain_attr(
                            len,
                            attributes::transform(
                                this_op.attributes().unwrap_or(&empty),
                                other_op.attributes().unwrap_or(&empty),
                                priority,
                            ),
                        ));
                    }
                }
            }
        }
        delta.chop();
        delta
    }

    /// The change turning document `self` into document `other`.
    ///
    /// Only meaningful between documents (insert-only deltas); retains and
    /// deletes in either input are skipped as best effort.
    pub fn diff(&self, other: &Delta) -> Delta {
        if self == other {
            return Delta::new();
        }
        let this_text = self.document_text();
        let other_text = other.document_text();
        let text_diff = TextDiff::from_chars(&this_text[..], &other_text[..]);
        let mut this_iter = OpIter::new(&self.ops);
        let mut other_iter = OpIter::new(&other.ops);
        let mut delta = Delta::new();
        for diff_op in text_diff.ops() {
            match *diff_op {
                DiffOp::Equal { len, .. } => {
                    diff_equal(&mut delta, &mut this_iter, &mut other_iter, len);
                }
                DiffOp::Delete { old_len, .. } => {
                    diff_delete(&mut delta, &mut this_iter, old_len);
                }
                DiffOp::Insert { new_len, .. } => {
                    diff_insert(&mut delta, &mut other_iter, new_len);
                }
                DiffOp::Replace {
                    old_len, new_len, ..
                } => {
                    diff_insert(&mut delta, &mut other_iter, new_len);
                    diff_delete(&mut delta, &mut this_iter, old_len);
                }
            }
        }
        delta.chop();
        delta
    }

    /// True when the concatenated trailing text inserts end with `suffix`.
    pub fn ends_with_text(&self, suffix: &str) -> bool {
        let suffix_len = suffix.chars().count();
        let mut tail = String::new();
        for op in self.ops.iter().rev() {
            let Some(text) = op.text() else {
                break;
            };
            tail = format!("{text}{tail}");
            if tail.chars().count() >= suffix_len {
                break;
            }
        }
        let tail_chars: Vec<char> = tail.chars().collect();
        if tail_chars.len() < suffix_len {
            return false;
        }
        tail_chars[tail_chars.len() - suffix_len..]
            .iter()
            .copied()
            .eq(suffix.chars())
    }

    /// Flatten a document delta to plain text, one sentinel char per
    /// embed. Non-insert operations are skipped.
    fn document_text(&self) -> String {
        let mut text = String::new();
        for op in &self.ops {
            match op {
                Op::Insert {
                    content: Content::Text(t),
                    ..
                } => text.push_str(t),
                Op::Insert {
                    content: Content::Embed { .. },
                    ..
                } => text.push(EMBED_SENTINEL),
                Op::Retain { .. } | Op::Delete { .. } => {
                    tracing::trace!("diff input contained a non-insert op");
                }
            }
        }
        text
    }
}

fn diff_equal(
    delta: &mut Delta,
    this_iter: &mut OpIter,
    other_iter: &mut OpIter,
    mut len: usize,
) {
    while len > 0 {
        let op_len = this_iter
            .peek_len()
            .min(other_iter.peek_len())
            .min(len);
        let this_op = this_iter.next_len(op_len);
        let other_op = other_iter.next_len(op_len);
        let same_content = match (&this_op, &other_op) {
            (
                Op::Insert { content: a, .. },
                Op::Insert { content: b, .. },
            ) => a == b,
            _ => false,
        };
        if same_content {
            let empty = Attributes::new();
            delta.push(Op::retain_attr(
                op_len,
                attributes::diff(
                    this_op.attributes().unwrap_or(&empty),
                    other_op.attributes().unwrap_or(&empty),
                ),
            ));
        } else {
            delta.push(other_op);
            delta.push(Op::delete(op_len));
        }
        len -= op_len;
    }
}

fn diff_insert(delta: &mut Delta, other_iter: &mut OpIter, mut len: usize) {
    while len > 0 {
        let op_len = other_iter.peek_len().min(len);
        delta.push(other_iter.next_len(op_len));
        len -= op_len;
    }
}

fn diff_delete(delta: &mut Delta, this_iter: &mut OpIter, mut len: usize) {
    while len > 0 {
        let op_len = this_iter.peek_len().min(len);
        this_iter.next_len(op_len);
        delta.push(Op::delete(op_len));
        len -= op_len;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn attrs(pairs: &[(&str, AttrValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn push_merges_adjacent_text_inserts_with_equal_attributes() {
        let delta = Delta::new().insert("Hello ").insert("world");
        assert_eq!(delta.ops(), &[Op::insert("Hello world")]);
    }

    #[test]
    fn push_keeps_inserts_with_differing_attributes_apart() {
        let delta = Delta::new()
            .insert("Hello ")
            .insert_attr("world", attrs(&[("bold", true.into())]));
        assert_eq!(delta.ops().len(), 2);
    }

    #[test]
    fn push_orders_insert_before_preceding_delete() {
        let delta = Delta::new().delete(3).insert("abc");
        assert_eq!(delta.ops(), &[Op::insert("abc"), Op::delete(3)]);
    }

    #[test]
    fn push_merges_adjacent_deletes() {
        let delta = Delta::new().delete(2).delete(3);
        assert_eq!(delta.ops(), &[Op::delete(5)]);
    }

    #[test]
    fn length_counts_inserts_and_retains_only() {
        let delta = Delta::new().retain(3).insert("ab").delete(4);
        assert_eq!(delta.len(), 5);
        assert_eq!(delta.delete_len(), 4);
    }

    #[test]
    fn compose_applies_a_change_to_a_document() {
        let doc = Delta::new().insert("Hello world\n");
        let change = Delta::new()
            .retain(6)
            .delete(5)
            .insert_attr("there", attrs(&[("bold", true.into())]));
        let composed = doc.compose(&change);
        assert_eq!(
            composed,
            Delta::new()
                .insert("Hello ")
                .insert_attr("there", attrs(&[("bold", true.into())]))
                .insert("\n")
        );
    }

    #[test]
    fn compose_retain_merges_attributes() {
        let doc = Delta::new().insert("ab");
        let change = Delta::new()
            .retain_attr(2, attrs(&[("italic", true.into())]));
        assert_eq!(
            doc.compose(&change),
            Delta::new().insert_attr("ab", attrs(&[("italic", true.into())]))
        );
    }

    #[test]
    fn compose_is_associative_on_a_sample() {
        let a = Delta::new().insert("abc\n");
        let b = Delta::new().retain(1).insert("X");
        let c = Delta::new().retain(2).delete(2);
        assert_eq!(a.compose(&b).compose(&c), a.compose(&b.compose(&c)));
    }

    #[test]
    fn compose_delete_cancels_fresh_insert() {
        let a = Delta::new().insert("abc");
        let b = Delta::new().delete(3);
        assert_eq!(a.compose(&b), Delta::new());
    }

    #[test]
    fn transform_shifts_past_a_prior_insert() {
        let foreign = Delta::new().insert("AA");
        let local = Delta::new().retain(3).insert("x");
        assert_eq!(
            foreign.transform(&local, true),
            Delta::new().retain(5).insert("x")
        );
    }

    #[test]
    fn transform_priority_orders_receiver_first_at_equal_positions() {
        let a = Delta::new().insert("A");
        let b = Delta::new().insert("B");
        assert_eq!(
            a.transform(&b, true),
            Delta::new().retain(1).insert("B")
        );
        assert_eq!(a.transform(&b, false), Delta::new().insert("B"));
    }

    #[test]
    fn transform_drops_ops_on_deleted_regions() {
        let foreign = Delta::new().delete(2);
        let local = Delta::new().retain(1).insert("x");
        assert_eq!(foreign.transform(&local, true), Delta::new().insert("x"));
    }

    #[test]
    fn diff_recovers_an_insertion() {
        let a = Delta::new().insert("Hello\n");
        let b = Delta::new().insert("Hello world\n");
        let change = a.diff(&b);
        assert_eq!(change, Delta::new().retain(5).insert(" world"));
        assert_eq!(a.compose(&change), b);
    }

    #[test]
    fn diff_recovers_a_deletion() {
        let a = Delta::new().insert("Hello world\n");
        let b = Delta::new().insert("Hello\n");
        let change = a.diff(&b);
        assert_eq!(a.compose(&change), b);
    }

    #[test]
    fn diff_emits_attribute_changes_on_equal_text() {
        let a = Delta::new().insert("abc");
        let b = Delta::new()
            .insert("a")
            .insert_attr("b", attrs(&[("bold", true.into())]))
            .insert("c");
        let change = a.diff(&b);
        assert_eq!(
            change,
            Delta::new()
                .retain(1)
                .retain_attr(1, attrs(&[("bold", true.into())]))
        );
        assert_eq!(a.compose(&change), b);
    }

    #[test]
    fn diff_distinguishes_embeds_with_equal_sentinels() {
        let a = Delta::new().insert_embed("image", "a.png", Attributes::new());
        let b = Delta::new().insert_embed("image", "b.png", Attributes::new());
        let change = a.diff(&b);
        assert_eq!(a.compose(&change), b);
    }

    #[test]
    fn diff_of_identical_documents_is_empty() {
        let a = Delta::new().insert("same\n");
        assert_eq!(a.diff(&a.clone()), Delta::new());
    }

    #[test]
    fn ends_with_text_spans_multiple_ops() {
        let delta = Delta::new()
            .insert_attr("ab", attrs(&[("bold", true.into())]))
            .insert("\n");
        assert!(delta.ends_with_text("b\n"));
        assert!(!delta.ends_with_text("x\n"));
    }

    #[test]
    fn chop_removes_trailing_bare_retain() {
        let mut delta = Delta::new().insert("a").retain(3);
        delta.chop();
        assert_eq!(delta, Delta::new().insert("a"));
        let mut kept = Delta::new()
            .retain_attr(1, attrs(&[("bold", true.into())]));
        kept.chop();
        assert_eq!(kept.ops().len(), 1);
    }
}
