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

use super::attributes::Attributes;

/// What an insert operation contributes to the document: a text run or an
/// opaque embedded unit of length 1 (image, video, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Embed { kind: String, value: String },
}

impl Content {
    /// Length in Unicode scalar values. Embeds always count as 1.
    pub fn len(&self) -> usize {
        match self {
            Content::Text(text) => text.chars().count(),
            Content::Embed { .. } => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Content::Text(text) if text.is_empty())
    }
}

/// A single operation in a [`Delta`](super::Delta).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Insert {
        content: Content,
        attributes: Attributes,
    },
    Retain {
        len: usize,
        attributes: Attributes,
    },
    Delete {
        len: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OpKind {
    Insert,
    Retain,
    Delete,
}

impl Op {
    pub fn insert(text: impl Into<String>) -> Self {
        Op::insert_attr(text, Attributes::new())
    }

    pub fn insert_attr(
        text: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        Op::Insert {
            content: Content::Text(text.into()),
            attributes,
        }
    }

    pub fn embed(
        kind: impl Into<String>,
        value: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        Op::Insert {
            content: Content::Embed {
                kind: kind.into(),
                value: value.into(),
            },
            attributes,
        }
    }

    pub fn retain(len: usize) -> Self {
        Op::Retain {
            len,
            attributes: Attributes::new(),
        }
    }

    pub fn retain_attr(len: usize, attributes: Attributes) -> Self {
        Op::Retain { len, attributes }
    }

    pub fn delete(len: usize) -> Self {
        Op::Delete { len }
    }

    pub fn len(&self) -> usize {
        match self {
            Op::Insert { content, .. } => content.len(),
            Op::Retain { len, .. } | Op::Delete { len } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Op::Insert { attributes, .. } | Op::Retain { attributes, .. } => {
                Some(attributes)
            }
            Op::Delete { .. } => None,
        }
    }

    /// The inserted text, if this is a text insert.
    pub fn text(&self) -> Option<&str> {
        match self {
            Op::Insert {
                content: Content::Text(text),
                ..
            } => Some(text),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> OpKind {
        match self {
            Op::Insert { .. } => OpKind::Insert,
            Op::Retain { .. } => OpKind::Retain,
            Op::Delete { .. } => OpKind::Delete,
        }
    }
}

/// Slice `len` chars of `text` starting at char offset `start`.
fn substring(text: &str, start: usize, len: usize) -> String {
    text.chars().skip(start).take(len).collect()
}

/// Cursor over a list of operations that can stop mid-operation, used by
/// compose/transform/diff. Reading past the end yields plain retains, so
/// callers never need to special-case length mismatches.
pub(crate) struct OpIter<'a> {
    ops: &'a [Op],
    index: usize,
    offset: usize,
}

impl<'a> OpIter<'a> {
    pub(crate) fn new(ops: &'a [Op]) -> Self {
        Self {
            ops,
            index: 0,
            offset: 0,
        }
    }

    pub(crate) fn has_next(&self) -> bool {
        self.index < self.ops.len()
    }

    pub(crate) fn peek_len(&self) -> usize {
        match self.ops.get(self.index) {
            Some(op) => op.len() - self.offset,
            None => usize::MAX,
        }
    }

    pub(crate) fn peek_kind(&self) -> OpKind {
        match self.ops.get(self.index) {
            Some(op) => op.kind(),
            None => OpKind::Retain,
        }
    }

    pub(crate) fn next_len(&mut self, len: usize) -> Op {
        let Some(op) = self.ops.get(self.index) else {
            return Op::retain(len);
        };
        let offset = self.offset;
        let available = op.len() - offset;
        let take = len.min(available);
        if take == available {
            self.index += 1;
            self.offset = 0;
        } else {
            self.offset += take;
        }
        match op {
            Op::Delete { .. } => Op::delete(take),
            Op::Retain { attributes, .. } => {
                Op::retain_attr(take, attributes.clone())
            }
            Op::Insert {
                content,
                attributes,
            } => match content {
                Content::Text(text) => Op::Insert {
                    content: Content::Text(substring(text, offset, take)),
                    attributes: attributes.clone(),
                },
                Content::Embed { .. } => Op::Insert {
                    content: content.clone(),
                    attributes: attributes.clone(),
                },
            },
        }
    }

    pub(crate) fn next_op(&mut self) -> Op {
        self.next_len(usize::MAX)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn iter_slices_text_inserts_by_chars() {
        let ops = vec![Op::insert("héllo")];
        let mut iter = OpIter::new(&ops);
        assert_eq!(iter.peek_len(), 5);
        assert_eq!(iter.next_len(2), Op::insert("hé"));
        assert_eq!(iter.next_len(10), Op::insert("llo"));
        assert!(!iter.has_next());
    }

    #[test]
    fn iter_past_the_end_yields_retains() {
        let ops = vec![Op::delete(2)];
        let mut iter = OpIter::new(&ops);
        assert_eq!(iter.next_op(), Op::delete(2));
        assert_eq!(iter.peek_kind(), OpKind::Retain);
        assert_eq!(iter.next_len(3), Op::retain(3));
    }

    #[test]
    fn embeds_have_length_one() {
        let op = Op::embed("image", "https://example.com/x.png", Attributes::new());
        assert_eq!(op.len(), 1);
    }
}
