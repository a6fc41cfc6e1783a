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

//! The built-in matcher pipeline.
//!
//! Each matcher maps `(node, accumulated delta)` to an updated delta.
//! They run in registration order during the post-order traversal; an
//! unmatched node is simply left alone.

use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{ConvertContext, MatcherFn};
use crate::delta::{AttrValue, Attributes, Content, Delta, Op};
use crate::dom::{is_line, DomNode, NodeHandle};
use crate::registry::{BlotKind, Registry};

static WS_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s\s+").expect("whitespace-run regex"));
static LEADING_WS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+").expect("leading-whitespace regex"));
static TRAILING_WS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+$").expect("trailing-whitespace regex"));

/// Collapse one whitespace run. Non-breaking spaces survive; if nothing
/// survives and `collapse` is set, a single plain space does, so that
/// meaningful word separation is not deleted outright.
fn squash(run: &str, collapse: bool) -> String {
    let kept: String = run.chars().filter(|c| *c == '\u{a0}').collect();
    if kept.is_empty() && collapse {
        " ".to_owned()
    } else {
        kept
    }
}

/// Whether a node implies a line boundary. The staging root itself always
/// reads as a line: it stands in for the block-level staging container.
fn line(ctx: &ConvertContext, handle: NodeHandle) -> bool {
    if handle == ctx.root {
        return !ctx.dom.children(handle).is_empty();
    }
    is_line(ctx.dom, &ctx.styles, handle)
}

/// Merge `{key: value}` onto the delta. Inline formats go onto every
/// insert that does not already carry the key; block formats go onto the
/// line breaks of those inserts instead, keeping converted documents in
/// canonical line-attribute form.
pub fn apply_format(
    registry: &Registry,
    delta: Delta,
    key: &str,
    value: AttrValue,
) -> Delta {
    if registry.is_block_format(key) {
        let mut change = Delta::new();
        for op in delta.ops() {
            match op {
                Op::Insert {
                    content: Content::Text(text),
                    attributes,
                } if !attributes.contains_key(key) => {
                    let mut run = 0;
                    for ch in text.chars() {
                        if ch == '\n' {
                            if run > 0 {
                                change.push(Op::retain(run));
                                run = 0;
                            }
                            change.push(Op::retain_attr(
                                1,
                                Attributes::from([(
                                    key.to_owned(),
                                    value.clone(),
                                )]),
                            ));
                        } else {
                            run += 1;
                        }
                    }
                    if run > 0 {
                        change.push(Op::retain(run));
                    }
                }
                op => change.push(Op::retain(op.len())),
            }
        }
        delta.compose(&change)
    } else {
        let mut result = Delta::new();
        for op in delta.ops() {
            match op {
                Op::Insert {
                    content,
                    attributes,
                } if !attributes.contains_key(key) => {
                    let mut merged = attributes.clone();
                    merged.insert(key.to_owned(), value.clone());
                    result.push(Op::Insert {
                        content: content.clone(),
                        attributes: merged,
                    });
                }
                op => result.push(op.clone()),
            }
        }
        result
    }
}

pub fn apply_formats(
    registry: &Registry,
    delta: Delta,
    formats: Attributes,
) -> Delta {
    formats
        .into_iter()
        .fold(delta, |delta, (key, value)| {
            apply_format(registry, delta, &key, value)
        })
}

/// Extract literal text, collapsing whitespace unless a `pre` context is
/// in effect, and trimming the edges that touch a line boundary.
pub fn match_text(
    ctx: &ConvertContext,
    node: NodeHandle,
    delta: Delta,
) -> Delta {
    let DomNode::Text(text_node) = ctx.dom.get(node) else {
        return delta;
    };
    let mut text = text_node.content().to_owned();
    let parent = ctx.dom.parent(node);
    if let Some(parent_el) = parent.and_then(|p| ctx.dom.element(p)) {
        // Word represents an empty line as <o:p>&nbsp;</o:p>.
        if parent_el.tag().eq_ignore_ascii_case("o:p") {
            return delta.insert(text.trim_matches(char::is_whitespace));
        }
    }
    if text.trim_matches(char::is_whitespace).is_empty()
        && parent == Some(ctx.root)
    {
        return delta;
    }
    let pre = parent
        .map(|p| ctx.styles.computed(ctx.dom, p).white_space_pre)
        .unwrap_or(false);
    if !pre {
        text = text.replace("\r\n", " ").replace('\n', " ");
        text = WS_RUN
            .replace_all(&text, |caps: &Captures| squash(&caps[0], true))
            .into_owned();
        let opens_block = match ctx.dom.prev_sibling(node) {
            None => parent.map(|p| line(ctx, p)).unwrap_or(false),
            Some(prev) => line(ctx, prev),
        };
        if opens_block {
            text = LEADING_WS
                .replace(&text, |caps: &Captures| squash(&caps[0], false))
                .into_owned();
        }
        let closes_block = match ctx.dom.next_sibling(node) {
            None => parent.map(|p| line(ctx, p)).unwrap_or(false),
            Some(next) => line(ctx, next),
        };
        if closes_block {
            text = TRAILING_WS
                .replace(&text, |caps: &Captures| squash(&caps[0], false))
                .into_owned();
        }
    }
    delta.insert(text)
}

/// Insert a line break when the node (or, lookahead, its next sibling)
/// is line-level and the sequence does not already end in one.
pub fn match_newline(
    ctx: &ConvertContext,
    node: NodeHandle,
    delta: Delta,
) -> Delta {
    if delta.ends_with_text("\n") {
        return delta;
    }
    let joins_next_line = delta.len() > 0
        && ctx
            .dom
            .next_sibling(node)
            .map(|next| line(ctx, next))
            .unwrap_or(false);
    if line(ctx, node) || joins_next_line {
        delta.insert("\n")
    } else {
        delta
    }
}

pub fn match_break(
    _ctx: &ConvertContext,
    _node: NodeHandle,
    delta: Delta,
) -> Delta {
    if delta.ends_with_text("\n") {
        delta
    } else {
        delta.insert("\n")
    }
}

/// Resolve a node's registered content type: embeds replace the subtree's
/// output with a single opaque insert, format blots merge their format
/// onto the existing sequence.
pub fn match_blot(
    ctx: &ConvertContext,
    node: NodeHandle,
    delta: Delta,
) -> Delta {
    let Some(el) = ctx.dom.element(node) else {
        return delta;
    };
    let Some(blot) = ctx.registry.query_tag(el.tag()) else {
        return delta;
    };
    match blot.kind {
        BlotKind::Embed => {
            if let Some(AttrValue::Str(value)) =
                blot.value.and_then(|value_fn| value_fn(el))
            {
                return Delta::new().insert_embed(
                    blot.name.clone(),
                    value,
                    Attributes::new(),
                );
            }
            delta
        }
        BlotKind::Block | BlotKind::Inline => {
            if let Some(value) =
                blot.formats.and_then(|formats_fn| formats_fn(el))
            {
                apply_format(ctx.registry, delta, &blot.name, value)
            } else {
                delta
            }
        }
    }
}

/// Visually separated paragraphs that markup did not delineate: insert a
/// blank line when the rendered gap to the next sibling exceeds 1.5x the
/// node's rendered height plus margins. Needs host layout metrics.
pub fn match_spacing(
    ctx: &ConvertContext,
    node: NodeHandle,
    delta: Delta,
) -> Delta {
    let Some(layout) = ctx.layout else {
        return delta;
    };
    if !line(ctx, node) || delta.ends_with_text("\n\n") {
        return delta;
    }
    let Some(next) = ctx.dom.next_element_sibling(node) else {
        return delta;
    };
    let (Some(top), Some(height), Some(next_top)) = (
        layout.offset_top(node),
        layout.offset_height(node),
        layout.offset_top(next),
    ) else {
        return delta;
    };
    let style = ctx.styles.computed(ctx.dom, node);
    let node_height = height + style.margin_top + style.margin_bottom;
    if next_top > top + node_height * 1.5 {
        delta.insert("\n")
    } else {
        delta
    }
}

/// Merge every recognized attribute-, class- and style-based format
/// present on the node.
pub fn match_attributor(
    ctx: &ConvertContext,
    node: NodeHandle,
    delta: Delta,
) -> Delta {
    let Some(el) = ctx.dom.element(node) else {
        return delta;
    };
    let formats = ctx.registry.formats_of(el);
    if formats.is_empty() {
        delta
    } else {
        apply_formats(ctx.registry, delta, formats)
    }
}

fn parse_leading_f64(value: &str) -> f64 {
    let numeric: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    numeric.parse().unwrap_or(0.0)
}

/// Inline font styling that does not go through an attributor: bold and
/// italic declared directly, plus a leading tab for a positive
/// text-indent.
pub fn match_styles(
    ctx: &ConvertContext,
    node: NodeHandle,
    mut delta: Delta,
) -> Delta {
    let Some(el) = ctx.dom.element(node) else {
        return delta;
    };
    let computed = ctx.styles.computed(ctx.dom, node);
    let mut formats = Attributes::new();
    if el.style_property("font-style").is_some() && computed.italic {
        formats.insert("italic".to_owned(), AttrValue::Bool(true));
    }
    if el.style_property("font-weight").is_some() && computed.bold {
        formats.insert("bold".to_owned(), AttrValue::Bool(true));
    }
    if !formats.is_empty() {
        delta = apply_formats(ctx.registry, delta, formats);
    }
    if let Some(indent) = el.style_property("text-indent") {
        // Could be 0.5in.
        if parse_leading_f64(&indent) > 0.0 {
            delta = Delta::new().insert("\t").concat(delta);
        }
    }
    delta
}

/// Apply the nesting depth of a list item as an indent format on its
/// trailing line break.
pub fn match_indent(
    ctx: &ConvertContext,
    node: NodeHandle,
    delta: Delta,
) -> Delta {
    let Some(el) = ctx.dom.element(node) else {
        return delta;
    };
    let is_list_item = ctx
        .registry
        .query_tag(el.tag())
        .map(|blot| blot.name == "list-item")
        .unwrap_or(false);
    if !is_list_item || !delta.ends_with_text("\n") {
        return delta;
    }
    let mut indent: i64 = -1;
    let mut ancestor = ctx.dom.parent(node);
    while let Some(handle) = ancestor {
        if handle == ctx.root {
            break;
        }
        if let Some(ancestor_el) = ctx.dom.element(handle) {
            let is_list = ctx
                .registry
                .query_tag(ancestor_el.tag())
                .map(|blot| blot.name == "list")
                .unwrap_or(false);
            if is_list {
                indent += 1;
            }
        }
        ancestor = ctx.dom.parent(handle);
    }
    if indent <= 0 {
        return delta;
    }
    let len = delta.len();
    delta.compose(
        &Delta::new().retain(len - 1).retain_attr(
            1,
            Attributes::from([("indent".to_owned(), AttrValue::Int(indent))]),
        ),
    )
}

/// Force a boolean format unconditionally (legacy bold/italic tags).
pub fn alias(format: &'static str) -> MatcherFn {
    Rc::new(move |ctx: &ConvertContext, _node, delta| {
        apply_format(ctx.registry, delta, format, AttrValue::Bool(true))
    })
}

/// Discard a subtree's contribution entirely.
pub fn match_ignore(
    _ctx: &ConvertContext,
    _node: NodeHandle,
    _delta: Delta,
) -> Delta {
    Delta::new()
}
