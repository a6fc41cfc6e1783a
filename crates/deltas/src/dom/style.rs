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

//! Headless computed-style resolution.
//!
//! Pasted markup leans on visual properties (display type, font weight,
//! whitespace handling) that a browser would answer via
//! `getComputedStyle`. Here they resolve from tag defaults plus the
//! inline `style` attribute, inheriting the inheritable ones down the
//! tree, memoized per conversion pass in a [`StyleCache`].

use std::cell::RefCell;
use std::collections::HashMap;

use super::{DomNode, ElementNode, FlatDom, NodeHandle};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Display {
    #[default]
    Inline,
    Block,
    ListItem,
    None,
}

/// The resolved visual style of one node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,
    pub bold: bool,
    pub italic: bool,
    pub white_space_pre: bool,
    pub margin_top: f64,
    pub margin_bottom: f64,
}

fn default_display(tag: &str) -> Display {
    match tag {
        "li" => Display::ListItem,
        // Tables compute `display: table`, not `block`, so they are
        // deliberately absent: a table never reads as a line.
        "address" | "article" | "aside" | "blockquote" | "div" | "dl"
        | "dd" | "dt" | "fieldset" | "figure" | "figcaption" | "footer"
        | "form" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "header"
        | "hr" | "main" | "nav" | "ol" | "p" | "pre" | "section"
        | "ul" => Display::Block,
        _ => Display::Inline,
    }
}

fn is_bold_value(value: &str) -> bool {
    value.starts_with("bold")
        || value.parse::<u32>().map(|weight| weight >= 700).unwrap_or(false)
}

fn parse_px(value: &str) -> f64 {
    value
        .trim()
        .trim_end_matches("px")
        .trim()
        .parse()
        .unwrap_or(0.0)
}

impl ComputedStyle {
    fn resolve(el: &ElementNode, inherited: Option<&ComputedStyle>) -> Self {
        let tag = el.tag();
        let display = match el.style_property("display") {
            Some(value) => match value.as_str() {
                "block" => Display::Block,
                "list-item" => Display::ListItem,
                "none" => Display::None,
                _ => Display::Inline,
            },
            None => default_display(tag),
        };
        let bold = match el.style_property("font-weight") {
            Some(value) => is_bold_value(&value),
            None => {
                matches!(tag, "b" | "strong" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
                    || inherited.map(|s| s.bold).unwrap_or(false)
            }
        };
        let italic = match el.style_property("font-style") {
            Some(value) => value == "italic" || value == "oblique",
            None => {
                matches!(tag, "i" | "em" | "cite" | "var")
                    || inherited.map(|s| s.italic).unwrap_or(false)
            }
        };
        let white_space_pre = match el.style_property("white-space") {
            Some(value) => value.starts_with("pre"),
            None => {
                tag == "pre"
                    || inherited.map(|s| s.white_space_pre).unwrap_or(false)
            }
        };
        let margin_top = el
            .style_property("margin-top")
            .map(|v| parse_px(&v))
            .unwrap_or(0.0);
        let margin_bottom = el
            .style_property("margin-bottom")
            .map(|v| parse_px(&v))
            .unwrap_or(0.0);
        Self {
            display,
            bold,
            italic,
            white_space_pre,
            margin_top,
            margin_bottom,
        }
    }
}

/// Per-conversion memo of resolved styles, keyed by node identity.
/// Never outlives one conversion pass.
#[derive(Debug, Default)]
pub struct StyleCache {
    map: RefCell<HashMap<NodeHandle, ComputedStyle>>,
}

impl StyleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn computed(&self, dom: &FlatDom, handle: NodeHandle) -> ComputedStyle {
        {
            let map = self.map.borrow();
            if let Some(style) = map.get(&handle) {
                return style.clone();
            }
        }
        let inherited = dom.parent(handle).map(|p| self.computed(dom, p));
        let style = match dom.get(handle) {
            DomNode::Element(el) => {
                ComputedStyle::resolve(el, inherited.as_ref())
            }
            _ => {
                let mut style = inherited.unwrap_or_default();
                style.display = Display::Inline;
                style
            }
        };
        self.map.borrow_mut().insert(handle, style.clone());
        style
    }
}

/// A node reads as a line when it is a non-empty element whose resolved
/// display is block-level or list-item-level. Childless elements are
/// excluded so embeds never read as lines.
pub(crate) fn is_line(
    dom: &FlatDom,
    styles: &StyleCache,
    handle: NodeHandle,
) -> bool {
    let Some(el) = dom.element(handle) else {
        return false;
    };
    if el.children.is_empty() {
        return false;
    }
    matches!(
        styles.computed(dom, handle).display,
        Display::Block | Display::ListItem
    )
}
