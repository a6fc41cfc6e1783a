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

//! Mapping from DOM attributes, classes, styles and tag names to semantic
//! formatting keys and content types.
//!
//! Two registries live here: *attributors* translate a single attribute,
//! class or inline-style property into a `{format: value}` pair, and
//! *blots* describe content types keyed by tag name (inline formats,
//! block formats, and opaque embeds). Conversion consults both; hosts can
//! extend either before constructing a
//! [`Clipboard`](crate::clipboard::Clipboard).

use crate::delta::{AttrValue, Attributes};
use crate::dom::ElementNode;

/// Whether a format applies to inline runs or to whole lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Inline,
    Block,
}

/// Where an attributor reads its value from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrSource {
    /// A plain DOM attribute, e.g. `align`.
    Attribute,
    /// A prefixed class, e.g. `ql-align-center` for prefix `ql-align`.
    Class,
    /// An inline style property, e.g. `text-align`.
    Style,
}

/// One attribute/class/style to format-key translation rule.
#[derive(Clone, Debug)]
pub struct Attributor {
    pub key: String,
    pub source: AttrSource,
    pub name: String,
    pub scope: Scope,
    pub whitelist: Option<Vec<String>>,
}

impl Attributor {
    pub fn new(
        key: &str,
        source: AttrSource,
        name: &str,
        scope: Scope,
    ) -> Self {
        Self {
            key: key.to_owned(),
            source,
            name: name.to_owned(),
            scope,
            whitelist: None,
        }
    }

    pub fn with_whitelist(mut self, values: &[&str]) -> Self {
        self.whitelist =
            Some(values.iter().map(|v| (*v).to_owned()).collect());
        self
    }

    /// Read this attributor's value off a node, if present and allowed.
    pub fn value(&self, node: &ElementNode) -> Option<AttrValue> {
        let raw = match self.source {
            AttrSource::Attribute => node.get_attr(&self.name)?.to_owned(),
            AttrSource::Class => {
                let prefix = format!("{}-", self.name);
                node.classes()
                    .iter()
                    .find_map(|class| class.strip_prefix(&prefix))?
                    .to_owned()
            }
            AttrSource::Style => node.style_property(&self.name)?,
        };
        if raw.is_empty() {
            return None;
        }
        if let Some(whitelist) = &self.whitelist {
            if !whitelist.contains(&raw) {
                return None;
            }
        }
        Some(AttrValue::Str(raw))
    }
}

/// How a blot contributes to an operation sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlotKind {
    /// Opaque unit of length 1; replaces its subtree's output.
    Embed,
    /// Line-level format applied to the trailing line break.
    Block,
    /// Run-level format applied to inserts.
    Inline,
}

type ExtractFn = fn(&ElementNode) -> Option<AttrValue>;

/// A content-type descriptor keyed by tag name.
#[derive(Clone, Debug)]
pub struct Blot {
    pub name: String,
    pub tags: Vec<String>,
    pub kind: BlotKind,
    /// Embed payload extractor.
    pub value: Option<ExtractFn>,
    /// Format value extractor for non-embeds.
    pub formats: Option<ExtractFn>,
}

impl Blot {
    pub fn new(name: &str, tags: &[&str], kind: BlotKind) -> Self {
        Self {
            name: name.to_owned(),
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            kind,
            value: None,
            formats: None,
        }
    }

    pub fn with_value(mut self, value: ExtractFn) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_formats(mut self, formats: ExtractFn) -> Self {
        self.formats = Some(formats);
        self
    }

    pub fn scope(&self) -> Scope {
        match self.kind {
            BlotKind::Block => Scope::Block,
            BlotKind::Embed | BlotKind::Inline => Scope::Inline,
        }
    }
}

fn true_formats(_node: &ElementNode) -> Option<AttrValue> {
    Some(AttrValue::Bool(true))
}

fn header_formats(node: &ElementNode) -> Option<AttrValue> {
    let level = node.tag().strip_prefix('h')?.parse::<i64>().ok()?;
    Some(AttrValue::Int(level))
}

fn list_formats(node: &ElementNode) -> Option<AttrValue> {
    Some(AttrValue::Str(
        if node.tag() == "ol" { "ordered" } else { "bullet" }.to_owned(),
    ))
}

fn link_formats(node: &ElementNode) -> Option<AttrValue> {
    node.get_attr("href").map(|href| AttrValue::Str(href.to_owned()))
}

fn image_value(node: &ElementNode) -> Option<AttrValue> {
    node.get_attr("src").map(|src| AttrValue::Str(src.to_owned()))
}

/// The format and content-type registry consulted during conversion.
#[derive(Clone, Debug)]
pub struct Registry {
    attributors: Vec<Attributor>,
    blots: Vec<Blot>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            attributors: Vec::new(),
            blots: Vec::new(),
        }
    }

    /// The standard formats. Attribute-sourced attributors register ahead
    /// of style-sourced ones of the same key; lookup order is
    /// registration order, which is the precedence contract.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for attributor in [
            Attributor::new("align", AttrSource::Attribute, "align", Scope::Block)
                .with_whitelist(&["right", "center", "justify"]),
            Attributor::new("direction", AttrSource::Attribute, "dir", Scope::Block)
                .with_whitelist(&["rtl"]),
            Attributor::new("align", AttrSource::Class, "ql-align", Scope::Block),
            Attributor::new("indent", AttrSource::Class, "ql-indent", Scope::Block),
            Attributor::new("font", AttrSource::Class, "ql-font", Scope::Inline),
            Attributor::new("size", AttrSource::Class, "ql-size", Scope::Inline),
            Attributor::new("align", AttrSource::Style, "text-align", Scope::Block)
                .with_whitelist(&["right", "center", "justify"]),
            Attributor::new("direction", AttrSource::Style, "direction", Scope::Block)
                .with_whitelist(&["rtl"]),
            Attributor::new("background", AttrSource::Style, "background-color", Scope::Inline),
            Attributor::new("color", AttrSource::Style, "color", Scope::Inline),
            Attributor::new("font", AttrSource::Style, "font-family", Scope::Inline),
            Attributor::new("size", AttrSource::Style, "font-size", Scope::Inline),
        ] {
            registry.add_attributor(attributor);
        }
        for blot in [
            Blot::new("list", &["ol", "ul"], BlotKind::Block)
                .with_formats(list_formats),
            Blot::new("list-item", &["li"], BlotKind::Block),
            Blot::new("header", &["h1", "h2", "h3", "h4", "h5", "h6"], BlotKind::Block)
                .with_formats(header_formats),
            Blot::new("blockquote", &["blockquote"], BlotKind::Block)
                .with_formats(true_formats),
            Blot::new("code-block", &["pre"], BlotKind::Block)
                .with_formats(true_formats),
            Blot::new("bold", &["strong", "b"], BlotKind::Inline)
                .with_formats(true_formats),
            Blot::new("italic", &["em", "i"], BlotKind::Inline)
                .with_formats(true_formats),
            Blot::new("underline", &["u"], BlotKind::Inline)
                .with_formats(true_formats),
            Blot::new("strike", &["s", "del"], BlotKind::Inline)
                .with_formats(true_formats),
            Blot::new("code", &["code"], BlotKind::Inline)
                .with_formats(true_formats),
            Blot::new("link", &["a"], BlotKind::Inline)
                .with_formats(link_formats),
            Blot::new("image", &["img"], BlotKind::Embed)
                .with_value(image_value),
        ] {
            registry.add_blot(blot);
        }
        registry
    }

    pub fn add_attributor(&mut self, attributor: Attributor) {
        self.attributors.push(attributor);
    }

    pub fn add_blot(&mut self, blot: Blot) {
        self.blots.push(blot);
    }

    /// The content type registered for a tag name, if any.
    pub fn query_tag(&self, tag: &str) -> Option<&Blot> {
        self.blots
            .iter()
            .find(|blot| blot.tags.iter().any(|t| t == tag))
    }

    /// The first attributor registered under a format key, optionally
    /// filtered by scope.
    pub fn query_format(
        &self,
        key: &str,
        scope: Option<Scope>,
    ) -> Option<&Attributor> {
        self.attributors.iter().find(|attributor| {
            attributor.key == key
                && scope.map(|s| attributor.scope == s).unwrap_or(true)
        })
    }

    /// Whether a format key is line-scoped (attributor or blot).
    pub fn is_block_format(&self, key: &str) -> bool {
        self.query_format(key, Some(Scope::Block)).is_some()
            || self
                .blots
                .iter()
                .any(|blot| blot.name == key && blot.scope() == Scope::Block)
    }

    /// Every recognized format present on a node, resolved in
    /// registration order. First writer wins, which is what gives
    /// attribute-based attributors priority over style-based ones of
    /// the same key.
    pub fn formats_of(&self, node: &ElementNode) -> Attributes {
        let mut formats = Attributes::new();
        for attributor in &self.attributors {
            if formats.contains_key(&attributor.key) {
                continue;
            }
            if let Some(value) = attributor.value(node) {
                formats.insert(attributor.key.clone(), value);
            }
        }
        formats
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
