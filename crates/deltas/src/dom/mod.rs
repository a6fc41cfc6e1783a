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

//! A flat-arena DOM for one conversion pass.
//!
//! Parents refer to their children by [`NodeHandle`]s and all nodes are
//! owned in one list held by the [`FlatDom`] itself. The arena is built
//! fresh from markup for every conversion and discarded afterwards; it is
//! never attached to a live rendering tree.

mod builder;
mod style;

pub(crate) use builder::parse;
pub(crate) use style::is_line;
pub use style::{ComputedStyle, Display, StyleCache};

use html5ever::QualName;

/// Identity of a node within one [`FlatDom`]. Also the key for the
/// per-conversion matcher side-table and style cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub(crate) usize);

#[derive(Clone, Debug)]
pub enum DomNode {
    Document(DocumentNode),
    Element(ElementNode),
    Text(TextNode),
    /// Comments parse but contribute nothing to conversion.
    Comment,
}

#[derive(Clone, Debug, Default)]
pub struct DocumentNode {
    pub(crate) children: Vec<NodeHandle>,
}

#[derive(Clone, Debug)]
pub struct ElementNode {
    pub(crate) name: QualName,
    pub(crate) attrs: Vec<(String, String)>,
    pub(crate) children: Vec<NodeHandle>,
    pub(crate) parent: Option<NodeHandle>,
}

impl ElementNode {
    /// Local tag name, lowercase as parsed.
    pub fn tag(&self) -> &str {
        self.name.local.as_ref()
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _v)| n == name)
            .map(|(_n, v)| v.as_str())
    }

    pub fn classes(&self) -> Vec<&str> {
        self.get_attr("class")
            .map(|v| v.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    /// The raw value of one property of the inline `style` attribute.
    pub fn style_property(&self, property: &str) -> Option<String> {
        let style = self.get_attr("style")?;
        for declaration in style.split(';') {
            let mut parts = declaration.splitn(2, ':');
            let name = parts.next()?.trim();
            if name.eq_ignore_ascii_case(property) {
                return parts.next().map(|v| v.trim().to_owned());
            }
        }
        None
    }

    /// Names of all inline style properties, in declaration order.
    pub fn style_property_names(&self) -> Vec<String> {
        let Some(style) = self.get_attr("style") else {
            return Vec::new();
        };
        style
            .split(';')
            .filter_map(|declaration| {
                let name = declaration.splitn(2, ':').next()?.trim();
                if name.is_empty() {
                    None
                } else {
                    Some(name.to_ascii_lowercase())
                }
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct TextNode {
    pub(crate) content: String,
    pub(crate) parent: Option<NodeHandle>,
}

impl TextNode {
    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Clone, Debug)]
pub struct FlatDom {
    pub(crate) nodes: Vec<DomNode>,
    pub(crate) document: NodeHandle,
}

impl FlatDom {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![DomNode::Document(DocumentNode::default())],
            document: NodeHandle(0),
        }
    }

    pub fn document_handle(&self) -> NodeHandle {
        self.document
    }

    /// The fragment wrapper element: the staging-container boundary for
    /// conversion. Absent only if parsing produced no element at all.
    pub fn root_element(&self) -> Option<NodeHandle> {
        let DomNode::Document(doc) = self.get(self.document) else {
            return None;
        };
        doc.children
            .iter()
            .copied()
            .find(|h| matches!(self.get(*h), DomNode::Element(_)))
    }

    pub fn get(&self, handle: NodeHandle) -> &DomNode {
        &self.nodes[handle.0]
    }

    pub(crate) fn get_mut(&mut self, handle: NodeHandle) -> &mut DomNode {
        &mut self.nodes[handle.0]
    }

    pub(crate) fn add_node(&mut self, node: DomNode) -> NodeHandle {
        self.nodes.push(node);
        NodeHandle(self.nodes.len() - 1)
    }

    pub fn element(&self, handle: NodeHandle) -> Option<&ElementNode> {
        match self.get(handle) {
            DomNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn children(&self, handle: NodeHandle) -> &[NodeHandle] {
        match self.get(handle) {
            DomNode::Document(doc) => &doc.children,
            DomNode::Element(el) => &el.children,
            DomNode::Text(_) | DomNode::Comment => &[],
        }
    }

    pub fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        match self.get(handle) {
            DomNode::Element(el) => el.parent,
            DomNode::Text(text) => text.parent,
            DomNode::Document(_) | DomNode::Comment => None,
        }
    }

    fn sibling(&self, handle: NodeHandle, offset: isize) -> Option<NodeHandle> {
        let parent = self.parent(handle)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|h| *h == handle)?;
        let target = index as isize + offset;
        if target < 0 {
            return None;
        }
        siblings.get(target as usize).copied()
    }

    pub fn prev_sibling(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.sibling(handle, -1)
    }

    pub fn next_sibling(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.sibling(handle, 1)
    }

    pub fn next_element_sibling(
        &self,
        handle: NodeHandle,
    ) -> Option<NodeHandle> {
        let parent = self.parent(handle)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|h| *h == handle)?;
        siblings[index + 1..]
            .iter()
            .copied()
            .find(|h| matches!(self.get(*h), DomNode::Element(_)))
    }

    /// Pre-order walk of all element descendants of `root`, which is the
    /// document-order contract tag-scoped matcher attachment relies on.
    pub fn descendant_elements(&self, root: NodeHandle) -> Vec<NodeHandle> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeHandle> =
            self.children(root).iter().rev().copied().collect();
        while let Some(handle) = stack.pop() {
            if matches!(self.get(handle), DomNode::Element(_)) {
                result.push(handle);
                stack.extend(self.children(handle).iter().rev().copied());
            }
        }
        result
    }
}
