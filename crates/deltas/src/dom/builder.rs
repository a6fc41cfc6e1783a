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

use std::cell::{Ref, RefCell};

use html5ever::interface::NextParserState;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{
    namespace_url, ns, parse_fragment, Attribute, LocalName, QualName,
};

use super::{DocumentNode, DomNode, ElementNode, FlatDom, NodeHandle, TextNode};

pub(crate) fn qual_name(name: &str) -> QualName {
    QualName::new(None, ns!(html), LocalName::from(name))
}

/// Parse an HTML fragment into a [`FlatDom`], best effort.
///
/// Malformed markup never fails: whatever the tree builder recovered is
/// returned and any parse errors are only logged.
pub(crate) fn parse(html: &str) -> FlatDom {
    let (dom, errors) = parse_fragment(
        DomBuilder::default(),
        Default::default(),
        qual_name(""),
        vec![],
    )
    .from_utf8()
    .one(html.as_bytes());
    if !errors.is_empty() {
        tracing::debug!(?errors, "recovered from malformed markup");
    }
    dom
}

struct BuilderState {
    dom: FlatDom,
    parse_errors: Vec<String>,
}

/// html5ever `TreeSink` feeding a [`FlatDom`] arena. Handles are indices
/// into the arena's node list; parent links are fixed up on append.
pub(crate) struct DomBuilder {
    state: RefCell<BuilderState>,
}

impl Default for DomBuilder {
    fn default() -> Self {
        Self {
            state: RefCell::new(BuilderState {
                dom: FlatDom::new(),
                parse_errors: Vec::new(),
            }),
        }
    }
}

impl TreeSink for DomBuilder {
    type Handle = NodeHandle;
    type Output = (FlatDom, Vec<String>);
    type ElemName<'a> = Ref<'a, QualName>;

    fn finish(self) -> Self::Output {
        let state = self.state.into_inner();
        (state.dom, state.parse_errors)
    }

    fn parse_error(&self, msg: std::borrow::Cow<'static, str>) {
        self.state.borrow_mut().parse_errors.push(String::from(msg));
    }

    fn get_document(&self) -> Self::Handle {
        self.state.borrow().dom.document_handle()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        Ref::map(self.state.borrow(), |state| {
            match state.dom.get(*target) {
                DomNode::Element(el) => &el.name,
                _ => panic!("elem_name called on a non-element"),
            }
        })
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        self.state
            .borrow_mut()
            .dom
            .add_node(DomNode::Element(ElementNode {
                name,
                attrs: attrs
                    .into_iter()
                    .map(|attr| {
                        (
                            attr.name.local.as_ref().to_owned(),
                            attr.value.as_ref().to_owned(),
                        )
                    })
                    .collect(),
                children: Vec::new(),
                parent: None,
            }))
    }

    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        // Comments are kept as inert nodes so pasted markup containing
        // them still parses; conversion skips them.
        self.state.borrow_mut().dom.add_node(DomNode::Comment)
    }

    fn create_pi(
        &self,
        _target: StrTendril,
        _data: StrTendril,
    ) -> Self::Handle {
        self.state.borrow_mut().dom.add_node(DomNode::Comment)
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let dom = &mut self.state.borrow_mut().dom;
        match child {
            NodeOrText::AppendNode(child) => {
                match dom.get_mut(child) {
                    DomNode::Element(el) => el.parent = Some(*parent),
                    DomNode::Text(text) => text.parent = Some(*parent),
                    DomNode::Document(_) | DomNode::Comment => {}
                }
                match dom.get_mut(*parent) {
                    DomNode::Document(doc) => doc.children.push(child),
                    DomNode::Element(el) => el.children.push(child),
                    DomNode::Text(_) | DomNode::Comment => {
                        panic!("appending node to a leaf: {:?}", parent)
                    }
                }
            }
            NodeOrText::AppendText(tendril) => {
                // Merge into a trailing text child if there is one.
                let text_handle = match dom.get(*parent) {
                    DomNode::Text(_) => Some(*parent),
                    DomNode::Element(ElementNode { children, .. })
                    | DomNode::Document(DocumentNode { children }) => {
                        match children.last().copied() {
                            Some(last)
                                if matches!(
                                    dom.get(last),
                                    DomNode::Text(_)
                                ) =>
                            {
                                Some(last)
                            }
                            _ => None,
                        }
                    }
                    DomNode::Comment => None,
                };
                if let Some(text_handle) = text_handle {
                    if let DomNode::Text(text) = dom.get_mut(text_handle) {
                        text.content += tendril.as_ref();
                    }
                } else {
                    let new_handle = dom.add_node(DomNode::Text(TextNode {
                        content: tendril.as_ref().to_owned(),
                        parent: Some(*parent),
                    }));
                    match dom.get_mut(*parent) {
                        DomNode::Document(doc) => doc.children.push(new_handle),
                        DomNode::Element(el) => el.children.push(new_handle),
                        DomNode::Text(_) | DomNode::Comment => {
                            panic!("parent changed from container to leaf")
                        }
                    }
                }
            }
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        _prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        self.append(element, child);
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        // Doctypes carry nothing a conversion pass needs.
    }

    fn mark_script_already_started(&self, _node: &Self::Handle) {}

    fn pop(&self, _node: &Self::Handle) {}

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        *target
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x == y
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(
        &self,
        sibling: &Self::Handle,
        new_node: NodeOrText<Self::Handle>,
    ) {
        let parent = self.state.borrow().dom.parent(*sibling);
        if let Some(parent) = parent {
            self.append(&parent, new_node);
        }
    }

    fn add_attrs_if_missing(
        &self,
        target: &Self::Handle,
        attrs: Vec<Attribute>,
    ) {
        let dom = &mut self.state.borrow_mut().dom;
        if let DomNode::Element(el) = dom.get_mut(*target) {
            for attr in attrs {
                let name = attr.name.local.as_ref();
                if !el.attrs.iter().any(|(n, _)| n == name) {
                    el.attrs
                        .push((name.to_owned(), attr.value.as_ref().to_owned()));
                }
            }
        }
    }

    fn associate_with_form(
        &self,
        _target: &Self::Handle,
        _form: &Self::Handle,
        _nodes: (&Self::Handle, Option<&Self::Handle>),
    ) {
    }

    // The adoption agency algorithm detaches and reattaches nodes while
    // recovering misnested formatting tags; leaving these unimplemented
    // would let a node stay linked under two parents.
    fn remove_from_parent(&self, target: &Self::Handle) {
        let dom = &mut self.state.borrow_mut().dom;
        let Some(parent) = dom.parent(*target) else {
            return;
        };
        match dom.get_mut(parent) {
            DomNode::Element(el) => el.children.retain(|h| h != target),
            DomNode::Document(doc) => doc.children.retain(|h| h != target),
            DomNode::Text(_) | DomNode::Comment => {}
        }
        match dom.get_mut(*target) {
            DomNode::Element(el) => el.parent = None,
            DomNode::Text(text) => text.parent = None,
            DomNode::Document(_) | DomNode::Comment => {}
        }
    }

    fn reparent_children(
        &self,
        node: &Self::Handle,
        new_parent: &Self::Handle,
    ) {
        let dom = &mut self.state.borrow_mut().dom;
        let moved = match dom.get_mut(*node) {
            DomNode::Element(el) => std::mem::take(&mut el.children),
            DomNode::Document(doc) => std::mem::take(&mut doc.children),
            DomNode::Text(_) | DomNode::Comment => Vec::new(),
        };
        for child in &moved {
            match dom.get_mut(*child) {
                DomNode::Element(el) => el.parent = Some(*new_parent),
                DomNode::Text(text) => text.parent = Some(*new_parent),
                DomNode::Document(_) | DomNode::Comment => {}
            }
        }
        match dom.get_mut(*new_parent) {
            DomNode::Element(el) => el.children.extend(moved),
            DomNode::Document(doc) => doc.children.extend(moved),
            DomNode::Text(_) | DomNode::Comment => {}
        }
    }

    fn is_mathml_annotation_xml_integration_point(
        &self,
        _handle: &Self::Handle,
    ) -> bool {
        false
    }

    fn set_current_line(&self, _line_number: u64) {}

    fn complete_script(&self, _node: &Self::Handle) -> NextParserState {
        NextParserState::Continue
    }

    fn allow_declarative_shadow_roots(
        &self,
        _intended_parent: &Self::Handle,
    ) -> bool {
        false
    }

    fn attach_declarative_shadow(
        &self,
        _location: &Self::Handle,
        _template: &Self::Handle,
        _attrs: Vec<Attribute>,
    ) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dom::DomNode;

    fn text_of(dom: &FlatDom, handle: NodeHandle) -> &str {
        match dom.get(handle) {
            DomNode::Text(t) => t.content(),
            _ => panic!("expected a text node"),
        }
    }

    #[test]
    fn parsing_a_text_snippet_creates_one_node() {
        let dom = parse("foo");
        let root = dom.root_element().unwrap();
        let children = dom.children(root);
        assert_eq!(children.len(), 1);
        assert_eq!(text_of(&dom, children[0]), "foo");
    }

    #[test]
    fn parsing_nested_structures_produces_them() {
        let dom = parse("A<i>B<b>C</b>D</i>E");
        let root = dom.root_element().unwrap();
        let children = dom.children(root).to_vec();
        assert_eq!(children.len(), 3);
        let i = dom.element(children[1]).unwrap();
        assert_eq!(i.tag(), "i");
        assert_eq!(i.children.len(), 3);
        let b = dom.element(i.children[1]).unwrap();
        assert_eq!(b.tag(), "b");
    }

    #[test]
    fn parsing_tags_with_attributes_preserves_them() {
        let dom = parse("<span class='foo'>txt</span>");
        let root = dom.root_element().unwrap();
        let span = dom.element(dom.children(root)[0]).unwrap();
        assert_eq!(span.get_attr("class"), Some("foo"));
    }

    #[test]
    fn parsing_escaped_entities_unescapes_them() {
        let dom = parse("aaa&lt;strong&gt;bbb");
        let root = dom.root_element().unwrap();
        assert_eq!(text_of(&dom, dom.children(root)[0]), "aaa<strong>bbb");
    }

    #[test]
    fn comments_parse_but_stay_inert() {
        let dom = parse("a<!-- hidden -->b");
        let root = dom.root_element().unwrap();
        // The comment may or may not be attached between the text runs;
        // either way no text is lost.
        let all_text: String = dom
            .children(root)
            .iter()
            .filter_map(|h| match dom.get(*h) {
                DomNode::Text(t) => Some(t.content().to_owned()),
                _ => None,
            })
            .collect();
        assert_eq!(all_text, "ab");
    }

    #[test]
    fn malformed_markup_still_yields_a_dom() {
        let dom = parse("<p>unclosed <b>nested");
        assert!(dom.root_element().is_some());
    }

    fn gather_text(dom: &FlatDom, handle: NodeHandle, out: &mut String) {
        match dom.get(handle) {
            DomNode::Text(t) => out.push_str(t.content()),
            _ => {
                for child in dom.children(handle).to_vec() {
                    gather_text(dom, child, out);
                }
            }
        }
    }

    #[test]
    fn misnested_formatting_neither_drops_nor_duplicates_text() {
        let dom = parse("<b>a<p>b</b>c</p>");
        let mut text = String::new();
        gather_text(&dom, dom.document_handle(), &mut text);
        let mut chars: Vec<char> = text.chars().collect();
        chars.sort_unstable();
        assert_eq!(chars, vec!['a', 'b', 'c']);
    }
}
