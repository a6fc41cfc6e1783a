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

//! HTML-to-delta conversion.
//!
//! [`Clipboard::convert`] parses markup into a throwaway DOM, walks it in
//! post-order and folds the registered matchers over every node, yielding
//! an insert-only [`Delta`]. [`PendingPaste`] carries the selection state
//! captured at paste time across the host's asynchronous clipboard read.

pub mod matchers;

use std::collections::HashMap;
use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::delta::{Attributes, Delta};
use crate::document::{DocumentApi, Source};
use crate::dom::{self, Display, DomNode, FlatDom, NodeHandle, StyleCache};
use crate::history::{EventKind, History};
use crate::registry::Registry;

/// Markup pretty-printers put line breaks and indentation between tags;
/// none of it is content.
static INTER_TAG_WS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r">\r?\n +<").expect("inter-tag regex"));

/// Rendered geometry of pasted markup, supplied by the host when it has a
/// live layout to ask. Conversion itself never measures anything; without
/// an implementation the visual-spacing heuristic simply stays off.
pub trait LayoutMetrics {
    fn offset_top(&self, node: NodeHandle) -> Option<f64>;
    fn offset_height(&self, node: NodeHandle) -> Option<f64>;
}

/// What a matcher is keyed on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// Every text node.
    Text,
    /// Every element node.
    Element,
    /// Elements with this tag name (matched case-insensitively).
    Tag(String),
}

/// A matcher folds one node into the delta accumulated so far.
pub type MatcherFn =
    Rc<dyn Fn(&ConvertContext, NodeHandle, Delta) -> Delta>;

/// Everything a matcher may consult, scoped to one conversion pass.
pub struct ConvertContext<'a> {
    pub(crate) dom: &'a FlatDom,
    pub(crate) root: NodeHandle,
    pub(crate) registry: &'a Registry,
    pub(crate) styles: StyleCache,
    pub(crate) layout: Option<&'a dyn LayoutMetrics>,
}

impl<'a> ConvertContext<'a> {
    pub fn dom(&self) -> &FlatDom {
        self.dom
    }

    /// The staging-container boundary of this pass.
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn styles(&self) -> &StyleCache {
        &self.styles
    }

    pub fn layout(&self) -> Option<&dyn LayoutMetrics> {
        self.layout
    }
}

pub struct ClipboardOptions {
    /// Extra matchers, appended after the built-in table so they run
    /// last and can override its output.
    pub matchers: Vec<(Selector, MatcherFn)>,
    /// Whether to infer blank lines from rendered spacing. Only has an
    /// effect when layout metrics are supplied.
    pub match_visual: bool,
}

impl Default for ClipboardOptions {
    fn default() -> Self {
        Self {
            matchers: Vec::new(),
            match_visual: true,
        }
    }
}

pub struct Clipboard {
    registry: Rc<Registry>,
    matchers: Vec<(Selector, MatcherFn)>,
    layout: Option<Rc<dyn LayoutMetrics>>,
}

impl Clipboard {
    pub fn new(registry: Rc<Registry>) -> Self {
        Self::with_options(registry, ClipboardOptions::default())
    }

    pub fn with_options(
        registry: Rc<Registry>,
        options: ClipboardOptions,
    ) -> Self {
        // The built-in table. Order is the precedence contract: later
        // matchers see (and may rewrite) what earlier ones produced.
        let mut matchers: Vec<(Selector, MatcherFn)> = vec![
            (Selector::Text, Rc::new(matchers::match_text) as MatcherFn),
            (Selector::Text, Rc::new(matchers::match_newline)),
            (Selector::Tag("br".to_owned()), Rc::new(matchers::match_break)),
            (Selector::Element, Rc::new(matchers::match_newline)),
            (Selector::Element, Rc::new(matchers::match_blot)),
        ];
        if options.match_visual {
            matchers
                .push((Selector::Element, Rc::new(matchers::match_spacing)));
        }
        matchers.extend([
            (
                Selector::Element,
                Rc::new(matchers::match_attributor) as MatcherFn,
            ),
            (Selector::Element, Rc::new(matchers::match_styles)),
            (Selector::Tag("li".to_owned()), Rc::new(matchers::match_indent)),
            (Selector::Tag("b".to_owned()), matchers::alias("bold")),
            (Selector::Tag("i".to_owned()), matchers::alias("italic")),
            (Selector::Tag("style".to_owned()), Rc::new(matchers::match_ignore)),
        ]);
        matchers.extend(options.matchers);
        Self {
            registry,
            matchers,
            layout: None,
        }
    }

    /// Supply rendered geometry for the visual-spacing heuristic.
    pub fn set_layout_metrics(&mut self, layout: Rc<dyn LayoutMetrics>) {
        self.layout = Some(layout);
    }

    pub fn add_matcher(&mut self, selector: Selector, matcher: MatcherFn) {
        self.matchers.push((selector, matcher));
    }

    /// Convert markup to an insert-only delta.
    pub fn convert(&self, html: &str) -> Delta {
        self.convert_in_context(html, &Attributes::new())
    }

    /// Convert markup pasted into a context already carrying formats. A
    /// code-block context bypasses matching entirely: only the plain text
    /// survives, formatted as more code.
    pub fn convert_in_context(
        &self,
        html: &str,
        active_formats: &Attributes,
    ) -> Delta {
        let cleaned = INTER_TAG_WS.replace_all(html, "><");
        let parsed = dom::parse(&cleaned);
        let Some(root) = parsed.root_element() else {
            return Delta::new();
        };
        if let Some(value) = active_formats.get("code-block") {
            let styles = StyleCache::new();
            let mut text = String::new();
            collect_text(&parsed, &styles, root, &mut text);
            return Delta::new().insert_attr(
                text,
                Attributes::from([("code-block".to_owned(), value.clone())]),
            );
        }
        let ctx = ConvertContext {
            dom: &parsed,
            root,
            registry: &self.registry,
            styles: StyleCache::new(),
            layout: self.layout.as_deref(),
        };
        let (element_matchers, text_matchers, side_table) =
            self.prepare_matching(&parsed, root);
        let mut delta =
            traverse(&ctx, root, &element_matchers, &text_matchers, &side_table);
        // A trailing unformatted line break is presentation, not content.
        if delta.ends_with_text("\n")
            && delta
                .last()
                .and_then(|op| op.attributes())
                .map(|attrs| attrs.is_empty())
                .unwrap_or(false)
        {
            let len = delta.len();
            delta = delta.compose(&Delta::new().retain(len - 1).delete(1));
        }
        tracing::debug!(html = cleaned.as_ref(), ?delta, "converted markup");
        delta
    }

    /// Split the matcher table for one pass: text matchers, element
    /// matchers, and a side-table attaching tag-scoped matchers to the
    /// nodes they select, in document order.
    fn prepare_matching(
        &self,
        dom: &FlatDom,
        root: NodeHandle,
    ) -> (Vec<MatcherFn>, Vec<MatcherFn>, HashMap<NodeHandle, Vec<MatcherFn>>)
    {
        let mut element_matchers = Vec::new();
        let mut text_matchers = Vec::new();
        let mut side_table: HashMap<NodeHandle, Vec<MatcherFn>> =
            HashMap::new();
        for (selector, matcher) in &self.matchers {
            match selector {
                Selector::Text => text_matchers.push(Rc::clone(matcher)),
                Selector::Element => {
                    element_matchers.push(Rc::clone(matcher))
                }
                Selector::Tag(tag) => {
                    for handle in dom.descendant_elements(root) {
                        let matches = dom
                            .element(handle)
                            .map(|el| el.tag().eq_ignore_ascii_case(tag))
                            .unwrap_or(false);
                        if matches {
                            side_table
                                .entry(handle)
                                .or_default()
                                .push(Rc::clone(matcher));
                        }
                    }
                }
            }
        }
        (element_matchers, text_matchers, side_table)
    }

    /// Convert and splice at an index, applying the change to the
    /// document. Returns the applied change.
    pub fn paste_at(
        &self,
        index: usize,
        html: &str,
        doc: &mut dyn DocumentApi,
        source: Source,
    ) -> Delta {
        let change = Delta::new().retain(index).concat(self.convert(html));
        doc.update_contents(&change, source);
        change
    }

    /// Capture the state a paste needs before the host reads the
    /// clipboard. Returns `None` when the event was already handled.
    pub fn begin_paste(
        &self,
        doc: &dyn DocumentApi,
        default_prevented: bool,
    ) -> Option<PendingPaste> {
        if default_prevented {
            return None;
        }
        let selection = doc.selection();
        Some(PendingPaste {
            index: selection.index,
            length: selection.length,
            scroll_top: doc.scroll_top(),
        })
    }
}

/// Selection and scroll state captured when a paste began. The clipboard
/// read happens asynchronously in the host; resuming applies the pasted
/// markup against the captured selection, not whatever it is by then.
#[derive(Clone, Copy, Debug)]
pub struct PendingPaste {
    index: usize,
    length: usize,
    scroll_top: f64,
}

impl PendingPaste {
    pub fn resume(
        self,
        clipboard: &Clipboard,
        html: &str,
        doc: &mut dyn DocumentApi,
        history: Option<&mut History>,
    ) -> Delta {
        let old_contents = doc.contents();
        let change = Delta::new()
            .retain(self.index)
            .concat(clipboard.convert_in_context(html, &Attributes::new()))
            .delete(self.length);
        doc.update_contents(&change, Source::User);
        if let Some(history) = history {
            history.on_editor_change(
                EventKind::TextChange,
                &change,
                &old_contents,
                Source::User,
            );
        }
        doc.set_selection(change.len(), 0, Source::Silent);
        doc.set_scroll_top(self.scroll_top);
        change
    }
}

fn traverse(
    ctx: &ConvertContext,
    node: NodeHandle,
    element_matchers: &[MatcherFn],
    text_matchers: &[MatcherFn],
    side_table: &HashMap<NodeHandle, Vec<MatcherFn>>,
) -> Delta {
    match ctx.dom.get(node) {
        DomNode::Text(_) => text_matchers
            .iter()
            .fold(Delta::new(), |delta, matcher| matcher(ctx, node, delta)),
        DomNode::Element(_) | DomNode::Document(_) => {
            let children = ctx.dom.children(node).to_vec();
            children.into_iter().fold(Delta::new(), |delta, child| {
                let mut child_delta = traverse(
                    ctx,
                    child,
                    element_matchers,
                    text_matchers,
                    side_table,
                );
                if matches!(ctx.dom.get(child), DomNode::Element(_)) {
                    child_delta =
                        element_matchers.iter().fold(child_delta, |d, m| {
                            m(ctx, child, d)
                        });
                    if let Some(scoped) = side_table.get(&child) {
                        child_delta = scoped
                            .iter()
                            .fold(child_delta, |d, m| m(ctx, child, d));
                    }
                }
                delta.concat(child_delta)
            })
        }
        DomNode::Comment => Delta::new(),
    }
}

/// Text content with line breaks after block-level elements, for the
/// code-block bypass.
fn collect_text(
    dom: &FlatDom,
    styles: &StyleCache,
    node: NodeHandle,
    out: &mut String,
) {
    for child in dom.children(node).to_vec() {
        match dom.get(child) {
            DomNode::Text(text) => out.push_str(text.content()),
            DomNode::Element(el) => {
                if el.tag() == "br" {
                    out.push('\n');
                    continue;
                }
                collect_text(dom, styles, child, out);
                let display = styles.computed(dom, child).display;
                if matches!(display, Display::Block | Display::ListItem)
                    && !out.ends_with('\n')
                {
                    out.push('\n');
                }
            }
            DomNode::Document(_) | DomNode::Comment => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::delta::{AttrValue, Op};

    fn clipboard() -> Clipboard {
        Clipboard::new(Rc::new(Registry::with_defaults()))
    }

    fn attrs(pairs: &[(&str, AttrValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn converting_a_simple_paragraph_trims_the_trailing_break() {
        let delta = clipboard().convert("<p>Hello <b>world</b></p>");
        assert_eq!(
            delta.ops(),
            &[
                Op::insert("Hello "),
                Op::insert_attr(
                    "world",
                    attrs(&[("bold", AttrValue::Bool(true))])
                ),
            ]
        );
    }

    #[test]
    fn converting_two_paragraphs_keeps_the_inner_break() {
        let delta = clipboard().convert("<p>one</p><p>two</p>");
        assert_eq!(delta.ops(), &[Op::insert("one\ntwo")]);
    }

    #[test]
    fn conversion_is_pure_and_repeatable() {
        let clipboard = clipboard();
        let html = "<h1>title</h1><p>body</p>";
        assert_eq!(clipboard.convert(html), clipboard.convert(html));
    }

    #[test]
    fn whitespace_collapses_outside_pre_contexts() {
        let delta = clipboard().convert("a   b\n  c");
        assert_eq!(delta.ops(), &[Op::insert("a b c")]);
    }

    #[test]
    fn non_breaking_spaces_survive_the_collapse() {
        let delta = clipboard().convert("a \u{a0} b");
        assert_eq!(delta.ops(), &[Op::insert("a\u{a0}b")]);
    }

    #[test]
    fn pre_blocks_keep_their_whitespace() {
        let delta = clipboard().convert("<pre>a   b\nc</pre>");
        assert_eq!(
            delta.ops(),
            &[
                Op::insert("a   b"),
                Op::insert_attr(
                    "\n",
                    attrs(&[("code-block", AttrValue::Bool(true))])
                ),
                Op::insert("c"),
                Op::insert_attr(
                    "\n",
                    attrs(&[("code-block", AttrValue::Bool(true))])
                ),
            ]
        );
    }

    #[test]
    fn headers_format_their_line_break_only() {
        let delta = clipboard().convert("<h2>title</h2><p>body</p>");
        assert_eq!(
            delta.ops(),
            &[
                Op::insert("title"),
                Op::insert_attr("\n", attrs(&[("header", AttrValue::Int(2))])),
                Op::insert("body"),
            ]
        );
    }

    #[test]
    fn nested_lists_carry_indent_on_the_line_break() {
        let delta =
            clipboard().convert("<ul><li><ul><li>one</li></ul></li></ul>");
        assert_eq!(
            delta.ops(),
            &[
                Op::insert("one"),
                Op::insert_attr(
                    "\n",
                    attrs(&[
                        ("indent", AttrValue::Int(1)),
                        ("list", AttrValue::Str("bullet".to_owned())),
                    ])
                ),
            ]
        );
    }

    #[test]
    fn a_bare_list_item_has_no_indent() {
        let delta = clipboard().convert("<ul><li>one</li><li>two</li></ul>");
        assert_eq!(
            delta.ops(),
            &[
                Op::insert("one"),
                Op::insert_attr(
                    "\n",
                    attrs(&[("list", AttrValue::Str("bullet".to_owned()))])
                ),
                Op::insert("two"),
                Op::insert_attr(
                    "\n",
                    attrs(&[("list", AttrValue::Str("bullet".to_owned()))])
                ),
            ]
        );
    }

    #[test]
    fn word_empty_paragraph_markers_are_trimmed() {
        assert!(clipboard().convert("<o:p>\u{a0}</o:p>").is_empty());
        let delta = clipboard().convert("<o:p> word </o:p>");
        assert_eq!(delta.ops(), &[Op::insert("word")]);
    }

    #[test]
    fn positive_text_indent_prepends_a_tab() {
        let delta =
            clipboard().convert(r#"<p style="text-indent: 0.5in">a</p>"#);
        assert_eq!(delta.ops(), &[Op::insert("\ta")]);
    }

    #[test]
    fn line_breaks_inside_paragraphs_come_from_br() {
        let delta = clipboard().convert("<p>a<br>b</p>");
        assert_eq!(delta.ops(), &[Op::insert("a\nb")]);
    }

    #[test]
    fn images_convert_to_embeds() {
        let delta =
            clipboard().convert(r#"<p><img src="/pic.png">after</p>"#);
        assert_eq!(
            delta.ops(),
            &[
                Op::embed("image", "/pic.png", Attributes::new()),
                Op::insert("after"),
            ]
        );
    }

    #[test]
    fn links_apply_their_href_inline() {
        let delta =
            clipboard().convert(r#"<p><a href="https://x.test/">go</a></p>"#);
        assert_eq!(
            delta.ops(),
            &[Op::insert_attr(
                "go",
                attrs(&[("link", AttrValue::Str("https://x.test/".to_owned()))])
            )]
        );
    }

    #[test]
    fn class_attributors_apply_their_whitelisted_value() {
        let delta = clipboard()
            .convert(r#"<p class="ql-align-center">centered</p>"#);
        assert_eq!(
            delta.ops(),
            &[
                Op::insert("centered"),
                Op::insert_attr(
                    "\n",
                    attrs(&[("align", AttrValue::Str("center".to_owned()))])
                ),
            ]
        );
    }

    #[test]
    fn inline_bold_and_italic_styles_apply() {
        let delta = clipboard().convert(
            r#"<span style="font-weight: bold">a</span><span style="font-style: italic">b</span>"#,
        );
        assert_eq!(
            delta.ops(),
            &[
                Op::insert_attr("a", attrs(&[("bold", AttrValue::Bool(true))])),
                Op::insert_attr(
                    "b",
                    attrs(&[("italic", AttrValue::Bool(true))])
                ),
            ]
        );
    }

    #[test]
    fn style_tags_are_ignored_wholesale() {
        let delta =
            clipboard().convert("<style>p { color: red }</style><p>x</p>");
        assert_eq!(delta.ops(), &[Op::insert("x")]);
    }

    #[test]
    fn unknown_tags_fall_through_to_their_content() {
        let delta = clipboard().convert("<p><unknown>kept</unknown></p>");
        assert_eq!(delta.ops(), &[Op::insert("kept")]);
    }

    #[test]
    fn empty_and_textless_input_converts_to_an_empty_delta() {
        assert!(clipboard().convert("").is_empty());
        assert!(clipboard().convert("<p></p>").is_empty());
    }

    #[test]
    fn code_block_context_bypasses_matching() {
        let delta = clipboard().convert_in_context(
            "<p>one</p><p><b>two</b></p>",
            &attrs(&[("code-block", AttrValue::Bool(true))]),
        );
        assert_eq!(
            delta.ops(),
            &[Op::insert_attr(
                "one\ntwo\n",
                attrs(&[("code-block", AttrValue::Bool(true))])
            )]
        );
    }

    fn match_highlight(
        ctx: &ConvertContext,
        _node: NodeHandle,
        delta: Delta,
    ) -> Delta {
        matchers::apply_format(
            ctx.registry(),
            delta,
            "highlight",
            AttrValue::Bool(true),
        )
    }

    #[test]
    fn caller_matchers_run_after_the_builtin_table() {
        let mut clipboard = clipboard();
        clipboard.add_matcher(
            Selector::Tag("b".to_owned()),
            Rc::new(match_highlight),
        );
        let delta = clipboard.convert("<p><b>x</b></p>");
        assert_eq!(
            delta.ops(),
            &[Op::insert_attr(
                "x",
                attrs(&[
                    ("bold", AttrValue::Bool(true)),
                    ("highlight", AttrValue::Bool(true)),
                ])
            )]
        );
    }

    struct RowLayout;

    impl LayoutMetrics for RowLayout {
        // Each node sits 100px further down; blocks render 10px tall.
        fn offset_top(&self, node: NodeHandle) -> Option<f64> {
            Some(node.0 as f64 * 100.0)
        }

        fn offset_height(&self, _node: NodeHandle) -> Option<f64> {
            Some(10.0)
        }
    }

    #[test]
    fn visual_spacing_inserts_a_blank_line_between_distant_blocks() {
        let registry = Rc::new(Registry::with_defaults());
        let mut clipboard = Clipboard::new(Rc::clone(&registry));
        clipboard.set_layout_metrics(Rc::new(RowLayout));
        let delta = clipboard.convert("<div>a</div><div>b</div>");
        assert_eq!(delta.ops(), &[Op::insert("a\n\nb")]);

        let mut plain = Clipboard::with_options(
            registry,
            ClipboardOptions {
                match_visual: false,
                ..Default::default()
            },
        );
        plain.set_layout_metrics(Rc::new(RowLayout));
        let delta = plain.convert("<div>a</div><div>b</div>");
        assert_eq!(delta.ops(), &[Op::insert("a\nb")]);
    }

    #[test]
    fn inter_tag_pretty_printing_is_not_content() {
        let delta = clipboard().convert("<ol>\n  <li>one</li>\n  <li>two</li>\n</ol>");
        assert_eq!(
            delta.ops(),
            &[
                Op::insert("one"),
                Op::insert_attr(
                    "\n",
                    attrs(&[("list", AttrValue::Str("ordered".to_owned()))])
                ),
                Op::insert("two"),
                Op::insert_attr(
                    "\n",
                    attrs(&[("list", AttrValue::Str("ordered".to_owned()))])
                ),
            ]
        );
    }
}
