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

//! End-to-end paste flow: conversion, application, history and the
//! captured selection surviving an asynchronous clipboard read.

use std::rc::Rc;

use deltas::{
    AttrValue, Attributes, Clipboard, Delta, Document, DocumentApi, History,
    Registry, Source,
};

fn bold() -> Attributes {
    Attributes::from([("bold".to_owned(), AttrValue::Bool(true))])
}

#[test]
fn pasting_replaces_the_selection_and_records_one_undo_step() {
    let registry = Rc::new(Registry::with_defaults());
    let clipboard = Clipboard::new(Rc::clone(&registry));
    let mut history = History::new(registry);
    let mut doc = Document::with_contents(Delta::new().insert("abc\n"));
    doc.set_selection(1, 1, Source::User);
    doc.set_scroll_top(40.0);

    let pending = clipboard.begin_paste(&doc, false).unwrap();
    // The host scrolls while the clipboard read is in flight.
    doc.set_scroll_top(0.0);
    let change = pending.resume(
        &clipboard,
        "<p>X <b>Y</b></p>",
        &mut doc,
        Some(&mut history),
    );

    let expected = Delta::new()
        .insert("aX ")
        .insert_attr("Y", bold())
        .insert("c\n");
    assert_eq!(doc.contents(), expected);
    assert_eq!(doc.selection().index, change.len());
    assert_eq!(doc.scroll_top(), 40.0);

    history.undo(&mut doc);
    assert_eq!(doc.contents(), Delta::new().insert("abc\n"));
    history.redo(&mut doc);
    assert_eq!(doc.contents(), expected);
}

#[test]
fn a_handled_paste_event_captures_nothing() {
    let registry = Rc::new(Registry::with_defaults());
    let clipboard = Clipboard::new(registry);
    let doc = Document::new();
    assert!(clipboard.begin_paste(&doc, true).is_none());
}

#[test]
fn paste_at_splices_converted_markup_at_an_index() {
    let registry = Rc::new(Registry::with_defaults());
    let clipboard = Clipboard::new(registry);
    let mut doc = Document::with_contents(Delta::new().insert("x\n"));

    clipboard.paste_at(0, "<h1>T</h1>", &mut doc, Source::Api);
    assert_eq!(
        doc.contents(),
        Delta::new()
            .insert("T")
            .insert_attr(
                "\n",
                Attributes::from([("header".to_owned(), AttrValue::Int(1))])
            )
            .insert("x\n")
    );
}
