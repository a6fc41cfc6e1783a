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

//! Rich-text change representation for headless editors.
//!
//! Documents and edits are both [`Delta`]s: flat sequences of insert,
//! retain and delete operations that compose, transform against each
//! other and diff. On top of that algebra sit the two halves hosts
//! integrate: [`Clipboard`] converts pasted HTML into insert-only deltas
//! through a configurable matcher pipeline, and [`History`] keeps an
//! undo/redo stack of inverse deltas that survives collaborative edits
//! by rebasing instead of clearing.

pub mod clipboard;
pub mod delta;
pub mod document;
pub mod dom;
pub mod error;
pub mod history;
pub mod keyboard;
pub mod registry;

pub use clipboard::{
    Clipboard, ClipboardOptions, ConvertContext, LayoutMetrics, MatcherFn,
    PendingPaste, Selector,
};
pub use delta::{AttrValue, Attributes, Content, Delta, Op};
pub use document::{Document, DocumentApi, Selection, Source};
pub use error::ConfigError;
pub use history::{EventKind, History, HistoryOptions};
pub use registry::{
    AttrSource, Attributor, Blot, BlotKind, Registry, Scope,
};
