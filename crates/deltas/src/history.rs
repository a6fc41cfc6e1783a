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

//! Undo/redo over delta changes.
//!
//! Every record pairs the change that happened with its inverse, computed
//! by diffing the document before and after. Undo applies the inverse and
//! moves the record to the redo stack; a new user change clears redo.
//! Foreign changes rebase both stacks instead of invalidating them.

use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::delta::{Content, Delta, Op};
use crate::document::{DocumentApi, Source};
use crate::error::ConfigError;
use crate::registry::Registry;

/// The editor event stream history listens to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    TextChange,
    SelectionChange,
}

#[derive(Clone, Debug)]
pub struct HistoryOptions {
    /// Changes recorded within this window coalesce into one undo step.
    /// Zero disables coalescing entirely.
    pub delay: Duration,
    /// Upper bound on undo depth; the oldest record falls off first.
    pub max_stack: usize,
    /// When set, only [`Source::User`] changes are recorded; everything
    /// else rebases the stacks instead.
    pub user_only: bool,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1000),
            max_stack: 100,
            user_only: false,
        }
    }
}

/// One undo step: the change as applied and its inverse.
#[derive(Clone, Debug, PartialEq)]
struct StackEntry {
    redo: Delta,
    undo: Delta,
}

pub struct History {
    options: HistoryOptions,
    registry: Rc<Registry>,
    undo_stack: VecDeque<StackEntry>,
    redo_stack: Vec<StackEntry>,
    last_recorded: Option<Instant>,
    ignore_change: bool,
}

impl History {
    pub fn new(registry: Rc<Registry>) -> Self {
        Self::with_options(registry, HistoryOptions::default())
            .unwrap_or_else(|_| unreachable!("default options are valid"))
    }

    pub fn with_options(
        registry: Rc<Registry>,
        options: HistoryOptions,
    ) -> Result<Self, ConfigError> {
        if options.max_stack == 0 {
            return Err(ConfigError::InvalidMaxStack);
        }
        Ok(Self {
            options,
            registry,
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            last_recorded: None,
            ignore_change: false,
        })
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Route one editor event. Text changes are recorded (or, configured
    /// user-only and caused by someone else, rebased around); everything
    /// else is ignored, as are history's own replays.
    pub fn on_editor_change(
        &mut self,
        kind: EventKind,
        change: &Delta,
        old_contents: &Delta,
        source: Source,
    ) {
        if kind != EventKind::TextChange || self.ignore_change {
            return;
        }
        if !self.options.user_only || source == Source::User {
            self.record(change, old_contents);
        } else {
            self.transform(change);
        }
    }

    /// Record an applied change. The inverse comes from diffing the
    /// resulting contents against the old ones, so it restores formats a
    /// plain inversion of the change would lose.
    pub fn record(&mut self, change: &Delta, old_contents: &Delta) {
        if change.ops().is_empty() {
            return;
        }
        self.redo_stack.clear();
        let contents = old_contents.compose(change);
        let mut undo = contents.diff(old_contents);
        let mut redo = change.clone();
        let now = Instant::now();
        let coalesce = self
            .last_recorded
            .map(|last| last + self.options.delay > now)
            .unwrap_or(false)
            && !self.undo_stack.is_empty();
        if coalesce {
            if let Some(previous) = self.undo_stack.pop_back() {
                undo = undo.compose(&previous.undo);
                redo = previous.redo.compose(&redo);
            }
        } else {
            self.last_recorded = Some(now);
        }
        if undo.ops().is_empty() && redo.ops().is_empty() {
            return;
        }
        self.undo_stack.push_back(StackEntry { redo, undo });
        if self.undo_stack.len() > self.options.max_stack {
            self.undo_stack.pop_front();
        }
        tracing::trace!(depth = self.undo_stack.len(), "recorded change");
    }

    pub fn undo(&mut self, doc: &mut dyn DocumentApi) {
        self.change(true, doc);
    }

    pub fn redo(&mut self, doc: &mut dyn DocumentApi) {
        self.change(false, doc);
    }

    fn change(&mut self, is_undo: bool, doc: &mut dyn DocumentApi) {
        let entry = if is_undo {
            self.undo_stack.pop_back()
        } else {
            self.redo_stack.pop()
        };
        let Some(entry) = entry else {
            return;
        };
        let applied = if is_undo {
            entry.undo.clone()
        } else {
            entry.redo.clone()
        };
        self.last_recorded = None;
        self.ignore_change = true;
        doc.update_contents(&applied, Source::User);
        self.ignore_change = false;
        let index = last_change_index(&applied, &self.registry);
        doc.set_selection(index, 0, Source::Silent);
        if is_undo {
            self.redo_stack.push(entry);
        } else {
            self.undo_stack.push_back(entry);
        }
    }

    /// Rebase both stacks over a change that happened outside them, so
    /// undo later replays against the document as it now stands.
    pub fn transform(&mut self, foreign: &Delta) {
        for entry in self
            .undo_stack
            .iter_mut()
            .chain(self.redo_stack.iter_mut())
        {
            entry.undo = foreign.transform(&entry.undo, true);
            entry.redo = foreign.transform(&entry.redo, true);
        }
    }

    /// End the current coalescing window: the next recorded change starts
    /// a fresh undo step no matter how soon it comes.
    pub fn cutoff(&mut self) {
        self.last_recorded = None;
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.last_recorded = None;
    }
}

/// Where the caret belongs after replaying `applied`: the end of what the
/// change touched, minus one when the change ends at a line boundary.
fn last_change_index(applied: &Delta, registry: &Registry) -> usize {
    let mut index = applied.len();
    if ends_with_newline_change(applied, registry) {
        index = index.saturating_sub(1);
    }
    index
}

fn ends_with_newline_change(applied: &Delta, registry: &Registry) -> bool {
    let Some(last) = applied.last() else {
        return false;
    };
    match last {
        Op::Insert {
            content: Content::Text(text),
            ..
        } => text.ends_with('\n'),
        Op::Insert { .. } | Op::Delete { .. } => false,
        Op::Retain { attributes, .. } => attributes
            .keys()
            .any(|key| registry.is_block_format(key)),
    }
}
