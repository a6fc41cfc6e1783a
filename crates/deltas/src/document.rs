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

use crate::delta::Delta;

/// Who caused a change. History records user changes, rebases around api
/// changes when configured user-only, and marks its own replays silent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    User,
    Api,
    Silent,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub length: usize,
}

/// The editing surface clipboard and history operate against. The host
/// editor implements this over its real document; [`Document`] is an
/// in-memory implementation for headless use and tests.
pub trait DocumentApi {
    fn contents(&self) -> Delta;
    fn update_contents(&mut self, change: &Delta, source: Source);
    fn selection(&self) -> Selection;
    fn set_selection(&mut self, index: usize, length: usize, source: Source);
    fn scroll_top(&self) -> f64;
    fn set_scroll_top(&mut self, value: f64);
}

/// A document is a delta of inserts only, always ending in a line break.
#[derive(Clone, Debug)]
pub struct Document {
    contents: Delta,
    selection: Selection,
    scroll_top: f64,
}

impl Document {
    pub fn new() -> Self {
        Self::with_contents(Delta::new().insert("\n"))
    }

    pub fn with_contents(contents: Delta) -> Self {
        Self {
            contents,
            selection: Selection::default(),
            scroll_top: 0.0,
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentApi for Document {
    fn contents(&self) -> Delta {
        self.contents.clone()
    }

    fn update_contents(&mut self, change: &Delta, _source: Source) {
        self.contents = self.contents.compose(change);
    }

    fn selection(&self) -> Selection {
        self.selection
    }

    fn set_selection(
        &mut self,
        index: usize,
        length: usize,
        _source: Source,
    ) {
        self.selection = Selection { index, length };
    }

    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn set_scroll_top(&mut self, value: f64) {
        self.scroll_top = value;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn updates_compose_onto_the_contents() {
        let mut doc = Document::new();
        doc.update_contents(&Delta::new().insert("ab"), Source::User);
        doc.update_contents(
            &Delta::new().retain(1).insert("X"),
            Source::Api,
        );
        assert_eq!(doc.contents(), Delta::new().insert("aXb\n"));
    }
}
