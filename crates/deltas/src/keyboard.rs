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

/// A key chord the host should route to a history command. `short_key`
/// is Ctrl or Cmd depending on platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub key: char,
    pub short_key: bool,
    pub shift_key: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryCommand {
    Undo,
    Redo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Mac,
    Linux,
}

/// Implemented by the host's keyboard layer.
pub trait KeyBindingRegistrar {
    fn add_binding(&mut self, binding: KeyBinding, command: HistoryCommand);
}

/// The standard undo/redo chords. Windows additionally redoes on Ctrl+Y.
pub fn register_history_bindings(
    platform: Platform,
    registrar: &mut dyn KeyBindingRegistrar,
) {
    registrar.add_binding(
        KeyBinding {
            key: 'z',
            short_key: true,
            shift_key: false,
        },
        HistoryCommand::Undo,
    );
    registrar.add_binding(
        KeyBinding {
            key: 'z',
            short_key: true,
            shift_key: true,
        },
        HistoryCommand::Redo,
    );
    if platform == Platform::Windows {
        registrar.add_binding(
            KeyBinding {
                key: 'y',
                short_key: true,
                shift_key: false,
            },
            HistoryCommand::Redo,
        );
    }
}
