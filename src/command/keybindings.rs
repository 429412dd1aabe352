//! Maps `(modifier mask, lowercased keysym name)` pairs to the command they run. Populated
//! entirely at runtime by `Bind` commands issued from the config script; there is no built-in
//! keymap.

use std::collections::HashMap;

use cardboard_ipc::CommandData;

#[derive(Debug, Default)]
pub struct KeybindingTable {
    bindings: HashMap<(u32, String), CommandData>,
}

impl KeybindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `inner` under `(mods, key)`, overwriting whatever was previously bound there.
    pub fn bind(&mut self, mods: u32, key: &str, inner: CommandData) {
        self.bindings.insert((mods, key.to_lowercase()), inner);
    }

    /// Looks up the command bound to a key press, if any. `key` is matched case-insensitively.
    pub fn lookup(&self, mods: u32, key: &str) -> Option<&CommandData> {
        self.bindings.get(&(mods, key.to_lowercase()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_then_lookup_round_trips() {
        let mut table = KeybindingTable::new();
        table.bind(1 << 6, "Return", CommandData::Quit { code: 0 });
        assert_eq!(table.lookup(1 << 6, "return"), Some(&CommandData::Quit { code: 0 }));
    }

    #[test]
    fn rebinding_the_same_key_overwrites_the_previous_command() {
        let mut table = KeybindingTable::new();
        table.bind(1 << 6, "q", CommandData::Quit { code: 0 });
        table.bind(1 << 6, "q", CommandData::Close);
        assert_eq!(table.lookup(1 << 6, "q"), Some(&CommandData::Close));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn unbound_key_misses() {
        let table = KeybindingTable::new();
        assert_eq!(table.lookup(0, "a"), None);
    }
}
