//! Derived command-name index.
//!
//! The index is a pure function of (modules, their command lists, their
//! enabled flags). It is always rebuilt as a whole and swapped in
//! atomically; it is never patched in place, so readers can never observe
//! a stale alias after a module is disabled.

use crate::command::Command;
use crate::module::Module;
use std::sync::Arc;

struct IndexEntry {
    /// Lowercased name or alias.
    name: String,
    cmd: Arc<Command>,
}

/// Name+alias lookup over the enabled modules.
pub struct CommandIndex {
    entries: Vec<IndexEntry>,
}

impl CommandIndex {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build the index from the module registry, in registration order,
    /// skipping disabled modules. A name registered twice resolves to the
    /// last-registered command; its position in the tie-break order stays
    /// that of the first registration.
    pub fn build(modules: &[Arc<Module>]) -> Self {
        let mut entries: Vec<IndexEntry> = Vec::new();
        for module in modules.iter().filter(|m| m.is_enabled()) {
            for cmd in module.commands() {
                let names =
                    std::iter::once(cmd.name()).chain(cmd.aliases().iter().map(String::as_str));
                for name in names {
                    let name = name.to_ascii_lowercase();
                    match entries.iter_mut().find(|e| e.name == name) {
                        Some(entry) => entry.cmd = cmd.clone(),
                        None => entries.push(IndexEntry {
                            name,
                            cmd: cmd.clone(),
                        }),
                    }
                }
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup by name or alias.
    pub fn get(&self, name: &str) -> Option<Arc<Command>> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.cmd.clone())
    }

    /// Find the command whose name or alias is the longest
    /// case-insensitive literal prefix of `text`. Names may contain
    /// spaces or punctuation, so this is a prefix match over the raw
    /// text, not a token split. An equal-length tie resolves to the
    /// earliest-registered name.
    pub fn resolve_prefix_of(&self, text: &str) -> Option<(String, Arc<Command>)> {
        let mut best: Option<&IndexEntry> = None;
        for entry in &self.entries {
            let len = entry.name.len();
            if text.len() < len || !text.is_char_boundary(len) {
                continue;
            }
            if !text[..len].eq_ignore_ascii_case(&entry.name) {
                continue;
            }
            if best.is_none_or(|b| len > b.name.len()) {
                best = Some(entry);
            }
        }
        best.map(|e| (e.name.clone(), e.cmd.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{handler, Command};

    fn module_with(name: &str, cmds: &[&str]) -> Arc<Module> {
        let module = Module::new(name);
        for cmd in cmds {
            module.register(Command::build(*cmd, handler(|_ctx| async { Ok(()) })));
        }
        module
    }

    #[test]
    fn test_skips_disabled_modules() {
        let first = module_with("first", &["ping"]);
        let second = module_with("second", &["pong"]);
        second.set_enabled(false);
        let index = CommandIndex::build(&[first, second]);
        assert!(index.get("ping").is_some());
        assert!(index.get("pong").is_none());
    }

    #[test]
    fn test_duplicate_name_resolves_to_last_registered() {
        let first = Module::new("first");
        first.register(Command::build("status", handler(|_ctx| async { Ok(()) })).alias("s"));
        let second = Module::new("second");
        let winner =
            second.register(Command::build("status", handler(|_ctx| async { Ok(()) })));
        let index = CommandIndex::build(&[first, second]);
        assert_eq!(index.len(), 2); // "status" and "s"
        let resolved = index.get("status").unwrap();
        assert_eq!(
            resolved.module().unwrap().name(),
            winner.module().unwrap().name()
        );
    }

    #[test]
    fn test_longest_prefix_wins() {
        let module = module_with("help", &["help", "helpme"]);
        let index = CommandIndex::build(&[module]);
        let (name, _) = index.resolve_prefix_of("helpme extra").unwrap();
        assert_eq!(name, "helpme");
        let (name, _) = index.resolve_prefix_of("help extra").unwrap();
        assert_eq!(name, "help");
    }

    #[test]
    fn test_prefix_match_is_case_insensitive_and_allows_spaces() {
        let module = module_with("config", &["config set"]);
        let index = CommandIndex::build(&[module]);
        let (name, _) = index.resolve_prefix_of("Config SET volume 5").unwrap();
        assert_eq!(name, "config set");
        assert!(index.resolve_prefix_of("confi").is_none());
    }

    #[test]
    fn test_resolution_is_stable_across_rebuilds() {
        let first = module_with("first", &["run"]);
        let second = module_with("second", &["run fast"]);
        for _ in 0..3 {
            let index = CommandIndex::build(&[first.clone(), second.clone()]);
            let (name, _) = index.resolve_prefix_of("run fast now").unwrap();
            assert_eq!(name, "run fast");
        }
    }
}
