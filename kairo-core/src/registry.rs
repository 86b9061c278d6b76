use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::commands::{CommandDefinition, CommandHandler, StaticCommand, BUILTIN_COMMANDS};
use crate::modules::ModuleId;

/// Maps command names to handlers.
///
/// Built once at startup. Visibility resolution deals only in names;
/// this table is where a name becomes something installable.
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
    order: Vec<&'static str>,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registry holding a `StaticCommand` for every built-in definition.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for def in BUILTIN_COMMANDS {
            registry.register(Arc::new(StaticCommand::new(*def)));
        }
        registry
    }

    /// Register a handler under its definition's name.
    ///
    /// A later registration for the same name replaces the earlier one
    /// but keeps its position.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        let name = handler.definition().name;
        if self.handlers.insert(name, handler).is_none() {
            self.order.push(name);
        }
    }

    /// Look up a handler by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn CommandHandler>> {
        self.handlers.get(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Definitions for a resolved tenant command set.
    ///
    /// Unknown names are skipped. Privileged definitions are refused
    /// even if asked for by name.
    pub fn tenant_definitions<'a, I>(&self, names: I) -> Vec<CommandDefinition>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut defs = Vec::new();
        for name in names {
            match self.handlers.get(name) {
                Some(handler) if handler.definition().is_privileged() => {
                    warn!(command = name, "refusing to place privileged command in a tenant tree");
                }
                Some(handler) => defs.push(*handler.definition()),
                None => warn!(command = name, "no handler registered for visible command"),
            }
        }
        defs
    }

    /// Privileged definitions in registration order.
    pub fn privileged_definitions(&self) -> Vec<CommandDefinition> {
        self.definitions().filter(|d| d.is_privileged()).collect()
    }

    /// All definitions in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = CommandDefinition> + '_ {
        self.order
            .iter()
            .filter_map(|name| self.handlers.get(name))
            .map(|h| *h.definition())
    }

    /// Commands grouped the way `commands_list` shows them:
    /// core registration commands, then each module, then admin.
    pub fn by_module(&self) -> Vec<(String, Vec<&'static str>)> {
        let mut groups: Vec<(String, Vec<&'static str>)> = Vec::new();

        let core: Vec<_> = self
            .definitions()
            .filter(|d| !d.is_privileged() && d.module.is_none())
            .map(|d| d.name)
            .collect();
        if !core.is_empty() {
            groups.push(("registration".to_string(), core));
        }

        for module in ModuleId::ALL {
            let names: Vec<_> = self
                .definitions()
                .filter(|d| d.module == Some(module))
                .map(|d| d.name)
                .collect();
            if !names.is_empty() {
                groups.push((module.as_str().to_string(), names));
            }
        }

        let admin: Vec<_> = self.privileged_definitions().iter().map(|d| d.name).collect();
        if !admin.is_empty() {
            groups.push(("admin".to_string(), admin));
        }
        groups
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandScope;

    #[test]
    fn builtin_registry_covers_every_module_command() {
        let registry = CommandRegistry::builtin();
        assert_eq!(registry.len(), BUILTIN_COMMANDS.len());
        for module in ModuleId::ALL {
            for name in module.commands() {
                assert!(registry.get(name).is_some(), "{name} missing");
            }
        }
        assert!(registry.get("register").is_some());
        assert!(registry.get("response").is_some());
    }

    #[test]
    fn tenant_definitions_refuse_privileged_and_skip_unknown() {
        let registry = CommandRegistry::builtin();
        let defs = registry.tenant_definitions(["qa_add", "register_accept", "no_such_command"]);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "qa_add");
    }

    #[test]
    fn privileged_definitions_are_only_privileged() {
        let registry = CommandRegistry::builtin();
        let defs = registry.privileged_definitions();
        assert_eq!(defs.len(), crate::commands::super_admin_commands().len());
        assert!(defs.iter().all(|d| d.scope == CommandScope::Privileged));
    }

    #[test]
    fn re_registering_replaces_in_place() {
        struct Custom(CommandDefinition);
        impl CommandHandler for Custom {
            fn definition(&self) -> &CommandDefinition {
                &self.0
            }
        }

        let mut registry = CommandRegistry::builtin();
        let first_before: Vec<_> = registry.definitions().map(|d| d.name).collect();
        registry.register(Arc::new(Custom(CommandDefinition::tenant(
            "register",
            "Register (custom)",
            None,
        ))));
        let first_after: Vec<_> = registry.definitions().map(|d| d.name).collect();
        assert_eq!(first_before, first_after);
        assert_eq!(registry.get("register").unwrap().definition().description, "Register (custom)");
    }

    #[test]
    fn grouping_follows_module_table() {
        let groups = CommandRegistry::builtin().by_module();
        let labels: Vec<_> = groups.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["registration", "attendance", "plans", "qa", "ctfd", "crypto", "bookkeeping", "routing", "admin"]
        );
    }
}
