use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::modules::ModuleId;
use crate::tenant::TenantContext;

/// Which command tree a definition may be installed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandScope {
    /// Tenant guilds, subject to visibility resolution.
    Tenant,
    /// The control-plane guild only.
    Privileged,
}

/// Static description of one slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub scope: CommandScope,
    #[serde(skip)]
    pub module: Option<ModuleId>,
}

impl CommandDefinition {
    pub const fn tenant(name: &'static str, description: &'static str, module: Option<ModuleId>) -> Self {
        Self {
            name,
            description,
            scope: CommandScope::Tenant,
            module,
        }
    }

    pub const fn privileged(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            scope: CommandScope::Privileged,
            module: None,
        }
    }

    pub fn is_privileged(&self) -> bool {
        self.scope == CommandScope::Privileged
    }
}

/// Every command the gateway knows about.
///
/// The privileged entries double as the super-admin capability set.
pub const BUILTIN_COMMANDS: &[CommandDefinition] = &[
    CommandDefinition::tenant("register", "Apply to register this server", None),
    CommandDefinition::tenant("response", "Submit the additional information requested by review", None),
    CommandDefinition::tenant("signin_start", "Open an attendance sign-in session", Some(ModuleId::Attendance)),
    CommandDefinition::tenant("signin_in", "Sign in to the active session", Some(ModuleId::Attendance)),
    CommandDefinition::tenant("signin_end", "Close the active sign-in session", Some(ModuleId::Attendance)),
    CommandDefinition::tenant("signin_report", "Report attendance for a session", Some(ModuleId::Attendance)),
    CommandDefinition::tenant("signin_summary", "Summarise attendance across sessions", Some(ModuleId::Attendance)),
    CommandDefinition::tenant("plan_set", "Set the weekly plan for a group", Some(ModuleId::Plans)),
    CommandDefinition::tenant("plan_show", "Show the weekly plan", Some(ModuleId::Plans)),
    CommandDefinition::tenant("plan_group_set", "Assign a member to a plan group", Some(ModuleId::Plans)),
    CommandDefinition::tenant("qa_add", "Add a question", Some(ModuleId::Qa)),
    CommandDefinition::tenant("qa_ask", "Answer a question", Some(ModuleId::Qa)),
    CommandDefinition::tenant("qa_scoreboard", "Show the question scoreboard", Some(ModuleId::Qa)),
    CommandDefinition::tenant("qa_reset", "Reset question scores", Some(ModuleId::Qa)),
    CommandDefinition::tenant("ctfd_link", "Link your account to the CTF platform", Some(ModuleId::Ctfd)),
    CommandDefinition::tenant("ctfd_scoreboard", "Show the CTF platform scoreboard", Some(ModuleId::Ctfd)),
    CommandDefinition::tenant("crypto_encrypt", "Encode or encrypt text", Some(ModuleId::Crypto)),
    CommandDefinition::tenant("crypto_decrypt", "Decode or decrypt text", Some(ModuleId::Crypto)),
    CommandDefinition::tenant("book_add", "Record a bookkeeping entry", Some(ModuleId::Bookkeeping)),
    CommandDefinition::tenant("book_balance", "Show the current balance", Some(ModuleId::Bookkeeping)),
    CommandDefinition::tenant("book_export", "Export the ledger", Some(ModuleId::Bookkeeping)),
    CommandDefinition::tenant("book_set_sheets", "Configure the ledger spreadsheet", Some(ModuleId::Bookkeeping)),
    CommandDefinition::tenant("org_channel_set", "Route a notification key to a channel", Some(ModuleId::Routing)),
    CommandDefinition::tenant("org_channel_get", "Show the channel routed for a key", Some(ModuleId::Routing)),
    CommandDefinition::privileged("register_accept", "Approve a server registration"),
    CommandDefinition::privileged("register_reject_response", "Ask a server for more registration details"),
    CommandDefinition::privileged("register_decline", "Decline a server registration"),
    CommandDefinition::privileged("register_list", "List registration applications"),
    CommandDefinition::privileged("modules_enable", "Enable a module for a server"),
    CommandDefinition::privileged("modules_disable", "Disable a module for a server"),
    CommandDefinition::privileged("modules_list", "List module status for a server"),
    CommandDefinition::privileged("org_config_set", "Set a server configuration value"),
    CommandDefinition::privileged("org_config_get", "Show a server configuration value"),
    CommandDefinition::privileged("commands_list", "List every loaded command"),
    CommandDefinition::privileged("commands_check", "Show the commands visible to a server"),
    CommandDefinition::privileged("commands_sync", "Force a command resync"),
];

/// Names of the super-admin capability set, in declaration order.
pub fn super_admin_commands() -> Vec<&'static str> {
    BUILTIN_COMMANDS
        .iter()
        .filter(|d| d.is_privileged())
        .map(|d| d.name)
        .collect()
}

/// A command bound to its behaviour.
///
/// The gateway core only needs `definition`; the chat transport layer
/// overrides `invoke`. Like a service with no methods implemented, the
/// default invocation reports that nothing is wired up yet.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn definition(&self) -> &CommandDefinition;

    async fn invoke(&self, _ctx: &TenantContext, _options: Value) -> Result<Value> {
        Err(anyhow!("Command not implemented: {}", self.definition().name))
    }
}

/// Handler that carries a definition and nothing else.
#[derive(Debug, Clone)]
pub struct StaticCommand {
    definition: CommandDefinition,
}

impl StaticCommand {
    pub fn new(definition: CommandDefinition) -> Self {
        Self { definition }
    }
}

impl CommandHandler for StaticCommand {
    fn definition(&self) -> &CommandDefinition {
        &self.definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn builtin_names_are_unique() {
        let mut seen = HashSet::new();
        for def in BUILTIN_COMMANDS {
            assert!(seen.insert(def.name), "duplicate command {}", def.name);
        }
    }

    #[test]
    fn module_commands_carry_their_module() {
        for module in ModuleId::ALL {
            for name in module.commands() {
                let def = BUILTIN_COMMANDS.iter().find(|d| d.name == *name).unwrap();
                assert_eq!(def.module, Some(module));
                assert_eq!(def.scope, CommandScope::Tenant);
            }
        }
    }

    #[test]
    fn super_admin_set_includes_the_approval_workflow() {
        let set = super_admin_commands();
        for name in [
            "register_accept",
            "register_reject_response",
            "register_decline",
            "modules_enable",
            "modules_disable",
            "modules_list",
            "org_config_set",
            "org_config_get",
        ] {
            assert!(set.contains(&name), "{name} missing");
        }
        assert!(!set.contains(&"register"));
    }

    #[tokio::test]
    async fn static_command_invoke_is_unimplemented() {
        let cmd = StaticCommand::new(BUILTIN_COMMANDS[0]);
        let err = cmd
            .invoke(&TenantContext::new(1), Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Command not implemented: register");
    }
}
