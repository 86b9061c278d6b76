//! Optional feature bundles and the fixed commands each one unlocks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::KairoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleId {
    Attendance,
    Plans,
    Qa,
    Ctfd,
    Crypto,
    Bookkeeping,
    Routing,
}

impl ModuleId {
    /// Table order. Resolution output follows it.
    pub const ALL: [ModuleId; 7] = [
        ModuleId::Attendance,
        ModuleId::Plans,
        ModuleId::Qa,
        ModuleId::Ctfd,
        ModuleId::Crypto,
        ModuleId::Bookkeeping,
        ModuleId::Routing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleId::Attendance => "attendance",
            ModuleId::Plans => "plans",
            ModuleId::Qa => "qa",
            ModuleId::Ctfd => "ctfd",
            ModuleId::Crypto => "crypto",
            ModuleId::Bookkeeping => "bookkeeping",
            ModuleId::Routing => "routing",
        }
    }

    /// Commands gated by this module. Fixed at build time.
    pub fn commands(&self) -> &'static [&'static str] {
        match self {
            ModuleId::Attendance => &[
                "signin_start",
                "signin_in",
                "signin_end",
                "signin_report",
                "signin_summary",
            ],
            ModuleId::Plans => &["plan_set", "plan_show", "plan_group_set"],
            ModuleId::Qa => &["qa_add", "qa_ask", "qa_scoreboard", "qa_reset"],
            ModuleId::Ctfd => &["ctfd_link", "ctfd_scoreboard"],
            ModuleId::Crypto => &["crypto_encrypt", "crypto_decrypt"],
            ModuleId::Bookkeeping => &["book_add", "book_balance", "book_export", "book_set_sheets"],
            ModuleId::Routing => &["org_channel_set", "org_channel_get"],
        }
    }

    /// Parse a stored key; `None` for anything outside the table.
    pub fn parse(key: &str) -> Option<ModuleId> {
        ModuleId::ALL.into_iter().find(|m| m.as_str() == key)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleId {
    type Err = KairoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleId::parse(s.trim()).ok_or_else(|| KairoError::bad_request(format!("Unknown module: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn module_command_lists_are_disjoint() {
        let mut seen = HashSet::new();
        for module in ModuleId::ALL {
            for name in module.commands() {
                assert!(seen.insert(*name), "{name} appears in two modules");
            }
        }
        assert_eq!(seen.len(), 22);
    }

    #[test]
    fn keys_parse_exactly() {
        for module in ModuleId::ALL {
            assert_eq!(module.as_str().parse::<ModuleId>().unwrap(), module);
        }
        assert_eq!(ModuleId::parse("QA"), None);
        assert!("bogus".parse::<ModuleId>().is_err());
    }
}
