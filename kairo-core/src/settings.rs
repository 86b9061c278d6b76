//! Per-module configuration blobs.
//!
//! Blobs are stored as JSON. A blob that is missing or does not parse
//! reads back as the defaults, so a damaged row degrades one module
//! rather than the tenant.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::{KairoError, KairoResult};

/// Parse a settings blob, falling back to defaults on absence or damage.
pub fn settings_or_default<T>(blob: Option<Value>) -> T
where
    T: DeserializeOwned + Default,
{
    match blob {
        Some(value) => serde_json::from_value(value).unwrap_or_else(|err| {
            warn!(error = %err, "unreadable module settings, using defaults");
            T::default()
        }),
        None => T::default(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceSettings {
    pub rename_enabled: bool,
    pub staff_role_id: Option<u64>,
    pub rename_format_member: String,
    pub rename_format_staff: String,
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        Self {
            rename_enabled: false,
            staff_role_id: None,
            rename_format_member: "{name}".to_string(),
            rename_format_staff: "幹部 | {name}".to_string(),
        }
    }
}

impl AttendanceSettings {
    /// Nickname a member should carry, or `None` when renaming is off.
    pub fn nickname_for(&self, name: &str, is_staff: bool) -> Option<String> {
        if !self.rename_enabled {
            return None;
        }
        let format = if is_staff {
            &self.rename_format_staff
        } else {
            &self.rename_format_member
        };
        Some(format.replace("{name}", name))
    }
}

/// Where ledger columns live in the tenant's journal sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookkeepingSettings {
    pub start_row: u32,
    pub date_col: String,
    pub category_col: String,
    pub amount_col: String,
    pub memo_col: String,
    pub user_col: String,
}

impl Default for BookkeepingSettings {
    fn default() -> Self {
        Self {
            start_row: 2,
            date_col: "A".to_string(),
            category_col: "B".to_string(),
            amount_col: "C".to_string(),
            memo_col: "D".to_string(),
            user_col: "E".to_string(),
        }
    }
}

impl BookkeepingSettings {
    /// Upper-case the columns and check the layout is usable.
    pub fn validated(mut self) -> KairoResult<Self> {
        if self.start_row < 1 {
            return Err(KairoError::unprocessable("start_row must be at least 1").into_anyhow());
        }
        for (field, col) in [
            ("date_col", &mut self.date_col),
            ("category_col", &mut self.category_col),
            ("amount_col", &mut self.amount_col),
            ("memo_col", &mut self.memo_col),
            ("user_col", &mut self.user_col),
        ] {
            *col = col.trim().to_ascii_uppercase();
            if col.is_empty() || col.len() > 2 || !col.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(KairoError::unprocessable(format!(
                    "{field} must be a column name like A or AA, got {col:?}"
                ))
                .into_anyhow());
            }
        }
        Ok(self)
    }

    /// 1-based column number for a column name (`A` = 1, `AA` = 27).
    /// `None` for empty or non-letter names and for numbers past `u32`.
    pub fn column_number(col: &str) -> Option<u32> {
        if col.is_empty() {
            return None;
        }
        col.bytes().try_fold(0u32, |acc, b| {
            if !b.is_ascii_alphabetic() {
                return None;
            }
            acc.checked_mul(26)?
                .checked_add(u32::from(b.to_ascii_uppercase() - b'A' + 1))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtfdSettings {
    pub base_url: Option<String>,
    /// Token sealed with the master key.
    pub token_ciphertext: Option<String>,
    pub push_mode: String,
    pub award_name: String,
    pub award_category: String,
}

impl Default for CtfdSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            token_ciphertext: None,
            push_mode: "award".to_string(),
            award_name: "Discord QA".to_string(),
            award_category: "discord".to_string(),
        }
    }
}

/// 32-byte key used to open encrypted settings.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    pub fn from_base64(encoded: &str) -> KairoResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| KairoError::bad_request(format!("master key is not valid base64: {e}")).into_anyhow())?;
        let key: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            KairoError::bad_request(format!("master key must be 32 bytes, got {}", bytes.len())).into_anyhow()
        })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Opens ciphertext produced by the deployment's sealing tool.
pub trait SecretCipher: Send + Sync {
    fn decrypt(&self, key: &MasterKey, ciphertext: &str) -> KairoResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictedReason {
    /// The tenant never configured the module.
    NotConfigured,
    /// No usable master key in this process.
    KeyMissing,
    DecryptionFailed,
}

/// Outcome of reading settings that need secrets. A restricted module
/// keeps running with reduced function; nothing else is affected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleReadiness<T> {
    Ready(T),
    Restricted(RestrictedReason),
}

impl<T> ModuleReadiness<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, ModuleReadiness::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            ModuleReadiness::Ready(value) => Some(value),
            ModuleReadiness::Restricted(_) => None,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct CtfdCredentials {
    pub base_url: String,
    pub token: String,
    pub push_mode: String,
    pub award_name: String,
    pub award_category: String,
}

impl fmt::Debug for CtfdCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CtfdCredentials")
            .field("base_url", &self.base_url)
            .field("push_mode", &self.push_mode)
            .field("award_name", &self.award_name)
            .field("award_category", &self.award_category)
            .finish_non_exhaustive()
    }
}

pub fn ctfd_credentials(
    settings: &CtfdSettings,
    key: Option<&MasterKey>,
    cipher: &dyn SecretCipher,
) -> ModuleReadiness<CtfdCredentials> {
    let (Some(base_url), Some(ciphertext)) = (
        settings.base_url.as_deref().filter(|u| !u.is_empty()),
        settings.token_ciphertext.as_deref().filter(|c| !c.is_empty()),
    ) else {
        return ModuleReadiness::Restricted(RestrictedReason::NotConfigured);
    };

    let Some(key) = key else {
        return ModuleReadiness::Restricted(RestrictedReason::KeyMissing);
    };

    match cipher.decrypt(key, ciphertext) {
        Ok(token) => ModuleReadiness::Ready(CtfdCredentials {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            push_mode: settings.push_mode.clone(),
            award_name: settings.award_name.clone(),
            award_category: settings.award_category.clone(),
        }),
        Err(err) => {
            warn!(error = %err, "ctfd token could not be decrypted");
            ModuleReadiness::Restricted(RestrictedReason::DecryptionFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Reverse;

    impl SecretCipher for Reverse {
        fn decrypt(&self, _key: &MasterKey, ciphertext: &str) -> KairoResult<String> {
            match ciphertext.strip_prefix("sealed:") {
                Some(rest) => Ok(rest.chars().rev().collect()),
                None => Err(KairoError::unprocessable("bad tag").into_anyhow()),
            }
        }
    }

    fn key() -> MasterKey {
        MasterKey::from_base64(&STANDARD.encode([7u8; 32])).unwrap()
    }

    fn configured() -> CtfdSettings {
        CtfdSettings {
            base_url: Some("https://ctf.example.org/".into()),
            token_ciphertext: Some("sealed:nekot".into()),
            ..CtfdSettings::default()
        }
    }

    #[test]
    fn defaults_match_a_fresh_tenant() {
        let att = AttendanceSettings::default();
        assert!(!att.rename_enabled);
        assert_eq!(att.rename_format_member, "{name}");
        assert_eq!(att.rename_format_staff, "幹部 | {name}");

        let book = BookkeepingSettings::default();
        assert_eq!(book.start_row, 2);
        assert_eq!(
            [book.date_col, book.category_col, book.amount_col, book.memo_col, book.user_col],
            ["A", "B", "C", "D", "E"].map(String::from)
        );

        let ctfd = CtfdSettings::default();
        assert_eq!((ctfd.push_mode.as_str(), ctfd.award_name.as_str()), ("award", "Discord QA"));
        assert_eq!(ctfd.award_category, "discord");
    }

    #[test]
    fn damaged_blob_reads_as_defaults() {
        let parsed: BookkeepingSettings = settings_or_default(Some(json!({"start_row": "two"})));
        assert_eq!(parsed, BookkeepingSettings::default());

        let partial: AttendanceSettings = settings_or_default(Some(json!({"rename_enabled": true})));
        assert!(partial.rename_enabled);
        assert_eq!(partial.rename_format_member, "{name}");

        let absent: CtfdSettings = settings_or_default(None);
        assert_eq!(absent, CtfdSettings::default());
    }

    #[test]
    fn nickname_formatting() {
        let mut att = AttendanceSettings::default();
        assert_eq!(att.nickname_for("mika", false), None);
        att.rename_enabled = true;
        assert_eq!(att.nickname_for("mika", false).as_deref(), Some("mika"));
        assert_eq!(att.nickname_for("mika", true).as_deref(), Some("幹部 | mika"));
    }

    #[test]
    fn column_numbers_reject_bad_and_oversized_names() {
        assert_eq!(BookkeepingSettings::column_number("A"), Some(1));
        assert_eq!(BookkeepingSettings::column_number("e"), Some(5));
        assert_eq!(BookkeepingSettings::column_number("ZZZZZZ"), Some(321_272_406));
        assert_eq!(BookkeepingSettings::column_number("ZZZZZZZ"), None);
        assert_eq!(BookkeepingSettings::column_number("ABCDEFGHIJKLMNOP"), None);
        assert_eq!(BookkeepingSettings::column_number(""), None);
        assert_eq!(BookkeepingSettings::column_number("A1"), None);
    }

    #[test]
    fn bookkeeping_layout_validation() {
        let ok = BookkeepingSettings {
            amount_col: " aa ".into(),
            ..BookkeepingSettings::default()
        }
        .validated()
        .unwrap();
        assert_eq!(ok.amount_col, "AA");
        assert_eq!(BookkeepingSettings::column_number(&ok.amount_col), Some(27));

        let bad = BookkeepingSettings {
            memo_col: "A1".into(),
            ..BookkeepingSettings::default()
        };
        assert!(bad.validated().is_err());

        let zero = BookkeepingSettings {
            start_row: 0,
            ..BookkeepingSettings::default()
        };
        assert!(zero.validated().is_err());
    }

    #[test]
    fn master_key_must_be_32_bytes() {
        assert!(MasterKey::from_base64(&STANDARD.encode([1u8; 16])).is_err());
        assert!(MasterKey::from_base64("%%%").is_err());
        assert_eq!(key().as_bytes(), &[7u8; 32]);
        assert_eq!(format!("{:?}", key()), "MasterKey(..)");
    }

    #[test]
    fn ctfd_credentials_ready() {
        let creds = ctfd_credentials(&configured(), Some(&key()), &Reverse).ready().unwrap();
        assert_eq!(creds.base_url, "https://ctf.example.org");
        assert_eq!(creds.token, "token");
        assert!(!format!("{creds:?}").contains("token"));
    }

    #[test]
    fn ctfd_credentials_restricted_reasons() {
        assert_eq!(
            ctfd_credentials(&CtfdSettings::default(), Some(&key()), &Reverse),
            ModuleReadiness::Restricted(RestrictedReason::NotConfigured)
        );
        assert_eq!(
            ctfd_credentials(&configured(), None, &Reverse),
            ModuleReadiness::Restricted(RestrictedReason::KeyMissing)
        );
        let tampered = CtfdSettings {
            token_ciphertext: Some("garbage".into()),
            ..configured()
        };
        assert_eq!(
            ctfd_credentials(&tampered, Some(&key()), &Reverse),
            ModuleReadiness::Restricted(RestrictedReason::DecryptionFailed)
        );
    }
}
