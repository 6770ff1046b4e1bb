use serde::{Deserialize, Serialize};

/// `{id, ownerUserId, name, provider, model, systemPrompt, timezone, permissions,
/// integrations, alwaysOn}`. Created by a user, owned by that user, persisted
/// under the user's prefix. Destroying an `AgentConfig` removes the agent from
/// the runtime set ([`crate::runtime::AgentRuntimeManager::stop`]).
///
/// Invariant: `alwaysOn` implies messaging credentials are present — enforced
/// at `AgentRuntimeManager::deploy`, not here, since credentials live behind
/// the encrypted `webCredentials` map and are only resolvable at deploy time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    pub provider: String,
    pub model: String,
    pub system_prompt: String,
    pub timezone: String,
    pub permissions: Permissions,
    pub integrations: Vec<String>,
    pub always_on: bool,
}

impl AgentConfig {
    /// Returns `Ok(())` if `alwaysOn` agents carry the messaging credential
    /// their transport needs; callers pass in whatever credential lookup
    /// their transport requires (e.g. a decrypted bot token).
    pub fn validate_always_on(&self, has_messaging_credentials: bool) -> Result<(), String> {
        if self.always_on && !has_messaging_credentials {
            return Err(format!(
                "agent {} is alwaysOn but has no messaging credentials",
                self.id
            ));
        }
        Ok(())
    }
}

/// Bitset-like permission record. Every category gates one class of tool
/// side effects; a tool invocation must pass the matching category's gate
/// before any side effect runs (see [`crate::approval`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Permissions {
    pub internet_access: bool,
    pub headless_browser: bool,
    pub notes_access: bool,
    pub scheduler_access: bool,
    pub calendar_access: bool,
    pub gmail_access: bool,
    pub media_access: bool,
    pub terminal_access: bool,
    pub code_execution: bool,
    /// Host patterns the internet-access category is restricted to. Empty
    /// means no extra restriction beyond `internet_access` itself.
    pub allowed_websites: Vec<String>,
    /// Encrypted `encwc.v1:...` envelopes for site credentials; see
    /// [`crate::crypto`].
    pub web_credentials: std::collections::HashMap<String, String>,
}
