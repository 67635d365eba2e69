//! User DTOs exposed by the store, decoupled from the sea-orm row models.

use serde::{Deserialize, Serialize};

use crate::constants::scm::ACCOUNTS_SEPARATOR;
use crate::entities::users;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub scm_accounts: Vec<String>,
    pub is_root: bool,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            login: model.login,
            name: model.name,
            email: model.email,
            scm_accounts: decode_scm_accounts(model.scm_accounts.as_deref()),
            is_root: model.is_root,
            active: model.active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Input for `insert`. The store assigns the id, stamps both audit
/// timestamps, and creates the user active.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub scm_accounts: Vec<String>,
    pub is_root: bool,
}

/// Filter for `get_users`. The empty query matches every active user.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Restrict to these logins.
    pub logins: Option<Vec<String>>,

    /// Exclude these logins.
    pub excluded_logins: Option<Vec<String>>,

    /// Also return deactivated users.
    pub include_inactive: bool,

    /// Substring matched against login, name and email.
    pub search_text: Option<String>,
}

/// Encodes an SCM account list into its separator-wrapped storage form.
/// An empty list is stored as NULL.
pub(crate) fn encode_scm_accounts(accounts: &[String]) -> Option<String> {
    if accounts.is_empty() {
        return None;
    }
    Some(format!(
        "{ACCOUNTS_SEPARATOR}{}{ACCOUNTS_SEPARATOR}",
        accounts.join(ACCOUNTS_SEPARATOR)
    ))
}

pub(crate) fn decode_scm_accounts(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(ACCOUNTS_SEPARATOR)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
