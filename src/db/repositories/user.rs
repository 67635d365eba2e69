//! User identity repository: lookups, writes and cascading deactivation.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use thiserror::Error;
use tracing::info;

use crate::clock::Clock;
use crate::constants::db::MAX_QUERY_PARAMS;
use crate::constants::properties::DEFAULT_ISSUE_ASSIGNEE;
use crate::constants::scm::ACCOUNTS_SEPARATOR;
use crate::db::batch;
use crate::entities::{group_memberships, properties, user_roles, users};
use crate::models::user::{NewUser, User, UserQuery, encode_scm_accounts};

/// Typed failures surfaced by the repository beyond plain store errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("user with login '{login}' has not been found")]
    UserNotFound { login: String },
}

pub struct UserRepository {
    conn: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl UserRepository {
    #[must_use]
    pub fn new(conn: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self { conn, clock }
    }

    /// Point lookup by id, including deactivated users.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by id")?;

        Ok(user.map(User::from))
    }

    /// Bulk lookup by ids, including deactivated users. Results are
    /// unordered; an empty id list returns without touching the store.
    pub async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        let conn = &self.conn;
        batch::execute_large_inputs(ids, MAX_QUERY_PARAMS, |chunk| async move {
            let rows = users::Entity::find()
                .filter(users::Column::Id.is_in(chunk))
                .all(conn)
                .await
                .context("Failed to query users by ids")?;
            Ok(rows.into_iter().map(User::from).collect())
        })
        .await
    }

    /// Lookup by login restricted to active users. `None` is the normal
    /// outcome for unknown or deactivated logins.
    pub async fn get_active_by_login(&self, login: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Login.eq(login))
            .filter(users::Column::Active.eq(true))
            .one(&self.conn)
            .await
            .context("Failed to query active user by login")?;

        Ok(user.map(User::from))
    }

    /// Bulk lookup by logins, including deactivated users. Results are
    /// unordered; an empty login list returns without touching the store.
    pub async fn get_by_logins(&self, logins: &[String]) -> Result<Vec<User>> {
        let conn = &self.conn;
        batch::execute_large_inputs(logins, MAX_QUERY_PARAMS, |chunk| async move {
            let rows = users::Entity::find()
                .filter(users::Column::Login.is_in(chunk))
                .all(conn)
                .await
                .context("Failed to query users by logins")?;
            Ok(rows.into_iter().map(User::from).collect())
        })
        .await
    }

    /// Bulk lookup that reconciles the unordered store results back into the
    /// caller's order. Logins that do not resolve are dropped, so the output
    /// may be shorter than the input; a login repeated in the input re-emits
    /// the same record per occurrence without repeating the lookup.
    pub async fn get_by_ordered_logins(&self, logins: &[String]) -> Result<Vec<User>> {
        let unordered = self.get_by_logins(logins).await?;

        // Last write wins should the store ever return the same login twice;
        // login uniqueness makes that impossible in practice.
        let by_login: HashMap<String, User> = unordered
            .into_iter()
            .map(|user| (user.login.clone(), user))
            .collect();

        Ok(logins
            .iter()
            .filter_map(|login| by_login.get(login).cloned())
            .collect())
    }

    /// Generic filtered search, ordered by login for stable output.
    pub async fn get_users(&self, query: &UserQuery) -> Result<Vec<User>> {
        let mut cond = Condition::all();
        if !query.include_inactive {
            cond = cond.add(users::Column::Active.eq(true));
        }
        if let Some(logins) = &query.logins {
            cond = cond.add(users::Column::Login.is_in(logins.clone()));
        }
        if let Some(excluded) = &query.excluded_logins {
            cond = cond.add(users::Column::Login.is_not_in(excluded.clone()));
        }
        if let Some(text) = &query.search_text {
            cond = cond.add(
                Condition::any()
                    .add(users::Column::Login.contains(text.as_str()))
                    .add(users::Column::Name.contains(text.as_str()))
                    .add(users::Column::Email.contains(text.as_str())),
            );
        }

        let rows = users::Entity::find()
            .filter(cond)
            .order_by_asc(users::Column::Login)
            .all(&self.conn)
            .await
            .context("Failed to search users")?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Number of active root users other than the given login. The "do not
    /// demote the last root" decision belongs to the caller.
    pub async fn count_root_users_but_login(&self, login: &str) -> Result<u64> {
        users::Entity::find()
            .filter(users::Column::IsRoot.eq(true))
            .filter(users::Column::Active.eq(true))
            .filter(users::Column::Login.ne(login))
            .count(&self.conn)
            .await
            .context("Failed to count root users")
    }

    /// Persists a new user and echoes it back with the assigned id. New
    /// users start active; both audit timestamps come from the clock.
    pub async fn insert(&self, new_user: NewUser) -> Result<User> {
        let now = self.clock.now().to_rfc3339();

        let active_model = users::ActiveModel {
            login: Set(new_user.login.clone()),
            name: Set(new_user.name.clone()),
            email: Set(new_user.email.clone()),
            scm_accounts: Set(encode_scm_accounts(&new_user.scm_accounts)),
            is_root: Set(new_user.is_root),
            active: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        };

        let result = users::Entity::insert(active_model)
            .exec(&self.conn)
            .await
            .context("Failed to insert user")?;

        info!("Inserted user '{}'", new_user.login);

        Ok(User {
            id: result.last_insert_id,
            login: new_user.login,
            name: new_user.name,
            email: new_user.email,
            scm_accounts: new_user.scm_accounts,
            is_root: new_user.is_root,
            active: true,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Full-record update by id, replacing the mutable fields (name, email,
    /// SCM accounts) and stamping the update timestamp. Login and the
    /// activity flags have dedicated operations and are not touched here.
    pub async fn update(&self, mut user: User) -> Result<User> {
        let now = self.clock.now().to_rfc3339();

        users::Entity::update_many()
            .col_expr(users::Column::Name, Expr::value(user.name.clone()))
            .col_expr(users::Column::Email, Expr::value(user.email.clone()))
            .col_expr(
                users::Column::ScmAccounts,
                Expr::value(encode_scm_accounts(&user.scm_accounts)),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(now.clone()))
            .filter(users::Column::Id.eq(user.id))
            .exec(&self.conn)
            .await
            .context("Failed to update user")?;

        user.updated_at = now;
        Ok(user)
    }

    /// Grants or revokes the root flag, stamping the update timestamp.
    pub async fn set_root(&self, login: &str, root: bool) -> Result<()> {
        users::Entity::update_many()
            .col_expr(users::Column::IsRoot, Expr::value(root))
            .col_expr(
                users::Column::UpdatedAt,
                Expr::value(self.clock.now().to_rfc3339()),
            )
            .filter(users::Column::Login.eq(login))
            .exec(&self.conn)
            .await
            .context("Failed to set root flag")?;

        info!("Set root={} for user '{}'", root, login);
        Ok(())
    }

    /// Point lookup by login, including deactivated users.
    pub async fn get_by_login(&self, login: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Login.eq(login))
            .one(&self.conn)
            .await
            .context("Failed to query user by login")?;

        Ok(user.map(User::from))
    }

    /// Like `get_by_login`, but an unknown login is an error naming it.
    pub async fn require_by_login(&self, login: &str) -> Result<User> {
        self.get_by_login(login).await?.ok_or_else(|| {
            IdentityError::UserNotFound {
                login: login.to_string(),
            }
            .into()
        })
    }

    /// Matches an exact login, an exact email, or a whole entry of the SCM
    /// accounts list. The candidate is wrapped with the list separator before
    /// substring matching, so a value embedded in a longer neighboring entry
    /// cannot match.
    pub async fn get_by_scm_account_or_login_or_email(&self, value: &str) -> Result<Vec<User>> {
        let wrapped = format!("%{ACCOUNTS_SEPARATOR}{value}{ACCOUNTS_SEPARATOR}%");

        let rows = users::Entity::find()
            .filter(
                Condition::any()
                    .add(users::Column::Login.eq(value))
                    .add(users::Column::Email.eq(value))
                    .add(users::Column::ScmAccounts.like(wrapped)),
            )
            .all(&self.conn)
            .await
            .context("Failed to query users by SCM account, login or email")?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// True when at least one active user has this email. Both sides are
    /// lower-cased with locale-independent folding, so results do not vary
    /// with the host environment.
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count = users::Entity::find()
            .filter(users::Column::Active.eq(true))
            .filter(
                Expr::expr(Func::lower(Expr::col(users::Column::Email)))
                    .eq(email.to_lowercase()),
            )
            .count(&self.conn)
            .await
            .context("Failed to count users by email")?;

        Ok(count > 0)
    }

    /// Deactivates a user and purges the dependent data the user owns:
    /// group memberships, user-scoped properties, role grants, and the
    /// global default-assignee property naming this login.
    ///
    /// The initial lookup is unfiltered, so calling this again for an
    /// already inactive user re-runs the cascade against empty partitions
    /// and returns true again. Returns false only when the login does not
    /// exist at all.
    pub async fn deactivate_by_login(&self, login: &str) -> Result<bool> {
        let user = users::Entity::find()
            .filter(users::Column::Login.eq(login))
            .one(&self.conn)
            .await
            .context("Failed to query user for deactivation")?;

        let Some(user) = user else {
            return Ok(false);
        };

        // Every sub-step joins one transaction; a partial cascade must never
        // be observable.
        let txn = self.conn.begin().await?;

        group_memberships::Entity::delete_many()
            .filter(group_memberships::Column::UserId.eq(user.id))
            .exec(&txn)
            .await
            .context("Failed to remove user from groups")?;

        properties::Entity::delete_many()
            .filter(properties::Column::UserId.eq(user.id))
            .exec(&txn)
            .await
            .context("Failed to delete user properties")?;

        user_roles::Entity::delete_many()
            .filter(user_roles::Column::UserId.eq(user.id))
            .exec(&txn)
            .await
            .context("Failed to delete user role grants")?;

        properties::Entity::delete_many()
            .filter(properties::Column::PropKey.eq(DEFAULT_ISSUE_ASSIGNEE))
            .filter(properties::Column::TextValue.eq(user.login.as_str()))
            .exec(&txn)
            .await
            .context("Failed to delete default assignee property")?;

        users::Entity::update_many()
            .col_expr(users::Column::Active, Expr::value(false))
            .col_expr(
                users::Column::UpdatedAt,
                Expr::value(self.clock.now().to_rfc3339()),
            )
            .filter(users::Column::Id.eq(user.id))
            .exec(&txn)
            .await
            .context("Failed to deactivate user")?;

        txn.commit().await.context("Failed to commit deactivation")?;

        info!("Deactivated user '{}'", user.login);
        Ok(true)
    }
}
