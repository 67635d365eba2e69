use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::models::user::{NewUser, User, UserQuery};

pub mod batch;
pub mod migrator;
pub mod repositories;

pub use repositories::user::{IdentityError, UserRepository};

/// Facade over the backing store: owns the connection, runs migrations on
/// startup and hands each operation to a repository.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::with_pool_options(
            &config.general.database_url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        Self::connect(db_url, max_connections, min_connections, Arc::new(SystemClock)).await
    }

    /// Store with a caller-supplied clock; tests pin time with `FixedClock`.
    pub async fn with_clock(db_url: &str, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::connect(db_url, 5, 1, clock).await
    }

    async fn connect(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn, clock })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn user_repo(&self) -> UserRepository {
        UserRepository::new(self.conn.clone(), self.clock.clone())
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        self.user_repo().get_by_ids(ids).await
    }

    pub async fn get_active_user_by_login(&self, login: &str) -> Result<Option<User>> {
        self.user_repo().get_active_by_login(login).await
    }

    pub async fn get_users_by_logins(&self, logins: &[String]) -> Result<Vec<User>> {
        self.user_repo().get_by_logins(logins).await
    }

    pub async fn get_users_by_ordered_logins(&self, logins: &[String]) -> Result<Vec<User>> {
        self.user_repo().get_by_ordered_logins(logins).await
    }

    pub async fn get_users(&self, query: &UserQuery) -> Result<Vec<User>> {
        self.user_repo().get_users(query).await
    }

    pub async fn count_root_users_but_login(&self, login: &str) -> Result<u64> {
        self.user_repo().count_root_users_but_login(login).await
    }

    pub async fn insert_user(&self, new_user: NewUser) -> Result<User> {
        self.user_repo().insert(new_user).await
    }

    pub async fn update_user(&self, user: User) -> Result<User> {
        self.user_repo().update(user).await
    }

    pub async fn set_user_root(&self, login: &str, root: bool) -> Result<()> {
        self.user_repo().set_root(login, root).await
    }

    pub async fn get_user_by_login(&self, login: &str) -> Result<Option<User>> {
        self.user_repo().get_by_login(login).await
    }

    pub async fn require_user_by_login(&self, login: &str) -> Result<User> {
        self.user_repo().require_by_login(login).await
    }

    pub async fn get_users_by_scm_account_or_login_or_email(
        &self,
        value: &str,
    ) -> Result<Vec<User>> {
        self.user_repo()
            .get_by_scm_account_or_login_or_email(value)
            .await
    }

    pub async fn user_email_exists(&self, email: &str) -> Result<bool> {
        self.user_repo().email_exists(email).await
    }

    pub async fn deactivate_user_by_login(&self, login: &str) -> Result<bool> {
        self.user_repo().deactivate_by_login(login).await
    }
}
