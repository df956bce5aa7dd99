use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub type DbPool = DatabaseConnection;

/// Pool settings for the catalog database.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

impl DbConfig {
    /// Every connection to `sqlite::memory:` opens its own empty database.
    fn is_in_memory_sqlite(&self) -> bool {
        self.url.starts_with("sqlite::memory:") || self.url.contains("mode=memory")
    }

    fn connect_options(&self) -> ConnectOptions {
        let (max, min) = if self.is_in_memory_sqlite() && self.max_connections > 1 {
            warn!(
                requested = self.max_connections,
                "in-memory sqlite is limited to a single connection"
            );
            (1, 1)
        } else {
            (self.max_connections, self.min_connections.min(self.max_connections))
        };

        let mut opt = ConnectOptions::new(self.url.clone());
        opt.max_connections(max)
            .min_connections(min)
            .connect_timeout(self.connect_timeout)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .sqlx_logging(false);
        opt
    }
}

/// Opens the connection pool.
///
/// # Errors
/// Returns `ServiceError::DatabaseError` when the database is unreachable.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let opt = config.connect_options();
    gauge!(
        "storefront_db.max_connections",
        opt.get_max_connections().unwrap_or_default() as f64
    );

    let pool = Database::connect(opt).await.map_err(|e| {
        error!(error = %e, "could not open database pool");
        counter!("storefront_db.connection_failures", 1);
        ServiceError::DatabaseError(e)
    })?;

    info!(backend = ?pool.get_database_backend(), "database pool ready");
    Ok(pool)
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    establish_connection_with_config(&DbConfig::from(cfg)).await
}

/// Applies pending schema migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    match crate::migrator::Migrator::up(pool, None).await {
        Ok(()) => {
            info!(elapsed = ?started.elapsed(), "schema is up to date");
            Ok(())
        }
        Err(e) => {
            error!(elapsed = ?started.elapsed(), error = %e, "migrations failed");
            Err(ServiceError::DatabaseError(e))
        }
    }
}

/// Round-trips a ping; used by the health endpoint.
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    if let Err(e) = pool.ping().await {
        error!(error = %e, "database ping failed");
        counter!("storefront_db.connection_failures", 1);
        return Err(ServiceError::DatabaseError(e));
    }

    let elapsed = started.elapsed();
    debug!(?elapsed, "database ping ok");
    gauge!("storefront_db.ping_ms", elapsed.as_secs_f64() * 1000.0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_sqlite_is_clamped_to_one_connection() {
        let cfg = DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 5,
            ..Default::default()
        };
        assert_eq!(cfg.connect_options().get_max_connections(), Some(1));

        let file = DbConfig {
            url: "sqlite://storefront.db?mode=rwc".into(),
            ..Default::default()
        };
        assert_eq!(file.connect_options().get_max_connections(), Some(10));
    }

    #[tokio::test]
    async fn sqlite_memory_connects_and_migrates() {
        let pool = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .expect("connect");
        run_migrations(&pool).await.expect("migrate");
        assert!(check_connection(&pool).await.is_ok());
    }
}
