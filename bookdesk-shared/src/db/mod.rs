/// Database layer
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: Embedded sqlx migrations (schema and row-level security)
/// - `scope`: Transactions carrying the caller's identity for row-level security
///
/// # Example
///
/// ```no_run
/// use bookdesk_shared::auth::policy::Actor;
/// use bookdesk_shared::db::pool::{create_pool, DatabaseConfig};
/// use bookdesk_shared::db::scope::begin_scoped;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::new(std::env::var("DATABASE_URL")?)).await?;
///
///     let tx = begin_scoped(&pool, &Actor::System).await?;
///     tx.commit().await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
pub mod scope;
