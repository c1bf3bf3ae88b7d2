pub mod models;
pub mod queries;

#[cfg(test)]
pub mod testing;

use std::str::FromStr;

use anyhow::Context;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{AnyPool, ConnectOptions, Executor};
use tracing::info;

use crate::config::Config;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./src/db/migrations");

pub async fn connect_and_migrate(config: &Config) -> anyhow::Result<AnyPool> {
    sqlx::any::install_default_drivers();

    let db_url = normalized_db_url(&config.db_url);
    let is_sqlite = db_url.starts_with("sqlite:");

    let connect_options = AnyConnectOptions::from_str(&db_url)
        .with_context(|| format!("invalid MAINTRACK_DB_URL: {}", config.db_url))?
        .disable_statement_logging();

    let pool = AnyPoolOptions::new()
        .max_connections(if is_sqlite { 4 } else { 16 })
        .after_connect(move |connection, _meta| {
            Box::pin(async move {
                if is_sqlite {
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *connection)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *connection)
                        .await?;
                }
                Ok(())
            })
        })
        .connect_with(connect_options)
        .await
        .context("failed to establish database pool")?;

    if is_sqlite {
        pool.execute("PRAGMA journal_mode = WAL;")
            .await
            .context("failed to set sqlite WAL mode")?;
    }

    MIGRATOR
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    info!(sqlite = is_sqlite, "database ready");
    Ok(pool)
}

fn normalized_db_url(db_url: &str) -> String {
    let Some(path_and_query) = db_url.strip_prefix("sqlite://") else {
        return db_url.to_string();
    };

    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    };

    let mut path = path.replace('\\', "/");
    if let Some(stripped) = path.strip_prefix("//?/") {
        path = format!("/{stripped}");
    }

    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        path.insert(0, '/');
    }

    match query {
        Some(query) => format!("sqlite://{path}?{query}"),
        None if path == ":memory:" => format!("sqlite://{path}"),
        None => format!("sqlite://{path}?mode=rwc"),
    }
}
