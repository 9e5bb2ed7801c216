use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::error::AppError;

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
        warn!(error = %e, "migration failed; continuing");
    } else {
        info!("migrations applied");
    }
    Ok(db)
}

const UNIQUE_VIOLATION: &str = "23505";

/// Turn a unique-constraint violation into a `Conflict`; pass anything else through.
pub fn map_unique_violation(err: sqlx::Error, message: &str) -> anyhow::Error {
    map_unique_violation_by(err, |_| message)
}

/// Like [`map_unique_violation`], with the message chosen from the violated constraint.
pub fn map_unique_violation_by<'a>(
    err: sqlx::Error,
    message: impl FnOnce(Option<&str>) -> &'a str,
) -> anyhow::Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let msg = message(db_err.constraint());
            return anyhow::Error::new(AppError::Conflict(msg.to_string()));
        }
    }
    anyhow::Error::new(err)
}
