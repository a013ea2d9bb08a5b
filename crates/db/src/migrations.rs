use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use super::run_pending;
    use crate::connect_with_settings;

    #[tokio::test]
    async fn migrations_create_team_table_and_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");

        run_pending(&pool).await.expect("first migration run");
        run_pending(&pool).await.expect("second migration run is a no-op");

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'team'",
        )
        .fetch_one(&pool)
        .await
        .expect("schema query");
        assert_eq!(count, 1);

        pool.close().await;
    }
}
