//! Temp-file database for repository tests.

use std::sync::Arc;

use tempfile::TempDir;

use crate::db::{create_pool, init, run_migrations, spawn_writer, DbPool, WriteHandle};

pub(crate) struct TestDb {
    pub pool: Arc<DbPool>,
    pub writer: WriteHandle,
    // Dropping the directory deletes the database
    _dir: TempDir,
}

/// Must be called inside a tokio runtime; the writer actor is spawned on it.
pub(crate) fn setup() -> TestDb {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("test.db");
    let db_path = init(&path.to_string_lossy()).expect("Failed to init database");
    let pool = create_pool(&db_path).expect("Failed to create pool");
    run_migrations(&pool).expect("Failed to run migrations");
    let writer = spawn_writer((*pool).clone());

    TestDb {
        pool,
        writer,
        _dir: dir,
    }
}
