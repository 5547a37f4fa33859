//! End-to-end migration runs against the in-memory connection.

use std::path::Path;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tally::migrate::{
    Direction, HistoryRecord, MemoryConnection, MigrateResult, Migration, MigrationConfig,
    MigrationConnection, MigrationEngine, MigrationError, MigrationHistoryRepository,
    MigrationRegistry, SqlExecutor, hash_bytes,
};
use tempfile::TempDir;

fn write(dir: &Path, file_name: &str, table: &str) {
    std::fs::write(
        dir.join(file_name),
        format!(
            "-- migrate\nCREATE TABLE {0}(id uuid);\n\n-- migrate:rls\nALTER TABLE {0} ENABLE ROW LEVEL SECURITY;\n\n-- rollback:rls\nALTER TABLE {0} DISABLE ROW LEVEL SECURITY;\n\n-- rollback\nDROP TABLE {0};\n",
            table
        ),
    )
    .unwrap();
}

fn project() -> (TempDir, MigrationEngine) {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "1-users.sql", "users");
    write(dir.path(), "2-teams.sql", "teams");
    write(dir.path(), "3-members.sql", "members");
    let engine = MigrationEngine::new(MigrationConfig::new().migrations_dir(dir.path()));
    (dir, engine)
}

fn ids(records: &[HistoryRecord]) -> Vec<String> {
    let mut ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn migrate_then_rollback_restores_history() {
    let (_dir, engine) = project();
    let conn = MemoryConnection::initialized();

    let applied = engine.migrate(&conn, true).await.unwrap();
    assert_eq!(applied.direction, Direction::Forward);
    assert_eq!(applied.batch, 1);
    assert_eq!(applied.migrations, vec!["1-users.sql", "2-teams.sql", "3-members.sql"]);

    let records = conn.records();
    assert_eq!(ids(&records), vec!["1", "2", "3"]);
    assert!(records.iter().all(|r| r.batch == 1));

    let plan = engine.plan_rollback(&conn, false).await.unwrap();
    assert_eq!(plan.file_names(), vec!["3-members.sql", "2-teams.sql", "1-users.sql"]);

    let reverted = engine.rollback(&conn, false, true).await.unwrap();
    assert_eq!(reverted.batch, 1);
    assert_eq!(reverted.migrations, plan.file_names());
    assert!(conn.records().is_empty());
}

#[tokio::test]
async fn rls_sections_run_in_stack_order() {
    let (_dir, engine) = project();
    let conn = MemoryConnection::initialized();

    engine.migrate(&conn, true).await.unwrap();
    engine.rollback(&conn, false, true).await.unwrap();

    let statements = conn.statements();
    assert_eq!(statements.len(), 12);
    assert!(statements[0].contains("CREATE TABLE users"));
    assert!(statements[1].contains("ENABLE ROW LEVEL SECURITY"));
    assert!(statements[6].contains("members DISABLE ROW LEVEL SECURITY"));
    assert!(statements[7].contains("DROP TABLE members"));
}

#[tokio::test]
async fn ignoring_rls_skips_policy_sections() {
    let (_dir, engine) = project();
    let conn = MemoryConnection::initialized();

    engine.migrate(&conn, false).await.unwrap();

    let statements = conn.statements();
    assert_eq!(statements.len(), 3);
    assert!(statements.iter().all(|s| !s.contains("ROW LEVEL SECURITY")));
}

#[tokio::test]
async fn second_migrate_is_a_no_op() {
    let (dir, engine) = project();
    let conn = MemoryConnection::initialized();

    engine.migrate(&conn, true).await.unwrap();
    let again = engine.migrate(&conn, true).await.unwrap();
    assert!(!again.has_changes());
    assert!(engine.plan(&conn).await.unwrap().is_empty());

    write(dir.path(), "4-invites.sql", "invites");
    let next = engine.migrate(&conn, true).await.unwrap();
    assert_eq!(next.batch, 2);
    assert_eq!(next.migrations, vec!["4-invites.sql"]);

    let undone = engine.rollback(&conn, false, true).await.unwrap();
    assert_eq!(undone.migrations, vec!["4-invites.sql"]);
    assert_eq!(ids(&conn.records()), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn hex_ids_order_numerically() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "14-late.sql", "late");
    write(dir.path(), "a-early.sql", "early");
    let engine = MigrationEngine::new(MigrationConfig::new().migrations_dir(dir.path()));
    let conn = MemoryConnection::initialized();

    let result = engine.migrate(&conn, false).await.unwrap();
    assert_eq!(result.migrations, vec!["a-early.sql", "14-late.sql"]);
}

#[tokio::test]
async fn edited_migration_blocks_both_directions() {
    let (dir, engine) = project();
    let conn = MemoryConnection::initialized();
    engine.migrate(&conn, true).await.unwrap();

    std::fs::write(
        dir.path().join("2-teams.sql"),
        "-- migrate\nCREATE TABLE teams(id uuid, name text);\n-- rollback\nDROP TABLE teams;\n",
    )
    .unwrap();

    let err = engine.migrate(&conn, true).await.unwrap_err();
    assert!(matches!(err, MigrationError::HashMismatch { ref id, rollback: false, .. } if id == "2"));

    let err = engine.rollback(&conn, false, true).await.unwrap_err();
    assert!(err.is_drift());
    assert!(err.to_string().contains("--force"));
    assert_eq!(conn.records().len(), 3);

    let forced = engine.rollback(&conn, true, true).await.unwrap();
    assert_eq!(
        forced.warnings,
        vec!["Forcing rollback of migration with diverging hash (id: 2)..."]
    );
    assert!(conn.records().is_empty());
}

#[tokio::test]
async fn deleted_migration_blocks_both_directions() {
    let (dir, engine) = project();
    let conn = MemoryConnection::initialized();
    engine.migrate(&conn, true).await.unwrap();

    std::fs::remove_file(dir.path().join("3-members.sql")).unwrap();

    let err = engine.migrate(&conn, true).await.unwrap_err();
    assert!(matches!(err, MigrationError::MissingMigration { ref id, .. } if id == "3"));

    let err = engine.rollback(&conn, true, true).await.unwrap_err();
    assert!(matches!(err, MigrationError::MissingMigration { .. }));
    assert_eq!(conn.records().len(), 3);
}

#[tokio::test]
async fn failure_mid_batch_reverts_everything() {
    let (dir, engine) = project();
    let conn = MemoryConnection::initialized();
    engine.migrate(&conn, true).await.unwrap();

    write(dir.path(), "4-invites.sql", "invites");
    write(dir.path(), "5-audit.sql", "audit");
    let conn = MemoryConnection::initialized()
        .with_records(conn.records())
        .fail_on("CREATE TABLE audit");

    let err = engine.migrate(&conn, true).await.unwrap_err();
    assert!(matches!(err, MigrationError::Database(_)));
    assert!(!conn.in_transaction());
    assert_eq!(ids(&conn.records()), vec!["1", "2", "3"]);
    assert!(conn.statements().is_empty());
}

#[tokio::test]
async fn failure_mid_rollback_keeps_batch() {
    let (_dir, engine) = project();
    let seed = MemoryConnection::initialized();
    engine.migrate(&seed, false).await.unwrap();

    let conn = MemoryConnection::initialized()
        .with_records(seed.records())
        .fail_on("DROP TABLE users");

    assert!(engine.rollback(&conn, false, false).await.is_err());
    assert_eq!(conn.records().len(), 3);
}

#[tokio::test]
async fn migrate_before_init_fails() {
    let (_dir, engine) = project();
    let conn = MemoryConnection::new();

    let err = engine.migrate(&conn, true).await.unwrap_err();
    assert!(err.to_string().contains("does not exist"));

    engine.initialize(&conn).await.unwrap();
    assert!(engine.migrate(&conn, true).await.is_ok());
    assert!(matches!(
        engine.initialize(&conn).await.unwrap_err(),
        MigrationError::AlreadyInitialized(_)
    ));
}

struct SeedPlans;

#[async_trait]
impl Migration for SeedPlans {
    async fn migrate(&self, db: &dyn SqlExecutor, _rls: bool) -> MigrateResult<()> {
        for plan in ["free", "pro"] {
            db.batch_execute(&format!("INSERT INTO plans(name) VALUES ('{}')", plan))
                .await?;
        }
        Ok(())
    }

    async fn rollback(&self, db: &dyn SqlExecutor, _rls: bool) -> MigrateResult<()> {
        db.batch_execute("DELETE FROM plans").await
    }
}

#[tokio::test]
async fn registered_migrations_run_in_place_of_file_contents() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "1-plans.sql", "plans");
    std::fs::write(dir.path().join("2-seed_plans.sql"), "registered in code\n").unwrap();

    let registry = MigrationRegistry::new().register("2", SeedPlans);
    let engine =
        MigrationEngine::with_registry(MigrationConfig::new().migrations_dir(dir.path()), registry);
    let conn = MemoryConnection::initialized();

    engine.migrate(&conn, false).await.unwrap();
    assert_eq!(
        conn.statements(),
        vec![
            "CREATE TABLE plans(id uuid);\n\n".to_string(),
            "INSERT INTO plans(name) VALUES ('free')".to_string(),
            "INSERT INTO plans(name) VALUES ('pro')".to_string(),
        ]
    );

    let seeded = conn
        .records()
        .into_iter()
        .find(|r| r.id == "2")
        .unwrap();
    assert_eq!(seeded.hash, hash_bytes(b"registered in code\n"));

    engine.rollback(&conn, false, false).await.unwrap();
    assert_eq!(conn.statements().last().unwrap(), "DROP TABLE plans;\n");
}

#[tokio::test]
async fn direct_batch_application_shares_one_transaction() {
    let (_dir, engine) = project();
    let conn = MemoryConnection::initialized();
    let files = engine.catalog().list().await.unwrap();

    conn.begin().await.unwrap();
    let batch = engine.apply_forward(&conn, &files, false).await.unwrap();
    assert_eq!(batch, 1);
    assert_eq!(conn.current_batch().await.unwrap(), 1);
    conn.rollback().await.unwrap();

    assert!(conn.records().is_empty());
    assert_eq!(MigrationHistoryRepository::current_batch(&conn).await.unwrap(), 0);
}
