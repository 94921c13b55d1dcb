use pgshim_adapter::{
    AdapterOptions, Error, IsolationLevel, MemoryClient, PgAdapter, Queryable, SqlDriverAdapter,
    SqlQuery,
};
use pgshim_errors::{RawBackendError, StructuredError};

fn adapter(client: &MemoryClient) -> PgAdapter<MemoryClient> {
    PgAdapter::new(client.clone(), AdapterOptions::default())
}

#[tokio::test]
async fn test_start_transaction_reserves_and_begins() {
    let client = MemoryClient::new();
    let adapter = adapter(&client);

    let tx = adapter.start_transaction(None).await.unwrap();
    assert!(!tx.options().use_phantom_query);

    let executed = client.executed();
    assert_eq!(client.reservations(), 1);
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].sql, "BEGIN");
    assert_eq!(executed[0].reservation, Some(0));
}

#[tokio::test]
async fn test_isolation_level_is_set_inside_the_transaction() {
    let client = MemoryClient::new();
    let adapter = adapter(&client);

    adapter
        .start_transaction(Some(IsolationLevel::Serializable))
        .await
        .unwrap();

    assert_eq!(
        client.statements(),
        vec!["BEGIN", "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"]
    );
}

#[tokio::test]
async fn test_transaction_queries_use_the_reserved_connection() {
    let client = MemoryClient::new();
    client.respond_with_affected("INSERT", 1);
    let adapter = adapter(&client);

    let tx = adapter.start_transaction(None).await.unwrap();
    let affected = tx
        .execute_raw(&SqlQuery::new("INSERT INTO orders (id) VALUES (1)"))
        .await
        .unwrap();
    assert_eq!(affected, 1);

    adapter.execute_raw(&SqlQuery::new("SELECT 1")).await.unwrap();

    let executed = client.executed();
    assert_eq!(executed[1].reservation, Some(0));
    assert_eq!(executed[2].reservation, None);
}

#[tokio::test]
async fn test_commit_releases_the_connection() {
    let client = MemoryClient::new();
    let adapter = adapter(&client);

    let tx = adapter.start_transaction(None).await.unwrap();
    tx.execute_raw(&SqlQuery::new("COMMIT")).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(client.releases(), 1);
    assert_eq!(client.statements(), vec!["BEGIN", "COMMIT"]);
}

#[tokio::test]
async fn test_rollback_releases_the_connection() {
    let client = MemoryClient::new();
    let adapter = adapter(&client);

    let tx = adapter.start_transaction(None).await.unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(client.releases(), 1);
}

#[tokio::test]
async fn test_finished_transaction_rejects_further_use() {
    let client = MemoryClient::new();
    let adapter = adapter(&client);

    let tx = adapter.start_transaction(None).await.unwrap();
    tx.commit().await.unwrap();

    let err = tx.query_raw(&SqlQuery::new("SELECT 1")).await.unwrap_err();
    assert!(matches!(err, Error::TransactionClosed { .. }));

    let err = tx.rollback().await.unwrap_err();
    assert!(matches!(err, Error::TransactionClosed { .. }));
    assert_eq!(client.releases(), 1);
}

#[tokio::test]
async fn test_failed_begin_releases_and_translates() {
    let client = MemoryClient::new();
    client.fail_with(
        "SET TRANSACTION",
        RawBackendError::new("40001", "could not serialize access", "ERROR"),
    );
    let adapter = adapter(&client);

    let err = adapter
        .start_transaction(Some(IsolationLevel::RepeatableRead))
        .await
        .err().unwrap();

    assert_eq!(err.structured(), Some(&StructuredError::TransactionWriteConflict));
    assert_eq!(client.reservations(), 1);
    assert_eq!(client.releases(), 1);
    assert_eq!(
        client.statements(),
        vec!["BEGIN", "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ", "ROLLBACK"]
    );
    assert_eq!(client.executed()[2].reservation, Some(0));
}

#[tokio::test]
async fn test_failed_rollback_after_failed_begin_keeps_the_begin_error() {
    let client = MemoryClient::new();
    client
        .fail_with(
            "SET TRANSACTION",
            RawBackendError::new("40001", "could not serialize access", "ERROR"),
        )
        .fail_with_fault("ROLLBACK", "connection reset");
    let adapter = adapter(&client);

    let err = adapter
        .start_transaction(Some(IsolationLevel::Serializable))
        .await
        .err().unwrap();

    assert_eq!(err.structured(), Some(&StructuredError::TransactionWriteConflict));
    assert_eq!(client.releases(), 1);
}

#[tokio::test]
async fn test_write_conflict_inside_transaction() {
    let client = MemoryClient::new();
    client.fail_with(
        "UPDATE",
        RawBackendError::new("40001", "could not serialize access", "ERROR"),
    );
    let adapter = adapter(&client);

    let tx = adapter.start_transaction(None).await.unwrap();
    let err = tx
        .execute_raw(&SqlQuery::new("UPDATE accounts SET balance = 0"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(pgshim_errors::ErrorKind::TransactionWriteConflict));
    assert!(tx.rollback().await.is_ok());
}
