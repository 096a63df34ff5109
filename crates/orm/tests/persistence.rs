//! Insert/update/delete through a context, transaction scoping and driver
//! error translation.

mod common;

use common::models::{Author, Book, Lock, Tag};
use common::{row, RecordingPool, Response};
use joinery_orm::{CrudOperations, DatabaseValue, NamedArg, OrmError};

fn author(name: &str) -> Author {
    Author {
        id: None,
        name: name.to_string(),
    }
}

#[tokio::test]
async fn test_postgres_insert_scans_returning_key() {
    let pool = RecordingPool::postgres();
    pool.respond_rows(vec![row([("id", DatabaseValue::Int64(5))])]);
    let ctx = pool.context();

    let mut ann = author("ann");
    ann.insert(&ctx).await.unwrap();

    assert_eq!(ann.id, Some(5));
    let statements = pool.statements();
    assert_eq!(statements[0].sql, "INSERT INTO authors (name) VALUES ($1) RETURNING id");
    assert_eq!(statements[0].params, vec![DatabaseValue::String("ann".into())]);
    assert_eq!(pool.commits(), 1);
    assert_eq!(ctx.tracker().len(), 1);
}

#[tokio::test]
async fn test_mysql_insert_reads_last_insert_id() {
    let pool = RecordingPool::mysql();
    pool.respond(Response::Affected(1))
        .respond_rows(vec![row([("LAST_INSERT_ID()", DatabaseValue::Int64(9))])]);
    let ctx = pool.context();

    let mut book = Book {
        id: None,
        author_id: 3,
        title: "Dune".to_string(),
    };
    book.insert(&ctx).await.unwrap();

    assert_eq!(book.id, Some(9));
    assert_eq!(
        pool.sql(),
        vec![
            "INSERT INTO books (author_id, title) VALUES (?, ?)".to_string(),
            "SELECT LAST_INSERT_ID()".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_application_id_is_generated_before_insert() {
    let pool = RecordingPool::postgres();
    let ctx = pool.context();

    let mut tag = Tag {
        id: None,
        label: "rust".to_string(),
    };
    tag.insert(&ctx).await.unwrap();

    assert_eq!(tag.id.as_deref(), Some("tag-rust"));
    let statements = pool.statements();
    assert_eq!(statements[0].sql, "INSERT INTO tags (id, label) VALUES ($1, $2)");
    assert_eq!(statements[0].params[0], DatabaseValue::String("tag-rust".into()));
}

#[tokio::test]
async fn test_update_writes_only_changed_columns() {
    let pool = RecordingPool::postgres();
    pool.respond_rows(vec![row([("id", DatabaseValue::Int64(1))])]);
    let ctx = pool.context();

    let mut ann = author("ann");
    ann.save(&ctx).await.unwrap();

    // unchanged since insert
    ann.update(&ctx).await.unwrap();
    assert_eq!(pool.statements().len(), 1);

    ann.name = "anne".to_string();
    ann.save(&ctx).await.unwrap();

    let statements = pool.statements();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[1].sql, "UPDATE authors SET name = $1 WHERE id = $2");
    assert_eq!(
        statements[1].params,
        vec![DatabaseValue::String("anne".into()), DatabaseValue::Int64(1)]
    );

    // the tracker now holds the new state
    ann.update(&ctx).await.unwrap();
    assert_eq!(pool.statements().len(), 2);
}

#[tokio::test]
async fn test_update_keeps_set_and_key_values_apart() {
    let pool = RecordingPool::postgres();
    let ctx = pool.context();

    let mut lock = Lock {
        id: Some(1),
        key_id: 99,
    };
    lock.update(&ctx).await.unwrap();

    let statements = pool.statements();
    assert_eq!(statements[0].sql, "UPDATE locks SET key_id = $1 WHERE id = $2");
    assert_eq!(
        statements[0].params,
        vec![DatabaseValue::Int64(99), DatabaseValue::Int64(1)]
    );
}

#[tokio::test]
async fn test_update_requires_primary_key() {
    let pool = RecordingPool::postgres();
    let ctx = pool.context();

    let mut ann = author("ann");
    assert!(matches!(ann.update(&ctx).await, Err(OrmError::MissingPrimaryKey)));
    assert!(pool.statements().is_empty());
}

#[tokio::test]
async fn test_delete_forgets_tracked_entity() {
    let pool = RecordingPool::postgres();
    pool.respond_rows(vec![row([("id", DatabaseValue::Int64(4))])])
        .respond(Response::Affected(1));
    let ctx = pool.context();

    let mut ann = author("ann");
    ann.insert(&ctx).await.unwrap();
    assert_eq!(ann.delete(&ctx).await.unwrap(), 1);

    assert_eq!(pool.sql()[1], "DELETE FROM authors WHERE id = $1");
    assert!(ctx.tracker().is_empty());
}

#[tokio::test]
async fn test_duplicate_entry_rolls_back() {
    let pool = RecordingPool::postgres();
    pool.respond(Response::Fail(
        "duplicate key value violates unique constraint \"authors_name_key\"".to_string(),
    ));
    let ctx = pool.context();

    let mut ann = author("ann");
    let err = ann.insert(&ctx).await.unwrap_err();

    assert!(err.is_duplicate_entry());
    assert_eq!(ann.id, None);
    assert_eq!(pool.commits(), 0);
    assert_eq!(pool.rollbacks(), 1);
    assert!(ctx.tracker().is_empty());
}

#[tokio::test]
async fn test_mysql_duplicate_entry_translation() {
    let pool = RecordingPool::mysql();
    pool.respond(Response::Fail(
        "error 1062 (23000): Duplicate entry 'rust' for key 'tags.PRIMARY'".to_string(),
    ));
    let ctx = pool.context();

    let mut tag = Tag {
        id: Some("rust".to_string()),
        label: "rust".to_string(),
    };
    assert!(tag.insert(&ctx).await.unwrap_err().is_duplicate_entry());
}

#[tokio::test]
async fn test_find_by_id() {
    let pool = RecordingPool::postgres();
    pool.respond_rows(vec![row([
        ("a_id", DatabaseValue::Int64(2)),
        ("a_name", DatabaseValue::String("bo".into())),
    ])]);
    let ctx = pool.context();

    let found = Author::find_by_id(&ctx, 2i64).await.unwrap();
    assert_eq!(
        found,
        Author {
            id: Some(2),
            name: "bo".to_string()
        }
    );
    assert_eq!(
        pool.sql()[0],
        "SELECT a.id AS a_id, a.name AS a_name FROM authors a WHERE (a.id = $1) LIMIT 1"
    );

    let missing = Author::find_by_id(&ctx, 3i64).await.unwrap_err();
    assert!(missing.is_no_rows());
}

#[tokio::test]
async fn test_transaction_commits_on_success() {
    let pool = RecordingPool::postgres();
    pool.respond(Response::Affected(3));
    let ctx = pool.context();

    let affected = ctx
        .transaction(|tx| {
            Box::pin(async move {
                let args = [NamedArg::new("id", 1i64)];
                tx.execute("DELETE FROM books WHERE author_id = :id", &args).await
            })
        })
        .await
        .unwrap();

    assert_eq!(affected, 3);
    assert_eq!(pool.sql(), vec!["DELETE FROM books WHERE author_id = $1".to_string()]);
    assert_eq!((pool.commits(), pool.rollbacks()), (1, 0));
}

#[tokio::test]
async fn test_transaction_rolls_back_on_error() {
    let pool = RecordingPool::postgres();
    let ctx = pool.context();

    let result: Result<(), OrmError> = ctx
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute("DELETE FROM books", &[]).await?;
                Err::<(), _>(OrmError::Query("stop".to_string()))
            })
        })
        .await;

    assert!(matches!(result, Err(OrmError::Query(_))));
    assert_eq!((pool.commits(), pool.rollbacks()), (0, 1));
}

#[tokio::test]
async fn test_transaction_rolls_back_on_panic() {
    let pool = RecordingPool::postgres();
    let ctx = pool.context();

    let result: Result<(), OrmError> = ctx
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute("DELETE FROM books", &[]).await?;
                if tx.is_active() {
                    panic!("boom");
                }
                Ok::<(), OrmError>(())
            })
        })
        .await;

    match result {
        Err(OrmError::Transaction(message)) => assert!(message.contains("boom")),
        other => panic!("expected a transaction error, got {other:?}"),
    }
    assert_eq!((pool.commits(), pool.rollbacks()), (0, 1));
}
