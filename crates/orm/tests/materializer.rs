//! Result materialization: batches, typed containers and rollback on bad rows.

mod common;

use common::models::{Author, Book};
use common::{row, MockRow, RecordingPool};
use joinery_orm::{column, DatabaseValue, OrmError, QueryBuilder};

fn book_row(id: i64, author_id: i64, title: &str, author: &str) -> MockRow {
    row([
        ("a_id", DatabaseValue::Int64(id)),
        ("a_author_id", DatabaseValue::Int64(author_id)),
        ("a_title", DatabaseValue::String(title.to_string())),
        ("b_id", DatabaseValue::Int64(author_id)),
        ("b_name", DatabaseValue::String(author.to_string())),
    ])
}

fn books_with_authors() -> QueryBuilder {
    QueryBuilder::new().join::<Book>().join::<Author>()
}

#[tokio::test]
async fn test_write_n_keeps_transaction_open() {
    let pool = RecordingPool::postgres();
    pool.respond_rows(vec![
        book_row(1, 10, "Dune", "Frank"),
        book_row(2, 10, "Children of Dune", "Frank"),
        book_row(3, 11, "Solaris", "Stanislaw"),
    ]);
    let ctx = pool.context();

    let mut results = books_with_authors().results(&ctx).await.unwrap();
    let mut books: Vec<Book> = Vec::new();

    assert_eq!(results.write_n(2, &mut books).await.unwrap(), 2);
    assert_eq!(results.remaining(), 1);
    assert_eq!(pool.commits(), 0);

    assert_eq!(results.write_all_to(&mut books).await.unwrap(), 1);
    assert_eq!(pool.commits(), 1);

    let titles: Vec<&str> = books.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, ["Dune", "Children of Dune", "Solaris"]);
    assert_eq!(books[2].author_id, 11);
}

#[tokio::test]
async fn test_one_row_fills_every_container() {
    let pool = RecordingPool::postgres();
    pool.respond_rows(vec![
        book_row(1, 10, "Dune", "Frank"),
        book_row(3, 11, "Solaris", "Stanislaw"),
    ]);
    let ctx = pool.context();

    let (books, authors): (Vec<Book>, Vec<Author>) = books_with_authors()
        .where_in(column::<Author>("id"), [10i64, 11])
        .fetch(&ctx)
        .await
        .unwrap();

    assert_eq!(books.len(), 2);
    assert_eq!(
        authors,
        vec![
            Author {
                id: Some(10),
                name: "Frank".to_string()
            },
            Author {
                id: Some(11),
                name: "Stanislaw".to_string()
            },
        ]
    );
    // loaded entities count as saved
    assert_eq!(ctx.tracker().len(), 4);
}

#[tokio::test]
async fn test_next_row_streams_entities() {
    let pool = RecordingPool::postgres();
    pool.respond_rows(vec![book_row(1, 10, "Dune", "Frank")]);
    let ctx = pool.context();

    let mut results = books_with_authors().results(&ctx).await.unwrap();
    let mut first = results.next_row().await.unwrap().unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first.take::<Author>().unwrap().name, "Frank");
    assert!(!first.contains::<Author>());
    assert!(first.take::<Book>().is_some());

    assert!(results.next_row().await.unwrap().is_none());
    results.close().await.unwrap();
    assert_eq!(pool.commits(), 1);
}

#[tokio::test]
async fn test_unknown_column_rolls_back() {
    let pool = RecordingPool::postgres();
    pool.respond_rows(vec![row([
        ("a_id", DatabaseValue::Int64(1)),
        ("a_isbn", DatabaseValue::String("x".into())),
    ])]);
    let ctx = pool.context();

    let mut books = vec![Book::default()];
    let results = QueryBuilder::new().join::<Book>().results(&ctx).await.unwrap();
    let err = results.write_all_to(&mut books).await.unwrap_err();

    assert!(matches!(err, OrmError::Materialization(_)));
    assert_eq!(books, vec![Book::default()]);
    assert_eq!((pool.commits(), pool.rollbacks()), (0, 1));
}

#[tokio::test]
async fn test_failed_batch_leaves_destination_untouched() {
    let pool = RecordingPool::postgres();
    let bad = row([
        ("a_id", DatabaseValue::Int64(2)),
        ("a_author_id", DatabaseValue::Int64(10)),
        ("a_title", DatabaseValue::Int64(99)),
    ]);
    pool.respond_rows(vec![
        row([
            ("a_id", DatabaseValue::Int64(1)),
            ("a_author_id", DatabaseValue::Int64(10)),
            ("a_title", DatabaseValue::String("Dune".into())),
        ]),
        bad,
    ]);
    let ctx = pool.context();

    let mut results = QueryBuilder::new().join::<Book>().results(&ctx).await.unwrap();
    let mut books: Vec<Book> = Vec::new();
    let err = results.write_n(2, &mut books).await.unwrap_err();

    match err {
        OrmError::Materialization(message) => assert!(message.contains("Book.title")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(books.is_empty());
    assert_eq!(pool.rollbacks(), 1);
    // the good first row is not remembered either
    assert!(ctx.tracker().is_empty());

    // the cursor is spent after a rollback
    assert!(results.next_row().await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_drain_records_nothing() {
    let pool = RecordingPool::postgres();
    pool.respond_rows(vec![
        book_row(1, 10, "Dune", "Frank"),
        row([
            ("a_id", DatabaseValue::Int64(2)),
            ("a_author_id", DatabaseValue::String("ten".into())),
            ("a_title", DatabaseValue::String("Solaris".into())),
            ("b_id", DatabaseValue::Int64(11)),
            ("b_name", DatabaseValue::String("Stanislaw".into())),
        ]),
    ]);
    let ctx = pool.context();

    let mut books: Vec<Book> = Vec::new();
    let results = books_with_authors().results(&ctx).await.unwrap();
    assert!(results.write_all_to(&mut books).await.is_err());

    assert!(books.is_empty());
    assert!(ctx.tracker().is_empty());
    assert_eq!((pool.commits(), pool.rollbacks()), (0, 1));
}

#[tokio::test]
async fn test_missing_entity_for_container() {
    let pool = RecordingPool::postgres();
    pool.respond_rows(vec![row([
        ("a_id", DatabaseValue::Int64(1)),
        ("a_author_id", DatabaseValue::Int64(10)),
        ("a_title", DatabaseValue::String("Dune".into())),
    ])]);
    let ctx = pool.context();

    let err = books_with_authors()
        .fetch::<(Vec<Book>, Vec<Author>)>(&ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Materialization(_)));
    assert_eq!(pool.rollbacks(), 1);
}
