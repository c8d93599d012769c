mod common;

use futures::TryStreamExt;

use docbridge::{
    memory::{DriverOp, InMemoryDriver, InMemoryOptions, codes},
    prelude::*,
};

use common::{book, books, prices, recording_store, strict_books};

async fn seeded(driver: &InMemoryDriver, count: i64) {
    let store = DocumentStore::new(driver.clone());
    let collection = store.collection(books());
    for price in 1..=count {
        collection
            .put(&mut book(&format!("book-{price:02}"), price))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn yellow_book_scenario() {
    let store = DocumentStore::new(InMemoryDriver::new());
    let collection = store.collection(books());

    for (title, price) in [("YellowBook", 1), ("YellowBook", 2), ("BlueBook", 2), ("YellowBook", 3)] {
        collection.create(&mut book(title, price)).await.unwrap();
    }

    let query = Query::builder()
        .filter(Filter::eq("title", "YellowBook"))
        .filter(Filter::gt("price", 1))
        .sort("price", SortDirection::Asc)
        .build();
    let mut results = collection.query(query).unwrap();

    let mut found = Vec::new();
    while results.has_next().await.unwrap() {
        let mut template = Document::new().with("title", "").with("price", 0);
        results.next_into(&mut template).await.unwrap();
        found.push(template);
    }

    assert_eq!(prices(&found), vec![2, 3]);
    assert!(found.iter().all(|doc| doc.get("title") == Some(&Value::from("YellowBook"))));
    assert!(matches!(
        results.next_into(&mut Document::new()).await,
        Err(DocStoreError::IteratorExhausted)
    ));
}

#[tokio::test]
async fn yellow_book_delete_then_requery() {
    let store = DocumentStore::new(InMemoryDriver::new());
    let collection = store.collection(books());
    for price in 1..=4 {
        collection.put(&mut book("YellowBook", price)).await.unwrap();
    }

    let cheap = collection
        .query(
            Query::builder()
                .filter(Filter::lt("price", 3))
                .sort("price", SortDirection::Asc)
                .build(),
        )
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(prices(&cheap), vec![1, 2]);

    collection.delete(&book("YellowBook", 3)).await.unwrap();

    let remaining = collection
        .query(
            Query::builder()
                .filter(Filter::eq("title", "YellowBook"))
                .sort("price", SortDirection::Asc)
                .build(),
        )
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(prices(&remaining), vec![1, 2, 4]);
}

#[tokio::test]
async fn scans_are_rejected_without_driver_calls() {
    let driver = InMemoryDriver::new();
    let store = DocumentStore::new(driver.clone());
    let collection = store.collection(strict_books());

    let err = collection
        .query(Query::builder().filter(Filter::gt("price", 1)).build())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = collection
        .query(Query::builder().filter(Filter::ne("title", "A")).build())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(driver.total_calls(), 0);

    assert!(
        collection
            .query(Query::builder().filter(Filter::eq("title", "A")).build())
            .is_ok()
    );
    assert_eq!(driver.total_calls(), 0);
}

#[tokio::test]
async fn pages_are_fetched_lazily_and_completely() {
    let driver = InMemoryDriver::with_options(InMemoryOptions { page_size: 3 });
    seeded(&driver, 10).await;
    let store = DocumentStore::new(driver.clone());

    let mut results = store
        .collection(books())
        .query(Query::builder().sort("price", SortDirection::Desc).build())
        .unwrap();
    assert_eq!(driver.calls(DriverOp::Query), 0);

    assert!(results.has_next().await.unwrap());
    assert_eq!(results.pages_fetched(), 1);

    let mut seen = Vec::new();
    while let Some(document) = results.next_document().await.unwrap() {
        seen.push(document);
    }

    assert_eq!(prices(&seen), (1..=10).rev().collect::<Vec<_>>());
    assert_eq!(results.pages_fetched(), 4);
    assert_eq!(results.documents_read(), 10);
    assert_eq!(driver.calls(DriverOp::Query), 4);
}

#[tokio::test]
async fn offset_and_limit_span_pages() {
    let driver = InMemoryDriver::new();
    seeded(&driver, 10).await;
    let store = DocumentStore::new(driver.clone());

    let documents = store
        .collection(books())
        .query(
            Query::builder()
                .sort("price", SortDirection::Asc)
                .offset(2)
                .limit(5)
                .page_size(2)
                .build(),
        )
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    assert_eq!(prices(&documents), vec![3, 4, 5, 6, 7]);
    assert_eq!(driver.calls(DriverOp::Query), 3);
}

#[tokio::test]
async fn empty_results_take_one_page() {
    let driver = InMemoryDriver::new();
    let store = DocumentStore::new(driver.clone());

    let mut results = store
        .collection(books())
        .query(Query::builder().filter(Filter::eq("title", "nothing")).build())
        .unwrap();

    assert!(!results.has_next().await.unwrap());
    assert!(!results.has_next().await.unwrap());
    assert_eq!(driver.calls(DriverOp::Query), 1);
}

#[tokio::test]
async fn results_stream() {
    let driver = InMemoryDriver::with_options(InMemoryOptions { page_size: 4 });
    seeded(&driver, 9).await;
    let store = DocumentStore::new(driver);

    let documents = store
        .collection(books())
        .query(Query::builder().filter(Filter::lte("price", 6)).sort("price", SortDirection::Asc).build())
        .unwrap()
        .into_stream()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(prices(&documents), vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn template_types_are_checked() {
    let store = DocumentStore::new(InMemoryDriver::new());
    let collection = store.collection(books());
    collection
        .put(&mut book("A", 1).with("author", "Ann"))
        .await
        .unwrap();

    let mut results = collection.query(Query::new()).unwrap();
    let mut template = book("orig", 0).with("author", 0);
    let err = results.next_into(&mut template).await.unwrap_err();

    assert!(matches!(
        err,
        DocStoreError::TypeMismatch { ref field, expected: "int", found: "string" } if field == "author"
    ));
    assert_eq!(template, book("orig", 0).with("author", 0));
}

#[tokio::test]
async fn page_failures_report_progress() {
    let driver = InMemoryDriver::with_options(InMemoryOptions { page_size: 2 });
    seeded(&driver, 5).await;
    let (store, sleeper) = recording_store(driver.clone(), RetryConfig::no_retry());

    let mut results = store.collection(books()).query(Query::new()).unwrap();
    results.next_document().await.unwrap();
    results.next_document().await.unwrap();

    driver.fail_next(DriverOp::Query, 1, codes::UNAVAILABLE).await;
    let err = results.next_document().await.unwrap_err();

    match err {
        DocStoreError::Query {
            ref collection,
            pages_fetched,
            documents_read,
            ..
        } => {
            assert_eq!(collection, "books");
            assert_eq!(pages_fetched, 1);
            assert_eq!(documents_read, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(sleeper.count(), 0);
}

#[tokio::test]
async fn query_plan_describes_access_path() {
    let store = DocumentStore::new(InMemoryDriver::new());
    let books = books();

    let plan = store
        .query_plan(&books, Query::builder().filter(Filter::eq("title", "A")).build())
        .unwrap();
    assert!(plan.contains("partition lookup"));
}
