#![allow(dead_code)]

use std::sync::Arc;

use docbridge::{memory::InMemoryDriver, prelude::*};

pub fn books() -> Arc<CollectionDescriptor> {
    Arc::new(
        CollectionDescriptor::builder("books", "title")
            .sort_key("price")
            .allow_scans(true)
            .build()
            .unwrap(),
    )
}

pub fn strict_books() -> Arc<CollectionDescriptor> {
    Arc::new(
        CollectionDescriptor::builder("books", "title")
            .sort_key("price")
            .build()
            .unwrap(),
    )
}

pub fn book(title: &str, price: i64) -> Document {
    Document::new().with("title", title).with("price", price)
}

/// A store over `driver` whose retries are recorded rather than slept.
pub fn recording_store(
    driver: InMemoryDriver,
    retry: RetryConfig,
) -> (DocumentStore<InMemoryDriver>, RecordingSleeper) {
    let sleeper = RecordingSleeper::new();
    let store = DocumentStore::builder(driver)
        .with_retry(retry)
        .with_sleeper(Arc::new(sleeper.clone()))
        .build();
    (store, sleeper)
}

pub fn prices(documents: &[Document]) -> Vec<i64> {
    documents
        .iter()
        .filter_map(|document| document.get("price").and_then(Value::as_i64))
        .collect()
}
