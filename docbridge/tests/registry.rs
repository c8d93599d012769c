mod common;

use docbridge::{
    memory::{InMemoryDriver, InMemoryOptions},
    prelude::*,
};

use common::{book, books, prices};

#[tokio::test]
async fn stores_are_built_from_configuration() {
    let registry = docbridge::default_registry();
    assert!(registry.contains("memory"));

    let config = DriverConfig::from_json(
        r#"{
            "provider_id": "memory",
            "retry": { "mode": "fixed", "fixed_delay_millis": 5, "max_attempts": 2 },
            "batch": { "fail_fast": true },
            "options": { "page_size": 2 }
        }"#,
    )
    .unwrap();

    let store = DocumentStore::from_config(&registry, &config).await.unwrap();
    assert_eq!(store.provider_id(), "memory");
    assert!(store.batch_options().fail_fast);
    assert_eq!(store.retry_engine().config().max_attempts, 2);

    let memory = store
        .driver()
        .as_any()
        .downcast_ref::<InMemoryDriver>()
        .unwrap();
    assert_eq!(memory.options(), &InMemoryOptions { page_size: 2 });

    let collection = store.collection(books());
    for price in 1..=5 {
        collection.put(&mut book("A", price)).await.unwrap();
    }
    let documents = collection
        .query(Query::builder().filter(Filter::eq("title", "A")).build())
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(prices(&documents), vec![1, 2, 3, 4, 5]);

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_providers_fail() {
    let registry = docbridge::default_registry();
    let err = DocumentStore::from_config(&registry, &DriverConfig::new("cassandra"))
        .await
        .unwrap_err();

    assert!(matches!(err, DocStoreError::UnknownProvider(ref id) if id == "cassandra"));
}

#[tokio::test]
async fn bad_provider_options_are_reported() {
    let registry = docbridge::default_registry();
    let config = DriverConfig::new("memory")
        .with_options(&serde_json::json!({ "page_size": "many" }))
        .unwrap();

    let err = DocumentStore::from_config(&registry, &config).await.unwrap_err();
    assert!(matches!(err, DocStoreError::Serialization(_)));
}

#[tokio::test]
async fn documents_round_trip_through_json() {
    let store = DocumentStore::new(InMemoryDriver::new());
    let collection = store.collection(books());

    let mut document = Document::from_json(serde_json::json!({
        "title": "YellowBook",
        "price": 2,
        "tags": ["fiction", "yellow"],
        "meta": { "pages": 320, "rating": 4.5 },
    }))
    .unwrap();
    collection.create(&mut document).await.unwrap();

    let fetched = collection
        .get_by_key(&DocumentKey::new("YellowBook").with_sort(2))
        .await
        .unwrap();
    let json = fetched.to_json().unwrap();

    assert_eq!(json["tags"][1], "yellow");
    assert_eq!(json["meta"]["pages"], 320);
    assert_eq!(json["docRevision"], serde_json::Value::from(document.get("docRevision").and_then(Value::as_str).unwrap()));
}
