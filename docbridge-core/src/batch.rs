//! The action batch executor.
//!
//! [`BatchExecutor::run`] validates a whole [`ActionBatch`] up front, then
//! dispatches its actions in the order supplied, each through the retry
//! engine. Every action gets exactly one result slot at its own index. A
//! failed action does not stop the batch unless fail-fast is enabled, in
//! which case the remaining undispatched actions are marked
//! [`SlotResult::Skipped`].
//!
//! Whether a `Get` observes a write made by an earlier action in the same
//! batch depends on the driver. Callers that need read-your-writes should
//! split the batch.

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::{
    action::{Action, ActionBatch, ActionKind, FieldMutation},
    collection::CollectionDescriptor,
    document::{Document, DocumentKey, RevisionToken},
    driver::{DocumentDriver, WriteCondition},
    error::{DocStoreError, DocStoreResult},
    retry::RetryEngine,
};

/// Executor behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Stop dispatching after the first failed action.
    pub fail_fast: bool,
    /// Dispatch runs of consecutive gets concurrently.
    pub concurrent_gets: bool,
}

impl BatchOptions {
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_concurrent_gets(mut self, concurrent_gets: bool) -> Self {
        self.concurrent_gets = concurrent_gets;
        self
    }
}

/// What a successful action produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutput {
    /// A create, put, replace or update; holds the new revision.
    Written(RevisionToken),
    /// A get; holds the stored document.
    Fetched(Document),
    Deleted,
}

impl ActionOutput {
    pub fn revision(&self) -> Option<&RevisionToken> {
        match self {
            ActionOutput::Written(revision) => Some(revision),
            _ => None,
        }
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            ActionOutput::Fetched(document) => Some(document),
            _ => None,
        }
    }
}

/// Outcome of one action.
#[derive(Debug)]
pub enum SlotResult {
    Succeeded(ActionOutput),
    /// Always a [`DocStoreError::Action`] carrying the slot's index.
    Failed(DocStoreError),
    /// Not dispatched because an earlier action failed in fail-fast mode.
    Skipped,
}

impl SlotResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SlotResult::Succeeded(_))
    }

    pub fn output(&self) -> Option<&ActionOutput> {
        match self {
            SlotResult::Succeeded(output) => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&DocStoreError> {
        match self {
            SlotResult::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Per-action outcomes of a batch, one slot per submitted action, in
/// submission order.
#[derive(Debug)]
pub struct BatchResult {
    slots: Vec<SlotResult>,
}

impl BatchResult {
    pub fn slots(&self) -> &[SlotResult] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&SlotResult> {
        self.slots.get(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// `true` if every action succeeded.
    pub fn is_success(&self) -> bool {
        self.slots.iter().all(SlotResult::is_success)
    }

    /// Failed slots as `(index, error)` pairs.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &DocStoreError)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.error().map(|error| (index, error)))
    }

    pub fn revision(&self, index: usize) -> Option<&RevisionToken> {
        self.get(index)
            .and_then(SlotResult::output)
            .and_then(ActionOutput::revision)
    }

    pub fn document(&self, index: usize) -> Option<&Document> {
        self.get(index)
            .and_then(SlotResult::output)
            .and_then(ActionOutput::document)
    }

    /// Returns every output if all actions succeeded, otherwise the first
    /// failure.
    pub fn into_result(self) -> DocStoreResult<Vec<ActionOutput>> {
        let mut outputs = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.into_iter().enumerate() {
            match slot {
                SlotResult::Succeeded(output) => outputs.push(output),
                SlotResult::Failed(error) => return Err(error),
                SlotResult::Skipped => {
                    return Err(DocStoreError::invalid_argument(format!(
                        "action {index} was skipped"
                    )));
                }
            }
        }
        Ok(outputs)
    }

    pub fn into_slots(self) -> Vec<SlotResult> {
        self.slots
    }
}

/// A validated action, ready for the driver.
#[derive(Debug)]
enum Dispatch {
    Write {
        document: Document,
        condition: WriteCondition,
    },
    Get {
        key: DocumentKey,
        projection: Vec<String>,
    },
    Update {
        key: DocumentKey,
        mutations: Vec<FieldMutation>,
        condition: WriteCondition,
    },
    Delete {
        key: DocumentKey,
        condition: WriteCondition,
    },
}

impl Dispatch {
    fn name(&self) -> &'static str {
        match self {
            Dispatch::Write { .. } => "write",
            Dispatch::Get { .. } => "get",
            Dispatch::Update { .. } => "update",
            Dispatch::Delete { .. } => "delete",
        }
    }
}

/// Runs action batches against a driver.
#[derive(Debug)]
pub struct BatchExecutor<'a, D: DocumentDriver> {
    driver: &'a D,
    retry: &'a RetryEngine,
    options: BatchOptions,
}

impl<'a, D: DocumentDriver> BatchExecutor<'a, D> {
    pub fn new(driver: &'a D, retry: &'a RetryEngine, options: BatchOptions) -> Self {
        Self {
            driver,
            retry,
            options,
        }
    }

    pub fn options(&self) -> BatchOptions {
        self.options
    }

    /// Validates and runs `batch`.
    ///
    /// # Errors
    ///
    /// Validation failures are returned before anything is dispatched: an
    /// empty batch, actions against different collections, a document
    /// missing a key field, a create carrying a revision, or an update that
    /// is empty or touches a key or revision field. Per-action validation
    /// errors are wrapped in [`DocStoreError::Action`]. Driver failures never
    /// surface here; they are stored in the action's slot.
    pub async fn run(&self, batch: ActionBatch) -> DocStoreResult<BatchResult> {
        let actions = batch.into_actions();
        let Some(first) = actions.first() else {
            return Err(DocStoreError::invalid_argument("batch must contain at least one action"));
        };
        let collection = first.collection().clone();

        let mut prepared = Vec::with_capacity(actions.len());
        for (index, action) in actions.into_iter().enumerate() {
            if action.collection().as_ref() != collection.as_ref() {
                return Err(DocStoreError::invalid_argument(format!(
                    "action {index} targets collection {} but the batch targets {}",
                    action.collection().name(),
                    collection.name()
                )));
            }
            prepared.push(prepare(&collection, action).map_err(|error| {
                DocStoreError::Action {
                    index,
                    source: Box::new(error),
                }
            })?);
        }

        tracing::debug!(
            collection = collection.name(),
            actions = prepared.len(),
            fail_fast = self.options.fail_fast,
            "running batch"
        );

        let mut slots = Vec::with_capacity(prepared.len());
        let mut index = 0;
        let mut failed = false;

        while index < prepared.len() && !failed {
            let run_end = if self.options.concurrent_gets {
                prepared[index..]
                    .iter()
                    .position(|dispatch| !matches!(dispatch, Dispatch::Get { .. }))
                    .map_or(prepared.len(), |offset| index + offset)
                    .max(index + 1)
            } else {
                index + 1
            };

            let outcomes = if run_end - index > 1 {
                join_all(
                    prepared[index..run_end]
                        .iter()
                        .enumerate()
                        .map(|(offset, dispatch)| self.dispatch(&collection, index + offset, dispatch)),
                )
                .await
            } else {
                vec![self.dispatch(&collection, index, &prepared[index]).await]
            };

            for outcome in outcomes {
                failed |= !outcome.is_success();
                slots.push(outcome);
            }
            failed &= self.options.fail_fast;
            index = run_end;
        }

        slots.resize_with(prepared.len(), || SlotResult::Skipped);
        Ok(BatchResult { slots })
    }

    async fn dispatch(
        &self,
        collection: &CollectionDescriptor,
        index: usize,
        dispatch: &Dispatch,
    ) -> SlotResult {
        tracing::debug!(
            collection = collection.name(),
            index,
            action = dispatch.name(),
            "dispatching action"
        );

        let driver = self.driver;
        let outcome = match dispatch {
            Dispatch::Write { document, condition } => self
                .retry
                .run(|| {
                    let document = document.clone();
                    let condition = condition.clone();
                    async move {
                        driver
                            .put_document(collection, document, condition)
                            .await
                            .map_err(|e| driver.to_store_error(e))
                    }
                })
                .await
                .map(ActionOutput::Written),
            Dispatch::Get { key, projection } => self
                .retry
                .run(|| async move {
                    driver
                        .get_document(collection, key, projection)
                        .await
                        .map_err(|e| driver.to_store_error(e))
                })
                .await
                .map(ActionOutput::Fetched),
            Dispatch::Update {
                key,
                mutations,
                condition,
            } => self
                .retry
                .run(|| {
                    let condition = condition.clone();
                    async move {
                        driver
                            .update_document(collection, key, mutations, condition)
                            .await
                            .map_err(|e| driver.to_store_error(e))
                    }
                })
                .await
                .map(ActionOutput::Written),
            Dispatch::Delete { key, condition } => self
                .retry
                .run(|| {
                    let condition = condition.clone();
                    async move {
                        driver
                            .delete_document(collection, key, condition)
                            .await
                            .map_err(|e| driver.to_store_error(e))
                    }
                })
                .await
                .map(|()| ActionOutput::Deleted),
        };

        match outcome {
            Ok(output) => SlotResult::Succeeded(output),
            Err(error) => {
                tracing::warn!(
                    collection = collection.name(),
                    index,
                    action = dispatch.name(),
                    kind = %error.kind(),
                    error = %error,
                    "action failed"
                );
                SlotResult::Failed(DocStoreError::Action {
                    index,
                    source: Box::new(error),
                })
            }
        }
    }
}

/// Checks one action against its collection and derives what to send.
fn prepare(collection: &CollectionDescriptor, action: Action) -> DocStoreResult<Dispatch> {
    let revision_field = collection.revision_field();

    match action.into_kind() {
        ActionKind::Create(mut document) => {
            collection.key_of(&document)?;
            if document.revision(collection).is_some() {
                return Err(DocStoreError::invalid_argument(format!(
                    "create must not carry a value in revision field {revision_field}"
                )));
            }
            document.remove(revision_field);
            Ok(Dispatch::Write {
                document,
                condition: WriteCondition::MustNotExist,
            })
        }
        ActionKind::Put(mut document) => {
            collection.key_of(&document)?;
            let revision = document.revision(collection);
            document.remove(revision_field);
            Ok(Dispatch::Write {
                document,
                condition: WriteCondition::from_revision(revision, WriteCondition::Unconditional),
            })
        }
        ActionKind::Replace(mut document) => {
            collection.key_of(&document)?;
            let revision = document.revision(collection);
            document.remove(revision_field);
            Ok(Dispatch::Write {
                document,
                condition: WriteCondition::from_revision(revision, WriteCondition::MustExist),
            })
        }
        ActionKind::Get {
            document,
            projection,
        } => Ok(Dispatch::Get {
            key: collection.key_of(&document)?,
            projection,
        }),
        ActionKind::Update {
            document,
            mutations,
        } => {
            let key = collection.key_of(&document)?;
            if mutations.is_empty() {
                return Err(DocStoreError::invalid_argument("update must carry at least one mutation"));
            }
            if let Some(mutation) = mutations.iter().find(|m| {
                m.field.is_empty() || collection.is_key_field(&m.field) || m.field == revision_field
            }) {
                return Err(DocStoreError::invalid_argument(format!(
                    "update must not modify field {:?}: key and revision fields are immutable",
                    mutation.field
                )));
            }
            Ok(Dispatch::Update {
                key,
                mutations,
                condition: WriteCondition::from_revision(
                    document.revision(collection),
                    WriteCondition::MustExist,
                ),
            })
        }
        ActionKind::Delete(document) => Ok(Dispatch::Delete {
            key: collection.key_of(&document)?,
            condition: WriteCondition::from_revision(
                document.revision(collection),
                WriteCondition::Unconditional,
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;

    fn books() -> Arc<CollectionDescriptor> {
        Arc::new(
            CollectionDescriptor::builder("books", "title")
                .sort_key("price")
                .build()
                .unwrap(),
        )
    }

    fn book(price: i64) -> Document {
        Document::new()
            .with("title", "YellowBook")
            .with("price", price)
    }

    #[test]
    fn put_with_revision_is_conditional() {
        let books = books();
        let document = book(1).with(books.revision_field(), "r1");

        let Dispatch::Write { document, condition } = prepare(&books, Action::put(&books, document)).unwrap() else {
            panic!("expected a write");
        };
        assert_eq!(condition, WriteCondition::RevisionMatches(RevisionToken::new("r1")));
        assert!(!document.contains(books.revision_field()));
    }

    #[test]
    fn write_conditions_follow_action_kind() {
        let books = books();
        let cases = [
            (Action::put(&books, book(1)), WriteCondition::Unconditional),
            (Action::create(&books, book(1)), WriteCondition::MustNotExist),
            (Action::replace(&books, book(1)), WriteCondition::MustExist),
        ];

        for (action, expected) in cases {
            match prepare(&books, action).unwrap() {
                Dispatch::Write { condition, .. } => assert_eq!(condition, expected),
                other => panic!("unexpected dispatch {other:?}"),
            }
        }
    }

    #[test]
    fn create_rejects_a_revision() {
        let books = books();
        let document = book(1).with(books.revision_field(), "r1");
        assert!(prepare(&books, Action::create(&books, document)).is_err());
    }

    #[test]
    fn update_rejects_key_and_revision_mutations() {
        let books = books();
        for field in ["title", "price", "docRevision", ""] {
            let action = Action::update(&books, book(1), vec![FieldMutation::set(field, 1)]);
            let err = prepare(&books, action).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }

        let empty = Action::update(&books, book(1), Vec::new());
        assert!(prepare(&books, empty).is_err());
    }

    #[test]
    fn missing_key_fields_are_rejected() {
        let books = books();
        let document = Document::new().with("title", "YellowBook");
        assert!(prepare(&books, Action::delete(&books, document)).is_err());
    }

    #[test]
    fn into_result_returns_the_first_failure() {
        let result = BatchResult {
            slots: vec![
                SlotResult::Succeeded(ActionOutput::Deleted),
                SlotResult::Failed(DocStoreError::Action {
                    index: 1,
                    source: Box::new(DocStoreError::invalid_argument("bad")),
                }),
                SlotResult::Skipped,
            ],
        };

        assert!(!result.is_success());
        assert_eq!(result.failures().map(|(i, _)| i).collect::<Vec<_>>(), vec![1]);
        assert!(matches!(
            result.into_result(),
            Err(DocStoreError::Action { index: 1, .. })
        ));
    }
}
