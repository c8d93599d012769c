//! Document actions and action batches.
//!
//! An [`Action`] is one document operation against one collection. An
//! [`ActionBatch`] is an ordered list of actions run together by the
//! [`BatchExecutor`](crate::batch::BatchExecutor); an action's position in
//! the batch is both its dispatch order and the index of its result slot.
//!
//! Every action carries a [`Document`]. For `Get`, `Update` and `Delete` only
//! its key fields (and revision field, if any) are used.

use std::sync::Arc;

use crate::{
    collection::CollectionDescriptor,
    document::Document,
    value::Value,
};

/// A field-level change applied by an update action.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMutation {
    pub field: String,
    pub op: MutationOp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    /// Sets the field, creating it if absent.
    Set(Value),
    /// Adds a number to the field. An absent field counts as zero.
    Increment(Value),
    /// Removes the field if present.
    Remove,
}

impl FieldMutation {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: MutationOp::Set(value.into()),
        }
    }

    pub fn increment(field: impl Into<String>, by: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: MutationOp::Increment(by.into()),
        }
    }

    pub fn remove(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: MutationOp::Remove,
        }
    }
}

/// What an action does.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// Insert only; fails with `AlreadyExists` if the key is taken.
    Create(Document),
    /// Insert or overwrite. Conditional if the document carries a revision.
    Put(Document),
    /// Overwrite an existing document. Conditional if the document carries a
    /// revision.
    Replace(Document),
    /// Read a document, optionally restricted to `projection`.
    Get {
        document: Document,
        projection: Vec<String>,
    },
    /// Apply field mutations to an existing document.
    Update {
        document: Document,
        mutations: Vec<FieldMutation>,
    },
    /// Remove a document. Conditional if the document carries a revision.
    Delete(Document),
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Create(_) => "create",
            ActionKind::Put(_) => "put",
            ActionKind::Replace(_) => "replace",
            ActionKind::Get { .. } => "get",
            ActionKind::Update { .. } => "update",
            ActionKind::Delete(_) => "delete",
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, ActionKind::Get { .. })
    }

    pub fn document(&self) -> &Document {
        match self {
            ActionKind::Create(document)
            | ActionKind::Put(document)
            | ActionKind::Replace(document)
            | ActionKind::Delete(document)
            | ActionKind::Get { document, .. }
            | ActionKind::Update { document, .. } => document,
        }
    }
}

/// A single document operation against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    collection: Arc<CollectionDescriptor>,
    kind: ActionKind,
}

impl Action {
    pub fn new(collection: &Arc<CollectionDescriptor>, kind: ActionKind) -> Self {
        Self {
            collection: collection.clone(),
            kind,
        }
    }

    pub fn create(collection: &Arc<CollectionDescriptor>, document: Document) -> Self {
        Self::new(collection, ActionKind::Create(document))
    }

    pub fn put(collection: &Arc<CollectionDescriptor>, document: Document) -> Self {
        Self::new(collection, ActionKind::Put(document))
    }

    pub fn replace(collection: &Arc<CollectionDescriptor>, document: Document) -> Self {
        Self::new(collection, ActionKind::Replace(document))
    }

    pub fn get(collection: &Arc<CollectionDescriptor>, document: Document) -> Self {
        Self::new(
            collection,
            ActionKind::Get {
                document,
                projection: Vec::new(),
            },
        )
    }

    pub fn update(
        collection: &Arc<CollectionDescriptor>,
        document: Document,
        mutations: Vec<FieldMutation>,
    ) -> Self {
        Self::new(collection, ActionKind::Update { document, mutations })
    }

    pub fn delete(collection: &Arc<CollectionDescriptor>, document: Document) -> Self {
        Self::new(collection, ActionKind::Delete(document))
    }

    /// Restricts a get action to the given fields. Has no effect on other
    /// kinds.
    pub fn with_projection(mut self, fields: Vec<String>) -> Self {
        if let ActionKind::Get { projection, .. } = &mut self.kind {
            *projection = fields;
        }
        self
    }

    pub fn collection(&self) -> &Arc<CollectionDescriptor> {
        &self.collection
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn into_kind(self) -> ActionKind {
        self.kind
    }
}

/// An ordered list of actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionBatch {
    actions: Vec<Action>,
}

impl ActionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Builder-style [`push`](ActionBatch::push).
    pub fn with(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl From<Vec<Action>> for ActionBatch {
    fn from(actions: Vec<Action>) -> Self {
        Self { actions }
    }
}

impl FromIterator<Action> for ActionBatch {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}
