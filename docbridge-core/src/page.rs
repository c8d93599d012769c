//! Backend result pages and continuation tokens.
//!
//! Drivers answer each query call with one [`QueryPage`]: a batch of
//! documents plus an optional [`PageToken`] to resume from. Callers never
//! see either; the [`DocumentIterator`](crate::iterator::DocumentIterator)
//! follows tokens until the driver stops returning one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    document::Document,
    error::{DocStoreError, DocStoreResult},
};

/// Opaque continuation token issued by a driver.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageToken(String);

impl PageToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// A token encoding a plain result offset, for drivers that page by
    /// skipping.
    pub fn from_offset(offset: usize) -> Self {
        Self(offset.to_string())
    }

    /// Decodes a token produced by [`PageToken::from_offset`].
    pub fn to_offset(&self) -> DocStoreResult<usize> {
        self.0.parse().map_err(|_| {
            DocStoreError::invalid_argument(format!("malformed page token {:?}", self.0))
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single page of query results.
///
/// # Example
///
/// ```ignore
/// use docbridge::page::{PageToken, QueryPage};
///
/// let page = QueryPage::builder(documents)
///     .with_next_token(Some(PageToken::from_offset(20)))
///     .build();
///
/// assert!(page.has_more());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub documents: Vec<Document>,
    /// Token for the next page, `None` on the last page.
    pub next_token: Option<PageToken>,
}

impl QueryPage {
    pub fn builder(documents: Vec<Document>) -> QueryPageBuilder {
        QueryPageBuilder::new(documents)
    }

    /// A final page holding no documents.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_more(&self) -> bool {
        self.next_token.is_some()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Builder for [`QueryPage`].
pub struct QueryPageBuilder {
    documents: Vec<Document>,
    next_token: Option<PageToken>,
}

impl QueryPageBuilder {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            next_token: None,
        }
    }

    pub fn with_next_token(mut self, next_token: Option<PageToken>) -> Self {
        self.next_token = next_token;
        self
    }

    pub fn build(self) -> QueryPage {
        QueryPage {
            documents: self.documents,
            next_token: self.next_token,
        }
    }
}
