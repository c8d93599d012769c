//! Lazy, forward-only iteration over query results.
//!
//! A [`DocumentIterator`] owns a compiled query and pulls backend pages on
//! demand, following the driver's continuation tokens until none is
//! returned. Pagination is invisible to the caller. Each page fetch goes
//! through the retry engine; a fetch that still fails surfaces as
//! [`DocStoreError::Query`] annotated with how far iteration got.
//!
//! Result order matches the query's sort. Without a sort it is whatever the
//! driver produces, which differs between backends.
//!
//! An iterator is not restartable and takes `&mut self` to advance, so it
//! cannot be driven from two places at once.
//!
//! # Example
//!
//! ```ignore
//! let mut results = collection.query(query)?;
//! while results.has_next().await? {
//!     let mut book = Document::new().with("title", "").with("price", 0);
//!     results.next_into(&mut book).await?;
//! }
//! ```

use std::collections::VecDeque;

use futures::{Stream, stream};

use crate::{
    document::Document,
    driver::DocumentDriver,
    error::{DocStoreError, DocStoreResult},
    page::PageToken,
    query::QueryDescriptor,
    retry::RetryEngine,
};

#[derive(Debug)]
pub struct DocumentIterator<'a, D: DocumentDriver> {
    driver: &'a D,
    retry: &'a RetryEngine,
    query: QueryDescriptor,
    buffer: VecDeque<Document>,
    next_token: Option<PageToken>,
    started: bool,
    remaining: Option<usize>,
    pages_fetched: usize,
    documents_read: usize,
}

impl<'a, D: DocumentDriver> DocumentIterator<'a, D> {
    pub fn new(driver: &'a D, retry: &'a RetryEngine, query: QueryDescriptor) -> Self {
        let remaining = query.limit();
        Self {
            driver,
            retry,
            query,
            buffer: VecDeque::new(),
            next_token: None,
            started: false,
            remaining,
            pages_fetched: 0,
            documents_read: 0,
        }
    }

    pub fn query(&self) -> &QueryDescriptor {
        &self.query
    }

    /// Backend pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Documents handed to the caller so far.
    pub fn documents_read(&self) -> usize {
        self.documents_read
    }

    /// Returns `true` if another document is available, fetching pages as
    /// needed. Empty pages that carry a continuation token are skipped.
    pub async fn has_next(&mut self) -> DocStoreResult<bool> {
        loop {
            if self.remaining == Some(0) {
                return Ok(false);
            }
            if !self.buffer.is_empty() {
                return Ok(true);
            }
            if self.started && self.next_token.is_none() {
                return Ok(false);
            }
            self.fetch_page().await?;
        }
    }

    /// Decodes the next document into `template`.
    ///
    /// See [`Document::populate_from`] for the decoding rules.
    ///
    /// # Errors
    ///
    /// [`DocStoreError::IteratorExhausted`] if no documents remain,
    /// [`DocStoreError::TypeMismatch`] if a stored value does not fit the
    /// template, or [`DocStoreError::Query`] if a page fetch failed.
    pub async fn next_into(&mut self, template: &mut Document) -> DocStoreResult<()> {
        let document = self
            .next_document()
            .await?
            .ok_or(DocStoreError::IteratorExhausted)?;
        template.populate_from(document)
    }

    /// Returns the next document, or `None` once the results are exhausted.
    pub async fn next_document(&mut self) -> DocStoreResult<Option<Document>> {
        if !self.has_next().await? {
            return Ok(None);
        }
        let document = self.buffer.pop_front();
        if document.is_some() {
            self.documents_read += 1;
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
        }
        Ok(document)
    }

    /// Drains the remaining results into a vector.
    pub async fn collect_all(mut self) -> DocStoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        while let Some(document) = self.next_document().await? {
            documents.push(document);
        }
        Ok(documents)
    }

    /// Converts this iterator into a [`Stream`] of documents.
    pub fn into_stream(self) -> impl Stream<Item = DocStoreResult<Document>> + 'a {
        stream::try_unfold(self, |mut iterator| async move {
            let next = iterator.next_document().await?;
            Ok::<_, DocStoreError>(next.map(|document| (document, iterator)))
        })
    }

    async fn fetch_page(&mut self) -> DocStoreResult<()> {
        let driver = self.driver;
        let query = &self.query;
        let token = self.next_token.as_ref();

        tracing::debug!(
            collection = query.collection().name(),
            page = self.pages_fetched + 1,
            token = ?token.map(PageToken::as_str),
            "fetching page"
        );

        let page = self
            .retry
            .run(|| async move {
                driver
                    .run_query(query, token)
                    .await
                    .map_err(|e| driver.to_store_error(e))
            })
            .await
            .map_err(|error| DocStoreError::Query {
                collection: query.collection().name().to_string(),
                pages_fetched: self.pages_fetched,
                documents_read: self.documents_read,
                source: Box::new(error),
            })?;

        self.started = true;
        self.pages_fetched += 1;
        self.next_token = page.next_token;
        self.buffer.extend(page.documents);
        Ok(())
    }
}
