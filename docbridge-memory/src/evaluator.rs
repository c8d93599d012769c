//! Filter evaluation against in-memory documents.
//!
//! [`DocumentEvaluator`] walks a compiled query with the core
//! [`QueryVisitor`] and answers whether a single document satisfies every
//! filter. Comparisons use [`Value::compare`], so integers and floats compare
//! numerically and values of unrelated types never match an ordering filter.
//!
//! A filter on a field the document does not have never matches, including
//! `!=`.

use std::cmp::Ordering;

use docbridge_core::{
    document::Document,
    error::DocStoreError,
    query::{Filter, FilterOp, QueryDescriptor, QueryVisitor},
    value::Value,
};

#[derive(Debug, Clone, Copy)]
pub struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `true` if `document` satisfies every filter of `query`.
    pub fn matches(document: &'a Document, query: &QueryDescriptor) -> Result<bool, DocStoreError> {
        Self::new(document).visit_query(query)
    }

    /// Keeps the documents that satisfy `query`, preserving their order.
    pub fn filter_documents<I>(documents: I, query: &QueryDescriptor) -> Result<Vec<Document>, DocStoreError>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut matched = Vec::new();
        for document in documents {
            if DocumentEvaluator::matches(&document, query)? {
                matched.push(document);
            }
        }
        Ok(matched)
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocStoreError;

    fn visit_field(&mut self, field: &str, op: FilterOp, value: &Value) -> Result<bool, DocStoreError> {
        let Some(actual) = self.document.get(field) else {
            return Ok(false);
        };

        let ordering = || actual.compare(value);
        Ok(match op {
            FilterOp::Eq => actual.matches(value),
            FilterOp::Ne => !actual.matches(value),
            FilterOp::Lt => ordering() == Some(Ordering::Less),
            FilterOp::Lte => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Gt => ordering() == Some(Ordering::Greater),
            FilterOp::Gte => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::In => {
                let candidates = value.as_list().ok_or_else(|| {
                    DocStoreError::invalid_argument(format!("`in` filter on {field} needs a list"))
                })?;
                candidates.iter().any(|candidate| actual.matches(candidate))
            }
        })
    }

    fn visit_and(&mut self, filters: &[Filter]) -> Result<bool, DocStoreError> {
        for filter in filters {
            if !self.visit_filter(filter)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use docbridge_core::{
        collection::CollectionDescriptor,
        query::{Query, compile},
    };

    use super::*;

    fn compiled(filters: Vec<Filter>) -> QueryDescriptor {
        let books = Arc::new(
            CollectionDescriptor::builder("books", "title")
                .allow_scans(true)
                .build()
                .unwrap(),
        );
        compile(&books, Query::builder().filters(filters).build()).unwrap()
    }

    fn book() -> Document {
        Document::new()
            .with("title", "YellowBook")
            .with("price", 2)
            .with("rating", 4.5)
            .with("publisher", "Acme")
    }

    #[test]
    fn evaluates_comparisons_across_numeric_types() {
        let doc = book();

        assert!(DocumentEvaluator::matches(&doc, &compiled(vec![Filter::eq("price", 2.0)])).unwrap());
        assert!(DocumentEvaluator::matches(&doc, &compiled(vec![Filter::gt("rating", 4)])).unwrap());
        assert!(DocumentEvaluator::matches(&doc, &compiled(vec![Filter::lte("price", 2)])).unwrap());
        assert!(!DocumentEvaluator::matches(&doc, &compiled(vec![Filter::lt("price", 2)])).unwrap());
    }

    #[test]
    fn all_filters_must_hold() {
        let doc = book();
        let query = compiled(vec![
            Filter::eq("title", "YellowBook"),
            Filter::gte("price", 3),
        ]);
        assert!(!DocumentEvaluator::matches(&doc, &query).unwrap());

        let query = compiled(vec![
            Filter::eq("title", "YellowBook"),
            Filter::is_in("publisher", ["Acme", "Initech"]),
            Filter::ne("price", 5),
        ]);
        assert!(DocumentEvaluator::matches(&doc, &query).unwrap());
    }

    #[test]
    fn missing_fields_and_mismatched_types_do_not_match() {
        let doc = book();

        assert!(!DocumentEvaluator::matches(&doc, &compiled(vec![Filter::ne("isbn", "x")])).unwrap());
        assert!(!DocumentEvaluator::matches(&doc, &compiled(vec![Filter::gt("title", 1)])).unwrap());
        assert!(DocumentEvaluator::matches(&doc, &compiled(vec![Filter::ne("title", 1)])).unwrap());
    }

    #[test]
    fn filter_documents_keeps_order() {
        let docs = vec![
            book().with("title", "A").with("price", 1),
            book().with("title", "B").with("price", 5),
            book().with("title", "C").with("price", 3),
        ];

        let matched = DocumentEvaluator::filter_documents(docs, &compiled(vec![Filter::gt("price", 1)])).unwrap();
        let titles = matched
            .iter()
            .filter_map(|doc| doc.get("title").and_then(Value::as_str))
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["B", "C"]);
    }
}
