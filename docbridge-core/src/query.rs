//! Query construction and compilation.
//!
//! A [`Query`] is a conjunction of [`Filter`]s plus an optional sort, limit,
//! offset and page size hint. [`compile`] checks it against a
//! [`CollectionDescriptor`] and produces a backend-neutral
//! [`QueryDescriptor`], which drivers translate through a [`QueryVisitor`].
//!
//! # Example
//!
//! ```ignore
//! use docbridge::query::{compile, Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("title", "YellowBook"))
//!     .filter(Filter::lt("price", 3))
//!     .sort("price", SortDirection::Asc)
//!     .limit(10)
//!     .build();
//!
//! let descriptor = compile(&books, query)?;
//! ```
//!
//! Filters are always ANDed together. Their declaration order is preserved
//! in the descriptor; drivers may use it as an evaluation-order hint but it
//! never changes which documents match. Without a sort the result order is
//! defined by the driver.

use std::{fmt, sync::Arc};

use crate::{
    collection::CollectionDescriptor,
    error::{DocStoreError, DocStoreResult},
    value::Value,
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest values first.
    Asc,
    /// Largest values first.
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// Name of the field to sort by.
    pub field: String,
    /// Direction of the sort.
    pub direction: SortDirection,
}

/// Comparison operators for filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Equal to.
    Eq,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// The field equals one of the values of a list.
    In,
    /// Not equal to. A document without the field never matches.
    Ne,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::In => "in",
            FilterOp::Ne => "!=",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single predicate: `field op value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Name of the field the predicate tests.
    pub field: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Operand; a list for [`FilterOp::In`].
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Gte, value)
    }

    /// Matches documents whose field equals any of `values`.
    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(field, FilterOp::In, values.into_iter().collect::<Value>())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:?}", self.field, self.op, self.value)
    }
}

/// An uncompiled query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Preferred number of documents per backend page.
    pub page_size: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter. Filters are ANDed in declaration order.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.query.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.query.filters.extend(filters);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.query.page_size = Some(page_size);
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// A compiled, backend-neutral query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    collection: Arc<CollectionDescriptor>,
    filters: Vec<Filter>,
    sort: Option<Sort>,
    limit: Option<usize>,
    offset: Option<usize>,
    page_size: Option<usize>,
}

impl QueryDescriptor {
    /// The collection the query runs against.
    pub fn collection(&self) -> &CollectionDescriptor {
        &self.collection
    }

    /// Filters in declaration order.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// The requested sort, if any.
    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    /// Maximum number of results across all pages.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Number of leading results to skip.
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// Page size hint; drivers fall back to their own default.
    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    /// The value of the first equality filter on the partition key, if any.
    pub fn partition_equality(&self) -> Option<&Value> {
        let partition_key = self.collection.partition_key();
        self.filters
            .iter()
            .find(|filter| filter.op == FilterOp::Eq && filter.field == partition_key)
            .map(|filter| &filter.value)
    }
}

/// Compiles `query` against `collection`.
///
/// # Errors
///
/// Fails with [`DocStoreError::InvalidArgument`] when a filter names an empty
/// field, an `In` filter's value is not a list, the page size is zero, or the
/// collection forbids scans and no filter pins the partition key with `Eq`.
/// Nothing is sent to a driver in any of these cases.
pub fn compile(
    collection: &Arc<CollectionDescriptor>,
    query: Query,
) -> DocStoreResult<QueryDescriptor> {
    for filter in &query.filters {
        if filter.field.is_empty() {
            return Err(DocStoreError::invalid_argument("filter field name must not be empty"));
        }
        if filter.op == FilterOp::In && filter.value.as_list().is_none() {
            return Err(DocStoreError::invalid_argument(format!(
                "filter on {} uses `in` with a {} value; a list is required",
                filter.field,
                filter.value.type_name()
            )));
        }
    }
    if let Some(sort) = &query.sort {
        if sort.field.is_empty() {
            return Err(DocStoreError::invalid_argument("sort field name must not be empty"));
        }
    }
    if query.page_size == Some(0) {
        return Err(DocStoreError::invalid_argument("page size must be at least 1"));
    }

    let descriptor = QueryDescriptor {
        collection: collection.clone(),
        filters: query.filters,
        sort: query.sort,
        limit: query.limit,
        offset: query.offset,
        page_size: query.page_size,
    };

    if !collection.allow_scans() && descriptor.partition_equality().is_none() {
        return Err(DocStoreError::invalid_argument(format!(
            "collection {} does not allow scans; add an equality filter on {}",
            collection.name(),
            collection.partition_key()
        )));
    }

    tracing::debug!(
        collection = collection.name(),
        filters = descriptor.filters.len(),
        limit = ?descriptor.limit,
        "compiled query"
    );

    Ok(descriptor)
}

/// Walks a compiled query's filters.
///
/// Drivers implement this to translate filters into their native predicate
/// language, or to evaluate them directly.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocStoreError>;

    fn visit_field(
        &mut self,
        field: &str,
        op: FilterOp,
        value: &Value,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_and(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error>;

    fn visit_filter(&mut self, filter: &Filter) -> Result<Self::Output, Self::Error> {
        self.visit_field(&filter.field, filter.op, &filter.value)
    }

    fn visit_query(&mut self, query: &QueryDescriptor) -> Result<Self::Output, Self::Error> {
        self.visit_and(query.filters())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn books(allow_scans: bool) -> Arc<CollectionDescriptor> {
        Arc::new(
            CollectionDescriptor::builder("books", "title")
                .allow_scans(allow_scans)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn preserves_filter_order() {
        let query = Query::builder()
            .filter(Filter::gt("price", 1))
            .filter(Filter::eq("title", "YellowBook"))
            .filter(Filter::ne("publisher", "Acme"))
            .build();

        let descriptor = compile(&books(false), query).unwrap();
        let fields = descriptor
            .filters()
            .iter()
            .map(|f| f.field.as_str())
            .collect::<Vec<_>>();

        assert_eq!(fields, vec!["price", "title", "publisher"]);
        assert_eq!(descriptor.partition_equality(), Some(&Value::from("YellowBook")));
    }

    #[test]
    fn rejects_scans_when_not_allowed() {
        let query = Query::builder()
            .filter(Filter::lt("price", 3))
            .build();
        let err = compile(&books(false), query.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        assert!(compile(&books(true), query).is_ok());
    }

    #[test]
    fn partition_key_needs_equality() {
        let query = Query::builder()
            .filter(Filter::gte("title", "Y"))
            .build();

        assert!(compile(&books(false), query).is_err());
    }

    #[test]
    fn in_requires_a_list() {
        let bad = Query::builder()
            .filter(Filter::new("price", FilterOp::In, 3))
            .build();
        assert!(compile(&books(true), bad).is_err());

        let good = Query::builder()
            .filter(Filter::is_in("price", [1, 2]))
            .build();
        assert!(compile(&books(true), good).is_ok());
    }

    #[test]
    fn rejects_zero_page_size() {
        let query = Query::builder().page_size(0).build();
        assert!(compile(&books(true), query).is_err());
    }
}
