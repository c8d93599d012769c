//! Translation of compiled queries into MongoDB filter documents.

use bson::{Bson, Document, doc};

use docbridge_core::{
    error::DocStoreError,
    query::{Filter, FilterOp, QueryVisitor},
    value::Value,
};

use crate::sanitizer::FieldSanitizer;

/// Builds a MongoDB filter document from a query's filters.
pub(crate) struct MongoFilterTranslator;

impl QueryVisitor for MongoFilterTranslator {
    type Output = Document;
    type Error = DocStoreError;

    fn visit_and(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error> {
        match filters {
            [] => Ok(doc! {}),
            [filter] => self.visit_filter(filter),
            _ => Ok(doc! {
                "$and": filters
                    .iter()
                    .map(|filter| self.visit_filter(filter))
                    .collect::<Result<Vec<_>, _>>()?,
            }),
        }
    }

    fn visit_field(&mut self, field: &str, op: FilterOp, value: &Value) -> Result<Self::Output, Self::Error> {
        let operand = Bson::from(value);
        let field = FieldSanitizer::escape(field);

        let condition = match op {
            FilterOp::Eq => doc! { "$eq": operand },
            FilterOp::Ne => doc! { "$ne": operand, "$exists": true },
            FilterOp::Gt => doc! { "$gt": operand },
            FilterOp::Gte => doc! { "$gte": operand },
            FilterOp::Lt => doc! { "$lt": operand },
            FilterOp::Lte => doc! { "$lte": operand },
            FilterOp::In => match operand {
                Bson::Array(items) => doc! { "$in": items },
                _ => return Err(DocStoreError::invalid_argument(format!("`in` filter on {field} needs a list"))),
            },
        };

        Ok(doc! { field: condition })
    }
}
