//! Field name escaping for MongoDB compatibility.
//!
//! MongoDB reserves dots for path traversal and a leading dollar sign for
//! operators, and rejects NUL bytes in keys. Document keys are escaped on the
//! way in and restored on the way out; values are stored untouched so that
//! filters on string values need no escaping.

use bson::Bson;

pub(crate) struct FieldSanitizer;

impl FieldSanitizer {
    const REPLACEMENTS: [(&'static str, &'static str); 3] = [
        (".", "__dot__"),
        ("$", "__dollar__"),
        ("\0", "__null__"),
    ];

    pub(crate) fn escape(field: &str) -> String {
        Self::REPLACEMENTS
            .iter()
            .fold(field.to_string(), |escaped, (target, replacement)| {
                escaped.replace(target, replacement)
            })
    }

    pub(crate) fn restore(field: &str) -> String {
        Self::REPLACEMENTS
            .iter()
            .rev()
            .fold(field.to_string(), |restored, (target, replacement)| {
                restored.replace(replacement, target)
            })
    }

    /// Escapes every key of nested documents, recursing through arrays.
    pub(crate) fn escape_keys(value: Bson) -> Bson {
        Self::map_keys(value, Self::escape)
    }

    pub(crate) fn restore_keys(value: Bson) -> Bson {
        Self::map_keys(value, Self::restore)
    }

    fn map_keys(value: Bson, rename: fn(&str) -> String) -> Bson {
        match value {
            Bson::Array(items) => Bson::Array(
                items
                    .into_iter()
                    .map(|item| Self::map_keys(item, rename))
                    .collect(),
            ),
            Bson::Document(document) => Bson::Document(
                document
                    .into_iter()
                    .map(|(key, value)| (rename(&key), Self::map_keys(value, rename)))
                    .collect(),
            ),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn escapes_reserved_characters_in_keys_only() {
        let value = Bson::Document(doc! {
            "a.b": "x.y",
            "nested": { "$price": 1, "list": [{ "c.d": true }] },
        });

        let escaped = FieldSanitizer::escape_keys(value.clone());
        assert_eq!(
            escaped,
            Bson::Document(doc! {
                "a__dot__b": "x.y",
                "nested": { "__dollar__price": 1, "list": [{ "c__dot__d": true }] },
            })
        );
        assert_eq!(FieldSanitizer::restore_keys(escaped), value);
    }

    #[test]
    fn plain_names_are_unchanged() {
        assert_eq!(FieldSanitizer::escape("title"), "title");
        assert_eq!(FieldSanitizer::restore("docRevision"), "docRevision");
    }
}
