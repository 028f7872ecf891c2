//! Error types for the collection, filter and connection layers.

use thiserror::Error;

/// Infrastructure error raised while talking to a document collection.
///
/// These errors never reach the caller of a checking façade: the evaluator
/// wraps them into a [`crate::Failure`] and hands that to the reporter. They
/// are returned as values only by the lower level pieces (filter encoding,
/// [`crate::DocumentCollection`] implementations, [`crate::connect`]).
#[derive(Error, Debug, Clone)]
pub enum DocAssertError {
    /// The MongoDB driver failed (network, server, command error).
    #[error("driver error: {source}")]
    Driver {
        #[from]
        source: mongodb::error::Error,
    },

    /// A filter value could not be serialized into BSON.
    #[error("BSON encoding error: {message}")]
    Encode {
        message: String,
    },

    /// A filter value serialized into BSON, but not into a document.
    #[error("filter must encode to a BSON document, got {element_type:?}")]
    NotADocument {
        element_type: bson::spec::ElementType,
    },

    /// Failure raised by a non-driver backend, such as an injected fault in
    /// [`crate::MemoryCollection`].
    #[error("backend error: {message}")]
    Backend {
        message: String,
    },
}

impl From<bson::ser::Error> for DocAssertError {
    fn from(source: bson::ser::Error) -> Self {
        Self::Encode {
            message: source.to_string(),
        }
    }
}

/// Result type alias for docassert operations.
pub type Result<T> = std::result::Result<T, DocAssertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = DocAssertError::Backend {
            message: "connection reset".to_owned(),
        };
        assert_eq!(err.to_string(), "backend error: connection reset");
    }

    #[test]
    fn test_not_a_document_display() {
        let err = DocAssertError::NotADocument {
            element_type: bson::spec::ElementType::Int32,
        };
        assert_eq!(
            err.to_string(),
            "filter must encode to a BSON document, got Int32"
        );
    }

    #[test]
    fn test_encode_error_from_bson() {
        let source = bson::to_document(&42_i32).unwrap_err();
        let err = DocAssertError::from(source);
        assert!(matches!(err, DocAssertError::Encode { .. }));
    }
}
