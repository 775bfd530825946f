//! Error type shared by every encoder and decoder.

use std::fmt::Display;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while converting between protobuf messages and JSON.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input does not follow the grammar of the target type.
    #[error("{target}: {message}")]
    Format { target: String, message: String },

    /// A numeric value does not fit the target kind.
    #[error("{target}: {message}")]
    Range { target: String, message: String },

    /// The value breaks a rule that spans several fields.
    #[error("{target}: {message}")]
    Consistency { target: String, message: String },

    /// A string scalar holds bytes that are not valid UTF-8.
    #[error("{target}: invalid UTF-8 in string")]
    InvalidUtf8 { target: String },

    /// An `Any` type URL could not be resolved to a message type.
    #[error("unable to resolve {url:?}: {reason}")]
    Unresolved { url: String, reason: String },

    /// The JSON token stream is malformed.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// A key does not name any field of the message.
    #[error("{message}: found unknown field: {field}")]
    UnknownField { message: String, field: String },

    /// A value cannot be represented in JSON.
    #[error("unsupported value: {0}")]
    Unsupported(String),

    /// An error raised by the encoder or decoder of a named field.
    #[error("{field}: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Decode(#[from] prost::DecodeError),
}

impl Error {
    pub fn format(target: impl Display, message: impl Display) -> Self {
        Error::Format {
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    pub fn range(target: impl Display, message: impl Display) -> Self {
        Error::Range {
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    pub fn consistency(target: impl Display, message: impl Display) -> Self {
        Error::Consistency {
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    pub fn invalid_utf8(target: impl Display) -> Self {
        Error::InvalidUtf8 {
            target: target.to_string(),
        }
    }

    pub fn syntax(offset: usize, message: impl Display) -> Self {
        Error::Syntax {
            offset,
            message: message.to_string(),
        }
    }

    /// Wrap the error with the name of the field being processed.
    pub fn in_field(self, field: impl Display) -> Self {
        Error::Field {
            field: field.to_string(),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = Error::format("google.protobuf.Any", "missing \"@type\" field");
        assert_eq!(
            err.to_string(),
            "google.protobuf.Any: missing \"@type\" field"
        );

        let err = Error::range("int32", "exceed range").in_field("i32");
        assert_eq!(err.to_string(), "i32: int32: exceed range");

        let err = Error::UnknownField {
            message: "test.v1.Message".into(),
            field: "name".into(),
        };
        assert_eq!(
            err.to_string(),
            "test.v1.Message: found unknown field: name"
        );
    }
}
