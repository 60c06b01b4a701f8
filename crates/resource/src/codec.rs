//! Generic codec for every resource kind.
//!
//! Decoding runs in two phases: the `kind` discriminator is read first and
//! resolved through the registry, then the whole document is parsed
//! strictly against that kind's schema. Undeclared fields anywhere in the
//! document fail the decode instead of being dropped on the next write.

use serde::Deserialize;

use crate::{
    error::{ResourceError, ResourceResult},
    registry::{Kind, Object},
};

#[derive(Deserialize)]
struct Discriminator {
    #[serde(default)]
    kind: String,
}

/// Decodes a JSON document of any registered kind.
///
/// # Errors
///
/// Returns [`ResourceError::UnknownKind`] if `kind` does not resolve and
/// [`ResourceError::Schema`] if the document is not valid JSON, has no
/// `kind`, or does not fit the kind's schema.
pub fn decode(bytes: &[u8]) -> ResourceResult<Object> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|err| ResourceError::from_json("document", err))?;
    from_value(value)
}

/// Decodes an already-parsed JSON document.
///
/// # Errors
///
/// Same as [`decode`].
pub fn from_value(value: serde_json::Value) -> ResourceResult<Object> {
    let Discriminator { kind } = Discriminator::deserialize(&value)
        .map_err(|err| ResourceError::from_json("kind", err))?;
    if kind.is_empty() {
        return Err(ResourceError::schema("kind is required"));
    }
    let kind = kind.parse::<Kind>()?;
    let mut object = kind.parse(value)?;
    object.canonicalize();
    Ok(object)
}

/// Encodes `object` as JSON.
///
/// # Errors
///
/// Returns [`ResourceError::Schema`] if serialization fails.
pub fn encode(object: &Object) -> ResourceResult<Vec<u8>> {
    serde_json::to_vec(object).map_err(|err| ResourceError::from_json("encode", err))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn kind_is_canonicalized() {
        let object = decode(
            &serde_json::to_vec(&json!({
                "kind": "datacenter",
                "metadata": { "name": "dc1" },
                "spec": { "provider": "aliyun", "privateKey": "k" }
            }))
            .unwrap(),
        )
        .unwrap();
        assert_eq!(object.kind(), Kind::Datacenter);
        assert_eq!(object.declared_kind(), "Datacenter");
    }

    #[test]
    fn missing_kind_is_a_schema_error() {
        let err = from_value(json!({ "metadata": { "name": "x" } })).unwrap_err();
        assert!(matches!(err, ResourceError::Schema { .. }));
    }

    #[test]
    fn non_string_kind_is_a_schema_error() {
        let err = from_value(json!({ "kind": 7 })).unwrap_err();
        assert!(matches!(err, ResourceError::Schema { .. }));
    }

    #[test]
    fn malformed_json_is_a_schema_error() {
        let err = decode(b"{\"kind\":").unwrap_err();
        assert!(matches!(err, ResourceError::Schema { source: Some(_), .. }));
    }

    #[test]
    fn unknown_kind_passes_through() {
        let err = from_value(json!({ "kind": "Widget" })).unwrap_err();
        assert!(err.is_unknown_kind());
    }

    #[test]
    fn nested_unknown_field_is_rejected() {
        let err = from_value(json!({
            "kind": "ContainerRegistry",
            "metadata": { "name": "cr" },
            "spec": { "url": "https://cr.example.com", "auth": { "user": "u", "password": "cA==", "token": "x" } }
        }))
        .unwrap_err();
        assert!(matches!(err, ResourceError::Schema { .. }));
        assert!(err.to_string().contains("token"));
    }
}
