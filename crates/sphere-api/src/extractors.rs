//! # Request Decoding
//!
//! Handlers take `Result<Json<T>, JsonRejection>` and pass it through these
//! helpers, so a malformed body becomes a 400 in the standard error envelope
//! and a rule violation (negative contract id) a 422.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Checks a decoded body cannot express through its types.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Unwrap a JSON body. Rejections become [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// [`extract_json`], then [`Validate::validate`].
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Parse an id from a path segment or form field.
pub fn parse_id(field: &str, raw: &str) -> Result<uuid::Uuid, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("{field} must be a UUID, got \"{raw}\"")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Positive(i64);

    impl Validate for Positive {
        fn validate(&self) -> Result<(), String> {
            if self.0 < 0 {
                return Err("must be non-negative".into());
            }
            Ok(())
        }
    }

    #[test]
    fn validated_json_passes_good_value() {
        let v = extract_validated_json(Ok(Json(Positive(3)))).unwrap();
        assert_eq!(v.0, 3);
    }

    #[test]
    fn validated_json_maps_rule_failure_to_validation() {
        let err = extract_validated_json(Ok(Json(Positive(-1)))).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m.contains("non-negative")));
    }

    #[test]
    fn parse_id_names_the_field() {
        let err = parse_id("user_id", "abc").unwrap_err();
        assert!(err.to_string().contains("user_id"));
        assert!(parse_id("user_id", &uuid::Uuid::new_v4().to_string()).is_ok());
    }
}
