//! Validation Utilities
//!
//! Runs `validator` derives on request payloads and flattens their errors into
//! a single client-facing message.

use validator::{Validate, ValidationErrors};

use crate::utils::error::{IdentityError, IdentityResult};

/// Validate a request payload, converting failures into `IdentityError::Validation`
pub fn validate_request<T: Validate>(request: &T) -> IdentityResult<()> {
    request
        .validate()
        .map_err(|e| IdentityError::Validation(format_validation_errors(&e)))
}

/// Join field errors as `field: message` pairs, sorted by field name
pub fn format_validation_errors(err: &ValidationErrors) -> String {
    let mut messages = Vec::new();

    for (field, errors) in err.field_errors() {
        for error in errors {
            let message = error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("invalid value for field '{}'", field));
            messages.push(format!("{}: {}", field, message));
        }
    }

    messages.sort();
    messages.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(email(message = "must be a valid email"))]
        email: String,
        #[validate(length(min = 1, max = 5, message = "must be 1-5 characters"))]
        name: String,
    }

    #[test]
    fn test_valid_request_passes() {
        let probe = Probe {
            email: "a@example.com".to_string(),
            name: "alice".to_string(),
        };
        assert!(validate_request(&probe).is_ok());
    }

    #[test]
    fn test_messages_are_joined_by_field() {
        let probe = Probe {
            email: "nope".to_string(),
            name: "far too long".to_string(),
        };
        match validate_request(&probe) {
            Err(IdentityError::Validation(msg)) => {
                assert_eq!(msg, "email: must be a valid email, name: must be 1-5 characters");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
