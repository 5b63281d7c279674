/// Declarative input validation
///
/// Inputs are validated with `#[derive(Validate)]` attributes on the request
/// structs themselves. [`check`] runs a struct's rules and converts the result
/// into a [`ValidationFailure`] that reports every failing field at once, so
/// callers never fix inputs one rejection at a time.
///
/// # Example
///
/// ```
/// use clavis_core::validate::{self, ValidationFailure};
/// use validator::Validate;
///
/// #[derive(Validate)]
/// struct NewOrg {
///     #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
///     name: String,
/// }
///
/// let result = validate::check(&NewOrg { name: String::new() });
/// assert!(result.is_err());
/// ```
use validator::{Validate, ValidationErrors};

/// A single failed validation rule
#[derive(Debug, Clone, serde::Serialize)]
pub struct FieldError {
    /// Name of the field that failed
    pub field: String,

    /// Human-readable message from the rule
    pub message: String,
}

/// Aggregated validation failure covering every rejected field
#[derive(Debug, Clone, thiserror::Error)]
#[error("Validation failed: {}", summary(.errors))]
pub struct ValidationFailure {
    /// All failed rules, one entry per field/rule pair
    pub errors: Vec<FieldError>,
}

impl ValidationFailure {
    /// Builds a failure for a single field, for rules that cannot be
    /// expressed as derive attributes
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field: field.into(),
                message: message.into(),
            }],
        }
    }
}

impl From<ValidationErrors> for ValidationFailure {
    fn from(errors: ValidationErrors) -> Self {
        let errors = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| FieldError {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        Self { errors }
    }
}

/// Runs a struct's derive-declared rules
///
/// # Errors
///
/// Returns a [`ValidationFailure`] listing every failing field.
pub fn check<T: Validate>(input: &T) -> Result<(), ValidationFailure> {
    input.validate().map_err(ValidationFailure::from)
}

fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Sample {
        #[validate(email(message = "Invalid email format"))]
        email: String,

        #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
        password: String,
    }

    #[test]
    fn test_valid_input_passes() {
        let input = Sample {
            email: "user@example.com".to_string(),
            password: "longenough".to_string(),
        };
        assert!(check(&input).is_ok());
    }

    #[test]
    fn test_all_failures_reported_together() {
        let input = Sample {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
        };

        let failure = check(&input).unwrap_err();
        assert_eq!(failure.errors.len(), 2);

        let fields: Vec<&str> = failure.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"password"));
    }

    #[test]
    fn test_messages_come_from_rules() {
        let input = Sample {
            email: "user@example.com".to_string(),
            password: "short".to_string(),
        };

        let failure = check(&input).unwrap_err();
        assert_eq!(failure.errors[0].message, "Password must be at least 8 characters");
    }

    #[test]
    fn test_single() {
        let failure = ValidationFailure::single("slug", "Slug is already taken");
        assert_eq!(failure.errors.len(), 1);
        assert!(failure.to_string().contains("slug"));
    }
}
