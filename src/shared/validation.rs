//! Validation Utilities

use validator::{Validate, ValidationErrors};

use super::error::{AppError, FieldError};

/// Convert validation errors to AppError
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut field_errors: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();
    field_errors.sort_by(|a, b| a.field.cmp(&b.field));

    let message = field_errors
        .first()
        .map(|e| format!("{}: {}", e.field, e.message))
        .unwrap_or_else(|| "Validation failed".into());

    AppError::Validation {
        message,
        errors: field_errors,
    }
}

/// Run `validator` rules on a request body.
pub fn validate<T: Validate>(value: &T) -> Result<(), AppError> {
    value.validate().map_err(validation_error)
}

/// Iranian national code (کد ملی): ten digits, last digit is a mod-11 check digit.
pub fn is_valid_national_code(code: &str) -> bool {
    if code.len() != 10 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = code.bytes().map(|b| (b - b'0') as u32).collect();

    // All-identical codes pass the checksum but are never issued.
    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let sum: u32 = digits[..9]
        .iter()
        .enumerate()
        .map(|(i, d)| d * (10 - i as u32))
        .sum();
    let remainder = sum % 11;
    let check = digits[9];

    if remainder < 2 {
        check == remainder
    } else {
        check == 11 - remainder
    }
}

/// Legal-entity national id (شناسه ملی): eleven digits.
pub fn is_valid_company_national_id(id: &str) -> bool {
    id.len() == 11 && id.bytes().all(|b| b.is_ascii_digit())
}

/// `validator` custom hook for national codes.
pub fn national_code(code: &str) -> Result<(), validator::ValidationError> {
    if is_valid_national_code(code) {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("national_code");
        err.message = Some("Invalid national code".into());
        Err(err)
    }
}

/// `validator` custom hook for company national ids.
pub fn company_national_id(id: &str) -> Result<(), validator::ValidationError> {
    if is_valid_company_national_id(id) {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("national_id");
        err.message = Some("National id must be 11 digits".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("0499370899", true ; "valid code")]
    #[test_case("0790419904", true ; "another valid code")]
    #[test_case("1234567891", true ; "remainder below two")]
    #[test_case("0499370898", false ; "wrong check digit")]
    #[test_case("1111111111", false ; "repeated digit")]
    #[test_case("049937089", false ; "too short")]
    #[test_case("04993708a9", false ; "non digit")]
    fn test_national_code(code: &str, expected: bool) {
        assert_eq!(is_valid_national_code(code), expected);
    }

    #[test]
    fn test_company_national_id() {
        assert!(is_valid_company_national_id("10101234567"));
        assert!(!is_valid_company_national_id("1010123456"));
        assert!(!is_valid_company_national_id("1010123456x"));
    }
}
