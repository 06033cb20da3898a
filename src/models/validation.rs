use rust_decimal::Decimal;

use super::{
    CreateCommentRequest, CreateDraftRequest, CreateReviewRequest, CredentialsRequest,
    ValidationError, ValidationResult,
};

/// Trait for validating input models
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

/// Validation constants
pub const MAX_USER_ID_LENGTH: usize = 64;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 72; // bcrypt ignores anything past 72 bytes
pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_CONTENT_LENGTH: usize = 10_000;
pub const MAX_COMMENT_LENGTH: usize = 2_000;
pub const MAX_IMAGE_URL_LENGTH: usize = 2_048;
pub const MIN_RATE: Decimal = Decimal::ZERO;
pub const MAX_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

impl Validate for CredentialsRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_user_id(&self.user_id)?;
        validate_password(&self.password)?;
        Ok(())
    }
}

impl Validate for CreateReviewRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_user_id(&self.author)?;
        validate_required_text("title", &self.title, MAX_TITLE_LENGTH)?;
        validate_required_text("content", &self.content, MAX_CONTENT_LENGTH)?;
        validate_rate(&self.rate)?;
        validate_image_url(self.image_url.as_deref())?;
        Ok(())
    }
}

impl Validate for CreateCommentRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_user_id(&self.author)?;
        validate_required_text("content", &self.content, MAX_COMMENT_LENGTH)?;
        Ok(())
    }
}

impl Validate for CreateDraftRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_user_id(&self.author)?;
        // Drafts may be saved half-written, so only upper bounds apply.
        validate_max_length("title", &self.title, MAX_TITLE_LENGTH)?;
        validate_max_length("content", &self.content, MAX_CONTENT_LENGTH)?;
        if let Some(rate) = &self.rate {
            validate_rate(rate)?;
        }
        validate_image_url(self.image_url.as_deref())?;
        Ok(())
    }
}

/// Validate a user identifier (also used for review/comment/draft authors)
pub fn validate_user_id(user_id: &str) -> ValidationResult<()> {
    let trimmed = user_id.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "UserId".to_string(),
        });
    }

    if trimmed.len() != user_id.len() {
        return Err(ValidationError::InvalidFormat {
            field: "UserId".to_string(),
            expected: "no leading or trailing whitespace".to_string(),
        });
    }

    if user_id.len() > MAX_USER_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: "UserId".to_string(),
            max_length: MAX_USER_ID_LENGTH,
            actual_length: user_id.len(),
        });
    }

    if user_id.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat {
            field: "UserId".to_string(),
            expected: "printable characters".to_string(),
        });
    }

    Ok(())
}

/// Validate a password before hashing
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "Password".to_string(),
        });
    }

    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "Password".to_string(),
            min_length: MIN_PASSWORD_LENGTH,
            actual_length: password.len(),
        });
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong {
            field: "Password".to_string(),
            max_length: MAX_PASSWORD_LENGTH,
            actual_length: password.len(),
        });
    }

    Ok(())
}

/// Validate a rating on the 0 to 5 scale
pub fn validate_rate(rate: &Decimal) -> ValidationResult<()> {
    if *rate < MIN_RATE || *rate > MAX_RATE {
        return Err(ValidationError::OutOfRange {
            field: "rate".to_string(),
            min: MIN_RATE.to_string(),
            max: MAX_RATE.to_string(),
            value: rate.to_string(),
        });
    }

    Ok(())
}

fn validate_required_text(field: &str, value: &str, max_length: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredField {
            field: field.to_string(),
        });
    }

    validate_max_length(field, value, max_length)
}

fn validate_max_length(field: &str, value: &str, max_length: usize) -> ValidationResult<()> {
    let length = value.chars().count();
    if length > max_length {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max_length,
            actual_length: length,
        });
    }

    Ok(())
}

fn validate_image_url(image_url: Option<&str>) -> ValidationResult<()> {
    let Some(url) = image_url else {
        return Ok(());
    };

    if url.len() > MAX_IMAGE_URL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "imageUrl".to_string(),
            max_length: MAX_IMAGE_URL_LENGTH,
            actual_length: url.len(),
        });
    }

    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ValidationError::InvalidFormat {
            field: "imageUrl".to_string(),
            expected: "http(s) URL".to_string(),
        });
    }

    Ok(())
}
