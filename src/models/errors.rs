use thiserror::Error;

/// Service-level errors that can occur in business logic
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("User already exists")]
    UserAlreadyExists { user_id: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Invalid pagination cursor")]
    InvalidCursor,

    #[error("Invalid UserId or Password")]
    InvalidCredentials,

    #[error("User account is not confirmed")]
    AccountNotConfirmed,

    #[error("Invalid confirmation code")]
    InvalidConfirmationCode,

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Concurrent modification of {entity}, please retry")]
    ConcurrentModification { entity: &'static str },

    /// Storage failure. Only `message` is ever shown to clients.
    #[error("{message}")]
    Storage {
        message: &'static str,
        #[source]
        source: RepositoryError,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Repository-level errors for data access operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database connection failed")]
    ConnectionFailed,

    #[error("Item not found")]
    NotFound,

    #[error("Item already exists")]
    AlreadyExists,

    #[error("Conditional check failed")]
    ConditionFailed,

    #[error("AWS SDK error: {message}")]
    AwsSdk { message: String },

    #[error("DynamoDB table not found: {table_name}. Ensure the table exists and IAM permissions are correct.")]
    TableNotFound { table_name: String },

    #[error("Invalid item: {message}")]
    InvalidItem { message: String },

    #[error("Timeout occurred during operation")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Validation errors for input data
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredField { field: String },

    #[error("Field too long: {field}, max_length={max_length}, actual_length={actual_length}")]
    TooLong {
        field: String,
        max_length: usize,
        actual_length: usize,
    },

    #[error("Field too short: {field}, min_length={min_length}, actual_length={actual_length}")]
    TooShort {
        field: String,
        min_length: usize,
        actual_length: usize,
    },

    #[error("Invalid format: {field}, expected={expected}")]
    InvalidFormat { field: String, expected: String },

    #[error("Value out of range: {field}, min={min}, max={max}, value={value}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
        value: String,
    },
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::ValidationError {
            message: err.to_string(),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type alias for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;
