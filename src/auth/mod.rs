// Authentication: bearer tokens, password hashing, confirmation codes

pub mod confirmation;
pub mod middleware;
pub mod password;
pub mod token;

pub use confirmation::{generate_confirmation_code, CodeDelivery, LoggingCodeDelivery};
pub use middleware::{require_auth, AuthenticatedUser};
pub use password::{hash_password, verify_password};
pub use token::{AuthError, Claims, TokenIssuer};
