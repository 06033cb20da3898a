// Re-export all model types
pub use self::comment::*;
pub use self::draft::*;
pub use self::errors::*;
pub use self::pagination::*;
pub use self::profile::*;
pub use self::review::*;
pub use self::user::*;
pub use self::validation::*;

mod comment;
mod draft;
mod errors;
mod pagination;
mod profile;
mod review;
mod user;
mod validation;
