// Repositories module - data access layer

mod dynamodb;

pub mod comment_repository;
pub mod draft_repository;
pub mod memory;
pub mod profile_repository;
pub mod review_repository;
pub mod table_manager;
pub mod user_repository;

pub use comment_repository::{CommentRepository, DynamoDbCommentRepository};
pub use draft_repository::{DraftRepository, DynamoDbDraftRepository};
pub use memory::InMemoryStore;
pub use profile_repository::{DynamoDbProfileRepository, ProfileRepository};
pub use review_repository::{DynamoDbReviewRepository, ReviewRepository};
pub use table_manager::{TableManager, TableNames, TableProvisioner};
pub use user_repository::{DynamoDbUserRepository, UserRepository};
