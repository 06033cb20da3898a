use std::sync::Arc;
use tracing::instrument;

use super::store_error;
use crate::auth::{
    generate_confirmation_code, hash_password, verify_password, CodeDelivery, TokenIssuer,
};
use crate::models::{
    validate_user_id, CredentialsRequest, RepositoryError, ServiceError, ServiceResult, User,
    UserSummary, Validate,
};
use crate::repositories::UserRepository;

/// Knobs for account handling, taken from `AuthConfig`
#[derive(Debug, Clone, Copy)]
pub struct UserServiceSettings {
    pub password_hash_cost: u32,
    pub require_confirmation: bool,
}

impl Default for UserServiceSettings {
    fn default() -> Self {
        Self {
            password_hash_cost: bcrypt::DEFAULT_COST,
            require_confirmation: true,
        }
    }
}

/// Service for accounts: registration, confirmation and login
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    tokens: Arc<TokenIssuer>,
    code_delivery: Arc<dyn CodeDelivery>,
    settings: UserServiceSettings,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        tokens: Arc<TokenIssuer>,
        code_delivery: Arc<dyn CodeDelivery>,
        settings: UserServiceSettings,
    ) -> Self {
        Self {
            repository,
            tokens,
            code_delivery,
            settings,
        }
    }

    /// Every user, without password hashes
    #[instrument(skip(self))]
    pub async fn get_all_users(&self) -> ServiceResult<Vec<UserSummary>> {
        let users = self
            .repository
            .find_all()
            .await
            .map_err(store_error("Could not fetch users"))?;

        crate::info_with_trace!("Fetched {} users", users.len());
        Ok(users.iter().map(User::to_summary).collect())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn check_user_exists(&self, user_id: &str) -> ServiceResult<bool> {
        let user = self
            .repository
            .find_by_id(user_id)
            .await
            .map_err(store_error("Could not check user"))?;
        Ok(user.is_some())
    }

    /// Create the account and its empty profile.
    ///
    /// With confirmation enabled the account starts unconfirmed and a code
    /// is sent through `CodeDelivery`.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn register_user(&self, request: CredentialsRequest) -> ServiceResult<()> {
        crate::info_with_trace!("Registering user");

        request.validate()?;

        let password_hash = hash_password(&request.password, self.settings.password_hash_cost).await?;
        let confirmation_code = self
            .settings
            .require_confirmation
            .then(generate_confirmation_code);

        let user = User {
            user_id: request.user_id.clone(),
            password_hash,
            confirmed: !self.settings.require_confirmation,
            confirmation_code: confirmation_code.clone(),
        };

        match self.repository.create_with_profile(user).await {
            Ok(()) => {}
            Err(RepositoryError::AlreadyExists) => {
                crate::warn_with_trace!("User already exists");
                return Err(ServiceError::UserAlreadyExists {
                    user_id: request.user_id,
                });
            }
            Err(e) => return Err(store_error("Could not register user")(e)),
        }

        if let Some(code) = confirmation_code {
            self.send_code(&request.user_id, &code).await;
        }

        crate::info_with_trace!("User registered");
        Ok(())
    }

    /// Mark the account confirmed when `code` matches the pending code
    #[instrument(skip(self, code), fields(user_id = %user_id))]
    pub async fn confirm_registration(&self, user_id: &str, code: &str) -> ServiceResult<()> {
        validate_user_id(user_id)?;

        match self.repository.confirm(user_id, code.trim()).await {
            Ok(()) => {
                crate::info_with_trace!("User confirmed");
                Ok(())
            }
            Err(RepositoryError::ConditionFailed) => {
                if self.check_user_exists(user_id).await? {
                    crate::warn_with_trace!("Confirmation code mismatch");
                    Err(ServiceError::InvalidConfirmationCode)
                } else {
                    Err(ServiceError::NotFound {
                        entity: "User",
                        id: user_id.to_string(),
                    })
                }
            }
            Err(e) => Err(store_error("Could not confirm user")(e)),
        }
    }

    /// Replace the pending code with a fresh one and send it
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn resend_confirmation(&self, user_id: &str) -> ServiceResult<()> {
        validate_user_id(user_id)?;

        let user = self
            .repository
            .find_by_id(user_id)
            .await
            .map_err(store_error("Could not resend confirmation code"))?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "User",
                id: user_id.to_string(),
            })?;

        if user.confirmed {
            return Err(ServiceError::ValidationError {
                message: "User is already confirmed".to_string(),
            });
        }

        let code = generate_confirmation_code();
        match self.repository.set_confirmation_code(user_id, &code).await {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => {
                return Err(ServiceError::NotFound {
                    entity: "User",
                    id: user_id.to_string(),
                })
            }
            Err(e) => return Err(store_error("Could not resend confirmation code")(e)),
        }

        self.send_code(user_id, &code).await;
        Ok(())
    }

    /// Check the credentials and return a signed bearer token
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn login_user(&self, request: CredentialsRequest) -> ServiceResult<String> {
        validate_user_id(&request.user_id)?;

        let user = self
            .repository
            .find_by_id(&request.user_id)
            .await
            .map_err(store_error("Could not log in"))?;

        let Some(user) = user else {
            crate::warn_with_trace!("Login for unknown user");
            return Err(ServiceError::InvalidCredentials);
        };

        if !verify_password(&request.password, &user.password_hash).await? {
            crate::warn_with_trace!("Login with wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        if self.settings.require_confirmation && !user.confirmed {
            return Err(ServiceError::AccountNotConfirmed);
        }

        let token = self.tokens.issue(&user.user_id).map_err(|e| {
            crate::error_with_trace!(error = %e, "Failed to issue token");
            ServiceError::Internal {
                message: "Could not issue token".to_string(),
            }
        })?;

        crate::info_with_trace!("User logged in");
        Ok(token)
    }

    /// A failed delivery does not undo the write; the user can ask again.
    async fn send_code(&self, user_id: &str, code: &str) {
        if let Err(e) = self.code_delivery.deliver(user_id, code).await {
            crate::warn_with_trace!(error = %e, "Failed to deliver confirmation code");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryStore;
    use async_trait::async_trait;
    use mockall::mock;
    use std::sync::Mutex;
    use std::time::Duration;

    mock! {
        TestUserRepository {}

        #[async_trait]
        impl UserRepository for TestUserRepository {
            async fn find_all(&self) -> Result<Vec<User>, RepositoryError>;
            async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, RepositoryError>;
            async fn create_with_profile(&self, user: User) -> Result<(), RepositoryError>;
            async fn set_confirmation_code(&self, user_id: &str, code: &str) -> Result<(), RepositoryError>;
            async fn confirm(&self, user_id: &str, code: &str) -> Result<(), RepositoryError>;
        }
    }

    #[derive(Default)]
    struct RecordingDelivery {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingDelivery {
        fn last_code(&self) -> Option<String> {
            self.sent.lock().unwrap().last().map(|(_, code)| code.clone())
        }
    }

    #[async_trait]
    impl CodeDelivery for RecordingDelivery {
        async fn deliver(&self, user_id: &str, code: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((user_id.to_string(), code.to_string()));
            Ok(())
        }
    }

    fn settings(require_confirmation: bool) -> UserServiceSettings {
        UserServiceSettings {
            password_hash_cost: 4,
            require_confirmation,
        }
    }

    fn tokens() -> Arc<TokenIssuer> {
        Arc::new(TokenIssuer::new(b"user-service-secret", Duration::from_secs(60)))
    }

    fn service_with(
        repository: Arc<dyn UserRepository>,
        require_confirmation: bool,
    ) -> (UserService, Arc<RecordingDelivery>) {
        let delivery = Arc::new(RecordingDelivery::default());
        let service = UserService::new(
            repository,
            tokens(),
            delivery.clone(),
            settings(require_confirmation),
        );
        (service, delivery)
    }

    fn credentials(user_id: &str, password: &str) -> CredentialsRequest {
        CredentialsRequest {
            user_id: user_id.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_twice_conflicts() {
        let (service, _) = service_with(Arc::new(InMemoryStore::new()), false);

        service
            .register_user(credentials("alice", "password123"))
            .await
            .unwrap();
        let second = service
            .register_user(credentials("alice", "password456"))
            .await;

        match second {
            Err(ServiceError::UserAlreadyExists { user_id }) => assert_eq!(user_id, "alice"),
            other => panic!("Expected UserAlreadyExists, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_stores_hash_only() {
        let store = Arc::new(InMemoryStore::new());
        let (service, _) = service_with(store.clone(), false);

        service
            .register_user(credentials("alice", "password123"))
            .await
            .unwrap();

        let user = UserRepository::find_by_id(store.as_ref(), "alice")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(user.password_hash, "password123");
        assert!(user.password_hash.starts_with("$2"));
        assert!(user.confirmed);
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let (service, _) = service_with(Arc::new(InMemoryStore::new()), false);

        let result = service.register_user(credentials("alice", "short")).await;
        assert!(matches!(result, Err(ServiceError::ValidationError { .. })));
    }

    #[tokio::test]
    async fn test_login_flow_with_confirmation() {
        let (service, delivery) = service_with(Arc::new(InMemoryStore::new()), true);

        service
            .register_user(credentials("alice", "password123"))
            .await
            .unwrap();

        let before_confirm = service.login_user(credentials("alice", "password123")).await;
        assert!(matches!(before_confirm, Err(ServiceError::AccountNotConfirmed)));

        assert!(matches!(
            service.confirm_registration("alice", "not-it").await,
            Err(ServiceError::InvalidConfirmationCode)
        ));

        let code = delivery.last_code().unwrap();
        service.confirm_registration("alice", &code).await.unwrap();

        let token = service
            .login_user(credentials("alice", "password123"))
            .await
            .unwrap();
        assert_eq!(tokens().verify(&token).unwrap().sub, "alice");
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password_and_unknown_user() {
        let (service, _) = service_with(Arc::new(InMemoryStore::new()), false);
        service
            .register_user(credentials("alice", "password123"))
            .await
            .unwrap();

        assert!(matches!(
            service.login_user(credentials("alice", "password999")).await,
            Err(ServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login_user(credentials("nobody", "password123")).await,
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_resend_issues_new_code() {
        let (service, delivery) = service_with(Arc::new(InMemoryStore::new()), true);
        service
            .register_user(credentials("alice", "password123"))
            .await
            .unwrap();

        service.resend_confirmation("alice").await.unwrap();
        assert_eq!(delivery.sent.lock().unwrap().len(), 2);

        let code = delivery.last_code().unwrap();
        service.confirm_registration("alice", &code).await.unwrap();

        assert!(matches!(
            service.resend_confirmation("alice").await,
            Err(ServiceError::ValidationError { .. })
        ));
        assert!(matches!(
            service.resend_confirmation("nobody").await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_all_users_store_failure_is_hidden() {
        let mut mock_repo = MockTestUserRepository::new();
        mock_repo
            .expect_find_all()
            .times(1)
            .returning(|| Err(RepositoryError::ConnectionFailed));

        let (service, _) = service_with(Arc::new(mock_repo), false);

        let err = service.get_all_users().await.unwrap_err();
        assert_eq!(err.to_string(), "Could not fetch users");
    }

    #[tokio::test]
    async fn test_check_user_exists() {
        let mut mock_repo = MockTestUserRepository::new();
        mock_repo
            .expect_find_by_id()
            .with(mockall::predicate::eq("ghost".to_string()))
            .times(1)
            .returning(|_| Ok(None));

        let (service, _) = service_with(Arc::new(mock_repo), false);
        assert!(!service.check_user_exists("ghost").await.unwrap());
    }
}
