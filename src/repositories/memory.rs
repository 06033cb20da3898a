//! In-memory storage backend.
//!
//! All five tables live behind a single lock so that multi-item writes
//! (registration, publishing a draft) are atomic just like the DynamoDB
//! transactions they stand in for. Data is lost when the store is dropped.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{
    CommentRepository, DraftRepository, ProfileRepository, ReviewRepository, TableProvisioner,
    UserRepository,
};
use crate::models::{Comment, Draft, RepositoryError, RepositoryResult, Review, User};

#[derive(Debug, Default)]
struct StoreState {
    users: BTreeMap<String, User>,
    profiles: HashMap<String, Vec<u64>>,
    reviews: BTreeMap<u64, Review>,
    comments: BTreeMap<u64, Comment>,
    drafts: BTreeMap<u64, Draft>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_all(&self) -> RepositoryResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().cloned().collect())
    }

    async fn find_by_id(&self, user_id: &str) -> RepositoryResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(user_id).cloned())
    }

    async fn create_with_profile(&self, user: User) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        if state.users.contains_key(&user.user_id) {
            return Err(RepositoryError::AlreadyExists);
        }
        state.profiles.entry(user.user_id.clone()).or_default();
        state.users.insert(user.user_id.clone(), user);
        Ok(())
    }

    async fn set_confirmation_code(&self, user_id: &str, code: &str) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or(RepositoryError::NotFound)?;
        user.confirmation_code = Some(code.to_string());
        Ok(())
    }

    async fn confirm(&self, user_id: &str, code: &str) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        match state.users.get_mut(user_id) {
            Some(user) if user.confirmation_code.as_deref() == Some(code) => {
                user.confirmed = true;
                user.confirmation_code = None;
                Ok(())
            }
            _ => Err(RepositoryError::ConditionFailed),
        }
    }
}

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn append_saved(&self, user_name: &str, review_id: u64) -> RepositoryResult<Vec<u64>> {
        let mut state = self.state.write().await;
        let saved = state.profiles.entry(user_name.to_string()).or_default();
        saved.push(review_id);
        Ok(saved.clone())
    }

    async fn find_saved(&self, user_name: &str) -> RepositoryResult<Option<Vec<u64>>> {
        let state = self.state.read().await;
        Ok(state.profiles.get(user_name).cloned())
    }

    async fn remove_saved_at(
        &self,
        user_name: &str,
        index: usize,
        expected: u64,
    ) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let saved = state
            .profiles
            .get_mut(user_name)
            .ok_or(RepositoryError::ConditionFailed)?;
        if saved.get(index) != Some(&expected) {
            return Err(RepositoryError::ConditionFailed);
        }
        saved.remove(index);
        Ok(())
    }
}

#[async_trait]
impl ReviewRepository for InMemoryStore {
    async fn find_all(&self) -> RepositoryResult<Vec<Review>> {
        let state = self.state.read().await;
        Ok(state.reviews.values().cloned().collect())
    }

    async fn find_page(
        &self,
        limit: u32,
        start_after: Option<u64>,
    ) -> RepositoryResult<(Vec<Review>, Option<u64>)> {
        let state = self.state.read().await;
        let mut remaining = state
            .reviews
            .range(start_after.map_or(0, |id| id.saturating_add(1))..)
            .map(|(_, review)| review)
            .peekable();

        let mut page = Vec::new();
        while page.len() < limit as usize {
            match remaining.next() {
                Some(review) => page.push(review.clone()),
                None => break,
            }
        }

        let last_id = match (remaining.peek(), page.last()) {
            (Some(_), Some(last)) => Some(last.id),
            _ => None,
        };
        Ok((page, last_id))
    }

    async fn find_by_id(&self, id: u64) -> RepositoryResult<Option<Review>> {
        let state = self.state.read().await;
        Ok(state.reviews.get(&id).cloned())
    }

    async fn find_by_author(&self, author: &str) -> RepositoryResult<Vec<Review>> {
        let state = self.state.read().await;
        Ok(state
            .reviews
            .values()
            .filter(|review| review.author == author)
            .cloned()
            .collect())
    }

    async fn max_id(&self) -> RepositoryResult<Option<u64>> {
        let state = self.state.read().await;
        Ok(state.reviews.keys().next_back().copied())
    }

    async fn create(&self, review: Review) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        if state.reviews.contains_key(&review.id) {
            return Err(RepositoryError::AlreadyExists);
        }
        state.reviews.insert(review.id, review);
        Ok(())
    }

    async fn delete(&self, id: u64) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        state
            .reviews
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl CommentRepository for InMemoryStore {
    async fn find_all(&self) -> RepositoryResult<Vec<Comment>> {
        let state = self.state.read().await;
        Ok(state.comments.values().cloned().collect())
    }

    async fn find_by_review_id(&self, review_id: u64) -> RepositoryResult<Vec<Comment>> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .values()
            .filter(|comment| comment.review_id == review_id)
            .cloned()
            .collect())
    }

    async fn max_id(&self) -> RepositoryResult<Option<u64>> {
        let state = self.state.read().await;
        Ok(state.comments.keys().next_back().copied())
    }

    async fn create(&self, comment: Comment) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        if state.comments.contains_key(&comment.id) {
            return Err(RepositoryError::AlreadyExists);
        }
        state.comments.insert(comment.id, comment);
        Ok(())
    }
}

#[async_trait]
impl DraftRepository for InMemoryStore {
    async fn find_by_id(&self, id: u64) -> RepositoryResult<Option<Draft>> {
        let state = self.state.read().await;
        Ok(state.drafts.get(&id).cloned())
    }

    async fn find_by_author(&self, author: &str) -> RepositoryResult<Vec<Draft>> {
        let state = self.state.read().await;
        Ok(state
            .drafts
            .values()
            .filter(|draft| draft.author == author)
            .cloned()
            .collect())
    }

    async fn max_id(&self) -> RepositoryResult<Option<u64>> {
        let state = self.state.read().await;
        Ok(state.drafts.keys().next_back().copied())
    }

    async fn create(&self, draft: Draft) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        if state.drafts.contains_key(&draft.id) {
            return Err(RepositoryError::AlreadyExists);
        }
        state.drafts.insert(draft.id, draft);
        Ok(())
    }

    async fn publish(&self, draft_id: u64, review: Review) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        if !state.drafts.contains_key(&draft_id) {
            return Err(RepositoryError::NotFound);
        }
        if state.reviews.contains_key(&review.id) {
            return Err(RepositoryError::AlreadyExists);
        }
        state.drafts.remove(&draft_id);
        state.reviews.insert(review.id, review);
        Ok(())
    }
}

#[async_trait]
impl TableProvisioner for InMemoryStore {
    async fn ensure_tables(&self) -> RepositoryResult<Vec<String>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn review(id: u64, author: &str) -> Review {
        Review {
            id,
            image_url: None,
            author: author.to_string(),
            title: format!("Review {}", id),
            content: "content".to_string(),
            rate: dec!(3),
            like: 0,
        }
    }

    fn user(user_id: &str) -> User {
        User {
            user_id: user_id.to_string(),
            password_hash: "hash".to_string(),
            confirmed: false,
            confirmation_code: Some("123456".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_with_profile_rejects_duplicates() {
        let store = InMemoryStore::new();

        store.create_with_profile(user("alice")).await.unwrap();
        assert!(matches!(
            store.create_with_profile(user("alice")).await,
            Err(RepositoryError::AlreadyExists)
        ));
        assert_eq!(store.find_saved("alice").await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_confirm_requires_matching_code() {
        let store = InMemoryStore::new();
        store.create_with_profile(user("alice")).await.unwrap();

        assert!(matches!(
            store.confirm("alice", "000000").await,
            Err(RepositoryError::ConditionFailed)
        ));
        store.confirm("alice", "123456").await.unwrap();

        let confirmed = UserRepository::find_by_id(&store, "alice")
            .await
            .unwrap()
            .unwrap();
        assert!(confirmed.confirmed);
        assert_eq!(confirmed.confirmation_code, None);
    }

    #[tokio::test]
    async fn test_remove_saved_at_checks_expected_value() {
        let store = InMemoryStore::new();
        store.append_saved("alice", 4).await.unwrap();
        store.append_saved("alice", 8).await.unwrap();

        assert!(matches!(
            store.remove_saved_at("alice", 0, 8).await,
            Err(RepositoryError::ConditionFailed)
        ));
        store.remove_saved_at("alice", 1, 8).await.unwrap();
        assert_eq!(store.find_saved("alice").await.unwrap(), Some(vec![4]));
    }

    #[tokio::test]
    async fn test_find_page_walks_in_id_order() {
        let store = InMemoryStore::new();
        for id in [3, 1, 2, 5, 4] {
            ReviewRepository::create(&store, review(id, "alice"))
                .await
                .unwrap();
        }

        let (first, next) = store.find_page(2, None).await.unwrap();
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(next, Some(2));

        let (second, next) = store.find_page(3, next).await.unwrap();
        assert_eq!(second.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn test_publish_is_all_or_nothing() {
        let store = InMemoryStore::new();
        ReviewRepository::create(&store, review(1, "bob"))
            .await
            .unwrap();
        DraftRepository::create(
            &store,
            Draft {
                id: 1,
                image_url: None,
                author: "alice".to_string(),
                title: "t".to_string(),
                content: "c".to_string(),
                rate: None,
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            store.publish(1, review(1, "alice")).await,
            Err(RepositoryError::AlreadyExists)
        ));
        assert!(DraftRepository::find_by_id(&store, 1).await.unwrap().is_some());

        store.publish(1, review(2, "alice")).await.unwrap();
        assert!(DraftRepository::find_by_id(&store, 1).await.unwrap().is_none());
        assert!(ReviewRepository::find_by_id(&store, 2).await.unwrap().is_some());

        assert!(matches!(
            store.publish(1, review(3, "alice")).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
