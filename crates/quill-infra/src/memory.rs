//! In-memory store - used when no database is configured, and in tests.
//!
//! One [`InMemoryStore`] implements every repository port over a shared set
//! of tables, so cross-entity rules (uniqueness, foreign keys, cascades) hold
//! the same way they do in PostgreSQL. Data is lost on process restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use quill_core::domain::{Author, Comment, Post, PostWithAuthor, User};
use quill_core::error::RepoError;
use quill_core::ports::{
    AuthorRepository, BaseRepository, CommentRepository, PostRepository, TokenBlacklist,
    UserRepository,
};
use quill_core::query::{Page, PageRequest, PostFilter};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    authors: HashMap<Uuid, Author>,
    posts: HashMap<Uuid, Post>,
    comments: HashMap<Uuid, Comment>,
    blacklist: HashMap<Uuid, DateTime<Utc>>,
}

impl Tables {
    fn check_user_unique(&self, user: &User) -> Result<(), RepoError> {
        let clash = self.users.values().any(|u| {
            u.id != user.id && (u.username == user.username || u.email == user.email)
        });
        if clash {
            return Err(RepoError::Constraint("Entity already exists".to_string()));
        }
        Ok(())
    }

    fn check_author_unique(&self, author: &Author) -> Result<(), RepoError> {
        let clash = self.authors.values().any(|a| {
            a.id != author.id && (a.user_id == author.user_id || a.email == author.email)
        });
        if clash {
            return Err(RepoError::Constraint("Entity already exists".to_string()));
        }
        Ok(())
    }

    fn remove_post(&mut self, id: Uuid) -> Option<Post> {
        let removed = self.posts.remove(&id)?;
        self.comments.retain(|_, c| c.post_id != id);
        Some(removed)
    }
}

fn missing_reference() -> RepoError {
    RepoError::Constraint("Referenced entity does not exist".to_string())
}

fn duplicate_id() -> RepoError {
    RepoError::Constraint("Entity already exists".to_string())
}

/// Shared in-memory tables guarded by an async `RwLock`.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseRepository<User, Uuid> for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn create(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id) {
            return Err(duplicate_id());
        }
        tables.check_user_unique(&user)?;
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Err(RepoError::NotFound);
        }
        tables.check_user_unique(&user)?;
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        tables.users.remove(&id).ok_or(RepoError::NotFound)?;

        // Cascade: the user's author profile and its posts, and the user's comments.
        let author_ids: Vec<Uuid> = tables
            .authors
            .values()
            .filter(|a| a.user_id == id)
            .map(|a| a.id)
            .collect();
        for author_id in author_ids {
            tables.authors.remove(&author_id);
            let post_ids: Vec<Uuid> = tables
                .posts
                .values()
                .filter(|p| p.author_id == author_id)
                .map(|p| p.id)
                .collect();
            for post_id in post_ids {
                tables.remove_post(post_id);
            }
        }
        tables.comments.retain(|_, c| c.user_id != Some(id));
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }
}

#[async_trait]
impl BaseRepository<Author, Uuid> for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Author>, RepoError> {
        Ok(self.tables.read().await.authors.get(&id).cloned())
    }

    async fn create(&self, author: Author) -> Result<Author, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.authors.contains_key(&author.id) {
            return Err(duplicate_id());
        }
        if !tables.users.contains_key(&author.user_id) {
            return Err(missing_reference());
        }
        tables.check_author_unique(&author)?;
        tables.authors.insert(author.id, author.clone());
        Ok(author)
    }

    async fn update(&self, author: Author) -> Result<Author, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.authors.contains_key(&author.id) {
            return Err(RepoError::NotFound);
        }
        tables.check_author_unique(&author)?;
        tables.authors.insert(author.id, author.clone());
        Ok(author)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        tables.authors.remove(&id).ok_or(RepoError::NotFound)?;
        let post_ids: Vec<Uuid> = tables
            .posts
            .values()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        for post_id in post_ids {
            tables.remove_post(post_id);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorRepository for InMemoryStore {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Author>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.authors.values().find(|a| a.user_id == user_id).cloned())
    }

    async fn get_or_create_for_user(&self, user: &User) -> Result<Author, RepoError> {
        // Lookup and insert happen under one write lock.
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.authors.values().find(|a| a.user_id == user.id) {
            return Ok(existing.clone());
        }
        if !tables.users.contains_key(&user.id) {
            return Err(missing_reference());
        }

        let author = Author::for_user(user);
        tables.check_author_unique(&author)?;
        tables.authors.insert(author.id, author.clone());
        tracing::info!(user_id = %user.id, "Created author profile");

        Ok(author)
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn create(&self, post: Post) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.posts.contains_key(&post.id) {
            return Err(duplicate_id());
        }
        if !tables.authors.contains_key(&post.author_id) {
            return Err(missing_reference());
        }
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update(&self, post: Post) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&post.id) {
            return Err(RepoError::NotFound);
        }
        if !tables.authors.contains_key(&post.author_id) {
            return Err(missing_reference());
        }
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        tables.remove_post(id).map(|_| ()).ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl PostRepository for InMemoryStore {
    async fn find_with_author(&self, id: Uuid) -> Result<Option<PostWithAuthor>, RepoError> {
        let tables = self.tables.read().await;
        let Some(post) = tables.posts.get(&id) else {
            return Ok(None);
        };
        let author = tables
            .authors
            .get(&post.author_id)
            .ok_or_else(|| RepoError::Query(format!("post {id} references a missing author")))?;

        Ok(Some(PostWithAuthor {
            post: post.clone(),
            author: author.clone(),
        }))
    }

    async fn list(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<Page<PostWithAuthor>, RepoError> {
        let tables = self.tables.read().await;

        let mut matching: Vec<PostWithAuthor> = tables
            .posts
            .values()
            .filter_map(|post| {
                let author = tables.authors.get(&post.author_id)?;
                filter.matches(post, author).then(|| PostWithAuthor {
                    post: post.clone(),
                    author: author.clone(),
                })
            })
            .collect();

        matching.sort_by(|a, b| {
            b.post
                .published_date
                .cmp(&a.post.published_date)
                .then_with(|| a.post.id.cmp(&b.post.id))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.page_size as usize)
            .collect();

        Ok(Page::new(items, total, page))
    }
}

#[async_trait]
impl BaseRepository<Comment, Uuid> for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn create(&self, comment: Comment) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.comments.contains_key(&comment.id) {
            return Err(duplicate_id());
        }
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(missing_reference());
        }
        if let Some(user_id) = comment.user_id {
            if !tables.users.contains_key(&user_id) {
                return Err(missing_reference());
            }
        }
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn update(&self, comment: Comment) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.comments.contains_key(&comment.id) {
            return Err(RepoError::NotFound);
        }
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        tables
            .comments
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl CommentRepository for InMemoryStore {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created);
        Ok(comments)
    }

    async fn find_for_post(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<Option<Comment>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .get(&comment_id)
            .filter(|c| c.post_id == post_id)
            .cloned())
    }
}

#[async_trait]
impl TokenBlacklist for InMemoryStore {
    async fn revoke(
        &self,
        jti: Uuid,
        _user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        tables.blacklist.entry(jti).or_insert(expires_at);
        Ok(())
    }

    async fn is_revoked(&self, jti: Uuid) -> Result<bool, RepoError> {
        Ok(self.tables.read().await.blacklist.contains_key(&jti))
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, RepoError> {
        let mut tables = self.tables.write().await;
        let len = tables.blacklist.len();
        tables.blacklist.retain(|_, expires_at| *expires_at >= before);
        Ok((len - tables.blacklist.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::TimeDelta;

    fn user(name: &str) -> User {
        User::new(
            name.to_string(),
            format!("{name}@example.com"),
            "hash".to_string(),
        )
    }

    async fn seed_author(store: &InMemoryStore, name: &str) -> Author {
        let user = user(name);
        let users: &dyn UserRepository = store;
        users.create(user.clone()).await.unwrap();
        store.get_or_create_for_user(&user).await.unwrap()
    }

    #[tokio::test]
    async fn test_user_uniqueness() {
        let store = InMemoryStore::new();
        let users: &dyn UserRepository = &store;

        users.create(user("alice")).await.unwrap();
        let result = users.create(user("alice")).await;

        assert!(matches!(result, Err(RepoError::Constraint(_))));
        assert!(users.find_by_username("alice").await.unwrap().is_some());
        assert!(
            users
                .find_by_email("alice@example.com")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_get_or_create_author_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        let u = user("bob");
        let users: Arc<dyn UserRepository> = store.clone();
        users.create(u.clone()).await.unwrap();

        let (first, second) = tokio::join!(
            store.get_or_create_for_user(&u),
            store.get_or_create_for_user(&u)
        );

        let first = first.unwrap();
        assert_eq!(first, second.unwrap());
        assert_eq!(first.name, "bob");
        assert_eq!(first.email, "bob@example.com");
    }

    #[tokio::test]
    async fn test_post_requires_existing_author() {
        let store = InMemoryStore::new();
        let posts: &dyn PostRepository = &store;

        let orphan = Post::new(Uuid::new_v4(), "t".to_string(), "c".to_string());

        assert!(matches!(
            posts.create(orphan).await,
            Err(RepoError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn test_list_orders_newest_first_and_paginates() {
        let store = InMemoryStore::new();
        let author = seed_author(&store, "carol").await;
        let posts: &dyn PostRepository = &store;

        let now = Utc::now();
        for days in 0..5 {
            let mut post = Post::new(author.id, format!("post {days}"), "body".to_string());
            post.published_date = now - TimeDelta::days(days);
            posts.create(post).await.unwrap();
        }

        let page = posts
            .list(&PostFilter::default(), PageRequest::new(2, 2))
            .await
            .unwrap();

        assert_eq!(page.total, 5);
        let titles: Vec<&str> = page.items.iter().map(|p| p.post.title.as_str()).collect();
        assert_eq!(titles, vec!["post 2", "post 3"]);
    }

    #[tokio::test]
    async fn test_deleting_post_cascades_comments() {
        let store = InMemoryStore::new();
        let author = seed_author(&store, "dave").await;
        let posts: &dyn PostRepository = &store;
        let comments: &dyn CommentRepository = &store;

        let post = posts
            .create(Post::new(author.id, "t".to_string(), "c".to_string()))
            .await
            .unwrap();
        let comment = comments
            .create(Comment::new(post.id, "nice".to_string(), None))
            .await
            .unwrap();

        posts.delete(post.id).await.unwrap();

        assert!(comments.find_by_id(comment.id).await.unwrap().is_none());
        assert!(matches!(
            posts.delete(post.id).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_find_comment_scoped_to_post() {
        let store = InMemoryStore::new();
        let author = seed_author(&store, "erin").await;
        let posts: &dyn PostRepository = &store;
        let comments: &dyn CommentRepository = &store;

        let first = posts
            .create(Post::new(author.id, "a".to_string(), "a".to_string()))
            .await
            .unwrap();
        let second = posts
            .create(Post::new(author.id, "b".to_string(), "b".to_string()))
            .await
            .unwrap();
        let comment = comments
            .create(Comment::new(first.id, "hi".to_string(), None))
            .await
            .unwrap();

        assert!(
            comments
                .find_for_post(first.id, comment.id)
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            comments
                .find_for_post(second.id, comment.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_blacklist_revoke_is_idempotent() {
        let store = InMemoryStore::new();
        let jti = Uuid::new_v4();

        assert!(!store.is_revoked(jti).await.unwrap());
        store.revoke(jti, Uuid::new_v4(), Utc::now()).await.unwrap();
        store.revoke(jti, Uuid::new_v4(), Utc::now()).await.unwrap();
        assert!(store.is_revoked(jti).await.unwrap());
    }

    #[tokio::test]
    async fn test_blacklist_purge_drops_only_expired() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let (expired, live) = (Uuid::new_v4(), Uuid::new_v4());

        store
            .revoke(expired, Uuid::new_v4(), now - TimeDelta::hours(1))
            .await
            .unwrap();
        store
            .revoke(live, Uuid::new_v4(), now + TimeDelta::hours(1))
            .await
            .unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(!store.is_revoked(expired).await.unwrap());
        assert!(store.is_revoked(live).await.unwrap());
        assert_eq!(store.purge_expired(now).await.unwrap(), 0);
    }
}
