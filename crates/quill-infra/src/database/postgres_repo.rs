//! PostgreSQL repository implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func, IntoColumnRef, LikeExpr, OnConflict, SimpleExpr};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Select, Set,
};
use uuid::Uuid;

use quill_core::domain::{Author, Comment, PostWithAuthor, User};
use quill_core::error::RepoError;
use quill_core::ports::{
    AuthorRepository, CommentRepository, PostRepository, TokenBlacklist, UserRepository,
};
use quill_core::query::{Page, PageRequest, PostFilter};

use super::entity::author::{self, Entity as AuthorEntity};
use super::entity::blacklisted_token::{self, Entity as BlacklistedTokenEntity};
use super::entity::comment::{self, Entity as CommentEntity};
use super::entity::post::{self, Entity as PostEntity};
use super::entity::user::{self, Entity as UserEntity};
use super::postgres_base::{PostgresBaseRepository, map_db_err};

/// PostgreSQL user repository.
pub type PostgresUserRepository = PostgresBaseRepository<UserEntity>;

/// PostgreSQL author repository.
pub type PostgresAuthorRepository = PostgresBaseRepository<AuthorEntity>;

/// PostgreSQL post repository.
pub type PostgresPostRepository = PostgresBaseRepository<PostEntity>;

/// PostgreSQL comment repository.
pub type PostgresCommentRepository = PostgresBaseRepository<CommentEntity>;

/// PostgreSQL-backed token blacklist.
pub type PostgresTokenBlacklist = PostgresBaseRepository<BlacklistedTokenEntity>;

/// Mask an email for logging to avoid PII in logs.
pub(crate) fn mask_email(email: &str) -> String {
    match email.find('@') {
        Some(at_pos) => {
            let (local, domain) = email.split_at(at_pos);
            let masked_local = match local.chars().next() {
                Some(first) if local.len() > 1 => format!("{first}***"),
                _ => "***".to_string(),
            };
            format!("{masked_local}{domain}")
        }
        None => "***".to_string(),
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        tracing::debug!(%username, "Finding user by username");

        let result = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        tracing::debug!(user_email = %mask_email(email), "Finding user by email");

        let result = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }
}

#[async_trait]
impl AuthorRepository for PostgresAuthorRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Author>, RepoError> {
        let result = AuthorEntity::find()
            .filter(author::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }

    async fn get_or_create_for_user(&self, user: &User) -> Result<Author, RepoError> {
        // INSERT .. ON CONFLICT DO NOTHING keeps racing first posts from
        // creating two authors; the follow-up select sees whichever row won.
        let inserted = AuthorEntity::insert(author::ActiveModel::from(Author::for_user(user)))
            .on_conflict(
                OnConflict::column(author::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(map_db_err)?;

        if inserted > 0 {
            tracing::info!(user_id = %user.id, "Created author profile");
        }

        self.find_by_user_id(user.id)
            .await?
            .ok_or(RepoError::NotFound)
    }
}

/// Case-insensitive substring match on a column.
fn contains_ci(col: impl IntoColumnRef, needle: &str) -> SimpleExpr {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");

    Expr::expr(Func::lower(Expr::col(col))).like(LikeExpr::new(format!("%{escaped}%")).escape('\\'))
}

/// Translate a post filter into a SQL condition over `posts` joined with `authors`.
pub(crate) fn post_filter_condition(filter: &PostFilter) -> Condition {
    let mut cond = Condition::all().add(post::Column::Active.eq(filter.active));

    if let Some(status) = filter.status {
        cond = cond.add(post::Column::Status.eq(post::Status::from(status)));
    }
    if let Some(needle) = &filter.title {
        cond = cond.add(contains_ci((post::Entity, post::Column::Title), needle));
    }
    if let Some(needle) = &filter.content {
        cond = cond.add(contains_ci((post::Entity, post::Column::Content), needle));
    }
    if let Some(needle) = &filter.author_name {
        cond = cond.add(contains_ci((author::Entity, author::Column::Name), needle));
    }
    if let Some(from) = filter.published_from {
        cond = cond.add(post::Column::PublishedDate.gte(from));
    }
    if let Some(until) = filter.published_until {
        cond = cond.add(post::Column::PublishedDate.lt(until));
    }

    cond
}

/// Posts joined with their authors, filtered and in listing order.
pub(crate) fn list_query(filter: &PostFilter) -> Select<PostEntity> {
    PostEntity::find()
        .join(sea_orm::JoinType::InnerJoin, post::Relation::Author.def())
        .filter(post_filter_condition(filter))
        .order_by_desc(post::Column::PublishedDate)
        .order_by_asc(post::Column::Id)
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn find_with_author(&self, id: Uuid) -> Result<Option<PostWithAuthor>, RepoError> {
        let result = PostEntity::find_by_id(id)
            .find_also_related(AuthorEntity)
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        match result {
            Some((post, Some(author))) => Ok(Some(PostWithAuthor {
                post: post.into(),
                author: author.into(),
            })),
            Some((post, None)) => Err(RepoError::Query(format!(
                "post {} references a missing author",
                post.id
            ))),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<Page<PostWithAuthor>, RepoError> {
        let paginator = list_query(filter).paginate(&self.db, page.page_size);
        let total = paginator.num_items().await.map_err(map_db_err)?;
        let posts = paginator
            .fetch_page(page.page - 1)
            .await
            .map_err(map_db_err)?;

        let author_ids: Vec<Uuid> = posts.iter().map(|p| p.author_id).collect();
        let authors: HashMap<Uuid, author::Model> = AuthorEntity::find()
            .filter(author::Column::Id.is_in(author_ids))
            .all(&self.db)
            .await
            .map_err(map_db_err)?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let items = posts
            .into_iter()
            .map(|post| {
                let author = authors.get(&post.author_id).cloned().ok_or_else(|| {
                    RepoError::Query(format!("post {} references a missing author", post.id))
                })?;
                Ok(PostWithAuthor {
                    post: post.into(),
                    author: author.into(),
                })
            })
            .collect::<Result<Vec<_>, RepoError>>()?;

        Ok(Page::new(items, total, page))
    }
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let result = CommentEntity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::Created)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn find_for_post(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<Option<Comment>, RepoError> {
        let result = CommentEntity::find_by_id(comment_id)
            .filter(comment::Column::PostId.eq(post_id))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(Into::into))
    }
}

#[async_trait]
impl TokenBlacklist for PostgresTokenBlacklist {
    async fn revoke(
        &self,
        jti: Uuid,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        let entry = blacklisted_token::ActiveModel {
            jti: Set(jti),
            user_id: Set(user_id),
            expires_at: Set(expires_at.into()),
            blacklisted_at: Set(Utc::now().into()),
        };

        BlacklistedTokenEntity::insert(entry)
            .on_conflict(
                OnConflict::column(blacklisted_token::Column::Jti)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(())
    }

    async fn is_revoked(&self, jti: Uuid) -> Result<bool, RepoError> {
        let found = BlacklistedTokenEntity::find_by_id(jti)
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(found.is_some())
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, RepoError> {
        let result = BlacklistedTokenEntity::delete_many()
            .filter(blacklisted_token::Column::ExpiresAt.lt(before))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected)
    }
}
