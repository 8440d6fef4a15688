// Content interaction service - comments, replies and the like/dislike
// graph, with the notification side effects that go with them.
//
// The store toggles are atomic (one transaction per toggle in the SQL
// implementation), so counters can never drift from the underlying like
// records, even under same-account double submission.

use super::content_models::{
    Category, CategoryId, Comment, CommentId, CommentLikeState, ContentId, ContentItem,
    ContentKind, NewContent, ReactionKind, ReactionOutcome, Reply, ReplyId,
};
use crate::core::accounts::{Account, AccountError, AccountId, AccountStore};
use crate::core::auth::Principal;
use crate::core::notify::{Notification, Notifier};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content not found")]
    ContentNotFound,

    #[error("comment not found")]
    CommentNotFound,

    #[error("reply not found")]
    ReplyNotFound,

    #[error("category not found")]
    CategoryNotFound,

    #[error("category already exists")]
    CategoryTaken,

    #[error("connexion requise")]
    LoginRequired,

    #[error("action réservée à l'auteur ou à un modérateur")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<AccountError> for ContentError {
    fn from(e: AccountError) -> Self {
        ContentError::Storage(e.to_string())
    }
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting content items and their comment/reply/like graph.
///
/// Deletions cascade: removing a content item takes its comments,
/// replies and like records with it; removing a comment takes its
/// replies and likes. The two toggle operations are atomic - their
/// read-check-write runs as one unit in the implementation.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_content(&self, new: NewContent) -> Result<ContentItem, ContentError>;

    async fn content_by_id(&self, id: ContentId) -> Result<Option<ContentItem>, ContentError>;

    /// Items of one kind, optionally narrowed to one category.
    async fn list_content(
        &self,
        kind: ContentKind,
        category: Option<CategoryId>,
    ) -> Result<Vec<ContentItem>, ContentError>;

    /// Insert a category. Returns `CategoryTaken` on a duplicate name.
    async fn insert_category(&self, name: &str) -> Result<Category, ContentError>;

    async fn category_by_id(&self, id: CategoryId) -> Result<Option<Category>, ContentError>;

    async fn list_categories(&self) -> Result<Vec<Category>, ContentError>;

    /// Returns false if the item did not exist.
    async fn delete_content(&self, id: ContentId) -> Result<bool, ContentError>;

    async fn insert_comment(
        &self,
        content_id: ContentId,
        author_id: AccountId,
        body: &str,
    ) -> Result<Comment, ContentError>;

    async fn comment_by_id(&self, id: CommentId) -> Result<Option<Comment>, ContentError>;

    async fn comments_for(&self, content_id: ContentId) -> Result<Vec<Comment>, ContentError>;

    async fn delete_comment(&self, id: CommentId) -> Result<bool, ContentError>;

    async fn insert_reply(
        &self,
        comment_id: CommentId,
        author_id: AccountId,
        body: &str,
    ) -> Result<Reply, ContentError>;

    async fn replies_for(&self, comment_id: CommentId) -> Result<Vec<Reply>, ContentError>;

    async fn reply_by_id(&self, id: ReplyId) -> Result<Option<Reply>, ContentError>;

    async fn delete_reply(&self, id: ReplyId) -> Result<bool, ContentError>;

    /// Atomically apply a like/dislike: the opposite record for
    /// (account, content) is deleted and its counter decremented before
    /// the requested one is inserted and counted. Re-submitting the same
    /// kind changes nothing and reports `AlreadyReacted`.
    async fn toggle_reaction(
        &self,
        account_id: AccountId,
        content_id: ContentId,
        kind: ReactionKind,
    ) -> Result<ReactionOutcome, ContentError>;

    /// Atomic presence toggle of (account, comment). Returns true when
    /// the like was created, false when an existing like was removed.
    async fn toggle_comment_like(
        &self,
        account_id: AccountId,
        comment_id: CommentId,
    ) -> Result<bool, ContentError>;

    async fn comment_like_state(
        &self,
        comment_id: CommentId,
        viewer: Option<AccountId>,
    ) -> Result<CommentLikeState, ContentError>;
}

// ============================================================================
// VIEWS
// ============================================================================

/// A comment with its replies and like data, ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub comment: Comment,
    pub replies: Vec<Reply>,
    pub likes: CommentLikeState,
}

/// A content item plus everything hanging off it.
#[derive(Debug, Clone, Serialize)]
pub struct ContentPage {
    pub item: ContentItem,
    pub comments: Vec<CommentView>,
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ContentService<C: ContentStore, A: AccountStore> {
    content: Arc<C>,
    accounts: Arc<A>,
    notifier: Notifier,
}

impl<C: ContentStore, A: AccountStore> ContentService<C, A> {
    pub fn new(content: Arc<C>, accounts: Arc<A>, notifier: Notifier) -> Self {
        Self {
            content,
            accounts,
            notifier,
        }
    }

    pub async fn create(
        &self,
        author: &Account,
        kind: ContentKind,
        title: &str,
        body: &str,
        category_id: Option<CategoryId>,
    ) -> Result<ContentItem, ContentError> {
        if title.trim().is_empty() {
            return Err(ContentError::Validation("le titre est requis".to_string()));
        }
        if body.trim().is_empty() {
            return Err(ContentError::Validation("le contenu est requis".to_string()));
        }
        if let Some(category_id) = category_id {
            if kind != ContentKind::Article {
                return Err(ContentError::Validation(
                    "seuls les articles ont une catégorie".to_string(),
                ));
            }
            if self.content.category_by_id(category_id).await?.is_none() {
                return Err(ContentError::CategoryNotFound);
            }
        }
        let item = self
            .content
            .insert_content(NewContent {
                kind,
                title: title.trim().to_string(),
                body: body.to_string(),
                author_id: author.id,
                category_id,
            })
            .await?;
        tracing::info!(content_id = item.id, kind = kind.as_str(), "Content created");
        Ok(item)
    }

    pub async fn list(
        &self,
        kind: ContentKind,
        category: Option<CategoryId>,
    ) -> Result<Vec<ContentItem>, ContentError> {
        self.content.list_content(kind, category).await
    }

    /// Admin-created article category.
    pub async fn create_category(&self, name: &str) -> Result<Category, ContentError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ContentError::Validation("le nom est requis".to_string()));
        }
        let category = self.content.insert_category(name).await?;
        tracing::info!(category_id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn categories(&self) -> Result<Vec<Category>, ContentError> {
        self.content.list_categories().await
    }

    /// Full page for one item: the item, its comments, their replies and
    /// like data as seen by `viewer`.
    pub async fn page(
        &self,
        content_id: ContentId,
        viewer: Option<AccountId>,
    ) -> Result<ContentPage, ContentError> {
        let item = self
            .content
            .content_by_id(content_id)
            .await?
            .ok_or(ContentError::ContentNotFound)?;

        let mut comments = Vec::new();
        for comment in self.content.comments_for(content_id).await? {
            let replies = self.content.replies_for(comment.id).await?;
            let likes = self.content.comment_like_state(comment.id, viewer).await?;
            comments.push(CommentView {
                comment,
                replies,
                likes,
            });
        }

        Ok(ContentPage { item, comments })
    }

    /// Admin deletion; the store cascades to comments, replies and likes.
    pub async fn delete(&self, content_id: ContentId) -> Result<(), ContentError> {
        if !self.content.delete_content(content_id).await? {
            return Err(ContentError::ContentNotFound);
        }
        tracing::info!(content_id, "Content deleted");
        Ok(())
    }

    /// Post a comment. Multiple comments per (account, item) are fine.
    pub async fn add_comment(
        &self,
        account_id: AccountId,
        content_id: ContentId,
        body: &str,
    ) -> Result<Comment, ContentError> {
        let account = self.require_account(account_id).await?;
        if self.content.content_by_id(content_id).await?.is_none() {
            return Err(ContentError::ContentNotFound);
        }
        if body.trim().is_empty() {
            return Err(ContentError::Validation(
                "le commentaire est vide".to_string(),
            ));
        }
        self.content
            .insert_comment(content_id, account.id, body)
            .await
    }

    /// Comment author or a moderator may delete; cascades to replies and
    /// like records, never touches the parent item's own counters.
    pub async fn delete_comment(
        &self,
        requester: &Principal,
        comment_id: CommentId,
    ) -> Result<(), ContentError> {
        let comment = self
            .content
            .comment_by_id(comment_id)
            .await?
            .ok_or(ContentError::CommentNotFound)?;

        let allowed = requester.can_moderate()
            || requester
                .account()
                .is_some_and(|a| a.id == comment.author_id);
        if !allowed {
            return Err(ContentError::Forbidden);
        }

        self.content.delete_comment(comment_id).await?;
        tracing::info!(comment_id, "Comment deleted");
        Ok(())
    }

    /// Reply to a comment and notify its author (unless they reply to
    /// themselves).
    pub async fn add_reply(
        &self,
        account_id: AccountId,
        comment_id: CommentId,
        body: &str,
    ) -> Result<Reply, ContentError> {
        let account = self.require_account(account_id).await?;
        let comment = self
            .content
            .comment_by_id(comment_id)
            .await?
            .ok_or(ContentError::CommentNotFound)?;
        if body.trim().is_empty() {
            return Err(ContentError::Validation("la réponse est vide".to_string()));
        }

        let reply = self
            .content
            .insert_reply(comment_id, account.id, body)
            .await?;

        if comment.author_id != account.id {
            if let (Ok(Some(author)), Ok(Some(item))) = (
                self.accounts.account_by_id(comment.author_id).await,
                self.content.content_by_id(comment.content_id).await,
            ) {
                self.notifier.notify(Notification::ReplyPosted {
                    pseudo: author.pseudo,
                    email: author.email,
                    content_title: item.title,
                });
            }
        }

        Ok(reply)
    }

    /// Reply author or a moderator may delete a reply.
    pub async fn delete_reply(
        &self,
        requester: &Principal,
        reply_id: ReplyId,
    ) -> Result<(), ContentError> {
        let reply = self
            .content
            .reply_by_id(reply_id)
            .await?
            .ok_or(ContentError::ReplyNotFound)?;

        let allowed = requester.can_moderate()
            || requester.account().is_some_and(|a| a.id == reply.author_id);
        if !allowed {
            return Err(ContentError::Forbidden);
        }

        self.content.delete_reply(reply_id).await?;
        tracing::info!(reply_id, "Reply deleted");
        Ok(())
    }

    /// Like or dislike a content item. See `ContentStore::toggle_reaction`
    /// for the mutual-exclusion rule.
    pub async fn react(
        &self,
        account_id: AccountId,
        content_id: ContentId,
        kind: ReactionKind,
    ) -> Result<ReactionOutcome, ContentError> {
        self.require_account(account_id).await?;
        if self.content.content_by_id(content_id).await?.is_none() {
            return Err(ContentError::ContentNotFound);
        }
        self.content
            .toggle_reaction(account_id, content_id, kind)
            .await
    }

    /// Toggle a like on a comment. A first-time like notifies the
    /// comment's author; un-liking and self-likes stay silent.
    pub async fn like_comment(
        &self,
        account_id: AccountId,
        comment_id: CommentId,
    ) -> Result<CommentLikeState, ContentError> {
        let account = self.require_account(account_id).await?;
        let comment = self
            .content
            .comment_by_id(comment_id)
            .await?
            .ok_or(ContentError::CommentNotFound)?;

        let created = self
            .content
            .toggle_comment_like(account.id, comment_id)
            .await?;

        if created && comment.author_id != account.id {
            if let (Ok(Some(author)), Ok(Some(item))) = (
                self.accounts.account_by_id(comment.author_id).await,
                self.content.content_by_id(comment.content_id).await,
            ) {
                self.notifier.notify(Notification::CommentLiked {
                    pseudo: author.pseudo,
                    email: author.email,
                    content_title: item.title,
                });
            }
        }

        self.content
            .comment_like_state(comment_id, Some(account.id))
            .await
    }

    async fn require_account(&self, account_id: AccountId) -> Result<Account, ContentError> {
        self.accounts
            .account_by_id(account_id)
            .await?
            .ok_or(ContentError::LoginRequired)
    }
}

// ============================================================================
// TESTS
// ============================================================================
