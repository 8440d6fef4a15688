// Content domain models.
//
// The original blog kept a separate table triplet for every content
// type; here one ContentItem with a kind column covers articles, forum
// subjects and biographies alike.

use crate::core::accounts::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ContentId = i64;
pub type CommentId = i64;
pub type ReplyId = i64;
pub type CategoryId = i64;

/// An article category ("shōnen", "seinen", ...), created by admins and
/// used to file and filter articles. Forum subjects and biographies are
/// never categorised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Article,
    ForumSubject,
    Biography,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Article => "article",
            ContentKind::ForumSubject => "forum_subject",
            ContentKind::Biography => "biography",
        }
    }

    pub fn parse(s: &str) -> Option<ContentKind> {
        match s {
            "article" => Some(ContentKind::Article),
            "forum_subject" => Some(ContentKind::ForumSubject),
            "biography" => Some(ContentKind::Biography),
            _ => None,
        }
    }
}

/// An article, forum subject or mangaka biography.
#[derive(Debug, Clone, Serialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub kind: ContentKind,
    pub title: String,
    pub body: String,
    pub author_id: AccountId,
    /// Set on articles only.
    pub category_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub likes: i64,
    pub dislikes: i64,
}

#[derive(Debug, Clone)]
pub struct NewContent {
    pub kind: ContentKind,
    pub title: String,
    pub body: String,
    pub author_id: AccountId,
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub content_id: ContentId,
    pub author_id: AccountId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub id: ReplyId,
    pub comment_id: CommentId,
    pub author_id: AccountId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn opposite(&self) -> ReactionKind {
        match self {
            ReactionKind::Like => ReactionKind::Dislike,
            ReactionKind::Dislike => ReactionKind::Like,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }

    pub fn parse(s: &str) -> Option<ReactionKind> {
        match s {
            "like" => Some(ReactionKind::Like),
            "dislike" => Some(ReactionKind::Dislike),
            _ => None,
        }
    }
}

/// Result of a like/dislike toggle on a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// The reaction was recorded; the opposite one, if present, was
    /// removed in the same transaction.
    Recorded {
        likes: i64,
        dislikes: i64,
        replaced_opposite: bool,
    },
    /// The same reaction already existed - nothing changed, the caller
    /// is told "already liked".
    AlreadyReacted { likes: i64, dislikes: i64 },
}

/// Like data for one comment, enough for a viewer to know the count and
/// whether they are part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentLikeState {
    pub like_count: i64,
    pub liker_ids: Vec<AccountId>,
    pub liked_by_viewer: bool,
}
