//! Per-mount composition of the conversation and message repositories
//! with a live feed subscription. One instance per socket or page; no
//! state is shared across mounts.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::feed::{Feed, FeedSubscription};
use crate::messages::Message;
use crate::{conversations, messages, ChatError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    Loading,
    Empty,
    Populated,
}

#[derive(Debug, PartialEq)]
pub enum SendOutcome {
    /// Stored; the draft has been cleared.
    Sent(Message),
    /// Rejected locally or by the store; the draft is kept for retry and
    /// `error_notice` holds the user-facing text.
    Rejected,
    /// A send is already in flight; this one was ignored.
    Busy,
}

pub struct ChatView {
    pool: SqlitePool,
    feed: Feed,
    user_id: String,
    conversation_id: Option<Uuid>,
    state: ListState,
    messages: Vec<Message>,
    draft: String,
    error: Option<&'static str>,
    /// Index of the message the list should be scrolled to. Advances to
    /// the newest row after every list mutation.
    scroll_to: Option<usize>,
    pub(crate) sending: bool,
    mounted: bool,
    subscription: Option<FeedSubscription>,
}

impl ChatView {
    /// Resolve the user's conversation (never creating one), load history
    /// and attach the feed subscription.
    pub async fn mount(
        pool: SqlitePool,
        feed: Feed,
        user_id: String,
    ) -> Result<ChatView, ChatError> {
        let mut view = ChatView {
            pool,
            feed,
            user_id,
            conversation_id: None,
            state: ListState::Loading,
            messages: Vec::new(),
            draft: String::new(),
            error: None,
            scroll_to: None,
            sending: false,
            mounted: true,
            subscription: None,
        };

        view.conversation_id =
            conversations::resolve_active(&view.pool, &view.user_id).await?;
        if let Some(convo) = view.conversation_id {
            view.messages = messages::list(&view.pool, convo).await?;
        }

        view.state = if view.messages.is_empty() {
            ListState::Empty
        } else {
            ListState::Populated
        };
        view.scroll_to = view.messages.len().checked_sub(1);
        view.subscription = Some(view.feed.subscribe());
        Ok(view)
    }

    pub fn state(&self) -> ListState {
        self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn conversation_id(&self) -> Option<Uuid> {
        self.conversation_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn error_notice(&self) -> Option<&'static str> {
        self.error
    }

    pub fn scroll_to(&self) -> Option<usize> {
        self.scroll_to
    }

    /// Validate and store the draft. Only one send may be in flight per
    /// view; re-entrant calls are no-ops. On failure the draft survives
    /// for retry, on success it is cleared.
    pub async fn send(&mut self, content: &str) -> SendOutcome {
        if self.sending || !self.mounted {
            return SendOutcome::Busy;
        }
        self.draft = content.to_owned();

        if content.trim().is_empty() {
            self.error = Some(messages::EMPTY_MESSAGE);
            return SendOutcome::Rejected;
        }

        self.sending = true;
        let outcome = self.store_draft().await;
        self.sending = false;

        match outcome {
            Ok(row) => {
                if self.mounted {
                    self.draft.clear();
                    self.error = None;
                }
                SendOutcome::Sent(row)
            }
            Err(err) => {
                tracing::error!(error = %err, "send failed");
                if self.mounted {
                    self.error = Some(err.notice());
                }
                SendOutcome::Rejected
            }
        }
    }

    async fn store_draft(&mut self) -> Result<Message, ChatError> {
        let convo = match self.conversation_id {
            Some(convo) => convo,
            None => {
                let convo =
                    conversations::resolve_or_create(&self.pool, &self.user_id).await?;
                self.conversation_id = Some(convo);
                convo
            }
        };
        messages::append(&self.pool, &self.feed, convo, &self.user_id, &self.draft).await
    }

    /// Append a feed row to the in-memory list without re-fetching.
    /// Rows for other conversations, duplicates of rows already shown,
    /// and anything arriving after unmount are ignored.
    pub fn apply(&mut self, row: Message) -> Option<&Message> {
        if !self.mounted {
            return None;
        }
        if self.conversation_id.map(|c| c.to_string()) != Some(row.conversation_id.clone()) {
            return None;
        }
        if self.messages.iter().any(|m| m.id == row.id) {
            return None;
        }

        self.messages.push(row);
        self.state = ListState::Populated;
        self.scroll_to = Some(self.messages.len() - 1);
        self.messages.last()
    }

    /// Drain whatever the subscription has buffered into the list.
    /// Returns how many rows were appended.
    pub fn poll_feed(&mut self) -> usize {
        let mut sub = match self.subscription.take() {
            Some(sub) => sub,
            None => return 0,
        };
        let mut appended = 0;
        while let Some(row) = sub.try_recv() {
            if self.apply(row).is_some() {
                appended += 1;
            }
        }
        self.subscription = Some(sub);
        appended
    }

    /// Hand the live subscription to a socket loop that drives it with
    /// [`apply`](Self::apply).
    pub fn take_feed(&mut self) -> Option<FeedSubscription> {
        self.subscription.take()
    }

    /// Drop the subscription and stop accepting mutations. Results of
    /// calls still in flight are discarded when they resolve.
    pub fn unmount(&mut self) {
        self.subscription = None;
        self.mounted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{memory_pool, seed_profile};

    async fn mounted_view(pool: &SqlitePool, feed: &Feed, user: &str) -> ChatView {
        ChatView::mount(pool.clone(), feed.clone(), user.to_owned())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn mount_without_history_is_empty_and_creates_nothing() {
        let pool = memory_pool().await;
        let feed = Feed::new();

        let view = mounted_view(&pool, &feed, "alice").await;
        assert_eq!(view.state(), ListState::Empty);
        assert!(view.conversation_id().is_none());

        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn first_send_creates_the_conversation_then_reuses_it() {
        let pool = memory_pool().await;
        let feed = Feed::new();
        seed_profile(&pool, "alice", "alice").await;

        let mut view = mounted_view(&pool, &feed, "alice").await;
        let SendOutcome::Sent(first) = view.send("Hello").await else {
            panic!("send rejected");
        };
        assert_eq!(first.content, "Hello");
        assert!(view.draft().is_empty());

        let convo = view.conversation_id().unwrap();
        view.send("Still there?").await;
        assert_eq!(view.conversation_id(), Some(convo));

        let rows = messages::list(&pool, convo).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content, "Hello");
        assert_eq!(rows[1].content, "Still there?");

        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn empty_send_is_rejected_with_the_draft_kept() {
        let pool = memory_pool().await;
        let feed = Feed::new();

        let mut view = mounted_view(&pool, &feed, "alice").await;
        assert_eq!(view.send("   ").await, SendOutcome::Rejected);
        assert_eq!(view.draft(), "   ");
        assert_eq!(view.error_notice(), Some(messages::EMPTY_MESSAGE));
        assert_eq!(view.state(), ListState::Empty);
        assert!(view.conversation_id().is_none());
    }

    #[tokio::test]
    async fn reentrant_send_is_ignored_while_one_is_pending() {
        let pool = memory_pool().await;
        let feed = Feed::new();

        let mut view = mounted_view(&pool, &feed, "alice").await;
        view.sending = true;
        assert_eq!(view.send("Hello").await, SendOutcome::Busy);
        assert!(view.messages().is_empty());

        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n, 0);

        view.sending = false;
        assert!(matches!(view.send("Hello").await, SendOutcome::Sent(_)));
    }

    #[tokio::test]
    async fn live_inserts_append_and_advance_the_scroll_cursor() {
        let pool = memory_pool().await;
        let feed = Feed::new();
        seed_profile(&pool, "alice", "alice").await;
        let convo = conversations::resolve_or_create(&pool, "alice").await.unwrap();
        messages::append(&pool, &feed, convo, "alice", "hi").await.unwrap();

        let mut view = mounted_view(&pool, &feed, "alice").await;
        assert_eq!(view.state(), ListState::Populated);
        assert_eq!(view.scroll_to(), Some(0));

        messages::append(&pool, &feed, convo, "system-bot", "How can we help?")
            .await
            .unwrap();
        assert_eq!(view.poll_feed(), 1);
        assert_eq!(view.messages().len(), 2);
        assert_eq!(view.scroll_to(), Some(1));
        assert_eq!(view.messages()[1].sender_name(), crate::SUPPORT_TEAM);
    }

    #[tokio::test]
    async fn own_send_is_not_appended_twice() {
        let pool = memory_pool().await;
        let feed = Feed::new();
        seed_profile(&pool, "alice", "alice").await;
        conversations::resolve_or_create(&pool, "alice").await.unwrap();

        let mut view = mounted_view(&pool, &feed, "alice").await;
        let SendOutcome::Sent(row) = view.send("Hello").await else {
            panic!("send rejected");
        };
        assert!(view.apply(row.clone()).is_some());
        // feed echo of the same row is a duplicate now
        assert_eq!(view.poll_feed(), 0);
        assert_eq!(view.messages().len(), 1);
    }

    #[tokio::test]
    async fn foreign_conversation_rows_are_ignored() {
        let pool = memory_pool().await;
        let feed = Feed::new();
        let mine = conversations::resolve_or_create(&pool, "alice").await.unwrap();
        messages::append(&pool, &feed, mine, "alice", "mine").await.unwrap();
        let theirs = conversations::resolve_or_create(&pool, "bob").await.unwrap();

        let mut view = mounted_view(&pool, &feed, "alice").await;
        messages::append(&pool, &feed, theirs, "bob", "not yours").await.unwrap();
        assert_eq!(view.poll_feed(), 0);
        assert_eq!(view.messages().len(), 1);
    }

    #[tokio::test]
    async fn unmount_stops_list_updates() {
        let pool = memory_pool().await;
        let feed = Feed::new();
        let convo = conversations::resolve_or_create(&pool, "alice").await.unwrap();
        messages::append(&pool, &feed, convo, "alice", "hi").await.unwrap();

        let mut view = mounted_view(&pool, &feed, "alice").await;
        let before = view.messages().len();
        view.unmount();

        let late = messages::append(&pool, &feed, convo, "alice", "too late")
            .await
            .unwrap();
        assert_eq!(view.poll_feed(), 0);
        assert!(view.apply(late).is_none());
        assert_eq!(view.messages().len(), before);
    }
}
