pub mod view;

mod ws;

use axum::{
    debug_handler,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::feed::Feed;
use crate::messages::{self, Message};
use crate::session::{current_user, is_admin};
use crate::{conversations, include_res, profiles, res, AppResult, AppState, ChatError};

use view::{ChatView, ListState, SendOutcome};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(chat_page).post(send))
        .route("/compose", get(compose_page).post(compose))
        .route("/ws", get(ws::chat_ws))
}

#[debug_handler(state = AppState)]
async fn chat_page(
    State(db_pool): State<SqlitePool>,
    State(feed): State<Feed>,
    session: Session,
) -> AppResult<Response> {
    let Some(user_id) = current_user(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let mut view = ChatView::mount(db_pool, feed, user_id).await?;
    let page = render_page(&view, None, "");
    view.unmount();
    Ok(Html(page).into_response())
}

#[derive(Deserialize)]
struct SendForm {
    conversation_id: Option<Uuid>,
    content: String,
}

/// Form-post send. An explicit conversation id skips resolution; without
/// one the user's active support conversation is found or created.
#[debug_handler(state = AppState)]
async fn send(
    State(db_pool): State<SqlitePool>,
    State(feed): State<Feed>,
    session: Session,

    Form(SendForm { conversation_id, content }): Form<SendForm>,
) -> AppResult<Response> {
    let Some(user_id) = current_user(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    if let Some(convo) = conversation_id {
        // explicit target: append without resolution
        return match messages::append(&db_pool, &feed, convo, &user_id, &content).await {
            Ok(_) => Ok(Redirect::to("/c").into_response()),
            Err(err) => {
                if let ChatError::Store(ref e) = err {
                    tracing::error!(error = %e, "send failed");
                }
                let mut view = ChatView::mount(db_pool, feed, user_id).await?;
                let page = render_page(&view, Some(err.notice()), &content);
                view.unmount();
                Ok(Html(page).into_response())
            }
        };
    }

    let mut view = ChatView::mount(db_pool, feed, user_id).await?;
    let response = match view.send(&content).await {
        SendOutcome::Sent(_) => Redirect::to("/c").into_response(),
        _ => {
            let notice = view.error_notice().unwrap_or(messages::EMPTY_MESSAGE);
            Html(render_page(&view, Some(notice), view.draft())).into_response()
        }
    };
    view.unmount();
    Ok(response)
}

#[debug_handler(state = AppState)]
async fn compose_page(session: Session) -> AppResult<Response> {
    if !is_admin(&session).await? {
        return res::sorry("page");
    }
    Ok(Html(render_compose(None, "")).into_response())
}

#[derive(Deserialize)]
struct ComposeForm {
    user_id: Option<String>,
    content: String,
}

/// Admin composer: always a fresh conversation with the recipient, both
/// parties as participants, then the first message.
#[debug_handler(state = AppState)]
async fn compose(
    State(db_pool): State<SqlitePool>,
    State(feed): State<Feed>,
    session: Session,

    Form(ComposeForm { user_id, content }): Form<ComposeForm>,
) -> AppResult<Response> {
    if !is_admin(&session).await? {
        return res::sorry("page");
    }
    let Some(admin_id) = current_user(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let target = match user_id.as_deref().filter(|id| !id.trim().is_empty()) {
        Some(id) => profiles::find(&db_pool, id).await?,
        None => None,
    };
    let Some(target) = target else {
        return Ok(Html(render_compose(Some(messages::NO_RECIPIENT), &content)).into_response());
    };
    if content.trim().is_empty() {
        return Ok(Html(render_compose(Some(messages::EMPTY_MESSAGE), &content)).into_response());
    }

    let sent = async {
        let convo = conversations::create_direct(&db_pool, &target, &admin_id).await?;
        messages::append(&db_pool, &feed, convo, &admin_id, &content).await
    }
    .await;

    match sent {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(err) => {
            tracing::error!(error = %err, "compose failed");
            Ok(Html(render_compose(Some(err.notice()), &content)).into_response())
        }
    }
}

fn render_page(view: &ChatView, notice: Option<&str>, draft: &str) -> String {
    let body = match view.state() {
        ListState::Loading | ListState::Empty => {
            "<div class='empty'>No messages yet. Start a conversation!</div>".to_owned()
        }
        ListState::Populated => {
            let mut rows = String::new();
            for row in view.messages() {
                rows += &msg_to_html(row, view.user_id());
            }
            rows
        }
    };

    include_res!(str, "/pages/chat.html")
        .replace("{messages}", &body)
        .replace(
            "{notice}",
            &notice
                .map(|n| format!("<div class='notice'>{n}</div>"))
                .unwrap_or_default(),
        )
        .replace("{draft}", draft)
}

fn render_compose(error: Option<&str>, draft: &str) -> String {
    include_res!(str, "/pages/compose.html")
        .replace(
            "{error}",
            &error
                .map(|e| format!("<div class='notice'>{e}</div>"))
                .unwrap_or_default(),
        )
        .replace("{draft}", draft)
}

pub(crate) fn msg_to_html(row: &Message, viewer: &str) -> String {
    let mut content_html = String::new();
    pulldown_cmark::html::push_html(
        &mut content_html,
        pulldown_cmark::Parser::new(&row.content),
    );

    let mine = row.sender_id == viewer;
    include_res!(str, "/pages/message.html")
        .replace("{side}", if mine { "mine" } else { "theirs" })
        .replace("{sender}", if mine { "You" } else { row.sender_name() })
        .replace("{time}", clock_time(&row.created_at))
        .replace("{content}", &content_html)
}

// created_at is RFC 3339; the bubble only shows HH:MM
fn clock_time(created_at: &str) -> &str {
    created_at.get(11..16).unwrap_or("")
}
