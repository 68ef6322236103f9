use axum::{
    debug_handler,
    extract::{State, WebSocketUpgrade},
    response::{IntoResponse, Redirect, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::feed::Feed;
use crate::session::current_user;
use crate::{AppResult, AppState};

use super::view::{ChatView, SendOutcome};

#[derive(Deserialize)]
struct SendFrame {
    content: String,
}

#[derive(serde::Serialize)]
struct NoticeFrame<'a> {
    notice: &'a str,
}

/// One view model per socket: history is replayed on connect, feed rows
/// are forwarded as they land, incoming frames are sends.
#[debug_handler(state = AppState)]
pub(crate) async fn chat_ws(
    State(db_pool): State<SqlitePool>,
    State(feed): State<Feed>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let Some(user_id) = current_user(&session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let mut view = ChatView::mount(db_pool, feed, user_id).await?;

    Ok(ws.on_upgrade(async move |stream| {
        let (mut sender, mut receiver) = stream.split();

        let history: Vec<String> = view
            .messages()
            .iter()
            .filter_map(|row| serde_json::to_string(row).ok())
            .collect();
        for json in history {
            if sender.send(json.into()).await.is_err() {
                view.unmount();
                return;
            }
        }

        let Some(mut feed_rx) = view.take_feed() else {
            view.unmount();
            return;
        };

        loop {
            tokio::select! {
                row = feed_rx.recv() => {
                    let Some(row) = row else { break };
                    let Some(row) = view.apply(row) else { continue };
                    let Ok(json) = serde_json::to_string(row) else { continue };
                    if sender.send(json.into()).await.is_err() {
                        break;
                    }
                }
                frame = receiver.next() => {
                    let Some(Ok(frame)) = frame else { break };
                    let Ok(SendFrame { content }) =
                        serde_json::from_slice(&frame.into_data()) else {
                        continue;
                    };
                    match view.send(&content).await {
                        SendOutcome::Sent(_) | SendOutcome::Busy => {}
                        SendOutcome::Rejected => {
                            let notice = view.error_notice().unwrap_or("rejected");
                            let Ok(json) =
                                serde_json::to_string(&NoticeFrame { notice }) else {
                                continue;
                            };
                            if sender.send(json.into()).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        view.unmount();
    }).into_response())
}
