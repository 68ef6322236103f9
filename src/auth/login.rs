use axum::{
    debug_handler,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use rand::seq::IndexedRandom;
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::session::{IS_ADMIN, USER_ID};
use crate::{include_res, profiles, AppResult};

#[derive(Deserialize)]
pub(crate) struct LoginForm {
    username: String,
}

#[debug_handler]
pub(crate) async fn login_page() -> impl IntoResponse {
    Html(include_res!(str, "/pages/login.html").replace("{error}", ""))
}

/// Thin identity collaborator: a handle logs you in, first use creates
/// the profile row. Admin standing comes from matching ADMIN_HANDLE.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Form(LoginForm { username }): Form<LoginForm>,
) -> AppResult<Response> {
    let username = username.trim().to_owned();
    if username.is_empty() {
        return Ok(Html(
            include_res!(str, "/pages/login.html")
                .replace("{error}", "<div class='notice'>Please enter a username</div>"),
        )
        .into_response());
    }

    let user_id = match profiles::find_by_username(&db_pool, &username).await? {
        Some(profile) => profile.id,
        None => create_profile(&db_pool, &username).await?,
    };

    session.insert(USER_ID, user_id.clone()).await?;
    session.insert(IS_ADMIN, username == admin_handle()).await?;
    tracing::info!(user_id, username, "logged in");

    Ok(Redirect::to("/").into_response())
}

fn admin_handle() -> String {
    dotenv::var("ADMIN_HANDLE").unwrap_or_else(|_| "support".to_owned())
}

async fn create_profile(db_pool: &SqlitePool, username: &str) -> AppResult<String> {
    let id = Uuid::now_v7().to_string();

    let adjectives = ["Quick", "Silent", "Brave", "Witty", "Calm", "Lucky", "Golden"];
    let nouns = ["Fox", "Owl", "Wolf", "Panda", "Falcon", "Turtle", "Phoenix"];
    let full_name = format!(
        "{} {}",
        adjectives.choose(&mut rand::rng()).unwrap(),
        nouns.choose(&mut rand::rng()).unwrap()
    );

    sqlx::query("INSERT INTO profiles (id,username,full_name) VALUES (?,?,?)")
        .bind(&id)
        .bind(username)
        .bind(&full_name)
        .execute(db_pool)
        .await?;

    tracing::info!(user_id = %id, username, "created profile");
    Ok(id)
}
