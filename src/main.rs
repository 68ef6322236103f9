use axum::{
    debug_handler,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use helpline::{
    auth, chat, db, feed::Feed, include_res, profiles, session, AppResult, AppState,
};
use tower_http::cors::CorsLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, Session, SessionManagerLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "helpline=info".into()),
        )
        .init();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(30)));

    let db_url = dotenv::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:helpline.db".to_owned());
    let db_pool = db::connect(&db_url).await.unwrap();
    db::init(&db_pool).await.unwrap();

    let app_state = AppState {
        db_pool,
        feed: Feed::new(),
    };

    let app = Router::new()
        .route("/", get(index))
        .merge(auth::router())
        .nest("/c", chat::router())
        .nest("/u", profiles::router())
        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive());

    let addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

#[debug_handler]
async fn index(session: Session) -> AppResult<Response> {
    if session::current_user(&session).await?.is_none() {
        return Ok(Redirect::to("/login").into_response());
    }

    let compose_link = if session::is_admin(&session).await? {
        "<a href='/c/compose'>New Message</a>"
    } else {
        ""
    };
    Ok(Html(
        include_res!(str, "/pages/index.html").replace("{compose_link}", compose_link),
    )
    .into_response())
}
