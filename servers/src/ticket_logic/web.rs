//! # Web Layer
//!
//! Routes:
//!
//! - `GET /`: dashboard, or a redirect to `/secrets` while locked.
//! - `GET /secrets`: unlock form when a vault file exists, entry form
//!   otherwise; redirect to `/` once unlocked.
//! - `POST /submitSecrets`: unlock the vault, or store and encrypt new
//!   credentials. Either path triggers an immediate poll.
//! - `GET /wsTickets`: viewer WebSocket.
//! - `GET /health`: liveness.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use lib_ticketwatch::{SyncEngine, VaultError};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::downstream::handle_viewer;
use super::pages;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
}

/// Body of `POST /submitSecrets`. Unlock mode only needs `password`.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmittedSecrets {
    pub username: String,
    pub integration_code: String,
    pub secret: String,
    pub password: String,
}

pub fn router(state: AppState, log_http: bool) -> Router {
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/secrets", get(secrets_handler))
        .route("/submitSecrets", post(submit_secrets_handler))
        .route("/wsTickets", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    if log_http {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    }
}

async fn root_handler(State(state): State<AppState>) -> Response {
    if !state.engine.vault().credentials_loaded() {
        return Redirect::to("/secrets").into_response();
    }
    let poll_secs = state.engine.policy().poll_interval.as_secs();
    Html(pages::dashboard_page(poll_secs)).into_response()
}

async fn secrets_handler(State(state): State<AppState>) -> Response {
    let vault = state.engine.vault();
    if vault.credentials_loaded() {
        return Redirect::to("/").into_response();
    }
    if vault.encrypted_file_present() {
        Html(pages::unlock_page()).into_response()
    } else {
        Html(pages::enter_page()).into_response()
    }
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// # Submit Secrets
///
/// Unlock mode (vault file present): decrypts with `password`. Any failure
/// to open the file is a 401 with no detail, except I/O which is a 500.
///
/// Entry mode: all four fields are required. The credentials are set in
/// memory and a poll is triggered before the vault is written, so a save
/// failure (500) still leaves the dashboard working for this run.
///
/// Argon2 runs on the blocking pool.
async fn submit_secrets_handler(
    State(state): State<AppState>,
    body: Result<Json<SubmittedSecrets>, JsonRejection>,
) -> Response {
    let Ok(Json(submission)) = body else {
        return json_error(StatusCode::BAD_REQUEST, "Invalid JSON");
    };
    let engine = state.engine;
    let vault = Arc::clone(engine.vault());

    if vault.encrypted_file_present() {
        if submission.password.is_empty() {
            return json_error(StatusCode::BAD_REQUEST, "Password is required");
        }

        let password = submission.password;
        let unlocked =
            tokio::task::spawn_blocking(move || vault.decrypt_from_disk(password.as_bytes())).await;

        return match unlocked {
            Ok(Ok(())) => {
                info!("Credentials unlocked");
                engine.trigger_poll();
                Redirect::to("/").into_response()
            }
            Ok(Err(VaultError::Io(e))) => {
                error!(error = %e, "Could not read credentials file");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read credentials")
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Unlock attempt failed");
                json_error(StatusCode::UNAUTHORIZED, "Failed to unlock credentials")
            }
            Err(e) => {
                error!(error = %e, "Unlock task failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to unlock credentials")
            }
        };
    }

    if submission.username.is_empty()
        || submission.integration_code.is_empty()
        || submission.secret.is_empty()
        || submission.password.is_empty()
    {
        return json_error(
            StatusCode::BAD_REQUEST,
            "Username, integration code, secret and password are required",
        );
    }

    vault.set_credentials(
        submission.username,
        submission.integration_code,
        submission.secret,
    );
    engine.trigger_poll();

    let password = submission.password;
    let saved =
        tokio::task::spawn_blocking(move || vault.encrypt_to_disk(password.as_bytes())).await;

    match saved {
        Ok(Ok(())) => Redirect::to("/").into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "Failed to save credentials");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save credentials")
        }
        Err(e) => {
            error!(error = %e, "Save task failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save credentials")
        }
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move { handle_viewer(socket, &state.engine).await })
}

async fn health_handler() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use lib_ticketwatch::testing::ScriptedSource;
    use lib_ticketwatch::{
        ConnectionRegistry, CredentialVault, KdfParams, SyncPolicy, TicketCache,
    };
    use futures_util::StreamExt;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{WebSocketStream, client_async};
    use tower::ServiceExt;

    const FAST: KdfParams = KdfParams::new(64, 1, 1);

    fn app_with_vault(path: std::path::PathBuf) -> (Router, Arc<SyncEngine>) {
        let engine = Arc::new(SyncEngine::new(
            Arc::new(CredentialVault::with_params(path, FAST)),
            Arc::new(TicketCache::new()),
            Arc::new(ConnectionRegistry::default()),
            Arc::new(ScriptedSource::new()),
            SyncPolicy::default(),
        ));
        let app = router(
            AppState {
                engine: Arc::clone(&engine),
            },
            false,
        );
        (app, engine)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn submit(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/submitSecrets")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn serve(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn connect_viewer(addr: SocketAddr) -> WebSocketStream<TcpStream> {
        let tcp = TcpStream::connect(addr).await.unwrap();
        let (ws, _) = client_async(format!("ws://{addr}/wsTickets"), tcp)
            .await
            .unwrap();
        ws
    }

    async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
        let message = tokio::time::timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("frame within timeout")
            .expect("stream open")
            .unwrap();
        message.to_text().unwrap().to_string()
    }

    async fn wait_for_empty_registry(engine: &SyncEngine) {
        tokio::time::timeout(Duration::from_secs(3), async {
            while !engine.registry().is_empty().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("registry drained");
    }

    #[tokio::test]
    async fn test_viewer_gets_initial_sync_and_is_removed_on_disconnect() {
        let dir = tempfile::tempdir().unwrap();
        let (app, engine) = app_with_vault(dir.path().join("secrets.bin"));
        let addr = serve(app).await;

        let mut ws = connect_viewer(addr).await;
        assert_eq!(next_text(&mut ws).await, "[]");
        let status = next_text(&mut ws).await;
        assert!(status.contains("\"type\":\"status\""));
        assert_eq!(engine.registry().len().await, 1);

        drop(ws);
        wait_for_empty_registry(&engine).await;
        assert_eq!(engine.registry().len().await, 0);
    }

    #[tokio::test]
    async fn test_removed_viewer_socket_is_released_when_peer_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let (app, engine) = app_with_vault(dir.path().join("secrets.bin"));
        let addr = serve(app).await;

        let mut ws = connect_viewer(addr).await;
        next_text(&mut ws).await;
        next_text(&mut ws).await;

        assert!(engine.registry().deregister(1).await);

        // Read raw bytes so no Close reply is ever sent back. The server must
        // still drop the connection, which shows up here as EOF.
        let tcp = ws.get_mut();
        let mut buf = [0u8; 256];
        let eof = tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                match tcp.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
        assert!(eof.is_ok(), "server kept the silent viewer's socket open");
    }

    #[tokio::test]
    async fn test_locked_root_redirects_to_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app_with_vault(dir.path().join("secrets.bin"));

        let response = app.oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/secrets");
    }

    #[tokio::test]
    async fn test_secrets_page_depends_on_vault_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.bin");
        let (app, _) = app_with_vault(path.clone());

        let response = app.clone().oneshot(get("/secrets")).await.unwrap();
        assert!(body_text(response).await.contains("integrationCode"));

        std::fs::write(&path, b"anything").unwrap();
        let response = app.oneshot(get("/secrets")).await.unwrap();
        let page = body_text(response).await;
        assert!(page.contains("Unlock"));
        assert!(!page.contains("integrationCode"));
    }

    #[tokio::test]
    async fn test_entry_requires_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let (app, engine) = app_with_vault(dir.path().join("secrets.bin"));

        let response = app
            .oneshot(submit(r#"{"username":"u","integrationCode":"c","password":"p"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!engine.vault().credentials_loaded());
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app_with_vault(dir.path().join("secrets.bin"));

        let response = app.oneshot(submit("{not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_entry_then_unlock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.bin");
        let (app, engine) = app_with_vault(path.clone());

        let response = app
            .clone()
            .oneshot(submit(
                r#"{"username":"u","integrationCode":"c","secret":"s","password":"pw"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(engine.vault().credentials_loaded());
        assert!(path.exists());

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Fresh process: same file, nothing in memory.
        let (app, engine) = app_with_vault(path);

        let response = app
            .clone()
            .oneshot(submit(r#"{"password":"wrong"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!body_text(response).await.contains("wrong"));
        assert!(!engine.vault().credentials_loaded());

        let response = app.clone().oneshot(submit(r#"{}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(submit(r#"{"password":"pw"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(engine.vault().credentials().username, "u");
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app_with_vault(dir.path().join("secrets.bin"));

        let response = app.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }
}
