use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::gemini::{GeminiError, Generative};
use crate::models::{
    AgeGroup, EditedImage, HookBatch, HookRequest, ImageEditRequest, Language, LengthCategory,
    Platform, Session, SignInRequest, VideoType, MAX_IMAGE_BYTES, SUGGESTED_CATEGORIES,
};

pub const SESSION_HEADER: &str = "x-session-token";

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    pub in_flight: Arc<Mutex<HashSet<Uuid>>>,
    pub gemini: Arc<dyn Generative>,
}

impl AppState {
    pub fn new(gemini: Arc<dyn Generative>) -> Self {
        Self { sessions: Arc::default(), in_flight: Arc::default(), gemini }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Please sign in first.")]
    Unauthorized,
    #[error("A generation is already running. Please wait for it to finish.")]
    Busy,
    #[error("Generation failed. Please try again.")]
    Upstream,
    #[error("No image produced. Please try again.")]
    NoImage,
}

impl From<GeminiError> for ApiError {
    fn from(err: GeminiError) -> Self {
        error!("❌ Gemini call failed: {}", err);
        match err {
            GeminiError::NoImage => ApiError::NoImage,
            // Transport and schema failures look the same to the caller.
            GeminiError::Http(_) | GeminiError::Schema(_) => ApiError::Upstream,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Busy => StatusCode::CONFLICT,
            ApiError::Upstream | ApiError::NoImage => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Session, ApiError> {
    let token = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(ApiError::Unauthorized)?;
    state.sessions.read().get(&token).cloned().ok_or(ApiError::Unauthorized)
}

/// Per-session generation slot. A second submission while the slot is taken
/// gets 409; the slot frees on drop, so cancelled handlers release it too.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<Uuid>>>,
    token: Uuid,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<Uuid>>>, token: Uuid) -> Result<Self, ApiError> {
        if !set.lock().insert(token) {
            return Err(ApiError::Busy);
        }
        Ok(Self { set: set.clone(), token })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.token);
    }
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(body): Json<SignInRequest>,
) -> Result<Json<Session>, ApiError> {
    let email = body.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("Please enter a valid email address.".into()));
    }

    let session = Session {
        token: Uuid::new_v4(),
        email: email.to_string(),
        name: body.name.filter(|n| !n.trim().is_empty()),
        signed_in_at: Utc::now(),
    };
    state.sessions.write().insert(session.token, session.clone());
    info!("🔐 Signed in: {}", session.email);
    Ok(Json(session))
}

pub async fn current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(authenticate(&state, &headers)?))
}

pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let token = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok());
    if let Some(token) = token {
        if state.sessions.write().remove(&token).is_some() {
            info!("👋 Signed out: {}", token);
        }
    }
    StatusCode::NO_CONTENT
}

/// Option sets the form renders. Labels match the request wire format.
pub async fn options() -> Json<serde_json::Value> {
    Json(json!({
        "languages": Language::ALL,
        "ageGroups": AgeGroup::ALL,
        "videoTypes": VideoType::ALL,
        "platforms": Platform::ALL,
        "lengths": LengthCategory::ALL,
        "suggestedCategories": SUGGESTED_CATEGORIES,
    }))
}

pub async fn generate_hooks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<HookRequest>,
) -> Result<Json<HookBatch>, ApiError> {
    let session = authenticate(&state, &headers)?;
    if body.topic.trim().is_empty() {
        return Err(ApiError::Validation("Please enter a topic.".into()));
    }
    let _slot = InFlightGuard::acquire(&state.in_flight, session.token)?;

    info!("🚀 Generating hooks for {} (topic: {})", session.email, body.topic.trim());
    let hooks = state.gemini.generate_hooks(&body).await?;
    info!("✅ Returned {} hooks to {}", hooks.len(), session.email);
    Ok(Json(HookBatch { hooks, generated_at: Utc::now() }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditImageResponse {
    #[serde(flatten)]
    pub image: EditedImage,
    pub data_url: String,
}

pub async fn edit_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<EditImageResponse>, ApiError> {
    let session = authenticate(&state, &headers)?;

    let mut upload: Option<(String, Bytes)> = None;
    let mut instruction = String::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid upload: {}", e)))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("image") => {
                let declared = field.content_type().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Invalid upload: {}", e)))?;
                upload = Some((declared, data));
            }
            Some("instruction") => {
                instruction = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Invalid upload: {}", e)))?;
            }
            _ => {}
        }
    }

    let (declared_mime, data) =
        upload.ok_or_else(|| ApiError::Validation("Please upload an image.".into()))?;
    if instruction.trim().is_empty() {
        return Err(ApiError::Validation("Please enter an edit instruction.".into()));
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::Validation("Image is larger than 5MB.".into()));
    }
    let format = image::guess_format(&data)
        .map_err(|_| ApiError::Validation("Unsupported image format. Use PNG or JPG.".into()))?;
    if !matches!(format, image::ImageFormat::Png | image::ImageFormat::Jpeg) {
        return Err(ApiError::Validation("Unsupported image format. Use PNG or JPG.".into()));
    }
    let mime_type = if declared_mime.starts_with("image/") {
        declared_mime
    } else {
        format.to_mime_type().to_string()
    };

    let _slot = InFlightGuard::acquire(&state.in_flight, session.token)?;

    info!("🖼️ Editing image for {} ({} bytes)", session.email, data.len());
    let edited = state
        .gemini
        .edit_image(ImageEditRequest {
            mime_type,
            data,
            instruction: instruction.trim().to_string(),
        })
        .await?;
    let data_url = edited.data_url();
    Ok(Json(EditImageResponse { image: edited, data_url }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/session", post(sign_in).get(current_session).delete(sign_out))
        .route("/api/options", get(options))
        .route("/api/hooks", post(generate_hooks))
        .route("/api/image/edit", post(edit_image))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeneratedHook, HookTag};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    #[derive(Default)]
    struct FakeBackend {
        hooks: Vec<GeneratedHook>,
        gate: Option<Arc<Notify>>,
        calls: Arc<AtomicUsize>,
        no_image: bool,
    }

    #[async_trait::async_trait]
    impl Generative for FakeBackend {
        async fn generate_hooks(
            &self,
            _req: &HookRequest,
        ) -> Result<Vec<GeneratedHook>, GeminiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(self.hooks.clone())
        }

        async fn edit_image(&self, req: ImageEditRequest) -> Result<EditedImage, GeminiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.no_image {
                return Err(GeminiError::NoImage);
            }
            Ok(EditedImage { mime_type: req.mime_type, data: req.data.to_vec() })
        }
    }

    fn sample_hooks() -> Vec<GeneratedHook> {
        vec![
            GeneratedHook {
                text: "Stop scrolling.".into(),
                tag: HookTag::PatternInterrupt,
                explanation: Some("abrupt".into()),
            },
            GeneratedHook { text: "Wait for it.".into(), tag: HookTag::Curiosity, explanation: None },
        ]
    }

    fn test_app(backend: FakeBackend) -> Router {
        router(AppState::new(Arc::new(backend)))
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn sign_in_token(app: &Router) -> String {
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/session")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"email":"creator@example.com"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        body_json(resp).await["token"].as_str().unwrap().to_string()
    }

    fn hooks_request(token: &str, topic: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/hooks")
            .header("content-type", "application/json")
            .header(SESSION_HEADER, token)
            .body(Body::from(
                json!({ "topic": topic, "language": "English" }).to_string(),
            ))
            .unwrap()
    }

    fn png_multipart(token: &str, instruction: &str) -> Request<Body> {
        let boundary = "hookgen-test-boundary";
        let mut body: Vec<u8> = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; \
                 filename=\"thumb.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3]);
        body.extend_from_slice(
            format!(
                "\r\n--{boundary}\r\nContent-Disposition: form-data; \
                 name=\"instruction\"\r\n\r\n{instruction}\r\n--{boundary}--\r\n"
            )
            .as_bytes(),
        );
        Request::builder()
            .method("POST")
            .uri("/api/image/edit")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .header(SESSION_HEADER, token)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let app = test_app(FakeBackend::default());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/session")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"email":"nope"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn hooks_require_a_session() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = test_app(FakeBackend { calls: calls.clone(), ..Default::default() });
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/hooks")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"topic":"t","language":"English"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_topic_never_reaches_the_backend() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = test_app(FakeBackend { calls: calls.clone(), ..Default::default() });
        let token = sign_in_token(&app).await;
        let resp = app.oneshot(hooks_request(&token, "   ")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hooks_round_trip_through_the_backend() {
        let app = test_app(FakeBackend { hooks: sample_hooks(), ..Default::default() });
        let token = sign_in_token(&app).await;
        let resp = app.oneshot(hooks_request(&token, "AI Revolution")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["hooks"].as_array().unwrap().len(), 2);
        assert_eq!(body["hooks"][0]["type"], "pattern-interrupt");
        assert_eq!(body["hooks"][1].get("explanation"), None);
        assert!(body["generatedAt"].is_string());
    }

    #[tokio::test]
    async fn overlapping_submission_is_rejected_with_conflict() {
        let gate = Arc::new(Notify::new());
        let app = test_app(FakeBackend {
            hooks: sample_hooks(),
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let token = sign_in_token(&app).await;

        let first = tokio::spawn(app.clone().oneshot(hooks_request(&token, "first")));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = app.clone().oneshot(hooks_request(&token, "second")).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);

        gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        // Slot released after completion; a fresh submission goes through.
        gate.notify_one();
        let third = app.oneshot(hooks_request(&token, "third")).await.unwrap();
        assert_eq!(third.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sign_out_invalidates_the_token() {
        let app = test_app(FakeBackend::default());
        let token = sign_in_token(&app).await;

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/session")
                    .header(SESSION_HEADER, &token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/session")
                    .header(SESSION_HEADER, &token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn options_lists_every_form_choice() {
        let app = test_app(FakeBackend::default());
        let resp =
            app.oneshot(Request::builder().uri("/api/options").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["languages"].as_array().unwrap().len(), 4);
        assert_eq!(body["platforms"].as_array().unwrap().len(), 8);
        assert_eq!(body["suggestedCategories"].as_array().unwrap().len(), 18);
        assert_eq!(body["ageGroups"][2], "Youth (20–35)");
    }

    #[tokio::test]
    async fn image_edit_round_trips_mime_and_payload() {
        let app = test_app(FakeBackend::default());
        let token = sign_in_token(&app).await;
        let resp = app.oneshot(png_multipart(&token, "add a retro filter")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["mimeType"], "image/png");
        assert!(body["dataUrl"].as_str().unwrap().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn image_edit_surfaces_no_image_produced() {
        let app = test_app(FakeBackend { no_image: true, ..Default::default() });
        let token = sign_in_token(&app).await;
        let resp = app.oneshot(png_multipart(&token, "make it pop")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "No image produced. Please try again.");
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected_locally() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = test_app(FakeBackend { calls: calls.clone(), ..Default::default() });
        let token = sign_in_token(&app).await;

        let boundary = "hookgen-test-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; \
             filename=\"notes.txt\"\r\nContent-Type: text/plain\r\n\r\nhello\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"instruction\"\r\n\r\nedit\r\n\
             --{boundary}--\r\n"
        );
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/image/edit")
                    .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                    .header(SESSION_HEADER, &token)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
