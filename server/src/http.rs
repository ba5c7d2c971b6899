use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRef, Multipart, Path, Query, State, multipart::MultipartError},
    http::{self, HeaderName, HeaderValue, Method, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Key, PrivateCookieJar};
use entity::{files, projects, users};
use platform_api::{ApiError, FieldError};
use platform_backend::{BackendClient, SessionContext, Transport as _};
use products_projects::{
    AuthGate, GateDecision, ProjectsError, View,
    auth::{self, Registration},
    files::FileUpload,
    projects::ProjectFilter,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    graphql::{self, SchemaType},
    session::{self, Viewer},
};

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub backend: BackendClient,
    pub schema: SchemaType,
    pub config: Arc<AppConfig>,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(backend: BackendClient, config: Arc<AppConfig>) -> Self {
        Self {
            backend,
            schema: graphql::build_schema(),
            cookie_key: config.cookie_key.clone(),
            config,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "projectdesk server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    CorsLayer::new()
        .allow_credentials(true)
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(AllowOrigin::list(allowed))
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    let upload_limit = state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);
    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/signin", post(signin_handler))
        .route("/auth/signup", post(signup_handler))
        .route("/auth/signout", post(signout_handler))
        .route("/auth/session", get(session_handler))
        .route("/views/{view}", get(view_handler))
        .route("/graphql", post(graphql_handler))
        .route("/graphiql", get(graphiql_handler))
        .route(
            "/projects/{id}/files",
            post(upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/reports/projects.csv", get(report_csv_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

#[derive(Serialize)]
struct SessionPayload {
    authenticated: bool,
    user: Option<users::Model>,
}

impl SessionPayload {
    fn signed_out() -> Self {
        Self {
            authenticated: false,
            user: None,
        }
    }

    async fn of(viewer: &Viewer) -> HttpResult<Self> {
        let user = viewer.workspace.my_profile().await?;
        Ok(Self {
            authenticated: true,
            user: Some(user),
        })
    }
}

#[derive(Deserialize)]
struct SignInRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct SignUpRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Serialize)]
struct SignUpPayload {
    user_id: Uuid,
    authenticated: bool,
    /// The address must be confirmed before the first sign-in.
    confirmation_required: bool,
}

async fn signin_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(body): Json<SignInRequest>,
) -> HttpResult<(PrivateCookieJar, Json<SessionPayload>)> {
    let context = SessionContext::new(state.backend.clone());
    auth::sign_in(&context, &body.email, &body.password).await?;
    let jar = session::persist(jar, &context.state())?;
    let payload = match session::viewer(&state, &context).await? {
        Some(viewer) => SessionPayload::of(&viewer).await?,
        None => SessionPayload::signed_out(),
    };
    Ok((jar, Json(payload)))
}

async fn signup_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(body): Json<SignUpRequest>,
) -> HttpResult<(StatusCode, PrivateCookieJar, Json<SignUpPayload>)> {
    let context = SessionContext::new(state.backend.clone());
    let outcome = auth::register(
        &context,
        Registration {
            name: body.name,
            email: body.email,
            password: body.password,
        },
    )
    .await?;
    let jar = session::persist(jar, &context.state())?;
    let payload = SignUpPayload {
        user_id: outcome.user.id,
        authenticated: outcome.session.is_some(),
        confirmation_required: outcome.session.is_none(),
    };
    Ok((StatusCode::CREATED, jar, Json(payload)))
}

async fn signout_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> HttpResult<(PrivateCookieJar, StatusCode)> {
    let (context, jar) = session::restore(&state, jar).await?;
    context.sign_out().await;
    Ok((session::clear_session_cookie(jar), StatusCode::NO_CONTENT))
}

async fn session_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> HttpResult<(PrivateCookieJar, Json<SessionPayload>)> {
    let (context, jar) = session::restore(&state, jar).await?;
    let payload = match session::viewer(&state, &context).await? {
        Some(viewer) => SessionPayload::of(&viewer).await?,
        None => SessionPayload::signed_out(),
    };
    Ok((jar, Json(payload)))
}

#[derive(Serialize)]
struct ViewPayload {
    view: &'static str,
    authenticated: bool,
}

/// Route guard: admits the view or redirects to where the caller belongs.
async fn view_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Path(slug): Path<String>,
) -> HttpResult<Response> {
    let view = View::parse(&slug)
        .ok_or_else(|| HttpError::new(StatusCode::NOT_FOUND, "NOT_FOUND", "unknown view"))?;
    let (context, jar) = session::restore(&state, jar).await?;
    let mut gate = AuthGate::new(context.subscribe());
    let response = match gate.resolve(view).await {
        GateDecision::Redirect(target) => {
            Redirect::to(&format!("/views/{}", target.slug())).into_response()
        }
        GateDecision::Admit | GateDecision::Wait => Json(ViewPayload {
            view: view.slug(),
            authenticated: context.state().session().is_some(),
        })
        .into_response(),
    };
    Ok((jar, response).into_response())
}

async fn graphql_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    request: GraphQLRequest,
) -> HttpResult<(PrivateCookieJar, GraphQLResponse)> {
    let (context, jar) = session::restore(&state, jar).await?;
    let mut req = request.into_inner();
    if let Some(viewer) = session::viewer(&state, &context).await? {
        req = req.data(viewer);
    }
    let response = state.schema.execute(req).await;
    Ok((jar, GraphQLResponse::from(response)))
}

async fn graphiql_handler() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn require_viewer(
    state: &AppState,
    jar: PrivateCookieJar,
) -> HttpResult<(Viewer, PrivateCookieJar)> {
    let (context, jar) = session::restore(state, jar).await?;
    let viewer = session::viewer(state, &context)
        .await?
        .ok_or(HttpError::from(ApiError::Unauthenticated))?;
    Ok((viewer, jar))
}

/// Multipart upload: a `file` part plus an optional `activity_id` text part.
async fn upload_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Path(project_id): Path<Uuid>,
    mut multipart: Multipart,
) -> HttpResult<(StatusCode, PrivateCookieJar, Json<files::Model>)> {
    let (viewer, jar) = require_viewer(&state, jar).await?;

    let mut upload: Option<FileUpload> = None;
    let mut activity_id = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload = Some(FileUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                    activity_id: None,
                });
            }
            Some("activity_id") => {
                let text = field.text().await.map_err(multipart_error)?;
                let text = text.trim();
                if !text.is_empty() {
                    let id = Uuid::parse_str(text)
                        .map_err(|_| ApiError::invalid_field("activityId", "Invalid ID"))?;
                    activity_id = Some(id);
                }
            }
            _ => {}
        }
    }
    let mut upload =
        upload.ok_or_else(|| ApiError::invalid_field("file", "a file part is required"))?;
    upload.activity_id = activity_id;

    let file = viewer.workspace.upload_file(project_id, upload).await?;
    Ok((StatusCode::CREATED, jar, Json(file)))
}

fn multipart_error(err: MultipartError) -> HttpError {
    HttpError::new(err.status(), "BAD_REQUEST", err.body_text())
}

#[derive(Debug, Default, Deserialize)]
struct ReportQuery {
    status: Option<projects::Status>,
    vendor: Option<String>,
    search: Option<String>,
}

async fn report_csv_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(query): Query<ReportQuery>,
) -> HttpResult<Response> {
    let (viewer, jar) = require_viewer(&state, jar).await?;
    let filter = ProjectFilter {
        status: query.status,
        vendor: query.vendor,
        search: query.search,
    };
    let csv = viewer.workspace.export_projects_csv(&filter).await?;
    Ok((
        jar,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"projects.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let backend_ok = state.backend.transport().health().await.is_ok();
    Json(HealthResponse {
        ok: backend_ok,
        backend_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    backend_ok: bool,
    version: &'static str,
}

pub type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    code: &'static str,
    message: String,
    fields: Vec<FieldError>,
}

impl HttpError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        ApiError::internal(err).into()
    }
}

impl From<ApiError> for HttpError {
    fn from(err: ApiError) -> Self {
        if let ApiError::Internal(source) = &err {
            error!(error = ?source, "internal error");
        }
        Self {
            status: StatusCode::from_u16(err.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            code: err.code(),
            message: err.public_message(),
            fields: err.fields().to_vec(),
        }
    }
}

impl From<ProjectsError> for HttpError {
    fn from(err: ProjectsError) -> Self {
        ApiError::from(err).into()
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message,
            "code": self.code,
        });
        if !self.fields.is_empty() {
            body["fields"] = json!(self.fields);
        }
        (self.status, Json(body)).into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, header},
    };
    use entity::users::{self, Role};
    use http_body_util::BodyExt;
    use platform_backend::MemoryTransport;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;

    struct TestApp {
        memory: Arc<MemoryTransport>,
        router: Router,
    }

    async fn app() -> TestApp {
        let memory = Arc::new(MemoryTransport::new());
        let backend = BackendClient::new(memory.clone(), "project-files");
        let config = AppConfig::from_lookup(|_| None, true).unwrap();
        let state = AppState::new(backend, Arc::new(config));
        TestApp {
            memory,
            router: build_router(state),
        }
    }

    impl TestApp {
        async fn seed_user(&self, email: &str, role: Role) {
            let id = self.memory.seed_account(email, "password", "Seeded");
            let mut draft = users::Draft::pending(id, "Seeded", email);
            draft.role = role;
            draft.approved = true;
            BackendClient::new(self.memory.clone(), "project-files")
                .insert_one::<users::Model, _>(&draft)
                .await
                .unwrap();
        }

        async fn send(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }

        async fn sign_in(&self, email: &str) -> String {
            let response = self
                .send(json_request(
                    "/auth/signin",
                    json!({"email": email, "password": "password"}),
                    None,
                ))
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            session_cookie(&response).expect("session cookie")
        }
    }

    fn json_request(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn session_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| value.starts_with(session::SESSION_COOKIE))
            .and_then(|value| value.split(';').next())
            .map(str::to_string)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_backend_reachable() {
        let app = app().await;
        let response = app.send(get("/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["backend_ok"], true);
    }

    #[tokio::test]
    async fn guarded_views_redirect_to_login() {
        let app = app().await;
        let response = app.send(get("/views/projects", None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/views/login");

        let response = app.send(get("/views/login", None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.send(get("/views/nowhere", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn signed_in_users_skip_the_login_view() {
        let app = app().await;
        app.seed_user("pm@example.test", Role::Manager).await;
        let cookie = app.sign_in("pm@example.test").await;

        let response = app.send(get("/views/login", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/views/dashboard");

        let response = app.send(get("/auth/session", Some(&cookie))).await;
        let body = body_json(response).await;
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["user"]["role"], "manager");
    }

    #[tokio::test]
    async fn wrong_passwords_are_rejected_without_a_cookie() {
        let app = app().await;
        app.seed_user("pm@example.test", Role::Manager).await;
        let response = app
            .send(json_request(
                "/auth/signin",
                json!({"email": "pm@example.test", "password": "nope"}),
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(session_cookie(&response).is_none());
    }

    #[tokio::test]
    async fn signup_creates_a_pending_profile() {
        let app = app().await;
        let response = app
            .send(json_request(
                "/auth/signup",
                json!({"name": "Ana", "email": "ana@example.test", "password": "secret1"}),
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = session_cookie(&response).expect("session cookie");

        let response = app.send(get("/auth/session", Some(&cookie))).await;
        let body = body_json(response).await;
        assert_eq!(body["user"]["role"], "pending");
        assert_eq!(body["user"]["approved"], false);
    }

    #[tokio::test]
    async fn graphql_sees_the_cookie_session() {
        let app = app().await;
        app.seed_user("pm@example.test", Role::Manager).await;
        let cookie = app.sign_in("pm@example.test").await;
        let response = app
            .send(json_request(
                "/graphql",
                json!({"query": "{ me { user { email } } }"}),
                Some(&cookie),
            ))
            .await;
        let body = body_json(response).await;
        assert_eq!(body["data"]["me"]["user"]["email"], "pm@example.test");

        let response = app.send(json_request("/auth/signout", json!({}), Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn uploads_and_exports_round_trip() {
        let app = app().await;
        app.seed_user("pm@example.test", Role::Manager).await;
        let cookie = app.sign_in("pm@example.test").await;
        let response = app
            .send(json_request(
                "/graphql",
                json!({
                    "query": "mutation($input: ProjectFieldsInput!) { createProject(input: $input) { id } }",
                    "variables": {"input": {"name": "Quay, phase 2", "vendor": "Acme"}}
                }),
                Some(&cookie),
            ))
            .await;
        let body = body_json(response).await;
        let project_id = body["data"]["createProject"]["id"].as_str().unwrap().to_string();

        let boundary = "XBOUNDARYX";
        let multipart = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"plan.pdf\"\r\nContent-Type: application/pdf\r\n\r\n%PDF-1.4\r\n--{boundary}--\r\n"
        );
        let request = Request::post(format!("/projects/{project_id}/files"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header(header::COOKIE, &cookie)
            .body(Body::from(multipart))
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let file = body_json(response).await;
        assert_eq!(file["name"], "plan.pdf");
        assert_eq!(app.memory.object_paths("project-files").len(), 1);

        let response = app
            .send(get("/reports/projects.csv?vendor=Acme", Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/csv")
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("\"Quay, phase 2\""));
    }

    #[tokio::test]
    async fn uploads_require_a_session() {
        let app = app().await;
        let request = Request::post(format!("/projects/{}/files", Uuid::new_v4()))
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
            .body(Body::from("--x--\r\n"))
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["code"], "UNAUTHENTICATED");
    }
}
