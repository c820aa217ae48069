//! In-memory imitation of the ADT endpoints used by `adt-core`.
//!
//! Serves CSRF discovery, check reporters, and ABAP programs with create,
//! read, lock, unlock and source read/write. Failures answer with the same
//! `exc:exception` documents a real system sends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use serde::Deserialize;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const PROGRAM_MIMETYPE: &str = "application/vnd.sap.adt.programs.programs.v2+xml";
pub const REPORTERS_MIMETYPE: &str = "application/vnd.sap.adt.reporters+xml";
const LOCK_RESULT_MIMETYPE: &str =
    "application/vnd.sap.as+xml; charset=utf-8; dataname=com.sap.adt.lock.Result";
const CSRF_HEADER: &str = "x-csrf-token";
const ADTCORE_URI: &[u8] = b"http://www.sap.com/adt/core";

pub const REPORTERS_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<chkrun:checkReporters xmlns:chkrun="http://www.sap.com/adt/checkrun">
  <chkrun:reporter chkrun:name="abapCheckRun">
    <chkrun:supportedType>WDYN*</chkrun:supportedType>
    <chkrun:supportedType>CLAS*</chkrun:supportedType>
    <chkrun:supportedType>PROG*</chkrun:supportedType>
  </chkrun:reporter>
  <chkrun:reporter chkrun:name="tm_release">
    <chkrun:supportedType>RQRQ</chkrun:supportedType>
    <chkrun:supportedType>RQTQ</chkrun:supportedType>
  </chkrun:reporter>
</chkrun:checkReporters>
"#;

#[derive(Clone, Debug, Default)]
pub struct Program {
    pub metadata: String,
    pub source: String,
    pub lock_handle: Option<String>,
}

/// Shared server state. Cloning shares the same store and counters.
#[derive(Clone, Debug)]
pub struct AppState {
    programs: Arc<RwLock<HashMap<String, Program>>>,
    csrf_token: Arc<String>,
    unlocks: Arc<AtomicUsize>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            programs: Arc::default(),
            csrf_token: Arc::new(Uuid::new_v4().to_string()),
            unlocks: Arc::default(),
        }
    }
}

impl AppState {
    /// Number of UNLOCK requests received, successful or not.
    pub fn unlock_count(&self) -> usize {
        self.unlocks.load(Ordering::SeqCst)
    }

    pub async fn program(&self, name: &str) -> Option<Program> {
        self.programs.read().await.get(&name.to_lowercase()).cloned()
    }
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

pub fn app_with_state(state: AppState) -> Router {
    let adt = Router::new()
        .route("/core/discovery", get(discovery))
        .route("/checkruns/reporters", get(reporters))
        .route("/programs/programs", post(create_program))
        .route("/programs/programs/{name}", get(get_program).post(lock_action))
        .route(
            "/programs/programs/{name}/source/main",
            get(read_source).put(write_source),
        );

    Router::new().nest("/sap/bc/adt", adt).with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, AppState::default()).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

/// An `exc:exception` response.
pub fn exception(status: StatusCode, type_id: &str, message: &str) -> Response {
    let body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><exc:exception xmlns:exc="http://www.sap.com/abapxml/types/communicationframework"><namespace id="com.sap.adt"/><type id="{type_id}"/><message lang="EN">{message}</message><localizedMessage lang="EN">{message}</localizedMessage><properties/></exc:exception>"#
    );
    (status, [(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Basic "))
}

/// Reject modifying requests without the token issued by discovery.
fn check_csrf(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let token = headers.get(CSRF_HEADER).and_then(|value| value.to_str().ok());
    if token == Some(state.csrf_token.as_str()) {
        return Ok(());
    }
    Err((
        StatusCode::FORBIDDEN,
        [(CSRF_HEADER, "Required")],
        "CSRF token validation failed",
    )
        .into_response())
}

/// Value of the root element's `name` attribute in the adtcore namespace,
/// whatever prefix the document binds to it.
fn object_name(xml: &str) -> Option<String> {
    let mut reader = NsReader::from_str(xml);
    let root = loop {
        match reader.read_event().ok()? {
            Event::Start(start) | Event::Empty(start) => break start,
            Event::Eof => return None,
            _ => {}
        }
    };

    root.attributes().flatten().find_map(|attr| {
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let adtcore = matches!(resolved, ResolveResult::Bound(Namespace(uri)) if uri == ADTCORE_URI);
        if !adtcore || local.as_ref() != b"name" {
            return None;
        }
        attr.decode_and_unescape_value(reader.decoder())
            .ok()
            .map(|value| value.into_owned())
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionQuery {
    #[serde(rename = "_action")]
    pub action: Option<String>,
    #[serde(rename = "lockHandle")]
    pub lock_handle: Option<String>,
    #[serde(rename = "corrNr")]
    pub corrnr: Option<String>,
}

async fn discovery(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "Logon failed").into_response();
    }
    let fetch = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("fetch"));

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/atomsvc+xml")],
        "<app:service xmlns:app=\"http://www.w3.org/2007/app\"/>",
    )
        .into_response();
    if fetch {
        if let Ok(value) = state.csrf_token.as_str().parse() {
            response.headers_mut().insert(CSRF_HEADER, value);
        }
    }
    response
}

async fn reporters() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, REPORTERS_MIMETYPE)],
        REPORTERS_XML,
    )
        .into_response()
}

async fn create_program(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ActionQuery>,
    body: String,
) -> Response {
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    let Some(name) = object_name(&body) else {
        return exception(
            StatusCode::BAD_REQUEST,
            "ExceptionResourceCreationFailure",
            "Object name is missing",
        );
    };

    let mut programs = state.programs.write().await;
    let key = name.to_lowercase();
    if programs.contains_key(&key) {
        return exception(
            StatusCode::BAD_REQUEST,
            "ExceptionResourceAlreadyExists",
            &format!("Resource Program {name} does already exist."),
        );
    }

    programs.insert(
        key,
        Program {
            metadata: body,
            ..Program::default()
        },
    );
    info!(%name, corrnr = ?query.corrnr, "program created");
    StatusCode::CREATED.into_response()
}

async fn get_program(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.program(&name).await {
        Some(program) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, PROGRAM_MIMETYPE)],
            program.metadata,
        )
            .into_response(),
        None => not_found(&name),
    }
}

fn not_found(name: &str) -> Response {
    exception(
        StatusCode::NOT_FOUND,
        "ExceptionResourceNotFound",
        &format!("Resource Program {} does not exist.", name.to_uppercase()),
    )
}

async fn lock_action(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ActionQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    if query.action.as_deref() == Some("UNLOCK") {
        state.unlocks.fetch_add(1, Ordering::SeqCst);
    }

    let mut programs = state.programs.write().await;
    let Some(program) = programs.get_mut(&name.to_lowercase()) else {
        return not_found(&name);
    };

    match query.action.as_deref() {
        Some("LOCK") => {
            if program.lock_handle.is_some() {
                return exception(
                    StatusCode::FORBIDDEN,
                    "ExceptionResourceNoAccess",
                    &format!("{} is currently locked", name.to_uppercase()),
                );
            }
            let handle = Uuid::new_v4().simple().to_string().to_uppercase();
            program.lock_handle = Some(handle.clone());
            debug!(%name, %handle, "locked");

            let body = format!(
                r#"<?xml version="1.0" encoding="utf-8"?><asx:abap xmlns:asx="http://www.sap.com/abapxml" version="1.0"><asx:values><DATA><LOCK_HANDLE>{handle}</LOCK_HANDLE><CORRNR/><IS_LOCAL>X</IS_LOCAL></DATA></asx:values></asx:abap>"#
            );
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, LOCK_RESULT_MIMETYPE)],
                body,
            )
                .into_response()
        }
        Some("UNLOCK") => {
            if program.lock_handle.is_none() || program.lock_handle != query.lock_handle {
                return exception(
                    StatusCode::BAD_REQUEST,
                    "ExceptionInvalidLockHandle",
                    "The lock handle is not valid",
                );
            }
            program.lock_handle = None;
            debug!(%name, "unlocked");
            StatusCode::OK.into_response()
        }
        other => exception(
            StatusCode::BAD_REQUEST,
            "ExceptionInvalidAction",
            &format!("Unsupported action {}", other.unwrap_or("<none>")),
        ),
    }
}

async fn read_source(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.program(&name).await {
        Some(program) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            program.source,
        )
            .into_response(),
        None => not_found(&name),
    }
}

async fn write_source(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ActionQuery>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }

    let mut programs = state.programs.write().await;
    let Some(program) = programs.get_mut(&name.to_lowercase()) else {
        return not_found(&name);
    };
    if program.lock_handle.is_none() || program.lock_handle != query.lock_handle {
        return exception(
            StatusCode::FORBIDDEN,
            "ExceptionResourceInvalidLockHandle",
            "The object is not locked by this handle",
        );
    }

    program.source = body;
    debug!(%name, bytes = program.source.len(), "source written");
    (StatusCode::OK, Body::empty()).into_response()
}
