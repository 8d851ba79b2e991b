use std::{collections::BTreeMap, collections::HashMap, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    routing::{any, delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub const API_PREFIX: &str = "/api/rest";
pub const PRIVACY_HTML: &str = "<h1>Privacy</h1>";
pub const SLOW_DELAY: Duration = Duration::from_millis(300);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
}

#[derive(Deserialize)]
pub struct CreatePost {
    pub title: String,
}

/// What the echo endpoint saw.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub body: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Upload {
    pub id: Uuid,
    pub fields: BTreeMap<String, String>,
    pub files: Vec<UploadedFile>,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Post>>>;

type ApiError = (StatusCode, Json<Value>);

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    let api = Router::new()
        .route("/help/privacy", get(privacy))
        .route("/help/missing", get(missing))
        .route("/help/empty", get(empty))
        .route("/help/broken", get(broken))
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", delete(delete_post))
        .route("/echo", any(echo))
        .route("/pictures", post(upload_picture))
        .route("/slow", get(slow))
        .with_state(db);
    Router::new().nest(API_PREFIX, api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// `{"error": {"message": ...}}` with the given status.
pub fn error_response(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": { "message": message } })))
}

async fn privacy() -> Json<Value> {
    Json(json!({ "status_code": 200, "body": PRIVACY_HTML }))
}

async fn missing() -> ApiError {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(SLOW_DELAY).await;
    Json(json!({ "status_code": 200, "body": "slow" }))
}

async fn list_posts(State(db): State<Db>) -> Json<Vec<Post>> {
    let posts = db.read().await;
    let mut posts: Vec<Post> = posts.values().cloned().collect();
    posts.sort_by(|a, b| a.title.cmp(&b.title));
    Json(posts)
}

async fn create_post(
    State(db): State<Db>,
    Json(input): Json<CreatePost>,
) -> (StatusCode, Json<Post>) {
    let post = Post {
        id: Uuid::new_v4(),
        title: input.title,
    };
    info!(id = %post.id, "created post");
    db.write().await.insert(post.id, post.clone());
    (StatusCode::CREATED, Json(post))
}

async fn delete_post(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut posts = db.write().await;
    posts
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Post not found"))
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(Echo {
        method: method.to_string(),
        query: uri.query().map(str::to_string),
        content_type: header(header::CONTENT_TYPE.as_str()),
        consumer_key: header("oauth_consumer_key"),
        consumer_secret: header("oauth_consumer_secret"),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn upload_picture(mut multipart: Multipart) -> Result<(StatusCode, Json<Upload>), ApiError> {
    let bad_request = |e: axum::extract::multipart::MultipartError| {
        error_response(StatusCode::BAD_REQUEST, &e.to_string())
    };

    let mut upload = Upload {
        id: Uuid::new_v4(),
        ..Upload::default()
    };
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(bad_request)?;
                upload.files.push(UploadedFile {
                    field: name,
                    file_name,
                    content_type,
                    size: data.len(),
                });
            }
            None => {
                let text = field.text().await.map_err(bad_request)?;
                upload.fields.insert(name, text);
            }
        }
    }

    if upload.files.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "No image"));
    }
    info!(id = %upload.id, files = upload.files.len(), "stored picture");
    Ok((StatusCode::CREATED, Json(upload)))
}
