#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use storefront_api::{
    build_router,
    config::{AppConfig, ImageBackend, StorageBackend},
    handlers::AppServices,
    repositories::MemoryStore,
    storage::{ImageStore, ImageUpload, MemoryImageStore, StorageError},
    AppState,
};

pub const SELLER_EMAIL: &str = "seller@example.com";
pub const SELLER_PASSWORD: &str = "correct-horse-battery";
pub const JWT_SECRET: &str = "integration_test_secret_that_is_long_enough";
const BOUNDARY: &str = "storefront-test-boundary";

/// Image store that remembers every delete and can be told to fail.
pub struct RecordingImageStore {
    inner: MemoryImageStore,
    deleted: Mutex<Vec<String>>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl RecordingImageStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryImageStore::new("https://res.cloudinary.test/demo", Some("products".into())),
            deleted: Mutex::new(Vec::new()),
            fail_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn stored(&self) -> usize {
        self.inner.len().await
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.contains(key).await
    }
}

#[async_trait]
impl ImageStore for RecordingImageStore {
    async fn upload(&self, image: ImageUpload) -> Result<String, StorageError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Upload(format!(
                "Upload rejected: {}",
                image.file_name
            )));
        }
        self.inner.upload(image).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.deleted.lock().unwrap().push(key.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Delete("Image storage unavailable".into()));
        }
        self.inner.delete(key).await
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        SELLER_EMAIL.to_string(),
        SELLER_PASSWORD.to_string(),
        JWT_SECRET.to_string(),
        "test".to_string(),
    );
    cfg.storage_backend = StorageBackend::Memory;
    cfg.image_backend = ImageBackend::Memory;
    cfg
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub images: Arc<RecordingImageStore>,
    token: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub set_cookie: Option<String>,
    pub body: Value,
}

/// One part of a multipart form.
pub enum FormPart<'a> {
    Text(&'a str, String),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

pub fn image(file_name: &str) -> FormPart<'_> {
    FormPart::File {
        name: "images",
        file_name,
        content_type: "image/jpeg",
        bytes: b"\xff\xd8\xff\xe0fake-jpeg",
    }
}

pub fn multipart_body(parts: &[FormPart<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            FormPart::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            FormPart::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

impl TestApp {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let images = Arc::new(RecordingImageStore::new());
        let image_store: Arc<dyn ImageStore> = images.clone();
        let services = AppServices::new(store.clone(), image_store);
        let state = AppState::new(test_config(), services);
        let token = state
            .seller_auth
            .issue_token()
            .expect("issue seller token");

        Self {
            router: build_router(state),
            store,
            images,
            token,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };

        TestResponse {
            status,
            set_cookie,
            body,
        }
    }

    pub async fn request_json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        authed: bool,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if authed {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request_json(Method::GET, uri, None, false).await
    }

    pub async fn seller_json(&self, method: Method, uri: &str, body: Value) -> TestResponse {
        self.request_json(method, uri, Some(body), true).await
    }

    pub async fn seller_multipart(&self, uri: &str, parts: &[FormPart<'_>]) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .expect("build multipart request");
        self.send(request).await
    }

    pub async fn create_car(&self, brand: &str, model: &str, years: &[i32]) -> Value {
        let response = self
            .seller_json(
                Method::POST,
                "/api/car",
                json!({"brand": brand, "model": model, "productionYears": years}),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["car"].clone()
    }

    /// Adds a product with the given number of images and returns it.
    pub async fn add_product(&self, data: Value, image_names: &[&str]) -> Value {
        let mut parts = vec![FormPart::Text("productData", data.to_string())];
        parts.extend(image_names.iter().map(|name| image(name)));
        let response = self.seller_multipart("/api/product/add", &parts).await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        response.body["product"].clone()
    }
}

pub fn brake_pads() -> Value {
    json!({
        "name": "Ceramic brake pads",
        "description": "Low dust\nQuiet braking",
        "category": "brakes",
        "price": 89.99,
        "offerPrice": 74.5,
    })
}

pub fn image_urls(product: &Value) -> Vec<String> {
    product["image"]
        .as_array()
        .expect("image array")
        .iter()
        .map(|v| v.as_str().expect("url").to_string())
        .collect()
}
