use std::io::Cursor;
use std::sync::Arc;

use ab_api::{router, AppState};
use ab_auth_simple::SimpleAuthProvider;
use ab_core::jobs::{Job, JobQueue, JobReceiver, JobRunner};
use ab_core::notifications::EmailMessage;
use ab_core::services::BoardService;
use ab_db_sqlite::SqliteBoardRepo;
use ab_mail::MemoryMailer;
use ab_storage_local::LocalMediaStore;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    _media_dir: TempDir,
    router: Router,
    repo: Arc<SqliteBoardRepo>,
    jobs: JobReceiver,
}

impl TestApp {
    async fn new() -> Self {
        let repo = Arc::new(
            SqliteBoardRepo::new("sqlite::memory:")
                .await
                .expect("open sqlite"),
        );
        let (queue, jobs) = JobQueue::channel();
        let service = BoardService::new(repo.clone(), Arc::new(SimpleAuthProvider::new()), queue);
        let media_dir = tempfile::tempdir().expect("temp dir");
        let media = Arc::new(LocalMediaStore::new(media_dir.path(), "/media/ads"));
        Self {
            _media_dir: media_dir,
            router: router(AppState::new(service, media)),
            repo,
            jobs,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        request_json(&self.router, request).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request(Method::POST, uri, body)).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(empty_request(Method::GET, uri)).await
    }

    fn drain_jobs(&mut self) -> Vec<Job> {
        let mut jobs = Vec::new();
        while let Ok(job) = self.jobs.try_recv() {
            jobs.push(job);
        }
        jobs
    }

    /// Runs every queued job through a worker whose mail lands in `outbox`.
    async fn run_jobs(&mut self, outbox: &MemoryMailer) {
        let runner = JobRunner::new(self.repo.clone(), Arc::new(outbox.clone()), "admin@board.com");
        for job in self.drain_jobs() {
            runner.execute(job).await.expect("job runs");
        }
    }

    /// Registers a seller and a category, returning (profile_id, account_id, category_id).
    async fn seed(&mut self) -> (i64, i64, i64) {
        let (status, account) = self
            .post(
                "/api/register/",
                json!({ "username": "seller", "email": "seller@test.com", "password": "pw" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, category) = self
            .post("/api/categories/", json!({ "name": "Electronics" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        self.drain_jobs();
        (
            json_i64_field(&account, "profile_id"),
            json_i64_field(&account, "id"),
            json_i64_field(&category, "id"),
        )
    }

    async fn create_ad(&self, profile_id: i64, category_id: i64, title: &str, price: &str) -> Value {
        let (status, ad) = self
            .post(
                "/api/ads/",
                json!({
                    "title": title,
                    "description": format!("{title} in good condition"),
                    "price": price,
                    "profile_id": profile_id,
                    "category_id": category_id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{ad}");
        ad
    }
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("json request")
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("empty request")
}

fn multipart_request(uri: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let boundary = "ad-board-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("multipart request")
}

async fn read_body(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    (status, bytes.to_vec())
}

async fn request_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = read_body(router, request).await;
    if bytes.is_empty() {
        return (status, Value::Null);
    }
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}

async fn request_html(router: &Router, uri: &str) -> (StatusCode, String) {
    let (status, bytes) = read_body(router, empty_request(Method::GET, uri)).await;
    (status, String::from_utf8(bytes).expect("utf-8 body"))
}

fn json_i64_field(value: &Value, field: &str) -> i64 {
    value
        .get(field)
        .and_then(Value::as_i64)
        .unwrap_or_else(|| panic!("{field} must be an integer in {value}"))
}

fn json_string_field<'a>(value: &'a Value, field: &str) -> &'a str {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("{field} must be a string in {value}"))
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(32, 32, image::Rgb([10, 120, 200]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .expect("encode png");
    out
}

#[tokio::test]
async fn health_probe_answers() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn registration_queues_welcome_mail_and_rejects_duplicate_email() {
    let mut app = TestApp::new().await;
    let (status, account) = app
        .post(
            "/api/register/",
            json!({ "username": "alice", "email": "alice@test.com", "password": "s3cret" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json_string_field(&account, "username"), "alice");
    assert!(account.get("password_hash").is_none());
    assert_eq!(
        app.drain_jobs(),
        vec![Job::SendRegistrationEmail {
            email: "alice@test.com".into()
        }]
    );

    let (status, body) = app
        .post(
            "/api/register/",
            json!({ "username": "alice2", "email": "alice@test.com", "password": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json_string_field(&body, "error"),
        "A user with that email already exists."
    );
    assert!(app.drain_jobs().is_empty());
}

#[tokio::test]
async fn queued_jobs_deliver_welcome_and_ad_created_mail() {
    let mut app = TestApp::new().await;
    let outbox = MemoryMailer::new();

    let (status, account) = app
        .post(
            "/api/register/",
            json!({ "username": "bob", "email": "bob@test.com", "password": "pw" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, category) = app.post("/api/categories/", json!({ "name": "Garden" })).await;
    app.run_jobs(&outbox).await;
    assert_eq!(
        outbox.sent(),
        vec![EmailMessage::registration("admin@board.com", "bob@test.com")]
    );

    let ad = app
        .create_ad(
            json_i64_field(&account, "profile_id"),
            json_i64_field(&category, "id"),
            "Lawn Mower",
            "80",
        )
        .await;
    app.run_jobs(&outbox).await;
    let sent = outbox.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].to, "bob@test.com");
    assert_eq!(sent[1].subject, "Ad Created Successfully!");
    assert!(sent[1].body.contains("Dear bob"));
    assert!(sent[1].body.contains("'Lawn Mower'"));

    // Edits run the sweep but send nothing.
    let ad_id = json_i64_field(&ad, "id");
    let (status, _) = app
        .send(json_request(
            Method::PUT,
            &format!("/api/ads/{ad_id}/"),
            json!({ "title": "Lawn Mower (petrol)" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    app.run_jobs(&outbox).await;
    assert_eq!(outbox.sent().len(), 2);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/categories/")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("error").is_some());
}

#[tokio::test]
async fn ad_writes_queue_sweep_and_only_creation_notifies() {
    let mut app = TestApp::new().await;
    let (profile_id, _, category_id) = app.seed().await;

    let ad = app.create_ad(profile_id, category_id, "Laptop", "250.00").await;
    assert_eq!(json_string_field(&ad, "price"), "250.00");
    assert_eq!(ad["is_active"], json!(true));
    assert_eq!(
        app.drain_jobs(),
        vec![
            Job::DeactivateOldAds,
            Job::NotifyAdCreated {
                to: "seller@test.com".into(),
                username: "seller".into(),
                title: "Laptop".into(),
            },
        ]
    );

    let ad_id = json_i64_field(&ad, "id");
    let (status, updated) = app
        .send(json_request(
            Method::PUT,
            &format!("/api/ads/{ad_id}/"),
            json!({ "price": "199.99" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_string_field(&updated, "price"), "199.99");
    assert_eq!(json_string_field(&updated, "title"), "Laptop");
    assert_eq!(app.drain_jobs(), vec![Job::DeactivateOldAds]);
}

#[tokio::test]
async fn invalid_prices_are_rejected_before_storage() {
    let mut app = TestApp::new().await;
    let (profile_id, _, category_id) = app.seed().await;

    for price in [json!("0"), json!(-5), json!("12.345"), json!("abc")] {
        let (status, body) = app
            .post(
                "/api/ads/",
                json!({
                    "title": "Broken",
                    "description": "Bad price",
                    "price": price,
                    "profile_id": profile_id,
                    "category_id": category_id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "price {price}");
        assert!(body.get("error").is_some());
    }

    let (_, listing) = app.get("/api/ads/").await;
    assert_eq!(listing, json!([]));
    assert!(app.drain_jobs().is_empty());
}

#[tokio::test]
async fn listing_filters_by_inclusive_price_range() {
    let mut app = TestApp::new().await;
    let (profile_id, _, category_id) = app.seed().await;
    for (title, price) in [("A", "50"), ("B", "100"), ("C", "200"), ("D", "300"), ("E", "400")] {
        app.create_ad(profile_id, category_id, title, price).await;
    }

    let (status, listing) = app.get("/api/ads/?price_min=100&price_max=300&sort=-price").await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = listing
        .as_array()
        .expect("listing must be an array")
        .iter()
        .map(|ad| json_string_field(ad, "title"))
        .collect();
    assert_eq!(titles, vec!["D", "C", "B"]);

    let (status, _) = app.get("/api/ads/?price_min=cheap").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, listing) = app.get("/api/ads/?q=&sort=title").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing.as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn out_of_range_price_bounds_still_answer() {
    let mut app = TestApp::new().await;
    let (profile_id, _, category_id) = app.seed().await;
    app.create_ad(profile_id, category_id, "Sofa", "250").await;

    let (status, listing) = app.get("/api/ads/?price_min=79228162514264337593543950335").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing.as_array().map(Vec::len), Some(0));

    let (status, listing) = app.get("/api/ads/?price_max=79228162514264337593543950335").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing.as_array().map(Vec::len), Some(1));

    let (status, _) = request_html(&app.router, "/ads/?price_min=-79228162514264337593543950335").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn comments_are_counted_per_ad() {
    let mut app = TestApp::new().await;
    let (profile_id, account_id, category_id) = app.seed().await;
    let ad = app.create_ad(profile_id, category_id, "Bike", "120").await;
    let quiet = app.create_ad(profile_id, category_id, "Lamp", "15").await;
    let ad_id = json_i64_field(&ad, "id");

    for content in ["Is it still available?", "Can you ship it?"] {
        let (status, _) = app
            .post(
                &format!("/api/ads/{ad_id}/comments/"),
                json!({ "account_id": account_id, "content": content }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = app
        .post(
            &format!("/api/ads/{ad_id}/comments/"),
            json!({ "account_id": account_id, "content": "   " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, comments) = app.get(&format!("/api/ads/{ad_id}/comments/")).await;
    assert_eq!(comments.as_array().map(Vec::len), Some(2));

    let (_, counts) = app.get("/api/ads/with-comment-counts/").await;
    let count_for = |id: i64| {
        counts
            .as_array()
            .expect("counts must be an array")
            .iter()
            .find(|row| json_i64_field(row, "id") == id)
            .map(|row| json_i64_field(row, "comments_count"))
    };
    assert_eq!(count_for(ad_id), Some(2));
    assert_eq!(count_for(json_i64_field(&quiet, "id")), Some(0));

    let (status, html) = request_html(&app.router, &format!("/ads/{ad_id}/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Comments (2)"));
    assert!(html.contains("Comment by seller on Bike"));
}

#[tokio::test]
async fn deleting_an_ad_removes_it_and_its_comments() {
    let mut app = TestApp::new().await;
    let (profile_id, account_id, category_id) = app.seed().await;
    let ad = app.create_ad(profile_id, category_id, "Desk", "80").await;
    let ad_id = json_i64_field(&ad, "id");
    app.post(
        &format!("/api/ads/{ad_id}/comments/"),
        json!({ "account_id": account_id, "content": "Nice desk" }),
    )
    .await;

    let (status, _) = app
        .send(empty_request(Method::DELETE, &format!("/api/ads/{ad_id}/")))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&format!("/api/ads/{ad_id}/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json_string_field(&body, "error").contains("not found"));

    let (status, _) = app.get(&format!("/api/ads/{ad_id}/comments/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(empty_request(Method::DELETE, &format!("/api/ads/{ad_id}/")))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_updates_enforce_the_phone_limit() {
    let mut app = TestApp::new().await;
    let (profile_id, _, _) = app.seed().await;

    let (status, profile) = app
        .send(json_request(
            Method::PUT,
            &format!("/api/profiles/{profile_id}/"),
            json!({ "phone_number": "+15550100", "address": "1 Main St" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_string_field(&profile, "address"), "1 Main St");

    let (status, _) = app
        .send(json_request(
            Method::PUT,
            &format!("/api/profiles/{profile_id}/"),
            json!({ "phone_number": "0123456789012345" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(json_request(Method::PUT, "/api/profiles/999/", json!({})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn image_upload_accepts_images_only() {
    let mut app = TestApp::new().await;
    let (profile_id, _, category_id) = app.seed().await;
    let ad = app.create_ad(profile_id, category_id, "Camera", "300").await;
    let ad_id = json_i64_field(&ad, "id");
    let uri = format!("/api/ads/{ad_id}/image/");

    let (status, _) = app
        .send(multipart_request(&uri, "text/plain", b"not an image"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(multipart_request(&uri, "image/png", b"definitely not a png"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = app
        .send(multipart_request(&uri, "image/png", &png_bytes()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json_string_field(&updated, "image_url").starts_with("/media/ads/"));
    assert!(json_string_field(&updated, "thumbnail_url").ends_with(".webp"));
    app.drain_jobs();

    let (status, _) = app
        .send(multipart_request("/api/ads/999/image/", "image/png", &png_bytes()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn html_pages_render_and_missing_records_are_404() {
    let mut app = TestApp::new().await;
    let (profile_id, account_id, category_id) = app.seed().await;
    app.create_ad(profile_id, category_id, "Guitar", "450").await;

    let (status, html) = request_html(&app.router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("<strong>1</strong>"));

    let (status, html) = request_html(&app.router, "/ads/?q=guit").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Guitar"));

    let (status, html) = request_html(&app.router, "/categories/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Electronics"));
    assert!(html.contains("(1 active)"));

    let (status, html) = request_html(&app.router, &format!("/category/{category_id}/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Guitar"));

    let (status, html) = request_html(&app.router, &format!("/user/{account_id}/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Total ads: 1"));

    for uri in ["/ads/999/", "/category/999/", "/user/999/"] {
        let (status, _) = request_html(&app.router, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }

    let (status, _) = request_html(&app.router, "/ads/?date_from=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
