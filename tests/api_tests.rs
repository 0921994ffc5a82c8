//! HTTP surface tests: routing, CORS, form handling and error mapping

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use bgremove_api::{backends::MockSessionFactory, ModelName};
use common::{app, body_json, encode, subject_image, urlencoded_request, MultipartBody};
use image::ImageFormat;
use std::sync::Arc;
use tower::ServiceExt;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn jpeg_upload() -> MultipartBody {
    MultipartBody::new().file(
        "image",
        "photo.jpg",
        "image/jpeg",
        &encode(&subject_image(64, 64), ImageFormat::Jpeg),
    )
}

#[tokio::test]
async fn test_index() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["message"], "Background Remover API");
    assert_eq!(json["max_file_size_mb"], 10.0);
    assert!(json["endpoints"]["/remove-background"].is_string());
    let formats = json["supported_formats"].as_array().unwrap();
    assert!(formats.iter().any(|f| f == ".webp"));
}

#[tokio::test]
async fn test_health_lists_loaded_models() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let json = body_json(app.oneshot(get("/health")).await.unwrap()).await;

    assert_eq!(json["status"], "healthy");
    assert_eq!(json["backend"], "mock");
    assert_eq!(json["loaded_models"], serde_json::json!(["u2net"]));
}

#[tokio::test]
async fn test_models() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let json = body_json(app.oneshot(get("/models")).await.unwrap()).await;

    assert_eq!(json["default"], "u2net");
    let models = json["models"].as_array().unwrap();
    assert_eq!(models.len(), ModelName::ALL.len());
    assert!(models.iter().any(|m| m == "isnet-general-use"));
    assert!(json["descriptions"]["u2net_human_seg"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let response = app.oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "Not found");
    assert!(json["message"].as_str().unwrap().contains("/nope"));
}

#[tokio::test]
async fn test_demo_page_is_not_served() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let response = app.oneshot(get("/demo")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Not found");
}

#[tokio::test]
async fn test_options_returns_empty_object() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/remove-background")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({}));
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/remove-background")
        .header(header::ORIGIN, "https://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .to_ascii_uppercase();
    assert!(methods.contains("POST"));
}

#[tokio::test]
async fn test_cors_header_on_simple_request() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_missing_image() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let request = MultipartBody::new().text("model", "u2net").into_request();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No image provided");
}

#[tokio::test]
async fn test_empty_body_is_missing_image() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/remove-background")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_file_name() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let request = MultipartBody::new()
        .file("image", "", "application/octet-stream", b"")
        .into_request();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file selected");
}

#[tokio::test]
async fn test_invalid_model_rejected_before_session_lookup() {
    let factory = Arc::new(MockSessionFactory::new());
    let app = app(Arc::clone(&factory)).await;
    let request = jpeg_upload().text("model", "sam").into_request();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid model");
    assert!(json["message"].as_str().unwrap().contains("u2net"));
    assert_eq!(factory.construction_count(ModelName::U2Net), 1);
}

#[tokio::test]
async fn test_invalid_format() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let request = jpeg_upload().text("format", "gif").into_request();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid output format");
}

#[tokio::test]
async fn test_undecodable_upload() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let request = MultipartBody::new()
        .file("image", "notes.txt", "text/plain", b"definitely not an image")
        .into_request();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid image file");
}

#[tokio::test]
async fn test_pnm_upload_is_unsupported_format() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let mut pnm = b"P6\n64 64\n255\n".to_vec();
    pnm.extend(std::iter::repeat(0x80).take(64 * 64 * 3));
    let request = MultipartBody::new()
        .file("image", "photo.ppm", "image/x-portable-pixmap", &pnm)
        .into_request();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Unsupported image format");
}

#[tokio::test]
async fn test_tiny_image_rejected_before_model() {
    let factory = Arc::new(MockSessionFactory::new());
    let app = app(Arc::clone(&factory)).await;
    let request = MultipartBody::new()
        .file(
            "image",
            "dot.png",
            "image/png",
            &encode(&subject_image(1, 1), ImageFormat::Png),
        )
        .text("model", "u2netp")
        .into_request();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Image dimensions out of range");
    assert!(json["message"].as_str().unwrap().contains("1x1"));
    assert_eq!(factory.construction_count(ModelName::U2NetP), 0);
}

#[tokio::test]
async fn test_oversize_upload_within_body_limit() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let payload = vec![0u8; 11 * 1024 * 1024];
    let request = MultipartBody::new()
        .file("image", "big.jpg", "image/jpeg", &payload)
        .into_request();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["error"], "File too large");
    assert_eq!(json["message"], "Maximum file size is 10.0MB");
}

#[tokio::test]
async fn test_oversize_upload_beyond_body_limit() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let payload = vec![0u8; 15 * 1024 * 1024];
    let request = MultipartBody::new()
        .file("image", "huge.jpg", "image/jpeg", &payload)
        .into_request();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["error"], "File too large");
}

#[tokio::test]
async fn test_invalid_base64() {
    let app = app(Arc::new(MockSessionFactory::new())).await;
    let request = urlencoded_request(&[("image_data", "not base64 at all!")]);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid base64 data");
}

#[tokio::test]
async fn test_inference_failure_is_generic_500() {
    let app = app(Arc::new(MockSessionFactory::new().with_inference_failure())).await;
    let response = app.oneshot(jpeg_upload().into_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Processing failed");
    assert!(!json["message"].as_str().unwrap().contains("mock"));
}
