use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, API_PATH, BROKEN_PATH, GARBLED_PATH};
use tower::ServiceExt;

async fn body_text(response: axum::response::Response) -> String {
    let bytes: bytes::Bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(body.to_string())
        .unwrap()
}

// --- ShippingAPI.dll ---

#[tokio::test]
async fn zip_lookup_returns_xml() {
    let body = "API=ZipCodeLookup&XML=%3CZipCodeLookupRequest%20USERID%3D%22u%22%3E\
                %3CAddress%20ID%3D%220%22%3E%3CCity%3EWashington%3C%2FCity%3E%3C%2FAddress%3E\
                %3C%2FZipCodeLookupRequest%3E";
    let resp = app().oneshot(form_request(API_PATH, body)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(http::header::CONTENT_TYPE).unwrap(),
        "text/xml"
    );
    let text = body_text(resp).await;
    assert!(text.contains("<ZipCodeLookupResponse><Address ID=\"0\">"));
    assert!(text.contains("<Zip5>20500</Zip5>"));
}

#[tokio::test]
async fn missing_userid_is_authorization_error() {
    let body = "API=ZipCodeLookup&XML=%3CZipCodeLookupRequest%2F%3E";
    let resp = app().oneshot(form_request(API_PATH, body)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let text = body_text(resp).await;
    assert!(text.contains("<Error><Number>80040B1A</Number>"));
}

#[tokio::test]
async fn missing_form_fields_are_rejected() {
    let resp = app()
        .oneshot(form_request(API_PATH, "API=ZipCodeLookup"))
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn get_is_not_allowed() {
    let resp = app()
        .oneshot(Request::builder().uri(API_PATH).body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// --- failure routes ---

#[tokio::test]
async fn broken_returns_500() {
    let resp = app().oneshot(form_request(BROKEN_PATH, "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn garbled_returns_truncated_error() {
    let resp = app().oneshot(form_request(GARBLED_PATH, "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let text = body_text(resp).await;
    assert!(text.starts_with("<Error>"));
    assert!(!text.contains("</Error>"));
}

#[tokio::test]
async fn unknown_path_is_404() {
    let resp = app().oneshot(form_request("/nope", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
