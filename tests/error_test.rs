//! Error surface: status codes and S3 error bodies.

mod common;

use common::{create_bucket, put_object, TestServer};

#[tokio::test]
async fn invalid_bucket_name_is_400() {
    let server = TestServer::filesystem().await;
    let http = reqwest::Client::new();

    for name in ["ab", "UPPER", "bad_name", "-leading"] {
        let url = format!("{}/{}", server.endpoint(), name);
        let resp = http.put(&url).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 400, "{name}");
        let body = resp.text().await.unwrap();
        assert!(body.contains("<Code>InvalidBucketName</Code>"), "{body}");
    }
}

#[tokio::test]
async fn get_object_in_missing_bucket_is_no_such_bucket() {
    let server = TestServer::filesystem().await;
    let http = reqwest::Client::new();

    let url = format!("{}/absent/key", server.endpoint());
    let resp = http.get(&url).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<Code>NoSuchBucket</Code>"), "{body}");
}

#[tokio::test]
async fn get_missing_object_is_bare_404() {
    let server = TestServer::filesystem().await;
    let http = reqwest::Client::new();
    create_bucket(&http, &server.endpoint(), "b1").await;

    let url = format!("{}/b1/absent", server.endpoint());
    let resp = http.get(&url).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    assert!(resp.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn get_directory_as_object_is_404() {
    let server = TestServer::filesystem().await;
    let http = reqwest::Client::new();
    create_bucket(&http, &server.endpoint(), "b1").await;
    put_object(
        &http,
        &server.endpoint(),
        "b1",
        "dir/file",
        b"x".to_vec(),
        "text/plain",
    )
    .await;

    let url = format!("{}/b1/dir", server.endpoint());
    let resp = http.get(&url).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn put_into_missing_bucket_is_no_such_bucket() {
    let server = TestServer::filesystem().await;
    let http = reqwest::Client::new();

    let url = format!("{}/absent/a/b", server.endpoint());
    let resp = http.put(&url).body("data").send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<Code>NoSuchBucket</Code>"), "{body}");
}

#[tokio::test]
async fn listing_missing_bucket_is_access_disabled() {
    let server = TestServer::filesystem().await;
    let http = reqwest::Client::new();

    let url = format!("{}/absent", server.endpoint());
    let resp = http.get(&url).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 403);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<Code>AllAccessDisabled</Code>"), "{body}");
}

#[tokio::test]
async fn delete_non_empty_bucket_is_409() {
    let server = TestServer::filesystem().await;
    let http = reqwest::Client::new();
    create_bucket(&http, &server.endpoint(), "b1").await;
    put_object(
        &http,
        &server.endpoint(),
        "b1",
        "blocker",
        b"x".to_vec(),
        "text/plain",
    )
    .await;

    let url = format!("{}/b1", server.endpoint());
    let resp = http.delete(&url).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 409);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<Code>BucketNotEmpty</Code>"), "{body}");
}

#[tokio::test]
async fn key_with_consecutive_slashes_is_invalid() {
    let server = TestServer::filesystem().await;
    let http = reqwest::Client::new();
    create_bucket(&http, &server.endpoint(), "b1").await;

    let url = format!("{}/b1/a//b", server.endpoint());
    let resp = http.put(&url).body("data").send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<Code>InvalidKey</Code>"), "{body}");
}

#[tokio::test]
async fn key_length_boundary_is_exact() {
    // Store paths are capped at 64 bytes: "/buckets" + "/b1" + "/" = 12
    // bytes of prefix, leaving 52 for the key.
    let server = TestServer::filesystem_with_max_path(64).await;
    let http = reqwest::Client::new();
    create_bucket(&http, &server.endpoint(), "b1").await;

    let exact = "k".repeat(52);
    let resp = http
        .put(format!("{}/b1/{}", server.endpoint(), exact))
        .body("fits")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200, "path at the limit should fit");

    let over = "k".repeat(53);
    let resp = http
        .put(format!("{}/b1/{}", server.endpoint(), over))
        .body("spills")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<Code>KeyTooLong</Code>"), "{body}");
}

#[tokio::test]
async fn multipart_mutations_are_501() {
    let server = TestServer::filesystem().await;
    let http = reqwest::Client::new();
    create_bucket(&http, &server.endpoint(), "b1").await;

    // CreateMultipartUpload
    let resp = http
        .post(format!("{}/b1/big?uploads", server.endpoint()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 501);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<Code>NotImplemented</Code>"), "{body}");

    // UploadPart
    let resp = http
        .put(format!(
            "{}/b1/big?partNumber=1&uploadId=u1",
            server.endpoint()
        ))
        .body("part")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 501);

    // AbortMultipartUpload
    let resp = http
        .delete(format!("{}/b1/big?uploadId=u1", server.endpoint()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 501);
}

#[tokio::test]
async fn delete_object_reports_delete_marker_false() {
    let server = TestServer::filesystem().await;
    let http = reqwest::Client::new();
    create_bucket(&http, &server.endpoint(), "b1").await;
    put_object(
        &http,
        &server.endpoint(),
        "b1",
        "gone",
        b"x".to_vec(),
        "text/plain",
    )
    .await;

    let resp = http
        .delete(format!("{}/b1/gone", server.endpoint()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);
    assert_eq!(
        resp.headers().get("x-amz-delete-marker").unwrap(),
        "false"
    );
}
