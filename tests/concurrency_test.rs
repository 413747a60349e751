//! Concurrent access through the full HTTP stack.

mod common;

use aws_sdk_s3::primitives::ByteStream;
use common::TestServer;
use tokio::task::JoinSet;

/// Fan out bucket creation with bounded parallelism, then confirm the
/// listing reports every bucket exactly once.
#[tokio::test]
async fn concurrent_bucket_creation_lists_completely() {
    const BUCKETS: usize = 200;
    const PARALLELISM: usize = 20;

    let server = TestServer::filesystem().await;
    let client = server.s3_client().await;

    let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(PARALLELISM));
    let mut tasks = JoinSet::new();
    for i in 0..BUCKETS {
        let client = client.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire().await.unwrap();
            let name = format!("b{:04}", i);
            client
                .create_bucket()
                .bucket(&name)
                .send()
                .await
                .unwrap_or_else(|e| panic!("create {name} failed: {e}"));
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    let listing = client.list_buckets().send().await.unwrap();
    let mut names: Vec<_> = listing
        .buckets()
        .iter()
        .filter_map(|b| b.name().map(String::from))
        .collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), BUCKETS);
    assert_eq!(names[0], "b0000");
    assert_eq!(names[BUCKETS - 1], format!("b{:04}", BUCKETS - 1));
}

/// Concurrent writers to distinct keys in one bucket all land.
#[tokio::test]
async fn concurrent_puts_to_one_bucket() {
    const WRITERS: usize = 32;

    let server = TestServer::filesystem().await;
    let client = server.s3_client().await;
    client.create_bucket().bucket("shared").send().await.unwrap();

    let mut tasks = JoinSet::new();
    for i in 0..WRITERS {
        let client = client.clone();
        tasks.spawn(async move {
            let key = format!("dir-{}/obj-{}", i % 4, i);
            client
                .put_object()
                .bucket("shared")
                .key(&key)
                .body(ByteStream::from(format!("payload {i}").into_bytes()))
                .send()
                .await
                .unwrap_or_else(|e| panic!("put {key} failed: {e}"));
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    for i in 0..WRITERS {
        let key = format!("dir-{}/obj-{}", i % 4, i);
        let body = client
            .get_object()
            .bucket("shared")
            .key(&key)
            .send()
            .await
            .unwrap()
            .body
            .collect()
            .await
            .unwrap()
            .into_bytes();
        assert_eq!(body.as_ref(), format!("payload {i}").as_bytes());
    }
}

/// Last writer wins on a contended key and the result is one of the
/// written payloads, never a torn mix.
#[tokio::test]
async fn contended_key_is_never_torn() {
    const WRITERS: usize = 8;

    let server = TestServer::filesystem().await;
    let client = server.s3_client().await;
    client.create_bucket().bucket("race").send().await.unwrap();

    let mut tasks = JoinSet::new();
    for i in 0..WRITERS {
        let client = client.clone();
        tasks.spawn(async move {
            let payload = vec![b'a' + i as u8; 64 * 1024];
            client
                .put_object()
                .bucket("race")
                .key("hot")
                .body(ByteStream::from(payload))
                .send()
                .await
                .unwrap();
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    let body = client
        .get_object()
        .bucket("race")
        .key("hot")
        .send()
        .await
        .unwrap()
        .body
        .collect()
        .await
        .unwrap()
        .into_bytes();
    assert_eq!(body.len(), 64 * 1024);
    let first = body[0];
    assert!(body.iter().all(|b| *b == first), "mixed payloads in object");
}
