use std::num::NonZeroU32;

use hina::{HinaError, HlsDownloader};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::{encrypt_segment, sequence_iv, HlsMock};

#[tokio::test]
async fn master_playlist_downloads_best_variant() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    server
        .mock_body(
            "/master.m3u8",
            "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=300000
low/media.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=900000
hd/media.m3u8",
        )
        .await
        .mock_body(
            "/hd/media.m3u8",
            "#EXTM3U
#EXTINF:4.0,
one.ts
#EXTINF:4.0,
two.ts
#EXTINF:4.0,
three.ts
#EXT-X-ENDLIST",
        )
        .await
        .mock_body("/hd/one.ts", b"first-")
        .await
        .mock_body("/hd/two.ts", b"second-")
        .await
        .mock_body("/hd/three.ts", b"third")
        .await;

    let downloader = HlsDownloader::new(HeaderMap::new())
        .with_concurrency(NonZeroU32::new(2).unwrap());
    let stream = downloader
        .download(&format!("{}/master.m3u8", server.uri()))
        .await?;

    assert_eq!(stream.len(), b"first-second-third".len());
    assert_eq!(stream.as_ref(), b"first-second-third");
    assert_eq!(stream.content_type(), "video/mp2t");

    // The low-bandwidth variant was never touched.
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| !r.url.path().starts_with("/low")));

    Ok(())
}

#[tokio::test]
async fn media_playlist_downloads_directly() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    server
        .mock_body(
            "/media.m3u8",
            "#EXTM3U
#EXTINF:4.0,
a.ts
#EXT-X-ENDLIST",
        )
        .await
        .mock_body("/a.ts", b"payload")
        .await;

    let downloader = HlsDownloader::new(HeaderMap::new());
    let stream = downloader
        .download(&format!("{}/media.m3u8", server.uri()))
        .await?;

    assert_eq!(stream.as_ref(), b"payload");

    Ok(())
}

#[tokio::test]
async fn playlist_without_segments_fails_the_job() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    server
        .mock_body("/media.m3u8", "#EXTM3U\n#EXT-X-ENDLIST")
        .await;

    let downloader = HlsDownloader::new(HeaderMap::new());
    let result = downloader
        .download(&format!("{}/media.m3u8", server.uri()))
        .await;

    assert!(matches!(result, Err(HinaError::NoSegments)));

    Ok(())
}

#[tokio::test]
async fn unfetchable_manifest_fails_the_job() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    server
        .mock("/missing.m3u8", ResponseTemplate::new(404))
        .await;

    let downloader = HlsDownloader::new(HeaderMap::new());
    let result = downloader
        .download(&format!("{}/missing.m3u8", server.uri()))
        .await;

    assert!(matches!(result, Err(HinaError::HttpError(status)) if status == 404));

    Ok(())
}

#[tokio::test]
async fn encrypted_segments_are_decrypted() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let key = [0x5au8; 16];

    // First key has an explicit IV; the second relies on the media
    // sequence (here seeded at 7, so segment "c" uses sequence 9).
    let explicit_iv = [0x01u8; 16];
    server
        .mock_body(
            "/media.m3u8",
            "#EXTM3U
#EXT-X-MEDIA-SEQUENCE:7
#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\",IV=0x01010101010101010101010101010101
#EXTINF:4.0,
a.ts
#EXTINF:4.0,
b.ts
#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"
#EXTINF:4.0,
c.ts
#EXT-X-ENDLIST",
        )
        .await
        .mock_body("/key.bin", key)
        .await
        .mock_body("/a.ts", encrypt_segment(key, explicit_iv, b"alpha-"))
        .await
        .mock_body("/b.ts", encrypt_segment(key, explicit_iv, b"beta-"))
        .await
        .mock_body("/c.ts", encrypt_segment(key, sequence_iv(9), b"gamma"))
        .await;

    let downloader = HlsDownloader::new(HeaderMap::new());
    let stream = downloader
        .download(&format!("{}/media.m3u8", server.uri()))
        .await?;

    assert_eq!(stream.as_ref(), b"alpha-beta-gamma");

    Ok(())
}

#[tokio::test]
async fn key_after_none_tag_stays_cleared() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let key = [0x33u8; 16];

    server
        .mock_body(
            "/media.m3u8",
            "#EXTM3U
#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"
#EXTINF:4.0,
a.ts
#EXT-X-KEY:METHOD=NONE
#EXTINF:4.0,
b.ts
#EXT-X-ENDLIST",
        )
        .await
        .mock_body("/key.bin", key)
        .await
        .mock_body("/a.ts", encrypt_segment(key, sequence_iv(0), b"secret-"))
        .await
        .mock_body("/b.ts", b"plain")
        .await;

    let downloader = HlsDownloader::new(HeaderMap::new());
    let stream = downloader
        .download(&format!("{}/media.m3u8", server.uri()))
        .await?;

    assert_eq!(stream.as_ref(), b"secret-plain");

    Ok(())
}

#[tokio::test]
async fn credential_headers_are_not_replayed() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    server
        .mock_body(
            "/media.m3u8",
            "#EXTM3U
#EXTINF:4.0,
a.ts
#EXT-X-ENDLIST",
        )
        .await
        .mock_body("/a.ts", b"payload")
        .await;

    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_static("session=secret"));
    headers.insert("x-playback-token", HeaderValue::from_static("keep"));

    let downloader = HlsDownloader::new(headers);
    downloader
        .download(&format!("{}/media.m3u8", server.uri()))
        .await?;

    let requests = server.received_requests().await.unwrap();
    assert!(!requests.is_empty());
    for request in requests {
        assert!(!request.headers.contains_key("cookie"));
        assert_eq!(request.headers["x-playback-token"], "keep");
    }

    Ok(())
}

#[tokio::test]
async fn cancelled_downloader_fails_with_canceled() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    let downloader = HlsDownloader::new(HeaderMap::new());
    downloader.cancellation_token().cancel();

    let result = downloader
        .download(&format!("{}/media.m3u8", server.uri()))
        .await;

    assert!(matches!(result, Err(HinaError::Canceled)));
    assert!(server.received_requests().await.unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn degraded_job_completes_with_missing_segment_bytes() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    server
        .mock_body(
            "/media.m3u8",
            "#EXTM3U
#EXTINF:4.0,
a.ts
#EXTINF:4.0,
gone.ts
#EXTINF:4.0,
c.ts
#EXT-X-ENDLIST",
        )
        .await
        .mock_body("/a.ts", b"head-")
        .await
        .mock_body("/c.ts", b"tail")
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.ts"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let downloader = HlsDownloader::new(HeaderMap::new());
    let stream = downloader
        .download(&format!("{}/media.m3u8", server.uri()))
        .await?;

    assert_eq!(stream.as_ref(), b"head-tail");

    Ok(())
}
