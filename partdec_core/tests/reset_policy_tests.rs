use std::time::Duration;

use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use partdec_core::config::{DownloadConfig, IOMode};
use partdec_core::part::{PartState, ResetPolicy};

fn base_config(uri: String, dir: std::path::PathBuf) -> DownloadConfig {
    DownloadConfig {
        uri,
        base_path: dir.clone(),
        dst_dirs: vec![dir],
        part_count: 2,
        part_size: None,
        reset: ResetPolicy::default(),
        force: false,
        max_concurrent: 2,
        io_mode: IOMode { retry: 1, timeout: Duration::from_secs(5), user_headers: Vec::new(), no_conn_reuse: false },
    }
}

#[tokio::test]
async fn completed_part_is_skipped_without_reset() {
    let server = MockServer::start().await;
    let body = vec![7u8; 200];

    Mock::given(method("HEAD"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Accept-Ranges", "bytes")
                .insert_header("Content-Length", body.len().to_string()),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(move |req: &wiremock::Request| {
            let range = req.headers.get("Range").and_then(|v| v.to_str().ok()).unwrap_or("bytes=0-0");
            let spec = range.trim_start_matches("bytes=");
            let mut parts = spec.splitn(2, '-');
            let start: usize = parts.next().unwrap_or("0").parse().unwrap_or(0);
            let end: usize = parts.next().and_then(|s| s.parse().ok()).unwrap_or(body.len() - 1);
            let end = end.min(body.len() - 1);
            wiremock::ResponseTemplate::new(206)
                .insert_header("Content-Range", format!("bytes {start}-{end}/{}", body.len()))
                .set_body_bytes(body[start..=end].to_vec())
        })
        .mount(&server)
        .await;

    let temp = tempfile::tempdir().unwrap();

    // Pre-seed part 0 as already complete on disk.
    let cfg = base_config(server.uri(), temp.path().to_path_buf());
    let outcome = partdec_core::run(cfg, Vec::new()).await.unwrap();
    for part in &outcome.plan.parts {
        assert!(std::fs::metadata(&part.path).is_ok());
    }

    // Re-running against the same directory should classify every part as
    // Completed and skip refetching (no network calls beyond the probe).
    let mut cfg2 = base_config(server.uri(), temp.path().to_path_buf());
    cfg2.reset = ResetPolicy::default();
    let outcome2 = partdec_core::run(cfg2, Vec::new()).await.unwrap();
    for part in &outcome2.plan.parts {
        assert_eq!(part.state(), PartState::Completed);
    }
}

#[tokio::test]
async fn reset_completed_forces_a_refetch() {
    let server = MockServer::start().await;
    let body = vec![3u8; 100];

    Mock::given(method("HEAD"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Accept-Ranges", "bytes")
                .insert_header("Content-Length", body.len().to_string()),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(move |req: &wiremock::Request| {
            match req.headers.get("Range").and_then(|v| v.to_str().ok()) {
                Some(range) => {
                    let spec = range.trim_start_matches("bytes=");
                    let mut parts = spec.splitn(2, '-');
                    let start: usize = parts.next().unwrap_or("0").parse().unwrap_or(0);
                    let end: usize = parts.next().and_then(|s| s.parse().ok()).unwrap_or(body.len() - 1);
                    let end = end.min(body.len() - 1);
                    ResponseTemplate::new(206)
                        .insert_header("Content-Range", format!("bytes {start}-{end}/{}", body.len()))
                        .set_body_bytes(body[start..=end].to_vec())
                }
                // No Range header: a full-range, known-size single part is
                // fetched with a plain GET (see ByteRange::effective_start).
                None => ResponseTemplate::new(200)
                    .insert_header("Content-Length", body.len().to_string())
                    .set_body_bytes(body.clone()),
            }
        })
        .mount(&server)
        .await;

    let temp = tempfile::tempdir().unwrap();
    let mut cfg = base_config(server.uri(), temp.path().to_path_buf());
    cfg.part_count = 1;
    let first = partdec_core::run(cfg, Vec::new()).await.unwrap();

    // Corrupt the completed file's contents so a plain rerun would leave
    // it untouched (still classified Completed, same byte length).
    std::fs::write(&first.plan.parts[0].path, vec![0xFFu8; body.len()]).unwrap();

    let mut cfg2 = base_config(server.uri(), temp.path().to_path_buf());
    cfg2.part_count = 1;
    cfg2.reset = ResetPolicy { resume: false, completed: true, broken: false };
    let outcome = partdec_core::run(cfg2, Vec::new()).await.unwrap();

    let contents = std::fs::read(&outcome.plan.parts[0].path).unwrap();
    assert_eq!(contents, body);
}
