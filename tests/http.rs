//! Remote inspection over HTTP Range requests against a loopback server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use apkarch::test_utils::{ZipBuilder, fake_elf};
use apkarch::{HttpRangeReader, PackageInspector, ReadAt};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the test server answers.
#[derive(Clone, Copy)]
enum Mode {
    /// Advertises and honours Range requests.
    Ranges,
    /// Omits `Accept-Ranges` from the HEAD response.
    NoAcceptRanges,
    /// Advertises ranges but answers GET with a full 200 response.
    IgnoresRange,
}

fn sample_package() -> Vec<u8> {
    ZipBuilder::new()
        .deflated("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n")
        .directory("lib/")
        .deflated("lib/armeabi/libfoo.so", &fake_elf(1, 1, 0x28))
        .stored("lib/mips/libbar.so", &fake_elf(1, 2, 0x08))
        .deflated("lib/x86_64/libbaz.so", &fake_elf(2, 1, 0x03))
        .build()
}

/// Serve `body` on a loopback port, one request per connection.
async fn serve(body: Vec<u8>, mode: Mode) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = Arc::new(body);

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(handle(stream, Arc::clone(&body), mode));
        }
    });

    format!("http://{addr}/app.apk")
}

async fn handle(mut stream: TcpStream, body: Arc<Vec<u8>>, mode: Mode) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&chunk[..n]),
        }
    }
    let request = String::from_utf8_lossy(&request).into_owned();

    let range = request.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if !name.eq_ignore_ascii_case("range") {
            return None;
        }
        let (start, end) = value.trim().strip_prefix("bytes=")?.split_once('-')?;
        Some((start.parse::<usize>().ok()?, end.parse::<usize>().ok()?))
    });

    let accept_ranges = match mode {
        Mode::NoAcceptRanges => "",
        Mode::Ranges | Mode::IgnoresRange => "Accept-Ranges: bytes\r\n",
    };

    let response = if request.starts_with("HEAD ") {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{accept_ranges}Connection: close\r\n\r\n",
            body.len()
        )
        .into_bytes()
    } else {
        match (mode, range) {
            (Mode::Ranges, Some((start, end))) => {
                let end = end.min(body.len() - 1);
                let mut response = format!(
                    "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {start}-{end}/{}\r\nConnection: close\r\n\r\n",
                    end + 1 - start,
                    body.len()
                )
                .into_bytes();
                response.extend_from_slice(&body[start..=end]);
                response
            }
            _ => {
                let mut response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                )
                .into_bytes();
                response.extend_from_slice(&body);
                response
            }
        }
    };

    let _ = stream.write_all(&response).await;
    let _ = stream.shutdown().await;
}

#[tokio::test]
async fn remote_report_matches_local_report() {
    let package = sample_package();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("app.apk");
    std::fs::write(&path, &package).unwrap();
    let url = serve(package, Mode::Ranges).await;

    let inspector = PackageInspector::default();
    let local = inspector.inspect_path(&path).await.unwrap();
    let remote = inspector.inspect_url(&url).await.unwrap();

    assert_eq!(remote.source, url);
    assert_eq!(remote.libraries, local.libraries);
    assert_eq!(remote.count(), 3);
    assert!(remote.skipped.is_empty());
}

#[tokio::test]
async fn range_reads_return_requested_bytes() {
    let package = sample_package();
    let url = serve(package.clone(), Mode::Ranges).await;

    let reader = HttpRangeReader::new(url).await.unwrap();
    assert_eq!(reader.size(), package.len() as u64);

    let mut buf = [0u8; 16];
    assert_eq!(reader.read_at(4, &mut buf).await.unwrap(), 16);
    assert_eq!(&buf, &package[4..20]);

    // Past the end the read is short rather than an error.
    let tail = package.len() as u64 - 5;
    assert_eq!(reader.read_at(tail, &mut buf).await.unwrap(), 5);
    assert_eq!(&buf[..5], &package[package.len() - 5..]);
    assert_eq!(reader.transferred_bytes(), 21);
}

#[tokio::test]
async fn server_without_range_support_is_unreadable() {
    let url = serve(sample_package(), Mode::NoAcceptRanges).await;

    let err = PackageInspector::default()
        .inspect_url(&url)
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains(&url));
}

#[tokio::test]
async fn full_response_to_range_request_is_unreadable() {
    let url = serve(sample_package(), Mode::IgnoresRange).await;

    let err = PackageInspector::default()
        .inspect_url(&url)
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}
