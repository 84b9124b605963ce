use imgsync_core::{Error, FetchRequest, FetchedImage, ImageFetcher, Result};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

pub mod aggregate;
pub mod arasaac;
pub mod assets;
pub mod dataset;
pub mod gate;
pub mod google_cse;
pub mod knowledge;
pub mod openverse;
pub mod pexels;
pub mod provenance;
pub mod query;
pub mod rank;
pub mod score;
pub mod screen;
pub mod search;
pub mod sync;
pub mod textprep;
pub mod visual;
pub mod wikimedia;

pub const USER_AGENT: &str = concat!("imgsync/", env!("CARGO_PKG_VERSION"));

/// Shared client for provider searches and downloads. `timeout` is the per-request ceiling;
/// requests may still set a tighter one.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Fetch(e.to_string()))
}

/// Write through a temp file in the destination directory, then rename over `path`.
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchedImage> {
        let url = url::Url::parse(&req.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let mut rb = self.client.get(url);
        if let Some(to) = req.timeout() {
            rb = rb.timeout(to);
        }
        let resp = rb.send().await.map_err(|e| Error::Fetch(e.to_string()))?;
        let final_url = resp.url().to_string();
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("HTTP {} for {}", status.as_u16(), req.url)));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // Stop reading once the cap is exceeded; the caller decides what a truncated body means.
        let max_bytes = usize::try_from(req.max_bytes.unwrap_or(u64::MAX)).unwrap_or(usize::MAX);
        let mut truncated = false;
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
            if bytes.len().saturating_add(chunk.len()) > max_bytes {
                let can_take = max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedImage {
            url: req.url.clone(),
            final_url,
            status: status.as_u16(),
            content_type,
            bytes,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::header, http::StatusCode, routing::get, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn request(url: String, max_bytes: u64) -> FetchRequest {
        FetchRequest {
            url,
            timeout_ms: Some(2_000),
            max_bytes: Some(max_bytes),
        }
    }

    #[tokio::test]
    async fn fetch_reads_body_and_content_type() {
        let app = Router::new().route(
            "/a.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![1u8, 2, 3, 4]) }),
        );
        let addr = serve(app).await;
        let f = HttpImageFetcher::new(http_client(Duration::from_secs(5)).unwrap());
        let img = f.fetch(&request(format!("http://{addr}/a.png"), 100)).await.unwrap();
        assert_eq!(img.bytes, vec![1, 2, 3, 4]);
        assert_eq!(img.status, 200);
        assert_eq!(img.content_type.as_deref(), Some("image/png"));
        assert!(!img.truncated);
    }

    #[tokio::test]
    async fn body_over_cap_is_truncated() {
        let app = Router::new().route("/big.jpg", get(|| async { vec![7u8; 10_000] }));
        let addr = serve(app).await;
        let f = HttpImageFetcher::new(http_client(Duration::from_secs(5)).unwrap());
        let img = f.fetch(&request(format!("http://{addr}/big.jpg"), 1_000)).await.unwrap();
        assert!(img.truncated);
        assert_eq!(img.bytes.len(), 1_000);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let app = Router::new().route("/gone.jpg", get(|| async { (StatusCode::GONE, "gone") }));
        let addr = serve(app).await;
        let f = HttpImageFetcher::new(http_client(Duration::from_secs(5)).unwrap());
        let err = f
            .fetch(&request(format!("http://{addr}/gone.jpg"), 1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
        assert!(matches!(
            f.fetch(&request("not a url".into(), 10)).await.unwrap_err(),
            Error::InvalidUrl(_)
        ));
    }

    #[test]
    fn atomic_write_creates_parents_and_replaces() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("a").join("b").join("f.json");
        write_atomic(&p, b"one").unwrap();
        write_atomic(&p, b"two").unwrap();
        assert_eq!(std::fs::read(&p).unwrap(), b"two");
        let leftovers = std::fs::read_dir(p.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
