use crate::api::StockSource;
use crate::config::Config;
use crate::error::StockError;
use crate::plan::collapse_whitespace;
use crate::progress::Progress;
use crate::{logi, logok};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

pub const MAX_CANDIDATES: usize = 5;
const MAX_QUERY_CHARS: usize = 100;
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);
/// Longest silence tolerated while waiting for response headers or the next
/// body chunk of a clip download.
const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
pub const PART_SUFFIX: &str = "part";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    videos: HitVideos,
}

#[derive(Debug, Deserialize)]
struct HitVideos {
    large: Option<VideoFile>,
    medium: Option<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    #[serde(default)]
    url: String,
}

impl Hit {
    fn best_url(&self) -> Option<&str> {
        [&self.videos.large, &self.videos.medium]
            .into_iter()
            .flatten()
            .map(|f| f.url.as_str())
            .find(|url| !url.is_empty())
    }
}

fn candidate_urls(body: &str) -> Result<Vec<String>, StockError> {
    let parsed: SearchResponse = serde_json::from_str(body)?;
    Ok(parsed
        .hits
        .iter()
        .filter_map(Hit::best_url)
        .take(MAX_CANDIDATES)
        .map(str::to_string)
        .collect())
}

pub fn canonical_query(query: &str) -> String {
    collapse_whitespace(query).to_lowercase()
}

/// `{stock_dir}/{sha256(canonical query)[..16]}_{index}.mp4`
pub fn cache_path(stock_dir: &Path, query: &str, index: usize) -> PathBuf {
    let digest = Sha256::digest(canonical_query(query).as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    stock_dir.join(format!("{hex}_{index}.mp4"))
}

fn part_path(path: &Path) -> PathBuf {
    path.with_extension(format!("mp4.{PART_SUFFIX}"))
}

pub struct PixabayStock {
    client: Client,
    base_url: String,
    api_key: String,
    style: String,
    stock_dir: PathBuf,
    progress: Progress,
    read_idle: Duration,
}

impl PixabayStock {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            base_url: cfg.pixabay_base_url.clone(),
            api_key: cfg.pixabay_key.clone(),
            style: cfg.stock_style.clone(),
            stock_dir: cfg.stock_dir.clone(),
            progress: Progress::new(cfg.progress),
            read_idle: READ_IDLE_TIMEOUT,
        }
    }

    fn search_terms(&self, query: &str) -> String {
        let terms = format!("{} {}", query.trim(), self.style);
        terms.chars().take(MAX_QUERY_CHARS).collect()
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, StockError> {
        let per_page = MAX_CANDIDATES.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", self.search_terms(query).as_str()),
                ("per_page", per_page.as_str()),
            ])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(StockError::Quota),
            s if !s.is_success() => return Err(StockError::Status(s.as_u16())),
            _ => {}
        }

        let body = resp.text().await?;
        candidate_urls(&body)
    }

    async fn download(&self, url: &str, dest: &Path, label: &str) -> Result<(), StockError> {
        let resp = timeout(self.read_idle, self.client.get(url).send())
            .await
            .map_err(|_| StockError::Stalled(self.read_idle))??;
        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(StockError::Quota),
            s if !s.is_success() => return Err(StockError::Status(s.as_u16())),
            _ => {}
        }

        let pb = self.progress.download(label, resp.content_length());
        let part = part_path(dest);
        let result = async {
            let mut file = fs::File::create(&part).await?;
            let mut stream = resp.bytes_stream();
            while let Some(chunk) = timeout(self.read_idle, stream.next())
                .await
                .map_err(|_| StockError::Stalled(self.read_idle))?
            {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                pb.inc(chunk.len() as u64);
            }
            file.flush().await?;
            drop(file);
            fs::rename(&part, dest).await?;
            Ok::<(), StockError>(())
        }
        .await;

        pb.finish_and_clear();
        if result.is_err() {
            let _ = fs::remove_file(&part).await;
        }
        result
    }
}

#[async_trait]
impl StockSource for PixabayStock {
    async fn fetch(&self, query: &str) -> Result<Vec<PathBuf>, StockError> {
        if self.api_key.is_empty() {
            return Err(StockError::Unconfigured);
        }

        let urls = self.search(query).await?;
        logi(format!("Stock search {:?}: {} candidates", query, urls.len()));

        fs::create_dir_all(&self.stock_dir).await?;
        let mut paths = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            let path = cache_path(&self.stock_dir, query, i);
            if fs::metadata(&path).await.is_ok() {
                logi(format!("Reusing cached stock clip {}", path.display()));
            } else {
                let label = format!("Downloading stock {}/{}", i + 1, urls.len());
                self.download(url, &path, &label).await?;
                logok(format!("Downloaded stock clip {}", path.display()));
            }
            paths.push(path);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn parses_candidate_urls_with_medium_fallback() {
        let body = r#"{"total":3,"hits":[
            {"videos":{"large":{"url":"https://cdn/a_large.mp4"},"medium":{"url":"https://cdn/a_med.mp4"}}},
            {"videos":{"large":{"url":""},"medium":{"url":"https://cdn/b_med.mp4"}}},
            {"videos":{"tiny":{"url":"https://cdn/c_tiny.mp4"}}}
        ]}"#;
        assert_eq!(
            candidate_urls(body).unwrap(),
            vec!["https://cdn/a_large.mp4", "https://cdn/b_med.mp4"]
        );
    }

    #[test]
    fn caps_candidates_at_five() {
        let hits: Vec<String> = (0..8)
            .map(|i| format!(r#"{{"videos":{{"large":{{"url":"https://cdn/{i}.mp4"}}}}}}"#))
            .collect();
        let body = format!(r#"{{"hits":[{}]}}"#, hits.join(","));
        assert_eq!(candidate_urls(&body).unwrap().len(), MAX_CANDIDATES);
    }

    #[test]
    fn empty_or_missing_hits_is_not_an_error() {
        assert!(candidate_urls(r#"{"total":0,"hits":[]}"#).unwrap().is_empty());
        assert!(candidate_urls(r#"{"total":0}"#).unwrap().is_empty());
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let err = candidate_urls("<html>quota</html>").unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn cache_key_follows_canonical_query() {
        let dir = Path::new("temp_stock");
        let a = cache_path(dir, "  The Velvet   Room.", 0);
        let b = cache_path(dir, "the velvet room.", 0);
        let c = cache_path(dir, "the velvet room.", 1);
        let d = cache_path(dir, "another room.", 0);
        assert_eq!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, d);
        let name = a.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_0.mp4"));
        assert_eq!(name.len(), 16 + "_0.mp4".len());
        assert_eq!(
            part_path(&a).extension().and_then(|e| e.to_str()),
            Some(PART_SUFFIX)
        );
    }

    #[test]
    fn search_terms_append_style_and_cap_length() {
        let cfg = Config::default();
        let stock = PixabayStock::new(Client::new(), &cfg);
        assert_eq!(
            stock.search_terms(" candles "),
            "candles cinematic dark mystery luxury"
        );
        assert_eq!(stock.search_terms(&"q".repeat(200)).chars().count(), 100);
    }

    const CLIP: &[u8] = b"\x00\x00\x00\x18ftypmp42 fake clip bytes";

    /// Minimal HTTP/1.1 stock service: `/api/` answers a search whose single
    /// hit points back at this server, chosen by a word in the query.
    struct StockServer {
        addr: SocketAddr,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StockServer {
        async fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let log = requests.clone();
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    tokio::spawn(respond(socket, addr, log.clone()));
                }
            });
            Self { addr, requests }
        }

        fn count(&self, prefix: &str) -> usize {
            let requests = self.requests.lock().unwrap();
            requests.iter().filter(|r| r.starts_with(prefix)).count()
        }

        fn stock(&self, dir: &Path, read_idle: Duration) -> PixabayStock {
            let cfg = Config {
                pixabay_key: "test-key".to_string(),
                pixabay_base_url: format!("http://{}/api/", self.addr),
                stock_dir: dir.to_path_buf(),
                progress: false,
                ..Config::default()
            };
            let client = Client::builder().no_proxy().build().unwrap();
            let mut stock = PixabayStock::new(client, &cfg);
            stock.read_idle = read_idle;
            stock
        }
    }

    async fn respond(mut socket: TcpStream, addr: SocketAddr, log: Arc<Mutex<Vec<String>>>) {
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => head.extend_from_slice(&buf[..n]),
            }
        }
        let head = String::from_utf8_lossy(&head).into_owned();
        let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();
        log.lock().unwrap().push(target.clone());

        let header = |len: usize| {
            format!("HTTP/1.1 200 OK\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n")
        };
        if target.starts_with("/api/") {
            let clip = ["broken", "slow", "stall"]
                .into_iter()
                .find(|word| target.contains(word))
                .unwrap_or("clip");
            let body = format!(
                r#"{{"hits":[{{"videos":{{"large":{{"url":"http://{addr}/{clip}.mp4"}}}}}}]}}"#
            );
            let _ = socket.write_all((header(body.len()) + &body).as_bytes()).await;
        } else if target == "/clip.mp4" {
            let _ = socket.write_all(header(CLIP.len()).as_bytes()).await;
            let _ = socket.write_all(CLIP).await;
        } else if target == "/broken.mp4" {
            let _ = socket.write_all(header(1000).as_bytes()).await;
            let _ = socket.write_all(&[7u8; 10]).await;
        } else if target == "/slow.mp4" {
            let _ = socket.write_all(header(10 * 64).as_bytes()).await;
            for _ in 0..10 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let _ = socket.write_all(&[1u8; 64]).await;
            }
        } else if target == "/stall.mp4" {
            let _ = socket.write_all(header(100).as_bytes()).await;
            let _ = socket.write_all(&[2u8; 10]).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    }

    fn part_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension() == Some(std::ffi::OsStr::new(PART_SUFFIX)))
            .count()
    }

    #[tokio::test]
    async fn fetch_downloads_into_cache_and_reuses_it() {
        let server = StockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let stock = server.stock(dir.path(), READ_IDLE_TIMEOUT);

        let paths = stock.fetch("velvet room").await.unwrap();
        let expected = cache_path(dir.path(), "velvet room", 0);
        assert_eq!(paths, vec![expected.clone()]);
        assert_eq!(std::fs::read(&expected).unwrap(), CLIP);
        assert_eq!(part_files(dir.path()), 0);
        assert_eq!(server.count("/clip.mp4"), 1);

        let again = stock.fetch("  Velvet   ROOM ").await.unwrap();
        assert_eq!(again, vec![expected]);
        assert_eq!(server.count("/api/"), 2);
        assert_eq!(server.count("/clip.mp4"), 1);
    }

    #[tokio::test]
    async fn dropped_download_leaves_no_partial_file() {
        let server = StockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let stock = server.stock(dir.path(), READ_IDLE_TIMEOUT);

        let err = stock.fetch("broken room").await.unwrap_err();
        assert_eq!(err.kind(), "network");
        assert_eq!(part_files(dir.path()), 0);
        assert!(!cache_path(dir.path(), "broken room", 0).exists());
    }

    #[tokio::test]
    async fn slow_download_outlasting_idle_limit_completes() {
        let server = StockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let stock = server.stock(dir.path(), Duration::from_millis(500));

        let started = std::time::Instant::now();
        let paths = stock.fetch("slow room").await.unwrap();
        assert!(started.elapsed() > Duration::from_millis(500));
        assert_eq!(std::fs::metadata(&paths[0]).unwrap().len(), 640);
    }

    #[tokio::test]
    async fn stalled_download_is_abandoned() {
        let server = StockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let stock = server.stock(dir.path(), Duration::from_millis(300));

        let started = std::time::Instant::now();
        let err = stock.fetch("stall room").await.unwrap_err();
        assert!(matches!(err, StockError::Stalled(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(part_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn fetch_without_key_is_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            stock_dir: dir.path().to_path_buf(),
            progress: false,
            ..Config::default()
        };
        let stock = PixabayStock::new(Client::new(), &cfg);
        let err = stock.fetch("anything").await.unwrap_err();
        assert!(matches!(err, StockError::Unconfigured));
    }
}
