//! Image request orchestration
//!
//! Normalizes the search term, consults the cache, falls back to the TCP
//! image service on a miss, persists new payloads under the images
//! directory, and records them in the cache.

use crate::error::{ProxyError, Result};
use chrono::Utc;
use image_service_client::ImageServiceClient;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use term_image_cache::{normalize, TermImageCache};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A served image plus whether it came from the cache
#[derive(Debug)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub cache_hit: bool,
}

pub struct ImageService {
    cache: Arc<TermImageCache>,
    client: ImageServiceClient,
    images_dir: PathBuf,
    single_flight: bool,
    /// Per-key guards used only in single-flight mode
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Distinguishes filenames written within the same millisecond
    sequence: AtomicU64,
}

impl ImageService {
    pub fn new(
        cache: Arc<TermImageCache>,
        client: ImageServiceClient,
        images_dir: PathBuf,
        single_flight: bool,
    ) -> Self {
        Self {
            cache,
            client,
            images_dir,
            single_flight,
            inflight: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &TermImageCache {
        &self.cache
    }

    pub fn client(&self) -> &ImageServiceClient {
        &self.client
    }

    /// Serve the image for a raw search term, from cache when possible
    pub async fn get_image(&self, raw_term: &str) -> Result<FetchedImage> {
        if raw_term.trim().is_empty() {
            return Err(ProxyError::InvalidInput);
        }
        let term = normalize(raw_term);

        if !self.single_flight {
            return self.get_image_inner(raw_term, &term).await;
        }

        // Single-flight mode: concurrent misses for the same term queue on
        // a per-key guard so only the first performs the backend fetch.
        let guard = {
            let mut inflight = self.inflight.lock().await;
            inflight.entry(term.clone()).or_default().clone()
        };
        let locked = guard.lock().await;
        let result = self.get_image_inner(raw_term, &term).await;
        drop(locked);

        let mut inflight = self.inflight.lock().await;
        // Safe to drop the guard once no other request holds a clone
        if Arc::strong_count(&guard) <= 2 {
            inflight.remove(&term);
        }

        result
    }

    async fn get_image_inner(&self, raw_term: &str, term: &str) -> Result<FetchedImage> {
        if let Some(path) = self.cache.lookup(term).await {
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    debug!(term, path = %path.display(), "Cache hit");
                    return Ok(FetchedImage {
                        bytes,
                        cache_hit: true,
                    });
                }
                Err(e) => {
                    // Backing file vanished or is unreadable: drop the
                    // entry and treat this request as a miss.
                    warn!(term, path = %path.display(), error = %e, "Error reading cached image");
                    self.cache.invalidate(term).await;
                }
            }
        }

        info!(term = raw_term, "Fetching image from service");
        let bytes = self.client.fetch(raw_term).await?;

        let path = self.persist(term, &bytes).await?;
        self.cache.evict_if_full().await;
        self.cache.insert(term, path).await;

        Ok(FetchedImage {
            bytes,
            cache_hit: false,
        })
    }

    /// Write image bytes to a uniquely named file in the images directory
    async fn persist(&self, term: &str, bytes: &[u8]) -> Result<PathBuf> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let filename = format!(
            "{}_{}_{}.jpg",
            sanitize_term(term),
            Utc::now().timestamp_millis(),
            seq
        );
        let path = self.images_dir.join(filename);

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ProxyError::Storage(Box::new(e)))?;
        debug!(path = %path.display(), size = bytes.len(), "Stored image");
        Ok(path)
    }

    /// Read a previously stored file by name
    ///
    /// The filename comes verbatim from the request path, so anything that
    /// could escape the images directory is rejected before disk access.
    pub async fn read_stored(&self, filename: &str) -> Result<Vec<u8>> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            warn!(filename, "Rejected unsafe stored-image filename");
            return Err(ProxyError::NotFound);
        }

        tokio::fs::read(self.images_dir.join(filename))
            .await
            .map_err(|_| ProxyError::NotFound)
    }

    /// Clear the cache, deleting stored files; returns the prior count
    pub async fn clear_cache(&self) -> usize {
        self.cache.clear().await
    }
}

/// Map a normalized term to a filesystem-safe filename stem
fn sanitize_term(term: &str) -> String {
    term.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image_service_client::FetchError;
    use std::net::SocketAddr;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Fake image service: answers every connection with `payload` after
    /// `delay`, counting accepted connections.
    async fn spawn_service(
        payload: Vec<u8>,
        delay: Duration,
        connections: Arc<AtomicUsize>,
    ) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                connections.fetch_add(1, Ordering::SeqCst);
                let payload = payload.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 256];
                    let _ = socket.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let _ = socket.write_all(&payload).await;
                });
            }
        });
        addr
    }

    fn service_for(addr: SocketAddr, dir: PathBuf, single_flight: bool) -> ImageService {
        let cache = Arc::new(TermImageCache::new(10));
        let client = ImageServiceClient::new(
            addr.ip().to_string(),
            addr.port(),
            Duration::from_secs(5),
        );
        ImageService::new(cache, client, dir, single_flight)
    }

    #[tokio::test]
    async fn test_miss_then_hit_returns_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let payload = b"jpeg payload".to_vec();
        let conns = Arc::new(AtomicUsize::new(0));
        let addr = spawn_service(payload.clone(), Duration::ZERO, conns.clone()).await;
        let service = service_for(addr, dir.path().to_path_buf(), false);

        let first = service.get_image("Mountain Lake").await.unwrap();
        assert!(!first.cache_hit);
        assert_eq!(first.bytes, payload);

        let second = service.get_image("  mountain lake ").await.unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.bytes, first.bytes);

        // Only the first request reached the backend
        assert_eq!(conns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_normalization_shares_one_cache_key() {
        let dir = tempfile::tempdir().unwrap();
        let conns = Arc::new(AtomicUsize::new(0));
        let addr = spawn_service(b"img".to_vec(), Duration::ZERO, conns.clone()).await;
        let service = service_for(addr, dir.path().to_path_buf(), false);

        service.get_image(" Cat  ").await.unwrap();
        assert!(service.get_image("cat").await.unwrap().cache_hit);
        assert!(service.get_image("CAT ").await.unwrap().cache_hit);
        assert_eq!(service.cache().len().await, 1);
    }

    #[tokio::test]
    async fn test_empty_term_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let conns = Arc::new(AtomicUsize::new(0));
        let addr = spawn_service(b"img".to_vec(), Duration::ZERO, conns).await;
        let service = service_for(addr, dir.path().to_path_buf(), false);

        assert!(matches!(
            service.get_image("").await.unwrap_err(),
            ProxyError::InvalidInput
        ));
        assert!(matches!(
            service.get_image("   ").await.unwrap_err(),
            ProxyError::InvalidInput
        ));
    }

    #[tokio::test]
    async fn test_stale_cache_entry_self_heals() {
        let dir = tempfile::tempdir().unwrap();
        let conns = Arc::new(AtomicUsize::new(0));
        let addr = spawn_service(b"img".to_vec(), Duration::ZERO, conns.clone()).await;
        let service = service_for(addr, dir.path().to_path_buf(), false);

        service.get_image("cat").await.unwrap();
        let stale = service.cache().lookup("cat").await.unwrap();
        tokio::fs::remove_file(&stale).await.unwrap();

        // Falls back to a fresh fetch with no error surfaced
        let refetched = service.get_image("cat").await.unwrap();
        assert!(!refetched.cache_hit);
        assert_eq!(conns.load(Ordering::SeqCst), 2);

        // Entry was rewritten with a path that reads again
        let rewritten = service.cache().lookup("cat").await.unwrap();
        assert_ne!(rewritten, stale);
        assert!(tokio::fs::read(&rewritten).await.is_ok());
    }

    #[tokio::test]
    async fn test_backend_failure_caches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let service = service_for(addr, dir.path().to_path_buf(), false);

        let err = service.get_image("cat").await.unwrap_err();
        assert!(matches!(
            err,
            ProxyError::ServiceUnavailable(FetchError::ConnectFailed(_))
        ));
        assert!(service.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_storage_failure_is_distinct_from_backend_failure() {
        let conns = Arc::new(AtomicUsize::new(0));
        let addr = spawn_service(b"img".to_vec(), Duration::ZERO, conns).await;
        // Images directory does not exist, so the write fails
        let service = service_for(addr, PathBuf::from("/nonexistent/images"), false);

        let err = service.get_image("cat").await.unwrap_err();
        assert!(matches!(err, ProxyError::Storage(_)));
        assert!(service.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_misses_both_fetch_by_default() {
        // Documented race: without single-flight, two concurrent misses
        // for the same term each complete a full backend fetch.
        let dir = tempfile::tempdir().unwrap();
        let conns = Arc::new(AtomicUsize::new(0));
        let addr = spawn_service(b"img".to_vec(), Duration::from_millis(100), conns.clone()).await;
        let service = Arc::new(service_for(addr, dir.path().to_path_buf(), false));

        let (a, b) = tokio::join!(service.get_image("cat"), service.get_image("cat"));
        assert!(!a.unwrap().cache_hit);
        assert!(!b.unwrap().cache_hit);
        assert_eq!(conns.load(Ordering::SeqCst), 2);
        assert_eq!(service.cache().len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch_in_single_flight_mode() {
        let dir = tempfile::tempdir().unwrap();
        let conns = Arc::new(AtomicUsize::new(0));
        let addr = spawn_service(b"img".to_vec(), Duration::from_millis(100), conns.clone()).await;
        let service = Arc::new(service_for(addr, dir.path().to_path_buf(), true));

        let (a, b) = tokio::join!(service.get_image("cat"), service.get_image("cat"));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(conns.load(Ordering::SeqCst), 1);
        // One request fetched, the other was served from the cache
        assert!(a.cache_hit != b.cache_hit);
        assert_eq!(a.bytes, b.bytes);
    }

    #[tokio::test]
    async fn test_read_stored_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let conns = Arc::new(AtomicUsize::new(0));
        let addr = spawn_service(b"img".to_vec(), Duration::ZERO, conns).await;
        let service = service_for(addr, dir.path().to_path_buf(), false);

        for name in ["../secret", "..\\secret", "a/b.jpg", "..", ""] {
            assert!(matches!(
                service.read_stored(name).await.unwrap_err(),
                ProxyError::NotFound
            ));
        }
    }

    #[tokio::test]
    async fn test_read_stored_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let conns = Arc::new(AtomicUsize::new(0));
        let addr = spawn_service(b"img".to_vec(), Duration::ZERO, conns).await;
        let service = service_for(addr, dir.path().to_path_buf(), false);

        service.get_image("cat").await.unwrap();
        let path = service.cache().lookup("cat").await.unwrap();
        let filename = path.file_name().unwrap().to_str().unwrap();

        assert_eq!(service.read_stored(filename).await.unwrap(), b"img");
        assert!(matches!(
            service.read_stored("missing.jpg").await.unwrap_err(),
            ProxyError::NotFound
        ));
    }

    #[test]
    fn test_sanitize_term() {
        assert_eq!(sanitize_term("mountain lake"), "mountain_lake");
        assert_eq!(sanitize_term("café au lait!"), "caf__au_lait_");
        assert_eq!(sanitize_term("cat42"), "cat42");
    }
}
