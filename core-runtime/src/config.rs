//! Host-facing configuration.
//!
//! [`CoreConfig`] carries the library location, queue and lyrics tuning, and
//! the host bridges every pipeline needs. The builder validates eagerly so a
//! misconfigured host fails at startup rather than on the first download.
//!
//! Two bridges are required: an `HttpClient` for provider lookups and asset
//! transfers, and a `FileSystemAccess` for item directories under
//! `{library_root}/music`. With `desktop-shims`, `bridge-desktop` fills in
//! both plus the library root when the host leaves them out.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .library_root("/home/me/.local/share/tunevault")
//!     .max_concurrent_downloads(2)
//!     .lyrics_deadline(Duration::from_secs(3))
//!     .build()?;
//!
//! assert!(config.music_dir().ends_with("music"));
//! ```
//!
//! Missing bridges produce [`Error::CapabilityMissing`] with a message telling
//! the host what to inject; out-of-range values produce [`Error::Config`].

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default number of pipelines running at once.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 1;

/// Upper bound accepted for `max_concurrent_downloads`.
pub const MAX_CONCURRENT_DOWNLOADS_LIMIT: usize = 16;

/// Default soft deadline for the lyrics race.
pub const DEFAULT_LYRICS_DEADLINE: Duration = Duration::from_secs(5);

/// Name of the per-item asset directory under the library root.
pub const MUSIC_DIR_NAME: &str = "music";

/// Core configuration.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory holding `music/` and, by default, the catalog database
    pub library_root: PathBuf,

    /// Path to the SQLite catalog database
    pub database_path: PathBuf,

    /// Concurrency cap for the queue orchestrator
    pub max_concurrent_downloads: usize,

    /// Soft deadline after which the lyrics race settles with what it has
    pub lyrics_deadline: Duration,

    /// Keep waiting past the deadline when no provider has answered yet
    pub settle_on_empty_race: bool,

    /// Musixmatch API key; the provider is skipped when absent
    pub musixmatch_api_key: Option<String>,

    /// HTTP client bridge
    pub http_client: Arc<dyn HttpClient>,

    /// File system bridge
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Features flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("library_root", &self.library_root)
            .field("database_path", &self.database_path)
            .field("max_concurrent_downloads", &self.max_concurrent_downloads)
            .field("lyrics_deadline", &self.lyrics_deadline)
            .field("settle_on_empty_race", &self.settle_on_empty_race)
            .field(
                "musixmatch_api_key",
                &self.musixmatch_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional pipeline phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Run the lyrics race during each download
    pub enable_lyrics: bool,

    /// Fetch cover art when the track has a cover URL
    pub enable_cover_art: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_lyrics: true,
            enable_cover_art: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Directory that holds one sub-directory per downloaded item.
    pub fn music_dir(&self) -> PathBuf {
        self.library_root.join(MUSIC_DIR_NAME)
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.library_root.as_os_str().is_empty() {
            return Err(Error::Config("Library root cannot be empty".to_string()));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }

        if self.max_concurrent_downloads > MAX_CONCURRENT_DOWNLOADS_LIMIT {
            return Err(Error::Config(format!(
                "max_concurrent_downloads exceeds maximum of {}",
                MAX_CONCURRENT_DOWNLOADS_LIMIT
            )));
        }

        if self.lyrics_deadline.is_zero() {
            return Err(Error::Config(
                "Lyrics deadline must be greater than 0".to_string(),
            ));
        }

        if self.lyrics_deadline > Duration::from_secs(60) {
            return Err(Error::Config(
                "Lyrics deadline exceeds maximum of 60 seconds".to_string(),
            ));
        }

        if matches!(&self.musixmatch_api_key, Some(key) if key.trim().is_empty()) {
            return Err(Error::Config(
                "Musixmatch API key cannot be blank; omit it to disable the provider".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Other hosts: inject an adapter with .http_client()."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "No file system implementation provided. \
                 Desktop: enable the 'desktop-shims' feature to use TokioFileSystem. \
                 Other hosts: inject an adapter with .file_system()."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_library_root() -> Result<PathBuf> {
    Ok(bridge_desktop::default_library_root())
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_library_root() -> Result<PathBuf> {
    Err(Error::Config(
        "Library root is required. Use .library_root() to set it.".to_string(),
    ))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    library_root: Option<PathBuf>,
    database_path: Option<PathBuf>,
    max_concurrent_downloads: Option<usize>,
    lyrics_deadline: Option<Duration>,
    settle_on_empty_race: Option<bool>,
    musixmatch_api_key: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the library root directory.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder().library_root("/tmp/tunevault");
    /// ```
    pub fn library_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.library_root = Some(path.into());
        self
    }

    /// Sets the catalog database path. Defaults to `{library_root}/library.db`.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the concurrency cap. Default: 1
    pub fn max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent_downloads = Some(max);
        self
    }

    /// Sets the lyrics race deadline. Default: 5 seconds
    pub fn lyrics_deadline(mut self, deadline: Duration) -> Self {
        self.lyrics_deadline = Some(deadline);
        self
    }

    /// Whether an empty race keeps waiting past its deadline. Default: true
    pub fn settle_on_empty_race(mut self, settle: bool) -> Self {
        self.settle_on_empty_race = Some(settle);
        self
    }

    /// Enables the Musixmatch provider with the given key.
    pub fn musixmatch_api_key(mut self, key: impl Into<String>) -> Self {
        self.musixmatch_api_key = Some(key.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, `ReqwestHttpClient` is used when the `desktop-shims`
    /// feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    ///
    /// If not provided, `TokioFileSystem` is used when the `desktop-shims`
    /// feature is enabled.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Enables or disables the lyrics phase. Default: true
    pub fn enable_lyrics(mut self, enabled: bool) -> Self {
        self.features.enable_lyrics = enabled;
        self
    }

    /// Enables or disables the cover art phase. Default: true
    pub fn enable_cover_art(mut self, enabled: bool) -> Self {
        self.features.enable_cover_art = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds and validates the final `CoreConfig`.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a bridge is missing and no desktop
    ///   default is compiled in
    /// - [`Error::Config`] when a value is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let library_root = match self.library_root {
            Some(root) => root,
            None => provide_default_library_root()?,
        };

        let database_path = self
            .database_path
            .unwrap_or_else(|| library_root.join("library.db"));

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let config = CoreConfig {
            library_root,
            database_path,
            max_concurrent_downloads: self
                .max_concurrent_downloads
                .unwrap_or(DEFAULT_MAX_CONCURRENT_DOWNLOADS),
            lyrics_deadline: self.lyrics_deadline.unwrap_or(DEFAULT_LYRICS_DEADLINE),
            settle_on_empty_race: self.settle_on_empty_race.unwrap_or(true),
            musixmatch_api_key: self.musixmatch_api_key,
            http_client,
            file_system,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{ByteRange, HttpRequest, HttpResponse};
    use bridge_traits::storage::{FileMetadata, FileWriter};
    use bridge_traits::BridgeError;
    use bytes::Bytes;
    use std::path::Path;

    struct NoopHttp;

    #[async_trait]
    impl HttpClient for NoopHttp {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Err(BridgeError::NotAvailable("http".to_string()))
        }

        async fn fetch_range(&self, _url: &str, _offset: u64) -> BridgeResult<ByteRange> {
            Err(BridgeError::NotAvailable("http".to_string()))
        }
    }

    struct NoopFs;

    #[async_trait]
    impl FileSystemAccess for NoopFs {
        async fn exists(&self, _path: &Path) -> BridgeResult<bool> {
            Ok(false)
        }

        async fn metadata(&self, _path: &Path) -> BridgeResult<FileMetadata> {
            Err(BridgeError::NotAvailable("fs".to_string()))
        }

        async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }

        async fn write_file(&self, _path: &Path, _data: Bytes) -> BridgeResult<()> {
            Ok(())
        }

        async fn delete_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }

        async fn open_write_stream(&self, _path: &Path) -> BridgeResult<FileWriter> {
            Err(BridgeError::NotAvailable("fs".to_string()))
        }

        async fn open_append_stream(&self, _path: &Path) -> BridgeResult<FileWriter> {
            Err(BridgeError::NotAvailable("fs".to_string()))
        }
    }

    fn builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .library_root("/tmp/tunevault-test")
            .http_client(Arc::new(NoopHttp))
            .file_system(Arc::new(NoopFs))
    }

    #[test]
    fn test_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.max_concurrent_downloads, 1);
        assert_eq!(config.lyrics_deadline, Duration::from_secs(5));
        assert!(config.settle_on_empty_race);
        assert!(config.musixmatch_api_key.is_none());
        assert_eq!(config.features, FeatureFlags::default());
        assert_eq!(
            config.database_path,
            PathBuf::from("/tmp/tunevault-test/library.db")
        );
        assert_eq!(config.music_dir(), PathBuf::from("/tmp/tunevault-test/music"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = builder()
            .database_path("/tmp/elsewhere.db")
            .max_concurrent_downloads(3)
            .lyrics_deadline(Duration::from_millis(1500))
            .settle_on_empty_race(false)
            .musixmatch_api_key("key")
            .enable_lyrics(false)
            .enable_cover_art(false)
            .build()
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/elsewhere.db"));
        assert_eq!(config.max_concurrent_downloads, 3);
        assert_eq!(config.lyrics_deadline, Duration::from_millis(1500));
        assert!(!config.settle_on_empty_race);
        assert_eq!(config.musixmatch_api_key.as_deref(), Some("key"));
        assert!(!config.features.enable_lyrics);
        assert!(!config.features.enable_cover_art);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = builder().max_concurrent_downloads(0).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_excessive_concurrency() {
        let err = builder()
            .max_concurrent_downloads(MAX_CONCURRENT_DOWNLOADS_LIMIT + 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_zero_deadline() {
        let err = builder()
            .lyrics_deadline(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_blank_api_key() {
        let err = builder().musixmatch_api_key("  ").build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = builder().musixmatch_api_key("super-secret").build().unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_http_client_is_capability_error() {
        let err = CoreConfig::builder()
            .library_root("/tmp/x")
            .file_system(Arc::new(NoopFs))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::CapabilityMissing { ref capability, .. } if capability == "HttpClient"));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = CoreConfig::builder().build().unwrap();
        assert!(config.library_root.ends_with("tunevault"));
    }
}
