//! Bridge configuration.
//!
//! Values can be set through the [`BridgeConfig`] builder or read from the
//! process environment with [`BridgeConfig::from_env`]:
//!
//! - `NATIVEPHP_BUF_CHUNK`: output growth increment in bytes (min 4096)
//! - `NATIVEPHP_BUF_MAX`: output ceiling in bytes
//! - `NATIVEPHP_REUSE`: `per-call` or `warm`

use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;
pub const DEFAULT_CEILING: usize = 16 * 1024 * 1024;
const MIN_CHUNK_SIZE: usize = 4096;

/// INI entries applied when serving web requests.
pub(crate) static WEB_INI_ENTRIES: &str = "\
register_argc_argv=0\n\
output_buffering=4096\n\
implicit_flush=0\n\
display_errors=1\n\
error_reporting=E_ALL\n";

/// INI entries applied when running management commands.
pub(crate) static CONSOLE_INI_ENTRIES: &str = "\
display_errors=1\n\
implicit_flush=1\n\
output_buffering=0\n";

/// Growth policy of the output aggregator.
///
/// Always satisfies `0 < chunk_size <= ceiling`, including when
/// deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "RawBufferPolicy"))]
pub struct BufferPolicy {
    chunk_size: usize,
    ceiling: usize,
}

impl BufferPolicy {
    /// Builds a policy, clamping so that `chunk_size <= ceiling` and neither is zero.
    pub fn new(chunk_size: usize, ceiling: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            ceiling: ceiling.max(chunk_size),
        }
    }

    /// Growth increment in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Hard cap on buffered output in bytes.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawBufferPolicy {
    chunk_size: usize,
    ceiling: usize,
}

#[cfg(feature = "serde")]
impl From<RawBufferPolicy> for BufferPolicy {
    fn from(raw: RawBufferPolicy) -> Self {
        Self::new(raw.chunk_size, raw.ceiling)
    }
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            ceiling: DEFAULT_CEILING,
        }
    }
}

/// Whether the interpreter is torn down after every call or kept warm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ReusePolicy {
    /// Full module shutdown and startup around each request.
    #[default]
    PerCall,
    /// Module stays up; only request-level state is reset.
    Warm,
}

impl ReusePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "per-call" | "percall" | "once" => Some(Self::PerCall),
            "warm" | "reuse" => Some(Self::Warm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BridgeConfig {
    pub buffer: BufferPolicy,
    pub reuse: ReusePolicy,
    /// Private storage directory handed over by the host.
    pub storage_dir: PathBuf,
    /// Directory under `storage_dir` holding the PHP application.
    pub app_dir: String,
    /// Front controller, relative to the application root.
    pub front_script: PathBuf,
    /// Script name reported to PHP as `SCRIPT_NAME` and `PHP_SELF`.
    pub script_name: String,
    /// Base URL exported as `APP_URL`.
    pub app_url: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            buffer: BufferPolicy::default(),
            reuse: ReusePolicy::default(),
            storage_dir: PathBuf::from("/tmp"),
            app_dir: "laravel".to_string(),
            front_script: PathBuf::from(
                "vendor/nativephp/mobile/bootstrap/android/native.php",
            ),
            script_name: "/native.php".to_string(),
            app_url: "http://127.0.0.1".to_string(),
        }
    }
}

impl BridgeConfig {
    #[must_use]
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Default::default()
        }
    }

    /// Reads overrides from `NATIVEPHP_*` environment variables. Invalid
    /// values are ignored.
    #[must_use]
    pub fn from_env(storage_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(storage_dir);

        let chunk = read_usize("NATIVEPHP_BUF_CHUNK")
            .filter(|&n| n >= MIN_CHUNK_SIZE)
            .unwrap_or(config.buffer.chunk_size());

        let ceiling =
            read_usize("NATIVEPHP_BUF_MAX").unwrap_or(config.buffer.ceiling());

        config.buffer = BufferPolicy::new(chunk, ceiling);

        if let Some(reuse) = std::env::var("NATIVEPHP_REUSE")
            .ok()
            .as_deref()
            .and_then(ReusePolicy::parse)
        {
            config.reuse = reuse;
        }

        config
    }

    #[must_use]
    pub fn with_buffer(mut self, chunk_size: usize, ceiling: usize) -> Self {
        self.buffer = BufferPolicy::new(chunk_size, ceiling);
        self
    }

    #[must_use]
    pub fn with_reuse(mut self, reuse: ReusePolicy) -> Self {
        self.reuse = reuse;
        self
    }

    #[must_use]
    pub fn with_app_dir(mut self, dir: impl Into<String>) -> Self {
        self.app_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_front_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.front_script = path.into();
        self
    }

    #[must_use]
    pub fn with_app_url(mut self, url: impl Into<String>) -> Self {
        self.app_url = url.into();
        self
    }

    /// `<storage>/<app_dir>`
    pub fn app_root(&self) -> PathBuf {
        self.storage_dir.join(&self.app_dir)
    }

    /// `<storage>/<app_dir>/public`
    pub fn public_dir(&self) -> PathBuf {
        self.app_root().join("public")
    }

    pub fn front_script_path(&self) -> PathBuf {
        resolve(&self.app_root(), &self.front_script)
    }

    pub fn console_script_path(&self) -> PathBuf {
        self.app_root().join("artisan.php")
    }

    pub fn asset_url(&self) -> String {
        format!("{}/_assets/", self.app_url.trim_end_matches('/'))
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn read_usize(key: &str) -> Option<usize> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
}
