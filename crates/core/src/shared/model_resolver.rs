use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create model directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine model directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

const DOWNLOAD_CHUNK: usize = 256 * 1024;

/// Finds ONNX model files on disk, downloading them on first use.
///
/// Resolution order:
/// 1. Model directory (platform cache dir by default)
/// 2. Bundled directory, if configured
/// 3. Download from URL into the model directory
pub struct ModelResolver {
    model_dir: PathBuf,
    bundled_dir: Option<PathBuf>,
}

impl ModelResolver {
    pub fn new(model_dir: PathBuf, bundled_dir: Option<PathBuf>) -> Self {
        Self {
            model_dir,
            bundled_dir,
        }
    }

    /// Resolver rooted at the platform-specific model directory.
    pub fn user_default() -> Result<Self, ModelResolveError> {
        Ok(Self::new(default_model_dir()?, None))
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Returns a local path for `name` without touching the network, if one exists.
    pub fn find_local(&self, name: &str) -> Option<PathBuf> {
        let cached = self.model_dir.join(name);
        if cached.exists() {
            return Some(cached);
        }
        self.bundled_dir
            .as_ref()
            .map(|dir| dir.join(name))
            .filter(|p| p.exists())
    }

    pub fn resolve(
        &self,
        name: &str,
        url: &str,
        progress: Option<ProgressFn>,
    ) -> Result<PathBuf, ModelResolveError> {
        if let Some(path) = self.find_local(name) {
            log::debug!("Model {name} found at {}", path.display());
            return Ok(path);
        }

        fs::create_dir_all(&self.model_dir).map_err(ModelResolveError::CacheDir)?;
        let dest = self.model_dir.join(name);
        log::info!("Downloading {name} from {url}");
        download(url, &dest, progress)?;
        Ok(dest)
    }
}

/// Platform-specific model directory.
///
/// - macOS: `~/Library/Application Support/facetrack/models/`
/// - Linux: `$XDG_CACHE_HOME/facetrack/models/` or `~/.cache/facetrack/models/`
/// - Windows: `%LOCALAPPDATA%/facetrack/models/`
pub fn default_model_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

/// Streams `url` into `dest` through a `.part` file renamed on completion,
/// so an interrupted download never leaves a truncated model behind.
fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let download_err = |source: reqwest::Error| ModelResolveError::Download {
        url: url.to_string(),
        source,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;
    let total = response.content_length().unwrap_or(0);

    let temp_path = dest.with_extension("part");
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| ModelResolveError::Write { path, source }
    };

    let mut file = fs::File::create(&temp_path).map_err(write_err(&temp_path))?;
    let mut buf = vec![0u8; DOWNLOAD_CHUNK];
    let mut downloaded: u64 = 0;

    loop {
        let n = match response.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&temp_path);
                return Err(write_err(&temp_path)(e));
            }
        };
        file.write_all(&buf[..n]).map_err(write_err(&temp_path))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err(&temp_path))?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(write_err(dest))
}
