//! Text detection and recognition adapter
//!
//! The recognition model itself is an external capability: given an image it
//! returns text fragments with a bounding region and a confidence score. This
//! module defines the data types for those detections, the [`TextRecognizer`]
//! trait the pipeline consumes, and [`SubprocessRecognizer`], which drives an
//! external engine executable over a JSON protocol.
//!
//! Concrete engines are interchangeable behind the trait and are selected at
//! pipeline construction, not at call time.
//!
//! # Example
//!
//! ```rust,no_run
//! use bookscan_ocr::recognize::{RecognizerConfig, SubprocessRecognizer};
//!
//! let config = RecognizerConfig::builder()
//!     .language("es")
//!     .language("en")
//!     .build();
//! let recognizer = SubprocessRecognizer::new(config).unwrap();
//! ```

use crate::profile::BookProfile;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default engine executable name, resolved through PATH
const DEFAULT_ENGINE_COMMAND: &str = "ocr-engine";

/// Default per-page recognition timeout (5 minutes)
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Poll interval while waiting for the engine process
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Recognizer error types
#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("Engine initialization failed: {0}")]
    Init(String),

    #[error("Engine execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid engine output: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecognizerError {
    /// True for errors that make the recognizer unusable (construction-time
    /// failures); everything else is recoverable per page
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecognizerError::Init(_))
    }
}

pub type Result<T> = std::result::Result<T, RecognizerError>;

/// A point in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Quadrilateral region of a detection, vertices in engine order with the
/// top-left corner first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    /// Axis-aligned quad from corner coordinates
    pub fn from_rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Quad([
            Point { x, y },
            Point { x: x + width, y },
            Point {
                x: x + width,
                y: y + height,
            },
            Point {
                x,
                y: y + height,
            },
        ])
    }

    /// First vertex; used as the reading-order sort key
    pub fn top_left(&self) -> Point {
        self.0[0]
    }
}

/// One recognized text fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub text: String,
    pub confidence: f64,
    pub region: Quad,
}

/// Compute device preference for the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComputeDevice {
    #[default]
    Cpu,
    Gpu(u32),
}

/// Recognizer configuration, fixed at construction time
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Engine executable
    pub command: PathBuf,
    /// Recognizable scripts, in priority order
    pub languages: Vec<String>,
    /// Compute device preference
    pub device: ComputeDevice,
    /// Per-call timeout
    pub timeout: Duration,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from(DEFAULT_ENGINE_COMMAND),
            languages: vec!["es".to_string(), "en".to_string()],
            device: ComputeDevice::Cpu,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl RecognizerConfig {
    /// Create a new config builder
    pub fn builder() -> RecognizerConfigBuilder {
        RecognizerConfigBuilder::default()
    }
}

/// Builder for RecognizerConfig
#[derive(Debug, Default)]
pub struct RecognizerConfigBuilder {
    config: RecognizerConfig,
    languages_set: bool,
}

impl RecognizerConfigBuilder {
    /// Set the engine executable
    pub fn command(mut self, command: impl Into<PathBuf>) -> Self {
        self.config.command = command.into();
        self
    }

    /// Append a language code; the first call replaces the defaults
    pub fn language(mut self, code: impl Into<String>) -> Self {
        if !self.languages_set {
            self.config.languages.clear();
            self.languages_set = true;
        }
        self.config.languages.push(code.into());
        self
    }

    /// Replace the full language list
    pub fn languages(mut self, codes: Vec<String>) -> Self {
        self.config.languages = codes;
        self.languages_set = true;
        self
    }

    /// Set the compute device
    pub fn device(mut self, device: ComputeDevice) -> Self {
        self.config.device = device;
        self
    }

    /// Set the per-call timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> RecognizerConfig {
        self.config
    }
}

/// Capability interface the pipeline consumes
///
/// Implementations return raw, unordered detections; reading order is the
/// caller's concern.
pub trait TextRecognizer {
    fn detect(&self, image: &DynamicImage, profile: &BookProfile) -> Result<Vec<Detection>>;
}

/// Wire format of the engine's stdout
#[derive(Debug, Deserialize)]
struct EngineOutput {
    detections: Vec<EngineDetection>,
}

#[derive(Debug, Deserialize)]
struct EngineDetection {
    #[serde(default)]
    text: String,
    #[serde(default)]
    confidence: f64,
    #[serde(rename = "box")]
    region: Vec<[f64; 2]>,
}

/// Recognizer backed by an external engine process.
///
/// The engine is probed once at construction (language models are expensive
/// to load, and an unsupported language must fail the whole run, not page
/// 173). Each `detect` call hands the prepared image over as a temporary PNG
/// and parses the engine's JSON response.
pub struct SubprocessRecognizer {
    config: RecognizerConfig,
}

impl SubprocessRecognizer {
    /// Create a recognizer, verifying the engine and its language set.
    ///
    /// Fails with [`RecognizerError::Init`] when the engine executable cannot
    /// be launched or rejects the requested languages.
    pub fn new(config: RecognizerConfig) -> Result<Self> {
        if config.languages.is_empty() {
            return Err(RecognizerError::Init(
                "at least one language is required".to_string(),
            ));
        }

        let probe = Command::new(&config.command)
            .arg("--probe")
            .arg("--lang")
            .arg(config.languages.join(","))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        match probe {
            Ok(output) if output.status.success() => Ok(Self { config }),
            Ok(output) => Err(RecognizerError::Init(format!(
                "engine rejected configuration: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            Err(e) => Err(RecognizerError::Init(format!(
                "cannot launch engine {}: {}",
                config.command.display(),
                e
            ))),
        }
    }

    /// Configured languages
    pub fn languages(&self) -> &[String] {
        &self.config.languages
    }

    fn build_command(&self, image_path: &std::path::Path, profile: &BookProfile) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.arg(image_path)
            .arg("--lang")
            .arg(self.config.languages.join(","))
            .arg("--min-size")
            .arg(profile.min_text_size.to_string())
            .arg("--text-threshold")
            .arg(profile.text_threshold.to_string())
            .arg("--low-text")
            .arg(profile.low_text.to_string());

        match self.config.device {
            ComputeDevice::Cpu => {
                cmd.arg("--cpu");
            }
            ComputeDevice::Gpu(id) => {
                cmd.arg("--gpu").arg(id.to_string());
            }
        }

        cmd
    }

    /// Run the engine and collect stdout, enforcing the configured timeout
    fn run_engine(&self, mut cmd: Command) -> Result<String> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| RecognizerError::ExecutionFailed(e.to_string()))?;

        let mut stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| RecognizerError::ExecutionFailed("stdout unavailable".to_string()))?;
        let reader = std::thread::spawn(move || {
            let mut buffer = String::new();
            stdout_pipe.read_to_string(&mut buffer).map(|_| buffer)
        });

        let start = Instant::now();
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None => {
                    if start.elapsed() >= self.config.timeout {
                        child.kill().ok();
                        child.wait().ok();
                        return Err(RecognizerError::Timeout(self.config.timeout));
                    }
                    std::thread::sleep(WAIT_POLL_INTERVAL);
                }
            }
        };

        let stdout = reader
            .join()
            .map_err(|_| RecognizerError::ExecutionFailed("stdout reader panicked".to_string()))??;

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                pipe.read_to_string(&mut stderr).ok();
            }
            return Err(RecognizerError::ExecutionFailed(format!(
                "engine exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        Ok(stdout)
    }

    /// Parse the engine's JSON response into detections
    fn parse_detections(payload: &str) -> Result<Vec<Detection>> {
        let output: EngineOutput = serde_json::from_str(payload)
            .map_err(|e| RecognizerError::InvalidOutput(e.to_string()))?;

        let mut detections = Vec::with_capacity(output.detections.len());
        for raw in output.detections {
            if raw.region.len() != 4 {
                return Err(RecognizerError::InvalidOutput(format!(
                    "expected 4 region points, got {}",
                    raw.region.len()
                )));
            }

            let points = [
                Point {
                    x: raw.region[0][0],
                    y: raw.region[0][1],
                },
                Point {
                    x: raw.region[1][0],
                    y: raw.region[1][1],
                },
                Point {
                    x: raw.region[2][0],
                    y: raw.region[2][1],
                },
                Point {
                    x: raw.region[3][0],
                    y: raw.region[3][1],
                },
            ];

            detections.push(Detection {
                text: raw.text,
                confidence: raw.confidence.clamp(0.0, 1.0),
                region: Quad(points),
            });
        }

        Ok(detections)
    }
}

impl TextRecognizer for SubprocessRecognizer {
    fn detect(&self, image: &DynamicImage, profile: &BookProfile) -> Result<Vec<Detection>> {
        let handoff = tempfile::Builder::new()
            .prefix("bookscan-page-")
            .suffix(".png")
            .tempfile()?;
        image
            .save(handoff.path())
            .map_err(|e| RecognizerError::ExecutionFailed(e.to_string()))?;

        let cmd = self.build_command(handoff.path(), profile);
        let stdout = self.run_engine(cmd)?;
        Self::parse_detections(&stdout)
    }
}
