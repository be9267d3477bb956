//! Stream Probing Service
//!
//! Runs ffprobe against a manifest URL and reports whether it exposes
//! demuxable media. This is the authoritative check: it catches servers that
//! answer 200 with an empty or broken playlist.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Information about a stream detected by FFprobe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamInfo {
    pub index: u32,
    pub codec_type: String, // "video", "audio", "data", ...
    pub codec_name: String, // "h264", "aac", ...
}

/// Error information from ffprobe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeError {
    pub code: Option<i32>,
    pub string: Option<String>,
}

/// Complete probe result for an input stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub streams: Vec<StreamInfo>,
    pub format_name: Option<String>,
    pub duration: Option<f64>,
    pub has_video: bool,
    pub has_audio: bool,
    pub error: Option<ProbeError>,
}

impl ProbeResult {
    /// True when ffprobe recognised a container or at least one stream
    pub fn has_media(&self) -> bool {
        self.error.is_none() && (self.format_name.is_some() || !self.streams.is_empty())
    }
}

/// Service for probing input streams
pub struct StreamProber {
    ffprobe_command: String,
    probe_timeout: Duration,
}

impl StreamProber {
    pub fn new(ffprobe_command: Option<String>, probe_timeout: Duration) -> Self {
        Self {
            ffprobe_command: ffprobe_command.unwrap_or_else(|| "ffprobe".to_string()),
            probe_timeout,
        }
    }

    /// Probe `input_url`, sending the given HTTP headers with every request
    pub async fn probe_input(&self, input_url: &str, headers: &[(&str, &str)]) -> Result<ProbeResult> {
        debug!("Probing input stream: {}", input_url);

        let mut cmd = Command::new(&self.ffprobe_command);
        cmd.args([
            "-v", "error",
            "-print_format", "json",
            "-show_error",
            "-show_entries", "stream=index,codec_type,codec_name:format=format_name,duration",
        ]);
        if !headers.is_empty() {
            let header_block: String = headers
                .iter()
                .map(|(name, value)| format!("{name}: {value}\r\n"))
                .collect();
            cmd.args(["-headers", &header_block]);
        }
        cmd.arg(input_url);

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // A timed out probe must not linger once its future is dropped.
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.probe_timeout, cmd.output())
            .await
            .map_err(|_| anyhow::anyhow!("FFprobe timeout after {:?}", self.probe_timeout))?
            .map_err(|e| anyhow::anyhow!("Failed to execute ffprobe: {}", e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        // ffprobe may still print structured error info when it fails
        let probe_data: serde_json::Value = if stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            serde_json::json!({
                "error": {
                    "code": output.status.code().unwrap_or(-1),
                    "string": stderr.trim().to_string()
                }
            })
        } else {
            serde_json::from_str(&stdout)
                .map_err(|e| anyhow::anyhow!("Failed to parse ffprobe output: {}", e))?
        };

        let mut result = parse_probe_result(probe_data);
        if !output.status.success() && result.error.is_none() {
            result.error = Some(ProbeError {
                code: output.status.code(),
                string: Some("ffprobe exited with a failure status".to_string()),
            });
        }

        if let Some(error) = &result.error {
            let error_msg = error.string.as_deref().unwrap_or("Unknown ffprobe error");
            warn!("FFprobe reported error for {}: {} (code: {:?})", input_url, error_msg, error.code);
            return Err(anyhow::anyhow!("FFprobe error: {} (code: {:?})", error_msg, error.code));
        }

        debug!(
            "Probed {}: {} streams, format: {:?}, duration: {:?}",
            input_url,
            result.streams.len(),
            result.format_name,
            result.duration
        );

        Ok(result)
    }
}

/// Parse ffprobe JSON output into a ProbeResult
fn parse_probe_result(data: serde_json::Value) -> ProbeResult {
    let error = data.get("error").map(|error_obj| ProbeError {
        code: error_obj.get("code").and_then(|v| v.as_i64()).map(|v| v as i32),
        string: error_obj.get("string").and_then(|v| v.as_str()).map(|s| s.to_string()),
    });

    let streams: Vec<StreamInfo> = data
        .get("streams")
        .and_then(|v| v.as_array())
        .map(|streams_array| {
            streams_array
                .iter()
                .enumerate()
                .map(|(index, stream)| StreamInfo {
                    index: stream
                        .get("index")
                        .and_then(|v| v.as_u64())
                        .map(|v| v as u32)
                        .unwrap_or(index as u32),
                    codec_type: stream.get("codec_type").and_then(|v| v.as_str()).unwrap_or("unknown").to_string(),
                    codec_name: stream.get("codec_name").and_then(|v| v.as_str()).unwrap_or("unknown").to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let format = data.get("format").and_then(|v| v.as_object());
    let format_name = format
        .and_then(|f| f.get("format_name"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let duration = format
        .and_then(|f| f.get("duration"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok());

    ProbeResult {
        has_video: streams.iter().any(|s| s.codec_type == "video"),
        has_audio: streams.iter().any(|s| s.codec_type == "audio"),
        streams,
        format_name,
        duration,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_result_with_error() {
        let error_data = serde_json::json!({
            "error": {
                "code": -1094995529,
                "string": "Invalid data found when processing input"
            }
        });

        let result = parse_probe_result(error_data);
        let error = result.error.as_ref().unwrap();
        assert_eq!(error.code, Some(-1094995529));
        assert_eq!(error.string.as_deref(), Some("Invalid data found when processing input"));
        assert!(result.streams.is_empty());
        assert!(!result.has_media());
    }

    #[test]
    fn test_parse_probe_result_success() {
        let success_data = serde_json::json!({
            "streams": [
                { "index": 0, "codec_type": "video", "codec_name": "h264" },
                { "index": 1, "codec_type": "audio", "codec_name": "aac" }
            ],
            "format": {
                "format_name": "hls",
                "duration": "3600.0"
            }
        });

        let result = parse_probe_result(success_data);
        assert!(result.error.is_none());
        assert_eq!(result.streams.len(), 2);
        assert!(result.has_video);
        assert!(result.has_audio);
        assert_eq!(result.format_name.as_deref(), Some("hls"));
        assert_eq!(result.duration, Some(3600.0));
        assert!(result.has_media());
    }

    #[test]
    fn test_empty_probe_output_has_no_media() {
        let result = parse_probe_result(serde_json::json!({}));
        assert!(!result.has_media());
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let prober = StreamProber::new(
            Some("/nonexistent/bin/ffprobe".to_string()),
            Duration::from_secs(2),
        );

        let result = prober
            .probe_input("https://cdn.example/a/index.m3u8", &[("Referer", "https://ref.example")])
            .await;
        assert!(result.is_err());
    }
}
