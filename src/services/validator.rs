//! Stream validation
//!
//! A captured manifest URL is only worth publishing if it answers. Two
//! checks exist: a cheap HTTP probe and an ffprobe run. The configured
//! strategy picks one or chains both.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{Config, HttpIdentityConfig, ProbeMethod, ValidationStrategy, ValidatorConfig};
use crate::errors::{AppError, AppResult};
use crate::models::CandidateStream;
use crate::services::stream_prober::StreamProber;
use crate::utils::is_status_acceptable;

/// Decides whether a candidate stream is live. Never fails: any problem
/// reaching the stream counts as "not live".
#[async_trait]
pub trait StreamValidator: Send + Sync {
    async fn validate(&self, candidate: &CandidateStream) -> bool;

    fn name(&self) -> &'static str;
}

/// Lightweight check: request the manifest and inspect the status code only.
pub struct HttpProbeValidator {
    client: reqwest::Client,
    method: ProbeMethod,
    acceptable_status_codes: Vec<String>,
}

impl HttpProbeValidator {
    pub fn new(config: &ValidatorConfig, identity: &HttpIdentityConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&identity.user_agent)
                .map_err(|e| AppError::configuration(format!("Invalid user agent: {e}")))?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&identity.referer)
                .map_err(|e| AppError::configuration(format!("Invalid referer: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            client,
            method: config.method,
            acceptable_status_codes: config.acceptable_status_codes.clone(),
        })
    }
}

#[async_trait]
impl StreamValidator for HttpProbeValidator {
    async fn validate(&self, candidate: &CandidateStream) -> bool {
        let request = match self.method {
            ProbeMethod::Get => self.client.get(candidate.url()),
            ProbeMethod::Head => self.client.head(candidate.url()),
        };

        // Only the status line matters; the body is dropped unread.
        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let acceptable = is_status_acceptable(&status, &self.acceptable_status_codes);
                debug!(
                    "HTTP probe of {} returned {} (acceptable: {})",
                    candidate.url(),
                    status.as_u16(),
                    acceptable
                );
                acceptable
            }
            Err(e) => {
                debug!("HTTP probe of {} failed: {}", candidate.url(), e);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Authoritative check: the stream must be demuxable by ffprobe.
pub struct FfprobeValidator {
    prober: StreamProber,
    user_agent: String,
    referer: String,
}

impl FfprobeValidator {
    pub fn new(config: &ValidatorConfig, identity: &HttpIdentityConfig) -> Self {
        Self {
            prober: StreamProber::new(Some(config.ffprobe_command.clone()), config.probe_timeout),
            user_agent: identity.user_agent.clone(),
            referer: identity.referer.clone(),
        }
    }
}

#[async_trait]
impl StreamValidator for FfprobeValidator {
    async fn validate(&self, candidate: &CandidateStream) -> bool {
        let headers = [("User-Agent", self.user_agent.as_str()), ("Referer", self.referer.as_str())];
        match self.prober.probe_input(candidate.url(), &headers).await {
            Ok(result) => result.has_media(),
            Err(e) => {
                debug!("ffprobe rejected {}: {}", candidate.url(), e);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "ffprobe"
    }
}

/// Runs validators in order and stops at the first rejection.
pub struct CompositeValidator {
    validators: Vec<Box<dyn StreamValidator>>,
}

impl CompositeValidator {
    pub fn new(validators: Vec<Box<dyn StreamValidator>>) -> Self {
        Self { validators }
    }
}

#[async_trait]
impl StreamValidator for CompositeValidator {
    async fn validate(&self, candidate: &CandidateStream) -> bool {
        for validator in &self.validators {
            if !validator.validate(candidate).await {
                debug!("{} validator rejected {}", validator.name(), candidate.url());
                return false;
            }
        }
        true
    }

    fn name(&self) -> &'static str {
        "combined"
    }
}

/// Build the validator selected by `validator.strategy`.
pub fn build_validator(config: &Config) -> AppResult<Arc<dyn StreamValidator>> {
    let validator: Arc<dyn StreamValidator> = match config.validator.strategy {
        ValidationStrategy::Http => Arc::new(HttpProbeValidator::new(&config.validator, &config.http)?),
        ValidationStrategy::Ffprobe => Arc::new(FfprobeValidator::new(&config.validator, &config.http)),
        ValidationStrategy::Combined => Arc::new(CompositeValidator::new(vec![
            Box::new(HttpProbeValidator::new(&config.validator, &config.http)?),
            Box::new(FfprobeValidator::new(&config.validator, &config.http)),
        ])),
    };

    if matches!(config.validator.strategy, ValidationStrategy::Ffprobe | ValidationStrategy::Combined)
        && config.validator.ffprobe_command.trim().is_empty()
    {
        warn!("ffprobe command is empty; every stream will be rejected");
    }

    Ok(validator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one canned response and hand back the raw request that was received.
    async fn serve_once(status_line: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut received = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                if received.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&received).to_string());
        });

        (format!("http://{addr}/live/index.m3u8"), rx)
    }

    fn identity() -> HttpIdentityConfig {
        HttpIdentityConfig {
            user_agent: "TestAgent/1.0".to_string(),
            referer: "https://ref.example".to_string(),
        }
    }

    #[tokio::test]
    async fn test_http_probe_accepts_2xx_and_sends_identity_headers() {
        let (url, request) = serve_once("HTTP/1.1 200 OK").await;
        let validator = HttpProbeValidator::new(&ValidatorConfig::default(), &identity()).unwrap();

        assert!(validator.validate(&CandidateStream::new(url)).await);

        let raw = request.await.unwrap().to_lowercase();
        assert!(raw.starts_with("get /live/index.m3u8"));
        assert!(raw.contains("user-agent: testagent/1.0"));
        assert!(raw.contains("referer: https://ref.example"));
    }

    #[tokio::test]
    async fn test_http_probe_rejects_forbidden() {
        let (url, _request) = serve_once("HTTP/1.1 403 Forbidden").await;
        let validator = HttpProbeValidator::new(&ValidatorConfig::default(), &identity()).unwrap();

        assert!(!validator.validate(&CandidateStream::new(url)).await);
    }

    #[tokio::test]
    async fn test_http_probe_head_method() {
        let (url, request) = serve_once("HTTP/1.1 204 No Content").await;
        let config = ValidatorConfig {
            method: ProbeMethod::Head,
            ..ValidatorConfig::default()
        };
        let validator = HttpProbeValidator::new(&config, &identity()).unwrap();

        assert!(validator.validate(&CandidateStream::new(url)).await);
        assert!(request.await.unwrap().starts_with("HEAD "));
    }

    #[tokio::test]
    async fn test_http_probe_unreachable_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ValidatorConfig {
            http_timeout: Duration::from_secs(2),
            ..ValidatorConfig::default()
        };
        let validator = HttpProbeValidator::new(&config, &identity()).unwrap();
        let candidate = CandidateStream::new(format!("http://{addr}/index.m3u8"));

        assert!(!validator.validate(&candidate).await);
    }

    #[tokio::test]
    async fn test_ffprobe_validator_missing_binary_rejects() {
        let config = ValidatorConfig {
            ffprobe_command: "/nonexistent/bin/ffprobe".to_string(),
            ..ValidatorConfig::default()
        };
        let validator = FfprobeValidator::new(&config, &identity());

        assert!(!validator.validate(&CandidateStream::new("http://127.0.0.1:9/index.m3u8")).await);
    }

    struct Fixed {
        verdict: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StreamValidator for Fixed {
        async fn validate(&self, _candidate: &CandidateStream) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_composite_short_circuits_on_rejection() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let composite = CompositeValidator::new(vec![
            Box::new(Fixed { verdict: false, calls: first.clone() }),
            Box::new(Fixed { verdict: true, calls: second.clone() }),
        ]);

        assert!(!composite.validate(&CandidateStream::new("http://x/index.m3u8")).await);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_composite_requires_every_validator() {
        let calls = Arc::new(AtomicUsize::new(0));
        let composite = CompositeValidator::new(vec![
            Box::new(Fixed { verdict: true, calls: calls.clone() }),
            Box::new(Fixed { verdict: true, calls: calls.clone() }),
        ]);

        assert!(composite.validate(&CandidateStream::new("http://x/index.m3u8")).await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_build_validator_follows_strategy() {
        let mut config = Config::default();
        assert_eq!(build_validator(&config).unwrap().name(), "combined");

        config.validator.strategy = ValidationStrategy::Http;
        assert_eq!(build_validator(&config).unwrap().name(), "http");

        config.validator.strategy = ValidationStrategy::Ffprobe;
        assert_eq!(build_validator(&config).unwrap().name(), "ffprobe");
    }
}
