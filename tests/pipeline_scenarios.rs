//! End-to-end runs of the harvesting pipeline against a scripted browser

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use m3u_harvester::browser::{BrowserEngine, BrowsingContext};
use m3u_harvester::config::{Config, HttpIdentityConfig};
use m3u_harvester::errors::{BrowserError, BrowserResult};
use m3u_harvester::models::{CandidateStream, RunBudget};
use m3u_harvester::playlist::{PlaylistWriter, WriteOutcome};
use m3u_harvester::services::{
    ChannelDiscoverer, RunController, RunReport, StreamResolver, StreamValidator,
};

const SITE: &str = "https://www.seirsanduk.us";

/// One step of a channel page: what gets captured and how long loading takes
#[derive(Clone)]
struct Step {
    captured: Option<&'static str>,
    load_time: Duration,
}

fn captures(url: &'static str) -> Step {
    Step {
        captured: Some(url),
        load_time: Duration::ZERO,
    }
}

#[derive(Default)]
struct SiteState {
    landing: Option<Vec<String>>,
    pages: HashMap<String, VecDeque<Step>>,
    visits: Vec<String>,
    open_contexts: usize,
}

/// Scripted site: a landing page and per-channel sequences of steps
#[derive(Clone, Default)]
struct FakeSite {
    state: Arc<Mutex<SiteState>>,
}

impl FakeSite {
    fn with_landing(hrefs: &[&str]) -> Self {
        let site = Self::default();
        site.state.lock().unwrap().landing = Some(hrefs.iter().map(|h| h.to_string()).collect());
        site
    }

    fn unreachable() -> Self {
        Self::default()
    }

    fn page(self, channel: &str, steps: Vec<Step>) -> Self {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(format!("{SITE}/{channel}-online"), steps.into());
        self
    }

    fn visits_to(&self, channel: &str) -> usize {
        let url = format!("{SITE}/{channel}-online");
        self.state.lock().unwrap().visits.iter().filter(|v| **v == url).count()
    }

    fn open_contexts(&self) -> usize {
        self.state.lock().unwrap().open_contexts
    }
}

struct FakeContext {
    site: FakeSite,
}

#[async_trait]
impl BrowserEngine for FakeSite {
    async fn open_context(&self) -> BrowserResult<Box<dyn BrowsingContext>> {
        self.state.lock().unwrap().open_contexts += 1;
        Ok(Box::new(FakeContext { site: self.clone() }))
    }
}

#[async_trait]
impl BrowsingContext for FakeContext {
    async fn collect_anchor_hrefs(
        &mut self,
        url: &str,
        nav_timeout: Duration,
        _settle: Duration,
    ) -> BrowserResult<Vec<String>> {
        let landing = self.site.state.lock().unwrap().landing.clone();
        landing.ok_or_else(|| BrowserError::timeout(format!("navigate {url}"), nav_timeout.as_secs()))
    }

    async fn capture_request(
        &mut self,
        url: &str,
        marker: &str,
        _timeout: Duration,
    ) -> BrowserResult<Option<String>> {
        let step = {
            let mut state = self.site.state.lock().unwrap();
            state.visits.push(url.to_string());
            state.pages.get_mut(url).and_then(|steps| steps.pop_front())
        };

        match step {
            Some(step) => {
                tokio::time::sleep(step.load_time).await;
                Ok(step.captured.filter(|u| u.contains(marker)).map(str::to_string))
            }
            None => Ok(None),
        }
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        self.site.state.lock().unwrap().open_contexts -= 1;
        Ok(())
    }
}

/// Accepts exactly the listed URLs
struct LiveStreams(Vec<&'static str>);

#[async_trait]
impl StreamValidator for LiveStreams {
    async fn validate(&self, candidate: &CandidateStream) -> bool {
        self.0.contains(&candidate.url())
    }

    fn name(&self) -> &'static str {
        "live-streams"
    }
}

async fn run(site: &FakeSite, live: Vec<&'static str>, output: &Path, max_runtime: Duration) -> RunReport {
    let config = Config::default();
    let engine: Arc<dyn BrowserEngine> = Arc::new(site.clone());
    let resolver = StreamResolver::new(
        engine.clone(),
        Arc::new(LiveStreams(live)),
        SITE,
        config.resolver.clone(),
    );
    let controller = RunController::new(
        engine,
        ChannelDiscoverer::new(&config.site).unwrap(),
        resolver,
        PlaylistWriter::new(output, &config.http),
    );

    controller.run(RunBudget::start(max_runtime)).await.unwrap()
}

fn expected_entry(name: &str, url: &str) -> String {
    let identity = HttpIdentityConfig::default();
    format!(
        "\n#EXTINF:-1, {name}\n#EXTVLCOPT:http-user-agent={ua}\n#EXTVLCOPT:http-referrer={referer}\n{url}|User-Agent={ua}&Referer={referer}\n",
        ua = identity.user_agent,
        referer = identity.referer,
    )
}

const NEWS1_URL: &str = "https://cdn.example/news1/index.m3u8?token=a";

#[tokio::test(start_paused = true)]
async fn test_one_live_channel_out_of_two() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("tv.m3u");
    let site = FakeSite::with_landing(&[
        "https://www.seirsanduk.us/news1-online",
        "https://www.seirsanduk.us/sports2-online",
        "https://www.seirsanduk.us/contacts",
    ])
    .page("news1", vec![captures(NEWS1_URL)]);

    let report = run(&site, vec![NEWS1_URL], &output, Duration::from_secs(600)).await;

    assert_eq!(report.discovered, 2);
    assert_eq!(report.attempted, 2);
    assert_eq!(report.resolved(), 1);
    assert_eq!(report.not_found, 1);
    assert!(!report.budget_exhausted);

    let contents = std::fs::read_to_string(&output).unwrap();
    assert_eq!(contents, format!("#EXTM3U\n{}", expected_entry("NEWS1", NEWS1_URL)));

    // sports2 used its full retry budget, and every context was closed
    assert_eq!(site.visits_to("sports2"), 2);
    assert_eq!(site.open_contexts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_budget_exhausted_after_first_channel() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("tv.m3u");
    let site = FakeSite::with_landing(&[
        "https://www.seirsanduk.us/news1-online",
        "https://www.seirsanduk.us/sports2-online",
    ])
    .page(
        "news1",
        vec![Step {
            captured: Some(NEWS1_URL),
            load_time: Duration::from_secs(10),
        }],
    )
    .page("sports2", vec![captures("https://cdn.example/sports2/index.m3u8")]);

    let report = run(&site, vec![NEWS1_URL], &output, Duration::from_secs(5)).await;

    assert!(report.budget_exhausted);
    assert_eq!(report.attempted, 1);
    assert_eq!(site.visits_to("sports2"), 0);

    let contents = std::fs::read_to_string(&output).unwrap();
    assert_eq!(contents, format!("#EXTM3U\n{}", expected_entry("NEWS1", NEWS1_URL)));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_candidate_then_accepted_retry() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("tv.m3u");
    let fresh = "https://cdn.example/news1/index.m3u8?token=fresh";
    let site = FakeSite::with_landing(&["https://www.seirsanduk.us/news1-online"]).page(
        "news1",
        vec![captures("https://cdn.example/news1/index.m3u8?token=expired"), captures(fresh)],
    );

    let report = run(&site, vec![fresh], &output, Duration::from_secs(600)).await;

    assert_eq!(report.resolved(), 1);
    assert_eq!(report.entries[0].url(), fresh);
    assert_eq!(site.visits_to("news1"), 2);

    let contents = std::fs::read_to_string(&output).unwrap();
    assert!(contents.contains(fresh));
    assert!(!contents.contains("token=expired"));
}

#[tokio::test(start_paused = true)]
async fn test_no_live_channels_removes_stale_playlist() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("tv.m3u");
    std::fs::write(&output, "#EXTM3U\n\n#EXTINF:-1, OLD\nhttps://old/index.m3u8\n").unwrap();
    let site = FakeSite::with_landing(&["https://www.seirsanduk.us/news1-online"]);

    let report = run(&site, Vec::new(), &output, Duration::from_secs(600)).await;

    assert_eq!(report.resolved(), 0);
    assert_eq!(report.outcome, WriteOutcome::Removed { path: output.clone() });
    assert!(!output.exists());
}

#[tokio::test(start_paused = true)]
async fn test_changed_site_layout_ends_cleanly() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("tv.m3u");
    std::fs::write(&output, "#EXTM3U\n").unwrap();
    let site = FakeSite::with_landing(&["https://www.seirsanduk.us/watch?ch=news1"]);

    let report = run(&site, Vec::new(), &output, Duration::from_secs(600)).await;

    assert_eq!(report.discovered, 0);
    assert_eq!(report.attempted, 0);
    assert!(report.discovery_error.unwrap().contains("channel pattern"));
    assert!(!output.exists());
    assert_eq!(site.open_contexts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_site_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("tv.m3u");
    let site = FakeSite::unreachable();

    let report = run(&site, Vec::new(), &output, Duration::from_secs(600)).await;

    assert!(report.discovery_error.is_some());
    assert_eq!(report.outcome, WriteOutcome::Untouched);
    assert!(!output.exists());
}
