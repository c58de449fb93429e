//! End-to-end reporting passes against an in-memory CI service.

use std::collections::HashMap;
use std::sync::Arc;

use ci_reporter::ci::history::RunSource;
use ci_reporter::ci::memory::MemoryTransport;
use ci_reporter::ci::CheckError;
use ci_reporter::config::{CiConfig, ReporterConfig, TrackedVersion, Variant};
use ci_reporter::notify::DryRunNotifier;
use ci_reporter::report::{ReportOutcome, Reporter};

const HOST: &str = "http://ci.test";

fn config(versions: &[&str]) -> ReporterConfig {
    ReporterConfig {
        variant: Variant::Deploy,
        ci: CiConfig {
            host: HOST.to_string(),
            logs_url_template: "{host}/logs/job-{version}/".to_string(),
            history_url_template: "http://prow.test/job-history/job-{version}".to_string(),
            run_path_marker: "/logs/".to_string(),
            ..CiConfig::default()
        },
        versions: versions.iter().map(|v| TrackedVersion::new(*v)).collect(),
        ..ReporterConfig::default()
    }
}

fn passed(ts: i64) -> String {
    format!(r#"{{"passed":true,"timestamp":{ts}}}"#)
}

fn failed(ts: i64) -> String {
    format!(r#"{{"passed":false,"timestamp":{ts}}}"#)
}

/// Latest run of `version` is build 1000 with the given status document.
fn with_latest(transport: MemoryTransport, version: &str, status: &str) -> MemoryTransport {
    let base = format!("{HOST}/logs/job-{version}/");
    transport
        .with_body(format!("{base}latest-build.txt"), "1000\n")
        .with_body(format!("{base}1000/finished.json"), status)
        .with_body(
            format!("{base}1000/prowjob.json"),
            format!(r#"{{"status":{{"url":"http://prow.test/view/{version}/1000"}}}}"#),
        )
}

/// Run history for `version`: `streak` passes, newest first, then a failure.
fn with_history(
    transport: MemoryTransport,
    runs: &mut HashMap<String, Vec<String>>,
    version: &str,
    streak: usize,
) -> MemoryTransport {
    let mut transport = transport;
    let mut hrefs = Vec::new();
    for i in 0..=streak {
        let id = 2000 - i;
        let href = format!("/logs/job-{version}/{id}/");
        let body = if i < streak { passed(id as i64) } else { failed(id as i64) };
        transport = transport.with_body(format!("{HOST}/logs/job-{version}/{id}/finished.json"), body);
        hrefs.push(href);
    }
    runs.insert(version.to_string(), hrefs);
    transport
}

struct FixedRuns(HashMap<String, Vec<String>>);

#[async_trait::async_trait]
impl RunSource for FixedRuns {
    async fn list_runs(&self, version: &TrackedVersion) -> Result<Vec<String>, CheckError> {
        Ok(self.0.get(&version.version).cloned().unwrap_or_default())
    }
}

fn all_green(versions: &[&str], streaks: &[usize]) -> (MemoryTransport, FixedRuns) {
    let mut transport = MemoryTransport::new();
    let mut runs = HashMap::new();
    for (version, streak) in versions.iter().zip(streaks) {
        transport = with_latest(transport, version, &passed(1));
        transport = with_history(transport, &mut runs, version, *streak);
    }
    (transport, FixedRuns(runs))
}

async fn run_green(streaks: &[usize]) -> (ReportOutcome, Arc<DryRunNotifier>) {
    let versions = ["4.18", "4.19", "4.20"];
    let (transport, runs) = all_green(&versions, streaks);
    let notifier = Arc::new(DryRunNotifier::quiet());
    let reporter = Reporter::new(
        config(&versions),
        Some("S0GROUP".to_string()),
        Arc::new(transport),
        notifier.clone(),
    )
    .with_run_source(Arc::new(runs));
    (reporter.run().await, notifier)
}

#[tokio::test]
async fn test_failures_produce_one_alert_and_skip_keepalive() {
    let versions = ["4.18", "4.19", "4.20"];
    let transport = with_latest(MemoryTransport::new(), "4.18", &failed(1_792_364_700));
    let transport = with_latest(transport, "4.19", &passed(1));
    let transport = Arc::new(with_latest(transport, "4.20", &failed(1_792_364_700)));
    let notifier = Arc::new(DryRunNotifier::quiet());

    let reporter = Reporter::new(
        config(&versions),
        Some("S0GROUP".to_string()),
        transport.clone(),
        notifier.clone(),
    );
    let outcome = reporter.run().await;

    assert_eq!(
        outcome,
        ReportOutcome::FailureAlert {
            failed_versions: vec!["4.18".to_string(), "4.20".to_string()]
        }
    );
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    let ids: Vec<_> = sent[0].blocks.iter().map(|b| b.block_id().to_string()).collect();
    assert_eq!(ids, vec!["result-4.18", "result-4.20", "mention"]);

    let json = serde_json::to_value(&sent[0].blocks).unwrap();
    assert_eq!(json[0]["elements"][0]["elements"][3]["url"], "http://prow.test/view/4.18/1000");
    assert_eq!(json[2]["elements"][0]["elements"][1]["usergroup_id"], "S0GROUP");

    // No history listing or per-run walk once a failure is seen.
    assert!(!transport.requests().iter().any(|u| u.ends_with("-4.19/")));
}

#[tokio::test]
async fn test_keepalive_when_min_streak_is_multiple_of_period() {
    let (outcome, notifier) = run_green(&[7, 14, 7]).await;
    assert_eq!(outcome, ReportOutcome::Keepalive { min_streak: 7 });

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    let ids: Vec<_> = sent[0].blocks.iter().map(|b| b.block_id().to_string()).collect();
    assert_eq!(ids, vec!["keepalive-message", "keepalive_block"]);
    let json = serde_json::to_value(&sent[0].blocks[1]).unwrap();
    let items = json["elements"][0]["elements"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(
        items[0]["elements"][0]["url"],
        "http://prow.test/job-history/job-4.18"
    );
}

#[tokio::test]
async fn test_only_the_minimum_streak_matters() {
    let (outcome, notifier) = run_green(&[7, 8, 7]).await;
    assert_eq!(outcome, ReportOutcome::Keepalive { min_streak: 7 });
    assert_eq!(notifier.sent().len(), 1);

    let (outcome, notifier) = run_green(&[8, 14, 21]).await;
    assert_eq!(outcome, ReportOutcome::Quiet { min_streak: Some(8) });
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_zero_streak_sends_nothing() {
    let (outcome, notifier) = run_green(&[0, 7, 7]).await;
    assert_eq!(outcome, ReportOutcome::Quiet { min_streak: Some(0) });
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_running_job_does_not_block_other_versions() {
    let versions = ["4.18", "4.19"];
    let transport = with_latest(MemoryTransport::new(), "4.18", "<html>NoSuchKey</html>");
    let transport = Arc::new(with_latest(transport, "4.19", &failed(5)));
    let notifier = Arc::new(DryRunNotifier::quiet());

    let reporter = Reporter::new(
        config(&versions),
        Some("S0GROUP".to_string()),
        transport,
        notifier.clone(),
    );
    assert_eq!(
        reporter.run().await,
        ReportOutcome::FailureAlert {
            failed_versions: vec!["4.19".to_string()]
        }
    );
}

#[tokio::test]
async fn test_unreachable_pointer_is_skipped() {
    let versions = ["4.18", "4.19"];
    let transport = Arc::new(with_latest(MemoryTransport::new(), "4.19", &passed(5)));
    let notifier = Arc::new(DryRunNotifier::quiet());

    let mut cfg = config(&versions);
    cfg.variant = Variant::Informing;
    let reporter = Reporter::new(cfg, None, transport, notifier.clone());
    assert_eq!(reporter.run().await, ReportOutcome::Quiet { min_streak: None });
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_keepalive_from_scraped_listing() {
    let versions = ["4.20"];
    let mut listing = String::from("<html><body><ul>\n");
    listing.push_str(r#"<li><a href="/logs/job-4.20/latest-build.txt">latest-build.txt</a></li>"#);
    let mut transport = with_latest(MemoryTransport::new(), "4.20", &passed(1));
    // Listing order is scrambled on purpose; the scan sorts newest first.
    for id in [3001, 3007, 3003, 3000, 3005, 3002, 3006, 3004] {
        listing.push_str(&format!(r#"<li><a href="/logs/job-4.20/{id}/">{id}/</a></li>"#));
        let body = if id == 3000 { failed(id) } else { passed(id) };
        transport = transport.with_body(format!("{HOST}/logs/job-4.20/{id}/finished.json"), body);
    }
    listing.push_str("</ul></body></html>");
    let transport = Arc::new(transport.with_body(format!("{HOST}/logs/job-4.20/"), listing));
    let notifier = Arc::new(DryRunNotifier::quiet());

    let reporter = Reporter::new(
        config(&versions),
        Some("S0GROUP".to_string()),
        transport.clone(),
        notifier.clone(),
    );
    assert_eq!(reporter.run().await, ReportOutcome::Keepalive { min_streak: 7 });

    let walked: Vec<_> = transport
        .requests()
        .into_iter()
        .filter(|u| u.contains("/30"))
        .collect();
    assert_eq!(walked.first().map(String::as_str), Some("http://ci.test/logs/job-4.20/3007/finished.json"));
    assert_eq!(walked.last().map(String::as_str), Some("http://ci.test/logs/job-4.20/3000/finished.json"));
    assert_eq!(walked.len(), 8);
}

#[tokio::test]
async fn test_failed_listing_suppresses_keepalive() {
    let versions = ["4.19", "4.20"];
    let mut transport = with_latest(MemoryTransport::new(), "4.19", &passed(1));
    transport = with_latest(transport, "4.20", &passed(1));
    let mut listing = String::new();
    for id in 4001..=4007 {
        listing.push_str(&format!(r#"<a href="/logs/job-4.20/{id}/">{id}/</a>"#));
        transport = transport.with_body(format!("{HOST}/logs/job-4.20/{id}/finished.json"), passed(id));
    }
    // The 4.19 listing is never served, so its scan fails.
    let transport = Arc::new(transport.with_body(format!("{HOST}/logs/job-4.20/"), listing));
    let notifier = Arc::new(DryRunNotifier::quiet());

    let reporter = Reporter::new(
        config(&versions),
        Some("S0GROUP".to_string()),
        transport.clone(),
        notifier.clone(),
    );
    assert_eq!(reporter.run().await, ReportOutcome::Quiet { min_streak: Some(0) });
    assert!(notifier.sent().is_empty());
    assert!(transport.requests().contains(&format!("{HOST}/logs/job-4.19/")));
}
