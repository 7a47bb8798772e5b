use std::time::Duration;

use rand::Rng;

use crate::client::GatewayClient;
use crate::job::JobRequest;

/// Synthetic traffic settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadgenConfig {
    pub jobs: u32,
    /// Probability in `[0, 1]` that a generated job is heavy.
    pub heavy_ratio: f64,
    /// Pause between submissions.
    pub pause: Duration,
}

impl Default for LoadgenConfig {
    fn default() -> Self {
        Self {
            jobs: 200,
            heavy_ratio: 0.35,
            pause: Duration::from_millis(10),
        }
    }
}

impl LoadgenConfig {
    pub fn with_jobs(mut self, jobs: u32) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_heavy_ratio(mut self, heavy_ratio: f64) -> Self {
        self.heavy_ratio = heavy_ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub sent: u32,
    pub ok: u32,
}

/// Attributes that always classify light.
pub fn random_light<R: Rng + ?Sized>(rng: &mut R) -> JobRequest {
    JobRequest::new(
        rng.gen_range(1..=20),
        rng.gen_range(1..=120),
        rng.gen_range(0..=15),
    )
}

/// Attributes that always classify heavy.
pub fn random_heavy<R: Rng + ?Sized>(rng: &mut R) -> JobRequest {
    JobRequest::new(
        rng.gen_range(60..=200),
        rng.gen_range(250..=1500),
        rng.gen_range(60..=500),
    )
}

fn next_request(heavy_ratio: f64) -> JobRequest {
    let mut rng = rand::thread_rng();
    if rng.gen_bool(heavy_ratio.clamp(0.0, 1.0)) {
        random_heavy(&mut rng)
    } else {
        random_light(&mut rng)
    }
}

/// Submit `config.jobs` requests one after another. Failures are counted, not retried.
pub async fn run(client: &GatewayClient, config: &LoadgenConfig) -> LoadReport {
    let mut report = LoadReport::default();

    for _ in 0..config.jobs {
        let request = next_request(config.heavy_ratio);
        report.sent += 1;

        match client.submit(&request).await {
            Ok(receipt) => {
                report.ok += 1;
                tracing::debug!(job_id = %receipt.job_id, "Submitted");
            }
            Err(e) => tracing::warn!(error = %e, "Submission failed"),
        }

        if !config.pause.is_zero() {
            tokio::time::sleep(config.pause).await;
        }
    }

    tracing::info!(sent = report.sent, ok = report.ok, "Load generation finished");
    report
}
