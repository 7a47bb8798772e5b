use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::WorkConfig;

/// Stands in for real document processing: holds the worker for a random
/// duration within the configured window.
#[derive(Debug, Clone)]
pub struct WorkSimulator {
    config: WorkConfig,
}

impl WorkSimulator {
    pub fn new(config: WorkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkConfig {
        &self.config
    }

    /// Uniform over `[min_ms, max_ms]`, both ends included.
    pub fn draw_duration_ms(&self) -> u64 {
        rand::thread_rng().gen_range(self.config.min_ms..=self.config.max_ms)
    }

    /// Draw a duration, spend it, and return it in milliseconds.
    pub async fn execute(&self) -> u64 {
        let work_ms = self.draw_duration_ms();
        let duration = Duration::from_millis(work_ms);

        if self.config.busy_cpu {
            // Keep the spin off the runtime's worker threads.
            if let Err(e) = tokio::task::spawn_blocking(move || busy_work(duration)).await {
                tracing::warn!(error = %e, work_ms, "CPU-bound work task failed");
            }
        } else {
            tokio::time::sleep(duration).await;
        }

        work_ms
    }
}

/// Spin on cheap arithmetic until `duration` has elapsed.
fn busy_work(duration: Duration) -> u64 {
    let deadline = Instant::now() + duration;
    let mut x: u64 = 0;
    while Instant::now() < deadline {
        x = (x * 3 + 7) % 1_000_003;
    }
    std::hint::black_box(x)
}
