use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

type BoxedRun = Pin<Box<dyn Future<Output = ()> + Send>>;
type Job = Arc<dyn Fn() -> BoxedRun + Send + Sync>;

/// A job run on a fixed period until stopped. At most one run loop is alive
/// at a time; starting again replaces the previous loop. Runs never overlap:
/// the next tick waits for the current job to finish.
pub struct PeriodicTask {
    job: Job,
    period: Option<Duration>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn new<F, Fut>(job: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            job: Arc::new(move || -> BoxedRun { Box::pin(job()) }),
            period: None,
            handle: None,
        }
    }

    /// Start the loop. The first run happens one `period` from now.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, period: Duration) {
        self.stop();
        let job = self.job.clone();
        debug!(period_ms = period.as_millis() as u64, "starting periodic task");
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                job().await;
            }
        }));
        self.period = Some(period);
    }

    pub fn restart(&mut self, period: Duration) {
        self.start(period);
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("stopped periodic task");
        }
        self.period = None;
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}
