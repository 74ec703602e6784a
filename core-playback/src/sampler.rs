//! Periodic samplers driving UI refresh, segment skipping and watch progress.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Which sampler fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerKind {
    /// Now-playing refresh and segment evaluation.
    Frequent,
    /// Watch-progress sampling.
    Infrequent,
}

/// The two sampler tasks, stopped together through one token.
pub struct Samplers {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Samplers {
    /// Spawns both samplers. `tick` returns `false` once the receiver is gone,
    /// which ends the sampler.
    pub fn spawn<F>(frequent: Duration, infrequent: Duration, token: CancellationToken, tick: F) -> Self
    where
        F: Fn(SamplerKind) -> bool + Clone + Send + 'static,
    {
        let tasks = [(SamplerKind::Frequent, frequent), (SamplerKind::Infrequent, infrequent)]
            .into_iter()
            .map(|(kind, period)| tokio::spawn(run_sampler(kind, period, token.clone(), tick.clone())))
            .collect();

        Self { token, tasks }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels both samplers and waits for them to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

async fn run_sampler<F>(kind: SamplerKind, period: Duration, token: CancellationToken, tick: F)
where
    F: Fn(SamplerKind) -> bool,
{
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                trace!(?kind, "sampler tick");
                if !tick(kind) {
                    break;
                }
            }
        }
    }
}
