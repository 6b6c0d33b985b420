use crate::generate::{host::Host, GenerationError, Phase, Progress};
use log::trace;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// A shareable flag that asks a generation run to stop. Clone it, hand one
/// copy to the generator, and call [Self::cancel] on the other from wherever.
/// The generator checks it at every yield point and unwinds with
/// [GenerationError::Cancelled].
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Wall-clock budget for a single frame's worth of work
#[derive(Copy, Clone, Debug)]
pub struct FrameBudget {
    budget: Duration,
    last_yield: Instant,
}

impl FrameBudget {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            last_yield: Instant::now(),
        }
    }

    /// Has more time than the budget passed since the last reset?
    pub fn is_exceeded(&self) -> bool {
        self.last_yield.elapsed() >= self.budget
    }

    pub fn reset(&mut self) {
        self.last_yield = Instant::now();
    }
}

/// Drives cooperative scheduling for a generation run. Every natural
/// suspension point in the pipeline calls [Self::checkpoint], which checks for
/// cancellation and yields to the host when the frame budget runs out.
pub struct Pacer<'h> {
    host: &'h mut dyn Host,
    budget: FrameBudget,
    cancellation: CancellationToken,
    /// Overall progress reported so far, in `[0, 1]`
    progress: f32,
}

impl<'h> Pacer<'h> {
    pub fn new(
        host: &'h mut dyn Host,
        budget: Duration,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            host,
            budget: FrameBudget::new(budget),
            cancellation,
            progress: 0.0,
        }
    }

    pub fn host(&mut self) -> &mut dyn Host {
        &mut *self.host
    }

    /// Fail with [GenerationError::Cancelled] if cancellation was requested
    pub fn check_cancelled(&self) -> anyhow::Result<()> {
        if self.cancellation.is_cancelled() {
            Err(GenerationError::Cancelled.into())
        } else {
            Ok(())
        }
    }

    /// A yield point. Checks for cancellation, and hands a frame back to the
    /// host if we've run over budget.
    pub fn checkpoint(&mut self) -> anyhow::Result<()> {
        self.check_cancelled()?;
        if self.budget.is_exceeded() {
            self.yield_frame()?;
        }
        Ok(())
    }

    /// Unconditionally yield a frame to the host, then check for cancellation
    pub fn yield_frame(&mut self) -> anyhow::Result<()> {
        trace!("Yielding frame");
        self.host.yield_frame();
        self.budget.reset();
        self.check_cancelled()
    }

    /// Report progress within a phase. `phase_fraction` is clamped to
    /// `[0, 1]`. The overall fraction reported to the host never goes
    /// backwards.
    pub fn report(&mut self, phase: Phase, phase_fraction: f32) {
        let phase_fraction = if phase_fraction.is_nan() {
            0.0
        } else {
            phase_fraction.clamp(0.0, 1.0)
        };
        let overall = (phase.index() as f32 + phase_fraction) / Phase::COUNT;
        self.progress = self.progress.max(overall.min(1.0));
        self.host.report_progress(Progress {
            phase,
            fraction: self.progress,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::HeadlessHost;

    #[test]
    fn test_checkpoint_yields_when_over_budget() {
        let mut host = HeadlessHost::new();
        {
            let mut pacer =
                Pacer::new(&mut host, Duration::ZERO, CancellationToken::new());
            pacer.checkpoint().unwrap();
            pacer.checkpoint().unwrap();
        }
        assert_eq!(host.frames, 2);

        let mut pacer = Pacer::new(
            &mut host,
            Duration::from_secs(3600),
            CancellationToken::new(),
        );
        pacer.checkpoint().unwrap();
        drop(pacer);
        assert_eq!(host.frames, 2);
    }

    #[test]
    fn test_checkpoint_cancelled() {
        let mut host = HeadlessHost::new();
        let token = CancellationToken::new();
        let mut pacer =
            Pacer::new(&mut host, Duration::from_secs(3600), token.clone());
        pacer.checkpoint().unwrap();
        token.cancel();
        let error = pacer.checkpoint().unwrap_err();
        assert!(matches!(
            error.downcast_ref::<GenerationError>(),
            Some(GenerationError::Cancelled)
        ));
    }

    #[test]
    fn test_progress_monotonic() {
        let mut host = HeadlessHost::new();
        let mut pacer =
            Pacer::new(&mut host, Duration::ZERO, CancellationToken::new());
        pacer.report(Phase::Layers, 0.5);
        pacer.report(Phase::Instantiation, 0.0);
        // Going backwards is ignored
        pacer.report(Phase::Layers, 0.1);
        pacer.report(Phase::Finalization, 2.0);
        drop(pacer);

        let fractions: Vec<f32> =
            host.progress.iter().map(|p| p.fraction).collect();
        assert_eq!(fractions, vec![0.5 / 3.0, 1.0 / 3.0, 1.0 / 3.0, 1.0]);
    }
}
