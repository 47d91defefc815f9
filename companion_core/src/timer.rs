//! Interval timers with owned cancellation, and the session drive loop.
//!
//! A timer lives exactly as long as its handle: dropping an `IntervalTimer`
//! (or the `Ticker` holding one) cancels it and joins its thread, so a timer
//! can never outlive the session it was driving.

use crate::session::{ExerciseSession, TickOutcome};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Fires a callback on a fixed interval from a background thread
///
/// The callback returns `false` to stop the timer from the inside.
pub struct IntervalTimer {
    cancel_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl IntervalTimer {
    pub fn spawn<F>(interval: Duration, mut callback: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let handle = std::thread::spawn(move || loop {
            match cancel_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if !callback() {
                        break;
                    }
                }
                // Cancelled, or the handle is gone
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        tracing::debug!("Interval timer started ({:?})", interval);
        Self {
            cancel_tx: Some(cancel_tx),
            handle: Some(handle),
        }
    }

    /// Stop the timer and wait for its thread; idempotent
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Interval timer callback panicked");
            }
            tracing::debug!("Interval timer cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Source of tick events: wall-clock paced or immediate
pub enum Ticker {
    /// Yields forever without waiting (replays, tests)
    Immediate,
    /// Yields once per interval
    Interval {
        timer: IntervalTimer,
        ticks: Receiver<()>,
    },
}

impl Ticker {
    pub fn immediate() -> Self {
        Ticker::Immediate
    }

    pub fn every(interval: Duration) -> Self {
        let (tx, ticks) = mpsc::channel();
        let timer = IntervalTimer::spawn(interval, move || tx.send(()).is_ok());
        Ticker::Interval { timer, ticks }
    }

    /// Release the underlying timer, if any
    pub fn stop(&mut self) {
        if let Ticker::Interval { timer, .. } = self {
            timer.cancel();
        }
    }
}

impl Iterator for Ticker {
    type Item = ();

    fn next(&mut self) -> Option<()> {
        match self {
            Ticker::Immediate => Some(()),
            Ticker::Interval { ticks, .. } => ticks.recv().ok(),
        }
    }
}

/// Tick `session` once per item of `ticks` while it is running
///
/// `on_tick` sees every outcome and may pause or reset the session, which
/// ends the loop. Returns the number of ticks delivered.
pub fn run_session<I, F>(session: &mut ExerciseSession, ticks: I, mut on_tick: F) -> u32
where
    I: IntoIterator<Item = ()>,
    F: FnMut(&mut ExerciseSession, TickOutcome),
{
    let mut delivered = 0;
    let mut ticks = ticks.into_iter();
    while session.is_running() {
        if ticks.next().is_none() {
            tracing::debug!("Tick source exhausted with session still running");
            break;
        }
        let outcome = session.tick();
        delivered += 1;
        on_tick(session, outcome);
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_default_catalog;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_interval_timer_fires_and_cancels() {
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        let mut timer = IntervalTimer::spawn(Duration::from_millis(5), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        });

        std::thread::sleep(Duration::from_millis(60));
        timer.cancel();
        assert!(!timer.is_active());

        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 1);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), fired);

        timer.cancel();
    }

    #[test]
    fn test_callback_can_stop_timer() {
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        let timer = IntervalTimer::spawn(Duration::from_millis(1), move || {
            seen.fetch_add(1, Ordering::SeqCst) < 2
        });

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 3);
        drop(timer);
    }

    #[test]
    fn test_drop_cancels_timer() {
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        {
            let _timer = IntervalTimer::spawn(Duration::from_millis(2), move || {
                seen.fetch_add(1, Ordering::SeqCst);
                true
            });
            std::thread::sleep(Duration::from_millis(20));
        }
        let after_drop = count.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }

    #[test]
    fn test_run_session_to_completion() {
        let def = build_default_catalog().get("box-breathing").cloned().unwrap();
        let mut session = ExerciseSession::new();
        session.start(def).unwrap();

        let mut completions = 0;
        let ticks = run_session(&mut session, Ticker::immediate(), |_, outcome| {
            if outcome == TickOutcome::Completed {
                completions += 1;
            }
        });

        assert_eq!(ticks, 64);
        assert_eq!(completions, 1);
        assert!(session.is_complete());
    }

    #[test]
    fn test_run_session_stops_when_paused() {
        let def = build_default_catalog().get("box-breathing").cloned().unwrap();
        let mut session = ExerciseSession::new();
        session.start(def).unwrap();

        let ticks = run_session(&mut session, Ticker::immediate(), |s, _| {
            if s.elapsed_seconds() == 10 {
                s.pause();
            }
        });

        assert_eq!(ticks, 10);
        assert!(!session.is_running());
        assert!(!session.is_complete());
    }

    #[test]
    fn test_run_session_with_finite_ticks() {
        let def = build_default_catalog().get("box-breathing").cloned().unwrap();
        let mut session = ExerciseSession::new();
        session.start(def).unwrap();

        let ticks = run_session(&mut session, std::iter::repeat(()).take(5), |_, _| {});
        assert_eq!(ticks, 5);
        assert!(session.is_running());
    }

    #[test]
    fn test_paced_ticker() {
        let def = crate::ExerciseDefinition {
            steps: vec![crate::Step::new("breathe", 2, crate::Phase::Inhale)],
            rounds: 1,
            ..build_default_catalog().get("box-breathing").cloned().unwrap()
        };
        let mut session = ExerciseSession::new();
        session.start(def).unwrap();

        let mut ticker = Ticker::every(Duration::from_millis(5));
        let ticks = run_session(&mut session, &mut ticker, |_, _| {});
        ticker.stop();

        assert_eq!(ticks, 2);
        assert!(session.is_complete());
    }
}
