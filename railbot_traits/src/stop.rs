//! Operator stop input.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Two-valued stop state. The wire tokens are '0' (running) and '1' (stop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopState {
    Running,
    StopRequested,
}

impl StopState {
    pub fn token(self) -> char {
        match self {
            StopState::Running => '0',
            StopState::StopRequested => '1',
        }
    }

    pub fn from_token(c: char) -> Option<Self> {
        match c {
            '0' => Some(StopState::Running),
            '1' => Some(StopState::StopRequested),
            _ => None,
        }
    }
}

/// Non-blocking stop source polled at the top of every control loop iteration.
pub trait StopSignal {
    fn stop_state(&self) -> StopState;

    #[inline]
    fn stop_requested(&self) -> bool {
        self.stop_state() == StopState::StopRequested
    }
}

impl<T: StopSignal + ?Sized> StopSignal for Arc<T> {
    fn stop_state(&self) -> StopState {
        (**self).stop_state()
    }
}

impl<T: StopSignal + ?Sized> StopSignal for Box<T> {
    fn stop_state(&self) -> StopState {
        (**self).stop_state()
    }
}

/// Stop source backed by a shared atomic flag (Ctrl-C handlers, tests).
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    flag: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

impl StopSignal for StopFlag {
    fn stop_state(&self) -> StopState {
        if self.flag.load(Ordering::Relaxed) {
            StopState::StopRequested
        } else {
            StopState::Running
        }
    }
}

/// A stop source that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn stop_state(&self) -> StopState {
        StopState::Running
    }
}

/// Requests a stop when any of its sources does (e.g. a button and Ctrl-C).
#[derive(Default)]
pub struct AnyStop {
    sources: Vec<Box<dyn StopSignal>>,
}

impl AnyStop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl StopSignal + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl StopSignal for AnyStop {
    fn stop_state(&self) -> StopState {
        if self.sources.iter().any(|s| s.stop_requested()) {
            StopState::StopRequested
        } else {
            StopState::Running
        }
    }
}
