//! Test and helper mocks for railbot_core.
//!
//! Both mocks share their state between clones, so a test can hand one clone
//! to the engine and inspect the other afterwards.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use railbot_traits::{
    BoxError, Direction, IrChannel, IrSensors, MotorPair, StopSignal, StopState, Wheel,
};

/// One `set_power` call as seen by `RecordingMotors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerCommand {
    pub wheel: Wheel,
    pub power: u16,
    pub direction: Direction,
}

#[derive(Debug, Default)]
struct MotorState {
    commands: Vec<PowerCommand>,
    applied: [(u16, Direction); 2],
    encoder: [i64; 2],
    counts_per_read: [i64; 2],
    fail_set_power_after: Option<usize>,
    fail_encoder_after: Option<usize>,
    encoder_reads: usize,
}

/// Motors that record every command. Each encoder read of a powered wheel
/// advances its count by `counts_per_read` in the commanded direction.
#[derive(Debug, Clone, Default)]
pub struct RecordingMotors {
    state: Rc<RefCell<MotorState>>,
}

impl RecordingMotors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_counts_per_read(self, left: i64, right: i64) -> Self {
        self.state.borrow_mut().counts_per_read = [left, right];
        self
    }

    /// Accept `n` commands, then fail every later one.
    pub fn fail_set_power_after(self, n: usize) -> Self {
        self.state.borrow_mut().fail_set_power_after = Some(n);
        self
    }

    /// Answer `n` encoder reads, then fail every later one.
    pub fn fail_encoder_after(self, n: usize) -> Self {
        self.state.borrow_mut().fail_encoder_after = Some(n);
        self
    }

    pub fn commands(&self) -> Vec<PowerCommand> {
        self.state.borrow().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state.borrow_mut().commands.clear();
    }

    /// Last commanded power on each wheel.
    pub fn applied(&self) -> [(u16, Direction); 2] {
        self.state.borrow().applied
    }
}

impl MotorPair for RecordingMotors {
    fn set_power(
        &mut self,
        wheel: Wheel,
        power: u16,
        direction: Direction,
    ) -> Result<(), BoxError> {
        let mut s = self.state.borrow_mut();
        if let Some(n) = s.fail_set_power_after
            && s.commands.len() >= n
        {
            return Err(Box::new(std::io::Error::other("motor driver offline")));
        }
        s.commands.push(PowerCommand {
            wheel,
            power,
            direction,
        });
        s.applied[wheel.index()] = (power, direction);
        Ok(())
    }

    fn read_encoder(&mut self, wheel: Wheel) -> Result<i64, BoxError> {
        let mut s = self.state.borrow_mut();
        if let Some(n) = s.fail_encoder_after
            && s.encoder_reads >= n
        {
            return Err(Box::new(std::io::Error::other("encoder line stuck")));
        }
        s.encoder_reads += 1;
        let i = wheel.index();
        let (power, direction) = s.applied[i];
        if power > 0 {
            s.encoder[i] += s.counts_per_read[i] * direction.sign();
        }
        Ok(s.encoder[i])
    }
}

#[derive(Debug, Default)]
struct IrState {
    scripts: HashMap<IrChannel, VecDeque<u16>>,
    last: HashMap<IrChannel, u16>,
    fail_after: HashMap<IrChannel, usize>,
    reads: HashMap<IrChannel, usize>,
}

/// IR sensors replaying a per-channel script of raw reads. Once a script runs
/// out, the last value repeats; unscripted channels read 0.
#[derive(Debug, Clone, Default)]
pub struct ScriptedIr {
    state: Rc<RefCell<IrState>>,
}

impl ScriptedIr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constant(self, channel: IrChannel, value: u16) -> Self {
        self.with_sequence(channel, [value])
    }

    pub fn with_sequence(self, channel: IrChannel, values: impl IntoIterator<Item = u16>) -> Self {
        self.push(channel, values);
        self
    }

    /// Append raw reads to the channel script.
    pub fn push(&self, channel: IrChannel, values: impl IntoIterator<Item = u16>) {
        self.state
            .borrow_mut()
            .scripts
            .entry(channel)
            .or_default()
            .extend(values);
    }

    pub fn failing(self, channel: IrChannel) -> Self {
        self.failing_after(channel, 0)
    }

    /// Answer `n` reads of `channel`, then fail every later one.
    pub fn failing_after(self, channel: IrChannel, n: usize) -> Self {
        self.state.borrow_mut().fail_after.insert(channel, n);
        self
    }

    pub fn reads(&self, channel: IrChannel) -> usize {
        self.state.borrow().reads.get(&channel).copied().unwrap_or(0)
    }
}

impl IrSensors for ScriptedIr {
    fn read_raw(&mut self, channel: IrChannel) -> Result<u16, BoxError> {
        let mut s = self.state.borrow_mut();
        let done = s.reads.get(&channel).copied().unwrap_or(0);
        *s.reads.entry(channel).or_default() += 1;
        if s.fail_after.get(&channel).is_some_and(|n| done >= *n) {
            return Err(Box::new(std::io::Error::other(format!(
                "no response on {}",
                channel.name()
            ))));
        }
        let next = s.scripts.get_mut(&channel).and_then(VecDeque::pop_front);
        let value = match next {
            Some(v) => {
                s.last.insert(channel, v);
                v
            }
            None => s.last.get(&channel).copied().unwrap_or(0),
        };
        Ok(value)
    }
}

/// Stop source that starts requesting a stop on its `n`th poll.
#[derive(Debug, Clone)]
pub struct StopOnPoll {
    fire_at: u32,
    polls: Rc<Cell<u32>>,
}

impl StopOnPoll {
    pub fn new(n: u32) -> Self {
        Self {
            fire_at: n,
            polls: Rc::new(Cell::new(0)),
        }
    }

    pub fn polls(&self) -> u32 {
        self.polls.get()
    }
}

impl StopSignal for StopOnPoll {
    fn stop_state(&self) -> StopState {
        let n = self.polls.get() + 1;
        self.polls.set(n);
        if n >= self.fire_at {
            StopState::StopRequested
        } else {
            StopState::Running
        }
    }
}
