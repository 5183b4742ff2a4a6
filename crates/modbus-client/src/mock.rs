//! In-memory link for tests: canned register blocks, a call log and injectable faults.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::sleep;

use crate::RegisterIo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKind {
    Input,
    Holding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ReadInput { address: u16, count: u16 },
    ReadHolding { address: u16, count: u16 },
    WriteHolding { address: u16, values: Vec<u16> },
}

/// Start and end of one request, as seen by the link.
#[derive(Debug, Clone, Copy)]
pub struct CallWindow {
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Debug, Default)]
struct State {
    blocks: HashMap<(RegisterKind, u16), Vec<u16>>,
    calls: Vec<Call>,
    windows: Vec<CallWindow>,
    fail_writes: bool,
    fail_reads: bool,
    delay: Duration,
}

/// Cloneable handle; every clone shares the same registers and call log.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `values` for reads starting at `address`.
    pub fn set_block(&self, kind: RegisterKind, address: u16, values: Vec<u16>) {
        self.lock().blocks.insert((kind, address), values);
    }

    pub fn block(&self, kind: RegisterKind, address: u16) -> Option<Vec<u16>> {
        self.lock().blocks.get(&(kind, address)).cloned()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Holds every request open for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = delay;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, Call::WriteHolding { .. }))
            .cloned()
            .collect()
    }

    pub fn windows(&self) -> Vec<CallWindow> {
        self.lock().windows.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn serve_read(&self, kind: RegisterKind, address: u16, count: u16) -> io::Result<Vec<u16>> {
        let started = Instant::now();
        let (delay, fail) = {
            let mut state = self.lock();
            state.calls.push(match kind {
                RegisterKind::Input => Call::ReadInput { address, count },
                RegisterKind::Holding => Call::ReadHolding { address, count },
            });
            (state.delay, state.fail_reads)
        };
        if !delay.is_zero() {
            sleep(delay).await;
        }

        let mut state = self.lock();
        state.windows.push(CallWindow {
            started,
            finished: Instant::now(),
        });
        if fail {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "mock read failure"));
        }
        let mut values = state
            .blocks
            .get(&(kind, address))
            .cloned()
            .unwrap_or_default();
        values.resize(usize::from(count), 0);
        Ok(values)
    }
}

#[async_trait]
impl RegisterIo for MockTransport {
    async fn read_input_registers(&mut self, address: u16, count: u16) -> io::Result<Vec<u16>> {
        self.serve_read(RegisterKind::Input, address, count).await
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> io::Result<Vec<u16>> {
        self.serve_read(RegisterKind::Holding, address, count).await
    }

    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> io::Result<()> {
        let started = Instant::now();
        let (delay, fail) = {
            let mut state = self.lock();
            state.calls.push(Call::WriteHolding {
                address,
                values: values.to_vec(),
            });
            (state.delay, state.fail_writes)
        };
        if !delay.is_zero() {
            sleep(delay).await;
        }

        let mut state = self.lock();
        state.windows.push(CallWindow {
            started,
            finished: Instant::now(),
        });
        if fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        state
            .blocks
            .insert((RegisterKind::Holding, address), values.to_vec());
        Ok(())
    }
}
