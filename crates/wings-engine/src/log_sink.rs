// SPDX-License-Identifier: MIT

//! Per-server log sink pool (spec.md §4.5.3): two named ring-buffered
//! fan-out channels, `log` (container stdout/stderr) and `install`. A slow
//! subscriber never blocks a writer — `tokio::sync::broadcast` is itself a
//! ring buffer, so once a receiver falls behind it next sees a `Lagged`
//! skip over the oldest entries rather than applying backpressure.

use tokio::sync::broadcast;
use wings_adapters::LogLine;

const SINK_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkName {
    Log,
    Install,
}

pub struct LogSinkPool {
    log: broadcast::Sender<LogLine>,
    install: broadcast::Sender<LogLine>,
}

impl LogSinkPool {
    pub fn new() -> Self {
        let (log, _) = broadcast::channel(SINK_CAPACITY);
        let (install, _) = broadcast::channel(SINK_CAPACITY);
        Self { log, install }
    }

    /// No subscribers is not an error — the line is simply dropped.
    pub fn publish(&self, sink: SinkName, line: LogLine) {
        let _ = self.sender(sink).send(line);
    }

    pub fn subscribe(&self, sink: SinkName) -> broadcast::Receiver<LogLine> {
        self.sender(sink).subscribe()
    }

    fn sender(&self, sink: SinkName) -> &broadcast::Sender<LogLine> {
        match sink {
            SinkName::Log => &self.log,
            SinkName::Install => &self.install,
        }
    }
}

impl Default for LogSinkPool {
    fn default() -> Self {
        Self::new()
    }
}
