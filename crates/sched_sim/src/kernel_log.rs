//! Routes records logged by the scheduling engine into the execution log.
//!
//! [`KernelLogger`] is installed next to the terminal logger. It keeps
//! engine records only on threads that hold a [`Capture`], so concurrent
//! runs never see each other's lines.

use std::cell::RefCell;

use log::{LevelFilter, Metadata, Record};
use simplelog::{Config, SharedLogger};

/// Module prefix of the records that count as kernel output.
const KERNEL_TARGET: &str = "sched_core";

thread_local! {
    static CAPTURED: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Logger that hands engine records to the simulation driver.
pub struct KernelLogger {
    level: LevelFilter,
    config: Config,
}

impl KernelLogger {
    pub fn new(level: LevelFilter) -> Box<Self> {
        Box::new(Self {
            level,
            config: Config::default(),
        })
    }
}

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with(KERNEL_TARGET)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        CAPTURED.with(|captured| {
            if let Some(lines) = captured.borrow_mut().as_mut() {
                lines.push(record.args().to_string());
            }
        });
    }

    fn flush(&self) {}
}

impl SharedLogger for KernelLogger {
    fn level(&self) -> LevelFilter {
        self.level
    }

    fn config(&self) -> Option<&Config> {
        Some(&self.config)
    }

    fn as_log(self: Box<Self>) -> Box<dyn log::Log> {
        Box::new(*self)
    }
}

/// Collects kernel records on the current thread until dropped.
#[derive(Debug)]
pub struct Capture {
    _private: (),
}

impl Capture {
    pub fn start() -> Self {
        CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
        Self { _private: () }
    }

    /// Takes the lines recorded since the previous call.
    pub fn drain(&self) -> Vec<String> {
        CAPTURED.with(|captured| {
            captured
                .borrow_mut()
                .as_mut()
                .map(std::mem::take)
                .unwrap_or_default()
        })
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        CAPTURED.with(|captured| *captured.borrow_mut() = None);
    }
}
