//! Log output.
//!
//! Everything in the crate logs through `tracing`. This module installs the
//! subscriber: a level filter taken from the configured verbosity and a
//! [`ReportLayer`] that renders each event's message as one line and hands
//! it, with its syslog priority, to a [`ReportSink`].

use std::fmt::{self, Write as _};
use std::io::{self, Write as _};

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::{Config, ReportTarget};

/// syslog severity of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(u8);

impl Priority {
    pub const ERR: Priority = Priority(3);
    pub const WARNING: Priority = Priority(4);
    pub const INFO: Priority = Priority(6);
    pub const DEBUG: Priority = Priority(7);

    pub fn of(level: &Level) -> Self {
        match *level {
            Level::ERROR => Priority::ERR,
            Level::WARN => Priority::WARNING,
            Level::INFO => Priority::INFO,
            _ => Priority::DEBUG,
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// Destination for rendered log lines
pub trait ReportSink: Send + Sync + 'static {
    fn emit(&self, priority: Priority, message: &str) -> io::Result<()>;
}

/// `name: message` on stderr
pub struct StderrSink {
    program: String,
}

impl StderrSink {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn line(&self, message: &str) -> String {
        format!("{}: {}\n", self.program, message)
    }
}

impl ReportSink for StderrSink {
    fn emit(&self, _priority: Priority, message: &str) -> io::Result<()> {
        io::stderr().lock().write_all(self.line(message).as_bytes())
    }
}

/// `<priority>message` on stderr, the sd-daemon prefix journald parses
pub struct JournalSink;

impl JournalSink {
    fn line(priority: Priority, message: &str) -> String {
        format!("<{}>{}\n", priority.value(), message)
    }
}

impl ReportSink for JournalSink {
    fn emit(&self, priority: Priority, message: &str) -> io::Result<()> {
        io::stderr()
            .lock()
            .write_all(Self::line(priority, message).as_bytes())
    }
}

type SyslogLogger = syslog::Logger<syslog::LoggerBackend, syslog::Formatter3164>;

/// Local syslog daemon, facility daemon
pub struct SyslogSink {
    logger: Mutex<SyslogLogger>,
}

impl SyslogSink {
    pub fn connect(program: &str) -> Result<Self, ReportError> {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_DAEMON,
            hostname: None,
            process: program.to_string(),
            pid: std::process::id(),
        };
        let logger =
            syslog::unix(formatter).map_err(|e| ReportError::Syslog(e.to_string()))?;
        Ok(Self {
            logger: Mutex::new(logger),
        })
    }
}

impl ReportSink for SyslogSink {
    fn emit(&self, priority: Priority, message: &str) -> io::Result<()> {
        let mut logger = self.logger.lock();
        let result = match priority {
            Priority::ERR => logger.err(message),
            Priority::WARNING => logger.warning(message),
            Priority::INFO => logger.info(message),
            _ => logger.debug(message),
        };
        result.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

/// Errors setting up log output
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("could not connect to syslog: {0}")]
    Syslog(String),

    #[error("could not install log subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Renders events into single lines for a [`ReportSink`]
pub struct ReportLayer {
    sink: Box<dyn ReportSink>,
}

impl ReportLayer {
    pub fn new(sink: impl ReportSink) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }
}

impl<S: Subscriber> Layer<S> for ReportLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut line = LineVisitor::default();
        event.record(&mut line);

        // Nowhere left to report a failed write to
        let _ = self
            .sink
            .emit(Priority::of(event.metadata().level()), &line.finish());
    }
}

/// Collects the `message` field followed by any other fields as `name=value`
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            self.message + &self.fields
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// Install the global subscriber for `config`.
pub fn init(config: &Config, program: &str) -> Result<(), ReportError> {
    let layer = match config.report_target {
        ReportTarget::Stderr => ReportLayer::new(StderrSink::new(program)),
        ReportTarget::Journal => ReportLayer::new(JournalSink),
        ReportTarget::Syslog => ReportLayer::new(SyslogSink::connect(program)?),
    };

    tracing_subscriber::registry()
        .with(config.verbosity.level_filter())
        .with(layer)
        .try_init()?;
    Ok(())
}

/// Base name of the running executable, for log prefixes
pub fn program_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .map(std::path::Path::new)
        .and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}
