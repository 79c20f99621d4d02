//! Where setup failures are reported.
//!
//! The installer never hands a typed error back to the startup code. A failed
//! setup produces exactly one line through a [`DiagnosticSink`] instead, the
//! way firmware prints to its serial console.

/// Receives one human-readable line per failed setup.
pub trait DiagnosticSink {
    /// Records a diagnostic line.
    fn report(&mut self, message: &str);
}

/// Forwards diagnostics to `log::error!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, message: &str) {
        log::error!("{}", message);
    }
}

/// Collects diagnostics in memory.
impl DiagnosticSink for Vec<String> {
    fn report(&mut self, message: &str) {
        self.push(message.to_owned());
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, message: &str) {
        (**self).report(message);
    }
}
