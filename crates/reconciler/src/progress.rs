//! Operator progress transcript
//!
//! Phase banners and one SUCCESS/FAILED line per step go to stdout. The
//! transcript can also be captured in memory so tests can inspect it.

use colored::Colorize;
use meshrecon_common::{Error, Result, TopologySummary};
use parking_lot::Mutex;

enum Sink {
    Stdout,
    Memory(Mutex<Vec<String>>),
}

/// Human-readable progress reporter
pub struct Progress {
    sink: Sink,
}

impl Progress {
    /// Print to stdout
    pub fn stdout() -> Self {
        Self { sink: Sink::Stdout }
    }

    /// Capture lines in memory
    pub fn captured() -> Self {
        Self {
            sink: Sink::Memory(Mutex::new(Vec::new())),
        }
    }

    fn emit(&self, plain: String, styled: impl FnOnce() -> String) {
        match &self.sink {
            Sink::Stdout => println!("{}", styled()),
            Sink::Memory(lines) => lines.lock().push(plain),
        }
    }

    /// Start of a phase
    pub fn banner(&self, title: &str) {
        let plain = format!("==> {}", title);
        self.emit(plain.clone(), || plain.bold().to_string());
    }

    /// Outcome of one step
    pub fn step(&self, what: &str, ok: bool) {
        let tag = if ok { "SUCCESS" } else { "FAILED" };
        let plain = format!("    {:<60} [{}]", what, tag);
        self.emit(plain, || {
            let tag = if ok { tag.green().bold() } else { tag.red().bold() };
            format!("    {:<60} [{}]", what, tag)
        });
    }

    /// Report a step result and pass it through unchanged
    pub fn track<T>(&self, what: &str, result: Result<T>) -> Result<T> {
        self.step(what, result.is_ok());
        result
    }

    pub fn note(&self, message: &str) {
        let plain = format!("    {}", message);
        self.emit(plain.clone(), || plain.dimmed().to_string());
    }

    /// Final block when the pipeline stopped
    pub fn error_block(&self, error: &Error) {
        let rule = "*".repeat(64);
        self.emit(String::new(), String::new);
        self.emit(rule.clone(), || rule.red().to_string());
        self.emit("ERROR: reconciliation aborted".to_string(), || {
            "ERROR: reconciliation aborted".red().bold().to_string()
        });
        let message = error.to_string();
        self.emit(message.clone(), || message.clone());
        self.emit(rule.clone(), || rule.red().to_string());
    }

    /// Final block on success
    pub fn summary(&self, summary: &TopologySummary) {
        self.banner("Done");
        if let Some(mesh) = &summary.mesh_interface {
            self.note(&format!("mesh interface: {}", mesh));
        }
        if let Some(bridge) = &summary.bridge {
            self.note(&format!(
                "bridge: {} [{}]",
                bridge,
                summary.bridge_members.join(", ")
            ));
        }
        for daemon in &summary.daemons {
            self.note(&format!("running: {}", daemon));
        }
    }

    /// Captured lines; empty when printing to stdout
    pub fn lines(&self) -> Vec<String> {
        match &self.sink {
            Sink::Stdout => Vec::new(),
            Sink::Memory(lines) => lines.lock().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_records_outcome() {
        let progress = Progress::captured();
        let ok: Result<u32> = Ok(1);
        assert_eq!(progress.track("first", ok).unwrap(), 1);
        let err: Result<u32> = Err(Error::NoBridgeMembers);
        assert!(progress.track("second", err).is_err());

        let lines = progress.lines();
        assert!(lines[0].contains("first") && lines[0].ends_with("[SUCCESS]"));
        assert!(lines[1].contains("second") && lines[1].ends_with("[FAILED]"));
    }

    #[test]
    fn test_error_block_contains_message() {
        let progress = Progress::captured();
        progress.error_block(&Error::NoBridgeMembers);
        assert!(progress.lines().iter().any(|l| l == "bridge has no members"));
    }
}
