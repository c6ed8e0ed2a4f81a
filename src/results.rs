//! # Runner Outcomes and Console Output
//!
//! [`RunnerOutcome`] is what a runner leaves behind: whether it succeeded
//! and the lines of its report. In subprocess mode it is also the message a
//! worker sends to the coordinator, serialized as one JSON line.
//!
//! [`ConsoleReporter`] renders the coordinator's output:
//!
//! ```text
//! === Description                                        ===
//!    Two emitters against one subscriber
//!
//! === Runners                                            ===
//!    --- talker               ---
//!    Single User Event Emitter
//!    ...
//! === Lets get this show on the road!                    ===
//! ....5....10
//! === Results                                            ===
//!    --- talker               ---
//!    Single User Event Emitter - Finished 40 event emits
//! ```

use crate::{
    runners::{Report, Runner},
    scenario::Description,
    utils::pad_end,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io::Write;

const SECTION_WIDTH: usize = 50;
const RUNNER_NAME_WIDTH: usize = 20;
const INDENT: &str = "   ";

/// Result of one runner, as reported back to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerOutcome {
    pub success: bool,
    pub output: Vec<String>,
}

impl RunnerOutcome {
    pub fn from_report(report: &Report) -> Self {
        Self {
            success: true,
            output: report.lines(),
        }
    }

    /// A runner that started and then failed.
    pub fn from_error(error: &dyn Display) -> Self {
        Self {
            success: false,
            output: vec![
                "Caught Error in runner".to_string(),
                String::new(),
                error.to_string(),
            ],
        }
    }

    /// A runner that could not be run or did not report.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: vec![message.into()],
        }
    }

    /// Serialize as a single line of JSON, without the trailing newline.
    pub fn to_json_line(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize runner outcome")
    }

    /// Parse a line written by [`RunnerOutcome::to_json_line`].
    pub fn from_json_line(line: &str) -> Option<Self> {
        serde_json::from_str(line.trim()).ok()
    }
}

/// Writes the coordinator's sections to any `Write` sink.
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn section(&mut self, title: &str) -> Result<()> {
        writeln!(self.out, "=== {} ===", pad_end(title, SECTION_WIDTH))?;
        Ok(())
    }

    fn runner_header(&mut self, name: &str, suffix: &str) -> Result<()> {
        let header = format!("{}--- {} ---", INDENT, pad_end(name, RUNNER_NAME_WIDTH));
        if suffix.is_empty() {
            writeln!(self.out, "{}", header)?;
        } else {
            writeln!(self.out, "{} {}", header, suffix)?;
        }
        Ok(())
    }

    fn indented(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{}{}", INDENT, line)?;
        Ok(())
    }

    /// Print the scenario description, if there is one.
    pub fn print_description(&mut self, description: &Description) -> Result<()> {
        if description.is_empty() {
            return Ok(());
        }
        self.section("Description")?;
        for line in description.lines() {
            self.indented(line)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    /// Print every runner's self-description.
    pub fn print_runners(&mut self, runners: &[Runner], debug: bool) -> Result<()> {
        self.section("Runners")?;
        for runner in runners {
            self.runner_header(&runner.name, "")?;
            let mut lines = Vec::new();
            runner.describe(debug, &mut |line| lines.push(line.to_string()));
            for line in &lines {
                self.indented(line)?;
            }
            writeln!(self.out)?;
        }
        Ok(())
    }

    /// Announce that execution is starting.
    pub fn print_start(&mut self, run_line: &str) -> Result<()> {
        self.section("Lets get this show on the road!")?;
        self.indented(run_line)?;
        self.out.flush()?;
        Ok(())
    }

    /// One progress tick: a dot, or the tick count on every fifth tick.
    pub fn print_progress(&mut self, tick: u64) -> Result<()> {
        if tick % 5 == 0 {
            write!(self.out, "{}", tick)?;
        } else {
            write!(self.out, ".")?;
        }
        self.out.flush()?;
        Ok(())
    }

    /// Print each runner's outcome in declaration order.
    pub fn print_results(&mut self, runners: &[Runner], outcomes: &[RunnerOutcome]) -> Result<()> {
        writeln!(self.out)?;
        self.section("Results")?;
        for (runner, outcome) in runners.iter().zip(outcomes) {
            let suffix = if outcome.success { "" } else { "Failed" };
            self.runner_header(&runner.name, suffix)?;
            for line in &outcome.output {
                self.indented(line)?;
            }
            writeln!(self.out)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runners::RunnerKind;
    use std::time::Duration;

    fn noop(name: &str) -> Runner {
        Runner {
            name: name.to_string(),
            kind: RunnerKind::NoOp,
        }
    }

    fn render(f: impl FnOnce(&mut ConsoleReporter<Vec<u8>>) -> Result<()>) -> String {
        let mut reporter = ConsoleReporter::new(Vec::new());
        f(&mut reporter).unwrap();
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_outcome_json_line() {
        let outcome = RunnerOutcome::from_report(&Report::counted(
            "Finished 3",
            3,
            Duration::from_secs(1),
        ));
        let line = outcome.to_json_line().unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(RunnerOutcome::from_json_line(&line), Some(outcome));
        assert_eq!(RunnerOutcome::from_json_line("not json"), None);
        assert_eq!(RunnerOutcome::from_json_line(r#"{"other": 1}"#), None);
    }

    #[test]
    fn test_error_outcome_layout() {
        let outcome = RunnerOutcome::from_error(&"login rejected: nope");
        assert!(!outcome.success);
        assert_eq!(
            outcome.output,
            vec!["Caught Error in runner", "", "login rejected: nope"]
        );
    }

    #[test]
    fn test_description_section() {
        let text = render(|r| r.print_description(&Description::Lines(vec!["a".into(), "b".into()])));
        assert_eq!(
            text,
            format!("=== {} ===\n   a\n   b\n\n", pad_end("Description", SECTION_WIDTH))
        );

        let empty = render(|r| r.print_description(&Description::default()));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_results_in_declaration_order_with_failures_marked() {
        let runners = vec![noop("first"), noop("second")];
        let outcomes = vec![
            RunnerOutcome::failure("Runner first timed out"),
            RunnerOutcome {
                success: true,
                output: vec!["empty".to_string()],
            },
        ];
        let text = render(|r| r.print_results(&runners, &outcomes));
        let first = text.find("--- first").unwrap();
        let second = text.find("--- second").unwrap();
        assert!(first < second);
        assert!(text.contains(&format!("   --- {} --- Failed\n", pad_end("first", 20))));
        assert!(text.contains(&format!("   --- {} ---\n   empty\n", pad_end("second", 20))));
    }

    #[test]
    fn test_progress_ticks() {
        let text = render(|r| (1..=10).try_for_each(|tick| r.print_progress(tick)));
        assert_eq!(text, "....5....10");
    }

    #[test]
    fn test_runner_section() {
        let text = render(|r| r.print_runners(&[noop("idle")], false));
        assert!(text.contains("=== Runners"));
        assert!(text.contains("   Empty\n"));
    }
}
