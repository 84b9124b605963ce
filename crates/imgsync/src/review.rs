//! Interactive candidate review on the terminal.

use imgsync_core::{Candidate, DatasetEntry};
use imgsync_local::sync::{ReviewChoice, Reviewer};
use std::io::{BufRead, Write};

/// Enter picks the first candidate, `0` skips the entry, anything unparseable or out of range
/// keeps the default.
pub fn parse_choice(input: &str, shown: usize) -> ReviewChoice {
    let s = input.trim();
    if s.is_empty() {
        return ReviewChoice::Pick(0);
    }
    match s.parse::<usize>() {
        Ok(0) => ReviewChoice::Skip,
        Ok(n) if n <= shown => ReviewChoice::Pick(n - 1),
        _ => ReviewChoice::Pick(0),
    }
}

pub struct PromptReviewer<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptReviewer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn show(&mut self, entry: &DatasetEntry, preview: &[Candidate]) -> std::io::Result<String> {
        writeln!(self.output, "top {} candidates for {}:", preview.len(), entry.id)?;
        for (i, c) in preview.iter().enumerate() {
            writeln!(
                self.output,
                "  {}) score={:.2} | {} | license={} | {}",
                i + 1,
                c.score,
                c.provider,
                c.license,
                c.title
            )?;
            writeln!(self.output, "     {}", c.image_url)?;
        }
        write!(self.output, "pick a number (enter=1, 0=skip): ")?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line)
    }
}

impl<R: BufRead, W: Write> Reviewer for PromptReviewer<R, W> {
    fn review(&mut self, entry: &DatasetEntry, preview: &[Candidate]) -> ReviewChoice {
        match self.show(entry, preview) {
            Ok(line) => parse_choice(&line, preview.len()),
            Err(e) => {
                tracing::warn!(entry = %entry.id, error = %e, "could not read a choice; using the top candidate");
                ReviewChoice::Pick(0)
            }
        }
    }
}
