use std::io::Write;

use anyhow::Context;

use crate::globals::Globals;

/// A destination for the text produced by applying a template to each record.
///
/// `source` names the input the text came from and `key` identifies the record within it;
/// writers that only stream lines ignore both.
pub trait TemplateWriter {
    fn write(&mut self, source: &str, key: &str, text: &str) -> anyhow::Result<()>;

    /// Flush anything still buffered.
    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Number of whitespace-separated words written so far, where the writer counts them.
    fn word_count(&self) -> u64 {
        0
    }
}

/// Writes each piece of text on a line of its own.
pub struct PrintWriter<W: Write> {
    out: W,
    words: u64,
}

impl<W: Write> PrintWriter<W> {
    pub fn new(out: W) -> Self {
        PrintWriter { out, words: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TemplateWriter for PrintWriter<W> {
    fn write(&mut self, _source: &str, _key: &str, text: &str) -> anyhow::Result<()> {
        writeln!(self.out, "{text}").context("writing template output")?;
        self.words += text.split_whitespace().count() as u64;
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.out.flush().context("flushing template output")
    }

    fn word_count(&self) -> u64 {
        self.words
    }
}

/// Output kept in memory for later templates to `include(...)`.
impl TemplateWriter for Globals {
    fn write(&mut self, source: &str, key: &str, text: &str) -> anyhow::Result<()> {
        self.store(source, key, text);
        Ok(())
    }
}
