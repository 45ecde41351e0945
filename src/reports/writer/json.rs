use crate::reports::writer::ReportWriter;
use crate::reports::{ReportError, RunReport};
use std::io::Write;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWriter;

impl ReportWriter for JsonWriter {
    fn write(&self, report: &RunReport, output: &mut dyn Write) -> Result<(), ReportError> {
        serde_json::to_writer_pretty(&mut *output, report)?;
        writeln!(output)?;
        Ok(())
    }
}
