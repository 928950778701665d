//! Rendering of rows for the terminal or a file.

use std::io::Write as _;
use std::path::PathBuf;

use csv_core::WriteResult;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Table,
    Jsonl,
    Csv,
}

#[derive(clap::Parser)]
#[group(id = "output::Args")]
pub struct Args {
    /// Write to this file instead of the standard output.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    #[arg(long, short = 'f', value_enum, default_value_t = Format::Table)]
    format: Format,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not open the output file at {1:?}")]
    OpenOutputFile(#[source] std::io::Error, PathBuf),
    #[error("could not write to the output file at {1:?}")]
    WriteFile(#[source] std::io::Error, PathBuf),
    #[error("could not write to the terminal")]
    WriteStdout(#[source] std::io::Error),
    #[error("could not serialize a row to JSON")]
    SerializeJson(#[source] serde_json::Error),
}

impl Args {
    pub fn new(format: Format, output: Option<PathBuf>) -> Self {
        Self { output, format }
    }

    pub fn to_output(self) -> Result<Output, Error> {
        let io: Box<dyn std::io::Write> = match &self.output {
            None => Box::new(std::io::stdout().lock()),
            Some(path) => Box::new(
                std::fs::File::create(path).map_err(|e| Error::OpenOutputFile(e, path.clone()))?,
            ),
        };
        Ok(Output::new(io, self.format, self.output))
    }
}

enum Formatter {
    Table(comfy_table::Table),
    Jsonl,
    Csv { header_written: bool },
}

/// Rows written in one of the supported formats.
///
/// Tables are only rendered on [`Output::commit`], the other formats stream.
pub struct Output {
    io: Box<dyn std::io::Write>,
    path: Option<PathBuf>,
    formatter: Formatter,
}

impl Output {
    pub fn new(io: Box<dyn std::io::Write>, format: Format, path: Option<PathBuf>) -> Self {
        let formatter = match format {
            Format::Table => {
                let mut table = comfy_table::Table::new();
                table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
                Formatter::Table(table)
            }
            Format::Jsonl => Formatter::Jsonl,
            Format::Csv => Formatter::Csv { header_written: false },
        };
        Self { io, path, formatter }
    }

    /// Column names. JSON lines carry their own field names and ignore these.
    pub fn header(&mut self, columns: &[&str]) -> Result<(), Error> {
        match &mut self.formatter {
            Formatter::Table(table) => {
                table.set_header(columns.to_vec());
            }
            Formatter::Jsonl => {}
            Formatter::Csv { header_written: true } => {
                panic!("the csv header must be written before any row");
            }
            Formatter::Csv { header_written } => {
                *header_written = true;
                self.csv_record(columns)?;
            }
        }
        Ok(())
    }

    /// One row, given both as table cells and as a record for JSON lines.
    pub fn row<R: serde::Serialize>(
        &mut self,
        cells: impl FnOnce() -> Vec<String>,
        record: impl FnOnce() -> R,
    ) -> Result<(), Error> {
        match &mut self.formatter {
            Formatter::Table(table) => {
                table.add_row(cells());
            }
            Formatter::Jsonl => {
                let mut line = serde_json::to_vec(&record()).map_err(Error::SerializeJson)?;
                line.push(b'\n');
                self.io.write_all(&line).map_err(|e| self.write_error(e))?;
            }
            Formatter::Csv { header_written } => {
                *header_written = true;
                self.csv_record(&cells())?;
            }
        }
        Ok(())
    }

    fn csv_record<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<(), Error> {
        let mut writer = csv_core::Writer::new();
        let mut record = Vec::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                csv_step(&mut record, |out| writer.delimiter(out));
            }
            let mut input = field.as_ref().as_bytes();
            loop {
                let mut buffer = [0; 256];
                let (result, read, written) = writer.field(input, &mut buffer);
                record.extend_from_slice(&buffer[..written]);
                input = &input[read..];
                if result == WriteResult::InputEmpty {
                    break;
                }
            }
        }
        csv_step(&mut record, |out| writer.terminator(out));
        self.io.write_all(&record).map_err(|e| self.write_error(e))
    }

    fn write_error(&self, e: std::io::Error) -> Error {
        match &self.path {
            None => Error::WriteStdout(e),
            Some(path) => Error::WriteFile(e, path.clone()),
        }
    }

    pub fn commit(mut self) -> Result<(), Error> {
        if let Formatter::Table(table) = &self.formatter {
            let rendered = format!("{table}\n");
            self.io.write_all(rendered.as_bytes()).map_err(|e| self.write_error(e))?;
        }
        self.io.flush().map_err(|e| self.write_error(e))
    }
}

/// Runs a csv writer step that only produces a handful of bytes.
fn csv_step(record: &mut Vec<u8>, step: impl FnOnce(&mut [u8]) -> (WriteResult, usize)) {
    let mut buffer = [0; 8];
    let (_, written) = step(&mut buffer);
    record.extend_from_slice(&buffer[..written]);
}
