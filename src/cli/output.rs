use crate::cli::args::OutputFormat;
use crate::core::ports::PortDescriptor;
use crate::core::session::SessionStatistics;
use crate::domain::error::SerialTermError;
use std::io::{self, Write};
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_ports(&self, ports: &[PortDescriptor]) -> Result<(), OutputError>;
    fn write_statistics(&self, stats: &SessionStatistics) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_status(&self, status: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for SerialTermError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render the port list in this writer's format
    pub fn render_ports(&self, ports: &[PortDescriptor]) -> Result<String, OutputError> {
        let rendered = match self.format {
            OutputFormat::Text => {
                if ports.is_empty() {
                    "No serial ports found".to_string()
                } else {
                    ports
                        .iter()
                        .map(|p| p.identifier.as_str())
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            OutputFormat::Json => serde_json::to_string_pretty(ports)?,
            OutputFormat::Table => {
                let rows: Vec<PortTableRow> = ports
                    .iter()
                    .enumerate()
                    .map(|(index, port)| PortTableRow {
                        index,
                        port: port.identifier.clone(),
                    })
                    .collect();
                Table::new(rows).to_string()
            }
        };
        Ok(rendered)
    }

    /// Render a failure the way `write_error` prints it
    pub fn render_error(&self, error: &str) -> String {
        match self.format {
            OutputFormat::Json => serde_json::json!({ "error": error }).to_string(),
            OutputFormat::Text | OutputFormat::Table => format!("Error: {}", error),
        }
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_ports(&self, ports: &[PortDescriptor]) -> Result<(), OutputError> {
        let rendered = self.render_ports(ports)?;
        writeln!(io::stdout(), "{}", rendered)?;
        Ok(())
    }

    fn write_statistics(&self, stats: &SessionStatistics) -> Result<(), OutputError> {
        // Statistics are a side channel; keep them off stdout.
        match self.format {
            OutputFormat::Json => {
                writeln!(io::stderr(), "{}", serde_json::to_string(stats)?)?;
            }
            OutputFormat::Text | OutputFormat::Table => {
                writeln!(
                    io::stderr(),
                    "{} bytes sent, {} bytes received",
                    stats.bytes_sent,
                    stats.bytes_received
                )?;
            }
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({ "message": message });
                writeln!(io::stdout(), "{}", output)?;
            }
            OutputFormat::Text | OutputFormat::Table => {
                writeln!(io::stdout(), "{}", message)?;
            }
        }
        Ok(())
    }

    fn write_status(&self, status: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({ "status": status });
                writeln!(io::stderr(), "{}", output)?;
            }
            OutputFormat::Text | OutputFormat::Table => {
                writeln!(io::stderr(), "{}", status)?;
            }
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        writeln!(io::stderr(), "{}", self.render_error(error))?;
        Ok(())
    }
}

#[derive(Tabled)]
struct PortTableRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Port")]
    port: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports() -> Vec<PortDescriptor> {
        vec![PortDescriptor::new("COM1"), PortDescriptor::new("COM3")]
    }

    #[test]
    fn test_text_rendering() {
        let writer = ConsoleWriter::new(OutputFormat::Text);
        assert_eq!(writer.render_ports(&ports()).unwrap(), "COM1\nCOM3");
        assert_eq!(writer.render_ports(&[]).unwrap(), "No serial ports found");
    }

    #[test]
    fn test_json_rendering() {
        let writer = ConsoleWriter::new(OutputFormat::Json);
        let rendered = writer.render_ports(&ports()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value[1]["identifier"], "COM3");
    }

    #[test]
    fn test_error_rendering() {
        let text = ConsoleWriter::new(OutputFormat::Text);
        assert_eq!(text.render_error("port busy"), "Error: port busy");

        let json = ConsoleWriter::new(OutputFormat::Json);
        let rendered = json.render_error("port \"busy\"");
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["error"], "port \"busy\"");
    }

    #[test]
    fn test_table_rendering() {
        let writer = ConsoleWriter::new(OutputFormat::Table);
        let rendered = writer.render_ports(&ports()).unwrap();
        assert!(rendered.contains("Port"));
        assert!(rendered.contains("COM3"));
    }
}
