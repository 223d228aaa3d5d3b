// SerialTerm - Minimal serial-port terminal
use clap::Parser;
use serialterm::cli::args::Args;
use serialterm::cli::commands::execute_command;
use serialterm::cli::output::{ConsoleWriter, OutputWriter};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let writer = ConsoleWriter::new(args.output.clone());

    if let Err(e) = execute_command(args).await {
        if writer.write_error(&e.to_string()).is_err() {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}
