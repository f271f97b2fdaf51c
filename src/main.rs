use apexlog_tui::parser::LogParser;
use apexlog_tui::tui::run_tui;
use clap::{Parser as ClapParser, Subcommand};

#[derive(ClapParser)]
#[command(name = "apexlog-tui")]
#[command(about = "Explore Salesforce Apex debug logs as an interactive timeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a debug log in the interactive timeline
    View {
        /// Apex debug log file
        #[arg(value_name = "FILE")]
        input: String,
    },

    /// Parse a debug log and emit the call tree as JSON
    Parse {
        /// Apex debug log file
        #[arg(value_name = "FILE")]
        input: String,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<String>,

        /// Pretty print JSON output
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::View { input } => {
            view_file(&input);
        }
        Commands::Parse {
            input,
            output,
            pretty,
        } => {
            parse_file(&input, output, pretty);
        }
    }
}

fn view_file(input: &str) {
    let log = match LogParser::new().parse_file(input) {
        Ok(log) => log,
        Err(err) => {
            eprintln!("Error parsing file: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = run_tui(log, Some(input.to_string())) {
        eprintln!("Terminal error: {}", err);
        std::process::exit(1);
    }
}

fn parse_file(input: &str, output: Option<String>, pretty: bool) {
    let log = match LogParser::new().parse_file(input) {
        Ok(log) => log,
        Err(err) => {
            eprintln!("Error parsing file: {}", err);
            std::process::exit(1);
        }
    };

    let json = if pretty {
        serde_json::to_string_pretty(&log)
    } else {
        serde_json::to_string(&log)
    };

    let json = match json {
        Ok(j) => j,
        Err(err) => {
            eprintln!("Error serializing to JSON: {}", err);
            std::process::exit(1);
        }
    };

    if let Some(output_path) = output {
        if let Err(err) = std::fs::write(&output_path, json) {
            eprintln!("Error writing to {}: {}", output_path, err);
            std::process::exit(1);
        }
        eprintln!("Output written to {}", output_path);
    } else {
        println!("{}", json);
    }
}
