//! Command-line interface for identity folding.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use framelink_identity::{decode_url_host, encode, AppletIdentity};

#[derive(Parser)]
#[command(
    name = "framelink-id",
    about = "Fold applet identities into origin-safe text and back",
    after_help = "Examples:\n  framelink-id encode uhCEkXYZ...\n  framelink-id decode 'uhc$e$kx$y$z$...'\n  framelink-id encode --url uhCEkXYZ...\n  echo uhCEkXYZ... | framelink-id encode"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode canonical identities (read from stdin when none are given)
    Encode {
        /// Print the URL host form with `%24` markers
        #[arg(long)]
        url: bool,
        identities: Vec<String>,
    },
    /// Decode folded identities, with `$` or `%24` markers
    Decode { identities: Vec<String> },
}

fn encode_one(input: &str, url: bool) -> Result<String, String> {
    let id: AppletIdentity = input.trim().parse().map_err(|e| format!("{}", e))?;
    let folded = encode(&id);
    Ok(if url {
        folded.to_url_host()
    } else {
        folded.to_string()
    })
}

fn decode_one(input: &str) -> Result<String, String> {
    decode_url_host(input.trim())
        .map(|id| id.to_b64())
        .map_err(|e| format!("{}", e))
}

fn run<F>(inputs: Vec<String>, convert: F) -> ExitCode
where
    F: Fn(&str) -> Result<String, String>,
{
    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    let mut failed = false;

    let mut emit = |line: &str| match convert(line) {
        Ok(out) => {
            let _ = writeln!(stdout, "{}", out);
        }
        Err(e) => {
            eprintln!("Error: {}: {}", line, e);
            failed = true;
        }
    };

    if inputs.is_empty() {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(s) if s.trim().is_empty() => {}
                Ok(s) => emit(&s),
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    } else {
        for input in &inputs {
            emit(input);
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Encode { url, identities } => run(identities, |s| encode_one(s, url)),
        Command::Decode { identities } => run(identities, decode_one),
    }
}
