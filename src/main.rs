//! tracemill CLI - run a toolpath job from a JSON description
//!
//! Reads a job file (engine config plus an operation sequence with its
//! primitives), runs the offset → reconstruct → translate → sequence
//! pipeline, and writes the executable plans as JSON. `--flat` writes the
//! bare motion-command stream for downstream G-code emitters instead.

use std::fs;

use serde::Deserialize;

use tracemill::error::TranslateError;
use tracemill::{machine, run_job, EngineConfig, EngineContext, Operation};

#[derive(Debug)]
enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    Translate(TranslateError),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<TranslateError> for Error {
    fn from(e: TranslateError) -> Self {
        Error::Translate(e)
    }
}

/// On-disk job description.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobFile {
    #[serde(default)]
    config: EngineConfig,
    operations: Vec<Operation>,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let mut input_path = None;
    let mut output_path = "plans.json";
    let mut flat = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" | "help" => {
                print_usage();
                return;
            }
            "--flat" => {
                flat = true;
                i += 1;
            }
            "-o" => {
                if i + 1 < args.len() {
                    output_path = &args[i + 1];
                    i += 2;
                } else {
                    eprintln!("Error: -o requires an output path");
                    std::process::exit(1);
                }
            }
            arg => {
                if input_path.is_none() && !arg.starts_with('-') {
                    input_path = Some(arg);
                }
                i += 1;
            }
        }
    }

    let input_path = input_path.unwrap_or_else(|| {
        eprintln!("Error: no job file specified");
        print_usage();
        std::process::exit(1);
    });

    if let Err(e) = compile(input_path, output_path, flat) {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("tracemill - PCB artwork to CNC toolpath compiler");
    println!();
    println!("Usage:");
    println!("  tracemill <job.json> [-o plans.json]    Compile a job to toolpath plans");
    println!("  tracemill <job.json> --flat             Write the flat motion-command stream");
    println!("  tracemill --help                        Show this help");
    println!();
    println!("The job file carries an optional engine config and a list of");
    println!("operations, each with its toolpath context and primitives.");
}

fn compile(input_path: &str, output_path: &str, flat: bool) -> Result<(), Error> {
    let source = fs::read_to_string(input_path)?;
    let job: JobFile = serde_json::from_str(&source)?;

    let mut ctx = EngineContext::new(job.config.clone());
    let output = run_job(&mut ctx, &job.operations)?;

    for warning in &output.warnings {
        eprintln!("warning: primitive {}: {}", warning.primitive_id, warning.reason);
    }

    let json = if flat {
        serde_json::to_string_pretty(&machine::flatten(&output.plans))?
    } else {
        serde_json::to_string_pretty(&output.plans)?
    };
    fs::write(output_path, json)?;

    let command_count: usize = output.plans.iter().map(|p| p.commands.len()).sum();
    println!(
        "Generated: {} ({} plans, {} commands, {} curves registered)",
        output_path,
        output.plans.len(),
        command_count,
        ctx.curves.len()
    );
    Ok(())
}
