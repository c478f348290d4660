use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process;

use ace_core::bytecode::{disassemble, format_listing};
use ace_core::{
    assembler, validator, ContractVerifier, EngineConfig, Error, ErrorKind, ExecutionProof,
    Fingerprint, Result,
};

/// ACE - Attested Contract Engine CLI
///
/// Validate, assemble, run and prove bytecode contracts.
#[derive(Parser)]
#[command(name = "ace", version, about, long_about = None)]
struct Cli {
    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a contract (raw bytecode or .asm source)
    Validate {
        /// Path to contract file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Assemble .asm source into bytecode
    Asm {
        /// Path to .asm file
        file: PathBuf,
        /// Output bytecode file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print an assembler listing of a contract
    Disasm {
        /// Path to contract file
        file: PathBuf,
    },

    /// Execute a contract
    Run {
        /// Path to contract file
        file: PathBuf,
        /// Input bytes as hex
        #[arg(long)]
        input: Option<String>,
        /// Gas limit (defaults to the configured default)
        #[arg(long)]
        gas: Option<u64>,
        /// Also sign an execution proof
        #[arg(long)]
        prove: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sign a proof for a fingerprint
    Prove {
        /// Fingerprint as 64 hex characters
        #[arg(long)]
        fingerprint: String,
    },

    /// Check a proof against an expected fingerprint
    VerifyProof {
        /// Proof as hex
        #[arg(long)]
        proof: String,
        /// Expected fingerprint as hex
        #[arg(long)]
        fingerprint: String,
    },

    /// Print the engine measurement
    Measurement,

    /// Build a report embedding caller data
    Report {
        /// User data as hex (at most 64 bytes)
        #[arg(long)]
        user_data: Option<String>,
    },

    /// Write a sample contract
    Init {
        /// Destination path
        path: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

const EXIT_OK: i32 = 0;
const EXIT_FAIL: i32 = 1;
const EXIT_ERROR: i32 = 2;

const SAMPLE_CONTRACT: &str = "\
; Adds two numbers; the sum is the output
        push 10
        push 20
        add
        halt
";

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match EngineConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                print_error(&e);
                process::exit(EXIT_ERROR);
            }
        },
        None => EngineConfig::default(),
    };
    init_logging(&config);

    let quiet = cli.quiet;
    let outcome = match cli.command {
        Commands::Validate { file, json } => cmd_validate(&file, json, quiet),
        Commands::Asm { file, output } => cmd_asm(&file, &output, quiet),
        Commands::Disasm { file } => cmd_disasm(&file),
        Commands::Run {
            file,
            input,
            gas,
            prove,
            json,
        } => cmd_run(&config, &file, input.as_deref(), gas, prove, json, quiet),
        Commands::Prove { fingerprint } => cmd_prove(&config, &fingerprint),
        Commands::VerifyProof { proof, fingerprint } => {
            cmd_verify_proof(&proof, &fingerprint, quiet)
        }
        Commands::Measurement => {
            println!("{}", hex::encode(ace_core::attestation::measurement()));
            Ok(EXIT_OK)
        }
        Commands::Report { user_data } => cmd_report(&config, user_data.as_deref()),
        Commands::Init { path } => cmd_init(path, quiet),
        Commands::Version => {
            println!(
                "ace {} (ace-core {})",
                env!("CARGO_PKG_VERSION"),
                ace_core::VERSION
            );
            Ok(EXIT_OK)
        }
    };

    let exit_code = match outcome {
        Ok(code) => code,
        Err(e) => {
            print_error(&e);
            exit_code_for(&e)
        }
    };
    process::exit(exit_code);
}

fn init_logging(config: &EngineConfig) {
    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .init();
}

fn print_error(e: &Error) {
    eprintln!("{} {}", "error:".red().bold(), e);
}

fn exit_code_for(e: &Error) -> i32 {
    match e.kind() {
        ErrorKind::InvalidContract => EXIT_FAIL,
        _ => EXIT_ERROR,
    }
}

// ── Input Helpers ─────────────────────────────────────────

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| Error::InvalidInput(format!("cannot read {}: {}", path.display(), e)))
}

fn is_asm(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "asm")
}

/// Raw bytecode, or assembled source for `.asm` files
fn load_contract(path: &Path) -> Result<Vec<u8>> {
    let bytes = read_file(path)?;
    if !is_asm(path) {
        return Ok(bytes);
    }
    let source = String::from_utf8(bytes)
        .map_err(|_| Error::InvalidInput(format!("{} is not UTF-8", path.display())))?;
    assembler::assemble(&source)
}

fn decode_hex(what: &str, s: &str) -> Result<Vec<u8>> {
    hex::decode(s.trim()).map_err(|e| Error::InvalidInput(format!("invalid {} hex: {}", what, e)))
}

// ── Commands ──────────────────────────────────────────────

fn cmd_validate(file: &Path, json: bool, quiet: bool) -> Result<i32> {
    let outcome = load_contract(file).and_then(|code| validator::validate(&code));
    match outcome {
        Ok(report) => {
            if json {
                let mut value = serde_json::to_value(report)
                    .map_err(|e| Error::InvalidInput(format!("cannot encode report: {}", e)))?;
                value["valid"] = serde_json::Value::Bool(true);
                println!("{}", value);
            } else if !quiet {
                println!(
                    "{} {} ({} bytes, {} instructions)",
                    "valid".green().bold(),
                    file.display(),
                    report.code_size,
                    report.instruction_count
                );
            }
            Ok(EXIT_OK)
        }
        Err(e) if e.kind() == ErrorKind::InvalidContract => {
            if json {
                let value = serde_json::json!({
                    "valid": false,
                    "error": e.to_string(),
                });
                println!("{}", value);
            } else {
                eprintln!("{} {}: {}", "invalid".red().bold(), file.display(), e);
            }
            Ok(EXIT_FAIL)
        }
        Err(e) => Err(e),
    }
}

fn cmd_asm(file: &Path, output: &Path, quiet: bool) -> Result<i32> {
    let source = read_file(file)?;
    let source = String::from_utf8(source)
        .map_err(|_| Error::InvalidInput(format!("{} is not UTF-8", file.display())))?;
    let code = assembler::assemble(&source)?;
    std::fs::write(output, &code)
        .map_err(|e| Error::InvalidInput(format!("cannot write {}: {}", output.display(), e)))?;
    if !quiet {
        println!("assembled {} bytes to {}", code.len(), output.display());
    }
    Ok(EXIT_OK)
}

fn cmd_disasm(file: &Path) -> Result<i32> {
    let code = load_contract(file)?;
    let listing = disassemble(&code).map_err(|e| Error::InvalidContract(e.to_string()))?;
    print!("{}", format_listing(&listing));
    Ok(EXIT_OK)
}

fn cmd_run(
    config: &EngineConfig,
    file: &Path,
    input: Option<&str>,
    gas: Option<u64>,
    prove: bool,
    json: bool,
    quiet: bool,
) -> Result<i32> {
    let code = load_contract(file)?;
    let input = match input {
        Some(s) => decode_hex("input", s)?,
        None => Vec::new(),
    };
    let gas_limit = gas.unwrap_or(config.default_gas_limit);

    let mut verifier = ContractVerifier::new(config.clone())?;
    let result = match verifier.execute(&code, &input, gas_limit) {
        Ok(result) => result,
        Err(e) if json => {
            let value = serde_json::json!({
                "success": false,
                "error_kind": e.kind().to_string(),
                "error": e.to_string(),
            });
            println!("{}", value);
            return Ok(exit_code_for(&e));
        }
        Err(e) => return Err(e),
    };
    let proof = if prove {
        Some(verifier.generate_proof(&result.fingerprint)?)
    } else {
        None
    };
    verifier.shutdown();

    if json {
        let mut value = serde_json::json!({
            "success": true,
            "output": hex::encode(&result.output),
            "gas_used": result.gas_used,
            "fingerprint": result.fingerprint.to_hex(),
        });
        if let Some(proof) = &proof {
            value["proof"] = serde_json::Value::String(proof.to_hex());
        }
        println!("{}", value);
    } else if quiet {
        println!("{}", hex::encode(&result.output));
    } else {
        println!("{}", "completed".green().bold());
        println!("  output:      {}", hex::encode(&result.output));
        println!("  gas used:    {} / {}", result.gas_used, gas_limit);
        println!("  fingerprint: {}", result.fingerprint);
        if let Some(proof) = &proof {
            println!("  proof:       {}", proof.to_hex());
        }
    }
    Ok(EXIT_OK)
}

fn cmd_prove(config: &EngineConfig, fingerprint: &str) -> Result<i32> {
    let fingerprint = Fingerprint::from_hex(fingerprint)?;
    let mut verifier = ContractVerifier::new(config.clone())?;
    let proof = verifier.generate_proof(&fingerprint)?;
    verifier.shutdown();
    println!("{}", proof.to_hex());
    Ok(EXIT_OK)
}

fn cmd_verify_proof(proof: &str, fingerprint: &str, quiet: bool) -> Result<i32> {
    let proof = ExecutionProof::from_hex(proof)?;
    let fingerprint = Fingerprint::from_hex(fingerprint)?;
    if ace_core::verify_proof(&proof, &fingerprint) {
        if !quiet {
            println!("{} proof", "valid".green().bold());
        }
        Ok(EXIT_OK)
    } else {
        if !quiet {
            println!("{} proof", "invalid".red().bold());
        }
        Ok(EXIT_FAIL)
    }
}

fn cmd_report(config: &EngineConfig, user_data: Option<&str>) -> Result<i32> {
    let user_data = match user_data {
        Some(s) => decode_hex("user data", s)?,
        None => Vec::new(),
    };
    let mut verifier = ContractVerifier::new(config.clone())?;
    let report = verifier.create_report(&user_data)?;
    verifier.shutdown();
    println!("{}", hex::encode(report.to_bytes()));
    Ok(EXIT_OK)
}

fn cmd_init(path: Option<PathBuf>, quiet: bool) -> Result<i32> {
    let path = path.unwrap_or_else(|| PathBuf::from("add.asm"));
    if path.exists() {
        return Err(Error::InvalidInput(format!(
            "{} already exists",
            path.display()
        )));
    }
    std::fs::write(&path, SAMPLE_CONTRACT)
        .map_err(|e| Error::InvalidInput(format!("cannot write {}: {}", path.display(), e)))?;
    if !quiet {
        println!("created {}", path.display());
    }
    Ok(EXIT_OK)
}
