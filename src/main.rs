//! CLI entry point: `run`/`sign`/`hint`/`fuzz` subcommands over a
//! decompiled-class JSON tree (spec §6). Flag parsing is `clap` derive;
//! the VM/hinter/fuzzer work is all in the library — this binary is glue
//! from args to stdout and exit codes.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use std::rc::Rc;

use jpamb_runtime::bytecode::cache::BytecodeCache;
use jpamb_runtime::bytecode::{default_class_root, JsonResolver};
use jpamb_runtime::error::CliError;
use jpamb_runtime::fuzz::{FuzzCampaign, FuzzConfig};
use jpamb_runtime::heap::Heap;
use jpamb_runtime::hinter;
use jpamb_runtime::interp::abstract_step::AbstractState;
use jpamb_runtime::method::{MethodId, Type};
use jpamb_runtime::sign::SignSet;
use jpamb_runtime::value::{split_top_level, InputValue, ParseValueError};
use jpamb_runtime::{interp, run_and_report, run_sign, worklist};

#[derive(Parser)]
#[command(name = "jpamb", version, about = "Concrete/abstract interpreter, hinter and fuzzer over decompiled bytecode")]
struct Cli {
    /// Root of the decompiled-class JSON tree. Defaults to
    /// `<cwd>/target/decompiled`.
    #[arg(long, global = true)]
    bytecode_source: Option<PathBuf>,

    /// Per-run instruction budget.
    #[arg(long, global = true, default_value_t = interp::concrete::DEFAULT_BUDGET)]
    budget: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one concrete execution; prints the outcome and trace.
    Run {
        method: String,
        #[arg(allow_hyphen_values = true)]
        input: String,
    },
    /// Run the sign-abstract interpreter over the input's sign abstraction.
    Sign {
        method: String,
        #[arg(allow_hyphen_values = true)]
        input: String,
    },
    /// Print the syntactic hinter's seed list, one value per line.
    Hint { method: String },
    /// Run a fuzz campaign against a method.
    Fuzz {
        method: String,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 1000)]
        iterations: usize,
        #[arg(long, default_value_t = 40)]
        stall_limit: usize,
        #[arg(long, default_value_t = 0.5)]
        mutation_rate: f64,
        #[arg(long, default_value_t = 1000)]
        int_range: i32,
        #[arg(long, default_value_t = 20)]
        max_str: usize,
        #[arg(long, default_value_t = 20)]
        max_arr: usize,
    },
}

/// Parse a CLI argument tuple against a method's declared parameter types.
/// Outer parentheses are required unless the method takes exactly one
/// parameter, in which case they're optional (spec §6).
fn parse_tuple(s: &str, params: &[jpamb_runtime::method::Type]) -> Result<Vec<InputValue>, ParseValueError> {
    let trimmed = s.trim();
    let stripped = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        Some(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    };

    if params.len() == 1 {
        let body = stripped.unwrap_or(trimmed);
        return Ok(vec![InputValue::parse(body.trim(), &params[0])?]);
    }

    let body = stripped.ok_or_else(|| ParseValueError(s.to_string()))?;
    let pieces = split_top_level(body);
    if pieces.len() != params.len() {
        return Err(ParseValueError(s.to_string()));
    }
    pieces
        .iter()
        .zip(params)
        .map(|(piece, ty)| InputValue::parse(piece.trim(), ty))
        .collect()
}

fn parse_method(s: &str) -> Result<MethodId, CliError> {
    MethodId::parse(s).ok_or_else(|| CliError::MalformedMethodId(s.to_string()))
}

/// For an entry method with exactly one int/short parameter, ask the
/// worklist driver whether restricting that parameter to strictly positive
/// or strictly negative ever reaches `"ok"`; a sign that never does biases
/// the fuzzer's generator away from it (spec §2/§4.I). Any other parameter
/// shape yields no bias — the sign-abstract interpreter only models a
/// single-value seed here, not a per-call-site mix of known and unknown
/// parameters.
fn sign_bias_for(
    cache: &mut BytecodeCache<JsonResolver>,
    method_id: &MethodId,
    budget: usize,
) -> SignSet {
    if method_id.params.len() != 1 || !matches!(method_id.params[0], Type::Int | Type::Short) {
        return SignSet::empty();
    }
    let mut bias = SignSet::empty();
    for sign in [SignSet::POS, SignSet::NEG] {
        let initial = AbstractState::seed(Rc::new(method_id.clone()), &[sign]);
        match worklist::run_all(cache, initial, budget) {
            Ok(outcomes) if !outcomes.contains("ok") => bias |= sign,
            _ => {}
        }
    }
    bias
}

fn resolver_for(cli: &Cli) -> JsonResolver {
    let root = cli
        .bytecode_source
        .clone()
        .unwrap_or_else(|| default_class_root("."));
    JsonResolver::new(root)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = run(cli);
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> i32 {
    let resolver = resolver_for(&cli);
    let budget = cli.budget;

    match &cli.command {
        Commands::Run { method, input } => {
            let result = (|| -> Result<(), CliError> {
                let method_id = parse_method(method)?;
                let args = parse_tuple(input, &method_id.params)
                    .map_err(|e| CliError::MalformedInput(e.to_string()))?;
                let mut cache = BytecodeCache::new(resolver);
                match run_and_report(&mut cache, method_id, &args, budget) {
                    Ok((outcome, trace)) => {
                        println!("{}", outcome);
                        println!("{}", trace);
                        Ok(())
                    }
                    Err(bug) => {
                        eprintln!("{}", bug);
                        std::process::exit(1);
                    }
                }
            })();
            exit_for(result)
        }
        Commands::Sign { method, input } => {
            let result = (|| -> Result<(), CliError> {
                let method_id = parse_method(method)?;
                let args = parse_tuple(input, &method_id.params)
                    .map_err(|e| CliError::MalformedInput(e.to_string()))?;
                let mut cache = BytecodeCache::new(resolver);
                match run_sign(&mut cache, method_id, &args, budget) {
                    Ok(outcomes) => {
                        let mut sorted: Vec<&String> = outcomes.iter().collect();
                        sorted.sort();
                        let rendered: Vec<&str> = sorted.iter().map(|s| s.as_str()).collect();
                        println!("{}", rendered.join(","));
                        Ok(())
                    }
                    Err(bug) => {
                        eprintln!("{}", bug);
                        std::process::exit(1);
                    }
                }
            })();
            exit_for(result)
        }
        Commands::Hint { method } => {
            let result = (|| -> Result<(), CliError> {
                let method_id = parse_method(method)?;
                let mut cache = BytecodeCache::new(resolver);
                let code = cache.opcodes(&method_id).map_err(|e| CliError::MalformedInput(e.to_string()))?;
                for seed in hinter::hint(&method_id, &code) {
                    let rendered: Vec<String> = seed.iter().map(InputValue::encode).collect();
                    println!("{}", rendered.join(", "));
                }
                Ok(())
            })();
            exit_for(result)
        }
        Commands::Fuzz {
            method,
            seed,
            iterations,
            stall_limit,
            mutation_rate,
            int_range,
            max_str,
            max_arr,
        } => {
            let result = (|| -> Result<(), CliError> {
                let method_id = parse_method(method)?;
                let mut cache = BytecodeCache::new(resolver);
                let code = cache
                    .opcodes(&method_id)
                    .map_err(|e| CliError::MalformedInput(e.to_string()))?;
                let total_offsets = code.len();
                let seeds = hinter::hint(&method_id, &code);
                let bias = sign_bias_for(&mut cache, &method_id, budget);

                let config = FuzzConfig {
                    iterations: *iterations,
                    stall_limit: *stall_limit,
                    mutation_rate: *mutation_rate,
                    int_range: *int_range,
                    max_str: *max_str,
                    max_arr: *max_arr,
                };
                let mut campaign = FuzzCampaign::new(*seed, config).with_sign_bias(bias);

                let start = std::time::Instant::now();
                let params = method_id.params.clone();
                let report = campaign
                    .run(&params, seeds, total_offsets, |input| {
                        let mut heap = Heap::new();
                        interp::concrete::run(&mut cache, &mut heap, method_id.clone(), input, budget)
                    })
                    .map_err(|bug| {
                        eprintln!("{}", bug);
                        std::process::exit(1);
                    })
                    .unwrap();

                for log in &report.logs {
                    println!("{}", log.format_line());
                }
                println!("{}", report.summary_line(elapsed_or_zero(start)));
                Ok(())
            })();
            exit_for(result)
        }
    }
}

fn elapsed_or_zero(start: std::time::Instant) -> Duration {
    start.elapsed()
}

fn exit_for(result: Result<(), CliError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e);
            2
        }
    }
}
