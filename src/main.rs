//! MovaScript CLI: execute `.mova` source or `.uabc` bytecode, or compile
//! source into the bytecode container.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use movascript::parser::Parser as AstParser;
use movascript::tokenizer::Tokenizer;
use movascript::vm::{compile_program, Module, Value, Vm, VmOptions};

#[derive(Parser, Debug)]
#[command(name = "movascript", about = "MovaScript CLI", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a .mova source file or .uabc bytecode.
    Run(RunArgs),
    /// Compile a .mova source file into .uabc bytecode.
    Compile(CompileArgs),
}

#[derive(ClapArgs, Debug, Clone)]
struct RunArgs {
    /// Path to the script or bytecode to execute.
    script: PathBuf,

    /// Print the parsed AST before execution.
    #[arg(long = "print-ast")]
    print_ast: bool,

    /// Trace every executed instruction (requires RUST_LOG=trace).
    #[arg(long = "trace")]
    trace: bool,

    /// Dump the compiled module as JSON instead of executing it.
    #[arg(long = "emit-json")]
    emit_json: bool,
}

#[derive(ClapArgs, Debug, Clone)]
struct CompileArgs {
    /// Input .mova source file.
    input: PathBuf,
    /// Output .uabc bytecode file.
    #[arg(short = 'o', long = "output")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Run(cmd) => run_entry(cmd),
        Command::Compile(cmd) => compile_entry(&cmd.input, &cmd.output),
    }
}

fn run_entry(args: RunArgs) -> Result<()> {
    let module = if is_bytecode(&args.script) {
        let bytes = fs::read(&args.script)
            .with_context(|| format!("failed to read {}", args.script.display()))?;
        Module::deserialize(&bytes)
            .map_err(|err| anyhow!("{}: {}", args.script.display(), err))?
    } else {
        compile_source(&args.script, args.print_ast)?
    };

    if args.emit_json {
        println!("{}", serde_json::to_string_pretty(&module)?);
        return Ok(());
    }

    let options = VmOptions {
        trace: args.trace,
        ..VmOptions::default()
    };
    let value = Vm::with_options(&module, options)
        .run()
        .map_err(|err| anyhow!("runtime error: {}", err))?;
    if !matches!(value, Value::Null) {
        println!("{}", value);
    }
    Ok(())
}

fn compile_entry(input: &Path, output: &Path) -> Result<()> {
    let module = compile_source(input, false)?;
    let bytes = module
        .serialize()
        .map_err(|err| anyhow!("bytecode encode error: {}", err))?;
    fs::write(output, bytes).with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}

fn compile_source(path: &Path, print_ast: bool) -> Result<Module> {
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let tokens = Tokenizer::new(&source)
        .tokenize()
        .map_err(|err| anyhow!("{}: {}", path.display(), err))?;
    let program = AstParser::new(tokens)
        .parse()
        .map_err(|err| anyhow!("{}: {}", path.display(), err))?;
    if print_ast {
        println!("{:#?}", program);
    }
    compile_program(&program).map_err(|err| anyhow!("{}: {}", path.display(), err))
}

fn is_bytecode(path: &Path) -> bool {
    path.extension().map(|ext| ext == "uabc").unwrap_or(false)
}
