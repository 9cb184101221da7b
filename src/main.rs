// main.rs - Script runner and interactive REPL

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bellows::engine::{run, Engine};
use bellows::Context;

#[derive(Parser, Debug)]
#[command(name = "bellows")]
#[command(about = "A small embeddable concatenative stack language")]
struct Cli {
    /// Source file to run; starts a REPL when omitted
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let engine = Engine::new();

    match cli.file {
        Some(path) => run_file(&engine, &path),
        None => repl(&engine),
    }
}

fn run_file(engine: &Engine, path: &PathBuf) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to read {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let mut ctx = engine.new_ctx(&source);
    match run(&mut ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// REPL
// ============================================================================

fn repl(engine: &Engine) -> ExitCode {
    println!("bellows");
    println!("Type .help for help, .quit to exit");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("failed to start line editor: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let history_file = dirs::home_dir().map(|mut p| {
        p.push(".bellows_history");
        p
    });
    if let Some(ref path) = history_file {
        let _ = rl.load_history(path);
    }

    // One context for the whole session: the parameter stack and the
    // dictionary survive across lines.
    let mut ctx = engine.new_ctx("");
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "> " } else { "... " };
        match rl.readline(prompt) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                if pending.is_empty()
                    && input.starts_with('.')
                    && !input.starts_with(". ")
                    && !input.starts_with(".!")
                    && !input.starts_with(".apply:")
                {
                    match input {
                        ".quit" | ".exit" | ".q" => break,
                        ".help" | ".h" => {
                            print_help();
                            continue;
                        }
                        ".words" | ".w" => {
                            print_words(&ctx);
                            continue;
                        }
                        ".stack" | ".s" => {
                            print_stack(&ctx);
                            continue;
                        }
                        ".clear" => {
                            ctx.parameter_stack.borrow_mut().clear();
                            println!(" ok");
                            continue;
                        }
                        _ => {
                            println!("Unknown command: {}", input);
                            println!("Type .help for help");
                            continue;
                        }
                    }
                }

                // Buffer lines until every : has its ; so definitions can
                // span lines.
                pending.push_str(input);
                pending.push('\n');
                if definition_open(&pending) {
                    continue;
                }
                let chunk = std::mem::take(&mut pending);

                ctx.refill(&chunk);
                match run(&mut ctx) {
                    Ok(()) => {
                        print_stack(&ctx);
                    }
                    Err(e) => {
                        println!("{}", e);
                        println!("{}", ctx.input.marked());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                pending.clear();
                println!("^C");
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {}", e);
                break;
            }
        }
    }

    if let Some(ref path) = history_file {
        let _ = rl.save_history(path);
    }
    ExitCode::SUCCESS
}

/// Crude but serviceable: more `:` tokens than `;` means a definition is
/// still open and the next line belongs to it.
fn definition_open(source: &str) -> bool {
    let mut opens = 0i32;
    for token in source.split_whitespace() {
        match token {
            ":" => opens += 1,
            ";" => opens -= 1,
            _ => {}
        }
    }
    opens > 0
}

fn print_help() {
    println!("REPL commands:");
    println!("  .help, .h      Show this help");
    println!("  .words, .w     List all defined words");
    println!("  .stack, .s     Show the parameter stack");
    println!("  .clear         Clear the parameter stack");
    println!("  .quit, .q      Exit");
    println!();
    println!("Language:");
    println!("  Numbers:       123, -4.5");
    println!("  Strings:       ' hello there'");
    println!("  Define word:   : square dup * ;");
    println!("  Conditionals:  if ... endif, if ... else ... endif");
    println!("  Loops:         begin ... until, each ... endeach");
    println!("  Arrays:        [ 1 2 3 ]");
}

fn print_words(ctx: &Context) {
    let names = ctx.dict.borrow().names();
    println!("Defined words ({}):", names.len());
    for (i, name) in names.iter().enumerate() {
        print!("{:16}", name);
        if (i + 1) % 4 == 0 {
            println!();
        }
    }
    if names.len() % 4 != 0 {
        println!();
    }
}

fn print_stack(ctx: &Context) {
    let stack = ctx.parameter_stack.borrow();
    print!("<{}>", stack.len());
    for value in stack.iter() {
        print!(" {}", value);
    }
    println!(" ok");
}
