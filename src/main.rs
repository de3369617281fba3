use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::Parser;

use rsnake::evaluator;
use rsnake::lexer::Lexer;
use rsnake::object::{Closure, Context};
use rsnake::parser;

/// Runs a script written in a small indentation-structured scripting
/// language.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the script; reads from stdin when omitted.
    script: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let source = match read_source(&args) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error reading the script: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = run(&source) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

fn read_source(args: &Args) -> io::Result<String> {
    match &args.script {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}

fn run(source: &str) -> Result<(), Box<dyn Error>> {
    let lexer = Lexer::new(source)?;
    let mut parser = parser::Parser::new(lexer);
    let program = parser.parse_program()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut ctx = Context::new(&mut out);
    let mut globals = Closure::new();
    evaluator::eval(&program, &mut globals, &mut ctx)?;

    Ok(())
}
