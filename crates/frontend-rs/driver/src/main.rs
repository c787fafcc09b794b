//! Command-line front end: parse a program or unit and report diagnostics

use std::path::{Path, PathBuf};
use std::process;

use driver::Frontend;

struct Args {
    input: PathBuf,
    unit: bool,
    emit_ast: bool,
    strict: bool,
    search_paths: Vec<PathBuf>,
}

fn main() {
    let args = match parse_args() {
        Some(args) => args,
        None => {
            print_usage();
            process::exit(2);
        }
    };

    let mut frontend = Frontend::new();
    frontend.set_strict(args.strict);
    for dir in args.search_paths {
        frontend.add_search_path(dir);
    }

    match run(&frontend, &args.input, args.unit, args.emit_ast) {
        Ok(0) => {}
        Ok(errors) => {
            eprintln!("{} error(s)", errors);
            process::exit(1);
        }
        Err(error) => {
            eprintln!("{}: {}", args.input.display(), error);
            process::exit(1);
        }
    }
}

/// Parse the input and print its diagnostics; returns the error count
fn run(frontend: &Frontend, input: &Path, unit: bool, emit_ast: bool) -> Result<usize, Box<dyn std::error::Error>> {
    let (diagnostics, ast) = if unit {
        let parsed = frontend.parse_unit_file(input)?;
        let ast = if emit_ast {
            Some(serde_json::to_string_pretty(parsed.unit.as_ref())?)
        } else {
            None
        };
        (parsed.diagnostics, ast)
    } else {
        let parsed = frontend.parse_program_file(input)?;
        let ast = if emit_ast {
            Some(serde_json::to_string_pretty(&parsed.program)?)
        } else {
            None
        };
        (parsed.diagnostics, ast)
    };

    frontend.print_diagnostics(&diagnostics);
    if let Some(ast) = ast {
        println!("{}", ast);
    }
    Ok(Frontend::error_count(&diagnostics))
}

fn parse_args() -> Option<Args> {
    let mut args = std::env::args().skip(1);
    let mut input = None;
    let mut unit = false;
    let mut emit_ast = false;
    let mut strict = false;
    let mut search_paths = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--unit" => unit = true,
            "--emit-ast" => emit_ast = true,
            "--strict" => strict = true,
            "-I" | "--search-path" => search_paths.push(PathBuf::from(args.next()?)),
            _ if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                return None;
            }
            _ => input = Some(PathBuf::from(arg)),
        }
    }

    Some(Args {
        input: input?,
        unit,
        emit_ast,
        strict,
        search_paths,
    })
}

fn print_usage() {
    println!(
        r#"Usage: pasfront [OPTIONS] FILE

Options:
    --unit              Parse FILE as a unit instead of a program
    --emit-ast          Print the syntax tree as JSON
    --strict            Stop at the first unresolved or duplicate name
    -I, --search-path DIR
                        Directory searched for used units (repeatable)
"#
    );
}
