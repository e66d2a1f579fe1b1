use contify::diagnostics;
use contify::language::lift::HoistPolicy;
use contify::language::pipeline::{self, CompileOptions};
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn usage() -> ! {
    eprintln!("Usage: ./contify [transform|check] <filename.js> [--full] [--no-lift]");
    process::exit(1);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage();
    }

    let command = &args[1];
    let filename = &args[2];

    if !filename.ends_with(".js") {
        eprintln!("Invalid file extension. Only .js files are allowed.");
        process::exit(1);
    }

    let source = match fs::read_to_string(filename) {
        Ok(source) => source,
        Err(err) => {
            diagnostics::report_io_error(Path::new(filename), &err);
            process::exit(1);
        }
    };

    let options = CompileOptions {
        policy: if args.iter().any(|a| a == "--full") {
            HoistPolicy::Full
        } else {
            HoistPolicy::Local
        },
        lift: !args.iter().any(|a| a == "--no-lift"),
    };

    match command.as_str() {
        "transform" => match pipeline::compile_with(&source, options) {
            Ok(compiled) => println!("{}", compiled.body),
            Err(errors) => {
                diagnostics::emit_syntax_errors(filename, &source, &errors.errors);
                process::exit(1);
            }
        },
        "check" => match pipeline::compile_with(&source, options) {
            Ok(_) => println!("{}: ok", filename),
            Err(errors) => {
                diagnostics::emit_syntax_errors(filename, &source, &errors.errors);
                process::exit(1);
            }
        },
        _ => usage(),
    }
}
