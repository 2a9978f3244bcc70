use std::{env, fs, process::ExitCode};

use trash::{Evaluator, PrintFunction, StdPrint, parse, to_source};

const USAGE: &str = "usage: trash [--ast | --fmt] <script>";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut mode = Mode::Run;
    let mut file_path = None;
    for arg in &args {
        match arg.as_str() {
            "--ast" => mode = Mode::DumpAst,
            "--fmt" => mode = Mode::Format,
            "--help" | "-h" => {
                println!("{USAGE}");
                return ExitCode::SUCCESS;
            }
            other if file_path.is_none() && !other.starts_with('-') => file_path = Some(other),
            other => {
                eprintln!("unknown argument '{other}'\n{USAGE}");
                return ExitCode::FAILURE;
            }
        }
    }
    let Some(file_path) = file_path else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    let source = match fs::read_to_string(file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: cannot read {file_path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let program = match parse(&source) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match mode {
        Mode::DumpAst => match serde_json::to_string_pretty(&program) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("error: cannot serialize the tree: {err}");
                return ExitCode::FAILURE;
            }
        },
        Mode::Format => print!("{}", to_source(&program)),
        Mode::Run => {
            let mut evaluator = Evaluator::new();
            if let Err(err) = evaluator.register_native("print", PrintFunction::new(StdPrint)) {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
            if let Err(err) = evaluator.execute(&program) {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

#[derive(Clone, Copy)]
enum Mode {
    Run,
    DumpAst,
    Format,
}
