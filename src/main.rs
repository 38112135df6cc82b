use clap::Parser;
use log::{debug, info};
use pulse::{
    cli::{Args, Commands},
    error::Result,
    parser::parse,
    runtime::Interpreter,
    tokenizer::tokenize,
};
use std::{fs, path::PathBuf};

fn run_file(file: PathBuf) -> Result<()> {
    let source = fs::read_to_string(file)?;

    let tokens = tokenize(&source)?;
    let ast = parse(&tokens)?;

    Interpreter::new().execute(&ast)
}

fn check_file(file: PathBuf) -> Result<()> {
    let source = fs::read_to_string(file)?;

    let tokens = tokenize(&source)?;
    debug!("{} tokens", tokens.len());

    let ast = parse(&tokens)?;
    debug!("{} top-level statements", ast.statements.len());

    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Run { files } => {
            info!("FILE MODE");

            // A failing file is reported and the batch moves on.
            for file in files {
                debug!("file: {:?}", file);

                run_file(file)
                    .inspect_err(|err| {
                        eprintln!("{}", err);
                    })
                    .ok();

                println!("{}", "-".repeat(80));
            }
        }
        Commands::Check { files } => {
            info!("CHECK MODE");

            for file in files {
                debug!("file: {:?}", file);

                match check_file(file) {
                    Ok(()) => println!("ok"),
                    Err(err) => eprintln!("{}", err),
                }
            }
        }
    }
}
