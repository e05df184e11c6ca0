use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
  #[command(subcommand)]
  cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
  /// Compile a file and print its bytecode.
  Disasm {
    file: PathBuf,
    /// Compile as eval code.
    #[arg(long)]
    eval: bool,
    /// Compile in strict mode.
    #[arg(long)]
    strict: bool,
  },
  /// Compile a file and report errors only.
  Check { file: PathBuf },
}

fn main() -> anyhow::Result<ExitCode> {
  env_logger::init();
  let args = Cli::parse();
  match args.cmd {
    Cmd::Disasm { file, eval, strict } => {
      let src = fs::read_to_string(&file)?;
      let options = if eval {
        kumo::Options::eval()
      } else {
        kumo::Options::global()
      };
      match kumo::compile(&src, options.strict(strict)) {
        Ok(code) => {
          print!("{}", code.disassemble());
          for (i, entry) in code.literals.iter().enumerate() {
            println!("[{i}] {}", entry.value);
          }
          Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
          eprintln!("{}", e.report(&src, true));
          Ok(ExitCode::FAILURE)
        }
      }
    }
    Cmd::Check { file } => {
      let src = fs::read_to_string(&file)?;
      match kumo::compile(&src, kumo::Options::global()) {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) => {
          eprintln!("{}", e.report(&src, true));
          Ok(ExitCode::FAILURE)
        }
      }
    }
  }
}
