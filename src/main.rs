use clap::{Parser, Subcommand};

use ferrous_report::pipelines::linear::mem::main_mem;
use ferrous_report::pipelines::linear::mem_opt::{MemCliOptions, MemOpt};

#[derive(Parser)]
#[command(name = "ferrous-report")]
#[command(about = "FerrousReport - resolves, scores and reports short-read alignment hits as SAM", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align reads and write SAM
    Mem(MemCliOptions),
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Mem(options) => {
            let opt = match MemOpt::from_cli(&options) {
                Ok(opt) => opt,
                Err(e) => {
                    eprintln!("[E::mem] {e}");
                    std::process::exit(1);
                }
            };

            env_logger::Builder::from_default_env()
                .filter_level(opt.log_level())
                .format_timestamp(None)
                .format_target(false)
                .init();

            let command_line = std::env::args().collect::<Vec<_>>().join(" ");

            match main_mem(&options, &opt, &command_line) {
                Ok(stats) => log::info!("Done: {} records written", stats.records),
                Err(e) => {
                    log::error!("{e:#}");
                    std::process::exit(1);
                }
            }
        }
    }
}
