use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mpg_audit::VerifyResult;

mod commands;

#[derive(Parser)]
#[command(name = "mpg")]
#[command(about = "Model promotion gate", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the newest model version and promote it if it passes
    Promote {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Directory for promotion_report.json
        #[arg(long)]
        report_out: Option<PathBuf>,

        /// Fail on config keys the promotion gate does not read
        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Decision audit log utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of an audit log
    Verify {
        #[arg(long)]
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();
    commands::init_tracing(cli.log_json);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(commands::exit_code_for(&e))
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.cmd {
        Commands::Promote {
            config_paths,
            report_out,
            strict_config,
        } => {
            let args = commands::promote::PromoteArgs {
                config_paths,
                report_out,
                strict_config,
            };
            let outcome = commands::promote::run(&args)?;
            commands::promote::print_summary(&outcome);
            Ok(ExitCode::SUCCESS)
        }

        Commands::ConfigHash { paths } => {
            let loaded = commands::load_config(&paths).map_err(commands::ConfigError::wrap)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Audit {
            cmd: AuditCmd::Verify { path },
        } => match mpg_audit::verify_hash_chain(&path)? {
            VerifyResult::Valid { lines } => {
                println!("audit_valid=true lines={lines}");
                Ok(ExitCode::SUCCESS)
            }
            VerifyResult::Broken { line, reason } => {
                println!("audit_valid=false line={line}");
                println!("reason={reason}");
                Ok(ExitCode::FAILURE)
            }
        },
    }
}
