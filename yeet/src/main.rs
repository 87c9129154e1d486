//! yeet: resolve a layered stack configuration and deploy it.
//!
//! Config files merge in order (earlier files win), expand `_include`,
//! template themselves with `<( )>` references and fill `_defaults`. The
//! result renders into an ECS service CloudFormation stack that `deploy`
//! submits and polls until it settles.

use std::env;
use std::io;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};

use yeet::context::{Context, buildkite_context, resolve_region};
use yeet::deploy::deploy_files;
use yeet::exit_codes;
use yeet::io::settings::{SETTINGS_ENV, load_settings, settings_path};
use yeet::logging;
use yeet::output::{OutputKind, run_output};

#[derive(Parser)]
#[command(
    name = "yeet",
    version,
    about = "Resolve layered stack config and deploy it to CloudFormation",
    arg_required_else_help = true
)]
struct Cli {
    /// AWS region (defaults to AWS_REGION, then AWS_DEFAULT_REGION).
    #[arg(short, long, global = true)]
    region: Option<String>,

    /// Behave as though running in Buildkite (also set by BUILDKITE=true).
    #[arg(long, global = true)]
    bk: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deploy the stack described by the config files.
    Deploy {
        /// YAML file of tags for the stack.
        #[arg(short = 't', long = "tags-file", visible_alias = "tf")]
        tags_file: Option<PathBuf>,

        /// Config files, highest precedence first.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the rendered template, the resolved inputs, or the running tasks.
    Output {
        #[arg(value_enum)]
        kind: OutputKind,

        /// Config files, highest precedence first.
        files: Vec<PathBuf>,
    },
}

fn main() {
    logging::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayVersion => exit_codes::OK,
                _ => exit_codes::USAGE,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::FAILURE
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let region = resolve_region(cli.region.as_deref(), |key| env::var(key).ok())?;
    let cwd = env::current_dir().context("resolve current directory")?;
    let settings = load_settings(&settings_path(
        &cwd,
        env::var_os(SETTINGS_ENV).map(PathBuf::from),
    ))?;
    let buildkite = buildkite_context(cli.bk, |key| env::var(key).ok());
    let ctx = Context::aws(&settings, region, buildkite);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Deploy { tags_file, files } => {
            let outcome =
                deploy_files(&ctx, &settings.deploy, &files, tags_file.as_deref(), &mut out)?;
            for failure in &outcome.inspection_failures {
                eprintln!("{failure}");
            }
            match outcome.failure() {
                None => Ok(exit_codes::OK),
                Some(err) => {
                    eprintln!("{:#}", err);
                    Ok(exit_codes::FAILURE)
                }
            }
        }
        Command::Output { kind, files } => {
            run_output(&ctx, kind, &files, &mut out)?;
            Ok(exit_codes::OK)
        }
    }
}
