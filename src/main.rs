use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser as ClapParser, error::ErrorKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    driver::{CompilerOptions, EmitKind},
    frontend::{SourceFile, SourceFileOrigin},
    middle::optimization::DEFAULT_MAX_PASSES,
};

mod driver;
mod frontend;
mod index;
mod middle;

#[cfg(test)]
mod test_utils;

#[derive(Debug, ClapParser)]
#[command(
    version,
    about,
    long_about = indoc::indoc! {"
        Compiles Rill source files down to LIR, a control flow graph of basic
        blocks over virtual registers.

        Before lowering, conditions that are constant are folded away and
        nested ifs without else branches are collapsed into a single if with
        a short-circuiting `&&` condition.

        Set RUST_LOG to control log output (e.g. RUST_LOG=rillc=trace).
    "}
)]
pub struct Args {
    source_files: Vec<PathBuf>,

    /// What to write out for each source file
    #[arg(long, value_enum, default_value_t = EmitKind::Lir)]
    emit: EmitKind,

    /// 0 disables the AST optimizer and the CFG cleanup
    #[arg(short = 'O', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    opt_level: u8,

    /// Upper bound on optimizer passes per function
    #[arg(long, default_value_t = DEFAULT_MAX_PASSES)]
    max_passes: usize,

    /// Number of threads functions are compiled on
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    /// Write the output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    no_color: bool,

    /// Log optimizer rewrites and lowering progress
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "warn,rillc=debug" } else { "warn" })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    if args.no_color {
        colored::control::set_override(false);
    }

    if args.source_files.is_empty() {
        Args::command()
            .error(ErrorKind::MissingRequiredArgument, "Missing source files!")
            .exit();
    }

    if args.jobs == 0 {
        Args::command()
            .error(ErrorKind::InvalidValue, "--jobs must be at least 1")
            .exit();
    }

    if args.max_passes == 0 {
        Args::command()
            .error(ErrorKind::InvalidValue, "--max-passes must be at least 1")
            .exit();
    }

    for source_file in &args.source_files {
        if !source_file.exists() {
            Args::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("Source file '{}' does not exist!", source_file.display()),
                )
                .exit()
        }

        if !source_file.is_file() {
            Args::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("Input path '{}' is not a file!", source_file.display()),
                )
                .exit()
        }
    }

    let options = CompilerOptions {
        emit: args.emit,
        optimize: args.opt_level > 0,
        max_passes: args.max_passes,
        jobs: args.jobs,
    };

    /* Read in source files */

    let source_files = args
        .source_files
        .into_iter()
        .map(|path| {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;

            Ok(SourceFile {
                contents,
                origin: SourceFileOrigin::File(path),
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    /* Compile */

    let mut rendered = String::new();
    let mut failed = 0;

    for source_file in &source_files {
        info!(source = %source_file.origin, "compiling");

        match driver::compile(source_file, &options) {
            Ok(output) => rendered.push_str(&output),
            Err(error) => {
                eprintln!("{}\n", error.report(source_file));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("could not compile {failed} source file(s)");
    }

    driver::write_output(&rendered, args.output.as_deref()).with_context(|| {
        format!(
            "failed to write output to '{}'",
            args.output.as_deref().unwrap_or("<stdout>".as_ref()).display()
        )
    })
}
