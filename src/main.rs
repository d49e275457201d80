// SPDX-License-Identifier: BSD-3-Clause
use std::io::{self, Write};

use anyhow::{Context, Error, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use datalog_aa::analysis::{Options, PointerAnalysis};
use datalog_aa::cli;
use datalog_aa::llvm;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = cli::Args::parse();

    let llvm_module = if args.module.extension().is_some_and(|e| e == "ll") {
        llvm_ir::Module::from_ir_path(&args.module)
    } else {
        llvm_ir::Module::from_bc_path(&args.module)
    }
    .map_err(Error::msg)
    .with_context(|| {
        format!(
            "couldn't parse LLVM module at {}",
            args.module.display()
        )
    })?;

    let module = llvm::convert_module(&llvm_module).context("malformed LLVM module")?;
    let analysis = PointerAnalysis::with_options(
        &module,
        &Options {
            algorithm: args.algorithm,
        },
    )
    .context("pointer analysis failed")?;

    let mut stdout = io::stdout().lock();
    if args.print_program {
        write!(stdout, "{}", analysis.program())?;
    }
    if args.print_points_to {
        analysis.print_points_to(&mut stdout)?;
    }
    Ok(())
}
