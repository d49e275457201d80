// SPDX-License-Identifier: BSD-3-Clause
use std::path::PathBuf;

use crate::analysis::Algorithm;

/// May-alias analysis for LLVM bitcode
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Print the loaded datalog program (rules plus generated facts)
    #[arg(long)]
    pub print_program: bool,

    /// Print the addressable objects and the points-to relation
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub print_points_to: bool,

    /// Analysis rule set
    #[arg(long, value_enum, default_value_t = Algorithm::Andersen)]
    pub algorithm: Algorithm,

    /// LLVM bitcode module
    #[arg()]
    pub module: PathBuf,
}
