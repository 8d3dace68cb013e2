use clap::{Parser, Subcommand};

use self::{create_index::CreateIndexArg, cv_learn::CvLearnArg};

mod create_index;
mod cv_learn;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Run incremental cross-validation learning experiments
    CvLearn(#[clap(flatten)] CvLearnArg),
    /// Create the review ID index in the datastore
    CreateIndex(#[clap(flatten)] CreateIndexArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::CvLearn(arg) => cv_learn::run(&arg)?,
        Mode::CreateIndex(arg) => create_index::run(&arg)?,
    }
    Ok(())
}
