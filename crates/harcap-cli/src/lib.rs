use clap::ValueEnum;

pub mod commands;

/// How `inspect` prints its summary
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}
