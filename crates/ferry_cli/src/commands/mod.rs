use clap::ValueEnum;

pub(crate) mod meta;
pub(crate) mod run;
pub(crate) mod shared;
pub(crate) mod validate;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}
