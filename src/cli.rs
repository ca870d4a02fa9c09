use std::path::PathBuf;

use clap::Parser;

use pkgrecon::config::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "pkgrecon",
    about = "Recognize package manifests and archives and report their metadata",
    version
)]
pub struct Cli {
    /// Files to recognize
    #[arg(required_unless_present = "list_handlers")]
    pub files: Vec<PathBuf>,

    /// Config file [default: ./.pkgrecon/config.toml, fallback ~/.config/pkgrecon/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Report format [default: from config, else terminal]
    #[arg(long, value_name = "FORMAT")]
    pub report: Option<ReportFormat>,

    /// Show dependencies and files without packages; enables debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print the handler registry in priority order and exit
    #[arg(long)]
    pub list_handlers: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Terminal => ReportFormat::Terminal,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_files_required_unless_listing() {
        assert!(Cli::try_parse_from(["pkgrecon"]).is_err());
        let cli = Cli::try_parse_from(["pkgrecon", "--list-handlers"]).unwrap();
        assert!(cli.list_handlers);
        let cli = Cli::try_parse_from(["pkgrecon", "a/package.json", "--report", "json"]).unwrap();
        assert_eq!(cli.files.len(), 1);
        assert_eq!(cli.report, Some(ReportFormat::Json));
    }
}
