use std::path::PathBuf;
use clap::{ArgGroup, Parser};
use crate::errors::FuzzchainError;

#[derive(Parser, Debug)]
#[command(
    name = "fuzzchain",
    version,
    about = "Wordlist generation, directory enumeration and SQL injection scanning in one pipeline"
)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["scan", "crawl", "install", "probe", "validate"])
))]
pub struct Cli {
    /// Enumerate TARGET with WORDLIST, then scan every discovered path
    #[arg(short = 's', long, value_name = "TARGET", requires = "wordlist")]
    pub scan: Option<String>,

    /// Build a wordlist from TARGET's own content, then enumerate and scan
    #[arg(short = 'c', long, value_name = "TARGET")]
    pub crawl: Option<String>,

    /// Install the external tools and exit
    #[arg(short = 'i', long)]
    pub install: bool,

    /// Request TARGET/<word> for each word and report JSON responses
    #[arg(long, value_name = "TARGET")]
    pub probe: Option<String>,

    /// Validate a configuration file and exit
    #[arg(long, value_name = "FILE")]
    pub validate: Option<PathBuf>,

    /// Wordlist for --scan, or for --probe (stdin when omitted)
    #[arg(value_name = "WORDLIST")]
    pub wordlist: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output directory for run artifacts [default: ./results]
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Directory the external tools are installed under [default: ./tools]
    #[arg(long, value_name = "DIR")]
    pub tools_dir: Option<PathBuf>,

    /// Injection-scanning service base URL (or FUZZCHAIN_SERVICE_URL)
    #[arg(long, value_name = "URL")]
    pub service_url: Option<String>,

    /// Launch the scanning service from the installed scanner for this run
    #[arg(long)]
    pub start_service: bool,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress output and the summary
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

/// What one invocation does. Exactly one per run.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Scan { target: String, wordlist: PathBuf },
    Crawl { target: String },
    Install,
    Probe { target: String, wordlist: Option<PathBuf> },
    Validate { config: PathBuf },
}

impl Cli {
    pub fn mode(&self) -> Result<Mode, FuzzchainError> {
        if let Some(target) = &self.scan {
            let wordlist = self
                .wordlist
                .clone()
                .ok_or_else(|| FuzzchainError::Config("--scan requires a WORDLIST".into()))?;
            return Ok(Mode::Scan { target: target.clone(), wordlist });
        }
        if let Some(target) = &self.crawl {
            return Ok(Mode::Crawl { target: target.clone() });
        }
        if let Some(target) = &self.probe {
            return Ok(Mode::Probe {
                target: target.clone(),
                wordlist: self.wordlist.clone(),
            });
        }
        if let Some(config) = &self.validate {
            return Ok(Mode::Validate { config: config.clone() });
        }
        if self.install {
            return Ok(Mode::Install);
        }
        Err(FuzzchainError::Config("no mode selected".into()))
    }
}
