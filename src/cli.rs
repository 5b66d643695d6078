use std::path::PathBuf;
use structopt::StructOpt;

/// Manage MySQL users and privileges on Amazon RDS in GitOps style
#[derive(Debug, StructOpt)]
pub struct Cli {
    #[structopt(subcommand)]
    pub cmd: Command,
}

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Generate random password
    GenPass {
        /// The password length
        #[structopt(short, long, default_value = "24")]
        length: usize,
        /// The username, prints the fingerprint stored in the state file
        #[structopt(short, long)]
        username: Option<String>,
    },

    /// Apply changes
    Apply {
        /// The path to the file to read
        #[structopt(short, long, parse(from_os_str))]
        file: PathBuf,

        /// Dry run
        #[structopt(short, long)]
        dryrun: bool,

        /// The state file, defaults to `state` in the config
        #[structopt(short, long, parse(from_os_str))]
        state: Option<PathBuf>,
    },

    /// Delete everything recorded in the state file
    Destroy {
        /// The path to the file to read
        #[structopt(short, long, parse(from_os_str))]
        file: PathBuf,

        /// Dry run
        #[structopt(short, long)]
        dryrun: bool,

        /// The state file, defaults to `state` in the config
        #[structopt(short, long, parse(from_os_str))]
        state: Option<PathBuf>,
    },

    /// Validate target file
    Validate {
        /// The path to the file to read (optional)
        #[structopt(short, long, parse(from_os_str))]
        file: Option<PathBuf>,
    },

    /// Inspect current grants of the principals declared in the config file
    Inspect {
        /// The path to the file to read
        #[structopt(short, long, parse(from_os_str))]
        file: PathBuf,
    },
}

// Parse the command line arguments
pub fn parse() -> Cli {
    Cli::from_args()
}
