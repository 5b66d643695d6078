use anyhow::Result;
use env_logger::Env;
use rds_grant::cli::{self, Command};
use rds_grant::config::Config;
use rds_grant::connection::RdsDataConnection;
use rds_grant::{apply, gen, inspect, validate};
use std::env;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    match cli::parse().cmd {
        Command::GenPass { length, username } => {
            let password = gen::gen_password(length)?;
            println!("Generated password: {}", password);
            if let Some(username) = username {
                println!("Fingerprint: {}", gen::fingerprint(&password, &username));
            }
        }

        Command::Apply {
            file,
            dryrun,
            state,
        } => {
            apply::apply(&file, dryrun, state.as_deref())?;
        }

        Command::Destroy {
            file,
            dryrun,
            state,
        } => {
            apply::destroy(&file, dryrun, state.as_deref())?;
        }

        Command::Validate { file } => {
            let target = match file {
                Some(file) => file,
                None => env::current_dir()?,
            };
            validate::validate_target(&target)?;
        }

        Command::Inspect { file } => {
            let config = Config::new(&file)?;
            let conn = RdsDataConnection::new(config.region.as_deref())?;
            inspect::inspect(&conn, &config)?;
        }
    }

    Ok(())
}
