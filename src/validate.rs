use crate::config::Config;
use ansi_term::Colour::{Green, Red};
use anyhow::{anyhow, Result};
use std::path::Path;
use walkdir::WalkDir;

/// Validate a config file, or every `*.yaml`/`*.yml` under a directory.
pub fn validate_target(target: &Path) -> Result<()> {
    if !target.exists() {
        return Err(anyhow!(
            "{:?} ... {} - file/directory does not exist",
            target,
            Red.paint("Failed")
        ));
    }

    // Scan all files recursive from the directory
    if target.is_dir() {
        let mut files = vec![];
        for entry in WalkDir::new(target) {
            let entry = entry?;
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);
            if path.is_file() && is_yaml && !is_state_file(path) {
                files.push(path.to_path_buf());
            }
        }

        let mut failed = 0;
        for file in files {
            // Validate but not stop
            if let Err(e) = validate_file(&file) {
                println!("{}", e);
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(anyhow!("{} invalid file(s) in {:?}", failed, target));
        }

        return Ok(());
    }

    // Validate single file
    validate_file(target)
}

/// Validate target yaml file
pub fn validate_file(file: &Path) -> Result<()> {
    Config::new(file).map_err(|e| anyhow!("{:?} ... {} - {:#}", file, Red.paint("invalid"), e))?;

    println!("{:?} ... {}", file, Green.paint("ok"));

    Ok(())
}

fn is_state_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.ends_with(".state.yaml") || name.ends_with(".state.yml"))
        .unwrap_or(false)
}
