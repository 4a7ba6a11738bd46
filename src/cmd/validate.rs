//! `weeproxy validate`: check a configuration file for errors.
//!
//! Parses and validates the config file, reporting results in either
//! human-readable text or machine-readable JSON format.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::parse_config_str;
use crate::config::validation;
use crate::error::{ValidationError, WeeproxyError};

pub fn execute(args: &ValidateArgs) -> Result<(), WeeproxyError> {
    let path = &args.config;
    let separator = args.lb_separator.as_str();

    if !path.exists() {
        return Err(WeeproxyError::ConfigFileNotFound { path: path.clone() });
    }

    let content = std::fs::read_to_string(path)?;
    let config = parse_config_str(&content, &path.display().to_string())?;
    let warnings = validation::backend_warnings(&config, separator);

    if let Err(errors) = validation::validate(&config, separator) {
        match args.format {
            ValidateFormat::Text => {
                eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
                for error in &errors {
                    eprintln!("{error}");
                }
                print_warnings(&warnings);
            }
            ValidateFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "errors": to_json(&errors),
                        "warnings": to_json(&warnings),
                    })
                );
            }
        }
        return Err(WeeproxyError::ConfigValidation { errors });
    }

    match args.format {
        ValidateFormat::Text => {
            print_warnings(&warnings);
            println!(
                "\u{2713} {}",
                validation::format_validation_report(
                    &path.display().to_string(),
                    &config,
                    separator
                )
            );
        }
        ValidateFormat::Json => {
            let thresholds = config.thresholds();
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "routes": config.url_proxy.len(),
                    "backends": config.total_backends(separator),
                    "thresholds": thresholds,
                    "warnings": to_json(&warnings),
                })
            );
        }
    }

    Ok(())
}

fn print_warnings(warnings: &[ValidationError]) {
    if warnings.is_empty() {
        return;
    }
    eprintln!("! {} backend warnings (kept under their raw name)", warnings.len());
    for warning in warnings {
        eprintln!("{warning}");
    }
}

fn to_json(items: &[ValidationError]) -> Vec<serde_json::Value> {
    items
        .iter()
        .map(|e| {
            serde_json::json!({
                "route": e.route,
                "field": e.field,
                "message": e.message,
                "suggestion": e.suggestion,
            })
        })
        .collect()
}
