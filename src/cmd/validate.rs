//! `groundwork validate`: check an options file without connecting to
//! anything.

use clap::ArgMatches;
use console::style;

use super::load_options;
use crate::cli::{ValidateArgs, ValidateFormat};
use crate::error::GroundworkError;
use crate::options::{Options, ServerOptions};

pub fn execute(args: &ValidateArgs, matches: &ArgMatches) -> Result<(), GroundworkError> {
    let opts = load_options(Some(&args.config), matches)?;
    let path = args.config.display().to_string();

    if let Err(errors) = opts.validate() {
        match args.format {
            ValidateFormat::Text => {
                eprintln!(
                    "{} {path} has {} errors\n",
                    style("\u{2717}").red(),
                    errors.len()
                );
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            ValidateFormat::Json => {
                let json_errors: Vec<serde_json::Value> = errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "field": e.field,
                            "message": e.message,
                            "suggestion": e.suggestion,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({ "valid": false, "errors": json_errors })
                );
            }
        }
        return Err(GroundworkError::OptionsValidation { errors });
    }

    match args.format {
        ValidateFormat::Text => println!("{} {}", style("\u{2713}").green(), report(&path, &opts)),
        ValidateFormat::Json => println!(
            "{}",
            serde_json::json!({ "valid": true, "options": opts })
        ),
    }
    Ok(())
}

fn report(path: &str, opts: &ServerOptions) -> String {
    let mysql = opts
        .mysql
        .redacted_dsn()
        .unwrap_or_else(|_| format!("{}/{}", opts.mysql.addr, opts.mysql.database));
    format!(
        "{path} is valid\n  http:  {}\n  log:   {} ({}){}\n  mysql: {mysql}\n  redis: {} db {}",
        opts.http.addr,
        opts.log.level,
        opts.log.format,
        if opts.log.enable_file {
            format!(", files in {}", opts.log.log_dir)
        } else {
            String::new()
        },
        opts.redis.addr,
        opts.redis.database,
    )
}
