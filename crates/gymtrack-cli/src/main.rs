//! gymtrack - command-line client for the gymtrack fitness tracker.
//!
//! Signs in against the gymtrack API, keeps the session between runs and
//! browses the exercise catalog with the stored credentials.

mod app;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use gymtrack_core::Config;

const USAGE: &str = "\
Usage: gymtrack <command>

Commands:
  sign-in [email]                  Sign in and remember the session
  sign-up                          Create an account
  sign-out                         Forget the stored session
  whoami                           Show the signed-in user
  profile [--name N] [--avatar A]  Update the signed-in user's profile
  groups                           List muscle groups
  exercises <group>                List exercises for a group
  exercise <id>                    Show one exercise";

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the file writer and must outlive `main`'s work.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr = fmt::layer().with_writer(io::stderr);

    match config.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, "gymtrack.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    let _log_guard = init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };
    if matches!(command, "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    info!(command, "gymtrack starting");
    let mut app = App::start(config).await?;

    match (command, &args[1..]) {
        ("sign-in", rest) => app.sign_in(rest.first().cloned()).await,
        ("sign-up", _) => app.sign_up().await,
        ("sign-out", _) => app.sign_out().await,
        ("whoami", _) => app.whoami().await,
        ("profile", rest) => {
            let (name, avatar) = parse_profile_flags(rest)?;
            app.update_profile(name, avatar).await
        }
        ("groups", _) => app.list_groups().await,
        ("exercises", [group, ..]) => app.list_exercises(group).await,
        ("exercise", [id, ..]) => app.show_exercise(id).await,
        _ => {
            eprintln!("{}", USAGE);
            Err(anyhow::anyhow!("Unknown or incomplete command: {}", args.join(" ")))
        }
    }
}

fn parse_profile_flags(args: &[String]) -> Result<(Option<String>, Option<String>)> {
    let mut name = None;
    let mut avatar = None;
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .ok_or_else(|| anyhow::anyhow!("Missing value for {}", flag))?;
        match flag.as_str() {
            "--name" => name = Some(value.clone()),
            "--avatar" => avatar = Some(value.clone()),
            other => return Err(anyhow::anyhow!("Unknown profile option: {}", other)),
        }
    }
    Ok((name, avatar))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_profile_flags() {
        let (name, avatar) = parse_profile_flags(&args(&["--name", "Ana", "--avatar", "a.png"])).unwrap();
        assert_eq!(name.as_deref(), Some("Ana"));
        assert_eq!(avatar.as_deref(), Some("a.png"));

        let (name, avatar) = parse_profile_flags(&[]).unwrap();
        assert!(name.is_none() && avatar.is_none());
    }

    #[test]
    fn test_parse_profile_flags_errors() {
        assert!(parse_profile_flags(&args(&["--name"])).is_err());
        assert!(parse_profile_flags(&args(&["--age", "30"])).is_err());
    }
}
