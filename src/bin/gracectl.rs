use clap::{Parser, Subcommand};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde_json::Value;

use graceful_reboot::lifecycle::signals::parse_reboot_signal;
use graceful_reboot::observability::logging;

#[derive(Parser)]
#[command(name = "gracectl")]
#[command(about = "Operator CLI for graceful-reboot services", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pid, parent, instance id and in-flight requests
    Status {
        #[arg(short, long, default_value = "http://127.0.0.1:8080")]
        url: String,
    },
    /// Start a successor on the same socket, then drain this instance
    Reboot {
        #[arg(short, long)]
        pid: i32,
        #[arg(short, long, default_value = "SIGUSR2")]
        signal: String,
    },
    /// Drain and stop the instance
    Shutdown {
        #[arg(short, long)]
        pid: i32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init("warn");

    match cli.command {
        Commands::Status { url } => {
            let res = reqwest::Client::new()
                .get(format!("{}/status", url.trim_end_matches('/')))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Reboot { pid, signal } => {
            let signal = parse_signal(&signal)?;
            send(pid, signal)?;
        }
        Commands::Shutdown { pid } => send(pid, Signal::SIGTERM)?,
    }

    Ok(())
}

/// Same rules the service applies to `lifecycle.reboot_signal`.
fn parse_signal(name: &str) -> Result<Signal, String> {
    parse_reboot_signal(name)
        .ok_or_else(|| format!("{name:?} is not a reboot signal (use SIGHUP, SIGUSR1 or SIGUSR2)"))
}

fn send(pid: i32, signal: Signal) -> Result<(), nix::Error> {
    tracing::debug!(pid, signal = signal.as_str(), "Sending signal");
    kill(Pid::from_raw(pid), signal)?;
    println!("sent {} to {}", signal.as_str(), pid);
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: status endpoint returned {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_names() {
        assert_eq!(parse_signal("SIGUSR2").unwrap(), Signal::SIGUSR2);
        assert_eq!(parse_signal("usr1").unwrap(), Signal::SIGUSR1);
        assert_eq!(parse_signal("hup").unwrap(), Signal::SIGHUP);
        assert!(parse_signal("bogus").is_err());
    }

    #[test]
    fn reboot_rejects_terminating_signals() {
        for name in ["KILL", "SIGKILL", "term", "SIGINT"] {
            assert!(parse_signal(name).is_err(), "{name} accepted");
        }
    }
}
