use std::error::Error;
use std::time::Duration;

use clap::Parser;
use log::{error, info, LevelFilter, Metadata, Record};
use sourcon::{config::DEFAULT_PORT, Client, ConnectOptions};

struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{} - {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

#[derive(Parser)]
#[command(name = "sourcon")]
#[command(about = "Send rcon commands to a Source (or compatible) game server")]
#[command(version)]
struct Cli {
    /// Server host name or address
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server rcon port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Rcon password
    #[arg(short = 'P', long, env = "RCON_PASSWORD", hide_env_values = true)]
    password: String,

    /// Accept any reply to the auth packet (Project Zomboid and friends)
    #[arg(long)]
    ignore_invalid_auth: bool,

    /// Glue responses split over several packets back together (srcds only)
    #[arg(long)]
    multi_packet: bool,

    /// Seconds to wait for the connection and for each response
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,

    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Commands to run, in order
    #[arg(required = true)]
    commands: Vec<String>,
}

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let _ = log::set_logger(&SimpleLogger).map(|()| log::set_max_level(level_for(cli.verbose)));

    let timeout = Some(Duration::from_secs(cli.timeout));
    let options = ConnectOptions::new()
        .with_ignore_invalid_auth_response(cli.ignore_invalid_auth)
        .with_multi_packet_responses(cli.multi_packet)
        .with_connect_timeout(timeout)
        .with_request_timeout(timeout);

    let mut client = Client::connect(&cli.host, cli.port, &cli.password, options)
        .await
        .inspect_err(|err| error!("cannot connect to {}:{}: {}", cli.host, cli.port, err))?;
    info!("connected to {}:{}", cli.host, cli.port);

    for command in &cli.commands {
        info!("> {}", command);
        match client.command(command).await {
            Ok(response) => println!("{}", response.body()),
            Err(err) => {
                error!("{}: {}", command, err);
                client.disconnect().await;
                return Err(err.into());
            }
        }
    }

    client.disconnect().await;
    info!("bye");
    Ok(())
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
    fn test_parse_commands() {
        let cli = Cli::parse_from([
            "sourcon",
            "--password",
            "pw",
            "-p",
            "25575",
            "-vv",
            "status",
            "say hi",
        ]);
        assert_eq!(cli.port, 25575);
        assert_eq!(cli.commands, vec!["status", "say hi"]);
        assert_eq!(level_for(cli.verbose), LevelFilter::Debug);
        assert!(!cli.ignore_invalid_auth);
    }
}
