use clap::{Parser, Subcommand};
use log::{error, info};
use simulator::{PackModel, Scenario, replay};
use std::time::Duration;
use telemetry_protocol::{Framing, RecordWriter, TelemetryRecord};
use tokio::net::TcpStream;

/// Battery telemetry producer
#[derive(Parser, Debug)]
#[command(version, about = "Battery telemetry simulator", long_about = None)]
struct Args {
    /// Forwarder host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Forwarder port
    #[arg(short, long, default_value_t = 23456)]
    port: u16,

    /// Wire framing expected by the forwarder (raw or synced)
    #[arg(short, long, default_value_t = Framing::Raw)]
    framing: Framing,

    /// Delay between readings in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    interval_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scripted scenario
    Scenario {
        /// normal, charging, discharging, overheating or voltage-anomaly
        scenario: Scenario,
        /// Scenario length in seconds
        #[arg(short, long, default_value_t = 30.0)]
        duration: f32,
    },

    /// Constant-power discharge of the pack model
    Discharge {
        /// Load in watts
        #[arg(short = 'w', long, default_value_t = 5000.0)]
        power_watts: f32,
        /// Simulated time in seconds
        #[arg(short, long, default_value_t = 3600.0)]
        duration: f32,
    },

    /// Replay a TIME=;VOLT=;CURR=;TEMP= log file
    Replay {
        /// Path to the log file
        file: String,
    },
}

type Records = Box<dyn Iterator<Item = TelemetryRecord> + Send>;

fn build_records(command: &Commands, interval: f32) -> Result<Records, String> {
    match command {
        Commands::Scenario { scenario, duration } => {
            info!("Running {} scenario for {:.0} seconds", scenario, duration);
            Ok(Box::new(scenario.records(*duration, interval)))
        }
        Commands::Discharge {
            power_watts,
            duration,
        } => {
            info!(
                "Discharging at {:.0} W for {:.0} simulated seconds",
                power_watts, duration
            );
            if interval <= 0.0 {
                return Err("discharge needs a positive interval".to_string());
            }
            Ok(Box::new(PackModel::default().constant_power_run(
                *power_watts,
                *duration,
                interval,
            )))
        }
        Commands::Replay { file } => {
            let records = replay::load(file).map_err(|e| e.to_string())?;
            info!("Replaying {} readings from {}", records.len(), file);
            Ok(Box::new(records.into_iter()))
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();

    let interval = Duration::from_millis(args.interval_ms);
    let records = build_records(&args.command, interval.as_secs_f32()).unwrap_or_else(|err| {
        error!("{}", err);
        std::process::exit(1);
    });

    info!("Connecting to {}:{}...", args.host, args.port);
    let stream = TcpStream::connect((args.host.as_str(), args.port))
        .await
        .unwrap_or_else(|err| {
            error!("Connection failed: {}", err);
            std::process::exit(1);
        });
    info!("Connected, sending {} framing", args.framing);

    let mut writer = RecordWriter::new(stream, args.framing);
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));

    let mut sent = 0u64;
    for record in records {
        ticker.tick().await;

        if let Err(err) = writer.write_record(&record).await {
            error!("Failed to send reading: {}", err);
            std::process::exit(1);
        }
        info!(
            "Sent: T={:.2}s, V={:.2}V, I={:.2}A, Temp={:.2}°C",
            record.timestamp, record.pack_voltage, record.pack_current, record.cell_temperature
        );
        sent += 1;
    }

    if let Err(err) = writer.shutdown().await {
        error!("Failed to close connection: {}", err);
    }
    info!("Sent {} readings", sent);
}
