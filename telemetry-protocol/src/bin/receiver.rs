use clap::Parser;
use log::{error, info, warn};
use telemetry_protocol::{Framing, ReadOutcome, RecordReader};
use tokio::net::TcpListener;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:12345";

/// Prints the records sent over a single producer connection.
#[derive(Parser, Debug)]
#[command(version, about = "Telemetry receiver", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = DEFAULT_BIND_ADDR)]
    bind: String,

    /// Wire framing used by the producer (raw or synced)
    #[arg(short, long, default_value_t = Framing::Raw)]
    framing: Framing,
}

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();

    let listener = TcpListener::bind(&args.bind).await.unwrap_or_else(|err| {
        error!("Failed to bind {}: {}", args.bind, err);
        std::process::exit(1);
    });
    info!("Listening on {} ({} framing)...", args.bind, args.framing);

    let (stream, peer) = listener.accept().await.unwrap_or_else(|err| {
        error!("Failed to accept connection: {}", err);
        std::process::exit(1);
    });
    info!("Connected by {}", peer);

    let mut reader = RecordReader::new(stream, args.framing);

    loop {
        match reader.next_record().await {
            Ok(ReadOutcome::Record(record)) => println!(
                "Time: {:.1}s, Voltage: {:.2}V, Current: {:.2}A, Temp: {:.2}C",
                record.timestamp, record.pack_voltage, record.pack_current, record.cell_temperature
            ),
            Ok(ReadOutcome::Closed) => {
                info!("Connection closed by {}", peer);
                break;
            }
            Ok(ReadOutcome::Truncated(n)) => {
                error!("Connection closed with {} bytes of an unfinished record", n);
                break;
            }
            Err(err) => {
                error!("Error receiving data: {}", err);
                break;
            }
        }
    }

    if reader.discarded() > 0 {
        warn!("Discarded {} unframed bytes", reader.discarded());
    }
}
