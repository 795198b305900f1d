use clap::{Parser, Subcommand};
use fleet_sdk::FleetClient;

#[derive(Parser)]
#[command(name = "fleet-cli")]
#[command(about = "Control-plane CLI for a worker fleet", long_about = None)]
struct Cli {
    /// Base URL of the master (or of a single worker for health/offline).
    #[arg(short, long, default_value = "http://127.0.0.1:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show membership and ring shape
    State {
        /// Also report how many of N sample keys each worker owns
        #[arg(long)]
        sample: Option<usize>,
    },
    /// Check whether the node is healthy
    Health,
    /// Drain the node (on the master: the whole fleet)
    Offline,
    /// Register a worker by hand
    Register { host: String, port: u16 },
    /// Remove a worker from the ring without stopping it
    Deregister { host: String, port: u16 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = FleetClient::new(&cli.url);

    match cli.command {
        Commands::State { sample } => {
            let state = client.state(sample).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Commands::Health => {
            if client.health().await? {
                println!("healthy");
            } else {
                eprintln!("Error: {} is not healthy", client.base_url());
                std::process::exit(1);
            }
        }
        Commands::Offline => {
            client.offline().await?;
            println!("drain started");
        }
        Commands::Register { host, port } => {
            client.register(&host, port).await?;
            println!("registered {}:{}", host, port);
        }
        Commands::Deregister { host, port } => {
            client.deregister(&host, port).await?;
            println!("deregistered {}:{}", host, port);
        }
    }

    Ok(())
}
