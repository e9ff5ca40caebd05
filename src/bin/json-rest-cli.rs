use std::io::Read;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use json_rest::auth::password_digest;
use json_rest::client::{ClientError, JsonRestClient};
use json_rest::config::{ClientConfig, TransportType};

#[derive(Parser)]
#[command(name = "json-rest-cli")]
#[command(about = "Post JSON to a JSON REST service and manage user digests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Post a JSON body to a route and print the reply
    Post(PostArgs),
    /// Print the directory digest for a user
    Digest {
        #[arg(long)]
        realm: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        secret: String,
    },
}

#[derive(Args)]
struct PostArgs {
    /// Route path, e.g. /cs/test/1/
    route: String,

    /// JSON body; read from stdin when omitted
    body: Option<String>,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value_t = 80)]
    port: u16,

    #[arg(long)]
    https: bool,

    /// Extra PEM root certificate for https
    #[arg(long)]
    ca: Option<String>,

    /// Basic auth as name:secret
    #[arg(short, long)]
    auth: Option<String>,

    /// Request compression: gzip or deflate
    #[arg(short, long)]
    compression: Option<String>,

    /// Timeout in milliseconds, 0 for none
    #[arg(short, long, default_value_t = 0)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Digest { realm, name, secret } => {
            println!("{} = \"{}\"", name, password_digest(&realm, &name, &secret));
            ExitCode::SUCCESS
        }
        Commands::Post(args) => match post(args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn post(args: PostArgs) -> Result<(), Box<dyn std::error::Error>> {
    let text = match args.body {
        Some(text) => text,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    let body: Value = serde_json::from_str(&text)?;

    let config = ClientConfig {
        client_type: if args.https { TransportType::Https } else { TransportType::Http },
        host: args.host,
        port: args.port,
        auth: args.auth,
        compression: args.compression,
        timeout_ms: args.timeout_ms,
        ca_path: args.ca,
        ..Default::default()
    };
    let client = JsonRestClient::new(config)?;

    match client.post(&args.route, &body).await {
        Ok(reply) => {
            println!("{}", serde_json::to_string_pretty(&reply)?);
            Ok(())
        }
        Err(ClientError::Status { status, message, body }) => {
            if let Some(body) = body {
                eprintln!("Response: {}", body);
            }
            Err(format!("server returned status {}: {}", status, message).into())
        }
        Err(e) => Err(e.into()),
    }
}
