use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use robot_graphql::{Document, GraphqlClient, RobotApi, Settings};

#[derive(Parser)]
#[command(author, version, about = "Run GraphQL queries against the robot fleet API", long_about = None)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    ROBOT_API_URL             GraphQL endpoint (required)
    ROBOT_API_TOKEN           Pre-issued bearer token
    ROBOT_AUTH_URL            OAuth2 token endpoint (when no static token)
    ROBOT_AUTH_CLIENT_ID      OAuth2 client ID
    ROBOT_AUTH_CLIENT_SECRET  OAuth2 client secret
    ROBOT_AUTH_SCOPE          Optional scope
    ROBOT_AUTH_AUDIENCE       Optional audience
    ROBOT_API_TIMEOUT_SECS    Optional request timeout
    RUST_LOG                  Log filter, e.g. robot_graphql=debug")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a query document read from a file and print the data payload
    Run {
        /// File containing the GraphQL document
        file: PathBuf,
        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,
        /// Operation to run when the document defines several
        #[arg(long)]
        operation: Option<String>,
    },
    /// Print the ID of the latest mission report of a robot
    LatestReport {
        #[arg(long)]
        robot_id: String,
    },
    /// Print the inspection image URI for a point of interest in a mission report
    InspectionUri {
        #[arg(long)]
        report_id: String,
        #[arg(long)]
        poi: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = Settings::from_env().context("loading robot API settings")?;

    match args.command {
        Command::Run { file, variables, operation } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading query document {}", file.display()))?;
            let document = match operation {
                Some(name) => Document::parse_operation(text, &name)?,
                None => Document::parse(text)?,
            };
            let variables = match variables {
                Some(raw) => match serde_json::from_str(&raw).context("parsing --variables")? {
                    Value::Object(map) => map,
                    other => bail!("--variables must be a JSON object, got {other}"),
                },
                None => serde_json::Map::new(),
            };

            let mut client = GraphqlClient::connect(&settings).await?;
            let outcome = client.execute(&document, &variables).await?;
            println!("{}", serde_json::to_string_pretty(&outcome.data)?);
        }
        Command::LatestReport { robot_id } => {
            let mut api = RobotApi::connect(&settings).await?;
            println!("{}", api.latest_mission_report_id(&robot_id).await?);
        }
        Command::InspectionUri { report_id, poi } => {
            let mut api = RobotApi::connect(&settings).await?;
            println!("{}", api.inspection_uri_for_poi(&report_id, &poi).await?);
        }
    }

    Ok(())
}
