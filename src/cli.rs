use crate::server;
use clap::{Args, Parser, Subcommand};
use facility_desk::error::AppError;
use facility_desk::workflows::reports::{find_matches, LostFoundDetail, MatchMode};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Facility Desk",
    about = "Run the facility report service or inspect lost-and-found data from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print candidate lost/found pairs for an exported item list
    Matches(MatchesArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct MatchesArgs {
    /// JSON array of lost-and-found items
    #[arg(long)]
    pub(crate) items: PathBuf,
    /// Let either side's text contain the other's
    #[arg(long)]
    pub(crate) symmetric: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Matches(args) => run_matches(args),
    }
}

fn run_matches(args: MatchesArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.items)?;
    let items: Vec<LostFoundDetail> = serde_json::from_str(&raw)?;
    let mode = if args.symmetric {
        MatchMode::Symmetric
    } else {
        MatchMode::Directional
    };

    let matches = find_matches(&items, mode);
    println!(
        "{} candidate pair(s) across {} item(s)",
        matches.len(),
        items.len()
    );
    for candidate in &matches {
        let reasons = candidate
            .reasons
            .iter()
            .map(|reason| reason.label())
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "- lost #{} '{}' <-> found #{} '{}' ({})",
            candidate.lost.id,
            candidate.lost.item_name,
            candidate.found.id,
            candidate.found.item_name,
            reasons
        );
    }

    Ok(())
}
