use crate::demo::{run_board, run_demo, run_export, run_move, BoardArgs, DemoArgs, ExportArgs, MoveArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use placement_pipeline::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Placement Pipeline",
    about = "Inspect and move applications through the placement recruitment pipeline",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the in-memory collaborator API (default command)
    Serve(ServeArgs),
    /// Print the stage board for one job
    Board(BoardArgs),
    /// Move one application to another stage
    Move(MoveArgs),
    /// Export selected candidates for one job as CSV
    Export(ExportArgs),
    /// Run a scripted drag-and-drop session against a local collaborator
    Demo(DemoArgs),
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

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Board(args) => run_board(args).await,
        Command::Move(args) => run_move(args).await,
        Command::Export(args) => run_export(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
