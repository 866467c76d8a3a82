use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dispatcher")]
#[command(about = "Multi-vendor asynchronous job dispatch service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API (job intake, status reads, webhook intake) and the timeout sweeper
    Serve(ServeArgs),

    /// Run the job dispatch worker loop
    Worker(WorkerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the API server to
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub address: SocketAddr,

    /// Directory holding the job store and job queue on-disk state
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct WorkerArgs {
    /// Directory holding the job store and job queue on-disk state
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,
}
