use std::{env, sync::Arc};

use colored::{Color, Colorize};
use cuevote_collab::{Collab, Database, MemoryDatabase, SqliteDatabase, YouTubeProvider};
use cuevote_core::Config;
use log::{error, info, warn};
use thiserror::Error;

mod logging;

const DEFAULT_DATABASE_URL: &str = "sqlite:cuevote.db";

#[derive(Debug, Error)]
enum CueVoteError {
    #[error("Could not initialize database: {0}")]
    Database(#[from] cuevote_collab::DatabaseError),

    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("Server stopped: {0}")]
    Server(#[from] std::io::Error),
}

impl CueVoteError {
    fn hint(&self) -> String {
        match self {
            CueVoteError::Database(_) => "This is a database error. Make sure DATABASE_URL points to a writable SQLite file, or set it to \"memory\" to run without persistence.".to_string(),
            CueVoteError::MissingEnv(name) => format!("Set {} in the environment and try again.", name),
            CueVoteError::Server(_) => "Make sure CUEVOTE_SERVER_PORT is a valid port that is not already in use.".to_string(),
        }
    }
}

async fn connect_database() -> Result<Arc<dyn Database>, CueVoteError> {
    let url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    if url == "memory" {
        warn!("Using the in-memory database, nothing will be persisted");
        return Ok(Arc::new(MemoryDatabase::default()));
    }

    info!("Connecting to database...");
    Ok(Arc::new(SqliteDatabase::connect(&url).await?))
}

async fn run() -> Result<(), CueVoteError> {
    let config = Config::from_env();
    let api_key = env::var("YOUTUBE_API_KEY").map_err(|_| CueVoteError::MissingEnv("YOUTUBE_API_KEY"))?;

    let database = connect_database().await?;
    let provider = Arc::new(YouTubeProvider::new(api_key));

    let collab = Arc::new(Collab::from_parts(config, database, provider));
    collab.spawn_maintenance();

    info!("Initialized successfully.");
    cuevote_server::run_server(collab).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init_logger() {
        eprintln!("Could not initialize logging: {}", e);
    }

    if let Err(error) = run().await {
        error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "CueVote failed to start!".bold().color(Color::Red));
        error!("{}", error);
        error!(
            "{}",
            format!("Hint: {}", error.hint())
                .color(Color::BrightBlack)
                .italic()
        );
    }
}
