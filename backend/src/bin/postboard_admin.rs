//! Maintenance commands for a postboard database.
//!
//! Counter repair reconciles cached follow and rating counters with the rows
//! they summarise. `gen-message-key` prints a fresh hex key for
//! `POSTBOARD_MESSAGE_KEY_FILE` and `check-storage` confirms the blob
//! directory and that key are usable.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ortho_config::OrthoConfig;
use postboard::PostboardSettings;
use postboard::domain::{EngagementService, PostId, RelationshipService, UserId};
use postboard::outbound::blob::CapStdBlobStore;
use postboard::outbound::crypto::{AesGcmMessageCipher, generate_key_hex};
use postboard::outbound::persistence::{
    DbPool, DieselEngagementRepository, DieselFollowRepository, PoolConfig,
};
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// `postboard-admin` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "postboard-admin",
    about = "Repair cached counters and manage postboard secrets",
    version
)]
struct CliArgs {
    /// Database connection URL. Falls back to `POSTBOARD_DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url", global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Recompute a post's like, dislike and comment counters.
    RecountPost {
        /// Post identifier.
        #[arg(value_parser = parse_post_id)]
        post_id: PostId,
    },
    /// Recompute a user's follower and following counters.
    RecountFollows {
        /// User identifier.
        #[arg(value_parser = parse_user_id)]
        user_id: UserId,
    },
    /// Print a new random message encryption key as hex.
    GenMessageKey,
    /// Open the blob directory and load the message key.
    CheckStorage,
}

fn parse_post_id(raw: &str) -> Result<PostId, String> {
    let value: i64 = raw.parse().map_err(|error| format!("{error}"))?;
    PostId::new(value).map_err(|error| error.to_string())
}

fn parse_user_id(raw: &str) -> Result<UserId, String> {
    let value: i64 = raw.parse().map_err(|error| format!("{error}"))?;
    UserId::new(value).map_err(|error| error.to_string())
}

fn main() -> io::Result<()> {
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %error, "tracing init failed");
    }

    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    match args.command {
        Command::GenMessageKey => {
            println!("{}", generate_key_hex().as_str());
            return Ok(());
        }
        Command::CheckStorage => return check_storage(&load_settings(args.database_url)?),
        Command::RecountPost { .. } | Command::RecountFollows { .. } => {}
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main(args))
}

fn load_settings(database_url: Option<String>) -> io::Result<PostboardSettings> {
    let mut settings = PostboardSettings::load_from_iter([OsString::from("postboard-admin")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;
    if let Some(url) = database_url {
        settings.database_url = Some(url);
    }
    Ok(settings)
}

fn check_storage(settings: &PostboardSettings) -> io::Result<()> {
    let root = settings.blob_root();
    CapStdBlobStore::open(root).map_err(|error| {
        io::Error::other(format!("open blob root {}: {error}", root.display()))
    })?;
    info!(blob_root = %root.display(), "blob root ready");

    let key_file = settings
        .message_key_file
        .as_deref()
        .ok_or_else(|| io::Error::other("POSTBOARD_MESSAGE_KEY_FILE is not set"))?;
    AesGcmMessageCipher::from_key_file(key_file)
        .map_err(|error| io::Error::other(format!("load message key: {error}")))?;
    info!(key_file = %key_file.display(), "message key loaded");
    Ok(())
}

async fn async_main(args: CliArgs) -> io::Result<()> {
    let settings = load_settings(args.database_url)?;
    let pool = DbPool::new(PoolConfig::from(&settings))
        .await
        .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;

    match args.command {
        Command::RecountPost { post_id } => {
            let service = EngagementService::new(Arc::new(DieselEngagementRepository::new(pool)));
            let recount = service
                .recount_post(post_id)
                .await
                .map_err(|error| io::Error::other(format!("recount post: {error}")))?;
            info!(post_id = %post_id, drifted = recount.drifted(), "post recount finished");
            print_json(&recount)
        }
        Command::RecountFollows { user_id } => {
            let service = RelationshipService::new(Arc::new(DieselFollowRepository::new(pool)));
            let recount = service
                .recount_follows(user_id)
                .await
                .map_err(|error| io::Error::other(format!("recount follows: {error}")))?;
            info!(user_id = %user_id, "follow recount finished");
            print_json(&recount)
        }
        Command::GenMessageKey | Command::CheckStorage => Ok(()),
    }
}

fn print_json(value: &impl serde::Serialize) -> io::Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|error| io::Error::other(format!("render output: {error}")))?;
    println!("{rendered}");
    Ok(())
}
