//! skypost - Post to Bluesky and read notifications from the command line

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use libskypost::bluesky::xrpc::XrpcClient;
use libskypost::bluesky::{authenticate, ReplyRef};
use libskypost::composer::{self, PostDraft, DEFAULT_ALT_TEXT, EMPTY_POST_MESSAGE};
use libskypost::config::Config;
use libskypost::credentials::CredentialManager;
use libskypost::logging::{LogFormat, LoggingConfig};
use libskypost::notifications;
use tracing::{debug, error, warn};

#[derive(Parser, Debug)]
#[command(name = "skypost", version)]
#[command(about = "Post to Bluesky and read your notifications", long_about = None)]
struct Cli {
    /// Text content of the post
    #[arg(long)]
    text: Option<String>,

    /// Path to an image to attach
    #[arg(long)]
    image: Option<PathBuf>,

    /// Alt text for the attached image
    #[arg(long, default_value = DEFAULT_ALT_TEXT)]
    alt: String,

    /// Remove stored credentials from the keychain
    #[arg(long)]
    clear_credentials: bool,

    /// List recent notifications
    #[arg(long)]
    get_notifications: bool,

    /// List replies you have not answered yet
    #[arg(long)]
    get_responses: bool,

    /// List your recent posts with their replies
    #[arg(long)]
    list_posts: bool,

    /// Bluesky handle to log in as (default: from config)
    #[arg(long)]
    username: Option<String>,

    /// URI of the post to reply to
    #[arg(long, requires = "reply_cid")]
    reply_uri: Option<String>,

    /// CID of the post to reply to
    #[arg(long, requires = "reply_uri")]
    reply_cid: Option<String>,

    /// Path to config file (default: $SKYPOST_CONFIG or ~/.config/skypost/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format (text, json, pretty)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn wants_post(&self) -> bool {
        self.text.is_some() || self.image.is_some()
    }

    fn reply_to(&self) -> Option<ReplyRef> {
        match (&self.reply_uri, &self.reply_cid) {
            (Some(uri), Some(cid)) => Some(ReplyRef {
                uri: uri.clone(),
                cid: cid.clone(),
            }),
            _ => None,
        }
    }

    fn draft(&self) -> PostDraft {
        let mut draft = PostDraft::new(self.text.clone().unwrap_or_default());
        if let Some(image) = &self.image {
            draft = draft.with_image(image, self.alt.clone());
        }
        if let Some(reply_to) = self.reply_to() {
            draft = draft.in_reply_to(reply_to);
        }
        draft
    }
}

/// Load the configuration, falling back to defaults when only clearing
/// credentials so a broken config file can't block that
fn load_config(path: Option<&Path>, clearing_credentials: bool) -> Result<Config> {
    match Config::load_from(path) {
        Ok(config) => Ok(config),
        Err(e) if clearing_credentials => {
            warn!("Ignoring configuration error while clearing credentials: {}", e);
            Ok(Config::default())
        }
        Err(e) => Err(e).context("Failed to load configuration"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if std::env::args_os().len() == 1 {
        // Nothing to do without flags
        if let Err(e) = Cli::command().print_help() {
            eprintln!("{}", e);
        }
        println!();
        return;
    }

    let cli = Cli::parse();

    if cli.reply_to().is_some() && !cli.wants_post() {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "--reply-uri and --reply-cid need --text or --image",
            )
            .exit();
    }

    let mut logging = LoggingConfig::from_env();
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.verbose = cli.verbose;
    let _logging_guard = logging.init();

    if let Err(e) = run(cli).await {
        error!("Error in command execution: {:?}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let draft = cli.draft();
    let posting = cli.wants_post()
        && !cli.clear_credentials
        && !cli.get_notifications
        && !cli.get_responses
        && !cli.list_posts;
    if posting && draft.is_empty() {
        bail!(EMPTY_POST_MESSAGE);
    }

    let config = load_config(cli.config.as_deref(), cli.clear_credentials)?;
    let service = config.credentials.service_name.as_str();
    let credentials = CredentialManager::system();

    // Clearing needs no session
    if cli.clear_credentials {
        let outcome = credentials
            .clear_credentials(service)
            .context("Error clearing credentials")?;
        println!("{}", outcome);
        return Ok(());
    }

    let username = cli
        .username
        .clone()
        .unwrap_or_else(|| config.bluesky.username.clone());
    let password = credentials.get_credential(service, &username)?;

    let mut client = XrpcClient::new(&config.bluesky)?;
    if let Err(e) = authenticate(&mut client, &username, &password).await {
        println!("Authentication error: {}", e);
        std::process::exit(1);
    }
    drop(password);

    if cli.get_notifications {
        let records =
            notifications::list_notifications(&client, config.notifications.limit).await?;
        for record in &records {
            println!("Notification from {}: {}", record.author, record.reason);
        }
        if records.is_empty() {
            println!("No notifications found.");
        } else {
            println!("\nYou have {} notifications.", records.len());
        }
    } else if cli.get_responses {
        let unanswered = notifications::list_unanswered(&client, config.notifications.limit).await?;
        if unanswered.is_empty() {
            println!("No unanswered responses found.");
        } else {
            println!("\nYou have {} unanswered responses:", unanswered.len());
            for (i, reply) in unanswered.iter().enumerate() {
                println!("{}. From: {}", i + 1, reply.author);
                println!("   Text: {}", reply.text.as_deref().unwrap_or_default());
                println!();
            }
        }
    } else if cli.list_posts {
        let posts = notifications::list_posts_and_responses(&client).await?;
        for post in &posts {
            println!("Post: {}", post.text.as_deref().unwrap_or_default());
            for reply in &post.replies {
                println!(
                    "  Reply from {}: {}",
                    reply.author,
                    reply.text.as_deref().unwrap_or_default()
                );
            }
        }
    } else if posting {
        if !composer::post(&client, &draft, &config.image).await {
            debug!("Post was not published");
        }
    }

    Ok(())
}
