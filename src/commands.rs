//! Command handlers.
//!
//! Every handler receives a [`Context`] that owns the database handle, HTTP
//! client, configuration and login session. Handlers write user-facing output
//! to the supplied writer and return errors to the caller; only `main` decides
//! how an error is reported and which exit code results.

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use std::io::Write;
use std::path::PathBuf;

use crate::config::Config;
use crate::feed::{fetch_feed, ParsedFeed};
use crate::session::Session;
use crate::storage::{Database, User};
use crate::util::validate_feed_url;

/// Feed fetched by `agg` when no URL is given.
pub const DEFAULT_AGG_URL: &str = "https://www.wagslane.dev/index.xml";

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a user and log in as them
    Register { name: String },
    /// Switch the current user
    Login { name: String },
    /// List all users
    Users,
    /// Delete every user, feed and subscription
    Reset,
    /// Fetch a feed once and print its items
    Agg {
        #[arg(default_value = DEFAULT_AGG_URL)]
        url: String,
    },
    /// Register a feed for the current user and follow it
    Addfeed { name: String, url: String },
    /// List all registered feeds and their owners
    Feeds,
    /// Follow an already registered feed
    Follow { url: String },
    /// List feeds the current user follows
    Following,
    /// Stop following a feed
    Unfollow { url: String },
}

/// Everything a command needs, passed explicitly instead of read from globals.
pub struct Context {
    pub db: Database,
    pub client: reqwest::Client,
    pub config: Config,
    pub session: Session,
    pub session_path: PathBuf,
}

impl Context {
    /// Resolve the logged-in user against the database.
    async fn current_user(&self) -> Result<User> {
        let Some(name) = self.session.current_user() else {
            bail!("No user is logged in. Run `gator register <name>` or `gator login <name>` first");
        };
        match self.db.get_user(name).await? {
            Some(user) => Ok(user),
            None => bail!("Current user \"{}\" no longer exists. Log in again", name),
        }
    }

    fn login_as(&mut self, name: &str) -> Result<()> {
        self.session.set_user(name);
        self.session
            .save(&self.session_path)
            .context("Failed to save session")
    }
}

/// Dispatch one command.
pub async fn run(ctx: &mut Context, command: Command, out: &mut impl Write) -> Result<()> {
    tracing::debug!(command = ?command, "Running command");
    match command {
        Command::Register { name } => register(ctx, &name, out).await,
        Command::Login { name } => login(ctx, &name, out).await,
        Command::Users => users(ctx, out).await,
        Command::Reset => reset(ctx, out).await,
        Command::Agg { url } => agg(ctx, &url, out).await,
        Command::Addfeed { name, url } => add_feed(ctx, &name, &url, out).await,
        Command::Feeds => feeds(ctx, out).await,
        Command::Follow { url } => follow(ctx, &url, out).await,
        Command::Following => following(ctx, out).await,
        Command::Unfollow { url } => unfollow(ctx, &url, out).await,
    }
}

async fn register(ctx: &mut Context, name: &str, out: &mut impl Write) -> Result<()> {
    let user = ctx
        .db
        .create_user(name)
        .await
        .context("Failed to register user")?;
    ctx.login_as(&user.name)?;

    writeln!(out, "User created: {} ({})", user.name, user.id)?;
    writeln!(out, "Logged in as '{}'", user.name)?;
    Ok(())
}

async fn login(ctx: &mut Context, name: &str, out: &mut impl Write) -> Result<()> {
    if ctx.db.get_user(name).await?.is_none() {
        bail!("User \"{}\" does not exist", name);
    }
    ctx.login_as(name)?;

    writeln!(out, "Logged in as '{}'", name)?;
    Ok(())
}

async fn users(ctx: &mut Context, out: &mut impl Write) -> Result<()> {
    let names = ctx.db.list_user_names().await?;
    if names.is_empty() {
        writeln!(out, "No users found")?;
        return Ok(());
    }

    let current = ctx.session.current_user();
    for name in &names {
        if Some(name.as_str()) == current {
            writeln!(out, "* {} (current)", name)?;
        } else {
            writeln!(out, "* {}", name)?;
        }
    }
    Ok(())
}

async fn reset(ctx: &mut Context, out: &mut impl Write) -> Result<()> {
    let removed = ctx
        .db
        .delete_all_users()
        .await
        .context("Failed to delete users")?;

    // The logged-in user no longer exists
    ctx.session.clear();
    ctx.session
        .save(&ctx.session_path)
        .context("Failed to save session")?;

    writeln!(out, "All users deleted ({} removed)", removed)?;
    Ok(())
}

async fn agg(ctx: &mut Context, url: &str, out: &mut impl Write) -> Result<()> {
    let feed = fetch_feed(&ctx.client, url, ctx.config.fetch_timeout())
        .await
        .with_context(|| format!("Failed to fetch feed {}", url))?;
    print_feed(&feed, out)?;
    Ok(())
}

fn print_feed(feed: &ParsedFeed, out: &mut impl Write) -> Result<()> {
    let channel = &feed.channel;
    writeln!(out, "{}", channel.title)?;
    writeln!(out, "  {}", channel.link)?;
    writeln!(out, "  {}", channel.description)?;
    writeln!(out)?;

    if channel.items.is_empty() {
        writeln!(out, "No items")?;
        return Ok(());
    }

    for item in &channel.items {
        writeln!(out, "* {}", item.title)?;
        writeln!(out, "  {}", item.pub_date)?;
        writeln!(out, "  {}", item.link)?;
    }
    Ok(())
}

async fn add_feed(ctx: &mut Context, name: &str, url: &str, out: &mut impl Write) -> Result<()> {
    let user = ctx.current_user().await?;
    validate_feed_url(url).with_context(|| format!("Refusing to register {}", url))?;

    let (feed, _follow) = ctx
        .db
        .create_feed_and_follow(&user.name, name, url)
        .await
        .context("Failed to add feed")?;

    writeln!(out, "Feed added: {} ({})", feed.name, feed.url)?;
    writeln!(out, "{} is now following {}", user.name, feed.name)?;
    Ok(())
}

async fn feeds(ctx: &mut Context, out: &mut impl Write) -> Result<()> {
    let feeds = ctx.db.list_feeds_with_owners().await?;
    if feeds.is_empty() {
        writeln!(out, "No feeds found")?;
        return Ok(());
    }

    for feed in &feeds {
        let owner = feed.owner_name.as_deref().unwrap_or("(unknown)");
        writeln!(out, "* {} ({}) added by {}", feed.feed_name, feed.feed_url, owner)?;
    }
    Ok(())
}

async fn follow(ctx: &mut Context, url: &str, out: &mut impl Write) -> Result<()> {
    let user = ctx.current_user().await?;
    let Some(feed) = ctx.db.get_feed_by_url(url).await? else {
        bail!("No feed registered for {}. Add it with `gator addfeed <name> <url>`", url);
    };

    ctx.db
        .follow_feed(user.id, feed.id)
        .await
        .context("Failed to follow feed")?;

    writeln!(out, "{} is now following {}", user.name, feed.name)?;
    Ok(())
}

async fn following(ctx: &mut Context, out: &mut impl Write) -> Result<()> {
    let user = ctx.current_user().await?;
    let follows = ctx.db.list_follows_for_user(user.id).await?;
    if follows.is_empty() {
        writeln!(out, "{} is not following any feeds", user.name)?;
        return Ok(());
    }

    for follow in &follows {
        writeln!(out, "* {} ({})", follow.feed_name, follow.feed_url)?;
    }
    Ok(())
}

async fn unfollow(ctx: &mut Context, url: &str, out: &mut impl Write) -> Result<()> {
    let user = ctx.current_user().await?;
    ctx.db
        .unfollow_feed(user.id, url)
        .await
        .context("Failed to unfollow feed")?;

    writeln!(out, "{} unfollowed {}", user.name, url)?;
    Ok(())
}
