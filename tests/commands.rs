//! End-to-end tests for command dispatch.
//!
//! Each test gets an in-memory database and a session file in a fresh temp
//! directory, then drives commands exactly as `main` would, capturing stdout.

use gator::commands::{run, Command, Context};
use gator::config::Config;
use gator::feed::build_client;
use gator::session::Session;
use gator::storage::{Database, DatabaseError};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    ctx: Context,
    dir: PathBuf,
}

impl Harness {
    async fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("gator_cmd_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let config = Config::default();
        let client = build_client(&config.user_agent, config.fetch_timeout()).unwrap();
        let ctx = Context {
            db: Database::open(":memory:").await.unwrap(),
            client,
            config,
            session: Session::default(),
            session_path: dir.join("session.json"),
        };
        Self { ctx, dir }
    }

    async fn run(&mut self, command: Command) -> anyhow::Result<String> {
        let mut out = Vec::new();
        run(&mut self.ctx, command, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    async fn ok(&mut self, command: Command) -> String {
        self.run(command).await.unwrap()
    }

    fn persisted_session(&self) -> Session {
        Session::load(&self.ctx.session_path).unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

fn register(name: &str) -> Command {
    Command::Register {
        name: name.to_string(),
    }
}

fn login(name: &str) -> Command {
    Command::Login {
        name: name.to_string(),
    }
}

fn addfeed(name: &str, url: &str) -> Command {
    Command::Addfeed {
        name: name.to_string(),
        url: url.to_string(),
    }
}

// ============================================================================
// User Commands
// ============================================================================

#[tokio::test]
async fn test_register_logs_in_and_persists_session() {
    let mut h = Harness::new().await;

    let out = h.ok(register("alice")).await;
    assert!(out.starts_with("User created: alice ("));
    assert!(out.ends_with("Logged in as 'alice'\n"));

    assert_eq!(h.persisted_session().current_user(), Some("alice"));
}

#[tokio::test]
async fn test_register_duplicate_fails_and_keeps_session() {
    let mut h = Harness::new().await;
    h.ok(register("alice")).await;
    h.ok(register("bob")).await;

    let err = h.run(register("alice")).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DatabaseError>(),
        Some(DatabaseError::Conflict(_))
    ));
    assert_eq!(h.persisted_session().current_user(), Some("bob"));
}

#[tokio::test]
async fn test_login_requires_existing_user() {
    let mut h = Harness::new().await;

    let err = h.run(login("ghost")).await.unwrap_err();
    assert_eq!(err.to_string(), "User \"ghost\" does not exist");
    assert_eq!(h.persisted_session().current_user(), None);

    h.ok(register("alice")).await;
    h.ok(register("bob")).await;
    assert_eq!(h.ok(login("alice")).await, "Logged in as 'alice'\n");
    assert_eq!(h.persisted_session().current_user(), Some("alice"));
}

#[tokio::test]
async fn test_users_marks_current() {
    let mut h = Harness::new().await;
    assert_eq!(h.ok(Command::Users).await, "No users found\n");

    h.ok(register("alice")).await;
    h.ok(register("bob")).await;

    assert_eq!(h.ok(Command::Users).await, "* alice\n* bob (current)\n");
}

#[tokio::test]
async fn test_reset_removes_everything_and_logs_out() {
    let mut h = Harness::new().await;
    h.ok(register("alice")).await;
    h.ok(addfeed("Blog", "https://example.com/feed.xml")).await;

    assert_eq!(h.ok(Command::Reset).await, "All users deleted (1 removed)\n");
    assert_eq!(h.ok(Command::Users).await, "No users found\n");
    assert_eq!(h.ok(Command::Feeds).await, "No feeds found\n");
    assert_eq!(h.persisted_session().current_user(), None);

    // Reset on an empty database is fine
    assert_eq!(h.ok(Command::Reset).await, "All users deleted (0 removed)\n");
}

// ============================================================================
// Feed Commands
// ============================================================================

#[tokio::test]
async fn test_addfeed_requires_login() {
    let mut h = Harness::new().await;

    let err = h
        .run(addfeed("Blog", "https://example.com/feed.xml"))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("No user is logged in"));
}

#[tokio::test]
async fn test_addfeed_follows_automatically() {
    let mut h = Harness::new().await;
    h.ok(register("alice")).await;

    let out = h.ok(addfeed("Blog", "https://example.com/feed.xml")).await;
    assert_eq!(
        out,
        "Feed added: Blog (https://example.com/feed.xml)\nalice is now following Blog\n"
    );

    assert_eq!(
        h.ok(Command::Following).await,
        "* Blog (https://example.com/feed.xml)\n"
    );
    assert_eq!(
        h.ok(Command::Feeds).await,
        "* Blog (https://example.com/feed.xml) added by alice\n"
    );
}

#[tokio::test]
async fn test_addfeed_rejects_local_urls() {
    let mut h = Harness::new().await;
    h.ok(register("alice")).await;

    assert!(h.run(addfeed("Local", "http://localhost/feed")).await.is_err());
    assert!(h.run(addfeed("File", "file:///etc/passwd")).await.is_err());
    assert_eq!(h.ok(Command::Feeds).await, "No feeds found\n");
}

#[tokio::test]
async fn test_addfeed_duplicate_url_is_conflict() {
    let mut h = Harness::new().await;
    h.ok(register("alice")).await;
    h.ok(addfeed("Blog", "https://example.com/feed.xml")).await;

    h.ok(register("bob")).await;
    let err = h
        .run(addfeed("Copy", "https://example.com/feed.xml"))
        .await
        .unwrap_err();
    assert!(err
        .downcast_ref::<DatabaseError>()
        .is_some_and(DatabaseError::is_conflict));

    // The failed insert must not leave bob following anything
    assert_eq!(
        h.ok(Command::Following).await,
        "bob is not following any feeds\n"
    );
}

// ============================================================================
// Follow Commands
// ============================================================================

#[tokio::test]
async fn test_follow_and_unfollow() {
    let mut h = Harness::new().await;
    h.ok(register("alice")).await;
    h.ok(addfeed("Blog", "https://example.com/feed.xml")).await;
    h.ok(register("bob")).await;

    let url = "https://example.com/feed.xml".to_string();
    assert_eq!(
        h.ok(Command::Follow { url: url.clone() }).await,
        "bob is now following Blog\n"
    );

    let err = h.run(Command::Follow { url: url.clone() }).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DatabaseError>(),
        Some(DatabaseError::Conflict(_))
    ));

    assert_eq!(
        h.ok(Command::Unfollow { url: url.clone() }).await,
        "bob unfollowed https://example.com/feed.xml\n"
    );

    let err = h.run(Command::Unfollow { url }).await.unwrap_err();
    assert!(err
        .downcast_ref::<DatabaseError>()
        .is_some_and(DatabaseError::is_not_found));
}

#[tokio::test]
async fn test_follow_unknown_feed() {
    let mut h = Harness::new().await;
    h.ok(register("alice")).await;

    let err = h
        .run(Command::Follow {
            url: "https://nowhere.example.com/rss".to_string(),
        })
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .starts_with("No feed registered for https://nowhere.example.com/rss"));
}

// ============================================================================
// Aggregation
// ============================================================================

const SAMPLE_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Sample</title>
    <link>https://example.com/</link>
    <description>A sample feed</description>
    <item>
      <title>Hello</title>
      <link>https://example.com/hello</link>
      <description>First</description>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

#[tokio::test]
async fn test_agg_prints_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_RSS))
        .mount(&server)
        .await;

    let mut h = Harness::new().await;
    let out = h
        .ok(Command::Agg {
            url: format!("{}/feed.xml", server.uri()),
        })
        .await;

    assert_eq!(
        out,
        "Sample\n  https://example.com/\n  A sample feed\n\n\
         * Hello\n  Mon, 01 Jan 2024 00:00:00 +0000\n  https://example.com/hello\n"
    );
}

#[tokio::test]
async fn test_agg_reports_http_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut h = Harness::new().await;
    let err = h
        .run(Command::Agg {
            url: format!("{}/missing.xml", server.uri()),
        })
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("Failed to fetch feed"));
}
