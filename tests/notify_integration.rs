//! End-to-end tests: raw RFC 822 bytes in, ordered webhook posts out.
//!
//! Each test loads a TOML configuration, parses a raw message and drives the
//! notifier against a recording deliverer instead of the network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mail_notify::channels::Deliver;
use mail_notify::config::{Config, Overrides};
use mail_notify::error::{ChannelError, Error, RoutingError};
use mail_notify::mail::ParsedMail;
use mail_notify::pipeline::{Notifier, OutboundMessage};

const OPS_URL: &str = "https://hooks.example.com/OPS";

const ROUTES: &str = r##"
[slack]
default = "https://hooks.example.com/DEFAULT"
ops = "https://hooks.example.com/OPS"

[[team]]
pattern = "ops@"
slack = "ops"

[[team]]
pattern = "default"
slack = "default"

[[channel]]
pattern = "ops@"
channel = "#ops"

[[mime_part]]
pattern = '.*@newsletter\.example'
prefer = "html"
"##;

/// Keeps every post with the URL it was sent to.
#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<(String, OutboundMessage)>>,
}

impl Recorder {
    fn posts(&self) -> Vec<(String, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Deliver for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn deliver(&self, destination: &str, message: &OutboundMessage) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), message.clone()));
        Ok(())
    }
}

/// Routes plus `flags`, with `#general` as the command-line default channel.
fn notifier(flags: &str, recorder: Arc<Recorder>) -> Notifier {
    let config = Config::from_toml(&format!("{ROUTES}\n{flags}")).unwrap();
    let overrides = Overrides {
        channel: Some("#general".into()),
        ..Default::default()
    };
    let routes = config.routing_table(&overrides).unwrap();
    Notifier::new(routes, config.settings(), recorder)
}

async fn run(flags: &str, raw: &[u8]) -> (Result<usize, Error>, Vec<(String, OutboundMessage)>) {
    let recorder = Arc::new(Recorder::default());
    let notifier = notifier(flags, recorder.clone());
    let mail = ParsedMail::parse(raw).unwrap();
    let result = notifier.notify(&mail).await;
    (result, recorder.posts())
}

// ── Single post ─────────────────────────────────────────────────────

#[tokio::test]
async fn short_message_is_one_post_with_footer() {
    let raw = b"From: Alice <alice@example.com>\r\n\
To: ops@example.com\r\n\
Subject: =?ISO-2022-JP?B?GyRCRnxLXDhsJE43b0w+GyhC?=\r\n\
Date: Mon, 01 Jan 2024 10:00:00 +0000\r\n\
Message-ID: <abc@example.com>\r\n\
\r\n\
disk usage at 91%\r\n";

    let (result, posts) = run("", raw).await;

    assert_eq!(result.unwrap(), 1);
    assert_eq!(posts.len(), 1);
    let (url, post) = &posts[0];
    assert_eq!(url, OPS_URL);
    assert_eq!(post.channel, "#ops");
    assert_eq!(
        post.text,
        "*Date*: Mon, 01 Jan 2024 10:00:00 +0000\n\
         *From*: Alice &lt;alice@example.com&gt;\n\
         *To*: ops@example.com\n\
         *Subject*: 日本語の件名\n\
         disk usage at 91%\n"
    );
    assert_eq!(
        post.footer.as_deref(),
        Some("Posted by mail-notify. Original mail is &lt;abc@example.com&gt;.")
    );
}

#[tokio::test]
async fn legacy_japanese_body_is_decoded() {
    let raw = b"From: bot@example.jp\n\
To: ops@example.com\n\
Subject: report\n\
Content-Type: text/plain; charset=ISO-2022-JP\n\
\n\
\x1b$BF|K\\8l\x1b(B\n";

    let (result, posts) = run("[flags]\npretext = true\n", raw).await;

    assert_eq!(result.unwrap(), 1);
    assert!(posts[0].1.text.ends_with("```日本語\n```\n"));
}

#[tokio::test]
async fn html_preferred_sender_is_rendered_unfenced() {
    let raw = b"From: News <news@newsletter.example>\n\
To: someone@example.com\n\
Subject: digest\n\
MIME-Version: 1.0\n\
Content-Type: multipart/alternative; boundary=\"b1\"\n\
\n\
--b1\n\
Content-Type: text/plain; charset=utf-8\n\
\n\
plain version\n\
--b1\n\
Content-Type: text/html; charset=utf-8\n\
\n\
<p>Hello <b>world</b></p>\n\
--b1--\n";

    let (result, posts) = run("[flags]\npretext = true\n", raw).await;

    assert_eq!(result.unwrap(), 1);
    let (url, post) = &posts[0];
    // Caught by the `default` team rule and the command-line channel.
    assert_eq!(url, "https://hooks.example.com/DEFAULT");
    assert_eq!(post.channel, "#general");
    assert!(post.text.ends_with("Hello world\n\n"));
    assert!(!post.text.contains("```"));
    assert!(!post.text.contains("plain version"));
}

// ── Chunked ─────────────────────────────────────────────────────────

#[tokio::test]
async fn long_body_is_split_then_footer() {
    let body: String = (0..60).map(|i| format!("line {i:02} of the report\n")).collect();
    let raw = format!(
        "From: cron@example.com\n\
         To: ops@example.com\n\
         Subject: Weekly report\n\
         Message-ID: <w1@example.com>\n\
         \n\
         {body}"
    );

    let (result, posts) = run("[flags]\npretext = true\nlimit = 300\n", raw.as_bytes()).await;

    let sent = result.unwrap();
    assert_eq!(sent, posts.len());
    assert!(sent >= 3);

    let (footer_post, chunks) = posts.split_last().unwrap();
    assert_eq!(footer_post.1.text, "");
    assert!(footer_post.1.footer.is_some());

    let mut rebuilt = String::new();
    for (i, (url, post)) in chunks.iter().enumerate() {
        assert_eq!(url, OPS_URL);
        assert_eq!(post.footer, None);
        assert!(post.text.chars().count() <= 300);
        if i == 0 {
            assert!(post.text.starts_with("*Date*: \n*From*: cron@example.com\n"));
        } else {
            assert!(post.text.starts_with("continued: Weekly report\n```"));
        }
        let start = post.text.find("```").unwrap() + 3;
        let end = post.text.len() - 3;
        assert!(post.text.ends_with("```"));
        rebuilt.push_str(&post.text[start..end]);
    }
    assert_eq!(rebuilt, body);
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn unroutable_recipient_sends_nothing() {
    let config = Config::from_toml(
        r##"
[slack]
ops = "https://hooks.example.com/OPS"

[[team]]
pattern = "ops@"
slack = "ops"

[[channel]]
pattern = ".*"
channel = "#ops"
"##,
    )
    .unwrap();
    let recorder = Arc::new(Recorder::default());
    let routes = config.routing_table(&Overrides::default()).unwrap();
    let notifier = Notifier::new(routes, config.settings(), recorder.clone());

    let mail = ParsedMail::parse(b"From: a@example.com\nTo: Dev <dev@example.com>\n\nhi\n").unwrap();
    let err = notifier.notify(&mail).await.unwrap_err();

    match err {
        Error::Routing(RoutingError::TeamNotFound { address }) => {
            assert_eq!(address, "Dev <dev@example.com>");
        }
        other => panic!("Expected TeamNotFound, got {:?}", other),
    }
    assert!(recorder.posts().is_empty());
}
