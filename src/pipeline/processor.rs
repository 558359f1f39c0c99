//! Notifier: route, build, deliver.
//!
//! Flow for one message:
//! 1. Routing table resolves webhook and channel from `To` (fails closed)
//! 2. Builder produces the posts lazily
//! 3. Each post is delivered in order; the first failure stops the run

use std::sync::Arc;

use tracing::{debug, info};

use crate::channels::Deliver;
use crate::error::Result;
use crate::mail::ParsedMail;
use crate::pipeline::autolink::AutoLinkEstimator;
use crate::pipeline::builder::build;
use crate::pipeline::rules::RoutingTable;
use crate::pipeline::types::MessageSettings;

/// Posts parsed mail to the destination its recipient routes to.
pub struct Notifier {
    routes: RoutingTable,
    settings: MessageSettings,
    estimator: AutoLinkEstimator,
    deliverer: Arc<dyn Deliver>,
}

impl Notifier {
    /// Create a notifier with the Slack auto-link estimator.
    pub fn new(routes: RoutingTable, settings: MessageSettings, deliverer: Arc<dyn Deliver>) -> Self {
        Self {
            routes,
            settings,
            estimator: AutoLinkEstimator::slack(),
            deliverer,
        }
    }

    pub fn with_estimator(mut self, estimator: AutoLinkEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Deliver `mail`, returning the number of posts sent.
    ///
    /// Routing happens before anything is sent. A delivery failure is
    /// returned as-is; posts already sent stay sent.
    pub async fn notify(&self, mail: &ParsedMail) -> Result<usize> {
        info!(
            from = %mail.from,
            to = %mail.to,
            subject = %mail.subject,
            "Processing message"
        );

        let route = self.routes.resolve(&mail.to)?;
        let preference = self.routes.body_preference(&mail.from);
        debug!(preference = ?preference, "Selected body preference");

        let messages = build(
            mail,
            route.channel,
            preference,
            &self.settings,
            &self.estimator,
        );

        let mut sent = 0;
        for message in messages {
            self.deliverer
                .deliver(route.webhook.url(), &message)
                .await?;
            sent += 1;
            info!(
                channel = %message.channel,
                team = %route.webhook.name,
                via = self.deliverer.name(),
                part = sent,
                footer = message.footer.is_some(),
                "Delivered message"
            );
        }

        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::{ChannelError, Error, RoutingError};
    use crate::pipeline::types::{OutboundMessage, Webhook};

    /// Records deliveries; fails once `fail_after` posts have gone out.
    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, OutboundMessage)>>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl Deliver for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn deliver(
            &self,
            destination: &str,
            message: &OutboundMessage,
        ) -> std::result::Result<(), ChannelError> {
            let mut sent = self.sent.lock().unwrap();
            if self.fail_after == Some(sent.len()) {
                return Err(ChannelError::SendFailed {
                    name: "recorder".into(),
                    reason: "boom".into(),
                });
            }
            sent.push((destination.to_string(), message.clone()));
            Ok(())
        }
    }

    fn routes() -> RoutingTable {
        let mut routes = RoutingTable::new();
        routes
            .add_team(r".*@ops\.example\.com", Webhook::new("ops", "https://hooks.example.com/OPS"))
            .unwrap();
        routes.add_channel(".*", "#alerts").unwrap();
        routes
    }

    fn mail(to: &str, body: &str) -> ParsedMail {
        ParsedMail {
            from: "alice@example.com".into(),
            to: to.into(),
            subject: "disk full".into(),
            date: "Mon, 1 Jan 2024 00:00:00 +0000".into(),
            message_id: "<1@example.com>".into(),
            body_plain: Some(body.into()),
            body_html: None,
        }
    }

    fn fenced(limit: usize) -> MessageSettings {
        MessageSettings {
            use_code_fence: true,
            username: None,
            limit,
        }
    }

    #[tokio::test]
    async fn notify_sends_single_message_to_routed_webhook() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(routes(), MessageSettings::default(), recorder.clone());

        let sent = notifier
            .notify(&mail("oncall@ops.example.com", "disk at 99%\n"))
            .await
            .unwrap();

        assert_eq!(sent, 1);
        let log = recorder.sent.lock().unwrap();
        assert_eq!(log[0].0, "https://hooks.example.com/OPS");
        assert_eq!(log[0].1.channel, "#alerts");
        assert!(log[0].1.text.ends_with("disk at 99%\n"));
        assert!(log[0].1.footer.is_some());
    }

    #[tokio::test]
    async fn routing_failure_sends_nothing() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(routes(), MessageSettings::default(), recorder.clone());

        let err = notifier
            .notify(&mail("someone@elsewhere.com", "x\n"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Routing(RoutingError::TeamNotFound { .. })));
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chunked_delivery_keeps_order_and_ends_with_footer() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(routes(), fenced(200), recorder.clone())
            .with_estimator(AutoLinkEstimator::empty());

        let body: String = (0..40).map(|i| format!("line {i}\n")).collect();
        let sent = notifier
            .notify(&mail("oncall@ops.example.com", &body))
            .await
            .unwrap();

        let log = recorder.sent.lock().unwrap();
        assert_eq!(sent, log.len());
        assert!(sent > 2);
        let (last, chunks) = log.split_last().unwrap();
        assert_eq!(last.1.text, "");
        assert!(last.1.footer.is_some());
        assert!(chunks.iter().all(|(_, m)| m.footer.is_none()));
        assert!(chunks[0].1.text.starts_with("*Date*:"));
        assert!(chunks[1].1.text.starts_with("continued: disk full\n```"));
    }

    #[tokio::test]
    async fn delivery_failure_stops_the_run() {
        let recorder = Arc::new(Recorder {
            fail_after: Some(1),
            ..Default::default()
        });
        let notifier = Notifier::new(routes(), fenced(200), recorder.clone())
            .with_estimator(AutoLinkEstimator::empty());

        let body: String = (0..40).map(|i| format!("line {i}\n")).collect();
        let err = notifier
            .notify(&mail("oncall@ops.example.com", &body))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Channel(ChannelError::SendFailed { .. })));
        assert_eq!(recorder.sent.lock().unwrap().len(), 1);
    }
}
