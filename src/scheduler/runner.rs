//! Reminder loop.
//!
//! Wakes at most every re-check interval, and processes each wall-clock
//! minute at most once: fetch today's unfinished notes, create recurring
//! notes at the daily trigger, then send the notes flagged for this minute
//! to every recipient.

use crate::channels::traits::{ChannelAdapter, ChannelOutboundMessage};
use crate::config::{NotesConfig, RecurringTemplate, parse_clock};
use crate::notion::date::DatePoint;
use crate::scheduler::tasks::{
    Clock, ReminderSource, TickReport, compose_message, flag_token, select_due,
};
use chrono::Timelike;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Slack added when sleeping up to a minute boundary.
const BOUNDARY_SLACK: Duration = Duration::from_millis(50);

/// What a single poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The current minute was already processed.
    SameMinute,
    /// A new minute was processed.
    Ticked(TickReport),
}

pub struct ReminderScheduler {
    source: Arc<dyn ReminderSource>,
    channel: Arc<dyn ChannelAdapter>,
    recipients: Vec<String>,
    clock: Arc<dyn Clock>,
    templates: Vec<RecurringTemplate>,
    /// Token (`tHH:MM`) at which recurring notes are created.
    daily_trigger: String,
    recheck_interval: Duration,
    failure_backoff: Duration,
    last_seen_minute: Option<u32>,
}

impl ReminderScheduler {
    pub fn new(
        source: Arc<dyn ReminderSource>,
        channel: Arc<dyn ChannelAdapter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            channel,
            recipients: Vec::new(),
            clock,
            templates: Vec::new(),
            daily_trigger: "t07:00".to_owned(),
            recheck_interval: Duration::from_secs(5),
            failure_backoff: Duration::from_secs(15),
            last_seen_minute: None,
        }
    }

    /// Apply recipients, templates and timings from a validated config.
    pub fn with_config(mut self, config: &NotesConfig) -> crate::Result<Self> {
        let trigger = parse_clock(&config.reminders.daily_trigger)?;
        self.daily_trigger = format!("t{}", trigger.format("%H:%M"));
        self.recipients = config
            .telegram
            .recipient_ids
            .iter()
            .map(ToString::to_string)
            .collect();
        self.templates = config.recurring.clone();
        self.recheck_interval = Duration::from_secs(config.reminders.recheck_interval_secs.max(1));
        self.failure_backoff = Duration::from_secs(config.reminders.failure_backoff_secs);
        Ok(self)
    }

    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_templates(mut self, templates: Vec<RecurringTemplate>) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_intervals(mut self, recheck: Duration, backoff: Duration) -> Self {
        self.recheck_interval = recheck;
        self.failure_backoff = backoff;
        self
    }

    /// Process the current minute unless it was already seen.
    ///
    /// The minute counts as seen even when processing fails, so a failing
    /// minute is not retried.
    pub async fn poll(&mut self) -> anyhow::Result<PollOutcome> {
        let now = self.clock.now();
        let minute = now.minute();
        if self.last_seen_minute == Some(minute) {
            return Ok(PollOutcome::SameMinute);
        }
        self.last_seen_minute = Some(minute);
        self.tick(&now).await.map(PollOutcome::Ticked)
    }

    async fn tick(&self, now: &DatePoint) -> anyhow::Result<TickReport> {
        let token = flag_token(now);
        let mut notes = self.source.due_notes(now).await?;
        let mut report = TickReport {
            token: token.clone(),
            ..TickReport::default()
        };

        if token == self.daily_trigger {
            let outcome = self.source.create_recurring(&self.templates, now).await?;
            if !outcome.created.is_empty() {
                // New notes may carry this minute's flag.
                notes = self.source.due_notes(now).await?;
            }
            report.recurring = Some(outcome);
        }
        report.fetched = notes.len();

        let due = select_due(&notes, &token);
        report.matched = due.len();
        let Some(text) = compose_message(&due, now) else {
            debug!(token = %token, fetched = report.fetched, "nothing to remind about");
            return Ok(report);
        };

        let mut failed = 0usize;
        for recipient in &self.recipients {
            let message = ChannelOutboundMessage {
                reply_target: recipient.clone(),
                text: text.clone(),
            };
            match self.channel.send(message).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    failed += 1;
                    warn!(channel = self.channel.id(), recipient = %recipient, "reminder delivery failed: {e:#}");
                }
            }
        }
        info!(
            token = %token,
            matched = report.matched,
            delivered = report.delivered,
            "reminders sent"
        );
        if failed > 0 {
            anyhow::bail!("reminder delivery failed for {failed} of {} recipients", self.recipients.len());
        }
        Ok(report)
    }

    /// How long to sleep before the next poll.
    fn next_wait(&self) -> Duration {
        let now = self.clock.now();
        let elapsed = Duration::from_secs(u64::from(now.second()))
            + Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000));
        let to_boundary = Duration::from_secs(60).saturating_sub(elapsed) + BOUNDARY_SLACK;
        to_boundary.min(self.recheck_interval)
    }

    /// Run until `cancel` fires. Errors are logged and followed by the
    /// failure back-off; they never end the loop.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            recipients = self.recipients.len(),
            templates = self.templates.len(),
            trigger = %self.daily_trigger,
            "reminder scheduler started"
        );
        loop {
            let wait = match self.poll().await {
                Ok(_) => self.next_wait(),
                Err(e) => {
                    error!("reminder tick failed: {e:#}");
                    self.failure_backoff
                }
            };
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(wait) => {}
            }
        }
        info!("reminder scheduler stopped");
    }

    /// Spawn [`Self::run`] on the current runtime.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::channels::traits::ChannelInboundMessage;
    use crate::error::NotesError;
    use crate::notes::{NoteRecord, RecurringOutcome};
    use crate::notion::date::DateRange;
    use async_trait::async_trait;
    use chrono::{FixedOffset, TimeZone};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct FakeClock(Mutex<DatePoint>);

    impl FakeClock {
        fn at(h: u32, m: u32, s: u32) -> Arc<Self> {
            Arc::new(Self(Mutex::new(point(h, m, s))))
        }

        fn set(&self, h: u32, m: u32, s: u32) {
            *self.0.lock().unwrap() = point(h, m, s);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DatePoint {
            *self.0.lock().unwrap()
        }
    }

    fn point(h: u32, m: u32, s: u32) -> DatePoint {
        FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 5, h, m, s)
            .unwrap()
    }

    #[derive(Default)]
    struct FakeSource {
        notes: Mutex<Vec<NoteRecord>>,
        fetches: AtomicUsize,
        recurring_runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ReminderSource for FakeSource {
        async fn due_notes(&self, _now: &DatePoint) -> crate::Result<Vec<NoteRecord>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(NotesError::Transport {
                    status: 502,
                    body: "bad gateway".into(),
                });
            }
            Ok(self.notes.lock().unwrap().clone())
        }

        async fn create_recurring(
            &self,
            templates: &[RecurringTemplate],
            _now: &DatePoint,
        ) -> crate::Result<RecurringOutcome> {
            self.recurring_runs.fetch_add(1, Ordering::SeqCst);
            let mut notes = self.notes.lock().unwrap();
            let mut outcome = RecurringOutcome::default();
            for template in templates {
                if notes.iter().any(|n| n.title_text() == template.title) {
                    outcome.skipped.push(template.title.clone());
                } else {
                    notes.push(flagged(&template.title, &["t07:00"]));
                    outcome.created.push(template.title.clone());
                }
            }
            Ok(outcome)
        }
    }

    #[derive(Default)]
    struct FakeChannel {
        sent: Mutex<Vec<ChannelOutboundMessage>>,
        reject: Option<String>,
    }

    #[async_trait]
    impl ChannelAdapter for FakeChannel {
        fn id(&self) -> &'static str {
            "fake"
        }

        async fn send(&self, message: ChannelOutboundMessage) -> anyhow::Result<()> {
            if self.reject.as_deref() == Some(message.reply_target.as_str()) {
                anyhow::bail!("chat not found");
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn run(&self, _inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()> {
            Ok(())
        }

        async fn health_check(&self) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    fn flagged(title: &str, flags: &[&str]) -> NoteRecord {
        NoteRecord::new()
            .with_title(title)
            .with_remind(flags.iter().copied())
            .with_importance("Urgent")
            .with_date(DateRange::new(point(9, 0, 0)))
    }

    fn scheduler(
        source: Arc<FakeSource>,
        channel: Arc<FakeChannel>,
        clock: Arc<FakeClock>,
    ) -> ReminderScheduler {
        ReminderScheduler::new(source, channel, clock)
            .with_recipients(vec!["1".into(), "2".into()])
            .with_intervals(Duration::from_millis(10), Duration::from_millis(10))
    }

    #[tokio::test]
    async fn polls_within_one_minute_fetch_once() {
        let source = Arc::new(FakeSource::default());
        let clock = FakeClock::at(8, 0, 1);
        let mut s = scheduler(source.clone(), Arc::default(), clock.clone());

        assert!(matches!(s.poll().await.unwrap(), PollOutcome::Ticked(_)));
        clock.set(8, 0, 30);
        assert_eq!(s.poll().await.unwrap(), PollOutcome::SameMinute);
        clock.set(8, 0, 59);
        assert_eq!(s.poll().await.unwrap(), PollOutcome::SameMinute);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        clock.set(8, 1, 0);
        assert!(matches!(s.poll().await.unwrap(), PollOutcome::Ticked(_)));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn flagged_notes_reach_every_recipient() {
        let source = Arc::new(FakeSource::default());
        source.notes.lock().unwrap().extend([
            flagged("Pay rent", &["t08:00"]),
            flagged("Later", &["t12:00"]),
        ]);
        let channel = Arc::new(FakeChannel::default());
        let mut s = scheduler(source, channel.clone(), FakeClock::at(8, 0, 0));

        let PollOutcome::Ticked(report) = s.poll().await.unwrap() else {
            panic!("expected a tick");
        };
        assert_eq!(report.token, "t08:00");
        assert_eq!((report.fetched, report.matched, report.delivered), (2, 1, 2));
        assert!(report.recurring.is_none());

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].reply_target, "1");
        assert_eq!(sent[1].reply_target, "2");
        assert!(sent[0].text.ends_with("🔥 [09:00] Pay rent"));
        assert!(!sent[0].text.contains("Later"));
    }

    #[tokio::test]
    async fn nothing_flagged_sends_nothing() {
        let source = Arc::new(FakeSource::default());
        source.notes.lock().unwrap().push(flagged("Later", &["t12:00"]));
        let channel = Arc::new(FakeChannel::default());
        let mut s = scheduler(source, channel.clone(), FakeClock::at(8, 0, 0));

        s.poll().await.unwrap();
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn daily_trigger_creates_recurring_notes_once() {
        let source = Arc::new(FakeSource::default());
        let channel = Arc::new(FakeChannel::default());
        let clock = FakeClock::at(7, 0, 0);
        let template = RecurringTemplate {
            title: "Stretch".into(),
            importance: "Important".into(),
            category: vec![],
        };
        let mut s = scheduler(source.clone(), channel.clone(), clock.clone())
            .with_templates(vec![template]);

        let PollOutcome::Ticked(report) = s.poll().await.unwrap() else {
            panic!("expected a tick");
        };
        let outcome = report.recurring.unwrap();
        assert_eq!(outcome.created, ["Stretch"]);
        assert_eq!(report.matched, 1);
        assert_eq!(source.recurring_runs.load(Ordering::SeqCst), 1);
        assert_eq!(channel.sent.lock().unwrap().len(), 2);

        clock.set(7, 0, 40);
        s.poll().await.unwrap();
        assert_eq!(source.recurring_runs.load(Ordering::SeqCst), 1);

        clock.set(7, 1, 0);
        s.poll().await.unwrap();
        assert_eq!(source.recurring_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_minute_is_not_retried() {
        let source = Arc::new(FakeSource {
            fail: true,
            ..FakeSource::default()
        });
        let mut s = scheduler(source.clone(), Arc::default(), FakeClock::at(8, 0, 0));

        assert!(s.poll().await.is_err());
        assert_eq!(s.poll().await.unwrap(), PollOutcome::SameMinute);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_failed_recipient_fails_the_tick_after_trying_all() {
        let source = Arc::new(FakeSource::default());
        source.notes.lock().unwrap().push(flagged("Pay rent", &["t08:00"]));
        let channel = Arc::new(FakeChannel {
            reject: Some("1".into()),
            ..FakeChannel::default()
        });
        let mut s = scheduler(source, channel.clone(), FakeClock::at(8, 0, 0));

        assert!(s.poll().await.is_err());
        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_target, "2");
    }

    #[test]
    fn wait_is_bounded_by_boundary_and_recheck() {
        let clock = FakeClock::at(8, 0, 58);
        let s = ReminderScheduler::new(Arc::new(FakeSource::default()), Arc::new(FakeChannel::default()), clock.clone());
        assert_eq!(s.next_wait(), Duration::from_secs(2) + BOUNDARY_SLACK);
        clock.set(8, 0, 10);
        assert_eq!(s.next_wait(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let source = Arc::new(FakeSource::default());
        let s = scheduler(source.clone(), Arc::default(), FakeClock::at(8, 0, 0));
        let cancel = CancellationToken::new();
        let handle = s.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let joined = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(joined.is_ok());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_ticks_back_off_and_keep_running() {
        let source = Arc::new(FakeSource {
            fail: true,
            ..FakeSource::default()
        });
        let clock = FakeClock::at(8, 0, 0);
        let cancel = CancellationToken::new();
        let handle = scheduler(source.clone(), Arc::default(), clock.clone()).spawn(cancel.clone());

        for minute in 1..=3 {
            tokio::time::sleep(Duration::from_millis(60)).await;
            clock.set(8, minute, 0);
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!handle.is_finished());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 4);
        cancel.cancel();
        let joined = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(joined.is_ok());
    }
}
