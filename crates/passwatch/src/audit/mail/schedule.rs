use chrono::{DateTime, Datelike, Local, Weekday};
use tracing::debug;

use super::{MailError, MailTransport, NotificationRequest};

/// Decides whether outgoing mail may be sent at a given moment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SendSchedule {
    #[default]
    Always,
    Weekdays(Vec<Weekday>),
}

impl SendSchedule {
    pub fn should_send_now<D: Datelike>(&self, now: &D) -> bool {
        match self {
            Self::Always => true,
            Self::Weekdays(days) => days.contains(&now.weekday()),
        }
    }
}

/// Applies a [`SendSchedule`] in front of another transport. Every send is
/// checked against the clock, including per-user notices.
pub struct GatedTransport<T> {
    inner: T,
    schedule: SendSchedule,
    clock: fn() -> DateTime<Local>,
}

impl<T> GatedTransport<T> {
    pub fn new(inner: T, schedule: SendSchedule) -> Self {
        Self::with_clock(inner, schedule, Local::now)
    }

    pub fn with_clock(inner: T, schedule: SendSchedule, clock: fn() -> DateTime<Local>) -> Self {
        Self {
            inner,
            schedule,
            clock,
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: MailTransport> MailTransport for GatedTransport<T> {
    fn send(&self, request: &NotificationRequest) -> Result<(), MailError> {
        let now = (self.clock)();
        if !self.schedule.should_send_now(&now) {
            debug!(subject = %request.subject, weekday = ?now.weekday(), "send window closed");
            return Err(MailError::OutsideSendWindow(now.weekday()));
        }
        self.inner.send(request)
    }
}

impl<T> std::fmt::Debug for GatedTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatedTransport")
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::mail::NotificationKind;
    use chrono::{NaiveDate, TimeZone};
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingTransport {
        sent: Cell<usize>,
    }

    impl MailTransport for CountingTransport {
        fn send(&self, _request: &NotificationRequest) -> Result<(), MailError> {
            self.sent.set(self.sent.get() + 1);
            Ok(())
        }
    }

    fn request() -> NotificationRequest {
        NotificationRequest {
            kind: NotificationKind::UserNotice,
            recipients: vec!["user@example.com".to_string()],
            subject: "Your password expires in 3 days".to_string(),
            html_body: "<p>hi</p>".to_string(),
            account: Some("user".to_string()),
        }
    }

    // 2025-10-06 is a Monday.
    fn monday() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2025, 10, 6, 9, 0, 0)
            .earliest()
            .expect("valid local time")
    }

    fn tuesday() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2025, 10, 7, 9, 0, 0)
            .earliest()
            .expect("valid local time")
    }

    #[test]
    fn weekday_schedule_only_opens_on_listed_days() {
        let schedule = SendSchedule::Weekdays(vec![Weekday::Mon, Weekday::Thu]);
        let monday = NaiveDate::from_ymd_opt(2025, 10, 6).expect("valid date");
        let thursday = NaiveDate::from_ymd_opt(2025, 10, 9).expect("valid date");
        let friday = NaiveDate::from_ymd_opt(2025, 10, 10).expect("valid date");

        assert!(schedule.should_send_now(&monday));
        assert!(schedule.should_send_now(&thursday));
        assert!(!schedule.should_send_now(&friday));
        assert!(SendSchedule::Always.should_send_now(&friday));
    }

    #[test]
    fn gated_transport_forwards_inside_window() {
        let gated = GatedTransport::with_clock(
            CountingTransport::default(),
            SendSchedule::Weekdays(vec![Weekday::Mon]),
            monday,
        );

        gated.send(&request()).expect("send allowed on monday");
        assert_eq!(gated.into_inner().sent.get(), 1);
    }

    #[test]
    fn gated_transport_refuses_outside_window() {
        let gated = GatedTransport::with_clock(
            CountingTransport::default(),
            SendSchedule::Weekdays(vec![Weekday::Mon]),
            tuesday,
        );

        match gated.send(&request()) {
            Err(MailError::OutsideSendWindow(Weekday::Tue)) => {}
            other => panic!("expected closed send window, got {other:?}"),
        }
        assert_eq!(gated.into_inner().sent.get(), 0);
    }
}
