//! The retry/recovery automaton.
//!
//! One watcher drives one site with one live session at a time. The outer
//! loop owns the session resource: it opens a fresh session, lets the
//! inner loop search until something notable happens, and on any
//! recoverable failure captures a diagnostic screenshot, tears the session
//! down and rebuilds from scratch. Cancellation is cooperative: the shared
//! flag is polled at the top of each outer iteration, at the top of each
//! inner search iteration and again after the post-outcome hold, never
//! mid-step.

use rdv_driver::{BrowserSession, PageDriver, SessionFactory};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::artifacts::{Artifact, ArtifactStore};
use crate::classify::classify;
use crate::error::{Result, WatchError};
use crate::flag::RunningFlag;
use crate::flow::SiteFlow;
use crate::notify::{Alert, AudioAlert};
use crate::outcome::{BookingOutcome, SearchOutcome};
use crate::pacing::Pacing;
use crate::profile::PersonalInfo;

/// Automaton states, in log vocabulary. Navigation and form filling are
/// one delegated phase; the flow's own log lines mark progress within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
    Init,
    Navigating,
    Searching,
    Evaluating,
    SlotFound,
    NoSlots,
    Recovering,
    Terminated,
}

impl WatchState {
    fn as_str(&self) -> &'static str {
        match self {
            WatchState::Init => "init",
            WatchState::Navigating => "navigating",
            WatchState::Searching => "searching",
            WatchState::Evaluating => "evaluating",
            WatchState::SlotFound => "slot-found",
            WatchState::NoSlots => "no-slots",
            WatchState::Recovering => "recovering",
            WatchState::Terminated => "terminated",
        }
    }
}

/// How one session's inner loop ended without an error.
enum SessionEnd {
    Cancelled,
    BookingConfirmed(BookingOutcome),
}

/// Summary of a finished watch run.
#[derive(Debug, Clone, Default)]
pub struct WatchReport {
    pub sessions: u32,
    pub searches: u32,
    pub slots_found: u32,
    pub recoveries: u32,
    pub booking: Option<BookingOutcome>,
}

/// Builder for [`Watcher`]. Flag, alert and auto-booking default to a
/// fresh flag, the audio alert and off.
pub struct WatcherBuilder {
    flow: Box<dyn SiteFlow>,
    factory: Box<dyn SessionFactory>,
    info: PersonalInfo,
    pacing: Pacing,
    artifacts: ArtifactStore,
    flag: RunningFlag,
    alert: Box<dyn Alert>,
    auto_book: bool,
}

impl WatcherBuilder {
    pub fn new(
        flow: Box<dyn SiteFlow>,
        factory: Box<dyn SessionFactory>,
        info: PersonalInfo,
        pacing: Pacing,
        artifacts: ArtifactStore,
    ) -> Self {
        Self {
            flow,
            factory,
            info,
            pacing,
            artifacts,
            flag: RunningFlag::new(),
            alert: Box::new(AudioAlert),
            auto_book: false,
        }
    }

    /// Shares an externally owned cancellation flag.
    pub fn flag(mut self, flag: RunningFlag) -> Self {
        self.flag = flag;
        self
    }

    pub fn alert(mut self, alert: Box<dyn Alert>) -> Self {
        self.alert = alert;
        self
    }

    pub fn auto_book(mut self, enabled: bool) -> Self {
        self.auto_book = enabled;
        self
    }

    /// Validates the profile against the requested mode and builds the
    /// watcher. A profile missing booking contact details fails here,
    /// before any browser is launched.
    pub fn build(self) -> Result<Watcher> {
        if self.auto_book && self.flow.supports_auto_booking() {
            self.info.require_booking_contact()?;
        }
        Ok(Watcher {
            flow: self.flow,
            factory: self.factory,
            info: self.info,
            pacing: self.pacing,
            artifacts: self.artifacts,
            flag: self.flag,
            alert: self.alert,
            auto_book: self.auto_book,
        })
    }
}

/// The polling automaton for one site.
pub struct Watcher {
    flow: Box<dyn SiteFlow>,
    factory: Box<dyn SessionFactory>,
    info: PersonalInfo,
    pacing: Pacing,
    artifacts: ArtifactStore,
    flag: RunningFlag,
    alert: Box<dyn Alert>,
    auto_book: bool,
}

impl Watcher {
    /// Runs until the flag is cleared, a booking is confirmed, or a fatal
    /// error surfaces. Recoverable failures never escape: they cost one
    /// session rebuild each.
    pub async fn run(&self) -> Result<WatchReport> {
        let tag = self.flow.site().tag();
        let mut report = WatchReport::default();
        info!(
            target = "rdv.watch",
            site = %self.flow.site(),
            auto_book = self.auto_book,
            "{} watch starting", tag
        );

        loop {
            self.enter(WatchState::Init);
            if !self.flag.is_running() {
                break;
            }

            let mut session = self.factory.open().await?;
            report.sessions += 1;
            let end = self.run_session(session.page(), &mut report).await;
            match end {
                Ok(SessionEnd::Cancelled) => {
                    info!(target = "rdv.watch", "{} stop requested", tag);
                    close_session(session.as_mut(), tag).await;
                    break;
                }
                Ok(SessionEnd::BookingConfirmed(outcome)) => {
                    report.booking = Some(outcome);
                    close_session(session.as_mut(), tag).await;
                    break;
                }
                Err(err) if !err.is_recoverable() => {
                    close_session(session.as_mut(), tag).await;
                    return Err(err);
                }
                Err(err) => {
                    self.enter(WatchState::Recovering);
                    warn!(
                        target = "rdv.watch",
                        error = %err,
                        "{} session failed, rebuilding", tag
                    );
                    report.recoveries += 1;
                    self.capture_diagnostic(session.page()).await;
                    close_session(session.as_mut(), tag).await;
                    if !self.flag.is_running() {
                        break;
                    }
                }
            }
        }

        self.enter(WatchState::Terminated);
        info!(
            target = "rdv.watch",
            sessions = report.sessions,
            searches = report.searches,
            slots_found = report.slots_found,
            "{} watch finished", tag
        );
        Ok(report)
    }

    /// One session's life: reach the search screen once, then search,
    /// classify and act until cancellation or an error.
    async fn run_session(
        &self,
        page: &dyn PageDriver,
        report: &mut WatchReport,
    ) -> Result<SessionEnd> {
        let tag = self.flow.site().tag();

        self.enter(WatchState::Navigating);
        let variant = self.flow.reach_search_screen(page, &self.info).await?;
        info!(target = "rdv.watch", variant = %variant, "{} search screen reached", tag);
        let indicators = self.flow.outcome_indicators();

        loop {
            if !self.flag.is_running() {
                return Ok(SessionEnd::Cancelled);
            }

            self.enter(WatchState::Searching);
            info!(target = "rdv.watch", "{} searching for slots", tag);
            self.flow.submit_search(page, &self.info.postal_code).await?;
            report.searches += 1;

            self.enter(WatchState::Evaluating);
            let outcome = classify(page, indicators, self.pacing.wait_timeout).await?;
            debug!(target = "rdv.watch", outcome = %outcome, "{} search classified", tag);
            match outcome {
                SearchOutcome::NoSlotsAvailable => {
                    self.enter(WatchState::NoSlots);
                    info!(target = "rdv.watch", "{} no slots available", tag);
                }
                SearchOutcome::SlotFound => {
                    self.enter(WatchState::SlotFound);
                    report.slots_found += 1;
                    self.notify_slot(page).await?;
                    if self.auto_book && self.flow.supports_auto_booking() {
                        let outcome = self.book(page).await?;
                        return Ok(SessionEnd::BookingConfirmed(outcome));
                    }
                    // Not interruptible: one open slot window must not
                    // re-trigger alerts.
                    sleep(self.pacing.cooldown).await;
                }
                SearchOutcome::TransientPageError => return Err(WatchError::TransientPage),
                SearchOutcome::Unparseable => return Err(WatchError::Unparseable),
            }

            if !self.flag.is_running() {
                return Ok(SessionEnd::Cancelled);
            }
            sleep(self.pacing.jitter()).await;
        }
    }

    /// Audio cue plus full-page capture. The cue is best-effort and cannot
    /// fail; the capture is part of the record and its errors propagate.
    async fn notify_slot(&self, page: &dyn PageDriver) -> Result<()> {
        info!(target = "rdv.watch", "{} slot found", self.flow.site().tag());
        self.alert.ring();
        self.artifacts.capture(page, Artifact::SlotFound).await?;
        Ok(())
    }

    /// Races the booking sub-flow against the hold window. A hold that
    /// expires means the slot was likely lost to someone else; the session
    /// is rebuilt rather than the process ended.
    async fn book(&self, page: &dyn PageDriver) -> Result<BookingOutcome> {
        let tag = self.flow.site().tag();
        info!(target = "rdv.watch", "{} attempting auto-booking", tag);

        let attempt = timeout(
            self.pacing.booking_hold,
            self.flow.attempt_booking(page, &self.info),
        )
        .await;
        match attempt {
            Ok(Ok(mut outcome)) => {
                self.flag.stop();
                match self.artifacts.capture(page, Artifact::SlotConfirmed).await {
                    Ok(path) => outcome.screenshot = Some(path),
                    Err(err) => warn!(
                        target = "rdv.watch",
                        error = %err,
                        "{} confirmation screenshot failed", tag
                    ),
                }
                info!(target = "rdv.watch", "{} booking confirmed", tag);
                Ok(outcome)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(WatchError::BookingTimeout),
        }
    }

    async fn capture_diagnostic(&self, page: &dyn PageDriver) {
        let artifact = Artifact::SessionFailure(self.flow.site());
        if let Err(err) = self.artifacts.capture(page, artifact).await {
            warn!(
                target = "rdv.watch",
                error = %err,
                "{} diagnostic screenshot failed", self.flow.site().tag()
            );
        }
    }

    fn enter(&self, state: WatchState) {
        debug!(
            target = "rdv.watch",
            state = state.as_str(),
            "{} state change", self.flow.site().tag()
        );
    }
}

async fn close_session(session: &mut dyn BrowserSession, tag: &str) {
    if let Err(err) = session.close().await {
        warn!(target = "rdv.watch", error = %err, "{} session teardown failed", tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{Site, flow_for};
    use rdv_driver::scripted::ScriptedFactory;

    fn profile_without_contact() -> PersonalInfo {
        PersonalInfo {
            first_name: "Ada".into(),
            last_name: "Tremblay".into(),
            nam: "TREA 1234 5678".into(),
            card_seq_number: "01".into(),
            birth_day: "7".into(),
            birth_month: "5".into(),
            birth_year: "1990".into(),
            postal_code: "H2X 1Y4".into(),
            cellphone: None,
            email: None,
        }
    }

    #[test]
    fn auto_book_requires_contact_details_at_build_time() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let artifacts = ArtifactStore::new(tmp.path()).expect("store");
        let pacing = Pacing::for_site(Site::BonjourSante);

        let built = WatcherBuilder::new(
            flow_for(Site::BonjourSante, pacing),
            Box::new(ScriptedFactory::new()),
            profile_without_contact(),
            pacing,
            artifacts,
        )
        .auto_book(true)
        .build();
        match built {
            Ok(_) => panic!("build should fail without contact details"),
            Err(err) => assert!(matches!(err, WatchError::InvalidInput(_))),
        }
    }

    #[test]
    fn auto_book_on_a_non_booking_site_builds_fine() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let artifacts = ArtifactStore::new(tmp.path()).expect("store");
        let pacing = Pacing::for_site(Site::Rvsq);

        // The switch is ignored where the site cannot book; no contact
        // details are demanded.
        let watcher = WatcherBuilder::new(
            flow_for(Site::Rvsq, pacing),
            Box::new(ScriptedFactory::new()),
            profile_without_contact(),
            pacing,
            artifacts,
        )
        .auto_book(true)
        .build();
        assert!(watcher.is_ok());
    }
}
