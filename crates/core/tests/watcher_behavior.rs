//! End-to-end automaton behavior over scripted sessions: cancellation,
//! recovery rebuilds, teardown ordering and the booking endgame.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rdv_driver::PageDriver;
use rdv_driver::scripted::{DriverCall, LifecycleEvent, ScriptedController, ScriptedFactory};
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

use rdv::artifacts::ArtifactStore;
use rdv::classify::{OutcomeIndicators, Probe};
use rdv::notify::Alert;
use rdv::outcome::BookingOutcome;
use rdv::watcher::WatcherBuilder;
use rdv::{
    FlowVariant, Pacing, PersonalInfo, Result, RunningFlag, Site, SiteFlow, flow_for,
};

// Controls the reach phase waits on and the outcome markers, as rendered
// by the portals themselves.
const RVSQ_CONTINUE_ENABLED: &str = "#ctl00_ContentPlaceHolderMP_myButton:not([disabled])";
const RVSQ_REASON_COMBO: &str = "#consultingReason";
const RVSQ_FAMILY_DOCTOR: &str = "a.h-SelectAssureBtn.ctx-changer[data-type='1']";
const RVSQ_POSTAL_CODE: &str = "#PostalCode";
const RVSQ_NO_SLOTS: &str = "#clinicsWithNoDisponibilities";
const RVSQ_RESULT_LIST: &str =
    "text=Les cliniques suivantes offrent des disponibilités pour votre rendez-vous :";

const HUB: &str = "iframe[src*='hub.bonjour-sante.ca']";
const HUB_READY: &str = "div.title-criteria-container";
const HUB_HELD_SLOT: &str = "app-locked-walkin-availability[data-test=\"locked-walkin-availability\"]";
const HUB_CONFIRM_CHECKBOX: &str = "#confirmation-checkbox-input";
const HUB_CONFIRMATION_ALERT: &str = "lib-alert";

fn fast_pacing(site: Site) -> Pacing {
    Pacing {
        step: Duration::ZERO,
        settle: Duration::ZERO,
        search_settle: Duration::ZERO,
        jitter_min: Duration::from_millis(1),
        jitter_max: Duration::from_millis(2),
        cooldown: Duration::from_millis(1),
        booking_hold: Duration::from_millis(50),
        ..Pacing::for_site(site)
    }
}

fn profile() -> PersonalInfo {
    PersonalInfo {
        first_name: "Ada".into(),
        last_name: "Tremblay".into(),
        nam: "TREA 1234 5678".into(),
        card_seq_number: "01".into(),
        birth_day: "7".into(),
        birth_month: "5".into(),
        birth_year: "1990".into(),
        postal_code: "H2X 1Y4".into(),
        cellphone: Some("5145551234".into()),
        email: Some("ada@example.test".into()),
    }
}

fn prime_rvsq_reach(controller: &ScriptedController) {
    controller.show(RVSQ_CONTINUE_ENABLED);
    controller.show(RVSQ_REASON_COMBO);
    controller.show(RVSQ_FAMILY_DOCTOR);
}

fn prime_bonjour_reach(controller: &ScriptedController) {
    controller.show(HUB);
    controller.show_in(HUB, HUB_READY);
}

fn postal_submissions(controller: &ScriptedController) -> usize {
    controller
        .calls()
        .iter()
        .filter(|c| matches!(c, DriverCall::Fill { selector, .. } if selector == RVSQ_POSTAL_CODE))
        .count()
}

fn files_with_prefix(dir: &std::path::Path, prefix: &str) -> usize {
    std::fs::read_dir(dir)
        .expect("artifact dir should exist")
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.starts_with(prefix))
                .unwrap_or(false)
        })
        .count()
}

async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let waited = timeout(Duration::from_secs(5), async {
        while !cond() {
            sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

#[derive(Clone, Default)]
struct CountingAlert(Arc<AtomicUsize>);

impl CountingAlert {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Alert for CountingAlert {
    fn ring(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn already_cleared_flag_ends_the_watch_without_a_session() {
    let tmp = TempDir::new().expect("tempdir");
    let factory = ScriptedFactory::new();
    let probe = factory.clone();
    let flag = RunningFlag::new();
    flag.stop();

    let pacing = fast_pacing(Site::Rvsq);
    let watcher = WatcherBuilder::new(
        flow_for(Site::Rvsq, pacing),
        Box::new(factory),
        profile(),
        pacing,
        ArtifactStore::new(tmp.path()).expect("store"),
    )
    .flag(flag)
    .alert(Box::new(CountingAlert::default()))
    .build()
    .expect("build");

    let report = watcher.run().await.expect("run");
    assert_eq!(report.sessions, 0);
    assert_eq!(report.searches, 0);
    assert!(probe.events().is_empty());
}

#[tokio::test]
async fn no_slots_rounds_continue_until_the_flag_clears() {
    let tmp = TempDir::new().expect("tempdir");
    let factory = ScriptedFactory::with_setup(|_, controller| {
        prime_rvsq_reach(controller);
        controller.show(RVSQ_NO_SLOTS);
    });
    let probe = factory.clone();
    let flag = RunningFlag::new();
    let alert = CountingAlert::default();

    let pacing = fast_pacing(Site::Rvsq);
    let watcher = WatcherBuilder::new(
        flow_for(Site::Rvsq, pacing),
        Box::new(factory),
        profile(),
        pacing,
        ArtifactStore::new(tmp.path()).expect("store"),
    )
    .flag(flag.clone())
    .alert(Box::new(alert.clone()))
    .build()
    .expect("build");

    let run = tokio::spawn(async move { watcher.run().await });

    eventually("three search rounds", || {
        probe
            .controllers()
            .first()
            .map(|c| postal_submissions(c) >= 3)
            .unwrap_or(false)
    })
    .await;
    flag.stop();

    let report = timeout(Duration::from_secs(5), run)
        .await
        .expect("watch should stop soon after the flag clears")
        .expect("task")
        .expect("run");

    // No-slots rounds never ring, never capture, never rebuild.
    assert_eq!(report.sessions, 1);
    assert!(report.searches >= 3);
    assert_eq!(report.slots_found, 0);
    assert_eq!(report.recoveries, 0);
    assert_eq!(alert.count(), 0);
    assert_eq!(
        probe.events(),
        vec![
            LifecycleEvent::Opened(0),
            LifecycleEvent::PageClosed(0),
            LifecycleEvent::BrowserClosed(0),
        ]
    );
}

#[tokio::test]
async fn unrecognized_result_page_rebuilds_with_a_diagnostic_screenshot() {
    let tmp = TempDir::new().expect("tempdir");
    let flag = RunningFlag::new();
    let setup_flag = flag.clone();
    // First session reaches the search screen but renders no known outcome
    // marker; the second session is primed and asked to stop.
    let factory = ScriptedFactory::with_setup(move |index, controller| {
        prime_rvsq_reach(controller);
        if index >= 1 {
            controller.show(RVSQ_NO_SLOTS);
            setup_flag.stop();
        }
    });
    let probe = factory.clone();

    let pacing = fast_pacing(Site::Rvsq);
    let watcher = WatcherBuilder::new(
        flow_for(Site::Rvsq, pacing),
        Box::new(factory),
        profile(),
        pacing,
        ArtifactStore::new(tmp.path()).expect("store"),
    )
    .flag(flag)
    .alert(Box::new(CountingAlert::default()))
    .build()
    .expect("build");

    let report = watcher.run().await.expect("run");

    assert_eq!(report.sessions, 2);
    assert_eq!(report.recoveries, 1);
    assert_eq!(report.searches, 1);
    assert_eq!(
        files_with_prefix(&tmp.path().join("error_screenshots"), "rvsq_error_"),
        1
    );
    // Teardown is page first, browser second, exactly once per session.
    assert_eq!(
        probe.events(),
        vec![
            LifecycleEvent::Opened(0),
            LifecycleEvent::PageClosed(0),
            LifecycleEvent::BrowserClosed(0),
            LifecycleEvent::Opened(1),
            LifecycleEvent::PageClosed(1),
            LifecycleEvent::BrowserClosed(1),
        ]
    );
}

#[tokio::test]
async fn each_discovery_rings_the_alert_and_saves_a_capture() {
    let tmp = TempDir::new().expect("tempdir");
    let factory = ScriptedFactory::with_setup(|_, controller| {
        prime_rvsq_reach(controller);
        controller.show(RVSQ_RESULT_LIST);
    });
    let flag = RunningFlag::new();
    let alert = CountingAlert::default();

    let pacing = fast_pacing(Site::Rvsq);
    let watcher = WatcherBuilder::new(
        flow_for(Site::Rvsq, pacing),
        Box::new(factory),
        profile(),
        pacing,
        ArtifactStore::new(tmp.path()).expect("store"),
    )
    .flag(flag.clone())
    .alert(Box::new(alert.clone()))
    .build()
    .expect("build");

    let run = tokio::spawn(async move { watcher.run().await });

    let rings = alert.clone();
    eventually("two slot discoveries", || rings.count() >= 2).await;
    flag.stop();

    let report = timeout(Duration::from_secs(5), run)
        .await
        .expect("watch should stop soon after the flag clears")
        .expect("task")
        .expect("run");

    assert!(report.slots_found >= 2);
    assert_eq!(report.sessions, 1);
    assert_eq!(report.recoveries, 0);
    // Without auto-booking every discovery is search, alert, capture,
    // cool-down; the counts stay in lockstep.
    assert_eq!(report.searches, report.slots_found);
    assert_eq!(alert.count(), report.slots_found as usize);
    assert_eq!(
        files_with_prefix(&tmp.path().join("screenshots"), "slot_found_"),
        report.slots_found as usize
    );
    assert!(report.booking.is_none());
}

#[tokio::test]
async fn booking_ends_the_watch_and_records_the_confirmation() {
    let tmp = TempDir::new().expect("tempdir");
    let factory = ScriptedFactory::with_setup(|_, controller| {
        prime_bonjour_reach(controller);
        controller.set_count_in(HUB, HUB_HELD_SLOT, 1);
        controller.show_in(HUB, HUB_CONFIRM_CHECKBOX);
        controller.show_in(HUB, HUB_CONFIRMATION_ALERT);
    });
    let probe = factory.clone();
    let flag = RunningFlag::new();
    let alert = CountingAlert::default();

    let pacing = fast_pacing(Site::BonjourSante);
    let watcher = WatcherBuilder::new(
        flow_for(Site::BonjourSante, pacing),
        Box::new(factory),
        profile(),
        pacing,
        ArtifactStore::new(tmp.path()).expect("store"),
    )
    .flag(flag.clone())
    .alert(Box::new(alert.clone()))
    .auto_book(true)
    .build()
    .expect("build");

    let report = watcher.run().await.expect("run");

    let booking = report.booking.expect("booking should be recorded");
    let shot = booking.screenshot.expect("confirmation capture");
    assert!(shot.exists());
    assert!(
        shot.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("slot_confirmed_"))
            .unwrap_or(false)
    );
    assert_eq!(report.sessions, 1);
    assert_eq!(report.slots_found, 1);
    assert_eq!(alert.count(), 1);
    // The watcher clears the shared flag itself once the slot is booked.
    assert!(!flag.is_running());
    assert_eq!(
        files_with_prefix(&tmp.path().join("screenshots"), "slot_found_"),
        1
    );
    assert_eq!(
        probe.events(),
        vec![
            LifecycleEvent::Opened(0),
            LifecycleEvent::PageClosed(0),
            LifecycleEvent::BrowserClosed(0),
        ]
    );
}

/// Flow double whose booking never returns, for exercising the hold
/// window.
struct StallingBooker;

static STALL_INDICATORS: OutcomeIndicators = OutcomeIndicators {
    frame: None,
    readiness: None,
    held_slot: &[Probe::Visible("#held-for-you")],
    no_slots: &[],
    result_list: &[],
    error_banner: &[],
};

#[async_trait]
impl SiteFlow for StallingBooker {
    fn site(&self) -> Site {
        Site::BonjourSante
    }

    async fn reach_search_screen(
        &self,
        _page: &dyn PageDriver,
        _info: &PersonalInfo,
    ) -> Result<FlowVariant> {
        Ok(FlowVariant::Unbranched)
    }

    async fn submit_search(&self, _page: &dyn PageDriver, _postal_code: &str) -> Result<()> {
        Ok(())
    }

    fn outcome_indicators(&self) -> &'static OutcomeIndicators {
        &STALL_INDICATORS
    }

    fn supports_auto_booking(&self) -> bool {
        true
    }

    async fn attempt_booking(
        &self,
        _page: &dyn PageDriver,
        _info: &PersonalInfo,
    ) -> Result<BookingOutcome> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn booking_hold_expiry_rebuilds_instead_of_ending_the_watch() {
    let tmp = TempDir::new().expect("tempdir");
    let flag = RunningFlag::new();
    let setup_flag = flag.clone();
    let factory = ScriptedFactory::with_setup(move |index, controller| {
        controller.show("#held-for-you");
        if index >= 1 {
            setup_flag.stop();
        }
    });
    let probe = factory.clone();
    let alert = CountingAlert::default();

    let pacing = fast_pacing(Site::BonjourSante);
    let watcher = WatcherBuilder::new(
        Box::new(StallingBooker),
        Box::new(factory),
        profile(),
        pacing,
        ArtifactStore::new(tmp.path()).expect("store"),
    )
    .flag(flag)
    .alert(Box::new(alert.clone()))
    .auto_book(true)
    .build()
    .expect("build");

    let report = watcher.run().await.expect("run");

    // The expired hold costs the session, not the watch.
    assert_eq!(report.sessions, 2);
    assert_eq!(report.recoveries, 1);
    assert_eq!(report.slots_found, 1);
    assert!(report.booking.is_none());
    assert_eq!(alert.count(), 1);
    assert_eq!(
        files_with_prefix(&tmp.path().join("error_screenshots"), "bonjour_sante_error_"),
        1
    );
    assert_eq!(probe.sessions_opened(), 2);
}
