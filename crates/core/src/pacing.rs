//! Delay and timeout profile for one automaton run.
//!
//! All timing lives here and is passed in at construction; no process-wide
//! testing-mode switches. The paced profile slows individual form steps
//! enough to follow a run by eye without changing any contract timing
//! (cool-down, booking hold, driver timeouts).

use std::time::Duration;

use rand::Rng;

use crate::flow::Site;

#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Pause between individual form interactions.
    pub step: Duration,
    /// Pause after page-changing actions, giving scripts time to settle.
    pub settle: Duration,
    /// Extra pause after triggering a search, for result areas that redraw
    /// in place with no readiness marker to wait on.
    pub search_settle: Duration,
    /// Bounds for the randomized delay between search iterations.
    pub jitter_min: Duration,
    pub jitter_max: Duration,
    /// Non-interruptible hold after a slot notification, so one open slot
    /// window does not re-trigger alerts.
    pub cooldown: Duration,
    /// How long the auto-booking sub-flow may run before the held slot is
    /// considered lost.
    pub booking_hold: Duration,
    pub nav_timeout: Duration,
    pub wait_timeout: Duration,
}

impl Pacing {
    /// Normal-speed profile with the site's jitter bounds.
    pub fn for_site(site: Site) -> Self {
        let (jitter_min, jitter_max) = site_jitter(site);
        Self {
            step: Duration::from_millis(200),
            settle: Duration::from_secs(2),
            search_settle: Duration::from_secs(5),
            jitter_min,
            jitter_max,
            cooldown: Duration::from_secs(240),
            booking_hold: Duration::from_secs(240),
            nav_timeout: Duration::from_secs(60),
            wait_timeout: Duration::from_secs(60),
        }
    }

    /// Slowed profile for watching a run step by step.
    pub fn paced(site: Site) -> Self {
        Self {
            step: Duration::from_millis(2000),
            settle: Duration::from_secs(3),
            ..Self::for_site(site)
        }
    }

    /// One randomized inter-search delay, uniform within the bounds.
    pub fn jitter(&self) -> Duration {
        let min = self.jitter_min.min(self.jitter_max);
        let max = self.jitter_min.max(self.jitter_max);
        let millis = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
        Duration::from_millis(millis as u64)
    }
}

fn site_jitter(site: Site) -> (Duration, Duration) {
    match site {
        Site::Rvsq => (Duration::from_millis(1000), Duration::from_millis(5000)),
        Site::BonjourSante => (Duration::from_millis(2000), Duration::from_millis(10000)),
    }
}
