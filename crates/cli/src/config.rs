//! TOML configuration for the `rdvw` binary.
//!
//! One file carries the personal record the forms are filled from plus
//! optional knobs: which portal(s) to watch, auto-booking, launch options
//! for the browser sidecar and pacing overrides. Command-line flags win
//! over their config counterparts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use rdv::{Pacing, PersonalInfo, Site};
use rdv_playwright::LaunchOptions;
use serde::Deserialize;

use crate::cli::SiteChoice;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The record the site forms are filled from.
    pub personal_info: PersonalInfo,

    /// Portal(s) to watch when `--site` is not given.
    pub site: Option<SiteChoice>,

    #[serde(default)]
    pub auto_book: bool,

    #[serde(default)]
    pub paced: bool,

    /// Root under which the screenshot directories are created. Defaults
    /// to the working directory.
    pub artifacts_dir: Option<PathBuf>,

    #[serde(default)]
    pub launch: LaunchSection,

    #[serde(default)]
    pub pacing: PacingSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaunchSection {
    /// Node interpreter for the driver sidecar.
    pub node_binary: Option<PathBuf>,
    #[serde(default)]
    pub headless: bool,
    pub slow_mo_ms: Option<u64>,
}

/// Optional overrides over a site's standard pacing profile. Everything
/// not set here keeps the profile value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PacingSection {
    pub jitter_min_ms: Option<u64>,
    pub jitter_max_ms: Option<u64>,
    pub cooldown_secs: Option<u64>,
    pub booking_hold_secs: Option<u64>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("cannot parse config file {}", path.display()))?;
        Ok(config)
    }

    /// The pacing profile for `site`, slowed when `paced`, with any
    /// configured overrides applied on top.
    pub fn pacing_for(&self, site: Site, paced: bool) -> Pacing {
        let mut pacing = if paced {
            Pacing::paced(site)
        } else {
            Pacing::for_site(site)
        };
        if let Some(ms) = self.pacing.jitter_min_ms {
            pacing.jitter_min = Duration::from_millis(ms);
        }
        if let Some(ms) = self.pacing.jitter_max_ms {
            pacing.jitter_max = Duration::from_millis(ms);
        }
        if let Some(secs) = self.pacing.cooldown_secs {
            pacing.cooldown = Duration::from_secs(secs);
        }
        if let Some(secs) = self.pacing.booking_hold_secs {
            pacing.booking_hold = Duration::from_secs(secs);
        }
        pacing
    }

    pub fn launch_options(&self) -> LaunchOptions {
        let defaults = LaunchOptions::default();
        LaunchOptions {
            node_binary: self
                .launch
                .node_binary
                .clone()
                .unwrap_or(defaults.node_binary),
            headless: self.launch.headless,
            slow_mo: self
                .launch
                .slow_mo_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.slow_mo),
        }
    }

    pub fn artifacts_root(&self) -> PathBuf {
        self.artifacts_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[personal_info]
first_name = "Ada"
last_name = "Tremblay"
nam = "TREA 1234 5678"
card_seq_number = "01"
birth_day = "7"
birth_month = "5"
birth_year = "1990"
postal_code = "H2X 1Y4"
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.personal_info.first_name, "Ada");
        assert!(config.personal_info.cellphone.is_none());
        assert!(config.site.is_none());
        assert!(!config.auto_book);
        assert!(!config.paced);
        assert!(config.artifacts_dir.is_none());
        assert_eq!(config.artifacts_root(), PathBuf::from("."));

        let options = config.launch_options();
        assert!(!options.headless);
        assert_eq!(options.node_binary, PathBuf::from("node"));
        assert_eq!(options.slow_mo, Duration::ZERO);
    }

    #[test]
    fn full_config_round_trips() {
        let text = format!(
            r#"
site = "bonjour-sante"
auto_book = true
paced = true
artifacts_dir = "/var/tmp/rdvw"
{MINIMAL}
cellphone = "5145551234"
email = "ada@example.test"

[launch]
node_binary = "/usr/local/bin/node"
headless = true
slow_mo_ms = 250

[pacing]
jitter_min_ms = 500
jitter_max_ms = 1500
cooldown_secs = 60
booking_hold_secs = 120
"#
        );
        let config: Config = toml::from_str(&text).unwrap();
        assert_eq!(config.site, Some(SiteChoice::BonjourSante));
        assert!(config.auto_book);
        assert!(config.paced);
        assert_eq!(
            config.personal_info.cellphone.as_deref(),
            Some("5145551234")
        );

        let options = config.launch_options();
        assert!(options.headless);
        assert_eq!(options.node_binary, PathBuf::from("/usr/local/bin/node"));
        assert_eq!(options.slow_mo, Duration::from_millis(250));
    }

    #[test]
    fn pacing_overrides_apply_over_the_profile() {
        let text = format!(
            "{MINIMAL}\n[pacing]\njitter_min_ms = 100\njitter_max_ms = 200\ncooldown_secs = 10\n"
        );
        let config: Config = toml::from_str(&text).unwrap();
        let pacing = config.pacing_for(Site::Rvsq, false);
        assert_eq!(pacing.jitter_min, Duration::from_millis(100));
        assert_eq!(pacing.jitter_max, Duration::from_millis(200));
        assert_eq!(pacing.cooldown, Duration::from_secs(10));
        // Untouched knobs keep the profile values.
        assert_eq!(pacing.booking_hold, Pacing::for_site(Site::Rvsq).booking_hold);
    }

    #[test]
    fn paced_profile_survives_overrides() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        let normal = config.pacing_for(Site::BonjourSante, false);
        let paced = config.pacing_for(Site::BonjourSante, true);
        assert!(paced.step > normal.step);
        assert_eq!(paced.cooldown, normal.cooldown);
    }

    #[test]
    fn load_reports_the_failing_path() {
        let missing = Config::load(Path::new("/nonexistent/rdvw.toml")).unwrap_err();
        assert!(format!("{missing:#}").contains("/nonexistent/rdvw.toml"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rdvw.toml");
        std::fs::write(&path, "site = 12").unwrap();
        let bad = Config::load(&path).unwrap_err();
        assert!(format!("{bad:#}").contains("rdvw.toml"));
    }

    #[test]
    fn config_file_on_disk_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rdvw.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.personal_info.postal_code, "H2X 1Y4");
    }
}
