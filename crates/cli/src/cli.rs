use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use rdv::Site;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "rdvw")]
#[command(about = "Watches Québec appointment portals and alerts when a slot opens")]
#[command(version)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "rdvw.toml", value_name = "FILE")]
    pub config: PathBuf,

    /// Portal(s) to watch; overrides the config file
    #[arg(short, long, value_enum)]
    pub site: Option<SiteChoice>,

    /// Book the first discovered slot automatically (Bonjour Santé only)
    #[arg(long)]
    pub auto_book: bool,

    /// Slow every form step down enough to follow the run by eye
    #[arg(long)]
    pub paced: bool,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Which portal(s) to watch. Also accepted in the config file under the
/// `site` key, spelled the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteChoice {
    Rvsq,
    BonjourSante,
    Both,
}

impl SiteChoice {
    /// Concrete sites, in spawn order.
    pub fn sites(&self) -> Vec<Site> {
        match self {
            SiteChoice::Rvsq => vec![Site::Rvsq],
            SiteChoice::BonjourSante => vec![Site::BonjourSante],
            SiteChoice::Both => vec![Site::Rvsq, Site::BonjourSante],
        }
    }
}
