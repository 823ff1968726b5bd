//! The run loop: one watcher task per selected portal.
//!
//! All watchers share one cancellation flag, so ctrl-c stops every site
//! and a confirmed booking on one site ends the others as well.

use anyhow::Context;
use rdv::{ArtifactStore, RunningFlag, Site, WatchReport, Watcher, WatcherBuilder, flow_for};
use rdv_playwright::PlaywrightFactory;
use tracing::{error, info, warn};

use crate::cli::{Cli, SiteChoice};
use crate::config::Config;

pub async fn run(args: Cli) -> anyhow::Result<()> {
    let config = Config::load(&args.config)?;
    let choice = args.site.or(config.site).unwrap_or(SiteChoice::Rvsq);
    let auto_book = args.auto_book || config.auto_book;
    let paced = args.paced || config.paced;

    let sites = choice.sites();
    let described: Vec<&str> = sites.iter().map(Site::slug).collect();
    info!(
        target = "rdv",
        "watching {}; auto-book {}, paced {}",
        described.join(" and "),
        if auto_book { "on" } else { "off" },
        if paced { "on" } else { "off" }
    );

    let flag = RunningFlag::new();
    spawn_stop_on_ctrl_c(flag.clone());

    let mut handles = Vec::new();
    for site in sites {
        let watcher = build_watcher(&config, site, auto_book, paced, flag.clone())
            .with_context(|| format!("cannot start the {site} watcher"))?;
        handles.push((site, tokio::spawn(async move { watcher.run().await })));
    }

    let mut failures = 0;
    for (site, handle) in handles {
        match handle.await {
            Ok(Ok(report)) => log_report(site, &report),
            Ok(Err(err)) => {
                error!(target = "rdv", error = %err, "{} watch failed", site.tag());
                failures += 1;
            }
            Err(err) => {
                error!(target = "rdv", error = %err, "{} watch task panicked", site.tag());
                failures += 1;
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{failures} watcher(s) failed");
    }
    Ok(())
}

fn build_watcher(
    config: &Config,
    site: Site,
    auto_book: bool,
    paced: bool,
    flag: RunningFlag,
) -> anyhow::Result<Watcher> {
    let pacing = config.pacing_for(site, paced);
    let artifacts = ArtifactStore::new(config.artifacts_root())
        .context("cannot create the screenshot directories")?;
    let factory = PlaywrightFactory::new(config.launch_options());
    let watcher = WatcherBuilder::new(
        flow_for(site, pacing),
        Box::new(factory),
        config.personal_info.clone(),
        pacing,
        artifacts,
    )
    .flag(flag)
    .auto_book(auto_book)
    .build()?;
    Ok(watcher)
}

/// First interrupt asks the watchers to stop at their next poll point; a
/// second one exits without waiting for teardown.
fn spawn_stop_on_ctrl_c(flag: RunningFlag) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!(target = "rdv", "stop requested; finishing the current step");
                flag.stop();
            }
            Err(err) => {
                warn!(target = "rdv", error = %err, "cannot listen for ctrl-c");
                return;
            }
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target = "rdv", "second interrupt; exiting immediately");
            std::process::exit(130);
        }
    });
}

fn log_report(site: Site, report: &WatchReport) {
    info!(
        target = "rdv",
        "{} watch ended: {} searches over {} sessions, {} slot hits, {} recoveries",
        site.tag(),
        report.searches,
        report.sessions,
        report.slots_found,
        report.recoveries
    );
    if let Some(booking) = &report.booking {
        match &booking.screenshot {
            Some(path) => info!(
                target = "rdv",
                "{} appointment booked at {}; confirmation saved to {}",
                site.tag(),
                booking.confirmed_at.format("%Y-%m-%d %H:%M:%S"),
                path.display()
            ),
            None => info!(
                target = "rdv",
                "{} appointment booked at {}",
                site.tag(),
                booking.confirmed_at.format("%Y-%m-%d %H:%M:%S")
            ),
        }
    }
}
