//! RVSQ (Rendez-vous santé Québec) flow.
//!
//! The portal branches permanently after the identity form on whether the
//! insured person has a family doctor. The branch is detected once, right
//! after the Continue click, and drives the rest of the reach phase: the
//! family-doctor side goes through an extra GMF screen before the
//! proximity option, the no-doctor side exposes the distance combo
//! directly.

use rdv_driver::{PageDriver, WaitState};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::classify::{OutcomeIndicators, Probe};
use crate::error::{Result, WatchError};
use crate::flow::{FlowVariant, Site, SiteFlow};
use crate::pacing::Pacing;
use crate::profile::PersonalInfo;

use async_trait::async_trait;

const FORM_URL: &str = "https://rvsq.gouv.qc.ca/prendrerendezvous/Principale.aspx";
const COOKIE_ACCEPT: &str = "#btnToutAccepter";

const FIRST_NAME: &str = "#ctl00_ContentPlaceHolderMP_AssureForm_FirstName";
const LAST_NAME: &str = "#ctl00_ContentPlaceHolderMP_AssureForm_LastName";
const NAM: &str = "#ctl00_ContentPlaceHolderMP_AssureForm_NAM";
const CARD_SEQ: &str = "#ctl00_ContentPlaceHolderMP_AssureForm_CardSeqNumber";
const BIRTH_DAY: &str = "#ctl00_ContentPlaceHolderMP_AssureForm_Day";
const BIRTH_MONTH: &str = "#ctl00_ContentPlaceHolderMP_AssureForm_Month";
const BIRTH_YEAR: &str = "#ctl00_ContentPlaceHolderMP_AssureForm_Year";
const CONSENT: &str = "#AssureForm_CSTMT";
const CONTINUE: &str = "#ctl00_ContentPlaceHolderMP_myButton";
const CONTINUE_ENABLED: &str = "#ctl00_ContentPlaceHolderMP_myButton:not([disabled])";

const FAMILY_DOCTOR_OPTION: &str = "a.h-SelectAssureBtn.ctx-changer[data-type='1']";
const NO_DOCTOR_MARKER: &str = "text=pas de médecin de famille";
const NO_DOCTOR_OPTION: &str = "a.h-SelectAssureBtn.ctx-changer[data-type='3']";

const REASON_COMBO: &str = "#consultingReason";
/// Option value for "Consultation Urgente".
const URGENT_CONSULTATION: &str = "ac2a5fa4-8514-11ef-a759-005056b11d6c";

const SEARCH_BUTTON: &str = "button:has-text(\"Rechercher\")";
const GMF_OPTION: &str = "div.thumbnail.tmbArrow.tmbBtn.h-butType2dot2:has-text(\"Prendre rendez-vous avec un professionnel de la santé de mon groupe de médecine de famille (GMF)\")";
const PROXIMITY_OPTION: &str =
    "div.thumbnail.tmbArrow.tmbBtn.h-butType3:has-text(\"Prendre rendez-vous dans une clinique à proximité\")";

const PERIMETER_COMBO: &str = "#perimeterCombo";
/// Combo value for the 50 km radius.
const RADIUS_50KM: &str = "4";
const RADIUS_50KM_SCRIPT: &str = r#"document.getElementById("perimeterCombo").value = "4""#;

const POSTAL_CODE: &str = "#PostalCode";
const POSTAL_SEARCH_BUTTON: &str = "button.h-SearchButton.btn.btn-primary:has-text(\"Rechercher\")";

/// The result area redraws in place; there is no readiness marker, the
/// probes answer against whatever is currently shown.
static INDICATORS: OutcomeIndicators = OutcomeIndicators {
    frame: None,
    readiness: None,
    held_slot: &[],
    no_slots: &[
        Probe::Visible("text=Aucun rendez-vous répondant"),
        Probe::Visible("#clinicsWithNoDisponibilities"),
        Probe::Visible(
            "text=Aucun rendez-vous répondant à vos critères de recherche n'est disponible pour le moment.",
        ),
    ],
    result_list: &[Probe::Visible(
        "text=Les cliniques suivantes offrent des disponibilités pour votre rendez-vous :",
    )],
    error_banner: &[],
};

pub struct RvsqFlow {
    pacing: Pacing,
}

impl RvsqFlow {
    pub fn new(pacing: Pacing) -> Self {
        Self { pacing }
    }

    /// Resolves the family-doctor branch from the selection screen. Neither
    /// marker appearing means the screen is not the one this flow knows.
    async fn detect_variant(&self, page: &dyn PageDriver) -> Result<FlowVariant> {
        let has_doctor = page.is_visible(FAMILY_DOCTOR_OPTION).await?;
        let no_doctor = page.is_visible(NO_DOCTOR_MARKER).await?;
        if no_doctor {
            Ok(FlowVariant::NoFamilyDoctor)
        } else if has_doctor {
            Ok(FlowVariant::FamilyDoctor)
        } else {
            info!(target = "rdv", "[RVSQ] could not determine family doctor status");
            Err(WatchError::Unparseable)
        }
    }

    /// Sets the 50 km radius. The combo sometimes refuses a direct select,
    /// so fall through: select, click then select, finally write the value
    /// from script.
    async fn set_radius(&self, page: &dyn PageDriver) -> Result<()> {
        sleep(self.pacing.step).await;
        if page.select(PERIMETER_COMBO, RADIUS_50KM).await.is_ok() {
            sleep(self.pacing.step).await;
            return Ok(());
        }

        debug!(target = "rdv", "[RVSQ] direct radius select failed, clicking the combo first");
        sleep(self.pacing.step).await;
        if page.click(PERIMETER_COMBO).await.is_ok()
            && page.select(PERIMETER_COMBO, RADIUS_50KM).await.is_ok()
        {
            sleep(self.pacing.step).await;
            return Ok(());
        }

        debug!(target = "rdv", "[RVSQ] setting radius from script");
        page.evaluate(RADIUS_50KM_SCRIPT).await?;
        sleep(self.pacing.step).await;
        Ok(())
    }

    async fn fill_identity(&self, page: &dyn PageDriver, info: &PersonalInfo) -> Result<()> {
        let step = self.pacing.step;

        info!(target = "rdv", "[RVSQ] filling insured person form");
        page.fill(FIRST_NAME, &info.first_name).await?;
        sleep(step).await;
        page.fill(LAST_NAME, &info.last_name).await?;
        sleep(step).await;
        page.fill(NAM, &info.nam).await?;
        sleep(step).await;
        page.fill(CARD_SEQ, &info.card_seq_number).await?;
        sleep(step).await;
        page.fill(BIRTH_DAY, &info.birth_day).await?;
        sleep(step).await;
        page.select(BIRTH_MONTH, &info.birth_month).await?;
        sleep(step).await;
        page.fill(BIRTH_YEAR, &info.birth_year).await?;
        sleep(step).await;

        info!(target = "rdv", "[RVSQ] checking consent checkbox");
        page.check(CONSENT, false).await?;
        sleep(self.pacing.settle).await;
        Ok(())
    }
}

#[async_trait]
impl SiteFlow for RvsqFlow {
    fn site(&self) -> Site {
        Site::Rvsq
    }

    async fn reach_search_screen(
        &self,
        page: &dyn PageDriver,
        info: &PersonalInfo,
    ) -> Result<FlowVariant> {
        let p = &self.pacing;

        info!(target = "rdv", "[RVSQ] navigating to form page");
        page.navigate(FORM_URL, p.nav_timeout).await?;
        info!(target = "rdv", "[RVSQ] accepting cookies");
        page.click(COOKIE_ACCEPT).await?;

        self.fill_identity(page, info).await?;

        page.wait_for(CONTINUE_ENABLED, WaitState::Visible, p.wait_timeout)
            .await?;
        sleep(p.step).await;
        info!(target = "rdv", "[RVSQ] clicking continue");
        page.click(CONTINUE).await?;
        sleep(p.settle).await;

        let variant = self.detect_variant(page).await?;
        info!(target = "rdv", variant = %variant, "[RVSQ] family doctor status resolved");
        sleep(p.settle).await;
        match variant {
            FlowVariant::NoFamilyDoctor => page.click(NO_DOCTOR_OPTION).await?,
            _ => page.click(FAMILY_DOCTOR_OPTION).await?,
        }
        sleep(p.settle).await;

        info!(target = "rdv", "[RVSQ] selecting urgent consultation");
        page.wait_for(REASON_COMBO, WaitState::Visible, p.wait_timeout)
            .await?;
        sleep(p.settle).await;
        page.click(REASON_COMBO).await?;
        sleep(p.step).await;
        page.select(REASON_COMBO, URGENT_CONSULTATION).await?;
        sleep(p.settle).await;

        if variant == FlowVariant::NoFamilyDoctor {
            page.wait_for(PERIMETER_COMBO, WaitState::Visible, p.wait_timeout)
                .await?;
            sleep(p.step).await;
        }

        info!(target = "rdv", "[RVSQ] launching first search");
        sleep(p.settle).await;
        page.click(SEARCH_BUTTON).await?;
        sleep(p.settle).await;

        if variant == FlowVariant::FamilyDoctor {
            info!(target = "rdv", "[RVSQ] routing through the GMF screen");
            sleep(p.settle).await;
            page.click(GMF_OPTION).await?;
            sleep(p.settle).await;
            page.click(SEARCH_BUTTON).await?;
            sleep(p.settle).await;
            page.click(PROXIMITY_OPTION).await?;
            sleep(p.settle).await;
        } else {
            sleep(p.settle).await;
            page.click(SEARCH_BUTTON).await?;
            sleep(p.settle).await;
        }

        info!(target = "rdv", "[RVSQ] setting search radius");
        self.set_radius(page).await?;
        Ok(variant)
    }

    async fn submit_search(&self, page: &dyn PageDriver, postal_code: &str) -> Result<()> {
        let p = &self.pacing;
        sleep(p.step).await;
        page.fill(POSTAL_CODE, postal_code).await?;
        sleep(p.step).await;
        debug!(target = "rdv", "[RVSQ] clicking search button");
        page.click(POSTAL_SEARCH_BUTTON).await?;
        sleep(p.settle).await;
        sleep(p.search_settle).await;
        Ok(())
    }

    fn outcome_indicators(&self) -> &'static OutcomeIndicators {
        &INDICATORS
    }
}
