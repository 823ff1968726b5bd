//! Bonjour Santé flow.
//!
//! The portal collects the patient number and postal code on the main
//! page, then hands the rest of the flow to a booking widget inside the
//! hub iframe: identity confirmation, walk-in criteria (date, 50 km
//! radius), search results. Search rounds are re-triggered through the
//! widget's own "modify search criteria" link. This is the one site with
//! an auto-booking sub-flow for a held slot.

use chrono::Local;
use rdv_driver::{FrameRef, PageDriver, WaitState};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::classify::{OutcomeIndicators, Probe};
use crate::error::{Result, WatchError};
use crate::flow::{FlowVariant, Site, SiteFlow};
use crate::outcome::BookingOutcome;
use crate::pacing::Pacing;
use crate::profile::{PersonalInfo, format_phone_number};

use async_trait::async_trait;

const CLINIC_URL: &str = "https://bonjour-sante.ca/uno/clinique";
const COOKIE_ACCEPT: &str = "#didomi-notice-agree-button";
const POSTAL_CATEGORY: &str = "div[data-test='postalCodeCategoryButton']";
const PATIENT_NUMBER_INPUT: &str = "#patient-nam-input";
const POSTAL_SEARCH_INPUT: &str = "#postal-code-search-input";
const POSTAL_SEARCH_BUTTON: &str = "button[data-test='searchPostalCodeButton']";

const HUB_FRAME: &str = "iframe[src*='hub.bonjour-sante.ca']";
const HUB_NAM: &str = "input#healthInsuranceNumber";
const HUB_NAM_SEQUENCE: &str = "input#healthInsuranceNumberSequence";
const HUB_FIRST_NAME: &str = "input#firstName";
const HUB_LAST_NAME: &str = "input#lastName";
const HUB_CONFIRM: &str = "button#confirm";
const HUB_CONTINUE: &str = "button#continue";

const WALKIN_RADIO: &str = "mat-radio-button#mat-radio-2";
const DATE_INPUT: &str = "#mat-input-0";
const RANGE_SLIDER: &str = "input[type='range']";
/// Position 2 on the slider maps to the 50 km stop. The control ignores
/// synthetic keystrokes, so the value is written from script and the
/// framework is woken up with explicit input/change events.
const SLIDER_SET_50KM: &str = "(element) => element.value = '2'";
const SLIDER_FIRE_INPUT: &str = "(element) => element.dispatchEvent(new Event('input'))";
const SLIDER_FIRE_CHANGE: &str = "(element) => element.dispatchEvent(new Event('change'))";

const NEW_SEARCH: &str = "[data-test=\"make-new-search\"]";

const CONFIRM_SELECTION: &str = "button[data-test=\"confirm-selection-button\"]";
const CONFIRM_CHECKBOX: &str = "#confirmation-checkbox-input";
const CHECKBOX_WRAPPER: &str = "div.mdc-checkbox";
const CHECKBOX_LABEL: &str = "label[for=\"confirmation-checkbox-input\"]";
const CELLPHONE_INPUT: &str = "input#cellPhone";
const EMAIL_INPUT: &str = "input#email";
const REASON_SELECT: &str = "select#reasons";
/// Reason value for "Autres".
const REASON_OTHER: &str = "28";
const NATIVE_CHECKBOX_CLICK: &str = "element => element.click()";
const REGISTRATION_SUBMIT: &str = "button[data-test=\"registration-dialog-submit-btn\"]";
const CONFIRMATION_ALERT: &str = "lib-alert";

static INDICATORS: OutcomeIndicators = OutcomeIndicators {
    frame: Some(HUB_FRAME),
    readiness: Some("div.title-criteria-container"),
    held_slot: &[
        Probe::Present("app-locked-walkin-availability[data-test=\"locked-walkin-availability\"]"),
        Probe::ContentContains("Consultation réservée pour vous"),
    ],
    no_slots: &[Probe::TextContains {
        selector: "span.label-message",
        needle: "Aucun rendez-vous ne correspond à vos critères de recherche",
    }],
    result_list: &[],
    error_banner: &[Probe::Present("div.t-alert-content")],
};

/// Ordered consent-checkbox interaction strategies. The widget's checkbox
/// is a Material control whose clickable surface varies between releases;
/// strategies are tried in order and the first success wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsentStrategy {
    /// Click the Material wrapper around the checkbox.
    ClickWrapper,
    /// Click the label bound to the checkbox.
    ClickLabel,
    /// Force-check the underlying input, bypassing actionability.
    ForceCheck,
    /// Invoke the input's native click from script.
    NativeClick,
}

const CONSENT_STRATEGIES: [ConsentStrategy; 4] = [
    ConsentStrategy::ClickWrapper,
    ConsentStrategy::ClickLabel,
    ConsentStrategy::ForceCheck,
    ConsentStrategy::NativeClick,
];

impl ConsentStrategy {
    fn name(&self) -> &'static str {
        match self {
            ConsentStrategy::ClickWrapper => "click-wrapper",
            ConsentStrategy::ClickLabel => "click-label",
            ConsentStrategy::ForceCheck => "force-check",
            ConsentStrategy::NativeClick => "native-click",
        }
    }
}

pub struct BonjourSanteFlow {
    pacing: Pacing,
}

impl BonjourSanteFlow {
    pub fn new(pacing: Pacing) -> Self {
        Self { pacing }
    }

    async fn acknowledge_consent(&self, hub: &FrameRef<'_>) -> Result<()> {
        let mut last_err = None;
        for strategy in CONSENT_STRATEGIES {
            let attempt = match strategy {
                ConsentStrategy::ClickWrapper => hub.click(CHECKBOX_WRAPPER).await,
                ConsentStrategy::ClickLabel => hub.click(CHECKBOX_LABEL).await,
                ConsentStrategy::ForceCheck => hub.check(CONFIRM_CHECKBOX, true).await,
                ConsentStrategy::NativeClick => hub
                    .eval_on(CONFIRM_CHECKBOX, NATIVE_CHECKBOX_CLICK)
                    .await
                    .map(drop),
            };
            match attempt {
                Ok(()) => {
                    debug!(
                        target = "rdv",
                        strategy = strategy.name(),
                        "[BonjourSante] consent checkbox acknowledged"
                    );
                    return Ok(());
                }
                Err(err) => {
                    debug!(
                        target = "rdv",
                        strategy = strategy.name(),
                        error = %err,
                        "[BonjourSante] consent strategy failed"
                    );
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SiteFlow for BonjourSanteFlow {
    fn site(&self) -> Site {
        Site::BonjourSante
    }

    async fn reach_search_screen(
        &self,
        page: &dyn PageDriver,
        info: &PersonalInfo,
    ) -> Result<FlowVariant> {
        let p = &self.pacing;

        info!(target = "rdv", "[BonjourSante] navigating to clinic page");
        page.navigate(CLINIC_URL, p.nav_timeout).await?;
        info!(target = "rdv", "[BonjourSante] accepting cookies");
        page.click(COOKIE_ACCEPT).await?;
        page.click(POSTAL_CATEGORY).await?;

        info!(target = "rdv", "[BonjourSante] filling clinic lookup");
        page.fill(PATIENT_NUMBER_INPUT, &info.card_seq_number).await?;
        sleep(p.step).await;
        page.fill(POSTAL_SEARCH_INPUT, &info.postal_code).await?;
        sleep(p.step).await;
        page.click(POSTAL_SEARCH_BUTTON).await?;
        sleep(p.step).await;

        info!(target = "rdv", "[BonjourSante] waiting for the hub widget");
        page.wait_for(HUB_FRAME, WaitState::Visible, p.wait_timeout)
            .await?;
        sleep(p.step).await;

        let hub = FrameRef::new(page, HUB_FRAME);
        info!(target = "rdv", "[BonjourSante] confirming identity");
        hub.fill(HUB_NAM, &info.nam_compact()).await?;
        sleep(p.step).await;
        hub.fill(HUB_NAM_SEQUENCE, &info.card_seq_number).await?;
        sleep(p.step).await;
        hub.fill(HUB_FIRST_NAME, &info.first_name).await?;
        sleep(p.step).await;
        hub.fill(HUB_LAST_NAME, &info.last_name).await?;
        sleep(p.step).await;
        hub.click(HUB_CONFIRM).await?;
        sleep(p.step).await;

        page.wait_for(HUB_FRAME, WaitState::Visible, p.wait_timeout)
            .await?;
        sleep(p.step).await;

        info!(target = "rdv", "[BonjourSante] setting walk-in criteria");
        hub.click(WALKIN_RADIO).await?;
        sleep(p.step).await;
        let today = Local::now().format("%Y-%m-%d").to_string();
        hub.fill(DATE_INPUT, &today).await?;
        sleep(p.step).await;

        hub.eval_on(RANGE_SLIDER, SLIDER_SET_50KM).await?;
        hub.eval_on(RANGE_SLIDER, SLIDER_FIRE_INPUT).await?;
        sleep(p.step).await;
        hub.eval_on(RANGE_SLIDER, SLIDER_FIRE_CHANGE).await?;
        sleep(p.step).await;

        hub.click(HUB_CONFIRM).await?;
        sleep(p.step).await;
        Ok(FlowVariant::Unbranched)
    }

    /// First round continues straight off the confirmed criteria; later
    /// rounds reopen the criteria form through the "modify search" link a
    /// no-results screen shows, re-confirm, then continue.
    async fn submit_search(&self, page: &dyn PageDriver, _postal_code: &str) -> Result<()> {
        let p = &self.pacing;
        let hub = FrameRef::new(page, HUB_FRAME);

        if hub.is_visible(NEW_SEARCH).await? {
            debug!(target = "rdv", "[BonjourSante] reopening search criteria");
            hub.click(NEW_SEARCH).await?;
            sleep(p.step).await;
            hub.click(HUB_CONFIRM).await?;
            sleep(p.step).await;
        }

        hub.click(HUB_CONTINUE).await?;
        sleep(p.step).await;
        Ok(())
    }

    fn outcome_indicators(&self) -> &'static OutcomeIndicators {
        &INDICATORS
    }

    fn supports_auto_booking(&self) -> bool {
        true
    }

    async fn attempt_booking(
        &self,
        page: &dyn PageDriver,
        info: &PersonalInfo,
    ) -> Result<BookingOutcome> {
        let p = &self.pacing;
        let hub = FrameRef::new(page, HUB_FRAME);

        let cellphone = info.cellphone.as_deref().ok_or_else(|| {
            WatchError::InvalidInput("cellphone is required for auto-booking".into())
        })?;
        let email = info.email.as_deref().ok_or_else(|| {
            WatchError::InvalidInput("email is required for auto-booking".into())
        })?;

        info!(target = "rdv", "[BonjourSante] booking the held slot");
        hub.click(CONFIRM_SELECTION).await?;
        hub.wait_for(CONFIRM_CHECKBOX, WaitState::Visible, p.wait_timeout)
            .await?;

        hub.fill(CELLPHONE_INPUT, &format_phone_number(cellphone)?)
            .await?;
        hub.fill(EMAIL_INPUT, email).await?;
        hub.select(REASON_SELECT, REASON_OTHER).await?;
        self.acknowledge_consent(&hub).await?;

        hub.click(HUB_CONFIRM).await?;
        hub.click(REGISTRATION_SUBMIT).await?;

        hub.wait_for(CONFIRMATION_ALERT, WaitState::Visible, p.wait_timeout)
            .await?;
        info!(target = "rdv", "[BonjourSante] booking confirmed");
        Ok(BookingOutcome::confirmed_now())
    }
}
