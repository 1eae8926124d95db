//! Listing detail extraction
//!
//! Field extraction is a set of independent, order-insensitive parses against
//! the listing document. Each field parser returns an explicit absence (or the
//! documented default) when the expected structure is missing; nothing here
//! raises an error for a malformed page. The parsed document is created and
//! dropped inside one blocking parse call, so no task ever shares a document
//! handle with another.
//!
//! The phone number lives behind a protected secondary endpoint: the listing
//! page embeds a time-limited token that is exchanged for the seller's number
//! via a second gated GET. When the endpoint suspects a bot it answers with an
//! HTML challenge instead of JSON; that outcome resolves to an absent phone,
//! never an error.

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task;
use url::Url;

use crate::config::HarvesterConfig;
use crate::listing::{Listing, PhoneRevealToken, PHONE_COUNTRY_CODE};
use crate::scraper::fetcher::gated_fetch;
use crate::scraper::metrics::HarvestMetrics;

// Selectors for the listing-detail page contract, declared once.
const TITLE_SELECTOR: &str = "h1.head";
const PRICE_SELECTOR: &str = "div.price_value strong";
const ODOMETER_SELECTOR: &str = "div.base-information span";
const SELLER_SELECTOR: &str = ".seller_info_name";
const PRIMARY_IMAGE_SELECTOR: &str = "div.photo-620x465 picture img";
const GALLERY_LINK_SELECTOR: &str = r#"div[photocontainer="photo"] a"#;
const PLATE_SELECTOR: &str = "span.state-num";
/// Two accepted markup variants for the VIN; first match wins.
const VIN_SELECTORS: [&str; 2] = ["span.label-vin", "span.vin-code"];
const PHONE_SCRIPT_SELECTOR: &str = r#"script[class^="js-user-secure-"]"#;
const BODY_SELECTOR: &str = "body";
const SUBJECT_ID_ATTR: &str = "data-auto-id";

/// Structured fields parsed from a listing document, before the phone lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFields {
    pub title: Option<String>,
    pub price_usd: u32,
    pub odometer_km: u32,
    pub seller_username: Option<String>,
    pub primary_image_url: Option<String>,
    pub image_count: u32,
    pub plate_number: Option<String>,
    pub vin: Option<String>,
}

impl ListingFields {
    /// Number of fields that came back absent or defaulted.
    pub fn absent_count(&self) -> u64 {
        [
            self.title.is_none(),
            self.price_usd == 0,
            self.odometer_km == 0,
            self.seller_username.is_none(),
            self.primary_image_url.is_none(),
            self.plate_number.is_none(),
            self.vin.is_none(),
        ]
        .iter()
        .filter(|absent| **absent)
        .count() as u64
    }

    /// Completes the record with its identity, phone, and capture timestamp.
    pub fn into_listing(self, url: String, phone_number: Option<String>) -> Listing {
        Listing {
            url,
            title: self.title,
            price_usd: self.price_usd,
            odometer_km: self.odometer_km,
            seller_username: self.seller_username,
            phone_number,
            primary_image_url: self.primary_image_url,
            image_count: self.image_count,
            plate_number: self.plate_number,
            vin: self.vin,
            discovered_at: chrono::Utc::now(),
        }
    }
}

/// Parses every structured field plus the phone-reveal token in one pass
///
/// The parsed document never leaves this function.
pub fn parse_listing_document(html: &str) -> (ListingFields, Option<PhoneRevealToken>) {
    let document = Html::parse_document(html);

    let fields = ListingFields {
        title: parse_title(&document),
        price_usd: parse_price_usd(&document),
        odometer_km: parse_odometer_km(&document),
        seller_username: parse_seller_username(&document),
        primary_image_url: parse_primary_image_url(&document),
        image_count: parse_image_count(&document),
        plate_number: parse_plate_number(&document),
        vin: parse_vin(&document),
    };
    let token = parse_phone_token(&document);

    (fields, token)
}

fn select_first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Digits-only numeric parse; `None` when the text holds no digits.
fn parse_digits(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn parse_title(document: &Html) -> Option<String> {
    select_first(document, TITLE_SELECTOR)
        .map(element_text)
        .filter(|text| !text.is_empty())
}

fn parse_price_usd(document: &Html) -> u32 {
    select_first(document, PRICE_SELECTOR)
        .and_then(|element| parse_digits(&element_text(element)))
        .unwrap_or(0)
}

fn parse_odometer_km(document: &Html) -> u32 {
    let Ok(selector) = Selector::parse(ODOMETER_SELECTOR) else {
        return 0;
    };

    // First numeric span wins; the source expresses mileage in thousands of km.
    document
        .select(&selector)
        .find_map(|element| parse_digits(&element_text(element)))
        .map(|thousands| thousands.saturating_mul(1000))
        .unwrap_or(0)
}

fn parse_seller_username(document: &Html) -> Option<String> {
    select_first(document, SELLER_SELECTOR)
        .map(element_text)
        .filter(|text| !text.is_empty())
}

fn parse_primary_image_url(document: &Html) -> Option<String> {
    select_first(document, PRIMARY_IMAGE_SELECTOR)
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string)
}

fn parse_image_count(document: &Html) -> u32 {
    let Ok(selector) = Selector::parse(GALLERY_LINK_SELECTOR) else {
        return 0;
    };
    document.select(&selector).count() as u32
}

fn parse_plate_number(document: &Html) -> Option<String> {
    let text = element_text(select_first(document, PLATE_SELECTOR)?);
    let plate: String = text
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect();
    (!plate.is_empty()).then_some(plate)
}

fn parse_vin(document: &Html) -> Option<String> {
    VIN_SELECTORS
        .iter()
        .find_map(|selector| select_first(document, selector))
        .map(element_text)
        .filter(|text| !text.is_empty())
}

fn parse_phone_token(document: &Html) -> Option<PhoneRevealToken> {
    let script = select_first(document, PHONE_SCRIPT_SELECTOR)?;
    let hash = script.value().attr("data-hash")?.to_string();
    let expires = script.value().attr("data-expires")?.to_string();
    let subject_id = select_first(document, BODY_SELECTOR)?
        .value()
        .attr(SUBJECT_ID_ATTR)?
        .to_string();

    Some(PhoneRevealToken {
        subject_id,
        hash,
        expires,
    })
}

/// Outcome of the phone-reveal sub-protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneOutcome {
    /// Normalized phone number obtained from the endpoint
    Revealed(String),

    /// The listing page carried no reveal token
    NoToken,

    /// The endpoint answered with something other than JSON (soft block)
    Blocked,

    /// The reveal request failed or returned an unusable number
    Unavailable,
}

impl PhoneOutcome {
    pub fn into_option(self) -> Option<String> {
        match self {
            PhoneOutcome::Revealed(phone) => Some(phone),
            _ => None,
        }
    }
}

/// JSON payload returned by the phone-reveal endpoint
#[derive(Debug, Deserialize)]
struct PhoneResponse {
    #[serde(rename = "formattedPhoneNumber", default)]
    formatted_phone_number: String,
}

/// Builds the phone-reveal URL on the listing's own host.
pub fn phone_reveal_url(listing_url: &str, token: &PhoneRevealToken) -> Option<String> {
    let listing = Url::parse(listing_url).ok()?;
    let origin = listing.origin().ascii_serialization();
    Some(format!(
        "{}/users/phones/{}/?hash={}&expires={}",
        origin, token.subject_id, token.hash, token.expires
    ))
}

/// Normalizes a formatted phone number to `+380` plus its last nine digits.
pub fn normalize_phone(formatted: &str) -> Option<String> {
    let digits: String = formatted.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 9 {
        return None;
    }
    Some(format!(
        "{}{}",
        PHONE_COUNTRY_CODE,
        &digits[digits.len() - 9..]
    ))
}

/// Exchanges a reveal token for the seller's phone number
///
/// Issues one gated GET against the reveal endpoint. Any failure resolves to a
/// non-`Revealed` outcome; nothing propagates to the rest of the record.
pub async fn reveal_phone(
    client: &Client,
    gate: Arc<Semaphore>,
    listing_url: &str,
    token: &PhoneRevealToken,
    max_retries: u32,
    delay: Duration,
) -> PhoneOutcome {
    let Some(url) = phone_reveal_url(listing_url, token) else {
        return PhoneOutcome::Unavailable;
    };

    let body = match gated_fetch(client, gate, &url, max_retries, delay).await {
        Ok(body) => body,
        Err(failure) => {
            tracing::debug!("Phone reveal failed for {}: {}", listing_url, failure);
            return PhoneOutcome::Unavailable;
        }
    };

    match serde_json::from_str::<PhoneResponse>(&body) {
        Ok(response) => match normalize_phone(&response.formatted_phone_number) {
            Some(phone) => PhoneOutcome::Revealed(phone),
            None => PhoneOutcome::Unavailable,
        },
        // The anti-scraping defense returns an HTML challenge instead of JSON.
        Err(_) => PhoneOutcome::Blocked,
    }
}

/// Extracts one listing end to end: gated detail fetch, blocking parse, phone
/// sub-protocol, record assembly
///
/// Returns `None` when the listing page is unreachable (e.g. the ad was taken
/// down mid-run); no error surfaces past this point.
pub async fn extract_listing(
    client: Client,
    gate: Arc<Semaphore>,
    metrics: Arc<HarvestMetrics>,
    url: String,
    harvester: HarvesterConfig,
) -> Option<Listing> {
    let delay = Duration::from_millis(harvester.retry_delay_ms);

    let body = match gated_fetch(
        &client,
        Arc::clone(&gate),
        &url,
        harvester.max_retries,
        delay,
    )
    .await
    {
        Ok(body) => body,
        Err(failure) => {
            metrics.record_listing_skipped();
            tracing::debug!("Skipping listing: {}", failure);
            return None;
        }
    };

    let parsed = task::spawn_blocking(move || parse_listing_document(&body)).await;
    let (fields, token) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            metrics.record_listing_skipped();
            tracing::error!("Detail parse task failed for {}: {}", url, e);
            return None;
        }
    };

    metrics.add_absent_fields(fields.absent_count());

    let phone_number = match &token {
        Some(token) => {
            let outcome =
                reveal_phone(&client, gate, &url, token, harvester.max_retries, delay).await;
            match &outcome {
                PhoneOutcome::Revealed(_) => metrics.record_phone_revealed(),
                PhoneOutcome::Blocked => metrics.record_phone_blocked(),
                PhoneOutcome::Unavailable => metrics.record_phone_failed(),
                PhoneOutcome::NoToken => {}
            }
            outcome.into_option()
        }
        None => {
            metrics.record_phone_token_missing();
            None
        }
    };

    Some(fields.into_listing(url, phone_number))
}
