//! Core record types for harvested listings

use chrono::{DateTime, Utc};

/// Fixed country code prefixed to every normalized phone number.
pub const PHONE_COUNTRY_CODE: &str = "+380";

/// One scraped vehicle advertisement, identified by its source URL.
///
/// Every field other than `url` is independently optional: partial extraction
/// is expected and is not an error. A listing is created exactly once per
/// successful extraction attempt and never updated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    /// Source URL of the advertisement; the sole identity of the record
    pub url: String,

    /// Advertisement heading
    pub title: Option<String>,

    /// Asking price in USD; 0 when not observed
    pub price_usd: u32,

    /// Odometer reading in kilometers; 0 when not observed
    pub odometer_km: u32,

    /// Display name of the seller
    pub seller_username: Option<String>,

    /// Seller phone, normalized to `+<country><9 digits>` (12 characters)
    pub phone_number: Option<String>,

    /// URL of the main photo
    pub primary_image_url: Option<String>,

    /// Number of photos in the gallery
    pub image_count: u32,

    /// Registration plate, uppercase alphanumerics only
    pub plate_number: Option<String>,

    /// Vehicle identification number
    pub vin: Option<String>,

    /// Capture timestamp, set once at extraction time
    pub discovered_at: DateTime<Utc>,
}

/// Per-listing token for the phone-reveal endpoint.
///
/// Scraped from the listing page (a script element carrying `data-hash` and
/// `data-expires`, plus a body-level subject-id attribute), exchanged once for
/// the seller's phone number, then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneRevealToken {
    pub subject_id: String,
    pub hash: String,
    pub expires: String,
}
