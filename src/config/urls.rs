use url::Url;
use uuid::Uuid;

const CALLBACK_PATH: &str = "payments/callback";
const CONFIRMATION_PATH: &str = "booking-confirmation";
const TICKET_PAGE_PATH: &str = "get-ticket";

/// Builds the public URLs handed to the payment provider and the browser.
#[derive(Debug, Clone)]
pub struct PublicUrls {
    base: Url,
}

impl PublicUrls {
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(base)?;
        Ok(Self { base })
    }

    fn at(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}/{}", prefix, path));
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    /// Where the provider sends the browser after checkout.
    pub fn callback_url(&self, booking_id: Uuid) -> Url {
        let mut url = self.at(CALLBACK_PATH);
        url.query_pairs_mut()
            .append_pair("bookingId", &booking_id.to_string());
        url
    }

    pub fn confirmation_url(&self, booking_id: Uuid) -> Url {
        let mut url = self.at(CONFIRMATION_PATH);
        url.query_pairs_mut()
            .append_pair("bookingId", &booking_id.to_string());
        url
    }

    pub fn ticket_error_url(&self, error_code: &str) -> Url {
        let mut url = self.at(TICKET_PAGE_PATH);
        url.query_pairs_mut().append_pair("error", error_code);
        url
    }
}
