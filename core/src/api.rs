//! Fixed table of supported API codes.
//!
//! The caller-facing code (sent as the `API` form field) selects the wire
//! root element of the request document. The response root is the request
//! root with `Request` replaced by `Response`.

use crate::error::UspsError;

/// `(API code, request root element)` pairs understood by the service.
pub const API_CODES: &[(&str, &str)] = &[
    ("RateV2", "RateV2Request"),
    ("RateV4", "RateV4Request"),
    ("IntlRateV2", "IntlRateV2Request"),
    ("Verify", "AddressValidateRequest"),
    ("ZipCodeLookup", "ZipCodeLookupRequest"),
    ("CityStateLookup", "CityStateLookupRequest"),
    ("TrackV2", "TrackFieldRequest"),
    ("FirstClassMail", "FirstClassMailRequest"),
    ("SDCGetLocations", "SDCGetLocationsRequest"),
    ("ExpressMailLabel", "ExpressMailLabelRequest"),
    ("PriorityMail", "PriorityMailRequest"),
    ("OpenDistributePriorityV2", "OpenDistributePriorityV2.0Request"),
    ("OpenDistributePriorityV2Certify", "OpenDistributePriorityV2.0CertifyRequest"),
    ("ExpressMailIntl", "ExpressMailIntlRequest"),
    ("PriorityMailIntl", "PriorityMailIntlRequest"),
    ("FirstClassMailIntl", "FirstClassMailIntlRequest"),
];

/// A validated entry of [`API_CODES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiCode {
    code: &'static str,
    request_root: &'static str,
}

impl ApiCode {
    /// Look up `code`, failing with `UnknownApi` if it is not in the table.
    pub fn resolve(code: &str) -> Result<Self, UspsError> {
        API_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|&(code, request_root)| ApiCode { code, request_root })
            .ok_or_else(|| UspsError::UnknownApi(code.to_string()))
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn request_root(&self) -> &'static str {
        self.request_root
    }

    pub fn response_root(&self) -> String {
        self.request_root.replace("Request", "Response")
    }
}
