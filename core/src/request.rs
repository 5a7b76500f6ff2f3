//! Request lifecycle: assemble, send, classify.
//!
//! # Design
//! A `Request` is single-use and moves through `Unsent -> Sent -> Classified`.
//! Assembly (`build_wire_tree`, `serialize`, `post_payload`,
//! `build_http_request`) and classification (`classify`) are pure, so a
//! caller with its own HTTP stack can drive the exchange. `execute` glues
//! them to a [`Transport`].
//!
//! Only configuration problems are returned as errors. Transport failures,
//! undecodable bodies and API `Error` nodes end up on the [`Outcome`], and
//! success is recomputed from it on every `is_success()` call.
//!
//! `execute` takes `&mut self`, so one request cannot be sent from two
//! places at once. Independent requests use independent `Request` values.

use tracing::{info, warn};

use crate::api::ApiCode;
use crate::codec::{QuickXmlCodec, XmlCodec};
use crate::config::ClientConfig;
use crate::error::{CodecError, TransportError, UspsError};
use crate::find::{contains_key_deep, find_first};
use crate::http::{HttpExchange, HttpRequest, HttpResponse, Transport};
use crate::tree::{Node, Tree, ATTRIBUTES_KEY};

/// Name of the element carrying API-reported errors.
pub const ERROR_KEY: &str = "Error";
const ERROR_MARKER: &str = "<Error>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unsent,
    Sent,
    Classified,
}

/// Form fields posted to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPayload {
    pub api: &'static str,
    pub xml: String,
}

impl PostPayload {
    pub fn fields(&self) -> [(&str, &str); 2] {
        [("API", self.api), ("XML", self.xml.as_str())]
    }
}

/// `Number` and `Description` of an API `Error` node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFault {
    pub number: Option<String>,
    pub description: Option<String>,
}

impl ApiFault {
    fn from_node(node: &Node) -> Option<Self> {
        let tree = match node {
            Node::Map(tree) => tree,
            Node::List(items) => items.iter().find_map(Node::as_map)?,
            Node::Text(_) => return None,
        };
        Some(Self {
            number: tree.text("Number").map(str::to_string),
            description: tree.text("Description").map(str::to_string),
        })
    }
}

/// Everything observed about one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    status: u16,
    headers: Vec<(String, String)>,
    raw_body: String,
    tree: Option<Tree>,
    decode_error: Option<CodecError>,
    transport_error: Option<TransportError>,
    api_error: Option<ApiFault>,
}

impl Outcome {
    /// HTTP status, or 0 when no response was received.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn raw_body(&self) -> &str {
        &self.raw_body
    }

    /// Decoded body, absent if empty or malformed.
    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn decode_error(&self) -> Option<&CodecError> {
        self.decode_error.as_ref()
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        self.transport_error.as_ref()
    }

    pub fn api_error(&self) -> Option<&ApiFault> {
        self.api_error.as_ref()
    }

    /// Evaluated in order: no transport error, status 200, a decoded tree
    /// without an `Error` key at any depth (empty ones included), and a raw
    /// body without the `<Error>` marker.
    pub fn is_success(&self) -> bool {
        if self.transport_error.is_some() || self.status != 200 {
            return false;
        }
        match &self.tree {
            None => false,
            Some(tree) if contains_key_deep(tree, ERROR_KEY) => false,
            Some(_) => !self.raw_body.contains(ERROR_MARKER),
        }
    }

    /// API error number if an `Error` node was located, else the transport
    /// error code.
    pub fn error_code(&self) -> Option<String> {
        match (&self.api_error, &self.transport_error) {
            (Some(fault), _) => fault.number.clone(),
            (None, Some(err)) => Some(err.code().to_string()),
            (None, None) => None,
        }
    }

    /// API error description if an `Error` node was located, else the
    /// transport error message.
    pub fn error_message(&self) -> Option<String> {
        match (&self.api_error, &self.transport_error) {
            (Some(fault), _) => fault.description.clone(),
            (None, Some(err)) => Some(err.message.clone()),
            (None, None) => None,
        }
    }
}

/// One request against one API code.
#[derive(Debug)]
pub struct Request {
    api: ApiCode,
    config: ClientConfig,
    body: Tree,
    codec: Box<dyn XmlCodec>,
    state: State,
    outcome: Option<Outcome>,
}

impl Request {
    /// Fails with `UnknownApi` if `api` is not in the API-code table.
    pub fn new(config: &ClientConfig, api: &str) -> Result<Self, UspsError> {
        Ok(Self {
            api: ApiCode::resolve(api)?,
            config: config.clone(),
            body: Tree::new(),
            codec: Box::new(QuickXmlCodec),
            state: State::Unsent,
            outcome: None,
        })
    }

    pub fn with_codec(mut self, codec: impl XmlCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn api(&self) -> ApiCode {
        self.api
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Endpoint-specific fields merged next to the credential attributes.
    pub fn body(&self) -> &Tree {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Tree {
        &mut self.body
    }

    /// `{ @attributes: { USERID }, ...body }`. Body keys are merged at the
    /// same level; a body `@attributes` entry replaces the credential one.
    pub fn build_wire_tree(&self) -> Tree {
        if self.body.contains_key(ATTRIBUTES_KEY) {
            warn!(api = self.api.code(), "request body overrides root attributes");
        }
        let mut tree = Tree::new().with(
            ATTRIBUTES_KEY,
            Tree::new().with("USERID", self.config.user_id.as_str()),
        );
        tree.extend(self.body.clone());
        tree
    }

    /// XML document rooted at the API's request element.
    pub fn serialize(&self) -> Result<String, UspsError> {
        Ok(self
            .codec
            .encode(self.api.request_root(), &self.build_wire_tree())?)
    }

    pub fn post_payload(&self) -> Result<PostPayload, UspsError> {
        Ok(PostPayload {
            api: self.api.code(),
            xml: self.serialize()?,
        })
    }

    /// Expected root element of the response document.
    pub fn response_api_name(&self) -> String {
        self.api.response_root()
    }

    pub fn endpoint(&self) -> &str {
        self.config.endpoint()
    }

    pub fn build_http_request(&self) -> Result<HttpRequest, UspsError> {
        let payload = self.post_payload()?;
        HttpRequest::form_post(self.endpoint(), &payload.fields(), &self.config.transport)
    }

    /// Send the request once and classify the result.
    ///
    /// Returns `Err` only for configuration problems, which are detected
    /// before any network activity, or when called a second time.
    pub fn execute(&mut self, transport: &dyn Transport) -> Result<&Outcome, UspsError> {
        if self.state != State::Unsent {
            return Err(UspsError::AlreadyExecuted);
        }
        let http = self.build_http_request()?;
        self.state = State::Sent;
        let exchange = transport.send(&http, &self.config.transport);
        let outcome = self.classify(exchange);
        self.state = State::Classified;
        Ok(&*self.outcome.insert(outcome))
    }

    /// Turn what the transport produced into an [`Outcome`].
    ///
    /// A body received before a transport error is still decoded, so an
    /// `Error` node in it can override the transport code and message.
    pub fn classify(&self, exchange: impl Into<HttpExchange>) -> Outcome {
        let HttpExchange {
            response,
            error: transport_error,
        } = exchange.into();
        if let Some(err) = &transport_error {
            warn!(api = self.api.code(), code = err.code(), error = %err.message, "transport failed");
        }
        let response = response.unwrap_or_else(|| HttpResponse {
            status: 0,
            headers: Vec::new(),
            body: String::new(),
        });

        let (tree, decode_error) = if response.body.is_empty() {
            (None, None)
        } else {
            match self.codec.decode(&response.body) {
                Ok(tree) => (Some(tree), None),
                Err(err) => {
                    warn!(api = self.api.code(), error = %err, "response body could not be decoded");
                    (None, Some(err))
                }
            }
        };

        let mut outcome = Outcome {
            status: response.status,
            headers: response.headers,
            raw_body: response.body,
            tree,
            decode_error,
            transport_error,
            api_error: None,
        };
        if !outcome.is_success() {
            outcome.api_error = outcome
                .tree
                .as_ref()
                .and_then(|tree| find_first(tree, ERROR_KEY))
                .and_then(ApiFault::from_node);
        }

        info!(
            api = self.api.code(),
            status = outcome.status,
            success = outcome.is_success(),
            error_code = outcome.error_code().as_deref(),
            "response classified"
        );
        outcome
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// False until the request has been classified.
    pub fn is_success(&self) -> bool {
        self.outcome.as_ref().is_some_and(Outcome::is_success)
    }

    /// The decoded node under the response root element, if any.
    pub fn response_payload(&self) -> Option<&Node> {
        self.outcome
            .as_ref()
            .and_then(Outcome::tree)
            .and_then(|tree| tree.get(&self.response_api_name()))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::codec::decode;
    use crate::error::TransportErrorKind;

    fn config() -> ClientConfig {
        ClientConfig::new("USER42")
    }

    fn ok(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        })
    }

    /// Transport returning a canned result and remembering what it was sent.
    struct Canned {
        exchange: HttpExchange,
        seen: RefCell<Vec<HttpRequest>>,
    }

    impl Transport for Canned {
        fn send(
            &self,
            request: &HttpRequest,
            _options: &crate::http::TransportOptions,
        ) -> HttpExchange {
            self.seen.borrow_mut().push(request.clone());
            self.exchange.clone()
        }
    }

    fn canned(exchange: impl Into<HttpExchange>) -> Canned {
        Canned {
            exchange: exchange.into(),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn timeout() -> TransportError {
        TransportError::new(TransportErrorKind::Timeout, "operation timed out")
    }

    #[test]
    fn unknown_api_fails_fast() {
        let err = Request::new(&config(), "Bogus").unwrap_err();
        assert!(matches!(err, UspsError::UnknownApi(_)));
    }

    #[test]
    fn wire_tree_puts_userid_first_and_body_alongside() {
        let mut req = Request::new(&config(), "CityStateLookup").unwrap();
        req.body_mut()
            .insert("ZipCode", Tree::new().with("Zip5", "90210"));
        let tree = req.build_wire_tree();
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec![ATTRIBUTES_KEY, "ZipCode"]);
        let attrs = tree.get(ATTRIBUTES_KEY).and_then(Node::as_map).unwrap();
        assert_eq!(attrs.text("USERID"), Some("USER42"));
    }

    #[test]
    fn serialize_uses_request_root() {
        let mut req = Request::new(&config(), "TrackV2").unwrap();
        req.body_mut().insert(
            "TrackID",
            Tree::new().with(ATTRIBUTES_KEY, Tree::new().with("ID", "EJ958083578US")),
        );
        let xml = req.serialize().unwrap();
        assert!(xml.contains("<TrackFieldRequest USERID=\"USER42\"><TrackID ID=\"EJ958083578US\"/></TrackFieldRequest>"));
        let back = decode(&xml).unwrap();
        assert!(back.contains_key("TrackFieldRequest"));
    }

    #[test]
    fn post_payload_carries_api_and_xml() {
        let req = Request::new(&config(), "Verify").unwrap();
        let payload = req.post_payload().unwrap();
        assert_eq!(payload.api, "Verify");
        assert!(payload.xml.contains("<AddressValidateRequest USERID=\"USER42\"/>"));
        assert_eq!(payload.fields()[0], ("API", "Verify"));
    }

    #[test]
    fn response_api_name_swaps_suffix() {
        let req = Request::new(&config(), "Verify").unwrap();
        assert_eq!(req.response_api_name(), "AddressValidateResponse");
    }

    #[test]
    fn endpoint_follows_test_mode() {
        let live = Request::new(&config(), "Verify").unwrap();
        let test = Request::new(&config().with_test_mode(true), "Verify").unwrap();
        assert_ne!(live.endpoint(), test.endpoint());
        assert_eq!(test.build_http_request().unwrap().url, crate::config::TEST_API_URL);
    }

    #[test]
    fn success_on_clean_200() {
        let req = Request::new(&config(), "ZipCodeLookup").unwrap();
        let outcome = req.classify(ok(
            200,
            "<ZipCodeLookupResponse><Address ID=\"1\"><Zip5>20500</Zip5></Address></ZipCodeLookupResponse>",
        ));
        assert!(outcome.is_success());
        assert_eq!(outcome.error_code(), None);
        assert!(outcome.api_error().is_none());
    }

    #[test]
    fn status_500_is_failure_regardless_of_body() {
        let req = Request::new(&config(), "ZipCodeLookup").unwrap();
        let outcome = req.classify(ok(500, "<ZipCodeLookupResponse/>"));
        assert!(!outcome.is_success());
        assert!(outcome.error_code().is_none());
    }

    #[test]
    fn nested_error_node_populates_api_error() {
        let req = Request::new(&config(), "ZipCodeLookup").unwrap();
        let outcome = req.classify(ok(
            200,
            "<Response><Address><Zip5>1</Zip5></Address><Address><Zip5>2</Zip5></Address>\
             <Error><Number>80040b19</Number><Description>Invalid City</Description></Error></Response>",
        ));
        assert!(!outcome.is_success());
        assert_eq!(outcome.error_code().as_deref(), Some("80040b19"));
        assert_eq!(outcome.error_message().as_deref(), Some("Invalid City"));
    }

    #[test]
    fn malformed_body_with_marker_fails_without_api_error() {
        let req = Request::new(&config(), "ZipCodeLookup").unwrap();
        let outcome = req.classify(ok(200, "<Error><Number>1</Number>"));
        assert!(!outcome.is_success());
        assert!(outcome.tree().is_none());
        assert!(outcome.decode_error().is_some());
        assert!(outcome.api_error().is_none());
        assert_eq!(outcome.error_code(), None);
    }

    #[test]
    fn malformed_body_without_marker_still_fails() {
        let req = Request::new(&config(), "ZipCodeLookup").unwrap();
        let outcome = req.classify(ok(200, "this is not xml"));
        assert!(!outcome.is_success());
    }

    #[test]
    fn raw_marker_catches_error_lost_by_decoding() {
        let req = Request::new(&config(), "ZipCodeLookup").unwrap();
        let outcome = req.classify(ok(200, "<R><Note><![CDATA[<Error>]]></Note></R>"));
        assert!(outcome.tree().is_some());
        assert!(!outcome.is_success());
    }

    #[test]
    fn transport_error_is_reported_when_no_api_error() {
        let req = Request::new(&config(), "ZipCodeLookup").unwrap();
        let outcome = req.classify(HttpExchange::failed(TransportError::new(
            TransportErrorKind::ConnectionFailed,
            "connection refused",
        )));
        assert!(!outcome.is_success());
        assert_eq!(outcome.status(), 0);
        assert_eq!(outcome.error_code().as_deref(), Some("7"));
        assert_eq!(outcome.error_message().as_deref(), Some("connection refused"));
    }

    #[test]
    fn empty_error_elements_fail_at_any_depth() {
        let req = Request::new(&config(), "ZipCodeLookup").unwrap();
        for body in [
            "<ZipCodeLookupResponse><Address ID=\"1\"><Error/></Address></ZipCodeLookupResponse>",
            "<ZipCodeLookupResponse><Error /></ZipCodeLookupResponse>",
            "<ZipCodeLookupResponse><Address ID=\"1\"><Zip5>20500</Zip5></Address>\
             <Address ID=\"2\"><Error></Error></Address></ZipCodeLookupResponse>",
        ] {
            let outcome = req.classify(ok(200, body));
            assert!(outcome.tree().is_some(), "{body}");
            assert!(!outcome.is_success(), "{body}");
            assert!(outcome.api_error().is_none(), "{body}");
        }
    }

    #[test]
    fn partial_body_is_decoded_after_transport_error() {
        let transport = canned(HttpExchange::partial(
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: "<ZipCodeLookupResponse><Error><Number>-2147219400</Number>\
                       <Description>Invalid City.</Description></Error></ZipCodeLookupResponse>"
                    .to_string(),
            },
            timeout(),
        ));
        let mut req = Request::new(&config(), "ZipCodeLookup").unwrap();
        let outcome = req.execute(&transport).unwrap();
        assert_eq!(outcome.status(), 200);
        assert!(outcome.tree().is_some());
        assert!(!outcome.is_success());
        assert_eq!(outcome.transport_error(), Some(&timeout()));
        assert_eq!(outcome.error_code().as_deref(), Some("-2147219400"));
        assert_eq!(outcome.error_message().as_deref(), Some("Invalid City."));
    }

    #[test]
    fn truncated_body_keeps_transport_error() {
        let req = Request::new(&config(), "ZipCodeLookup").unwrap();
        let outcome = req.classify(HttpExchange::partial(
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: "<ZipCodeLookupResponse><Address ID=\"1\"><Zip5>205".to_string(),
            },
            timeout(),
        ));
        assert_eq!(outcome.status(), 200);
        assert!(outcome.decode_error().is_some());
        assert!(!outcome.is_success());
        assert_eq!(outcome.error_code().as_deref(), Some("28"));
        assert_eq!(outcome.error_message().as_deref(), Some("operation timed out"));
    }

    #[test]
    fn transport_error_fails_even_with_clean_body() {
        let req = Request::new(&config(), "Verify").unwrap();
        let outcome = req.classify(HttpExchange::partial(
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: "<AddressValidateResponse/>".to_string(),
            },
            timeout(),
        ));
        assert!(outcome.tree().is_some());
        assert!(!outcome.is_success());
        assert_eq!(outcome.error_code().as_deref(), Some("28"));
    }

    #[test]
    fn execute_runs_once() {
        let transport = canned(ok(200, "<ZipCodeLookupResponse/>"));
        let mut req = Request::new(&config().with_endpoint("http://127.0.0.1:1/ShippingAPI.dll"), "ZipCodeLookup").unwrap();
        assert_eq!(req.state(), State::Unsent);
        assert!(!req.is_success());

        let outcome = req.execute(&transport).unwrap();
        assert_eq!(outcome.status(), 200);
        assert_eq!(req.state(), State::Classified);
        assert!(req.is_success());
        assert_eq!(req.response_payload(), Some(&Node::text("")));

        let sent = transport.seen.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "http://127.0.0.1:1/ShippingAPI.dll");
        assert!(sent[0].body.starts_with("API=ZipCodeLookup&XML=%3C%3Fxml"));
        drop(sent);

        assert!(matches!(req.execute(&transport), Err(UspsError::AlreadyExecuted)));
        assert_eq!(transport.seen.borrow().len(), 1);
    }

    #[test]
    fn bad_endpoint_fails_before_sending() {
        let transport = canned(ok(200, ""));
        let mut req = Request::new(&config().with_endpoint("nowhere"), "Verify").unwrap();
        assert!(matches!(req.execute(&transport), Err(UspsError::InvalidEndpoint { .. })));
        assert!(transport.seen.borrow().is_empty());
        assert_eq!(req.state(), State::Unsent);
    }

    #[test]
    fn independent_requests_do_not_share_state() {
        let mut a = Request::new(&config(), "Verify").unwrap();
        let b = Request::new(&config(), "TrackV2").unwrap();
        a.body_mut().insert("Revision", "1");
        a.execute(&canned(ok(500, ""))).unwrap();
        assert!(b.body().is_empty());
        assert!(b.outcome().is_none());
        assert_eq!(b.state(), State::Unsent);
        assert_eq!(b.response_api_name(), "TrackFieldResponse");
    }

    #[test]
    fn success_is_recomputed_on_each_call() {
        let req = Request::new(&config(), "Verify").unwrap();
        let outcome = req.classify(ok(200, "<AddressValidateResponse><Address/></AddressValidateResponse>"));
        assert!(outcome.is_success());
        assert!(outcome.is_success());
    }
}
