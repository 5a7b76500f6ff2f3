use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Form, Router,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const API_PATH: &str = "/ShippingAPI.dll";
/// Always answers 500.
pub const BROKEN_PATH: &str = "/broken";
/// Answers 200 with a truncated `<Error>` document.
pub const GARBLED_PATH: &str = "/garbled";

/// City that the lookup endpoint refuses.
pub const UNKNOWN_CITY: &str = "Nowhere";
/// `USERID` that fails authorization.
pub const REJECTED_USER: &str = "BADUSER";

pub const AUTH_FAILURE_NUMBER: &str = "80040B1A";
pub const SYNTAX_ERROR_NUMBER: &str = "80040B19";
pub const INVALID_CITY_NUMBER: &str = "-2147219400";

#[derive(Debug, Deserialize)]
pub struct ShippingForm {
    #[serde(rename = "API")]
    pub api: String,
    #[serde(rename = "XML")]
    pub xml: String,
}

pub fn app() -> Router {
    Router::new()
        .route(API_PATH, post(shipping_api))
        .route(BROKEN_PATH, post(broken))
        .route(GARBLED_PATH, post(garbled))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn shipping_api(Form(form): Form<ShippingForm>) -> impl IntoResponse {
    info!(api = %form.api, "request received");
    let body = respond(&form.api, &form.xml);
    ([(header::CONTENT_TYPE, "text/xml")], body)
}

async fn broken() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "<html>Internal Server Error</html>")
}

async fn garbled() -> impl IntoResponse {
    "<Error><Number>80040B19</Number><Description>XML Syntax Error"
}

/// Fields the server reads from a request document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RequestDocument {
    pub user_id: Option<String>,
    pub addresses: Vec<AddressQuery>,
}

/// One `Address` child of the request root.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AddressQuery {
    pub id: String,
    pub city: Option<String>,
}

/// Parse a request document with `quick-xml`.
pub fn parse_request(xml: &str) -> Result<RequestDocument, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = RequestDocument::default();
    let mut path: Vec<String> = Vec::new();
    loop {
        let (start, empty) = match reader.read_event()? {
            Event::Start(start) => (start, false),
            Event::Empty(start) => (start, true),
            Event::End(_) => {
                path.pop();
                continue;
            }
            Event::Text(text) => {
                if path.len() == 3 && path[1] == "Address" && path[2] == "City" {
                    if let Some(address) = doc.addresses.last_mut() {
                        address.city = Some(text.unescape()?.into_owned());
                    }
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        match path.len() {
            0 => doc.user_id = attribute(&start, "USERID")?,
            1 if name == "Address" => doc.addresses.push(AddressQuery {
                id: attribute(&start, "ID")?.unwrap_or_default(),
                city: None,
            }),
            _ => {}
        }
        if !empty {
            path.push(name);
        }
    }
    Ok(doc)
}

fn attribute(start: &BytesStart<'_>, name: &str) -> Result<Option<String>, quick_xml::Error> {
    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Canned reply for one request document.
pub fn respond(api: &str, xml: &str) -> String {
    let doc = match parse_request(xml) {
        Ok(doc) => doc,
        Err(err) => {
            warn!(error = %err, "unparseable request");
            return error_document(SYNTAX_ERROR_NUMBER, "XML Syntax Error");
        }
    };
    let authorized = doc
        .user_id
        .as_deref()
        .is_some_and(|u| !u.is_empty() && u != REJECTED_USER);
    if !authorized {
        return error_document(
            AUTH_FAILURE_NUMBER,
            "Authorization failure.  Perhaps username and/or password is incorrect.",
        );
    }
    match api {
        "ZipCodeLookup" => zip_code_lookup(&doc.addresses),
        other => error_document(
            AUTH_FAILURE_NUMBER,
            &format!("API Authorization failure. {other} is not a valid API name for this protocol."),
        ),
    }
}

fn zip_code_lookup(addresses: &[AddressQuery]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><ZipCodeLookupResponse>");
    for address in addresses {
        let id = &address.id;
        if address.city.as_deref() == Some(UNKNOWN_CITY) {
            out.push_str(&format!(
                "<Address ID=\"{id}\"><Error><Number>{INVALID_CITY_NUMBER}</Number>\
                 <Source>clsAMS</Source><Description>Invalid City.  </Description>\
                 <HelpFile/><HelpContext/></Error></Address>"
            ));
        } else {
            out.push_str(&format!(
                "<Address ID=\"{id}\"><Address2>1600 PENNSYLVANIA AVE NW</Address2>\
                 <City>WASHINGTON</City><State>DC</State><Zip5>20500</Zip5><Zip4>0005</Zip4></Address>"
            ));
        }
    }
    out.push_str("</ZipCodeLookupResponse>");
    out
}

fn error_document(number: &str, description: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Error><Number>{number}</Number>\
         <Description>{description}</Description><Source>UspsCom::DoAuth</Source></Error>"
    )
}
