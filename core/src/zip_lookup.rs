//! ZIP code lookup by street address, city and state.

use crate::config::ClientConfig;
use crate::error::UspsError;
use crate::http::Transport;
use crate::models::Address;
use crate::request::{Outcome, Request};
use crate::tree::{Node, Tree, ATTRIBUTES_KEY};

const ADDRESS_KEY: &str = "Address";

#[derive(Debug)]
pub struct ZipCodeLookup {
    request: Request,
}

impl ZipCodeLookup {
    pub const API: &'static str = "ZipCodeLookup";

    pub fn new(config: &ClientConfig) -> Result<Self, UspsError> {
        Ok(Self {
            request: Request::new(config, Self::API)?,
        })
    }

    /// Queue `address` and return the `ID` it was tagged with.
    ///
    /// Without an explicit id the entry gets the current address count plus
    /// one. Ids are not checked for uniqueness, so mixing explicit and
    /// generated ids can produce duplicates.
    pub fn add_address(&mut self, address: &Address, id: Option<&str>) -> String {
        let id = match id {
            Some(id) => id.to_string(),
            None => (self.address_count() + 1).to_string(),
        };
        let mut entry = Tree::new().with(ATTRIBUTES_KEY, Tree::new().with("ID", id.as_str()));
        entry.extend(address.data());
        self.request.body_mut().push_repeated(ADDRESS_KEY, entry);
        id
    }

    pub fn address_count(&self) -> usize {
        match self.request.body().get(ADDRESS_KEY) {
            Some(Node::List(items)) => items.len(),
            Some(_) => 1,
            None => 0,
        }
    }

    pub fn lookup(&mut self, transport: &dyn Transport) -> Result<&Outcome, UspsError> {
        self.request.execute(transport)
    }

    /// `Address` entries of the response payload, in document order.
    pub fn addresses(&self) -> Vec<&Tree> {
        let Some(payload) = self.request.response_payload().and_then(Node::as_map) else {
            return Vec::new();
        };
        match payload.get(ADDRESS_KEY) {
            Some(Node::Map(tree)) => vec![tree],
            Some(Node::List(items)) => items.iter().filter_map(Node::as_map).collect(),
            _ => Vec::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn is_success(&self) -> bool {
        self.request.is_success()
    }
}
