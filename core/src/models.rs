//! Request data records.

use crate::error::FieldDiagnostic;
use crate::record::{FieldNaming, Record, Schema};
use crate::tree::{Node, Tree};

pub const ADDRESS: Schema = Schema {
    name: "Address",
    fields: &[
        "FirmName", "Address1", "Address2", "City", "State", "Zip5", "Zip4",
    ],
};

/// A postal address fragment.
///
/// `Send` but not `Sync`, like the [`Record`] it wraps.
#[derive(Debug, Clone)]
pub struct Address {
    record: Record,
}

impl Address {
    pub fn new() -> Self {
        Self::with_naming(FieldNaming::Exact)
    }

    pub fn with_naming(naming: FieldNaming) -> Self {
        Self {
            record: Record::new(ADDRESS, naming),
        }
    }

    /// Builder-style `set`; unknown fields are dropped with a diagnostic.
    pub fn with(mut self, field: &str, value: impl Into<Node>) -> Self {
        self.record.set(field, value);
        self
    }

    pub fn set(&mut self, field: &str, value: impl Into<Node>) -> bool {
        self.record.set(field, value)
    }

    pub fn get(&self, field: &str) -> Option<&Node> {
        self.record.get(field)
    }

    pub fn data(&self) -> Tree {
        self.record.data()
    }

    pub fn diagnostics(&self) -> Vec<FieldDiagnostic> {
        self.record.diagnostics()
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::new()
    }
}
