//! Whitelist-gated records used to build request data.
//!
//! # Design
//! A [`Record`] is parameterised by a static [`Schema`]: a record name and the
//! ordered list of fields it accepts. Values live in a slot per declared
//! field, so a stored key outside the whitelist is unrepresentable.
//!
//! Unknown fields are tolerated, not rejected: `set` drops the value and
//! `get` returns `None`, and both emit a [`FieldDiagnostic`] through
//! `tracing` and into the record's own diagnostic log. Callers that want
//! strict behaviour inspect [`Record::diagnostics`] or the return of `set`.
//!
//! Whether `"address1"` and `"Address1"` are the same field is a caller
//! decision, expressed with [`FieldNaming`].

use std::cell::RefCell;

use tracing::warn;

use crate::error::{FieldDiagnostic, FieldOp};
use crate::tree::{Node, Tree};

/// How a requested field name is matched against the whitelist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldNaming {
    /// Byte-for-byte comparison.
    #[default]
    Exact,
    /// Upper-case the first character before comparing.
    Capitalized,
}

impl FieldNaming {
    fn normalize<'a>(self, field: &'a str) -> std::borrow::Cow<'a, str> {
        match self {
            FieldNaming::Exact => field.into(),
            FieldNaming::Capitalized => {
                let mut chars = field.chars();
                match chars.next() {
                    Some(first) if !first.is_uppercase() => {
                        first.to_uppercase().chain(chars).collect::<String>().into()
                    }
                    _ => field.into(),
                }
            }
        }
    }
}

/// Declared shape of a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

/// A data holder restricted to its schema's field whitelist.
///
/// The diagnostic log sits in a `RefCell` so that `get(&self)` can record
/// rejected reads. A `Record` is therefore `Send` but not `Sync`: move or
/// clone it across threads, or wrap it in a `Mutex` to share one.
#[derive(Debug)]
pub struct Record {
    schema: Schema,
    naming: FieldNaming,
    values: Vec<Option<Node>>,
    diagnostics: RefCell<Vec<FieldDiagnostic>>,
}

impl Record {
    pub fn new(schema: Schema, naming: FieldNaming) -> Self {
        Self {
            schema,
            naming,
            values: vec![None; schema.fields.len()],
            diagnostics: RefCell::new(Vec::new()),
        }
    }

    /// Build a record by calling `set` for every pair in order.
    pub fn from_pairs<K, V, I>(schema: Schema, naming: FieldNaming, pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<Node>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Self::new(schema, naming);
        for (field, value) in pairs {
            record.set(field.as_ref(), value);
        }
        record
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn naming(&self) -> FieldNaming {
        self.naming
    }

    /// Store `value` under the canonical name of `field`.
    ///
    /// Returns `false` and records a diagnostic if `field` is not declared;
    /// the record is left unchanged.
    pub fn set(&mut self, field: &str, value: impl Into<Node>) -> bool {
        match self.slot(field) {
            Some(index) => {
                self.values[index] = Some(value.into());
                true
            }
            None => {
                self.report(field, FieldOp::Set);
                false
            }
        }
    }

    /// Value of `field`, or `None` when it is unset or undeclared.
    ///
    /// Only the undeclared case records a diagnostic.
    pub fn get(&self, field: &str) -> Option<&Node> {
        match self.slot(field) {
            Some(index) => self.values[index].as_ref(),
            None => {
                self.report(field, FieldOp::Get);
                None
            }
        }
    }

    /// All stored fields keyed by canonical name, in declaration order.
    pub fn data(&self) -> Tree {
        self.schema
            .fields
            .iter()
            .zip(&self.values)
            .filter_map(|(name, value)| value.clone().map(|v| (*name, v)))
            .collect()
    }

    /// Diagnostics emitted so far, oldest first.
    pub fn diagnostics(&self) -> Vec<FieldDiagnostic> {
        self.diagnostics.borrow().clone()
    }

    fn slot(&self, field: &str) -> Option<usize> {
        let field = self.naming.normalize(field);
        self.schema.fields.iter().position(|f| *f == field)
    }

    fn report(&self, field: &str, op: FieldOp) {
        warn!(record = self.schema.name, field, %op, "undefined field");
        self.diagnostics.borrow_mut().push(FieldDiagnostic {
            record: self.schema.name,
            field: field.to_string(),
            op,
        });
    }
}

impl Clone for Record {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema,
            naming: self.naming,
            values: self.values.clone(),
            diagnostics: RefCell::new(self.diagnostics.borrow().clone()),
        }
    }
}
