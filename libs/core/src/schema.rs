//! Schemas shared out of band by both peers.
//!
//! Record definitions live in an arena and refer to each other by
//! [`RecordId`], so self-referential and mutually recursive records need no
//! reference-counted cycles.

use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};

/// Index of a record definition inside a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(u32);

impl RecordId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The closed set of value kinds a field can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    U32,
    String,
    Record(RecordId),
    Option(Box<Kind>),
    List(Box<Kind>),
}

impl Kind {
    pub fn option(inner: Kind) -> Self {
        Kind::Option(Box::new(inner))
    }

    pub fn list(inner: Kind) -> Self {
        Kind::List(Box::new(inner))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

/// A validated arena of record definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    records: Vec<RecordDef>,
    /// Per record: every value encodes to zero bytes.
    zero_sized: Vec<bool>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn record(&self, id: RecordId) -> Result<&RecordDef> {
        self.records
            .get(id.index())
            .ok_or(Error::UnknownRecord(id.0))
    }

    /// Find a record by name.
    pub fn lookup(&self, name: &str) -> Option<RecordId> {
        self.records
            .iter()
            .position(|r| r.name == name)
            .map(|i| RecordId(i as u32))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Verify that every record `kind` refers to lives in this schema and
    /// that no list in it has zero-sized items.
    pub fn check(&self, kind: &Kind) -> Result<()> {
        check_refs(kind, self.records.len())?;
        self.check_items(kind)
    }

    /// True if every value of `kind` encodes to zero bytes.
    pub fn is_zero_sized(&self, kind: &Kind) -> bool {
        match kind {
            Kind::Record(id) => self.zero_sized.get(id.index()).copied().unwrap_or(false),
            Kind::U32 | Kind::String | Kind::Option(_) | Kind::List(_) => false,
        }
    }

    fn check_items(&self, kind: &Kind) -> Result<()> {
        match kind {
            Kind::List(inner) if self.is_zero_sized(inner) => {
                Err(Error::ZeroSizedItems(self.describe(inner)))
            }
            Kind::Option(inner) | Kind::List(inner) => self.check_items(inner),
            Kind::U32 | Kind::String | Kind::Record(_) => Ok(()),
        }
    }

    /// Human readable name of a kind, resolving record ids to their names.
    pub fn describe(&self, kind: &Kind) -> String {
        match kind {
            Kind::U32 => "u32".to_string(),
            Kind::String => "string".to_string(),
            Kind::Record(id) => match self.record(*id) {
                Ok(def) => format!("record `{}`", def.name),
                Err(_) => format!("record {id}"),
            },
            Kind::Option(inner) => format!("option<{}>", self.describe(inner)),
            Kind::List(inner) => format!("list<{}>", self.describe(inner)),
        }
    }
}

/// Two-phase builder: `declare` reserves an id so definitions can refer to
/// records that are defined later (or to themselves).
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    names: Vec<String>,
    fields: Vec<Option<Vec<FieldDef>>>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id for a record named `name`.
    pub fn declare(&mut self, name: impl Into<String>) -> RecordId {
        self.names.push(name.into());
        self.fields.push(None);
        RecordId((self.names.len() - 1) as u32)
    }

    /// Set the ordered fields of a declared record.
    pub fn define<N, I>(&mut self, id: RecordId, fields: I) -> Result<()>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Kind)>,
    {
        let slot = self
            .fields
            .get_mut(id.index())
            .ok_or(Error::UnknownRecord(id.0))?;
        *slot = Some(
            fields
                .into_iter()
                .map(|(name, kind)| FieldDef {
                    name: name.into(),
                    kind,
                })
                .collect(),
        );
        Ok(())
    }

    /// Declare and define a non-recursive record in one step.
    pub fn record<N, I>(&mut self, name: impl Into<String>, fields: I) -> RecordId
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Kind)>,
    {
        let id = self.declare(name);
        let defs = fields
            .into_iter()
            .map(|(name, kind)| FieldDef {
                name: name.into(),
                kind,
            })
            .collect();
        self.fields[id.index()] = Some(defs);
        id
    }

    pub fn build(self) -> Result<Schema> {
        let count = self.names.len();
        let mut records = Vec::with_capacity(count);
        for (name, fields) in self.names.into_iter().zip(self.fields) {
            let fields = fields.ok_or_else(|| Error::UndefinedRecord(name.clone()))?;
            let mut seen = HashSet::new();
            for field in &fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(Error::DuplicateField {
                        record: name.clone(),
                        field: field.name.clone(),
                    });
                }
                check_refs(&field.kind, count)?;
            }
            records.push(RecordDef { name, fields });
        }

        let zero_sized = zero_sized_records(&records);
        let schema = Schema {
            records,
            zero_sized,
        };
        for def in &schema.records {
            for field in &def.fields {
                schema
                    .check_items(&field.kind)
                    .map_err(|e| Error::field(field.name.as_str(), e))?;
            }
        }
        Ok(schema)
    }
}

fn check_refs(kind: &Kind, count: usize) -> Result<()> {
    match kind {
        Kind::U32 | Kind::String => Ok(()),
        Kind::Record(id) if id.index() < count => Ok(()),
        Kind::Record(id) => Err(Error::UnknownRecord(id.0)),
        Kind::Option(inner) | Kind::List(inner) => check_refs(inner, count),
    }
}

/// Records made only of zero-sized records, cycles included.
fn zero_sized_records(records: &[RecordDef]) -> Vec<bool> {
    let mut zero = vec![true; records.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for (i, def) in records.iter().enumerate() {
            let all_zero = def.fields.iter().all(|field| match &field.kind {
                Kind::Record(id) => zero[id.index()],
                _ => false,
            });
            if zero[i] && !all_zero {
                zero[i] = false;
                changed = true;
            }
        }
    }
    zero
}
