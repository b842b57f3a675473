use crate::record::{Field, Record};
use core_types::{ColumnKind, CoreError, Value};
use std::collections::HashSet;

/// Table metadata derived from a record's field registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    table: String,
    fields: Vec<Field>,
    indexes: Vec<&'static str>,
}

/// A reference inferred from the `<table>Id` naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub table: String,
}

impl Schema {
    pub fn of<T: Record>() -> Result<Self, CoreError> {
        Self::new(T::table_name(), T::fields(), T::indexes())
    }

    /// Validates and builds a schema. The first field becomes the primary key.
    pub fn new(
        table: impl Into<String>,
        fields: Vec<Field>,
        indexes: Vec<&'static str>,
    ) -> Result<Self, CoreError> {
        let table = table.into();
        let invalid = |message: String| CoreError::InvalidSchema(table.clone(), message);

        if table.is_empty() {
            return Err(invalid("the table name is empty".to_string()));
        }
        if fields.is_empty() {
            return Err(invalid("a record needs at least one field".to_string()));
        }
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name()) {
                return Err(invalid(format!("field {} is declared twice", field.name())));
            }
        }
        if let Some(index) = indexes.iter().find(|index| !seen.contains(*index)) {
            return Err(invalid(format!("index column {index} is not a field")));
        }

        Ok(Self {
            table,
            fields,
            indexes,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &Field {
        &self.fields[0]
    }

    /// Every field, primary key first.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The non-key fields, in declaration order.
    pub fn columns(&self) -> &[Field] {
        &self.fields[1..]
    }

    pub fn indexes(&self) -> &[&'static str] {
        &self.indexes
    }

    /// `(name, kind, is_primary_key)` for every field, in declaration order.
    pub fn describe(&self) -> Vec<(&'static str, ColumnKind, bool)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.name(), field.kind(), i == 0))
            .collect()
    }

    /// Foreign keys implied by non-key integer fields named `<table>Id`.
    pub fn foreign_keys(&self) -> Vec<ForeignKey> {
        self.columns()
            .iter()
            .filter_map(|field| {
                field.referenced_table().map(|table| ForeignKey {
                    column: field.name(),
                    table,
                })
            })
            .collect()
    }

    /// Checks that a record produced exactly one value per field.
    pub fn check_values(&self, values: &[Value]) -> Result<(), CoreError> {
        if values.len() != self.fields.len() {
            return Err(CoreError::ArityMismatch {
                expected: self.fields.len(),
                actual: values.len(),
            });
        }
        Ok(())
    }
}
