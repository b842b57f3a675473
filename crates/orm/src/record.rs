use core_types::{ColumnKind, CoreError, Json, Row, Value};

/// An application entity mapped to exactly one table.
///
/// Implementations register their fields in declaration order with
/// [`Record::fields`]; the first field is the primary key. [`Record::values`]
/// must return one value per field in the same order. Decoding is always
/// written by hand and should leave fields untouched when their column is
/// absent from the row.
///
/// ```ignore
/// #[derive(Default)]
/// struct Account {
///     account_id: i32,
///     organization_id: i32,
///     account_email: String,
/// }
///
/// impl Record for Account {
///     fn fields() -> Vec<Field> {
///         vec![
///             Field::of::<i32>("accountId"),
///             Field::of::<i32>("organizationId"),
///             Field::of::<String>("accountEmail"),
///         ]
///     }
///
///     fn values(&self) -> Result<Vec<Value>, CoreError> {
///         Ok(vec![
///             self.account_id.into(),
///             self.organization_id.into(),
///             self.account_email.as_str().into(),
///         ])
///     }
///
///     fn decode(&mut self, row: &Row) -> Result<(), CoreError> {
///         self.account_id = row.get("accountId").unwrap_or(self.account_id);
///         self.organization_id = row.get("organizationId").unwrap_or(self.organization_id);
///         if let Some(email) = row.get("accountEmail") {
///             self.account_email = email;
///         }
///         Ok(())
///     }
///
///     fn indexes() -> Vec<&'static str> {
///         vec!["accountEmail"]
///     }
/// }
/// ```
pub trait Record: Default + Send + Sync + 'static {
    /// The column layout, primary key first.
    fn fields() -> Vec<Field>;

    /// Current field values, parallel to [`Record::fields`].
    fn values(&self) -> Result<Vec<Value>, CoreError>;

    /// Copies the columns present in `row` into the record.
    fn decode(&mut self, row: &Row) -> Result<(), CoreError>;

    /// Columns that get a unique index.
    fn indexes() -> Vec<&'static str> {
        Vec::new()
    }

    fn table_name() -> String {
        type_table_name::<Self>()
    }
}

/// The unqualified name of a Rust type: module path and generic arguments are dropped.
pub fn type_table_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// One registered record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    name: &'static str,
    kind: ColumnKind,
}

impl Field {
    /// A field whose column kind follows from its Rust type.
    ///
    /// Text fields with "xml" in their name are stored as `xml`.
    pub fn of<T: ColumnType>(name: &'static str) -> Self {
        let kind = match T::KIND {
            ColumnKind::Text if name.to_ascii_lowercase().contains("xml") => ColumnKind::Xml,
            kind => kind,
        };
        Self { name, kind }
    }

    pub fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// The table this field references by naming convention.
    ///
    /// An integer field called `organizationId` references `Organization`. This
    /// is a convention only; nothing checks the table exists.
    pub fn referenced_table(&self) -> Option<String> {
        if !self.kind.is_integer() {
            return None;
        }
        let stem = self.name.strip_suffix("Id")?;
        let mut chars = stem.chars();
        let first = chars.next()?;
        Some(first.to_uppercase().chain(chars).collect())
    }
}

/// Maps a Rust field type to its column kind.
pub trait ColumnType {
    const KIND: ColumnKind;
}

macro_rules! column_type {
    ($kind:expr => $($t:ty),*) => {
        $(impl ColumnType for $t {
            const KIND: ColumnKind = $kind;
        })*
    };
}

column_type!(ColumnKind::Integer => i8, i16, i32, u8, u16);
column_type!(ColumnKind::BigInt => i64, u32);
column_type!(ColumnKind::Boolean => bool);
column_type!(ColumnKind::Char => char);
column_type!(ColumnKind::Double => f32, f64);
column_type!(ColumnKind::Bytes => Vec<u8>);
column_type!(ColumnKind::Text => String, &str);
column_type!(ColumnKind::Json => serde_json::Value);

impl<T> ColumnType for Json<T> {
    const KIND: ColumnKind = ColumnKind::Json;
}

impl<T> ColumnType for Vec<Json<T>> {
    const KIND: ColumnKind = ColumnKind::JsonList;
}

impl<T: ColumnType> ColumnType for Option<T> {
    const KIND: ColumnKind = T::KIND;
}

#[cfg(test)]
mod tests {
    use super::*;

    mod nested {
        #[derive(Default)]
        pub struct Organization;
    }

    #[test]
    fn table_name_drops_the_module_path() {
        assert_eq!(type_table_name::<nested::Organization>(), "Organization");
        assert_eq!(type_table_name::<String>(), "String");
        assert_eq!(type_table_name::<Vec<String>>(), "Vec");
    }

    #[test]
    fn field_kinds_follow_rust_types() {
        assert_eq!(Field::of::<i32>("id").kind(), ColumnKind::Integer);
        assert_eq!(Field::of::<i64>("total").kind(), ColumnKind::BigInt);
        assert_eq!(Field::of::<bool>("active").kind(), ColumnKind::Boolean);
        assert_eq!(Field::of::<char>("grade").kind(), ColumnKind::Char);
        assert_eq!(Field::of::<f64>("price").kind(), ColumnKind::Double);
        assert_eq!(Field::of::<Vec<u8>>("data").kind(), ColumnKind::Bytes);
        assert_eq!(Field::of::<Json<()>>("store").kind(), ColumnKind::Json);
        assert_eq!(Field::of::<Vec<Json<()>>>("stores").kind(), ColumnKind::JsonList);
        assert_eq!(Field::of::<Option<String>>("note").kind(), ColumnKind::Text);
        assert_eq!(Field::of::<String>("name").kind(), ColumnKind::Text);
    }

    #[test]
    fn text_fields_named_xml_are_xml_columns() {
        assert_eq!(Field::of::<String>("invoiceXml").kind(), ColumnKind::Xml);
        assert_eq!(Field::of::<String>("xmlBody").kind(), ColumnKind::Xml);
        assert_eq!(Field::of::<i32>("xmlCount").kind(), ColumnKind::Integer);
    }

    #[test]
    fn integer_fields_ending_in_id_reference_a_table() {
        let field = Field::of::<i32>("organizationId");
        assert_eq!(field.referenced_table().as_deref(), Some("Organization"));

        assert_eq!(Field::of::<i64>("storeId").referenced_table().as_deref(), Some("Store"));
        assert_eq!(Field::of::<String>("externalId").referenced_table(), None);
        assert_eq!(Field::of::<i32>("Id").referenced_table(), None);
        assert_eq!(Field::of::<i32>("valid").referenced_table(), None);
    }
}
