use orm::{CoreError, Field, Json, Record, Row, Value};
use serde::{Deserialize, Serialize};

/// A store document embedded in an organization as `jsonb`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Store {
    #[serde(rename = "storeId")]
    pub store_id: i32,
    #[serde(rename = "storeName")]
    pub store_name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Organization {
    pub organization_id: i32,
    pub organization_name: String,
    pub organization_store: Json<Store>,
}

impl Organization {
    pub fn sample(n: usize) -> Self {
        Self {
            organization_id: 0,
            organization_name: format!("Organization {n}"),
            organization_store: Json(Store {
                store_id: i32::try_from(n).unwrap_or(i32::MAX),
                store_name: format!("Store {n}"),
            }),
        }
    }
}

impl Record for Organization {
    fn fields() -> Vec<Field> {
        vec![
            Field::of::<i32>("organizationId"),
            Field::of::<String>("organizationName"),
            Field::of::<Json<Store>>("organizationStore"),
        ]
    }

    fn values(&self) -> Result<Vec<Value>, CoreError> {
        Ok(vec![
            self.organization_id.into(),
            self.organization_name.as_str().into(),
            self.organization_store.to_value()?,
        ])
    }

    fn decode(&mut self, row: &Row) -> Result<(), CoreError> {
        if let Some(id) = row.get("organizationId") {
            self.organization_id = id;
        }
        if let Some(name) = row.get("organizationName") {
            self.organization_name = name;
        }
        if let Some(store) = row.json("organizationStore")? {
            self.organization_store = Json(store);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub account_id: i32,
    pub organization_id: i32,
    pub account_name: String,
    pub account_email: String,
}

impl Account {
    /// The email is derived from the organization key so reseeding never hits the unique index.
    pub fn sample(n: usize, organization_id: i32) -> Self {
        Self {
            account_id: 0,
            organization_id,
            account_name: format!("Account {n}"),
            account_email: format!("account{organization_id}@example.com"),
        }
    }
}

impl Record for Account {
    fn fields() -> Vec<Field> {
        vec![
            Field::of::<i32>("accountId"),
            Field::of::<i32>("organizationId"),
            Field::of::<String>("accountName"),
            Field::of::<String>("accountEmail"),
        ]
    }

    fn values(&self) -> Result<Vec<Value>, CoreError> {
        Ok(vec![
            self.account_id.into(),
            self.organization_id.into(),
            self.account_name.as_str().into(),
            self.account_email.as_str().into(),
        ])
    }

    fn decode(&mut self, row: &Row) -> Result<(), CoreError> {
        if let Some(id) = row.get("accountId") {
            self.account_id = id;
        }
        if let Some(id) = row.get("organizationId") {
            self.organization_id = id;
        }
        if let Some(name) = row.get("accountName") {
            self.account_name = name;
        }
        if let Some(email) = row.get("accountEmail") {
            self.account_email = email;
        }
        Ok(())
    }

    fn indexes() -> Vec<&'static str> {
        vec!["accountEmail"]
    }
}

/// A binary attachment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct File {
    pub id: i32,
    pub name: String,
    pub data: Vec<u8>,
    pub content_type: String,
}

impl Record for File {
    fn fields() -> Vec<Field> {
        vec![
            Field::of::<i32>("id"),
            Field::of::<String>("name"),
            Field::of::<Vec<u8>>("data"),
            Field::of::<String>("contentType"),
        ]
    }

    fn values(&self) -> Result<Vec<Value>, CoreError> {
        Ok(vec![
            self.id.into(),
            self.name.as_str().into(),
            self.data.as_slice().into(),
            self.content_type.as_str().into(),
        ])
    }

    fn decode(&mut self, row: &Row) -> Result<(), CoreError> {
        if let Some(id) = row.get("id") {
            self.id = id;
        }
        if let Some(name) = row.get("name") {
            self.name = name;
        }
        if let Some(data) = row.get("data") {
            self.data = data;
        }
        if let Some(content_type) = row.get("contentType") {
            self.content_type = content_type;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orm::Schema;

    #[test]
    fn sample_records_have_valid_schemas() {
        assert!(Schema::of::<Organization>().is_ok());
        assert!(Schema::of::<File>().is_ok());

        let account = Schema::of::<Account>().unwrap();
        assert_eq!(account.table(), "Account");
        assert_eq!(account.foreign_keys()[0].table, "Organization");
    }

    #[test]
    fn organization_decodes_its_own_values() {
        let saved = Organization {
            organization_id: 4,
            ..Organization::sample(4)
        };
        let mut row = Row::new();
        for (field, value) in Organization::fields().iter().zip(saved.values().unwrap()) {
            row.push(field.name(), value);
        }

        let mut decoded = Organization::default();
        decoded.decode(&row).unwrap();
        assert_eq!(decoded, saved);
    }

    #[test]
    fn file_bytes_survive_decoding() {
        let row = Row::new()
            .with("id", 1)
            .with("data", vec![0u8, 159, 255])
            .with("contentType", "application/octet-stream");
        let mut file = File::default();
        file.decode(&row).unwrap();
        assert_eq!(file.data, vec![0, 159, 255]);
        assert_eq!(file.name, "");
    }
}
