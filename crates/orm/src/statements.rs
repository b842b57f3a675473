//! SQL text for every statement the record layer issues.
//!
//! Functions here are pure: they take a [`Schema`] (and values where needed)
//! and return a complete statement. Identifiers are always quoted; values go
//! through [`Value::to_sql_literal`] or, for `$n` parameters, [`Value::to_sql_param`].

use crate::query::Select;
use crate::record::Field;
use crate::schema::{ForeignKey, Schema};
use core_types::{ColumnKind, CoreError, Value};

/// Double-quotes an identifier, doubling any embedded `"`.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list<'a>(fields: impl IntoIterator<Item = &'a Field>) -> String {
    fields
        .into_iter()
        .map(|field| quote_identifier(field.name()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The DDL fragment for the primary key column.
fn key_clause(field: &Field) -> String {
    let sql_type = match field.kind() {
        ColumnKind::Integer => "serial",
        ColumnKind::BigInt => "bigserial",
        other => other.sql_type(),
    };
    format!("{} {sql_type} NOT NULL", quote_identifier(field.name()))
}

/// The DDL fragment for a non-key column, with its inline reference when `references` is set.
fn column_clause(field: &Field, references: bool) -> String {
    let mut clause = format!("{} {}", quote_identifier(field.name()), field.kind().sql_type());
    if let Some(default) = field.kind().default_value() {
        clause.push_str(" DEFAULT ");
        clause.push_str(default);
    }
    if references {
        if let Some(table) = field.referenced_table() {
            clause.push_str(&format!(" REFERENCES {} ON DELETE CASCADE", quote_identifier(&table)));
        }
    }
    clause
}

fn create(schema: &Schema, references: bool) -> String {
    let table = schema.table();
    let key = schema.primary_key();
    let mut clauses = vec![key_clause(key)];
    clauses.extend(schema.columns().iter().map(|field| column_clause(field, references)));
    clauses.push(format!(
        "CONSTRAINT {} PRIMARY KEY ({}) NOT DEFERRABLE INITIALLY IMMEDIATE",
        quote_identifier(&format!("{table}_key")),
        quote_identifier(key.name())
    ));
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(table),
        clauses.join(", ")
    )
}

/// `CREATE TABLE IF NOT EXISTS` with inline foreign-key references.
pub fn create_table(schema: &Schema) -> String {
    create(schema, true)
}

/// `CREATE TABLE IF NOT EXISTS` without any `REFERENCES` clauses; see [`add_foreign_keys`].
pub fn create_table_without_references(schema: &Schema) -> String {
    create(schema, false)
}

/// One `CREATE UNIQUE INDEX IF NOT EXISTS` per indexed field.
pub fn create_indexes(schema: &Schema) -> Vec<String> {
    schema
        .indexes()
        .iter()
        .map(|column| {
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                quote_identifier(&format!("{column}_idx")),
                quote_identifier(schema.table()),
                quote_identifier(column)
            )
        })
        .collect()
}

/// Idempotent `DO` blocks adding each inferred foreign key after every table exists.
pub fn add_foreign_keys(schema: &Schema) -> Vec<String> {
    schema
        .foreign_keys()
        .iter()
        .map(|fk| add_foreign_key(schema.table(), fk))
        .collect()
}

fn add_foreign_key(table: &str, fk: &ForeignKey) -> String {
    let constraint = format!("{table}_{}_fkey", fk.column);
    // The constraint name is compared as a string literal inside the block.
    let name_literal = core_types::quote(&constraint);
    format!(
        "DO $$ BEGIN IF NOT EXISTS (SELECT 1 FROM pg_constraint WHERE conname = {name_literal}) THEN \
         ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ON DELETE CASCADE; \
         END IF; END $$",
        quote_identifier(table),
        quote_identifier(&constraint),
        quote_identifier(fk.column),
        quote_identifier(&fk.table)
    )
}

pub fn drop_table(schema: &Schema) -> String {
    format!("DROP TABLE {}", quote_identifier(schema.table()))
}

pub fn drop_table_cascade(schema: &Schema) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", quote_identifier(schema.table()))
}

/// Inserts every non-key column. `values` is parallel to [`Schema::fields`].
pub fn insert(schema: &Schema, values: &[Value]) -> Result<String, CoreError> {
    schema.check_values(values)?;
    let table = quote_identifier(schema.table());
    let key = quote_identifier(schema.primary_key().name());
    if schema.columns().is_empty() {
        return Ok(format!("INSERT INTO {table} DEFAULT VALUES RETURNING {key}"));
    }
    let literals: Vec<String> = values[1..].iter().map(Value::to_sql_literal).collect();
    Ok(format!(
        "INSERT INTO {table} ({}) VALUES ({}) RETURNING {key}",
        column_list(schema.columns()),
        literals.join(", ")
    ))
}

/// Rewrites every non-key column of the row whose key is `values[0]`.
pub fn update(schema: &Schema, values: &[Value]) -> Result<String, CoreError> {
    schema.check_values(values)?;
    let key = quote_identifier(schema.primary_key().name());
    let key_value = values[0].to_sql_literal();
    let assignments: Vec<String> = schema
        .columns()
        .iter()
        .zip(&values[1..])
        .map(|(field, value)| format!("{} = {}", quote_identifier(field.name()), value.to_sql_literal()))
        .collect();
    if assignments.is_empty() {
        // Nothing to write; still confirm the row exists.
        return Ok(format!(
            "SELECT {key} FROM {} WHERE {key} = {key_value}",
            quote_identifier(schema.table())
        ));
    }
    Ok(format!(
        "UPDATE {} SET {} WHERE {key} = {key_value} RETURNING {key}",
        quote_identifier(schema.table()),
        assignments.join(", ")
    ))
}

pub fn delete(schema: &Schema, key_value: &Value) -> String {
    format!(
        "DELETE FROM {} WHERE {} = {} RETURNING 1",
        quote_identifier(schema.table()),
        quote_identifier(schema.primary_key().name()),
        key_value.to_sql_literal()
    )
}

/// Resolves an empty key column to the primary key.
fn key_column<'a>(schema: &'a Schema, key: &'a str) -> &'a str {
    if key.is_empty() {
        schema.primary_key().name()
    } else {
        key
    }
}

/// Single-row lookup by `key` (the primary key when empty).
pub fn select_by(schema: &Schema, key: &str, value: &Value) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = {} LIMIT 1 OFFSET 0",
        quote_identifier(schema.table()),
        quote_identifier(key_column(schema, key)),
        value.to_sql_param()
    )
}

/// Sets `columns` to `values` on every row where `key` matches.
pub fn update_columns(
    schema: &Schema,
    columns: &[&str],
    values: &[Value],
    key: &str,
    key_value: &Value,
) -> Result<String, CoreError> {
    if columns.len() != values.len() {
        return Err(CoreError::ArityMismatch {
            expected: columns.len(),
            actual: values.len(),
        });
    }
    if columns.is_empty() {
        return Err(CoreError::InvalidSchema(
            schema.table().to_string(),
            "an update needs at least one column".to_string(),
        ));
    }
    let assignments: Vec<String> = columns
        .iter()
        .zip(values)
        .map(|(column, value)| format!("{} = {}", quote_identifier(column), value.to_sql_literal()))
        .collect();
    Ok(format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING 1",
        quote_identifier(schema.table()),
        assignments.join(", "),
        quote_identifier(key_column(schema, key)),
        key_value.to_sql_param()
    ))
}

pub fn delete_by(schema: &Schema, key: &str, value: &Value) -> String {
    format!(
        "DELETE FROM {} WHERE {} = {} RETURNING 1",
        quote_identifier(schema.table()),
        quote_identifier(key_column(schema, key)),
        value.to_sql_param()
    )
}

pub fn select(schema: &Schema, query: &Select) -> Result<String, CoreError> {
    query.to_sql(schema.table())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Join;
    use core_types::Json;

    fn organization() -> Schema {
        Schema::new(
            "Organization",
            vec![
                Field::of::<i32>("organizationId"),
                Field::of::<String>("organizationName"),
                Field::of::<Json<()>>("organizationStore"),
            ],
            vec![],
        )
        .unwrap()
    }

    fn account() -> Schema {
        Schema::new(
            "Account",
            vec![
                Field::of::<i32>("accountId"),
                Field::of::<i32>("organizationId"),
                Field::of::<String>("accountName"),
                Field::of::<String>("accountEmail"),
            ],
            vec!["accountEmail"],
        )
        .unwrap()
    }

    #[test]
    fn identifiers_double_embedded_quotes() {
        assert_eq!(quote_identifier("plain"), r#""plain""#);
        assert_eq!(quote_identifier(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn create_table_with_references() {
        assert_eq!(
            create_table(&account()),
            r#"CREATE TABLE IF NOT EXISTS "Account" ("accountId" serial NOT NULL, "organizationId" int DEFAULT 0 REFERENCES "Organization" ON DELETE CASCADE, "accountName" text, "accountEmail" text, CONSTRAINT "Account_key" PRIMARY KEY ("accountId") NOT DEFERRABLE INITIALLY IMMEDIATE)"#
        );
        assert!(!create_table_without_references(&account()).contains("REFERENCES"));
    }

    #[test]
    fn column_defaults_by_kind() {
        let schema = Schema::new(
            "Everything",
            vec![
                Field::of::<String>("code"),
                Field::of::<i64>("total"),
                Field::of::<bool>("active"),
                Field::of::<char>("grade"),
                Field::of::<f64>("price"),
                Field::of::<Vec<u8>>("data"),
                Field::of::<String>("bodyXml"),
            ],
            vec![],
        )
        .unwrap();
        let sql = create_table(&schema);
        assert!(sql.contains(r#""code" text NOT NULL"#), "{sql}");
        assert!(sql.contains(r#""total" bigint DEFAULT 0,"#), "{sql}");
        assert!(sql.contains(r#""active" boolean DEFAULT false"#), "{sql}");
        assert!(sql.contains(r#""grade" char DEFAULT ' '"#), "{sql}");
        assert!(sql.contains(r#""price" double precision DEFAULT 0"#), "{sql}");
        assert!(sql.contains(r#""data" bytea,"#), "{sql}");
        assert!(sql.contains(r#""bodyXml" xml,"#), "{sql}");
    }

    #[test]
    fn unique_indexes() {
        assert_eq!(
            create_indexes(&account()),
            vec![r#"CREATE UNIQUE INDEX IF NOT EXISTS "accountEmail_idx" ON "Account" ("accountEmail")"#]
        );
    }

    #[test]
    fn foreign_keys_are_added_only_once() {
        let blocks = add_foreign_keys(&account());
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0],
            r#"DO $$ BEGIN IF NOT EXISTS (SELECT 1 FROM pg_constraint WHERE conname = 'Account_organizationId_fkey') THEN ALTER TABLE "Account" ADD CONSTRAINT "Account_organizationId_fkey" FOREIGN KEY ("organizationId") REFERENCES "Organization" ON DELETE CASCADE; END IF; END $$"#
        );
        assert!(add_foreign_keys(&organization()).is_empty());
    }

    #[test]
    fn insert_skips_the_key_and_returns_it() {
        let values = vec![
            Value::from(0),
            Value::from(3),
            Value::from("O'Neil"),
            Value::from("o@example.com"),
        ];
        assert_eq!(
            insert(&account(), &values).unwrap(),
            r#"INSERT INTO "Account" ("organizationId", "accountName", "accountEmail") VALUES (3, 'O''Neil', 'o@example.com') RETURNING "accountId""#
        );
    }

    #[test]
    fn insert_json_as_jsonb_literal() {
        let store = Value::json(&serde_json::json!({"storeId": 1, "storeName": "Main"})).unwrap();
        let values = vec![Value::from(0), Value::from("Acme"), store];
        assert_eq!(
            insert(&organization(), &values).unwrap(),
            r#"INSERT INTO "Organization" ("organizationName", "organizationStore") VALUES ('Acme', '{"storeId":1,"storeName":"Main"}'::jsonb) RETURNING "organizationId""#
        );
    }

    #[test]
    fn key_only_records_insert_default_values() {
        let schema = Schema::new("Counter", vec![Field::of::<i32>("counterId")], vec![]).unwrap();
        assert_eq!(
            insert(&schema, &[Value::from(0)]).unwrap(),
            r#"INSERT INTO "Counter" DEFAULT VALUES RETURNING "counterId""#
        );
    }

    #[test]
    fn update_writes_every_column() {
        let values = vec![
            Value::from(7),
            Value::from(3),
            Value::from("Ann"),
            Value::from("ann@example.com"),
        ];
        assert_eq!(
            update(&account(), &values).unwrap(),
            r#"UPDATE "Account" SET "organizationId" = 3, "accountName" = 'Ann', "accountEmail" = 'ann@example.com' WHERE "accountId" = 7 RETURNING "accountId""#
        );
    }

    #[test]
    fn wrong_value_count_is_rejected() {
        assert!(matches!(
            insert(&account(), &[Value::from(0)]),
            Err(CoreError::ArityMismatch { expected: 4, actual: 1 })
        ));
    }

    #[test]
    fn delete_and_lookup_by_key() {
        assert_eq!(
            delete(&account(), &Value::from(7)),
            r#"DELETE FROM "Account" WHERE "accountId" = 7 RETURNING 1"#
        );
        assert_eq!(
            select_by(&account(), "", &Value::from(7)),
            r#"SELECT * FROM "Account" WHERE "accountId" = '7' LIMIT 1 OFFSET 0"#
        );
        assert_eq!(
            select_by(&account(), "accountEmail", &Value::from("a@b.com")),
            r#"SELECT * FROM "Account" WHERE "accountEmail" = 'a@b.com' LIMIT 1 OFFSET 0"#
        );
        assert_eq!(
            delete_by(&account(), "accountName", &Value::from("X")),
            r#"DELETE FROM "Account" WHERE "accountName" = 'X' RETURNING 1"#
        );
    }

    #[test]
    fn bespoke_update() {
        assert_eq!(
            update_columns(&account(), &["accountEmail"], &[Value::from("a@b.com")], "accountName", &Value::from("X")).unwrap(),
            r#"UPDATE "Account" SET "accountEmail" = 'a@b.com' WHERE "accountName" = 'X' RETURNING 1"#
        );
        assert!(matches!(
            update_columns(&account(), &["a", "b"], &[Value::from(1)], "", &Value::from(1)),
            Err(CoreError::ArityMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn drop_statements() {
        assert_eq!(drop_table(&account()), r#"DROP TABLE "Account""#);
        assert_eq!(drop_table_cascade(&account()), r#"DROP TABLE IF EXISTS "Account" CASCADE"#);
    }

    #[test]
    fn joined_select_against_schema() {
        let query = Select::new()
            .join(Join::parse("Account", "Account.organizationId = Organization.organizationId").unwrap())
            .where_clause("Organization.organizationId > $1")
            .unwrap()
            .param(0);
        let sql = select(&organization(), &query).unwrap();
        let join_at = sql.find("INNER JOIN").unwrap();
        let where_at = sql.find(r#"WHERE "Organization"."organizationId" > '0'"#).unwrap();
        assert!(join_at < where_at);
    }
}
