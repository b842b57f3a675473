#![allow(dead_code)]

use async_trait::async_trait;
use database::{Connection, ConnectionSource, DbError};
use orm::{CoreError, Field, Json, Pool, Record, Row, Value};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

type Responder = dyn Fn(&str) -> Result<Vec<Row>, DbError> + Send + Sync;

/// Records every statement and answers it with a caller-supplied closure.
#[derive(Clone)]
pub struct Script {
    log: Arc<Mutex<Vec<String>>>,
    responder: Arc<Responder>,
}

impl Script {
    pub fn new(responder: impl Fn(&str) -> Result<Vec<Row>, DbError> + Send + Sync + 'static) -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(responder),
        }
    }

    /// Answers every statement with no rows.
    pub fn empty() -> Self {
        Self::new(|_| Ok(Vec::new()))
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn last(&self) -> String {
        self.statements().last().cloned().unwrap_or_default()
    }

    pub fn pool(&self, max: usize) -> Pool {
        Pool::new(self.clone(), max)
    }

    pub fn connection(&self) -> ScriptedConnection {
        ScriptedConnection {
            script: self.clone(),
        }
    }
}

pub struct ScriptedConnection {
    script: Script,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, DbError> {
        self.script.log.lock().unwrap().push(sql.to_string());
        (self.script.responder)(sql)
    }

    async fn close(self: Box<Self>) -> Result<(), DbError> {
        Ok(())
    }
}

#[async_trait]
impl ConnectionSource for Script {
    async fn open(&self) -> Result<Box<dyn Connection>, DbError> {
        Ok(Box::new(self.connection()))
    }
}

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
