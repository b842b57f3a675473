use crate::filter::{Column, Predicate};
use crate::statements::quote_identifier;
use core_types::{CoreError, Cursor, JoinType, SortOrder, Value};

/// A join against another table.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: String,
    pub direction: JoinType,
    pub on: Predicate,
}

impl Join {
    /// An inner join.
    pub fn new(table: impl Into<String>, on: Predicate) -> Self {
        Self {
            table: table.into(),
            direction: JoinType::default(),
            on,
        }
    }

    /// An inner join whose condition is given as text, e.g.
    /// `Account.organizationId = Organization.organizationId`.
    pub fn parse(table: impl Into<String>, on: &str) -> Result<Self, CoreError> {
        Ok(Self::new(table, Predicate::parse(on)?))
    }

    pub fn with_direction(mut self, direction: JoinType) -> Self {
        self.direction = direction;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: Column,
    pub order: SortOrder,
}

impl OrderBy {
    pub fn asc(column: &str) -> Self {
        Self {
            column: Column::new(column),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: Column::new(column),
            order: SortOrder::Desc,
        }
    }

    /// Parses `column`, `column ASC` or `column DESC`.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let mut words = text.split_whitespace();
        let column = words.next().ok_or_else(|| CoreError::InvalidFilter {
            position: 0,
            message: "empty ORDER BY term".to_string(),
        })?;
        let order = match words.next() {
            None => SortOrder::Asc,
            Some(word) if word.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            Some(word) if word.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            Some(word) => {
                return Err(CoreError::InvalidFilter {
                    position: text.find(word).unwrap_or(0),
                    message: format!("expected ASC or DESC, found {word}"),
                });
            }
        };
        if let Some(extra) = words.next() {
            return Err(CoreError::InvalidFilter {
                position: text.rfind(extra).unwrap_or(0),
                message: "unexpected trailing input".to_string(),
            });
        }
        Ok(Self {
            column: Column::new(column),
            order,
        })
    }
}

/// A general select against a table.
///
/// Built with chained setters and rendered with [`Select::to_sql`]. The default
/// projection is every column (`*`), or every column of every joined table
/// when joins are present. An unbounded cursor (the default) emits neither
/// `LIMIT` nor `OFFSET`.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    columns: Vec<Column>,
    filter: Option<Predicate>,
    params: Vec<Value>,
    order_by: Vec<OrderBy>,
    cursor: Cursor,
    joins: Vec<Join>,
    group_by: Vec<Column>,
    having: Option<Predicate>,
}

impl Default for Select {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            filter: None,
            params: Vec::new(),
            order_by: Vec::new(),
            cursor: Cursor::unbounded(),
            joins: Vec::new(),
            group_by: Vec::new(),
            having: None,
        }
    }
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    /// Parses a textual `WHERE` clause. Blank text clears the filter.
    pub fn where_clause(mut self, text: &str) -> Result<Self, CoreError> {
        if text.trim().is_empty() {
            self.filter = None;
            return Ok(self);
        }
        Ok(self.filter(Predicate::parse(text)?))
    }

    /// Replaces the positional parameters referenced as `$1`, `$2`, ...
    pub fn params<I, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Appends one positional parameter.
    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn group_by(mut self, column: impl Into<Column>) -> Self {
        self.group_by.push(column.into());
        self
    }

    pub fn having(mut self, predicate: Predicate) -> Self {
        self.having = Some(predicate);
        self
    }

    /// Renders the statement against `table`.
    pub fn to_sql(&self, table: &str) -> Result<String, CoreError> {
        let projection = if !self.columns.is_empty() {
            join_rendered(&self.columns)
        } else if self.joins.is_empty() {
            "*".to_string()
        } else {
            std::iter::once(table)
                .chain(self.joins.iter().map(|join| join.table.as_str()))
                .map(|t| Column::all_of(t).to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {projection} FROM {}", quote_identifier(table));

        for join in &self.joins {
            sql.push_str(&format!(
                " {} JOIN {} ON {}",
                join.direction,
                quote_identifier(&join.table),
                join.on.render(&self.params)?
            ));
        }
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.render(&self.params)?);
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&join_rendered(&self.group_by));
        }
        if let Some(having) = &self.having {
            sql.push_str(" HAVING ");
            sql.push_str(&having.render(&self.params)?);
        }
        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|term| format!("{} {}", term.column, term.order))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        if self.cursor.limit() > 0 {
            sql.push_str(&format!(" LIMIT {}", self.cursor.limit()));
        }
        if self.cursor.offset() > 0 {
            sql.push_str(&format!(" OFFSET {}", self.cursor.offset()));
        }
        Ok(sql)
    }
}

fn join_rendered(columns: &[Column]) -> String {
    columns
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{col, param};

    #[test]
    fn bare_select_reads_everything() {
        assert_eq!(Select::new().to_sql("Account").unwrap(), r#"SELECT * FROM "Account""#);
    }

    #[test]
    fn blank_where_clause_means_no_filter() {
        for text in ["", "   ", "\t\n"] {
            let query = Select::new().where_clause(text).unwrap();
            assert_eq!(query.to_sql("Account").unwrap(), r#"SELECT * FROM "Account""#);
        }

        let cleared = Select::new()
            .where_clause("accountId = 1")
            .unwrap()
            .where_clause(" ")
            .unwrap();
        assert_eq!(cleared.to_sql("Account").unwrap(), r#"SELECT * FROM "Account""#);
    }

    #[test]
    fn joined_select_projects_each_table() {
        let sql = Select::new()
            .join(Join::parse("Account", "Account.organizationId = Organization.organizationId").unwrap())
            .where_clause("Organization.organizationId > $1")
            .unwrap()
            .param(0)
            .to_sql("Organization")
            .unwrap();
        assert_eq!(
            sql,
            r#"SELECT "Organization".*, "Account".* FROM "Organization" INNER JOIN "Account" ON "Account"."organizationId" = "Organization"."organizationId" WHERE "Organization"."organizationId" > '0'"#
        );
    }

    #[test]
    fn clauses_render_in_order() {
        let sql = Select::new()
            .columns(["organizationId"])
            .filter(col("accountName").like(param(1)))
            .params(["A%"])
            .group_by("organizationId")
            .having(Predicate::parse("organizationId > 1").unwrap())
            .order_by(OrderBy::desc("organizationId"))
            .cursor(Cursor::new(10, 20))
            .to_sql("Account")
            .unwrap();
        assert_eq!(
            sql,
            r#"SELECT "organizationId" FROM "Account" WHERE "accountName" LIKE 'A%' GROUP BY "organizationId" HAVING "organizationId" > 1 ORDER BY "organizationId" DESC LIMIT 10 OFFSET 20"#
        );
    }

    #[test]
    fn zero_offset_is_omitted() {
        let sql = Select::new().cursor(Cursor::new(5, 0)).to_sql("File").unwrap();
        assert_eq!(sql, r#"SELECT * FROM "File" LIMIT 5"#);
    }

    #[test]
    fn outer_join_is_full_outer() {
        let join = Join::parse("Account", "Account.organizationId = Organization.organizationId")
            .unwrap()
            .with_direction(JoinType::Outer);
        let sql = Select::new().join(join).to_sql("Organization").unwrap();
        assert!(sql.contains(r#" FULL OUTER JOIN "Account" ON "#), "{sql}");
    }

    #[test]
    fn order_by_text() {
        assert_eq!(OrderBy::parse("name").unwrap(), OrderBy::asc("name"));
        assert_eq!(OrderBy::parse("name desc").unwrap(), OrderBy::desc("name"));
        assert!(OrderBy::parse("name sideways").is_err());
        assert!(OrderBy::parse("").is_err());
    }

    #[test]
    fn unresolved_parameter_fails_rendering() {
        let select = Select::new().where_clause("id = $1").unwrap();
        assert!(matches!(select.to_sql("Account"), Err(CoreError::MissingParameter(1))));
    }
}
