//! Typed column references and filter predicates.
//!
//! Filters are trees, never spliced text: identifiers are always rendered
//! quoted, literal values are rendered by their variant, and positional
//! parameters (`$1`, `$2`, ...) are resolved against the caller's parameter
//! list at render time. [`Predicate::parse`] accepts the familiar textual form
//! (`Organization.organizationId > $1 AND name LIKE 'A%'`) and builds the same
//! tree.

use crate::statements::quote_identifier;
use core_types::{CoreError, Value};
use std::fmt;

/// A column reference, optionally qualified (`"table"."column"`) or a wildcard (`"table".*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    path: Vec<String>,
    wildcard: bool,
}

impl Column {
    /// Builds a reference from dotted text. `table.*` and `*` are wildcards.
    pub fn new(dotted: &str) -> Self {
        let mut path: Vec<String> = dotted
            .split('.')
            .map(|segment| segment.trim().trim_matches('"').to_string())
            .filter(|segment| !segment.is_empty())
            .collect();
        let wildcard = path.last().is_some_and(|last| last == "*");
        if wildcard {
            path.pop();
        }
        Self { path, wildcard }
    }

    pub fn qualified(table: &str, column: &str) -> Self {
        Self {
            path: vec![table.to_string(), column.to_string()],
            wildcard: false,
        }
    }

    /// Every column of `table`.
    pub fn all_of(table: &str) -> Self {
        Self {
            path: vec![table.to_string()],
            wildcard: true,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self.path.iter().map(|s| quote_identifier(s)).collect();
        match (quoted.is_empty(), self.wildcard) {
            (true, _) => f.write_str("*"),
            (false, true) => write!(f, "{}.*", quoted.join(".")),
            (false, false) => f.write_str(&quoted.join(".")),
        }
    }
}

impl From<&str> for Column {
    fn from(dotted: &str) -> Self {
        Column::new(dotted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    ILike,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::ILike => "ILIKE",
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(Column),
    /// A 1-based positional parameter.
    Param(usize),
    Value(Value),
}

/// A column operand from dotted text.
pub fn col(dotted: &str) -> Operand {
    Operand::Column(Column::new(dotted))
}

/// The positional parameter `$n`.
pub fn param(n: usize) -> Operand {
    Operand::Param(n)
}

/// A literal operand.
pub fn lit(value: impl Into<Value>) -> Operand {
    Operand::Value(value.into())
}

impl From<Column> for Operand {
    fn from(column: Column) -> Self {
        Operand::Column(column)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl Operand {
    fn compare(self, op: CompareOp, right: impl Into<Operand>) -> Predicate {
        Predicate::Compare {
            left: self,
            op,
            right: right.into(),
        }
    }

    pub fn eq(self, right: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Eq, right)
    }

    pub fn ne(self, right: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::NotEq, right)
    }

    pub fn lt(self, right: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Lt, right)
    }

    pub fn lte(self, right: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::LtEq, right)
    }

    pub fn gt(self, right: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Gt, right)
    }

    pub fn gte(self, right: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::GtEq, right)
    }

    pub fn like(self, right: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Like, right)
    }

    pub fn ilike(self, right: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::ILike, right)
    }

    pub fn is_null(self) -> Predicate {
        Predicate::IsNull {
            operand: self,
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Predicate {
        Predicate::IsNull {
            operand: self,
            negated: true,
        }
    }

    fn render(&self, params: &[Value], out: &mut String) -> Result<(), CoreError> {
        match self {
            Operand::Column(column) => out.push_str(&column.to_string()),
            Operand::Param(n) => {
                let value = n
                    .checked_sub(1)
                    .and_then(|i| params.get(i))
                    .ok_or(CoreError::MissingParameter(*n))?;
                out.push_str(&value.to_sql_param());
            }
            Operand::Value(value) => out.push_str(&value.to_sql_literal()),
        }
        Ok(())
    }
}

/// A boolean filter used by `WHERE`, `HAVING` and join `ON` clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Parses a textual filter into a predicate tree.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens,
            index: 0,
            end: text.len(),
        };
        let predicate = parser.or_expr()?;
        match parser.peek() {
            None => Ok(predicate),
            Some(token) => Err(invalid(token.pos, "unexpected trailing input")),
        }
    }

    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::And(mut items) => {
                items.push(other);
                Predicate::And(items)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Or(mut items) => {
                items.push(other);
                Predicate::Or(items)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }

    /// Renders the predicate as SQL, substituting `params` for `$n` references.
    pub fn render(&self, params: &[Value]) -> Result<String, CoreError> {
        let mut out = String::new();
        self.write(params, &mut out)?;
        Ok(out)
    }

    fn write(&self, params: &[Value], out: &mut String) -> Result<(), CoreError> {
        match self {
            Predicate::Compare { left, op, right } => {
                left.render(params, out)?;
                out.push(' ');
                out.push_str(op.as_str());
                out.push(' ');
                right.render(params, out)?;
            }
            Predicate::IsNull { operand, negated } => {
                operand.render(params, out)?;
                out.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Predicate::And(items) => write_chain(items, " AND ", "TRUE", params, out)?,
            Predicate::Or(items) => write_chain(items, " OR ", "FALSE", params, out)?,
            Predicate::Not(inner) => {
                out.push_str("NOT (");
                inner.write(params, out)?;
                out.push(')');
            }
        }
        Ok(())
    }
}

fn write_chain(
    items: &[Predicate],
    separator: &str,
    empty: &str,
    params: &[Value],
    out: &mut String,
) -> Result<(), CoreError> {
    if items.is_empty() {
        out.push_str(empty);
        return Ok(());
    }
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        // Nested chains are parenthesised so precedence never depends on the reader.
        let nested = matches!(item, Predicate::And(_) | Predicate::Or(_));
        if nested {
            out.push('(');
        }
        item.write(params, out)?;
        if nested {
            out.push(')');
        }
    }
    Ok(())
}

fn invalid(position: usize, message: &str) -> CoreError {
    CoreError::InvalidFilter {
        position,
        message: message.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    /// Identifier segments joined by dots; `quoted` is set if any segment was double-quoted.
    Word { segments: Vec<String>, quoted: bool },
    Param(usize),
    Str(String),
    Number(Value),
    Op(CompareOp),
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

impl Token {
    /// Whether this token is the bare keyword `keyword` (case-insensitive).
    fn is_keyword(&self, keyword: &str) -> bool {
        match &self.kind {
            TokenKind::Word { segments, quoted } => {
                !quoted && segments.len() == 1 && segments[0].eq_ignore_ascii_case(keyword)
            }
            _ => false,
        }
    }
}

const KEYWORDS: [&str; 9] = ["AND", "OR", "NOT", "IS", "NULL", "LIKE", "ILIKE", "TRUE", "FALSE"];

fn tokenize(text: &str) -> Result<Vec<Token>, CoreError> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let at = |i: usize| chars.get(i).map(|(_, c)| *c);
    let pos_of = |i: usize| chars.get(i).map_or(text.len(), |(p, _)| *p);

    let mut tokens = Vec::new();
    let mut i = 0;
    while let Some(c) = at(i) {
        let pos = pos_of(i);
        let kind = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => {
                i += 1;
                TokenKind::LParen
            }
            ')' => {
                i += 1;
                TokenKind::RParen
            }
            '=' => {
                i += 1;
                TokenKind::Op(CompareOp::Eq)
            }
            '<' => match at(i + 1) {
                Some('=') => {
                    i += 2;
                    TokenKind::Op(CompareOp::LtEq)
                }
                Some('>') => {
                    i += 2;
                    TokenKind::Op(CompareOp::NotEq)
                }
                _ => {
                    i += 1;
                    TokenKind::Op(CompareOp::Lt)
                }
            },
            '>' => match at(i + 1) {
                Some('=') => {
                    i += 2;
                    TokenKind::Op(CompareOp::GtEq)
                }
                _ => {
                    i += 1;
                    TokenKind::Op(CompareOp::Gt)
                }
            },
            '!' if at(i + 1) == Some('=') => {
                i += 2;
                TokenKind::Op(CompareOp::NotEq)
            }
            '$' => {
                let start = i + 1;
                let mut end = start;
                while at(end).is_some_and(|c| c.is_ascii_digit()) {
                    end += 1;
                }
                let digits = &text[pos_of(start)..pos_of(end)];
                let n: usize = digits
                    .parse()
                    .map_err(|_| invalid(pos, "expected a parameter number after '$'"))?;
                if n == 0 {
                    return Err(invalid(pos, "parameters are numbered from $1"));
                }
                i = end;
                TokenKind::Param(n)
            }
            '\'' => {
                let mut literal = String::new();
                let mut j = i + 1;
                loop {
                    match at(j) {
                        None => return Err(invalid(pos, "unterminated string literal")),
                        Some('\'') if at(j + 1) == Some('\'') => {
                            literal.push('\'');
                            j += 2;
                        }
                        Some('\'') => {
                            j += 1;
                            break;
                        }
                        Some(c) => {
                            literal.push(c);
                            j += 1;
                        }
                    }
                }
                i = j;
                TokenKind::Str(literal)
            }
            c if c.is_ascii_digit() || (c == '-' && at(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let mut end = i + 1;
                let mut seen_dot = false;
                while let Some(d) = at(end) {
                    if d.is_ascii_digit() {
                        end += 1;
                    } else if d == '.' && !seen_dot && at(end + 1).is_some_and(|n| n.is_ascii_digit()) {
                        seen_dot = true;
                        end += 1;
                    } else {
                        break;
                    }
                }
                let digits = &text[pos..pos_of(end)];
                let value = if seen_dot {
                    digits.parse::<f64>().map(Value::Float).ok()
                } else {
                    digits.parse::<i64>().map(Value::Int).ok()
                };
                i = end;
                TokenKind::Number(value.ok_or_else(|| invalid(pos, "number out of range"))?)
            }
            c if c == '"' || c == '_' || c.is_alphabetic() => {
                let mut segments = Vec::new();
                let mut quoted = false;
                let mut j = i;
                loop {
                    match at(j) {
                        Some('"') => {
                            quoted = true;
                            let mut segment = String::new();
                            j += 1;
                            loop {
                                match at(j) {
                                    None => return Err(invalid(pos, "unterminated quoted identifier")),
                                    Some('"') if at(j + 1) == Some('"') => {
                                        segment.push('"');
                                        j += 2;
                                    }
                                    Some('"') => {
                                        j += 1;
                                        break;
                                    }
                                    Some(c) => {
                                        segment.push(c);
                                        j += 1;
                                    }
                                }
                            }
                            segments.push(segment);
                        }
                        Some(c) if c == '_' || c.is_alphabetic() => {
                            let start = j;
                            while at(j).is_some_and(|c| c == '_' || c.is_alphanumeric()) {
                                j += 1;
                            }
                            segments.push(text[pos_of(start)..pos_of(j)].to_string());
                        }
                        _ => return Err(invalid(pos_of(j), "expected an identifier")),
                    }
                    if at(j) == Some('.') {
                        j += 1;
                    } else {
                        break;
                    }
                }
                i = j;
                TokenKind::Word { segments, quoted }
            }
            _ => return Err(invalid(pos, "unexpected character")),
        };
        tokens.push(Token { kind, pos });
    }
    Ok(tokens)
}

/// Recursive-descent parser over the token list.
///
/// ```text
/// or_expr    := and_expr ("OR" and_expr)*
/// and_expr   := not_expr ("AND" not_expr)*
/// not_expr   := "NOT" not_expr | "(" or_expr ")" | comparison
/// comparison := operand (op operand | ["NOT"] ("LIKE" | "ILIKE") operand | "IS" ["NOT"] "NULL")
/// ```
struct Parser {
    tokens: Vec<Token>,
    index: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        self.index += 1;
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(keyword)) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn position(&self) -> usize {
        self.peek().map_or(self.end, |t| t.pos)
    }

    fn or_expr(&mut self) -> Result<Predicate, CoreError> {
        let mut items = vec![self.and_expr()?];
        while self.eat_keyword("OR") {
            items.push(self.and_expr()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Predicate::Or(items)
        })
    }

    fn and_expr(&mut self) -> Result<Predicate, CoreError> {
        let mut items = vec![self.not_expr()?];
        while self.eat_keyword("AND") {
            items.push(self.not_expr()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Predicate::And(items)
        })
    }

    fn not_expr(&mut self) -> Result<Predicate, CoreError> {
        if self.eat_keyword("NOT") {
            return Ok(self.not_expr()?.negate());
        }
        if self.peek().is_some_and(|t| t.kind == TokenKind::LParen) {
            self.index += 1;
            let inner = self.or_expr()?;
            return match self.next() {
                Some(Token { kind: TokenKind::RParen, .. }) => Ok(inner),
                _ => Err(invalid(self.position(), "expected ')'")),
            };
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Predicate, CoreError> {
        let left = self.operand()?;

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            if !self.eat_keyword("NULL") {
                return Err(invalid(self.position(), "expected NULL after IS"));
            }
            return Ok(Predicate::IsNull {
                operand: left,
                negated,
            });
        }

        let negated = self.eat_keyword("NOT");
        let op = if self.eat_keyword("LIKE") {
            CompareOp::Like
        } else if self.eat_keyword("ILIKE") {
            CompareOp::ILike
        } else if negated {
            return Err(invalid(self.position(), "expected LIKE or ILIKE after NOT"));
        } else {
            match self.next() {
                Some(Token { kind: TokenKind::Op(op), .. }) => op,
                _ => {
                    self.index -= 1;
                    return Err(invalid(self.position(), "expected a comparison operator"));
                }
            }
        };

        let predicate = left.compare(op, self.operand()?);
        Ok(if negated { predicate.negate() } else { predicate })
    }

    fn operand(&mut self) -> Result<Operand, CoreError> {
        let position = self.position();
        let token = self
            .next()
            .ok_or_else(|| invalid(position, "expected a column, parameter or value"))?;
        match token.kind {
            TokenKind::Param(n) => Ok(Operand::Param(n)),
            TokenKind::Str(text) => Ok(Operand::Value(Value::Text(text))),
            TokenKind::Number(value) => Ok(Operand::Value(value)),
            TokenKind::Word { .. } if token.is_keyword("TRUE") => Ok(Operand::Value(Value::Bool(true))),
            TokenKind::Word { .. } if token.is_keyword("FALSE") => Ok(Operand::Value(Value::Bool(false))),
            TokenKind::Word { .. } if token.is_keyword("NULL") => Ok(Operand::Value(Value::Null)),
            TokenKind::Word { segments, quoted } => {
                if !quoted
                    && segments.len() == 1
                    && KEYWORDS.iter().any(|k| segments[0].eq_ignore_ascii_case(k))
                {
                    return Err(invalid(token.pos, "expected a column, parameter or value"));
                }
                Ok(Operand::Column(Column {
                    path: segments,
                    wildcard: false,
                }))
            }
            _ => Err(invalid(token.pos, "expected a column, parameter or value")),
        }
    }
}
