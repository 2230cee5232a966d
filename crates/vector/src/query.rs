//! The attribute query language used to preselect rows and columns while reading a layer.
//!
//! Supported: `SELECT <* | column[, column...]> FROM <layer> [WHERE <predicate>]`.
//! Predicates are built from comparisons (`= != <> < <= > >=`), `[NOT] LIKE`, `[NOT] IN (...)`,
//! `IS [NOT] NULL`, `AND`, `OR`, `NOT` and parentheses. Null values follow SQL three-valued logic,
//! rows for which the predicate is unknown are not selected.

use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::NaiveDateTime;

use crate::{Error, Field, Result, Schema, feature::FeatureRef, schema::parse_datetime};

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Column(String),
    Literal(Literal),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    fn matches(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Compare {
        lhs: Operand,
        op: CompareOp,
        rhs: Operand,
    },
    Like {
        operand: Operand,
        pattern: String,
        negated: bool,
    },
    In {
        operand: Operand,
        values: Vec<Literal>,
        negated: bool,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
    /// A boolean column or literal used as condition
    Truthy(Operand),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

/// A parsed attribute query
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    columns: Option<Vec<String>>,
    layer: String,
    predicate: Option<Predicate>,
}

impl Query {
    pub fn parse(sql: &str) -> Result<Query> {
        let tokens = tokenize(sql)?;
        Parser { tokens, pos: 0 }.query()
    }

    /// The table of the `FROM` clause
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// The selected columns, `None` for `SELECT *`
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    /// Every column the query refers to must be present in the schema
    pub fn validate(&self, schema: &Schema) -> Result {
        let mut referenced: Vec<&str> = self.columns.iter().flatten().map(String::as_str).collect();
        if let Some(predicate) = &self.predicate {
            predicate.collect_columns(&mut referenced);
        }

        if let Some(unknown) = referenced.iter().find(|col| schema.index_of(col).is_none()) {
            return Err(Error::MalformedQuery(format!(
                "Unknown column '{unknown}' in layer '{}', available columns: {}",
                self.layer,
                schema.names().collect::<Vec<_>>().join(", ")
            )));
        }

        Ok(())
    }

    /// Schema indexes of the selected columns, `None` when all columns are selected
    pub fn column_indexes(&self, schema: &Schema) -> Result<Option<Vec<usize>>> {
        self.columns
            .as_ref()
            .map(|columns| {
                columns
                    .iter()
                    .map(|col| {
                        schema
                            .index_of(col)
                            .ok_or_else(|| Error::MalformedQuery(format!("Unknown column '{col}'")))
                    })
                    .collect::<Result<Vec<usize>>>()
            })
            .transpose()
    }
}

impl FromStr for Query {
    type Err = Error;

    fn from_str(sql: &str) -> Result<Self> {
        Query::parse(sql)
    }
}

impl Predicate {
    /// Evaluates the predicate for a feature, `None` when the outcome is unknown because of null values
    pub fn evaluate(&self, feature: &FeatureRef) -> Option<bool> {
        match self {
            Predicate::Compare { lhs, op, rhs } => {
                let lhs = Scalar::resolve(lhs, feature);
                let rhs = Scalar::resolve(rhs, feature);
                lhs.compare(&rhs).map(|ordering| op.matches(ordering))
            }
            Predicate::Like {
                operand,
                pattern,
                negated,
            } => {
                let text = Scalar::resolve(operand, feature).into_text()?;
                Some(like(&text, pattern) != *negated)
            }
            Predicate::In {
                operand,
                values,
                negated,
            } => {
                let value = Scalar::resolve(operand, feature);
                if value.is_null() {
                    return None;
                }

                let mut unknown = false;
                for literal in values {
                    match value.compare(&Scalar::from_literal(literal)) {
                        Some(Ordering::Equal) => return Some(!*negated),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }

                if unknown { None } else { Some(*negated) }
            }
            Predicate::IsNull { operand, negated } => Some(Scalar::resolve(operand, feature).is_null() != *negated),
            Predicate::Truthy(operand) => Scalar::resolve(operand, feature).truthy(),
            Predicate::And(lhs, rhs) => match (lhs.evaluate(feature), rhs.evaluate(feature)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Predicate::Or(lhs, rhs) => match (lhs.evaluate(feature), rhs.evaluate(feature)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Predicate::Not(inner) => inner.evaluate(feature).map(|val| !val),
        }
    }

    /// The feature is selected by the predicate (unknown counts as not selected)
    pub fn matches(&self, feature: &FeatureRef) -> bool {
        self.evaluate(feature).unwrap_or(false)
    }

    fn collect_columns<'a>(&'a self, columns: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare { lhs, rhs, .. } => {
                columns.extend(lhs.column());
                columns.extend(rhs.column());
            }
            Predicate::Like { operand, .. }
            | Predicate::In { operand, .. }
            | Predicate::IsNull { operand, .. }
            | Predicate::Truthy(operand) => columns.extend(operand.column()),
            Predicate::And(lhs, rhs) | Predicate::Or(lhs, rhs) => {
                lhs.collect_columns(columns);
                rhs.collect_columns(columns);
            }
            Predicate::Not(inner) => inner.collect_columns(columns),
        }
    }
}

impl Operand {
    fn column(&self) -> Option<&str> {
        match self {
            Operand::Column(name) => Some(name),
            Operand::Literal(_) => None,
        }
    }
}

/// Renders the predicate as an OGR SQL attribute filter
impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let not = |negated: &bool| if *negated { "NOT " } else { "" };

        match self {
            Predicate::Compare { lhs, op, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
            Predicate::Like {
                operand,
                pattern,
                negated,
            } => write!(f, "{operand} {}LIKE {}", not(negated), Literal::String(pattern.clone())),
            Predicate::In {
                operand,
                values,
                negated,
            } => {
                let values: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{operand} {}IN ({})", not(negated), values.join(", "))
            }
            Predicate::IsNull { operand, negated } => write!(f, "{operand} IS {}NULL", not(negated)),
            Predicate::Truthy(Operand::Literal(Literal::Boolean(val))) => {
                write!(f, "{}", if *val { "1 = 1" } else { "1 = 0" })
            }
            Predicate::Truthy(operand) => write!(f, "{operand} <> 0"),
            Predicate::And(lhs, rhs) => write!(f, "({lhs} AND {rhs})"),
            Predicate::Or(lhs, rhs) => write!(f, "({lhs} OR {rhs})"),
            Predicate::Not(inner) => write!(f, "(NOT {inner})"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Column(name) => write!(f, "\"{}\"", name.replace('"', "\"\"")),
            Operand::Literal(literal) => write!(f, "{literal}"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("NULL"),
            Literal::Boolean(val) => write!(f, "{}", if *val { 1 } else { 0 }),
            Literal::Integer(val) => write!(f, "{val}"),
            Literal::Float(val) => write!(f, "{val}"),
            Literal::String(val) => write!(f, "'{}'", val.replace('\'', "''")),
        }
    }
}

/// Attribute or literal value during evaluation
#[derive(Debug, PartialEq)]
enum Scalar {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Scalar {
    fn resolve(operand: &Operand, feature: &FeatureRef) -> Scalar {
        match operand {
            Operand::Column(name) => match feature.attribute(name) {
                None => Scalar::Null,
                Some(Field::String(val)) => Scalar::Text(val.clone()),
                Some(Field::Integer(val)) => Scalar::Integer(*val),
                Some(Field::Float(val)) => Scalar::Float(*val),
                Some(Field::Boolean(val)) => Scalar::Boolean(*val),
                Some(Field::DateTime(val)) => Scalar::DateTime(*val),
            },
            Operand::Literal(literal) => Scalar::from_literal(literal),
        }
    }

    fn from_literal(literal: &Literal) -> Scalar {
        match literal {
            Literal::Null => Scalar::Null,
            Literal::Boolean(val) => Scalar::Boolean(*val),
            Literal::Integer(val) => Scalar::Integer(*val),
            Literal::Float(val) => Scalar::Float(*val),
            Literal::String(val) => Scalar::Text(val.clone()),
        }
    }

    fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Integer(val) => Some(*val as f64),
            Scalar::Float(val) => Some(*val),
            Scalar::Boolean(val) => Some(if *val { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            Scalar::Null => None,
            Scalar::Text(val) => Some(val),
            Scalar::Integer(val) => Some(val.to_string()),
            Scalar::Float(val) => Some(val.to_string()),
            Scalar::Boolean(val) => Some(val.to_string()),
            Scalar::DateTime(val) => Some(Field::DateTime(val).to_string()),
        }
    }

    fn truthy(&self) -> Option<bool> {
        match self {
            Scalar::Boolean(val) => Some(*val),
            Scalar::Integer(val) => Some(*val != 0),
            Scalar::Float(val) => Some(*val != 0.0),
            _ => None,
        }
    }

    /// `None` when one of the values is null or the types can not be compared
    fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Null, _) | (_, Scalar::Null) => None,
            (Scalar::Integer(lhs), Scalar::Integer(rhs)) => Some(lhs.cmp(rhs)),
            (Scalar::Boolean(lhs), Scalar::Boolean(rhs)) => Some(lhs.cmp(rhs)),
            (Scalar::Text(lhs), Scalar::Text(rhs)) => Some(lhs.cmp(rhs)),
            (Scalar::DateTime(lhs), Scalar::DateTime(rhs)) => Some(lhs.cmp(rhs)),
            (Scalar::DateTime(lhs), Scalar::Text(rhs)) => parse_datetime(rhs).map(|rhs| lhs.cmp(&rhs)),
            (Scalar::Text(lhs), Scalar::DateTime(rhs)) => parse_datetime(lhs).map(|lhs| lhs.cmp(rhs)),
            (lhs, rhs) => lhs.as_number()?.partial_cmp(&rhs.as_number()?),
        }
    }
}

/// SQL LIKE matching (`%` any sequence, `_` any character), case-insensitive for ASCII letters only like OGR SQL
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_ascii_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_ascii_lowercase().chars().collect();

    // matched[j]: the text processed so far matches the first j pattern characters
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    for j in 1..=pattern.len() {
        matched[j] = matched[j - 1] && pattern[j - 1] == '%';
    }

    for c in text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || matched[j],
                '_' => matched[j - 1],
                p => matched[j - 1] && p == c,
            };
        }
        matched = next;
    }

    matched[pattern.len()]
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Word(String),
    QuotedIdent(String),
    Str(String),
    Number(String),
    Op(CompareOp),
    Comma,
    LParen,
    RParen,
    Star,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) => write!(f, "{word}"),
            Token::QuotedIdent(ident) => write!(f, "\"{ident}\""),
            Token::Str(val) => write!(f, "'{val}'"),
            Token::Number(val) => write!(f, "{val}"),
            Token::Op(op) => write!(f, "{}", op.symbol()),
            Token::Comma => f.write_str(","),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Star => f.write_str("*"),
        }
    }
}

fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let quoted = |start: usize, quote: char| -> Result<(String, usize)> {
        let mut val = String::new();
        let mut i = start + 1;
        loop {
            match chars.get(i) {
                Some(c) if *c == quote => {
                    if chars.get(i + 1) == Some(&quote) {
                        val.push(quote);
                        i += 2;
                    } else {
                        return Ok((val, i + 1));
                    }
                }
                Some(c) => {
                    val.push(*c);
                    i += 1;
                }
                None => return Err(Error::MalformedQuery(format!("Unterminated {quote}-quoted text in '{sql}'"))),
            }
        }
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '\'' => {
                let (val, next) = quoted(i, '\'')?;
                tokens.push(Token::Str(val));
                i = next;
            }
            '"' => {
                let (val, next) = quoted(i, '"')?;
                tokens.push(Token::QuotedIdent(val));
                i = next;
            }
            '=' => {
                tokens.push(Token::Op(CompareOp::Eq));
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += 2;
            }
            '<' => match chars.get(i + 1) {
                Some('=') => {
                    tokens.push(Token::Op(CompareOp::Le));
                    i += 2;
                }
                Some('>') => {
                    tokens.push(Token::Op(CompareOp::Ne));
                    i += 2;
                }
                _ => {
                    tokens.push(Token::Op(CompareOp::Lt));
                    i += 1;
                }
            },
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::Ge));
                    i += 2;
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                    i += 1;
                }
            }
            c if c.is_ascii_digit()
                || ((c == '-' || c == '.') && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit() || *n == '.')) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let c = chars[i];
                    let exponent_sign = (c == '-' || c == '+') && matches!(chars[i - 1], 'e' | 'E');
                    if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            c => return Err(Error::MalformedQuery(format!("Unexpected character '{c}' in '{sql}'"))),
        }
    }

    Ok(tokens)
}

const RESERVED_WORDS: [&str; 11] = [
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "LIKE", "IN", "IS", "NULL", "ESCAPE",
];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error<T>(&self, expected: &str) -> Result<T> {
        Err(Error::MalformedQuery(match self.peek() {
            Some(token) => format!("Expected {expected}, found '{token}'"),
            None => format!("Expected {expected}, found end of query"),
        }))
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.peek_keyword(keyword);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            self.error(keyword)
        }
    }

    fn expect(&mut self, expected: Token) -> Result {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            self.error(&format!("'{expected}'"))
        }
    }

    fn identifier(&mut self) -> Result<String> {
        match self.peek().cloned() {
            Some(Token::QuotedIdent(ident)) => {
                self.pos += 1;
                Ok(ident)
            }
            Some(Token::Word(word)) if !RESERVED_WORDS.iter().any(|kw| word.eq_ignore_ascii_case(kw)) => {
                self.pos += 1;
                Ok(word)
            }
            _ => self.error("identifier"),
        }
    }

    fn query(mut self) -> Result<Query> {
        self.expect_keyword("SELECT")?;

        let columns = if self.peek() == Some(&Token::Star) {
            self.pos += 1;
            None
        } else {
            let mut columns: Vec<String> = vec![self.identifier()?];
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                let column = self.identifier()?;
                if columns.iter().any(|col| col.eq_ignore_ascii_case(&column)) {
                    return Err(Error::MalformedQuery(format!("Column '{column}' is selected more than once")));
                }
                columns.push(column);
            }
            Some(columns)
        };

        self.expect_keyword("FROM")?;
        let layer = match self.peek().cloned() {
            Some(Token::Str(name)) => {
                self.pos += 1;
                name
            }
            _ => self.identifier()?,
        };

        let predicate = if self.eat_keyword("WHERE") {
            Some(self.or_expr()?)
        } else {
            None
        };

        if self.peek().is_some() {
            return self.error("end of query");
        }

        Ok(Query {
            columns,
            layer,
            predicate,
        })
    }

    fn or_expr(&mut self) -> Result<Predicate> {
        let mut lhs = self.and_expr()?;
        while self.eat_keyword("OR") {
            let rhs = self.and_expr()?;
            lhs = Predicate::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Predicate> {
        let mut lhs = self.not_expr()?;
        while self.eat_keyword("AND") {
            let rhs = self.not_expr()?;
            lhs = Predicate::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Predicate> {
        if self.eat_keyword("NOT") {
            return Ok(Predicate::Not(Box::new(self.not_expr()?)));
        }

        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.or_expr()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }

        let operand = self.operand()?;
        self.condition(operand)
    }

    fn condition(&mut self, operand: Operand) -> Result<Predicate> {
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.operand()?;
            return Ok(Predicate::Compare { lhs: operand, op, rhs });
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Predicate::IsNull { operand, negated });
        }

        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("LIKE") {
            return match self.next() {
                Some(Token::Str(pattern)) => Ok(Predicate::Like {
                    operand,
                    pattern,
                    negated,
                }),
                _ => {
                    self.pos -= 1;
                    self.error("LIKE pattern string")
                }
            };
        }

        if self.eat_keyword("IN") {
            self.expect(Token::LParen)?;
            let mut values = vec![self.literal()?];
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                values.push(self.literal()?);
            }
            self.expect(Token::RParen)?;
            return Ok(Predicate::In {
                operand,
                values,
                negated,
            });
        }

        if negated {
            return self.error("LIKE or IN");
        }

        Ok(Predicate::Truthy(operand))
    }

    fn operand(&mut self) -> Result<Operand> {
        if matches!(self.peek(), Some(Token::Word(_)) | Some(Token::QuotedIdent(_)))
            && !self.peek_literal_keyword()
        {
            return Ok(Operand::Column(self.identifier()?));
        }

        Ok(Operand::Literal(self.literal()?))
    }

    fn peek_literal_keyword(&self) -> bool {
        ["TRUE", "FALSE", "NULL"].iter().any(|kw| self.peek_keyword(kw))
    }

    fn literal(&mut self) -> Result<Literal> {
        let literal = match self.peek().cloned() {
            Some(Token::Str(val)) => Literal::String(val),
            Some(Token::Number(num)) => parse_number(&num)?,
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("TRUE") => Literal::Boolean(true),
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("FALSE") => Literal::Boolean(false),
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("NULL") => Literal::Null,
            _ => return self.error("value"),
        };

        self.pos += 1;
        Ok(literal)
    }
}

fn parse_number(num: &str) -> Result<Literal> {
    if let Ok(val) = num.parse::<i64>() {
        return Ok(Literal::Integer(val));
    }

    num.parse::<f64>()
        .map(Literal::Float)
        .map_err(|_| Error::MalformedQuery(format!("Invalid number '{num}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Feature, FieldInfo, FieldType};

    fn schema() -> Schema {
        Schema::new(vec![
            FieldInfo::new("name", FieldType::String),
            FieldInfo::new("population", FieldType::Integer),
            FieldInfo::new("area", FieldType::Float),
            FieldInfo::new("capital", FieldType::Boolean),
        ])
    }

    fn feature(name: &str, population: Option<i64>, area: f64, capital: bool) -> Feature {
        Feature::new(
            None,
            vec![
                Some(Field::String(name.to_string())),
                population.map(Field::Integer),
                Some(Field::Float(area)),
                Some(Field::Boolean(capital)),
            ],
        )
    }

    fn eval(sql: &str, feature: &Feature) -> Option<bool> {
        let schema = schema();
        let query = Query::parse(sql).expect("valid query");
        query.validate(&schema).expect("known columns");
        query
            .predicate()
            .expect("query with predicate")
            .evaluate(&FeatureRef::new(&schema, feature))
    }

    #[test]
    fn parse_select_all() -> Result<()> {
        let query = Query::parse("SELECT * FROM cities")?;
        assert_eq!(query.layer(), "cities");
        assert_eq!(query.columns(), None);
        assert_eq!(query.predicate(), None);

        let query: Query = r#"select name, "population" from "World Cities" where population > 1000"#.parse()?;
        assert_eq!(query.layer(), "World Cities");
        assert_eq!(query.columns(), Some(["name".to_string(), "population".to_string()].as_slice()));
        assert!(query.predicate().is_some());
        Ok(())
    }

    #[test]
    fn malformed_queries() {
        for sql in [
            "",
            "SELECT",
            "SELECT * cities",
            "SELECT FROM cities",
            "SELECT name, FROM cities",
            "SELECT * FROM cities WHERE",
            "SELECT * FROM cities WHERE name =",
            "SELECT * FROM cities WHERE name = 'Brussels",
            "SELECT * FROM cities WHERE (population > 5",
            "SELECT * FROM cities ORDER BY name",
            "SELECT * FROM a JOIN b",
            "SELECT count(*) FROM cities",
            "SELECT DISTINCT name FROM cities",
            "SELECT * FROM cities WHERE name LIKE 5",
            "SELECT * FROM cities WHERE name NOT = 5",
            "SELECT * FROM cities WHERE name IN ()",
            "SELECT * FROM cities WHERE population + 1 > 5",
            "SELECT * FROM cities WHERE name LIKE 'a' ESCAPE '!'",
            "SELECT name, NAME FROM cities",
            "DELETE FROM cities",
        ] {
            assert!(
                matches!(Query::parse(sql), Err(Error::MalformedQuery(_))),
                "Query should be rejected: {sql}"
            );
        }
    }

    #[test]
    fn unknown_columns_are_rejected() -> Result<()> {
        let schema = schema();
        assert!(matches!(
            Query::parse("SELECT name, height FROM cities")?.validate(&schema),
            Err(Error::MalformedQuery(_))
        ));
        assert!(matches!(
            Query::parse("SELECT * FROM cities WHERE height > 3")?.validate(&schema),
            Err(Error::MalformedQuery(_))
        ));
        assert!(Query::parse("SELECT NAME FROM cities WHERE Population > 3")?.validate(&schema).is_ok());
        Ok(())
    }

    #[test]
    fn comparisons() {
        let brussels = feature("Brussels", Some(1_200_000), 161.4, true);
        assert_eq!(eval("SELECT * FROM c WHERE population > 1000000", &brussels), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE population >= 1200000", &brussels), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE population < 1200000", &brussels), Some(false));
        assert_eq!(eval("SELECT * FROM c WHERE area <= 161.4", &brussels), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE area > 1e2", &brussels), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE name = 'Brussels'", &brussels), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE name != 'Brussels'", &brussels), Some(false));
        assert_eq!(eval("SELECT * FROM c WHERE name <> 'Ghent'", &brussels), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE capital = TRUE", &brussels), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE capital", &brussels), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE 5 > -3.5", &brussels), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE name > 5", &brussels), None);
    }

    #[test]
    fn like_and_in() {
        let ghent = feature("Ghent", Some(260_000), 156.2, false);
        assert_eq!(eval("SELECT * FROM c WHERE name LIKE 'gh%'", &ghent), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE name LIKE 'G_ent'", &ghent), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE name LIKE 'G_nt'", &ghent), Some(false));
        assert_eq!(eval("SELECT * FROM c WHERE name NOT LIKE '%t'", &ghent), Some(false));
        assert_eq!(eval("SELECT * FROM c WHERE name IN ('Antwerp', 'Ghent')", &ghent), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE name NOT IN ('Antwerp', 'Ghent')", &ghent), Some(false));
        assert_eq!(eval("SELECT * FROM c WHERE population IN (1, 260000)", &ghent), Some(true));

        assert!(like("it's", "IT'S"));
        assert!(like("", "%"));
        assert!(!like("", "_"));
        assert!(like("100%", "100%"));

        // Only ASCII letters fold case
        assert!(like("Liège", "LIèGE"));
        assert!(!like("Liège", "LIÈGE"));
        assert!(like("Liège", "li_ge"));
    }

    #[test]
    fn null_handling() {
        let unknown = feature("Nowhere", None, 0.0, false);
        assert_eq!(eval("SELECT * FROM c WHERE population > 5", &unknown), None);
        assert_eq!(eval("SELECT * FROM c WHERE population IS NULL", &unknown), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE population IS NOT NULL", &unknown), Some(false));
        assert_eq!(eval("SELECT * FROM c WHERE NOT population > 5", &unknown), None);
        assert_eq!(eval("SELECT * FROM c WHERE population > 5 AND capital", &unknown), Some(false));
        assert_eq!(eval("SELECT * FROM c WHERE population > 5 OR name = 'Nowhere'", &unknown), Some(true));
        assert_eq!(eval("SELECT * FROM c WHERE population > 5 OR name = 'Ghent'", &unknown), None);
        assert_eq!(eval("SELECT * FROM c WHERE population = NULL", &unknown), None);
        assert_eq!(eval("SELECT * FROM c WHERE population IN (1, NULL)", &unknown), None);
    }

    #[test]
    fn operator_precedence() {
        let ghent = feature("Ghent", Some(260_000), 156.2, false);
        // AND binds stronger than OR
        assert_eq!(
            eval("SELECT * FROM c WHERE name = 'Ghent' OR capital AND population > 1000000", &ghent),
            Some(true)
        );
        assert_eq!(
            eval("SELECT * FROM c WHERE (name = 'Ghent' OR capital) AND population > 1000000", &ghent),
            Some(false)
        );
        assert_eq!(eval("SELECT * FROM c WHERE NOT capital AND name = 'Ghent'", &ghent), Some(true));
    }

    #[test]
    fn render_ogr_sql() -> Result<()> {
        let query = Query::parse(
            "SELECT * FROM c WHERE (name = 'it''s' OR \"my \"\"col\"\"\" IS NOT NULL) AND NOT population IN (1, 2.5) AND capital",
        )?;

        assert_eq!(
            query.predicate().map(ToString::to_string).as_deref(),
            Some(
                r#"((("name" = 'it''s' OR "my ""col""" IS NOT NULL) AND (NOT "population" IN (1, 2.5))) AND "capital" <> 0)"#
            )
        );

        let rendered = Query::parse("SELECT * FROM c WHERE name LIKE 'Gh%' AND population >= -5")?
            .predicate()
            .map(ToString::to_string);
        assert_eq!(rendered.as_deref(), Some("(\"name\" LIKE 'Gh%' AND \"population\" >= -5)"));
        Ok(())
    }
}
