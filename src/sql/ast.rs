use std::fmt;

use super::lexer::TokenKind;

/// A parsed `SELECT` statement. Immutable after parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub select: SelectClause,
    pub from: FromClause,
    pub where_clause: Option<WhereClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub expressions: Vec<SelectExpression>,
}

/// One projected column: the expression plus an optional output alias.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpression {
    pub alias: Option<String>,
    pub condition: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    /// Namespace for every resource of the clause, when given.
    pub namespace: Option<String>,
    /// Sources in query order; the first one is the outermost join loop.
    pub sources: Vec<FromSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromSource {
    Resource(FromResource),
    Subselect(FromSubselect),
}

impl FromSource {
    pub fn alias(&self) -> &str {
        match self {
            FromSource::Resource(resource) => &resource.alias,
            FromSource::Subselect(sub) => &sub.alias,
        }
    }
}

/// A cluster resource collection named in FROM. The version defaults to
/// `v1` and the group to the core (empty) group; the alias defaults to
/// the kind as written.
#[derive(Debug, Clone, PartialEq)]
pub struct FromResource {
    pub alias: String,
    pub group: String,
    pub version: String,
    pub kind: String,
}

/// A derived source: `FROM (SELECT …) alias`. Executed once when the
/// sources are materialized, each row becoming one item.
#[derive(Debug, Clone, PartialEq)]
pub struct FromSubselect {
    pub alias: String,
    pub select: Box<SelectStatement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub condition: Expr,
}

/// A chain of `-> field` segments navigating into a nested value.
/// Components are stored as written; a decimal component indexes into
/// sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpression {
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer(i64),
    Float(f64),
    StringLit(String),
    Boolean(bool),
    /// A FROM alias (or correlated outer alias), optionally navigated
    /// into with a path.
    Reference {
        name: String,
        path: Option<PathExpression>,
    },
    Paren {
        inner: Box<Expr>,
        path: Option<PathExpression>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `jsonpath(expr, "program")` — applies a JSONPath program to the
    /// inner value.
    JsonPath {
        inner: Box<Expr>,
        program: String,
        path: Option<PathExpression>,
    },
    /// `jq(expr, "program")` — applies a jq filter to the inner value.
    Jq {
        inner: Box<Expr>,
        program: String,
        path: Option<PathExpression>,
    },
    /// A SELECT in expression position; must produce at most one row of
    /// one column.
    Subselect(Box<SelectStatement>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    pub fn from_token(kind: TokenKind) -> Option<BinaryOp> {
        match kind {
            TokenKind::Or => Some(BinaryOp::Or),
            TokenKind::And => Some(BinaryOp::And),
            TokenKind::Equal => Some(BinaryOp::Equal),
            TokenKind::NotEqual => Some(BinaryOp::NotEqual),
            TokenKind::LessThan => Some(BinaryOp::LessThan),
            TokenKind::LessThanEqual => Some(BinaryOp::LessThanEqual),
            TokenKind::GreaterThan => Some(BinaryOp::GreaterThan),
            TokenKind::GreaterThanEqual => Some(BinaryOp::GreaterThanEqual),
            TokenKind::Add => Some(BinaryOp::Add),
            TokenKind::Subtract => Some(BinaryOp::Subtract),
            TokenKind::Multiply => Some(BinaryOp::Multiply),
            TokenKind::Divide => Some(BinaryOp::Divide),
            _ => None,
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::LessThan
            | BinaryOp::LessThanEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanEqual => 3,
            BinaryOp::Add | BinaryOp::Subtract => 4,
            BinaryOp::Multiply | BinaryOp::Divide => 5,
        }
    }
}

impl Expr {
    /// Visit this expression and its children, outermost first. The
    /// callback returns false to stop descending below a node.
    pub fn walk(&self, visit: &mut dyn FnMut(&Expr) -> bool) {
        if !visit(self) {
            return;
        }
        match self {
            Expr::Paren { inner, .. } | Expr::JsonPath { inner, .. } | Expr::Jq { inner, .. } => {
                inner.walk(visit)
            }
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Expr::Subselect(select) => select.walk_exprs(visit),
            _ => {}
        }
    }
}

impl SelectStatement {
    /// Walk every expression of the SELECT and WHERE clauses.
    pub fn walk_exprs(&self, visit: &mut dyn FnMut(&Expr) -> bool) {
        for expression in &self.select.expressions {
            expression.condition.walk(visit);
        }
        if let Some(where_clause) = &self.where_clause {
            where_clause.condition.walk(visit);
        }
    }
}

fn is_bare_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let leading = match chars.next() {
        Some(c) => c == '_' || c.is_alphabetic(),
        None => false,
    };
    leading && chars.all(|c| c == '_' || c.is_alphanumeric())
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"{}\"", s.replace('"', "\\\""))
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.fields {
            if is_bare_ident(field) || field.parse::<i64>().is_ok() {
                write!(f, " -> {field}")?;
            } else {
                write!(f, " -> ")?;
                write_quoted(f, field)?;
            }
        }
        Ok(())
    }
}

fn write_path(f: &mut fmt::Formatter<'_>, path: &Option<PathExpression>) -> fmt::Result {
    match path {
        Some(path) => write!(f, "{path}"),
        None => Ok(()),
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
        };
        f.write_str(symbol)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer(value) => write!(f, "{value}"),
            // Debug formatting keeps the decimal point so the literal
            // re-parses as a float
            Expr::Float(value) => write!(f, "{value:?}"),
            Expr::StringLit(value) => write_quoted(f, value),
            Expr::Boolean(value) => write!(f, "{value}"),
            Expr::Reference { name, path } => {
                write!(f, "{name}")?;
                write_path(f, path)
            }
            Expr::Paren { inner, path } => {
                write!(f, "({inner})")?;
                write_path(f, path)
            }
            Expr::Binary { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Expr::JsonPath {
                inner,
                program,
                path,
            } => {
                write!(f, "jsonpath({inner}, ")?;
                write_quoted(f, program)?;
                write!(f, ")")?;
                write_path(f, path)
            }
            Expr::Jq {
                inner,
                program,
                path,
            } => {
                write!(f, "jq({inner}, ")?;
                write_quoted(f, program)?;
                write!(f, ")")?;
                write_path(f, path)
            }
            Expr::Subselect(select) => write!(f, "({select})"),
        }
    }
}

impl fmt::Display for FromResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.group.is_empty() {
            write!(f, "{}/{}/{}", self.group, self.version, self.kind)?;
        } else if self.version != "v1" {
            write!(f, "{}/{}", self.version, self.kind)?;
        } else {
            write!(f, "{}", self.kind)?;
        }
        if self.alias != self.kind {
            write!(f, " AS {}", self.alias)?;
        }
        Ok(())
    }
}

impl fmt::Display for FromSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromSource::Resource(resource) => write!(f, "{resource}"),
            FromSource::Subselect(sub) => write!(f, "({}) AS {}", sub.select, sub.alias),
        }
    }
}

/// Canonical form of a statement: it re-parses to an equal tree.
impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        for (idx, expression) in self.select.expressions.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", expression.condition)?;
            if let Some(alias) = &expression.alias {
                write!(f, " AS ")?;
                if is_bare_ident(alias) {
                    write!(f, "{alias}")?;
                } else {
                    write_quoted(f, alias)?;
                }
            }
        }

        write!(f, " FROM ")?;
        for (idx, source) in self.from.sources.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{source}")?;
        }

        if let Some(namespace) = &self.from.namespace {
            let bare = !namespace.is_empty()
                && namespace
                    .split('-')
                    .all(|part| is_bare_ident(part) || part.parse::<u64>().is_ok());
            write!(f, " NAMESPACE ")?;
            if bare {
                write!(f, "{namespace}")?;
            } else {
                write_quoted(f, namespace)?;
            }
        }

        if let Some(where_clause) = &self.where_clause {
            write!(f, " WHERE {}", where_clause.condition)?;
        }

        Ok(())
    }
}
