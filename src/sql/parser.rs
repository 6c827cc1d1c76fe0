use anyhow::{Result, anyhow, bail};

use super::ast::*;
use super::lexer::{Lexer, Token, TokenKind};

/// Recursive-descent parser with single-token lookahead. `parse`
/// consumes the parser and returns either a complete statement or one
/// error carrying the byte offset and the prefix of input consumed up
/// to the offending token.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    input: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(input),
            input,
        }
    }

    pub fn parse(mut self) -> Result<SelectStatement> {
        if self.lexer.peek() != TokenKind::Select {
            let token = self.lexer.scan();
            bail!("Expected SELECT (offset: {})", token.offset);
        }

        self.expect(TokenKind::Select)?;
        let statement = self.select_statement()?;
        self.expect(TokenKind::Eof)?;

        Ok(statement)
    }

    fn unexpected(&self, token: &Token) -> anyhow::Error {
        let consumed = &self.input[..token.offset];
        match token.kind {
            TokenKind::Error => anyhow!(
                "invalid token {:?} (offset: {}) ({:?} <)",
                token.text,
                token.offset,
                consumed
            ),
            _ => anyhow!(
                "unexpected token (offset: {}) ({:?} <)",
                token.offset,
                consumed
            ),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<String> {
        let token = self.lexer.scan();
        if token.kind != kind {
            return Err(self.unexpected(&token));
        }
        Ok(token.text)
    }

    fn select_statement(&mut self) -> Result<SelectStatement> {
        let select = self.select_clause()?;
        let from = self.from_clause()?;

        let where_clause = if self.lexer.peek() == TokenKind::Where {
            Some(self.where_clause()?)
        } else {
            None
        };

        Ok(SelectStatement {
            select,
            from,
            where_clause,
        })
    }

    fn select_clause(&mut self) -> Result<SelectClause> {
        let mut expressions = vec![self.select_expression()?];

        while self.lexer.peek() == TokenKind::Comma {
            self.expect(TokenKind::Comma)?;
            expressions.push(self.select_expression()?);
        }

        Ok(SelectClause { expressions })
    }

    fn select_expression(&mut self) -> Result<SelectExpression> {
        let condition = self.expression(1)?;
        let alias = self.as_alias(true, false)?;

        Ok(SelectExpression { alias, condition })
    }

    fn from_clause(&mut self) -> Result<FromClause> {
        self.expect(TokenKind::From)?;

        let mut sources = vec![self.from_source()?];
        while self.lexer.peek() == TokenKind::Comma {
            self.expect(TokenKind::Comma)?;
            sources.push(self.from_source()?);
        }

        let namespace = if self.lexer.peek() == TokenKind::Namespace {
            Some(self.namespace_clause()?)
        } else {
            None
        };

        Ok(FromClause { namespace, sources })
    }

    fn from_source(&mut self) -> Result<FromSource> {
        if self.lexer.peek() == TokenKind::OpenParen {
            Ok(FromSource::Subselect(self.from_subselect()?))
        } else {
            Ok(FromSource::Resource(self.from_resource()?))
        }
    }

    fn from_subselect(&mut self) -> Result<FromSubselect> {
        self.expect(TokenKind::OpenParen)?;
        self.expect(TokenKind::Select)?;
        let select = self.select_statement()?;
        self.expect(TokenKind::CloseParen)?;

        // the alias is mandatory for a derived source
        let alias = match self.as_alias(false, true)? {
            Some(alias) => alias,
            None => unreachable!("required alias"),
        };

        Ok(FromSubselect {
            alias,
            select: Box::new(select),
        })
    }

    /// `pods`, `v1/pods` or `apps/v1/deployments`.
    fn from_resource(&mut self) -> Result<FromResource> {
        let first = self.expect(TokenKind::Ident)?;

        let (group, version, kind) = if self.lexer.peek() == TokenKind::Divide {
            self.expect(TokenKind::Divide)?;
            let second = self.expect(TokenKind::Ident)?;
            if self.lexer.peek() == TokenKind::Divide {
                self.expect(TokenKind::Divide)?;
                let third = self.expect(TokenKind::Ident)?;
                (first, second, third)
            } else {
                (String::new(), first, second)
            }
        } else {
            (String::new(), "v1".to_string(), first)
        };

        let alias = self.as_alias(false, false)?.unwrap_or_else(|| kind.clone());

        Ok(FromResource {
            alias,
            group,
            version,
            kind,
        })
    }

    /// Namespace names may contain `-`, which the lexer splits off; a
    /// bare namespace is therefore an identifier followed by any number
    /// of `- ident` segments. A string literal is accepted verbatim.
    fn namespace_clause(&mut self) -> Result<String> {
        self.expect(TokenKind::Namespace)?;

        if self.lexer.peek() == TokenKind::StringLit {
            return self.expect(TokenKind::StringLit);
        }

        let mut namespace = self.expect(TokenKind::Ident)?;
        while self.lexer.peek() == TokenKind::Subtract {
            self.expect(TokenKind::Subtract)?;
            let part = match self.lexer.peek() {
                TokenKind::Ident => self.expect(TokenKind::Ident)?,
                TokenKind::Integer => self.expect(TokenKind::Integer)?,
                _ => {
                    let token = self.lexer.scan();
                    return Err(self.unexpected(&token));
                }
            };
            namespace.push('-');
            namespace.push_str(&part);
        }

        Ok(namespace)
    }

    fn where_clause(&mut self) -> Result<WhereClause> {
        self.expect(TokenKind::Where)?;
        let condition = self.expression(1)?;

        Ok(WhereClause { condition })
    }

    fn as_alias(&mut self, allow_string: bool, required: bool) -> Result<Option<String>> {
        if self.lexer.peek() == TokenKind::As {
            self.expect(TokenKind::As)?;
        }

        match self.lexer.peek() {
            TokenKind::StringLit if allow_string => Ok(Some(self.expect(TokenKind::StringLit)?)),
            TokenKind::Ident => Ok(Some(self.expect(TokenKind::Ident)?)),
            _ if required => Ok(Some(self.expect(TokenKind::Ident)?)),
            _ => Ok(None),
        }
    }

    fn expression(&mut self, precedence: u8) -> Result<Expr> {
        let mut lhs = self.unary_expression()?;

        while let Some(op) = BinaryOp::from_token(self.lexer.peek()) {
            if op.precedence() < precedence {
                break;
            }
            self.lexer.scan();

            let rhs = self.expression(op.precedence())?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn unary_expression(&mut self) -> Result<Expr> {
        match self.lexer.peek() {
            TokenKind::OpenParen => {
                self.expect(TokenKind::OpenParen)?;

                if self.lexer.peek() == TokenKind::Select {
                    self.expect(TokenKind::Select)?;
                    let select = self.select_statement()?;
                    self.expect(TokenKind::CloseParen)?;

                    return Ok(Expr::Subselect(Box::new(select)));
                }

                let inner = self.expression(1)?;
                self.expect(TokenKind::CloseParen)?;
                let path = self.maybe_path()?;

                Ok(Expr::Paren {
                    inner: Box::new(inner),
                    path,
                })
            }

            TokenKind::StringLit => Ok(Expr::StringLit(self.expect(TokenKind::StringLit)?)),

            TokenKind::Integer => {
                let text = self.expect(TokenKind::Integer)?;
                Ok(Expr::Integer(text.parse()?))
            }

            TokenKind::Float => {
                let text = self.expect(TokenKind::Float)?;
                Ok(Expr::Float(text.parse()?))
            }

            TokenKind::True => {
                self.expect(TokenKind::True)?;
                Ok(Expr::Boolean(true))
            }

            TokenKind::False => {
                self.expect(TokenKind::False)?;
                Ok(Expr::Boolean(false))
            }

            TokenKind::Ident => {
                let name = self.expect(TokenKind::Ident)?;
                let path = self.maybe_path()?;

                Ok(Expr::Reference { name, path })
            }

            TokenKind::JsonPath => {
                let (inner, program, path) = self.filter_call(TokenKind::JsonPath)?;
                Ok(Expr::JsonPath {
                    inner,
                    program,
                    path,
                })
            }

            TokenKind::Jq => {
                let (inner, program, path) = self.filter_call(TokenKind::Jq)?;
                Ok(Expr::Jq {
                    inner,
                    program,
                    path,
                })
            }

            _ => {
                let token = self.lexer.scan();
                Err(self.unexpected(&token))
            }
        }
    }

    /// `jsonpath(expr, "program")` and `jq(expr, "program")` share a
    /// shape: keyword, parenthesized input expression, program string,
    /// optional trailing path.
    fn filter_call(
        &mut self,
        keyword: TokenKind,
    ) -> Result<(Box<Expr>, String, Option<PathExpression>)> {
        self.expect(keyword)?;
        self.expect(TokenKind::OpenParen)?;
        let inner = self.expression(1)?;
        self.expect(TokenKind::Comma)?;
        let program = self.expect(TokenKind::StringLit)?;
        self.expect(TokenKind::CloseParen)?;
        let path = self.maybe_path()?;

        Ok((Box::new(inner), program, path))
    }

    fn maybe_path(&mut self) -> Result<Option<PathExpression>> {
        if self.lexer.peek() != TokenKind::Arrow {
            return Ok(None);
        }
        Ok(Some(self.path_expression()?))
    }

    fn path_expression(&mut self) -> Result<PathExpression> {
        let mut fields = Vec::new();

        while self.lexer.peek() == TokenKind::Arrow {
            self.expect(TokenKind::Arrow)?;
            let field = match self.lexer.peek() {
                TokenKind::Ident => self.expect(TokenKind::Ident)?,
                TokenKind::StringLit => self.expect(TokenKind::StringLit)?,
                TokenKind::Integer => self.expect(TokenKind::Integer)?,
                // field names may collide with keywords (`namespace`)
                kind if kind.is_keyword() => self.expect(kind)?,
                _ => {
                    let token = self.lexer.scan();
                    return Err(self.unexpected(&token));
                }
            };
            fields.push(field);
        }

        Ok(PathExpression { fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> SelectStatement {
        Parser::new(input).parse().unwrap()
    }

    fn first_resource(statement: &SelectStatement) -> &FromResource {
        match &statement.from.sources[0] {
            FromSource::Resource(resource) => resource,
            other => panic!("expected a resource source, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_simple_select() {
        let statement = parse("SELECT pods FROM pods");
        assert_eq!(statement.select.expressions.len(), 1);
        assert!(statement.where_clause.is_none());

        let resource = first_resource(&statement);
        assert_eq!(resource.kind, "pods");
        assert_eq!(resource.version, "v1");
        assert_eq!(resource.group, "");
        assert_eq!(resource.alias, "pods");
    }

    #[test]
    fn test_parse_path_expression() {
        let statement = parse("SELECT p -> metadata -> name FROM pods p");
        match &statement.select.expressions[0].condition {
            Expr::Reference { name, path } => {
                assert_eq!(name, "p");
                assert_eq!(path.as_ref().unwrap().fields, vec!["metadata", "name"]);
            }
            other => panic!("expected a reference, got {other:?}"),
        }
        assert_eq!(first_resource(&statement).alias, "p");
    }

    #[test]
    fn test_parse_path_with_string_and_index() {
        let statement = parse(r#"SELECT p -> "app.kubernetes.io/name" -> 0 FROM pods p"#);
        match &statement.select.expressions[0].condition {
            Expr::Reference { path, .. } => {
                assert_eq!(
                    path.as_ref().unwrap().fields,
                    vec!["app.kubernetes.io/name", "0"]
                );
            }
            other => panic!("expected a reference, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_keyword_as_path_field() {
        let statement = parse("SELECT p -> metadata -> namespace FROM pods p");
        match &statement.select.expressions[0].condition {
            Expr::Reference { path, .. } => {
                assert_eq!(path.as_ref().unwrap().fields, vec!["metadata", "namespace"]);
            }
            other => panic!("expected a reference, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_select_aliases() {
        let statement = parse(r#"SELECT p AS name, p "the pod", p three FROM pods p"#);
        let aliases: Vec<_> = statement
            .select
            .expressions
            .iter()
            .map(|e| e.alias.clone())
            .collect();
        assert_eq!(
            aliases,
            vec![
                Some("name".to_string()),
                Some("the pod".to_string()),
                Some("three".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_from_forms() {
        let resource = first_resource(&parse("SELECT x FROM v1/pods")).clone();
        assert_eq!(resource.group, "");
        assert_eq!(resource.version, "v1");
        assert_eq!(resource.kind, "pods");

        let resource = first_resource(&parse("SELECT x FROM apps/v1/deployments d")).clone();
        assert_eq!(resource.group, "apps");
        assert_eq!(resource.version, "v1");
        assert_eq!(resource.kind, "deployments");
        assert_eq!(resource.alias, "d");
    }

    #[test]
    fn test_parse_namespace_clause() {
        let statement = parse("SELECT p FROM v1/pods p NAMESPACE kube-system");
        assert_eq!(statement.from.namespace.as_deref(), Some("kube-system"));

        let statement = parse(r#"SELECT p FROM pods p NAMESPACE "team-42""#);
        assert_eq!(statement.from.namespace.as_deref(), Some("team-42"));
    }

    #[test]
    fn test_parse_multiple_sources() {
        let statement = parse("SELECT p, s FROM pods p, services s NAMESPACE default");
        let aliases: Vec<_> = statement.from.sources.iter().map(|s| s.alias()).collect();
        assert_eq!(aliases, vec!["p", "s"]);
        assert_eq!(statement.from.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn test_parse_precedence() {
        // 1 + 2 * 3 groups the multiplication under the addition
        let statement = parse("SELECT 1 + 2 * 3 FROM pods");
        match &statement.select.expressions[0].condition {
            Expr::Binary { op, lhs, rhs } => {
                assert_eq!(*op, BinaryOp::Add);
                assert_eq!(**lhs, Expr::Integer(1));
                assert!(matches!(
                    **rhs,
                    Expr::Binary {
                        op: BinaryOp::Multiply,
                        ..
                    }
                ));
            }
            other => panic!("expected a binary expression, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_parenthesized_precedence() {
        let statement = parse("SELECT (1 + 2) * 3 FROM pods");
        match &statement.select.expressions[0].condition {
            Expr::Binary { op, lhs, .. } => {
                assert_eq!(*op, BinaryOp::Multiply);
                assert!(matches!(**lhs, Expr::Paren { .. }));
            }
            other => panic!("expected a binary expression, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_or_and_grouping() {
        // a or b and c groups as a or (b and c)
        let statement = parse("SELECT a or b and c FROM pods");
        match &statement.select.expressions[0].condition {
            Expr::Binary { op, rhs, .. } => {
                assert_eq!(*op, BinaryOp::Or);
                assert!(matches!(
                    **rhs,
                    Expr::Binary {
                        op: BinaryOp::And,
                        ..
                    }
                ));
            }
            other => panic!("expected a binary expression, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_where_comparison() {
        let statement = parse(r#"SELECT p FROM pods p WHERE p -> status -> phase == "Running""#);
        let where_clause = statement.where_clause.unwrap();
        assert!(matches!(
            where_clause.condition,
            Expr::Binary {
                op: BinaryOp::Equal,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_jsonpath_call() {
        let statement = parse(r#"SELECT jsonpath(p, "{.spec.containers[*].name}") FROM pods p"#);
        match &statement.select.expressions[0].condition {
            Expr::JsonPath {
                inner,
                program,
                path,
            } => {
                assert!(matches!(**inner, Expr::Reference { .. }));
                assert_eq!(program, "{.spec.containers[*].name}");
                assert!(path.is_none());
            }
            other => panic!("expected a jsonpath call, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_jq_call_with_trailing_path() {
        let statement = parse(r#"SELECT jq(p, ".spec.containers") -> 0 FROM pods p"#);
        match &statement.select.expressions[0].condition {
            Expr::Jq { program, path, .. } => {
                assert_eq!(program, ".spec.containers");
                assert_eq!(path.as_ref().unwrap().fields, vec!["0"]);
            }
            other => panic!("expected a jq call, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_subselect_expression() {
        let statement = parse("SELECT (SELECT s -> metadata -> name FROM services s) FROM pods p");
        assert!(matches!(
            statement.select.expressions[0].condition,
            Expr::Subselect(_)
        ));
    }

    #[test]
    fn test_parse_from_subselect() {
        let statement =
            parse("SELECT d -> name FROM (SELECT p -> metadata -> name AS name FROM pods p) d");
        match &statement.from.sources[0] {
            FromSource::Subselect(sub) => {
                assert_eq!(sub.alias, "d");
                assert_eq!(sub.select.select.expressions.len(), 1);
            }
            other => panic!("expected a subselect source, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_from_subselect_requires_alias() {
        let err = Parser::new("SELECT d FROM (SELECT p FROM pods p)")
            .parse()
            .unwrap_err();
        assert!(err.to_string().contains("unexpected token"));
    }

    #[test]
    fn test_parse_expected_select() {
        let err = Parser::new("SELEC * FROM pods").parse().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Expected SELECT"), "{message}");
        assert!(message.contains("offset: 0"), "{message}");
    }

    #[test]
    fn test_parse_error_carries_offset_and_prefix() {
        let err = Parser::new("SELECT a FROM ,").parse().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("offset: 14"), "{message}");
        assert!(message.contains("\"SELECT a FROM \""), "{message}");
    }

    #[test]
    fn test_parse_rejects_trailing_input() {
        let err = Parser::new("SELECT a FROM pods pods pods")
            .parse()
            .unwrap_err();
        assert!(err.to_string().contains("unexpected token"));
    }

    #[test]
    fn test_parse_rejects_bare_bang() {
        let err = Parser::new("SELECT !a FROM pods").parse().unwrap_err();
        assert!(err.to_string().contains("invalid token"));
    }

    #[test]
    fn test_roundtrip_through_display() {
        let queries = [
            "SELECT p -> metadata -> name FROM pods p",
            "SELECT p -> metadata -> name AS name, s -> spec -> clusterIP FROM pods p, services s WHERE p -> metadata -> namespace == s -> metadata -> namespace",
            "SELECT 1 + 2 * 3, (1 + 2) * 3 FROM apps/v1/deployments d NAMESPACE kube-system",
            r#"SELECT jsonpath(p, "{.spec.containers[*].name}") -> 0 FROM v1/pods p"#,
            "SELECT (SELECT s -> metadata -> name FROM services s) AS ip FROM pods p WHERE true",
            "SELECT d -> name FROM (SELECT p -> metadata -> name AS name FROM pods p) AS d",
        ];
        for query in queries {
            let statement = parse(query);
            let printed = statement.to_string();
            let reparsed = Parser::new(&printed).parse().unwrap();
            assert_eq!(statement, reparsed, "canonical form: {printed}");
        }
    }
}
