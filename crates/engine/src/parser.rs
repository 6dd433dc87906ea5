//! Recursive-descent parser for command functions.
//!
//! ```text
//! ArrowFn        := Param "=>" "(" ObjectLit ")" ";"?
//! Param          := Identifier | "(" Identifier ")"
//! ObjectLit      := "{" (Key ":" Expr ("," Key ":" Expr)* ","?)? "}"
//! ArrayLit       := "[" (Expr ("," Expr)* ","?)? "]"
//! Expr           := Primary ("+" Primary)*
//! Primary        := StringLit | Template | PropertyAccess | Identifier | ObjectLit | ArrayLit
//! PropertyAccess := Identifier "." Identifier | Identifier "[" StringLit "]"
//! ```

use indexmap::IndexMap;
use thiserror::Error;

use crate::ast::{ArrowFunction, Node};
use crate::lexer::{Lexer, Span, TemplateChunk, Token, TokenKind};

/// Malformed command-function source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Parses arrow-function source into its syntax tree.
///
/// Pure and deterministic: the same source always yields an equal tree.
pub fn parse(source: &str) -> Result<ArrowFunction, ParseError> {
    let tokens = Lexer::new(source).tokenize();
    Parser::new(tokens).parse_arrow_function()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_arrow_function(&mut self) -> Result<ArrowFunction, ParseError> {
        let param = if self.check(&TokenKind::LParen) {
            self.advance();
            let param = self.expect_identifier("parameter name")?;
            if self.check(&TokenKind::Comma) {
                return Err(self.error("command functions take exactly one parameter"));
            }
            self.expect(TokenKind::RParen)?;
            param
        } else {
            self.expect_identifier("parameter name")?
        };

        self.expect(TokenKind::Arrow)?;
        if self.check(&TokenKind::LBrace) {
            return Err(self.error("block-bodied arrow functions are not supported; return an object literal wrapped in parentheses"));
        }
        self.expect(TokenKind::LParen)?;
        if !self.check(&TokenKind::LBrace) {
            return Err(self.unexpected("an object literal as the function body"));
        }
        let body = self.parse_object_entries()?;
        self.expect(TokenKind::RParen)?;
        if self.check(&TokenKind::Semicolon) {
            self.advance();
        }
        if !self.is_at_end() {
            return Err(self.unexpected("end of input after the function body"));
        }

        Ok(ArrowFunction { param, body })
    }

    fn parse_expression(&mut self) -> Result<Node, ParseError> {
        let first = self.parse_primary()?;
        if !self.check(&TokenKind::Plus) {
            return Ok(first);
        }

        let mut operands = Vec::new();
        push_operand(&mut operands, first);
        while self.check(&TokenKind::Plus) {
            self.advance();
            let operand = self.parse_primary()?;
            push_operand(&mut operands, operand);
        }
        Ok(Node::TemplateConcatenation(operands))
    }

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        match self.current().kind.clone() {
            TokenKind::Str(text) => {
                self.advance();
                Ok(Node::StringLiteral(text))
            }
            TokenKind::Template(chunks) => {
                let span = self.current().span;
                self.advance();
                template_node(chunks, span)
            }
            TokenKind::LBrace => self.parse_object(),
            TokenKind::LBracket => self.parse_array(),
            TokenKind::Identifier(name) => {
                self.advance();
                let node = self.parse_identifier_tail(name)?;
                if self.check(&TokenKind::LParen) {
                    return Err(self.error("function calls are not supported"));
                }
                Ok(node)
            }
            TokenKind::Number(digits) => Err(self.error(&format!(
                "numeric literal {digits} is not supported; quote the value as a string"
            ))),
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Completes `name`, `name.field` or `name["field"]` after the identifier was consumed.
    fn parse_identifier_tail(&mut self, base: String) -> Result<Node, ParseError> {
        let field = if self.check(&TokenKind::Dot) {
            self.advance();
            self.expect_identifier("field name after '.'")?
        } else if self.check(&TokenKind::LBracket) {
            self.advance();
            let TokenKind::Str(field) = self.current().kind.clone() else {
                return Err(self.unexpected("a string literal subscript"));
            };
            self.advance();
            self.expect(TokenKind::RBracket)?;
            field
        } else {
            return Ok(Node::Identifier(base));
        };

        if self.check(&TokenKind::Dot) || self.check(&TokenKind::LBracket) {
            return Err(self.error(&format!("nested property access on '{base}.{field}' is not supported")));
        }
        Ok(Node::PropertyAccess { base, field })
    }

    fn parse_object(&mut self) -> Result<Node, ParseError> {
        Ok(Node::ObjectLiteral(self.parse_object_entries()?))
    }

    fn parse_object_entries(&mut self) -> Result<IndexMap<String, Node>, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut entries = IndexMap::new();

        while !self.check(&TokenKind::RBrace) {
            let key = match self.current().kind.clone() {
                TokenKind::Identifier(name) => name,
                TokenKind::Str(text) => text,
                _ => return Err(self.unexpected("a property key")),
            };
            self.advance();
            if self.check(&TokenKind::Comma) || self.check(&TokenKind::RBrace) {
                return Err(self.error(&format!("shorthand property '{key}' is not supported")));
            }
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expression()?;
            entries.insert(key, value);

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else if !self.check(&TokenKind::RBrace) {
                return Err(self.unexpected("',' or '}'"));
            }
        }

        self.expect(TokenKind::RBrace)?;
        Ok(entries)
    }

    fn parse_array(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let mut elements = Vec::new();

        while !self.check(&TokenKind::RBracket) {
            elements.push(self.parse_expression()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else if !self.check(&TokenKind::RBracket) {
                return Err(self.unexpected("',' or ']'"));
            }
        }

        self.expect(TokenKind::RBracket)?;
        Ok(Node::ArrayLiteral(elements))
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// Error for a token that does not fit; lexer errors are reported as-is.
    fn unexpected(&self, expected: &str) -> ParseError {
        match &self.current().kind {
            TokenKind::Error(message) => self.error(message),
            found => self.error(&format!("expected {expected}, found {found}")),
        }
    }

    fn error(&self, message: &str) -> ParseError {
        error_at(self.current().span, message)
    }
}

fn error_at(span: Span, message: &str) -> ParseError {
    ParseError {
        message: message.to_string(),
        line: span.line,
        column: span.column,
    }
}

/// Flattens nested concatenations so `a + (b + c)` and `a + b + c` share one shape.
fn push_operand(operands: &mut Vec<Node>, operand: Node) {
    match operand {
        Node::TemplateConcatenation(parts) => operands.extend(parts),
        other => operands.push(other),
    }
}

/// Lowers a backtick template. Interpolations may only hold a simple property access.
fn template_node(chunks: Vec<TemplateChunk>, span: Span) -> Result<Node, ParseError> {
    let mut parts = Vec::new();
    for chunk in chunks {
        match chunk {
            TemplateChunk::Text(text) => parts.push(Node::StringLiteral(text)),
            TemplateChunk::Interpolation { source, span } => parts.push(parse_interpolation(&source, span)?),
        }
    }
    Ok(match parts.len() {
        0 => Node::StringLiteral(String::new()),
        1 => parts.remove(0),
        _ => {
            tracing::trace!(line = span.line, column = span.column, "template literal lowered to concatenation");
            Node::TemplateConcatenation(parts)
        }
    })
}

fn parse_interpolation(source: &str, span: Span) -> Result<Node, ParseError> {
    let tokens = Lexer::with_origin(source, span).tokenize();
    let mut parser = Parser::new(tokens);
    let TokenKind::Identifier(base) = parser.current().kind.clone() else {
        return Err(error_at(span, &format!("template interpolation '${{{source}}}' must be a simple property access")));
    };
    parser.advance();
    let node = parser.parse_identifier_tail(base)?;
    if !parser.is_at_end() || !matches!(node, Node::PropertyAccess { .. }) {
        return Err(error_at(span, &format!("template interpolation '${{{source}}}' must be a simple property access")));
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(source: &str) -> IndexMap<String, Node> {
        parse(source).expect("source parses").body
    }

    fn message(source: &str) -> String {
        parse(source).expect_err("source is rejected").message
    }

    #[test]
    fn parses_the_common_shape() {
        let function = parse("config=>({command:'node',args:['dist/index.js'],env:{API_KEY:config.apiKey}})").unwrap();
        assert_eq!(function.param, "config");
        assert_eq!(function.body.keys().collect::<Vec<_>>(), vec!["command", "args", "env"]);
        assert_eq!(function.body["command"], Node::StringLiteral("node".into()));
        let Node::ObjectLiteral(env) = &function.body["env"] else {
            panic!("env should be an object literal");
        };
        assert_eq!(
            env["API_KEY"],
            Node::PropertyAccess {
                base: "config".into(),
                field: "apiKey".into()
            }
        );
    }

    #[test]
    fn accepts_parenthesized_parameter_comments_and_trailing_commas() {
        let parsed = body(
            r#"(config) => ({
                // launched through npx
                command: "npx",
                args: ["-y", "@scope/server",],
                "env": { TOKEN: config["token"], },
            });"#,
        );
        assert_eq!(parsed.keys().collect::<Vec<_>>(), vec!["command", "args", "env"]);
        assert_eq!(
            parsed["args"],
            Node::ArrayLiteral(vec![Node::StringLiteral("-y".into()), Node::StringLiteral("@scope/server".into())])
        );
    }

    #[test]
    fn quoted_and_bare_keys_normalize_to_the_same_key() {
        assert_eq!(body("c => ({'command': 'a'})"), body("c => ({command: 'a'})"));
    }

    #[test]
    fn parsing_is_deterministic() {
        let source = "c => ({command: 'x', env: {B: c.b, A: 'a' + 'b'}, args: [c.z, 'y']})";
        assert_eq!(parse(source).unwrap(), parse(source).unwrap());
    }

    #[test]
    fn flattens_concatenation_chains() {
        let parsed = body("c => ({command: 'a' + 'b' + `c`})");
        assert_eq!(
            parsed["command"],
            Node::TemplateConcatenation(vec![
                Node::StringLiteral("a".into()),
                Node::StringLiteral("b".into()),
                Node::StringLiteral("c".into()),
            ])
        );
    }

    #[test]
    fn lowers_templates_with_property_interpolation() {
        let parsed = body("c => ({command: 'x', env: {A: `${c.token}`, B: `Bearer ${c.token}`}})");
        let Node::ObjectLiteral(env) = &parsed["env"] else {
            panic!("env should be an object literal");
        };
        assert_eq!(
            env["A"],
            Node::PropertyAccess {
                base: "c".into(),
                field: "token".into()
            }
        );
        assert!(matches!(&env["B"], Node::TemplateConcatenation(parts) if parts.len() == 2));
    }

    #[test]
    fn rejects_constructs_outside_the_dialect() {
        assert!(message("c => ({command: run('x')})").contains("function calls"));
        assert!(message("c => ({command: 'x', args: [c.port.toString()]})").contains("nested property access"));
        assert!(message("c => ({command: c.debug ? 'a' : 'b'})").contains("'?'"));
        assert!(message("c => ({command: 'x', args: [8080]})").contains("numeric literal 8080"));
        assert!(message("c => { return {command: 'x'} }").contains("block-bodied"));
        assert!(message("c => ({command})").contains("shorthand property 'command'"));
        assert!(message("c => ({command: `${c.a || 'x'}`})").contains("simple property access"));
        assert!(message("c => ({command: c[key]})").contains("string literal subscript"));
        assert!(message("(a, b) => ({})").contains("exactly one parameter"));
    }

    #[test]
    fn reports_position_of_the_offending_token() {
        let error = parse("c => ({\n  command: 'x' 'y'\n})").unwrap_err();
        assert_eq!((error.line, error.column), (2, 16));
        assert!(error.message.contains("string 'y'"), "{}", error.message);
    }

    #[test]
    fn rejects_trailing_input() {
        assert!(message("c => ({command: 'x'}) extra").contains("end of input"));
    }
}
