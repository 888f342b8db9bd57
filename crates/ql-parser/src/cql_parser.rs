//! Library-level grammar: header, `using`, `include`, `parameter`,
//! `valueset`, `codesystem`, `context`, `define`, and `define function`
//! declarations (spec.md §3.3). Each declaration's body/default is an
//! ordinary expression handed off to [`crate::pratt::Parser`].

use crate::error::{ParseError, ParseResult};
use crate::pratt::Parser as ExprParser;
use crate::token::{Token, TokenKind};
use ql_ast::{
    AccessLevel, CodeSystemDecl, ContextDecl, Definition, FunctionDecl, FunctionParam,
    IncludeDecl, LibraryAst, LibraryHeader, ParameterDecl, UsingDecl, ValueSetDecl,
};

pub struct LibraryParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> LibraryParser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "expected {:?}, found {:?}",
                kind,
                self.peek().kind
            )))
        }
    }

    fn error(&self, message: String) -> ParseError {
        let tok = self.peek();
        ParseError::at_point(message, tok.start, tok.line, tok.column)
    }

    /// Remaining tokens up to (and excluding) `Semicolon` or `Eof`, used to
    /// hand a declaration body off to the expression parser.
    fn take_expr_tokens(&mut self) -> Vec<Token> {
        let start = self.pos;
        let mut depth = 0i32;
        while !matches!(self.peek().kind, TokenKind::Eof) {
            match &self.peek().kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => depth -= 1,
                TokenKind::Semicolon if depth <= 0 => break,
                _ => {}
            }
            self.advance();
        }
        let mut slice: Vec<Token> = self.tokens[start..self.pos].to_vec();
        slice.push(Token {
            kind: TokenKind::Eof,
            start: self.peek().start,
            end: self.peek().end,
            line: self.peek().line,
            column: self.peek().column,
        });
        slice
    }

    fn parse_sub_expr(&mut self) -> ParseResult<ql_ast::Expr> {
        let tokens = self.take_expr_tokens();
        ExprParser::new(&tokens).parse_expression_entry()
    }

    fn string_literal(&mut self) -> ParseResult<String> {
        match self.advance().kind {
            TokenKind::String(s) | TokenKind::DelimitedIdentifier(s) => Ok(s),
            other => Err(self.error(format!("expected string literal, found {other:?}"))),
        }
    }

    fn identifier(&mut self) -> ParseResult<String> {
        match self.advance().kind {
            TokenKind::Identifier(s) | TokenKind::DelimitedIdentifier(s) => Ok(s),
            other => Err(self.error(format!("expected identifier, found {other:?}"))),
        }
    }

    fn type_name(&mut self) -> ParseResult<String> {
        let mut name = self.identifier()?;
        while self.eat(&TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.identifier()?);
        }
        Ok(name)
    }

    fn optional_version(&mut self) -> ParseResult<Option<String>> {
        if self.eat(&TokenKind::Version) {
            Ok(Some(self.string_literal()?))
        } else {
            Ok(None)
        }
    }

    pub fn parse_library(&mut self) -> ParseResult<LibraryAst> {
        let mut ast = LibraryAst::default();

        if self.eat(&TokenKind::Library) {
            let name = self.identifier()?;
            let version = self.optional_version()?;
            self.eat(&TokenKind::Semicolon);
            ast.header = Some(LibraryHeader { name, version });
        }

        if self.eat(&TokenKind::Using) {
            let model = self.identifier()?;
            let version = self.optional_version()?;
            self.eat(&TokenKind::Semicolon);
            ast.using = Some(UsingDecl { model, version });
        }

        while self.check(&TokenKind::Include) {
            self.advance();
            let name = self.identifier()?;
            let version = self.optional_version()?;
            let alias = if self.eat(&TokenKind::Called) {
                self.identifier()?
            } else {
                name.clone()
            };
            self.eat(&TokenKind::Semicolon);
            ast.includes.insert(
                name.clone(),
                IncludeDecl {
                    name,
                    version,
                    alias,
                },
            );
        }

        while self.check(&TokenKind::Parameter) {
            self.advance();
            let name = self.identifier()?;
            let type_name = if self.check(&TokenKind::Default) {
                None
            } else if !self.check(&TokenKind::Semicolon) {
                Some(self.type_name()?)
            } else {
                None
            };
            let default = if self.eat(&TokenKind::Default) {
                Some(self.parse_sub_expr()?)
            } else {
                None
            };
            self.eat(&TokenKind::Semicolon);
            ast.parameters.insert(
                name.clone(),
                ParameterDecl {
                    name,
                    type_name,
                    default,
                },
            );
        }

        loop {
            if self.eat(&TokenKind::Codesystem) {
                let name = self.identifier()?;
                self.expect(&TokenKind::Colon)?;
                let id = self.string_literal()?;
                let version = self.optional_version()?;
                self.eat(&TokenKind::Semicolon);
                ast.codesystems
                    .insert(name.clone(), CodeSystemDecl { name, id, version });
            } else if self.eat(&TokenKind::Valueset) {
                let name = self.identifier()?;
                self.expect(&TokenKind::Colon)?;
                let id = self.string_literal()?;
                let version = self.optional_version()?;
                self.eat(&TokenKind::Semicolon);
                ast.valuesets
                    .insert(name.clone(), ValueSetDecl { name, id, version });
            } else {
                break;
            }
        }

        if self.eat(&TokenKind::Context) {
            let name = self.identifier()?;
            self.eat(&TokenKind::Semicolon);
            ast.context = ContextDecl { name };
        }

        while self.check(&TokenKind::Define) {
            self.parse_define(&mut ast)?;
        }

        Ok(ast)
    }

    fn access_level(&mut self) -> AccessLevel {
        if self.eat(&TokenKind::Public) {
            AccessLevel::Public
        } else if self.eat(&TokenKind::Private) {
            AccessLevel::Private
        } else {
            AccessLevel::Public
        }
    }

    fn parse_define(&mut self, ast: &mut LibraryAst) -> ParseResult<()> {
        self.expect(&TokenKind::Define)?;
        let access = self.access_level();

        if self.eat(&TokenKind::Function) {
            let name = self.identifier()?;
            self.expect(&TokenKind::LParen)?;
            let mut params = Vec::new();
            if !self.check(&TokenKind::RParen) {
                loop {
                    let pname = self.identifier()?;
                    let ptype = self.type_name()?;
                    params.push(FunctionParam {
                        name: pname,
                        type_name: ptype,
                    });
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RParen)?;
            self.expect(&TokenKind::Colon)?;
            let body = self.parse_sub_expr()?;
            self.eat(&TokenKind::Semicolon);
            ast.functions.push(FunctionDecl {
                name,
                access,
                params,
                // Return type is left for the resolver to infer from
                // `body`; the grammar has no separate annotation slot.
                return_type: None,
                body,
            });
            return Ok(());
        }

        let name = self.identifier()?;
        self.expect(&TokenKind::Colon)?;
        let body = self.parse_sub_expr()?;
        self.eat(&TokenKind::Semicolon);
        ast.definitions.insert(
            name.clone(),
            Definition {
                name,
                access,
                // Declared types are not part of this grammar subset;
                // the resolver infers the type from `body`.
                declared_type: None,
                body,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> LibraryAst {
        let tokens = Lexer::new(src).tokenize().unwrap();
        LibraryParser::new(&tokens).parse_library().unwrap()
    }

    #[test]
    fn parses_header_and_using() {
        let ast = parse(
            r#"
            library Example version '1.0.0'
            using FHIR version '4.0.1'
            context Patient
            "#,
        );
        assert_eq!(ast.header.unwrap().name, "Example");
        assert_eq!(ast.using.unwrap().model, "FHIR");
        assert_eq!(ast.context.name, "Patient");
    }

    #[test]
    fn parses_include_with_alias() {
        let ast = parse(r#"include Common version '1.0.0' called Com"#);
        let include = ast.includes.get("Common").unwrap();
        assert_eq!(include.alias, "Com");
    }

    #[test]
    fn parses_valueset_and_codesystem() {
        let ast = parse(
            r#"
            codesystem "SNOMED": 'http://snomed.info/sct'
            valueset "Diabetes": 'http://example.org/vs/diabetes'
            "#,
        );
        assert!(ast.codesystems.contains_key("SNOMED"));
        assert!(ast.valuesets.contains_key("Diabetes"));
    }

    #[test]
    fn parses_simple_definition() {
        let ast = parse(r#"define "InitialPopulation": 1 + 2"#);
        assert!(ast.definitions.contains_key("InitialPopulation"));
    }

    #[test]
    fn parses_function_definition() {
        let ast = parse(r#"define function Double(x Integer): x * 2"#);
        assert_eq!(ast.functions.len(), 1);
        assert_eq!(ast.functions[0].params.len(), 1);
    }

    #[test]
    fn parses_private_definition() {
        let ast = parse(r#"define private "Helper": 1"#);
        let def = ast.definitions.get("Helper").unwrap();
        assert_eq!(def.access, AccessLevel::Private);
    }
}
