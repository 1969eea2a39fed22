//! Recursive-descent parser for the circuit DSL.
//!
//! The parser walks the token vector with one token of lookahead plus an
//! explicit [`Parser::peek`] offset, used to tell apart the three
//! identifier-led statement forms: `name = expr;` (variable), `name(...)`
//! (macro invocation), and `Template name ...;` (subcircuit instance).
//! Any grammar violation is a fatal [`NetforgeError::ParseError`] carrying
//! the offending token's location; there is no error recovery.

use super::ast::*;
use super::lexer::{Token, TokenKind};
use crate::error::{NetforgeError, Result};

/// Parser for circuit DSL token streams.
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    /// Create a parser over a token vector (must end with EOF).
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, index: 0 }
    }

    /// Parse the entire program.
    pub fn parse(&mut self) -> Result<Program> {
        let mut program = Program::new();

        while self.current().kind != TokenKind::Eof {
            match self.current().kind {
                TokenKind::Import => program.imports.push(self.parse_import()?),
                TokenKind::Component => program.components.push(self.parse_component()?),
                TokenKind::Connect => program.connections.push(self.parse_connection()?),
                TokenKind::Subcircuit => program.subcircuits.push(self.parse_subcircuit()?),
                TokenKind::Simulate => program.analyses.push(self.parse_analysis()?),
                TokenKind::Macro => program.macros.push(self.parse_macro()?),
                TokenKind::For => {
                    let lp = self.parse_for()?;
                    program.expansions.push(ScopedItem::Loop(lp));
                }
                TokenKind::Identifier => {
                    if self.peek(1).kind == TokenKind::Operator && self.peek(1).text == "=" {
                        program.variables.push(self.parse_variable()?);
                    } else if self.is_symbol_at(1, '(') {
                        let inv = self.parse_invocation()?;
                        program.expansions.push(ScopedItem::Invocation(inv));
                    } else if self.peek(1).kind == TokenKind::Identifier {
                        program.instances.push(self.parse_instance()?);
                    } else {
                        return Err(self.error_here("expected '=', '(', or an instance name"));
                    }
                }
                _ => {
                    return Err(self.error_here("expected a declaration, connection, or analysis block"));
                }
            }
        }

        Ok(program)
    }

    // ---- cursor -----------------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    /// Look `offset` tokens ahead without consuming anything.
    fn peek(&self, offset: usize) -> &Token {
        let idx = (self.index + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!(
                "expected {:?}, got '{}'",
                kind,
                self.describe_current()
            )))
        }
    }

    fn expect_symbol(&mut self, sym: char) -> Result<Token> {
        if self.is_symbol(sym) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("expected '{}', got '{}'", sym, self.describe_current())))
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<Token> {
        if self.current().kind == TokenKind::Identifier && self.current().text == word {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("expected '{}', got '{}'", word, self.describe_current())))
        }
    }

    fn is_symbol(&self, sym: char) -> bool {
        self.is_symbol_at(0, sym)
    }

    fn is_symbol_at(&self, offset: usize, sym: char) -> bool {
        let tok = self.peek(offset);
        tok.kind == TokenKind::Symbol && tok.text.chars().next() == Some(sym)
    }

    fn is_operator(&self, op: &str) -> bool {
        self.current().kind == TokenKind::Operator && self.current().text == op
    }

    fn eat_optional_semicolon(&mut self) {
        if self.is_symbol(';') {
            self.advance();
        }
    }

    fn describe_current(&self) -> String {
        let tok = self.current();
        if tok.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            tok.text.clone()
        }
    }

    fn error_here(&self, message: impl Into<String>) -> NetforgeError {
        let tok = self.current();
        NetforgeError::parse(tok.line, tok.column, message)
    }

    // ---- statements -------------------------------------------------------

    fn parse_import(&mut self) -> Result<Import> {
        let line = self.current().line;
        self.expect(TokenKind::Import)?;
        let path = match self.current().kind {
            TokenKind::Str | TokenKind::Identifier => self.advance().text,
            _ => return Err(self.error_here("expected import path")),
        };
        self.expect_symbol(';')?;
        Ok(Import { path, line })
    }

    fn parse_variable(&mut self) -> Result<VariableDecl> {
        let name_tok = self.expect(TokenKind::Identifier)?;
        self.advance(); // '='
        let value = self.parse_expr()?;
        self.expect_symbol(';')?;
        Ok(VariableDecl {
            name: name_tok.text,
            value,
            line: name_tok.line,
        })
    }

    fn parse_component(&mut self) -> Result<ComponentDeclaration> {
        let type_tok = self.expect(TokenKind::Component)?;
        let component_type = ComponentType::from_keyword(&type_tok.text)
            .ok_or_else(|| self.error_here(format!("unknown component type '{}'", type_tok.text)))?;
        let name = self.expect(TokenKind::Identifier)?.text;
        self.expect_symbol('(')?;
        let (positional, named) = self.parse_param_list()?;
        self.expect_symbol(')')?;

        let terminals = if self.is_symbol('[') {
            self.advance();
            let mut names = Vec::new();
            while !self.is_symbol(']') {
                names.push(self.expect(TokenKind::Identifier)?.text);
                if self.is_symbol(',') {
                    self.advance();
                }
            }
            self.expect_symbol(']')?;
            Some(names)
        } else {
            None
        };

        let mut attributes = Vec::new();
        while self.current().kind == TokenKind::Identifier {
            attributes.push(self.advance().text);
        }
        self.expect_symbol(';')?;

        Ok(ComponentDeclaration {
            component_type,
            name,
            positional,
            named,
            terminals,
            attributes,
            line: type_tok.line,
        })
    }

    /// Parse `expr, expr, key=expr, ...` up to the closing parenthesis.
    /// Positional parameters must all come before the first named one.
    fn parse_param_list(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut positional = Vec::new();
        let mut named: Vec<(String, Expr)> = Vec::new();

        while !self.is_symbol(')') && self.current().kind != TokenKind::Eof {
            let is_named = self.current().kind == TokenKind::Identifier
                && self.peek(1).kind == TokenKind::Operator
                && self.peek(1).text == "=";
            if is_named {
                let key_tok = self.advance();
                self.advance(); // '='
                let value = self.parse_expr()?;
                if named.iter().any(|(k, _)| *k == key_tok.text) {
                    return Err(NetforgeError::parse(
                        key_tok.line,
                        key_tok.column,
                        format!("duplicate named parameter '{}'", key_tok.text),
                    ));
                }
                named.push((key_tok.text, value));
            } else {
                if !named.is_empty() {
                    return Err(self.error_here("positional parameter after named parameter"));
                }
                positional.push(self.parse_expr()?);
            }
            if self.is_symbol(',') {
                self.advance();
            } else {
                break;
            }
        }

        Ok((positional, named))
    }

    fn parse_connection(&mut self) -> Result<Connection> {
        let line = self.current().line;
        self.expect(TokenKind::Connect)?;
        self.expect_symbol('(')?;

        let mut endpoints = vec![self.parse_endpoint()?];
        while self.is_symbol(',') {
            self.advance();
            endpoints.push(self.parse_endpoint()?);
        }
        self.expect_symbol(')')?;

        if endpoints.len() < 2 {
            return Err(NetforgeError::parse(
                line,
                1,
                "a connection requires at least two endpoints",
            ));
        }

        let net = if self.current().kind == TokenKind::Identifier && self.current().text == "as" {
            self.advance();
            Some(self.expect(TokenKind::Identifier)?.text)
        } else {
            None
        };
        self.expect_symbol(';')?;

        Ok(Connection { endpoints, net, line })
    }

    /// Endpoint: ground spelling, bare node name, or dotted terminal path.
    /// In `a.b.c` everything before the last dot is the component name.
    fn parse_endpoint(&mut self) -> Result<Endpoint> {
        if self.current().kind == TokenKind::Number && self.current().text == "0" {
            self.advance();
            return Ok(Endpoint::Node {
                name: "0".to_string(),
                is_ground: true,
            });
        }

        let first = self.expect(TokenKind::Identifier)?;
        let mut segments = vec![first.text];
        while self.is_symbol('.') {
            self.advance();
            segments.push(self.expect(TokenKind::Identifier)?.text);
        }

        let last = segments.pop().unwrap_or_default();
        if segments.is_empty() {
            Ok(Endpoint::node(last))
        } else {
            Ok(Endpoint::Terminal {
                component: segments.join("."),
                terminal: last,
            })
        }
    }

    fn parse_subcircuit(&mut self) -> Result<Subcircuit> {
        let line = self.current().line;
        self.expect(TokenKind::Subcircuit)?;
        let name = self.expect(TokenKind::Identifier)?.text;

        let mut ports = Vec::new();
        let mut params = Vec::new();
        if self.is_symbol('(') {
            self.advance();
            while !self.is_symbol(')') && self.current().kind != TokenKind::Eof {
                let direction = match self.current().text.as_str() {
                    "input" if self.peek(1).kind == TokenKind::Identifier => {
                        self.advance();
                        PortDirection::Input
                    }
                    "output" if self.peek(1).kind == TokenKind::Identifier => {
                        self.advance();
                        PortDirection::Output
                    }
                    "inout" if self.peek(1).kind == TokenKind::Identifier => {
                        self.advance();
                        PortDirection::Inout
                    }
                    _ => PortDirection::Inout,
                };
                let entry_name = self.expect(TokenKind::Identifier)?.text;
                if self.is_operator("=") {
                    self.advance();
                    let default = self.parse_expr()?;
                    params.push(SubcircuitParam {
                        name: entry_name,
                        default: Some(default),
                    });
                } else {
                    ports.push(Port {
                        name: entry_name,
                        direction,
                    });
                }
                if self.is_symbol(',') {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect_symbol(')')?;
        }

        self.expect_symbol('{')?;
        let mut components = Vec::new();
        let mut instances = Vec::new();
        let mut connections = Vec::new();
        while !self.is_symbol('}') && self.current().kind != TokenKind::Eof {
            match self.current().kind {
                TokenKind::Component => components.push(self.parse_component()?),
                TokenKind::Connect => connections.push(self.parse_connection()?),
                TokenKind::Identifier if self.peek(1).kind == TokenKind::Identifier => {
                    instances.push(self.parse_instance()?);
                }
                _ => {
                    return Err(self.error_here(
                        "expected a component, connection, or nested instance in subcircuit body",
                    ));
                }
            }
        }
        self.expect_symbol('}')?;
        self.eat_optional_semicolon();

        Ok(Subcircuit {
            name,
            ports,
            params,
            components,
            instances,
            connections,
            line,
        })
    }

    fn parse_instance(&mut self) -> Result<SubcircuitInstance> {
        let template_tok = self.expect(TokenKind::Identifier)?;
        let name = self.expect(TokenKind::Identifier)?.text;

        let mut port_map = Vec::new();
        let mut overrides = Vec::new();
        if self.is_symbol('(') {
            self.advance();
            while !self.is_symbol(')') && self.current().kind != TokenKind::Eof {
                let key = self.expect(TokenKind::Identifier)?.text;
                if !self.is_operator("=") {
                    return Err(self.error_here("instance bindings must use 'port=target'"));
                }
                self.advance();
                match self.parse_binding_value()? {
                    BindingValue::Endpoint(ep) => port_map.push((key, ep)),
                    BindingValue::Expr(expr) => overrides.push((key, expr)),
                }
                if self.is_symbol(',') {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect_symbol(')')?;
        }
        self.expect_symbol(';')?;

        Ok(SubcircuitInstance {
            template: template_tok.text,
            name,
            port_map,
            overrides,
            line: template_tok.line,
        })
    }

    /// An instance binding value is an endpoint when it reads like one (a
    /// bare name, a dotted path, or a ground spelling) and an expression
    /// otherwise. The flattener reclassifies bindings whose key names a
    /// template parameter.
    fn parse_binding_value(&mut self) -> Result<BindingValue> {
        let ends_binding = |tok: &Token| {
            tok.kind == TokenKind::Symbol && (tok.text == "," || tok.text == ")")
        };
        if self.current().kind == TokenKind::Number && self.current().text == "0" && ends_binding(self.peek(1)) {
            return Ok(BindingValue::Endpoint(self.parse_endpoint()?));
        }
        if self.current().kind == TokenKind::Identifier
            && (self.is_symbol_at(1, '.') || ends_binding(self.peek(1)))
        {
            return Ok(BindingValue::Endpoint(self.parse_endpoint()?));
        }
        Ok(BindingValue::Expr(self.parse_expr()?))
    }

    fn parse_macro(&mut self) -> Result<MacroDefinition> {
        let line = self.current().line;
        self.expect(TokenKind::Macro)?;
        let name = self.expect(TokenKind::Identifier)?.text;
        self.expect_symbol('(')?;
        let mut params = Vec::new();
        while !self.is_symbol(')') && self.current().kind != TokenKind::Eof {
            params.push(self.expect(TokenKind::Identifier)?.text);
            if self.is_symbol(',') {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_symbol(')')?;
        self.expect_symbol('{')?;
        let body = self.parse_scoped_items()?;
        self.expect_symbol('}')?;
        self.eat_optional_semicolon();
        Ok(MacroDefinition {
            name,
            params,
            body,
            line,
        })
    }

    fn parse_for(&mut self) -> Result<ForLoop> {
        let line = self.current().line;
        self.expect(TokenKind::For)?;
        let var = self.expect(TokenKind::Identifier)?.text;
        self.expect_word("in")?;
        let iterable = self.parse_expr()?;
        self.expect_symbol('{')?;
        let body = self.parse_scoped_items()?;
        self.expect_symbol('}')?;
        self.eat_optional_semicolon();
        Ok(ForLoop {
            var,
            iterable,
            body,
            line,
        })
    }

    fn parse_invocation(&mut self) -> Result<MacroInvocation> {
        let name_tok = self.expect(TokenKind::Identifier)?;
        self.expect_symbol('(')?;
        let mut args = Vec::new();
        while !self.is_symbol(')') && self.current().kind != TokenKind::Eof {
            args.push(self.parse_expr()?);
            if self.is_symbol(',') {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_symbol(')')?;
        self.expect_symbol(';')?;
        Ok(MacroInvocation {
            name: name_tok.text,
            args,
            line: name_tok.line,
        })
    }

    /// Body items shared by macro definitions and `For` loops.
    fn parse_scoped_items(&mut self) -> Result<Vec<ScopedItem>> {
        let mut items = Vec::new();
        while !self.is_symbol('}') && self.current().kind != TokenKind::Eof {
            match self.current().kind {
                TokenKind::Component => items.push(ScopedItem::Component(self.parse_component()?)),
                TokenKind::Connect => items.push(ScopedItem::Connection(self.parse_connection()?)),
                TokenKind::For => items.push(ScopedItem::Loop(self.parse_for()?)),
                TokenKind::Identifier if self.is_symbol_at(1, '(') => {
                    items.push(ScopedItem::Invocation(self.parse_invocation()?));
                }
                TokenKind::Identifier if self.peek(1).kind == TokenKind::Identifier => {
                    items.push(ScopedItem::Instance(self.parse_instance()?));
                }
                _ => return Err(self.error_here("expected a declaration, connection, loop, or invocation")),
            }
        }
        Ok(items)
    }

    fn parse_analysis(&mut self) -> Result<AnalysisBlock> {
        let line = self.current().line;
        self.expect(TokenKind::Simulate)?;
        let name = if self.current().kind == TokenKind::Identifier {
            Some(self.advance().text)
        } else {
            None
        };
        self.expect_symbol('{')?;

        let mut directives = Vec::new();
        let mut plots = Vec::new();
        while !self.is_symbol('}') && self.current().kind != TokenKind::Eof {
            let keyword = self.expect(TokenKind::Keyword)?;
            match keyword.text.as_str() {
                "dc" => {
                    self.expect_symbol(';')?;
                    directives.push(Directive::Dc);
                }
                "transient" => {
                    self.expect_symbol('(')?;
                    let start = self.directive_number()?;
                    self.expect_symbol(',')?;
                    let stop = self.directive_number()?;
                    self.expect_symbol(',')?;
                    let step = self.directive_number()?;
                    self.expect_symbol(')')?;
                    self.expect_symbol(';')?;
                    directives.push(Directive::Transient { start, stop, step });
                }
                "ac" => {
                    self.expect_symbol('(')?;
                    let sweep = self.expect(TokenKind::Identifier)?.text;
                    self.expect_symbol(',')?;
                    let points = self.directive_number()?;
                    self.expect_symbol(',')?;
                    let fstart = self.directive_number()?;
                    self.expect_symbol(',')?;
                    let fstop = self.directive_number()?;
                    self.expect_symbol(')')?;
                    self.expect_symbol(';')?;
                    directives.push(Directive::Ac {
                        sweep,
                        points,
                        fstart,
                        fstop,
                    });
                }
                "noise" => {
                    self.expect_symbol('(')?;
                    let output = self.expect(TokenKind::Identifier)?.text;
                    self.expect_symbol(',')?;
                    let source = self.expect(TokenKind::Identifier)?.text;
                    self.expect_symbol(',')?;
                    let points = self.directive_number()?;
                    self.expect_symbol(')')?;
                    self.expect_symbol(';')?;
                    directives.push(Directive::Noise {
                        output,
                        source,
                        points,
                    });
                }
                "paramSweep" => {
                    self.expect_symbol('(')?;
                    let param = self.expect(TokenKind::Identifier)?.text;
                    self.expect_symbol(',')?;
                    let start = self.directive_number()?;
                    self.expect_symbol(',')?;
                    let stop = self.directive_number()?;
                    self.expect_symbol(',')?;
                    let step = self.directive_number()?;
                    self.expect_symbol(')')?;
                    self.expect_symbol(';')?;
                    directives.push(Directive::Parametric {
                        param,
                        start,
                        stop,
                        step,
                    });
                }
                "monteCarlo" => {
                    self.expect_symbol('(')?;
                    let runs = self.directive_number()?;
                    self.expect_symbol(')')?;
                    self.expect_symbol(';')?;
                    directives.push(Directive::MonteCarlo { runs });
                }
                "plot" => {
                    self.expect_symbol('(')?;
                    let mut signals = Vec::new();
                    while !self.is_symbol(')') && self.current().kind != TokenKind::Eof {
                        signals.push(self.parse_plot_signal()?);
                        if self.is_symbol(',') {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    self.expect_symbol(')')?;
                    self.expect_symbol(';')?;
                    plots.push(PlotCommand { signals });
                }
                other => {
                    return Err(NetforgeError::parse(
                        keyword.line,
                        keyword.column,
                        format!("unknown simulation directive '{}'", other),
                    ));
                }
            }
        }
        self.expect_symbol('}')?;
        self.eat_optional_semicolon();

        Ok(AnalysisBlock {
            name,
            directives,
            plots,
            line,
        })
    }

    /// A directive argument: a number with optional magnitude/unit tokens.
    fn directive_number(&mut self) -> Result<f64> {
        let negative = if self.is_operator("-") {
            self.advance();
            true
        } else {
            false
        };
        let tok = self.expect(TokenKind::Number)?;
        let mut value: f64 = tok.text.parse().map_err(|_| {
            NetforgeError::parse(tok.line, tok.column, format!("invalid number '{}'", tok.text))
        })?;
        while self.current().kind == TokenKind::Unit {
            value *= self.advance().scale;
        }
        Ok(if negative { -value } else { value })
    }

    /// A plot signal: `name` or `name(arg)`, rendered back to text.
    fn parse_plot_signal(&mut self) -> Result<String> {
        let name = self.expect(TokenKind::Identifier)?.text;
        if self.is_symbol('(') {
            self.advance();
            let inner = self.expect(TokenKind::Identifier)?.text;
            self.expect_symbol(')')?;
            Ok(format!("{}({})", name, inner))
        } else {
            Ok(name)
        }
    }

    // ---- expressions ------------------------------------------------------

    /// Expression entry point. Precedence, lowest to highest: `||`, `&&`,
    /// equality, relational, additive, multiplicative (including the `|`
    /// parallel combination), power (right-associative), unary, primary.
    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.is_operator("||") {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality()?;
        while self.is_operator("&&") {
            self.advance();
            let right = self.parse_equality()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = if self.is_operator("==") {
                BinaryOp::Eq
            } else if self.is_operator("!=") {
                BinaryOp::Ne
            } else {
                break;
            };
            self.advance();
            let right = self.parse_relational()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.is_operator("<=") {
                BinaryOp::Le
            } else if self.is_operator(">=") {
                BinaryOp::Ge
            } else if self.is_operator("<") {
                BinaryOp::Lt
            } else if self.is_operator(">") {
                BinaryOp::Gt
            } else {
                break;
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.is_operator("+") {
                BinaryOp::Add
            } else if self.is_operator("-") {
                BinaryOp::Sub
            } else {
                break;
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_power()?;
        loop {
            let op = if self.is_operator("*") {
                BinaryOp::Mul
            } else if self.is_operator("/") {
                BinaryOp::Div
            } else if self.is_operator("%") {
                BinaryOp::Mod
            } else if self.is_operator("|") {
                BinaryOp::Parallel
            } else {
                break;
            };
            self.advance();
            let right = self.parse_power()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_unary()?;
        if self.is_operator("^") {
            self.advance();
            // Right-associative
            let exponent = self.parse_power()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = if self.is_operator("-") {
            Some(UnaryOp::Neg)
        } else if self.is_operator("+") {
            Some(UnaryOp::Plus)
        } else if self.is_operator("!") {
            Some(UnaryOp::Not)
        } else if self.current().kind == TokenKind::Identifier
            && self.current().text == "sqrt"
            && !self.is_symbol_at(1, '(')
        {
            Some(UnaryOp::Sqrt)
        } else if self.current().kind == TokenKind::Identifier
            && self.current().text == "abs"
            && !self.is_symbol_at(1, '(')
        {
            Some(UnaryOp::Abs)
        } else {
            None
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let expr = self.parse_primary_base()?;
        Ok(self.apply_postfix_units(expr))
    }

    /// A trailing unit annotation on a non-literal primary (`r ohm`)
    /// multiplies the expression by the unit's magnitude and keeps the
    /// unit name on the literal for the validator's unit-class check.
    fn apply_postfix_units(&mut self, mut expr: Expr) -> Expr {
        while self.current().kind == TokenKind::Unit {
            let tok = self.advance();
            let unit = if tok.text.is_empty() {
                None
            } else {
                Some(tok.text)
            };
            expr = Expr::Binary {
                op: BinaryOp::Mul,
                left: Box::new(expr),
                right: Box::new(Expr::Literal(Literal::number(1.0, unit, tok.scale))),
            };
        }
        expr
    }

    fn parse_primary_base(&mut self) -> Result<Expr> {
        match self.current().kind {
            TokenKind::Number => {
                let tok = self.advance();
                let value: f64 = tok.text.parse().map_err(|_| {
                    NetforgeError::parse(tok.line, tok.column, format!("invalid number '{}'", tok.text))
                })?;
                let mut scale = 1.0;
                let mut unit = None;
                while self.current().kind == TokenKind::Unit {
                    let unit_tok = self.advance();
                    scale *= unit_tok.scale;
                    if !unit_tok.text.is_empty() {
                        unit = Some(unit_tok.text);
                        break;
                    }
                }
                Ok(Expr::Literal(Literal::number(value, unit, scale)))
            }
            TokenKind::Str => {
                let tok = self.advance();
                Ok(Expr::Literal(Literal::string(tok.text)))
            }
            TokenKind::Unit => {
                // A unit word in value position (e.g. `unit=V`) is an
                // opaque string literal.
                let tok = self.advance();
                Ok(Expr::Literal(Literal::string(tok.text)))
            }
            TokenKind::Identifier => {
                let tok = self.advance();
                if self.is_symbol('(') {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.is_symbol(')') && self.current().kind != TokenKind::Eof {
                        args.push(self.parse_expr()?);
                        if self.is_symbol(',') {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    self.expect_symbol(')')?;
                    Ok(Expr::Call {
                        name: tok.text,
                        args,
                        line: tok.line,
                        column: tok.column,
                    })
                } else {
                    Ok(Expr::Identifier {
                        name: tok.text,
                        line: tok.line,
                        column: tok.column,
                    })
                }
            }
            TokenKind::Symbol if self.is_symbol('(') => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_symbol(')')?;
                Ok(expr)
            }
            TokenKind::Symbol if self.is_symbol('[') => {
                self.advance();
                let mut elements = Vec::new();
                while !self.is_symbol(']') && self.current().kind != TokenKind::Eof {
                    elements.push(self.parse_expr()?);
                    if self.is_symbol(',') {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect_symbol(']')?;
                Ok(Expr::Array { elements })
            }
            _ => Err(self.error_here(format!("expected expression, got '{}'", self.describe_current()))),
        }
    }
}

enum BindingValue {
    Endpoint(Endpoint),
    Expr(Expr),
}
