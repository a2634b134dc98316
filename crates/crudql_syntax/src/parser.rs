//! Recursive descent parser for executable GraphQL documents.

use crate::ast::*;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};
use crudql_core::{diagnostics::codes, DiagnosticBag, Interner, Span, Text};

/// Type-system keywords that never start an executable definition.
const TYPE_SYSTEM_KEYWORDS: &[&str] = &[
    "schema",
    "type",
    "interface",
    "union",
    "enum",
    "input",
    "scalar",
    "directive",
    "extend",
];

/// Deepest nesting of lists, objects, types and selection sets accepted in
/// one document.
pub const MAX_DEPTH: usize = 128;

/// Parser for request documents.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    diagnostics: DiagnosticBag,
    depth: usize,
    /// Set once nesting exceeds [`MAX_DEPTH`]; the rest of the input is
    /// skipped.
    halted: bool,
}

/// Result of parsing.
pub struct ParseResult {
    pub document: Document,
    pub diagnostics: DiagnosticBag,
}

/// Parses a source string into a document.
pub fn parse(source: &str, interner: &Interner) -> ParseResult {
    let mut parser = Parser::new(source, interner);
    let document = parser.parse_document();
    ParseResult {
        document,
        diagnostics: parser.diagnostics,
    }
}

impl<'a> Parser<'a> {
    /// Creates a new parser.
    pub fn new(source: &'a str, interner: &'a Interner) -> Self {
        let mut lexer = Lexer::new(source, interner);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            diagnostics: DiagnosticBag::new(),
            depth: 0,
            halted: false,
        }
    }

    #[inline]
    fn at(&self) -> TokenKind {
        self.current.kind
    }

    #[inline]
    fn at_kind(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn advance(&mut self) {
        if !self.halted {
            self.current = self.lexer.next_token();
        }
    }

    /// Enters one nesting level. Past [`MAX_DEPTH`] this reports once and
    /// halts the parser at end of input, so every caller unwinds without
    /// recursing further.
    fn descend(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            self.diagnostics.error(
                codes::TOO_DEEP,
                "nesting too deep",
                self.current.span,
                format!("Syntax Error: Document nesting exceeds {MAX_DEPTH} levels."),
            );
            self.halted = true;
            self.current = Token::new(TokenKind::Eof, Span::empty(self.current.span.start));
            return false;
        }
        self.depth += 1;
        true
    }

    fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Expects a specific token kind.
    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.at_kind(kind) {
            self.advance();
            true
        } else {
            self.error_expected(kind.as_str());
            false
        }
    }

    fn current_text(&self) -> &'a str {
        self.lexer.span_text(self.current.span)
    }

    fn intern_current(&self) -> Text {
        self.lexer.intern_span(self.current.span)
    }

    /// Reports an error at the current token.
    fn error(&mut self, message: &str) {
        if self.halted {
            return;
        }
        self.diagnostics.error(
            codes::INVALID_SYNTAX,
            "invalid syntax",
            self.current.span,
            format!("Syntax Error: {message}"),
        );
    }

    fn error_expected(&mut self, expected: &str) {
        if self.halted {
            return;
        }
        let (code, found) = match self.at() {
            TokenKind::Eof => (codes::UNEXPECTED_EOF, "<EOF>".to_string()),
            TokenKind::Error => (
                codes::INVALID_SYNTAX,
                format!("unexpected character \"{}\"", self.current_text()),
            ),
            _ => (codes::UNEXPECTED_TOKEN, format!("\"{}\"", self.current_text())),
        };
        self.diagnostics.error(
            code,
            "unexpected token",
            self.current.span,
            format!("Syntax Error: Expected {expected}, found {found}"),
        );
    }

    /// Parses a document.
    pub fn parse_document(&mut self) -> Document {
        let start = self.current.span.start;
        let mut definitions = Vec::new();

        if self.at_kind(TokenKind::Eof) {
            self.diagnostics.error(
                codes::UNEXPECTED_EOF,
                "empty document",
                self.current.span,
                "Syntax Error: Unexpected <EOF>",
            );
        }

        while !self.at_kind(TokenKind::Eof) {
            match self.parse_definition() {
                Some(def) => definitions.push(def),
                // One bad definition poisons the rest of the document.
                None => break,
            }
        }

        let end = self.current.span.end;
        Document {
            definitions,
            span: Span::new(start, end),
        }
    }

    fn parse_definition(&mut self) -> Option<Definition> {
        match self.at() {
            TokenKind::Query
            | TokenKind::Mutation
            | TokenKind::Subscription
            | TokenKind::LBrace => Some(Definition::Operation(self.parse_operation())),
            TokenKind::Fragment => Some(Definition::Fragment(self.parse_fragment_definition())),
            TokenKind::Ident if TYPE_SYSTEM_KEYWORDS.contains(&self.current_text()) => {
                let message = format!(
                    "The \"{}\" definition is not executable",
                    self.current_text()
                );
                self.diagnostics
                    .error(codes::NOT_EXECUTABLE, "not executable", self.current.span, message);
                None
            }
            _ => {
                self.error_expected("an operation or fragment");
                None
            }
        }
    }

    /// Parses a name. Keywords are valid names.
    fn parse_name(&mut self) -> Name {
        let span = self.current.span;
        let value = self.intern_current();
        if self.at().is_name() {
            self.advance();
        } else {
            self.error_expected("Name");
        }
        Name::new(value, span)
    }

    fn parse_operation(&mut self) -> OperationDefinition {
        let start = self.current.span.start;

        let (operation, name) = if self.at_kind(TokenKind::LBrace) {
            (OperationType::Query, None)
        } else {
            let op = match self.at() {
                TokenKind::Mutation => OperationType::Mutation,
                TokenKind::Subscription => OperationType::Subscription,
                _ => OperationType::Query,
            };
            self.advance();

            let name = if self.at().is_name() {
                Some(self.parse_name())
            } else {
                None
            };

            (op, name)
        };

        let variables = if self.at_kind(TokenKind::LParen) {
            self.advance();
            let vars = self.parse_variable_definitions();
            self.expect(TokenKind::RParen);
            vars
        } else {
            Vec::new()
        };

        let directives = self.parse_directives();
        let selection_set = self.parse_selection_set();

        let end = self.current.span.start;
        OperationDefinition {
            operation,
            name,
            variables,
            directives,
            selection_set,
            span: Span::new(start, end),
        }
    }

    fn parse_variable_definitions(&mut self) -> Vec<VariableDefinition> {
        let mut vars = Vec::new();
        while self.at_kind(TokenKind::Dollar) {
            vars.push(self.parse_variable_definition());
        }
        if vars.is_empty() {
            self.error_expected("Variable");
        }
        vars
    }

    fn parse_variable_definition(&mut self) -> VariableDefinition {
        let start = self.current.span.start;
        self.expect(TokenKind::Dollar);
        let name = self.parse_name();
        self.expect(TokenKind::Colon);
        let ty = self.parse_type();

        let default_value = if self.at_kind(TokenKind::Eq) {
            self.advance();
            Some(self.parse_value(true))
        } else {
            None
        };

        let end = self.current.span.start;
        VariableDefinition {
            name,
            ty,
            default_value,
            span: Span::new(start, end),
        }
    }

    /// Parses a type: `Name`, `[Type]`, with an optional trailing `!`.
    fn parse_type(&mut self) -> Type {
        let start = self.current.span.start;

        let inner = if self.at_kind(TokenKind::LBracket) {
            if !self.descend() {
                return Type::Named(Name::new(self.intern_current(), Span::empty(start)));
            }
            self.advance();
            let item = self.parse_type();
            self.expect(TokenKind::RBracket);
            self.ascend();
            Type::List(Box::new(item), Span::new(start, self.current.span.start))
        } else {
            Type::Named(self.parse_name())
        };

        if self.at_kind(TokenKind::Bang) {
            self.advance();
            Type::NonNull(Box::new(inner), Span::new(start, self.current.span.start))
        } else {
            inner
        }
    }

    fn parse_directives(&mut self) -> Vec<Directive> {
        let mut directives = Vec::new();
        while self.at_kind(TokenKind::At) {
            directives.push(self.parse_directive());
        }
        directives
    }

    fn parse_directive(&mut self) -> Directive {
        let start = self.current.span.start;
        self.advance(); // @

        let name = self.parse_name();
        let arguments = self.parse_optional_arguments();

        let end = self.current.span.start;
        Directive {
            name,
            arguments,
            span: Span::new(start, end),
        }
    }

    fn parse_optional_arguments(&mut self) -> Vec<Argument> {
        if !self.at_kind(TokenKind::LParen) {
            return Vec::new();
        }
        self.advance();
        let mut args = Vec::new();
        while self.at().is_name() {
            args.push(self.parse_argument());
        }
        if args.is_empty() {
            self.error_expected("Name");
        }
        self.expect(TokenKind::RParen);
        args
    }

    fn parse_argument(&mut self) -> Argument {
        let start = self.current.span.start;
        let name = self.parse_name();
        self.expect(TokenKind::Colon);
        let value = self.parse_value(false);
        let end = self.current.span.start;
        Argument {
            name,
            value,
            span: Span::new(start, end),
        }
    }

    /// Parses a value. Variables are rejected inside constant positions.
    fn parse_value(&mut self, constant: bool) -> Value {
        let start = self.current.span.start;

        let nested = matches!(self.at(), TokenKind::LBracket | TokenKind::LBrace);
        if nested && !self.descend() {
            return Value::Null(Span::empty(start));
        }
        let value = self.parse_value_inner(constant, start);
        if nested {
            self.ascend();
        }
        value
    }

    fn parse_value_inner(&mut self, constant: bool, start: u32) -> Value {
        match self.at() {
            TokenKind::Dollar => {
                if constant {
                    self.error("Unexpected variable in constant value");
                }
                self.advance();
                let name = self.parse_name();
                Value::Variable(name)
            }
            TokenKind::IntLiteral => {
                let value = match self.current_text().parse::<i64>() {
                    Ok(value) => value,
                    Err(_) => {
                        self.error("Int cannot represent this value");
                        0
                    }
                };
                self.advance();
                Value::Int(value, Span::new(start, self.current.span.start))
            }
            TokenKind::FloatLiteral => {
                let value = self.current_text().parse().unwrap_or(0.0);
                self.advance();
                Value::Float(value, Span::new(start, self.current.span.start))
            }
            TokenKind::StringLiteral => {
                let text = self.current_text();
                let value = unescape_string(&text[1..text.len() - 1]);
                self.advance();
                Value::String(value, Span::new(start, self.current.span.start))
            }
            TokenKind::BlockStringLiteral => {
                let text = self.current_text();
                let value = block_string_value(&text[3..text.len() - 3]);
                self.advance();
                Value::String(value, Span::new(start, self.current.span.start))
            }
            TokenKind::True => {
                self.advance();
                Value::Boolean(true, Span::new(start, self.current.span.start))
            }
            TokenKind::False => {
                self.advance();
                Value::Boolean(false, Span::new(start, self.current.span.start))
            }
            TokenKind::Null => {
                self.advance();
                Value::Null(Span::new(start, self.current.span.start))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut values = Vec::new();
                while !self.at_kind(TokenKind::RBracket) && !self.at_kind(TokenKind::Eof) {
                    let before = self.lexer.pos();
                    values.push(self.parse_value(constant));
                    if self.lexer.pos() == before {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket);
                Value::List(values, Span::new(start, self.current.span.start))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                while self.at().is_name() {
                    let name = self.parse_name();
                    self.expect(TokenKind::Colon);
                    let value = self.parse_value(constant);
                    fields.push((name, value));
                }
                self.expect(TokenKind::RBrace);
                Value::Object(fields, Span::new(start, self.current.span.start))
            }
            kind if kind.is_name() => {
                let name = self.parse_name();
                Value::Enum(name)
            }
            _ => {
                self.error_expected("a value");
                Value::Null(Span::new(start, self.current.span.start))
            }
        }
    }

    fn parse_fragment_definition(&mut self) -> FragmentDefinition {
        let start = self.current.span.start;
        self.advance(); // fragment

        if self.at_kind(TokenKind::On) {
            self.error("Unexpected \"on\" as fragment name");
        }
        let name = self.parse_name();
        self.expect(TokenKind::On);
        let type_condition = self.parse_name();
        let directives = self.parse_directives();
        let selection_set = self.parse_selection_set();

        let end = self.current.span.start;
        FragmentDefinition {
            name,
            type_condition,
            directives,
            selection_set,
            span: Span::new(start, end),
        }
    }

    fn parse_selection_set(&mut self) -> SelectionSet {
        let start = self.current.span.start;
        if !self.at_kind(TokenKind::LBrace) || !self.descend() {
            self.expect(TokenKind::LBrace);
            return SelectionSet {
                selections: Vec::new(),
                span: Span::empty(start),
            };
        }
        self.advance();

        let mut selections = Vec::new();
        while !self.at_kind(TokenKind::RBrace) && !self.at_kind(TokenKind::Eof) {
            if !self.at().is_name() && !self.at_kind(TokenKind::Spread) {
                self.error_expected("Name");
                self.advance();
                continue;
            }
            selections.push(self.parse_selection());
        }
        if selections.is_empty() {
            self.error_expected("Name");
        }
        self.expect(TokenKind::RBrace);
        self.ascend();

        let end = self.current.span.start;
        SelectionSet {
            selections,
            span: Span::new(start, end),
        }
    }

    fn parse_selection(&mut self) -> Selection {
        if !self.at_kind(TokenKind::Spread) {
            return Selection::Field(self.parse_field_selection());
        }

        let start = self.current.span.start;
        self.advance();
        if self.at_kind(TokenKind::On) {
            self.advance();
            let type_condition = Some(self.parse_name());
            let directives = self.parse_directives();
            let selection_set = self.parse_selection_set();
            Selection::InlineFragment(InlineFragment {
                type_condition,
                directives,
                selection_set,
                span: Span::new(start, self.current.span.start),
            })
        } else if self.at_kind(TokenKind::LBrace) || self.at_kind(TokenKind::At) {
            let directives = self.parse_directives();
            let selection_set = self.parse_selection_set();
            Selection::InlineFragment(InlineFragment {
                type_condition: None,
                directives,
                selection_set,
                span: Span::new(start, self.current.span.start),
            })
        } else {
            let name = self.parse_name();
            let directives = self.parse_directives();
            Selection::FragmentSpread(FragmentSpread {
                name,
                directives,
                span: Span::new(start, self.current.span.start),
            })
        }
    }

    fn parse_field_selection(&mut self) -> FieldSelection {
        let start = self.current.span.start;

        let first_name = self.parse_name();
        let (alias, name) = if self.at_kind(TokenKind::Colon) {
            self.advance();
            (Some(first_name), self.parse_name())
        } else {
            (None, first_name)
        };

        let arguments = self.parse_optional_arguments();
        let directives = self.parse_directives();

        let selection_set = if self.at_kind(TokenKind::LBrace) {
            Some(self.parse_selection_set())
        } else {
            None
        };

        let end = self.current.span.start;
        FieldSelection {
            alias,
            name,
            arguments,
            directives,
            selection_set,
            span: Span::new(start, end),
        }
    }
}

/// Resolves escape sequences inside a quoted string.
fn unescape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Computes the value of a block string: common indentation and blank
/// leading/trailing lines are removed.
fn block_string_value(raw: &str) -> String {
    let raw = raw.replace("\\\"\"\"", "\"\"\"");
    let lines: Vec<&str> = raw.lines().collect();

    let indent = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| if i == 0 { line } else { line.get(indent..).unwrap_or("") })
        .collect();

    while out.first().is_some_and(|l| l.trim().is_empty()) {
        out.remove(0);
    }
    while out.last().is_some_and(|l| l.trim().is_empty()) {
        out.pop();
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand_query() {
        let interner = Interner::new();
        let result = parse("{ users { id email name posts { id title published } } }", &interner);
        assert!(!result.diagnostics.has_errors());

        let ops: Vec<_> = result.document.operations().collect();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation, OperationType::Query);
        assert!(ops[0].name.is_none());

        let Selection::Field(users) = &ops[0].selection_set.selections[0] else {
            panic!("expected field");
        };
        assert_eq!(interner.get(users.name.value), "users");
        let nested = users.selection_set.as_ref().unwrap();
        assert_eq!(nested.selections.len(), 4);
    }

    #[test]
    fn test_parse_mutation_with_variables() {
        let interner = Interner::new();
        let result = parse(
            r#"
            mutation CreateUser($email: String!, $tags: [String!] = ["a"]) {
                createOneUser(data: { email: $email, name: "Bob" }) { id }
            }
        "#,
            &interner,
        );
        assert!(!result.diagnostics.has_errors());

        let op = result.document.operations().next().unwrap();
        assert_eq!(op.operation, OperationType::Mutation);
        assert_eq!(interner.get(op.name.unwrap().value), "CreateUser");
        assert_eq!(op.variables.len(), 2);
        assert!(matches!(op.variables[0].ty, Type::NonNull(_, _)));
        assert!(matches!(op.variables[1].ty, Type::List(_, _)));
        assert!(op.variables[1].default_value.is_some());
    }

    #[test]
    fn test_parse_alias_and_fragments() {
        let interner = Interner::new();
        let result = parse(
            r#"
            query {
                first: post(id: 1) { ...PostFields }
                users { ... on User { email } }
            }
            fragment PostFields on Post { id title }
        "#,
            &interner,
        );
        assert!(!result.diagnostics.has_errors());
        assert_eq!(result.document.fragments().count(), 1);

        let op = result.document.operations().next().unwrap();
        let Selection::Field(first) = &op.selection_set.selections[0] else {
            panic!("expected field");
        };
        assert_eq!(interner.get(first.response_key()), "first");
        assert_eq!(interner.get(first.name.value), "post");
        assert_eq!(first.arguments.len(), 1);
    }

    #[test]
    fn test_keywords_as_field_names() {
        let interner = Interner::new();
        let result = parse("{ query: users { on } }", &interner);
        assert!(!result.diagnostics.has_errors());
    }

    #[test]
    fn test_rejects_type_system_definitions() {
        let interner = Interner::new();
        let result = parse("type Query { users: [User] }", &interner);
        assert!(result.diagnostics.has_errors());
        let diag = result.diagnostics.iter().next().unwrap();
        assert_eq!(diag.code, codes::NOT_EXECUTABLE);
    }

    #[test]
    fn test_unterminated_selection() {
        let interner = Interner::new();
        let result = parse("{ users { id ", &interner);
        assert!(result.diagnostics.has_errors());
        let diag = result.diagnostics.iter().next().unwrap();
        assert_eq!(diag.code, codes::UNEXPECTED_EOF);
        assert_eq!(diag.render(), "Syntax Error: Expected }, found <EOF>");
    }

    #[test]
    fn test_empty_document() {
        let interner = Interner::new();
        let result = parse("   # nothing here", &interner);
        assert!(result.diagnostics.has_errors());
        assert!(result.document.definitions.is_empty());
    }

    #[test]
    fn test_deep_list_value_is_rejected() {
        let interner = Interner::new();
        let source = format!(
            "{{ post(id: {}1{}) {{ id }} }}",
            "[".repeat(50_000),
            "]".repeat(50_000)
        );
        let result = parse(&source, &interner);

        assert_eq!(result.diagnostics.error_count(), 1);
        let diag = result.diagnostics.iter().next().unwrap();
        assert_eq!(diag.code, codes::TOO_DEEP);
        assert_eq!(diag.render(), "Syntax Error: Document nesting exceeds 128 levels.");
    }

    #[test]
    fn test_deep_selection_and_type_are_rejected() {
        let interner = Interner::new();
        let selections = format!(
            "{}{}",
            "{ a ".repeat(MAX_DEPTH + 1),
            "}".repeat(MAX_DEPTH + 1)
        );
        let result = parse(&selections, &interner);
        assert_eq!(result.diagnostics.iter().next().unwrap().code, codes::TOO_DEEP);

        let variable = format!(
            "query ($v: {}Int{}) {{ users {{ id }} }}",
            "[".repeat(MAX_DEPTH + 1),
            "]".repeat(MAX_DEPTH + 1)
        );
        let result = parse(&variable, &interner);
        assert_eq!(result.diagnostics.error_count(), 1);
        assert_eq!(result.diagnostics.iter().next().unwrap().code, codes::TOO_DEEP);
    }

    #[test]
    fn test_nesting_at_the_limit_is_accepted() {
        let interner = Interner::new();
        // The selection set takes one level, the argument list the rest.
        let depth = MAX_DEPTH - 1;
        let source = format!("{{ post(id: {}1{}) }}", "[".repeat(depth), "]".repeat(depth));
        assert!(!parse(&source, &interner).diagnostics.has_errors());
    }

    #[test]
    fn test_string_values() {
        assert_eq!(unescape_string(r#"say \"hi\"\n"#), "say \"hi\"\n");
        assert_eq!(unescape_string(r"caf\u00e9"), "café");
        assert_eq!(
            block_string_value("\n    I like\n      turtles\n  "),
            "I like\n  turtles"
        );
    }
}
