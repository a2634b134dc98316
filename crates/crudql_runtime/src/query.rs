//! Request validation and planning.
//!
//! [`prepare`] parses a request document, selects the operation, coerces
//! variables, validates every selection against the schema, and lowers the
//! result into a [`QueryPlan`]. All of this is synchronous: a document either
//! yields a plan or a [`RequestError`], and no resolver runs before that.

use crate::executor::{FieldError, Location, Response};
use crate::resolver::codes as error_codes;
use crate::schema::{ExecutableSchema, FieldDef, Schema, TypeDef, TypeRef};
use crudql_core::diagnostics::codes;
use crudql_core::{DiagnosticBag, Interner, Span, Text};
use crudql_syntax::{
    self as ast, Document, FieldSelection, FragmentDefinition, OperationDefinition, Selection,
    SelectionSet, MAX_DEPTH,
};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};

pub use crudql_syntax::OperationType;

/// A query plan.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub operation_kind: OperationType,
    pub operation_name: Option<String>,
    pub root_type: String,
    /// The root node of the plan.
    pub root: PlanNode,
}

/// A node in the query plan.
#[derive(Debug, Clone)]
pub enum PlanNode {
    /// Sequential execution.
    Sequence(Vec<PlanNode>),
    /// Parallel execution.
    Parallel(Vec<PlanNode>),
    /// A field with a sub-selection.
    Field {
        info: FieldInfo,
        response_name: String,
        children: Box<PlanNode>,
    },
    /// A leaf field to resolve.
    Leaf { field: FieldInfo },
}

impl PlanNode {
    pub fn field_info(&self) -> Option<&FieldInfo> {
        match self {
            Self::Field { info, .. } => Some(info),
            Self::Leaf { field } => Some(field),
            Self::Sequence(_) | Self::Parallel(_) => None,
        }
    }

    /// Child nodes of a sequence or parallel group.
    pub fn nodes(&self) -> &[PlanNode] {
        match self {
            Self::Sequence(nodes) | Self::Parallel(nodes) => nodes,
            Self::Field { .. } | Self::Leaf { .. } => &[],
        }
    }
}

/// Everything the executor needs to resolve one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub alias: Option<String>,
    pub parent_type: String,
    pub return_type: TypeRef,
    /// Coerced arguments in definition order, variables substituted.
    pub arguments: Vec<(String, Value)>,
    pub is_introspection: bool,
    pub location: Option<Location>,
}

impl FieldInfo {
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A message with the document positions it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedMessage {
    pub message: String,
    pub locations: Vec<Location>,
}

/// Why a request was rejected before execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("{}", summary(.0))]
    Parse(Vec<LocatedMessage>),

    #[error("{}", summary(.0))]
    Validation(Vec<LocatedMessage>),

    #[error("Must provide an operation.")]
    NoOperation,

    #[error("Unknown operation named \"{0}\".")]
    UnknownOperation(String),

    #[error("Must provide operation name if query contains multiple operations.")]
    AmbiguousOperation,

    #[error("{0}")]
    VariableCoercion(String),
}

fn summary(messages: &[LocatedMessage]) -> String {
    match messages {
        [] => String::new(),
        [only] => only.message.clone(),
        [first, rest @ ..] => format!("{} (and {} more)", first.message, rest.len()),
    }
}

impl RequestError {
    /// The `extensions.code` reported for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => error_codes::GRAPHQL_PARSE_FAILED,
            Self::VariableCoercion(_) => error_codes::BAD_USER_INPUT,
            Self::Validation(_)
            | Self::NoOperation
            | Self::UnknownOperation(_)
            | Self::AmbiguousOperation => error_codes::GRAPHQL_VALIDATION_FAILED,
        }
    }

    pub fn into_field_errors(self) -> Vec<FieldError> {
        let code = self.code();
        match self {
            Self::Parse(messages) | Self::Validation(messages) => messages
                .into_iter()
                .map(|m| {
                    m.locations
                        .into_iter()
                        .fold(FieldError::new(m.message), FieldError::with_location)
                        .with_code(code)
                })
                .collect(),
            other => vec![FieldError::new(other.to_string()).with_code(code)],
        }
    }

    /// A response carrying only errors, no `data`.
    pub fn into_response(self) -> Response {
        Response::errors(self.into_field_errors())
    }
}

/// Parses, validates and plans one request.
pub fn prepare(
    schema: &ExecutableSchema,
    query: &str,
    operation_name: Option<&str>,
    variables: &Map<String, Value>,
) -> Result<QueryPlan, RequestError> {
    let interner = Interner::new();
    let parsed = crudql_syntax::parse(query, &interner);
    if parsed.diagnostics.has_errors() {
        return Err(RequestError::Parse(located(&parsed.diagnostics, query)));
    }
    let document = parsed.document;

    let mut planner = Planner::new(schema.schema(), &interner, query, &document);
    planner.validate_document(&document);
    planner.fail_on_errors()?;

    let operation = select_operation(&document, operation_name, &interner)?;
    let root_type = planner.root_type(operation)?;

    planner.define_variables(operation);
    planner.fail_on_errors()?;
    planner.coerce_variables(operation, variables)?;
    planner.fail_on_errors()?;

    let root = planner.plan_operation(&root_type, operation);
    planner.check_unused(operation, &document);
    planner.fail_on_errors()?;

    let operation_name = operation.name.map(|n| interner.get(n.value));
    tracing::trace!(
        operation = operation_name.as_deref().unwrap_or("<anonymous>"),
        kind = operation.operation.as_str(),
        "request planned"
    );

    Ok(QueryPlan {
        operation_kind: operation.operation,
        operation_name,
        root_type,
        root,
    })
}

fn located(diagnostics: &DiagnosticBag, source: &str) -> Vec<LocatedMessage> {
    diagnostics
        .errors()
        .map(|d| LocatedMessage {
            message: d.render(),
            locations: d
                .primary_span()
                .map(|span| Location::from(span.line_col(source)))
                .into_iter()
                .collect(),
        })
        .collect()
}

fn select_operation<'d>(
    document: &'d Document,
    operation_name: Option<&str>,
    interner: &Interner,
) -> Result<&'d OperationDefinition, RequestError> {
    let mut operations = document.operations();
    match operation_name {
        Some(wanted) => document
            .operations()
            .find(|op| op.name.is_some_and(|n| interner.get(n.value) == wanted))
            .ok_or_else(|| RequestError::UnknownOperation(wanted.to_string())),
        None => {
            let first = operations.next().ok_or(RequestError::NoOperation)?;
            if operations.next().is_some() {
                return Err(RequestError::AmbiguousOperation);
            }
            Ok(first)
        }
    }
}

struct Planner<'a> {
    schema: &'a Schema,
    interner: &'a Interner,
    source: &'a str,
    fragments: FxHashMap<String, &'a FragmentDefinition>,
    variable_types: FxHashMap<String, (TypeRef, bool)>,
    variables: FxHashMap<String, Value>,
    used_variables: FxHashSet<String>,
    used_fragments: FxHashSet<String>,
    spread_stack: Vec<String>,
    depth: usize,
    diagnostics: DiagnosticBag,
}

impl<'a> Planner<'a> {
    fn new(
        schema: &'a Schema,
        interner: &'a Interner,
        source: &'a str,
        document: &'a Document,
    ) -> Self {
        let mut fragments = FxHashMap::default();
        for fragment in document.fragments() {
            fragments
                .entry(interner.get(fragment.name.value))
                .or_insert(fragment);
        }
        Self {
            schema,
            interner,
            source,
            fragments,
            variable_types: FxHashMap::default(),
            variables: FxHashMap::default(),
            used_variables: FxHashSet::default(),
            used_fragments: FxHashSet::default(),
            spread_stack: Vec::new(),
            depth: 0,
            diagnostics: DiagnosticBag::new(),
        }
    }

    fn text(&self, text: Text) -> String {
        self.interner.get(text)
    }

    fn error(&mut self, code: &'static str, span: Span, message: impl Into<String>) {
        self.diagnostics
            .error(code, "validation error", span, message);
    }

    fn location(&self, span: Span) -> Location {
        Location::from(span.line_col(self.source))
    }

    fn fail_on_errors(&self) -> Result<(), RequestError> {
        if self.diagnostics.has_errors() {
            Err(RequestError::Validation(located(
                &self.diagnostics,
                self.source,
            )))
        } else {
            Ok(())
        }
    }

    /// Document-level rules: unique names and a lone anonymous operation.
    fn validate_document(&mut self, document: &Document) {
        let operation_count = document.operations().count();
        let mut operation_names = FxHashSet::default();
        for operation in document.operations() {
            match operation.name {
                Some(name) => {
                    let text = self.text(name.value);
                    if !operation_names.insert(text.clone()) {
                        self.error(
                            codes::INVALID_SYNTAX,
                            name.span,
                            format!("There can be only one operation named \"{text}\"."),
                        );
                    }
                }
                None if operation_count > 1 => self.error(
                    codes::INVALID_SYNTAX,
                    operation.span,
                    "This anonymous operation must be the only defined operation.",
                ),
                None => {}
            }
        }

        let mut fragment_names = FxHashSet::default();
        for fragment in document.fragments() {
            let text = self.text(fragment.name.value);
            if !fragment_names.insert(text.clone()) {
                self.error(
                    codes::INVALID_SYNTAX,
                    fragment.name.span,
                    format!("There can be only one fragment named \"{text}\"."),
                );
            }
        }
    }

    fn root_type(&self, operation: &OperationDefinition) -> Result<String, RequestError> {
        let reject = |message: &str| {
            RequestError::Validation(vec![LocatedMessage {
                message: message.to_string(),
                locations: vec![self.location(operation.span)],
            }])
        };
        match operation.operation {
            OperationType::Query => Ok(self.schema.query_type.clone()),
            OperationType::Mutation => self
                .schema
                .mutation_type
                .clone()
                .ok_or_else(|| reject("Schema is not configured for mutations.")),
            OperationType::Subscription => Err(reject("Subscriptions are not supported.")),
        }
    }

    fn type_ref(&self, ty: &ast::Type) -> TypeRef {
        match ty {
            ast::Type::Named(name) => TypeRef::Named(self.text(name.value)),
            ast::Type::List(inner, _) => TypeRef::list(self.type_ref(inner)),
            ast::Type::NonNull(inner, _) => TypeRef::non_null(self.type_ref(inner)),
        }
    }

    fn define_variables(&mut self, operation: &OperationDefinition) {
        for def in &operation.variables {
            let name = self.text(def.name.value);
            let ty = self.type_ref(&def.ty);
            if self.variable_types.contains_key(&name) {
                self.error(
                    codes::INVALID_SYNTAX,
                    def.span,
                    format!("There can be only one variable named \"${name}\"."),
                );
                continue;
            }
            match self.schema.get_type(ty.named_type()) {
                None => {
                    let message = format!("Unknown type \"{}\".", ty.named_type());
                    self.error(codes::UNDEFINED_FIELD, def.ty.span(), message);
                }
                Some(type_def) if !type_def.is_input() => {
                    let message =
                        format!("Variable \"${name}\" cannot be non-input type \"{ty}\".");
                    self.error(codes::TYPE_MISMATCH, def.ty.span(), message);
                }
                Some(_) => {}
            }
            self.variable_types
                .insert(name, (ty, def.default_value.is_some()));
        }
    }

    fn coerce_variables(
        &mut self,
        operation: &'a OperationDefinition,
        provided: &Map<String, Value>,
    ) -> Result<(), RequestError> {
        for def in &operation.variables {
            let name = self.text(def.name.value);
            let Some((ty, _)) = self.variable_types.get(&name).cloned() else {
                continue;
            };
            match (provided.get(&name), &def.default_value) {
                (Some(value), _) => {
                    let coerced = coerce_json(value, &ty, self.schema).map_err(|e| {
                        RequestError::VariableCoercion(format!(
                            "Variable \"${name}\" got invalid value {value}; {e}"
                        ))
                    })?;
                    self.variables.insert(name, coerced);
                }
                (None, Some(default)) => match self.coerce_literal(default, &ty) {
                    Ok(Some(value)) => {
                        self.variables.insert(name, value);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let message = format!("Variable \"${name}\" has invalid default value: {e}");
                        self.error(codes::TYPE_MISMATCH, default.span(), message);
                    }
                },
                (None, None) if ty.is_non_null() => {
                    return Err(RequestError::VariableCoercion(format!(
                        "Variable \"${name}\" of required type \"{ty}\" was not provided."
                    )));
                }
                (None, None) => {}
            }
        }
        Ok(())
    }

    fn plan_operation(&mut self, root_type: &str, operation: &'a OperationDefinition) -> PlanNode {
        let nodes = self.plan_selection_sets(root_type, &[&operation.selection_set]);
        match operation.operation {
            // Mutation root fields run serially, in document order.
            OperationType::Mutation => PlanNode::Sequence(nodes),
            OperationType::Query | OperationType::Subscription => PlanNode::Parallel(nodes),
        }
    }

    fn check_unused(&mut self, operation: &OperationDefinition, document: &Document) {
        for def in &operation.variables {
            let name = self.text(def.name.value);
            if !self.used_variables.contains(&name) {
                let message = match operation.name {
                    Some(op) => format!(
                        "Variable \"${name}\" is never used in operation \"{}\".",
                        self.text(op.value)
                    ),
                    None => format!("Variable \"${name}\" is never used."),
                };
                self.error(codes::UNDEFINED_VARIABLE, def.span, message);
            }
        }
        // Fragments only reachable from other operations still count as used.
        if document.operations().count() > 1 {
            return;
        }
        for fragment in document.fragments() {
            let name = self.text(fragment.name.value);
            if !self.used_fragments.contains(&name) {
                self.error(
                    codes::UNDEFINED_FRAGMENT,
                    fragment.span,
                    format!("Fragment \"{name}\" is never used."),
                );
            }
        }
    }

    fn plan_selection_sets(
        &mut self,
        parent_type: &str,
        sets: &[&'a SelectionSet],
    ) -> Vec<PlanNode> {
        let mut grouped: IndexMap<String, Vec<&'a FieldSelection>> = IndexMap::new();
        for set in sets {
            self.collect_fields(parent_type, set, &mut grouped);
        }
        let mut nodes = Vec::with_capacity(grouped.len());
        for (key, fields) in grouped {
            if let Some(node) = self.plan_field(parent_type, key, &fields) {
                nodes.push(node);
            }
        }
        nodes
    }

    /// Flattens fragments and applies `@skip`/`@include`, grouping fields by
    /// response key.
    fn collect_fields(
        &mut self,
        parent_type: &str,
        set: &'a SelectionSet,
        out: &mut IndexMap<String, Vec<&'a FieldSelection>>,
    ) {
        for selection in &set.selections {
            match selection {
                Selection::Field(field) => {
                    if self.should_include(&field.directives) {
                        let key = self.text(field.response_key());
                        out.entry(key).or_default().push(field);
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if !self.should_include(&spread.directives) {
                        continue;
                    }
                    let name = self.text(spread.name.value);
                    let Some(fragment) = self.fragments.get(&name).copied() else {
                        self.error(
                            codes::UNDEFINED_FRAGMENT,
                            spread.name.span,
                            format!("Unknown fragment \"{name}\"."),
                        );
                        continue;
                    };
                    self.used_fragments.insert(name.clone());
                    if self.spread_stack.contains(&name) {
                        self.error(
                            codes::INVALID_SYNTAX,
                            spread.span,
                            format!("Cannot spread fragment \"{name}\" within itself."),
                        );
                        continue;
                    }
                    if self.spread_stack.len() >= MAX_DEPTH {
                        self.error(
                            codes::TOO_DEEP,
                            spread.span,
                            format!("Fragment spreads nest deeper than {MAX_DEPTH} levels."),
                        );
                        continue;
                    }
                    if !self.type_condition_applies(
                        parent_type,
                        fragment.type_condition,
                        Some(&name),
                        spread.span,
                    ) {
                        continue;
                    }
                    self.spread_stack.push(name);
                    self.collect_fields(parent_type, &fragment.selection_set, out);
                    self.spread_stack.pop();
                }
                Selection::InlineFragment(inline) => {
                    if !self.should_include(&inline.directives) {
                        continue;
                    }
                    if let Some(condition) = inline.type_condition {
                        if !self.type_condition_applies(parent_type, condition, None, inline.span) {
                            continue;
                        }
                    }
                    self.collect_fields(parent_type, &inline.selection_set, out);
                }
            }
        }
    }

    fn type_condition_applies(
        &mut self,
        parent_type: &str,
        condition: ast::Name,
        fragment: Option<&str>,
        span: Span,
    ) -> bool {
        let condition_name = self.text(condition.value);
        match self.schema.get_type(&condition_name) {
            None => {
                self.error(
                    codes::UNDEFINED_FIELD,
                    condition.span,
                    format!("Unknown type \"{condition_name}\"."),
                );
                return false;
            }
            Some(TypeDef::Object(_)) => {}
            Some(_) => {
                self.error(
                    codes::TYPE_MISMATCH,
                    condition.span,
                    format!("Fragment cannot condition on non composite type \"{condition_name}\"."),
                );
                return false;
            }
        }
        if condition_name == parent_type {
            return true;
        }
        let subject = match fragment {
            Some(name) => format!("Fragment \"{name}\""),
            None => "Fragment".to_string(),
        };
        self.error(
            codes::TYPE_MISMATCH,
            span,
            format!(
                "{subject} cannot be spread here as objects of type \"{parent_type}\" can never be of type \"{condition_name}\"."
            ),
        );
        false
    }

    fn should_include(&mut self, directives: &'a [ast::Directive]) -> bool {
        let mut include = true;
        for directive in directives {
            let name = self.text(directive.name.value);
            let skip = match name.as_str() {
                "skip" => true,
                "include" => false,
                _ => {
                    self.error(
                        codes::UNDEFINED_FIELD,
                        directive.name.span,
                        format!("Unknown directive \"@{name}\"."),
                    );
                    continue;
                }
            };
            let condition = directive
                .arguments
                .iter()
                .find(|arg| self.text(arg.name.value) == "if");
            let Some(condition) = condition else {
                self.error(
                    codes::MISSING_ARGUMENT,
                    directive.span,
                    format!(
                        "Directive \"@{name}\" argument \"if\" of type \"Boolean!\" is required, but it was not provided."
                    ),
                );
                continue;
            };
            let boolean = TypeRef::non_null(TypeRef::named("Boolean"));
            match self.coerce_literal(&condition.value, &boolean) {
                Ok(Some(Value::Bool(flag))) => {
                    if flag == skip {
                        include = false;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let message = format!("Argument \"if\" has invalid value: {e}");
                    self.error(codes::TYPE_MISMATCH, condition.value.span(), message);
                }
            }
        }
        include
    }

    fn plan_field(
        &mut self,
        parent_type: &str,
        key: String,
        fields: &[&'a FieldSelection],
    ) -> Option<PlanNode> {
        let (first, rest) = fields.split_first()?;
        let name = self.text(first.name.value);

        for other in rest {
            let other_name = self.text(other.name.value);
            if other_name != name {
                self.error(
                    codes::TYPE_MISMATCH,
                    other.span,
                    format!(
                        "Fields \"{key}\" conflict because \"{name}\" and \"{other_name}\" are different fields. Use different aliases on the fields to fetch both if this was intentional."
                    ),
                );
                return None;
            }
        }

        let alias = first.alias.map(|a| self.text(a.value));
        let location = Some(self.location(first.span));

        if name == "__typename" {
            let return_type = TypeRef::non_null(TypeRef::named("String"));
            if first.selection_set.is_some() {
                self.error(
                    codes::SELECTION_MISMATCH,
                    first.span,
                    format!("Field \"__typename\" must not have a selection since type \"{return_type}\" has no subfields."),
                );
                return None;
            }
            return Some(PlanNode::Leaf {
                field: FieldInfo {
                    name,
                    alias,
                    parent_type: parent_type.to_string(),
                    return_type,
                    arguments: Vec::new(),
                    is_introspection: true,
                    location,
                },
            });
        }

        let schema = self.schema;
        let Some(def) = schema.field(parent_type, &name) else {
            self.error(
                codes::UNDEFINED_FIELD,
                first.name.span,
                format!("Cannot query field \"{name}\" on type \"{parent_type}\"."),
            );
            return None;
        };

        let arguments = self.coerce_arguments(parent_type, def, first)?;
        for other in rest {
            let other_arguments = self.coerce_arguments(parent_type, def, other)?;
            if other_arguments != arguments {
                self.error(
                    codes::TYPE_MISMATCH,
                    other.span,
                    format!(
                        "Fields \"{key}\" conflict because they have differing arguments. Use different aliases on the fields to fetch both if this was intentional."
                    ),
                );
                return None;
            }
        }

        let info = FieldInfo {
            name: name.clone(),
            alias,
            parent_type: parent_type.to_string(),
            return_type: def.ty.clone(),
            arguments,
            is_introspection: false,
            location,
        };

        let named = def.ty.named_type();
        if let Some(TypeDef::Object(_)) = schema.get_type(named) {
            let sets: Vec<&'a SelectionSet> = fields
                .iter()
                .filter_map(|f| f.selection_set.as_ref())
                .collect();
            if sets.is_empty() {
                self.error(
                    codes::SELECTION_MISMATCH,
                    first.span,
                    format!(
                        "Field \"{name}\" of type \"{}\" must have a selection of subfields. Did you mean \"{name} {{ ... }}\"?",
                        def.ty
                    ),
                );
                return None;
            }
            // Fragments can stack selections past what the parser bounds.
            if self.depth >= MAX_DEPTH {
                self.error(
                    codes::TOO_DEEP,
                    first.span,
                    format!("Query is nested deeper than {MAX_DEPTH} levels."),
                );
                return None;
            }
            self.depth += 1;
            let children = self.plan_selection_sets(named, &sets);
            self.depth -= 1;
            return Some(PlanNode::Field {
                info,
                response_name: key,
                children: Box::new(PlanNode::Parallel(children)),
            });
        }

        if first.selection_set.is_some() {
            self.error(
                codes::SELECTION_MISMATCH,
                first.span,
                format!(
                    "Field \"{name}\" must not have a selection since type \"{}\" has no subfields.",
                    def.ty
                ),
            );
            return None;
        }
        Some(PlanNode::Leaf { field: info })
    }

    /// Coerces a field's arguments, filling defaults. Output follows the
    /// field's argument definition order.
    fn coerce_arguments(
        &mut self,
        parent_type: &str,
        def: &'a FieldDef,
        field: &'a FieldSelection,
    ) -> Option<Vec<(String, Value)>> {
        let mut ok = true;
        let mut seen = FxHashSet::default();
        for arg in &field.arguments {
            let arg_name = self.text(arg.name.value);
            if !def.arguments.contains_key(&arg_name) {
                self.error(
                    codes::UNKNOWN_ARGUMENT,
                    arg.name.span,
                    format!(
                        "Unknown argument \"{arg_name}\" on field \"{parent_type}.{}\".",
                        def.name
                    ),
                );
                ok = false;
            } else if !seen.insert(arg_name.clone()) {
                self.error(
                    codes::UNKNOWN_ARGUMENT,
                    arg.name.span,
                    format!("There can be only one argument named \"{arg_name}\"."),
                );
                ok = false;
            }
        }

        let mut out = Vec::with_capacity(def.arguments.len());
        for (arg_name, arg_def) in &def.arguments {
            let provided = field
                .arguments
                .iter()
                .find(|arg| self.text(arg.name.value) == *arg_name);

            let value = match provided {
                Some(arg) => match self.coerce_literal(&arg.value, &arg_def.ty) {
                    Ok(value) => value,
                    Err(e) => {
                        let message = format!("Argument \"{arg_name}\" has invalid value: {e}");
                        self.error(codes::TYPE_MISMATCH, arg.value.span(), message);
                        ok = false;
                        continue;
                    }
                },
                None => None,
            };

            match value.or_else(|| arg_def.default_value.clone()) {
                Some(value) => out.push((arg_name.clone(), value)),
                None if arg_def.ty.is_non_null() => {
                    self.error(
                        codes::MISSING_ARGUMENT,
                        field.span,
                        format!(
                            "Field \"{}\" argument \"{arg_name}\" of type \"{}\" is required, but it was not provided.",
                            def.name, arg_def.ty
                        ),
                    );
                    ok = false;
                }
                None => {}
            }
        }

        ok.then_some(out)
    }

    /// Coerces a literal against an input type. `Ok(None)` means a variable
    /// that was neither provided nor defaulted.
    fn coerce_literal(
        &mut self,
        value: &ast::Value,
        ty: &TypeRef,
    ) -> Result<Option<Value>, String> {
        if let ast::Value::Variable(name) = value {
            let var = self.text(name.value);
            self.used_variables.insert(var.clone());
            let Some((var_ty, has_default)) = self.variable_types.get(&var) else {
                return Err(format!("Variable \"${var}\" is not defined."));
            };
            let position = if *has_default { ty.nullable() } else { ty };
            if !type_fits(var_ty, position) {
                return Err(format!(
                    "Variable \"${var}\" of type \"{var_ty}\" used in position expecting type \"{ty}\"."
                ));
            }
            return Ok(self.variables.get(&var).cloned());
        }

        let is_null = matches!(value, ast::Value::Null(_));
        match ty {
            TypeRef::NonNull(inner) => {
                if is_null {
                    return Err(format!("Expected value of type \"{ty}\", found null."));
                }
                self.coerce_literal(value, inner)
            }
            _ if is_null => Ok(Some(Value::Null)),
            TypeRef::List(item) => match value {
                ast::Value::List(items, _) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item_value in items {
                        out.push(self.coerce_literal(item_value, item)?.unwrap_or(Value::Null));
                    }
                    Ok(Some(Value::Array(out)))
                }
                single => {
                    let coerced = self.coerce_literal(single, item)?.unwrap_or(Value::Null);
                    Ok(Some(Value::Array(vec![coerced])))
                }
            },
            TypeRef::Named(type_name) => {
                let schema = self.schema;
                match schema.get_type(type_name) {
                    Some(TypeDef::Scalar(_)) => {
                        coerce_scalar_literal(type_name, value, self.interner).map(Some)
                    }
                    Some(TypeDef::InputObject(def)) => {
                        let ast::Value::Object(fields, _) = value else {
                            return Err(format!(
                                "Expected value of type \"{type_name}\", found {}.",
                                print_literal(value, self.interner)
                            ));
                        };
                        let mut out = Map::new();
                        for (field_name, field_value) in fields {
                            let field_name = self.text(field_name.value);
                            let Some(field_def) = def.fields.get(&field_name) else {
                                return Err(format!(
                                    "Field \"{field_name}\" is not defined by type \"{type_name}\"."
                                ));
                            };
                            let coerced = self.coerce_literal(field_value, &field_def.ty)?;
                            if let Some(coerced) = coerced {
                                out.insert(field_name, coerced);
                            }
                        }
                        fill_input_defaults(type_name, def, &mut out)?;
                        Ok(Some(Value::Object(out)))
                    }
                    _ => Err(format!("Unknown input type \"{type_name}\".")),
                }
            }
        }
    }
}

fn fill_input_defaults(
    type_name: &str,
    def: &crate::schema::InputObjectDef,
    out: &mut Map<String, Value>,
) -> Result<(), String> {
    for (name, field) in &def.fields {
        if out.contains_key(name) {
            continue;
        }
        if let Some(default) = &field.default_value {
            out.insert(name.clone(), default.clone());
        } else if field.ty.is_non_null() {
            return Err(format!(
                "Field \"{type_name}.{name}\" of required type \"{}\" was not provided.",
                field.ty
            ));
        }
    }
    Ok(())
}

/// Whether a variable of type `var` may be used where `position` is expected.
fn type_fits(var: &TypeRef, position: &TypeRef) -> bool {
    match (var, position) {
        (TypeRef::NonNull(v), TypeRef::NonNull(p)) => type_fits(v, p),
        (_, TypeRef::NonNull(_)) => false,
        (TypeRef::NonNull(v), p) => type_fits(v, p),
        (TypeRef::List(v), TypeRef::List(p)) => type_fits(v, p),
        (TypeRef::Named(v), TypeRef::Named(p)) => v == p,
        _ => false,
    }
}

fn coerce_scalar_literal(
    scalar: &str,
    value: &ast::Value,
    interner: &Interner,
) -> Result<Value, String> {
    match (scalar, value) {
        ("Int", ast::Value::Int(i, _)) => i32::try_from(*i)
            .map(Value::from)
            .map_err(|_| format!("Int cannot represent non 32-bit signed integer value: {i}")),
        ("Float", ast::Value::Int(i, _)) => Ok(Value::from(*i)),
        ("Float", ast::Value::Float(f, _)) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| format!("Float cannot represent non numeric value: {f}")),
        ("String" | "ID", ast::Value::String(s, _)) => Ok(Value::String(s.clone())),
        ("ID", ast::Value::Int(i, _)) => Ok(Value::String(i.to_string())),
        ("Boolean", ast::Value::Boolean(b, _)) => Ok(Value::Bool(*b)),
        ("Int", other) => Err(format!(
            "Int cannot represent non-integer value: {}",
            print_literal(other, interner)
        )),
        (_, other) => Err(format!(
            "{scalar} cannot represent value: {}",
            print_literal(other, interner)
        )),
    }
}

/// Coerces a JSON variable value against an input type.
fn coerce_json(value: &Value, ty: &TypeRef, schema: &Schema) -> Result<Value, String> {
    match ty {
        TypeRef::NonNull(inner) => {
            if value.is_null() {
                return Err(format!("Expected non-nullable type \"{ty}\" not to be null."));
            }
            coerce_json(value, inner, schema)
        }
        _ if value.is_null() => Ok(Value::Null),
        TypeRef::List(item) => match value {
            Value::Array(items) => items
                .iter()
                .map(|v| coerce_json(v, item, schema))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![coerce_json(single, item, schema)?])),
        },
        TypeRef::Named(type_name) => match schema.get_type(type_name) {
            Some(TypeDef::Scalar(_)) => coerce_scalar_json(type_name, value),
            Some(TypeDef::InputObject(def)) => {
                let Value::Object(map) = value else {
                    return Err(format!("Expected type \"{type_name}\" to be an object."));
                };
                if let Some(unknown) = map.keys().find(|k| !def.fields.contains_key(*k)) {
                    return Err(format!(
                        "Field \"{unknown}\" is not defined by type \"{type_name}\"."
                    ));
                }
                let mut out = Map::new();
                for (name, field) in &def.fields {
                    if let Some(v) = map.get(name) {
                        let coerced = coerce_json(v, &field.ty, schema)
                            .map_err(|e| format!("At \"{name}\": {e}"))?;
                        out.insert(name.clone(), coerced);
                    }
                }
                fill_input_defaults(type_name, def, &mut out)?;
                Ok(Value::Object(out))
            }
            _ => Err(format!("Unknown input type \"{type_name}\".")),
        },
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_scalar_json(scalar: &str, value: &Value) -> Result<Value, String> {
    match (scalar, value) {
        ("Int", Value::Number(n)) => {
            let integral = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64));
            match integral {
                Some(i) if i32::try_from(i).is_ok() => Ok(Value::from(i)),
                Some(_) => Err(format!(
                    "Int cannot represent non 32-bit signed integer value: {value}"
                )),
                None => Err(format!("Int cannot represent non-integer value: {value}")),
            }
        }
        ("Float", Value::Number(_))
        | ("String" | "ID", Value::String(_))
        | ("Boolean", Value::Bool(_)) => Ok(value.clone()),
        ("ID", Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
        ("Int", _) => Err(format!("Int cannot represent non-integer value: {value}")),
        ("Float", _) => Err(format!("Float cannot represent non numeric value: {value}")),
        ("String", _) => Err(format!("String cannot represent a non string value: {value}")),
        ("Boolean", _) => Err(format!("Boolean cannot represent a non boolean value: {value}")),
        _ => Err(format!("{scalar} cannot represent value: {value}")),
    }
}

/// Prints a literal back in GraphQL syntax.
fn print_literal(value: &ast::Value, interner: &Interner) -> String {
    match value {
        ast::Value::Variable(name) => format!("${}", interner.get(name.value)),
        ast::Value::Int(i, _) => i.to_string(),
        ast::Value::Float(f, _) => f.to_string(),
        ast::Value::String(s, _) => Value::String(s.clone()).to_string(),
        ast::Value::Boolean(b, _) => b.to_string(),
        ast::Value::Null(_) => "null".to_string(),
        ast::Value::Enum(name) => interner.get(name.value),
        ast::Value::List(items, _) => {
            let items: Vec<_> = items.iter().map(|v| print_literal(v, interner)).collect();
            format!("[{}]", items.join(", "))
        }
        ast::Value::Object(fields, _) => {
            let fields: Vec<_> = fields
                .iter()
                .map(|(name, v)| {
                    format!("{}: {}", interner.get(name.value), print_literal(v, interner))
                })
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
    }
}
