//! Defines the Abstract Syntax Tree (AST) for parsed URI query options.

/// A query expression produced by the $filter, $orderby, or $search parsers.
///
/// Identifiers and literals are carried through unresolved; binding them
/// against a schema is the caller's job.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
    Literal(LiteralValue),
    /// A member access path, e.g. `Address/City`.
    Path(Vec<String>),
    FunctionCall {
        name: String,
        args: Vec<QueryExpr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<QueryExpr>,
        right: Box<QueryExpr>,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<QueryExpr>,
    },
    /// A single word or quoted phrase inside a $search expression.
    SearchTerm(String),
    /// An explicitly parenthesized sub-expression.
    Group(Box<QueryExpr>),
}

impl QueryExpr {
    /// Checks if the expression is a `Literal` variant.
    pub fn is_literal(&self) -> bool {
        matches!(self, QueryExpr::Literal(_))
    }

    /// Checks if the expression is a `Binary` variant.
    pub fn is_binary_op(&self) -> bool {
        matches!(self, QueryExpr::Binary { .. })
    }
}

/// A binary operator used in a query expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Logical
    Or,
    And,
    // Equality
    Equals,
    NotEquals,
    // Relational
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Has,
    // Additive
    Add,
    Subtract,
    // Multiplicative
    Multiply,
    Divide,
    Modulo,
}

/// A unary operator used in a query expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

/// A typed literal value appearing in a $filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
}

/// One `expression [asc|desc]` clause of a $orderby option.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: QueryExpr,
    pub direction: OrderByDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderByDirection {
    Ascending,
    Descending,
}

/// One slash-separated component of an expand/select path: a navigation
/// property name with an optional type-cast qualifier (`NS.Type/Nav`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub identifier: String,
    pub type_cast: Option<String>,
}

impl PathSegment {
    pub fn new(identifier: impl Into<String>) -> Self {
        PathSegment {
            identifier: identifier.into(),
            type_cast: None,
        }
    }
}

/// The value of a $levels option: a finite depth or the `max` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelsValue {
    /// Expand to the maximum depth supported (`$levels=max`).
    Max,
    Depth(u64),
}

/// One navigation term of a $expand or $select list, together with all of
/// its parsed nested options. Optional fields stay `None` when the option
/// was not specified.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandTerm {
    pub path: Vec<PathSegment>,
    pub filter: Option<QueryExpr>,
    pub order_by: Option<Vec<OrderByItem>>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub count: Option<bool>,
    pub levels: Option<LevelsValue>,
    pub search: Option<QueryExpr>,
    pub select: Option<Vec<ExpandTerm>>,
    pub expand: Option<Vec<ExpandTerm>>,
}

impl ExpandTerm {
    /// Creates a term with only its path set.
    pub fn new(path: Vec<PathSegment>) -> Self {
        ExpandTerm {
            path,
            filter: None,
            order_by: None,
            top: None,
            skip: None,
            count: None,
            levels: None,
            search: None,
            select: None,
            expand: None,
        }
    }

    /// The identifier of the last path segment, used in diagnostics.
    pub fn last_identifier(&self) -> &str {
        self.path.last().map(|s| s.identifier.as_str()).unwrap_or("")
    }

    /// Checks whether any nested option was specified for this term.
    pub fn has_options(&self) -> bool {
        self.filter.is_some()
            || self.order_by.is_some()
            || self.top.is_some()
            || self.skip.is_some()
            || self.count.is_some()
            || self.levels.is_some()
            || self.search.is_some()
            || self.select.is_some()
            || self.expand.is_some()
    }
}
