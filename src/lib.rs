//! Parsers for the query options of OData-style request URIs.
//!
//! Each option's raw text (the substring after `$expand=`, `$filter=`,
//! etc.) is parsed into a typed syntax tree for a downstream binder to
//! resolve against a schema. Parsing is a pure function of the input text
//! and a [`ParserConfig`]; nested $expand depth is bounded by an explicit
//! recursion budget rather than by the call stack.

pub mod ast;
pub mod error;
pub mod expand;
pub mod expression;
pub mod lexer;
pub mod search;
pub mod select_expand;

pub use ast::{
    BinaryOperator, ExpandTerm, LevelsValue, LiteralValue, OrderByDirection, OrderByItem,
    PathSegment, QueryExpr, UnaryOperator,
};
pub use error::UriParseError;
pub use expand::{parse_count, parse_levels, parse_skip, parse_top};
pub use expression::{parse_filter, parse_order_by};
pub use search::parse_search;
pub use select_expand::{ParserConfig, RecursionBudget, SelectExpandParser, parse_expand, parse_select};
