//! Top-level parser for full $select and $expand option strings: a
//! comma-separated list of navigation paths, each optionally followed by a
//! parenthesized list of nested options.

use crate::ast::{ExpandTerm, PathSegment};
use crate::error::UriParseError;
use crate::expand::ExpandOptionParser;
use crate::lexer::skip_quoted;

/// Per-option-kind recursion ceilings, carried by value into every
/// recursive parser invocation. Each recursive call owns its own
/// decremented copy; there is no shared mutable counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursionBudget {
    /// Remaining $expand/$select nesting levels.
    pub expand: u32,
    /// Maximum depth for a $filter nested in $expand.
    pub filter: u32,
    /// Maximum depth for a $orderby nested in $expand.
    pub order_by: u32,
    /// Maximum depth for a $search nested in $expand.
    pub search: u32,
}

impl RecursionBudget {
    pub fn new(expand: u32, filter: u32, order_by: u32, search: u32) -> Self {
        RecursionBudget {
            expand,
            filter,
            order_by,
            search,
        }
    }

    /// The budget for one further $expand nesting level, or `None` when
    /// the ceiling has been reached.
    pub fn enter_expand(&self) -> Option<RecursionBudget> {
        Some(RecursionBudget {
            expand: self.expand.checked_sub(1)?,
            ..*self
        })
    }
}

/// Configuration for the top-level option parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    pub max_expand_depth: u32,
    pub max_filter_depth: u32,
    pub max_order_by_depth: u32,
    pub max_search_depth: u32,
    /// When set, option keywords (and the `levels` value `max`) are
    /// matched case-insensitively.
    pub case_insensitive_keywords: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            max_expand_depth: 8,
            max_filter_depth: 32,
            max_order_by_depth: 32,
            max_search_depth: 32,
            case_insensitive_keywords: false,
        }
    }
}

impl ParserConfig {
    fn budget(&self) -> RecursionBudget {
        RecursionBudget::new(
            self.max_expand_depth,
            self.max_filter_depth,
            self.max_order_by_depth,
            self.max_search_depth,
        )
    }
}

/// Parses a full $expand option string into an ordered term list.
pub fn parse_expand(text: &str, config: &ParserConfig) -> Result<Vec<ExpandTerm>, UriParseError> {
    SelectExpandParser::new(text, config.budget(), config.case_insensitive_keywords)
        .parse_expand()
}

/// Parses a full $select option string into an ordered term list.
pub fn parse_select(text: &str, config: &ParserConfig) -> Result<Vec<ExpandTerm>, UriParseError> {
    SelectExpandParser::new(text, config.budget(), config.case_insensitive_keywords)
        .parse_select()
}

/// Parser over the entirety of one $select or $expand string. Nested
/// occurrences construct fresh instances; the budget travels by value.
pub struct SelectExpandParser<'a> {
    text: &'a str,
    budget: RecursionBudget,
    case_insensitive: bool,
}

impl<'a> SelectExpandParser<'a> {
    pub fn new(text: &'a str, budget: RecursionBudget, case_insensitive: bool) -> Self {
        SelectExpandParser {
            text,
            budget,
            case_insensitive,
        }
    }

    /// Parses the string as a $expand term list. Empty input denotes an
    /// empty list; whether that is acceptable is the caller's policy.
    pub fn parse_expand(&self) -> Result<Vec<ExpandTerm>, UriParseError> {
        self.parse_terms()
    }

    /// Parses the string as a $select term list. Select terms share the
    /// expand term grammar; selection does not consume a nesting level.
    pub fn parse_select(&self) -> Result<Vec<ExpandTerm>, UriParseError> {
        self.parse_terms()
    }

    fn parse_terms(&self) -> Result<Vec<ExpandTerm>, UriParseError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let mut terms = Vec::new();
        for term_text in split_terms(text)? {
            let term_text = term_text.trim();
            if term_text.is_empty() {
                return Err(UriParseError::MalformedOption(
                    self.text.to_string(),
                    "empty term in list".to_string(),
                ));
            }

            // The path runs up to the term's option block, if any.
            let (path_text, options_text) = match term_text.find('(') {
                Some(open) => (&term_text[..open], Some(&term_text[open..])),
                None => (term_text, None),
            };
            let path = parse_path(path_text.trim(), self.text)?;

            let option_parser = ExpandOptionParser::new(self.budget, self.case_insensitive);
            terms.push(option_parser.build_term(path, options_text)?);
        }
        Ok(terms)
    }
}

/// Splits a term list on commas at parenthesis-nesting depth zero,
/// treating quoted spans as opaque.
fn split_terms(text: &str) -> Result<Vec<&str>, UriParseError> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                i = skip_quoted(text, i)?;
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    UriParseError::MalformedOption(
                        text.to_string(),
                        "unbalanced ')'".to_string(),
                    )
                })?;
            }
            b',' if depth == 0 => {
                out.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if depth != 0 {
        return Err(UriParseError::MalformedOption(
            text.to_string(),
            "unbalanced '('".to_string(),
        ));
    }
    out.push(&text[start..]);
    Ok(out)
}

/// Parses one slash-separated term path. A dotted component is a
/// type-cast qualifier attaching to the following component; a trailing
/// dotted component stands as its own segment.
fn parse_path(path_text: &str, full_text: &str) -> Result<Vec<PathSegment>, UriParseError> {
    if path_text.is_empty() {
        return Err(UriParseError::MalformedOption(
            full_text.to_string(),
            "term is missing a path".to_string(),
        ));
    }

    let mut segments = Vec::new();
    let mut pending_cast: Option<String> = None;
    for component in path_text.split('/') {
        let component = component.trim();
        if !is_valid_component(component) {
            return Err(UriParseError::MalformedOption(
                full_text.to_string(),
                format!("'{component}' is not a valid path segment"),
            ));
        }
        if component.contains('.') {
            if pending_cast.is_some() {
                return Err(UriParseError::MalformedOption(
                    full_text.to_string(),
                    format!("type cast '{component}' cannot follow another type cast"),
                ));
            }
            pending_cast = Some(component.to_string());
        } else {
            segments.push(PathSegment {
                identifier: component.to_string(),
                type_cast: pending_cast.take(),
            });
        }
    }
    if let Some(cast) = pending_cast {
        segments.push(PathSegment {
            identifier: cast,
            type_cast: None,
        });
    }
    Ok(segments)
}

/// A path component is `*`, an identifier, or a dotted identifier chain.
fn is_valid_component(component: &str) -> bool {
    if component == "*" {
        return true;
    }
    if component.is_empty() {
        return false;
    }
    component.split('.').all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}
