//! Parser for the option list that can follow the path part of a $expand
//! or $select term.
//!
//! Delegates to other parsing code as needed: a nested $filter fires up the
//! expression parser, a nested $expand recurses into a fresh
//! [`SelectExpandParser`](crate::select_expand::SelectExpandParser) with a
//! decremented budget. Those parsers never know they were invoked from a
//! nested position.

use crate::ast::{ExpandTerm, LevelsValue, PathSegment};
use crate::error::UriParseError;
use crate::expression;
use crate::lexer::{OptionLexer, TokenKind};
use crate::search;
use crate::select_expand::{RecursionBudget, SelectExpandParser};

/// The nested query options recognized inside a term's parentheses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionKind {
    Filter,
    OrderBy,
    Top,
    Skip,
    Count,
    Levels,
    Search,
    Select,
    Expand,
}

/// The fixed keyword table. Immutable; dispatch is an exhaustive match on
/// [`OptionKind`].
const QUERY_OPTIONS: &[(&str, OptionKind)] = &[
    ("filter", OptionKind::Filter),
    ("orderby", OptionKind::OrderBy),
    ("top", OptionKind::Top),
    ("skip", OptionKind::Skip),
    ("count", OptionKind::Count),
    ("levels", OptionKind::Levels),
    ("search", OptionKind::Search),
    ("select", OptionKind::Select),
    ("expand", OptionKind::Expand),
];

/// Looks up an option keyword. A leading `$` is accepted and stripped;
/// comparison is case-insensitive only when the flag is set.
fn lookup_option(raw: &str, case_insensitive: bool) -> Option<OptionKind> {
    let name = raw.strip_prefix('$').unwrap_or(raw);
    QUERY_OPTIONS
        .iter()
        .find(|(kw, _)| {
            if case_insensitive {
                kw.eq_ignore_ascii_case(name)
            } else {
                *kw == name
            }
        })
        .map(|(_, kind)| *kind)
}

/// Builds one [`ExpandTerm`] from a parsed path and the raw text of its
/// parenthesized option list.
pub(crate) struct ExpandOptionParser {
    budget: RecursionBudget,
    case_insensitive: bool,
}

impl ExpandOptionParser {
    pub(crate) fn new(budget: RecursionBudget, case_insensitive: bool) -> Self {
        ExpandOptionParser {
            budget,
            case_insensitive,
        }
    }

    /// Parses `options_text` (the term's `(...)` block, parentheses
    /// included) and assembles the fully populated term. `None` or text
    /// without a leading `(` yields a term with only the path set.
    ///
    /// Re-specifying a keyword within one list is not rejected; the last
    /// occurrence wins.
    pub(crate) fn build_term(
        &self,
        path: Vec<PathSegment>,
        options_text: Option<&str>,
    ) -> Result<ExpandTerm, UriParseError> {
        let mut term = ExpandTerm::new(path);
        let Some(text) = options_text else {
            return Ok(term);
        };

        let mut lexer = OptionLexer::new(text)?;
        if lexer.current().kind == TokenKind::OpenParen {
            lexer.advance()?;

            // (), which is never valid.
            if lexer.current().kind == TokenKind::CloseParen {
                return Err(UriParseError::MissingOption(
                    term.last_identifier().to_string(),
                ));
            }

            while lexer.current().kind != TokenKind::CloseParen {
                let raw = lexer.current().text;
                let Some(kind) = lookup_option(raw, self.case_insensitive) else {
                    return Err(UriParseError::UnrecognizedOption(raw.to_string()));
                };

                // advance to the equal sign
                lexer.advance()?;
                if lexer.current().kind != TokenKind::Equal {
                    return Err(UriParseError::MalformedOption(
                        text.to_string(),
                        format!("expected '=' after '{raw}'"),
                    ));
                }
                let value = lexer.advance_through_balanced_value()?;

                match kind {
                    OptionKind::Filter => {
                        term.filter =
                            Some(expression::parse_filter(value, self.budget.filter)?);
                    }
                    OptionKind::OrderBy => {
                        term.order_by =
                            Some(expression::parse_order_by(value, self.budget.order_by)?);
                    }
                    OptionKind::Top => {
                        term.top = Some(parse_top(value)?);
                    }
                    OptionKind::Skip => {
                        term.skip = Some(parse_skip(value)?);
                    }
                    OptionKind::Count => {
                        term.count = Some(parse_count(value)?);
                    }
                    OptionKind::Levels => {
                        term.levels = Some(parse_levels(value, self.case_insensitive)?);
                    }
                    OptionKind::Search => {
                        term.search = Some(search::parse_search(value, self.budget.search)?);
                    }
                    OptionKind::Select => {
                        // Selection does not consume an expand nesting level.
                        let parser =
                            SelectExpandParser::new(value, self.budget, self.case_insensitive);
                        term.select = Some(parser.parse_select()?);
                    }
                    OptionKind::Expand => {
                        let Some(budget) = self.budget.enter_expand() else {
                            return Err(UriParseError::RecursionLimitExceeded(
                                term.last_identifier().to_string(),
                            ));
                        };
                        let parser =
                            SelectExpandParser::new(value, budget, self.case_insensitive);
                        term.expand = Some(parser.parse_expand()?);
                    }
                }

                match lexer.current().kind {
                    TokenKind::Semicolon => lexer.advance()?,
                    TokenKind::CloseParen => {}
                    _ => {
                        return Err(UriParseError::MalformedOption(
                            text.to_string(),
                            "option list is not terminated by ')'".to_string(),
                        ));
                    }
                }
            }

            // Move past the ')'.
            lexer.advance()?;
        }

        // Either there was no '(' at all or we just read past the ')', so
        // the option text must be exhausted.
        if lexer.current().kind != TokenKind::End {
            return Err(UriParseError::MalformedOption(
                text.to_string(),
                format!("unexpected trailing text '{}'", lexer.current().text),
            ));
        }

        Ok(term)
    }
}

// --- Scalar option values ---

fn non_negative_integer(option: &'static str, text: &str) -> Result<u64, UriParseError> {
    match text.parse::<i64>() {
        Ok(n) if n >= 0 => Ok(n as u64),
        Ok(_) => Err(UriParseError::InvalidOptionValue(
            option,
            text.to_string(),
            "value must not be negative".to_string(),
        )),
        Err(_) => Err(UriParseError::InvalidOptionValue(
            option,
            text.to_string(),
            "value is not a valid integer".to_string(),
        )),
    }
}

/// Parses the value of a $top option.
pub fn parse_top(text: &str) -> Result<u64, UriParseError> {
    non_negative_integer("top", text)
}

/// Parses the value of a $skip option.
pub fn parse_skip(text: &str) -> Result<u64, UriParseError> {
    non_negative_integer("skip", text)
}

/// Parses the value of a $count option. Only the exact keywords `true` and
/// `false` are accepted, regardless of the case-insensitivity flag.
pub fn parse_count(text: &str) -> Result<bool, UriParseError> {
    match text {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(UriParseError::InvalidOptionValue(
            "count",
            text.to_string(),
            "value must be 'true' or 'false'".to_string(),
        )),
    }
}

/// Parses the value of a $levels option: `max` (case rule per flag) maps
/// to the unbounded sentinel, otherwise a non-negative integer.
pub fn parse_levels(text: &str, case_insensitive: bool) -> Result<LevelsValue, UriParseError> {
    let is_max = if case_insensitive {
        text.eq_ignore_ascii_case("max")
    } else {
        text == "max"
    };
    if is_max {
        return Ok(LevelsValue::Max);
    }
    match text.parse::<i64>() {
        Ok(n) if n >= 0 => Ok(LevelsValue::Depth(n as u64)),
        Ok(_) => Err(UriParseError::InvalidOptionValue(
            "levels",
            text.to_string(),
            "value must not be negative".to_string(),
        )),
        Err(_) => Err(UriParseError::InvalidOptionValue(
            "levels",
            text.to_string(),
            "value must be 'max' or a non-negative integer".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOperator, LiteralValue, QueryExpr};

    fn build(path: &str, options: Option<&str>) -> Result<ExpandTerm, UriParseError> {
        build_with_budget(path, options, RecursionBudget::new(8, 8, 8, 8))
    }

    fn build_with_budget(
        path: &str,
        options: Option<&str>,
        budget: RecursionBudget,
    ) -> Result<ExpandTerm, UriParseError> {
        ExpandOptionParser::new(budget, false)
            .build_term(vec![PathSegment::new(path)], options)
    }

    #[test]
    fn test_term_without_options() {
        let term = build("Orders", None).unwrap();
        assert_eq!(term.last_identifier(), "Orders");
        assert!(!term.has_options());
    }

    #[test]
    fn test_empty_parens_fail_naming_the_term() {
        let result = build("Orders", Some("()"));
        assert_eq!(
            result,
            Err(UriParseError::MissingOption("Orders".to_string()))
        );
    }

    #[test]
    fn test_filter_and_top_in_one_list() {
        let term = build("Orders", Some("($filter=Amount gt 10;$top=5)")).unwrap();
        assert_eq!(term.top, Some(5));
        assert_eq!(
            term.filter,
            Some(QueryExpr::Binary {
                op: BinaryOperator::GreaterThan,
                left: Box::new(QueryExpr::Path(vec!["Amount".to_string()])),
                right: Box::new(QueryExpr::Literal(LiteralValue::Integer(10))),
            })
        );
    }

    #[test]
    fn test_unrecognized_option_references_the_text() {
        let result = build("Orders", Some("($bogus=1)"));
        assert_eq!(
            result,
            Err(UriParseError::UnrecognizedOption("$bogus".to_string()))
        );
    }

    #[test]
    fn test_keyword_without_dollar_prefix() {
        let term = build("Orders", Some("(top=3)")).unwrap();
        assert_eq!(term.top, Some(3));
    }

    #[test]
    fn test_case_insensitive_keywords_only_with_flag() {
        let budget = RecursionBudget::new(8, 8, 8, 8);
        let result = ExpandOptionParser::new(budget, false)
            .build_term(vec![PathSegment::new("Orders")], Some("($TOP=3)"));
        assert!(matches!(result, Err(UriParseError::UnrecognizedOption(_))));

        let term = ExpandOptionParser::new(budget, true)
            .build_term(vec![PathSegment::new("Orders")], Some("($TOP=3)"))
            .unwrap();
        assert_eq!(term.top, Some(3));
    }

    #[test]
    fn test_missing_equal_sign_is_malformed() {
        let result = build("Orders", Some("($top 5)"));
        assert!(matches!(result, Err(UriParseError::MalformedOption(_, _))));
    }

    #[test]
    fn test_trailing_text_after_close_paren_is_malformed() {
        let result = build("Orders", Some("($top=5)x"));
        assert!(matches!(result, Err(UriParseError::MalformedOption(_, _))));
    }

    #[test]
    fn test_duplicate_keyword_last_occurrence_wins() {
        let term = build("Orders", Some("($top=1;$top=2)")).unwrap();
        assert_eq!(term.top, Some(2));
    }

    #[test]
    fn test_count_and_levels_values() {
        let term = build("Orders", Some("($count=true;$levels=max)")).unwrap();
        assert_eq!(term.count, Some(true));
        assert_eq!(term.levels, Some(LevelsValue::Max));

        let term = build("Orders", Some("($count=false;$levels=3)")).unwrap();
        assert_eq!(term.count, Some(false));
        assert_eq!(term.levels, Some(LevelsValue::Depth(3)));
    }

    #[test]
    fn test_invalid_scalar_values() {
        assert!(matches!(
            build("Orders", Some("($top=-1)")),
            Err(UriParseError::InvalidOptionValue("top", _, _))
        ));
        assert!(matches!(
            build("Orders", Some("($top=abc)")),
            Err(UriParseError::InvalidOptionValue("top", _, _))
        ));
        assert!(matches!(
            build("Orders", Some("($count=yes)")),
            Err(UriParseError::InvalidOptionValue("count", _, _))
        ));
        assert!(matches!(
            build("Orders", Some("($levels=-1)")),
            Err(UriParseError::InvalidOptionValue("levels", _, _))
        ));
    }

    #[test]
    fn test_count_value_is_case_sensitive_even_with_flag() {
        let budget = RecursionBudget::new(8, 8, 8, 8);
        let result = ExpandOptionParser::new(budget, true)
            .build_term(vec![PathSegment::new("Orders")], Some("($count=True)"));
        assert!(matches!(
            result,
            Err(UriParseError::InvalidOptionValue("count", _, _))
        ));
    }

    #[test]
    fn test_search_and_orderby_options() {
        let term = build("Orders", Some("($search=red bike;$orderby=Amount desc)")).unwrap();
        assert!(term.search.is_some());
        let order_by = term.order_by.unwrap();
        assert_eq!(order_by.len(), 1);
    }

    #[test]
    fn test_nested_expand_consumes_budget() {
        let result = build_with_budget(
            "A",
            Some("($expand=B($expand=C))"),
            RecursionBudget::new(1, 8, 8, 8),
        );
        assert_eq!(
            result,
            Err(UriParseError::RecursionLimitExceeded("B".to_string()))
        );

        let term = build_with_budget(
            "A",
            Some("($expand=B($expand=C))"),
            RecursionBudget::new(2, 8, 8, 8),
        )
        .unwrap();
        let nested = term.expand.unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].last_identifier(), "B");
        let inner = nested[0].expand.as_ref().unwrap();
        assert_eq!(inner[0].last_identifier(), "C");
    }

    #[test]
    fn test_nested_select_does_not_consume_budget() {
        let term = build_with_budget(
            "A",
            Some("($select=B($select=C))"),
            RecursionBudget::new(0, 8, 8, 8),
        )
        .unwrap();
        let select = term.select.unwrap();
        assert_eq!(select[0].last_identifier(), "B");
    }

    #[test]
    fn test_semicolon_inside_string_does_not_split_the_value() {
        let term = build("A", Some("($expand=B($filter=x eq 'a;b'))")).unwrap();
        let nested = term.expand.unwrap();
        assert_eq!(
            nested[0].filter,
            Some(QueryExpr::Binary {
                op: BinaryOperator::Equals,
                left: Box::new(QueryExpr::Path(vec!["x".to_string()])),
                right: Box::new(QueryExpr::Literal(LiteralValue::String("a;b".into()))),
            })
        );
    }

    #[test]
    fn test_scalar_value_parsers() {
        assert_eq!(parse_top("42").unwrap(), 42);
        assert_eq!(parse_skip("0").unwrap(), 0);
        assert!(parse_skip("-3").is_err());
        assert_eq!(parse_count("true").unwrap(), true);
        assert_eq!(parse_levels("max", false).unwrap(), LevelsValue::Max);
        assert_eq!(parse_levels("MAX", true).unwrap(), LevelsValue::Max);
        assert!(parse_levels("MAX", false).is_err());
        assert_eq!(parse_levels("2", false).unwrap(), LevelsValue::Depth(2));
    }
}
