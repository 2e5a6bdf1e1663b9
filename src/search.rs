//! A `nom`-based parser for the $search boolean grammar.
//!
//! `OR` binds loosest, then `AND` (which may also be implicit between two
//! adjacent terms), then `NOT`, then grouping. The keywords are uppercase
//! and reserved; a bare search word may not spell one of them. Terms are
//! bare words or double-quoted phrases.

use crate::ast::{BinaryOperator, QueryExpr, UnaryOperator};
use crate::error::UriParseError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{map, opt},
    multi::many0,
    sequence::delimited,
};

/// Parses a $search expression with the given maximum nesting depth.
pub fn parse_search(input: &str, max_depth: u32) -> Result<QueryExpr, UriParseError> {
    match ws(|i| or_expr(i, max_depth)).parse(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(UriParseError::SearchParse(
            input.to_string(),
            format!("unparsed input remaining: '{rem}'"),
        )),
        Err(nom::Err::Failure(inner)) if inner.code == nom::error::ErrorKind::TooLarge => {
            Err(UriParseError::ExpressionTooDeep(input.to_string()))
        }
        Err(e) => Err(UriParseError::SearchParse(input.to_string(), e.to_string())),
    }
}

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn enter<'a>(depth: u32, input: &'a str) -> Result<u32, nom::Err<nom::error::Error<&'a str>>> {
    depth.checked_sub(1).ok_or_else(|| {
        nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        ))
    })
}

/// One unquoted search word: everything up to whitespace, parentheses, or
/// a quote. The uppercase connectives are not words.
fn search_word(input: &str) -> IResult<&str, &str> {
    let (rest, w) =
        take_while1(|c: char| !c.is_whitespace() && c != '(' && c != ')' && c != '"')
            .parse(input)?;
    if w == "AND" || w == "OR" || w == "NOT" {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    Ok((rest, w))
}

/// Matches exactly the given connective keyword. The whole word is
/// consumed before comparing, so a term like `NOTebook` is never split
/// into a connective and a remainder.
fn connective<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input| {
        let (rest, w) =
            take_while1(|c: char| !c.is_whitespace() && c != '(' && c != ')' && c != '"')
                .parse(input)?;
        if w == kw {
            Ok((rest, w))
        } else {
            Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )))
        }
    }
}

fn or_expr(input: &str, depth: u32) -> IResult<&str, QueryExpr> {
    let (input, first) = and_expr(input, depth)?;
    let (input, rest) = many0(|i| {
        let (i, _) = ws(connective("OR")).parse(i)?;
        and_expr(i, depth)
    })
    .parse(input)?;
    Ok((input, fold_binary(first, BinaryOperator::Or, rest)))
}

/// A sequence of NOT-terms joined by `AND` or by simple adjacency.
fn and_expr(input: &str, depth: u32) -> IResult<&str, QueryExpr> {
    let (input, first) = not_expr(input, depth)?;
    let (input, rest) = many0(|i| {
        let (i, _) = opt(ws(connective("AND"))).parse(i)?;
        not_expr(i, depth)
    })
    .parse(input)?;
    Ok((input, fold_binary(first, BinaryOperator::And, rest)))
}

fn fold_binary(first: QueryExpr, op: BinaryOperator, rest: Vec<QueryExpr>) -> QueryExpr {
    rest.into_iter().fold(first, |left, right| QueryExpr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn not_expr(input: &str, depth: u32) -> IResult<&str, QueryExpr> {
    if let Ok((rest, _)) = ws(connective("NOT")).parse(input) {
        let depth = enter(depth, input)?;
        let (rest, expr) = not_expr(rest, depth)?;
        return Ok((
            rest,
            QueryExpr::Unary {
                op: UnaryOperator::Not,
                expr: Box::new(expr),
            },
        ));
    }
    primary(input, depth)
}

fn primary(input: &str, depth: u32) -> IResult<&str, QueryExpr> {
    ws(alt((
        |i| group(i, depth),
        phrase,
        map(search_word, |w| QueryExpr::SearchTerm(w.to_string())),
    )))
    .parse(input)
}

fn group(input: &str, depth: u32) -> IResult<&str, QueryExpr> {
    let (rest, _) = char('(').parse(input)?;
    let depth = enter(depth, input)?;
    let (rest, expr) = or_expr(rest, depth)?;
    let (rest, _) = ws(char(')')).parse(rest)?;
    Ok((rest, QueryExpr::Group(Box::new(expr))))
}

/// A double-quoted search phrase. No escape sequences; a phrase simply
/// cannot contain a quote.
fn phrase(input: &str) -> IResult<&str, QueryExpr> {
    map(
        delimited(
            char('"'),
            take_while1(|c: char| c != '"'),
            char('"'),
        ),
        |p: &str| QueryExpr::SearchTerm(p.to_string()),
    )
    .parse(input)
}
