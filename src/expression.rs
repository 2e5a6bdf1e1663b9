//! A `nom`-based parser for $filter and $orderby expressions.
//!
//! The grammar is the common expression language of the query protocol:
//! word-bounded lowercase operators with the usual precedence, typed
//! literals, function calls, and slash-separated member paths. A depth
//! budget is threaded by value into every nested descent so adversarial
//! nesting fails deterministically instead of exhausting the call stack.

use crate::ast::{
    BinaryOperator, LiteralValue, OrderByDirection, OrderByItem, QueryExpr, UnaryOperator,
};
use crate::error::UriParseError;
use crate::lexer::skip_quoted;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, peek, recognize},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair},
};

// --- Main Public Parsers ---

/// Parses a $filter expression with the given maximum nesting depth.
pub fn parse_filter(input: &str, max_depth: u32) -> Result<QueryExpr, UriParseError> {
    match ws(|i| or_expr(i, max_depth)).parse(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(UriParseError::ExpressionParse(
            input.to_string(),
            format!("unparsed input remaining: '{rem}'"),
        )),
        Err(e) => Err(convert_error(input, e)),
    }
}

/// Parses a $orderby option: comma-separated expressions, each with an
/// optional trailing `asc` or `desc` (ascending by default).
pub fn parse_order_by(input: &str, max_depth: u32) -> Result<Vec<OrderByItem>, UriParseError> {
    let result = separated_list1(ws(char(',')), |i| order_by_item(i, max_depth))
        .parse(input.trim());
    match result {
        Ok(("", items)) => Ok(items),
        Ok((rem, _)) => Err(UriParseError::ExpressionParse(
            input.to_string(),
            format!("unparsed input remaining: '{rem}'"),
        )),
        Err(e) => Err(convert_error(input, e)),
    }
}

fn convert_error(input: &str, e: nom::Err<nom::error::Error<&str>>) -> UriParseError {
    match e {
        nom::Err::Failure(inner) if inner.code == nom::error::ErrorKind::TooLarge => {
            UriParseError::ExpressionTooDeep(input.to_string())
        }
        other => UriParseError::ExpressionParse(input.to_string(), other.to_string()),
    }
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

/// Consumes one alphanumeric word (an identifier or operator keyword).
fn word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_').parse(input)
}

/// Matches exactly the given word, with a word boundary after it.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input| {
        let (rest, w) = word(input)?;
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

/// Decrements the depth budget for one further nested descent, failing
/// hard (no backtracking) once it is exhausted.
fn enter<'a>(depth: u32, input: &'a str) -> Result<u32, nom::Err<nom::error::Error<&'a str>>> {
    depth.checked_sub(1).ok_or_else(|| {
        nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        ))
    })
}

fn binary_op<'a>(
    ops: &'static [(&'static str, BinaryOperator)],
) -> impl FnMut(&'a str) -> IResult<&'a str, BinaryOperator> {
    move |input| {
        let (rest, w) = ws(word).parse(input)?;
        match ops.iter().find(|(kw, _)| *kw == w) {
            Some((_, op)) => Ok((rest, *op)),
            None => Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            ))),
        }
    }
}

/// Parses a left-associative chain of `sub (op sub)*`.
fn binary_chain<'a>(
    input: &'a str,
    depth: u32,
    sub: fn(&'a str, u32) -> IResult<&'a str, QueryExpr>,
    ops: &'static [(&'static str, BinaryOperator)],
) -> IResult<&'a str, QueryExpr> {
    let (input, first) = sub(input, depth)?;
    let (input, rest) = many0(pair(binary_op(ops), |i| sub(i, depth))).parse(input)?;
    Ok((
        input,
        rest.into_iter().fold(first, |left, (op, right)| QueryExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }),
    ))
}

// --- Precedence Levels (lowest to highest) ---

fn or_expr(input: &str, depth: u32) -> IResult<&str, QueryExpr> {
    binary_chain(input, depth, and_expr, &[("or", BinaryOperator::Or)])
}

fn and_expr(input: &str, depth: u32) -> IResult<&str, QueryExpr> {
    binary_chain(input, depth, comparison_expr, &[("and", BinaryOperator::And)])
}

fn comparison_expr(input: &str, depth: u32) -> IResult<&str, QueryExpr> {
    binary_chain(
        input,
        depth,
        additive_expr,
        &[
            ("eq", BinaryOperator::Equals),
            ("ne", BinaryOperator::NotEquals),
            ("gt", BinaryOperator::GreaterThan),
            ("ge", BinaryOperator::GreaterThanOrEqual),
            ("lt", BinaryOperator::LessThan),
            ("le", BinaryOperator::LessThanOrEqual),
            ("has", BinaryOperator::Has),
        ],
    )
}

fn additive_expr(input: &str, depth: u32) -> IResult<&str, QueryExpr> {
    binary_chain(
        input,
        depth,
        multiplicative_expr,
        &[
            ("add", BinaryOperator::Add),
            ("sub", BinaryOperator::Subtract),
        ],
    )
}

fn multiplicative_expr(input: &str, depth: u32) -> IResult<&str, QueryExpr> {
    binary_chain(
        input,
        depth,
        unary_expr,
        &[
            ("mul", BinaryOperator::Multiply),
            ("div", BinaryOperator::Divide),
            ("mod", BinaryOperator::Modulo),
        ],
    )
}

fn unary_expr(input: &str, depth: u32) -> IResult<&str, QueryExpr> {
    if let Ok((rest, _)) = ws(keyword("not")).parse(input) {
        let depth = enter(depth, input)?;
        let (rest, expr) = unary_expr(rest, depth)?;
        return Ok((
            rest,
            QueryExpr::Unary {
                op: UnaryOperator::Not,
                expr: Box::new(expr),
            },
        ));
    }
    let minus: IResult<&str, char> = ws(char('-')).parse(input);
    if let Ok((rest, _)) = minus {
        let depth = enter(depth, input)?;
        let (rest, expr) = unary_expr(rest, depth)?;
        return Ok((
            rest,
            QueryExpr::Unary {
                op: UnaryOperator::Minus,
                expr: Box::new(expr),
            },
        ));
    }
    primary(input, depth)
}

fn primary(input: &str, depth: u32) -> IResult<&str, QueryExpr> {
    ws(alt((
        |i| group(i, depth),
        literal,
        |i| function_call(i, depth),
        member_path,
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

// --- Literals ---

fn literal(input: &str) -> IResult<&str, QueryExpr> {
    map(literal_value, QueryExpr::Literal).parse(input)
}

fn literal_value(input: &str) -> IResult<&str, LiteralValue> {
    alt((
        map(keyword("null"), |_| LiteralValue::Null),
        map(keyword("true"), |_| LiteralValue::Boolean(true)),
        map(keyword("false"), |_| LiteralValue::Boolean(false)),
        number,
        quoted_string,
    ))
    .parse(input)
}

fn number(input: &str) -> IResult<&str, LiteralValue> {
    let (rest, text) = recognize(pair(
        take_while1(|c: char| c.is_ascii_digit()),
        opt(pair(char('.'), take_while1(|c: char| c.is_ascii_digit()))),
    ))
    .parse(input)?;
    let value = if text.contains('.') {
        match text.parse::<f64>() {
            Ok(v) => LiteralValue::Decimal(v),
            Err(_) => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Float,
                )));
            }
        }
    } else {
        // An integer that overflows i64 is rejected outright rather than
        // lossily re-typed as a float.
        match text.parse::<i64>() {
            Ok(n) => LiteralValue::Integer(n),
            Err(_) => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Digit,
                )));
            }
        }
    };
    Ok((rest, value))
}

/// A single-quoted string literal; an embedded quote is escaped by
/// doubling it.
fn quoted_string(input: &str) -> IResult<&str, LiteralValue> {
    if !input.starts_with('\'') {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )));
    }
    match skip_quoted(input, 0) {
        Ok(end) => {
            let inner = &input[1..end - 1];
            Ok((
                &input[end..],
                LiteralValue::String(inner.replace("''", "'")),
            ))
        }
        Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        ))),
    }
}

// --- Identifiers, Paths, Function Calls ---

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

/// An identifier or dotted name such as `geo.distance` or `NS.Type`.
fn qualified_name(input: &str) -> IResult<&str, &str> {
    recognize(separated_list1(char('.'), identifier)).parse(input)
}

fn function_call(input: &str, depth: u32) -> IResult<&str, QueryExpr> {
    // A function call must be a name followed by '('. The lookahead avoids
    // parsing a bare member path as a function.
    let (rest, name) = qualified_name(input)?;
    let (rest, _) = peek(ws(char('('))).parse(rest)?;

    let depth = enter(depth, input)?;
    let (rest, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), |i| or_expr(i, depth)),
        ws(char(')')),
    )
    .parse(rest)?;
    Ok((
        rest,
        QueryExpr::FunctionCall {
            name: name.to_string(),
            args,
        },
    ))
}

fn member_path(input: &str) -> IResult<&str, QueryExpr> {
    map(separated_list1(char('/'), qualified_name), |segments| {
        QueryExpr::Path(segments.into_iter().map(str::to_string).collect())
    })
    .parse(input)
}

fn order_by_item(input: &str, depth: u32) -> IResult<&str, OrderByItem> {
    let (input, expr) = or_expr(input, depth)?;
    let (input, direction) = opt(ws(alt((
        map(keyword("asc"), |_| OrderByDirection::Ascending),
        map(keyword("desc"), |_| OrderByDirection::Descending),
    ))))
    .parse(input)?;
    Ok((
        input,
        OrderByItem {
            expr,
            direction: direction.unwrap_or(OrderByDirection::Ascending),
        },
    ))
}
