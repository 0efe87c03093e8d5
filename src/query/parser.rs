//! Select-expression parser
//!
//! Parses the compact select syntax into requested columns:
//!
//! ```sql
//! select cpu
//! select cpu, diskio
//! select max(cpu), min(cpu)
//! select max(*), min(cpu)
//! select max(cpu) as peak
//! ```
//!
//! Grammar (keywords are case-insensitive):
//!
//! ```text
//! select ::= "select" target ("," target)* ["as" ident]
//! target ::= ident | ident "(" ("*" | ident) ")"
//! ```
//!
//! Only the column and alias fields of the query come from the text; the
//! time range, step, group-by list and label filter are structured fields on
//! [`SelectParams`]. Anything after the select list (for example a trailing
//! `where` clause owned by the label index) is returned unparsed as the
//! remainder.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::opt,
    multi::separated_list1,
    sequence::delimited,
    IResult, Parser,
};

use crate::error::{QueryError, Result};
use crate::query::aggregate::AggregateKind;
use crate::query::select::{ColumnTarget, RequestedColumn, SelectParams};

/// Parse a select expression into a structured query plus the unconsumed
/// remainder of the input
///
/// The returned [`SelectParams`] has only its column and alias fields filled
/// in; the caller supplies the time range and the other structured fields
/// before execution.
pub fn parse_query(expr: &str) -> Result<(SelectParams, String)> {
    let (remainder, (targets, alias)) = parse_select(expr).map_err(|e| match e {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            QueryError::parse(first_token(e.input), "malformed select expression")
        }
        nom::Err::Incomplete(_) => QueryError::parse(expr.trim(), "incomplete select expression"),
    })?;

    let mut columns = Vec::with_capacity(targets.len());
    for target in targets {
        columns.push(build_column(target)?);
    }
    columns.dedup();

    let aggregated = columns.iter().filter(|c| c.function.is_some()).count();
    if aggregated > 0 && aggregated < columns.len() {
        let bare = columns
            .iter()
            .find(|c| c.function.is_none())
            .and_then(|c| match &c.target {
                ColumnTarget::Metric(name) => Some(name.clone()),
                ColumnTarget::Wildcard => None,
            })
            .unwrap_or_default();
        return Err(QueryError::parse(
            bare,
            "cannot mix raw and aggregated targets in one select list",
        ));
    }

    // alias misuse that is visible in the text is rejected here; the
    // single-series condition is re-checked once the result count is known
    if let Some(alias) = alias {
        let wildcard = columns
            .iter()
            .any(|c| matches!(c.target, ColumnTarget::Wildcard));
        if columns.len() > 1 || wildcard {
            return Err(QueryError::Resolution(format!(
                "alias '{}' requires a query producing exactly one output series",
                alias
            )));
        }
    }

    let params = SelectParams {
        alias: alias.map(str::to_string),
        columns,
        ..Default::default()
    };
    Ok((params, remainder.trim().to_string()))
}

/// One target as written in the expression, before semantic validation
struct ParsedTarget<'a> {
    name: &'a str,
    arg: Option<&'a str>,
}

fn build_column(target: ParsedTarget<'_>) -> Result<RequestedColumn> {
    match target.arg {
        None => Ok(RequestedColumn {
            function: None,
            target: ColumnTarget::Metric(target.name.to_string()),
        }),
        Some(arg) => {
            let function = AggregateKind::parse(target.name)
                .ok_or_else(|| QueryError::parse(target.name, "unknown aggregate function"))?;
            let target = if arg == "*" {
                ColumnTarget::Wildcard
            } else {
                ColumnTarget::Metric(arg.to_string())
            };
            Ok(RequestedColumn {
                function: Some(function),
                target,
            })
        }
    }
}

fn first_token(input: &str) -> &str {
    let trimmed = input.trim_start();
    trimmed
        .split_whitespace()
        .next()
        .unwrap_or(trimmed)
}

// ============================================================================
// nom combinators
// ============================================================================

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '.' || c == '-').parse(input)
}

fn parse_target(input: &str) -> IResult<&str, ParsedTarget<'_>> {
    let (input, name) = identifier(input)?;
    let (input, arg) = opt(delimited(
        (multispace0, char('('), multispace0),
        alt((tag("*"), identifier)),
        (multispace0, char(')')),
    ))
    .parse(input)?;
    Ok((input, ParsedTarget { name, arg }))
}

fn parse_select(input: &str) -> IResult<&str, (Vec<ParsedTarget<'_>>, Option<&str>)> {
    let (input, _) = multispace0(input)?;
    let (input, _) = tag_no_case("select").parse(input)?;
    let (input, _) = multispace1(input)?;
    let (input, targets) =
        separated_list1((multispace0, char(','), multispace0), parse_target).parse(input)?;
    let (input, alias) = opt(nom::sequence::preceded(
        (multispace1, tag_no_case("as"), multispace1),
        identifier,
    ))
    .parse(input)?;
    Ok((input, (targets, alias)))
}
