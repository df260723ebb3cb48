//! Text syntax for query expressions, used by the command line.
//!
//! ```text
//! split.account = {4b0e...} AND post_date >= 2024-01-01 OR NOT memo = 'rent'
//! ```
//!
//! `AND` binds tighter than `OR`, so the input is already in the OR-of-ANDs
//! shape a [`QueryExpression`] holds. Literals: `'text'`, `2024-01-31`,
//! `42`, `4.5`, `12.50n` (fixed-point), `true`/`false`, `{guid}`.

#![allow(clippy::redundant_closure_call)]

use std::str::FromStr;

use bookdb_core::{CompareOp, PredicateTerm, PredicateValue, QueryExpression};
use peg::{error::ParseError, str::LineCol};
use rust_decimal::Decimal;
use thiserror::Error;
use time::{Date, Month};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid filter: {0}")]
    Syntax(#[from] ParseError<LineCol>),
}

peg::parser! {
    grammar filter() for str {
        rule kw_and()       = ("AND" / "and")
        rule kw_or()        = ("OR" / "or")
        rule kw_not()       = ("NOT" / "not")
        rule kw_true()      = ("TRUE" / "true")
        rule kw_false()     = ("FALSE" / "false")

        rule __()
            = [' ' | '\n' | '\t']

        rule num()
            = ['0'..='9']

        rule hex()
            = ['0'..='9' | 'a'..='f' | 'A'..='F']

        rule ident() -> &'input str
            = $(['a'..='z' | 'A'..='Z' | '_'] ['a'..='z' | 'A'..='Z' | '0'..='9' | '_']*)

        // e.g. 'split.account'
        rule path() -> Vec<String>
            = p:(ident() ++ ".") { p.into_iter().map(str::to_string).collect() }

        rule op() -> CompareOp
            = "<=" { CompareOp::Le }
            / ">=" { CompareOp::Ge }
            / "!=" { CompareOp::Ne }
            / "<>" { CompareOp::Ne }
            / "<" { CompareOp::Lt }
            / ">" { CompareOp::Gt }
            / "=" { CompareOp::Eq }

        // e.g. '12.50n'
        rule numeric() -> Decimal
            = n:$("-"? num()+ ("." num()+)?) "n" {? Decimal::from_str(n).or(Err("invalid numeric")) }

        rule real() -> f64
            = r:$("-"? num()+ "." num()+) {? r.parse().or(Err("invalid real")) }

        rule integer() -> i64
            = i:$("-"? num()+) {? i.parse().or(Err("invalid integer")) }

        rule date() -> Date
            = year:$(num()*<4,4>) "-" month:$(num()*<2,2>) "-" day:$(num()*<2,2>) {?
                let year = year.parse::<i32>().or(Err("invalid year"))?;
                let month = month.parse::<u8>().or(Err("invalid month"))?;
                let day = day.parse::<u8>().or(Err("invalid day"))?;
                let month = Month::try_from(month).or(Err("invalid month"))?;
                Date::from_calendar_date(year, month, day).or(Err("invalid date"))
            }

        rule boolean() -> bool
            = kw_true() { true } / kw_false() { false }

        rule text() -> String
            = "'" t:$([^ '\'' | '\n' | '\r']*) "'" { t.to_string() }

        rule guid() -> Uuid
            = "{" g:$((hex() / "-")+) "}" {? Uuid::parse_str(g).or(Err("invalid guid")) }

        rule value() -> PredicateValue
            = n:numeric() { PredicateValue::Numeric(n) }
            / r:real() { PredicateValue::Double(r) }
            / d:date() { PredicateValue::date(d) }
            / i:integer() {
                i32::try_from(i).map(PredicateValue::Int32).unwrap_or(PredicateValue::Int64(i))
            }
            / b:boolean() { PredicateValue::Boolean(b) }
            / t:text() { PredicateValue::String(t) }
            / g:guid() { PredicateValue::Guid(g) }

        rule term() -> PredicateTerm
            = kw_not() __+ t:term() { t.negate() }
            / path:path() __* op:op() __* value:value() {
                PredicateTerm { path, op, negated: false, value }
            }

        rule group() -> Vec<PredicateTerm>
            = t:term() ++ (__+ kw_and() __+) { t }

        pub rule expression() -> QueryExpression
            = __* g:group() ++ (__+ kw_or() __+) __* { QueryExpression::from_groups(g) }
    }
}

/// Parse a filter. Blank input matches everything.
pub fn parse_filter(input: &str) -> Result<QueryExpression, FilterError> {
    if input.trim().is_empty() {
        return Ok(QueryExpression::match_all());
    }
    Ok(filter::expression(input)?)
}
