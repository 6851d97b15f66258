// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instance decoder built from nom combinators
//!
//! Turns the text of one `#id=TYPE(...);` instance into a [`DecodedEntity`].
//! Strings keep their STEP escaping so that values can be written back
//! byte for byte.

use ifc_slice_model::{AttributeValue, DecodedEntity, EntityId, IfcType, ParseError};
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{char, digit0, digit1, multispace0, one_of},
    combinator::{map_res, opt, recognize, value},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0},
    sequence::{delimited, preceded},
    IResult, Parser,
};

type Res<'a, T> = IResult<&'a str, T>;

/// Attribute value borrowed from the instance text
#[derive(Clone, Debug, PartialEq)]
pub enum Token<'a> {
    /// `#123`
    EntityRef(u64),
    /// Body of `'...'`, escapes untouched
    String(&'a str),
    Integer(i64),
    Float(f64),
    /// `.NAME.` other than `.T.` and `.F.`
    Enum(&'a str),
    Bool(bool),
    List(Vec<Token<'a>>),
    /// `IFCLABEL('x')` and similar wrapped selects
    TypedValue(&'a str, Vec<Token<'a>>),
    /// `$`
    Null,
    /// `*`
    Derived,
}

impl From<&Token<'_>> for AttributeValue {
    fn from(token: &Token<'_>) -> Self {
        match token {
            Token::EntityRef(id) => AttributeValue::EntityRef(EntityId(*id)),
            Token::String(s) => AttributeValue::String((*s).to_owned()),
            Token::Integer(i) => AttributeValue::Integer(*i),
            Token::Float(f) => AttributeValue::Float(*f),
            Token::Enum(name) => AttributeValue::Enum((*name).to_owned()),
            Token::Bool(b) => AttributeValue::Bool(*b),
            Token::List(items) => AttributeValue::List(items.iter().map(Self::from).collect()),
            Token::TypedValue(name, args) => AttributeValue::TypedValue(
                (*name).to_owned(),
                args.iter().map(Self::from).collect(),
            ),
            Token::Null => AttributeValue::Null,
            Token::Derived => AttributeValue::Derived,
        }
    }
}

/// `inner` with optional whitespace on both sides
fn padded<'a, P>(inner: P) -> impl Parser<&'a str, Output = P::Output, Error = Error<&'a str>>
where
    P: Parser<&'a str, Error = Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn keyword(input: &str) -> Res<'_, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_').parse(input)
}

fn instance_id(input: &str) -> Res<'_, u64> {
    preceded(char('#'), map_res(digit1, |digits: &str| digits.parse::<u64>())).parse(input)
}

/// Quoted string; `''` stays part of the body
fn string(input: &str) -> Res<'_, &str> {
    delimited(
        char('\''),
        recognize(many0(alt((is_not("'"), tag("''"))))),
        char('\''),
    )
    .parse(input)
}

fn enumeration(input: &str) -> Res<'_, Token<'_>> {
    delimited(char('.'), keyword, char('.'))
        .map(|name| match name {
            "T" => Token::Bool(true),
            "F" => Token::Bool(false),
            other => Token::Enum(other),
        })
        .parse(input)
}

/// Integer, or real when a fraction or exponent is present (`1.`, `1.E-10`)
fn number(input: &str) -> Res<'_, Token<'_>> {
    let (rest, text) = recognize((
        opt(one_of("+-")),
        digit1,
        opt((char('.'), digit0)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)?;

    let malformed = |kind| nom::Err::Error(Error::new(input, kind));
    let token = if text.contains(['.', 'e', 'E']) {
        Token::Float(lexical_core::parse(text.as_bytes()).map_err(|_| malformed(ErrorKind::Float))?)
    } else {
        Token::Integer(lexical_core::parse(text.as_bytes()).map_err(|_| malformed(ErrorKind::Digit))?)
    };
    Ok((rest, token))
}

/// Parenthesised, comma separated values
fn arguments(input: &str) -> Res<'_, Vec<Token<'_>>> {
    delimited(
        padded(char('(')),
        separated_list0(padded(char(',')), token),
        padded(char(')')),
    )
    .parse(input)
}

fn token(input: &str) -> Res<'_, Token<'_>> {
    alt((
        instance_id.map(Token::EntityRef),
        string.map(Token::String),
        value(Token::Null, char('$')),
        value(Token::Derived, char('*')),
        enumeration,
        number,
        arguments.map(Token::List),
        (keyword, arguments).map(|(name, args)| Token::TypedValue(name, args)),
    ))
    .parse(input)
}

/// First characters of `text`, for error messages
fn excerpt(text: &str) -> String {
    text.chars().take(32).collect()
}

/// Decode `#123=IFCWALL(...);`
pub fn parse_entity(text: &str) -> Result<DecodedEntity, ParseError> {
    let text = text.trim_start();
    let (rest, (id, type_name)) = (instance_id, padded(char('=')), keyword)
        .map(|(id, _, name)| (EntityId(id), name))
        .parse(text)
        .map_err(|_| ParseError::format(format!("malformed instance `{}`", excerpt(text))))?;

    let (_, tokens) = preceded(multispace0, arguments)
        .parse(rest)
        .map_err(|err| {
            let detail = match err {
                nom::Err::Error(e) | nom::Err::Failure(e) => {
                    format!("unexpected input at `{}`", excerpt(e.input))
                }
                nom::Err::Incomplete(_) => "attribute list is truncated".to_owned(),
            };
            ParseError::entity_parse(id, detail)
        })?;

    Ok(DecodedEntity {
        id,
        ifc_type: IfcType::parse(type_name),
        attributes: tokens.iter().map(AttributeValue::from).collect(),
    })
}

/// Decode the instance stored at `content[start..end]`
pub fn parse_entity_at(content: &str, start: usize, end: usize) -> Result<DecodedEntity, ParseError> {
    parse_entity(&content[start..end])
}
