//! Reads the textual schema descriptions the array engine returns for `show(array)`.
//!
//! Accepted are the bare `<attributes> [dimensions]` notation as well as the raw `show` output,
//! i.e. an optional `schema` column header, quotes and a leading array name. Dimensions may use
//! the current `name=low:high:overlap:chunk` notation (separated by `;`) or the legacy
//! `name=low:high,chunk,overlap` notation (separated by `,`).

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use std::str::FromStr;

use super::{ArraySchema, Attribute, AttributeType, DimensionDescriptor, MIN_COORDINATE};
use crate::error::Error;
use crate::util::Result;

pub type PestError = pest::error::Error<Rule>;

#[derive(Parser)]
#[grammar = "engine/schema.pest"] // relative to src
struct SchemaGrammar;

/// Parses a schema description, failing with `SchemaParse` carrying the raw text.
pub fn parse_schema(text: &str) -> Result<ArraySchema> {
    let parse_error = |reason: String| Error::SchemaParse {
        raw: text.to_string(),
        reason,
    };

    let schema = SchemaGrammar::parse(Rule::schema, text.trim())
        .map_err(|e: PestError| parse_error(e.variant.message().into_owned()))?
        .next()
        .ok_or_else(|| parse_error("empty input".to_string()))?;

    let mut attributes = Vec::new();
    let mut dimensions = Vec::new();

    for pair in schema.into_inner() {
        match pair.as_rule() {
            Rule::attributes => {
                for attribute in pair.into_inner() {
                    attributes.push(attribute_from_pair(attribute).map_err(&parse_error)?);
                }
            }
            Rule::dimensions => {
                let notation = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| parse_error("missing dimensions".to_string()))?;
                for dimension in notation.into_inner() {
                    dimensions.push(dimension_from_pair(dimension).map_err(&parse_error)?);
                }
            }
            _ => (), // header, array name, end of input
        }
    }

    Ok(ArraySchema::new(attributes, dimensions))
}

fn attribute_from_pair(pair: Pair<'_, Rule>) -> Result<Attribute, String> {
    let mut name = None;
    let mut attribute_type = None;
    let mut nullable = true;

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::identifier => name = Some(part.as_str().to_string()),
            Rule::type_name => {
                attribute_type = Some(
                    AttributeType::from_str(part.as_str())
                        .map_err(|_| format!("unknown attribute type `{}`", part.as_str()))?,
                );
            }
            Rule::not_null => nullable = false,
            _ => (),
        }
    }

    match (name, attribute_type) {
        (Some(name), Some(attribute_type)) => Ok(Attribute {
            name,
            attribute_type,
            nullable,
        }),
        _ => Err("incomplete attribute".to_string()),
    }
}

fn dimension_from_pair(pair: Pair<'_, Rule>) -> Result<DimensionDescriptor, String> {
    let mut dimension = DimensionDescriptor::new("", 0, None, 0, None);

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::identifier => part.as_str().clone_into(&mut dimension.name),
            Rule::low => dimension.low = bound(part)?.unwrap_or(MIN_COORDINATE),
            Rule::high => dimension.high = bound(part)?,
            Rule::overlap => dimension.overlap = bound(part)?.unwrap_or(0),
            Rule::chunk => dimension.chunk_length = bound(part)?,
            _ => (),
        }
    }

    if let Some(high) = dimension.high {
        if high < dimension.low {
            return Err(format!(
                "dimension `{}` has an inverted range {}:{}",
                dimension.name, dimension.low, high
            ));
        }
    }

    Ok(dimension)
}

/// `None` for the `*` and `?` placeholders.
fn bound(pair: Pair<'_, Rule>) -> Result<Option<i64>, String> {
    let value = pair
        .into_inner()
        .next()
        .and_then(|bound| bound.into_inner().next())
        .ok_or_else(|| "missing bound".to_string())?;

    match value.as_rule() {
        Rule::integer => value
            .as_str()
            .parse()
            .map(Some)
            .map_err(|e| format!("invalid bound `{}`: {e}", value.as_str())),
        _ => Ok(None),
    }
}
