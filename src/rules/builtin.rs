//! Built-in rules: `required`, `min`, `max`, `len`, `oneof`, `pattern`.
//!
//! Every rule except `required` passes on an absent `Option` and checks the
//! inner value of a present one.

use regex::Regex;

use super::Rule;
use crate::error::Violation;
use crate::record::{FieldDescriptor, FieldValue};

/// Rejects empty collections, `None`, and zero scalars.
#[derive(Debug, Clone, Default)]
pub struct Required;

impl Rule for Required {
    fn name(&self) -> &str {
        "required"
    }

    fn validate(&self, field: &FieldDescriptor<'_>) -> Result<(), Violation> {
        if field.value.is_zero() {
            Err(Violation::MissingRequiredValue)
        } else {
            Ok(())
        }
    }
}

/// Inclusive lower bound for numeric fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Min {
    pub min: f64,
}

impl Rule for Min {
    fn name(&self) -> &str {
        "min"
    }

    fn validate(&self, field: &FieldDescriptor<'_>) -> Result<(), Violation> {
        let Some(value) = field.value.present() else {
            return Ok(());
        };
        let v = numeric(self.name(), value)?;
        if v < self.min {
            return Err(Violation::BelowMinimum {
                value: v,
                min: self.min,
            });
        }
        Ok(())
    }
}

/// Inclusive upper bound for numeric fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Max {
    pub max: f64,
}

impl Rule for Max {
    fn name(&self) -> &str {
        "max"
    }

    fn validate(&self, field: &FieldDescriptor<'_>) -> Result<(), Violation> {
        let Some(value) = field.value.present() else {
            return Ok(());
        };
        let v = numeric(self.name(), value)?;
        if v > self.max {
            return Err(Violation::AboveMaximum {
                value: v,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Exact length of a text (in chars), sequence or mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Len {
    pub length: usize,
}

impl Rule for Len {
    fn name(&self) -> &str {
        "len"
    }

    fn validate(&self, field: &FieldDescriptor<'_>) -> Result<(), Violation> {
        let Some(value) = field.value.present() else {
            return Ok(());
        };
        let actual = value
            .len()
            .ok_or_else(|| Violation::unsupported(self.name(), value.kind()))?;
        if actual != self.length {
            return Err(Violation::LengthMismatch {
                actual,
                expected: self.length,
            });
        }
        Ok(())
    }
}

/// Text must equal one of the listed options.
#[derive(Debug, Clone, PartialEq)]
pub struct OneOf {
    pub options: Vec<String>,
}

impl Rule for OneOf {
    fn name(&self) -> &str {
        "oneof"
    }

    fn validate(&self, field: &FieldDescriptor<'_>) -> Result<(), Violation> {
        let Some(value) = field.value.present() else {
            return Ok(());
        };
        let s = text(self.name(), value)?;
        if self.options.iter().any(|o| o == s) {
            Ok(())
        } else {
            Err(Violation::NotInAllowedSet {
                value: s.to_string(),
                options: self.options.clone(),
            })
        }
    }
}

/// Text must match the regular expression in full.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The pattern as written in the tag.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Rule for Pattern {
    fn name(&self) -> &str {
        "pattern"
    }

    fn validate(&self, field: &FieldDescriptor<'_>) -> Result<(), Violation> {
        let Some(value) = field.value.present() else {
            return Ok(());
        };
        let s = text(self.name(), value)?;
        if self.regex.is_match(s) {
            Ok(())
        } else {
            Err(Violation::PatternMismatch {
                value: s.to_string(),
                pattern: self.source.clone(),
            })
        }
    }
}

fn numeric(rule: &str, value: &FieldValue<'_>) -> Result<f64, Violation> {
    value
        .as_f64()
        .ok_or_else(|| Violation::unsupported(rule, value.kind()))
}

fn text<'v>(rule: &str, value: &FieldValue<'v>) -> Result<&'v str, Violation> {
    value
        .as_str()
        .ok_or_else(|| Violation::unsupported(rule, value.kind()))
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

pub(crate) fn required(_param: &str) -> Result<Box<dyn Rule>, Violation> {
    Ok(Box::new(Required))
}

pub(crate) fn min(param: &str) -> Result<Box<dyn Rule>, Violation> {
    Ok(Box::new(Min {
        min: parse_bound("min", param)?,
    }))
}

pub(crate) fn max(param: &str) -> Result<Box<dyn Rule>, Violation> {
    Ok(Box::new(Max {
        max: parse_bound("max", param)?,
    }))
}

pub(crate) fn len(param: &str) -> Result<Box<dyn Rule>, Violation> {
    let length = param
        .trim()
        .parse::<usize>()
        .map_err(|e| Violation::invalid_parameter("len", param, e))?;
    Ok(Box::new(Len { length }))
}

pub(crate) fn oneof(param: &str) -> Result<Box<dyn Rule>, Violation> {
    if param.is_empty() {
        return Err(Violation::invalid_parameter(
            "oneof",
            param,
            "at least one option must be specified",
        ));
    }
    Ok(Box::new(OneOf {
        options: param.split('|').map(str::to_string).collect(),
    }))
}

pub(crate) fn pattern(param: &str) -> Result<Box<dyn Rule>, Violation> {
    let rule = Pattern::new(param).map_err(|e| Violation::invalid_parameter("pattern", param, e))?;
    Ok(Box::new(rule))
}

fn parse_bound(rule: &str, param: &str) -> Result<f64, Violation> {
    let bound = param
        .trim()
        .parse::<f64>()
        .map_err(|e| Violation::invalid_parameter(rule, param, e))?;
    if bound.is_nan() {
        return Err(Violation::invalid_parameter(rule, param, "bound is NaN"));
    }
    Ok(bound)
}
