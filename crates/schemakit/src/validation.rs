//! Reusable validation rules
//!
//! Each constructor returns a [`ValidateFn`] suitable for
//! [`Attribute::with_validate`](crate::Attribute::with_validate).

use crate::schema::ValidateFn;
use crate::value::Value;
use regex::Regex;
use std::sync::Arc;

/// String length (in characters) within `[min, max]`
pub fn string_len_between(min: usize, max: usize) -> ValidateFn {
    Arc::new(move |value, key| {
        let s = expect_str(value, key)?;
        let len = s.chars().count();
        if len < min || len > max {
            return Err(format!(
                "expected length of {key} to be in the range ({min} - {max}), got {s}"
            ));
        }
        Ok(())
    })
}

/// Integer within `[min, max]`
pub fn int_between(min: i64, max: i64) -> ValidateFn {
    Arc::new(move |value, key| {
        let Some(i) = value.as_int() else {
            return Err(format!("expected type of {key} to be int"));
        };
        if i < min || i > max {
            return Err(format!("expected {key} to be in the range ({min} - {max}), got {i}"));
        }
        Ok(())
    })
}

/// Float within `[min, max]`
pub fn float_between(min: f64, max: f64) -> ValidateFn {
    Arc::new(move |value, key| {
        let Some(f) = value.as_float() else {
            return Err(format!("expected type of {key} to be float"));
        };
        if f < min || f > max {
            return Err(format!("expected {key} to be in the range ({min} - {max}), got {f}"));
        }
        Ok(())
    })
}

/// String is one of `valid`
pub fn string_in_slice(valid: &[&str], ignore_case: bool) -> ValidateFn {
    let valid: Vec<String> = valid.iter().map(ToString::to_string).collect();
    Arc::new(move |value, key| {
        let s = expect_str(value, key)?;
        let found = valid.iter().any(|v| {
            if ignore_case {
                v.eq_ignore_ascii_case(s)
            } else {
                v == s
            }
        });
        if found {
            Ok(())
        } else {
            Err(format!("expected {key} to be one of {valid:?}, got {s}"))
        }
    })
}

/// String matches `pattern`; `message` replaces the default error text
pub fn string_matches(pattern: Regex, message: Option<String>) -> ValidateFn {
    Arc::new(move |value, key| {
        let s = expect_str(value, key)?;
        if pattern.is_match(s) {
            return Ok(());
        }
        Err(match &message {
            Some(m) => format!("invalid value for {key} ({m})"),
            None => format!("invalid value for {key} (should match {pattern})"),
        })
    })
}

/// Rejects the zero value of whatever type the attribute has
pub fn no_zero_values() -> ValidateFn {
    Arc::new(|value, key| {
        if value.is_zero() {
            Err(format!("{key} must not be empty or zero"))
        } else {
            Ok(())
        }
    })
}

/// Every rule must pass; stops at the first failure
pub fn all(rules: Vec<ValidateFn>) -> ValidateFn {
    Arc::new(move |value, key| rules.iter().try_for_each(|rule| rule(value, key)))
}

fn expect_str<'a>(value: &'a Value, key: &str) -> Result<&'a str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected type of {key} to be string"))
}
