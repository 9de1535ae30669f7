/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Input validation for usernames, realnames, expiry policies and principals.
//!
//! Everything here runs before the datastore or the directory is touched.

use crate::models::ExpiryPolicy;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const USERNAME_PATTERN: &str = "^[a-z]+$";
pub const EXPIRY_PATTERN: &str = "^[0-9]+[dh]$";
pub const PRINCIPAL_PATTERN: &str = "^[a-zA-Z0-9-]+$";

/// Usernames that collide with admin addressing (`status all`).
const RESERVED_USERNAMES: &[&str] = &["all"];

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(USERNAME_PATTERN).unwrap());
static EXPIRY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(EXPIRY_PATTERN).unwrap());
static PRINCIPAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(PRINCIPAL_PATTERN).unwrap());
static REALNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r##"(?i)^(?:[-!#$%&'*+/=?^_`{}|~0-9A-Z]+(?:\.[-!#$%&'*+/=?^_`{}|~0-9A-Z]+)*|"(?:[\x01-\x08\x0b\x0c\x0e-\x1f!#-\[\]-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])*")@(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+[A-Z]{2,6}\.?$"##,
    )
    .unwrap()
});

/// Errors raised by input validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("username doesn't match pattern {}", USERNAME_PATTERN)]
    InvalidUsername(String),

    #[error("invalid realname.")]
    InvalidRealname(String),

    #[error("expiry doesn't match pattern {}", EXPIRY_PATTERN)]
    InvalidExpiry(String),

    #[error("principal doesn't match pattern {}", PRINCIPAL_PATTERN)]
    InvalidPrincipal(String),

    #[error("invalid filter.")]
    InvalidFilter(String),

    #[error("No {0} option given.")]
    MissingField(&'static str),

    #[error("password is empty.")]
    EmptyPassword,

    #[error("Public key unprocessable")]
    UnprocessableKey,
}

/// Validates a username, returning it unchanged.
pub fn validate_username(username: &str) -> Result<&str, ValidationError> {
    if !USERNAME_RE.is_match(username) || RESERVED_USERNAMES.contains(&username) {
        return Err(ValidationError::InvalidUsername(username.to_string()));
    }
    Ok(username)
}

/// Validates a realname and returns its lower-cased form used for storage and comparison.
pub fn validate_realname(realname: &str) -> Result<String, ValidationError> {
    if !REALNAME_RE.is_match(realname) {
        return Err(ValidationError::InvalidRealname(realname.to_string()));
    }
    Ok(realname.to_lowercase())
}

/// Validates an expiry string (`12h`, `30d`) and parses it into a policy.
/// Intervals that would push an expiration past the representable date range are rejected.
pub fn validate_expiry(expiry: &str) -> Result<ExpiryPolicy, ValidationError> {
    if !EXPIRY_RE.is_match(expiry) {
        return Err(ValidationError::InvalidExpiry(expiry.to_string()));
    }
    ExpiryPolicy::parse(expiry).ok_or_else(|| ValidationError::InvalidExpiry(expiry.to_string()))
}

/// Returns true if a single principal is well-formed.
pub fn is_valid_principal(principal: &str) -> bool {
    PRINCIPAL_RE.is_match(principal)
}

/// Validates a single principal.
pub fn validate_principal(principal: &str) -> Result<&str, ValidationError> {
    if !is_valid_principal(principal) {
        return Err(ValidationError::InvalidPrincipal(principal.to_string()));
    }
    Ok(principal)
}

/// Splits a comma-separated principal list and validates every entry.
///
/// An empty string is not a valid list: it splits into one empty principal.
pub fn parse_principal_list(value: &str) -> Result<Vec<String>, ValidationError> {
    value
        .split(',')
        .map(|p| validate_principal(p).map(str::to_string))
        .collect()
}

/// Parses a principal search filter. Unlike [`parse_principal_list`], the
/// empty filter is valid and matches every user.
pub fn parse_principal_filter(value: &str) -> Result<Vec<String>, ValidationError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(|p| {
            if is_valid_principal(p) {
                Ok(p.to_string())
            } else {
                Err(ValidationError::InvalidFilter(value.to_string()))
            }
        })
        .collect()
}
