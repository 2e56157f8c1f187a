//! Subject syntax and wildcard matching.
//!
//! Subjects are dot-separated tokens. Subscriptions may use `*` to match
//! exactly one token and `>` (last token only) to match one or more trailing
//! tokens. Published subjects must be literal.

use super::TransportError;

const SINGLE_WILDCARD: &str = "*";
const TAIL_WILDCARD: &str = ">";

/// Validate a subscription pattern.
pub fn validate_pattern(subject: &str) -> Result<(), TransportError> {
    let tokens = tokens(subject)?;
    let last = tokens.len() - 1;
    for (i, token) in tokens.iter().enumerate() {
        if *token == TAIL_WILDCARD && i != last {
            return Err(invalid(subject, "`>` must be the last token"));
        }
        if *token != SINGLE_WILDCARD
            && *token != TAIL_WILDCARD
            && (token.contains('*') || token.contains('>'))
        {
            return Err(invalid(subject, "wildcards must be whole tokens"));
        }
    }
    Ok(())
}

/// Validate a subject used for publishing.
pub fn validate_literal(subject: &str) -> Result<(), TransportError> {
    let tokens = tokens(subject)?;
    if tokens
        .iter()
        .any(|t| t.contains('*') || t.contains('>'))
    {
        return Err(invalid(subject, "wildcards are not allowed when publishing"));
    }
    Ok(())
}

/// Check whether a literal subject matches a (valid) subscription pattern.
pub fn matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(TAIL_WILDCARD), Some(_)) => return true,
            (Some(SINGLE_WILDCARD), Some(_)) => {}
            (Some(p), Some(s)) if p == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

fn tokens(subject: &str) -> Result<Vec<&str>, TransportError> {
    if subject.is_empty() {
        return Err(invalid(subject, "empty subject"));
    }
    if subject.chars().any(char::is_whitespace) {
        return Err(invalid(subject, "whitespace is not allowed"));
    }
    let tokens: Vec<&str> = subject.split('.').collect();
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(invalid(subject, "empty token"));
    }
    Ok(tokens)
}

fn invalid(subject: &str, reason: &str) -> TransportError {
    TransportError::InvalidSubject {
        subject: subject.to_string(),
        reason: reason.to_string(),
    }
}
