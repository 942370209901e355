//! `WWW-Authenticate` / `Proxy-Authenticate` parsing
//!
//! A header value may carry several challenges:
//! `Basic realm="a", Digest realm="b", nonce="n"`. Items are split on commas
//! outside quotes; an item whose first word has no `=` starts a new challenge.

use std::fmt;

use http::HeaderValue;

/// Errors produced while parsing a challenge header
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeError {
    #[error("challenge header is not valid ASCII")]
    NotAscii,
    #[error("authentication parameter appears before any scheme")]
    MissingScheme,
    #[error("unterminated quoted string in challenge")]
    UnterminatedQuote,
}

/// One authentication challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    scheme: String,
    token68: Option<String>,
    params: Vec<(String, String)>,
}

impl Challenge {
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// True if the scheme token matches `scheme`, ignoring case.
    #[must_use]
    pub fn is(&self, scheme: &str) -> bool {
        self.scheme.eq_ignore_ascii_case(scheme)
    }

    /// Value of parameter `name`, matched case-insensitively.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn realm(&self) -> Option<&str> {
        self.param("realm")
    }

    /// Opaque token form used by NTLM and Negotiate continuation rounds.
    #[must_use]
    pub fn token68(&self) -> Option<&str> {
        self.token68.as_deref()
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scheme)?;
        if let Some(token) = &self.token68 {
            write!(f, " {token}")?;
        }
        for (i, (k, v)) in self.params.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{k}=\"{v}\"")?;
        }
        Ok(())
    }
}

/// Parse every challenge in a header value.
///
/// # Errors
///
/// Returns [`ChallengeError`] for non-ASCII input, unbalanced quotes or a
/// parameter with no preceding scheme.
pub fn parse_challenges(value: &HeaderValue) -> Result<Vec<Challenge>, ChallengeError> {
    let text = value.to_str().map_err(|_| ChallengeError::NotAscii)?;
    let mut challenges: Vec<Challenge> = Vec::new();

    for item in split_items(text)? {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let first_word_end = item.find(char::is_whitespace).unwrap_or(item.len());
        let first_word = &item[..first_word_end];
        if first_word.contains('=') {
            let current = challenges.last_mut().ok_or(ChallengeError::MissingScheme)?;
            push_param(current, item);
            continue;
        }

        let mut challenge = Challenge {
            scheme: first_word.to_string(),
            token68: None,
            params: Vec::new(),
        };
        let rest = item[first_word_end..].trim();
        if !rest.is_empty() {
            if is_token68(rest) {
                challenge.token68 = Some(rest.to_string());
            } else {
                push_param(&mut challenge, rest);
            }
        }
        challenges.push(challenge);
    }

    Ok(challenges)
}

fn is_token68(s: &str) -> bool {
    let body = s.trim_end_matches('=');
    !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '+' | '/'))
}

fn push_param(challenge: &mut Challenge, item: &str) {
    if let Some((k, v)) = item.split_once('=') {
        let v = v.trim();
        let v = v
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(v)
            .replace("\\\"", "\"");
        challenge.params.push((k.trim().to_string(), v));
    }
}

fn split_items(text: &str) -> Result<Vec<&str>, ChallengeError> {
    let mut items = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                items.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return Err(ChallengeError::UnterminatedQuote);
    }
    items.push(&text[start..]);
    Ok(items)
}
