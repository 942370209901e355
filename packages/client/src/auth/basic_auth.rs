//! Basic authentication encoding

use std::io::Write;

use base64::prelude::BASE64_STANDARD;
use base64::write::EncoderWriter;
use http::HeaderValue;

/// Builds a `Basic` credentials header value, marked sensitive.
///
/// # Errors
///
/// Returns a request error if the encoded value is not a valid header value.
pub fn basic_auth<U, P>(username: U, password: Option<P>) -> crate::Result<HeaderValue>
where
    U: std::fmt::Display,
    P: std::fmt::Display,
{
    let mut buf = b"Basic ".to_vec();
    {
        let mut encoder = EncoderWriter::new(&mut buf, &BASE64_STANDARD);
        let _ = write!(encoder, "{username}:");
        if let Some(password) = password {
            let _ = write!(encoder, "{password}");
        }
    }
    let mut header = HeaderValue::from_bytes(&buf).map_err(|_e| {
        crate::error::invalid_header(format!(
            "Invalid authorization header: {}",
            String::from_utf8_lossy(&buf)
        ))
    })?;
    header.set_sensitive(true);
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_user_and_password() {
        let value = basic_auth("Aladdin", Some("open sesame")).expect("valid credentials");
        assert_eq!(value, "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
        assert!(value.is_sensitive());
    }

    #[test]
    fn missing_password_keeps_colon() {
        let value = basic_auth("user", None::<&str>).expect("valid credentials");
        assert_eq!(value, "Basic dXNlcjo=");
    }
}
