//! Protected-number normalization.

use cc_domain::error::{Error, Result};

/// Normalize a user-entered phone number to E.164-ish form.
///
/// Accepts separators (spaces, dashes, dots, parentheses), an optional
/// leading `+`, and the bare US 10-digit convenience form (prefixed with
/// `+1`). Anything else is a `BadRequest`.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let mut plus = false;
    let mut digits = String::new();
    for (i, c) in raw.trim().chars().enumerate() {
        match c {
            '+' if i == 0 => plus = true,
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => {
                return Err(Error::BadRequest(format!(
                    "phone number contains an invalid character: {c:?}"
                )))
            }
        }
    }

    let normalized = if !plus && digits.len() == 10 {
        format!("1{digits}")
    } else {
        digits
    };

    if !(8..=15).contains(&normalized.len()) {
        return Err(Error::BadRequest(
            "phone number must have 8 to 15 digits".into(),
        ));
    }

    Ok(format!("+{normalized}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e164_passes_through() {
        assert_eq!(normalize_phone("+14155552671").unwrap(), "+14155552671");
    }

    #[test]
    fn us_ten_digit_gets_country_code() {
        assert_eq!(normalize_phone("(415) 555-2671").unwrap(), "+14155552671");
        assert_eq!(normalize_phone("415.555.2671").unwrap(), "+14155552671");
    }

    #[test]
    fn eleven_digit_with_leading_one() {
        assert_eq!(normalize_phone("1 415 555 2671").unwrap(), "+14155552671");
    }

    #[test]
    fn rejects_letters_and_bad_lengths() {
        assert!(normalize_phone("call-me").is_err());
        assert!(normalize_phone("+12345").is_err());
        assert!(normalize_phone("+1234567890123456").is_err());
        assert!(normalize_phone("").is_err());
    }
}
