//! Identity decoding: case-folded text back to the canonical hash.

use std::str::FromStr;

use crate::encode::{ESCAPE_MARKER, URL_ESCAPED_MARKER};
use crate::hash::AppletIdentity;
use crate::MalformedIdentity;

/// Reverse [`fold_case`](crate::fold_case).
///
/// Scans for `lowercase + $` pairs and upper-cases the letter. Input that
/// could not have been produced by folding is rejected instead of guessed
/// at: uppercase letters, a marker that does not follow a lowercase letter
/// (which covers `$$`), and anything outside the base64url alphabet.
///
/// # Examples
///
/// ```
/// use framelink_identity::{unfold_case, MalformedIdentity};
///
/// assert_eq!(unfold_case("uhc$e$k").unwrap(), "uhCEk");
/// assert_eq!(unfold_case("$a"), Err(MalformedIdentity::DanglingMarker(0)));
/// ```
pub fn unfold_case(folded: &str) -> Result<String, MalformedIdentity> {
    let mut out = String::with_capacity(folded.len());
    let mut after_lowercase = false;

    for (position, c) in folded.char_indices() {
        match c {
            ESCAPE_MARKER => {
                if !after_lowercase {
                    return Err(MalformedIdentity::DanglingMarker(position));
                }
                if let Some(letter) = out.pop() {
                    out.push(letter.to_ascii_uppercase());
                }
                after_lowercase = false;
            }
            c if c.is_ascii_uppercase() => return Err(MalformedIdentity::UnfoldedUppercase(c)),
            c if c.is_ascii_lowercase() => {
                out.push(c);
                after_lowercase = true;
            }
            c if c.is_ascii_digit() || c == '-' || c == '_' => {
                out.push(c);
                after_lowercase = false;
            }
            other => return Err(MalformedIdentity::InvalidCharacter(other)),
        }
    }

    Ok(out)
}

/// Decode a case-folded identity string.
///
/// Accepts the literal marker form (`uhc$e$k...`). Use
/// [`decode_url_host`] for text taken straight out of a URL authority.
pub fn decode(folded: &str) -> Result<AppletIdentity, MalformedIdentity> {
    decode_hash(folded)
}

/// Decode any typed hash from its case-folded form.
pub fn decode_hash<H>(folded: &str) -> Result<H, MalformedIdentity>
where
    H: FromStr<Err = MalformedIdentity>,
{
    unfold_case(folded)?.parse()
}

/// Decode an identity from a URL host component, where the marker is
/// percent-escaped as `%24`.
pub fn decode_url_host(host: &str) -> Result<AppletIdentity, MalformedIdentity> {
    decode(&unescape_url_host(host))
}

/// Replace percent-escaped markers with literal ones.
pub(crate) fn unescape_url_host(host: &str) -> String {
    host.replace(URL_ESCAPED_MARKER, "$")
}
