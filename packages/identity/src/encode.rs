//! Identity encoding: case-sensitive base64 to case-insensitive text.

use crate::hash::AppletIdentity;
use crate::IdentityString;

/// Marker appended after a letter that was uppercase before folding.
pub const ESCAPE_MARKER: char = '$';

/// How the marker is written inside a URL authority.
pub const URL_ESCAPED_MARKER: &str = "%24";

/// Fold a canonical base64 string into lowercase.
///
/// Every uppercase ASCII letter becomes its lowercase form followed by
/// [`ESCAPE_MARKER`]. Everything else is copied. Strings that are already
/// lowercase pass through unchanged.
///
/// The fold is only injective over inputs that contain no literal `$`,
/// which holds for every canonical hash string.
///
/// # Examples
///
/// ```
/// use framelink_identity::fold_case;
///
/// assert_eq!(fold_case("uhCEk"), "uhc$e$k");
/// assert_eq!(fold_case("abc-_09"), "abc-_09");
/// ```
pub fn fold_case(canonical: &str) -> String {
    let uppercase = canonical.chars().filter(char::is_ascii_uppercase).count();
    let mut out = String::with_capacity(canonical.len() + uppercase);
    for c in canonical.chars() {
        if c.is_ascii_uppercase() {
            out.push(c.to_ascii_lowercase());
            out.push(ESCAPE_MARKER);
        } else {
            out.push(c);
        }
    }
    out
}

/// Encode an applet identity for use in a URL origin.
///
/// # Examples
///
/// ```
/// use framelink_identity::{encode, decode, AppletIdentity};
///
/// let id = AppletIdentity::from_core([42; 32]);
/// let folded = encode(&id);
/// assert!(!folded.as_str().chars().any(|c| c.is_ascii_uppercase()));
/// assert_eq!(decode(folded.as_str()).unwrap(), id);
/// ```
pub fn encode(identity: &AppletIdentity) -> IdentityString {
    IdentityString::new_unchecked(fold_case(&identity.to_b64()))
}
