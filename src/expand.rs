//! `$NAME` substitution inside unquoted words.

use crate::env::Environment;

/// Replace every `$NAME` in `word` with the value of the constant `NAME`.
///
/// `NAME` is the longest run of ASCII letters and digits after the `$`. Undefined
/// names expand to the empty string, and a `$` not followed by a name stays
/// literal. Substituted values are not scanned again.
pub fn expand_word(word: &str, env: &Environment) -> String {
    let mut out = String::with_capacity(word.len());
    let mut rest = word;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];
        let name_len = after
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after.len());
        if name_len == 0 {
            out.push('$');
        } else {
            out.push_str(&env.get_var(&after[..name_len]));
        }
        rest = &after[name_len..];
    }

    out.push_str(rest);
    out
}
