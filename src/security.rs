const TOKEN_MASK_PREFIX_LEN: usize = 6;
const TOKEN_MASK_SUFFIX_LEN: usize = 4;

/// Renders a secret for logs: a short prefix and suffix, never the full value.
pub(crate) fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.trim().chars().collect();
    if chars.is_empty() {
        return String::new();
    }

    let len = chars.len();
    if len <= TOKEN_MASK_PREFIX_LEN + TOKEN_MASK_SUFFIX_LEN {
        return "*".repeat(len.min(8));
    }

    let prefix: String = chars[..TOKEN_MASK_PREFIX_LEN].iter().collect();
    let suffix: String = chars[len - TOKEN_MASK_SUFFIX_LEN..].iter().collect();
    format!("{prefix}...{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_token_keeps_prefix_and_suffix() {
        assert_eq!(mask_token("abcdef1234567890"), "abcdef...7890");
    }

    #[test]
    fn mask_token_short_values_redacts_fully() {
        assert_eq!(mask_token("abcd"), "****");
        assert_eq!(mask_token("  "), "");
    }
}
