//! Environment variable parsing with warn-level logging for invalid values.

/// Parse an environment variable with a default fallback.
///
/// - Unset or blank: returns `default` silently.
/// - Set but unparseable: logs a warning and returns `default`.
pub fn env_parse_with_default<T: std::str::FromStr + std::fmt::Display>(
    var: &str,
    default: T,
) -> T {
    match std::env::var(var) {
        Ok(v) if v.trim().is_empty() => default,
        Ok(v) => match v.trim().parse() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(
                    var,
                    value = %v,
                    default = %default,
                    "invalid env var value, using default"
                );
                default
            },
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SAFETY (all tests): each test owns a unique variable name, so no other
    // thread reads or writes it concurrently.

    #[test]
    fn parses_valid_value() {
        let var_name = "NOTESCAN_TEST_ENV_VALID_41207";
        unsafe { std::env::set_var(var_name, " 12 ") };
        let result: u32 = env_parse_with_default(var_name, 3);
        assert_eq!(result, 12);
        unsafe { std::env::remove_var(var_name) };
    }

    #[test]
    fn invalid_value_falls_back() {
        let var_name = "NOTESCAN_TEST_ENV_INVALID_41208";
        unsafe { std::env::set_var(var_name, "lots") };
        let result: u64 = env_parse_with_default(var_name, 60);
        assert_eq!(result, 60);
        unsafe { std::env::remove_var(var_name) };
    }

    #[test]
    fn missing_and_blank_fall_back() {
        let missing = "NOTESCAN_TEST_ENV_MISSING_41209";
        unsafe { std::env::remove_var(missing) };
        assert_eq!(env_parse_with_default(missing, 8_u32), 8);

        let blank = "NOTESCAN_TEST_ENV_BLANK_41210";
        unsafe { std::env::set_var(blank, "   ") };
        assert_eq!(env_parse_with_default(blank, 8_u32), 8);
        unsafe { std::env::remove_var(blank) };
    }
}
