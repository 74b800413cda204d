//! Shared helpers for on-device recognizers.

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary() {
        assert!(!check_binary("examcrop-definitely-not-installed"));
    }
}
