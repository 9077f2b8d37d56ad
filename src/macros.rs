//! Crate-internal macros.

/// Returns a `&'static Regex` compiled on first use.
///
/// Patterns are literals, so a compile failure is a programming error.
macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {{
        static $name: ::std::sync::OnceLock<::regex::Regex> = ::std::sync::OnceLock::new();
        #[allow(clippy::expect_used)]
        $name.get_or_init(|| ::regex::Regex::new($pattern).expect("valid regex"))
    }};
}
