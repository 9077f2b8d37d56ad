//! Language classification for resolved language names.
//!
//! The library receives an already-resolved language string; these helpers
//! only classify it. Extension sniffing lives in the CLI.

/// Languages treated as source code.
pub const CODE_LANGUAGES: &[&str] = &[
    "bash",
    "c",
    "clojure",
    "cpp",
    "csharp",
    "css",
    "dart",
    "elixir",
    "elm",
    "erlang",
    "fsharp",
    "go",
    "groovy",
    "haskell",
    "html",
    "java",
    "javascript",
    "julia",
    "kotlin",
    "lua",
    "objective-c",
    "ocaml",
    "perl",
    "php",
    "powershell",
    "python",
    "r",
    "ruby",
    "rust",
    "scala",
    "scss",
    "shell",
    "solidity",
    "sql",
    "swift",
    "tsx",
    "typescript",
    "vue",
    "xml",
    "zig",
];

/// Normalizes a language name: lowercase with common aliases folded.
///
/// # Examples
///
/// ```
/// use codesplit::core::language::normalize_language;
///
/// assert_eq!(normalize_language("TypeScript"), "typescript");
/// assert_eq!(normalize_language("py"), "python");
/// assert_eq!(normalize_language("c++"), "cpp");
/// ```
#[must_use]
pub fn normalize_language(language: &str) -> String {
    let lower = language.trim().to_lowercase();
    let folded = match lower.as_str() {
        "js" | "jsx" | "node" => "javascript",
        "ts" => "typescript",
        "py" | "python3" => "python",
        "rs" => "rust",
        "golang" => "go",
        "c++" | "cxx" | "cc" => "cpp",
        "c#" | "cs" => "csharp",
        "rb" => "ruby",
        "kt" | "kts" => "kotlin",
        "sh" | "zsh" => "shell",
        "md" => "markdown",
        "objc" => "objective-c",
        other => other,
    };
    folded.to_string()
}

/// Returns whether the language is a code language.
#[must_use]
pub fn is_code_language(language: &str) -> bool {
    CODE_LANGUAGES.contains(&normalize_language(language).as_str())
}

/// Returns whether the language is markdown.
#[must_use]
pub fn is_markdown_language(language: &str) -> bool {
    matches!(normalize_language(language).as_str(), "markdown" | "mdx")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("rust", true ; "rust")]
    #[test_case("Python", true ; "python mixed case")]
    #[test_case("ts", true ; "typescript alias")]
    #[test_case("markdown", false ; "markdown")]
    #[test_case("text", false ; "plain text")]
    #[test_case("", false ; "empty")]
    fn test_is_code_language(language: &str, expected: bool) {
        assert_eq!(is_code_language(language), expected);
    }

    #[test_case("markdown", true ; "markdown")]
    #[test_case("md", true ; "md alias")]
    #[test_case("MDX", true ; "mdx")]
    #[test_case("rust", false ; "rust")]
    fn test_is_markdown_language(language: &str, expected: bool) {
        assert_eq!(is_markdown_language(language), expected);
    }

    #[test]
    fn test_code_language_list_size() {
        assert_eq!(CODE_LANGUAGES.len(), 40);
        let mut sorted = CODE_LANGUAGES.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, CODE_LANGUAGES);
    }
}
