//! Structural complexity scoring.
//!
//! Scores text by control-keyword count, bracket and parenthesis counts,
//! and a logarithmic line term. Only the first [`MAX_ANALYZED_CHARS`]
//! bytes are examined so pathological inputs stay cheap.

use crate::io::{find_char_boundary, line_count};
use regex::Regex;

/// Bytes of input examined when scoring.
pub const MAX_ANALYZED_CHARS: usize = 10_000;

/// Whole-file score above which code is routed to the standardization strategy.
pub const COMPLEX_CODE_THRESHOLD: f64 = 20.0;

const KEYWORD_WEIGHT: f64 = 1.0;
const BRACKET_WEIGHT: f64 = 0.5;
const PAREN_WEIGHT: f64 = 0.3;

fn control_keywords() -> &'static Regex {
    static_regex!(
        CONTROL_KEYWORDS,
        r"\b(if|else|elif|for|foreach|while|do|switch|case|match|try|catch|except|finally|loop|when|unless|until)\b"
    )
}

fn function_keywords() -> &'static Regex {
    static_regex!(
        FUNCTION_KEYWORDS,
        r"\b(function|def|fn|func|fun|sub|proc|lambda)\b|=>"
    )
}

fn class_keywords() -> &'static Regex {
    static_regex!(
        CLASS_KEYWORDS,
        r"\b(class|struct|interface|trait|enum|impl|module|namespace|protocol)\b"
    )
}

/// Counts of structural markers in a piece of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructureCounts {
    /// Function-introducing keywords.
    pub functions: usize,
    /// Type-introducing keywords.
    pub classes: usize,
    /// Control-flow keywords.
    pub control: usize,
    /// `{`, `}`, `[`, `]`.
    pub brackets: usize,
    /// `(`, `)`.
    pub parens: usize,
    /// Lines examined.
    pub lines: usize,
}

/// Stateless complexity scorer.
///
/// # Examples
///
/// ```
/// use codesplit::chunking::ComplexityCalculator;
///
/// let simple = ComplexityCalculator::calculate("let x = 1;");
/// let nested = ComplexityCalculator::calculate(
///     "if a { for x in y { while z { match w { _ => {} } } } }",
/// );
/// assert!(nested > simple);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityCalculator;

impl ComplexityCalculator {
    /// Returns the analyzed prefix of `content`.
    fn analyzed(content: &str) -> &str {
        &content[..find_char_boundary(content, MAX_ANALYZED_CHARS)]
    }

    /// Counts structural markers.
    #[must_use]
    pub fn counts(content: &str) -> StructureCounts {
        let text = Self::analyzed(content);
        let mut counts = StructureCounts {
            functions: function_keywords().find_iter(text).count(),
            classes: class_keywords().find_iter(text).count(),
            control: control_keywords().find_iter(text).count(),
            lines: line_count(text),
            ..StructureCounts::default()
        };
        for b in text.bytes() {
            match b {
                b'{' | b'}' | b'[' | b']' => counts.brackets += 1,
                b'(' | b')' => counts.parens += 1,
                _ => {}
            }
        }
        counts
    }

    /// Scores `content`. Empty content scores zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::suboptimal_flops)]
    pub fn calculate(content: &str) -> f64 {
        let counts = Self::counts(content);
        counts.control as f64 * KEYWORD_WEIGHT
            + counts.brackets as f64 * BRACKET_WEIGHT
            + counts.parens as f64 * PAREN_WEIGHT
            + (counts.lines as f64 + 1.0).log10()
    }

    /// Returns whether `content` scores above [`COMPLEX_CODE_THRESHOLD`].
    #[must_use]
    pub fn is_complex(content: &str) -> bool {
        Self::calculate(content) > COMPLEX_CODE_THRESHOLD
    }
}
