//! Guard concatenated scripts against a missing trailing semicolon.

use crate::context::Context;

use super::Processor;

/// Appends `;` to script sources that don't already end with one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyColons;

impl Processor for SafetyColons {
    fn name(&self) -> &str {
        "safety_colons"
    }

    fn render(&self, _context: &mut Context<'_>, data: String) -> anyhow::Result<String> {
        Ok(add_semicolon(data))
    }
}

fn add_semicolon(data: String) -> String {
    let trimmed = data.trim_end();
    if trimmed.is_empty() || trimmed.ends_with(';') {
        data
    } else {
        format!("{trimmed};\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adds_missing_semicolon() {
        assert_eq!(add_semicolon("var a = 1\n\n".into()), "var a = 1;\n");
    }

    #[test]
    fn test_leaves_terminated_and_blank_sources() {
        assert_eq!(add_semicolon("var a = 1;  \n".into()), "var a = 1;  \n");
        assert_eq!(add_semicolon(" \n\t".into()), " \n\t");
        assert_eq!(add_semicolon(String::new()), "");
    }
}
