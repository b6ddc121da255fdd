// FILE: src/core/util.rs

use crate::core::constants::{
    MAX_EXCERPT_LENGTH, RAW_TEXT_ELEMENTS, SLY_ELEMENT_NAME, URI_ATTRIBUTES, VOID_ELEMENTS,
};

/// Check if a string is a valid identifier
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    if !first.is_alphabetic() && first != '_' {
        return false;
    }

    chars.all(|c| c.is_alphanumeric() || c == '_' || c == ':')
}

pub fn is_void_element(tag_name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag_name))
}

pub fn is_raw_text_element(tag_name: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag_name))
}

pub fn is_uri_attribute(attribute_name: &str) -> bool {
    URI_ATTRIBUTES.iter().any(|v| v.eq_ignore_ascii_case(attribute_name))
}

/// `<sly>` elements never render their own tags.
pub fn is_sly_element(tag_name: &str) -> bool {
    tag_name.eq_ignore_ascii_case(SLY_ELEMENT_NAME)
}

/// Shorten source text for error messages, keeping the start.
pub fn excerpt(text: &str) -> String {
    let mut shortened: String = text.chars().take(MAX_EXCERPT_LENGTH).collect();
    if text.chars().count() > MAX_EXCERPT_LENGTH {
        shortened.push_str("...");
    }
    shortened.replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("item"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("jcr:title"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("a-b"));
    }

    #[test]
    fn test_element_classes() {
        assert!(is_void_element("BR"));
        assert!(!is_void_element("div"));
        assert!(is_raw_text_element("Script"));
        assert!(is_uri_attribute("HREF"));
        assert!(is_sly_element("SLY"));
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(100);
        let short = excerpt(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.len(), MAX_EXCERPT_LENGTH + 3);
        assert_eq!(excerpt("a\nb"), "a\\nb");
    }
}
