// FILE: src/core/constants.rs

// Markup
pub const SLY_ATTRIBUTE_PREFIX: &str = "data-sly-";
pub const SLY_ELEMENT_NAME: &str = "sly";

/// Elements that never have a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta",
    "param", "source", "track", "wbr",
];

/// Elements whose content is raw text up to the matching end tag.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Attributes whose values are URIs and get the `uri` display context.
pub const URI_ATTRIBUTES: &[&str] = &[
    "href", "src", "action", "formaction", "cite", "poster", "background", "data", "codebase",
    "manifest",
];

// Parsing
pub const DEFAULT_BUFFER_SIZE: usize = 8192;
pub const MAX_EXCERPT_LENGTH: usize = 40;
pub const MAX_EXPRESSION_DEPTH: usize = 64;

// Runtime bindings every template can reference without declaring them
pub const DEFAULT_GLOBALS: &[&str] = &[
    "bindings",
    "component",
    "currentDesign",
    "currentNode",
    "currentPage",
    "currentSession",
    "currentStyle",
    "inheritedPageProperties",
    "log",
    "out",
    "pageManager",
    "pageProperties",
    "properties",
    "reader",
    "request",
    "resource",
    "resourceResolver",
    "response",
    "sling",
    "wcmmode",
];

// Generated names
pub const SYMBOL_PREFIX: &str = "var_";
pub const DEFAULT_LIST_ITEM: &str = "item";
pub const LIST_STATUS_SUFFIX: &str = "List";
pub const DEFAULT_USE_NAME: &str = "useBean";

// Runtime functions emitted by the compiler
pub const RUNTIME_USE: &str = "use";
pub const RUNTIME_INCLUDE: &str = "include";
pub const RUNTIME_RESOURCE: &str = "resource";
pub const RUNTIME_LIST_STATUS: &str = "listStatus";
pub const RUNTIME_ATTRIBUTE_MAP: &str = "attributeMap";
