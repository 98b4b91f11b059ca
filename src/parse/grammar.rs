use winnow::error::ModalResult;
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

// Words that cannot be referenced as a plain identifier in an expression.
const RESERVED: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

// -- Identifiers ------------------------------------------------------------

fn ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (one_of(ident_start), take_while(0.., ident_continue))
        .take()
        .parse_next(input)
}

/// Returns `true` if `name` can be bound and then referenced by an expression.
pub(crate) fn is_bindable_name(name: &str) -> bool {
    ident
        .parse(name)
        .is_ok_and(|name| !RESERVED.contains(&name))
}
