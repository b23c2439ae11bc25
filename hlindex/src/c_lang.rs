//! This module contains functionality specific to highlighting C-family
//! sources: the style classes used by the C highlighter and the words every
//! C index starts out with.

use crate::index::HighlightIndex;

pub const STYLE_TYPE: &str = "c:type";

pub const STYLE_FUNCTION_NAME: &str = "c:function-name";

pub const STYLE_ENUM_NAME: &str = "c:enum-name";

pub const STYLE_MACRO_NAME: &str = "c:macro-name";

pub const STYLE_COMMON_DEFINES: &str = "c:common-defines";

pub const STYLE_BOOLEAN: &str = "c:boolean";

pub const STYLE_STORAGE_CLASS: &str = "c:storage-class";

const COMMON_DEFINES: &[&str] = &["NULL", "MIN", "MAX", "__LINE__", "__FILE__"];

/// Kinds of declarations a C parser reports while walking a translation unit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymbolKind {
    Typedef,
    TypeAlias,
    Struct,
    Class,
    Function,
    Enum,
    EnumConstant,
    Macro,
    Variable,
    Field,
}

impl SymbolKind {
    /// The style used for symbols of this kind, if they are highlighted at all.
    pub fn style(self) -> Option<&'static str> {
        match self {
            SymbolKind::Typedef | SymbolKind::TypeAlias | SymbolKind::Struct | SymbolKind::Class => {
                Some(STYLE_TYPE)
            }
            SymbolKind::Function => Some(STYLE_FUNCTION_NAME),
            SymbolKind::Enum | SymbolKind::EnumConstant => Some(STYLE_ENUM_NAME),
            SymbolKind::Macro => Some(STYLE_MACRO_NAME),
            SymbolKind::Variable | SymbolKind::Field => None,
        }
    }
}

/// Inserts the words that are highlighted in every C file.
pub fn seed_common_words(index: &mut HighlightIndex<&'static str>) {
    for &word in COMMON_DEFINES {
        index.insert(word, STYLE_COMMON_DEFINES);
    }

    index.insert("TRUE", STYLE_BOOLEAN);
    index.insert("FALSE", STYLE_BOOLEAN);
    index.insert("g_autoptr", STYLE_STORAGE_CLASS);
    index.insert("g_auto", STYLE_STORAGE_CLASS);
    index.insert("g_autofree", STYLE_STORAGE_CLASS);
}

/// Records a declaration found by the parser. Returns whether `name` was
/// given a style.
pub fn insert_symbol(
    index: &mut HighlightIndex<&'static str>,
    kind: SymbolKind,
    name: &str,
) -> bool {
    match kind.style() {
        Some(style) => {
            index.insert(name, style);
            true
        }
        None => false,
    }
}
