//! Spelled C++ type references.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefKind {
    Lvalue,
    Rvalue,
}

/// A declared type as written in the source.
///
/// `base` is the spelled specifier without declarator parts (`std::string`,
/// `unsigned int`); the declarator contributes pointer levels, array-ness
/// and a reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeRef {
    pub base: String,
    pub is_const: bool,
    pub is_volatile: bool,
    /// One entry per `*`, outermost first; `true` for `* const`
    pub pointers: Vec<bool>,
    pub array: bool,
    pub reference: Option<RefKind>,
}

impl TypeRef {
    pub fn named(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            ..Default::default()
        }
    }

    /// Name used for class lookup: no elaborated keyword, cv-qualifier,
    /// template arguments or leading `::`
    pub fn lookup_name(&self) -> String {
        lookup_name(&self.base)
    }

    pub fn is_auto(&self) -> bool {
        let name = self.lookup_name();
        name == "auto" || name.starts_with("decltype")
    }

    pub fn is_pointer(&self) -> bool {
        !self.pointers.is_empty()
    }

    /// A reference through which the referent can be modified
    pub fn is_mutable_lvalue_ref(&self) -> bool {
        match self.reference {
            Some(RefKind::Lvalue) => match self.pointers.last() {
                Some(const_pointer) => !const_pointer,
                None => !self.is_const,
            },
            _ => false,
        }
    }

    /// The non-reference type, e.g. `int`, `const char *`, `int *const`
    pub fn spelled(&self) -> String {
        let mut out = String::new();
        if self.is_const {
            out.push_str("const ");
        }
        if self.is_volatile {
            out.push_str("volatile ");
        }
        out.push_str(&self.base);
        if !self.pointers.is_empty() {
            out.push(' ');
            for const_pointer in &self.pointers {
                out.push('*');
                if *const_pointer {
                    out.push_str("const ");
                }
            }
        }
        out.trim_end().to_string()
    }

    /// The same type with top-level const added
    pub fn const_spelled(&self) -> String {
        match self.pointers.last() {
            None if self.is_const => self.spelled(),
            None => format!("const {}", self.spelled()),
            Some(true) => self.spelled(),
            Some(false) => format!("{}const", self.spelled()),
        }
    }
}

/// Spell `ty &` the way clang prints it: `int &`, `char *&`
pub fn reference_to(spelled: &str) -> String {
    if spelled.ends_with('*') {
        format!("{spelled}&")
    } else {
        format!("{spelled} &")
    }
}

/// Strip a written type down to the name used for record lookup
pub fn lookup_name(written: &str) -> String {
    let mut depth = 0usize;
    let mut stripped = String::with_capacity(written.len());
    for ch in written.chars() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(ch),
            _ => {}
        }
    }
    stripped
        .split_whitespace()
        .filter(|word| {
            !matches!(
                *word,
                "const" | "volatile" | "struct" | "class" | "union" | "typename" | "enum"
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
        .trim_start_matches("::")
        .to_string()
}

/// Standard templates whose `[]`, `*`, `->` or iteration yield their first
/// type argument
const ELEMENT_TEMPLATES: &[&str] = &[
    "std::vector",
    "std::array",
    "std::deque",
    "std::list",
    "std::forward_list",
    "std::span",
    "std::initializer_list",
    "std::unique_ptr",
    "std::shared_ptr",
    "std::optional",
];

/// First template argument of a standard container or smart pointer,
/// e.g. `Foo` for `std::vector<Foo>`
pub fn element_type_argument(written: &str) -> Option<&str> {
    let template = lookup_name(written);
    if !ELEMENT_TEMPLATES.contains(&template.as_str()) {
        return None;
    }
    let open = written.find('<')?;
    let mut depth = 0usize;
    for (offset, ch) in written[open + 1..].char_indices() {
        match ch {
            '<' | '(' => depth += 1,
            '>' | ')' if depth > 0 => depth -= 1,
            ',' | '>' if depth == 0 => {
                let argument = written[open + 1..open + 1 + offset].trim();
                return (!argument.is_empty()).then_some(argument);
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spelling_plain_and_const() {
        let ty = TypeRef::named("int");
        assert_eq!(ty.spelled(), "int");
        assert_eq!(ty.const_spelled(), "const int");
        assert_eq!(reference_to(&ty.const_spelled()), "const int &");

        let already_const = TypeRef {
            is_const: true,
            ..TypeRef::named("std::string")
        };
        assert_eq!(already_const.const_spelled(), "const std::string");
    }

    #[test]
    fn test_spelling_pointers() {
        let ptr = TypeRef {
            pointers: vec![false],
            ..TypeRef::named("char")
        };
        assert_eq!(ptr.spelled(), "char *");
        assert_eq!(ptr.const_spelled(), "char *const");
        assert_eq!(reference_to(&ptr.spelled()), "char *&");

        let const_ptr = TypeRef {
            pointers: vec![false, true],
            ..TypeRef::named("int")
        };
        assert_eq!(const_ptr.spelled(), "int **const");
        assert_eq!(const_ptr.const_spelled(), "int **const");
    }

    #[test]
    fn test_lookup_name() {
        assert_eq!(lookup_name("struct ns::Foo"), "ns::Foo");
        assert_eq!(lookup_name("::std::vector<std::pair<int, int>>"), "std::vector");
        assert_eq!(lookup_name("const Bar"), "Bar");
    }

    #[test]
    fn test_element_type_argument() {
        assert_eq!(element_type_argument("std::vector<Foo>"), Some("Foo"));
        assert_eq!(element_type_argument("const std::array<ns::Foo, 4>"), Some("ns::Foo"));
        assert_eq!(element_type_argument("std::unique_ptr<Box<int>>"), Some("Box<int>"));
        assert_eq!(element_type_argument("std::map<int, Foo>"), None);
        assert_eq!(element_type_argument("Foo"), None);
    }

    #[test]
    fn test_mutable_reference() {
        let mut ty = TypeRef::named("int");
        ty.reference = Some(RefKind::Lvalue);
        assert!(ty.is_mutable_lvalue_ref());
        ty.is_const = true;
        assert!(!ty.is_mutable_lvalue_ref());
        ty.pointers.push(false);
        assert!(ty.is_mutable_lvalue_ref());
    }
}
