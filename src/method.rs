//! # Method Identifiers and Descriptor Types
//!
//! A method under analysis is named by a single string of the form
//! `a.b.Class.method:(T1T2...Tn)Tret`, mirroring the class-file descriptor
//! syntax: a dotted package/class path, `.` then the method name, `:`, a
//! parenthesized parameter-type list, then the return type (or `V` for void).
//!
//! ## Type letters
//! - `I` int, `F` float, `Z` boolean, `C` char, `S` short, `V` void
//! - `L<dotted-classname>;` object reference, e.g. `Ljava.lang.String;`
//! - `[T` array of `T`, one `[` per dimension
//!
//! This parser is the same shape as
//! `syntactic_analyzer.py`'s `parse_method_signature`: a single forward scan
//! over the descriptor characters, consuming a reference type up to its
//! terminating `;` and an array type by eating the element type that follows
//! the `[`.

use std::fmt;

/// One descriptor type, as it appears in a parameter list or return position.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Boolean,
    Char,
    Short,
    Void,
    /// `Ljava.lang.String;`-style reference, holding the dotted class name.
    Object(String),
    /// `[T`, boxed so arrays of arrays type-check without infinite size.
    Array(Box<Type>),
}

impl Type {
    /// `true` for the one reference type the concrete/abstract interpreters
    /// give first-class treatment: `java.lang.String`.
    pub fn is_string(&self) -> bool {
        matches!(self, Type::Object(name) if name == "java.lang.String")
    }

    /// `None` on a malformed descriptor: an unrecognized type character, a
    /// `L` with no terminating `;`, or a dangling `[` at the end of input.
    fn parse_at(chars: &[char], i: &mut usize) -> Option<Type> {
        match *chars.get(*i)? {
            'I' => {
                *i += 1;
                Some(Type::Int)
            }
            'F' | 'D' => {
                *i += 1;
                Some(Type::Float)
            }
            'Z' => {
                *i += 1;
                Some(Type::Boolean)
            }
            'C' => {
                *i += 1;
                Some(Type::Char)
            }
            'S' | 'B' | 'J' => {
                *i += 1;
                Some(Type::Short)
            }
            'V' => {
                *i += 1;
                Some(Type::Void)
            }
            'L' => {
                let start = *i + 1;
                let mut end = start;
                while *chars.get(end)? != ';' {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                *i = end + 1;
                Some(Type::Object(name))
            }
            '[' => {
                *i += 1;
                let elem = Type::parse_at(chars, i)?;
                Some(Type::Array(Box::new(elem)))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "I"),
            Type::Float => write!(f, "F"),
            Type::Boolean => write!(f, "Z"),
            Type::Char => write!(f, "C"),
            Type::Short => write!(f, "S"),
            Type::Void => write!(f, "V"),
            Type::Object(name) => write!(f, "L{};", name),
            Type::Array(elem) => write!(f, "[{}", elem),
        }
    }
}

/// `a.b.Class.method:(T1T2...Tn)Tret`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodId {
    pub class_name: String,
    pub method_name: String,
    pub params: Vec<Type>,
    pub ret: Type,
}

impl MethodId {
    /// Parse a method identifier. Returns `None` on malformed input (an
    /// input error per the three-way error split, not a panic).
    pub fn parse(s: &str) -> Option<MethodId> {
        let colon = s.find(':')?;
        let (head, rest) = s.split_at(colon);
        let rest = &rest[1..]; // drop ':'

        let open = rest.find('(')?;
        let close = rest.find(')')?;
        if open != 0 || close < open {
            return None;
        }
        let params_str = &rest[open + 1..close];
        let ret_str = &rest[close + 1..];

        let last_dot = head.rfind('.')?;
        let class_name = head[..last_dot].to_string();
        let method_name = head[last_dot + 1..].to_string();
        if class_name.is_empty() || method_name.is_empty() {
            return None;
        }

        let params = parse_descriptor_list(params_str)?;
        let ret_chars: Vec<char> = ret_str.chars().collect();
        let ret = if ret_chars.is_empty() {
            Type::Void
        } else {
            let mut idx = 0;
            let ty = Type::parse_at(&ret_chars, &mut idx)?;
            if idx != ret_chars.len() {
                return None;
            }
            ty
        };

        Some(MethodId {
            class_name,
            method_name,
            params,
            ret,
        })
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:(", self.class_name, self.method_name)?;
        for p in &self.params {
            write!(f, "{}", p)?;
        }
        write!(f, "){}", self.ret)
    }
}

/// Count the operands a `makeConcat*`-style descriptor expects, e.g.
/// `(Ljava.lang.String;I)Ljava.lang.String;` takes 2. Accepts either a
/// full `(params)ret` descriptor or a bare parameter-list substring.
/// `None` if the descriptor is malformed.
pub fn count_operands(descriptor: &str) -> Option<usize> {
    let params = match (descriptor.find('('), descriptor.find(')')) {
        (Some(open), Some(close)) if open < close => &descriptor[open + 1..close],
        _ => descriptor,
    };
    Some(parse_descriptor_list(params)?.len())
}

/// Scan a parameter-list descriptor (no surrounding parens) into its types.
/// `None` if any element fails to parse or characters remain unconsumed.
fn parse_descriptor_list(s: &str) -> Option<Vec<Type>> {
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    let mut out = Vec::new();
    while i < chars.len() {
        out.push(Type::parse_at(&chars, &mut i)?);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_int_pair() {
        let m = MethodId::parse("jpamb.cases.Simple.assertPositive:(II)Z").unwrap();
        assert_eq!(m.class_name, "jpamb.cases.Simple");
        assert_eq!(m.method_name, "assertPositive");
        assert_eq!(m.params, vec![Type::Int, Type::Int]);
        assert_eq!(m.ret, Type::Boolean);
    }

    #[test]
    fn parses_string_and_void() {
        let m = MethodId::parse("a.b.Class.method:(Ljava.lang.String;)V").unwrap();
        assert_eq!(m.params, vec![Type::Object("java.lang.String".to_string())]);
        assert_eq!(m.ret, Type::Void);
    }

    #[test]
    fn parses_char_array() {
        let m = MethodId::parse("a.b.Class.method:([C)I").unwrap();
        assert_eq!(m.params, vec![Type::Array(Box::new(Type::Char))]);
    }

    #[test]
    fn rejects_missing_colon() {
        assert_eq!(MethodId::parse("a.b.Class.method(I)I"), None);
    }

    #[test]
    fn round_trips_display() {
        let m = MethodId::parse("a.b.Class.method:(IZ)I").unwrap();
        assert_eq!(m.to_string(), "a.b.Class.method:(IZ)I");
    }

    #[test]
    fn counts_operands_in_a_full_descriptor() {
        assert_eq!(count_operands("(Ljava.lang.String;I)Ljava.lang.String;"), Some(2));
        assert_eq!(count_operands("()Ljava.lang.String;"), Some(0));
    }

    #[test]
    fn rejects_unrecognized_descriptor_character() {
        assert_eq!(MethodId::parse("a.b.Class.method:(Q)I"), None);
    }

    #[test]
    fn rejects_truncated_object_descriptor() {
        assert_eq!(MethodId::parse("a.b.Class.method:(L)I"), None);
        assert_eq!(MethodId::parse("a.b.Class.method:(Ljava.lang.String)I"), None);
    }

    #[test]
    fn rejects_dangling_array_marker() {
        assert_eq!(MethodId::parse("a.b.Class.method:([)I"), None);
    }

    #[test]
    fn count_operands_none_on_malformed_descriptor() {
        assert_eq!(count_operands("(Ljava.lang.String"), None);
    }
}
