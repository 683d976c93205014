//! Lexical atoms: immutable text leaves of the syntax tree.
//!
//! Atoms of the same kind are equal iff their text is equal and they
//! compare directly with plain strings (`Op::from("+") == "+"`).

use paste::paste;
use std::{borrow::Cow, fmt};

use super::{Error, Kind, Result, Syntax};
use crate::hierarchy::Path;

macro_rules! atoms {
    ($($Atom:ident),*) => {
        paste! {
            $(
                #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
                pub struct $Atom(Cow<'static, str>);

                impl $Atom {
                    /// Build an atom from static text, usable in `static` items
                    pub const fn from_static(text: &'static str) -> Self {
                        $Atom(Cow::Borrowed(text))
                    }

                    pub fn new<S: Into<String>>(text: S) -> Self {
                        $Atom(Cow::Owned(text.into()))
                    }

                    pub fn as_str(&self) -> &str {
                        &self.0
                    }
                }

                pub fn [<$Atom:snake>]<S: Into<String>>(text: S) -> $Atom {
                    $Atom::new(text)
                }

                impl PartialEq<str> for $Atom {
                    fn eq(&self, other: &str) -> bool {
                        self.0 == other
                    }
                }

                impl PartialEq<&str> for $Atom {
                    fn eq(&self, other: &&str) -> bool {
                        self.0 == *other
                    }
                }

                impl PartialEq<String> for $Atom {
                    fn eq(&self, other: &String) -> bool {
                        self.0 == other.as_str()
                    }
                }

                impl PartialEq<$Atom> for &str {
                    fn eq(&self, other: &$Atom) -> bool {
                        *self == other.0
                    }
                }

                impl From<&str> for $Atom {
                    fn from(text: &str) -> Self {
                        $Atom::new(text)
                    }
                }

                impl From<String> for $Atom {
                    fn from(text: String) -> Self {
                        $Atom::new(text)
                    }
                }

                impl fmt::Display for $Atom {
                    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        write!(f, "{}", self.0)
                    }
                }

                impl Syntax for $Atom {
                    fn kind(&self) -> Kind {
                        Kind::$Atom
                    }

                    fn text(&self) -> Option<&str> {
                        Some(&self.0)
                    }

                    fn children(&self) -> Vec<&dyn Syntax> {
                        vec![]
                    }
                }
            )*
        }
    };
}

atoms!(Token, Op, Identifier, FuncName);

// Keywords
pub static SELECT: Token = Token::from_static("SELECT");
pub static FROM: Token = Token::from_static("FROM");
pub static WHERE: Token = Token::from_static("WHERE");
pub static GROUP_BY: Token = Token::from_static("GROUP BY");
pub static HAVING: Token = Token::from_static("HAVING");
pub static ORDER_BY: Token = Token::from_static("ORDER BY");
pub static LIMIT: Token = Token::from_static("LIMIT");
pub static AS: Token = Token::from_static("AS");
pub static ASC: Token = Token::from_static("ASC");
pub static DESC: Token = Token::from_static("DESC");
pub static IS: Token = Token::from_static("IS");
pub static NOT: Token = Token::from_static("NOT");
pub static NULL: Token = Token::from_static("NULL");
pub static STAR: Token = Token::from_static("*");
pub static LEFT_PARENTHESIS: Token = Token::from_static("(");
pub static RIGHT_PARENTHESIS: Token = Token::from_static(")");

impl Identifier {
    /// The dot-separated parts of the identifier
    pub fn parts(&self) -> Vec<&str> {
        self.0.split('.').collect()
    }

    /// The last part, i.e. the bare column or table name
    pub fn name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(self.as_str())
    }

    /// Split `alias.name` into its optional alias and its name.
    /// More than one qualifier is an error.
    pub fn split_alias(&self) -> Result<(Option<&str>, &str)> {
        match self.parts().as_slice() {
            [name] => Ok((None, *name)),
            [alias, name] => Ok((Some(*alias), *name)),
            _ => Err(Error::malformed_identifier(self)),
        }
    }

    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl Path for &Identifier {
    fn path(self) -> Vec<String> {
        self.parts().path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_equality() {
        assert_eq!(Op::from("+"), "+");
        assert_eq!("+", Op::from("+"));
        assert_eq!(token("SELECT"), SELECT);
        assert_ne!(func_name("SUM"), "sum");
        assert_eq!(identifier("age").to_string(), "age");
    }

    #[test]
    fn test_split_alias() {
        assert_eq!(identifier("age").split_alias().unwrap(), (None, "age"));
        assert_eq!(identifier("p.age").split_alias().unwrap(), (Some("p"), "age"));
        assert!(matches!(
            identifier("pums.pums.age").split_alias(),
            Err(Error::MalformedIdentifier(_))
        ));
        assert_eq!(identifier("pums.pums").name(), "pums");
    }
}
