//! Declared field types.
//!
//! [`TypeExpr`] is the resolved form stored in the program model. Fixtures
//! spell declared types in a compact syntax that parses into [`TypeExprSpec`]
//! and is resolved against the model's type names:
//!
//! - `Object`: a concrete type, or a generic parameter of the owner
//! - `Object[]`: an array
//! - `Generic<Generic<T>>`: a parameterized type, arbitrarily nested

use crate::errors::{AnalysisError, ErrorCode};
use crate::ids::{ParamId, TypeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolved declared type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeExpr {
    Concrete(TypeId),
    Array(Box<TypeExpr>),
    GenericParam(ParamId),
    Parameterized(TypeId, Vec<TypeExpr>),
}

impl TypeExpr {
    pub fn is_array(&self) -> bool {
        matches!(self, TypeExpr::Array(_))
    }

    /// Every type referenced by the expression, in first-occurrence order.
    pub fn referenced_types(&self) -> Vec<TypeId> {
        let mut out = Vec::new();
        self.collect_types(&mut out);
        out
    }

    fn collect_types(&self, out: &mut Vec<TypeId>) {
        match self {
            TypeExpr::Concrete(id) => {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
            TypeExpr::Array(inner) => inner.collect_types(out),
            TypeExpr::GenericParam(_) => {}
            TypeExpr::Parameterized(id, args) => {
                if !out.contains(id) {
                    out.push(*id);
                }
                for arg in args {
                    arg.collect_types(out);
                }
            }
        }
    }
}

/// Unresolved declared type, as written in a fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeExprSpec {
    Named { name: String, args: Vec<TypeExprSpec> },
    Array(Box<TypeExprSpec>),
}

impl TypeExprSpec {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExprSpec::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn parameterized(name: impl Into<String>, args: Vec<TypeExprSpec>) -> Self {
        TypeExprSpec::Named {
            name: name.into(),
            args,
        }
    }

    pub fn array_of(inner: TypeExprSpec) -> Self {
        TypeExprSpec::Array(Box::new(inner))
    }

    /// Parse the compact type syntax.
    pub fn parse(type_str: &str) -> Result<Self, AnalysisError> {
        let type_str = type_str.trim();
        if type_str.is_empty() {
            return Err(malformed(type_str, "empty type"));
        }

        if let Some(inner) = type_str.strip_suffix("[]") {
            return Ok(TypeExprSpec::array_of(Self::parse(inner)?));
        }

        let Some(angle_pos) = type_str.find('<') else {
            check_identifier(type_str)?;
            return Ok(TypeExprSpec::named(type_str));
        };

        let base = type_str[..angle_pos].trim();
        let args_str = type_str[angle_pos + 1..]
            .strip_suffix('>')
            .ok_or_else(|| malformed(type_str, "unbalanced angle brackets"))?;
        check_identifier(base)?;

        let parts = split_type_params(args_str)
            .ok_or_else(|| malformed(type_str, "unbalanced angle brackets"))?;
        if parts.is_empty() {
            return Err(malformed(type_str, "empty type argument list"));
        }
        let args = parts
            .into_iter()
            .map(Self::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TypeExprSpec::parameterized(base, args))
    }
}

impl fmt::Display for TypeExprSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExprSpec::Named { name, args } if args.is_empty() => f.write_str(name),
            TypeExprSpec::Named { name, args } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{}<{}>", name, args.join(", "))
            }
            TypeExprSpec::Array(inner) => write!(f, "{}[]", inner),
        }
    }
}

impl TryFrom<String> for TypeExprSpec {
    type Error = AnalysisError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TypeExprSpec::parse(&value)
    }
}

impl From<TypeExprSpec> for String {
    fn from(value: TypeExprSpec) -> Self {
        value.to_string()
    }
}

fn malformed(type_str: &str, reason: &str) -> AnalysisError {
    AnalysisError::new(
        ErrorCode::MalformedTypeExpr,
        format!("cannot parse type '{}': {}", type_str, reason),
    )
}

fn check_identifier(name: &str) -> Result<(), AnalysisError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'));
    if valid {
        Ok(())
    } else {
        Err(malformed(name, "invalid identifier"))
    }
}

/// Split type arguments respecting nested angle brackets.
///
/// Given "A, B<C, D>, E", returns ["A", "B<C, D>", "E"]. Returns `None` when the
/// brackets do not balance.
fn split_type_params(s: &str) -> Option<Vec<&str>> {
    let mut result = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            ',' if depth == 0 => {
                result.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }

    let last = s[start..].trim();
    if !last.is_empty() || !result.is_empty() {
        result.push(last);
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_and_array() {
        assert_eq!(TypeExprSpec::parse("Object").unwrap(), TypeExprSpec::named("Object"));
        assert_eq!(
            TypeExprSpec::parse("Object[][]").unwrap(),
            TypeExprSpec::array_of(TypeExprSpec::array_of(TypeExprSpec::named("Object")))
        );
    }

    #[test]
    fn test_parse_nested_generics() {
        let spec = TypeExprSpec::parse("Map<K, List<Generic<T>>>").unwrap();
        let TypeExprSpec::Named { name, args } = &spec else {
            panic!("expected named type");
        };
        assert_eq!(name, "Map");
        assert_eq!(args.len(), 2);
        assert_eq!(spec.to_string(), "Map<K, List<Generic<T>>>");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(TypeExprSpec::parse("").is_err());
        assert!(TypeExprSpec::parse("Generic<T").is_err());
        assert!(TypeExprSpec::parse("Generic<>").is_err());
        assert!(TypeExprSpec::parse("Generic<T,>").is_err());
        assert!(TypeExprSpec::parse("Gen eric").is_err());
        let err = TypeExprSpec::parse("A<B>>").unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedTypeExpr);
    }

    #[test]
    fn test_split_type_params() {
        assert_eq!(
            split_type_params("A, B<C, D>, E").unwrap(),
            vec!["A", "B<C, D>", "E"]
        );
        assert!(split_type_params("A>").is_none());
    }

    #[test]
    fn test_referenced_types() {
        let expr = TypeExpr::Parameterized(
            TypeId(0),
            vec![TypeExpr::Parameterized(
                TypeId(0),
                vec![TypeExpr::GenericParam(ParamId::from("T"))],
            )],
        );
        assert_eq!(expr.referenced_types(), vec![TypeId(0)]);
        assert!(TypeExpr::Array(Box::new(TypeExpr::Concrete(TypeId(1)))).is_array());
    }
}
