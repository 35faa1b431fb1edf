//! Dynamic method signatures, argument values and the widening table.
//!
//! The pipeline operates on a dynamic method model: the (external) routing
//! layer describes each business method as a [`MethodDescriptor`] and passes
//! arguments as [`ParamValue`]s. Interceptors replacing arguments via
//! `set_parameters` are validated element-wise against the declared types,
//! allowing Java-style primitive widening and boxing/unboxing conversions.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::contextual::AnyArc;
use crate::error::{ContextError, ContextResult};
use crate::key::TypeKey;

/// Declared type of one method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// 8-bit signed integer.
    Byte,
    /// 16-bit signed integer.
    Short,
    /// Unicode scalar.
    Char,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Boolean.
    Boolean,
    /// Reference to a concrete type.
    Object(TypeKey),
}

impl ParamType {
    fn is_primitive(&self) -> bool {
        !matches!(self, ParamType::Object(_))
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Byte => f.write_str("byte"),
            ParamType::Short => f.write_str("short"),
            ParamType::Char => f.write_str("char"),
            ParamType::Int => f.write_str("int"),
            ParamType::Long => f.write_str("long"),
            ParamType::Float => f.write_str("float"),
            ParamType::Double => f.write_str("double"),
            ParamType::Boolean => f.write_str("boolean"),
            ParamType::Object(key) => write!(f, "{}", key),
        }
    }
}

/// A method argument or return value.
#[derive(Debug, Clone)]
pub enum ParamValue {
    /// Absent value; also the return of void methods.
    Null,
    /// 8-bit signed integer.
    Byte(i8),
    /// 16-bit signed integer.
    Short(i16),
    /// Unicode scalar.
    Char(char),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Boolean.
    Boolean(bool),
    /// Boxed reference value.
    Object(AnyArc),
}

impl ParamValue {
    /// Boxes an arbitrary value as a reference argument.
    pub fn object<T: Send + Sync + 'static>(value: T) -> Self {
        ParamValue::Object(std::sync::Arc::new(value))
    }

    /// Downcasts a reference value to a concrete type.
    pub fn downcast_object<T: Send + Sync + 'static>(&self) -> Option<std::sync::Arc<T>> {
        match self {
            ParamValue::Object(any) => any.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// The primitive kind of this value, if it is one.
    fn primitive_kind(&self) -> Option<ParamType> {
        match self {
            ParamValue::Byte(_) => Some(ParamType::Byte),
            ParamValue::Short(_) => Some(ParamType::Short),
            ParamValue::Char(_) => Some(ParamType::Char),
            ParamValue::Int(_) => Some(ParamType::Int),
            ParamValue::Long(_) => Some(ParamType::Long),
            ParamValue::Float(_) => Some(ParamType::Float),
            ParamValue::Double(_) => Some(ParamType::Double),
            ParamValue::Boolean(_) => Some(ParamType::Boolean),
            ParamValue::Null | ParamValue::Object(_) => None,
        }
    }

    /// Rendering used by argument-error diagnostics.
    pub fn describe(&self) -> String {
        match self {
            ParamValue::Null => "null".to_string(),
            ParamValue::Object(any) => {
                if let Some(kind) = unboxed_kind(any) {
                    format!("boxed {}", kind)
                } else {
                    "object".to_string()
                }
            }
            other => other
                .primitive_kind()
                .map(|kind| kind.to_string())
                .unwrap_or_default(),
        }
    }
}

/// Identity of one business method: its name and declared parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Method name.
    pub name: String,
    /// Declared parameter types, in order.
    pub params: Vec<ParamType>,
}

impl MethodDescriptor {
    /// Creates a descriptor.
    pub fn new(name: impl Into<String>, params: Vec<ParamType>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.params.len())
    }
}

// The Java primitive widening table: each key widens to every listed type.
static WIDENING_TABLE: Lazy<HashMap<ParamType, &'static [ParamType]>> = Lazy::new(|| {
    use ParamType::*;
    let mut table: HashMap<ParamType, &'static [ParamType]> = HashMap::new();
    table.insert(Byte, &[Short, Int, Long, Float, Double]);
    table.insert(Short, &[Int, Long, Float, Double]);
    table.insert(Char, &[Int, Long, Float, Double]);
    table.insert(Int, &[Long, Float, Double]);
    table.insert(Long, &[Float, Double]);
    table.insert(Float, &[Double]);
    table
});

fn is_widening(from: ParamType, to: ParamType) -> bool {
    WIDENING_TABLE
        .get(&from)
        .map(|targets| targets.contains(&to))
        .unwrap_or(false)
}

/// The primitive kind a boxed reference value unboxes to, if any.
fn unboxed_kind(any: &AnyArc) -> Option<ParamType> {
    if any.downcast_ref::<i8>().is_some() {
        Some(ParamType::Byte)
    } else if any.downcast_ref::<i16>().is_some() {
        Some(ParamType::Short)
    } else if any.downcast_ref::<char>().is_some() {
        Some(ParamType::Char)
    } else if any.downcast_ref::<i32>().is_some() {
        Some(ParamType::Int)
    } else if any.downcast_ref::<i64>().is_some() {
        Some(ParamType::Long)
    } else if any.downcast_ref::<f32>().is_some() {
        Some(ParamType::Float)
    } else if any.downcast_ref::<f64>().is_some() {
        Some(ParamType::Double)
    } else if any.downcast_ref::<bool>().is_some() {
        Some(ParamType::Boolean)
    } else {
        None
    }
}

fn incompatible(position: usize, expected: ParamType, value: &ParamValue) -> ContextError {
    ContextError::IncompatibleParameter {
        position,
        expected: expected.to_string(),
        actual: value.describe(),
    }
}

/// Validates a replacement argument array against a method's declared
/// parameter types.
///
/// Accepts identity, primitive widening per the table, boxing of a primitive
/// into its reference type, and unboxing-plus-widening of a boxed value into
/// a primitive parameter. Mismatches name the offending position.
pub fn validate_parameters(
    method: &MethodDescriptor,
    params: &[ParamValue],
) -> ContextResult<()> {
    if method.params.len() != params.len() {
        return Err(ContextError::WrongParameterCount {
            expected: method.params.len(),
            actual: params.len(),
        });
    }
    for (position, (value, declared)) in params.iter().zip(method.params.iter()).enumerate() {
        check_assignable(position, value, *declared)?;
    }
    Ok(())
}

fn check_assignable(position: usize, value: &ParamValue, declared: ParamType) -> ContextResult<()> {
    match value {
        // null is never acceptable on a primitive parameter
        ParamValue::Null => {
            if declared.is_primitive() {
                Err(incompatible(position, declared, value))
            } else {
                Ok(())
            }
        }
        ParamValue::Object(any) => match declared {
            ParamType::Object(expected_key) => {
                if any.as_ref().type_id() == expected_key.type_id() {
                    Ok(())
                } else {
                    Err(incompatible(position, declared, value))
                }
            }
            primitive => {
                // unboxing, optionally followed by widening
                match unboxed_kind(any) {
                    Some(kind) if kind == primitive || is_widening(kind, primitive) => Ok(()),
                    _ => Err(incompatible(position, declared, value)),
                }
            }
        },
        primitive_value => {
            let kind = primitive_value
                .primitive_kind()
                .expect("non-object values have a primitive kind");
            match declared {
                ParamType::Object(expected_key) => {
                    // boxing: the reference type of the primitive must match
                    if kind_matches_key(kind, expected_key) {
                        Ok(())
                    } else {
                        Err(incompatible(position, declared, value))
                    }
                }
                primitive => {
                    if kind == primitive || is_widening(kind, primitive) {
                        Ok(())
                    } else {
                        Err(incompatible(position, declared, value))
                    }
                }
            }
        }
    }
}

fn kind_matches_key(kind: ParamType, key: TypeKey) -> bool {
    let boxed = match kind {
        ParamType::Byte => TypeKey::of::<i8>(),
        ParamType::Short => TypeKey::of::<i16>(),
        ParamType::Char => TypeKey::of::<char>(),
        ParamType::Int => TypeKey::of::<i32>(),
        ParamType::Long => TypeKey::of::<i64>(),
        ParamType::Float => TypeKey::of::<f32>(),
        ParamType::Double => TypeKey::of::<f64>(),
        ParamType::Boolean => TypeKey::of::<bool>(),
        ParamType::Object(_) => return false,
    };
    boxed == key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(params: Vec<ParamType>) -> MethodDescriptor {
        MethodDescriptor::new("probe", params)
    }

    #[test]
    fn identity_and_widening_accepted() {
        let m = method(vec![ParamType::Long, ParamType::Double]);
        validate_parameters(&m, &[ParamValue::Int(1), ParamValue::Byte(2)]).unwrap();
        validate_parameters(&m, &[ParamValue::Long(1), ParamValue::Double(2.0)]).unwrap();
    }

    #[test]
    fn narrowing_rejected_with_position() {
        let m = method(vec![ParamType::Long, ParamType::Int]);
        let err = validate_parameters(&m, &[ParamValue::Long(1), ParamValue::Long(2)]).unwrap_err();
        match err {
            ContextError::IncompatibleParameter { position, expected, actual } => {
                assert_eq!(position, 1);
                assert_eq!(expected, "int");
                assert_eq!(actual, "long");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unboxing_plus_widening_accepted() {
        let m = method(vec![ParamType::Int, ParamType::Long]);
        validate_parameters(
            &m,
            &[ParamValue::object(3i32), ParamValue::object(4i32)],
        )
        .unwrap();
    }

    #[test]
    fn boxing_into_matching_reference_accepted() {
        let m = method(vec![ParamType::Object(TypeKey::of::<i32>())]);
        validate_parameters(&m, &[ParamValue::Int(9)]).unwrap();

        let wrong = method(vec![ParamType::Object(TypeKey::of::<String>())]);
        assert!(validate_parameters(&wrong, &[ParamValue::Int(9)]).is_err());
    }

    #[test]
    fn null_rejected_on_primitive_only() {
        let m = method(vec![ParamType::Int]);
        assert!(validate_parameters(&m, &[ParamValue::Null]).is_err());

        let m = method(vec![ParamType::Object(TypeKey::of::<String>())]);
        validate_parameters(&m, &[ParamValue::Null]).unwrap();
    }

    #[test]
    fn arity_mismatch_rejected() {
        let m = method(vec![ParamType::Int]);
        let err = validate_parameters(&m, &[]).unwrap_err();
        assert!(matches!(
            err,
            ContextError::WrongParameterCount { expected: 1, actual: 0 }
        ));
    }
}
