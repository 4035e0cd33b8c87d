//! FFI Type System
//!
//! Describes the C-level types a native symbol is declared with, so a
//! declared signature can be checked against the Rust function type it is
//! bound to.

use std::fmt;
use std::str::FromStr;

/// C types supported for parameters and return values of bound symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfiType {
    /// Void (no value)
    Void,
    /// 32-bit signed integer (`int`)
    I32,
    /// 32-bit unsigned integer
    U32,
    /// 64-bit signed integer
    I64,
    /// 64-bit unsigned integer
    U64,
    /// 64-bit floating point (`double`)
    F64,
}

impl FromStr for FfiType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "void" => Ok(FfiType::Void),
            "i32" | "int" | "int32" | "int32_t" => Ok(FfiType::I32),
            "u32" | "unsigned" | "uint32" | "uint32_t" => Ok(FfiType::U32),
            "i64" | "long" | "int64" | "int64_t" => Ok(FfiType::I64),
            "u64" | "ulong" | "uint64" | "uint64_t" => Ok(FfiType::U64),
            "f64" | "double" => Ok(FfiType::F64),
            other => Err(format!("unsupported FFI type '{}'", other)),
        }
    }
}

impl fmt::Display for FfiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FfiType::Void => write!(f, "void"),
            FfiType::I32 => write!(f, "i32"),
            FfiType::U32 => write!(f, "u32"),
            FfiType::I64 => write!(f, "i64"),
            FfiType::U64 => write!(f, "u64"),
            FfiType::F64 => write!(f, "f64"),
        }
    }
}

/// Declared signature of a native symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfiSignature {
    /// Symbol name
    pub name: String,
    /// Parameter types
    pub params: Vec<FfiType>,
    /// Return type
    pub return_type: FfiType,
}

impl FfiSignature {
    /// Create a new function signature
    pub fn new(name: impl Into<String>, params: Vec<FfiType>, return_type: FfiType) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
        }
    }

    /// The `int name(int)` shape every probe library exports
    pub fn int_to_int(name: impl Into<String>) -> Self {
        Self::new(name, vec![FfiType::I32], FfiType::I32)
    }

    /// Whether the parameter and return types equal the given shape
    pub fn has_shape(&self, params: &[FfiType], return_type: FfiType) -> bool {
        self.params == params && self.return_type == return_type
    }

    /// Parse from a C-style declaration
    /// Format: "return_type function_name(param1_type name, param2_type, ...)"
    pub fn parse(declaration: &str) -> Option<Self> {
        let declaration = declaration.trim().trim_end_matches(';').trim();

        let open = declaration.find('(')?;
        let close = declaration.rfind(')')?;
        if close < open {
            return None;
        }
        let head = declaration[..open].trim();
        let inner = declaration[open + 1..close].trim();

        let mut head_parts = head.rsplitn(2, char::is_whitespace);
        let name = head_parts.next()?.trim();
        let return_type: FfiType = head_parts.next()?.parse().ok()?;
        if name.is_empty() {
            return None;
        }

        let mut params: Vec<FfiType> = Vec::new();
        if !(inner.is_empty() || inner == "void") {
            for param in inner.split(',') {
                // First word is the type, an optional parameter name follows
                let ty = param.split_whitespace().next()?;
                params.push(ty.parse().ok()?);
            }
        }

        Some(Self {
            name: name.to_string(),
            params,
            return_type,
        })
    }
}

impl fmt::Display for FfiSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.return_type, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")
    }
}
