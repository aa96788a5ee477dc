use colored::Colorize;
use strum::{EnumIter, EnumString};

/// Identifies a type. Two types are equal iff they denote the same type,
/// which is the only thing lowering and return type resolution rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, strum::Display)]
pub enum Type {
    #[strum(serialize = "()")]
    Unit,
    #[strum(serialize = "bool")]
    Bool,
    /// 64 bit signed integer
    #[strum(serialize = "int")]
    Int,
    /// 64 bit float
    #[strum(serialize = "float")]
    Float,
    #[strum(serialize = "str")]
    Str,
}

impl Type {
    pub fn is_unit(self) -> bool {
        self == Type::Unit
    }

    pub fn is_bool(self) -> bool {
        self == Type::Bool
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    pub fn colored(self) -> colored::ColoredString {
        self.to_string().yellow()
    }
}
