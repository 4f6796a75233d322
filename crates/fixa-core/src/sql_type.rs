//! Normalized SQL type codes
//!
//! Drivers report column types as declared strings. `SqlType` folds them
//! into one vocabulary so that default values and cell coercion can be
//! chosen without knowing the driver.

use serde::{Deserialize, Serialize};

/// SQL type classification of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    NChar,
    NVarChar,
    LongNVarChar,
    Clob,
    NClob,
    Date,
    Time,
    Timestamp,
    Binary,
    VarBinary,
    LongVarBinary,
    Blob,
    Boolean,
    Array,
    Struct,
    SqlXml,
    RowId,
    Other,
}

impl SqlType {
    /// Map a declared type name such as `VARCHAR(20)` or `decimal(10, 2)`.
    ///
    /// Names that are not recognised exactly fall back to the usual
    /// affinity rules (`INT` anywhere means integer, `CHAR`/`TEXT` means
    /// text and so on) before giving up with `Other`.
    pub fn from_type_name(declared: &str) -> Self {
        let base = declared
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_uppercase();

        match base.as_str() {
            "BIT" => SqlType::Bit,
            "TINYINT" => SqlType::TinyInt,
            "SMALLINT" | "INT2" => SqlType::SmallInt,
            "INTEGER" | "INT" | "INT4" | "MEDIUMINT" => SqlType::Integer,
            "BIGINT" | "INT8" => SqlType::BigInt,
            "FLOAT" => SqlType::Float,
            "REAL" => SqlType::Real,
            "DOUBLE" | "DOUBLE PRECISION" => SqlType::Double,
            "NUMERIC" | "NUMBER" => SqlType::Numeric,
            "DECIMAL" | "DEC" => SqlType::Decimal,
            "CHAR" | "CHARACTER" => SqlType::Char,
            "VARCHAR" | "VARCHAR2" | "CHARACTER VARYING" | "TEXT" => SqlType::VarChar,
            "LONGVARCHAR" | "LONG VARCHAR" => SqlType::LongVarChar,
            "NCHAR" | "NATIONAL CHARACTER" => SqlType::NChar,
            "NVARCHAR" | "NVARCHAR2" => SqlType::NVarChar,
            "LONGNVARCHAR" => SqlType::LongNVarChar,
            "CLOB" => SqlType::Clob,
            "NCLOB" => SqlType::NClob,
            "DATE" => SqlType::Date,
            "TIME" => SqlType::Time,
            "TIMESTAMP" | "DATETIME" => SqlType::Timestamp,
            "BINARY" => SqlType::Binary,
            "VARBINARY" => SqlType::VarBinary,
            "LONGVARBINARY" => SqlType::LongVarBinary,
            "BLOB" | "BYTEA" => SqlType::Blob,
            "BOOLEAN" | "BOOL" => SqlType::Boolean,
            "ARRAY" => SqlType::Array,
            "STRUCT" => SqlType::Struct,
            "XML" => SqlType::SqlXml,
            "ROWID" => SqlType::RowId,
            other if other.contains("INT") => SqlType::Integer,
            other if other.contains("CHAR") || other.contains("TEXT") => SqlType::VarChar,
            other if other.contains("CLOB") => SqlType::Clob,
            other if other.contains("BLOB") => SqlType::Blob,
            other
                if other.contains("REAL") || other.contains("FLOA") || other.contains("DOUB") =>
            {
                SqlType::Double
            }
            _ => SqlType::Other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlType::Decimal
                | SqlType::Double
                | SqlType::BigInt
                | SqlType::Float
                | SqlType::Integer
                | SqlType::Numeric
                | SqlType::SmallInt
                | SqlType::TinyInt
                | SqlType::Real
        )
    }

    pub fn is_date(&self) -> bool {
        matches!(self, SqlType::Date | SqlType::Time | SqlType::Timestamp)
    }

    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            SqlType::Binary | SqlType::Blob | SqlType::LongVarBinary | SqlType::VarBinary
        )
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, SqlType::Bit | SqlType::Boolean)
    }

    /// Fixed-length character types, padded to the column width
    pub fn is_fixed_char(&self) -> bool {
        matches!(self, SqlType::Char | SqlType::NChar)
    }

    pub fn is_character(&self) -> bool {
        matches!(
            self,
            SqlType::Char
                | SqlType::VarChar
                | SqlType::LongVarChar
                | SqlType::NChar
                | SqlType::NVarChar
                | SqlType::LongNVarChar
                | SqlType::Clob
                | SqlType::NClob
        )
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SqlType::Bit => "BIT",
            SqlType::TinyInt => "TINYINT",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Float => "FLOAT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE",
            SqlType::Numeric => "NUMERIC",
            SqlType::Decimal => "DECIMAL",
            SqlType::Char => "CHAR",
            SqlType::VarChar => "VARCHAR",
            SqlType::LongVarChar => "LONGVARCHAR",
            SqlType::NChar => "NCHAR",
            SqlType::NVarChar => "NVARCHAR",
            SqlType::LongNVarChar => "LONGNVARCHAR",
            SqlType::Clob => "CLOB",
            SqlType::NClob => "NCLOB",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Binary => "BINARY",
            SqlType::VarBinary => "VARBINARY",
            SqlType::LongVarBinary => "LONGVARBINARY",
            SqlType::Blob => "BLOB",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Array => "ARRAY",
            SqlType::Struct => "STRUCT",
            SqlType::SqlXml => "SQLXML",
            SqlType::RowId => "ROWID",
            SqlType::Other => "OTHER",
        };
        f.write_str(name)
    }
}

/// Length and scale parsed from a declared type such as `DECIMAL(10,2)`
pub fn declared_length(declared: &str) -> (Option<i64>, Option<i32>) {
    let Some(open) = declared.find('(') else {
        return (None, None);
    };
    let inner = declared[open + 1..].trim_end_matches(|c: char| c == ')' || c.is_whitespace());
    let mut parts = inner.split(',').map(str::trim);
    let length = parts.next().and_then(|p| p.parse::<i64>().ok());
    let scale = parts.next().and_then(|p| p.parse::<i32>().ok());
    (length, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("VARCHAR(20)", SqlType::VarChar)]
    #[case("char(5)", SqlType::Char)]
    #[case("DECIMAL(10, 2)", SqlType::Decimal)]
    #[case("INTEGER", SqlType::Integer)]
    #[case("UNSIGNED BIG INT", SqlType::Integer)]
    #[case("TIMESTAMP", SqlType::Timestamp)]
    #[case("DATETIME", SqlType::Timestamp)]
    #[case("BLOB", SqlType::Blob)]
    #[case("BOOLEAN", SqlType::Boolean)]
    #[case("NATIVE CHARACTER(70)", SqlType::VarChar)]
    #[case("", SqlType::Other)]
    fn test_from_type_name(#[case] declared: &str, #[case] expected: SqlType) {
        assert_eq!(SqlType::from_type_name(declared), expected);
    }

    #[test]
    fn test_declared_length() {
        assert_eq!(declared_length("VARCHAR(20)"), (Some(20), None));
        assert_eq!(declared_length("DECIMAL(10, 2)"), (Some(10), Some(2)));
        assert_eq!(declared_length("TEXT"), (None, None));
    }

    #[test]
    fn test_classification_is_disjoint() {
        for ty in [SqlType::Integer, SqlType::Date, SqlType::Blob, SqlType::Bit] {
            let hits = [ty.is_numeric(), ty.is_date(), ty.is_binary(), ty.is_boolean()]
                .iter()
                .filter(|b| **b)
                .count();
            assert_eq!(hits, 1, "{ty} should belong to exactly one class");
        }
        assert!(SqlType::Clob.is_character());
        assert!(!SqlType::VarChar.is_fixed_char());
    }
}
