//! Values substituted for columns a fixture row leaves out

use chrono::NaiveDateTime;
use fixa_core::{FixaError, Result, SqlType, Value};
use fixa_settings::DefaultValueSettings;

/// Supplies the value of a column that a fixture row omits
pub trait DefaultValues: Send + Sync {
    fn get(&self, sql_type: SqlType, max_length: usize) -> Result<Value>;
}

/// Hex string of the zero-filled binary default
const BINARY_DEFAULT_LEN: usize = 10;

/// Built-in defaults.
///
/// | type | value |
/// |---|---|
/// | CHAR, NCHAR | the default char repeated to the column length |
/// | VARCHAR, NVARCHAR, LONGVARCHAR, CLOB, NCLOB | the default char once |
/// | numeric | `"0"`, cut to the column length |
/// | DATE, TIME, TIMESTAMP | the epoch, or the configured timestamp |
/// | binary | ten zero bytes, hex encoded |
/// | BIT, BOOLEAN | `false` |
#[derive(Debug, Clone)]
pub struct BasicDefaultValues {
    number: String,
    date: Option<NaiveDateTime>,
    character: char,
}

impl Default for BasicDefaultValues {
    fn default() -> Self {
        Self {
            number: "0".to_string(),
            date: None,
            character: ' ',
        }
    }
}

impl BasicDefaultValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the overrides present in `settings`
    pub fn from_settings(settings: &DefaultValueSettings) -> Result<Self> {
        let mut defaults = Self::default();
        if let Some(number) = &settings.number {
            defaults.set_number_value(number);
        }
        if let Some(date) = &settings.date {
            defaults.set_date_value(date)?;
        }
        if let Some(character) = &settings.char {
            defaults.set_char_value(character)?;
        }
        Ok(defaults)
    }

    pub fn set_number_value(&mut self, value: impl Into<String>) {
        self.number = value.into();
    }

    /// `yyyy-MM-dd HH:mm:ss[.f...]`
    pub fn set_date_value(&mut self, value: &str) -> Result<()> {
        let parsed = parse_timestamp_escape(value).ok_or_else(|| {
            FixaError::Configuration(format!(
                "dateValue must be in the format yyyy-MM-dd HH:mm:ss[.f...]. but was [{}]",
                value
            ))
        })?;
        self.date = Some(parsed);
        Ok(())
    }

    /// Must be exactly one character
    pub fn set_char_value(&mut self, value: &str) -> Result<()> {
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                self.character = c;
                Ok(())
            }
            _ => Err(FixaError::Configuration(format!(
                "charValue must be a character. but was [{}]",
                value
            ))),
        }
    }

    fn date_value(&self) -> NaiveDateTime {
        // NaiveDateTime's default is the epoch
        self.date.unwrap_or_default()
    }
}

impl DefaultValues for BasicDefaultValues {
    fn get(&self, sql_type: SqlType, max_length: usize) -> Result<Value> {
        let value = match sql_type {
            SqlType::Char | SqlType::NChar => {
                Value::String(self.character.to_string().repeat(max_length))
            }
            SqlType::VarChar
            | SqlType::NVarChar
            | SqlType::LongVarChar
            | SqlType::LongNVarChar
            | SqlType::Clob
            | SqlType::NClob => Value::String(self.character.to_string()),
            t if t.is_numeric() => Value::Decimal(self.number.chars().take(max_length).collect()),
            SqlType::Date => Value::Date(self.date_value().date()),
            SqlType::Time => Value::Time(self.date_value().time()),
            SqlType::Timestamp => Value::DateTime(self.date_value()),
            t if t.is_binary() => Value::String(hex::encode([0u8; BINARY_DEFAULT_LEN])),
            t if t.is_boolean() => Value::Bool(false),
            other => {
                return Err(FixaError::NotSupported(format!(
                    "can't generate value of [{}]",
                    other
                )));
            }
        };
        Ok(value)
    }
}

/// SQL timestamp literal with an optional fraction of any length
fn parse_timestamp_escape(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M:%S%.f").ok()
}
