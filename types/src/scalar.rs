//! Declared attribute types.

/// The declared scalar type of an attribute.
///
/// Storage backends map their own column types onto these; the engine only
/// uses them to decide which attribute receives a generated key and how an
/// in-memory dataset fills defaults.
///
/// # Examples
///
/// ```
/// use trellis_types::ScalarType;
///
/// assert_eq!(ScalarType::from_declared("VARCHAR(255)"), ScalarType::Text);
/// assert_eq!(ScalarType::from_declared("bigint"), ScalarType::Integer);
/// assert!(ScalarType::Serial.is_generated());
/// ```
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ScalarType {
    /// Auto-incrementing integer primary key.
    Serial,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit floating point.
    Real,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Blob,
    /// Boolean, stored as an integer by SQL backends.
    Boolean,
    /// Point in time, stored as text by SQL backends.
    Timestamp,
    /// No declared type.
    #[default]
    Any,
}

impl ScalarType {
    /// Resolve a declared SQL column type using SQLite's affinity rules.
    ///
    /// See: <https://sqlite.org/datatype3.html#determination_of_column_affinity>
    #[must_use]
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("BOOL") {
            Self::Boolean
        } else if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.contains("BLOB") {
            Self::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else if upper.contains("DATE") || upper.contains("TIME") {
            Self::Timestamp
        } else {
            Self::Any
        }
    }

    /// Returns `true` when the storage generates values of this type on insert.
    #[inline]
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        matches!(self, Self::Serial)
    }

    /// The SQL type name used when rendering DDL.
    #[must_use]
    pub const fn to_sql_type(&self) -> &'static str {
        match self {
            Self::Serial | Self::Integer | Self::Boolean => "INTEGER",
            Self::Real => "REAL",
            Self::Text | Self::Timestamp => "TEXT",
            Self::Blob => "BLOB",
            Self::Any => "ANY",
        }
    }
}
