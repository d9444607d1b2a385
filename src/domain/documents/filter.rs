use std::fmt;

use uuid::Uuid;

/// Document columns a caller may filter on. Column identifiers only ever
/// reach generated SQL through [`DocumentColumn::as_sql`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentColumn {
    Id,
    Name,
    Mime,
    IsFile,
    IsPublic,
}

impl DocumentColumn {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            "mime" => Some(Self::Mime),
            "is_file" | "file" => Some(Self::IsFile),
            "is_public" | "public" => Some(Self::IsPublic),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Id => "d.id",
            Self::Name => "d.name",
            Self::Mime => "d.mime",
            Self::IsFile => "d.is_file",
            Self::IsPublic => "d.is_public",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Mime => "mime",
            Self::IsFile => "is_file",
            Self::IsPublic => "is_public",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Text(String),
    Bool(bool),
    Id(Uuid),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Id(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    pub column: DocumentColumn,
    pub value: AttributeValue,
}

impl AttributeFilter {
    pub fn parse(name: &str, value: &str) -> Result<Self, String> {
        let column =
            DocumentColumn::parse(name).ok_or_else(|| format!("unknown filter attribute: {name}"))?;
        let value = match column {
            DocumentColumn::Name | DocumentColumn::Mime => AttributeValue::Text(value.to_string()),
            DocumentColumn::IsFile | DocumentColumn::IsPublic => match value.trim() {
                "true" => AttributeValue::Bool(true),
                "false" => AttributeValue::Bool(false),
                other => return Err(format!("expected true or false, got {other}")),
            },
            DocumentColumn::Id => AttributeValue::Id(
                Uuid::parse_str(value.trim()).map_err(|_| format!("invalid document id: {value}"))?,
            ),
        };
        Ok(Self { column, value })
    }
}

/// Narrowing applied on top of the read-access rule when listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub owner_login: Option<String>,
    pub attribute: Option<AttributeFilter>,
    pub limit: Option<i64>,
}

impl ListFilter {
    /// Builds a filter from raw query inputs. Empty strings mean "not set";
    /// the attribute filter applies only when both name and value are given,
    /// and a non-positive limit means no limit.
    pub fn from_raw(
        login: Option<&str>,
        key: Option<&str>,
        value: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Self, String> {
        let owner_login = login
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let attribute = match (
            key.filter(|s| !s.trim().is_empty()),
            value.filter(|s| !s.is_empty()),
        ) {
            (Some(k), Some(v)) => Some(AttributeFilter::parse(k, v)?),
            _ => None,
        };
        let limit = limit.filter(|n| *n > 0);
        Ok(Self {
            owner_login,
            attribute,
            limit,
        })
    }
}
