use serde::{Deserialize, Serialize};

/// Listing entry for an uploaded file. Content is not included.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeFile {
    pub id: i64,
    pub filename: String,
    pub file_type: String,
    pub file_size: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewKnowledgeFile {
    pub filename: String,
    pub content: String,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
}

/// File ids arrive either as JSON numbers or as strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FileId {
    Number(i64),
    Text(String),
}

impl FileId {
    /// Zero and blank text count as a missing id.
    pub fn is_blank(&self) -> bool {
        match self {
            FileId::Number(n) => *n == 0,
            FileId::Text(s) => s.trim().is_empty(),
        }
    }

    /// Row id this value can refer to. Text that is not an integer cannot
    /// match any row.
    pub fn row_id(&self) -> Option<i64> {
        match self {
            FileId::Number(n) => Some(*n),
            FileId::Text(s) => s.trim().parse().ok(),
        }
    }
}
