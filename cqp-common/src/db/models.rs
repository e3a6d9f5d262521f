//! Database models

use serde::{Deserialize, Serialize};

/// Classification fixing the required digit count of a personal number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    /// 7-digit personal number
    Short,
    /// 9-digit personal number
    Long,
}

impl IdKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::Short => "short",
            IdKind::Long => "long",
        }
    }

    pub fn parse(value: &str) -> Option<IdKind> {
        match value {
            "short" => Some(IdKind::Short),
            "long" => Some(IdKind::Long),
            _ => None,
        }
    }

    /// Digit count a login identifier must have for this kind
    pub fn expected_digits(&self) -> usize {
        match self {
            IdKind::Short => 7,
            IdKind::Long => 9,
        }
    }
}

/// Declared kind of a questionnaire question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    Textarea,
    Select,
    Radio,
    Scale,
    Checkbox,
    MultiSelect,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Text => "text",
            QuestionKind::Textarea => "textarea",
            QuestionKind::Select => "select",
            QuestionKind::Radio => "radio",
            QuestionKind::Scale => "scale",
            QuestionKind::Checkbox => "checkbox",
            QuestionKind::MultiSelect => "multi_select",
        }
    }

    pub fn parse(value: &str) -> Option<QuestionKind> {
        match value {
            "text" => Some(QuestionKind::Text),
            "textarea" => Some(QuestionKind::Textarea),
            "select" => Some(QuestionKind::Select),
            "radio" => Some(QuestionKind::Radio),
            "scale" => Some(QuestionKind::Scale),
            "checkbox" => Some(QuestionKind::Checkbox),
            "multi_select" => Some(QuestionKind::MultiSelect),
            _ => None,
        }
    }

    /// Multi-select kinds store their value as a JSON array
    pub fn is_multi_select(&self) -> bool {
        matches!(self, QuestionKind::Checkbox | QuestionKind::MultiSelect)
    }
}

/// A registered participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub personal_number: Option<String>,
    pub id_kind: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub password_salt: Option<String>,
    pub full_name: Option<String>,
    pub is_blocked: bool,
    pub failed_attempts: i64,
    pub assigned_form_id: Option<i64>,
}

impl Identity {
    /// True when both login credentials are on record
    pub fn has_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
            && self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }
}

/// A questionnaire question definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub form_id: i64,
    pub label: String,
    pub kind: String,
    pub options: Option<String>,
    pub is_required: bool,
    pub sort_order: i64,
}
