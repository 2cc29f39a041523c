use anchoring::Selector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            avatar: None,
        }
    }

    /// A fresh user with a random id and no name.
    pub fn anonymous() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Comment, tag or other payload attached to an annotation. Opaque here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationBody {
    pub id: String,
    pub annotation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl AnnotationBody {
    pub fn new(annotation: &str, purpose: Option<&str>, value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            annotation: annotation.to_string(),
            purpose: purpose.map(str::to_string),
            value: Some(value.into()),
            creator: None,
            created: Some(Utc::now()),
        }
    }
}

/// What an annotation points at: one selector per contiguous piece of text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationTarget {
    pub annotation: String,
    #[serde(default)]
    pub selector: Vec<Selector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl AnnotationTarget {
    pub fn new(annotation: impl Into<String>, selector: Vec<Selector>) -> Self {
        Self {
            annotation: annotation.into(),
            selector,
            creator: None,
            created: None,
            updated: None,
        }
    }

    /// The quoted text of all selectors, joined by a space.
    pub fn quote(&self) -> String {
        self.selector
            .iter()
            .map(Selector::quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Copy with every selector's live range dropped.
    pub fn detached(&self) -> Self {
        let mut out = self.clone();
        for s in &mut out.selector {
            *s.text_mut() = s.text().detached();
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    #[serde(default)]
    pub bodies: Vec<AnnotationBody>,
    pub target: AnnotationTarget,
}

impl Annotation {
    /// A new annotation with a v4 id around `selector`.
    pub fn new(selector: Vec<Selector>) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            target: AnnotationTarget::new(id.clone(), selector),
            id,
            bodies: Vec::new(),
        }
    }

    pub fn from_target(target: AnnotationTarget) -> Self {
        Self {
            id: target.annotation.clone(),
            bodies: Vec::new(),
            target,
        }
    }

    pub fn with_body(mut self, purpose: Option<&str>, value: impl Into<String>) -> Self {
        self.bodies
            .push(AnnotationBody::new(&self.id, purpose, value));
        self
    }
}
