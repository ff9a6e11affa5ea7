//! Topic data model shared by the extractor, the index, and the snapshot.
//!
//! A [`Topic`] is one documentable unit: a conceptual page authored in
//! markdown, or a namespace / type / member taken from generated
//! managed-reference YAML. Every topic carries a coarse [`TopicType`]
//! (which extraction path produced it) and a [`DetailedType`] used for
//! filtering and display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which extraction path produced a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicType {
    /// Authored markdown with a `uid` in its front matter.
    Conceptual,
    /// An item from a `### YamlMime:ManagedReference` document.
    ManagedReference,
}

/// Derived classification of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DetailedType {
    Conceptual,
    Namespace,
    Type,
    Property,
    Method,
    PowerShellCmdlet,
    Other,
}

impl DetailedType {
    /// All variants, in display order.
    pub const ALL: [DetailedType; 7] = [
        DetailedType::Conceptual,
        DetailedType::Namespace,
        DetailedType::Type,
        DetailedType::Property,
        DetailedType::Method,
        DetailedType::PowerShellCmdlet,
        DetailedType::Other,
    ];

    /// Classify a managed-reference item by its `type` field.
    ///
    /// | `type` | Detailed type |
    /// |--------|---------------|
    /// | `Namespace` | `Namespace` |
    /// | `Class`, `Struct`, `Interface`, `Delegate` | `Type` |
    /// | `Property` | `Property` |
    /// | `Method`, `Constructor` | `Method` |
    /// | `Cmdlet`, `PowerShellCmdlet` | `PowerShellCmdlet` |
    /// | anything else | `Other` |
    ///
    /// Comparison ignores ASCII case.
    pub fn from_member_type(member_type: &str) -> Self {
        match member_type.to_ascii_lowercase().as_str() {
            "namespace" => DetailedType::Namespace,
            "class" | "struct" | "interface" | "delegate" => DetailedType::Type,
            "property" => DetailedType::Property,
            "method" | "constructor" => DetailedType::Method,
            "cmdlet" | "powershellcmdlet" => DetailedType::PowerShellCmdlet,
            _ => DetailedType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetailedType::Conceptual => "Conceptual",
            DetailedType::Namespace => "Namespace",
            DetailedType::Type => "Type",
            DetailedType::Property => "Property",
            DetailedType::Method => "Method",
            DetailedType::PowerShellCmdlet => "PowerShellCmdlet",
            DetailedType::Other => "Other",
        }
    }
}

impl fmt::Display for DetailedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown detailed type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDetailedType(pub String);

impl fmt::Display for UnknownDetailedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown topic type: '{}'", self.0)
    }
}

impl std::error::Error for UnknownDetailedType {}

impl FromStr for DetailedType {
    type Err = UnknownDetailedType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DetailedType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownDetailedType(s.to_string()))
    }
}

/// A documentable unit, keyed by its project-unique UID.
///
/// Serialized with camelCase field names; this is the record format of the
/// persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub uid: String,
    pub coarse_type: TopicType,
    pub detailed_type: DetailedType,
    /// File that defines the topic. Relative to the project directory (with
    /// `/` separators) once the topic has been ingested by the cache.
    pub source_file: String,
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_type: Option<String>,
}

impl Topic {
    /// A conceptual topic. `name` defaults to the UID and `title` to the name.
    pub fn conceptual(
        uid: impl Into<String>,
        source_file: impl Into<String>,
        name: Option<String>,
        title: Option<String>,
    ) -> Self {
        let uid = uid.into();
        let name = name.unwrap_or_else(|| uid.clone());
        let title = title.unwrap_or_else(|| name.clone());
        let mut topic = Topic {
            uid,
            coarse_type: TopicType::Conceptual,
            detailed_type: DetailedType::Conceptual,
            source_file: source_file.into(),
            name,
            title,
            member_type: None,
        };
        topic.categorize();
        topic
    }

    /// A managed-reference topic, classified from `member_type`.
    pub fn managed_reference(
        uid: impl Into<String>,
        source_file: impl Into<String>,
        member_type: Option<String>,
        name: Option<String>,
        title: Option<String>,
    ) -> Self {
        let uid = uid.into();
        let name = name.unwrap_or_else(|| uid.clone());
        let title = title.unwrap_or_else(|| name.clone());
        let mut topic = Topic {
            uid,
            coarse_type: TopicType::ManagedReference,
            detailed_type: DetailedType::Other,
            source_file: source_file.into(),
            name,
            title,
            member_type,
        };
        topic.categorize();
        topic
    }

    /// Recompute `detailed_type` from the coarse type and member type.
    pub fn categorize(&mut self) {
        self.detailed_type = match self.coarse_type {
            TopicType::Conceptual => DetailedType::Conceptual,
            TopicType::ManagedReference => self
                .member_type
                .as_deref()
                .map(DetailedType::from_member_type)
                .unwrap_or(DetailedType::Other),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_type_table() {
        let cases = [
            ("Namespace", DetailedType::Namespace),
            ("Class", DetailedType::Type),
            ("Struct", DetailedType::Type),
            ("Interface", DetailedType::Type),
            ("Delegate", DetailedType::Type),
            ("Property", DetailedType::Property),
            ("Method", DetailedType::Method),
            ("Constructor", DetailedType::Method),
            ("Cmdlet", DetailedType::PowerShellCmdlet),
            ("Field", DetailedType::Other),
            ("Event", DetailedType::Other),
            ("", DetailedType::Other),
        ];
        for (member_type, expected) in cases {
            assert_eq!(
                DetailedType::from_member_type(member_type),
                expected,
                "member type {:?}",
                member_type
            );
        }
    }

    #[test]
    fn conceptual_defaults_name_and_title_to_uid() {
        let topic = Topic::conceptual("Getting.Started", "articles/intro.md", None, None);
        assert_eq!(topic.name, "Getting.Started");
        assert_eq!(topic.title, "Getting.Started");
        assert_eq!(topic.detailed_type, DetailedType::Conceptual);
        assert_eq!(topic.coarse_type, TopicType::Conceptual);
    }

    #[test]
    fn managed_reference_without_type_is_other() {
        let topic = Topic::managed_reference("Foo", "api/Foo.yml", None, None, None);
        assert_eq!(topic.detailed_type, DetailedType::Other);
    }

    #[test]
    fn detailed_type_parses_case_insensitively() {
        assert_eq!("method".parse::<DetailedType>(), Ok(DetailedType::Method));
        assert_eq!(
            "POWERSHELLCMDLET".parse::<DetailedType>(),
            Ok(DetailedType::PowerShellCmdlet)
        );
        assert!("widget".parse::<DetailedType>().is_err());
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let topic = Topic::managed_reference(
            "Foo.Bar",
            "api/Foo.Bar.yml",
            Some("Method".to_string()),
            Some("Foo.Bar()".to_string()),
            Some("Bar()".to_string()),
        );
        let json = serde_json::to_value(&topic).unwrap();
        assert_eq!(json["coarseType"], "ManagedReference");
        assert_eq!(json["detailedType"], "Method");
        assert_eq!(json["sourceFile"], "api/Foo.Bar.yml");
        assert_eq!(json["memberType"], "Method");

        let conceptual = Topic::conceptual("a", "a.md", None, None);
        let json = serde_json::to_value(&conceptual).unwrap();
        assert!(json.get("memberType").is_none());
    }
}
