//! Tool registry - the fixed catalog of callable tools.

use std::collections::HashMap;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Field names shared by the built-in tools.
pub const FIELD_RECIPIENT: &str = "recipient";
pub const FIELD_SUBJECT: &str = "subject";
pub const FIELD_BODY: &str = "body";

/// Tool name constants.
pub const TOOL_SEND_EMAIL: &str = "send_email";
pub const TOOL_HALLOWEEN_INVITATION: &str = "send_halloween_invitation";
pub const TOOL_SYSTEM_ALERT: &str = "send_system_alert";

/// Handler selected for a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Caller supplies recipient, subject and body.
    SendEmail,
    /// Caller supplies recipient only; fixed invitation text.
    HalloweenInvitation,
    /// Caller supplies recipient only; fixed alert text.
    SystemAlert,
}

/// Value type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
}

impl FieldType {
    /// Whether a JSON value has this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
        }
    }

    const fn json_name(self) -> &'static str {
        match self {
            Self::String => "string",
        }
    }
}

/// One named argument of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub field_type: FieldType,
    pub required: bool,
}

impl FieldSpec {
    #[must_use]
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            field_type: FieldType::String,
            required: true,
        }
    }
}

/// Ordered set of argument fields.
///
/// Serializes as a JSON Schema object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSchema {
    pub fields: Vec<FieldSpec>,
}

impl InputSchema {
    #[must_use]
    pub const fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Render as a JSON Schema object.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            properties.insert(
                field.name.to_string(),
                json!({
                    "type": field.field_type.json_name(),
                    "description": field.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_schema().serialize(serializer)
    }
}

/// Immutable description of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
    #[serde(skip)]
    pub kind: ToolKind,
}

/// Registry error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate tool name: {0}")]
    DuplicateName(String),
    #[error("Unknown tool: {0}")]
    NotFound(String),
}

/// Read-only tool catalog.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    by_name: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    /// Build a registry from definitions, preserving their order.
    ///
    /// # Errors
    /// Returns error if two definitions share a name.
    pub fn new(tools: Vec<ToolDefinition>) -> Result<Self, RegistryError> {
        let mut by_name = HashMap::with_capacity(tools.len());
        for (index, tool) in tools.iter().enumerate() {
            if by_name.insert(tool.name, index).is_some() {
                return Err(RegistryError::DuplicateName(tool.name.to_string()));
            }
        }
        Ok(Self { tools, by_name })
    }

    /// The built-in catalog: one open send tool and two templated tools.
    ///
    /// # Errors
    /// Returns error if the built-in names collide.
    pub fn builtin() -> Result<Self, RegistryError> {
        let recipient = FieldSpec::required(FIELD_RECIPIENT, "Recipient email address");
        Self::new(vec![
            ToolDefinition {
                name: TOOL_SEND_EMAIL,
                description: "Send a custom email",
                input_schema: InputSchema::new(vec![
                    recipient.clone(),
                    FieldSpec::required(FIELD_SUBJECT, "Email subject"),
                    FieldSpec::required(FIELD_BODY, "Email body (plain text)"),
                ]),
                kind: ToolKind::SendEmail,
            },
            ToolDefinition {
                name: TOOL_HALLOWEEN_INVITATION,
                description: "Send the Halloween invitation email",
                input_schema: InputSchema::new(vec![recipient.clone()]),
                kind: ToolKind::HalloweenInvitation,
            },
            ToolDefinition {
                name: TOOL_SYSTEM_ALERT,
                description: "Send the system login anomaly alert email",
                input_schema: InputSchema::new(vec![recipient]),
                kind: ToolKind::SystemAlert,
            },
        ])
    }

    /// Look up a tool by name.
    ///
    /// # Errors
    /// Returns `NotFound` for names outside the catalog.
    pub fn lookup(&self, name: &str) -> Result<&ToolDefinition, RegistryError> {
        self.by_name
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All tools in registration order.
    #[must_use]
    pub fn list(&self) -> &[ToolDefinition] {
        &self.tools
    }
}
