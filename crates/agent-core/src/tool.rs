//! Tool System
//!
//! Tool definitions, typed argument binding and the catalog the tool server
//! dispatches from. A catalog is an explicit value handed to the server, so
//! several independent servers can live in one process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    pub name: String,

    /// Raw arguments as produced by the model
    #[serde(default)]
    pub arguments: HashMap<String, Value>,

    /// Optional call ID for tracking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: HashMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: None,
        }
    }

    /// Build a call from a JSON object of arguments (anything else is treated as empty)
    pub fn from_json(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        Self::new(name, arguments)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Uniform outcome of one invocation. Serialises to a single text block;
/// success and failure are told apart by the presence of an `error` key.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolResult {
    Ok(Value),
    Err(String),
}

impl ToolResult {
    pub fn failure(message: impl Into<String>) -> Self {
        ToolResult::Err(message.into())
    }

    /// Classify a handler payload: an object carrying `error` is a failure
    pub fn from_payload(payload: Value) -> Self {
        match payload.get("error") {
            Some(Value::String(msg)) => ToolResult::Err(msg.clone()),
            Some(other) => ToolResult::Err(other.to_string()),
            None => ToolResult::Ok(payload),
        }
    }

    /// Parse the text block received over the wire
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(payload) => Self::from_payload(payload),
            // Not JSON: still a successful text payload
            Err(_) => ToolResult::Ok(Value::String(text.to_string())),
        }
    }

    /// Render as the single text block sent over the wire
    pub fn to_text(&self) -> String {
        match self {
            ToolResult::Ok(Value::String(s)) => s.clone(),
            ToolResult::Ok(payload) => {
                serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
            }
            ToolResult::Err(msg) => {
                serde_json::to_string_pretty(&json!({ "error": msg }))
                    .unwrap_or_else(|_| format!("{{\"error\": {msg:?}}}"))
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ToolResult::Ok(_))
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            ToolResult::Ok(v) => Some(v),
            ToolResult::Err(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ToolResult::Ok(_) => None,
            ToolResult::Err(msg) => Some(msg),
        }
    }
}

/// Engine-neutral primitive parameter type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Number,
}

impl ParamType {
    pub const ALL: [ParamType; 4] = [
        ParamType::String,
        ParamType::Integer,
        ParamType::Boolean,
        ParamType::Number,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Number => "number",
        }
    }

    /// Whether a literal JSON value is a member of this type
    pub fn admits(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Number => value.is_number(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamType {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        ParamType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AgentError::Config(format!("unsupported parameter type '{s}'")))
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn new(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            default: None,
            enum_values: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    fn property_json(&self) -> Value {
        let mut prop = serde_json::Map::new();
        prop.insert("type".into(), json!(self.param_type.as_str()));
        prop.insert("description".into(), json!(self.description));
        if let Some(values) = &self.enum_values {
            prop.insert("enum".into(), Value::Array(values.clone()));
        }
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }
        Value::Object(prop)
    }
}

/// Tool definition (name, description, ordered parameters)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions, in declaration order
    pub parameters: Vec<ParameterSchema>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParameterSchema) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSchema> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Names of required parameters, in declaration order
    pub fn required_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Check the schema invariants: unique names, enum values and defaults of the declared type
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AgentError::Config("tool name must not be empty".into()));
        }
        for (i, param) in self.parameters.iter().enumerate() {
            if self.parameters[..i].iter().any(|p| p.name == param.name) {
                return Err(AgentError::Config(format!(
                    "tool '{}' declares parameter '{}' twice",
                    self.name, param.name
                )));
            }
            if let Some(values) = &param.enum_values {
                if let Some(bad) = values.iter().find(|v| !param.param_type.admits(v)) {
                    return Err(AgentError::Config(format!(
                        "tool '{}': enum value {} of '{}' is not a {}",
                        self.name, bad, param.name, param.param_type
                    )));
                }
            }
            if let Some(default) = &param.default {
                if !param.param_type.admits(default) {
                    return Err(AgentError::Config(format!(
                        "tool '{}': default {} of '{}' is not a {}",
                        self.name, default, param.name, param.param_type
                    )));
                }
            }
        }
        Ok(())
    }

    /// JSON-schema object: `{type: "object", properties, required}`
    pub fn input_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.property_json()))
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_names(),
        })
    }

    /// Rebuild a definition from a JSON-schema object received over the wire.
    ///
    /// An unrecognised property type or a required name without a property
    /// is a configuration error.
    pub fn from_input_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: &Value,
    ) -> Result<Self> {
        let name = name.into();
        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let required: Vec<String> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(missing) = required.iter().find(|r| !properties.contains_key(*r)) {
            return Err(AgentError::Config(format!(
                "tool '{name}' requires '{missing}' but does not declare it"
            )));
        }

        let mut parameters = Vec::with_capacity(properties.len());
        for (prop_name, prop) in properties {
            let type_name = prop.get("type").and_then(Value::as_str).unwrap_or("string");
            let mut param = ParameterSchema::new(
                prop_name.clone(),
                type_name.parse()?,
                prop.get("description").and_then(Value::as_str).unwrap_or_default(),
            );
            param.required = required.contains(&prop_name);
            param.default = prop.get("default").cloned();
            param.enum_values = prop.get("enum").and_then(Value::as_array).cloned();
            parameters.push(param);
        }

        let definition = Self {
            name,
            description: description.into(),
            parameters,
        };
        definition.validate()?;
        Ok(definition)
    }

    /// Bind raw model arguments to typed values.
    ///
    /// Required names must be present and non-null, each declared value must
    /// convert to its declared type and sit inside its enum, absent optional
    /// parameters take their default. Undeclared names are ignored.
    pub fn bind(&self, call: &ToolCall) -> Result<Arguments> {
        let mut values = BTreeMap::new();

        for param in &self.parameters {
            let raw = call.arguments.get(&param.name).filter(|v| !v.is_null());
            let raw = match (raw, &param.default) {
                (Some(v), _) => v,
                (None, _) if param.required => {
                    return Err(AgentError::ToolValidation(format!(
                        "missing required parameter: {}",
                        param.name
                    )));
                }
                (None, Some(default)) => default,
                (None, None) => continue,
            };

            let value = ArgValue::convert(param.param_type, raw).ok_or_else(|| {
                AgentError::ToolValidation(format!(
                    "parameter '{}' expects {}, got {}",
                    param.name, param.param_type, raw
                ))
            })?;

            if let Some(allowed) = &param.enum_values {
                if !allowed.iter().any(|a| value.matches(a)) {
                    return Err(AgentError::ToolValidation(format!(
                        "parameter '{}' must be one of {}",
                        param.name,
                        Value::Array(allowed.clone())
                    )));
                }
            }

            values.insert(param.name.clone(), value);
        }

        for extra in call.arguments.keys().filter(|k| self.parameter(k).is_none()) {
            tracing::debug!(tool = %self.name, argument = %extra, "Ignoring undeclared argument");
        }

        Ok(Arguments(values))
    }
}

/// A bound argument value, one variant per declared parameter type
#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Number(f64),
}

impl ArgValue {
    fn convert(ty: ParamType, raw: &Value) -> Option<Self> {
        match ty {
            ParamType::String => raw.as_str().map(|s| ArgValue::String(s.to_string())),
            ParamType::Integer => raw.as_i64().or_else(|| integral(raw)).map(ArgValue::Integer),
            ParamType::Boolean => raw.as_bool().map(ArgValue::Boolean),
            ParamType::Number => raw.as_f64().map(ArgValue::Number),
        }
    }

    /// Compare against an enum literal
    fn matches(&self, literal: &Value) -> bool {
        match self {
            ArgValue::String(s) => literal.as_str() == Some(s.as_str()),
            ArgValue::Integer(i) => literal.as_i64() == Some(*i),
            ArgValue::Boolean(b) => literal.as_bool() == Some(*b),
            ArgValue::Number(n) => literal.as_f64().is_some_and(|l| (l - n).abs() < f64::EPSILON),
        }
    }
}

/// Some providers send every number as a float; accept `5.0` for an integer
#[allow(clippy::cast_possible_truncation)]
fn integral(raw: &Value) -> Option<i64> {
    let f = raw.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
}

/// Typed, schema-checked arguments handed to a tool handler
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments(BTreeMap<String, ArgValue>);

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ArgValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(ArgValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.0.get(name) {
            Some(ArgValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Tool trait - implement to add new capabilities.
///
/// Handlers must not keep state between calls.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's definition
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with schema-checked arguments, returning its structured payload
    async fn execute(&self, args: &Arguments) -> Result<Value>;
}

/// Registry of available tools, kept in registration order
pub struct ToolRegistry {
    tools: Vec<(ToolDefinition, Arc<dyn Tool>)>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_shared(Arc::new(tool))
    }

    /// Register a shared tool. Definitions are validated once, here.
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let definition = tool.definition();
        definition.validate()?;
        if self.get(&definition.name).is_some() {
            return Err(AgentError::Config(format!(
                "tool '{}' is already registered",
                definition.name
            )));
        }
        self.tools.push((definition, tool));
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|(def, _)| def.name == name)
            .map(|(_, tool)| tool.clone())
    }

    pub fn definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().map(|(def, _)| def).find(|def| def.name == name)
    }

    /// Bind and execute a tool call
    pub async fn execute(&self, call: &ToolCall) -> Result<Value> {
        let (definition, tool) = self
            .tools
            .iter()
            .find(|(def, _)| def.name == call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        let args = definition.bind(call)?;
        tool.execute(&args).await
    }

    /// All definitions in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|(def, _)| def.clone()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|(def, _)| def.name.as_str()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
