//! Schema Translator
//!
//! Turns tool definitions into the function declarations a model's
//! function-calling interface expects. Providers differ only in their
//! primitive type vocabulary, so a translator is mostly a type table.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::tool::{ParamType, ToolDefinition};

/// Model-facing function declaration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: DeclaredParameters,
}

/// `{type: "object", properties, required}` in the provider's vocabulary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeclaredParameters {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

/// Provider-specific declaration format
pub trait SchemaTranslator: Send + Sync {
    /// Provider spelling of a primitive type. Total over [`ParamType`].
    fn type_name(&self, ty: ParamType) -> &'static str;

    /// Provider spelling of the top-level object type
    fn object_type(&self) -> &'static str;

    /// Translate one definition. Enum values and the required set pass through unchanged.
    fn translate(&self, def: &ToolDefinition) -> Result<FunctionDeclaration> {
        def.validate()?;

        let properties = def
            .parameters
            .iter()
            .map(|p| {
                let mut prop = Map::new();
                prop.insert("type".into(), json!(self.type_name(p.param_type)));
                prop.insert("description".into(), json!(p.description));
                if let Some(values) = &p.enum_values {
                    prop.insert("enum".into(), Value::Array(values.clone()));
                }
                (p.name.clone(), Value::Object(prop))
            })
            .collect();

        Ok(FunctionDeclaration {
            name: def.name.clone(),
            description: def.description.clone(),
            parameters: DeclaredParameters {
                kind: self.object_type().into(),
                properties,
                required: def.required_names().into_iter().map(String::from).collect(),
            },
        })
    }

    /// Translate a whole catalog, preserving order
    fn translate_all(&self, defs: &[ToolDefinition]) -> Result<Vec<FunctionDeclaration>> {
        defs.iter().map(|d| self.translate(d)).collect()
    }
}

/// Plain JSON-schema vocabulary (lowercase type names)
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSchemaTranslator;

impl SchemaTranslator for JsonSchemaTranslator {
    fn type_name(&self, ty: ParamType) -> &'static str {
        ty.as_str()
    }

    fn object_type(&self) -> &'static str {
        "object"
    }
}
