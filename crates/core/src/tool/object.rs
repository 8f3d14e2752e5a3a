use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use super::{Error, Tool, ToolResult};

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn execute(
        self: Arc<Self>,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>>;
}

pub(crate) struct ToolObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    fn execute(
        self: Arc<Self>,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        let input: T::Input = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(err) => {
                let reason = format!("{err}");
                return Box::pin(std::future::ready(ToolResult::Err(
                    Error::invalid_input().with_reason(reason),
                )));
            }
        };

        let span = debug_span!("tool execute", tool = self.0.name());
        Box::pin(self.0.execute(input).instrument(span))
    }
}

/// Checks `arguments` against the declared properties of a JSON schema.
///
/// Arguments must be an object. If the schema declares properties and
/// doesn't allow additional ones, every argument must be declared.
pub(crate) fn check_arguments(
    schema: &Value,
    arguments: &Value,
) -> Result<(), String> {
    let Some(arguments) = arguments.as_object() else {
        return Err(format!("expected an object, got `{arguments}`"));
    };
    let Some(properties) = schema.get("properties").and_then(Value::as_object)
    else {
        return Ok(());
    };
    let allows_additional = match schema.get("additionalProperties") {
        Some(Value::Bool(allowed)) => *allowed,
        Some(Value::Object(_)) => true,
        _ => false,
    };
    if allows_additional {
        return Ok(());
    }
    match arguments.keys().find(|key| !properties.contains_key(*key)) {
        Some(key) => Err(format!("unknown argument `{key}`")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_check_arguments() {
        let schema = json!({
            "type": "object",
            "properties": {
                "content": { "type": "string" },
                "filename": { "type": ["string", "null"] }
            },
            "required": ["content"]
        });
        assert!(check_arguments(&schema, &json!({ "content": "x" })).is_ok());
        assert!(
            check_arguments(
                &schema,
                &json!({ "content": "x", "filename": null })
            )
            .is_ok()
        );
        assert_eq!(
            check_arguments(&schema, &json!({ "content": "x", "path": "/" })),
            Err("unknown argument `path`".to_owned())
        );
        assert_eq!(
            check_arguments(&schema, &json!("x")),
            Err("expected an object, got `\"x\"`".to_owned())
        );

        let open_schema = json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "additionalProperties": true
        });
        assert!(
            check_arguments(&open_schema, &json!({ "query": "x", "n": 1 }))
                .is_ok()
        );
        assert!(check_arguments(&Value::Null, &json!({ "any": 1 })).is_ok());
    }
}
