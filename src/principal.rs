//! Principal name resolution from session attributes

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Attribute holding the security context of an authenticated session
pub const SECURITY_CONTEXT_ATTRIBUTE: &str = "SECURITY_CONTEXT";

/// Attribute holding an explicitly indexed principal name.
/// Also the only index name supported by principal lookups.
pub const PRINCIPAL_NAME_INDEX_NAME: &str = "PRINCIPAL_NAME_INDEX_NAME";

/// Something that carries an authentication with a name
pub trait Authenticated {
    /// The authenticated principal name, if any
    fn authentication_name(&self) -> Option<String>;
}

/// Authentication details stored inside a [`SecurityContext`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authentication {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorities: Vec<String>,
}

/// Typed security context, stored as the [`SECURITY_CONTEXT_ATTRIBUTE`] attribute
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
}

impl SecurityContext {
    /// Create a context authenticated as `name`
    pub fn authenticated<S: Into<String>>(name: S) -> Self {
        Self {
            authentication: Some(Authentication {
                name: name.into(),
                authorities: Vec::new(),
            }),
        }
    }
}

impl Authenticated for SecurityContext {
    fn authentication_name(&self) -> Option<String> {
        self.authentication.as_ref().map(|auth| auth.name.clone())
    }
}

/// Raw attribute values resolve `authentication.name`
impl Authenticated for Value {
    fn authentication_name(&self) -> Option<String> {
        self.get("authentication")
            .and_then(|auth| auth.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Resolve a principal from an optional security context, falling back to
/// an explicitly stored name. Empty names count as absent.
pub fn resolve_principal(
    context: Option<&dyn Authenticated>,
    fallback: Option<&str>,
) -> Option<String> {
    context
        .and_then(|ctx| ctx.authentication_name())
        .filter(|name| !name.is_empty())
        .or_else(|| fallback.filter(|name| !name.is_empty()).map(str::to_string))
}

/// Resolve the principal of a session from its attributes
pub fn extract_principal(attributes: &HashMap<String, Value>) -> Option<String> {
    let context = attributes
        .get(SECURITY_CONTEXT_ATTRIBUTE)
        .map(|ctx| ctx as &dyn Authenticated);
    let fallback = attributes
        .get(PRINCIPAL_NAME_INDEX_NAME)
        .and_then(Value::as_str);
    resolve_principal(context, fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_security_context_wins() {
        let ctx = serde_json::to_value(SecurityContext::authenticated("alice")).unwrap();
        let attributes = attrs(&[
            (SECURITY_CONTEXT_ATTRIBUTE, ctx),
            (PRINCIPAL_NAME_INDEX_NAME, json!("bob")),
        ]);
        assert_eq!(extract_principal(&attributes), Some("alice".to_string()));
    }

    #[test]
    fn test_fallback_attribute() {
        let attributes = attrs(&[(PRINCIPAL_NAME_INDEX_NAME, json!("bob"))]);
        assert_eq!(extract_principal(&attributes), Some("bob".to_string()));
    }

    #[test]
    fn test_unresolvable_context_falls_back() {
        let attributes = attrs(&[
            (SECURITY_CONTEXT_ATTRIBUTE, json!({ "authentication": null })),
            (PRINCIPAL_NAME_INDEX_NAME, json!("bob")),
        ]);
        assert_eq!(extract_principal(&attributes), Some("bob".to_string()));

        let attributes = attrs(&[(SECURITY_CONTEXT_ATTRIBUTE, json!(42))]);
        assert_eq!(extract_principal(&attributes), None);
    }

    #[test]
    fn test_nothing_to_resolve() {
        assert_eq!(extract_principal(&HashMap::new()), None);
        let attributes = attrs(&[(PRINCIPAL_NAME_INDEX_NAME, json!(""))]);
        assert_eq!(extract_principal(&attributes), None);
    }

    #[test]
    fn test_typed_context() {
        let ctx = SecurityContext::authenticated("alice");
        assert_eq!(
            resolve_principal(Some(&ctx), None),
            Some("alice".to_string())
        );
        assert_eq!(
            resolve_principal(Some(&SecurityContext::default()), Some("bob")),
            Some("bob".to_string())
        );
    }
}
