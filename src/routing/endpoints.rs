//! Static operation tables.
//!
//! Maps an [`OperationKey`] plus its payload onto a concrete REST call
//! (method, path, query, body) or a legacy SDK method name. Functions use
//! an explicit table with a derived default; entities use CRUD defaults on
//! `/{lowercased-entity}`.
//!
//! Entity payloads carry the verb in an `action` field:
//!
//! ```json
//! { "action": "update", "id": "u1", "data": { "name": "Ada" } }
//! ```
//!
//! A missing `action` means `list`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{MigrationError, OperationKey};

/// A function endpoint entry: HTTP method and path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// HTTP method.
    pub method: Method,
    /// Path template; `{name}` segments are filled from the payload.
    pub path: String,
}

impl Endpoint {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

/// Everything outside the RFC 3986 unreserved set is escaped in a path
/// parameter.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Function name → (method, path template).
const FUNCTION_ENDPOINTS: &[(&str, &str, &str)] = &[
    ("generateAICoaching", "POST", "/ai/coaching"),
    ("streamAICoaching", "POST", "/ai/coaching/stream"),
    ("createAssessment", "POST", "/assessments"),
    ("getAssessmentResults", "GET", "/assessments/{id}/results"),
    ("getUserProfile", "GET", "/users/profile"),
    ("updateUserProfile", "PUT", "/users/profile"),
    ("getTeams", "GET", "/teams"),
    ("createTeam", "POST", "/teams"),
    ("getTeamMembers", "GET", "/teams/{teamId}/members"),
    ("getUserAnalytics", "GET", "/analytics/user/{id}"),
    ("getTeamAnalytics", "GET", "/analytics/team/{teamId}"),
    ("sendNotification", "POST", "/notifications"),
    ("uploadFile", "POST", "/files"),
];

/// Function name → legacy SDK method.
const SDK_METHODS: &[(&str, &str)] = &[
    ("generateAICoaching", "integrations.Core.InvokeLLM"),
    ("streamAICoaching", "integrations.Core.InvokeLLM"),
    ("getUserProfile", "auth.me"),
    ("updateUserProfile", "auth.updateMe"),
    ("sendNotification", "integrations.Core.SendEmail"),
    ("uploadFile", "integrations.Core.UploadFile"),
];

/// CRUD verb of an entity operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityAction {
    /// Fetch all records.
    List,
    /// Fetch records matching a query.
    Filter,
    /// Fetch one record by id.
    Get,
    /// Create a record.
    Create,
    /// Update a record by id.
    Update,
    /// Delete a record by id.
    Delete,
}

impl EntityAction {
    /// Lowercase verb as used in SDK method names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Filter => "filter",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Read the `action` field of an entity payload; absent means `List`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Unknown`] for an unrecognised verb.
    pub fn from_payload(data: &Value) -> Result<Self, MigrationError> {
        match data.get("action") {
            None | Some(Value::Null) => Ok(Self::List),
            Some(Value::String(verb)) => match verb.to_ascii_lowercase().as_str() {
                "list" => Ok(Self::List),
                "filter" => Ok(Self::Filter),
                "get" => Ok(Self::Get),
                "create" => Ok(Self::Create),
                "update" => Ok(Self::Update),
                "delete" => Ok(Self::Delete),
                other => Err(MigrationError::unknown(format!(
                    "unknown entity action '{other}'"
                ))),
            },
            Some(other) => Err(MigrationError::unknown(format!(
                "entity action must be a string, got {other}"
            ))),
        }
    }

    fn needs_id(&self) -> bool {
        matches!(self, Self::Get | Self::Update | Self::Delete)
    }
}

/// A fully resolved REST call.
#[derive(Debug, Clone, PartialEq)]
pub struct RestCall {
    /// HTTP method.
    pub method: Method,
    /// Concrete path with templates filled.
    pub path: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// JSON body for methods that carry one.
    pub body: Option<Value>,
}

/// The endpoint entry for a function, or the derived default
/// `POST /{lowercased-name}`.
pub fn function_endpoint(name: &str) -> Endpoint {
    FUNCTION_ENDPOINTS
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|(_, method, path)| Endpoint::new(parse_method(method), *path))
        .unwrap_or_else(|| Endpoint::new(Method::POST, format!("/{}", name.to_lowercase())))
}

/// The CRUD endpoint for an entity action.
pub fn entity_endpoint(entity: &str, action: EntityAction) -> Endpoint {
    let base = format!("/{}", entity.to_lowercase());
    match action {
        EntityAction::List | EntityAction::Filter => Endpoint::new(Method::GET, base),
        EntityAction::Get => Endpoint::new(Method::GET, format!("{base}/{{id}}")),
        EntityAction::Create => Endpoint::new(Method::POST, base),
        EntityAction::Update => Endpoint::new(Method::PUT, format!("{base}/{{id}}")),
        EntityAction::Delete => Endpoint::new(Method::DELETE, format!("{base}/{{id}}")),
    }
}

/// Whether a function has an explicit endpoint entry.
pub fn is_mapped(name: &str) -> bool {
    FUNCTION_ENDPOINTS.iter().any(|(n, _, _)| *n == name)
}

/// Resolve `operation` and its payload into a concrete REST call.
///
/// # Errors
///
/// Returns [`MigrationError::Unknown`] when a path parameter is missing
/// from the payload or an entity action is invalid.
pub fn resolve_rest_call(operation: &OperationKey, data: &Value) -> Result<RestCall, MigrationError> {
    if operation.is_entity() {
        resolve_entity_call(operation.name(), data)
    } else {
        resolve_function_call(operation.name(), data)
    }
}

fn resolve_function_call(name: &str, data: &Value) -> Result<RestCall, MigrationError> {
    let endpoint = function_endpoint(name);
    let (path, consumed) = fill_template(&endpoint.path, data)?;
    let remaining = strip_keys(data, &consumed);

    if carries_body(&endpoint.method) {
        Ok(RestCall {
            method: endpoint.method,
            path,
            query: Vec::new(),
            body: Some(remaining),
        })
    } else {
        Ok(RestCall {
            method: endpoint.method,
            path,
            query: scalar_pairs(&remaining),
            body: None,
        })
    }
}

fn resolve_entity_call(entity: &str, data: &Value) -> Result<RestCall, MigrationError> {
    let action = EntityAction::from_payload(data)?;
    if action.needs_id() && data.get("id").map_or(true, Value::is_null) {
        return Err(MigrationError::unknown(format!(
            "entity:{entity} {} requires an 'id'",
            action.as_str()
        )));
    }

    let endpoint = entity_endpoint(entity, action);
    let (path, _) = fill_template(&endpoint.path, data)?;

    let query = match action {
        EntityAction::Filter | EntityAction::List => {
            data.get("query").map(scalar_pairs).unwrap_or_default()
        }
        _ => Vec::new(),
    };
    let body = match action {
        EntityAction::Create | EntityAction::Update => Some(
            data.get("data")
                .cloned()
                .unwrap_or_else(|| strip_keys(data, &["action", "id", "query"])),
        ),
        _ => None,
    };

    Ok(RestCall {
        method: endpoint.method,
        path,
        query,
        body,
    })
}

/// The SDK method for a function, or the derived default
/// `functions.<name>`.
pub fn sdk_method(name: &str) -> String {
    SDK_METHODS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, method)| (*method).to_string())
        .unwrap_or_else(|| format!("functions.{name}"))
}

/// The legacy SDK method and arguments for `operation`.
///
/// Functions resolve through [`sdk_method`] and take the payload as is;
/// entities call `entities.<Entity>.<verb>` with the payload minus
/// `action`.
///
/// # Errors
///
/// Returns [`MigrationError::Unknown`] for an invalid entity action.
pub fn sdk_call(operation: &OperationKey, data: &Value) -> Result<(String, Value), MigrationError> {
    if operation.is_entity() {
        let action = EntityAction::from_payload(data)?;
        Ok((
            format!("entities.{}.{}", operation.name(), action.as_str()),
            strip_keys(data, &["action"]),
        ))
    } else {
        Ok((sdk_method(operation.name()), data.clone()))
    }
}

/// Fill `{name}` segments of `template` from top-level payload fields.
///
/// Each value is percent-encoded as a single path segment, so `/`, `?` and
/// `#` inside a value never change the request target. Returns the filled
/// path and the names consumed.
///
/// # Errors
///
/// Returns [`MigrationError::Unknown`] when a referenced field is missing,
/// not a string/number, or a dot segment (`.` or `..`).
pub fn fill_template(template: &str, data: &Value) -> Result<(String, Vec<String>), MigrationError> {
    let mut out = String::with_capacity(template.len());
    let mut consumed = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            MigrationError::unknown(format!("unterminated path parameter in '{template}'"))
        })?;
        let name = &after[..close];
        let value = match data.get(name) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(MigrationError::unknown(format!(
                    "path '{template}' requires parameter '{name}'"
                )))
            }
        };
        if value == "." || value == ".." {
            return Err(MigrationError::unknown(format!(
                "path parameter '{name}' cannot be '{value}'"
            )));
        }
        out.extend(utf8_percent_encode(&value, PATH_SEGMENT));
        consumed.push(name.to_string());
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok((out, consumed))
}

fn carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

fn parse_method(raw: &str) -> Method {
    match raw {
        "GET" => Method::GET,
        "PUT" => Method::PUT,
        "PATCH" => Method::PATCH,
        "DELETE" => Method::DELETE,
        _ => Method::POST,
    }
}

fn strip_keys<S: AsRef<str>>(data: &Value, keys: &[S]) -> Value {
    match data {
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| !keys.iter().any(|drop| drop.as_ref() == k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Value::Object(kept)
        }
        other => other.clone(),
    }
}

fn scalar_pairs(data: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = data else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k.clone(), s.clone())),
            Value::Number(n) => Some((k.clone(), n.to_string())),
            Value::Bool(b) => Some((k.clone(), b.to_string())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_function_endpoints() {
        let call = resolve_rest_call(
            &OperationKey::function("generateAICoaching"),
            &json!({"prompt": "hi"}),
        )
        .unwrap();
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.path, "/ai/coaching");
        assert_eq!(call.body, Some(json!({"prompt": "hi"})));

        let call = resolve_rest_call(&OperationKey::function("getTeams"), &json!({})).unwrap();
        assert_eq!((call.method, call.path.as_str()), (Method::GET, "/teams"));
        assert!(call.body.is_none());
    }

    #[test]
    fn test_path_template_filled_and_consumed() {
        let call = resolve_rest_call(
            &OperationKey::function("getUserAnalytics"),
            &json!({"id": "u-42", "range": "30d"}),
        )
        .unwrap();
        assert_eq!(call.path, "/analytics/user/u-42");
        assert_eq!(call.query, vec![("range".to_string(), "30d".to_string())]);
    }

    #[test]
    fn test_path_parameters_are_percent_encoded() {
        let users = OperationKey::entity("Users");
        let call = resolve_rest_call(
            &users,
            &json!({"action": "delete", "id": "u1/../../admin?force=1"}),
        )
        .unwrap();
        assert_eq!(call.path, "/users/u1%2F..%2F..%2Fadmin%3Fforce%3D1");

        let call = resolve_rest_call(
            &OperationKey::function("getTeamMembers"),
            &json!({"teamId": "t 1#x"}),
        )
        .unwrap();
        assert_eq!(call.path, "/teams/t%201%23x/members");

        let err = resolve_rest_call(&users, &json!({"action": "get", "id": ".."})).unwrap_err();
        assert!(err.message().contains("cannot be '..'"));
    }

    #[test]
    fn test_missing_path_parameter_is_error() {
        let err = resolve_rest_call(&OperationKey::function("getUserAnalytics"), &json!({}))
            .unwrap_err();
        assert!(err.message().contains("'id'"));
    }

    #[test]
    fn test_unmapped_function_defaults_to_post_lowercase() {
        let call = resolve_rest_call(&OperationKey::function("ArchiveReport"), &json!({"x": 1}))
            .unwrap();
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.path, "/archivereport");
        assert!(!is_mapped("ArchiveReport"));
    }

    #[test]
    fn test_entity_crud_defaults() {
        let users = OperationKey::entity("Users");
        let list = resolve_rest_call(&users, &json!({})).unwrap();
        assert_eq!((list.method, list.path.as_str()), (Method::GET, "/users"));

        let get = resolve_rest_call(&users, &json!({"action": "get", "id": 7})).unwrap();
        assert_eq!((get.method, get.path.as_str()), (Method::GET, "/users/7"));

        let update = resolve_rest_call(
            &users,
            &json!({"action": "update", "id": "u1", "data": {"name": "Ada"}}),
        )
        .unwrap();
        assert_eq!(update.method, Method::PUT);
        assert_eq!(update.body, Some(json!({"name": "Ada"})));

        let delete = resolve_rest_call(&users, &json!({"action": "delete", "id": "u1"})).unwrap();
        assert_eq!(delete.method, Method::DELETE);
    }

    #[test]
    fn test_entity_filter_uses_query() {
        let call = resolve_rest_call(
            &OperationKey::entity("Assessment"),
            &json!({"action": "filter", "query": {"status": "open", "limit": 10}}),
        )
        .unwrap();
        assert_eq!(call.path, "/assessment");
        assert!(call.query.contains(&("status".to_string(), "open".to_string())));
        assert!(call.query.contains(&("limit".to_string(), "10".to_string())));
    }

    #[test]
    fn test_entity_get_without_id_is_error() {
        assert!(resolve_rest_call(&OperationKey::entity("Users"), &json!({"action": "get"})).is_err());
    }

    #[test]
    fn test_unknown_action_is_error() {
        assert!(EntityAction::from_payload(&json!({"action": "upsert"})).is_err());
    }

    #[test]
    fn test_sdk_names() {
        let (method, args) = sdk_call(&OperationKey::function("getTeams"), &json!({"a": 1})).unwrap();
        assert_eq!(method, "functions.getTeams");
        assert_eq!(args, json!({"a": 1}));

        let (method, _) =
            sdk_call(&OperationKey::function("getUserProfile"), &json!({})).unwrap();
        assert_eq!(method, "auth.me");
        assert_eq!(sdk_method("generateAICoaching"), "integrations.Core.InvokeLLM");

        let (method, args) = sdk_call(
            &OperationKey::entity("Users"),
            &json!({"action": "create", "data": {"name": "Ada"}}),
        )
        .unwrap();
        assert_eq!(method, "entities.Users.create");
        assert_eq!(args, json!({"data": {"name": "Ada"}}));
    }
}
