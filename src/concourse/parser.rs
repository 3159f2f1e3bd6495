//! Deserializers for Concourse API responses.
//!
//! List endpoints are tolerant: an element that is missing a field or has the
//! wrong type is skipped and the rest of the list still comes through. Single
//! object endpoints are strict and surface the first problem they find.

use crate::error::DeserializationError;
use crate::model::{AuthKind, AuthMethod, Build, Info, Job, Pipeline, Token};
use serde_json::{Map, Value};

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10 MB

const NOT_A_DICTIONARY: &str = "Could not interpret data as JSON dictionary";
const NOT_AN_ARRAY: &str = "Could not interpret data as JSON array";

type Object = Map<String, Value>;

fn check_response_size(body: &str) -> Result<(), DeserializationError> {
    if body.len() > MAX_RESPONSE_SIZE {
        return Err(DeserializationError::invalid_input(format!(
            "Response too large ({:.1} MB, max {} MB)",
            body.len() as f64 / (1024.0 * 1024.0),
            MAX_RESPONSE_SIZE / (1024 * 1024)
        )));
    }
    Ok(())
}

fn parse_object(body: &str) -> Result<Object, DeserializationError> {
    check_response_size(body)?;
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(obj)) => Ok(obj),
        _ => Err(DeserializationError::invalid_input(NOT_A_DICTIONARY)),
    }
}

fn parse_array(body: &str) -> Result<Vec<Value>, DeserializationError> {
    check_response_size(body)?;
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => Ok(items),
        _ => Err(DeserializationError::invalid_input(NOT_AN_ARRAY)),
    }
}

fn required_str<'a>(obj: &'a Object, key: &str) -> Result<&'a str, DeserializationError> {
    match obj.get(key) {
        None => Err(DeserializationError::missing_field(key)),
        Some(value) => value
            .as_str()
            .ok_or_else(|| DeserializationError::type_mismatch(key, "a string")),
    }
}

fn required_id(obj: &Object, key: &str) -> Result<u64, DeserializationError> {
    match obj.get(key) {
        None => Err(DeserializationError::missing_field(key)),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| DeserializationError::type_mismatch(key, "an integer")),
    }
}

fn optional_timestamp(obj: &Object, key: &str) -> Result<Option<u64>, DeserializationError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| DeserializationError::type_mismatch(key, "an unsigned integer")),
    }
}

/// JSON booleans, or the exact strings `"true"`/`"false"`. Numbers are not
/// accepted as booleans.
fn strict_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

pub fn parse_info(body: &str) -> Result<Info, DeserializationError> {
    let obj = parse_object(body)?;
    let version = required_str(&obj, "version")?;
    Ok(Info {
        version: version.to_string(),
    })
}

pub fn parse_token(body: &str) -> Result<Token, DeserializationError> {
    let obj = parse_object(body)?;
    match obj.get("value") {
        None => Err(DeserializationError::new(
            "Missing required 'value' key",
            crate::error::DeserializationErrorKind::MissingRequiredData,
        )),
        Some(Value::String(value)) => Ok(Token::new(value.clone())),
        Some(_) => Err(DeserializationError::new(
            "Expected value for 'value' key to be a string",
            crate::error::DeserializationErrorKind::TypeMismatch,
        )),
    }
}

pub fn parse_teams(body: &str) -> Result<Vec<String>, DeserializationError> {
    let items = parse_array(body)?;
    Ok(items
        .iter()
        .filter_map(|item| item.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

fn auth_method_from_value(value: &Value) -> Option<AuthMethod> {
    let kind = value.get("type")?.as_str()?;
    let display_name = value.get("display_name")?.as_str()?;
    let auth_url = value.get("auth_url")?.as_str()?;
    Some(AuthMethod {
        kind: AuthKind::from_wire(kind, display_name)?,
        display_name: display_name.to_string(),
        auth_url: auth_url.to_string(),
    })
}

pub fn parse_auth_methods(body: &str) -> Result<Vec<AuthMethod>, DeserializationError> {
    let items = parse_array(body)?;
    let mut methods = Vec::with_capacity(items.len());
    for item in &items {
        match auth_method_from_value(item) {
            Some(method) => methods.push(method),
            None => tracing::debug!("skipping unrecognized auth method: {item}"),
        }
    }
    Ok(methods)
}

fn pipeline_from_value(value: &Value) -> Option<Pipeline> {
    let name = value.get("name")?.as_str()?;
    let team_name = value.get("team_name")?.as_str()?;
    let public = match value.get("public") {
        None | Some(Value::Null) => false,
        Some(v) => strict_bool(v)?,
    };
    Some(Pipeline {
        name: name.to_string(),
        public,
        team_name: team_name.to_string(),
    })
}

pub fn parse_pipelines(body: &str) -> Result<Vec<Pipeline>, DeserializationError> {
    let items = parse_array(body)?;
    let mut pipelines = Vec::with_capacity(items.len());
    for item in &items {
        match pipeline_from_value(item) {
            Some(pipeline) => pipelines.push(pipeline),
            None => tracing::debug!("skipping malformed pipeline entry: {item}"),
        }
    }
    Ok(pipelines)
}

fn build_from_object(obj: &Object) -> Result<Build, DeserializationError> {
    let id = required_id(obj, "id")?;
    let name = required_str(obj, "name")?;
    let job_name = required_str(obj, "job_name")?;
    let team_name = required_str(obj, "team_name")?;
    let status = required_str(obj, "status")?;
    let pipeline_name = required_str(obj, "pipeline_name")?;
    let start_time = optional_timestamp(obj, "start_time")?;
    let end_time = optional_timestamp(obj, "end_time")?;
    Ok(Build {
        id,
        name: name.to_string(),
        team_name: team_name.to_string(),
        job_name: job_name.to_string(),
        status: status.to_string(),
        pipeline_name: pipeline_name.to_string(),
        start_time,
        end_time,
    })
}

fn build_from_value(value: &Value) -> Result<Build, DeserializationError> {
    match value {
        Value::Object(obj) => build_from_object(obj),
        _ => Err(DeserializationError::invalid_input(NOT_A_DICTIONARY)),
    }
}

pub fn parse_build(body: &str) -> Result<Build, DeserializationError> {
    let obj = parse_object(body)?;
    build_from_object(&obj)
}

pub fn parse_builds(body: &str) -> Result<Vec<Build>, DeserializationError> {
    let items = parse_array(body)?;
    let mut builds = Vec::with_capacity(items.len());
    for item in &items {
        match build_from_value(item) {
            Ok(build) => builds.push(build),
            Err(e) => tracing::debug!("skipping build entry: {}", e.details),
        }
    }
    Ok(builds)
}

/// `None` when the key is absent or null; `Err` when present but unusable.
fn optional_build(value: &Value, key: &str) -> Result<Option<Build>, DeserializationError> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(obj)) => build_from_object(obj).map(Some),
        Some(_) => Err(DeserializationError::type_mismatch(key, "a dictionary")),
    }
}

fn job_from_value(value: &Value) -> Result<Job, DeserializationError> {
    let obj = value
        .as_object()
        .ok_or_else(|| DeserializationError::invalid_input(NOT_A_DICTIONARY))?;
    let name = required_str(obj, "name")?;
    let next_build = optional_build(value, "next_build")?;
    let finished_build = optional_build(value, "finished_build")?;
    let groups = obj
        .get("groups")
        .and_then(Value::as_array)
        .map(|groups| {
            groups
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(Job {
        name: name.to_string(),
        next_build,
        finished_build,
        groups,
    })
}

pub fn parse_jobs(body: &str) -> Result<Vec<Job>, DeserializationError> {
    let items = parse_array(body)?;
    let mut jobs = Vec::with_capacity(items.len());
    for item in &items {
        match job_from_value(item) {
            Ok(job) => jobs.push(job),
            Err(e) => tracing::debug!("skipping job entry: {}", e.details),
        }
    }
    Ok(jobs)
}
