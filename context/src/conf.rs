//! The property source: flattened, case-normalised key/value configuration.
//!
//! Property files are read into nested maps and flattened into dotted keys
//! (`server.port`), with sequences kept as leaves. Binding rebuilds the
//! sub-tree under a key and hands it to serde.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// The property holding the comma separated list of active profiles.
pub const ACTIVE_PROFILES: &str = "spring.profiles.active";

/// A flat, case-insensitive key/value property store.
#[derive(Clone, Debug, Default)]
pub struct Properties {
  values: BTreeMap<String, Value>,
}

impl Properties {
  pub fn new() -> Self {
    Self::default()
  }

  /// Loads a property file, picking the format from its extension
  /// (`yaml`, `yml`, `json` or `properties`).
  pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let ext = path
      .extension()
      .and_then(|e| e.to_str())
      .unwrap_or_default()
      .to_ascii_lowercase();

    let parsed = match ext.as_str() {
      "yaml" | "yml" => parse_yaml(&text),
      "json" => parse_json(&text),
      "properties" => Ok(parse_properties(&text)),
      other => Err(format!("unsupported property source type '{}'", other)),
    };

    let value = parsed.map_err(|message| Error::Parse {
      path: path.display().to_string(),
      message,
    })?;
    self.merge(value);
    Ok(())
  }

  /// Reads YAML text into the store.
  pub fn read_yaml(&mut self, text: &str) -> Result<()> {
    let value = parse_yaml(text).map_err(|message| Error::Parse {
      path: "<yaml>".to_owned(),
      message,
    })?;
    self.merge(value);
    Ok(())
  }

  /// Reads JSON text into the store.
  pub fn read_json(&mut self, text: &str) -> Result<()> {
    let value = parse_json(text).map_err(|message| Error::Parse {
      path: "<json>".to_owned(),
      message,
    })?;
    self.merge(value);
    Ok(())
  }

  fn merge(&mut self, value: Value) {
    flatten("", value, &mut self.values);
  }

  /// Returns the leaf value for `key`, matched after lower-casing.
  pub fn get(&self, key: &str) -> Option<&Value> {
    self.values.get(&key.to_lowercase())
  }

  /// Returns the leaf value for `key` as a string, or `default` when absent.
  pub fn get_or(&self, key: &str, default: &str) -> String {
    match self.get(key) {
      Some(Value::String(s)) => s.clone(),
      Some(other) => other.to_string(),
      None => default.to_owned(),
    }
  }

  /// True if `key` is a leaf or the prefix of a sub-tree.
  pub fn has(&self, key: &str) -> bool {
    let key = key.to_lowercase();
    if self.values.contains_key(&key) {
      return true;
    }
    let prefix = format!("{}.", key);
    self.values.keys().any(|k| k.starts_with(&prefix))
  }

  /// Sets `key`; map values are flattened under it.
  pub fn set(&mut self, key: &str, value: impl Into<Value>) {
    flatten(&key.to_lowercase(), value.into(), &mut self.values);
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.values.keys().map(String::as_str)
  }

  /// The profiles listed in `spring.profiles.active`.
  pub fn active_profiles(&self) -> Vec<String> {
    self
      .get_or(ACTIVE_PROFILES, "")
      .split(',')
      .map(str::trim)
      .filter(|p| !p.is_empty())
      .map(str::to_owned)
      .collect()
  }

  /// Deserialises the leaf or sub-tree under `key` (the whole store for `""`).
  pub fn bind<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
    let key = key.to_lowercase();
    let value = match self.values.get(&key) {
      Some(leaf) => leaf.clone(),
      None => self.subtree(&key).ok_or_else(|| Error::Property { key: key.clone() })?,
    };
    deserialize(&key, value)
  }

  /// Binds a property reference of the form `${key}` or `${key:=default}`.
  /// Anything else is taken as a literal value.
  pub fn bind_ref<T: DeserializeOwned>(&self, reference: &str) -> Result<T> {
    let Some((key, default)) = parse_ref(reference) else {
      return deserialize(reference, Value::String(reference.to_owned()));
    };
    if self.has(key) {
      return self.bind(key);
    }
    match default {
      Some(default) => deserialize(key, parse_default(default)),
      None => Err(Error::Property {
        key: key.to_lowercase(),
      }),
    }
  }

  fn subtree(&self, key: &str) -> Option<Value> {
    let prefix = if key.is_empty() {
      String::new()
    } else {
      format!("{}.", key)
    };

    let mut root = Map::new();
    let mut found = false;
    for (k, v) in self.values.range(prefix.clone()..) {
      let Some(rest) = k.strip_prefix(&prefix) else {
        break;
      };
      found = true;
      insert_path(&mut root, rest, v.clone());
    }
    found.then_some(Value::Object(root))
  }
}

fn parse_yaml(text: &str) -> std::result::Result<Value, String> {
  if text.trim().is_empty() {
    return Ok(Value::Object(Map::new()));
  }
  serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string())
}

fn parse_json(text: &str) -> std::result::Result<Value, String> {
  serde_json::from_str::<Value>(text).map_err(|e| e.to_string())
}

fn parse_properties(text: &str) -> Value {
  let mut map = Map::new();
  for line in text.lines() {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
      continue;
    }
    let (key, value) = match line.find(['=', ':']) {
      Some(i) => (&line[..i], &line[i + 1..]),
      None => (line, ""),
    };
    map.insert(key.trim().to_owned(), Value::String(value.trim().to_owned()));
  }
  Value::Object(map)
}

fn flatten(prefix: &str, value: Value, out: &mut BTreeMap<String, Value>) {
  match value {
    Value::Object(map) => {
      for (k, v) in map {
        let k = k.to_lowercase();
        let key = if prefix.is_empty() {
          k
        } else {
          format!("{}.{}", prefix, k)
        };
        flatten(&key, v, out);
      }
    }
    Value::Null if prefix.is_empty() => {}
    leaf => {
      out.insert(prefix.to_owned(), leaf);
    }
  }
}

fn insert_path(root: &mut Map<String, Value>, path: &str, value: Value) {
  match path.split_once('.') {
    None => {
      root.insert(path.to_owned(), value);
    }
    Some((head, rest)) => {
      let child = root
        .entry(head.to_owned())
        .or_insert_with(|| Value::Object(Map::new()));
      if !child.is_object() {
        *child = Value::Object(Map::new());
      }
      if let Value::Object(map) = child {
        insert_path(map, rest, value);
      }
    }
  }
}

/// Splits `${key:=default}` into its parts.
fn parse_ref(reference: &str) -> Option<(&str, Option<&str>)> {
  let inner = reference.trim().strip_prefix("${")?.strip_suffix('}')?;
  Some(match inner.split_once(":=") {
    Some((key, default)) => (key.trim(), Some(default)),
    None => (inner.trim(), None),
  })
}

/// Reads a reference default as a YAML value, so `[]` is an empty list.
fn parse_default(default: &str) -> Value {
  if default.trim().is_empty() {
    return Value::String(default.to_owned());
  }
  serde_yaml::from_str::<Value>(default).unwrap_or_else(|_| Value::String(default.to_owned()))
}

/// Binds through a YAML flow document with plain scalars wherever possible,
/// so `"8080"` binds to a number and `8080` binds to a string alike.
fn deserialize<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
  let mut doc = String::new();
  write_flow(&value, &mut doc);
  serde_yaml::from_str::<T>(&doc).map_err(|e| Error::Bind {
    key: key.to_owned(),
    message: e.to_string(),
  })
}

fn write_flow(value: &Value, out: &mut String) {
  match value {
    Value::Null => out.push_str("null"),
    Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
    Value::Number(n) => out.push_str(&n.to_string()),
    Value::String(s) => write_scalar(s, out),
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push_str(", ");
        }
        write_flow(item, out);
      }
      out.push(']');
    }
    Value::Object(map) => {
      out.push('{');
      for (i, (k, v)) in map.iter().enumerate() {
        if i > 0 {
          out.push_str(", ");
        }
        write_scalar(k, out);
        out.push_str(": ");
        write_flow(v, out);
      }
      out.push('}');
    }
  }
}

fn write_scalar(s: &str, out: &mut String) {
  let plain = !s.is_empty()
    && s
      .chars()
      .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | '+' | '/'));
  if plain {
    out.push_str(s);
  } else {
    // A JSON string is a valid YAML double-quoted scalar.
    out.push_str(&Value::String(s.to_owned()).to_string());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Server {
    host: String,
    port: u16,
  }

  #[test]
  fn flattens_and_binds_yaml() {
    let mut p = Properties::new();
    p.read_yaml("Server:\n  Host: localhost\n  port: 8080\n").unwrap();

    assert_eq!(p.get("server.host"), Some(&Value::String("localhost".into())));
    assert!(p.has("SERVER"));

    let server: Server = p.bind("server").unwrap();
    assert_eq!(
      server,
      Server {
        host: "localhost".into(),
        port: 8080
      }
    );
  }

  #[test]
  fn string_leaves_bind_as_scalars() {
    let mut p = Properties::new();
    p.set("server.port", "9090");
    p.set("server.host", "10");
    let server: Server = p.bind("server").unwrap();
    assert_eq!(server.port, 9090);
    assert_eq!(server.host, "10");
  }

  #[test]
  fn references_fall_back_to_defaults() {
    let p = Properties::new();
    let port: u16 = p.bind_ref("${server.port:=7070}").unwrap();
    assert_eq!(port, 7070);
    let tags: Vec<String> = p.bind_ref("${server.tags:=[a, b]}").unwrap();
    assert_eq!(tags, vec!["a", "b"]);
    assert!(matches!(
      p.bind_ref::<u16>("${server.port}"),
      Err(Error::Property { .. })
    ));
  }

  #[test]
  fn reads_properties_lines() {
    let value = parse_properties("# comment\na.b = 1\nc: two\n");
    let mut p = Properties::new();
    p.merge(value);
    assert_eq!(p.get_or("a.b", ""), "1");
    assert_eq!(p.get_or("c", ""), "two");
  }
}
