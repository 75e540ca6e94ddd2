//! Posted form values plus accumulated validation errors.
//!
//! Validation helpers only ever append errors; `valid()` is true exactly when
//! nothing has been recorded.

use std::collections::HashMap;

pub const BLANK_FIELD_MESSAGE: &str = "This field cannot be blank";

/// Field name → messages, in the order they were added.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FormErrors(HashMap<String, Vec<String>>);

impl FormErrors {
  pub fn add(&mut self, field: &str, message: &str) {
    self
      .0
      .entry(field.to_string())
      .or_default()
      .push(message.to_string());
  }

  /// First message for `field`, or an empty string.
  pub fn get(&self, field: &str) -> &str {
    self
      .0
      .get(field)
      .and_then(|messages| messages.first())
      .map(String::as_str)
      .unwrap_or("")
  }

  pub fn all(&self, field: &str) -> &[String] {
    self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

#[derive(Debug, Default, Clone)]
pub struct Form {
  values: HashMap<String, Vec<String>>,
  pub errors: FormErrors,
}

impl Form {
  /// Build from decoded `key=value` pairs; repeated keys keep every value.
  pub fn new<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    let mut values: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in pairs {
      values.entry(key.into()).or_default().push(value.into());
    }
    Self {
      values,
      errors: FormErrors::default(),
    }
  }

  /// First submitted value for `field`, or an empty string.
  pub fn get(&self, field: &str) -> &str {
    self
      .values
      .get(field)
      .and_then(|v| v.first())
      .map(String::as_str)
      .unwrap_or("")
  }

  /// True when `field` was submitted with a non-empty value.
  pub fn has(&self, field: &str) -> bool {
    !self.get(field).is_empty()
  }

  /// Record one error for each field that is absent or blank.
  pub fn required(&mut self, fields: &[&str]) {
    for field in fields {
      if self.get(field).trim().is_empty() {
        self.errors.add(field, BLANK_FIELD_MESSAGE);
      }
    }
  }

  /// Record `message` under `field` unless `ok` holds.
  pub fn check(&mut self, ok: bool, field: &str, message: &str) {
    if !ok {
      self.errors.add(field, message);
    }
  }

  pub fn valid(&self) -> bool {
    self.errors.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_has() {
    let form = Form::default();
    assert!(!form.has("whatever"));

    let form = Form::new([("a", "b"), ("some key", "")]);
    assert!(form.has("a"));
    assert!(!form.has("some key"));
  }

  #[test]
  fn test_required_missing_fields() {
    let mut form = Form::default();
    form.required(&["a", "b", "c"]);
    assert!(!form.valid());
    for field in ["a", "b", "c"] {
      assert_eq!(form.errors.all(field).len(), 1);
    }
  }

  #[test]
  fn test_required_present_fields() {
    let mut form = Form::new([("key a", "value a"), ("key b", "value b"), ("key c", "value c")]);
    form.required(&["key a", "key b", "key c"]);
    assert!(form.valid());
  }

  #[test]
  fn test_required_blank_value_counts_as_missing() {
    let mut form = Form::new([("email", "   "), ("password", "")]);
    form.required(&["email", "password"]);
    assert_eq!(form.errors.get("email"), BLANK_FIELD_MESSAGE);
    assert_eq!(form.errors.all("password").len(), 1);
  }

  #[test]
  fn test_required_appends_without_clearing() {
    let mut form = Form::default();
    form.check(false, "email", "bad email");
    form.required(&["email"]);
    assert_eq!(form.errors.all("email"), ["bad email", BLANK_FIELD_MESSAGE]);
  }

  #[test]
  fn test_check() {
    let mut form = Form::default();
    form.check(true, "password", "never recorded");
    assert!(form.valid());

    form.check(false, "password", "password is required");
    assert!(!form.valid());
    assert_eq!(form.errors.get("password"), "password is required");
  }

  #[test]
  fn test_errors_get() {
    let mut form = Form::default();
    form.check(false, "password", "password is required");
    assert!(!form.errors.get("password").is_empty());
    assert!(form.errors.get("whatever").is_empty());
  }

  #[test]
  fn test_repeated_keys_keep_first_for_get() {
    let form = Form::new(vec![
      ("email".to_string(), "first@example.com".to_string()),
      ("email".to_string(), "second@example.com".to_string()),
    ]);
    assert_eq!(form.get("email"), "first@example.com");
  }
}
