//! Property parameter types (RFC 5545 §3.2).

/// A property parameter.
///
/// Parameters carry an uppercase-normalized name and one or more values in
/// order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name (normalized to uppercase).
    pub name: String,
    /// Parameter values in order of appearance.
    pub values: Vec<String>,
}

impl Parameter {
    /// Creates a single-valued parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            values: vec![value.into()],
        }
    }

    /// Creates a parameter with multiple values.
    #[must_use]
    pub fn with_values(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            values,
        }
    }

    /// Creates a TZID parameter.
    #[must_use]
    pub fn tzid(value: impl Into<String>) -> Self {
        Self::new("TZID", value)
    }

    /// Creates a VALUE (data type override) parameter.
    #[must_use]
    pub fn value_type(value: impl Into<String>) -> Self {
        Self::new("VALUE", value)
    }

    /// Returns the first value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// An ordered parameter list with case-insensitive lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Parameters {
    entries: Vec<Parameter>,
}

impl Parameters {
    /// Creates an empty parameter list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter, keeping any existing parameter with the same name.
    pub fn push(&mut self, param: Parameter) {
        self.entries.push(param);
    }

    /// Sets a parameter, replacing any existing parameter with the same name.
    pub fn set(&mut self, param: Parameter) {
        self.entries.retain(|p| p.name != param.name);
        self.entries.push(param);
    }

    /// Removes all parameters with the given name.
    pub fn remove(&mut self, name: &str) {
        let name_upper = name.to_ascii_uppercase();
        self.entries.retain(|p| p.name != name_upper);
    }

    /// Returns the parameter with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        let name_upper = name.to_ascii_uppercase();
        self.entries.iter().find(|p| p.name == name_upper)
    }

    /// Returns the first value of a parameter.
    #[must_use]
    pub fn get_value(&self, name: &str) -> Option<&str> {
        self.get(name)?.value()
    }

    /// Returns the TZID parameter value if present.
    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        self.get_value("TZID")
    }

    /// Returns the VALUE parameter (explicit data type override) if present.
    #[must_use]
    pub fn value_type(&self) -> Option<&str> {
        self.get_value("VALUE")
    }

    /// Returns whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over the parameters in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.entries.iter()
    }
}

impl FromIterator<Parameter> for Parameters {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
