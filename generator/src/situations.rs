use std::collections::HashMap;

use tsl::situation::Situation;

/// One name or several, as accepted by `set_default_situation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Names {
    One(String),
    Many(Vec<String>),
}

impl Names {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Names::One(name) => vec![name],
            Names::Many(names) => names,
        }
    }
}

impl From<&str> for Names {
    fn from(name: &str) -> Self {
        Names::One(name.to_string())
    }
}

impl From<String> for Names {
    fn from(name: String) -> Self {
        Names::One(name)
    }
}

impl From<Vec<String>> for Names {
    fn from(names: Vec<String>) -> Self {
        Names::Many(names)
    }
}

impl<const N: usize> From<[&str; N]> for Names {
    fn from(names: [&str; N]) -> Self {
        Names::Many(names.iter().map(|n| n.to_string()).collect())
    }
}

/// Default situations keyed by instruction name.
#[derive(Debug, Clone, Default)]
pub struct SituationManager {
    defaults: HashMap<String, Situation>,
}

impl SituationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last binding for a name replaces any earlier one.
    pub fn bind(&mut self, names: Names, situation: Situation) {
        for name in names.into_vec() {
            log::debug!("default situation for '{}' is now {}", name, situation.name);
            self.defaults.insert(name, situation.clone());
        }
    }

    pub fn default_for(&self, name: &str) -> Option<&Situation> {
        self.defaults.get(name)
    }
}
