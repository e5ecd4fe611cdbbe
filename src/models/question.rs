use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Name,
    Email,
    Phone,
    Address,
    Symptoms,
}

impl FieldName {
    pub const ALL: [FieldName; 5] = [
        FieldName::Name,
        FieldName::Email,
        FieldName::Phone,
        FieldName::Address,
        FieldName::Symptoms,
    ];

    /// Fields whose values never leave the process unredacted.
    pub const PII: [FieldName; 4] = [
        FieldName::Name,
        FieldName::Email,
        FieldName::Phone,
        FieldName::Address,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Name => "name",
            FieldName::Email => "email",
            FieldName::Phone => "phone",
            FieldName::Address => "address",
            FieldName::Symptoms => "symptoms",
        }
    }

    pub fn is_pii(&self) -> bool {
        Self::PII.contains(self)
    }

    /// Capitalized label used when listing answers in a prompt ("Name: ...").
    pub fn label(&self) -> &'static str {
        match self {
            FieldName::Name => "Name",
            FieldName::Email => "Email",
            FieldName::Phone => "Phone",
            FieldName::Address => "Address",
            FieldName::Symptoms => "Symptoms",
        }
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub field: FieldName,
    pub prompt: String,
}

impl Question {
    pub fn new(field: FieldName, prompt: &str) -> Self {
        Self {
            field,
            prompt: prompt.to_string(),
        }
    }
}

pub fn default_questions() -> Vec<Question> {
    vec![
        Question::new(FieldName::Name, "What is your full name?"),
        Question::new(FieldName::Email, "Thank you please provide your email address?"),
        Question::new(FieldName::Phone, "Thank you enter your phone number?"),
        Question::new(FieldName::Address, "Thank you enter your location?"),
        Question::new(FieldName::Symptoms, "Please describe your symptoms."),
    ]
}

/// Answers keyed by field, kept in the order they were given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerSet {
    entries: Vec<(FieldName, String)>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: FieldName, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn get(&self, field: FieldName) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldName, &str)> {
        self.entries.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// One "Label: value" line per answer, in answer order.
    pub fn to_prompt(&self) -> String {
        self.iter()
            .map(|(field, value)| format!("{}: {}", field.label(), value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FromIterator<(FieldName, String)> for AnswerSet {
    fn from_iter<I: IntoIterator<Item = (FieldName, String)>>(iter: I) -> Self {
        let mut answers = AnswerSet::new();
        for (field, value) in iter {
            answers.insert(field, value);
        }
        answers
    }
}

impl Serialize for AnswerSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, value) in &self.entries {
            map.serialize_entry(field.as_str(), value)?;
        }
        map.end()
    }
}
