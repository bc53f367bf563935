use serde::{ Deserialize, Serialize };

/// A contact-form submission. Absent fields deserialize as empty strings so
/// that they are reported by validation rather than by the JSON parser.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactSubmission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

impl ContactSubmission {
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.email, &self.message].iter().all(|f| !f.trim().is_empty())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContactSuccess {
    pub success: bool,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContactError {
    pub error: String,
}
