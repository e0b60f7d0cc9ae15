use serde::{Deserialize, Serialize};

/// One enrolled identity: a unique name plus its face embedding.
///
/// The public API speaks Spanish (`nombre`), matching the form fields and the
/// `usuarios` table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IdentityRecord {
    #[serde(rename = "nombre")]
    pub name: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserList {
    pub usuarios: Vec<String>,
}
