use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub String);

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub id: ServiceId,
    pub display_name: String,
    pub icon: String,
}

impl ServiceDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Self { id: ServiceId(id.into()), display_name: display_name.into(), icon: icon.into() }
    }
}
