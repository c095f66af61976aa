use serde::{Deserialize, Serialize};

/// Signed-in user as handed over by the authentication provider.
///
/// The identity is opaque here; it only scopes per-user persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl CurrentUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
        }
    }

    /// Filesystem-safe form of the uid
    pub fn scope_key(&self) -> String {
        self.uid
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_key_is_path_safe() {
        let user = CurrentUser::new("abc/../DEF 1");
        assert_eq!(user.scope_key(), "abc____DEF_1");
    }
}
