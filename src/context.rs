use serde::{Deserialize, Serialize};

/// Connection selector forwarded unchanged to every provider call.
///
/// The reconcilers never inspect these values; they only exist so a provider
/// can pick the right region and credentials. The `Debug` implementation
/// redacts `key` to prevent accidental leakage in logs.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyid: Option<String>,
    /// Either a profile name or an inline mapping with region, key and keyid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<serde_json::Value>,
}

impl ConnectionContext {
    /// Creates a context that only selects a region.
    pub fn region(region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            ..Self::default()
        }
    }

    /// Sets an explicit key pair.
    pub fn with_keys(mut self, keyid: impl Into<String>, key: impl Into<String>) -> Self {
        self.keyid = Some(keyid.into());
        self.key = Some(key.into());
        self
    }

    /// Sets a named or inline profile.
    pub fn with_profile(mut self, profile: impl Into<serde_json::Value>) -> Self {
        self.profile = Some(profile.into());
        self
    }
}

impl std::fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("region", &self.region)
            .field("keyid", &self.keyid)
            .field("key", &self.key.as_ref().map(|_| "****"))
            .field("profile", &self.profile.as_ref().map(|_| "<profile>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_key() {
        let ctx = ConnectionContext::region("us-east-1").with_keys("AKIDEXAMPLE", "super-secret");
        let debug = format!("{:?}", ctx);
        assert!(debug.contains("us-east-1"));
        assert!(debug.contains("AKIDEXAMPLE"));
        assert!(debug.contains("****"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn deserialize_inline_profile() {
        let json = r#"{
            "profile": {"keyid": "GKTADJGHEIQSXMKKRBJ08H", "key": "secret", "region": "us-east-1"}
        }"#;
        let ctx: ConnectionContext = serde_json::from_str(json).unwrap();
        assert!(ctx.region.is_none());
        let profile = ctx.profile.unwrap();
        assert_eq!(profile["region"], "us-east-1");
    }

    #[test]
    fn deserialize_named_profile() {
        let ctx: ConnectionContext =
            serde_json::from_str(r#"{"profile": "myiamprofile"}"#).unwrap();
        assert_eq!(ctx.profile, Some(serde_json::json!("myiamprofile")));
    }
}
