//! Permission scopes, actions and resource kinds.
//!
//! Scopes are a closed set. Unknown strings are rejected when they are
//! parsed, and the raw-string check fails closed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What a share token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionType {
    /// View and download.
    Read,
    /// View, download and upload.
    ReadUpload,
    /// Upload only (a drop box).
    UploadOnly,
}

impl PermissionType {
    /// All scopes.
    pub const ALL: [PermissionType; 3] = [
        PermissionType::Read,
        PermissionType::ReadUpload,
        PermissionType::UploadOnly,
    ];

    /// Database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionType::Read => "read",
            PermissionType::ReadUpload => "read_upload",
            PermissionType::UploadOnly => "upload_only",
        }
    }

    /// Whether this scope authorizes `action`.
    ///
    /// ```
    /// use sharevault::share::{PermissionType, ShareAction};
    ///
    /// assert!(PermissionType::Read.allows(ShareAction::Download));
    /// assert!(!PermissionType::Read.allows(ShareAction::Upload));
    /// assert!(!PermissionType::UploadOnly.allows(ShareAction::View));
    /// ```
    pub fn allows(&self, action: ShareAction) -> bool {
        matches!(
            (self, action),
            (PermissionType::Read, ShareAction::View | ShareAction::Download)
                | (PermissionType::ReadUpload, _)
                | (PermissionType::UploadOnly, ShareAction::Upload)
        )
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PermissionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(PermissionType::Read),
            "read_upload" => Ok(PermissionType::ReadUpload),
            "upload_only" => Ok(PermissionType::UploadOnly),
            _ => Err(format!("unknown permission type: {s}")),
        }
    }
}

impl TryFrom<String> for PermissionType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Something a share recipient tries to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareAction {
    View,
    Download,
    Upload,
}

impl ShareAction {
    /// All actions.
    pub const ALL: [ShareAction; 3] = [ShareAction::View, ShareAction::Download, ShareAction::Upload];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShareAction::View => "view",
            ShareAction::Download => "download",
            ShareAction::Upload => "upload",
        }
    }
}

impl fmt::Display for ShareAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShareAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(ShareAction::View),
            "download" => Ok(ShareAction::Download),
            "upload" => Ok(ShareAction::Upload),
            _ => Err(format!("unknown share action: {s}")),
        }
    }
}

impl TryFrom<String> for ShareAction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Kind of resource a share points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    File,
    Directory,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::File => "file",
            ResourceType::Directory => "directory",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(ResourceType::File),
            "directory" => Ok(ResourceType::Directory),
            _ => Err(format!("unknown resource type: {s}")),
        }
    }
}

impl TryFrom<String> for ResourceType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A typed pointer to a file or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceRef {
    pub resource_type: ResourceType,
    pub resource_id: i64,
}

impl ResourceRef {
    pub fn file(id: i64) -> Self {
        Self {
            resource_type: ResourceType::File,
            resource_id: id,
        }
    }

    pub fn directory(id: i64) -> Self {
        Self {
            resource_type: ResourceType::Directory,
            resource_id: id,
        }
    }
}

/// Scope check on untyped input. Unknown scopes or actions are denied.
pub fn can_perform_raw(permission_type: &str, action: &str) -> bool {
    match (permission_type.parse::<PermissionType>(), action.parse::<ShareAction>()) {
        (Ok(permission), Ok(action)) => permission.allows(action),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_table() {
        use PermissionType::*;
        use ShareAction::*;

        let expected = [
            (Read, View, true),
            (Read, Download, true),
            (Read, Upload, false),
            (ReadUpload, View, true),
            (ReadUpload, Download, true),
            (ReadUpload, Upload, true),
            (UploadOnly, View, false),
            (UploadOnly, Download, false),
            (UploadOnly, Upload, true),
        ];
        for (permission, action, allowed) in expected {
            assert_eq!(
                permission.allows(action),
                allowed,
                "{permission} / {action}"
            );
        }
    }

    #[test]
    fn test_raw_check_fails_closed() {
        assert!(can_perform_raw("read", "view"));
        assert!(!can_perform_raw("admin", "view"));
        assert!(!can_perform_raw("read", "delete"));
        assert!(!can_perform_raw("READ", "view"));
        assert!(!can_perform_raw("", ""));
    }

    #[test]
    fn test_parse_round_trip() {
        for permission in PermissionType::ALL {
            assert_eq!(permission.as_str().parse::<PermissionType>(), Ok(permission));
        }
        for action in ShareAction::ALL {
            assert_eq!(action.to_string().parse::<ShareAction>(), Ok(action));
        }
        assert_eq!("directory".parse::<ResourceType>(), Ok(ResourceType::Directory));
        assert!("folder".parse::<ResourceType>().is_err());
    }

    #[test]
    fn test_serde_rejects_unknown_scope() {
        let parsed: PermissionType = serde_json::from_str("\"read_upload\"").unwrap();
        assert_eq!(parsed, PermissionType::ReadUpload);
        assert!(serde_json::from_str::<PermissionType>("\"write\"").is_err());
    }
}
