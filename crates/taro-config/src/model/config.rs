// Configuration data models and structures
// This file defines various data structures for configuration management operations

use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use taro_persistence::model::{ConfigBetaStorageData, ConfigHistoryStorageData, ConfigStorageData};

/// Key for a configuration: (dataId, group, tenant/namespace)
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigKey {
    pub data_id: String,
    pub group: String,
    pub tenant: String,
}

impl ConfigKey {
    pub fn new(data_id: &str, group: &str, tenant: &str) -> Self {
        Self {
            data_id: data_id.to_string(),
            group: group.to_string(),
            tenant: tenant.to_string(),
        }
    }

    /// Create a unique key string for internal storage
    pub fn to_key_string(&self) -> String {
        format!("{}@@{}@@{}", self.tenant, self.group, self.data_id)
    }

    /// Parse a key string back to ConfigKey
    pub fn parse_key_string(key_string: &str) -> Option<ConfigKey> {
        let parts: Vec<&str> = key_string.splitn(3, "@@").collect();
        if parts.len() == 3 {
            Some(ConfigKey {
                tenant: parts[0].to_string(),
                group: parts[1].to_string(),
                data_id: parts[2].to_string(),
            })
        } else {
            None
        }
    }
}

// Form structure for configuration publish requests
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigPublishForm {
    pub data_id: String,
    pub group: String,
    pub tenant: String,
    pub content: String,
    /// Selects a tagged variant when non-empty
    pub tag: String,
    pub app_name: String,
    pub src_user: String,
    pub src_ip: String,
    pub config_tags: String,
    pub desc: String,
    pub r#type: String,
    pub encrypted_data_key: String,
}

// Base configuration information structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInfoBase {
    pub id: i64,
    pub data_id: String,
    pub group: String,
    pub content: String,
    pub md5: String,
    pub encrypted_data_key: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInfo {
    #[serde(flatten)]
    pub config_info_base: ConfigInfoBase,
    pub tenant: String,
    pub app_name: String,
    pub r#type: String,
}

impl From<ConfigStorageData> for ConfigInfo {
    fn from(value: ConfigStorageData) -> Self {
        Self {
            config_info_base: ConfigInfoBase {
                id: value.id,
                data_id: value.data_id,
                group: value.group,
                content: value.content,
                md5: value.md5,
                encrypted_data_key: value.encrypted_data_key,
            },
            tenant: value.tenant,
            app_name: value.app_name,
            r#type: value.config_type,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigAllInfo {
    #[serde(flatten)]
    pub config_info: ConfigInfo,
    pub create_time: i64,
    pub modify_time: i64,
    pub create_user: String,
    pub create_ip: String,
    pub desc: String,
    pub config_tags: String,
}

impl From<ConfigStorageData> for ConfigAllInfo {
    fn from(value: ConfigStorageData) -> Self {
        Self {
            create_time: value.created_time,
            modify_time: value.modified_time,
            create_user: value.src_user.clone(),
            create_ip: value.src_ip.clone(),
            desc: value.desc.clone(),
            config_tags: value.config_tags.clone(),
            config_info: ConfigInfo::from(value),
        }
    }
}

/// Beta record view: the whitelisted content plus its IP list
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigBetaInfo {
    #[serde(flatten)]
    pub config_info: ConfigInfo,
    pub beta_ips: String,
    pub src_user: String,
    pub last_modified: i64,
}

impl ConfigBetaInfo {
    /// Whether the whitelist admits the given client address
    pub fn covers_ip(&self, client_ip: &str) -> bool {
        !client_ip.is_empty()
            && self
                .beta_ips
                .split(',')
                .map(str::trim)
                .any(|ip| ip == client_ip)
    }
}

impl From<ConfigBetaStorageData> for ConfigBetaInfo {
    fn from(value: ConfigBetaStorageData) -> Self {
        Self {
            config_info: ConfigInfo {
                config_info_base: ConfigInfoBase {
                    id: 0,
                    data_id: value.data_id,
                    group: value.group,
                    content: value.content,
                    md5: value.md5,
                    encrypted_data_key: value.encrypted_data_key,
                },
                tenant: value.tenant,
                app_name: value.app_name,
                r#type: String::new(),
            },
            beta_ips: value.beta_ips,
            src_user: value.src_user,
            last_modified: value.modified_time,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigListenerInfo {
    pub query_type: String,
    pub listeners_status: HashMap<String, String>,
}

impl ConfigListenerInfo {
    pub const QUERY_TYPE_CONFIG: &str = "config";
    pub const QUERY_TYPE_IP: &str = "ip";
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigHistoryInfo {
    pub id: u64,
    pub data_id: String,
    pub group: String,
    pub tenant: String,
    pub app_name: String,
    pub md5: String,
    pub content: String,
    pub src_ip: String,
    pub src_user: String,
    pub op_type: String,
    pub publish_type: String,
    pub ext_info: String,
    pub created_time: i64,
    pub last_modified_time: i64,
    pub encrypted_data_key: String,
}

impl From<ConfigHistoryStorageData> for ConfigHistoryInfo {
    fn from(value: ConfigHistoryStorageData) -> Self {
        Self {
            id: value.id,
            data_id: value.data_id,
            group: value.group,
            tenant: value.tenant,
            app_name: value.app_name,
            md5: value.md5,
            content: value.content,
            src_ip: value.src_ip,
            src_user: value.src_user,
            op_type: value.op_type,
            publish_type: value.publish_type,
            ext_info: value.ext_info,
            created_time: value.created_time,
            last_modified_time: value.modified_time,
            encrypted_data_key: value.encrypted_data_key,
        }
    }
}

#[derive(Default)]
pub enum ConfigType {
    Properties,
    Xml,
    Json,
    #[default]
    Text,
    Html,
    Yaml,
    Toml,
}

impl ConfigType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::Properties => "properties",
            ConfigType::Xml => "xml",
            ConfigType::Json => "json",
            ConfigType::Text => "text",
            ConfigType::Html => "html",
            ConfigType::Yaml => "yaml",
            ConfigType::Toml => "toml",
        }
    }

    /// Map a file extension to a config type, defaulting to text
    pub fn of_extension(extension: &str) -> ConfigType {
        match extension {
            "properties" => ConfigType::Properties,
            "xml" => ConfigType::Xml,
            "json" => ConfigType::Json,
            "html" | "htm" => ConfigType::Html,
            "yaml" | "yml" => ConfigType::Yaml,
            "toml" => ConfigType::Toml,
            _ => ConfigType::Text,
        }
    }
}

impl Display for ConfigType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConfigType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "properties" => Ok(ConfigType::Properties),
            "xml" => Ok(ConfigType::Xml),
            "json" => Ok(ConfigType::Json),
            "text" => Ok(ConfigType::Text),
            "html" => Ok(ConfigType::Html),
            "yaml" => Ok(ConfigType::Yaml),
            "toml" => Ok(ConfigType::Toml),
            _ => Err(format!("Invalid config type: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_key_to_string() {
        let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP", "public");
        assert_eq!(key.to_key_string(), "public@@DEFAULT_GROUP@@app.yaml");
    }

    #[test]
    fn test_config_key_round_trip() {
        let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP", "dev");
        let parsed = ConfigKey::parse_key_string(&key.to_key_string()).unwrap();
        assert_eq!(parsed, key);

        assert!(ConfigKey::parse_key_string("not-a-key").is_none());
    }

    #[test]
    fn test_config_all_info_from_storage() {
        let data = ConfigStorageData {
            id: 7,
            data_id: "app.yaml".to_string(),
            group: "DEFAULT_GROUP".to_string(),
            tenant: "dev".to_string(),
            content: "a: 1".to_string(),
            md5: "abc".to_string(),
            app_name: "web".to_string(),
            config_type: "yaml".to_string(),
            desc: "demo".to_string(),
            config_tags: "env,prod".to_string(),
            src_user: "admin".to_string(),
            src_ip: "127.0.0.1".to_string(),
            created_time: 100,
            modified_time: 200,
            ..Default::default()
        };

        let info = ConfigAllInfo::from(data);
        assert_eq!(info.config_info.config_info_base.id, 7);
        assert_eq!(info.config_info.r#type, "yaml");
        assert_eq!(info.create_time, 100);
        assert_eq!(info.modify_time, 200);
        assert_eq!(info.config_tags, "env,prod");

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"dataId\":\"app.yaml\""));
        assert!(json.contains("\"createUser\":\"admin\""));
        assert!(json.contains("\"type\":\"yaml\""));
    }

    #[test]
    fn test_beta_info_covers_ip() {
        let beta = ConfigBetaInfo {
            beta_ips: "10.0.0.1, 10.0.0.2".to_string(),
            ..Default::default()
        };
        assert!(beta.covers_ip("10.0.0.1"));
        assert!(beta.covers_ip("10.0.0.2"));
        assert!(!beta.covers_ip("10.0.0.3"));
        assert!(!beta.covers_ip(""));
    }

    #[test]
    fn test_config_type_of_extension() {
        assert_eq!(ConfigType::of_extension("yml").as_str(), "yaml");
        assert_eq!(ConfigType::of_extension("yaml").as_str(), "yaml");
        assert_eq!(ConfigType::of_extension("properties").as_str(), "properties");
        assert_eq!(ConfigType::of_extension("htm").as_str(), "html");
        assert_eq!(ConfigType::of_extension("unknown").as_str(), "text");
        assert_eq!(ConfigType::of_extension("").as_str(), "text");
    }

    #[test]
    fn test_config_type_round_trip() {
        for name in ["properties", "xml", "json", "text", "html", "yaml", "toml"] {
            let parsed: ConfigType = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert!("nope".parse::<ConfigType>().is_err());
    }
}
