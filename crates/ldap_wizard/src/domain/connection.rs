//! Connection step: where the directory server lives and how to bind to it.

use forms::validation::{self, is_blank};
use forms::{FormField, FormFieldKind, FormSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

pub const PASSWORD: &str = "authPassword";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ldap,
    Ldaps,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthScheme {
    None,
    Simple,
    DigestMd5,
    CramMd5,
}

impl AuthScheme {
    pub fn from_data(data: &Value) -> Option<Self> {
        data.get("authScheme")?.as_str()?.parse().ok()
    }

    /// Binds with a username and password.
    pub fn authenticates(self) -> bool {
        self != AuthScheme::None
    }

    /// SASL schemes that need a realm.
    pub fn needs_realm(self) -> bool {
        matches!(self, AuthScheme::DigestMd5 | AuthScheme::CramMd5)
    }
}

fn scheme_authenticates(data: &Value) -> bool {
    AuthScheme::from_data(data).is_some_and(AuthScheme::authenticates)
}

fn options<E: IntoEnumIterator + AsRef<str>>() -> Vec<String> {
    E::iter().map(|e| e.as_ref().to_string()).collect()
}

fn range(
    min: f64,
    max: Option<f64>,
) -> impl Fn(&Value, &Value) -> Result<(), String> + Send + Sync {
    move |v, _| validation::in_range(v, Some(min), max, false).map_or(Ok(()), Err)
}

/// The password is only demanded up front for new servers; editing relies on
/// the credential gate instead.
pub fn schema(is_edit: bool) -> FormSchema {
    let password = FormField::new(PASSWORD, "Password", FormFieldKind::Secret);
    let password = if is_edit {
        password
    } else {
        password.required_when(scheme_authenticates)
    };

    FormSchema::new(
        "Create LDAP Connection",
        vec![
            FormField::new("name", "LDAP connection name", FormFieldKind::Text)
                .required()
                .validator(|v, _| match v.as_str() {
                    Some(s) if validation::is_name(s) => Ok(()),
                    _ => Err(validation::INVALID_NAME_CHARS.to_string()),
                }),
            FormField::new(
                "protocol",
                "Protocol",
                FormFieldKind::Select {
                    options: options::<Protocol>(),
                },
            )
            .required(),
            FormField::new("useTrustStore", "Use the Nexus truststore", FormFieldKind::Bool)
                .help("Only relevant for ldaps"),
            FormField::new("host", "Hostname", FormFieldKind::Text).required(),
            FormField::new("port", "Port", FormFieldKind::Number)
                .default_value(389)
                .required()
                .validator(range(1.0, Some(65535.0))),
            FormField::new("searchBase", "Search base", FormFieldKind::Text)
                .help("LDAP location to be added to the connection URL, e.g. \"dc=example,dc=com\"")
                .required(),
            FormField::new(
                "authScheme",
                "Authentication method",
                FormFieldKind::Select {
                    options: options::<AuthScheme>(),
                },
            )
            .required(),
            FormField::new("authRealm", "SASL realm", FormFieldKind::Text).required_when(|d| {
                AuthScheme::from_data(d).is_some_and(AuthScheme::needs_realm)
            }),
            FormField::new("authUsername", "Username or DN", FormFieldKind::Text)
                .required_when(scheme_authenticates),
            password,
            FormField::new("connectionTimeout", "Wait timeout (seconds)", FormFieldKind::Number)
                .default_value(30)
                .required()
                .validator(range(1.0, Some(3600.0))),
            FormField::new("connectionRetryDelay", "Retry after (seconds)", FormFieldKind::Number)
                .default_value(300)
                .required()
                .validator(range(0.0, Some(3600.0))),
            FormField::new("maxIncidentsCount", "Max failed attempts", FormFieldKind::Number)
                .default_value(3)
                .required()
                .validator(range(0.0, None)),
        ],
    )
}

/// Merged values need the bind password and the form does not carry one.
pub fn requires_secret(values: &Value) -> bool {
    scheme_authenticates(values) && is_blank(values.get(PASSWORD))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forms::validation::FIELD_REQUIRED;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "name": "corp-ldap",
            "protocol": "ldap",
            "useTrustStore": false,
            "host": "ldap.example.com",
            "port": 389,
            "searchBase": "dc=example,dc=com",
            "authScheme": "NONE",
            "authRealm": "",
            "authUsername": "",
            "authPassword": "",
            "connectionTimeout": 30,
            "connectionRetryDelay": 300,
            "maxIncidentsCount": 3,
        })
    }

    #[test]
    fn defaults_are_blank_but_typed() {
        let defaults = schema(false).defaults();
        assert_eq!(defaults["protocol"], json!("ldap"));
        assert_eq!(defaults["authScheme"], json!("NONE"));
        assert_eq!(defaults["port"], json!(389));
        assert_eq!(defaults["host"], json!(""));
    }

    #[test]
    fn anonymous_bind_needs_no_credentials() {
        assert!(!schema(false).validate(&valid()).is_invalid());
    }

    #[test]
    fn realm_only_for_sasl_schemes() {
        let s = schema(false);
        let mut data = valid();
        data["authScheme"] = json!("SIMPLE");
        data["authUsername"] = json!("cn=admin");
        data["authPassword"] = json!("pw");
        assert_eq!(s.validate(&data).get("authRealm"), None);

        data["authScheme"] = json!("DIGEST_MD5");
        assert_eq!(s.validate(&data).get("authRealm"), Some(FIELD_REQUIRED));
        data["authScheme"] = json!("CRAM_MD5");
        assert_eq!(s.validate(&data).get("authRealm"), Some(FIELD_REQUIRED));
    }

    #[test]
    fn password_is_only_required_when_creating() {
        let mut data = valid();
        data["authScheme"] = json!("SIMPLE");
        data["authUsername"] = json!("cn=admin");
        assert_eq!(schema(false).validate(&data).get(PASSWORD), Some(FIELD_REQUIRED));
        assert_eq!(schema(true).validate(&data).get(PASSWORD), None);
        assert!(requires_secret(&data));

        data[PASSWORD] = json!("pw");
        assert!(!requires_secret(&data));
    }

    #[test]
    fn port_and_name_rules() {
        let s = schema(false);
        let mut data = valid();
        data["port"] = json!(70000);
        data["name"] = json!("_bad name");
        let errors = s.validate(&data);
        assert_eq!(errors.get("port"), Some("The maximum value for this field is 65535"));
        assert_eq!(errors.get("name"), Some(validation::INVALID_NAME_CHARS));
    }

    #[test]
    fn schemes_round_trip_through_strings() {
        assert_eq!("DIGEST_MD5".parse::<AuthScheme>().ok(), Some(AuthScheme::DigestMd5));
        assert_eq!(AuthScheme::CramMd5.to_string(), "CRAM_MD5");
        assert_eq!(Protocol::Ldaps.as_ref(), "ldaps");
    }
}
