//! User and group mapping step.

use forms::{FormField, FormFieldKind, FormSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

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
pub enum GroupType {
    Static,
    Dynamic,
}

impl GroupType {
    /// `None` when groups are not mapped as roles at all.
    pub fn from_data(data: &Value) -> Option<Self> {
        if !data.get("ldapGroupsAsRoles").and_then(Value::as_bool).unwrap_or(false) {
            return None;
        }
        data.get("groupType")?.as_str()?.parse().ok()
    }
}

fn group_is(kind: GroupType) -> impl Fn(&Value) -> bool + Send + Sync {
    move |d| GroupType::from_data(d) == Some(kind)
}

pub fn schema() -> FormSchema {
    let static_field = |key: &str, label: &str, help: &str| {
        FormField::new(key, label, FormFieldKind::Text)
            .help(help)
            .required_when(group_is(GroupType::Static))
    };

    FormSchema::new(
        "Choose Users and Groups",
        vec![
            FormField::new("userBaseDn", "Base DN", FormFieldKind::Text)
                .help("Path to the users, relative to the search base (\"ou=people\")"),
            FormField::new("userSubtree", "User subtree", FormFieldKind::Bool)
                .help("Users are located in structures below the base DN"),
            FormField::new("userObjectClass", "Object class", FormFieldKind::Text)
                .help("LDAP class for user objects (\"inetOrgPerson\")")
                .required(),
            FormField::new("userLdapFilter", "User filter", FormFieldKind::Text)
                .help("LDAP filter to limit the user search (\"(mail=*@example.com)\")"),
            FormField::new("userIdAttribute", "Username or DN", FormFieldKind::Text)
                .help("Attribute holding the user id (\"uid\")")
                .required(),
            FormField::new("userRealNameAttribute", "Real name attribute", FormFieldKind::Text)
                .help("Attribute holding the full name (\"cn\")")
                .required(),
            FormField::new("userEmailAddressAttribute", "Email attribute", FormFieldKind::Text)
                .help("Attribute holding the email address (\"mail\")")
                .required(),
            FormField::new("userPasswordAttribute", "Password attribute", FormFieldKind::Text)
                .help("If blank, users are authenticated with an LDAP bind"),
            FormField::new("ldapGroupsAsRoles", "Map LDAP groups as roles", FormFieldKind::Bool),
            FormField::new(
                "groupType",
                "Group type",
                FormFieldKind::Select {
                    options: GroupType::iter().map(|g| g.as_ref().to_string()).collect(),
                },
            )
            .required_when(|d| {
                d.get("ldapGroupsAsRoles")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            }),
            FormField::new("groupBaseDn", "Group base DN", FormFieldKind::Text)
                .help("Path to the groups, relative to the search base (\"ou=groups\")"),
            FormField::new("groupSubtree", "Group subtree", FormFieldKind::Bool),
            static_field(
                "groupObjectClass",
                "Group object class",
                "LDAP class for group objects (\"posixGroup\")",
            ),
            static_field(
                "groupIdAttribute",
                "Group ID attribute",
                "Attribute holding the group id (\"cn\")",
            ),
            static_field(
                "groupMemberAttribute",
                "Group member attribute",
                "Attribute listing the members (\"memberUid\")",
            ),
            static_field(
                "groupMemberFormat",
                "Group member format",
                "How members are referenced, \"${dn}\" or \"${username}\"",
            ),
            FormField::new(
                "userMemberOfAttribute",
                "Group member of attribute",
                FormFieldKind::Text,
            )
            .help("User attribute naming the groups (\"memberOf\")")
            .required_when(group_is(GroupType::Dynamic)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use forms::validation::FIELD_REQUIRED;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn users() -> Value {
        json!({
            "userBaseDn": "ou=people",
            "userObjectClass": "inetOrgPerson",
            "userIdAttribute": "uid",
            "userRealNameAttribute": "cn",
            "userEmailAddressAttribute": "mail",
            "ldapGroupsAsRoles": false,
            "groupType": "static",
        })
    }

    #[test]
    fn groups_are_optional_when_not_mapped() {
        let s = schema();
        let data = forms::merge::layered([&s.defaults(), &users()]);
        assert!(!s.validate(&data).is_invalid());
    }

    #[test]
    fn static_and_dynamic_groups_need_different_fields() {
        let s = schema();
        let mut data = forms::merge::layered([&s.defaults(), &users()]);
        data["ldapGroupsAsRoles"] = json!(true);

        let errors = s.validate(&data);
        assert_eq!(errors.get("groupObjectClass"), Some(FIELD_REQUIRED));
        assert_eq!(errors.get("userMemberOfAttribute"), None);

        data["groupType"] = json!("dynamic");
        let errors = s.validate(&data);
        assert_eq!(errors.get("groupObjectClass"), None);
        assert_eq!(errors.get("userMemberOfAttribute"), Some(FIELD_REQUIRED));
    }

    #[test]
    fn group_type_is_ignored_without_role_mapping() {
        assert_eq!(GroupType::from_data(&users()), None);
        let mut data = users();
        data["ldapGroupsAsRoles"] = json!(true);
        assert_eq!(GroupType::from_data(&data), Some(GroupType::Static));
    }
}
