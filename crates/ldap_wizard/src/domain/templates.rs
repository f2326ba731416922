//! Preset values for the mapping step of common directory servers.

use serde_json::json;

use crate::core::orchestrator::StepTemplate;

fn template(name: &str, values: serde_json::Value) -> StepTemplate {
    StepTemplate {
        name: name.to_string(),
        values,
    }
}

pub fn builtin() -> Vec<StepTemplate> {
    vec![
        template(
            "Active Directory",
            json!({
                "userBaseDn": "cn=users",
                "userSubtree": false,
                "userObjectClass": "user",
                "userIdAttribute": "sAMAccountName",
                "userRealNameAttribute": "cn",
                "userEmailAddressAttribute": "mail",
                "ldapGroupsAsRoles": true,
                "groupType": "dynamic",
                "userMemberOfAttribute": "memberOf",
            }),
        ),
        template(
            "Posix with Dynamic Groups",
            json!({
                "userBaseDn": "ou=people",
                "userSubtree": false,
                "userObjectClass": "inetOrgPerson",
                "userIdAttribute": "uid",
                "userRealNameAttribute": "cn",
                "userEmailAddressAttribute": "mail",
                "ldapGroupsAsRoles": true,
                "groupType": "dynamic",
                "userMemberOfAttribute": "memberOf",
            }),
        ),
        template(
            "Posix with Static Groups",
            json!({
                "userBaseDn": "ou=people",
                "userSubtree": false,
                "userObjectClass": "inetOrgPerson",
                "userIdAttribute": "uid",
                "userRealNameAttribute": "cn",
                "userEmailAddressAttribute": "mail",
                "ldapGroupsAsRoles": true,
                "groupType": "static",
                "groupBaseDn": "ou=groups",
                "groupSubtree": false,
                "groupObjectClass": "posixGroup",
                "groupIdAttribute": "cn",
                "groupMemberAttribute": "memberUid",
                "groupMemberFormat": "${username}",
            }),
        ),
        template(
            "Generic Ldap Server",
            json!({
                "userBaseDn": "ou=people",
                "userSubtree": false,
                "userObjectClass": "inetOrgPerson",
                "userIdAttribute": "uid",
                "userRealNameAttribute": "cn",
                "userEmailAddressAttribute": "mail",
                "ldapGroupsAsRoles": true,
                "groupType": "static",
                "groupBaseDn": "ou=groups",
                "groupSubtree": false,
                "groupObjectClass": "groupOfUniqueNames",
                "groupIdAttribute": "cn",
                "groupMemberAttribute": "uniqueMember",
                "groupMemberFormat": "${dn}",
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mapping;
    use forms::merge::layered;

    #[test]
    fn every_template_fills_a_valid_mapping() {
        let schema = mapping::schema();
        for t in builtin() {
            let data = layered([&schema.defaults(), &t.values]);
            let errors = schema.validate(&data);
            assert!(!errors.is_invalid(), "{}: {:?}", t.name, errors);
        }
    }

    #[test]
    fn templates_only_touch_mapping_fields() {
        let schema = mapping::schema();
        for t in builtin() {
            for key in forms::KeyPath::leaves(&t.values) {
                assert!(schema.field_by_key(&key).is_some(), "{}: {key}", t.name);
            }
        }
    }
}
