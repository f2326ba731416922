use forms::merge::layered;
use forms::validation::{self, FIELD_REQUIRED};
use forms::{FormContext, FormField, FormFieldKind, FormSchema, KeyPath, TemplatePolicy};
use pretty_assertions::assert_eq;
use serde_json::json;

fn groups_schema() -> FormSchema {
    FormSchema::new(
        "Groups",
        vec![
            FormField::new("ldapGroupsAsRoles", "Map groups as roles", FormFieldKind::Bool),
            FormField::new(
                "groupType",
                "Group type",
                FormFieldKind::Select {
                    options: vec!["static".into(), "dynamic".into()],
                },
            ),
            FormField::new("groupBaseDn", "Group base DN", FormFieldKind::Text),
            FormField::new("groupObjectClass", "Group object class", FormFieldKind::Text)
                .required_when(|d| d["ldapGroupsAsRoles"] == true && d["groupType"] == "static"),
            FormField::new("userMemberOfAttribute", "Member of", FormFieldKind::Text)
                .required_when(|d| d["ldapGroupsAsRoles"] == true && d["groupType"] == "dynamic"),
            FormField::new("timeout", "Timeout", FormFieldKind::Number).validator(|v, _| {
                validation::in_range(v, Some(1.0), Some(3600.0), false).map_or(Ok(()), Err)
            }),
        ],
    )
}

#[test]
fn seeded_data_layers_blank_template_and_known_values() {
    let schema = groups_schema();
    let template = json!({
        "ldapGroupsAsRoles": true,
        "groupType": "dynamic",
        "userMemberOfAttribute": "memberOf",
    });
    let known = json!({"userMemberOfAttribute": "isMemberOf"});
    let seed = layered([&schema.defaults(), &template, &known]);

    let ctx = FormContext::new(&schema, seed, false);
    assert_eq!(ctx.data["userMemberOfAttribute"], json!("isMemberOf"));
    assert_eq!(ctx.data["groupBaseDn"], json!(""));
    assert!(ctx.can_submit());
}

#[test]
fn requirements_follow_the_current_group_type() {
    let schema = groups_schema();
    let mut ctx = FormContext::new(&schema, schema.defaults(), false);
    assert!(ctx.can_submit());

    ctx.update(&schema, &KeyPath::from("ldapGroupsAsRoles"), json!(true));
    assert_eq!(ctx.field_error("groupObjectClass"), Some(FIELD_REQUIRED));
    assert_eq!(ctx.field_error("userMemberOfAttribute"), None);

    ctx.update(&schema, &KeyPath::from("groupType"), json!("dynamic"));
    assert_eq!(ctx.field_error("groupObjectClass"), None);
    assert_eq!(ctx.field_error("userMemberOfAttribute"), Some(FIELD_REQUIRED));
    assert!(!ctx.can_submit());
}

#[test]
fn number_rules_report_the_first_failure() {
    let schema = groups_schema();
    let mut ctx = FormContext::new(&schema, schema.defaults(), false);
    ctx.update(&schema, &KeyPath::from("timeout"), json!("7200"));
    assert_eq!(
        ctx.field_error("timeout"),
        Some("The maximum value for this field is 3600")
    );
    ctx.update(&schema, &KeyPath::from("timeout"), json!("1.5"));
    assert_eq!(ctx.field_error("timeout"), Some(validation::DECIMAL));
}

#[test]
fn template_round_trip_keeps_hand_edits() {
    let schema = groups_schema();
    let mut ctx = FormContext::new(&schema, schema.defaults(), false);
    let static_groups = json!({
        "ldapGroupsAsRoles": true,
        "groupType": "static",
        "groupObjectClass": "groupOfNames",
        "groupBaseDn": "ou=groups",
    });
    let dynamic_groups = json!({
        "ldapGroupsAsRoles": true,
        "groupType": "dynamic",
        "userMemberOfAttribute": "memberOf",
    });

    ctx.apply_template(&schema, &static_groups, TemplatePolicy::PreserveEdits);
    ctx.update(&schema, &KeyPath::from("groupBaseDn"), json!("ou=roles"));
    ctx.apply_template(&schema, &dynamic_groups, TemplatePolicy::PreserveEdits);

    assert_eq!(ctx.data["groupType"], json!("dynamic"));
    assert_eq!(ctx.data["groupObjectClass"], json!(""));
    assert_eq!(ctx.data["groupBaseDn"], json!("ou=roles"));
    assert_eq!(ctx.data["userMemberOfAttribute"], json!("memberOf"));
    assert!(ctx.can_submit());
}

#[test]
fn unknown_fields_are_reported() {
    let schema = groups_schema();
    assert!(schema.require_field(&KeyPath::from("groupType")).is_ok());
    assert_eq!(
        schema.require_field(&KeyPath::from("nope")).unwrap_err().to_string(),
        "unknown field: nope"
    );
}
