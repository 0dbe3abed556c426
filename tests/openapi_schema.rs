use serde_json::Value;

#[test]
fn openapi_documents_every_route() -> anyhow::Result<()> {
    let doc = backoffice_authz::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let paths = v
        .get("paths")
        .and_then(Value::as_object)
        .expect("paths must exist");

    let expected = [
        "/api/health",
        "/admin/trees/invalidate",
        "/authz/programs/{program_id}",
        "/authz/effective",
        "/menus/visible",
        "/menus/favorites",
        "/categories",
        "/categories/{id}",
        "/categories/{id}/path",
        "/codes",
        "/codes/{group_code}",
        "/codes/{group_code}/{code}",
    ];
    for path in &expected {
        assert!(paths.contains_key(*path), "OpenAPI missing path '{}'", path);
    }

    Ok(())
}

#[test]
fn openapi_declares_bearer_auth_and_authority_scale() -> anyhow::Result<()> {
    let doc = backoffice_authz::docs::build_openapi(9000)?;
    let v = serde_json::to_value(&doc)?;

    let scheme = v
        .pointer("/components/securitySchemes/bearerAuth/scheme")
        .and_then(Value::as_str);
    assert_eq!(scheme, Some("bearer"));

    let levels = v
        .pointer("/components/schemas/AuthorityLevel/enum")
        .and_then(Value::as_array)
        .expect("AuthorityLevel must be an enum schema");
    let levels: Vec<&str> = levels.iter().filter_map(Value::as_str).collect();
    assert_eq!(levels, vec!["NONE", "READ", "WRITE", "EXECUTE", "ADMIN"]);

    let server = v.pointer("/servers/0/url").and_then(Value::as_str);
    assert_eq!(server, Some("http://localhost:9000"));

    Ok(())
}
