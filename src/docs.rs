use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::{AuthorityLevel, AuthoritySource, Resolution};
use crate::events;
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::admin::invalidate_tree,
		routes::authz::resolve_program,
		routes::authz::effective_authorities,
		routes::menus::visible_menus,
		routes::menus::visible_favorites,
		routes::categories::active_tree,
		routes::categories::active_subtree,
		routes::categories::path,
		routes::codes::active_groups,
		routes::codes::active_codes,
		routes::codes::resolve_code
	),
	components(
		schemas(
			AuthorityLevel,
			AuthoritySource,
			Resolution,
			routes::health::HealthResponse,
			events::TreeChanged,
			events::TreeKind,
			events::TreeAction,
			models::menu::Menu,
			models::menu::MenuTreeItem,
			models::category::Category,
			models::category::CategoryTreeItem,
			models::code::CommonCodeGroup,
			models::code::CommonCode
		)
	),
	tags(
		(name = "Health", description = "Liveness"),
		(name = "Admin", description = "Cache maintenance"),
		(name = "Authz", description = "Effective program authority"),
		(name = "Menus", description = "Menu visibility"),
		(name = "Categories", description = "Category hierarchy"),
		(name = "Codes", description = "Common code lookup")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;
	let root = doc.as_object_mut().context("OpenAPI root must be an object")?;

	ensure_security_components(root)?;
	ensure_global_security(root);
	ensure_servers(root, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: &utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(doc)?);
	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_security_components(root: &mut Map<String, Value>) -> anyhow::Result<()> {
	let schemes = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.context("components must be an object")?
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.context("securitySchemes must be an object")?;

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);
	Ok(())
}

fn ensure_global_security(root: &mut Map<String, Value>) {
	root.entry("security")
		.or_insert_with(|| json!([{ "bearerAuth": [] }]));
}

fn ensure_servers(root: &mut Map<String, Value>, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match root.get_mut("servers") {
		Some(Value::Array(servers)) => {
			let has = servers
				.iter()
				.any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				servers.push(json!({ "url": server_url }));
			}
		}
		_ => {
			root.insert("servers".to_string(), json!([{ "url": server_url }]));
		}
	}
}
