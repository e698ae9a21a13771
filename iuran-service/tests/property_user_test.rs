//! Integration tests for residents linked to properties.

mod common;

use axum::http::{Method, StatusCode};
use common::spawn_app;
use iuran_service::models::PropertyType;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn admin_links_updates_and_unlinks_users() {
    let app = spawn_app();
    let property = app
        .seed_property("E", 1, PropertyType::Rumah, Some(app.resident_id), None)
        .await;
    let uri = format!("/admin/properties/{}/users", property.property_id);
    let tenant = Uuid::new_v4();

    let (status, owner_link) = app
        .post(
            &uri,
            app.admin(),
            json!({ "userId": app.resident_id, "relationType": "pemilik" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{owner_link}");
    assert_eq!(owner_link["relationType"], "pemilik");

    let (status, tenant_link) = app
        .post(
            &uri,
            app.admin(),
            json!({ "userId": tenant, "relationType": "sewa" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let link_id = tenant_link["id"].as_str().unwrap().to_string();

    let (status, links) = app.get(&uri, app.admin()).await;
    assert_eq!(status, StatusCode::OK);
    let relations: Vec<&str> = links
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["relationType"].as_str().unwrap())
        .collect();
    assert_eq!(relations, vec!["pemilik", "sewa"]);

    let (status, updated) = app
        .put(
            &format!("/admin/property-users/{link_id}"),
            app.admin(),
            json!({ "relationType": "keluarga" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["relationType"], "keluarga");
    assert_eq!(updated["userId"], tenant.to_string());

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/admin/property-users/{link_id}"),
            app.admin(),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, links) = app.get(&uri, app.admin()).await;
    assert_eq!(links.as_array().unwrap().len(), 1);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/admin/property-users/{link_id}"),
            app.admin(),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_link_is_a_conflict() {
    let app = spawn_app();
    let property = app
        .seed_property("E", 2, PropertyType::Rumah, None, None)
        .await;
    let uri = format!("/admin/properties/{}/users", property.property_id);
    let user = Uuid::new_v4();

    let (status, _) = app
        .post(&uri, app.admin(), json!({ "userId": user, "relationType": "keluarga" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post(&uri, app.admin(), json!({ "userId": user, "relationType": "sewa" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (_, links) = app.get(&uri, app.admin()).await;
    assert_eq!(links.as_array().unwrap().len(), 1);
    assert_eq!(links[0]["relationType"], "keluarga");
}

#[tokio::test]
async fn links_require_known_property_and_relation() {
    let app = spawn_app();
    let missing = format!("/admin/properties/{}/users", Uuid::new_v4());

    let (status, _) = app
        .post(
            &missing,
            app.admin(),
            json!({ "userId": Uuid::new_v4(), "relationType": "sewa" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(&missing, app.admin()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let property = app
        .seed_property("E", 3, PropertyType::Tanah, None, None)
        .await;
    let (status, _) = app
        .post(
            &format!("/admin/properties/{}/users", property.property_id),
            app.admin(),
            json!({ "userId": Uuid::new_v4(), "relationType": "tetangga" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .put(
            &format!("/admin/property-users/{}", Uuid::new_v4()),
            app.admin(),
            json!({ "relationType": "sewa" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .get(
            &format!("/admin/properties/{}/users", property.property_id),
            app.resident(),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
