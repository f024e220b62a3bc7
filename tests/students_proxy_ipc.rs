mod common;

use common::{Sidecar, StubBackend};
use serde_json::json;

fn student_page() -> serde_json::Value {
    json!({
        "data": [
            {
                "id": 1,
                "matricula": "ENG001",
                "nombre": "Lucía",
                "apellido_paterno": "Hernández",
                "apellido_materno": "Ríos",
                "estatus": "activo",
                "plan_id": 2
            },
            {
                "id": 2,
                "matricula": "ENG002",
                "nombre": "Pedro",
                "apellido_paterno": "Soto",
                "apellido_materno": null,
                "estatus": "saldo_pendiente",
                "plan_id": 2
            }
        ],
        "pagination": { "page": 1, "limit": 10, "total": 2 }
    })
}

#[test]
fn list_translates_filters_and_decorates_rows() {
    let stub = StubBackend::start();
    stub.route("GET", "/alumnos", 200, student_page());
    let mut sidecar = Sidecar::spawn(&stub.base_url);

    let res = sidecar.request_ok(
        "students.list",
        json!({ "status": "active", "search": "luc", "authorization": "Bearer t0k" }),
    );
    assert_eq!(res["freshness"], json!("revalidated"));
    assert_eq!(res["stale"], json!(false));
    let rows = res["body"]["data"].as_array().expect("rows");
    assert_eq!(rows[0]["nombreCompleto"], json!("Lucía Hernández Ríos"));
    assert_eq!(rows[0]["estatusLabel"], json!("Activo"));
    assert_eq!(rows[1]["nombreCompleto"], json!("Pedro Soto"));
    assert_eq!(rows[1]["estatusLabel"], json!("Saldo pendiente"));

    let sent = stub.requests_to("GET", "/alumnos");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].query_value("page"), Some("1"));
    assert_eq!(sent[0].query_value("limit"), Some("10"));
    assert_eq!(sent[0].query_value("estatus"), Some("activo"));
    assert_eq!(sent[0].query_value("search"), Some("luc"));
    assert_eq!(sent[0].header("authorization"), Some("Bearer t0k"));
    assert_eq!(sent[0].header("cache-control"), Some("no-store"));
    assert!(sent[0].header("x-request-id").is_some());
}

#[test]
fn reads_are_deduped_until_a_mutation_invalidates_them() {
    let stub = StubBackend::start();
    stub.route("GET", "/alumnos", 200, student_page());
    stub.route("POST", "/alumnos", 201, json!({ "ok": true, "data": { "id": 3 } }));
    let mut sidecar = Sidecar::spawn(&stub.base_url);

    sidecar.request_ok("students.list", json!({ "status": "inactive" }));
    let second = sidecar.request_ok("students.list", json!({ "status": "inactive" }));
    assert_eq!(second["freshness"], json!("cached"));
    assert_eq!(stub.requests_to("GET", "/alumnos").len(), 1);
    assert_eq!(
        stub.requests_to("GET", "/alumnos")[0].query_value("estatus"),
        Some("baja")
    );

    let created = sidecar.request_ok(
        "students.create",
        json!({
            "name": "Ana",
            "lastName": "Ruiz",
            "email": "ana@correo.mx",
            "phone": "5512345678",
            "planId": "2",
            "siteId": "default-site-id"
        }),
    );
    assert_eq!(created["status"], json!(201));

    let post = &stub.requests_to("POST", "/alumnos")[0];
    let body = post.json();
    assert_eq!(body["nombre"], json!("Ana"));
    assert_eq!(body["apellido_paterno"], json!("Ruiz"));
    assert_eq!(body["telefono"], json!("5512345678"));
    assert_eq!(body["plan_id"], json!(2));
    assert_eq!(body["estatus"], json!("activo"));
    assert!(body["fecha_inscripcion"].is_string());
    assert_eq!(body["fecha_inscripcion"], body["fecha_inicio"]);
    assert!(body.get("siteId").is_none());
    assert_eq!(post.header("content-type"), Some("application/json"));

    let third = sidecar.request_ok("students.list", json!({ "status": "inactive" }));
    assert_eq!(third["freshness"], json!("revalidated"));
    assert_eq!(stub.requests_to("GET", "/alumnos").len(), 2);
}

#[test]
fn forced_revalidation_falls_back_to_stale_data() {
    let stub = StubBackend::start();
    stub.route("GET", "/alumnos", 200, student_page());
    let mut sidecar = Sidecar::spawn(&stub.base_url);

    let first = sidecar.request_ok("students.list", json!({}));
    stub.route("GET", "/alumnos", 503, json!({ "error": "mantenimiento" }));

    let stale = sidecar.request_ok("students.list", json!({ "revalidate": true }));
    assert_eq!(stale["freshness"], json!("stale"));
    assert_eq!(stale["stale"], json!(true));
    assert_eq!(stale["body"], first["body"]);
    assert_eq!(stale["error"]["code"], json!("backend_error"));
    assert_eq!(stale["error"]["message"], json!("mantenimiento"));

    let stats = sidecar.request_ok("cache.stats", json!({}));
    assert_eq!(stats["staleServed"], json!(1));

    // Different query, nothing cached: the error surfaces.
    let err = sidecar.request_err("students.list", json!({ "page": 2 }));
    assert_eq!(err["code"], json!("backend_error"));
    assert_eq!(err["details"]["status"], json!(503));
}

#[test]
fn create_requires_a_name_and_update_maps_status() {
    let stub = StubBackend::start();
    stub.route("PUT", "/alumnos/5", 200, json!({ "ok": true }));
    let mut sidecar = Sidecar::spawn(&stub.base_url);

    let err = sidecar.request_err("students.create", json!({ "lastName": "Ruiz" }));
    assert_eq!(err["code"], json!("validation_failed"));
    assert_eq!(err["details"]["errors"]["nombre"], json!("Requerido"));
    assert!(stub.requests_to("POST", "/alumnos").is_empty());

    sidecar.request_ok("students.update", json!({ "id": 5, "status": false, "phone": "555" }));
    let put = &stub.requests_to("PUT", "/alumnos/5")[0];
    assert_eq!(put.json(), json!({ "telefono": "555", "estatus": "baja" }));

    let missing = sidecar.request_err("students.update", json!({ "status": true }));
    assert_eq!(missing["code"], json!("bad_params"));
}

#[test]
fn delete_tolerates_empty_bodies() {
    let stub = StubBackend::start();
    stub.route_raw("DELETE", "/alumnos/9", 200, "", &[]);
    stub.route_raw("DELETE", "/alumnos/10", 200, "deleted", &[]);
    let mut sidecar = Sidecar::spawn(&stub.base_url);

    let out = sidecar.request_ok("students.delete", json!({ "id": 9 }));
    assert_eq!(out["body"], json!({}));
    let out = sidecar.request_ok("students.delete", json!({ "id": "10" }));
    assert_eq!(out["body"], json!({}));
}

#[test]
fn path_like_ids_never_reach_the_backend() {
    let stub = StubBackend::start();
    stub.route("DELETE", "/planes/9", 200, json!({ "ok": true }));
    let mut sidecar = Sidecar::spawn(&stub.base_url);

    for bad in [json!("1/../../planes/9"), json!("2?x=1"), json!(-1)] {
        let err = sidecar.request_err("students.delete", json!({ "id": bad }));
        assert_eq!(err["code"], json!("bad_params"));
    }
    let err = sidecar.request_err("students.get", json!({ "id": "../planes" }));
    assert_eq!(err["code"], json!("bad_params"));
    assert!(stub.requests().is_empty());
}
