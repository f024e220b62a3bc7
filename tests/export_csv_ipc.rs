mod common;

use common::{temp_dir, Sidecar, StubBackend};
use serde_json::json;

#[test]
fn explicit_rows_become_csv_text() {
    let stub = StubBackend::start();
    let mut sidecar = Sidecar::spawn(&stub.base_url);

    let out = sidecar.request_ok(
        "export.csv",
        json!({
            "rows": [
                { "alumno": "Soto, Pedro", "monto": 950, "fecha": "2025-03-10", "nota": null },
                { "alumno": "Ana \"Anita\" Ruiz", "monto": 1200.5, "fecha": "2025-03-11", "nota": "beca" }
            ],
            "columns": [
                { "key": "alumno", "header": "Alumno" },
                { "key": "monto", "header": "Monto" },
                { "key": "nota", "header": "Nota" }
            ],
            "kind": "cobranza",
            "suffix": "2025-03"
        }),
    );
    assert_eq!(out["rowCount"], json!(2));
    assert_eq!(out["fileName"], json!("cobranza_2025-03.csv"));
    assert_eq!(
        out["csv"],
        json!("Alumno,Monto,Nota\n\"Soto, Pedro\",950,\n\"Ana \"\"Anita\"\" Ruiz\",1200.5,beca\n")
    );
    // Nothing went to the backend.
    assert!(stub.requests().is_empty());
}

#[test]
fn cached_reads_can_be_exported_to_a_file() {
    let stub = StubBackend::start();
    stub.route(
        "GET",
        "/alumnos",
        200,
        json!({ "data": [
            { "matricula": "ENG001", "nombre": "Lucía", "plan": { "id": 2 } },
            { "matricula": "ENG002", "nombre": "Pedro", "plan": null }
        ]}),
    );
    let mut sidecar = Sidecar::spawn(&stub.base_url);

    let listed = sidecar.request_ok("students.list", json!({}));
    let key = listed["cacheKey"].as_str().expect("cache key").to_string();

    let inline = sidecar.request_ok("export.csv", json!({ "cacheKey": key, "suffix": "hoy" }));
    assert_eq!(inline["fileName"], json!("alumnos_hoy.csv"));
    assert_eq!(
        inline["csv"],
        json!("matricula,nombre,plan\nENG001,Lucía,\"{\"\"id\"\":2}\"\nENG002,Pedro,\n")
    );

    let out_path = temp_dir("cobranza-export").join("nested").join("alumnos.csv");
    let written = sidecar.request_ok(
        "export.csv",
        json!({
            "cacheKey": key,
            "columns": ["matricula"],
            "outPath": out_path.to_string_lossy()
        }),
    );
    assert_eq!(written["rowCount"], json!(2));
    let text = std::fs::read_to_string(&out_path).expect("read export");
    assert_eq!(text, "matricula\nENG001\nENG002\n");

    // Export is served from cache only.
    assert_eq!(stub.requests_to("GET", "/alumnos").len(), 1);
}

#[test]
fn unknown_cache_keys_and_missing_sources_are_rejected() {
    let stub = StubBackend::start();
    let mut sidecar = Sidecar::spawn(&stub.base_url);

    let err = sidecar.request_err("export.csv", json!({ "cacheKey": "/pagos?page=1" }));
    assert_eq!(err["code"], json!("not_found"));

    let err = sidecar.request_err("export.csv", json!({}));
    assert_eq!(err["code"], json!("bad_params"));

    let err = sidecar.request_err("export.csv", json!({ "rows": "nope" }));
    assert_eq!(err["code"], json!("bad_params"));
}
