use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use identity_cell::{IdentityError, IdentityResolver, PartyReference};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const TOKEN: &str = "caller-token";

async fn resolver_for(server: &MockServer) -> IdentityResolver {
    IdentityResolver::new(&TestConfig::for_mock_server(&server.uri()).to_app_config())
}

async fn mount_empty(server: &MockServer, table: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn patient_resolves_by_direct_account_id() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, Some("auth-7"), "Ana@Example.com")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let patient = resolver_for(&server)
        .await
        .resolve_patient(patient_id.parse().unwrap(), None, TOKEN)
        .await
        .unwrap();

    assert_eq!(patient.id.to_string(), patient_id);
    assert_eq!(patient.email.as_deref(), Some("ana@example.com"));
    assert_eq!(patient.user_id.as_deref(), Some("auth-7"));
}

#[tokio::test]
async fn clinic_membership_normalizes_to_account_by_email() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let membership_id = Uuid::new_v4();
    let account_id = Uuid::new_v4().to_string();

    // direct id misses
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", membership_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_patients"))
        .and(query_param("id", format!("eq.{}", membership_id)))
        .and(query_param("clinic_id", format!("eq.{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": membership_id,
            "clinic_id": clinic_id,
            "patient_id": null,
            "email": " Ana@Example.com ",
            "first_name": "Ana",
            "last_name": "Lopez"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("email", "ilike.Ana@Example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&account_id, None, "ana@example.com")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let patient = resolver_for(&server)
        .await
        .resolve_patient(membership_id, Some(clinic_id), TOKEN)
        .await
        .unwrap();

    assert_eq!(patient.id.to_string(), account_id);
}

#[tokio::test]
async fn membership_without_account_is_its_own_identity() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let membership_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": membership_id,
            "clinic_id": clinic_id,
            "email": null,
            "first_name": "Walk",
            "last_name": "In"
        }])))
        .mount(&server)
        .await;
    mount_empty(&server, "patients").await;

    let patient = resolver_for(&server)
        .await
        .resolve_patient(membership_id, None, TOKEN)
        .await
        .unwrap();

    assert_eq!(patient.id, membership_id);
    assert_eq!(patient.display_name, "Walk In");
    assert!(patient.email.is_none());
}

#[tokio::test]
async fn unknown_patient_is_not_found() {
    let server = MockServer::start().await;
    mount_empty(&server, "patients").await;
    mount_empty(&server, "clinic_patients").await;

    let reference = Uuid::new_v4();
    let result = resolver_for(&server).await.resolve_patient(reference, None, TOKEN).await;

    assert_matches!(result, Err(IdentityError::PatientNotFound(id)) if id == reference);
}

#[tokio::test]
async fn first_active_doctor_orders_by_creation() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4().to_string();
    let membership_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_doctors"))
        .and(query_param("clinic_id", format!("eq.{}", clinic_id)))
        .and(query_param("is_active", "eq.true"))
        .and(query_param("order", "created_at.asc,id.asc"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_doctor_response(
                &membership_id, &clinic_id, Some(&doctor_id), "first@clinic.test", "2024-01-01T00:00:00Z"
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id, "first@clinic.test")
        ])))
        .mount(&server)
        .await;

    let doctor = resolver_for(&server)
        .await
        .first_active_doctor(clinic_id.parse().unwrap(), TOKEN)
        .await
        .unwrap()
        .expect("a doctor");

    assert_eq!(doctor.id.to_string(), doctor_id);
}

#[tokio::test]
async fn first_active_doctor_none_when_clinic_has_no_staff() {
    let server = MockServer::start().await;
    mount_empty(&server, "clinic_doctors").await;

    let doctor = resolver_for(&server)
        .await
        .first_active_doctor(Uuid::new_v4(), TOKEN)
        .await
        .unwrap();

    assert!(doctor.is_none());
}

#[tokio::test]
async fn doctor_by_email_is_clinic_scoped_and_normalized() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4().to_string();
    let membership_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_doctors"))
        .and(query_param("clinic_id", format!("eq.{}", clinic_id)))
        .and(query_param("email", "ilike.New.Hire@Clinic.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_doctor_response(
                &membership_id, &clinic_id, None, "new.hire@clinic.test", "2024-06-01T00:00:00Z"
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;
    mount_empty(&server, "doctors").await;

    let doctor = resolver_for(&server)
        .await
        .find_doctor_by_email(" New.Hire@Clinic.test", clinic_id.parse().unwrap(), TOKEN)
        .await
        .unwrap()
        .expect("membership match");

    assert_eq!(doctor.id.to_string(), membership_id);
}

#[tokio::test]
async fn doctor_by_email_matches_mixed_case_stored_address() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4().to_string();
    let membership_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_doctors"))
        .and(query_param("clinic_id", format!("eq.{}", clinic_id)))
        .and(query_param("email", "ilike.dr.smith@clinic.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_doctor_response(
                &membership_id, &clinic_id, None, "Dr.Smith@Clinic.test", "2024-06-01T00:00:00Z"
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("email", "ilike.Dr.Smith@Clinic.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let doctor = resolver_for(&server)
        .await
        .find_doctor_by_email("dr.smith@clinic.test", clinic_id.parse().unwrap(), TOKEN)
        .await
        .unwrap()
        .expect("case-insensitive match");

    assert_eq!(doctor.id.to_string(), membership_id);
    assert_eq!(doctor.email.as_deref(), Some("dr.smith@clinic.test"));
}

#[tokio::test]
async fn clinic_resolves_by_owner_account() {
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let clinic_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("id", format!("eq.{}", owner)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("owner_user_id", format!("eq.{}", owner)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_response(&clinic_id, Some(&owner.to_string()))
        ])))
        .mount(&server)
        .await;

    let parties = resolver_for(&server)
        .await
        .resolve_parties(&PartyReference { clinic: Some(owner), ..Default::default() }, TOKEN)
        .await
        .unwrap();

    assert_eq!(parties.clinic.unwrap().id.to_string(), clinic_id);
    assert!(parties.patient.is_none());
    assert!(parties.doctor.is_none());
}
