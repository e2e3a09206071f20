use uuid::Uuid;

use authorization_cell::AuthorizationPolicy;
use shared_database::AppointmentRepository;
use shared_models::auth::{Principal, Role};
use shared_models::scheduling::Appointment;
use shared_utils::test_utils::{account, future_slot, principal_for, SchedulingFixture};

async fn setup() -> (SchedulingFixture, AuthorizationPolicy, Appointment) {
    let fixture = SchedulingFixture::new().await;
    let policy = AuthorizationPolicy::new(fixture.repositories.clone());

    let appointment = Appointment::pending(
        fixture.customer.id,
        fixture.service.id,
        fixture.professional.id,
        future_slot(2, 10, 0),
        future_slot(2, 10, 30),
    );
    fixture.store.save_appointment(&appointment).await.unwrap();

    (fixture, policy, appointment)
}

#[tokio::test]
async fn test_customer_can_modify_own_appointment_only() {
    let (fixture, policy, appointment) = setup().await;

    assert!(policy
        .can_modify_appointment(&fixture.customer_principal(), appointment.id)
        .await
        .unwrap());
    assert!(!policy
        .can_modify_appointment(&fixture.other_customer_principal(), appointment.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_admin_role_overrides_ownership() {
    let (fixture, policy, appointment) = setup().await;

    let mut elevated = fixture.other_customer_principal();
    elevated.roles.insert(Role::Admin);

    assert!(policy.can_modify_appointment(&elevated, appointment.id).await.unwrap());
    assert!(policy
        .can_modify_appointment(&fixture.admin_principal(), Uuid::new_v4())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_missing_appointment_is_denied() {
    let (fixture, policy, _) = setup().await;

    assert!(!policy
        .can_modify_appointment(&fixture.customer_principal(), Uuid::new_v4())
        .await
        .unwrap());
    assert!(!policy
        .is_owner_of_appointment(&fixture.customer_principal(), Uuid::new_v4())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_ownership_check_has_no_admin_shortcut() {
    let (fixture, policy, appointment) = setup().await;

    assert!(!policy
        .is_owner_of_appointment(&fixture.admin_principal(), appointment.id)
        .await
        .unwrap());
    assert!(policy
        .is_owner_of_appointment(&fixture.customer_principal(), appointment.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_unresolvable_principal_is_denied_everywhere() {
    let (fixture, policy, appointment) = setup().await;
    let ghost = fixture.unknown_principal();
    let anonymous = Principal::new("anon", None, [Role::User]);

    for principal in [&ghost, &anonymous] {
        assert!(!policy.can_modify_appointment(principal, appointment.id).await.unwrap());
        assert!(!policy.can_modify_service(principal, fixture.service.id).await.unwrap());
        assert!(!policy.can_modify_user(principal, fixture.customer.id).await.unwrap());
        assert!(!policy.can_modify_professional(principal, fixture.professional.id));
        assert_eq!(policy.current_professional_id(principal).await.unwrap(), None);
    }
}

#[tokio::test]
async fn test_assigned_professional_can_view_but_not_modify() {
    let (fixture, policy, appointment) = setup().await;
    let professional = fixture.professional_principal();

    assert!(policy.can_view_appointment_record(&professional, &appointment).await.unwrap());
    assert!(!policy.can_modify_appointment_record(&professional, &appointment).await.unwrap());
    assert!(!policy
        .can_view_appointment_record(&fixture.other_customer_principal(), &appointment)
        .await
        .unwrap());
    assert!(policy.can_view_appointment(&professional, appointment.id).await.unwrap());
    assert!(!policy.can_view_appointment(&professional, Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn test_service_ownership() {
    let (fixture, policy, _) = setup().await;

    assert!(policy
        .can_modify_service(&fixture.professional_principal(), fixture.service.id)
        .await
        .unwrap());
    // unowned services are administrator-managed
    assert!(!policy
        .can_modify_service(&fixture.professional_principal(), fixture.global_service.id)
        .await
        .unwrap());
    assert!(policy
        .can_modify_service(&fixture.admin_principal(), fixture.global_service.id)
        .await
        .unwrap());
    assert!(!policy
        .can_modify_service(&fixture.customer_principal(), fixture.service.id)
        .await
        .unwrap());
    assert!(!policy
        .is_owner_of_service(&fixture.admin_principal(), fixture.service.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_user_self_modification() {
    let (fixture, policy, _) = setup().await;

    assert!(policy
        .can_modify_user(&fixture.customer_principal(), fixture.customer.id)
        .await
        .unwrap());
    assert!(!policy
        .can_modify_user(&fixture.customer_principal(), fixture.other_customer.id)
        .await
        .unwrap());
    assert!(policy
        .can_modify_user(&fixture.admin_principal(), fixture.customer.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_professional_records_are_admin_only() {
    let (fixture, policy, _) = setup().await;

    assert!(!policy.can_modify_professional(&fixture.professional_principal(), fixture.professional.id));
    assert!(policy.can_modify_professional(&fixture.admin_principal(), fixture.professional.id));
}

#[tokio::test]
async fn test_professional_id_resolution_is_memoised() {
    let (fixture, policy, _) = setup().await;
    let principal = fixture.professional_principal();

    assert_eq!(principal.cached_professional_id(), None);
    let resolved = policy.current_professional_id(&principal).await.unwrap();
    assert_eq!(resolved, Some(fixture.professional.id));
    assert_eq!(principal.cached_professional_id(), Some(Some(fixture.professional.id)));

    let late_account = account("Late", "late@citas.test", &[Role::Professional]);
    fixture.store.insert_account(late_account.clone()).await.unwrap();
    let late = principal_for(&late_account);
    assert_eq!(policy.current_professional_id(&late).await.unwrap(), None);
    assert_eq!(late.cached_professional_id(), Some(None));
}
