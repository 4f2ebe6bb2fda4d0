use admin_otp::{
    admin::{
        device_admin::{DEVICE_MODEL, QRCODE_FIELD},
        site::OTP_SITE_NAME,
        user_admin::USER_MODEL,
        AdminSite, AdminSites, AdminStores, CustomTotpDeviceAdmin, ListQuery, ModelAdmin,
        RegistryError, TotpDeviceAdmin, UserAdmin,
    },
    otp::{DeviceStore, MemoryDeviceStore, NewDevice},
    users::{CreateOutcome, MemoryUserStore, NewUser, UserStore},
};
use std::sync::Arc;

#[test]
#[allow(clippy::unwrap_used)]
fn gated_site_serves_the_customized_device_admin() {
    let sites = AdminSites::bootstrap().unwrap();
    assert_eq!(sites.gated.name(), OTP_SITE_NAME);
    assert!(sites.gated.otp_required());
    assert!(!sites.default.otp_required());

    let device_admin = sites.gated.registry().get(DEVICE_MODEL).unwrap();
    assert_eq!(device_admin.list_display(), vec!["user", "name"]);
    assert!(sites.gated.registry().is_registered(USER_MODEL));
}

#[test]
#[allow(clippy::unwrap_used)]
fn mirroring_before_customization_keeps_the_stock_admin() {
    let mut default = AdminSite::new("admin");
    default
        .registry_mut()
        .register(Arc::new(TotpDeviceAdmin))
        .unwrap();

    let mut early = AdminSite::otp_gated("early");
    early.registry_mut().mirror_from(default.registry()).unwrap();

    default.registry_mut().unregister(DEVICE_MODEL).unwrap();
    default
        .registry_mut()
        .register(Arc::new(CustomTotpDeviceAdmin))
        .unwrap();

    let stale = early.registry().get(DEVICE_MODEL).unwrap();
    assert!(stale.list_display().contains(&"confirmed"));
    assert!(!early.registry().is_registered(USER_MODEL));
}

#[test]
#[allow(clippy::unwrap_used)]
fn mirroring_twice_conflicts() {
    let sites = AdminSites::bootstrap().unwrap();
    let mut gated = sites.gated.clone();
    let err = gated
        .registry_mut()
        .mirror_from(sites.default.registry())
        .err();
    assert!(matches!(err, Some(RegistryError::AlreadyRegistered(_))));
}

#[test]
fn custom_device_fieldsets_drop_confirmed_and_keep_qrcode() {
    let id = uuid::Uuid::new_v4();
    let fieldsets = CustomTotpDeviceAdmin.fieldsets(Some(id));
    assert_eq!(fieldsets.len(), 2);
    assert_eq!(fieldsets[0].fields, vec!["user".to_string(), "name".to_string()]);
    assert!(fieldsets[1].title.is_none());
    assert!(fieldsets[1].contains(QRCODE_FIELD));
    assert!(fieldsets.iter().all(|f| !f.contains("confirmed")));

    // no QR block on the add form
    let add = CustomTotpDeviceAdmin.fieldsets(None);
    assert_eq!(add.len(), 1);
}

#[test]
fn user_admin_options() {
    let options = UserAdmin.options();
    assert_eq!(options.ordering, vec!["first_name"]);
    assert_eq!(options.list_per_page, 50);
    assert_eq!(options.list_filter, vec!["is_superuser", "is_active"]);
    assert_eq!(
        options.search_fields,
        vec!["first_name", "last_name", "email"]
    );
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn device_changelist_shows_owner_email() {
    let users = Arc::new(MemoryUserStore::new());
    let devices = Arc::new(MemoryDeviceStore::new());
    let CreateOutcome::Created(user) = users
        .create(NewUser::superuser("root@example.com", String::new()))
        .await
        .unwrap()
    else {
        panic!("expected created");
    };
    devices
        .create(NewDevice::generate(user.id, "phone"))
        .await
        .unwrap();

    let stores = AdminStores {
        users: users.clone(),
        devices: devices.clone(),
    };
    let page = CustomTotpDeviceAdmin
        .changelist(&stores, &ListQuery::new(CustomTotpDeviceAdmin.list_per_page()))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0]["user"], "root@example.com");
    assert_eq!(page.items[0]["name"], "phone");
    assert!(page.items[0].get("confirmed").is_none());
}
