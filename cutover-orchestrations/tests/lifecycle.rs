//! Full blue-green lifecycle through the public registry

use std::sync::Arc;

use cutover_models::{
    ApplicationInfo, ArtifactReference, CliVersion, CommandUnitStatus, Credentials, InfraConfig,
    NamingStrategy, ResizeStrategy,
};
use cutover_orchestrations::context::TaskContext;
use cutover_orchestrations::names::orchestrations;
use cutover_orchestrations::platform::{InMemoryPlatform, PlatformOperation};
use cutover_orchestrations::progress::RecordingLogSink;
use cutover_orchestrations::registry::{create_task_registry, TaskRegistry};
use cutover_orchestrations::{
    ResizeRequest, SetupRequest, SwapRollbackRequest, SwapRoutesRequest, TaskOutput, TaskRequest,
};

const MANIFEST: &str = "\
applications:
- name: checkout
  memory: 512M
  instances: 3
";

const ROUTE: &str = "checkout.example.com";
const TEMP_ROUTE: &str = "checkout-temp.example.com";

fn infra() -> InfraConfig {
    InfraConfig {
        endpoint_url: "https://api.sys.example.com".to_string(),
        organization: "acme".to_string(),
        space: "prod".to_string(),
        credentials: Credentials {
            username: "deployer".to_string(),
            password: "secret".to_string(),
        },
        cli_version: CliVersion::V7,
        skip_ssl_validation: false,
    }
}

struct Fixture {
    platform: Arc<InMemoryPlatform>,
    sink: Arc<RecordingLogSink>,
    ctx: TaskContext,
    registry: TaskRegistry,
}

fn fixture() -> Fixture {
    let platform = Arc::new(InMemoryPlatform::new());
    let sink = Arc::new(RecordingLogSink::new());
    let ctx = TaskContext::new(platform.clone(), sink.clone())
        .with_work_root(std::env::temp_dir().join("cutover-lifecycle"));
    Fixture {
        platform,
        sink,
        ctx,
        registry: create_task_registry(),
    }
}

impl Fixture {
    async fn run(&self, name: &str, request: TaskRequest) -> TaskOutput {
        let response = self
            .registry
            .execute(&self.ctx, name, request)
            .await
            .unwrap();
        assert!(response.is_success(), "{} failed: {:?}", name, response.error_message);
        response.output.unwrap()
    }
}

fn routes(route: &str) -> Vec<String> {
    vec![route.to_string()]
}

#[tokio::test(start_paused = true)]
async fn test_deploy_swap_and_roll_back() {
    let f = fixture();
    let previous_inactive = f.platform.add_application("checkout__INACTIVE", 0, &[]);
    let previous_active = f.platform.add_application("checkout", 3, &[ROUTE]);

    // setup
    let TaskOutput::Setup(setup) = f
        .run(
            orchestrations::BLUE_GREEN_SETUP,
            TaskRequest::BlueGreenSetup(SetupRequest {
                infra: infra(),
                release_name_prefix: "checkout".to_string(),
                manifest: MANIFEST.to_string(),
                artifact: ArtifactReference::Package {
                    path: std::env::temp_dir(),
                },
                routes: routes(ROUTE),
                temp_routes: routes(TEMP_ROUTE),
                older_active_version_count_to_keep: 3,
                use_app_autoscaler: false,
                naming_strategy: NamingStrategy::NonVersioned,
                timeout_interval_in_min: 5,
            }),
        )
        .await
    else {
        panic!("setup returned the wrong output");
    };
    assert_eq!(setup.new_application.application_name, "checkout__INACTIVE");
    assert_eq!(f.platform.guid_of("checkout__0"), Some(previous_inactive.clone()));

    // resize
    let TaskOutput::Resize(resize) = f
        .run(
            orchestrations::RESIZE,
            TaskRequest::Resize(ResizeRequest {
                infra: infra(),
                release_name_prefix: "checkout".to_string(),
                new_application: setup.new_application.clone(),
                old_application: setup.active_application.clone(),
                upsize_count: 3,
                downsize_count: 0,
                resize_strategy: ResizeStrategy::UpscaleNewFirst,
                use_app_autoscaler: false,
                routes: Vec::new(),
                blue_green: true,
                timeout_interval_in_min: 5,
            }),
        )
        .await
    else {
        panic!("resize returned the wrong output");
    };
    assert_eq!(
        f.platform.application("checkout__INACTIVE").unwrap().running_instance_count,
        3
    );
    assert_eq!(f.platform.application("checkout").unwrap().running_instance_count, 3);

    // swap
    let swap_request = SwapRoutesRequest {
        infra: infra(),
        release_name_prefix: "checkout".to_string(),
        active_application: setup.active_application.clone(),
        inactive_application: setup.inactive_application.clone(),
        new_application: setup.new_application.clone(),
        final_routes: routes(ROUTE),
        temp_routes: routes(TEMP_ROUTE),
        downsize_old_application: false,
        idle_instance_count: 0,
        use_app_autoscaler: false,
        naming_strategy: NamingStrategy::NonVersioned,
        timeout_interval_in_min: 5,
    };
    f.run(orchestrations::SWAP_ROUTES, TaskRequest::SwapRoutes(swap_request))
        .await;

    let serving = f.platform.application("checkout").unwrap();
    assert_eq!(serving.guid, setup.new_application.application_guid);
    assert!(serving.has_route(ROUTE));
    assert_eq!(f.platform.guid_of("checkout__INACTIVE"), Some(previous_active.clone()));

    // swap rollback
    let TaskOutput::Rollback(rollback) = f
        .run(
            orchestrations::SWAP_ROLLBACK,
            TaskRequest::SwapRollback(SwapRollbackRequest {
                infra: infra(),
                release_name_prefix: "checkout".to_string(),
                active_application: setup.active_application.clone(),
                inactive_application: setup.inactive_application.clone(),
                new_application: setup.new_application.clone(),
                final_routes: routes(ROUTE),
                temp_routes: routes(TEMP_ROUTE),
                instance_data: resize.instance_data.clone(),
                swap_route_occurred: true,
                upsize_inactive_app: true,
                use_app_autoscaler: false,
                naming_strategy: NamingStrategy::NonVersioned,
                timeout_interval_in_min: 5,
            }),
        )
        .await
    else {
        panic!("swap rollback returned the wrong output");
    };

    let restored = f.platform.application("checkout").unwrap();
    assert_eq!(restored.guid, previous_active);
    assert!(restored.has_route(ROUTE));
    assert!(!restored.has_route(TEMP_ROUTE));
    assert_eq!(
        rollback.restored_application.map(|app: ApplicationInfo| app.application_guid),
        Some(previous_active)
    );
    let failed = f
        .platform
        .application_by_guid(&setup.new_application.application_guid)
        .unwrap();
    assert_eq!(failed.name, "checkout__INACTIVE");
    assert!(!failed.has_route(ROUTE));

    assert!(f.sink.open_units().is_empty());
    assert!(f
        .sink
        .unit_statuses()
        .iter()
        .all(|(_, status)| *status == CommandUnitStatus::Success));
    assert!(f.platform.calls_of(PlatformOperation::Delete).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wrong_variant_is_a_caller_error() {
    let f = fixture();

    let err = f
        .registry
        .execute(
            &f.ctx,
            orchestrations::SWAP_ROUTES,
            TaskRequest::Resize(ResizeRequest {
                infra: infra(),
                release_name_prefix: "checkout".to_string(),
                new_application: ApplicationInfo::default(),
                old_application: None,
                upsize_count: 1,
                downsize_count: 0,
                resize_strategy: ResizeStrategy::default(),
                use_app_autoscaler: false,
                routes: Vec::new(),
                blue_green: true,
                timeout_interval_in_min: 5,
            }),
        )
        .await
        .unwrap_err();

    assert!(err.is_invalid_arguments());
    assert!(f.platform.calls().is_empty());
}
