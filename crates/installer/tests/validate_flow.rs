mod support;

use support::{healthy_aws, not_found, test_config, ScriptedRunner};
use xpdemo_cli::manifests::{self, Secrets};
use xpdemo_cli::validation::{CheckGroup, CheckStatus};
use xpdemo_cli::{CommandOutput, Validator};

/// A cluster with nothing installed: no pods, every object missing.
fn empty_cluster() -> ScriptedRunner {
    healthy_aws()
        .on(|inv| inv.starts_with(&["get", "-n"]) && inv.has_arg("pods"), |_| Ok(CommandOutput::ok("")))
        .on(
            |inv| inv.program == "kubectl" && inv.starts_with(&["get"]),
            |inv| Ok(not_found(&inv.args.join(" "))),
        )
}

/// Everything installed and reconciled.
fn healthy_cluster() -> ScriptedRunner {
    healthy_aws()
        .on(
            |inv| inv.has_arg("pods") && inv.has_arg("app=crossplane"),
            |_| {
                Ok(CommandOutput::ok(
                    "crossplane-7d9f8b6c5-abcde   1/1   Running   0   5m\n\
                     crossplane-rbac-manager-6b8f9c7d4-fghij   1/1   Running   0   5m\n",
                ))
            },
        )
        .on(
            |inv| inv.has_arg("pods"),
            |_| Ok(CommandOutput::ok("xpdemo-web-5c6d7f8b9-klmno   1/1   Running   0   1m\n")),
        )
        .on(
            |inv| inv.args.iter().any(|a| a.starts_with("jsonpath=")),
            |_| Ok(CommandOutput::ok("True")),
        )
}

#[test]
fn test_empty_cluster_passes_nothing() {
    let config = test_config();
    let plan = manifests::render_all(&config, &Secrets::masked()).unwrap();
    let runner = empty_cluster();

    let report = Validator::new(&runner, &config, &plan).run("kind-empty");

    assert_eq!(report.passed_count(), 0);
    assert!(report.failed_count() > 0);
    // Credentials are not checked without a ProviderConfig
    assert!(runner.calls().iter().all(|c| !c.starts_with(&["sts"])));
}

#[test]
fn test_unreachable_cluster_passes_nothing() {
    let config = test_config();
    let plan = manifests::render_all(&config, &Secrets::masked()).unwrap();
    let runner = healthy_aws().on(
        |inv| inv.program == "kubectl",
        |_| Ok(CommandOutput::failed("Unable to connect to the server: dial tcp 127.0.0.1:6443")),
    );

    let report = Validator::new(&runner, &config, &plan).run("kind-down");
    assert_eq!(report.passed_count(), 0);
    assert!(report.failed_count() > 0);
}

#[test]
fn test_healthy_environment_passes() {
    let config = test_config();
    let plan = manifests::render_all(&config, &Secrets::masked()).unwrap();
    let runner = healthy_cluster();

    let report = Validator::new(&runner, &config, &plan).run("kind-demo");

    assert_eq!(report.failed_count(), 0);
    assert_eq!(report.warning_count(), 0);
    assert!(report.all_passed());

    let credentials = report
        .checks
        .iter()
        .find(|c| c.name == "AWS credentials")
        .unwrap();
    assert_eq!(credentials.details, "account 123456789012");
}

#[test]
fn test_converging_resources_only_warn() {
    let config = test_config();
    let plan = manifests::render_all(&config, &Secrets::masked()).unwrap();
    let runner = healthy_aws()
        // The database is still being created
        .on(
            |inv| inv.has_arg("instance.rds.aws.upbound.io/xpdemo-db"),
            |_| Ok(CommandOutput::ok("False")),
        )
        .on(
            |inv| inv.has_arg("pods") && inv.has_arg("app=xpdemo-web"),
            |_| Ok(CommandOutput::ok("xpdemo-web-5c6d7f8b9-klmno   0/1   ContainerCreating   0   5s\n")),
        )
        .on(
            |inv| inv.has_arg("pods"),
            |_| Ok(CommandOutput::ok("crossplane-7d9f8b6c5-abcde   1/1   Running   0   5m\n")),
        )
        .on(
            |inv| inv.args.iter().any(|a| a.starts_with("jsonpath=")),
            |_| Ok(CommandOutput::ok("True")),
        );

    let report = Validator::new(&runner, &config, &plan).run("kind-demo");

    assert_eq!(report.failed_count(), 0);
    let warnings: Vec<_> = report
        .checks
        .iter()
        .filter(|c| c.status == CheckStatus::Warn)
        .collect();
    assert_eq!(warnings.len(), 2);
    assert!(warnings
        .iter()
        .any(|c| c.group == CheckGroup::Infrastructure && c.details == "Ready=False"));
    assert!(warnings.iter().any(|c| c.group == CheckGroup::Application));
}

#[test]
fn test_unhealthy_provider_fails() {
    let config = test_config();
    let plan = manifests::render_all(&config, &Secrets::masked()).unwrap();
    let runner = healthy_aws()
        .on(
            |inv| inv.has_arg("provider.pkg.crossplane.io/provider-aws-rds"),
            |_| Ok(CommandOutput::ok("False")),
        )
        .on(
            |inv| inv.has_arg("pods"),
            |_| Ok(CommandOutput::ok("crossplane-7d9f8b6c5-abcde   1/1   Running   0   5m\n")),
        )
        .on(
            |inv| inv.args.iter().any(|a| a.starts_with("jsonpath=")),
            |_| Ok(CommandOutput::ok("True")),
        );

    let report = Validator::new(&runner, &config, &plan).run("kind-demo");
    assert_eq!(report.failed_count(), 1);
    let failed = report
        .checks
        .iter()
        .find(|c| c.status == CheckStatus::Fail)
        .unwrap();
    assert_eq!(failed.name, "provider-aws-rds");
    assert_eq!(failed.details, "Healthy=False");
}
