mod support;

use clap::Parser;
use support::{healthy_aws, test_config, timed_out, ScriptedRunner};
use xpdemo_cli::commands::install::InstallCommand;
use xpdemo_cli::manifests::{self, Category, Secrets};
use xpdemo_cli::{InstallOptions, Installer, ToolError};

/// Categories in the order their YAML reached `kubectl apply`.
fn applied_categories(runner: &ScriptedRunner, plan: &xpdemo_cli::ResourcePlan) -> Vec<Category> {
    runner
        .applied()
        .iter()
        .filter_map(|yaml| {
            Category::INSTALL_ORDER
                .into_iter()
                .find(|c| plan.yaml_for(*c) == *yaml)
        })
        .collect()
}

#[tokio::test]
async fn test_install_applies_categories_in_dependency_order() {
    let config = test_config();
    let plan = manifests::render_all(&config, &Secrets::generate()).unwrap();
    let runner = healthy_aws();

    Installer::new(&runner, &config, &plan, InstallOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(applied_categories(&runner, &plan), Category::INSTALL_ORDER.to_vec());

    // Crossplane goes in before any provider object
    let calls = runner.calls();
    let helm_install = calls
        .iter()
        .position(|c| c.program == "helm" && c.starts_with(&["upgrade", "--install"]))
        .unwrap();
    let first_apply = calls
        .iter()
        .position(|c| c.starts_with(&["apply", "-f", "-"]))
        .unwrap();
    assert!(helm_install < first_apply);

    // Every managed resource was awaited
    let waited: Vec<String> = runner
        .calls_starting_with(&["wait"])
        .iter()
        .map(|c| c.args[1].clone())
        .collect();
    for (_, resource) in plan.all_resources() {
        if resource.is_managed() {
            assert!(waited.contains(&resource.kubectl_target()), "{resource} not awaited");
        }
    }
    assert_eq!(runner.calls_starting_with(&["rollout", "-n", "default", "status"]).len(), 1);
}

#[tokio::test]
async fn test_missing_tool_stops_before_cluster_operations() {
    let config = test_config();
    let plan = manifests::render_all(&config, &Secrets::masked()).unwrap();
    let runner = healthy_aws().on(
        |inv| inv.program == "helm",
        |_| {
            Err(ToolError::NotInstalled {
                program: "helm".into(),
            })
        },
    );

    let result = Installer::new(&runner, &config, &plan, InstallOptions::default())
        .run()
        .await;
    assert!(result.is_err());

    for call in runner.calls() {
        assert!(
            call.starts_with(&["version"]) || call.has_arg("--version"),
            "unexpected call before prerequisites passed: {call}"
        );
    }
}

#[tokio::test]
async fn test_install_fails_fast_on_database_timeout() {
    let config = test_config();
    let plan = manifests::render_all(&config, &Secrets::generate()).unwrap();
    let runner = healthy_aws().on(
        |inv| inv.starts_with(&["wait", "instance.rds.aws.upbound.io/xpdemo-db"]),
        |_| Ok(timed_out()),
    );

    let err = Installer::new(&runner, &config, &plan, InstallOptions::default())
        .run()
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Applying RDS instance"));

    let applied = applied_categories(&runner, &plan);
    assert_eq!(applied.last(), Some(&Category::Database));
    assert!(!applied.contains(&Category::Workload));
    assert!(runner.calls_starting_with(&["rollout"]).is_empty());
}

#[tokio::test]
async fn test_skip_wait_and_existing_crossplane() {
    let config = test_config();
    let plan = manifests::render_all(&config, &Secrets::generate()).unwrap();
    let runner = healthy_aws();
    let options = InstallOptions {
        skip_wait: true,
        no_crossplane: true,
    };

    Installer::new(&runner, &config, &plan, options)
        .run()
        .await
        .unwrap();

    let calls = runner.calls();
    assert!(!calls.iter().any(|c| c.program == "helm" && !c.starts_with(&["version"])));
    assert!(runner.calls_starting_with(&["wait"]).is_empty());
    assert!(runner.calls_starting_with(&["rollout"]).is_empty());
    assert_eq!(applied_categories(&runner, &plan), Category::INSTALL_ORDER.to_vec());
}

#[tokio::test]
async fn test_credentials_secret_created_from_profile() {
    let config = test_config();
    let plan = manifests::render_all(&config, &Secrets::generate()).unwrap();
    let runner = healthy_aws();

    Installer::new(&runner, &config, &plan, InstallOptions::default())
        .run()
        .await
        .unwrap();

    let create = runner.calls_starting_with(&["create", "-n", "crossplane-system", "secret"]);
    assert_eq!(create.len(), 1);
    assert!(create[0].has_arg("xpdemo-aws-credentials"));
    assert!(create[0].args.iter().any(|a| a.starts_with("--from-file=creds=")));

    // The rendered secret is applied before the ProviderConfig that reads it
    let applied = runner.applied();
    let secret = applied.iter().position(|y| y.contains("kind: Secret") && y.contains("xpdemo-aws-credentials"));
    let provider_config = applied.iter().position(|y| y.contains("kind: ProviderConfig"));
    assert!(secret.unwrap() < provider_config.unwrap());
}

#[derive(Parser)]
struct InstallArgs {
    #[command(flatten)]
    install: InstallCommand,
}

#[tokio::test]
async fn test_install_command_runs_without_a_terminal() {
    let config = test_config();
    let runner = healthy_aws();
    let args = InstallArgs::try_parse_from(["install", "--skip-wait"]).unwrap();

    args.install
        .execute(&runner, &config, "kind-demo")
        .await
        .unwrap();

    // First thing it does is check the tools; nothing waits on a prompt
    let first = runner.calls().into_iter().next().unwrap();
    assert_eq!(first.program, "kubectl");
    assert!(first.starts_with(&["version", "--client"]));
    assert!(runner.calls_starting_with(&["wait"]).is_empty());
}

#[tokio::test]
async fn test_install_command_reports_missing_tools() {
    let config = test_config();
    let runner = healthy_aws().on(
        |inv| inv.program == "aws" && inv.has_arg("--version"),
        |_| {
            Err(ToolError::NotInstalled {
                program: "aws".into(),
            })
        },
    );
    let args = InstallArgs::try_parse_from(["install"]).unwrap();
    assert!(InstallArgs::try_parse_from(["install", "--yes"]).is_err());

    let err = args
        .install
        .execute(&runner, &config, "kind-demo")
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Prerequisites not met"));
}
