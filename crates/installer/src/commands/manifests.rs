use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::GlobalArgs;
use crate::manifests::{self, Category, Secrets};
use crate::ui;

/// Inspect the embedded resource library
#[derive(Args)]
pub struct ManifestsCommand {
    #[command(subcommand)]
    action: ManifestsAction,
}

#[derive(Subcommand)]
enum ManifestsAction {
    /// List resources by category, in install order
    List,

    /// Print rendered YAML
    Render {
        /// Only this category (e.g. networking, database-prep)
        #[arg(long)]
        category: Option<Category>,

        /// Render with a freshly generated database password instead of a mask
        #[arg(long)]
        show_secrets: bool,
    },
}

impl ManifestsCommand {
    pub async fn run(&self, global: &GlobalArgs) -> Result<()> {
        let config = global.resolve_config()?;

        match &self.action {
            ManifestsAction::List => {
                let plan = manifests::render_all(&config, &Secrets::masked())?;
                for category in Category::INSTALL_ORDER {
                    println!(
                        "{} {}",
                        category.to_string().cyan().bold(),
                        format!("({:?})", category.disposition()).bright_black()
                    );
                    for resource in plan.resources(category) {
                        ui::print_progress(&resource.to_string());
                    }
                }
            }
            ManifestsAction::Render {
                category,
                show_secrets,
            } => {
                let secrets = if *show_secrets {
                    Secrets::generate()
                } else {
                    Secrets::masked()
                };
                let plan = manifests::render_all(&config, &secrets)?;
                let categories = match category {
                    Some(c) => vec![*c],
                    None => Category::INSTALL_ORDER.to_vec(),
                };
                for category in categories {
                    println!("# {}", category.description());
                    println!("---");
                    println!("{}", plan.yaml_for(category));
                }
            }
        }

        Ok(())
    }
}
