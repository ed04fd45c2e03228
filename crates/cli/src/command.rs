//! Processor backed by an external command
//!
//! The configured program is run once per document with `{path}` and
//! `{recipe}` substituted in its arguments. `{recipe}` receives the resolved
//! recipe file path, not the raw reference; the recipe must exist.

use crate::config::ProcessorConfig;
use crate::recipes::RecipeResolver;
use anyhow::{bail, Context, Result};
use docintake_worker::{ProcessOutput, Processor};
use std::path::Path;
use std::process::Command;
use tracing::debug;

pub const PATH_PLACEHOLDER: &str = "{path}";
pub const RECIPE_PLACEHOLDER: &str = "{recipe}";

#[derive(Debug, Clone)]
pub struct CommandProcessor {
    program: String,
    args: Vec<String>,
    recipes: RecipeResolver,
}

impl CommandProcessor {
    pub fn new(config: &ProcessorConfig, recipes: RecipeResolver) -> Result<Self> {
        if config.command.trim().is_empty() {
            bail!("processor.command is not configured");
        }
        Ok(Self {
            program: config.command.clone(),
            args: config.args.clone(),
            recipes,
        })
    }

    fn render_args(&self, path: &Path, recipe: &Path) -> Vec<String> {
        let path = path.display().to_string();
        let recipe = recipe.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(PATH_PLACEHOLDER, &path)
                    .replace(RECIPE_PLACEHOLDER, &recipe)
            })
            .collect()
    }
}

impl Processor for CommandProcessor {
    fn process(&self, path: &Path, recipe_ref: &str) -> Result<ProcessOutput> {
        let recipe = self
            .recipes
            .require(recipe_ref)
            .with_context(|| format!("failed to resolve recipe '{recipe_ref}'"))?;
        let args = self.render_args(path, &recipe);
        debug!(program = %self.program, ?args, "running processor");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .with_context(|| format!("failed to run {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8(output.stdout)
            .with_context(|| format!("{} produced non UTF-8 output", self.program))?;
        Ok(match serde_json::from_str::<serde_json::Value>(&stdout) {
            Ok(value) => ProcessOutput::Structured(value),
            Err(_) => ProcessOutput::Text(stdout),
        })
    }
}
