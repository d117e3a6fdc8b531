//! `gopherlink resolve`, `install` and `check-update`

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use gopherlink_config::ExtensionConfig;
use gopherlink_process::SystemExecutor;
use gopherlink_tools::{
    all_tools, get_tool, important_tools, is_module_workspace, HttpConfig, ModuleProxyRegistry,
    ToolDescriptor, ToolInstaller, ToolResolver, VersionGate, LANGUAGE_SERVER,
};

use crate::output::OutputStyle;

pub fn resolve(config: &ExtensionConfig, tools: &[String]) -> Result<()> {
    let resolver = ToolResolver::from_config(config);
    let style = OutputStyle::default();
    let names: Vec<String> = if tools.is_empty() {
        all_tools().iter().map(|t| t.name.to_string()).collect()
    } else {
        tools.to_vec()
    };

    for name in names {
        match resolver.resolve(&name) {
            Ok(path) => println!(
                "{} {}",
                style.success(&format!("{:<14}", name)),
                style.muted(&path.display().to_string())
            ),
            Err(_) => println!("{}", style.error(&format!("{:<14} not found", name))),
        }
    }
    Ok(())
}

fn descriptors(names: &[String]) -> Result<Vec<&'static ToolDescriptor>> {
    names
        .iter()
        .map(|name| get_tool(name).ok_or_else(|| anyhow!("unknown tool '{}'", name)))
        .collect()
}

pub async fn install(config: &ExtensionConfig, root: &Path, tools: &[String]) -> Result<()> {
    let resolver = ToolResolver::from_config(config);
    let targets = if tools.is_empty() {
        resolver.missing(important_tools(is_module_workspace(root)))
    } else {
        descriptors(tools)?
    };

    let style = OutputStyle::default();
    if targets.is_empty() {
        println!("{}", style.success("All important tools are installed"));
        return Ok(());
    }

    let installer = ToolInstaller::new(Arc::new(SystemExecutor::new()), resolver, config);
    let report = installer.install_tools(&targets).await;
    for tool in &report.succeeded {
        println!("{}", style.success(tool));
    }
    for failure in &report.failed {
        println!("{}", style.error(&format!("{}: {}", failure.tool, failure.reason)));
    }

    if !report.is_complete() {
        bail!(
            "{} of {} tools failed to install",
            report.failed.len(),
            targets.len()
        );
    }
    Ok(())
}

pub async fn check_update(config: &ExtensionConfig) -> Result<()> {
    let resolver = ToolResolver::from_config(config);
    let installed = resolver.resolve(LANGUAGE_SERVER)?;
    let registry = ModuleProxyRegistry::new(&HttpConfig::from_extension(config))?;
    let gate = VersionGate::new(Arc::new(SystemExecutor::new()), Arc::new(registry));

    let style = OutputStyle::default();
    if gate.should_update(LANGUAGE_SERVER, &installed).await? {
        let latest = gate
            .latest_version(LANGUAGE_SERVER)
            .await?
            .map(|v| format!(" (latest {})", v))
            .unwrap_or_default();
        println!("{}", style.warning(&format!("{} is out of date{}", LANGUAGE_SERVER, latest)));
    } else {
        println!("{}", style.success(&format!("{} is up to date", LANGUAGE_SERVER)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tool_rejected() {
        let err = descriptors(&["godef".to_string(), "nope".to_string()]).unwrap_err();
        assert!(err.to_string().contains("nope"));
        assert_eq!(descriptors(&["guru".to_string()]).unwrap()[0].name, "guru");
    }
}
