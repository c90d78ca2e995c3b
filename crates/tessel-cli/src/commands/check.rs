//! `tessel check`: validate configuration without building.

use tessel_config::validate_fs;

use crate::cli::CheckArgs;
use crate::commands::Project;
use crate::error::Result;
use crate::ui;

/// Validate the config for the resolved mode, including that entry files
/// and the HTML template exist. Nothing is read beyond those paths.
pub fn execute(args: CheckArgs, project: Project) -> Result<()> {
    let mode = project.mode(args.mode);
    if project.config_path.is_none() {
        ui::warning("No tessel.toml or package.json `tessel` field found, checking defaults");
    }

    let options = project.options_for(mode)?;
    validate_fs(&options, &project.root)?;

    ui::success(&format!(
        "Configuration is valid ({}): {} entr{}, {} rule(s), output to {}",
        mode.as_str(),
        options.entries.len(),
        if options.entries.len() == 1 { "y" } else { "ies" },
        options.rules.len(),
        options.output_dir.display()
    ));
    Ok(())
}
