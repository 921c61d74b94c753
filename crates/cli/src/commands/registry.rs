use anyhow::{bail, Result};
use notescan_core::WIPE_CONFIRMATION;

use crate::Services;

pub(crate) fn check_confirmation(confirm: Option<&str>) -> Result<()> {
    if confirm.map(str::trim) != Some(WIPE_CONFIRMATION) {
        bail!("refusing to wipe: pass --confirm {WIPE_CONFIRMATION}");
    }
    Ok(())
}

pub(crate) async fn run_list(services: &Services) -> Result<()> {
    for serial in services.registry.list_serials().await? {
        println!("{serial}");
    }
    Ok(())
}

pub(crate) async fn run_stats(services: &Services) -> Result<()> {
    let stats = services.registry.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

pub(crate) async fn run_wipe(services: &Services, confirm: Option<&str>) -> Result<()> {
    services.registry.wipe(confirm).await?;
    println!("registry wiped");
    Ok(())
}
