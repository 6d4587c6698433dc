use anyhow::Result;
use std::path::PathBuf;

use super::load_config;

pub fn handle_check_config(config_path: Option<PathBuf>) -> Result<()> {
    let (path, config) = load_config(config_path)?;

    println!("{} is valid", path.display());
    println!(
        "  poll every {}s, feed timeout {}s, channel timeout {}s",
        config.poll_interval_secs, config.feed_timeout_secs, config.channel_timeout_secs
    );
    println!("  feed: {} ({:?} altitudes)", config.feed.base_url, config.feed.altitude_unit);

    for tenant in &config.tenants {
        let aircraft = tenant.aircraft_set();
        let channels = tenant.channels.iter().filter(|c| c.enabled()).count();
        println!(
            "  tenant {}{}: {} aircraft, {} enabled channel(s), alerts at {:?} nm{}",
            tenant.id,
            tenant
                .name
                .as_deref()
                .map(|n| format!(" ({})", n))
                .unwrap_or_default(),
            aircraft.len(),
            channels,
            tenant.airspace.alert_distances_nm,
            if aircraft.is_empty() { " [idle, not polled]" } else { "" }
        );
    }

    Ok(())
}
