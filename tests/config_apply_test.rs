mod common;

use common::{ScriptedFeed, sample_north_of, tenant_config};
use std::sync::Arc;
use std::time::Duration;
use tailwatch::ServiceConfig;
use tailwatch::config::apply_tenants;
use tailwatch::notifications::{ChannelFactory, MemoryDeliveryLog, NotificationDispatcher};
use tailwatch::scheduler::{SchedulerSettings, TrackingScheduler};
use tailwatch::tenant::ChannelConfig;

fn scheduler(feed: Arc<ScriptedFeed>) -> TrackingScheduler {
    TrackingScheduler::new(
        feed,
        Arc::new(NotificationDispatcher::new(
            Arc::new(MemoryDeliveryLog::new()),
            Duration::from_secs(1),
        )),
        SchedulerSettings::default(),
    )
}

#[tokio::test]
async fn test_apply_registers_updates_and_drops_tenants() {
    let scheduler = scheduler(Arc::new(ScriptedFeed::new()));
    let factory = ChannelFactory::new(reqwest::Client::new(), None);

    let mut hangar = tenant_config(40.0, -105.0, &[("a8c4f2", "N512TW")]);
    hangar.channels = vec![ChannelConfig::Discord {
        webhook_url: Some("http://127.0.0.1:9/hook".to_string()),
        enabled: true,
    }];
    let club = tenant_config(41.0, -104.0, &[("b7d3e1", "N88BR")]);
    let idle = tenant_config(42.0, -103.0, &[]);

    let mut config = ServiceConfig {
        tenants: vec![hangar.clone(), club.clone(), idle],
        ..ServiceConfig::default()
    };
    let summary = apply_tenants(&config, &scheduler, &factory).await;
    assert_eq!(summary.registered, 2);
    assert_eq!(scheduler.tenant_count(), 2);

    // Club dropped from the file, hangar kept
    config.tenants = vec![hangar.clone()];
    let summary = apply_tenants(&config, &scheduler, &factory).await;
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.removed, 1);
    assert_eq!(scheduler.tenant_ids(), vec![hangar.id]);

    // Clearing the fleet removes the tenant as well
    hangar.aircraft.clear();
    config.tenants = vec![hangar];
    let summary = apply_tenants(&config, &scheduler, &factory).await;
    assert_eq!(summary.removed, 1);
    assert_eq!(scheduler.tenant_count(), 0);
}

#[tokio::test]
async fn test_reload_keeps_state_of_unchanged_tenants() {
    let feed = Arc::new(ScriptedFeed::new());
    let scheduler = scheduler(feed.clone());
    let factory = ChannelFactory::new(reqwest::Client::new(), None);

    let hangar = tenant_config(40.0, -105.0, &[("a8c4f2", "N512TW")]);
    let mut club = tenant_config(41.0, -104.0, &[("b7d3e1", "N88BR")]);
    let mut config = ServiceConfig {
        tenants: vec![hangar.clone(), club.clone()],
        ..ServiceConfig::default()
    };
    apply_tenants(&config, &scheduler, &factory).await;

    feed.push(
        &hangar.airspace,
        Ok(vec![sample_north_of("a8c4f2", &hangar.airspace, 11.0, 0)]),
    );
    scheduler.tick_once().await;
    assert_eq!(scheduler.live_aircraft(hangar.id).await.len(), 1);

    // Only the club's entry is edited
    club.name = Some("Gliding club".to_string());
    config.tenants = vec![hangar.clone(), club];
    let summary = apply_tenants(&config, &scheduler, &factory).await;
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.updated, 1);

    let live = scheduler.live_aircraft(hangar.id).await;
    assert_eq!(live.len(), 1);
    assert!((live[0].distance_nm - 11.0).abs() < 1e-6);
}
