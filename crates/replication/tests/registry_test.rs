//! Integration tests for the team registry.
//!
//! # Test Strategy
//!
//! 1. **Machine teams**: sorting, equality, deduplication
//! 2. **Server lifecycle**: add, remove, re-home, re-type
//! 3. **Server teams**: membership bookkeeping and cascades
//! 4. **Health**: flags, events, removal notification, shutdown

mod common;

use std::time::Duration;

use anyhow::Result;
use corelib::{KeyValueStoreType, LocalityData, MachineId, ProcessClass, ServerId};
use replication::{Disposition, MachineTeam, ReplicationError, ServerEvent};

// ============================================================================
// Machine Team Tests
// ============================================================================

#[tokio::test]
async fn test_machine_team_scenario() -> Result<()> {
    let (mut registry, _) = common::registry();
    common::add(&mut registry, 1, "A");
    common::add(&mut registry, 2, "B");
    common::add(&mut registry, 3, "C");

    let abc = [MachineId::from("A"), MachineId::from("B"), MachineId::from("C")];
    let team_id = registry.add_machine_team(&abc)?;
    let team = registry.machine_team(team_id).expect("team should exist");
    assert_eq!(team.size(), 3);
    assert_eq!(team.machine_ids_str(), "A B C");

    // The same machines in another order are the same team.
    let cab = [MachineId::from("C"), MachineId::from("A"), MachineId::from("B")];
    let records: Vec<_> = cab.iter().map(|id| registry.machine(id).expect("machine should exist")).collect();
    let reordered = MachineTeam::new(&records)?;
    assert_eq!(&reordered, team);
    assert_eq!(reordered.machine_ids_str(), team.machine_ids_str());

    assert_eq!(registry.add_machine_team(&cab), Err(ReplicationError::DuplicateMachineTeam(team_id)));
    assert_eq!(registry.find_machine_team(&cab), Some(team_id));
    assert_eq!(registry.machine_teams().count(), 1);

    registry.check_invariants();
    registry.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_machine_team_rejections() -> Result<()> {
    let (mut registry, _) = common::registry();
    common::add(&mut registry, 1, "A");
    common::add(&mut registry, 2, "B");

    let res = registry.add_machine_team(&[MachineId::from("A"), MachineId::from("B")]);
    assert_eq!(res, Err(ReplicationError::InvalidTeamSize { expected: 3, actual: 2 }));

    let res = registry.add_machine_team(&[MachineId::from("A"), MachineId::from("B"), MachineId::from("Z")]);
    assert_eq!(res, Err(ReplicationError::UnknownMachine(MachineId::from("Z"))));

    let res = registry.add_machine_team(&[MachineId::from("A"), MachineId::from("B"), MachineId::from("A")]);
    assert!(matches!(res, Err(ReplicationError::InvalidMachineTeam(_))), "got {:?}", res);

    registry.shutdown().await;
    Ok(())
}

// ============================================================================
// Server Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_add_server_joins_machine() -> Result<()> {
    let (mut registry, _) = common::registry();
    let s1 = common::add(&mut registry, 1, "A");
    let s2 = common::add(&mut registry, 2, "A");

    let machine = registry.machine(&MachineId::from("A")).expect("machine should exist");
    assert_eq!(machine.servers(), &[s1, s2]);
    assert_eq!(registry.server(s1)?.machine(), Some(&MachineId::from("A")));
    assert!(registry.server(s1)?.is_polling());
    assert_eq!(registry.healthy_servers(), vec![s1, s2]);

    let dup =
        registry.add_server(common::interface(1, "A"), ProcessClass::Storage, KeyValueStoreType::SsdBTreeV2, true);
    assert_eq!(dup, Err(ReplicationError::DuplicateServer(s1)));

    let mut zoneless = common::interface(9, "A");
    zoneless.locality = LocalityData::default();
    let res = registry.add_server(zoneless, ProcessClass::Storage, KeyValueStoreType::SsdBTreeV2, true);
    assert_eq!(res, Err(ReplicationError::MissingZoneId(ServerId(9))));

    registry.check_invariants();
    registry.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_remove_last_server_drops_machine_and_teams() -> Result<()> {
    let (mut registry, _) = common::registry();
    let a = common::add(&mut registry, 1, "A");
    let b = common::add(&mut registry, 2, "B");
    let c = common::add(&mut registry, 3, "C");
    let d = common::add(&mut registry, 4, "D");
    let c2 = common::add(&mut registry, 5, "C");

    let abc = registry.add_server_team(&[a, b, c])?;
    let abd = registry.add_server_team(&[a, b, d])?;
    let abd_machines = registry.server_team(abd).expect("team should exist").machine_team();

    registry.remove_server(d).await?;
    assert!(registry.machine(&MachineId::from("D")).is_none());
    assert!(registry.machine_team(abd_machines).is_none());
    assert!(registry.server_team(abd).is_none());
    assert_eq!(registry.server(a)?.teams(), &[abc]);

    // Machine C still hosts c2, so the ABC machine team survives losing c.
    registry.remove_server(c).await?;
    assert_eq!(registry.machine(&MachineId::from("C")).map(|m| m.servers().to_vec()), Some(vec![c2]));
    assert!(registry.server_team(abc).is_none());
    assert!(registry.find_machine_team(&[MachineId::from("A"), MachineId::from("B"), MachineId::from("C")]).is_some());
    assert!(registry.server(a)?.teams().is_empty());

    assert_eq!(registry.remove_server(c).await, Err(ReplicationError::UnknownServer(c)));

    registry.check_invariants();
    registry.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_interface_change_moves_machine() -> Result<()> {
    let (mut registry, _) = common::registry();
    let a = common::add(&mut registry, 1, "A");
    let b = common::add(&mut registry, 2, "B");
    let c = common::add(&mut registry, 3, "C");
    let team = registry.add_server_team(&[a, b, c])?;
    let mut changes = registry.server(c)?.health().on_interface_changed();

    assert!(!registry.update_server_interface(c, common::interface(3, "C"), ProcessClass::Storage)?);
    assert!(!changes.has_changed());

    assert!(registry.update_server_interface(c, common::interface(3, "E"), ProcessClass::Storage)?);
    let change = changes.next_change().await?;
    assert_eq!(change.interface.locality.machine(), Some(MachineId::from("E")));

    assert!(registry.machine(&MachineId::from("C")).is_none());
    assert_eq!(registry.server(c)?.machine(), Some(&MachineId::from("E")));
    assert!(registry.server_team(team).is_none());
    assert!(registry.server(a)?.teams().is_empty());

    let res = registry.update_server_interface(c, common::interface(4, "E"), ProcessClass::Storage);
    assert_eq!(res, Err(ReplicationError::InterfaceMismatch { expected: c, actual: ServerId(4) }));

    registry.check_invariants();
    registry.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_replace_store_type_keeps_machine_teams() -> Result<()> {
    let (mut registry, _) = common::registry();
    common::add(&mut registry, 1, "A");
    common::add(&mut registry, 2, "B");
    let old = registry.add_server(common::interface(3, "C"), ProcessClass::Storage, KeyValueStoreType::Memory, true)?;
    let machines = [MachineId::from("A"), MachineId::from("B"), MachineId::from("C")];
    let machine_team = registry.add_machine_team(&machines)?;

    assert_eq!(registry.wrong_store_type_servers(KeyValueStoreType::SsdBTreeV2), vec![old]);
    assert_eq!(registry.wrong_store_type_servers(KeyValueStoreType::Memory), vec![ServerId(1), ServerId(2)]);
    assert_eq!(registry.server(old)?.disposition(), Disposition::Active);

    assert_eq!(registry.check_store_types(), vec![old]);
    assert_eq!(registry.server(old)?.disposition(), Disposition::WrongStoreType);
    let old_health = registry.server(old)?.health().clone();

    let new = registry.replace_server_store_type(old, KeyValueStoreType::SsdBTreeV2).await?;
    assert_ne!(new, old);
    assert!(old_health.is_removed());
    assert!(registry.server(old).is_err());

    let replacement = registry.server(new)?;
    assert!(replacement.is_correct_store_type(KeyValueStoreType::SsdBTreeV2));
    assert_eq!(replacement.interface().address, common::interface(3, "C").address);
    assert_eq!(replacement.machine(), Some(&MachineId::from("C")));
    assert!(registry.machine_team(machine_team).is_some());
    assert!(registry.check_store_types().is_empty());

    registry.check_invariants();
    registry.shutdown().await;
    Ok(())
}

// ============================================================================
// Server Team Tests
// ============================================================================

#[tokio::test]
async fn test_server_team_membership() -> Result<()> {
    let (mut registry, _) = common::registry();
    let a = common::add(&mut registry, 1, "A");
    let b = common::add(&mut registry, 2, "B");
    let c = common::add(&mut registry, 3, "C");
    let a2 = common::add(&mut registry, 4, "A");

    let team = registry.add_server_team(&[c, a, b])?;
    let server_team = registry.server_team(team).expect("team should exist");
    assert_eq!(server_team.servers(), &[a, b, c]);
    let machine_team = server_team.machine_team();
    assert_eq!(registry.machine_team(machine_team).map(MachineTeam::machine_ids_str), Some("A B C".to_string()));
    for id in [a, b, c] {
        assert_eq!(registry.server(id)?.teams(), &[team]);
    }

    assert_eq!(registry.add_server_team(&[a, b, c]), Err(ReplicationError::DuplicateServerTeam(team)));
    let res = registry.add_server_team(&[a, a2, b]);
    assert!(matches!(res, Err(ReplicationError::InvalidServerTeam(_))), "got {:?}", res);
    assert_eq!(registry.add_server_team(&[a, b]), Err(ReplicationError::InvalidTeamSize { expected: 3, actual: 2 }));

    // A second team over the same machines reuses the machine team.
    let other = registry.add_server_team(&[a2, b, c])?;
    assert_eq!(registry.server_team(other).map(|t| t.machine_team()), Some(machine_team));
    assert_eq!(registry.server(b)?.teams().len(), 2);

    registry.remove_server_team(team)?;
    assert!(registry.server(a)?.teams().is_empty());
    assert_eq!(registry.server(b)?.teams(), &[other]);
    assert_eq!(registry.remove_server_team(team), Err(ReplicationError::UnknownTeam(team)));

    registry.remove_machine_team(machine_team)?;
    assert!(registry.server_team(other).is_none());
    assert!(registry.server(b)?.teams().is_empty());

    registry.check_invariants();
    registry.shutdown().await;
    Ok(())
}

// ============================================================================
// Health Tests
// ============================================================================

#[tokio::test]
async fn test_wrong_store_type_independent_of_version_lag() -> Result<()> {
    let (mut registry, _) = common::registry();
    let s = registry.add_server(common::interface(1, "A"), ProcessClass::Storage, KeyValueStoreType::Memory, true)?;
    let configured = registry.config().store_type;

    assert!(registry.mark_wrong_store_type(s)?);
    assert!(!registry.mark_wrong_store_type(s)?);
    for behind in [true, false, true, false] {
        registry.set_version_too_far_behind(s, behind)?;
        assert_eq!(registry.is_lagging(s), behind);
        assert!(!registry.server(s)?.is_correct_store_type(configured));
        assert_eq!(registry.server(s)?.disposition(), Disposition::WrongStoreType);
    }

    let events = registry.poll_events();
    assert!(events.contains(&ServerEvent::WrongStoreType { server_id: s }));

    registry.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_polled_version_lag_reaches_registry() -> Result<()> {
    let (mut registry, transport) = common::registry();
    transport.set_lag(5_000);
    let s = common::add(&mut registry, 1, "A");

    tokio::time::sleep(Duration::from_millis(10)).await;
    registry.poll_events();
    assert!(registry.is_lagging(s));
    assert_eq!(registry.server(s)?.disposition(), Disposition::VersionTooFarBehind);
    assert!(registry.healthy_servers().is_empty());

    transport.set_lag(10);
    registry.server(s)?.health().wake_up_tracker();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let events = registry.poll_events();
    assert!(events.contains(&ServerEvent::VersionLagChanged { server_id: s, too_far_behind: false }));
    assert!(!registry.is_lagging(s));
    assert_eq!(registry.lagging_server_count(), 0);

    registry.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_removal_notification_fires_once() -> Result<()> {
    let (mut registry, transport) = common::registry();
    let s = common::add(&mut registry, 1, "A");
    tokio::time::sleep(Duration::from_millis(10)).await;

    let health = registry.server(s)?.health().clone();
    let mut early = health.on_removed();
    let waiter = tokio::spawn(async move { early.wait().await });

    registry.remove_server(s).await?;
    assert!(waiter.await?.is_ok());

    let mut late = health.on_removed();
    tokio::time::timeout(Duration::from_millis(1), late.wait()).await??;
    assert_eq!(health.disposition(), Disposition::Removed);

    // Nothing polls a removed server.
    let calls = transport.calls();
    let snapshot = health.server_metrics();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.calls(), calls);
    assert_eq!(health.server_metrics(), snapshot);

    registry.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_every_poller() -> Result<()> {
    let (mut registry, transport) = common::registry();
    let ids: Vec<ServerId> = (1..=4).map(|id| common::add(&mut registry, id, &format!("Z{}", id))).collect();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let healths: Vec<_> = ids
        .iter()
        .map(|id| registry.server(*id).map(|record| record.health().clone()))
        .collect::<std::result::Result<_, _>>()?;

    registry.shutdown().await;
    let calls = transport.calls();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(transport.calls(), calls);
    assert!(healths.iter().all(|health| health.is_removed()));
    Ok(())
}
