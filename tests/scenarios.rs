use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use radar_hub::{
    access::{authorize, Action},
    clock::{Clock, ManualClock},
    models::RoleName,
    repository::{
        stations::{STATUS_ACTIVE, STATUS_INACTIVE},
        NewCommand, NewSchedule, NewStation, NewUser, NewVessel, StationPatch, VesselPatch,
    },
    store::Store,
    window::utc_offset,
    RadarHub, Result,
};

fn open_hub(dir: &std::path::Path, clock: &ManualClock) -> RadarHub {
    let store = Store::open(dir).expect("Failed to open store");
    RadarHub::with_store(store, Arc::new(clock.clone()), utc_offset(7).unwrap())
}

fn at_local(hour: u32, minute: u32) -> chrono::DateTime<Utc> {
    // Local UTC+7 wall clock on 2024-06-01
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
        + chrono::Duration::minutes(i64::from(hour * 60 + minute) - 7 * 60)
}

#[test]
fn station_status_follows_schedule() -> Result<()> {
    let dir = tempdir().unwrap();
    let clock = ManualClock::new(at_local(9, 0));
    let hub = open_hub(dir.path(), &clock);

    let station = hub.stations().create(NewStation {
        name: "Con Co".to_string(),
        latitude: 17.16,
        longitude: 107.34,
        ..Default::default()
    })?;
    assert_eq!(hub.stations().get_with_status(station.id)?.status, STATUS_INACTIVE);

    hub.create_schedule(
        station.id,
        NewSchedule {
            start_hhmm: "0800".to_string(),
            end_hhmm: "1700".to_string(),
            commander: "Lt. Tran".to_string(),
            ..Default::default()
        },
    )?;
    assert_eq!(hub.stations().get_with_status(station.id)?.status, STATUS_ACTIVE);
    assert!(hub.schedules().is_station_active_now(station.id)?);

    clock.set(at_local(18, 0));
    let listed = hub.stations().list_with_status()?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, STATUS_INACTIVE);
    assert!(!hub.schedules().is_station_active_now(station.id)?);

    // Explicit writes only change the stored value
    hub.stations().update_partial(
        station.id,
        StationPatch {
            status: Some(STATUS_ACTIVE.to_string()),
            ..Default::default()
        },
    )?;
    assert_eq!(hub.stations().get_by_id(station.id)?.status, STATUS_ACTIVE);
    assert_eq!(hub.stations().get_with_status(station.id)?.status, STATUS_INACTIVE);
    Ok(())
}

#[test]
fn command_acknowledgement_flow() -> Result<()> {
    let dir = tempdir().unwrap();
    let clock = ManualClock::new(at_local(10, 0));
    let hub = open_hub(dir.path(), &clock);

    let station = hub.stations().create(NewStation {
        name: "Ly Son".to_string(),
        ..Default::default()
    })?;
    let hq = hub.users().create(NewUser {
        username: "hq1".to_string(),
        password: "secret".to_string(),
        full_name: "Headquarters".to_string(),
        role_id: RoleName::Hq,
        station_id: None,
    })?;
    let operator = hub.users().create(NewUser {
        username: "op1".to_string(),
        password: "secret".to_string(),
        full_name: "Operator".to_string(),
        role_id: RoleName::Operator,
        station_id: Some(station.id),
    })?;

    authorize(&hq, &Action::SendCommand)?;
    let first = hub.send_command(NewCommand {
        to_station_id: station.id,
        content: "Report surface contacts".to_string(),
        from_user_id: hq.id,
    })?;
    let second = hub.send_command(NewCommand {
        to_station_id: station.id,
        content: "Switch to sector scan".to_string(),
        from_user_id: hq.id,
    })?;

    let pending = Action::ViewUnacknowledged {
        station_id: station.id,
    };
    authorize(&operator, &pending)?;
    assert!(authorize(&hq, &pending).is_err());

    let ids: Vec<u64> = hub
        .commands()
        .list_unacknowledged(station.id)?
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![first.id, second.id]);

    clock.advance(300);
    authorize(
        &operator,
        &Action::AcknowledgeCommand {
            station_id: station.id,
        },
    )?;
    let acked = hub.commands().acknowledge_now(first.id)?;
    assert_eq!(acked.acknowledged_at, Some(clock.now().timestamp()));

    let ids: Vec<u64> = hub
        .commands()
        .list_unacknowledged(station.id)?
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![second.id]);
    assert!(hub.commands().acknowledge_now(first.id).unwrap_err().is_conflict());
    Ok(())
}

#[test]
fn vessel_lookup_after_mmsi_change() -> Result<()> {
    let dir = tempdir().unwrap();
    let clock = ManualClock::from_unix(1_719_800_000);
    let hub = open_hub(dir.path(), &clock);

    let vessel = hub.vessels().create(NewVessel {
        name: "Hai Au 05".to_string(),
        mmsi: "574123001".to_string(),
        kind: "Fishing".to_string(),
        ..Default::default()
    })?;
    hub.vessels().update_partial(
        vessel.id,
        VesselPatch {
            mmsi: Some("574123999".to_string()),
            ..Default::default()
        },
    )?;

    assert!(hub.vessels().get_by_mmsi("574123001").unwrap_err().is_not_found());
    assert_eq!(hub.vessels().get_by_mmsi("574123999")?.id, vessel.id);
    assert_eq!(hub.vessels().search_by_name("hai au")?.len(), 1);

    // The old MMSI is free again
    let other = hub.vessels().create(NewVessel {
        name: "Hai Au 06".to_string(),
        mmsi: "574123001".to_string(),
        ..Default::default()
    })?;
    assert_eq!(hub.vessels().get_by_mmsi("574123001")?.id, other.id);
    Ok(())
}

#[test]
fn data_survives_reopen() -> Result<()> {
    let dir = tempdir().unwrap();
    let clock = ManualClock::from_unix(1_719_800_000);
    {
        let hub = open_hub(dir.path(), &clock);
        hub.stations().create(NewStation {
            name: "Con Co".to_string(),
            ..Default::default()
        })?;
        hub.users().create(NewUser {
            username: "admin".to_string(),
            password: "admin123".to_string(),
            full_name: "Administrator".to_string(),
            role_id: RoleName::Admin,
            station_id: None,
        })?;
        hub.close();
    }

    let hub = open_hub(dir.path(), &clock);
    assert_eq!(hub.stations().list()?.len(), 1);
    assert_eq!(hub.users().get_by_username("admin")?.id, 1);

    let next = hub.stations().create(NewStation {
        name: "Ly Son".to_string(),
        ..Default::default()
    })?;
    assert_eq!(next.id, 2);
    Ok(())
}
